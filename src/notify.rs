//! # Notification Module
//!
//! The engine reports matches and recoverable errors through a [`Notifier`].
//! How they are presented is up to the implementation.
//!
//! ## Key Components
//!
//! - `Notifier`: trait called by the engine for every match and error
//! - `TracingNotifier`: logs notifications
//! - `ChannelNotifier`: forwards notifications over an mpsc channel
//! - `ConsoleNotifier`: prints colored notifications to the terminal

use std::io::Write as _;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Receiver of match and error events.
///
/// Calls are made from the engine's supervisor task, so implementations must
/// return quickly and must not block on I/O of unbounded latency.
pub trait Notifier: Send + Sync + 'static {
    /// A new occurrence of `keyword` was found on `url`
    fn on_match(&self, url: &str, keyword: &str, timestamp: DateTime<Utc>);

    /// A recoverable error happened somewhere in the engine
    fn on_error(&self, message: &str);
}

/// A notification as a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Match {
        url: String,
        keyword: String,
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
    },
}

/// Notifier that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn on_match(&self, url: &str, keyword: &str, timestamp: DateTime<Utc>) {
        info!(%url, %keyword, %timestamp, "Match found");
    }

    fn on_error(&self, message: &str) {
        warn!("{}", message);
    }
}

/// Notifier that sends every notification into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end of its channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn on_match(&self, url: &str, keyword: &str, timestamp: DateTime<Utc>) {
        let _ = self.sender.send(Notification::Match {
            url: url.to_string(),
            keyword: keyword.to_string(),
            timestamp,
        });
    }

    fn on_error(&self, message: &str) {
        let _ = self.sender.send(Notification::Error {
            message: message.to_string(),
        });
    }
}

/// Notifier that prints to stdout with colors when the terminal supports them
pub struct ConsoleNotifier {
    out: Mutex<StandardStream>,
}

impl ConsoleNotifier {
    pub fn new(choice: ColorChoice) -> Self {
        Self {
            out: Mutex::new(StandardStream::stdout(choice)),
        }
    }

    fn print(&self, color: Color, title: &str, body: &str) {
        let Ok(mut out) = self.out.lock() else {
            return;
        };
        let _ = out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
        let _ = write!(out, "{}", title);
        let _ = out.reset();
        let _ = writeln!(out, " {}", body);
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new(ColorChoice::Auto)
    }
}

impl Notifier for ConsoleNotifier {
    fn on_match(&self, url: &str, keyword: &str, timestamp: DateTime<Utc>) {
        let when = timestamp.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S");
        self.print(
            Color::Green,
            "Match found!",
            &format!("[{}] \"{}\" at {}", when, keyword, url),
        );
    }

    fn on_error(&self, message: &str) {
        self.print(Color::Red, "Something went wrong:", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_notifier_forwards_in_order() {
        let (notifier, mut rx) = ChannelNotifier::new();
        let now = Utc::now();
        notifier.on_match("http://example.com/", "alpha", now);
        notifier.on_error("Could not access http://example.com/");

        assert_eq!(
            rx.try_recv().unwrap(),
            Notification::Match {
                url: "http://example.com/".to_string(),
                keyword: "alpha".to_string(),
                timestamp: now,
            }
        );
        assert!(matches!(rx.try_recv().unwrap(), Notification::Error { .. }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_notifier_survives_closed_receiver() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);
        notifier.on_error("nobody is listening");
    }
}
