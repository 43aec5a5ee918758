//! # urlspy CLI Application
//!
//! Command-line front end for the monitoring engine.
//!
//! ## Key Components
//!
//! - CLI argument parsing with clap
//! - Subcommands:
//!   - `watch`: run the engine and manage it interactively from stdin
//!   - `list`: print the watched targets from the save file
//!   - `log`: print or clear the match log
//!
//! ## Features
//!
//! - Colored match notifications on the terminal
//! - Logs to stderr or to a file, filtered with `RUST_LOG`
//! - OTLP traces and metrics when `OTEL_EXPORTER_OTLP_ENDPOINT` is set
//! - Both JSON and text output formats

mod telemetry;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::anyhow;
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::instrument;
use urlspy::engine::{Engine, EngineConfig, TargetStatus};
use urlspy::fetch::{FetcherConfig, HttpFetcher};
use urlspy::notify::ConsoleNotifier;
use urlspy::store::file::DEFAULT_SAVE_PATH;
use urlspy::store::{FileStore, LogEntry, PersistenceStore};

#[derive(Parser)]
#[command(author, version, about = "Watch web pages for new text matching your keywords", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Save file with targets, seen fingerprints and the match log
    #[arg(long, global = true, default_value = DEFAULT_SAVE_PATH)]
    save_file: PathBuf,

    /// Seconds between two polls of a page
    #[arg(long, global = true, default_value = "30", value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    /// Seconds before a page fetch is abandoned
    #[arg(long, global = true, default_value = "20", value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch the saved targets and read commands from stdin
    Watch(WatchArgs),

    /// List watched URLs and their keywords
    List(ListArgs),

    /// Show the log of reported matches
    Log(LogArgs),
}

#[derive(Args, Debug)]
struct WatchArgs {
    /// Extra CSS selectors whose text is ignored
    #[arg(short, long)]
    exclude: Vec<String>,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Output format (text|json)
    #[arg(short, long, default_value = "text")]
    format: String,
}

#[derive(Args, Debug)]
struct LogArgs {
    /// Remove every entry from the log
    #[arg(long)]
    clear: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _otel = telemetry::init_tracing_subscriber(cli.global.log_file.as_deref())?;

    match cli.command {
        Some(Commands::Watch(args)) => {
            watch_command(&cli.global, args).await?;
        }
        Some(Commands::List(args)) => {
            list_command(&cli.global, args).await?;
        }
        Some(Commands::Log(args)) => {
            log_command(&cli.global, args).await?;
        }
        None => {
            // If no command is provided, show help
            let _ = Cli::parse_from(["urlspy", "--help"]);
        }
    }

    Ok(())
}

const HELP: &str = "\
Commands:
  add <url>                 start watching a page
  rm <url>                  stop watching a page
  kw <url> <keyword>        add a keyword to a page
  unkw <url> <keyword>      remove a keyword from a page
  refresh                   poll every page now
  list                      show watched pages
  log                       show reported matches
  quit                      save and exit";

/// A line typed at the `watch` prompt
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Add(String),
    Remove(String),
    Keyword(String, String),
    Unkeyword(String, String),
    Refresh,
    List,
    Log,
    Help,
    Quit,
}

fn parse_input(line: &str) -> Result<Option<Input>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (command, rest) = line
        .split_once(char::is_whitespace)
        .map(|(c, r)| (c, r.trim()))
        .unwrap_or((line, ""));

    let url_and_keyword = |usage: &str| {
        rest.split_once(char::is_whitespace)
            .map(|(url, keyword)| (url.to_string(), keyword.trim().to_string()))
            .ok_or_else(|| format!("usage: {}", usage))
    };

    let input = match command {
        "add" if !rest.is_empty() => Input::Add(rest.to_string()),
        "add" => return Err("usage: add <url>".to_string()),
        "rm" if !rest.is_empty() => Input::Remove(rest.to_string()),
        "rm" => return Err("usage: rm <url>".to_string()),
        "kw" => {
            let (url, keyword) = url_and_keyword("kw <url> <keyword>")?;
            Input::Keyword(url, keyword)
        }
        "unkw" => {
            let (url, keyword) = url_and_keyword("unkw <url> <keyword>")?;
            Input::Unkeyword(url, keyword)
        }
        "refresh" => Input::Refresh,
        "list" => Input::List,
        "log" => Input::Log,
        "help" | "?" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => return Err(format!("unknown command '{}', try 'help'", other)),
    };
    Ok(Some(input))
}

#[instrument(skip(global))]
async fn watch_command(global: &GlobalArgs, args: WatchArgs) -> anyhow::Result<()> {
    let fetcher = HttpFetcher::with_config(
        FetcherConfig::builder()
            .timeout(Duration::from_secs(global.timeout))
            .exclude_selectors(args.exclude)
            .build(),
    )?;
    let config = EngineConfig::builder()
        .poll_interval(Duration::from_secs(global.interval))
        .fetch_timeout(Duration::from_secs(global.timeout))
        .build();
    let store = FileStore::new(&global.save_file);

    let engine = Engine::start(fetcher, ConsoleNotifier::default(), store, config).await;
    print_status(&engine.status().await?);
    println!("Type 'help' for commands, 'quit' or Ctrl-C to exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => {
                    if !handle_input(&engine, &line).await? {
                        break;
                    }
                }
                // Keep watching until Ctrl-C
                None => stdin_open = false,
            },
        }
    }

    println!("Saving and shutting down...");
    engine.shutdown().await;
    Ok(())
}

/// Run one interactive command. Returns false when the user asked to quit.
async fn handle_input(engine: &Engine, line: &str) -> anyhow::Result<bool> {
    let input = match parse_input(line) {
        Ok(Some(input)) => input,
        Ok(None) => return Ok(true),
        Err(message) => {
            println!("{}", message);
            return Ok(true);
        }
    };

    match input {
        Input::Add(url) => match engine.add_url(&url).await {
            Ok(url) => println!("Watching {}", url),
            Err(e) => println!("{}", e),
        },
        Input::Remove(url) => {
            if engine.remove_url(&url).await {
                println!("Stopped watching {}", url);
            } else {
                println!("{} is not being watched", url);
            }
        }
        Input::Keyword(url, keyword) => match engine.add_keyword(&url, &keyword).await {
            Ok(()) => println!("Added \"{}\" to {}", keyword, url),
            Err(e) => println!("{}", e),
        },
        Input::Unkeyword(url, keyword) => {
            if engine.remove_keyword(&url, &keyword).await {
                println!("Removed \"{}\" from {}", keyword, url);
            } else {
                println!("\"{}\" is not a keyword for {}", keyword, url);
            }
        }
        Input::Refresh => {
            engine.refresh_all().await;
            println!("Refreshing all pages");
        }
        Input::List => print_status(&engine.status().await?),
        Input::Log => print_log(&engine.log().await?),
        Input::Help => println!("{}", HELP),
        Input::Quit => return Ok(false),
    }
    Ok(true)
}

fn print_status(status: &[TargetStatus]) {
    println!("Watched pages: {}", status.len());
    for target in status {
        let checked = target
            .last_checked
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{} [{}] (checked: {}, cycles: {})",
            target.url,
            target.keywords.join(", "),
            checked,
            target.cycles
        );
        if let Some(error) = &target.last_error {
            println!("  last error: {}", error);
        }
    }
}

fn print_log(log: &[LogEntry]) {
    println!("Matches: {}", log.len());
    for (index, entry) in log.iter().enumerate() {
        println!(
            "{:>4}  {}  \"{}\" on {}",
            index,
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.keyword,
            entry.url
        );
    }
}

#[instrument(skip(global))]
async fn list_command(global: &GlobalArgs, args: ListArgs) -> anyhow::Result<()> {
    let snapshot = FileStore::new(&global.save_file).load().await?;

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&snapshot.targets)?),
        "text" => {
            println!("Watched pages: {}", snapshot.targets.len());
            for target in &snapshot.targets {
                let keywords: Vec<&str> = target.keywords.iter().map(String::as_str).collect();
                println!("{} [{}]", target.url, keywords.join(", "));
            }
        }
        other => return Err(anyhow!("Unknown format '{}', expected text or json", other)),
    }

    Ok(())
}

#[instrument(skip(global))]
async fn log_command(global: &GlobalArgs, args: LogArgs) -> anyhow::Result<()> {
    let store = FileStore::new(&global.save_file);
    let mut snapshot = store.load().await?;

    if args.clear {
        let count = snapshot.log.len();
        snapshot.log.clear();
        store.save(&snapshot).await?;
        println!("Removed {} entries", count);
    } else {
        print_log(&snapshot.log);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("   "), Ok(None));
        assert_eq!(
            parse_input("add example.com"),
            Ok(Some(Input::Add("example.com".to_string())))
        );
        assert_eq!(
            parse_input("kw example.com  new release "),
            Ok(Some(Input::Keyword(
                "example.com".to_string(),
                "new release".to_string()
            )))
        );
        assert_eq!(
            parse_input("unkw example.com alpha"),
            Ok(Some(Input::Unkeyword(
                "example.com".to_string(),
                "alpha".to_string()
            )))
        );
        assert_eq!(parse_input("refresh"), Ok(Some(Input::Refresh)));
        assert_eq!(parse_input("quit"), Ok(Some(Input::Quit)));
    }

    #[test]
    fn test_parse_input_errors() {
        assert!(parse_input("add").is_err());
        assert!(parse_input("kw example.com").is_err());
        assert!(parse_input("frobnicate").is_err());
    }

    #[test]
    fn test_cli_parses_global_flags() {
        let cli = Cli::parse_from(["urlspy", "list", "--save-file", "s.txt", "--format", "json"]);
        assert_eq!(cli.global.save_file, PathBuf::from("s.txt"));
        assert_eq!(cli.global.interval, 30);
        assert!(matches!(cli.command, Some(Commands::List(ListArgs { format })) if format == "json"));
    }

    #[test]
    fn test_cli_rejects_zero_durations() {
        assert!(Cli::try_parse_from(["urlspy", "watch", "--interval", "0"]).is_err());
        assert!(Cli::try_parse_from(["urlspy", "watch", "--timeout", "0"]).is_err());
        let cli = Cli::try_parse_from(["urlspy", "watch", "--interval", "1"]).unwrap();
        assert_eq!(cli.global.interval, 1);
    }
}
