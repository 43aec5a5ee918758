//! # Save File Store
//!
//! Persists a [`Snapshot`] as a line-oriented UTF-8 text file:
//!
//! ```text
//! ---urlspy save file 2024-05-01T10:00:00+00:00---
//! <URLs + keywords>
//! http://example.com/|alpha,beta
//! http://empty.example/|
//! </URLs + keywords>
//! <Fingerprints>
//! 1a2b3c4d|alpha|http://example.com/
//! </Fingerprints>
//! <Logs>
//! ~2024-05-01T09:59:00+00:00|alpha|http://example.com/
//! </Logs>
//! ```
//!
//! Keywords never contain `,`, `|` or line breaks (the engine rejects them), so a
//! target line splits on its last `|` and the other sections split on their first
//! two. Writes go to a temporary file that is then renamed over the save file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{debug, instrument};

use crate::store::error::StorageError;
use crate::store::{LogEntry, PersistenceStore, SeenRecord, Snapshot, WatchTarget};

type Result<T> = std::result::Result<T, StorageError>;

const TARGETS_OPEN: &str = "<URLs + keywords>";
const TARGETS_CLOSE: &str = "</URLs + keywords>";
const SEEN_OPEN: &str = "<Fingerprints>";
const SEEN_CLOSE: &str = "</Fingerprints>";
const LOG_OPEN: &str = "<Logs>";
const LOG_CLOSE: &str = "</Logs>";

/// Default location of the save file, relative to the working directory
pub const DEFAULT_SAVE_PATH: &str = ".urlspy/urlspy.txt";

/// Store backed by a single save file
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new(DEFAULT_SAVE_PATH)
    }
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates necessary directories for storage
    async fn ensure_directories(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }
}

impl PersistenceStore for FileStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Snapshot> {
        if !fs::try_exists(&self.path).await? {
            debug!("No save file yet, starting empty");
            return Ok(Snapshot::default());
        }
        let content = fs::read_to_string(&self.path).await?;
        decode(&content)
    }

    #[instrument(skip(self, snapshot), fields(path = %self.path.display()))]
    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        self.ensure_directories().await?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, encode(snapshot, Utc::now())).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!(
            targets = snapshot.targets.len(),
            seen = snapshot.seen.len(),
            log = snapshot.log.len(),
            "Saved state"
        );
        Ok(())
    }
}

/// Render a snapshot in the save file layout
pub fn encode(snapshot: &Snapshot, saved_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str(&format!("---urlspy save file {}---\n", saved_at.to_rfc3339()));

    out.push_str(TARGETS_OPEN);
    out.push('\n');
    for target in &snapshot.targets {
        let keywords: Vec<&str> = target.keywords.iter().map(String::as_str).collect();
        out.push_str(&format!("{}|{}\n", target.url, keywords.join(",")));
    }
    out.push_str(TARGETS_CLOSE);
    out.push('\n');

    out.push_str(SEEN_OPEN);
    out.push('\n');
    for record in &snapshot.seen {
        out.push_str(&format!(
            "{}|{}|{}\n",
            record.fingerprint, record.keyword, record.url
        ));
    }
    out.push_str(SEEN_CLOSE);
    out.push('\n');

    out.push_str(LOG_OPEN);
    out.push('\n');
    for entry in &snapshot.log {
        out.push_str(&format!(
            "~{}|{}|{}\n",
            entry.timestamp.to_rfc3339(),
            entry.keyword,
            entry.url
        ));
    }
    out.push_str(LOG_CLOSE);
    out.push('\n');

    out
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Targets,
    Seen,
    Log,
}

/// Parse the save file layout back into a snapshot
pub fn decode(content: &str) -> Result<Snapshot> {
    let mut snapshot = Snapshot::default();
    let mut section = Section::None;

    for (index, line) in content.lines().enumerate() {
        let line_no = index + 1;
        match line {
            TARGETS_OPEN => section = Section::Targets,
            SEEN_OPEN => section = Section::Seen,
            LOG_OPEN => section = Section::Log,
            TARGETS_CLOSE | SEEN_CLOSE | LOG_CLOSE => section = Section::None,
            _ => match section {
                // Header and anything between sections
                Section::None => {}
                Section::Targets => snapshot.targets.push(parse_target(line_no, line)?),
                Section::Seen => snapshot.seen.push(parse_seen(line_no, line)?),
                Section::Log => snapshot.log.push(parse_log(line_no, line)?),
            },
        }
    }

    if section != Section::None {
        return Err(StorageError::corrupt(
            content.lines().count(),
            "unterminated section",
        ));
    }

    Ok(snapshot)
}

fn parse_target(line_no: usize, line: &str) -> Result<WatchTarget> {
    let (url, keywords) = line
        .rsplit_once('|')
        .ok_or_else(|| StorageError::corrupt(line_no, "missing '|' after URL"))?;
    if url.is_empty() {
        return Err(StorageError::corrupt(line_no, "empty URL"));
    }
    Ok(WatchTarget {
        url: url.to_string(),
        keywords: keywords
            .split(',')
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect(),
    })
}

fn parse_seen(line_no: usize, line: &str) -> Result<SeenRecord> {
    let mut parts = line.splitn(3, '|');
    let (Some(fingerprint), Some(keyword), Some(url)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(StorageError::corrupt(line_no, "expected fingerprint|keyword|url"));
    };
    let fingerprint = fingerprint
        .parse()
        .map_err(|e| StorageError::corrupt(line_no, format!("bad fingerprint: {}", e)))?;
    Ok(SeenRecord {
        url: url.to_string(),
        keyword: keyword.to_string(),
        fingerprint,
    })
}

fn parse_log(line_no: usize, line: &str) -> Result<LogEntry> {
    let rest = line
        .strip_prefix('~')
        .ok_or_else(|| StorageError::corrupt(line_no, "log entry must start with '~'"))?;
    let mut parts = rest.splitn(3, '|');
    let (Some(timestamp), Some(keyword), Some(url)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(StorageError::corrupt(line_no, "expected timestamp|keyword|url"));
    };
    let timestamp = DateTime::parse_from_rfc3339(timestamp)
        .map_err(|e| StorageError::corrupt(line_no, format!("bad timestamp: {}", e)))?
        .with_timezone(&Utc);
    Ok(LogEntry {
        timestamp,
        url: url.to_string(),
        keyword: keyword.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::Fingerprint;
    use chrono::TimeZone;

    fn sample() -> Snapshot {
        let mut multi = WatchTarget::new("http://example.com/news?a=1&b=2");
        multi.keywords.insert("alpha".to_string());
        multi.keywords.insert("beta gamma".to_string());
        multi.keywords.insert("ключ".to_string());

        Snapshot {
            targets: vec![WatchTarget::new("http://empty.example/"), multi],
            seen: vec![SeenRecord {
                url: "http://example.com/news?a=1&b=2".to_string(),
                keyword: "alpha".to_string(),
                fingerprint: Fingerprint::of_window("alpha and more"),
            }],
            log: vec![
                LogEntry {
                    timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 9, 59, 0).unwrap(),
                    url: "http://example.com/news?a=1&b=2".to_string(),
                    keyword: "alpha".to_string(),
                },
                LogEntry {
                    timestamp: Utc::now(),
                    url: "http://example.com/a|b".to_string(),
                    keyword: "beta gamma".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_round_trip() {
        let snapshot = sample();
        let decoded = decode(&encode(&snapshot, Utc::now())).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_round_trip_empty() {
        let decoded = decode(&encode(&Snapshot::default(), Utc::now())).unwrap();
        assert_eq!(decoded, Snapshot::default());
    }

    #[test]
    fn test_layout() {
        let mut target = WatchTarget::new("http://example.com/");
        target.keywords.insert("beta".to_string());
        target.keywords.insert("alpha".to_string());
        let snapshot = Snapshot {
            targets: vec![target],
            ..Default::default()
        };
        let text = encode(&snapshot, Utc::now());
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("---urlspy save file "));
        assert_eq!(lines[1], "<URLs + keywords>");
        assert_eq!(lines[2], "http://example.com/|alpha,beta");
        assert_eq!(lines[3], "</URLs + keywords>");
    }

    #[test]
    fn test_corrupt_lines_are_reported() {
        let content = "<URLs + keywords>\nno separator here\n</URLs + keywords>\n";
        match decode(content) {
            Err(StorageError::Corrupt { line, .. }) => assert_eq!(line, 2),
            other => panic!("Expected Corrupt error, got {:?}", other),
        }

        let content = "<Fingerprints>\nzzzz|alpha|http://a/\n</Fingerprints>\n";
        assert!(matches!(decode(content), Err(StorageError::Corrupt { line: 2, .. })));

        let content = "<Logs>\n~yesterday|alpha|http://a/\n</Logs>\n";
        assert!(matches!(decode(content), Err(StorageError::Corrupt { line: 2, .. })));

        let content = "<Logs>\n";
        assert!(matches!(decode(content), Err(StorageError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn test_file_store_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("save.txt"));

        assert_eq!(store.load().await.unwrap(), Snapshot::default());

        let snapshot = sample();
        store.save(&snapshot).await.unwrap();
        assert_eq!(store.load().await.unwrap(), snapshot);

        store.save(&Snapshot::default()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Snapshot::default());
    }

    #[test]
    fn test_default_path() {
        assert_eq!(FileStore::default().path(), Path::new(".urlspy/urlspy.txt"));
    }
}
