//! State owned by the supervisor task.
//!
//! Everything here is plain synchronous data. The supervisor is its only
//! owner, so each operation is applied atomically with respect to every other
//! command and worker report.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::engine::error::EngineError;
use crate::engine::events::{KeywordSet, ScanReport, TargetStatus};
use crate::scan::Fingerprint;
use crate::seen::{Contribution, SeenKey, SeenSet};
use crate::store::{LogEntry, SeenRecord, Snapshot, WatchTarget};

/// Characters a keyword cannot contain because the save file uses them
const RESERVED_KEYWORD_CHARS: [char; 4] = [',', '|', '\n', '\r'];

/// Trim and lower-case a keyword, rejecting ones that cannot be stored
pub fn normalize_keyword(input: &str) -> Result<String, EngineError> {
    let keyword = input.trim().to_lowercase();
    if keyword.is_empty() {
        return Err(EngineError::InvalidKeyword("keyword is empty".to_string()));
    }
    if keyword.contains(RESERVED_KEYWORD_CHARS) {
        return Err(EngineError::InvalidKeyword(format!(
            "\"{}\" contains one of , | or a line break",
            keyword
        )));
    }
    Ok(keyword)
}

#[derive(Debug, Default)]
struct TargetState {
    keywords: BTreeSet<String>,
    epoch: u64,
    /// Fingerprints this target added to the seen set
    contributions: Vec<Contribution>,
    cycles: u64,
    last_checked: Option<DateTime<Utc>>,
    last_error: Option<String>,
    baseline_pending: bool,
}

impl TargetState {
    fn keyword_set(&self) -> KeywordSet {
        KeywordSet {
            epoch: self.epoch,
            words: self.keywords.clone(),
        }
    }

    fn bump_epoch(&mut self) -> KeywordSet {
        self.epoch += 1;
        self.baseline_pending = true;
        self.keyword_set()
    }
}

/// Outcome of applying a scan report
#[derive(Debug, Default)]
pub(crate) struct ScanOutcome {
    /// Fingerprints newly added to the seen set
    pub recorded: usize,

    /// Matches to notify, already appended to the log
    pub matches: Vec<LogEntry>,
}

/// Configuration, seen set and match log of a running engine
#[derive(Debug, Default)]
pub(crate) struct EngineState {
    targets: BTreeMap<String, TargetState>,
    seen: SeenSet,
    log: Vec<LogEntry>,
}

impl EngineState {
    /// Rebuild state from persisted data.
    ///
    /// Seen records for URLs or keywords that are no longer configured are
    /// dropped, since nothing could ever purge them.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut state = EngineState::default();

        for target in snapshot.targets {
            let entry = state.targets.entry(target.url).or_default();
            entry.keywords.extend(target.keywords);
            entry.baseline_pending = true;
        }

        for record in snapshot.seen {
            let Some(target) = state.targets.get_mut(&record.url) else {
                continue;
            };
            if !target.keywords.contains(&record.keyword) {
                continue;
            }
            if state
                .seen
                .add(SeenKey::new(record.url.clone(), record.fingerprint))
            {
                target.contributions.push(Contribution {
                    fingerprint: record.fingerprint,
                    keyword: record.keyword,
                });
            }
        }

        state.log = snapshot.log;
        state
    }

    /// Everything that gets persisted, targets in URL order
    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot {
            log: self.log.clone(),
            ..Default::default()
        };
        for (url, target) in &self.targets {
            snapshot.targets.push(WatchTarget {
                url: url.clone(),
                keywords: target.keywords.clone(),
            });
            snapshot
                .seen
                .extend(target.contributions.iter().map(|c| SeenRecord {
                    url: url.clone(),
                    keyword: c.keyword.clone(),
                    fingerprint: c.fingerprint,
                }));
        }
        snapshot
    }

    pub fn urls(&self) -> impl Iterator<Item = &String> {
        self.targets.keys()
    }

    pub fn keyword_set(&self, url: &str) -> Option<KeywordSet> {
        self.targets.get(url).map(TargetState::keyword_set)
    }

    pub fn targets(&self) -> Vec<WatchTarget> {
        self.targets
            .iter()
            .map(|(url, target)| WatchTarget {
                url: url.clone(),
                keywords: target.keywords.clone(),
            })
            .collect()
    }

    pub fn status(&self) -> Vec<TargetStatus> {
        self.targets
            .iter()
            .map(|(url, target)| TargetStatus {
                url: url.clone(),
                keywords: target.keywords.iter().cloned().collect(),
                cycles: target.cycles,
                last_checked: target.last_checked,
                last_error: target.last_error.clone(),
                baseline_pending: target.baseline_pending,
                seen: target.contributions.len(),
            })
            .collect()
    }

    /// Insert an empty target
    pub fn add_target(&mut self, url: &str) -> Result<(), EngineError> {
        if self.targets.contains_key(url) {
            return Err(EngineError::AlreadyWatched(url.to_string()));
        }
        self.targets.insert(
            url.to_string(),
            TargetState {
                baseline_pending: true,
                ..Default::default()
            },
        );
        Ok(())
    }

    /// Remove a target and purge everything it contributed to the seen set
    pub fn remove_target(&mut self, url: &str) -> bool {
        let Some(target) = self.targets.remove(url) else {
            return false;
        };
        let purged = self.purge(url, &target.contributions);
        debug!(%url, purged, "Removed target");
        true
    }

    /// Add a keyword and return the keyword set the worker should see
    pub fn add_keyword(&mut self, url: &str, keyword: &str) -> Result<KeywordSet, EngineError> {
        let target = self
            .targets
            .get_mut(url)
            .ok_or_else(|| EngineError::UnknownUrl(url.to_string()))?;
        if !target.keywords.insert(keyword.to_string()) {
            return Err(EngineError::DuplicateKeyword {
                url: url.to_string(),
                keyword: keyword.to_string(),
            });
        }
        Ok(target.bump_epoch())
    }

    /// Remove a keyword, purging the fingerprints it produced on this URL.
    ///
    /// Returns the new keyword set, or `None` if nothing was removed.
    pub fn remove_keyword(&mut self, url: &str, keyword: &str) -> Option<KeywordSet> {
        let target = self.targets.get_mut(url)?;
        if !target.keywords.remove(keyword) {
            return None;
        }
        let (purged, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut target.contributions)
            .into_iter()
            .partition(|c| c.keyword == keyword);
        target.contributions = kept;
        let set = target.bump_epoch();

        let count = self.purge(url, &purged);
        debug!(%url, %keyword, purged = count, "Removed keyword");
        Some(set)
    }

    fn purge(&mut self, url: &str, contributions: &[Contribution]) -> usize {
        let fingerprints: HashSet<Fingerprint> =
            contributions.iter().map(|c| c.fingerprint).collect();
        self.seen
            .remove_all(|key| key.url == url && fingerprints.contains(&key.fingerprint))
    }

    /// Reconcile a worker's scan with the seen set.
    ///
    /// Occurrences of keywords the target no longer has are ignored. A
    /// non-baseline report made against an outdated keyword set is treated as
    /// a baseline: its new fingerprints are recorded but not notified.
    pub fn apply_scan(&mut self, url: &str, report: ScanReport, at: DateTime<Utc>) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();
        let Some(target) = self.targets.get_mut(url) else {
            return outcome;
        };

        target.cycles += 1;
        target.last_checked = Some(at);
        target.last_error = None;

        let current = report.epoch == target.epoch;
        if report.baseline && current {
            target.baseline_pending = false;
        }
        let notify = !report.baseline && current;

        for occurrence in report.occurrences {
            if !target.keywords.contains(&occurrence.keyword) {
                continue;
            }
            if !self.seen.add(SeenKey::new(url, occurrence.fingerprint)) {
                continue;
            }
            outcome.recorded += 1;
            if notify {
                let entry = LogEntry {
                    timestamp: at,
                    url: url.to_string(),
                    keyword: occurrence.keyword.clone(),
                };
                self.log.push(entry.clone());
                outcome.matches.push(entry);
            }
            target.contributions.push(Contribution {
                fingerprint: occurrence.fingerprint,
                keyword: occurrence.keyword,
            });
        }

        outcome
    }

    /// Record a failed cycle
    pub fn record_failure(&mut self, url: &str, error: &str, at: DateTime<Utc>) {
        if let Some(target) = self.targets.get_mut(url) {
            target.cycles += 1;
            target.last_checked = Some(at);
            target.last_error = Some(error.to_string());
        }
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn remove_log_entry(&mut self, index: usize) -> bool {
        if index < self.log.len() {
            self.log.remove(index);
            true
        } else {
            false
        }
    }

    pub fn clear_log(&mut self) -> bool {
        let had_entries = !self.log.is_empty();
        self.log.clear();
        had_entries
    }

    #[cfg(test)]
    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::scan;

    const URL: &str = "http://example.com/";

    fn state_with(url: &str, keywords: &[&str]) -> EngineState {
        let mut state = EngineState::default();
        state.add_target(url).unwrap();
        for keyword in keywords {
            state.add_keyword(url, keyword).unwrap();
        }
        state
    }

    /// Scan `text` like a worker would and apply the report
    fn cycle(state: &mut EngineState, url: &str, text: &str, baseline: bool) -> ScanOutcome {
        let set = state.keyword_set(url).unwrap();
        let report = ScanReport {
            baseline,
            epoch: set.epoch,
            occurrences: scan(text, &set.words),
        };
        state.apply_scan(url, report, Utc::now())
    }

    #[test]
    fn test_normalize_keyword() {
        assert_eq!(normalize_keyword("  Alpha ").unwrap(), "alpha");
        assert_eq!(normalize_keyword("Two Words").unwrap(), "two words");
        assert!(normalize_keyword("   ").is_err());
        assert!(normalize_keyword("a,b").is_err());
        assert!(normalize_keyword("a|b").is_err());
        assert!(normalize_keyword("a\nb").is_err());
    }

    #[test]
    fn test_no_duplicate_notification_across_cycles() {
        let mut state = state_with(URL, &["alpha"]);
        let text = "news: alpha released";

        let first = cycle(&mut state, URL, text, false);
        assert_eq!(first.matches.len(), 1);
        for _ in 0..10 {
            let again = cycle(&mut state, URL, text, false);
            assert!(again.matches.is_empty());
            assert_eq!(again.recorded, 0);
        }
        assert_eq!(state.log().len(), 1);
    }

    #[test]
    fn test_baseline_records_without_notifying() {
        let mut state = state_with(URL, &["alpha"]);
        let text = "alpha was already here";

        let baseline = cycle(&mut state, URL, text, true);
        assert!(baseline.matches.is_empty());
        assert_eq!(baseline.recorded, 1);

        let poll = cycle(&mut state, URL, text, false);
        assert!(poll.matches.is_empty());
        assert!(state.log().is_empty());
    }

    #[test]
    fn test_remove_and_readd_keyword() {
        let mut state = state_with(URL, &["alpha", "beta"]);
        let text = format!("alpha {} beta {}", "x".repeat(120), "y".repeat(120));
        cycle(&mut state, URL, &text, true);
        assert_eq!(state.seen_len(), 2);

        state.remove_keyword(URL, "alpha").unwrap();
        // Only the removed keyword's fingerprints are purged
        assert_eq!(state.seen_len(), 1);

        state.add_keyword(URL, "alpha").unwrap();
        let rebaseline = cycle(&mut state, URL, &text, true);
        assert!(rebaseline.matches.is_empty());
        assert_eq!(rebaseline.recorded, 1);

        let changed = format!("{} alpha again", text);
        let poll = cycle(&mut state, URL, &changed, false);
        assert_eq!(poll.matches.len(), 1);
        assert_eq!(poll.matches[0].keyword, "alpha");
    }

    #[test]
    fn test_appended_text_renews_short_windows() {
        let mut state = state_with(URL, &["alpha"]);
        cycle(&mut state, URL, "zzz alpha beta", true);

        // The old occurrence's window runs to the end of the text, so it grows too
        let poll = cycle(&mut state, URL, "zzz alpha beta, alpha again", false);
        assert_eq!(poll.matches.len(), 2);
        assert_eq!(state.seen_len(), 3);

        // Once the text is stable nothing is reported
        let again = cycle(&mut state, URL, "zzz alpha beta, alpha again", false);
        assert!(again.matches.is_empty());
    }

    #[test]
    fn test_isolation_across_urls() {
        let other = "http://other.example/";
        let mut state = state_with(URL, &["alpha"]);
        state.add_target(other).unwrap();
        state.add_keyword(other, "alpha").unwrap();

        let text = "identical alpha window";
        let a = cycle(&mut state, URL, text, false);
        let b = cycle(&mut state, other, text, false);
        assert_eq!(a.matches.len(), 1);
        assert_eq!(b.matches.len(), 1);
        assert_eq!(b.matches[0].url, other);

        state.remove_target(URL);
        // The other target keeps its fingerprints
        assert!(cycle(&mut state, other, text, false).matches.is_empty());
        assert_eq!(state.seen_len(), 1);
    }

    #[test]
    fn test_remove_target_purges_contributions() {
        let mut state = state_with(URL, &["alpha"]);
        cycle(&mut state, URL, "alpha", true);
        assert_eq!(state.seen_len(), 1);

        assert!(state.remove_target(URL));
        assert_eq!(state.seen_len(), 0);
        assert!(!state.remove_target(URL));
        assert!(state.snapshot().seen.is_empty());
    }

    #[test]
    fn test_stale_reports_are_downgraded() {
        let mut state = state_with(URL, &["alpha"]);
        let stale_epoch = state.keyword_set(URL).unwrap().epoch;
        state.add_keyword(URL, "beta").unwrap();

        // Scanned against the old keyword set, arriving after the change
        let report = ScanReport {
            baseline: false,
            epoch: stale_epoch,
            occurrences: scan("alpha beta", &state.keyword_set(URL).unwrap().words),
        };
        let outcome = state.apply_scan(URL, report, Utc::now());
        assert!(outcome.matches.is_empty());
        assert_eq!(outcome.recorded, 2);
        assert!(state.status()[0].baseline_pending);
    }

    #[test]
    fn test_occurrences_of_removed_keywords_are_ignored() {
        let mut state = state_with(URL, &["alpha"]);
        let set = state.keyword_set(URL).unwrap();
        state.remove_keyword(URL, "alpha").unwrap();

        let report = ScanReport {
            baseline: false,
            epoch: set.epoch,
            occurrences: scan("alpha", &set.words),
        };
        let outcome = state.apply_scan(URL, report, Utc::now());
        assert_eq!(outcome.recorded, 0);
        assert_eq!(state.seen_len(), 0);
    }

    #[test]
    fn test_keyword_mutations() {
        let mut state = state_with(URL, &["alpha"]);
        assert_eq!(
            state.add_keyword(URL, "alpha"),
            Err(EngineError::DuplicateKeyword {
                url: URL.to_string(),
                keyword: "alpha".to_string()
            })
        );
        assert!(matches!(
            state.add_keyword("http://nowhere/", "alpha"),
            Err(EngineError::UnknownUrl(_))
        ));
        assert!(state.remove_keyword(URL, "missing").is_none());
        assert!(state.remove_keyword("http://nowhere/", "alpha").is_none());

        let before = state.keyword_set(URL).unwrap().epoch;
        let after = state.add_keyword(URL, "beta").unwrap();
        assert_eq!(after.epoch, before + 1);
        assert_eq!(after.words.len(), 2);
        assert!(matches!(state.add_target(URL), Err(EngineError::AlreadyWatched(_))));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut state = state_with(URL, &["alpha", "beta"]);
        state.add_target("http://empty.example/").unwrap();
        let page = format!("alpha {} beta {}", "x".repeat(120), "y".repeat(120));
        cycle(&mut state, URL, &page, true);
        cycle(&mut state, URL, &format!("{} and alpha", page), false);

        let snapshot = state.snapshot();
        assert_eq!(snapshot.targets.len(), 2);
        assert_eq!(snapshot.seen.len(), 3);
        assert_eq!(snapshot.log.len(), 1);

        let restored = EngineState::from_snapshot(snapshot.clone());
        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(restored.seen_len(), 3);
    }

    #[test]
    fn test_from_snapshot_drops_orphan_records() {
        let snapshot = Snapshot {
            targets: vec![WatchTarget::new(URL)],
            seen: vec![
                SeenRecord {
                    url: URL.to_string(),
                    keyword: "gone".to_string(),
                    fingerprint: Fingerprint::from(1),
                },
                SeenRecord {
                    url: "http://removed.example/".to_string(),
                    keyword: "alpha".to_string(),
                    fingerprint: Fingerprint::from(2),
                },
            ],
            log: Vec::new(),
        };
        let state = EngineState::from_snapshot(snapshot);
        assert_eq!(state.seen_len(), 0);
    }

    #[test]
    fn test_log_management() {
        let mut state = state_with(URL, &["alpha"]);
        cycle(&mut state, URL, "alpha", false);
        cycle(&mut state, URL, &format!("alpha {} alpha", "y".repeat(150)), false);
        assert_eq!(state.log().len(), 2);

        assert!(state.remove_log_entry(0));
        assert!(!state.remove_log_entry(5));
        assert_eq!(state.log().len(), 1);
        assert!(state.clear_log());
        assert!(!state.clear_log());
    }

    #[test]
    fn test_status_tracks_cycles_and_errors() {
        let mut state = state_with(URL, &["alpha"]);
        assert!(state.status()[0].baseline_pending);

        state.record_failure(URL, "timed out", Utc::now());
        let status = &state.status()[0];
        assert_eq!(status.cycles, 1);
        assert_eq!(status.last_error.as_deref(), Some("timed out"));

        cycle(&mut state, URL, "alpha", true);
        let status = &state.status()[0];
        assert_eq!(status.cycles, 2);
        assert!(status.last_error.is_none());
        assert!(!status.baseline_pending);
        assert_eq!(status.seen, 1);
    }
}
