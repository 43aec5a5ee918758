//! Messages exchanged between the supervisor and its workers.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::scan::Occurrence;

/// Identifies one spawned worker. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(pub(crate) u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Out-of-band signal sent to a worker.
///
/// When several are pending they collapse to the strongest one:
/// `Stop` over `ReScan` over `Wake`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Control {
    /// End the current sleep and poll now
    Wake,
    /// Keywords changed, baseline before the next poll
    ReScan,
    /// Exit; the worker is never restarted
    Stop,
}

impl Control {
    /// Collapse two pending signals into one
    pub fn merge(self, other: Control) -> Control {
        self.max(other)
    }
}

/// A worker's live view of its target's keywords
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordSet {
    /// Bumped on every keyword change of the target
    pub epoch: u64,
    pub words: BTreeSet<String>,
}

/// Result of one successful scan
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Record the occurrences without notifying
    pub baseline: bool,

    /// Epoch of the keyword set the scan ran against
    pub epoch: u64,

    pub occurrences: Vec<Occurrence>,
}

/// Reports sent from workers to the supervisor
#[derive(Debug)]
pub(crate) enum WorkerEvent {
    Scanned {
        worker: WorkerId,
        url: String,
        report: ScanReport,
        at: DateTime<Utc>,
    },
    FetchFailed {
        worker: WorkerId,
        url: String,
        error: String,
        at: DateTime<Utc>,
    },
    Stopped {
        worker: WorkerId,
        url: String,
    },
}

/// What the engine knows about a watched target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetStatus {
    pub url: String,
    pub keywords: Vec<String>,

    /// Completed poll cycles, failed fetches included
    pub cycles: u64,

    pub last_checked: Option<DateTime<Utc>>,

    /// Error of the last cycle, cleared by the next successful one
    pub last_error: Option<String>,

    /// A keyword change has not been baselined yet
    pub baseline_pending: bool,

    /// Fingerprints recorded for this target
    pub seen: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_merge_priority() {
        assert_eq!(Control::Wake.merge(Control::ReScan), Control::ReScan);
        assert_eq!(Control::ReScan.merge(Control::Wake), Control::ReScan);
        assert_eq!(Control::Stop.merge(Control::ReScan), Control::Stop);
        assert_eq!(Control::Wake.merge(Control::Wake), Control::Wake);
        assert_eq!(Control::Wake.merge(Control::Stop), Control::Stop);
    }
}
