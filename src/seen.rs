//! Deduplication registry for reported occurrences

use std::collections::HashSet;

use crate::scan::Fingerprint;

/// Key of the seen set: a fingerprint scoped to the URL it was found on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeenKey {
    pub url: String,
    pub fingerprint: Fingerprint,
}

impl SeenKey {
    pub fn new(url: impl Into<String>, fingerprint: Fingerprint) -> Self {
        Self {
            url: url.into(),
            fingerprint,
        }
    }
}

/// A fingerprint a target's worker added to the seen set, and the keyword that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
    pub fingerprint: Fingerprint,
    pub keyword: String,
}

/// Set of occurrences that were already recorded.
///
/// Once a key is present it is never reported as new again until it is
/// removed through [`SeenSet::remove_all`].
#[derive(Debug, Default, Clone)]
pub struct SeenSet {
    keys: HashSet<SeenKey>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key, returning whether it was not present before
    pub fn add(&mut self, key: SeenKey) -> bool {
        self.keys.insert(key)
    }

    pub fn contains(&self, key: &SeenKey) -> bool {
        self.keys.contains(key)
    }

    /// Remove every key matching `predicate`, returning how many were removed
    pub fn remove_all<P>(&mut self, mut predicate: P) -> usize
    where
        P: FnMut(&SeenKey) -> bool,
    {
        let before = self.keys.len();
        self.keys.retain(|key| !predicate(key));
        before - self.keys.len()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_reports_novelty_once() {
        let mut seen = SeenSet::new();
        let key = SeenKey::new("http://example.com/", Fingerprint::from(7));
        assert!(seen.add(key.clone()));
        for _ in 0..5 {
            assert!(!seen.add(key.clone()));
        }
        assert!(seen.contains(&key));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_keys_are_scoped_by_url() {
        let mut seen = SeenSet::new();
        assert!(seen.add(SeenKey::new("http://a.com/", Fingerprint::from(1))));
        assert!(seen.add(SeenKey::new("http://b.com/", Fingerprint::from(1))));
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_remove_all() {
        let mut seen = SeenSet::new();
        for fp in 0..4 {
            seen.add(SeenKey::new("http://a.com/", Fingerprint::from(fp)));
        }
        seen.add(SeenKey::new("http://b.com/", Fingerprint::from(0)));

        let removed = seen.remove_all(|key| key.url == "http://a.com/");
        assert_eq!(removed, 4);
        assert_eq!(seen.len(), 1);
        assert!(seen.contains(&SeenKey::new("http://b.com/", Fingerprint::from(0))));
        assert_eq!(seen.remove_all(|_| false), 0);
    }
}
