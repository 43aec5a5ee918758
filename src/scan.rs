//! # Keyword Scan Module
//!
//! Locates keyword occurrences in page text and derives the fingerprint used to
//! deduplicate them.
//!
//! A fingerprint covers a window of up to [`WINDOW_CHARS`] characters starting at
//! the first character of the occurrence. It is a heuristic, not an identity:
//! two occurrences whose text only differs beyond the window share a fingerprint,
//! and unrelated windows can in principle collide. Changing the window or the
//! hash changes which page updates get reported, so both are fixed.
//!
//! An occurrence within [`WINDOW_CHARS`] characters of the end of the text has a
//! window that runs to the end. Appending text to the page changes that window,
//! so the old occurrence gets a new fingerprint and is reported again.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Number of characters hashed into a fingerprint, starting at the match
pub const WINDOW_CHARS: usize = 100;

/// Deterministic hash of the text window around a keyword occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u32);

impl Fingerprint {
    /// Hash a window of text.
    ///
    /// Polynomial hash with multiplier 31 over the characters, wrapping on
    /// overflow. The value is stable across processes so it can be persisted.
    pub fn of_window(window: &str) -> Self {
        let hash = window
            .chars()
            .fold(0u32, |acc, c| acc.wrapping_mul(31).wrapping_add(c as u32));
        Fingerprint(hash)
    }

    /// Raw hash value
    pub fn value(self) -> u32 {
        self.0
    }
}

impl From<u32> for Fingerprint {
    fn from(value: u32) -> Self {
        Fingerprint(value)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u32::from_str_radix(s, 16).map(Fingerprint)
    }
}

/// A single keyword occurrence found by a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    /// Keyword that matched
    pub keyword: String,

    /// Byte offset of the match in the scanned text
    pub offset: usize,

    /// Fingerprint of the window starting at `offset`
    pub fingerprint: Fingerprint,
}

/// Text window hashed for an occurrence starting at byte `offset`
fn window_at(text: &str, offset: usize) -> &str {
    let tail = &text[offset..];
    match tail.char_indices().nth(WINDOW_CHARS) {
        Some((end, _)) => &tail[..end],
        None => tail,
    }
}

/// Scan lower-cased page text for every keyword.
///
/// Finds every non-overlapping occurrence of each keyword, left to right. This
/// is a substring search: a keyword also matches inside longer words. Empty
/// keywords never match.
///
/// # Arguments
///
/// * `text` - Page text, already lower-cased
/// * `keywords` - Keywords to look for, already lower-cased
///
/// # Returns
///
/// Occurrences grouped by keyword in keyword order, then by position
pub fn scan(text: &str, keywords: &BTreeSet<String>) -> Vec<Occurrence> {
    let mut found = Vec::new();
    for keyword in keywords.iter().filter(|k| !k.is_empty()) {
        for (offset, _) in text.match_indices(keyword.as_str()) {
            found.push(Occurrence {
                keyword: keyword.clone(),
                offset,
                fingerprint: Fingerprint::of_window(window_at(text, offset)),
            });
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = Fingerprint::of_window("alpha beta");
        let b = Fingerprint::of_window("alpha beta");
        assert_eq!(a, b);
        assert_ne!(a, Fingerprint::of_window("alpha gamma"));
        // 97 * 31 + 98
        assert_eq!(Fingerprint::of_window("ab").value(), 3105);
    }

    #[test]
    fn test_fingerprint_hex_round_trip() {
        let fp = Fingerprint::of_window("some window of text");
        let parsed: Fingerprint = fp.to_string().parse().unwrap();
        assert_eq!(parsed, fp);
        assert_eq!(Fingerprint::from(0xab).to_string(), "000000ab");
    }

    #[test]
    fn test_scan_finds_all_non_overlapping_occurrences() {
        let found = scan("aaaa", &keywords(&["aa"]));
        let offsets: Vec<usize> = found.iter().map(|o| o.offset).collect();
        assert_eq!(offsets, vec![0, 2]);
    }

    #[test]
    fn test_scan_matches_at_start_and_end() {
        let found = scan("alpha and alpha", &keywords(&["alpha"]));
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].offset, 0);
        assert_eq!(found[1].offset, 10);
        // The last window runs to the end of the text
        assert_eq!(found[1].fingerprint, Fingerprint::of_window("alpha"));
    }

    #[test]
    fn test_short_window_grows_with_appended_text() {
        let before = scan("zzz alpha beta", &keywords(&["alpha"]));
        let after = scan("zzz alpha beta, alpha again", &keywords(&["alpha"]));
        assert_eq!(before[0].offset, after[0].offset);
        assert_ne!(before[0].fingerprint, after[0].fingerprint);
    }

    #[test]
    fn test_scan_matches_inside_words() {
        let found = scan("the alphabet", &keywords(&["alpha"]));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].offset, 4);
    }

    #[test]
    fn test_window_is_bounded() {
        let text = format!("alpha{}", "x".repeat(500));
        let found = scan(&text, &keywords(&["alpha"]));
        assert_eq!(
            found[0].fingerprint,
            Fingerprint::of_window(&text[..WINDOW_CHARS])
        );
        // Text beyond the window does not change the fingerprint
        let longer = format!("alpha{}yyy", "x".repeat(500));
        assert_eq!(
            scan(&longer, &keywords(&["alpha"]))[0].fingerprint,
            found[0].fingerprint
        );
    }

    #[test]
    fn test_window_counts_characters_not_bytes() {
        let text = format!("ключ{}", "ж".repeat(200));
        let found = scan(&text, &keywords(&["ключ"]));
        assert_eq!(found.len(), 1);
        let expected: String = text.chars().take(WINDOW_CHARS).collect();
        assert_eq!(found[0].fingerprint, Fingerprint::of_window(&expected));
    }

    #[test]
    fn test_scan_edge_cases() {
        assert!(scan("anything at all", &BTreeSet::new()).is_empty());
        assert!(scan("ab", &keywords(&["abc"])).is_empty());
        assert!(scan("", &keywords(&["a"])).is_empty());
        assert!(scan("text", &keywords(&[""])).is_empty());
    }

    #[test]
    fn test_scan_orders_by_keyword_then_position() {
        let found = scan("beta alpha beta alpha", &keywords(&["beta", "alpha"]));
        let summary: Vec<(&str, usize)> = found
            .iter()
            .map(|o| (o.keyword.as_str(), o.offset))
            .collect();
        assert_eq!(
            summary,
            vec![("alpha", 5), ("alpha", 16), ("beta", 0), ("beta", 11)]
        );
    }
}
