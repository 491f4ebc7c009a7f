//! Character-offset substring matching over flat pairs.
//!
//! Offsets count Unicode scalar values, so `"é"` advances by one. Matching is
//! case-sensitive and finds non-overlapping occurrences scanning left to right.

use crate::models::{FlatPair, MatchIn, MatchedKey, MergedMatch};

/// Every non-overlapping occurrence of `needle` in `haystack`, as
/// `(start, end)` character offsets with `end` exclusive.
///
/// An empty needle matches nothing.
pub fn find_occurrences(haystack: &str, needle: &str) -> Vec<(usize, usize)> {
    if needle.is_empty() {
        return Vec::new();
    }
    let needle_chars = needle.chars().count();
    let mut out = Vec::new();
    let mut byte_pos = 0;
    let mut char_pos = 0;
    for (byte_idx, _) in haystack.match_indices(needle) {
        char_pos += haystack[byte_pos..byte_idx].chars().count();
        out.push((char_pos, char_pos + needle_chars));
        char_pos += needle_chars;
        byte_pos = byte_idx + needle.len();
    }
    out
}

/// Scan a document's pairs in order, paths before values within a pair.
pub fn match_pairs(
    flat: &[FlatPair],
    query: &str,
    in_paths: bool,
    in_values: bool,
) -> Vec<MatchedKey> {
    let mut matches = Vec::new();
    for pair in flat {
        let sides = [
            (in_paths, MatchIn::Key, pair.path.as_str()),
            (in_values, MatchIn::Value, pair.value.as_str()),
        ];
        for (enabled, match_in, text) in sides {
            if !enabled {
                continue;
            }
            for (start, end) in find_occurrences(text, query) {
                matches.push(MatchedKey {
                    key: pair.path.clone(),
                    value: pair.value.clone(),
                    match_in,
                    start_index: start,
                    end_index: end,
                });
            }
        }
    }
    matches
}

/// Group occurrences by `(key, match_in)`, keeping first-seen group order and
/// sorting positions within each group.
pub fn merge_matches(matches: Vec<MatchedKey>) -> Vec<MergedMatch> {
    let mut merged: Vec<MergedMatch> = Vec::new();
    for m in matches {
        match merged
            .iter_mut()
            .find(|g| g.key == m.key && g.match_in == m.match_in)
        {
            Some(group) => group.positions.push((m.start_index, m.end_index)),
            None => merged.push(MergedMatch {
                key: m.key,
                value: m.value,
                match_in: m.match_in,
                positions: vec![(m.start_index, m.end_index)],
            }),
        }
    }
    for group in &mut merged {
        group.positions.sort_unstable();
    }
    merged
}
