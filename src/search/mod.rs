//! Substring search over flattened documents.
//!
//! Candidates come from the search engine; occurrences, character offsets and
//! pagination are computed here so every engine yields identical results.

mod matcher;
pub mod occurrences;

pub use matcher::{PageLimits, SearchMatcher};
pub use occurrences::{find_occurrences, match_pairs, merge_matches};
