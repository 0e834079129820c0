//! Pairwise win-count ranking.
//!
//! Holds a session's candidate set, score table and active pair. Two images are
//! shown, the user picks one, the pick gains a vote and the loser's slot is
//! refilled with a fresh challenger:
//! - Candidates are drawn uniformly, never weighted by score
//! - Votes only ever increase
//! - Rankings sort by votes descending, then identifier ascending

pub mod pairwise;
pub mod types;

pub use pairwise::PairwiseRanker;
pub use types::*;
