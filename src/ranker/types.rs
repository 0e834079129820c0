//! Core types for pairwise ranking sessions.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Sides and pairs
// =============================================================================

/// One slot of the active pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }

    /// Parse a loose side token ("l", "left", "1", "r", "right", "2").
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "l" | "left" | "1" => Some(Side::Left),
            "r" | "right" | "2" => Some(Side::Right),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two candidates currently being compared. `left != right` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePair {
    pub left: String,
    pub right: String,
}

impl ActivePair {
    pub fn get(&self, side: Side) -> &str {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.left == id || self.right == id
    }
}

// =============================================================================
// Ranking snapshot
// =============================================================================

/// One row of a ranking snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingEntry {
    /// 1-based position in the sorted order.
    pub rank: usize,
    pub id: String,
    pub votes: u32,
}

impl RankingEntry {
    pub fn new(rank: usize, id: impl Into<String>, votes: u32) -> Self {
        Self {
            rank,
            id: id.into(),
            votes,
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RankerError {
    /// Fewer than two unique candidates; a pair cannot be formed.
    #[error("insufficient candidates: found {found}, need at least 2")]
    InsufficientCandidates { found: usize },
    /// Only the kept candidate remains, so no challenger can be drawn.
    #[error("no alternative candidate to draw against the kept image")]
    NoAlternativeCandidate,
    #[error("no active pair; start a round first")]
    NoActivePair,
    #[error("unknown candidate: {0}")]
    UnknownCandidate(String),
}
