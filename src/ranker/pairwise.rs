//! The pairwise ranking session object.

use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::types::{ActivePair, RankerError, RankingEntry, Side};

/// Owns one ranking session: candidates, votes, the active pair and the random
/// source used to draw pairs.
///
/// All mutation goes through `&mut self`; callers that share a ranker across
/// threads wrap it in their own lock.
#[derive(Debug)]
pub struct PairwiseRanker<R: Rng = StdRng> {
    candidates: Vec<String>,
    scores: HashMap<String, u32>,
    active: Option<ActivePair>,
    rounds: usize,
    rng: R,
}

impl PairwiseRanker<StdRng> {
    /// Create a session seeded from OS entropy.
    pub fn new<I, S>(candidate_ids: I) -> Result<Self, RankerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_rng(candidate_ids, StdRng::from_entropy())
    }

    /// Create a session with a reproducible pair sequence.
    pub fn seeded<I, S>(candidate_ids: I, seed: u64) -> Result<Self, RankerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_rng(candidate_ids, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> PairwiseRanker<R> {
    /// Create a session over `candidate_ids` drawing pairs from `rng`.
    ///
    /// Duplicate identifiers are collapsed (first occurrence wins the position).
    /// Every candidate starts at zero votes and no pair is active yet.
    pub fn with_rng<I, S>(candidate_ids: I, rng: R) -> Result<Self, RankerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let candidates = dedup_ids(candidate_ids)?;
        let scores = zero_scores(&candidates);
        debug!(candidates = candidates.len(), "ranker initialized");

        Ok(Self {
            candidates,
            scores,
            active: None,
            rounds: 0,
            rng,
        })
    }

    /// Replace the candidate set, e.g. after re-running discovery.
    ///
    /// Votes and the active pair are reset. On error the session is untouched.
    pub fn reload<I, S>(&mut self, candidate_ids: I) -> Result<(), RankerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let candidates = dedup_ids(candidate_ids)?;
        self.scores = zero_scores(&candidates);
        self.candidates = candidates;
        self.active = None;
        self.rounds = 0;
        debug!(candidates = self.candidates.len(), "ranker reloaded");
        Ok(())
    }

    // =========================================================================
    // Rounds
    // =========================================================================

    /// Draw a fresh pair uniformly from the whole candidate set.
    pub fn start_round(&mut self) -> Result<ActivePair, RankerError> {
        let n = self.candidates.len();
        if n < 2 {
            return Err(RankerError::InsufficientCandidates { found: n });
        }

        // Second index is drawn from the n-1 remaining slots.
        let i = self.rng.gen_range(0..n);
        let mut j = self.rng.gen_range(0..n - 1);
        if j >= i {
            j += 1;
        }

        let pair = ActivePair {
            left: self.candidates[i].clone(),
            right: self.candidates[j].clone(),
        };
        self.set_active(pair.clone());
        Ok(pair)
    }

    /// Add one vote to the candidate on `side`. Does not advance the round.
    ///
    /// Returns the winner's new vote count.
    pub fn record_choice(&mut self, side: Side) -> Result<u32, RankerError> {
        let pair = self.active.as_ref().ok_or(RankerError::NoActivePair)?;
        let winner = pair.get(side);
        let votes = self
            .scores
            .get_mut(winner)
            .ok_or_else(|| RankerError::UnknownCandidate(winner.to_string()))?;
        *votes += 1;
        debug!(winner = %winner, %side, votes = *votes, "vote recorded");
        Ok(*votes)
    }

    /// Keep the candidate on `keep` and replace the other slot with a random
    /// candidate other than the kept one. The replaced image may be drawn again.
    pub fn advance(&mut self, keep: Side) -> Result<ActivePair, RankerError> {
        if self.candidates.len() < 2 {
            return Err(RankerError::NoAlternativeCandidate);
        }
        let pair = self.active.as_ref().ok_or(RankerError::NoActivePair)?;
        let kept = pair.get(keep).to_string();
        self.challenge(&kept, keep)
    }

    /// Put `kept` on side `keep` against a challenger drawn from the others.
    ///
    /// Used to keep a winner on screen after its previous challenger was
    /// removed and the active pair cleared.
    pub fn challenge(&mut self, kept: &str, keep: Side) -> Result<ActivePair, RankerError> {
        if !self.scores.contains_key(kept) {
            return Err(RankerError::UnknownCandidate(kept.to_string()));
        }
        let challenger = self
            .draw_excluding(kept)
            .ok_or(RankerError::NoAlternativeCandidate)?;
        let kept = kept.to_string();

        let next = match keep {
            Side::Left => ActivePair {
                left: kept,
                right: challenger,
            },
            Side::Right => ActivePair {
                left: challenger,
                right: kept,
            },
        };
        self.set_active(next.clone());
        Ok(next)
    }

    /// Record a vote for `side`, then keep the winner and draw a new challenger.
    ///
    /// If the advance fails the vote still stands.
    pub fn vote(&mut self, side: Side) -> Result<ActivePair, RankerError> {
        self.record_choice(side)?;
        self.advance(side)
    }

    fn draw_excluding(&mut self, excluded: &str) -> Option<String> {
        let eligible: Vec<&String> = self
            .candidates
            .iter()
            .filter(|c| c.as_str() != excluded)
            .collect();
        if eligible.is_empty() {
            return None;
        }
        let idx = self.rng.gen_range(0..eligible.len());
        Some(eligible[idx].clone())
    }

    fn set_active(&mut self, pair: ActivePair) {
        debug_assert_ne!(pair.left, pair.right);
        self.active = Some(pair);
        self.rounds += 1;
    }

    // =========================================================================
    // Candidate maintenance
    // =========================================================================

    /// Drop a candidate and its votes, e.g. after its file failed to decode.
    ///
    /// If the candidate is part of the active pair the pair is cleared and the
    /// caller must start a new round. Returns the votes the candidate held.
    pub fn remove_candidate(&mut self, id: &str) -> Result<u32, RankerError> {
        let pos = self
            .candidates
            .iter()
            .position(|c| c == id)
            .ok_or_else(|| RankerError::UnknownCandidate(id.to_string()))?;
        self.candidates.remove(pos);
        let votes = self.scores.remove(id).unwrap_or(0);

        if self.active.as_ref().is_some_and(|p| p.contains(id)) {
            self.active = None;
        }
        debug!(removed = %id, remaining = self.candidates.len(), "candidate removed");
        Ok(votes)
    }

    // =========================================================================
    // Read access
    // =========================================================================

    /// Ranking sorted by votes descending, identifier ascending on ties.
    pub fn snapshot_ranking(&self) -> Vec<RankingEntry> {
        let mut rows: Vec<(&String, u32)> =
            self.scores.iter().map(|(id, votes)| (id, *votes)).collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        rows.into_iter()
            .enumerate()
            .map(|(idx, (id, votes))| RankingEntry::new(idx + 1, id.clone(), votes))
            .collect()
    }

    pub fn active_pair(&self) -> Option<&ActivePair> {
        self.active.as_ref()
    }

    /// Candidates in load order.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn scores(&self) -> &HashMap<String, u32> {
        &self.scores
    }

    pub fn votes_for(&self, id: &str) -> Option<u32> {
        self.scores.get(id).copied()
    }

    pub fn total_votes(&self) -> u64 {
        self.scores.values().map(|v| *v as u64).sum()
    }

    /// Number of pairs presented so far (fresh rounds plus advances).
    pub fn rounds_played(&self) -> usize {
        self.rounds
    }
}

fn dedup_ids<I, S>(candidate_ids: I) -> Result<Vec<String>, RankerError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    let candidates: Vec<String> = candidate_ids
        .into_iter()
        .map(Into::into)
        .filter(|id| seen.insert(id.clone()))
        .collect();

    if candidates.len() < 2 {
        return Err(RankerError::InsufficientCandidates {
            found: candidates.len(),
        });
    }
    Ok(candidates)
}

fn zero_scores(candidates: &[String]) -> HashMap<String, u32> {
    candidates.iter().map(|id| (id.clone(), 0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_excluding_never_returns_excluded() {
        let mut ranker = PairwiseRanker::seeded(["a", "b", "c"], 3).unwrap();
        for _ in 0..200 {
            let drawn = ranker.draw_excluding("b").unwrap();
            assert_ne!(drawn, "b");
        }
    }

    #[test]
    fn draw_excluding_with_only_excluded_is_none() {
        let mut ranker = PairwiseRanker::seeded(["a", "b"], 3).unwrap();
        ranker.remove_candidate("b").unwrap();
        assert!(ranker.draw_excluding("a").is_none());
    }

    #[test]
    fn challenge_keeps_the_given_side() {
        let mut ranker = PairwiseRanker::seeded(["a", "b", "c"], 5).unwrap();
        ranker.remove_candidate("c").unwrap();

        let pair = ranker.challenge("a", Side::Right).unwrap();
        assert_eq!((pair.left.as_str(), pair.right.as_str()), ("b", "a"));
        assert_eq!(ranker.active_pair(), Some(&pair));

        assert_eq!(
            ranker.challenge("c", Side::Left).unwrap_err(),
            RankerError::UnknownCandidate("c".to_string())
        );
        ranker.remove_candidate("b").unwrap();
        assert_eq!(
            ranker.challenge("a", Side::Left).unwrap_err(),
            RankerError::NoAlternativeCandidate
        );
    }

    #[test]
    fn duplicates_collapse_before_size_check() {
        let err = PairwiseRanker::seeded(["a", "a", "a"], 0).unwrap_err();
        assert_eq!(err, RankerError::InsufficientCandidates { found: 1 });
    }
}
