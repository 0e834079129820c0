use std::collections::HashMap;

use image_ranker::ranker::{PairwiseRanker, RankerError, RankingEntry, Side};

fn ranker(ids: &[&str], seed: u64) -> PairwiseRanker {
    PairwiseRanker::seeded(ids.iter().copied(), seed).unwrap()
}

/// Draw fresh pairs until `id` is on screen, then vote for it.
fn vote_for(ranker: &mut PairwiseRanker, id: &str) {
    for _ in 0..10_000 {
        let pair = ranker.start_round().unwrap();
        if pair.left == id {
            ranker.record_choice(Side::Left).unwrap();
            return;
        }
        if pair.right == id {
            ranker.record_choice(Side::Right).unwrap();
            return;
        }
    }
    panic!("{id} never drawn");
}

#[test]
fn initialize_creates_one_zero_score_per_candidate() {
    let r = ranker(&["a.png", "b.png", "c.png"], 1);
    assert_eq!(r.scores().len(), 3);
    for id in ["a.png", "b.png", "c.png"] {
        assert_eq!(r.votes_for(id), Some(0));
    }
    assert!(r.active_pair().is_none());
    assert_eq!(r.total_votes(), 0);
}

#[test]
fn initialize_deduplicates_in_first_seen_order() {
    let r = ranker(&["b", "a", "b", "c", "a"], 1);
    assert_eq!(r.candidates(), ["b", "a", "c"]);
    assert_eq!(r.scores().len(), 3);
}

#[test]
fn initialize_with_single_candidate_fails() {
    let err = PairwiseRanker::seeded(["A"], 0).unwrap_err();
    assert_eq!(err, RankerError::InsufficientCandidates { found: 1 });

    let err = PairwiseRanker::seeded(Vec::<String>::new(), 0).unwrap_err();
    assert_eq!(err, RankerError::InsufficientCandidates { found: 0 });
}

#[test]
fn record_choice_without_pair_fails() {
    let mut r = ranker(&["a", "b"], 1);
    assert_eq!(r.record_choice(Side::Left), Err(RankerError::NoActivePair));
    assert_eq!(r.advance(Side::Left), Err(RankerError::NoActivePair));
    assert_eq!(r.total_votes(), 0);
}

#[test]
fn record_choice_increments_only_the_chosen_side() {
    let mut r = ranker(&["a", "b", "c"], 7);
    let pair = r.start_round().unwrap();

    assert_eq!(r.record_choice(Side::Right), Ok(1));
    assert_eq!(r.votes_for(&pair.right), Some(1));
    assert_eq!(r.votes_for(&pair.left), Some(0));

    // Recording does not advance the round.
    assert_eq!(r.active_pair(), Some(&pair));

    assert_eq!(r.record_choice(Side::Right), Ok(2));
    assert_eq!(r.total_votes(), 2);
}

#[test]
fn pairs_are_distinct_members_of_the_candidate_set() {
    let ids = ["a", "b", "c", "d", "e"];
    let mut r = ranker(&ids, 99);
    for step in 0..500 {
        let pair = if step % 3 == 0 {
            r.start_round().unwrap()
        } else {
            r.advance(if step % 2 == 0 { Side::Left } else { Side::Right })
                .unwrap()
        };
        assert_ne!(pair.left, pair.right);
        assert!(ids.contains(&pair.left.as_str()));
        assert!(ids.contains(&pair.right.as_str()));
    }
}

#[test]
fn advance_keeps_the_chosen_side() {
    let mut r = ranker(&["a", "b", "c", "d"], 5);
    let first = r.start_round().unwrap();

    let next = r.advance(Side::Left).unwrap();
    assert_eq!(next.left, first.left);
    assert_ne!(next.right, next.left);

    let after = r.advance(Side::Right).unwrap();
    assert_eq!(after.right, next.right);
    assert_ne!(after.left, after.right);
}

#[test]
fn advance_with_two_candidates_swaps_in_the_only_other() {
    let mut r = ranker(&["a", "b"], 3);
    let first = r.start_round().unwrap();
    let next = r.advance(Side::Left).unwrap();
    assert_eq!(next.left, first.left);
    assert_eq!(next.right, first.right);
}

#[test]
fn vote_records_then_advances() {
    let mut r = ranker(&["a", "b", "c"], 11);
    let first = r.start_round().unwrap();
    let next = r.vote(Side::Left).unwrap();

    assert_eq!(r.votes_for(&first.left), Some(1));
    assert_eq!(next.left, first.left);
    assert_eq!(r.rounds_played(), 2);
}

#[test]
fn total_votes_equals_number_of_choices() {
    let mut r = ranker(&["a", "b", "c", "d"], 21);
    r.start_round().unwrap();
    for i in 0..37 {
        let side = if i % 3 == 0 { Side::Right } else { Side::Left };
        r.vote(side).unwrap();
    }
    assert_eq!(r.total_votes(), 37);
    assert_eq!(r.scores().values().map(|v| *v as u64).sum::<u64>(), 37);
}

#[test]
fn snapshot_breaks_ties_by_identifier() {
    let mut r = ranker(&["B", "C", "A"], 4);
    for _ in 0..3 {
        vote_for(&mut r, "A");
        vote_for(&mut r, "C");
    }
    vote_for(&mut r, "B");

    assert_eq!(
        r.snapshot_ranking(),
        vec![
            RankingEntry::new(1, "A", 3),
            RankingEntry::new(2, "C", 3),
            RankingEntry::new(3, "B", 1),
        ]
    );
}

#[test]
fn snapshot_includes_zero_vote_candidates() {
    let r = ranker(&["z", "y", "x"], 0);
    let ranking = r.snapshot_ranking();
    let ids: Vec<&str> = ranking.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["x", "y", "z"]);
    assert!(ranking.iter().all(|e| e.votes == 0));
    assert_eq!(
        ranking.iter().map(|e| e.rank).collect::<Vec<_>>(),
        [1, 2, 3]
    );
}

#[test]
fn advance_on_single_remaining_candidate_fails() {
    let mut r = ranker(&["A", "B"], 8);
    r.start_round().unwrap();
    r.remove_candidate("B").unwrap();

    assert_eq!(r.advance(Side::Left), Err(RankerError::NoAlternativeCandidate));
    assert_eq!(
        r.start_round(),
        Err(RankerError::InsufficientCandidates { found: 1 })
    );
}

#[test]
fn removing_an_active_candidate_clears_the_pair() {
    let mut r = ranker(&["a", "b", "c"], 2);
    let pair = r.start_round().unwrap();
    r.record_choice(Side::Left).unwrap();

    assert_eq!(r.remove_candidate(&pair.left), Ok(1));
    assert!(r.active_pair().is_none());
    assert_eq!(r.votes_for(&pair.left), None);
    assert_eq!(r.scores().len(), 2);
    assert_eq!(r.candidates().len(), 2);

    let next = r.start_round().unwrap();
    assert!(!next.contains(&pair.left));
}

#[test]
fn removing_an_unknown_candidate_fails() {
    let mut r = ranker(&["a", "b"], 2);
    assert_eq!(
        r.remove_candidate("zzz"),
        Err(RankerError::UnknownCandidate("zzz".to_string()))
    );
    assert_eq!(r.candidates().len(), 2);
}

#[test]
fn reload_resets_scores_and_pair() {
    let mut r = ranker(&["a", "b", "c"], 2);
    r.start_round().unwrap();
    r.vote(Side::Left).unwrap();

    r.reload(["x", "y"]).unwrap();
    assert_eq!(r.candidates(), ["x", "y"]);
    assert_eq!(r.total_votes(), 0);
    assert!(r.active_pair().is_none());

    // A failed reload leaves the session untouched.
    assert!(r.reload(["only"]).is_err());
    assert_eq!(r.candidates(), ["x", "y"]);
}

#[test]
fn same_seed_same_pairs() {
    let mut a = ranker(&["a", "b", "c", "d"], 42);
    let mut b = ranker(&["a", "b", "c", "d"], 42);
    for _ in 0..20 {
        assert_eq!(a.start_round().unwrap(), b.start_round().unwrap());
        assert_eq!(a.vote(Side::Right).unwrap(), b.vote(Side::Right).unwrap());
    }
}

#[test]
fn start_round_is_roughly_uniform() {
    let ids = ["a", "b", "c", "d"];
    let mut r = ranker(&ids, 12345);
    let mut hits: HashMap<String, usize> = HashMap::new();

    for _ in 0..1000 {
        let pair = r.start_round().unwrap();
        *hits.entry(pair.left).or_default() += 1;
        *hits.entry(pair.right).or_default() += 1;
    }

    // 2000 slots over 4 candidates: 500 expected each.
    for id in ids {
        let n = hits.get(id).copied().unwrap_or(0);
        assert!((400..=600).contains(&n), "{id} drawn {n} times");
    }
}

#[test]
fn advance_challenger_is_roughly_uniform() {
    let ids = ["a", "b", "c", "d"];
    let mut r = ranker(&ids, 777);
    let first = r.start_round().unwrap();
    let kept = first.left.clone();
    let mut hits: HashMap<String, usize> = HashMap::new();

    for _ in 0..900 {
        let pair = r.advance(Side::Left).unwrap();
        assert_eq!(pair.left, kept);
        *hits.entry(pair.right).or_default() += 1;
    }

    assert_eq!(hits.len(), 3);
    for (id, n) in hits {
        assert!((220..=380).contains(&n), "{id} drawn {n} times");
    }
}
