//! Property-based checks of ranker invariants over arbitrary candidate sets and
//! choice sequences.

use std::collections::HashSet;

use image_ranker::ranker::{PairwiseRanker, Side};
use proptest::prelude::*;

fn candidate_set() -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set("[a-z]{1,6}\\.png", 2..12).prop_map(|s| s.into_iter().collect())
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Fresh,
    Vote(Side),
    Keep(Side),
}

fn step() -> impl Strategy<Value = Step> {
    let side = prop_oneof![Just(Side::Left), Just(Side::Right)];
    prop_oneof![
        1 => Just(Step::Fresh),
        3 => side.clone().prop_map(Step::Vote),
        1 => side.prop_map(Step::Keep),
    ]
}

proptest! {
    #[test]
    fn pairs_stay_valid_and_votes_add_up(
        ids in candidate_set(),
        steps in prop::collection::vec(step(), 1..80),
        seed in any::<u64>(),
    ) {
        let known: HashSet<&String> = ids.iter().collect();
        let mut ranker = PairwiseRanker::seeded(ids.clone(), seed).unwrap();
        ranker.start_round().unwrap();
        let mut choices = 0u64;

        for step in steps {
            let before = ranker.active_pair().cloned().unwrap();
            let before_scores = ranker.scores().clone();

            let pair = match step {
                Step::Fresh => ranker.start_round().unwrap(),
                Step::Vote(side) => {
                    let pair = ranker.vote(side).unwrap();
                    choices += 1;
                    let winner = before.get(side);
                    prop_assert_eq!(ranker.votes_for(winner), Some(before_scores[winner] + 1));
                    for (id, votes) in ranker.scores() {
                        if id != winner {
                            prop_assert_eq!(*votes, before_scores[id]);
                        }
                    }
                    prop_assert_eq!(pair.get(side), winner);
                    pair
                }
                Step::Keep(side) => {
                    let pair = ranker.advance(side).unwrap();
                    prop_assert_eq!(pair.get(side), before.get(side));
                    pair
                }
            };

            prop_assert_ne!(&pair.left, &pair.right);
            prop_assert!(known.contains(&pair.left));
            prop_assert!(known.contains(&pair.right));
        }

        prop_assert_eq!(ranker.total_votes(), choices);
        prop_assert_eq!(ranker.scores().len(), ids.len());
    }

    #[test]
    fn snapshot_is_sorted_and_complete(
        ids in candidate_set(),
        votes in prop::collection::vec(any::<bool>(), 0..60),
        seed in any::<u64>(),
    ) {
        let mut ranker = PairwiseRanker::seeded(ids.clone(), seed).unwrap();
        ranker.start_round().unwrap();
        for left in votes {
            ranker.vote(if left { Side::Left } else { Side::Right }).unwrap();
        }

        let ranking = ranker.snapshot_ranking();
        prop_assert_eq!(ranking.len(), ids.len());
        for (idx, entry) in ranking.iter().enumerate() {
            prop_assert_eq!(entry.rank, idx + 1);
            prop_assert_eq!(Some(entry.votes), ranker.votes_for(&entry.id));
        }
        for pair in ranking.windows(2) {
            let ordered = pair[0].votes > pair[1].votes
                || (pair[0].votes == pair[1].votes && pair[0].id < pair[1].id);
            prop_assert!(ordered, "{:?} before {:?}", pair[0], pair[1]);
        }
    }
}
