use loupe_core::engine::DocumentEngine;
use loupe_core::model::{Frontier, OpId};
use loupe_core::timeline::TimelineMapper;
use proptest::prelude::*;

#[path = "generators.rs"]
mod generators;
use generators::*;

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    #[test]
    fn boundaries_resolve_to_empty_and_logged(log in arb_change_log(24)) {
        let mapper = TimelineMapper::new(&log);
        prop_assert_eq!(mapper.resolve(0), Some(Frontier::empty()));
        prop_assert_eq!(mapper.resolve(mapper.latest_position()), Some(log.logged_frontier()));
        prop_assert_eq!(mapper.resolve(mapper.total_length()), None);
    }

    #[test]
    fn single_op_round_trip(log in arb_change_log(24)) {
        let mapper = TimelineMapper::new(&log);
        for change in log.changes() {
            for offset in 0..change.length {
                let op = Frontier::single(OpId::new(change.peer, change.counter + offset));
                let position = mapper.position_of(&op);
                prop_assert_eq!(mapper.resolve(position), Some(op));
            }
        }
    }

    #[test]
    fn positions_move_forward(log in arb_change_log(24)) {
        let mapper = TimelineMapper::new(&log);
        let mut previous: Option<(u64, u32, u64)> = None;
        for position in 1..mapper.latest_position() {
            let entry = mapper.index().find(position).expect("interior position is indexed");
            let counter = entry.change.counter
                + u32::try_from(position - entry.base_position).expect("offset fits");
            if let Some((base, prev_counter, prev_peer)) = previous {
                prop_assert!(base <= entry.base_position);
                if base == entry.base_position {
                    prop_assert_eq!(prev_peer, entry.change.peer);
                    prop_assert!(prev_counter < counter);
                }
            }
            previous = Some((entry.base_position, counter, entry.change.peer));
        }
    }

    #[test]
    fn positions_follow_causal_order(log in arb_change_log(24)) {
        let mapper = TimelineMapper::new(&log);
        let entries = mapper.index().entries();
        for (i, entry) in entries.iter().enumerate() {
            for dep in entry.change.causal_parents() {
                let dep_position = mapper.index().position_of(dep).expect("dependency is indexed");
                prop_assert!(
                    dep_position < entry.base_position,
                    "change {} at {} precedes its dependency {} at {}",
                    entry.change.id(), entry.base_position, dep, dep_position
                );
            }
            prop_assert!(i == 0 || entries[i - 1].end_position() == entry.base_position);
        }
    }

    #[test]
    fn total_length_matches_logged_ops(log in arb_change_log(24)) {
        let mapper = TimelineMapper::new(&log);
        let summed: u64 = log.changes().iter().map(|c| u64::from(c.length)).sum();
        prop_assert_eq!(mapper.total_length() - 2, summed);
        prop_assert_eq!(mapper.total_length() - 2, log.logged_op_count());
        prop_assert_eq!(mapper.index().op_count(), log.logged_op_count());
        prop_assert!(mapper.check_consistency().is_ok());
    }

    #[test]
    fn multi_head_frontier_maps_to_latest(log in arb_change_log(24)) {
        let mapper = TimelineMapper::new(&log);
        let heads = log.logged_frontier();
        if heads.len() > 1 {
            prop_assert_eq!(mapper.position_of(&heads), mapper.latest_position());
        }
    }
}
