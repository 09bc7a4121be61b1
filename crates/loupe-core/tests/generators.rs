use loupe_core::changelog::{ChangeLog, ChangeRecord};
use loupe_core::model::OpId;
use proptest::prelude::*;
use proptest::sample::Index;

/// One generated commit: author, length and picks among earlier changes to
/// depend on.
type Step = (u64, u32, Vec<Index>);

fn arb_step() -> impl Strategy<Value = Step> + Clone {
    (0u64..4, 1u32..6, prop::collection::vec(any::<Index>(), 0..3))
}

/// Valid change histories of up to `max_changes` changes across four peers.
///
/// Dependencies only ever point at earlier changes, so every history is
/// acyclic and every referenced operation exists.
pub fn arb_records(max_changes: usize) -> impl Strategy<Value = Vec<ChangeRecord>> + Clone {
    prop::collection::vec(arb_step(), 0..max_changes).prop_map(|steps| {
        let mut next_counter = [0u32; 4];
        let mut last_ops: Vec<OpId> = Vec::new();
        let mut records = Vec::with_capacity(steps.len());

        for (i, (peer, length, picks)) in steps.into_iter().enumerate() {
            let slot = usize::try_from(peer).unwrap();
            let counter = next_counter[slot];
            let deps: Vec<OpId> = if last_ops.is_empty() {
                Vec::new()
            } else {
                picks.iter().map(|pick| *pick.get(&last_ops)).collect()
            };

            records.push(
                ChangeRecord::new(peer, counter, length)
                    .deps(deps)
                    .timestamp(1_700_000_000 + i64::try_from(i).unwrap()),
            );
            next_counter[slot] = counter + length;
            last_ops.push(OpId::new(peer, counter + length - 1));
        }

        records
    })
}

pub fn arb_change_log(max_changes: usize) -> impl Strategy<Value = ChangeLog> {
    arb_records(max_changes)
        .prop_map(|records| ChangeLog::from_records(records).expect("generated history is valid"))
}
