use std::cmp::Ordering;
use std::collections::HashSet;

use proptest::prelude::*;

use nsearch_mapper::index::{BsStrand, Location, Locator, Strand};
use nsearch_mapper::matches::store::rank_cmp;
use nsearch_mapper::matches::{InsertOutcome, MatchAlignment, MatchStore, MatchTrace};

struct Identity;

impl Locator for Identity {
    fn map(&self, index_position: u64) -> Location {
        Location { position: index_position, strand: Strand::Forward, tag: 0, bs_strand: BsStrand::None }
    }
}

fn candidate(position: u64, length: u64, edit: u32, score: i32) -> MatchTrace {
    let alignment =
        MatchAlignment { match_position: position, cigar_offset: 0, cigar_length: 0, effective_length: length, score };
    MatchTrace::from_alignment(alignment, edit, edit, score)
}

fn candidates() -> impl Strategy<Value = Vec<(u64, u64, u32, i32)>> {
    proptest::collection::vec((0u64..40, 1u64..6, 0u32..4, -8i32..8), 1..60)
}

proptest! {
    #[test]
    fn store_stays_ranked_and_indexed(inputs in candidates()) {
        let mut store = MatchStore::new(16);
        for &(position, length, edit, score) in &inputs {
            store.insert(&Identity, candidate(position, length, edit, score));

            let traces = store.traces();
            for pair in traces.windows(2) {
                prop_assert_ne!(rank_cmp(&pair[0], &pair[1]), Ordering::Greater);
            }
            let mut begins = HashSet::new();
            for (slot, t) in traces.iter().enumerate() {
                prop_assert!(begins.insert(t.begin_key()), "begin key {} held twice", t.begin_key());
                prop_assert_eq!(store.lookup(t.alignment.match_position, t.alignment.effective_length), Some(slot));
            }
            prop_assert_eq!(store.counters().total(), traces.len() as u64);
            let min_edit = traces.iter().map(|t| t.edit_distance).min();
            if let Some(d) = min_edit {
                prop_assert_eq!(store.min_edit_distance(), d);
            }
        }
    }

    #[test]
    fn duplicates_keep_the_better_score(
        position in 0u64..100,
        length in 1u64..10,
        first in -10i32..10,
        second in -10i32..10,
    ) {
        let mut store = MatchStore::new(16);
        let (_, outcome) = store.insert(&Identity, candidate(position, length, 1, first));
        prop_assert_eq!(outcome, InsertOutcome::Added);
        // same begin, different end
        let (slot, outcome) = store.insert(&Identity, candidate(position, length + 1, 1, second));
        prop_assert_eq!(slot, 0);
        prop_assert_eq!(store.num_traces(), 1);
        if second > first {
            prop_assert_eq!(outcome, InsertOutcome::Replaced);
            prop_assert_eq!(store.traces()[0].swg_score, second);
        } else {
            prop_assert_eq!(outcome, InsertOutcome::Discarded);
            prop_assert_eq!(store.traces()[0].swg_score, first);
        }
    }
}
