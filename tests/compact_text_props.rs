use proptest::prelude::*;

use nsearch_mapper::text::{CompactText, CompactTextBuilder, TextRetriever, TraversalDirection};

fn symbols() -> impl Strategy<Value = Vec<u8>> {
    // mostly ACGT with occasional N and separators
    proptest::collection::vec(prop_oneof![8 => 0u8..4, 1 => Just(4u8), 1 => Just(5u8)], 1..300)
}

fn build(encs: &[u8]) -> CompactText {
    let mut builder = CompactTextBuilder::with_capacity(encs.len());
    builder.extend_from_slice(encs).unwrap();
    builder.close()
}

proptest! {
    #[test]
    fn compact_text_reproduces_its_input(encs in symbols(), position in 0usize..320, length in 0usize..200) {
        let text = build(&encs);
        prop_assert_eq!(text.len(), encs.len() as u64);
        prop_assert_eq!(text.iter().collect::<Vec<_>>(), encs.clone());

        let mut window = Vec::new();
        let n = text.fetch(position as u64, length, &mut window);
        let start = position.min(encs.len());
        let end = (position + length).min(encs.len());
        prop_assert_eq!(n, end - start);
        prop_assert_eq!(&window[..], &encs[start..end]);

        if position < encs.len() {
            prop_assert_eq!(text.symbol_at(position as u64).unwrap(), encs[position]);
            let reversed: Vec<u8> = text.iter_from(position as u64, TraversalDirection::Reverse).collect();
            let expected: Vec<u8> = encs[..=position].iter().rev().copied().collect();
            prop_assert_eq!(reversed, expected);
        } else {
            prop_assert!(text.symbol_at(position as u64).is_err());
        }
    }

    #[test]
    fn window_mismatches_count_differing_symbols(
        a in symbols(),
        b in symbols(),
        offset_a in 0usize..100,
        offset_b in 0usize..100,
    ) {
        prop_assume!(offset_a < a.len() && offset_b < b.len());
        let len = (a.len() - offset_a).min(b.len() - offset_b);
        let expected = a[offset_a..offset_a + len]
            .iter()
            .zip(&b[offset_b..offset_b + len])
            .filter(|(x, y)| x != y)
            .count() as u64;
        let ta = build(&a);
        let tb = build(&b);
        prop_assert_eq!(ta.window_mismatches(offset_a as u64, &tb, offset_b as u64, len as u64), expected);
        prop_assert_eq!(ta.window_eq(offset_a as u64, &tb, offset_b as u64, len as u64), expected == 0);
    }
}
