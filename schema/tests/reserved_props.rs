use brine_proto_schema::ReservedNumbers;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn ranges() -> impl Strategy<Value = Vec<(i32, i32)>> {
    prop::collection::vec((-64i32..64, 0i32..8), 0..12)
        .prop_map(|v| v.into_iter().map(|(s, len)| (s, s + len)).collect())
}

fn model(ranges: &[(i32, i32)]) -> BTreeSet<i32> {
    ranges.iter().flat_map(|&(s, e)| s..=e).collect()
}

fn build(ranges: &[(i32, i32)]) -> ReservedNumbers {
    let mut set = ReservedNumbers::new();
    for &(s, e) in ranges {
        set.insert_range(s, e);
    }
    set
}

proptest! {
    #[test]
    fn membership_matches_model(input in ranges()) {
        let set = build(&input);
        let expected = model(&input);
        for n in -80..80 {
            prop_assert_eq!(set.contains(n), expected.contains(&n));
        }
        prop_assert_eq!(set.len(), expected.len() as u64);
        prop_assert_eq!(set.values().collect::<BTreeSet<_>>(), expected);
    }

    #[test]
    fn stored_ranges_are_disjoint_and_not_adjacent(input in ranges()) {
        let set = build(&input);
        let stored: Vec<_> = set.ranges().collect();
        for pair in stored.windows(2) {
            prop_assert!(pair[0].1 + 1 < pair[1].0);
        }
    }

    #[test]
    fn next_bits_agree_with_model(input in ranges(), from in -80i32..80) {
        let set = build(&input);
        let expected = model(&input);
        prop_assert_eq!(set.next_set_bit(from), expected.range(from..).next().copied());
        let clear = (from..).find(|n| !expected.contains(n));
        prop_assert_eq!(set.next_clear_bit(from), clear);
    }

    #[test]
    fn difference_matches_model(a in ranges(), b in ranges()) {
        let diff = build(&a).difference(&build(&b));
        let expected: BTreeSet<i32> = model(&a).difference(&model(&b)).copied().collect();
        prop_assert_eq!(diff.values().collect::<BTreeSet<_>>(), expected);
    }
}

#[test]
fn full_domain_is_one_range() {
    let mut set = ReservedNumbers::new();
    set.insert_range(0, i32::MAX);
    set.insert_range(i32::MIN, -1);
    assert_eq!(set.ranges().count(), 1);
    assert_eq!(set.next_clear_bit(i32::MIN), None);
    assert_eq!(set.len(), 1u64 << 32);
}
