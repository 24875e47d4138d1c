//! Property-based tests for the top-k accumulator.
//!
//! Scores are drawn from a small set so that ties are frequent and the
//! shard/document tie-break is exercised.

use proptest::prelude::*;
use shapelink::prelude::*;
use std::cmp::Ordering;

fn arb_order() -> impl Strategy<Value = ScoreOrder> {
  prop_oneof![Just(ScoreOrder::Descending), Just(ScoreOrder::Ascending)]
}

/// Matches with distinct `(shard_index, doc_id)` identities.
fn arb_matches() -> impl Strategy<Value = Vec<ScoredMatch>> {
  prop::collection::vec((0u8..8, 0usize..4), 0..40).prop_map(|raw| {
    raw
      .into_iter()
      .enumerate()
      .map(|(doc, (score, shard))| ScoredMatch::new(f64::from(score) / 4.0, doc as u64, shard))
      .collect()
  })
}

fn fold(k: usize, order: ScoreOrder, matches: &[ScoredMatch]) -> TopK {
  TopK::from_matches(k, order, matches.iter().cloned()).unwrap()
}

/// Splits `matches` into three accumulators.
fn split3(k: usize, order: ScoreOrder, matches: &[ScoredMatch], i: usize, j: usize) -> (TopK, TopK, TopK) {
  let i = i.min(matches.len());
  let j = j.clamp(i, matches.len());
  (
    fold(k, order, &matches[..i]),
    fold(k, order, &matches[i..j]),
    fold(k, order, &matches[j..]),
  )
}

proptest! {
  #[test]
  fn prop_permutation_does_not_change_result(
    (matches, shuffled) in arb_matches().prop_flat_map(|m| (Just(m.clone()), Just(m).prop_shuffle())),
    k in 1usize..8,
    order in arb_order(),
  ) {
    let original = fold(k, order, &matches);
    let permuted = fold(k, order, &shuffled);
    prop_assert_eq!(original.materialize(), permuted.materialize());
  }

  #[test]
  fn prop_insert_and_plus_agree(
    matches in arb_matches(),
    k in 1usize..8,
    order in arb_order(),
    split in 0usize..40,
  ) {
    let split = split.min(matches.len());
    let left = fold(k, order, &matches[..split]);
    let right = fold(k, order, &matches[split..]);
    prop_assert_eq!(left.plus(&right).unwrap(), fold(k, order, &matches));
  }

  #[test]
  fn prop_zero_is_identity(matches in arb_matches(), k in 1usize..8, order in arb_order()) {
    let a = fold(k, order, &matches);
    let zero = TopK::zero(k, order).unwrap();
    let right_identity = a.plus(&zero).unwrap();
    let left_identity = zero.plus(&a).unwrap();
    prop_assert_eq!(&right_identity, &a);
    prop_assert_eq!(&left_identity, &a);
  }

  #[test]
  fn prop_plus_is_associative(
    matches in arb_matches(),
    k in 1usize..8,
    order in arb_order(),
    i in 0usize..40,
    j in 0usize..40,
  ) {
    let (a, b, c) = split3(k, order, &matches, i, j);
    let left = a.plus(&b).unwrap().plus(&c).unwrap();
    let right = a.plus(&b.plus(&c).unwrap()).unwrap();
    prop_assert_eq!(left, right);
  }

  #[test]
  fn prop_plus_is_commutative(
    matches in arb_matches(),
    k in 1usize..8,
    order in arb_order(),
    split in 0usize..40,
  ) {
    let split = split.min(matches.len());
    let a = fold(k, order, &matches[..split]);
    let b = fold(k, order, &matches[split..]);
    prop_assert_eq!(a.plus(&b).unwrap(), b.plus(&a).unwrap());
  }

  #[test]
  fn prop_bounded_and_strictly_sorted(matches in arb_matches(), k in 1usize..8, order in arb_order()) {
    let acc = fold(k, order, &matches);
    let items = acc.materialize();
    prop_assert!(items.len() <= k);
    prop_assert_eq!(items.len(), k.min(matches.len()));
    for pair in items.windows(2) {
      prop_assert_eq!(pair[0].rank_cmp(&pair[1], order), Ordering::Less);
    }
  }
}

#[test]
fn test_mismatched_accumulators_do_not_merge() {
  let a = TopK::zero(3, ScoreOrder::Descending).unwrap();
  assert!(matches!(
    a.plus(&TopK::zero(4, ScoreOrder::Descending).unwrap()),
    Err(Error::MergeIncompatible(_))
  ));
  assert!(matches!(
    a.plus(&TopK::zero(3, ScoreOrder::Ascending).unwrap()),
    Err(Error::MergeIncompatible(_))
  ));
  assert!(matches!(TopK::zero(0, ScoreOrder::Descending), Err(Error::InvalidCapacity(0))));
}
