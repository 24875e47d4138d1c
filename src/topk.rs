//! Bounded top-k accumulator over [`ScoredMatch`] values.
//!
//! `TopK` is a commutative monoid: [`TopK::zero`] is the identity and
//! [`TopK::plus`] keeps the best `capacity` matches of both operands. Because
//! matches rank by a total order (score, then shard, then document), any
//! grouping or ordering of `insert`/`plus` calls over the same matches yields
//! the same materialized sequence. That is what lets per-shard partial
//! results be combined in whatever order the shuffle delivers them.

use crate::error::{Error, Result};
use crate::types::{ScoreOrder, ScoredMatch};
use std::cmp::Ordering;

/// A capacity-bounded, best-first collection of matches.
#[derive(Debug, Clone, PartialEq)]
pub struct TopK {
  capacity: usize,
  order: ScoreOrder,
  /// Sorted best-first; the last element is the first to be evicted.
  items: Vec<ScoredMatch>,
}

impl TopK {
  /// Returns an empty accumulator. A zero capacity is rejected.
  pub fn zero(capacity: usize, order: ScoreOrder) -> Result<Self> {
    if capacity == 0 {
      return Err(Error::InvalidCapacity(capacity));
    }
    Ok(Self {
      capacity,
      order,
      items: Vec::new(),
    })
  }

  /// Builds an accumulator from any sequence of matches.
  pub fn from_matches<I>(capacity: usize, order: ScoreOrder, matches: I) -> Result<Self>
  where
    I: IntoIterator<Item = ScoredMatch>,
  {
    let mut acc = Self::zero(capacity, order)?;
    for m in matches {
      acc.insert(m);
    }
    Ok(acc)
  }

  /// Maximum number of matches retained.
  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Ranking direction of this accumulator.
  pub fn order(&self) -> ScoreOrder {
    self.order
  }

  /// Number of matches currently held.
  pub fn len(&self) -> usize {
    self.items.len()
  }

  /// Whether no match is held.
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  /// Adds one match.
  ///
  /// Below capacity the match is placed in rank order. At capacity it
  /// replaces the current worst match only if it strictly outranks it.
  pub fn insert(&mut self, m: ScoredMatch) {
    if self.items.len() == self.capacity {
      match self.items.last() {
        Some(worst) if m.rank_cmp(worst, self.order) == Ordering::Less => {
          self.items.pop();
        }
        _ => return,
      }
    }

    let order = self.order;
    // Equal-ranked matches go after existing ones.
    let pos = self
      .items
      .partition_point(|existing| existing.rank_cmp(&m, order) != Ordering::Greater);
    self.items.insert(pos, m);
  }

  /// Combines two accumulators into one holding the best `capacity` matches
  /// of their union.
  ///
  /// Both operands are already sorted, so this is a bounded two-way merge
  /// that stops once `capacity` matches have been taken.
  pub fn plus(&self, other: &TopK) -> Result<TopK> {
    if self.capacity != other.capacity {
      return Err(Error::MergeIncompatible(format!(
        "capacity {} vs {}",
        self.capacity, other.capacity
      )));
    }
    if self.order != other.order {
      return Err(Error::MergeIncompatible(format!(
        "order {:?} vs {:?}",
        self.order, other.order
      )));
    }

    let mut items = Vec::with_capacity(self.capacity.min(self.len() + other.len()));
    let (mut left, mut right) = (self.items.iter().peekable(), other.items.iter().peekable());

    while items.len() < self.capacity {
      let next = match (left.peek(), right.peek()) {
        (Some(a), Some(b)) => {
          if b.rank_cmp(a, self.order) == Ordering::Less {
            right.next()
          } else {
            left.next()
          }
        }
        (Some(_), None) => left.next(),
        (None, Some(_)) => right.next(),
        (None, None) => None,
      };

      match next {
        Some(m) => items.push(m.clone()),
        None => break,
      }
    }

    Ok(TopK {
      capacity: self.capacity,
      order: self.order,
      items,
    })
  }

  /// The retained matches, best first.
  pub fn materialize(&self) -> &[ScoredMatch] {
    &self.items
  }

  /// Consumes the accumulator, returning its matches best first.
  pub fn into_vec(self) -> Vec<ScoredMatch> {
    self.items
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn m(score: f64, doc: u64) -> ScoredMatch {
    ScoredMatch::new(score, doc, 0)
  }

  fn scores(acc: &TopK) -> Vec<f64> {
    acc.materialize().iter().map(|m| m.score).collect()
  }

  #[test]
  fn test_zero_capacity_rejected() {
    let err = TopK::zero(0, ScoreOrder::Descending).unwrap_err();
    assert!(matches!(err, Error::InvalidCapacity(0)));
  }

  #[test]
  fn test_insert_keeps_best_first() {
    let acc = TopK::from_matches(3, ScoreOrder::Descending, vec![m(0.2, 0), m(0.9, 1), m(0.5, 2)]).unwrap();
    assert_eq!(scores(&acc), vec![0.9, 0.5, 0.2]);
  }

  #[test]
  fn test_insert_evicts_worst_when_full() {
    let mut acc = TopK::from_matches(2, ScoreOrder::Descending, vec![m(0.4, 0), m(0.6, 1)]).unwrap();

    acc.insert(m(0.1, 2));
    assert_eq!(scores(&acc), vec![0.6, 0.4]);

    acc.insert(m(0.5, 3));
    assert_eq!(scores(&acc), vec![0.6, 0.5]);
    assert_eq!(acc.len(), 2);
  }

  #[test]
  fn test_equal_rank_does_not_evict() {
    let mut acc = TopK::from_matches(1, ScoreOrder::Descending, vec![m(0.5, 1)]).unwrap();
    acc.insert(m(0.5, 1));
    assert_eq!(acc.len(), 1);

    // Same score, lower doc id outranks through the identity tie-break.
    acc.insert(m(0.5, 0));
    assert_eq!(acc.materialize()[0].doc_id, 0);
  }

  #[test]
  fn test_ascending_order() {
    let acc = TopK::from_matches(2, ScoreOrder::Ascending, vec![m(12.0, 0), m(3.0, 1), m(7.5, 2)]).unwrap();
    assert_eq!(scores(&acc), vec![3.0, 7.5]);
  }

  #[test]
  fn test_plus_takes_best_of_union() {
    let a = TopK::from_matches(3, ScoreOrder::Descending, vec![m(0.9, 0), m(0.3, 1)]).unwrap();
    let b = TopK::from_matches(3, ScoreOrder::Descending, vec![m(0.8, 2), m(0.7, 3), m(0.1, 4)]).unwrap();

    let sum = a.plus(&b).unwrap();
    assert_eq!(scores(&sum), vec![0.9, 0.8, 0.7]);
    assert_eq!(sum, b.plus(&a).unwrap());
  }

  #[test]
  fn test_plus_with_zero_is_identity() {
    let a = TopK::from_matches(2, ScoreOrder::Descending, vec![m(0.9, 0), m(0.3, 1)]).unwrap();
    let zero = TopK::zero(2, ScoreOrder::Descending).unwrap();
    assert_eq!(a.plus(&zero).unwrap(), a);
    assert_eq!(zero.plus(&a).unwrap(), a);
  }

  #[test]
  fn test_plus_rejects_mismatched_accumulators() {
    let a = TopK::zero(2, ScoreOrder::Descending).unwrap();
    let b = TopK::zero(3, ScoreOrder::Descending).unwrap();
    let c = TopK::zero(2, ScoreOrder::Ascending).unwrap();

    assert!(matches!(a.plus(&b), Err(Error::MergeIncompatible(_))));
    assert!(matches!(a.plus(&c), Err(Error::MergeIncompatible(_))));
  }
}
