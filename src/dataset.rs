//! In-process partitioned dataset.
//!
//! This module stands in for a distributed collection runtime: data lives in
//! an ordered list of partitions, per-partition work runs data-parallel
//! (with the `parallel` feature), values can be broadcast to every worker,
//! and keyed partial results can be reduced with an associative operator.
//! Partition order and membership never change behind the caller's back.

use crate::error::Result;
use std::collections::HashMap;
use std::hash::Hash;
use std::ops::Deref;
use std::sync::Arc;

#[cfg(feature = "parallel")]
use crate::types::Searchable;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// An ordered collection of partitions.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionedDataset<T> {
  partitions: Vec<Vec<T>>,
}

impl<T> PartitionedDataset<T> {
  /// Wraps pre-partitioned data, keeping the partition layout as given.
  pub fn from_partitions(partitions: Vec<Vec<T>>) -> Self {
    Self { partitions }
  }

  /// Splits `items` into `num_partitions` contiguous partitions of near-equal
  /// size. A partition count of zero is treated as one.
  pub fn from_vec(items: Vec<T>, num_partitions: usize) -> Self {
    let num_partitions = num_partitions.max(1);
    let base = items.len() / num_partitions;
    let extra = items.len() % num_partitions;

    let mut partitions = Vec::with_capacity(num_partitions);
    let mut iter = items.into_iter();
    for i in 0..num_partitions {
      let size = base + usize::from(i < extra);
      partitions.push(iter.by_ref().take(size).collect());
    }
    Self { partitions }
  }

  /// Number of partitions.
  pub fn num_partitions(&self) -> usize {
    self.partitions.len()
  }

  /// Total number of elements.
  pub fn len(&self) -> usize {
    self.partitions.iter().map(Vec::len).sum()
  }

  /// Whether every partition is empty.
  pub fn is_empty(&self) -> bool {
    self.partitions.iter().all(Vec::is_empty)
  }

  /// Borrow the partitions.
  pub fn partitions(&self) -> &[Vec<T>] {
    &self.partitions
  }

  /// Consume into the partitions.
  pub fn into_partitions(self) -> Vec<Vec<T>> {
    self.partitions
  }

  /// Iterates every element, partition by partition.
  pub fn iter(&self) -> impl Iterator<Item = &T> {
    self.partitions.iter().flatten()
  }

  /// Global index of the first element of each partition.
  ///
  /// Assigning `offsets[p] + i` to the `i`-th element of partition `p` gives
  /// every element a unique, stable, sequential index.
  pub fn index_offsets(&self) -> Vec<u64> {
    let mut next = 0u64;
    self
      .partitions
      .iter()
      .map(|p| {
        let offset = next;
        next += p.len() as u64;
        offset
      })
      .collect()
  }
}

/// A read-only value replicated to every worker for the duration of one job.
#[derive(Debug)]
pub struct Broadcast<T> {
  value: Arc<T>,
}

impl<T> Broadcast<T> {
  /// Publishes `value` to workers.
  pub fn new(value: T) -> Self {
    Self {
      value: Arc::new(value),
    }
  }

  /// The broadcast value.
  pub fn value(&self) -> &T {
    &self.value
  }
}

impl<T> Clone for Broadcast<T> {
  fn clone(&self) -> Self {
    Self {
      value: Arc::clone(&self.value),
    }
  }
}

impl<T> Deref for Broadcast<T> {
  type Target = T;

  fn deref(&self) -> &T {
    &self.value
  }
}

/// Runs `f` on every item with its position, one task per item.
#[cfg(feature = "parallel")]
pub fn map_partitions<A, B, F>(items: &[A], f: F) -> Vec<B>
where
  A: Sync,
  B: Send,
  F: Fn(usize, &A) -> B + Sync + Send,
{
  items.par_iter().enumerate().map(|(i, item)| f(i, item)).collect()
}

/// Runs `f` on every item with its position, one task per item.
#[cfg(not(feature = "parallel"))]
pub fn map_partitions<A, B, F>(items: &[A], f: F) -> Vec<B>
where
  F: Fn(usize, &A) -> B,
{
  items.iter().enumerate().map(|(i, item)| f(i, item)).collect()
}

/// Fallible [`map_partitions`]; the first failure is returned.
#[cfg(feature = "parallel")]
pub fn try_map_partitions<A, B, F>(items: &[A], f: F) -> Result<Vec<B>>
where
  A: Sync,
  B: Send,
  F: Fn(usize, &A) -> Result<B> + Sync + Send,
{
  items.par_iter().enumerate().map(|(i, item)| f(i, item)).collect()
}

/// Fallible [`map_partitions`]; the first failure is returned.
#[cfg(not(feature = "parallel"))]
pub fn try_map_partitions<A, B, F>(items: &[A], f: F) -> Result<Vec<B>>
where
  F: Fn(usize, &A) -> Result<B>,
{
  items.iter().enumerate().map(|(i, item)| f(i, item)).collect()
}

/// Runs `f` on every item mutably with its position, one task per item.
#[cfg(feature = "parallel")]
pub fn map_partitions_mut<A, B, F>(items: &mut [A], f: F) -> Vec<B>
where
  A: Send,
  B: Send,
  F: Fn(usize, &mut A) -> B + Sync + Send,
{
  items.par_iter_mut().enumerate().map(|(i, item)| f(i, item)).collect()
}

/// Runs `f` on every item mutably with its position, one task per item.
#[cfg(not(feature = "parallel"))]
pub fn map_partitions_mut<A, B, F>(items: &mut [A], f: F) -> Vec<B>
where
  F: Fn(usize, &mut A) -> B,
{
  items.iter_mut().enumerate().map(|(i, item)| f(i, item)).collect()
}

/// Combines every value sharing a key with the associative operator `op`.
///
/// Partial results from all partitions are merged into one map. The order in
/// which values meet is unspecified, so `op` must also be commutative for
/// the result to be deterministic.
#[cfg(feature = "parallel")]
pub fn reduce_by_key<K, V, F>(partials: Vec<Vec<(K, V)>>, op: F) -> Result<HashMap<K, V>>
where
  K: Eq + Hash + Searchable,
  V: Searchable,
  F: Fn(&V, &V) -> Result<V> + Sync + Send,
{
  use dashmap::mapref::entry::Entry;
  use dashmap::DashMap;

  let merged: DashMap<K, V> = DashMap::new();

  partials.into_par_iter().try_for_each(|partition| -> Result<()> {
    for (key, value) in partition {
      match merged.entry(key) {
        Entry::Occupied(mut slot) => {
          let combined = op(slot.get(), &value)?;
          slot.insert(combined);
        }
        Entry::Vacant(slot) => {
          slot.insert(value);
        }
      }
    }
    Ok(())
  })?;

  Ok(merged.into_iter().collect())
}

/// Combines every value sharing a key with the associative operator `op`.
///
/// Partial results from all partitions are merged into one map. The order in
/// which values meet is unspecified, so `op` must also be commutative for
/// the result to be deterministic.
#[cfg(not(feature = "parallel"))]
pub fn reduce_by_key<K, V, F>(partials: Vec<Vec<(K, V)>>, op: F) -> Result<HashMap<K, V>>
where
  K: Eq + Hash,
  F: Fn(&V, &V) -> Result<V>,
{
  use std::collections::hash_map::Entry;

  let mut merged: HashMap<K, V> = HashMap::new();
  for (key, value) in partials.into_iter().flatten() {
    match merged.entry(key) {
      Entry::Occupied(mut slot) => {
        let combined = op(slot.get(), &value)?;
        slot.insert(combined);
      }
      Entry::Vacant(slot) => {
        slot.insert(value);
      }
    }
  }
  Ok(merged)
}
