//! Result surface of a radius link.

use crate::error::Result;
use crate::types::{FieldValue, ScoredMatch};
use serde::Serialize;
use std::collections::BTreeMap;

/// Driving elements paired with their merged matches.
///
/// Keeps the partitioning of the driving dataset. Iteration borrows the
/// response, so it can be walked any number of times; nothing is cloned until
/// the caller asks for owned pairs with [`LinkResponse::take`] or
/// [`LinkResponse::collect`].
#[derive(Debug, Clone, PartialEq)]
pub struct LinkResponse<T> {
  partitions: Vec<Vec<(T, Vec<ScoredMatch>)>>,
}

/// One row of the tabular form of a [`LinkResponse`].
#[derive(Debug, Serialize)]
struct LinkRow<'a, T> {
  element: &'a T,
  matches: Vec<BTreeMap<String, FieldValue>>,
}

impl<T> LinkResponse<T> {
  pub(crate) fn from_partitions(partitions: Vec<Vec<(T, Vec<ScoredMatch>)>>) -> Self {
    Self { partitions }
  }

  /// Number of linked elements.
  pub fn len(&self) -> usize {
    self.partitions.iter().map(Vec::len).sum()
  }

  /// Whether no element was linked.
  pub fn is_empty(&self) -> bool {
    self.partitions.iter().all(Vec::is_empty)
  }

  /// Number of partitions, equal to the driving dataset's.
  pub fn num_partitions(&self) -> usize {
    self.partitions.len()
  }

  /// Borrow the per-partition pairs.
  pub fn partitions(&self) -> &[Vec<(T, Vec<ScoredMatch>)>] {
    &self.partitions
  }

  /// Iterates the pairs in driving order, partition by partition.
  pub fn iter(&self) -> impl Iterator<Item = (&T, &[ScoredMatch])> {
    self
      .partitions
      .iter()
      .flatten()
      .map(|(element, matches)| (element, matches.as_slice()))
  }

  /// The first `n` pairs, owned.
  pub fn take(&self, n: usize) -> Vec<(T, Vec<ScoredMatch>)>
  where
    T: Clone,
  {
    self.partitions.iter().flatten().take(n).cloned().collect()
  }

  /// Every pair, owned.
  pub fn collect(&self) -> Vec<(T, Vec<ScoredMatch>)>
  where
    T: Clone,
  {
    self.partitions.iter().flatten().cloned().collect()
  }

  /// Consumes the response into its pairs.
  pub fn into_vec(self) -> Vec<(T, Vec<ScoredMatch>)> {
    self.partitions.into_iter().flatten().collect()
  }

  /// Renders the response as a JSON array of `{ "element", "matches" }`
  /// objects, each match flattened with [`ScoredMatch::to_row`].
  pub fn to_json(&self) -> Result<serde_json::Value>
  where
    T: Serialize,
  {
    let rows: Vec<LinkRow<'_, T>> = self
      .iter()
      .map(|(element, matches)| LinkRow {
        element,
        matches: matches.iter().map(ScoredMatch::to_row).collect(),
      })
      .collect();
    Ok(serde_json::to_value(rows)?)
  }
}

impl<T> IntoIterator for LinkResponse<T> {
  type Item = (T, Vec<ScoredMatch>);
  type IntoIter = std::iter::Flatten<std::vec::IntoIter<Vec<(T, Vec<ScoredMatch>)>>>;

  fn into_iter(self) -> Self::IntoIter {
    self.partitions.into_iter().flatten()
  }
}
