//! A search partition: one shard's entries and the local index built over them.

use crate::context::ShardContext;
use crate::convert::IndexSchema;
use crate::error::{Error, Result};
use crate::geo::{Point, SpatialRelation};
use crate::index::{IndexHit, LocalIndex, SpatialQuery};
use crate::topk::TopK;
use crate::types::{ScoredMatch, Searchable};
use std::sync::Arc;

/// Live state of an open partition.
struct PartitionState<K, V> {
  entries: Vec<(K, V)>,
  index: Box<dyn LocalIndex>,
}

/// One shard's searchable data.
///
/// The index is built eagerly when the partition is created and never changes
/// afterwards; [`SearchPartition::filter`] produces a new partition instead.
/// The index must be released exactly once: [`SearchPartition::close`] does
/// so explicitly, and dropping an open partition does so implicitly.
pub struct SearchPartition<K, V> {
  shard_index: usize,
  /// `None` once closed.
  state: Option<PartitionState<K, V>>,
  schema: Arc<IndexSchema<K, V>>,
}

impl<K, V> SearchPartition<K, V>
where
  K: Searchable,
  V: Searchable,
{
  /// Builds the partition for `shard_index` from its entries.
  ///
  /// Every entry is converted to a shape and a document and added to a fresh
  /// local index. The first entry that fails to convert or index aborts the
  /// build; the half-built index is released before the error is returned.
  pub fn build(shard_index: usize, entries: Vec<(K, V)>, schema: Arc<IndexSchema<K, V>>) -> Result<Self> {
    let index = schema.factory.create(shard_index)?;
    let mut partition = Self {
      shard_index,
      state: Some(PartitionState {
        entries: Vec::with_capacity(entries.len()),
        index,
      }),
      schema,
    };

    for (position, (key, value)) in entries.into_iter().enumerate() {
      partition.add(position, key, value)?;
    }

    tracing::debug!(
      target: "shapelink::partition",
      shard = shard_index,
      entries = partition.state.as_ref().map_or(0, |s| s.entries.len()),
      "Search partition built"
    );

    Ok(partition)
  }

  fn add(&mut self, position: usize, key: K, value: V) -> Result<()> {
    let shard = self.shard_index;
    let construction = |reason: String| Error::Construction {
      shard,
      entry: position,
      reason,
    };

    let shape = self.schema.shape.to_shape(&key, &value).map_err(construction)?;
    shape.validate().map_err(construction)?;
    let document = self.schema.document.to_document(&key, &value).map_err(construction)?;

    let state = self.state.as_mut().ok_or(Error::ResourceClosed { shard })?;
    state
      .index
      .add(shape, document)
      .map_err(|e| construction(e.to_string()))?;
    state.entries.push((key, value));
    Ok(())
  }

  fn state(&self) -> Result<&PartitionState<K, V>> {
    self.state.as_ref().ok_or(Error::ResourceClosed {
      shard: self.shard_index,
    })
  }

  /// Shard this partition belongs to.
  pub fn shard_index(&self) -> usize {
    self.shard_index
  }

  /// Whether [`SearchPartition::close`] has run.
  pub fn is_closed(&self) -> bool {
    self.state.is_none()
  }

  /// Number of indexed entries.
  pub fn size(&self) -> Result<usize> {
    Ok(self.state()?.index.len())
  }

  /// Iterates the entries in shard-local order. Call again to restart.
  pub fn iter(&self) -> Result<std::slice::Iter<'_, (K, V)>> {
    Ok(self.state()?.entries.iter())
  }

  /// Whether an entry with `key` exists in this shard.
  pub fn is_defined(&self, key: &K) -> Result<bool>
  where
    K: PartialEq,
  {
    Ok(self.state()?.entries.iter().any(|(k, _)| k == key))
  }

  /// Returns up to `k` best matches whose shape stands in `relation` to the
  /// circle of `radius_km` around `center`, best first.
  pub fn circle_search(
    &self,
    center: Point,
    radius_km: f64,
    k: usize,
    relation: SpatialRelation,
  ) -> Result<Vec<ScoredMatch>> {
    validate_circle(&center, radius_km)?;
    self.run(
      &SpatialQuery::Circle {
        center,
        radius_km,
        relation,
      },
      k,
    )
  }

  /// Returns the `k` entries nearest to `point`, best first.
  pub fn knn_search(&self, point: Point, k: usize) -> Result<Vec<ScoredMatch>> {
    point.validate().map_err(Error::Query)?;
    self.run(&SpatialQuery::Nearest { point }, k)
  }

  fn run(&self, query: &SpatialQuery, k: usize) -> Result<Vec<ScoredMatch>> {
    let state = self.state()?;
    if k == 0 {
      return Ok(Vec::new());
    }

    let hits = state.index.search(query, k, self.schema.order)?;
    Ok(
      hits
        .into_iter()
        .map(|hit| self.to_match(hit))
        .collect(),
    )
  }

  fn to_match(&self, hit: IndexHit) -> ScoredMatch {
    ScoredMatch {
      score: hit.score,
      doc_id: hit.doc_id,
      shard_index: self.shard_index,
      fields: hit.document.fields,
    }
  }

  /// Runs every broadcast query of `ctx` against this shard.
  ///
  /// Each non-empty result is wrapped in its own accumulator and tagged with
  /// the query's correlation key. Queries without matches produce nothing.
  pub fn link(&self, ctx: &ShardContext<'_>) -> Result<Vec<(u64, TopK)>> {
    let mut partials = Vec::new();
    for (key, point) in ctx.queries() {
      let matches = self.circle_search(*point, ctx.radius_km, ctx.k, ctx.relation)?;
      if matches.is_empty() {
        continue;
      }
      partials.push((*key, TopK::from_matches(ctx.k, self.schema.order, matches)?));
    }

    tracing::debug!(
      target: "shapelink::partition",
      shard = self.shard_index,
      queries = ctx.queries().len(),
      matched = partials.len(),
      "Shard link pass finished"
    );

    Ok(partials)
  }

  /// Builds a new partition holding only the entries accepted by `predicate`.
  /// This partition is left untouched.
  pub fn filter<P>(&self, predicate: P) -> Result<Self>
  where
    P: Fn(&K, &V) -> bool,
    K: Clone,
    V: Clone,
  {
    let entries: Vec<(K, V)> = self
      .state()?
      .entries
      .iter()
      .filter(|(k, v)| predicate(k, v))
      .cloned()
      .collect();

    Self::build(self.shard_index, entries, Arc::clone(&self.schema))
  }
}

impl<K, V> SearchPartition<K, V> {
  /// Releases the local index. Calling it again is a no-op.
  ///
  /// The partition is considered closed even if the index reports a failure
  /// while releasing; the failure is returned once.
  pub fn close(&mut self) -> Result<()> {
    match self.state.take() {
      Some(mut state) => {
        let released = state.index.release();
        tracing::debug!(
          target: "shapelink::partition",
          shard = self.shard_index,
          ok = released.is_ok(),
          "Search partition closed"
        );
        released
      }
      None => Ok(()),
    }
  }
}

impl<K, V> Drop for SearchPartition<K, V> {
  fn drop(&mut self) {
    if let Err(e) = self.close() {
      tracing::warn!(
        target: "shapelink::partition",
        shard = self.shard_index,
        error = %e,
        "Failed to release search partition on drop"
      );
    }
  }
}

/// Rejects circle queries that could not mean anything.
pub(crate) fn validate_circle(center: &Point, radius_km: f64) -> Result<()> {
  center.validate().map_err(Error::Query)?;
  if !radius_km.is_finite() || radius_km < 0.0 {
    return Err(Error::Query(format!(
      "radius must be a non-negative number of kilometres, got {}",
      radius_km
    )));
  }
  Ok(())
}
