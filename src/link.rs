//! Distributed radius join between a sharded index and a driving dataset.
//!
//! The driving side is small: every element's point is gathered, given a
//! correlation key and broadcast to all shards. Each shard searches locally,
//! the per-key partial results are reduced with [`TopK::plus`], and the merged
//! matches are joined back to the driving elements by key.

use crate::collection::ShardedIndex;
use crate::context::{QueryPoint, ShardContext};
use crate::dataset::{reduce_by_key, try_map_partitions, Broadcast, PartitionedDataset};
use crate::error::{Error, Result};
use crate::geo::{Point, SpatialRelation};
use crate::response::LinkResponse;
use crate::topk::TopK;
use crate::types::Searchable;
use serde::{Deserialize, Serialize};

fn default_k() -> usize {
  10
}

/// Parameters of a [`ShardedIndex::link_by_radius`] call.
///
/// Deserializes from a config value where only `radius_km` is required:
///
/// ```rust
/// use shapelink::prelude::*;
///
/// let options: LinkOptions = serde_json::from_str(r#"{ "radius_km": 2.5 }"#).unwrap();
/// assert_eq!(options.k, 10);
/// assert_eq!(options.relation, SpatialRelation::Intersects);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkOptions {
  /// Search radius around each driving point, in kilometres.
  pub radius_km: f64,
  /// Maximum matches kept per driving element.
  #[serde(default = "default_k")]
  pub k: usize,
  /// Relation every matched shape must satisfy.
  #[serde(default)]
  pub relation: SpatialRelation,
}

impl LinkOptions {
  /// Options for `radius_km` with the default `k` and relation.
  pub fn new(radius_km: f64) -> Self {
    Self {
      radius_km,
      k: default_k(),
      relation: SpatialRelation::default(),
    }
  }

  /// Set the per-element match cap.
  pub fn k(mut self, k: usize) -> Self {
    self.k = k;
    self
  }

  /// Set the spatial relation.
  pub fn relation(mut self, relation: SpatialRelation) -> Self {
    self.relation = relation;
    self
  }
}

impl<K, V> ShardedIndex<K, V>
where
  K: Searchable,
  V: Searchable,
{
  /// Links every element of `driving` to its best matches in this index.
  ///
  /// `point_fn` extracts the query point of each driving element. The result
  /// keeps the driving dataset's partitioning and element order; elements
  /// without any match are left out. With `k == 0` every element is paired
  /// with an empty match list and no shard is queried.
  ///
  /// The radius and every driving point are validated before any shard work
  /// starts.
  ///
  /// # Examples
  ///
  /// ```rust
  /// use shapelink::prelude::*;
  ///
  /// let stations = PartitionedDataset::from_vec(
  ///     vec![(1u32, Point::new(48.8443, 2.3744)), (2, Point::new(48.8809, 2.3553))],
  ///     2,
  /// );
  /// let index: ShardedIndex<u32, Point> = ShardedIndex::builder()
  ///     .shape(|_, p| Ok(Shape::Point(*p)))
  ///     .build(stations)
  ///     .unwrap();
  ///
  /// let hotels = PartitionedDataset::from_vec(vec!["left bank", "far away"], 1);
  /// let linked = index
  ///     .link_by_radius(
  ///         &hotels,
  ///         |name| match *name {
  ///             "left bank" => Point::new(48.8462, 2.3371),
  ///             _ => Point::new(43.2965, 5.3698),
  ///         },
  ///         LinkOptions::new(5.0).k(1),
  ///     )
  ///     .unwrap();
  ///
  /// assert_eq!(linked.len(), 1);
  /// assert_eq!(linked.iter().next().unwrap().1.len(), 1);
  /// ```
  pub fn link_by_radius<T, F>(
    &self,
    driving: &PartitionedDataset<T>,
    point_fn: F,
    options: LinkOptions,
  ) -> Result<LinkResponse<T>>
  where
    T: Clone + Searchable,
    F: Fn(&T) -> Point + Searchable,
  {
    let LinkOptions { radius_km, k, relation } = options;

    if !radius_km.is_finite() || radius_km < 0.0 {
      return Err(Error::Query(format!(
        "radius must be a non-negative number of kilometres, got {}",
        radius_km
      )));
    }

    // Correlation keys are global element positions in the driving dataset.
    let offsets = driving.index_offsets();
    let mut queries: Vec<QueryPoint> = Vec::with_capacity(driving.len());
    for (partition, offset) in driving.partitions().iter().zip(&offsets) {
      for (i, element) in partition.iter().enumerate() {
        let point = point_fn(element);
        point.validate().map_err(Error::Query)?;
        queries.push((offset + i as u64, point));
      }
    }

    if k == 0 {
      return Ok(LinkResponse::from_partitions(
        driving
          .partitions()
          .iter()
          .map(|p| p.iter().map(|e| (e.clone(), Vec::new())).collect())
          .collect(),
      ));
    }

    let queries = Broadcast::new(queries);
    tracing::debug!(
      target: "shapelink::link",
      queries = queries.len(),
      shards = self.num_shards(),
      "Broadcasting link queries"
    );

    let ctx = ShardContext::new(&queries, radius_km, k, relation);
    let partials = try_map_partitions(self.partitions(), |_, p| p.link(&ctx))?;
    let merged = reduce_by_key(partials, |a: &TopK, b: &TopK| a.plus(b))?;

    let partitions: Vec<Vec<(T, Vec<_>)>> = driving
      .partitions()
      .iter()
      .zip(&offsets)
      .map(|(partition, offset)| {
        partition
          .iter()
          .enumerate()
          .filter_map(|(i, element)| {
            merged
              .get(&(offset + i as u64))
              .map(|top| (element.clone(), top.materialize().to_vec()))
          })
          .collect()
      })
      .collect();
    let matched: usize = partitions.iter().map(Vec::len).sum();

    tracing::info!(
      target: "shapelink::link",
      driving = driving.len(),
      matched,
      k,
      radius_km,
      relation = %relation,
      "Radius link finished"
    );

    Ok(LinkResponse::from_partitions(partitions))
  }
}
