//! Context handed to each shard while it works on one link job.

use crate::dataset::Broadcast;
use crate::geo::{Point, SpatialRelation};

/// A driving-side query: its correlation key and the point to search around.
pub type QueryPoint = (u64, Point);

/// Read-only state every shard sees while executing one link job.
///
/// The query list is gathered once on the caller's side and broadcast; the
/// context only borrows it, so its lifetime ends with the job that created it.
pub struct ShardContext<'a> {
  /// The broadcast driving-side queries.
  pub queries: &'a Broadcast<Vec<QueryPoint>>,
  /// Search radius in kilometres.
  pub radius_km: f64,
  /// Maximum matches kept per query.
  pub k: usize,
  /// Relation each matched shape must satisfy.
  pub relation: SpatialRelation,
}

impl<'a> ShardContext<'a> {
  /// Creates a context over `queries`.
  pub fn new(
    queries: &'a Broadcast<Vec<QueryPoint>>,
    radius_km: f64,
    k: usize,
    relation: SpatialRelation,
  ) -> Self {
    Self {
      queries,
      radius_km,
      k,
      relation,
    }
  }

  /// The queries to run on this shard.
  pub fn queries(&self) -> &[QueryPoint] {
    self.queries.value()
  }
}
