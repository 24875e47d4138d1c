//! Defines the `LocalIndex` trait for pluggable per-shard index backends.

use crate::error::Result;
use crate::geo::{Point, Shape, SpatialRelation};
use crate::types::{DocId, Document, ScoreOrder, Searchable};

/// A bounded spatial query executed against one local index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpatialQuery {
  /// Shapes standing in `relation` to the circle `(center, radius_km)`.
  Circle {
    /// Centre of the query circle.
    center: Point,
    /// Radius of the query circle in kilometres.
    radius_km: f64,
    /// Relation the indexed shape must satisfy.
    relation: SpatialRelation,
  },
  /// Shapes nearest to `point`, with no distance bound.
  Nearest {
    /// Reference location.
    point: Point,
  },
}

/// One hit returned by a local index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
  /// Id the index assigned when the document was added.
  pub doc_id: DocId,
  /// Score under the index's scoring scheme.
  pub score: f64,
  /// Stored fields of the document.
  pub document: Document,
}

/// A trait that defines the common interface for a shard-local index.
///
/// An index holds resources that are not reclaimed by simply dropping a
/// handle to it, so owners must call [`LocalIndex::release`] exactly once
/// when they are done. Implementations must reject every other call after
/// release.
///
/// The `Searchable` bound is required to allow shards to be worked on
/// concurrently.
pub trait LocalIndex: Searchable {
  /// Stores a shape and its document, returning the assigned id.
  fn add(&mut self, shape: Shape, document: Document) -> Result<DocId>;

  /// Number of stored documents. Must not scan the index.
  fn len(&self) -> usize;

  /// Whether the index holds no document.
  fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Executes `query` and returns at most `k` hits, best first under `order`.
  ///
  /// Implementations must never hold more than `k` candidates at once.
  fn search(&self, query: &SpatialQuery, k: usize, order: ScoreOrder) -> Result<Vec<IndexHit>>;

  /// Releases every resource held by the index.
  fn release(&mut self) -> Result<()>;
}

/// Creates fresh local indexes, one per shard build.
pub trait IndexFactory: Searchable {
  /// Creates an empty index for `shard_index`.
  fn create(&self, shard_index: usize) -> Result<Box<dyn LocalIndex>>;
}

impl<F> IndexFactory for F
where
  F: Fn(usize) -> Result<Box<dyn LocalIndex>> + Searchable,
{
  fn create(&self, shard_index: usize) -> Result<Box<dyn LocalIndex>> {
    self(shard_index)
  }
}
