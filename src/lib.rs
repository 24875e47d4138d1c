//! Shapelink - sharded geospatial search with bounded top-k merging.
//!
//! Shapelink attaches a local spatial index to every shard of a partitioned
//! dataset and answers queries across all shards: per-shard lookups, global
//! circle and nearest-neighbour searches, and a radius join ("link") that pairs
//! every element of a second dataset with its best matches in the index.
//! Per-shard results are combined with a bounded, commutative top-k merge, so
//! the answer never depends on the order in which shards finish.

pub mod collection;
pub mod context;
pub mod convert;
pub mod dataset;
pub mod error;
pub mod geo;
pub mod index;
pub mod link;
pub mod partition;
pub mod response;
pub mod topk;
pub mod types;

pub mod prelude {
  //! Convenient re-exports for common types and traits.

  pub use crate::collection::*;
  pub use crate::convert::*;
  pub use crate::dataset::*;
  pub use crate::error::{Error, ShardFailure};
  pub use crate::geo::*;
  pub use crate::index::*;
  pub use crate::link::*;
  pub use crate::partition::SearchPartition;
  pub use crate::response::*;
  pub use crate::topk::*;
  pub use crate::types::*;
}
