//! Shard-local index backends.

pub mod adapter;
pub mod memory;

pub use adapter::{IndexFactory, IndexHit, LocalIndex, SpatialQuery};
pub use memory::{InMemIndex, InMemIndexFactory, ScoreKind};
