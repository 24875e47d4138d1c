//! Error types for shapelink.
//!
//! Every fallible operation in the crate returns [`Result`]. Per-shard
//! failures are never retried here; they surface to the caller as-is.

use thiserror::Error;

/// Result type alias for shapelink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A failure attributed to one shard, collected during best-effort teardown.
#[derive(Debug)]
pub struct ShardFailure {
  /// Index of the shard that failed.
  pub shard: usize,
  /// The error it reported.
  pub error: Error,
}

impl std::fmt::Display for ShardFailure {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "shard {}: {}", self.shard, self.error)
  }
}

/// Error kinds produced by the search layer.
#[derive(Debug, Error)]
pub enum Error {
  /// An entry could not be converted into an indexable shape or document.
  /// The shard's build is abandoned and no partial partition is returned.
  #[error("shard {shard}: failed to index entry {entry}: {reason}")]
  Construction {
    /// Shard being built.
    shard: usize,
    /// Position of the offending entry within the shard's input.
    entry: usize,
    /// Reason reported by the conversion or the index.
    reason: String,
  },

  /// A query was rejected before dispatch (bad radius, coordinates or relation).
  #[error("invalid query: {0}")]
  Query(String),

  /// The partition's index has already been released.
  #[error("search partition {shard} is closed")]
  ResourceClosed {
    /// Shard whose partition was closed.
    shard: usize,
  },

  /// Two top-k accumulators with different capacity or ordering were combined.
  #[error("incompatible top-k accumulators: {0}")]
  MergeIncompatible(String),

  /// A top-k accumulator was requested with a capacity of zero.
  #[error("top-k capacity must be positive, got {0}")]
  InvalidCapacity(usize),

  /// The collection builder is missing something it needs.
  #[error("configuration error: {0}")]
  Config(String),

  /// The local index backend reported a failure.
  #[error("index error: {0}")]
  Index(String),

  /// One or more shards failed to release their index.
  #[error("failed to close {} shard(s): {}", .0.len(), join_failures(.0))]
  CloseFailures(Vec<ShardFailure>),

  /// Result export failed.
  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

fn join_failures(failures: &[ShardFailure]) -> String {
  failures
    .iter()
    .map(|f| f.to_string())
    .collect::<Vec<_>>()
    .join("; ")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_construction_display() {
    let err = Error::Construction {
      shard: 2,
      entry: 7,
      reason: "latitude out of range".to_string(),
    };
    let msg = err.to_string();
    assert!(msg.contains("shard 2"));
    assert!(msg.contains("entry 7"));
    assert!(msg.contains("latitude out of range"));
  }

  #[test]
  fn test_close_failures_display_lists_every_shard() {
    let err = Error::CloseFailures(vec![
      ShardFailure {
        shard: 0,
        error: Error::Index("disk gone".to_string()),
      },
      ShardFailure {
        shard: 3,
        error: Error::Index("handle leaked".to_string()),
      },
    ]);
    let msg = err.to_string();
    assert!(msg.starts_with("failed to close 2 shard(s)"));
    assert!(msg.contains("shard 0: index error: disk gone"));
    assert!(msg.contains("shard 3: index error: handle leaked"));
  }
}
