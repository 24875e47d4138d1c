//! Core data types for shapelink.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[cfg(feature = "parallel")]
pub trait Searchable: Send + Sync {}
#[cfg(feature = "parallel")]
impl<T: Send + Sync> Searchable for T {}

#[cfg(not(feature = "parallel"))]
pub trait Searchable {}
#[cfg(not(feature = "parallel"))]
impl<T> Searchable for T {}

/// Identifier of a document within one shard's local index.
///
/// Ids are assigned by the index in insertion order and are only unique per
/// shard; `(shard_index, doc_id)` identifies a document globally.
pub type DocId = u64;

/// Column holding the document id in a tabular row.
pub const DOC_ID_COLUMN: &str = "__doc_id__";
/// Column holding the match score in a tabular row.
pub const SCORE_COLUMN: &str = "__score__";
/// Column holding the producing shard in a tabular row.
pub const SHARD_INDEX_COLUMN: &str = "__shard_index__";

/// A single value stored in a document field.
///
/// The `#[serde(untagged)]` attribute keeps the JSON form plain: a field is
/// written as the bare string, number or boolean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
  /// A string value.
  String(String),
  /// An integer value.
  Integer(i64),
  /// A floating-point number value.
  Number(f64),
  /// A boolean value.
  Bool(bool),
}

impl From<&str> for FieldValue {
  fn from(value: &str) -> Self {
    FieldValue::String(value.to_string())
  }
}

impl From<String> for FieldValue {
  fn from(value: String) -> Self {
    FieldValue::String(value)
  }
}

impl From<i64> for FieldValue {
  fn from(value: i64) -> Self {
    FieldValue::Integer(value)
  }
}

impl From<f64> for FieldValue {
  fn from(value: f64) -> Self {
    FieldValue::Number(value)
  }
}

impl From<bool> for FieldValue {
  fn from(value: bool) -> Self {
    FieldValue::Bool(value)
  }
}

/// The stored, named fields that accompany a shape in a local index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
  /// Field name to value. Ordered so that exports are stable.
  pub fields: BTreeMap<String, FieldValue>,
}

impl Document {
  /// Creates an empty document.
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds a field, replacing any previous value under the same name.
  pub fn field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
    self.fields.insert(name.into(), value.into());
    self
  }

  /// Looks up a field by name.
  pub fn get(&self, name: &str) -> Option<&FieldValue> {
    self.fields.get(name)
  }
}

/// Direction in which scores rank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoreOrder {
  /// Higher scores are better (relevance).
  #[default]
  Descending,
  /// Lower scores are better (distance).
  Ascending,
}

impl ScoreOrder {
  /// Compares two scores so that `Ordering::Less` means `a` ranks ahead of `b`.
  pub fn compare(&self, a: f64, b: f64) -> Ordering {
    match self {
      ScoreOrder::Descending => b.total_cmp(&a),
      ScoreOrder::Ascending => a.total_cmp(&b),
    }
  }
}

/// One ranked hit produced by a shard.
///
/// Matches are immutable once produced. Their ranking is total: score first
/// (in the configured [`ScoreOrder`]), then `(shard_index, doc_id)`, so the
/// same set of matches always ranks the same way no matter which shard
/// reported first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMatch {
  /// Relevance or distance score assigned by the local index.
  pub score: f64,
  /// Document id within the producing shard.
  pub doc_id: DocId,
  /// Shard that produced the match.
  pub shard_index: usize,
  /// Stored fields of the matched document.
  #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
  pub fields: BTreeMap<String, FieldValue>,
}

impl ScoredMatch {
  /// Creates a match with no stored fields.
  pub fn new(score: f64, doc_id: DocId, shard_index: usize) -> Self {
    Self {
      score,
      doc_id,
      shard_index,
      fields: BTreeMap::new(),
    }
  }

  /// Adds a stored field to the match.
  pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
    self.fields.insert(name.into(), value.into());
    self
  }

  /// Ranks `self` against `other`; `Ordering::Less` means `self` is better.
  pub fn rank_cmp(&self, other: &Self, order: ScoreOrder) -> Ordering {
    order
      .compare(self.score, other.score)
      .then_with(|| self.shard_index.cmp(&other.shard_index))
      .then_with(|| self.doc_id.cmp(&other.doc_id))
  }

  /// Flattens the match into a row: the stored fields plus the synthetic
  /// id, score and shard columns. Synthetic columns win on name clashes.
  pub fn to_row(&self) -> BTreeMap<String, FieldValue> {
    let mut row = self.fields.clone();
    row.insert(DOC_ID_COLUMN.to_string(), FieldValue::Integer(self.doc_id as i64));
    row.insert(SCORE_COLUMN.to_string(), FieldValue::Number(self.score));
    row.insert(
      SHARD_INDEX_COLUMN.to_string(),
      FieldValue::Integer(self.shard_index as i64),
    );
    row
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_rank_descending_then_identity() {
    let a = ScoredMatch::new(0.9, 4, 1);
    let b = ScoredMatch::new(0.5, 0, 0);
    let c = ScoredMatch::new(0.9, 2, 1);
    let d = ScoredMatch::new(0.9, 9, 0);

    assert_eq!(a.rank_cmp(&b, ScoreOrder::Descending), Ordering::Less);
    assert_eq!(c.rank_cmp(&a, ScoreOrder::Descending), Ordering::Less);
    assert_eq!(d.rank_cmp(&c, ScoreOrder::Descending), Ordering::Less);
    assert_eq!(a.rank_cmp(&a.clone(), ScoreOrder::Descending), Ordering::Equal);
  }

  #[test]
  fn test_rank_ascending() {
    let near = ScoredMatch::new(1.5, 0, 0);
    let far = ScoredMatch::new(40.0, 0, 0);
    assert_eq!(near.rank_cmp(&far, ScoreOrder::Ascending), Ordering::Less);
    assert_eq!(near.rank_cmp(&far, ScoreOrder::Descending), Ordering::Greater);
  }

  #[test]
  fn test_to_row_adds_synthetic_columns() {
    let m = ScoredMatch::new(0.25, 17, 3)
      .with_field("name", "Lyon")
      .with_field("population", 513_275i64);
    let row = m.to_row();

    assert_eq!(row.get("name"), Some(&FieldValue::from("Lyon")));
    assert_eq!(row.get(DOC_ID_COLUMN), Some(&FieldValue::Integer(17)));
    assert_eq!(row.get(SCORE_COLUMN), Some(&FieldValue::Number(0.25)));
    assert_eq!(row.get(SHARD_INDEX_COLUMN), Some(&FieldValue::Integer(3)));
    assert_eq!(row.len(), 5);
  }

  #[test]
  fn test_field_value_json_is_untagged() {
    let doc = Document::new().field("city", "Nice").field("coastal", true);
    let json = serde_json::to_value(&doc.fields).unwrap();
    assert_eq!(json, serde_json::json!({ "city": "Nice", "coastal": true }));
  }
}
