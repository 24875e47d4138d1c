//! Conversion capabilities that turn a `(key, value)` entry into something a
//! local index can store.
//!
//! A search partition is generic over its key and value types; all it needs
//! is a way to derive a [`Shape`] and a [`Document`] from each entry. Both
//! conversions are traits with blanket implementations for plain closures.

use crate::geo::Shape;
use crate::index::{IndexFactory, InMemIndexFactory};
use crate::types::{Document, ScoreOrder, Searchable};
use std::sync::Arc;

/// Derives the indexed geometry of an entry.
pub trait ShapeConversion<K, V>: Searchable {
  /// Returns the entry's shape, or a reason it has none.
  fn to_shape(&self, key: &K, value: &V) -> Result<Shape, String>;
}

impl<K, V, F> ShapeConversion<K, V> for F
where
  F: Fn(&K, &V) -> Result<Shape, String> + Searchable,
{
  fn to_shape(&self, key: &K, value: &V) -> Result<Shape, String> {
    self(key, value)
  }
}

/// Derives the stored fields of an entry.
pub trait DocumentConversion<K, V>: Searchable {
  /// Returns the entry's document, or a reason it cannot be stored.
  fn to_document(&self, key: &K, value: &V) -> Result<Document, String>;
}

impl<K, V, F> DocumentConversion<K, V> for F
where
  F: Fn(&K, &V) -> Result<Document, String> + Searchable,
{
  fn to_document(&self, key: &K, value: &V) -> Result<Document, String> {
    self(key, value)
  }
}

fn empty_document<K, V>(_: &K, _: &V) -> Result<Document, String> {
  Ok(Document::new())
}

/// Everything a shard needs to build (and rebuild) its local index.
///
/// Shared by every partition of a collection and by the partitions derived
/// from it through `filter`.
pub struct IndexSchema<K, V> {
  pub(crate) shape: Arc<dyn ShapeConversion<K, V>>,
  pub(crate) document: Arc<dyn DocumentConversion<K, V>>,
  pub(crate) factory: Arc<dyn IndexFactory>,
  pub(crate) order: ScoreOrder,
}

impl<K, V> IndexSchema<K, V> {
  /// Creates a schema storing empty documents in [`InMemIndex`](crate::index::InMemIndex)
  /// instances ranked best-score-first.
  pub fn new(shape: Arc<dyn ShapeConversion<K, V>>) -> Self
  where
    K: 'static,
    V: 'static,
  {
    Self {
      shape,
      document: Arc::new(empty_document::<K, V>),
      factory: Arc::new(InMemIndexFactory::default()),
      order: ScoreOrder::default(),
    }
  }

  /// Replaces the document conversion.
  pub fn with_document(mut self, document: Arc<dyn DocumentConversion<K, V>>) -> Self {
    self.document = document;
    self
  }

  /// Replaces the index factory.
  pub fn with_factory(mut self, factory: Arc<dyn IndexFactory>) -> Self {
    self.factory = factory;
    self
  }

  /// Sets the score ranking direction.
  pub fn with_order(mut self, order: ScoreOrder) -> Self {
    self.order = order;
    self
  }

  /// Ranking direction used by partitions built with this schema.
  pub fn order(&self) -> ScoreOrder {
    self.order
  }
}
