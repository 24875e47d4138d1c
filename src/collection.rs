//! The sharded index that composes one search partition per shard.

use crate::convert::{DocumentConversion, IndexSchema, ShapeConversion};
use crate::dataset::{map_partitions_mut, try_map_partitions, PartitionedDataset};
use crate::error::{Error, Result, ShardFailure};
use crate::geo::{Point, Shape, SpatialRelation};
use crate::index::{IndexFactory, InMemIndexFactory, ScoreKind};
use crate::partition::{validate_circle, SearchPartition};
use crate::topk::TopK;
use crate::types::{Document, ScoreOrder, ScoredMatch, Searchable};
use std::sync::Arc;

/// A searchable collection made of one [`SearchPartition`] per shard.
///
/// `ShardedIndex` is the entry point of the library. It is built from a
/// [`PartitionedDataset`] of `(key, value)` entries, keeps the dataset's
/// shard layout, and answers queries by fanning out to every shard and
/// recombining their answers. Shards share no mutable state, so all
/// per-shard work runs in parallel when the `parallel` feature is enabled.
///
/// Create a `ShardedIndex` using the [`ShardedIndexBuilder`].
///
/// # Examples
///
/// ```rust
/// use shapelink::prelude::*;
///
/// let cities = PartitionedDataset::from_vec(
///     vec![
///         ("paris".to_string(), (48.8566, 2.3522)),
///         ("lyon".to_string(), (45.7640, 4.8357)),
///         ("berlin".to_string(), (52.5200, 13.4050)),
///     ],
///     2,
/// );
///
/// let index: ShardedIndex<String, (f64, f64)> = ShardedIndex::builder()
///     .shape(|_, &(lat, lon): &(f64, f64)| Ok(Shape::Point(Point::new(lat, lon))))
///     .document(|name: &String, _| Ok(Document::new().field("name", name.clone())))
///     .build(cities)
///     .unwrap();
///
/// assert_eq!(index.count().unwrap(), 3);
/// assert!(index.exists(&"lyon".to_string()).unwrap());
///
/// let near_paris = index
///     .circle_search(Point::new(48.85, 2.35), 500.0, 5, SpatialRelation::Intersects)
///     .unwrap();
/// assert_eq!(near_paris.len(), 2);
/// ```
pub struct ShardedIndex<K, V> {
  /// One partition per shard, in shard order.
  partitions: Vec<SearchPartition<K, V>>,
  /// Conversions and backend shared by every partition.
  schema: Arc<IndexSchema<K, V>>,
}

impl<K, V> ShardedIndex<K, V>
where
  K: Searchable,
  V: Searchable,
{
  /// Creates a new `ShardedIndexBuilder` to construct an index.
  pub fn builder() -> ShardedIndexBuilder<K, V> {
    ShardedIndexBuilder::new()
  }

  /// Builds one partition per dataset partition using `schema`.
  ///
  /// If any shard fails to build, the shards that did build are released
  /// and the first failure is returned.
  pub fn from_dataset(dataset: PartitionedDataset<(K, V)>, schema: IndexSchema<K, V>) -> Result<Self> {
    let schema = Arc::new(schema);
    let shards: Vec<Vec<(K, V)>> = dataset.into_partitions();
    let num_shards = shards.len();

    // Each task takes its shard's entries out of its own slot.
    let mut slots: Vec<Option<Vec<(K, V)>>> = shards.into_iter().map(Some).collect();
    let built = map_partitions_mut(&mut slots, |shard, slot| {
      let entries = slot.take().unwrap_or_default();
      SearchPartition::build(shard, entries, Arc::clone(&schema))
    });
    let partitions = built.into_iter().collect::<Result<Vec<_>>>()?;

    let index = Self { partitions, schema };
    tracing::info!(
      target: "shapelink::collection",
      shards = num_shards,
      entries = index.count()?,
      "Sharded index built"
    );
    Ok(index)
  }

  /// Number of shards.
  pub fn num_shards(&self) -> usize {
    self.partitions.len()
  }

  /// The per-shard partitions, in shard order.
  pub fn partitions(&self) -> &[SearchPartition<K, V>] {
    &self.partitions
  }

  /// Ranking direction shared by every shard.
  pub fn score_order(&self) -> ScoreOrder {
    self.schema.order()
  }

  /// Total number of indexed entries across all shards.
  pub fn count(&self) -> Result<usize> {
    let sizes = try_map_partitions(&self.partitions, |_, p| p.size())?;
    Ok(sizes.into_iter().sum())
  }

  /// Whether any shard holds an entry with `key`.
  pub fn exists(&self, key: &K) -> Result<bool>
  where
    K: PartialEq,
  {
    for partition in &self.partitions {
      if partition.is_defined(key)? {
        return Ok(true);
      }
    }
    Ok(false)
  }

  /// Iterates every entry, shard by shard.
  pub fn iter(&self) -> Result<impl Iterator<Item = &(K, V)>> {
    let iters = self
      .partitions
      .iter()
      .map(SearchPartition::iter)
      .collect::<Result<Vec<_>>>()?;
    Ok(iters.into_iter().flatten())
  }

  /// Builds a new index holding only the entries accepted by `predicate`.
  ///
  /// Every shard filters its own entries; nothing moves between shards and
  /// this index stays usable.
  pub fn filter<P>(&self, predicate: P) -> Result<Self>
  where
    P: Fn(&K, &V) -> bool + Searchable,
    K: Clone,
    V: Clone,
  {
    let partitions = try_map_partitions(&self.partitions, |_, p| p.filter(&predicate))?;
    let filtered = Self {
      partitions,
      schema: Arc::clone(&self.schema),
    };

    tracing::info!(
      target: "shapelink::collection",
      shards = filtered.num_shards(),
      entries = filtered.count()?,
      "Sharded index filtered"
    );
    Ok(filtered)
  }

  /// Returns the best `k` matches across all shards whose shape stands in
  /// `relation` to the circle of `radius_km` around `center`.
  pub fn circle_search(
    &self,
    center: Point,
    radius_km: f64,
    k: usize,
    relation: SpatialRelation,
  ) -> Result<Vec<ScoredMatch>> {
    validate_circle(&center, radius_km)?;
    self.merge_shards(k, |p| p.circle_search(center, radius_km, k, relation))
  }

  /// Returns the `k` entries nearest to `point` across all shards.
  pub fn knn_search(&self, point: Point, k: usize) -> Result<Vec<ScoredMatch>> {
    point.validate().map_err(Error::Query)?;
    self.merge_shards(k, |p| p.knn_search(point, k))
  }

  /// Runs `search` on every shard and merges the per-shard results.
  fn merge_shards<F>(&self, k: usize, search: F) -> Result<Vec<ScoredMatch>>
  where
    F: Fn(&SearchPartition<K, V>) -> Result<Vec<ScoredMatch>> + Searchable,
  {
    if k == 0 {
      return Ok(Vec::new());
    }

    let order = self.score_order();
    let partials = try_map_partitions(&self.partitions, |_, p| TopK::from_matches(k, order, search(p)?))?;

    let mut merged = TopK::zero(k, order)?;
    for partial in &partials {
      merged = merged.plus(partial)?;
    }
    Ok(merged.into_vec())
  }
}

impl<K, V> ShardedIndex<K, V> {
  /// Releases every shard's index.
  ///
  /// Every shard is attempted even when some fail; failures are collected
  /// and returned together. Closing twice is a no-op.
  pub fn close(&mut self) -> Result<()>
  where
    K: Searchable,
    V: Searchable,
  {
    let results = map_partitions_mut(&mut self.partitions, |shard, p| (shard, p.close()));

    let failures: Vec<ShardFailure> = results
      .into_iter()
      .filter_map(|(shard, result)| result.err().map(|error| ShardFailure { shard, error }))
      .collect();

    if failures.is_empty() {
      tracing::info!(
        target: "shapelink::collection",
        shards = self.partitions.len(),
        "Sharded index closed"
      );
      return Ok(());
    }

    for failure in &failures {
      tracing::warn!(
        target: "shapelink::collection",
        shard = failure.shard,
        error = %failure.error,
        "Failed to close shard"
      );
    }
    Err(Error::CloseFailures(failures))
  }
}

/// A builder for creating `ShardedIndex` instances.
///
/// A shape conversion is required. The document conversion defaults to an
/// empty document and the score order to [`ScoreOrder::Descending`]. Without
/// an explicit backend, shards use an [`InMemIndexFactory`] whose
/// [`ScoreKind`] agrees with the score order.
pub struct ShardedIndexBuilder<K, V> {
  shape: Option<Arc<dyn ShapeConversion<K, V>>>,
  document: Option<Arc<dyn DocumentConversion<K, V>>>,
  factory: Option<Arc<dyn IndexFactory>>,
  order: ScoreOrder,
}

impl<K, V> ShardedIndexBuilder<K, V> {
  /// Creates a new, empty `ShardedIndexBuilder`.
  pub fn new() -> Self {
    Self {
      shape: None,
      document: None,
      factory: None,
      order: ScoreOrder::default(),
    }
  }

  /// Sets how an entry is turned into an indexed shape.
  pub fn shape<F>(mut self, conversion: F) -> Self
  where
    F: Fn(&K, &V) -> std::result::Result<Shape, String> + Searchable + 'static,
  {
    self.shape = Some(Arc::new(conversion));
    self
  }

  /// Sets how an entry is turned into its stored document.
  pub fn document<F>(mut self, conversion: F) -> Self
  where
    F: Fn(&K, &V) -> std::result::Result<Document, String> + Searchable + 'static,
  {
    self.document = Some(Arc::new(conversion));
    self
  }

  /// Sets the backend creating each shard's local index.
  pub fn index_factory(mut self, factory: impl IndexFactory + 'static) -> Self {
    self.factory = Some(Arc::new(factory));
    self
  }

  /// Sets the direction in which scores rank.
  ///
  /// The default backend follows this order. A backend set with
  /// [`ShardedIndexBuilder::index_factory`] must produce scores that rank
  /// this way; nothing checks that it does.
  pub fn score_order(mut self, order: ScoreOrder) -> Self {
    self.order = order;
    self
  }

  /// Uses the in-memory backend scoring with `kind`, ranked in the order
  /// that puts closer shapes first.
  pub fn score_kind(mut self, kind: ScoreKind) -> Self {
    self.factory = Some(Arc::new(InMemIndexFactory::new(kind)));
    self.order = kind.order();
    self
  }

  /// Builds the index over `dataset`, one shard per dataset partition.
  pub fn build(self, dataset: PartitionedDataset<(K, V)>) -> Result<ShardedIndex<K, V>>
  where
    K: Searchable + 'static,
    V: Searchable + 'static,
  {
    let shape = self
      .shape
      .ok_or_else(|| Error::Config("a shape conversion is required".to_string()))?;

    let mut schema = IndexSchema::new(shape).with_order(self.order);
    if let Some(document) = self.document {
      schema = schema.with_document(document);
    }
    let factory = self
      .factory
      .unwrap_or_else(|| Arc::new(InMemIndexFactory::new(ScoreKind::for_order(self.order))));
    schema = schema.with_factory(factory);

    ShardedIndex::from_dataset(dataset, schema)
  }
}

impl<K, V> Default for ShardedIndexBuilder<K, V> {
  fn default() -> Self {
    Self::new()
  }
}
