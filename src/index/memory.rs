//! In-memory index implementation.

use crate::error::{Error, Result};
use crate::geo::{Point, Shape};
use crate::index::adapter::{IndexFactory, IndexHit, LocalIndex, SpatialQuery};
use crate::types::{DocId, Document, ScoreOrder};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// How the in-memory index turns a distance into a score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScoreKind {
  /// `1 / (1 + distance_km)`: closer is higher. Pair with `ScoreOrder::Descending`.
  #[default]
  InverseDistance,
  /// The distance in kilometres itself. Pair with `ScoreOrder::Ascending`.
  Distance,
}

impl ScoreKind {
  /// The scoring that ranks closer shapes first under `order`.
  pub fn for_order(order: ScoreOrder) -> Self {
    match order {
      ScoreOrder::Descending => ScoreKind::InverseDistance,
      ScoreOrder::Ascending => ScoreKind::Distance,
    }
  }

  /// The ranking direction in which this scoring puts closer shapes first.
  pub fn order(&self) -> ScoreOrder {
    match self {
      ScoreKind::InverseDistance => ScoreOrder::Descending,
      ScoreKind::Distance => ScoreOrder::Ascending,
    }
  }

  fn score(&self, distance_km: f64) -> f64 {
    match self {
      ScoreKind::InverseDistance => 1.0 / (1.0 + distance_km),
      ScoreKind::Distance => distance_km,
    }
  }
}

/// In-memory spatial index using a brute-force scan with a bounded heap.
pub struct InMemIndex {
  /// `None` once released.
  docs: Option<Vec<(Shape, Document)>>,
  score_kind: ScoreKind,
}

impl InMemIndex {
  /// Create a new empty in-memory index.
  pub fn new() -> Self {
    Self::with_score_kind(ScoreKind::default())
  }

  /// Create a new empty index scoring with `score_kind`.
  pub fn with_score_kind(score_kind: ScoreKind) -> Self {
    Self {
      docs: Some(Vec::new()),
      score_kind,
    }
  }

  fn docs(&self) -> Result<&Vec<(Shape, Document)>> {
    self
      .docs
      .as_ref()
      .ok_or_else(|| Error::Index("in-memory index already released".to_string()))
  }
}

impl Default for InMemIndex {
  fn default() -> Self {
    Self::new()
  }
}

/// A candidate in the bounded heap. The heap's maximum is the worst
/// candidate, so it is the one popped when the heap overflows.
struct Candidate {
  score: f64,
  doc_id: DocId,
  order: ScoreOrder,
}

impl Candidate {
  /// `Ordering::Less` means `self` ranks ahead of `other`.
  fn rank(&self, other: &Self) -> Ordering {
    self
      .order
      .compare(self.score, other.score)
      .then_with(|| self.doc_id.cmp(&other.doc_id))
  }
}

impl PartialEq for Candidate {
  fn eq(&self, other: &Self) -> bool {
    self.rank(other) == Ordering::Equal
  }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Candidate {
  fn cmp(&self, other: &Self) -> Ordering {
    self.rank(other)
  }
}

impl LocalIndex for InMemIndex {
  fn add(&mut self, shape: Shape, document: Document) -> Result<DocId> {
    shape.validate().map_err(Error::Index)?;
    let docs = self
      .docs
      .as_mut()
      .ok_or_else(|| Error::Index("in-memory index already released".to_string()))?;
    docs.push((shape, document));
    Ok((docs.len() - 1) as DocId)
  }

  fn len(&self) -> usize {
    self.docs.as_ref().map_or(0, Vec::len)
  }

  fn search(&self, query: &SpatialQuery, k: usize, order: ScoreOrder) -> Result<Vec<IndexHit>> {
    let docs = self.docs()?;
    if k == 0 {
      return Ok(Vec::new());
    }

    let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k + 1);

    for (doc_id, (shape, _)) in docs.iter().enumerate() {
      let point: &Point = match query {
        SpatialQuery::Circle {
          center,
          radius_km,
          relation,
        } => {
          if !shape.relates_to_circle(*relation, center, *radius_km) {
            continue;
          }
          center
        }
        SpatialQuery::Nearest { point } => point,
      };

      heap.push(Candidate {
        score: self.score_kind.score(shape.distance_km(point)),
        doc_id: doc_id as DocId,
        order,
      });
      if heap.len() > k {
        heap.pop();
      }
    }

    // Ascending by `Ord` is best first.
    Ok(
      heap
        .into_sorted_vec()
        .into_iter()
        .map(|c| IndexHit {
          doc_id: c.doc_id,
          score: c.score,
          document: docs[c.doc_id as usize].1.clone(),
        })
        .collect(),
    )
  }

  fn release(&mut self) -> Result<()> {
    self.docs = None;
    Ok(())
  }
}

/// Factory producing [`InMemIndex`] instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct InMemIndexFactory {
  score_kind: ScoreKind,
}

impl InMemIndexFactory {
  /// Creates a factory whose indexes score with `score_kind`.
  pub fn new(score_kind: ScoreKind) -> Self {
    Self { score_kind }
  }
}

impl IndexFactory for InMemIndexFactory {
  fn create(&self, _shard_index: usize) -> Result<Box<dyn LocalIndex>> {
    Ok(Box::new(InMemIndex::with_score_kind(self.score_kind)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::geo::SpatialRelation;
  use crate::types::FieldValue;

  fn indexed(points: &[(f64, f64)], kind: ScoreKind) -> InMemIndex {
    let mut index = InMemIndex::with_score_kind(kind);
    for (i, (lat, lon)) in points.iter().enumerate() {
      index
        .add(
          Shape::Point(Point::new(*lat, *lon)),
          Document::new().field("n", i as i64),
        )
        .unwrap();
    }
    index
  }

  fn circle(lat: f64, lon: f64, radius_km: f64) -> SpatialQuery {
    SpatialQuery::Circle {
      center: Point::new(lat, lon),
      radius_km,
      relation: SpatialRelation::Intersects,
    }
  }

  #[test]
  fn test_add_assigns_sequential_ids() {
    let mut index = InMemIndex::new();
    assert!(index.is_empty());
    let a = index.add(Shape::Point(Point::new(0.0, 0.0)), Document::new()).unwrap();
    let b = index.add(Shape::Point(Point::new(1.0, 1.0)), Document::new()).unwrap();
    assert_eq!((a, b), (0, 1));
    assert_eq!(index.len(), 2);
  }

  #[test]
  fn test_add_rejects_invalid_shape() {
    let mut index = InMemIndex::new();
    let err = index.add(Shape::Point(Point::new(123.0, 0.0)), Document::new()).unwrap_err();
    assert!(matches!(err, Error::Index(_)));
    assert_eq!(index.len(), 0);
  }

  #[test]
  fn test_circle_search_is_bounded_and_best_first() {
    // Points stepping north from the equator, ~111 km per degree.
    let index = indexed(&[(0.0, 0.0), (0.5, 0.0), (1.0, 0.0), (5.0, 0.0)], ScoreKind::InverseDistance);

    let hits = index.search(&circle(0.0, 0.0, 200.0), 2, ScoreOrder::Descending).unwrap();
    let ids: Vec<DocId> = hits.iter().map(|h| h.doc_id).collect();
    assert_eq!(ids, vec![0, 1]);
    assert_eq!(hits[0].score, 1.0);
    assert_eq!(hits[1].document.get("n"), Some(&FieldValue::Integer(1)));

    let all = index.search(&circle(0.0, 0.0, 200.0), 10, ScoreOrder::Descending).unwrap();
    assert_eq!(all.len(), 3, "the point 5 degrees away is outside the radius");
  }

  #[test]
  fn test_distance_scores_rank_ascending() {
    let index = indexed(&[(1.0, 0.0), (0.0, 0.0), (0.5, 0.0)], ScoreKind::Distance);
    let hits = index.search(&circle(0.0, 0.0, 500.0), 3, ScoreOrder::Ascending).unwrap();
    let ids: Vec<DocId> = hits.iter().map(|h| h.doc_id).collect();
    assert_eq!(ids, vec![1, 2, 0]);
    assert_eq!(hits[0].score, 0.0);
  }

  #[test]
  fn test_nearest_ignores_radius() {
    let index = indexed(&[(40.0, 40.0), (10.0, 10.0), (-60.0, 100.0)], ScoreKind::InverseDistance);
    let hits = index
      .search(&SpatialQuery::Nearest { point: Point::new(0.0, 0.0) }, 2, ScoreOrder::Descending)
      .unwrap();
    let ids: Vec<DocId> = hits.iter().map(|h| h.doc_id).collect();
    assert_eq!(ids, vec![1, 0]);
  }

  #[test]
  fn test_ties_break_on_doc_id() {
    let index = indexed(&[(0.0, 1.0), (0.0, -1.0), (1.0, 0.0)], ScoreKind::InverseDistance);
    let hits = index.search(&circle(0.0, 0.0, 500.0), 2, ScoreOrder::Descending).unwrap();
    let ids: Vec<DocId> = hits.iter().map(|h| h.doc_id).collect();
    assert_eq!(ids, vec![0, 1]);
  }

  #[test]
  fn test_k_zero_returns_nothing() {
    let index = indexed(&[(0.0, 0.0)], ScoreKind::InverseDistance);
    let hits = index.search(&circle(0.0, 0.0, 10.0), 0, ScoreOrder::Descending).unwrap();
    assert!(hits.is_empty());
  }

  #[test]
  fn test_released_index_rejects_calls() {
    let mut index = indexed(&[(0.0, 0.0)], ScoreKind::InverseDistance);
    index.release().unwrap();
    assert_eq!(index.len(), 0);
    assert!(index.search(&circle(0.0, 0.0, 10.0), 1, ScoreOrder::Descending).is_err());
    assert!(index.add(Shape::Point(Point::new(0.0, 0.0)), Document::new()).is_err());
  }
}
