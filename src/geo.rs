//! Geographic primitives: points, indexable shapes and the topological
//! relations a circle query can test against them.
//!
//! Distances are great-circle distances on a spherical Earth, in kilometres.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Slack applied to distance comparisons so that a shape sitting exactly on
/// the query boundary is not lost to rounding.
const DISTANCE_EPSILON_KM: f64 = 1e-9;

/// A position on the globe in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
  /// Latitude, `-90.0..=90.0`.
  pub lat: f64,
  /// Longitude, `-180.0..=180.0`.
  pub lon: f64,
}

impl Point {
  /// Creates a point. Coordinates are checked when the point is indexed or
  /// queried, not here.
  pub fn new(lat: f64, lon: f64) -> Self {
    Self { lat, lon }
  }

  /// Checks that both coordinates are finite and within range.
  pub fn validate(&self) -> std::result::Result<(), String> {
    if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
      return Err(format!("latitude {} out of range", self.lat));
    }
    if !self.lon.is_finite() || !(-180.0..=180.0).contains(&self.lon) {
      return Err(format!("longitude {} out of range", self.lon));
    }
    Ok(())
  }

  /// Great-circle distance to `other` using the haversine formula.
  pub fn distance_km(&self, other: &Point) -> f64 {
    let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = (other.lon - self.lon).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
  }
}

/// A geometry stored in a local index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
  /// A single location.
  Point(Point),
  /// A disc around `center`.
  Circle {
    /// Centre of the disc.
    center: Point,
    /// Radius of the disc in kilometres.
    radius_km: f64,
  },
}

impl Shape {
  /// Checks coordinates and, for circles, the radius.
  pub fn validate(&self) -> std::result::Result<(), String> {
    match self {
      Shape::Point(p) => p.validate(),
      Shape::Circle { center, radius_km } => {
        center.validate()?;
        if !radius_km.is_finite() || *radius_km < 0.0 {
          return Err(format!("circle radius {} is not a non-negative distance", radius_km));
        }
        Ok(())
      }
    }
  }

  /// Representative location of the shape.
  pub fn center(&self) -> Point {
    match self {
      Shape::Point(p) => *p,
      Shape::Circle { center, .. } => *center,
    }
  }

  fn radius_km(&self) -> f64 {
    match self {
      Shape::Point(_) => 0.0,
      Shape::Circle { radius_km, .. } => *radius_km,
    }
  }

  /// Distance from `point` to the nearest part of the shape (zero inside it).
  pub fn distance_km(&self, point: &Point) -> f64 {
    (self.center().distance_km(point) - self.radius_km()).max(0.0)
  }

  /// Tests `relation` between this shape and the circle `(center, radius_km)`.
  ///
  /// The relation reads with the indexed shape as subject: `IsWithin` means
  /// the shape lies inside the query circle, `Contains` means the shape
  /// covers the whole query circle.
  pub fn relates_to_circle(&self, relation: SpatialRelation, center: &Point, radius_km: f64) -> bool {
    let d = self.center().distance_km(center);
    let r = self.radius_km();

    match relation {
      SpatialRelation::Intersects => d <= radius_km + r + DISTANCE_EPSILON_KM,
      SpatialRelation::IsWithin => d + r <= radius_km + DISTANCE_EPSILON_KM,
      SpatialRelation::Contains => d + radius_km <= r + DISTANCE_EPSILON_KM,
      SpatialRelation::IsDisjointTo => d > radius_km + r + DISTANCE_EPSILON_KM,
    }
  }
}

/// Topological relation evaluated by a circle search.
///
/// Deserializes from any name [`FromStr`] accepts and serializes to its
/// canonical name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum SpatialRelation {
  /// The shape and the query circle share at least one point.
  Intersects,
  /// The shape lies entirely within the query circle.
  IsWithin,
  /// The shape covers the entire query circle.
  Contains,
  /// The shape and the query circle share no point.
  IsDisjointTo,
}

impl SpatialRelation {
  /// Canonical name, as accepted by [`FromStr`].
  pub fn name(&self) -> &'static str {
    match self {
      SpatialRelation::Intersects => "Intersects",
      SpatialRelation::IsWithin => "IsWithin",
      SpatialRelation::Contains => "Contains",
      SpatialRelation::IsDisjointTo => "IsDisjointTo",
    }
  }
}

impl Default for SpatialRelation {
  fn default() -> Self {
    SpatialRelation::Intersects
  }
}

impl fmt::Display for SpatialRelation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for SpatialRelation {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let relation = match s.trim().to_ascii_lowercase().as_str() {
      "intersects" => SpatialRelation::Intersects,
      "iswithin" | "within" => SpatialRelation::IsWithin,
      "contains" => SpatialRelation::Contains,
      "isdisjointto" | "disjoint" => SpatialRelation::IsDisjointTo,
      _ => return Err(Error::Query(format!("unknown spatial relation '{}'", s))),
    };
    Ok(relation)
  }
}

impl TryFrom<String> for SpatialRelation {
  type Error = Error;

  fn try_from(name: String) -> Result<Self> {
    name.parse()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn paris() -> Point {
    Point::new(48.8566, 2.3522)
  }

  fn london() -> Point {
    Point::new(51.5074, -0.1278)
  }

  #[test]
  fn test_haversine_paris_london() {
    let d = paris().distance_km(&london());
    assert!((d - 343.5).abs() < 1.0, "got {}", d);
  }

  #[test]
  fn test_distance_to_self_is_zero() {
    assert_eq!(paris().distance_km(&paris()), 0.0);
  }

  #[test]
  fn test_validate_rejects_out_of_range() {
    assert!(Point::new(91.0, 0.0).validate().is_err());
    assert!(Point::new(0.0, -180.5).validate().is_err());
    assert!(Point::new(f64::NAN, 0.0).validate().is_err());
    assert!(Point::new(-90.0, 180.0).validate().is_ok());

    let circle = Shape::Circle {
      center: paris(),
      radius_km: -1.0,
    };
    assert!(circle.validate().is_err());
  }

  #[test]
  fn test_point_relations() {
    let shape = Shape::Point(london());
    assert!(shape.relates_to_circle(SpatialRelation::Intersects, &paris(), 350.0));
    assert!(shape.relates_to_circle(SpatialRelation::IsWithin, &paris(), 350.0));
    assert!(!shape.relates_to_circle(SpatialRelation::Intersects, &paris(), 300.0));
    assert!(shape.relates_to_circle(SpatialRelation::IsDisjointTo, &paris(), 300.0));
    assert!(!shape.relates_to_circle(SpatialRelation::Contains, &paris(), 350.0));
  }

  #[test]
  fn test_circle_relations() {
    let region = Shape::Circle {
      center: paris(),
      radius_km: 500.0,
    };
    // London is inside the region, a 50 km query around it fits entirely.
    assert!(region.relates_to_circle(SpatialRelation::Contains, &london(), 50.0));
    assert!(region.relates_to_circle(SpatialRelation::Intersects, &london(), 50.0));
    assert!(!region.relates_to_circle(SpatialRelation::IsWithin, &london(), 50.0));
    assert!(region.relates_to_circle(SpatialRelation::IsWithin, &london(), 900.0));
  }

  #[test]
  fn test_shape_distance_is_zero_inside_circle() {
    let region = Shape::Circle {
      center: paris(),
      radius_km: 500.0,
    };
    assert_eq!(region.distance_km(&london()), 0.0);
    assert!(Shape::Point(paris()).distance_km(&london()) > 300.0);
  }

  #[test]
  fn test_relation_parsing() {
    assert_eq!("Intersects".parse::<SpatialRelation>().unwrap(), SpatialRelation::Intersects);
    assert_eq!("iswithin".parse::<SpatialRelation>().unwrap(), SpatialRelation::IsWithin);
    assert_eq!(" CONTAINS ".parse::<SpatialRelation>().unwrap(), SpatialRelation::Contains);
    let err = "overlapsish".parse::<SpatialRelation>().unwrap_err();
    assert!(matches!(err, Error::Query(_)));
    assert_eq!(SpatialRelation::IsDisjointTo.to_string(), "IsDisjointTo");
  }

  #[test]
  fn test_relation_deserializes_like_parse() {
    let parsed: Vec<SpatialRelation> = serde_json::from_str(r#"["intersects", "Within", "CONTAINS", "IsDisjointTo"]"#).unwrap();
    assert_eq!(
      parsed,
      vec![
        SpatialRelation::Intersects,
        SpatialRelation::IsWithin,
        SpatialRelation::Contains,
        SpatialRelation::IsDisjointTo,
      ]
    );
    assert!(serde_json::from_str::<SpatialRelation>(r#""touches""#).is_err());
    assert_eq!(serde_json::to_string(&SpatialRelation::IsWithin).unwrap(), r#""IsWithin""#);
  }
}
