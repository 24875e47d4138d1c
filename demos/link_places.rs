//! Links hotels to the metro stations around them.

use shapelink::prelude::*;
use serde::{Deserialize, Serialize};

/// A metro station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
  pub name: String,
  pub line: i64,
  pub location: Point,
}

/// A hotel looking for nearby stations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hotel {
  pub name: String,
  pub location: Point,
}

fn station(name: &str, line: i64, lat: f64, lon: f64) -> (String, Station) {
  (
    name.to_string(),
    Station {
      name: name.to_string(),
      line,
      location: Point::new(lat, lon),
    },
  )
}

fn hotel(name: &str, lat: f64, lon: f64) -> Hotel {
  Hotel {
    name: name.to_string(),
    location: Point::new(lat, lon),
  }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  let stations = vec![
    station("Chatelet", 1, 48.8587, 2.3475),
    station("Louvre-Rivoli", 1, 48.8609, 2.3409),
    station("Saint-Michel", 4, 48.8535, 2.3441),
    station("Odeon", 4, 48.8520, 2.3386),
    station("Bastille", 1, 48.8531, 2.3691),
    station("Trocadero", 6, 48.8630, 2.2870),
    station("Montparnasse", 4, 48.8421, 2.3219),
  ];

  let index: ShardedIndex<String, Station> = ShardedIndex::builder()
    .shape(|_, s: &Station| Ok(Shape::Point(s.location)))
    .document(|_, s: &Station| {
      Ok(
        Document::new()
          .field("station", s.name.clone())
          .field("line", s.line),
      )
    })
    .build(PartitionedDataset::from_vec(stations, 3))?;

  println!("Indexed {} stations across {} shards", index.count()?, index.num_shards());

  let hotels = PartitionedDataset::from_vec(
    vec![
      hotel("Hotel du Louvre", 48.8624, 2.3354),
      hotel("Left Bank Inn", 48.8530, 2.3410),
      hotel("Riviera Palace", 43.6950, 7.2650),
    ],
    2,
  );

  let options = LinkOptions::new(1.0).k(2);
  let linked = index.link_by_radius(&hotels, |h| h.location, options)?;

  for (hotel, matches) in linked.iter() {
    println!("\n{}:", hotel.name);
    for m in matches {
      println!(
        "  {:?} (shard {}, score {:.3})",
        m.fields.get("station"),
        m.shard_index,
        m.score
      );
    }
  }

  let on_line_one = index.filter(|_, s| s.line == 1)?;
  let nearest = on_line_one.knn_search(Point::new(48.8530, 2.3410), 1)?;
  if let Some(m) = nearest.first() {
    println!("\nNearest line 1 station to the Left Bank Inn: {:?}", m.fields.get("station"));
  }

  println!("\n{}", serde_json::to_string_pretty(&linked.to_json()?)?);

  let mut index = index;
  index.close()?;
  Ok(())
}
