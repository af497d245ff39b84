//! Destination catalogue and the lookup tables deciding which feeds apply
//!
//! Everything here is plain data: adding a destination, a region mapping or a
//! coastal town is a one-line change to the tables below.

use serde::Serialize;

use crate::models::{Destination, RoadRegion};

/// Name returned for points that are not in the catalogue
pub const UNKNOWN_LOCATION: &str = "Selected location";

/// Known destinations as `(name, lat, lon)`
pub const CATALOGUE: [(&str, f64, f64); 8] = [
    ("Oslo", 59.9139, 10.7522),
    ("Bergen", 60.3913, 5.3221),
    ("Tromsø", 69.6496, 18.956),
    ("Trondheim", 63.4305, 10.3951),
    ("Lofoten", 68.2094, 13.9951),
    ("Nordkapp", 71.1691, 25.7839),
    ("Geiranger", 62.1008, 7.2059),
    ("Stavanger", 58.97, 5.7331),
];

/// Destinations with their own road table; everything else uses `national`
pub const ROAD_REGIONS: [(&str, RoadRegion); 3] = [
    ("Tromsø", RoadRegion::Tromso),
    ("Lofoten", RoadRegion::Lofoten),
    ("Nordkapp", RoadRegion::Nordkapp),
];

/// Coastal destinations south of the latitude cut-off that still get sea conditions
pub const COASTAL: [&str; 3] = ["Bergen", "Stavanger", "Geiranger"];

/// Destinations north of this latitude get aurora and ocean feeds
pub const ARCTIC_LATITUDE: f64 = 62.0;

/// Tolerance in degrees when matching a point to a catalogue entry
const NAME_MATCH_TOLERANCE: f64 = 0.1;

/// Optional feeds that apply to a destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Applicability {
    pub aurora: bool,
    pub ocean: bool,
}

#[must_use]
pub fn all() -> Vec<Destination> {
    CATALOGUE
        .iter()
        .map(|(name, lat, lon)| Destination::new(*name, *lat, *lon))
        .collect()
}

#[must_use]
pub fn find(name: &str) -> Option<Destination> {
    CATALOGUE
        .iter()
        .find(|(candidate, _, _)| *candidate == name)
        .map(|(name, lat, lon)| Destination::new(*name, *lat, *lon))
}

#[must_use]
pub fn region_for(name: &str) -> RoadRegion {
    ROAD_REGIONS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map_or(RoadRegion::National, |(_, region)| *region)
}

/// Aurora depends on latitude alone; the coastal list only adds ocean.
#[must_use]
pub fn applicability(destination: &Destination) -> Applicability {
    let arctic = destination.lat > ARCTIC_LATITUDE;
    Applicability {
        aurora: arctic,
        ocean: arctic || COASTAL.contains(&destination.name.as_str()),
    }
}

/// Catalogue name of the destination within 0.1° of the point
#[must_use]
pub fn name_near(lat: f64, lon: f64) -> &'static str {
    CATALOGUE
        .iter()
        .find(|(_, d_lat, d_lon)| {
            (d_lat - lat).abs() < NAME_MATCH_TOLERANCE && (d_lon - lon).abs() < NAME_MATCH_TOLERANCE
        })
        .map_or(UNKNOWN_LOCATION, |(name, _, _)| *name)
}
