//! Geographic primitives shared by every service.
//!
//! # Responsibilities
//! - Define the `Coordinates` value type exchanged between hops
//! - Provide the geodesic distance calculator (distance.rs)
//!
//! # Design Decisions
//! - Coordinates are plain `Copy` values; range checks are opt-in so the
//!   degraded `{0, 0}` sentinel stays representable
//! - The wire format is `{"latitude": .., "longitude": ..}` on every hop

pub mod distance;

pub use distance::{geodesic_km, haversine_km, DistanceFn};

use serde::{Deserialize, Serialize};
use std::fmt;

/// A point on the Earth in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Position reported when the satellite lookup degraded.
    pub const UNKNOWN: Coordinates = Coordinates {
        latitude: 0.0,
        longitude: 0.0,
    };

    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both components are finite and inside the WGS-84 ranges.
    pub fn is_in_range(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Query parameters used when forwarding these coordinates downstream.
    pub fn to_query(&self) -> [(&'static str, String); 2] {
        [
            ("latitude", self.latitude.to_string()),
            ("longitude", self.longitude.to_string()),
        ]
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

/// Distance between a location and the satellite, as returned by the
/// distance service and relayed by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceReport {
    /// Geodesic distance in kilometers, rounded to 2 decimal places.
    #[serde(rename = "distance")]
    pub distance_km: f64,
    /// Satellite position the distance was computed against.
    #[serde(rename = "location")]
    pub satellite_location: Coordinates,
}
