//! Type definitions

pub mod driver;
pub mod location;
pub mod region;
pub mod route;
pub mod weights;

pub use driver::*;
pub use location::*;
pub use region::*;
pub use route::*;
pub use weights::*;

use serde::{Deserialize, Serialize};

/// Geographic coordinates (WGS84)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Midpoint of the segment between two coordinates. Good enough for
    /// region lookup; not a geodesic midpoint.
    pub fn midpoint(&self, other: &Coordinates) -> Coordinates {
        Coordinates {
            lat: (self.lat + other.lat) / 2.0,
            lng: (self.lng + other.lng) / 2.0,
        }
    }
}
