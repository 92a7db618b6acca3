//! Real Bengaluru locations around HSR Layout and Bellandur.
//!
//! These are routable points that work with the OSRM southern-zone extract.

use fleet_dispatch::scenario::{Driver, Scenario, Task};

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}

/// Map center for the allocation map.
pub const MAP_CENTER: (f64, f64) = (12.9163, 77.6652);

// ============================================================================
// Driver start positions
// ============================================================================

pub const DRIVERS: &[Location] = &[
    Location::new("HSR Sector 2", 12.914368, 77.666922),
    Location::new("Agara Lake", 12.921383, 77.666319),
    Location::new("Iblur Junction", 12.922742, 77.675514),
];

pub const DRIVER_SPEEDS_KMH: &[f64] = &[18.0, 25.0, 15.0];

// ============================================================================
// Orders (pickup -> drop)
// ============================================================================

pub const PICKUPS: &[Location] = &[
    Location::new("Haralur Road", 12.912831, 77.681145),
    Location::new("Bellandur Gate", 12.925258, 77.671648),
];

pub const DROPS: &[Location] = &[
    Location::new("Sarjapur Road", 12.922923, 77.673605),
    Location::new("Kasavanahalli", 12.915595, 77.677188),
];

/// Three drivers, two orders.
pub fn hsr_scenario() -> Scenario {
    Scenario {
        drivers: DRIVERS
            .iter()
            .zip(DRIVER_SPEEDS_KMH)
            .map(|(location, &speed_kmh)| Driver {
                location: location.coords(),
                speed_kmh,
            })
            .collect(),
        tasks: PICKUPS
            .iter()
            .zip(DROPS)
            .map(|(pickup, drop)| Task {
                pickup: pickup.coords(),
                drop: drop.coords(),
            })
            .collect(),
    }
}
