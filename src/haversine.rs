//! Haversine distance provider (fallback when OSRM is unavailable).
//!
//! Uses great-circle distance for both legs. Less accurate than OSRM
//! (ignores roads) but needs no network, which also makes it the provider of
//! choice for tests.

use crate::error::ProviderError;
use crate::polyline::Polyline;
use crate::traits::{DistanceProvider, Location, RouteGeometryProvider};

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle provider. Geometry is the straight driver -> pickup -> drop path.
#[derive(Debug, Clone)]
pub struct Haversine {
    /// Multiplier applied to straight-line distance to approximate road distance.
    pub detour_factor: f64,
}

impl Default for Haversine {
    fn default() -> Self {
        Self { detour_factor: 1.0 }
    }
}

impl Haversine {
    pub fn new(detour_factor: f64) -> Self {
        Self { detour_factor }
    }
}

/// Great-circle distance between two points in kilometers.
pub fn haversine_km(from: Location, to: Location) -> f64 {
    let (lat1, lng1) = from;
    let (lat2, lng2) = to;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

impl DistanceProvider for Haversine {
    fn distance_km(
        &self,
        driver: Location,
        pickup: Location,
        drop: Location,
    ) -> Result<f64, ProviderError> {
        Ok((haversine_km(driver, pickup) + haversine_km(pickup, drop)) * self.detour_factor)
    }
}

impl RouteGeometryProvider for Haversine {
    fn route_geometry(
        &self,
        driver: Location,
        pickup: Location,
        drop: Location,
    ) -> Result<Polyline, ProviderError> {
        Ok(Polyline::new(vec![driver, pickup, drop]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_same_point() {
        let dist = haversine_km((12.9163, 77.6652), (12.9163, 77.6652));
        assert!(dist < 0.001, "Same point should have ~0 distance");
    }

    #[test]
    fn test_haversine_known_distance() {
        // Bengaluru (12.97, 77.59) to Chennai (13.08, 80.27), ~290 km
        let dist = haversine_km((12.97, 77.59), (13.08, 80.27));
        assert!(dist > 280.0 && dist < 300.0, "BLR to MAA should be ~290km, got {}", dist);
    }

    #[test]
    fn test_haversine_symmetric() {
        let a = (12.914368, 77.666922);
        let b = (12.922923, 77.673605);
        assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-12);
    }

    #[test]
    fn test_two_legs_are_summed() {
        let driver = (12.914368, 77.666922);
        let pickup = (12.912831, 77.681145);
        let drop = (12.922923, 77.673605);
        let expected = haversine_km(driver, pickup) + haversine_km(pickup, drop);

        let km = Haversine::default().distance_km(driver, pickup, drop).expect("distance");
        assert!((km - expected).abs() < 1e-12);

        let padded = Haversine::new(1.3).distance_km(driver, pickup, drop).expect("distance");
        assert!((padded - expected * 1.3).abs() < 1e-9);
    }

    #[test]
    fn test_geometry_is_straight_path() {
        let geometry = Haversine::default()
            .route_geometry((1.0, 2.0), (3.0, 4.0), (5.0, 6.0))
            .expect("geometry");
        assert_eq!(geometry.points(), &[(1.0, 2.0), (3.0, 4.0), (5.0, 6.0)]);
    }
}
