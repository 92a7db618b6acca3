//! Core seams for the dispatch pipeline.
//!
//! The assignment core only talks to the outside world through these two
//! traits. Concrete backends live in [`crate::osrm`] and [`crate::haversine`].

use crate::error::ProviderError;
use crate::polyline::Polyline;

/// A WGS84 coordinate pair as (latitude, longitude) in degrees.
pub type Location = (f64, f64);

/// Returns travel distances for the two-leg path driver -> pickup -> drop.
///
/// Implementations must be stateless per call so the cost matrix builder can
/// query them from several threads at once.
pub trait DistanceProvider: Send + Sync {
    /// Sum of both leg distances in kilometers.
    fn distance_km(
        &self,
        driver: Location,
        pickup: Location,
        drop: Location,
    ) -> Result<f64, ProviderError>;
}

/// Returns dense display geometry for the two-leg path of an assigned pair.
pub trait RouteGeometryProvider: Send + Sync {
    fn route_geometry(
        &self,
        driver: Location,
        pickup: Location,
        drop: Location,
    ) -> Result<Polyline, ProviderError>;
}
