//! OSRM HTTP adapter for two-leg distances and route geometry.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProviderError;
use crate::polyline::{PRECISION_6, Polyline};
use crate::traits::{DistanceProvider, Location, RouteGeometryProvider};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "driving".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OsrmConfig {
        &self.config
    }

    fn route_url(&self, waypoints: &[Location], overview: &str) -> String {
        format!(
            "{}/route/v1/{}/{}?overview={}&geometries=polyline6",
            self.config.base_url.trim_end_matches('/'),
            self.config.profile,
            coordinates(waypoints),
            overview
        )
    }

    fn fetch(&self, url: String) -> Result<OsrmRouteResponse, ProviderError> {
        debug!(%url, "osrm request");
        let body = self.client.get(url).send()?.json::<OsrmRouteResponse>()?;
        Ok(body)
    }
}

impl DistanceProvider for OsrmClient {
    fn distance_km(
        &self,
        driver: Location,
        pickup: Location,
        drop: Location,
    ) -> Result<f64, ProviderError> {
        let body = self.fetch(self.route_url(&[driver, pickup, drop], "false"))?;
        two_leg_distance_km(body)
    }
}

impl RouteGeometryProvider for OsrmClient {
    fn route_geometry(
        &self,
        driver: Location,
        pickup: Location,
        drop: Location,
    ) -> Result<Polyline, ProviderError> {
        let body = self.fetch(self.route_url(&[driver, pickup, drop], "full"))?;
        route_polyline(body)
    }
}

/// OSRM expects `lng,lat` pairs separated by `;`.
fn coordinates(waypoints: &[Location]) -> String {
    waypoints
        .iter()
        .map(|(lat, lng)| format!("{:.6},{:.6}", lng, lat))
        .collect::<Vec<_>>()
        .join(";")
}

fn first_route(body: OsrmRouteResponse) -> Result<OsrmRoute, ProviderError> {
    match body.code.as_str() {
        "Ok" => {}
        "NoRoute" => return Err(ProviderError::NoRoute),
        _ => return Err(ProviderError::Api(body.code)),
    }
    body.routes
        .and_then(|routes| routes.into_iter().next())
        .ok_or(ProviderError::NoRoute)
}

fn two_leg_distance_km(body: OsrmRouteResponse) -> Result<f64, ProviderError> {
    let route = first_route(body)?;
    let mut meters = 0.0;
    for leg in 0..2 {
        meters += route
            .legs
            .get(leg)
            .ok_or(ProviderError::MissingLeg(leg))?
            .distance;
    }
    Ok(meters / 1000.0)
}

fn route_polyline(body: OsrmRouteResponse) -> Result<Polyline, ProviderError> {
    let route = first_route(body)?;
    let encoded = route.geometry.ok_or_else(|| {
        ProviderError::InvalidGeometry("route has no geometry".to_string())
    })?;
    Polyline::decode(&encoded, PRECISION_6)
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    code: String,
    routes: Option<Vec<OsrmRoute>>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    #[serde(default)]
    legs: Vec<OsrmLeg>,
    geometry: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OsrmLeg {
    /// Meters.
    distance: f64,
}
