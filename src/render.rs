//! Route rendering: per-pair geometry and a Leaflet HTML map artifact.
//!
//! Geometry failures are isolated per assigned pair. A pair whose geometry
//! cannot be fetched is recorded in [`RouteMap::failures`] and the remaining
//! pairs still render.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::RenderError;
use crate::polyline::Polyline;
use crate::scenario::Scenario;
use crate::solver::Assignment;
use crate::traits::{Location, RouteGeometryProvider};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapOptions {
    /// Initial map center. Defaults to the centroid of all rendered points.
    pub center: Option<Location>,
    pub zoom: u8,
    pub tile_url: String,
    pub attribution: String,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            center: None,
            zoom: 13,
            tile_url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            attribution: "&copy; OpenStreetMap contributors".to_string(),
        }
    }
}

/// Geometry of one assigned (worker, task) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPair {
    pub worker: usize,
    pub task: usize,
    pub driver: Location,
    pub pickup: Location,
    pub drop: Location,
    pub geometry: Polyline,
}

#[derive(Debug, Default)]
pub struct RouteMap {
    pub pairs: Vec<RenderedPair>,
    pub failures: Vec<RenderError>,
}

/// Fetches display geometry for every pair of `assignment`.
pub fn render_routes<G>(scenario: &Scenario, assignment: &Assignment, provider: &G) -> RouteMap
where
    G: RouteGeometryProvider + ?Sized,
{
    let mut map = RouteMap::default();

    for &(worker, task) in assignment.pairs() {
        let (Some(driver), Some(order)) =
            (scenario.drivers.get(worker), scenario.tasks.get(task))
        else {
            warn!(worker, task, "assigned pair is not in the scenario");
            map.failures.push(RenderError::UnknownPair { worker, task });
            continue;
        };
        let (driver, pickup, drop) = (driver.location, order.pickup, order.drop);

        match provider.route_geometry(driver, pickup, drop) {
            Ok(geometry) => map.pairs.push(RenderedPair {
                worker,
                task,
                driver,
                pickup,
                drop,
                geometry,
            }),
            Err(cause) => {
                warn!(worker, task, error = %cause, "route geometry unavailable");
                map.failures.push(RenderError::Geometry {
                    worker,
                    task,
                    cause,
                });
            }
        }
    }

    info!(
        rendered = map.pairs.len(),
        failed = map.failures.len(),
        "routes rendered"
    );
    map
}

#[derive(Serialize)]
struct MarkerData {
    location: Location,
    color: &'static str,
    popup: String,
}

#[derive(Serialize)]
struct MapData<'a> {
    center: Location,
    zoom: u8,
    tile_url: &'a str,
    attribution: &'a str,
    markers: Vec<MarkerData>,
    lines: Vec<&'a [Location]>,
}

impl RouteMap {
    /// Centroid of every marker position, if any pair rendered.
    pub fn centroid(&self) -> Option<Location> {
        let points: Vec<Location> = self
            .pairs
            .iter()
            .flat_map(|pair| [pair.driver, pair.pickup, pair.drop])
            .collect();
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let (lat, lng) = points
            .iter()
            .fold((0.0, 0.0), |(lat, lng), p| (lat + p.0, lng + p.1));
        Some((lat / n, lng / n))
    }

    /// Renders a self-contained Leaflet page: driver markers in blue, pickups
    /// in green, drops in red, one black line per pair.
    pub fn to_html(&self, options: &MapOptions) -> Result<String, RenderError> {
        let mut markers = Vec::with_capacity(self.pairs.len() * 3);
        for pair in &self.pairs {
            markers.push(MarkerData {
                location: pair.driver,
                color: "blue",
                popup: format!("Driver {}", pair.worker),
            });
            markers.push(MarkerData {
                location: pair.pickup,
                color: "green",
                popup: format!("Pickup {}", pair.task),
            });
            markers.push(MarkerData {
                location: pair.drop,
                color: "red",
                popup: format!("Drop {}", pair.task),
            });
        }

        let data = MapData {
            center: options.center.or_else(|| self.centroid()).unwrap_or((0.0, 0.0)),
            zoom: options.zoom,
            tile_url: &options.tile_url,
            attribution: &options.attribution,
            markers,
            lines: self.pairs.iter().map(|pair| pair.geometry.points()).collect(),
        };
        let json = serde_json::to_string(&data)?.replace("</", "<\\/");

        Ok(HTML_TEMPLATE.replace("__MAP_DATA__", &json))
    }
}

/// Writes `contents` to `path` through a temporary sibling file so an
/// existing artifact is only replaced by a complete one.
pub fn write_artifact(path: &Path, contents: &str) -> Result<(), RenderError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    let written = write_then_rename(&tmp_path, path, contents);
    if let Err(err) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(err.into());
    }
    info!(path = %path.display(), "map artifact written");
    Ok(())
}

fn write_then_rename(tmp_path: &Path, path: &Path, contents: &str) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(tmp_path)?);
    writer.write_all(contents.as_bytes())?;
    writer.flush()?;
    drop(writer);
    fs::rename(tmp_path, path)
}

const HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Driver order allocation</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>html, body, #map { height: 100%; margin: 0; }</style>
</head>
<body>
<div id="map"></div>
<script>
const data = __MAP_DATA__;
const map = L.map("map").setView(data.center, data.zoom);
L.tileLayer(data.tile_url, { attribution: data.attribution }).addTo(map);
for (const m of data.markers) {
  L.circleMarker(m.location, { color: m.color, radius: 8, fillOpacity: 0.8 })
    .bindPopup(m.popup)
    .addTo(map);
}
for (const line of data.lines) {
  L.polyline(line, { color: "black", weight: 2.5, opacity: 1 }).addTo(map);
}
</script>
</body>
</html>
"#;
