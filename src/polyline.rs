//! Polyline representation for route geometries.
//!
//! Routes are kept as decoded coordinate sequences. The compact encoded
//! polyline format (as returned by OSRM with `geometries=polyline`) is only
//! handled at the boundary via [`Polyline::decode`] and [`Polyline::encode`].

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::traits::Location;

/// Coordinate precision used by OSRM's `polyline` geometry format.
pub const PRECISION_5: u32 = 5;

/// Coordinate precision used by OSRM's `polyline6` geometry format.
pub const PRECISION_6: u32 = 6;

/// A polyline representing a route geometry as decoded coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<Location>,
}

impl Polyline {
    /// Creates a new Polyline from decoded (latitude, longitude) points.
    pub fn new(points: Vec<Location>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Location] {
        &self.points
    }

    pub fn into_points(self) -> Vec<Location> {
        self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Decodes an encoded polyline string with the given decimal precision.
    pub fn decode(encoded: &str, precision: u32) -> Result<Self, ProviderError> {
        let factor = 10f64.powi(precision as i32);
        let mut bytes = encoded.bytes();
        let mut points = Vec::new();
        let (mut lat, mut lng) = (0i64, 0i64);

        loop {
            let Some(dlat) = next_value(&mut bytes)? else {
                break;
            };
            let dlng = next_value(&mut bytes)?.ok_or_else(|| {
                ProviderError::InvalidGeometry("polyline ends after a latitude".to_string())
            })?;
            lat = lat.wrapping_add(dlat);
            lng = lng.wrapping_add(dlng);
            points.push((lat as f64 / factor, lng as f64 / factor));
        }

        Ok(Self { points })
    }

    /// Encodes the points with the given decimal precision.
    pub fn encode(&self, precision: u32) -> String {
        let factor = 10f64.powi(precision as i32);
        let mut out = String::new();
        let (mut prev_lat, mut prev_lng) = (0i64, 0i64);

        for &(lat, lng) in &self.points {
            let lat = (lat * factor).round() as i64;
            let lng = (lng * factor).round() as i64;
            push_value(&mut out, lat - prev_lat);
            push_value(&mut out, lng - prev_lng);
            prev_lat = lat;
            prev_lng = lng;
        }

        out
    }
}

/// Reads one zig-zag varint. Returns `None` at a clean end of input.
fn next_value(bytes: &mut impl Iterator<Item = u8>) -> Result<Option<i64>, ProviderError> {
    let mut result: i64 = 0;
    let mut shift = 0;
    let mut started = false;

    loop {
        let Some(byte) = bytes.next() else {
            if !started {
                return Ok(None);
            }
            return Err(ProviderError::InvalidGeometry(
                "truncated polyline chunk".to_string(),
            ));
        };
        started = true;

        if !(63..=126).contains(&byte) {
            return Err(ProviderError::InvalidGeometry(format!(
                "unexpected byte {:#04x} in polyline",
                byte
            )));
        }
        if shift > 60 {
            return Err(ProviderError::InvalidGeometry("polyline value too long".to_string()));
        }

        let chunk = (byte - 63) as i64;
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }

    let value = if result & 1 == 1 { !(result >> 1) } else { result >> 1 };
    Ok(Some(value))
}

fn push_value(out: &mut String, value: i64) {
    let mut v = if value < 0 { !(value << 1) } else { value << 1 };
    while v >= 0x20 {
        out.push((((v & 0x1f) | 0x20) as u8 + 63) as char);
        v >>= 5;
    }
    out.push((v as u8 + 63) as char);
}
