//! Test fixtures for fleet-dispatch.
//!
//! Provides realistic test data:
//! - Real Bengaluru (HSR Layout / Bellandur) locations
//! - The three-driver, two-order scenario the service was first run against

pub mod bengaluru_locations;

pub use bengaluru_locations::*;
