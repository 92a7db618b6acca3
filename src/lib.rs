//! fleet-dispatch: balanced driver-to-order assignment.
//!
//! Builds a worker x task travel-time cost matrix from a distance provider,
//! solves a minimum-cost assignment under a load-balancing cap, and renders
//! the chosen routes onto a map.

pub mod traits;
pub mod error;
pub mod cost_matrix;
pub mod solver;
pub mod osrm;
pub mod osrm_dataset;
pub mod haversine;
pub mod polyline;
pub mod render;
pub mod scenario;
pub mod config;
pub mod pipeline;
