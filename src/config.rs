//! Run configuration: provider backends, solver choice and limits.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cost_matrix::{BuildOptions, DEFAULT_MAX_CONCURRENCY};
use crate::error::AssignError;
use crate::osrm::OsrmConfig;
use crate::render::MapOptions;
use crate::solver::{SolveOptions, SolverBackend};

/// Which provider answers distance and geometry queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderBackend {
    #[default]
    Osrm,
    Haversine,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub osrm: OsrmConfig,
    pub provider: ProviderBackend,
    /// Road-distance multiplier for the haversine provider.
    pub detour_factor: f64,
    /// Solver backend name, resolved at startup.
    pub solver: String,
    pub max_concurrency: usize,
    /// Deadline for cost matrix build plus solve.
    pub timeout_secs: Option<u64>,
    pub map: MapOptions,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            osrm: OsrmConfig::default(),
            provider: ProviderBackend::default(),
            detour_factor: 1.0,
            solver: SolverBackend::default().name().to_string(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            timeout_secs: None,
            map: MapOptions::default(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Json(serde_json::Error),
    Solver(AssignError),
    Client(reqwest::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "cannot read config: {}", err),
            ConfigError::Json(err) => write!(f, "malformed config: {}", err),
            ConfigError::Solver(err) => write!(f, "{}", err),
            ConfigError::Client(err) => write!(f, "cannot build OSRM client: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::Json(err) => Some(err),
            ConfigError::Solver(err) => Some(err),
            ConfigError::Client(err) => Some(err),
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Json(err)
    }
}

impl From<reqwest::Error> for ConfigError {
    fn from(err: reqwest::Error) -> Self {
        ConfigError::Client(err)
    }
}

impl DispatchConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = serde_json::from_str(&fs::read_to_string(path)?)?;
        Ok(config)
    }

    /// Resolves the solver backend. Unknown names are fatal.
    pub fn solve_options(&self) -> Result<SolveOptions, ConfigError> {
        let backend: SolverBackend = self.solver.parse().map_err(ConfigError::Solver)?;
        Ok(SolveOptions {
            backend,
            ..SolveOptions::default()
        })
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            max_concurrency: self.max_concurrency,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
