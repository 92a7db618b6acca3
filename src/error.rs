//! Error types for the dispatch pipeline.

use std::fmt;
use std::io;
use std::time::Duration;

/// Failure of a single distance or geometry query against a provider.
#[derive(Debug)]
pub enum ProviderError {
    Http(reqwest::Error),
    /// The provider answered with a non-`Ok` status code.
    Api(String),
    NoRoute,
    /// The route did not contain the expected leg.
    MissingLeg(usize),
    InvalidGeometry(String),
    /// The provider returned a negative or non-finite distance.
    InvalidDistance(f64),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Http(err) => write!(f, "http error: {}", err),
            ProviderError::Api(code) => write!(f, "provider returned code {}", code),
            ProviderError::NoRoute => write!(f, "no route found"),
            ProviderError::MissingLeg(leg) => write!(f, "route is missing leg {}", leg),
            ProviderError::InvalidGeometry(msg) => write!(f, "invalid geometry: {}", msg),
            ProviderError::InvalidDistance(km) => write!(f, "invalid distance {} km", km),
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProviderError::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Http(err)
    }
}

/// Failures of the assignment core (cost matrix build and solve).
#[derive(Debug)]
pub enum AssignError {
    /// Input sequences have inconsistent lengths.
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    InvalidSpeed { worker: usize, speed: f64 },
    DistanceUnavailable {
        worker: usize,
        task: usize,
        cause: ProviderError,
    },
    /// No assignment satisfies the capacity, coverage and fairness constraints.
    Infeasible { workers: usize, tasks: usize },
    /// The requested optimization backend cannot be used. Fatal.
    SolverUnavailable(String),
    /// The backend failed for reasons other than infeasibility.
    SolverFailed(String),
    Timeout(Duration),
    /// The run was abandoned before all distance queries were issued.
    Cancelled,
    /// The bounded provider pool could not be created.
    WorkerPool(String),
}

impl fmt::Display for AssignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignError::ShapeMismatch {
                what,
                expected,
                actual,
            } => write!(
                f,
                "shape mismatch: {} has length {}, expected {}",
                what, actual, expected
            ),
            AssignError::InvalidSpeed { worker, speed } => {
                write!(f, "invalid speed {} for worker {}", speed, worker)
            }
            AssignError::DistanceUnavailable {
                worker,
                task,
                cause,
            } => write!(
                f,
                "distance unavailable for worker {} and task {}: {}",
                worker, task, cause
            ),
            AssignError::Infeasible { workers, tasks } => write!(
                f,
                "no feasible assignment for {} workers and {} tasks",
                workers, tasks
            ),
            AssignError::SolverUnavailable(msg) => write!(f, "solver unavailable: {}", msg),
            AssignError::SolverFailed(msg) => write!(f, "solver failed: {}", msg),
            AssignError::Timeout(limit) => {
                write!(f, "assignment did not finish within {:?}", limit)
            }
            AssignError::Cancelled => write!(f, "assignment cancelled"),
            AssignError::WorkerPool(msg) => write!(f, "worker pool error: {}", msg),
        }
    }
}

impl std::error::Error for AssignError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AssignError::DistanceUnavailable { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

/// Failures while rendering or persisting the map artifact.
#[derive(Debug)]
pub enum RenderError {
    Geometry {
        worker: usize,
        task: usize,
        cause: ProviderError,
    },
    /// The pair refers to a driver or task the scenario does not have.
    UnknownPair { worker: usize, task: usize },
    Io(io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Geometry {
                worker,
                task,
                cause,
            } => write!(
                f,
                "route geometry failed for worker {} and task {}: {}",
                worker, task, cause
            ),
            RenderError::UnknownPair { worker, task } => write!(
                f,
                "worker {} and task {} are not in the scenario",
                worker, task
            ),
            RenderError::Io(err) => write!(f, "io error: {}", err),
            RenderError::Json(err) => write!(f, "json error: {}", err),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Geometry { cause, .. } => Some(cause),
            RenderError::UnknownPair { .. } => None,
            RenderError::Io(err) => Some(err),
            RenderError::Json(err) => Some(err),
        }
    }
}

impl From<io::Error> for RenderError {
    fn from(err: io::Error) -> Self {
        RenderError::Io(err)
    }
}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        RenderError::Json(err)
    }
}
