//! Build -> solve -> render pipeline with pluggable providers.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::{ConfigError, DispatchConfig, ProviderBackend};
use crate::cost_matrix::{self, BuildOptions};
use crate::error::AssignError;
use crate::haversine::Haversine;
use crate::osrm::OsrmClient;
use crate::render::{self, RouteMap};
use crate::scenario::Scenario;
use crate::solver::{self, Assignment, SolveOptions};
use crate::traits::{DistanceProvider, RouteGeometryProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Build,
    Solve,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Build => f.write_str("cost matrix build"),
            Stage::Solve => f.write_str("solve"),
        }
    }
}

/// An assignment failure tagged with the stage it happened in.
#[derive(Debug)]
pub struct PipelineError {
    pub stage: Stage,
    pub error: AssignError,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.error)
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Result of a full run. Rendering failures live in `routes.failures` and
/// never invalidate `assignment`.
#[derive(Debug)]
pub struct Dispatch {
    pub assignment: Assignment,
    pub routes: RouteMap,
}

pub struct Pipeline {
    distance: Arc<dyn DistanceProvider>,
    geometry: Arc<dyn RouteGeometryProvider>,
    build_options: BuildOptions,
    solve_options: SolveOptions,
    timeout: Option<Duration>,
}

impl Pipeline {
    pub fn new(
        distance: Arc<dyn DistanceProvider>,
        geometry: Arc<dyn RouteGeometryProvider>,
    ) -> Self {
        Self {
            distance,
            geometry,
            build_options: BuildOptions::default(),
            solve_options: SolveOptions::default(),
            timeout: None,
        }
    }

    /// Wires providers and options from configuration.
    ///
    /// Fails when the solver backend cannot be resolved or the OSRM client
    /// cannot be built; both are fatal for the run.
    pub fn from_config(config: &DispatchConfig) -> Result<Self, ConfigError> {
        let solve_options = config.solve_options()?;
        let pipeline = match config.provider {
            ProviderBackend::Osrm => {
                let client = Arc::new(OsrmClient::new(config.osrm.clone())?);
                Self::new(client.clone(), client)
            }
            ProviderBackend::Haversine => {
                let haversine = Arc::new(Haversine::new(config.detour_factor));
                Self::new(haversine.clone(), haversine)
            }
        };
        Ok(pipeline
            .with_build_options(config.build_options())
            .with_solve_options(solve_options)
            .with_timeout(config.timeout()))
    }

    pub fn with_build_options(mut self, options: BuildOptions) -> Self {
        self.build_options = options;
        self
    }

    pub fn with_solve_options(mut self, options: SolveOptions) -> Self {
        self.solve_options = options;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the cost matrix and solves it, honoring the configured timeout.
    pub fn assign(&self, scenario: &Scenario) -> Result<Assignment, PipelineError> {
        let Some(limit) = self.timeout else {
            return build_and_solve(
                self.distance.as_ref(),
                scenario,
                &self.build_options,
                &self.solve_options,
                &AtomicBool::new(false),
                || {},
            );
        };

        let (tx, rx) = mpsc::channel();
        let distance = Arc::clone(&self.distance);
        let scenario = scenario.clone();
        let build_options = self.build_options.clone();
        let solve_options = self.solve_options.clone();
        let progress = tx.clone();
        let cancel = Arc::new(AtomicBool::new(false));
        let worker_cancel = Arc::clone(&cancel);

        // Detached on timeout; `cancel` stops it before its next provider query.
        std::thread::spawn(move || {
            let result = build_and_solve(
                distance.as_ref(),
                &scenario,
                &build_options,
                &solve_options,
                &worker_cancel,
                || {
                    let _ = progress.send(Event::Built);
                },
            );
            let _ = tx.send(Event::Done(result));
        });

        let deadline = Instant::now() + limit;
        let mut stage = Stage::Build;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(Event::Built) => stage = Stage::Solve,
                Ok(Event::Done(result)) => return result,
                Err(RecvTimeoutError::Timeout) => {
                    cancel.store(true, Ordering::Relaxed);
                    warn!(%stage, ?limit, "assignment timed out");
                    return Err(PipelineError {
                        stage,
                        error: AssignError::Timeout(limit),
                    });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(PipelineError {
                        stage,
                        error: AssignError::SolverFailed(
                            "assignment worker exited without a result".to_string(),
                        ),
                    });
                }
            }
        }
    }

    /// Fetches route geometry for every assigned pair.
    pub fn render(&self, scenario: &Scenario, assignment: &Assignment) -> RouteMap {
        render::render_routes(scenario, assignment, self.geometry.as_ref())
    }

    pub fn run(&self, scenario: &Scenario) -> Result<Dispatch, PipelineError> {
        let assignment = self.assign(scenario)?;
        let routes = self.render(scenario, &assignment);
        Ok(Dispatch { assignment, routes })
    }
}

enum Event {
    Built,
    Done(Result<Assignment, PipelineError>),
}

fn build_and_solve(
    distance: &dyn DistanceProvider,
    scenario: &Scenario,
    build_options: &BuildOptions,
    solve_options: &SolveOptions,
    cancel: &AtomicBool,
    on_built: impl FnOnce(),
) -> Result<Assignment, PipelineError> {
    // Known from the input sizes alone; skip the provider queries.
    let (workers, tasks) = (scenario.drivers.len(), scenario.tasks.len());
    if workers < tasks {
        return Err(PipelineError {
            stage: Stage::Solve,
            error: AssignError::Infeasible { workers, tasks },
        });
    }

    let started = Instant::now();
    let costs = cost_matrix::build_cancellable(
        &scenario.driver_locations(),
        &scenario.pickups(),
        &scenario.drops(),
        &scenario.speeds(),
        distance,
        build_options,
        cancel,
    )
    .map_err(|error| PipelineError {
        stage: Stage::Build,
        error,
    })?;
    info!(elapsed_ms = started.elapsed().as_millis() as u64, "cost matrix built");
    on_built();

    let started = Instant::now();
    let assignment = solver::solve(&costs, solve_options).map_err(|error| PipelineError {
        stage: Stage::Solve,
        error,
    })?;
    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        pairs = assignment.len(),
        "assignment ready"
    );
    Ok(assignment)
}
