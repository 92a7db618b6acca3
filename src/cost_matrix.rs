//! Worker x task cost matrix construction.
//!
//! Each entry is the two-leg travel distance (driver -> pickup -> drop) for a
//! worker/task pair divided by the worker's speed.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{AssignError, ProviderError};
use crate::traits::{DistanceProvider, Location};

/// Default number of concurrent distance queries.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Upper bound on in-flight provider queries.
    pub max_concurrency: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Rectangular `num_workers x num_tasks` matrix of travel-time costs.
#[derive(Debug, Clone, PartialEq)]
pub struct CostMatrix {
    rows: Vec<Vec<f64>>,
    num_tasks: usize,
}

impl CostMatrix {
    /// Creates a matrix from precomputed rows. All rows must have the same length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, AssignError> {
        let num_tasks = rows.first().map_or(0, |row| row.len());
        Self::with_tasks(rows, num_tasks)
    }

    /// Creates a matrix with an explicit task count, which keeps the shape
    /// meaningful when there are no workers.
    pub fn with_tasks(rows: Vec<Vec<f64>>, num_tasks: usize) -> Result<Self, AssignError> {
        if let Some(row) = rows.iter().find(|row| row.len() != num_tasks) {
            return Err(AssignError::ShapeMismatch {
                what: "cost matrix row",
                expected: num_tasks,
                actual: row.len(),
            });
        }
        Ok(Self { rows, num_tasks })
    }

    /// Divides a precomputed distance matrix (km) by per-worker speeds.
    pub fn from_distances(distances: &[Vec<f64>], speeds: &[f64]) -> Result<Self, AssignError> {
        check_len("speeds", distances.len(), speeds.len())?;
        check_speeds(speeds)?;
        let num_tasks = distances.first().map_or(0, |row| row.len());
        let rows = distances
            .iter()
            .zip(speeds)
            .map(|(row, speed)| row.iter().map(|km| km / speed).collect())
            .collect();
        Self::with_tasks(rows, num_tasks)
    }

    pub fn num_workers(&self) -> usize {
        self.rows.len()
    }

    pub fn num_tasks(&self) -> usize {
        self.num_tasks
    }

    pub fn get(&self, worker: usize, task: usize) -> f64 {
        self.rows[worker][task]
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }
}

/// Builds the cost matrix by querying `provider` for every worker/task pair.
///
/// Inputs are validated before any provider call. Queries run on a dedicated
/// pool of `options.max_concurrency` threads; results land in their fixed
/// slot regardless of completion order. The first failing pair aborts the
/// whole build.
pub fn build<P>(
    drivers: &[Location],
    pickups: &[Location],
    drops: &[Location],
    speeds: &[f64],
    provider: &P,
    options: &BuildOptions,
) -> Result<CostMatrix, AssignError>
where
    P: DistanceProvider + ?Sized,
{
    build_cancellable(
        drivers,
        pickups,
        drops,
        speeds,
        provider,
        options,
        &AtomicBool::new(false),
    )
}

/// Like [`build`], but stops issuing provider queries once `cancel` is set
/// and fails with [`AssignError::Cancelled`].
pub fn build_cancellable<P>(
    drivers: &[Location],
    pickups: &[Location],
    drops: &[Location],
    speeds: &[f64],
    provider: &P,
    options: &BuildOptions,
    cancel: &AtomicBool,
) -> Result<CostMatrix, AssignError>
where
    P: DistanceProvider + ?Sized,
{
    check_len("drop locations", pickups.len(), drops.len())?;
    check_len("speeds", drivers.len(), speeds.len())?;
    check_speeds(speeds)?;

    let num_workers = drivers.len();
    let num_tasks = pickups.len();
    info!(num_workers, num_tasks, "building cost matrix");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.max_concurrency.max(1))
        .build()
        .map_err(|err| AssignError::WorkerPool(err.to_string()))?;

    let distances: Vec<f64> = pool.install(|| {
        (0..num_workers * num_tasks)
            .into_par_iter()
            .map(|slot| {
                let (worker, task) = (slot / num_tasks, slot % num_tasks);
                if cancel.load(Ordering::Relaxed) {
                    return Err(AssignError::Cancelled);
                }
                query(provider, drivers[worker], pickups[task], drops[task]).map_err(|cause| {
                    AssignError::DistanceUnavailable {
                        worker,
                        task,
                        cause,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()
    })?;

    let rows = if num_tasks == 0 {
        vec![Vec::new(); num_workers]
    } else {
        distances
            .chunks(num_tasks)
            .zip(speeds)
            .map(|(row, speed)| row.iter().map(|km| km / speed).collect())
            .collect()
    };

    CostMatrix::with_tasks(rows, num_tasks)
}

fn query<P>(provider: &P, driver: Location, pickup: Location, drop: Location) -> Result<f64, ProviderError>
where
    P: DistanceProvider + ?Sized,
{
    let km = provider.distance_km(driver, pickup, drop)?;
    if !km.is_finite() || km < 0.0 {
        return Err(ProviderError::InvalidDistance(km));
    }
    debug!(?driver, ?pickup, ?drop, km, "distance");
    Ok(km)
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), AssignError> {
    if expected != actual {
        return Err(AssignError::ShapeMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

fn check_speeds(speeds: &[f64]) -> Result<(), AssignError> {
    match speeds
        .iter()
        .enumerate()
        .find(|(_, speed)| !(speed.is_finite() && **speed > 0.0))
    {
        Some((worker, &speed)) => Err(AssignError::InvalidSpeed { worker, speed }),
        None => Ok(()),
    }
}
