//! Balanced assignment of workers to tasks.
//!
//! Formulation, with `x[i,j] = 1` when worker `i` serves task `j`:
//!
//! - every worker serves at most one task,
//! - every task is served by exactly one worker,
//! - worker loads differ pairwise by at most one,
//! - total cost `sum costs[i][j] * x[i,j]` is minimal.
//!
//! Two backends solve it exactly. [`SolverBackend::KuhnMunkres`] runs the
//! Hungarian algorithm on integer-scaled costs and is the default.
//! [`SolverBackend::BranchAndBound`] enumerates assignments with a column
//! minimum lower bound and checks the load cap at every leaf; it is meant for
//! small instances and for cross-checking.

use std::fmt;
use std::str::FromStr;

use pathfinding::kuhn_munkres::{Weights, kuhn_munkres};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cost_matrix::CostMatrix;
use crate::error::AssignError;

/// Costs are multiplied by this before rounding to integer weights.
pub const DEFAULT_WEIGHT_SCALE: f64 = 1_000_000.0;

/// Maximum allowed difference between any two workers' task counts.
pub const MAX_LOAD_IMBALANCE: usize = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SolverBackend {
    #[default]
    KuhnMunkres,
    BranchAndBound,
}

impl SolverBackend {
    pub fn name(&self) -> &'static str {
        match self {
            SolverBackend::KuhnMunkres => "kuhn-munkres",
            SolverBackend::BranchAndBound => "branch-and-bound",
        }
    }
}

impl fmt::Display for SolverBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SolverBackend {
    type Err = AssignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kuhn-munkres" | "hungarian" => Ok(SolverBackend::KuhnMunkres),
            "branch-and-bound" | "bnb" => Ok(SolverBackend::BranchAndBound),
            other => Err(AssignError::SolverUnavailable(format!(
                "unknown solver backend {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SolveOptions {
    pub backend: SolverBackend,
    /// Integer scaling applied to costs for the Kuhn-Munkres backend.
    pub weight_scale: f64,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            backend: SolverBackend::default(),
            weight_scale: DEFAULT_WEIGHT_SCALE,
        }
    }
}

/// Set of (worker, task) pairs chosen by the solver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pairs: Vec<(usize, usize)>,
    pair_costs: Vec<f64>,
    total_cost: f64,
}

impl Assignment {
    fn from_pairs(mut pairs: Vec<(usize, usize)>, costs: &CostMatrix) -> Self {
        pairs.sort_unstable();
        let pair_costs: Vec<f64> = pairs.iter().map(|&(i, j)| costs.get(i, j)).collect();
        let total_cost = pair_costs.iter().sum();
        Self {
            pairs,
            pair_costs,
            total_cost,
        }
    }

    /// Pairs sorted by worker index.
    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    /// (worker, task, cost) for every pair, sorted by worker.
    pub fn pairs_with_cost(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.pairs
            .iter()
            .zip(&self.pair_costs)
            .map(|(&(i, j), &cost)| (i, j, cost))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    pub fn task_of(&self, worker: usize) -> Option<usize> {
        self.pairs.iter().find(|(i, _)| *i == worker).map(|(_, j)| *j)
    }

    pub fn worker_of(&self, task: usize) -> Option<usize> {
        self.pairs.iter().find(|(_, j)| *j == task).map(|(i, _)| *i)
    }

    /// Number of tasks per worker, indexed by worker.
    pub fn loads(&self, num_workers: usize) -> Vec<usize> {
        let mut loads = vec![0; num_workers];
        for &(worker, _) in &self.pairs {
            if let Some(load) = loads.get_mut(worker) {
                *load += 1;
            }
        }
        loads
    }
}

/// Solves the balanced assignment problem for `costs`.
///
/// Returns an empty assignment when there are no tasks and
/// [`AssignError::Infeasible`] when the constraints cannot all hold.
pub fn solve(costs: &CostMatrix, options: &SolveOptions) -> Result<Assignment, AssignError> {
    let workers = costs.num_workers();
    let tasks = costs.num_tasks();
    info!(backend = %options.backend, workers, tasks, "solving assignment");

    if tasks == 0 {
        return Ok(Assignment::from_pairs(Vec::new(), costs));
    }
    if workers < tasks {
        return Err(AssignError::Infeasible { workers, tasks });
    }
    if let Some((i, j)) = first_non_finite(costs) {
        return Err(AssignError::SolverFailed(format!(
            "cost for worker {} and task {} is not finite",
            i, j
        )));
    }

    let pairs = match options.backend {
        SolverBackend::KuhnMunkres => solve_kuhn_munkres(costs, options.weight_scale)?,
        SolverBackend::BranchAndBound => {
            BranchAndBound::new(costs).run().ok_or(AssignError::Infeasible { workers, tasks })?
        }
    };

    check_constraints(&pairs, workers, tasks)?;
    let assignment = Assignment::from_pairs(pairs, costs);
    info!(total_cost = assignment.total_cost(), "assignment solved");
    Ok(assignment)
}

/// Verifies capacity, coverage and the load cap for a candidate solution.
fn check_constraints(
    pairs: &[(usize, usize)],
    workers: usize,
    tasks: usize,
) -> Result<(), AssignError> {
    let mut loads = vec![0usize; workers];
    let mut coverage = vec![0usize; tasks];
    for &(i, j) in pairs {
        loads[i] += 1;
        coverage[j] += 1;
    }

    if let Some(i) = loads.iter().position(|&load| load > 1) {
        return Err(AssignError::SolverFailed(format!(
            "worker {} assigned {} tasks",
            i, loads[i]
        )));
    }
    if let Some(j) = coverage.iter().position(|&count| count != 1) {
        return Err(AssignError::SolverFailed(format!(
            "task {} covered {} times",
            j, coverage[j]
        )));
    }
    if load_gap(&loads) > MAX_LOAD_IMBALANCE {
        return Err(AssignError::SolverFailed(format!(
            "load imbalance {} exceeds {}",
            load_gap(&loads),
            MAX_LOAD_IMBALANCE
        )));
    }
    Ok(())
}

fn load_gap(loads: &[usize]) -> usize {
    let max = loads.iter().copied().max().unwrap_or(0);
    let min = loads.iter().copied().min().unwrap_or(0);
    max - min
}

fn first_non_finite(costs: &CostMatrix) -> Option<(usize, usize)> {
    costs.rows().iter().enumerate().find_map(|(i, row)| {
        row.iter()
            .position(|cost| !cost.is_finite())
            .map(|j| (i, j))
    })
}

// ============================================================================
// Kuhn-Munkres backend
// ============================================================================

/// Task x worker weights, negated so that maximizing weight minimizes cost.
struct TaskWeights(Vec<Vec<i64>>);

impl Weights<i64> for TaskWeights {
    fn rows(&self) -> usize {
        self.0.len()
    }

    fn columns(&self) -> usize {
        self.0.first().map_or(0, |row| row.len())
    }

    fn at(&self, row: usize, col: usize) -> i64 {
        self.0[row][col]
    }

    fn neg(&self) -> Self {
        TaskWeights(
            self.0
                .iter()
                .map(|row| row.iter().map(|w| w.saturating_neg()).collect())
                .collect(),
        )
    }
}

fn solve_kuhn_munkres(costs: &CostMatrix, scale: f64) -> Result<Vec<(usize, usize)>, AssignError> {
    let workers = costs.num_workers();
    let tasks = costs.num_tasks();
    if !(scale.is_finite() && scale > 0.0) {
        return Err(AssignError::SolverFailed(format!("invalid weight scale {}", scale)));
    }

    // Labels and slacks combine several weights; keep their sums representable.
    let limit = (i64::MAX / (4 * (tasks + workers + 1) as i64)) as f64;

    // kuhn_munkres needs rows <= columns, so tasks are rows.
    let mut weights = Vec::with_capacity(tasks);
    for j in 0..tasks {
        let mut row = Vec::with_capacity(workers);
        for i in 0..workers {
            let scaled = (costs.get(i, j) * scale).round();
            if scaled.abs() >= limit {
                return Err(AssignError::SolverFailed(format!(
                    "cost {} for worker {} and task {} overflows integer weights",
                    costs.get(i, j),
                    i,
                    j
                )));
            }
            row.push(-(scaled as i64));
        }
        weights.push(row);
    }

    let (total, columns) = kuhn_munkres(&TaskWeights(weights));
    debug!(total, "kuhn-munkres finished");

    Ok(columns
        .into_iter()
        .enumerate()
        .map(|(task, worker)| (worker, task))
        .collect())
}

// ============================================================================
// Branch-and-bound backend
// ============================================================================

struct BranchAndBound<'a> {
    costs: &'a CostMatrix,
    /// `bound[j]` is a lower bound on the cost of serving tasks `j..`.
    bound: Vec<f64>,
    /// Workers per task in ascending cost order.
    order: Vec<Vec<usize>>,
    loads: Vec<usize>,
    current: Vec<(usize, usize)>,
    best: Option<(f64, Vec<(usize, usize)>)>,
    nodes: u64,
}

impl<'a> BranchAndBound<'a> {
    fn new(costs: &'a CostMatrix) -> Self {
        let workers = costs.num_workers();
        let tasks = costs.num_tasks();

        let mut bound = vec![0.0; tasks + 1];
        for j in (0..tasks).rev() {
            let cheapest = (0..workers)
                .map(|i| costs.get(i, j))
                .fold(f64::INFINITY, f64::min);
            bound[j] = bound[j + 1] + cheapest;
        }

        let order = (0..tasks)
            .map(|j| {
                let mut by_cost: Vec<usize> = (0..workers).collect();
                by_cost.sort_by(|&a, &b| costs.get(a, j).total_cmp(&costs.get(b, j)));
                by_cost
            })
            .collect();

        Self {
            costs,
            bound,
            order,
            loads: vec![0; workers],
            current: Vec::with_capacity(tasks),
            best: None,
            nodes: 0,
        }
    }

    fn run(mut self) -> Option<Vec<(usize, usize)>> {
        self.branch(0, 0.0);
        debug!(nodes = self.nodes, "branch-and-bound finished");
        self.best.map(|(_, pairs)| pairs)
    }

    fn branch(&mut self, task: usize, cost: f64) {
        self.nodes += 1;

        if task == self.costs.num_tasks() {
            if load_gap(&self.loads) > MAX_LOAD_IMBALANCE {
                return;
            }
            if self.best.as_ref().is_none_or(|(best, _)| cost < *best) {
                self.best = Some((cost, self.current.clone()));
            }
            return;
        }

        if let Some((best, _)) = &self.best {
            if cost + self.bound[task] >= *best {
                return;
            }
        }

        for k in 0..self.order[task].len() {
            let worker = self.order[task][k];
            if self.loads[worker] >= 1 {
                continue;
            }
            self.loads[worker] += 1;
            self.current.push((worker, task));
            self.branch(task + 1, cost + self.costs.get(worker, task));
            self.current.pop();
            self.loads[worker] -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: Vec<Vec<f64>>) -> CostMatrix {
        CostMatrix::from_rows(rows).expect("matrix")
    }

    fn with_backend(backend: SolverBackend) -> SolveOptions {
        SolveOptions {
            backend,
            ..SolveOptions::default()
        }
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("kuhn-munkres".parse::<SolverBackend>().unwrap(), SolverBackend::KuhnMunkres);
        assert_eq!("bnb".parse::<SolverBackend>().unwrap(), SolverBackend::BranchAndBound);
        assert!(matches!(
            "scip".parse::<SolverBackend>(),
            Err(AssignError::SolverUnavailable(_))
        ));
    }

    #[test]
    fn test_load_gap() {
        assert_eq!(load_gap(&[]), 0);
        assert_eq!(load_gap(&[1, 0, 1]), 1);
        assert_eq!(load_gap(&[2, 0]), 2);
    }

    #[test]
    fn test_check_constraints_rejects_double_coverage() {
        let err = check_constraints(&[(0, 0), (1, 0)], 2, 1).unwrap_err();
        assert!(matches!(err, AssignError::SolverFailed(_)));
    }

    #[test]
    fn test_check_constraints_rejects_overloaded_worker() {
        let err = check_constraints(&[(0, 0), (0, 1)], 2, 2).unwrap_err();
        assert!(matches!(err, AssignError::SolverFailed(_)));
    }

    #[test]
    fn test_non_finite_cost_is_solver_failure() {
        let costs = matrix(vec![vec![1.0, f64::NAN], vec![2.0, 3.0]]);
        for backend in [SolverBackend::KuhnMunkres, SolverBackend::BranchAndBound] {
            let err = solve(&costs, &with_backend(backend)).unwrap_err();
            assert!(matches!(err, AssignError::SolverFailed(_)));
        }
    }

    #[test]
    fn test_overflowing_weight_is_solver_failure() {
        let costs = matrix(vec![vec![1e300]]);
        let err = solve(&costs, &SolveOptions::default()).unwrap_err();
        assert!(matches!(err, AssignError::SolverFailed(_)));
    }

    #[test]
    fn test_assignment_accessors() {
        let costs = matrix(vec![vec![1.2, 2.0], vec![1.8, 1.0], vec![2.5, 2.2]]);
        let assignment = solve(&costs, &SolveOptions::default()).expect("solve");
        assert_eq!(assignment.task_of(0), Some(0));
        assert_eq!(assignment.task_of(2), None);
        assert_eq!(assignment.worker_of(1), Some(1));
        assert_eq!(assignment.loads(3), vec![1, 1, 0]);
        assert_eq!(assignment.len(), 2);
    }
}
