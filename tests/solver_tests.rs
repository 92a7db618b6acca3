//! Assignment solver tests
//!
//! Covers the documented scenarios, infeasibility, and the structural
//! properties every solution must satisfy.

use fleet_dispatch::cost_matrix::CostMatrix;
use fleet_dispatch::error::AssignError;
use fleet_dispatch::solver::{solve, Assignment, SolveOptions, SolverBackend};
use proptest::prelude::*;

// ============================================================================
// Helper Functions
// ============================================================================

const BACKENDS: [SolverBackend; 2] = [SolverBackend::KuhnMunkres, SolverBackend::BranchAndBound];

/// Slack allowed for the integer scaling of the Kuhn-Munkres backend.
const EPS: f64 = 1e-4;

fn options(backend: SolverBackend) -> SolveOptions {
    SolveOptions {
        backend,
        ..SolveOptions::default()
    }
}

fn matrix(rows: Vec<Vec<f64>>) -> CostMatrix {
    CostMatrix::from_rows(rows).expect("rectangular matrix")
}

/// Exhaustive minimum over all injective task -> worker maps.
fn brute_force_optimum(costs: &CostMatrix) -> Option<f64> {
    fn go(costs: &CostMatrix, task: usize, used: &mut Vec<bool>, acc: f64, best: &mut Option<f64>) {
        if task == costs.num_tasks() {
            if best.is_none_or(|b| acc < b) {
                *best = Some(acc);
            }
            return;
        }
        for worker in 0..costs.num_workers() {
            if used[worker] {
                continue;
            }
            used[worker] = true;
            go(costs, task + 1, used, acc + costs.get(worker, task), best);
            used[worker] = false;
        }
    }

    let mut best = None;
    go(costs, 0, &mut vec![false; costs.num_workers()], 0.0, &mut best);
    best
}

fn assert_structurally_valid(assignment: &Assignment, workers: usize, tasks: usize) {
    let mut covered = vec![0; tasks];
    for &(_, task) in assignment.pairs() {
        covered[task] += 1;
    }
    assert!(covered.iter().all(|&c| c == 1), "every task exactly once: {:?}", covered);

    let loads = assignment.loads(workers);
    assert!(loads.iter().all(|&l| l <= 1), "every worker at most once: {:?}", loads);

    let max = loads.iter().max().copied().unwrap_or(0);
    let min = loads.iter().min().copied().unwrap_or(0);
    assert!(max - min <= 1, "load imbalance over one: {:?}", loads);

    assert_eq!(assignment.len(), tasks);
}

// ============================================================================
// Documented Scenarios
// ============================================================================

#[test]
fn test_three_workers_two_tasks() {
    let costs = matrix(vec![vec![1.2, 2.0], vec![1.8, 1.0], vec![2.5, 2.2]]);

    for backend in BACKENDS {
        let assignment = solve(&costs, &options(backend)).expect("feasible");
        assert_eq!(assignment.pairs(), &[(0, 0), (1, 1)], "backend {}", backend);
        assert!((assignment.total_cost() - 2.2).abs() < 1e-9);
        assert_eq!(assignment.loads(3), vec![1, 1, 0]);
    }
}

#[test]
fn test_cross_assignment_beats_diagonal() {
    let costs = matrix(vec![vec![5.0, 1.0], vec![1.0, 5.0]]);

    for backend in BACKENDS {
        let assignment = solve(&costs, &options(backend)).expect("feasible");
        assert_eq!(assignment.pairs(), &[(0, 1), (1, 0)], "backend {}", backend);
        assert_eq!(assignment.total_cost(), 2.0);
    }
}

#[test]
fn test_pair_costs_are_reported() {
    let costs = matrix(vec![vec![5.0, 1.0], vec![1.0, 5.0]]);
    let assignment = solve(&costs, &SolveOptions::default()).expect("feasible");
    let entries: Vec<_> = assignment.pairs_with_cost().collect();
    assert_eq!(entries, vec![(0, 1, 1.0), (1, 0, 1.0)]);
}

// ============================================================================
// Infeasibility vs. Empty Input
// ============================================================================

#[test]
fn test_fewer_workers_than_tasks_is_infeasible() {
    let costs = matrix(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);

    for backend in BACKENDS {
        match solve(&costs, &options(backend)) {
            Err(AssignError::Infeasible { workers, tasks }) => {
                assert_eq!((workers, tasks), (2, 3));
            }
            other => panic!("expected Infeasible, got {:?}", other),
        }
    }
}

#[test]
fn test_no_workers_with_tasks_is_infeasible() {
    let costs = CostMatrix::with_tasks(Vec::new(), 1).expect("shape");
    assert!(matches!(
        solve(&costs, &SolveOptions::default()),
        Err(AssignError::Infeasible {
            workers: 0,
            tasks: 1
        })
    ));
}

#[test]
fn test_zero_tasks_is_empty_success() {
    let costs = CostMatrix::with_tasks(vec![Vec::new(), Vec::new()], 0).expect("shape");
    let assignment = solve(&costs, &SolveOptions::default()).expect("empty is feasible");
    assert!(assignment.is_empty());
    assert_eq!(assignment.total_cost(), 0.0);
}

#[test]
fn test_square_problem_uses_every_worker() {
    let costs = matrix(vec![
        vec![4.0, 1.0, 3.0],
        vec![2.0, 0.0, 5.0],
        vec![3.0, 2.0, 2.0],
    ]);
    for backend in BACKENDS {
        let assignment = solve(&costs, &options(backend)).expect("feasible");
        assert_structurally_valid(&assignment, 3, 3);
        assert_eq!(assignment.total_cost(), 5.0);
    }
}

// ============================================================================
// Properties
// ============================================================================

fn feasible_matrix() -> impl Strategy<Value = Vec<Vec<f64>>> {
    (1usize..=6)
        .prop_flat_map(|workers| (Just(workers), 1usize..=workers))
        .prop_flat_map(|(workers, tasks)| {
            prop::collection::vec(prop::collection::vec(0.0f64..100.0, tasks), workers)
        })
}

proptest! {
    #[test]
    fn prop_solutions_are_valid_and_optimal(rows in feasible_matrix()) {
        let costs = matrix(rows);
        let optimum = brute_force_optimum(&costs).expect("workers >= tasks");

        for backend in BACKENDS {
            let assignment = solve(&costs, &options(backend)).expect("feasible");
            assert_structurally_valid(&assignment, costs.num_workers(), costs.num_tasks());
            prop_assert!(
                (assignment.total_cost() - optimum).abs() < EPS,
                "{} found {} but optimum is {}", backend, assignment.total_cost(), optimum
            );
        }
    }

    #[test]
    fn prop_solving_twice_gives_same_objective(rows in feasible_matrix()) {
        let costs = matrix(rows);
        let first = solve(&costs, &SolveOptions::default()).expect("feasible");
        let second = solve(&costs, &SolveOptions::default()).expect("feasible");
        prop_assert_eq!(first.total_cost(), second.total_cost());
    }

    #[test]
    fn prop_faster_worker_never_raises_costs(
        rows in feasible_matrix(),
        worker_seed in any::<prop::sample::Index>(),
        factor in 1.0f64..4.0,
    ) {
        let distances = rows;
        let workers = distances.len();
        let worker = worker_seed.index(workers);
        let speeds = vec![20.0; workers];
        let mut faster = speeds.clone();
        faster[worker] *= factor;

        let base = CostMatrix::from_distances(&distances, &speeds).expect("matrix");
        let scaled = CostMatrix::from_distances(&distances, &faster).expect("matrix");

        for task in 0..base.num_tasks() {
            prop_assert!(scaled.get(worker, task) <= base.get(worker, task));
        }

        let before = solve(&base, &SolveOptions::default()).expect("feasible");
        let after = solve(&scaled, &SolveOptions::default()).expect("feasible");
        prop_assert!(after.total_cost() <= before.total_cost() + EPS);

        // Holding the chosen pairs fixed, the worker's own contribution cannot grow.
        if let Some(task) = before.task_of(worker) {
            prop_assert!(scaled.get(worker, task) <= base.get(worker, task));
        }
    }

    #[test]
    fn prop_more_tasks_than_workers_is_infeasible(
        workers in 0usize..4,
        extra in 1usize..3,
    ) {
        let tasks = workers + extra;
        let costs = CostMatrix::with_tasks(vec![vec![1.0; tasks]; workers], tasks).expect("shape");
        for backend in BACKENDS {
            let is_infeasible = matches!(
                solve(&costs, &options(backend)),
                Err(AssignError::Infeasible { .. })
            );
            prop_assert!(is_infeasible);
        }
    }
}
