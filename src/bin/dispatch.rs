//! Command-line entry point: assign drivers to orders and write a route map.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use fleet_dispatch::config::{DispatchConfig, ProviderBackend};
use fleet_dispatch::error::{AssignError, RenderError};
use fleet_dispatch::pipeline::{Pipeline, PipelineError, Stage};
use fleet_dispatch::render::{write_artifact, MapOptions, RouteMap};
use fleet_dispatch::scenario::Scenario;

const EXIT_CONFIG: u8 = 1;
const EXIT_BUILD: u8 = 2;
const EXIT_SOLVE: u8 = 3;
const EXIT_RENDER: u8 = 4;
const EXIT_TIMEOUT: u8 = 5;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderArg {
    Osrm,
    Haversine,
}

#[derive(Debug, Parser)]
#[command(name = "dispatch", about = "Assign drivers to pickup/drop orders and map the routes")]
struct Args {
    /// Scenario JSON with drivers (location, speed_kmh) and tasks (pickup, drop).
    scenario: PathBuf,

    /// Optional JSON config file; flags below override it.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Where to write the HTML map.
    #[arg(long, short, default_value = "driver_order_allocation_map.html")]
    output: PathBuf,

    #[arg(long, env = "OSRM_URL")]
    osrm_url: Option<String>,

    #[arg(long, value_enum)]
    provider: Option<ProviderArg>,

    /// Solver backend: kuhn-munkres or branch-and-bound.
    #[arg(long, env = "DISPATCH_SOLVER")]
    solver: Option<String>,

    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Deadline in seconds for cost matrix build plus solve.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Print the assignment as JSON on stdout.
    #[arg(long)]
    json: bool,

    #[arg(long, short)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!("{:#}", err);
            ExitCode::from(EXIT_CONFIG)
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<DispatchConfig> {
    let mut config = match &args.config {
        Some(path) => DispatchConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => DispatchConfig::default(),
    };

    if let Some(url) = &args.osrm_url {
        config.osrm.base_url = url.clone();
    }
    if let Some(provider) = args.provider {
        config.provider = match provider {
            ProviderArg::Osrm => ProviderBackend::Osrm,
            ProviderArg::Haversine => ProviderBackend::Haversine,
        };
    }
    if let Some(solver) = &args.solver {
        config.solver = solver.clone();
    }
    if let Some(n) = args.max_concurrency {
        config.max_concurrency = n;
    }
    if args.timeout_secs.is_some() {
        config.timeout_secs = args.timeout_secs;
    }
    Ok(config)
}

fn run(args: &Args) -> Result<u8> {
    let config = load_config(args)?;
    let pipeline = Pipeline::from_config(&config).context("configuring pipeline")?;
    let scenario = Scenario::from_json_file(&args.scenario)
        .with_context(|| format!("loading scenario {}", args.scenario.display()))?;

    let assignment = match pipeline.assign(&scenario) {
        Ok(assignment) => assignment,
        Err(err) => {
            error!(stage = %err.stage, "{}", err);
            return Ok(assign_exit_code(&err));
        }
    };

    info!(total_cost = assignment.total_cost(), "total cost");
    for (worker, task, cost) in assignment.pairs_with_cost() {
        info!("worker {} assigned to task {}, cost {:.4}", worker, task, cost);
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&assignment)?);
    }

    let routes = pipeline.render(&scenario, &assignment);
    for failure in &routes.failures {
        error!("{}", failure);
    }
    let saved = save_map(&routes, &config.map, &args.output);
    match &saved {
        Ok(()) => info!(path = %args.output.display(), "map saved"),
        Err(err) => error!(path = %args.output.display(), "render failed: {}", err),
    }
    Ok(render_exit_code(&saved, routes.failures.len()))
}

fn save_map(routes: &RouteMap, options: &MapOptions, path: &Path) -> Result<(), RenderError> {
    let html = routes.to_html(options)?;
    write_artifact(path, &html)
}

/// Exit code for a failed build or solve.
fn assign_exit_code(err: &PipelineError) -> u8 {
    match (&err.error, err.stage) {
        (AssignError::Timeout(_), _) => EXIT_TIMEOUT,
        (_, Stage::Build) => EXIT_BUILD,
        (_, Stage::Solve) => EXIT_SOLVE,
    }
}

/// Exit code once an assignment exists: any render or persistence failure
/// is reported as the render stage.
fn render_exit_code(saved: &Result<(), RenderError>, pair_failures: usize) -> u8 {
    if saved.is_err() || pair_failures > 0 {
        EXIT_RENDER
    } else {
        0
    }
}
