use axum::{
    Router,
    extract::Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::info;

use crate::core::export;
use crate::core::histogram::Bucket;
use crate::core::simulation::MAX_HORIZON_YEARS;
use crate::core::{
    Kpi, KpiKind, LedgerSeries, Replay, RunResult, ScenarioConfig, SeriesEnd, Simulation,
    SimulationMode,
};

const DEFAULT_PORT: u16 = 8080;
const REPORTED_PERCENTILES: [f64; 7] = [0.05, 0.1, 0.25, 0.5, 0.75, 0.9, 0.95];

#[derive(Debug, Parser)]
#[command(
    name = "patrisim",
    about = "Household wealth projection with Monte Carlo risk analysis"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Simulate a scenario and export its ledgers.
    Run(RunArgs),
    /// Serve the JSON API.
    Serve {
        #[arg(default_value_t = DEFAULT_PORT)]
        port: u16,
    },
}

#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    #[arg(long, help = "Scenario JSON file; the demo scenario when omitted")]
    scenario: Option<PathBuf>,
    #[arg(long, help = "Number of runs; more than one enables Monte Carlo")]
    runs: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    first_year: Option<u32>,
    #[arg(long, help = "Number of simulated years")]
    years: Option<u32>,
    #[arg(long, default_value = "out")]
    output_dir: PathBuf,
    #[arg(long, help = "Replay the run with this 1-based index and export its ledgers")]
    replay: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsOverrides {
    runs: Option<usize>,
    seed: Option<u64>,
    first_year: Option<u32>,
    years: Option<u32>,
}

impl SettingsOverrides {
    fn apply(self, config: &mut ScenarioConfig) -> Result<(), String> {
        let settings = &mut config.simulation;
        if let Some(v) = self.runs {
            settings.runs = v;
        }
        if let Some(v) = self.seed {
            settings.seed = v;
        }
        if let Some(v) = self.first_year {
            settings.first_year = v;
        }
        if let Some(v) = self.years {
            settings.years = v;
        }

        if settings.runs == 0 {
            return Err("runs must be > 0".to_string());
        }
        if settings.years == 0 {
            return Err("years must be > 0".to_string());
        }
        if settings.years > MAX_HORIZON_YEARS
            || settings.first_year.checked_add(settings.years).is_none()
        {
            return Err(format!("years must be <= {MAX_HORIZON_YEARS}"));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct RunRequest {
    config: ScenarioConfig,
    output_dir: PathBuf,
    replay: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimulatePayload {
    scenario: Option<ScenarioConfig>,
    #[serde(flatten)]
    overrides: SettingsOverrides,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplayPayload {
    scenario: Option<ScenarioConfig>,
    #[serde(flatten)]
    overrides: SettingsOverrides,
    run: RunResult,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PercentilePoint {
    probability: f64,
    value: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KpiReport {
    kind: KpiKind,
    label: &'static str,
    objective: f64,
    target_probability: f64,
    value: Option<f64>,
    objective_reached: Option<bool>,
    probability_of_reaching_objective: Option<f64>,
    runs: usize,
    min: Option<f64>,
    max: Option<f64>,
    average: Option<f64>,
    median: Option<f64>,
    std_dev: Option<f64>,
    percentiles: Vec<PercentilePoint>,
    buckets: Vec<Bucket>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    mode: SimulationMode,
    first_year: u32,
    years: u32,
    seed: u64,
    runs_requested: usize,
    runs_completed: usize,
    kpis: Vec<KpiReport>,
    run_results: Vec<RunResult>,
    last_series: Option<LedgerSeries>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_request(args: RunArgs) -> Result<RunRequest, String> {
    let mut config = match &args.scenario {
        Some(path) => {
            let json = fs::read_to_string(path)
                .map_err(|e| format!("cannot read --scenario {}: {e}", path.display()))?;
            serde_json::from_str::<ScenarioConfig>(&json)
                .map_err(|e| format!("invalid scenario {}: {e}", path.display()))?
        }
        None => ScenarioConfig::default(),
    };

    SettingsOverrides {
        runs: args.runs,
        seed: args.seed,
        first_year: args.first_year,
        years: args.years,
    }
    .apply(&mut config)
    .map_err(|e| format!("--{e}"))?;

    if let Some(index) = args.replay {
        if config.simulation.runs < 2 {
            return Err("--replay requires a Monte Carlo batch (--runs > 1)".to_string());
        }
        if index == 0 || index > config.simulation.runs {
            return Err(format!(
                "--replay must be between 1 and {}",
                config.simulation.runs
            ));
        }
    }

    Ok(RunRequest {
        config,
        output_dir: args.output_dir,
        replay: args.replay,
    })
}

pub fn run_cli(args: RunArgs) -> Result<(), String> {
    let request = build_request(args)?;
    let mut simulation = request
        .config
        .build_simulation()
        .map_err(|e| e.to_string())?;
    let summary = simulation.compute(None).map_err(|e| e.to_string())?;

    println!(
        "{} run(s) over {} years from {}",
        summary.runs_completed,
        simulation.settings().years,
        simulation.settings().first_year
    );
    for kpi in simulation.kpis() {
        println!("{}", describe_kpi(kpi, summary.mode));
    }
    if let Some(series) = simulation.last_series() {
        println!("{}", describe_end(series.end()));
    }

    let written = match request.replay {
        Some(index) => {
            let recorded = simulation
                .run_results()
                .iter()
                .find(|r| r.index == index)
                .cloned()
                .ok_or_else(|| format!("run {index} was not recorded"))?;
            let replay = simulation.replay(&recorded).map_err(|e| e.to_string())?;
            println!("Replayed run {index}: {}", describe_end(replay.series.end()));
            export::write_series(&request.output_dir, &replay.series)
        }
        None => export::write_all(&request.output_dir, &simulation),
    }
    .map_err(|e| format!("cannot write {}: {e}", request.output_dir.display()))?;

    for path in written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn describe_kpi(kpi: &Kpi, mode: SimulationMode) -> String {
    let value = kpi
        .value(mode)
        .map_or_else(|| "undefined".to_string(), |v| format!("{v:.0}"));
    let verdict = match kpi.objective_is_reached(mode) {
        Some(true) => "reached",
        Some(false) => "missed",
        None => "undefined",
    };
    let mut line = format!(
        "{}: {value} (objective {:.0} {verdict})",
        kpi.kind().label(),
        kpi.objective()
    );
    if mode == SimulationMode::Random {
        if let Some(p) = kpi.probability_of_reaching_objective() {
            line.push_str(&format!(", reached in {:.1}% of runs", p * 100.0));
        }
    }
    line
}

fn describe_end(end: SeriesEnd) -> String {
    match end {
        SeriesEnd::Horizon => "Horizon reached".to_string(),
        SeriesEnd::AllAdultsDeceased { year } => format!("Last adult deceased in {year}"),
        SeriesEnd::InsufficientCash { year, missing } => {
            format!("Insufficient cash in {year}: {missing:.0} missing")
        }
    }
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/simulate", post(simulate_post_handler))
        .route("/api/replay", post(replay_post_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "patrisim HTTP API listening");

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    match simulate(payload) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

async fn replay_post_handler(Json(payload): Json<ReplayPayload>) -> Response {
    match replay(payload) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

fn simulate(payload: SimulatePayload) -> Result<SimulateResponse, String> {
    let mut simulation = simulation_from(payload.scenario, payload.overrides)?;
    simulation.compute(None).map_err(|e| e.to_string())?;
    Ok(build_simulate_response(simulation))
}

fn replay(payload: ReplayPayload) -> Result<Replay, String> {
    let mut simulation = simulation_from(payload.scenario, payload.overrides)?;
    simulation.replay(&payload.run).map_err(|e| e.to_string())
}

fn simulation_from(
    scenario: Option<ScenarioConfig>,
    overrides: SettingsOverrides,
) -> Result<Simulation, String> {
    let mut config = scenario.unwrap_or_default();
    overrides.apply(&mut config)?;
    config.build_simulation().map_err(|e| e.to_string())
}

fn build_kpi_report(kpi: &Kpi, mode: SimulationMode) -> KpiReport {
    let histogram = kpi.histogram();
    let percentiles = REPORTED_PERCENTILES
        .iter()
        .filter_map(|&probability| {
            histogram
                .percentile(probability)
                .ok()
                .flatten()
                .map(|value| PercentilePoint { probability, value })
        })
        .collect();
    KpiReport {
        kind: kpi.kind(),
        label: kpi.kind().label(),
        objective: kpi.objective(),
        target_probability: kpi.target_probability(),
        value: kpi.value(mode),
        objective_reached: kpi.objective_is_reached(mode),
        probability_of_reaching_objective: kpi.probability_of_reaching_objective(),
        runs: histogram.len(),
        min: histogram.min(),
        max: histogram.max(),
        average: histogram.average(),
        median: histogram.median(),
        std_dev: histogram.std_dev(),
        percentiles,
        buckets: histogram.buckets().to_vec(),
    }
}

fn build_simulate_response(simulation: Simulation) -> SimulateResponse {
    let settings = *simulation.settings();
    let mode = settings.mode();
    SimulateResponse {
        mode,
        first_year: settings.first_year,
        years: settings.years,
        seed: settings.seed,
        runs_requested: settings.runs,
        runs_completed: match mode {
            SimulationMode::Deterministic => usize::from(simulation.last_series().is_some()),
            SimulationMode::Random => simulation.run_results().len(),
        },
        kpis: simulation
            .kpis()
            .iter()
            .map(|kpi| build_kpi_report(kpi, mode))
            .collect(),
        run_results: simulation.run_results().to_vec(),
        last_series: simulation.last_series().cloned(),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn simulate_payload_from_json(json: &str) -> Result<SimulatePayload, String> {
    serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))
}
