use std::sync::atomic::{AtomicBool, Ordering};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::accounts::LedgerSeries;
use super::error::{ModelError, SimulationError};
use super::kpi::Kpi;
use super::model::{Model, SampledInputs};
use super::random::SimulationMode;

const PROGRESS_EVERY: usize = 100;
pub const MAX_HORIZON_YEARS: u32 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationSettings {
    pub first_year: u32,
    pub years: u32,
    pub runs: usize,
    pub seed: u64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            first_year: 2025,
            years: 40,
            runs: 1,
            seed: 42,
        }
    }
}

impl SimulationSettings {
    pub fn mode(&self) -> SimulationMode {
        if self.runs > 1 {
            SimulationMode::Random
        } else {
            SimulationMode::Deterministic
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub index: usize,
    pub inputs: SampledInputs,
    pub kpi_values: Vec<Option<f64>>,
    #[serde(default)]
    pub shortfall_year: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeSummary {
    pub mode: SimulationMode,
    pub runs_requested: usize,
    pub runs_completed: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Replay {
    pub index: usize,
    pub series: LedgerSeries,
    pub kpi_values: Vec<Option<f64>>,
}

#[derive(Debug)]
pub struct Simulation {
    model: Model,
    kpis: Vec<Kpi>,
    settings: SimulationSettings,
    run_results: Vec<RunResult>,
    last_series: Option<LedgerSeries>,
}

impl Simulation {
    pub fn new(
        model: Model,
        kpis: Vec<Kpi>,
        settings: SimulationSettings,
    ) -> Result<Self, SimulationError> {
        if settings.runs == 0 {
            return Err(SimulationError::NoRuns);
        }
        if settings.years == 0 {
            let reason = "horizon must cover at least one year".to_string();
            return Err(ModelError::InvalidScenario(reason).into());
        }
        if settings.years > MAX_HORIZON_YEARS
            || settings.first_year.checked_add(settings.years).is_none()
        {
            let reason = format!("horizon must not exceed {MAX_HORIZON_YEARS} years");
            return Err(ModelError::InvalidScenario(reason).into());
        }
        model.validate()?;
        Ok(Self {
            model,
            kpis,
            settings,
            run_results: Vec::new(),
            last_series: None,
        })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    pub fn kpis(&self) -> &[Kpi] {
        &self.kpis
    }

    pub fn run_results(&self) -> &[RunResult] {
        &self.run_results
    }

    pub fn last_series(&self) -> Option<&LedgerSeries> {
        self.last_series.as_ref()
    }

    pub fn compute(&mut self, cancel: Option<&AtomicBool>) -> Result<ComputeSummary, SimulationError> {
        let SimulationSettings { runs, seed, .. } = self.settings;
        let mode = self.settings.mode();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        self.run_results.clear();
        self.last_series = None;
        self.kpis.iter_mut().for_each(Kpi::reset);
        info!(runs, seed, ?mode, "simulation started");

        let mut completed = 0;
        let mut cancelled = false;
        for index in 1..=runs {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                warn!(completed, runs, "simulation cancelled");
                cancelled = true;
                break;
            }
            if mode == SimulationMode::Random {
                self.model.advance(&mut rng);
            }

            let inputs = self.model.draw(mode);
            let (series, kpi_values) = self.run_once(&inputs);
            for (kpi, value) in self.kpis.iter_mut().zip(&kpi_values) {
                if let Some(value) = value {
                    kpi.record(*value, mode);
                }
            }
            if mode == SimulationMode::Random {
                self.run_results.push(RunResult {
                    index,
                    inputs,
                    kpi_values,
                    shortfall_year: series.shortfall_year(),
                });
            }
            self.last_series = Some(series);
            completed += 1;
            if index % PROGRESS_EVERY == 0 {
                debug!(index, runs, "runs completed");
            }
        }

        if mode == SimulationMode::Random {
            for kpi in &mut self.kpis {
                kpi.finalize()?;
            }
        }
        info!(completed, cancelled, "simulation finished");
        Ok(ComputeSummary {
            mode,
            runs_requested: runs,
            runs_completed: completed,
            cancelled,
        })
    }

    pub fn replay(&mut self, result: &RunResult) -> Result<Replay, SimulationError> {
        if result.kpi_values.len() != self.kpis.len() {
            return Err(SimulationError::ReplayMismatch(
                result.index,
                format!(
                    "{} KPI values for {} KPIs",
                    result.kpi_values.len(),
                    self.kpis.len()
                ),
            ));
        }
        self.model
            .inject(&result.inputs)
            .map_err(|e| SimulationError::ReplayMismatch(result.index, e.to_string()))?;
        let inputs = self.model.draw(SimulationMode::Random);
        let (series, kpi_values) = self.run_once(&inputs);
        debug!(index = result.index, "run replayed");
        Ok(Replay {
            index: result.index,
            series,
            kpi_values,
        })
    }

    fn run_once(&self, inputs: &SampledInputs) -> (LedgerSeries, Vec<Option<f64>>) {
        let mut scenario = self.model.instantiate(inputs);
        let series = LedgerSeries::build(
            self.settings.first_year,
            self.settings.years,
            &mut scenario,
        );
        let kpi_values = self
            .kpis
            .iter()
            .map(|kpi| kpi.kind().extract(&series, &scenario.household))
            .collect();
        (series, kpi_values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ScenarioConfig;
    use crate::core::fixtures;
    use crate::core::kpi::KpiKind;

    fn monte_carlo(runs: usize, seed: u64) -> Simulation {
        let mut config = ScenarioConfig::default();
        config.simulation.runs = runs;
        config.simulation.seed = seed;
        config.build_simulation().expect("valid scenario")
    }

    #[test]
    fn zero_runs_is_rejected() {
        let mut config = ScenarioConfig::default();
        config.simulation.runs = 0;
        assert!(matches!(
            config.build_simulation(),
            Err(SimulationError::NoRuns)
        ));
    }

    #[test]
    fn oversized_horizon_is_rejected() {
        for years in [MAX_HORIZON_YEARS + 1, u32::MAX] {
            let mut config = ScenarioConfig::default();
            config.simulation.years = years;
            assert!(matches!(
                config.build_simulation(),
                Err(SimulationError::Model(ModelError::InvalidScenario(_)))
            ));
        }
        let mut config = ScenarioConfig::default();
        config.simulation.years = MAX_HORIZON_YEARS;
        assert!(config.build_simulation().is_ok());
    }

    #[test]
    fn single_run_is_deterministic_and_keeps_no_run_results() {
        let mut simulation = monte_carlo(1, 1);
        let summary = simulation.compute(None).expect("computed");

        assert_eq!(summary.mode, SimulationMode::Deterministic);
        assert_eq!(summary.runs_completed, 1);
        assert!(simulation.run_results().is_empty());
        assert!(simulation.last_series().is_some());
        let minimum = &simulation.kpis()[0];
        assert_eq!(minimum.kind(), KpiKind::MinimumAdultAssets);
        assert!(minimum.value(SimulationMode::Deterministic).is_some());
        assert!(minimum.histogram().is_empty());
    }

    #[test]
    fn monte_carlo_batch_records_every_run() {
        let mut simulation = monte_carlo(40, 3);
        let summary = simulation.compute(None).expect("computed");

        assert_eq!(summary.mode, SimulationMode::Random);
        assert_eq!(summary.runs_completed, 40);
        assert_eq!(simulation.run_results().len(), 40);
        for (i, result) in simulation.run_results().iter().enumerate() {
            assert_eq!(result.index, i + 1);
            assert_eq!(result.kpi_values.len(), 3);
        }
        for (k, kpi) in simulation.kpis().iter().enumerate() {
            let defined = simulation
                .run_results()
                .iter()
                .filter(|r| r.kpi_values[k].is_some())
                .count();
            assert_eq!(kpi.histogram().len(), defined);
            if defined > 0 {
                assert!(kpi.histogram().is_sorted());
            }
        }
    }

    #[test]
    fn runs_draw_different_inputs() {
        let mut simulation = monte_carlo(10, 5);
        simulation.compute(None).expect("computed");
        let results = simulation.run_results();
        assert_ne!(results[0].inputs, results[1].inputs);
    }

    #[test]
    fn same_seed_gives_same_batch() {
        let mut first = monte_carlo(15, 11);
        let mut second = monte_carlo(15, 11);
        first.compute(None).expect("computed");
        second.compute(None).expect("computed");
        assert_eq!(first.run_results(), second.run_results());
    }

    #[test]
    fn replay_reproduces_recorded_kpis() {
        let mut simulation = monte_carlo(20, 99);
        simulation.compute(None).expect("computed");
        let recorded: Vec<RunResult> = simulation.run_results().to_vec();

        for result in [&recorded[0], &recorded[6], &recorded[19]] {
            let replay = simulation.replay(result).expect("replayable");
            assert_eq!(replay.index, result.index);
            assert_eq!(replay.kpi_values, result.kpi_values);
            assert_eq!(replay.series.shortfall_year(), result.shortfall_year);
        }
    }

    #[test]
    fn replay_rejects_unknown_person() {
        let mut simulation = monte_carlo(3, 2);
        simulation.compute(None).expect("computed");
        let mut result = simulation.run_results()[0].clone();
        let draw = result.inputs.persons.remove("Alice").expect("Alice");
        result.inputs.persons.insert("Zoe".to_string(), draw);

        assert!(matches!(
            simulation.replay(&result),
            Err(SimulationError::ReplayMismatch(1, _))
        ));
    }

    #[test]
    fn cancelled_batch_stops_between_runs() {
        let mut simulation = monte_carlo(50, 8);
        let cancel = AtomicBool::new(true);

        let summary = simulation.compute(Some(&cancel)).expect("computed");

        assert!(summary.cancelled);
        assert_eq!(summary.runs_completed, 0);
        assert!(simulation.run_results().is_empty());
    }

    #[test]
    fn failing_runs_are_truncated_not_fatal() {
        let model = fixtures::retired_single(6_500.0, 1_000.0);
        let kpis = vec![Kpi::new(KpiKind::MinimumAdultAssets, 1.0, 0.5).expect("kpi")];
        let settings = SimulationSettings {
            first_year: 2025,
            years: 20,
            runs: 1,
            seed: 0,
        };
        let mut simulation = Simulation::new(model, kpis, settings).expect("valid");

        simulation.compute(None).expect("computed");

        let series = simulation.last_series().expect("series");
        assert_eq!(series.ledgers().len(), 6);
        assert_eq!(
            simulation.kpis()[0].objective_is_reached(SimulationMode::Deterministic),
            Some(false)
        );
    }
}
