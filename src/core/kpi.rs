use serde::{Deserialize, Serialize};

use super::accounts::LedgerSeries;
use super::error::StatsError;
use super::histogram::Histogram;
use super::household::Household;
use super::random::SimulationMode;

pub const KPI_BUCKETS: usize = 50;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KpiKind {
    MinimumAdultAssets,
    AdultAssetsAtFirstDeath,
    AdultAssetsAtLastDeath,
}

impl KpiKind {
    pub const ALL: [Self; 3] = [
        Self::MinimumAdultAssets,
        Self::AdultAssetsAtFirstDeath,
        Self::AdultAssetsAtLastDeath,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::MinimumAdultAssets => "Minimum adult assets",
            Self::AdultAssetsAtFirstDeath => "Adult assets at first death",
            Self::AdultAssetsAtLastDeath => "Adult assets at last death",
        }
    }

    pub fn extract(self, series: &LedgerSeries, household: &Household) -> Option<f64> {
        match self {
            Self::MinimumAdultAssets => {
                let lowest = series
                    .balance_sheets()
                    .iter()
                    .filter(|b| b.adults_alive > 0)
                    .map(|b| b.adults_net_value)
                    .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))));
                match series.shortfall_year() {
                    Some(_) => Some(lowest.map_or(0.0, |v| v.min(0.0))),
                    None => lowest,
                }
            }
            Self::AdultAssetsAtFirstDeath => at_death(series, household.first_death_year()),
            Self::AdultAssetsAtLastDeath => at_death(series, household.last_death_year()),
        }
    }
}

fn at_death(series: &LedgerSeries, death_year: Option<u32>) -> Option<f64> {
    let year = death_year?;
    if !series.is_within_horizon(year) {
        return None;
    }
    if let Some(ledger) = series.ledger(year) {
        return ledger.adult_assets_at_death();
    }
    series
        .shortfall_year()
        .filter(|shortfall| *shortfall <= year)
        .map(|_| 0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiConfig {
    pub kind: KpiKind,
    pub objective: f64,
    #[serde(default = "default_target_probability")]
    pub target_probability: f64,
}

fn default_target_probability() -> f64 {
    0.1
}

impl KpiConfig {
    pub fn build(&self) -> Result<Kpi, StatsError> {
        Kpi::new(self.kind, self.objective, self.target_probability)
    }
}

#[derive(Debug, Clone)]
pub struct Kpi {
    kind: KpiKind,
    objective: f64,
    target_probability: f64,
    deterministic: Option<f64>,
    histogram: Histogram,
}

impl Kpi {
    pub fn new(kind: KpiKind, objective: f64, target_probability: f64) -> Result<Self, StatsError> {
        if !(0.0..=1.0).contains(&target_probability) {
            return Err(StatsError::probability(target_probability));
        }
        Ok(Self {
            kind,
            objective,
            target_probability,
            deterministic: None,
            histogram: Histogram::new(),
        })
    }

    pub fn kind(&self) -> KpiKind {
        self.kind
    }

    pub fn objective(&self) -> f64 {
        self.objective
    }

    pub fn target_probability(&self) -> f64 {
        self.target_probability
    }

    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    pub fn reset(&mut self) {
        self.deterministic = None;
        self.histogram.reset();
    }

    pub fn record(&mut self, value: f64, mode: SimulationMode) {
        match mode {
            SimulationMode::Deterministic => self.deterministic = Some(value),
            SimulationMode::Random => self.histogram.record(value),
        }
    }

    pub fn finalize(&mut self) -> Result<(), StatsError> {
        self.histogram.sort(false, None, None, KPI_BUCKETS)
    }

    pub fn value(&self, mode: SimulationMode) -> Option<f64> {
        match mode {
            SimulationMode::Deterministic => self.deterministic,
            SimulationMode::Random => self
                .histogram
                .percentile(self.target_probability)
                .ok()
                .flatten(),
        }
    }

    pub fn objective_is_reached(&self, mode: SimulationMode) -> Option<bool> {
        self.value(mode).map(|v| v >= self.objective)
    }

    pub fn probability_of_reaching_objective(&self) -> Option<f64> {
        self.histogram.fraction_at_least(self.objective)
    }
}
