pub mod accounts;
pub mod config;
pub mod distribution;
pub mod economy;
pub mod error;
pub mod export;
pub mod fiscal;
pub mod histogram;
pub mod household;
pub mod kpi;
pub mod ledger;
pub mod model;
pub mod ownership;
pub mod patrimony;
pub mod random;
pub mod simulation;
pub mod succession;

#[cfg(test)]
mod fixtures;

pub use accounts::{BalanceSheet, LedgerSeries, SeriesEnd};
pub use config::ScenarioConfig;
pub use error::{LedgerError, ModelError, SimulationError, StatsError};
pub use kpi::{Kpi, KpiConfig, KpiKind};
pub use model::{Model, SampledInputs};
pub use random::SimulationMode;
pub use simulation::{ComputeSummary, Replay, RunResult, Simulation, SimulationSettings};
