use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    #[error("invalid distribution: {0}")]
    InvalidDistribution(String),

    #[error("{what} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        what: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{0} queried before initialization")]
    NotInitialized(&'static str),
}

impl StatsError {
    pub(crate) fn probability(value: f64) -> Self {
        StatsError::OutOfRange {
            what: "probability",
            value,
            min: 0.0,
            max: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("insufficient cash in {year}: {missing:.0} missing after liquidating free investments")]
    InsufficientCash { year: u32, missing: f64 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("unknown person: {0}")]
    UnknownPerson(String),

    #[error("unknown free investment: {0}")]
    UnknownInvestment(String),

    #[error("invalid ownership of {asset}: {reason}")]
    InvalidOwnership { asset: String, reason: String },

    #[error("invalid scenario: {0}")]
    InvalidScenario(String),

    #[error(transparent)]
    Stats(#[from] StatsError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("at least one run is required")]
    NoRuns,

    #[error("run result {0} does not match the model: {1}")]
    ReplayMismatch(usize, String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Stats(#[from] StatsError),
}
