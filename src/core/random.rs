use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::distribution::{DEFAULT_CDF_KNOTS, Distribution, DistributionParams, SamplingMethod};
use super::error::StatsError;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationMode {
    #[default]
    Deterministic,
    Random,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RandomizedVariableConfig {
    pub default_value: f64,
    pub distribution: DistributionParams,
    #[serde(default)]
    pub sampling: SamplingMethod,
}

impl RandomizedVariableConfig {
    pub fn build(&self) -> Result<RandomizedVariable, StatsError> {
        let distribution =
            Distribution::build_with(self.distribution.clone(), self.sampling, DEFAULT_CDF_KNOTS)?;
        Ok(RandomizedVariable::new(Arc::new(distribution), self.default_value))
    }
}

#[derive(Debug, Clone)]
pub struct RandomizedVariable {
    distribution: Arc<Distribution>,
    default_value: f64,
    last_drawn: f64,
}

impl RandomizedVariable {
    pub fn new(distribution: Arc<Distribution>, default_value: f64) -> Self {
        Self {
            distribution,
            default_value,
            last_drawn: default_value,
        }
    }

    pub fn fixed(value: f64) -> Result<Self, StatsError> {
        let distribution = Distribution::build(DistributionParams::Discrete {
            values: vec![value],
            weights: vec![1.0],
        })?;
        Ok(Self::new(Arc::new(distribution), value))
    }

    pub fn distribution(&self) -> &Distribution {
        &self.distribution
    }

    pub fn default_value(&self) -> f64 {
        self.default_value
    }

    pub fn last_drawn(&self) -> f64 {
        self.last_drawn
    }

    pub fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R) -> f64 {
        self.last_drawn = self.distribution.sample(rng);
        self.last_drawn
    }

    pub fn inject(&mut self, value: f64) {
        self.last_drawn = value;
    }

    pub fn value(&self, mode: SimulationMode) -> f64 {
        match mode {
            SimulationMode::Deterministic => self.default_value,
            SimulationMode::Random => self.last_drawn,
        }
    }
}
