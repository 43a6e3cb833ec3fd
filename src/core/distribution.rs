use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Beta, Continuous};

use super::error::StatsError;

pub const DEFAULT_CDF_KNOTS: usize = 1_000;

const WEIGHT_TOLERANCE: f64 = 1e-6;
const MAX_REJECTION_ATTEMPTS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "law", rename_all = "kebab-case")]
pub enum DistributionParams {
    Beta {
        alpha: f64,
        beta: f64,
        min: f64,
        max: f64,
    },
    Discrete { values: Vec<f64>, weights: Vec<f64> },
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SamplingMethod {
    #[default]
    InverseTransform,
    Rejection,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CdfKnot {
    x: f64,
    p: f64,
}

#[derive(Debug, Clone)]
struct ContinuousLaw {
    beta: Beta,
    alpha: f64,
    beta_shape: f64,
    min: f64,
    max: f64,
    knots: Vec<CdfKnot>,
    max_density: f64,
}

impl ContinuousLaw {
    fn width(&self) -> f64 {
        self.max - self.min
    }

    fn density(&self, x: f64) -> f64 {
        if x < self.min || x > self.max {
            return 0.0;
        }
        let t = (x - self.min) / self.width();
        self.beta.pdf(t) / self.width()
    }

    fn cumulative(&self, x: f64) -> f64 {
        if x <= self.min {
            return 0.0;
        }
        if x >= self.max {
            return 1.0;
        }
        let idx = self.knots.partition_point(|k| k.x <= x);
        if idx >= self.knots.len() {
            return 1.0;
        }
        let lo = self.knots[idx - 1];
        let hi = self.knots[idx];
        lo.p + (hi.p - lo.p) * (x - lo.x) / (hi.x - lo.x)
    }

    fn inverse_cumulative(&self, p: f64) -> f64 {
        let idx = self.knots.partition_point(|k| k.p < p);
        if idx == 0 {
            return self.min;
        }
        if idx >= self.knots.len() {
            return self.max;
        }
        let lo = self.knots[idx - 1];
        let hi = self.knots[idx];
        lo.x + (p - lo.p) / (hi.p - lo.p) * (hi.x - lo.x)
    }
}

#[derive(Debug, Clone)]
struct DiscreteLaw {
    values: Vec<f64>,
    weights: Vec<f64>,
    // cumulative[i] is the total weight of values[..i]
    cumulative: Vec<f64>,
}

impl DiscreteLaw {
    fn quantile(&self, u: f64) -> f64 {
        let below = self.cumulative.partition_point(|c| *c < u);
        self.values[below.saturating_sub(1)]
    }

    fn cumulative(&self, x: f64) -> f64 {
        self.values
            .iter()
            .zip(&self.weights)
            .filter(|(v, _)| **v <= x)
            .map(|(_, w)| w)
            .sum::<f64>()
            .min(1.0)
    }
}

#[derive(Debug, Clone)]
enum Law {
    Continuous(ContinuousLaw),
    Discrete(DiscreteLaw),
}

#[derive(Debug, Clone)]
pub struct Distribution {
    params: DistributionParams,
    method: SamplingMethod,
    law: Law,
}

impl Distribution {
    pub fn build(params: DistributionParams) -> Result<Self, StatsError> {
        Self::build_with(params, SamplingMethod::default(), DEFAULT_CDF_KNOTS)
    }

    pub fn build_with(
        params: DistributionParams,
        method: SamplingMethod,
        knot_count: usize,
    ) -> Result<Self, StatsError> {
        let law = match &params {
            DistributionParams::Beta {
                alpha,
                beta,
                min,
                max,
            } => Law::Continuous(build_continuous(*alpha, *beta, *min, *max, knot_count)?),
            DistributionParams::Discrete { values, weights } => {
                Law::Discrete(build_discrete(values, weights)?)
            }
        };
        Ok(Self {
            params,
            method,
            law,
        })
    }

    pub fn params(&self) -> &DistributionParams {
        &self.params
    }

    pub fn is_continuous(&self) -> bool {
        matches!(self.law, Law::Continuous(_))
    }

    pub fn domain(&self) -> (f64, f64) {
        match &self.law {
            Law::Continuous(c) => (c.min, c.max),
            Law::Discrete(d) => (d.values[0], d.values[d.values.len() - 1]),
        }
    }

    pub fn density(&self, x: f64) -> Result<f64, StatsError> {
        match &self.law {
            Law::Continuous(c) => Ok(c.density(x)),
            Law::Discrete(_) => Err(StatsError::InvalidDistribution(
                "density is undefined for a discrete law".to_string(),
            )),
        }
    }

    pub fn max_density(&self) -> Option<f64> {
        match &self.law {
            Law::Continuous(c) => Some(c.max_density),
            Law::Discrete(_) => None,
        }
    }

    pub fn cumulative(&self, x: f64) -> f64 {
        match &self.law {
            Law::Continuous(c) => c.cumulative(x),
            Law::Discrete(d) => d.cumulative(x),
        }
    }

    pub fn inverse_cumulative(&self, p: f64) -> Result<f64, StatsError> {
        if !(0.0..=1.0).contains(&p) {
            return Err(StatsError::probability(p));
        }
        Ok(match &self.law {
            Law::Continuous(c) => c.inverse_cumulative(p),
            Law::Discrete(d) => d.quantile(p),
        })
    }

    pub fn mean(&self) -> f64 {
        match &self.law {
            Law::Continuous(c) => {
                let (a, b) = (c.alpha, c.beta_shape);
                c.min + c.width() * a / (a + b)
            }
            Law::Discrete(d) => d.values.iter().zip(&d.weights).map(|(v, w)| v * w).sum(),
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match &self.law {
            Law::Discrete(d) => d.quantile(rng.gen_range(0.0..1.0)),
            Law::Continuous(c) => match self.method {
                SamplingMethod::InverseTransform => c.inverse_cumulative(rng.gen_range(0.0..1.0)),
                SamplingMethod::Rejection => sample_by_rejection(c, rng),
            },
        }
    }
}

fn sample_by_rejection<R: Rng + ?Sized>(law: &ContinuousLaw, rng: &mut R) -> f64 {
    for _ in 0..MAX_REJECTION_ATTEMPTS {
        let x = rng.gen_range(law.min..law.max);
        let y = rng.gen_range(0.0..law.max_density);
        if y <= law.density(x) {
            return x;
        }
    }
    law.inverse_cumulative(rng.gen_range(0.0..1.0))
}

fn build_continuous(
    alpha: f64,
    beta: f64,
    min: f64,
    max: f64,
    knot_count: usize,
) -> Result<ContinuousLaw, StatsError> {
    if !min.is_finite() || !max.is_finite() || min >= max {
        return Err(StatsError::InvalidDistribution(format!(
            "beta bounds must be finite with min < max, got [{min}, {max}]"
        )));
    }
    if knot_count < 2 {
        return Err(StatsError::InvalidDistribution(
            "at least two cumulative knots are required".to_string(),
        ));
    }
    let shape = Beta::new(alpha, beta)
        .map_err(|e| StatsError::InvalidDistribution(format!("beta({alpha}, {beta}): {e}")))?;

    let mut law = ContinuousLaw {
        beta: shape,
        alpha,
        beta_shape: beta,
        min,
        max,
        knots: Vec::with_capacity(knot_count),
        max_density: 0.0,
    };

    let step = law.width() / (knot_count - 1) as f64;
    let densities: Vec<f64> = (0..knot_count)
        .map(|i| {
            let x = min + step * i as f64;
            let d = law.density(x);
            if d.is_finite() {
                return d;
            }
            // shapes below 1 diverge at the bounds
            let inner = if i == 0 { x + step * 0.5 } else { x - step * 0.5 };
            law.density(inner)
        })
        .collect();

    let mut cumulated = 0.0;
    for (i, d) in densities.iter().enumerate() {
        if i > 0 {
            cumulated += 0.5 * (densities[i - 1] + d) * step;
        }
        law.knots.push(CdfKnot {
            x: min + step * i as f64,
            p: cumulated,
        });
    }

    if !(cumulated.is_finite() && cumulated > 0.0) {
        return Err(StatsError::InvalidDistribution(format!(
            "beta({alpha}, {beta}) integrates to {cumulated}"
        )));
    }
    for knot in &mut law.knots {
        knot.p /= cumulated;
    }
    if let Some(last) = law.knots.last_mut() {
        last.p = 1.0;
    }
    law.max_density = densities.iter().copied().fold(0.0, f64::max);

    Ok(law)
}

fn build_discrete(values: &[f64], weights: &[f64]) -> Result<DiscreteLaw, StatsError> {
    if values.is_empty() {
        return Err(StatsError::InvalidDistribution(
            "discrete law needs at least one value".to_string(),
        ));
    }
    if values.len() != weights.len() {
        return Err(StatsError::InvalidDistribution(format!(
            "{} values but {} weights",
            values.len(),
            weights.len()
        )));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(StatsError::InvalidDistribution(
            "discrete values must be finite".to_string(),
        ));
    }
    if values.windows(2).any(|w| w[0] >= w[1]) {
        return Err(StatsError::InvalidDistribution(
            "discrete values must be strictly increasing".to_string(),
        ));
    }
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(StatsError::InvalidDistribution(
            "discrete weights must be finite and non-negative".to_string(),
        ));
    }
    let total: f64 = weights.iter().sum();
    if (total - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(StatsError::InvalidDistribution(format!(
            "discrete weights sum to {total}, expected 1"
        )));
    }

    let mut cumulative = Vec::with_capacity(weights.len());
    let mut acc = 0.0;
    for w in weights {
        cumulative.push(acc);
        acc += w;
    }

    Ok(DiscreteLaw {
        values: values.to_vec(),
        weights: weights.to_vec(),
        cumulative,
    })
}
