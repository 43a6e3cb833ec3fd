use serde::Serialize;
use statrs::statistics::{Data, OrderStatistics, Statistics};

use super::error::StatsError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub lower: f64,
    pub midpoint: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Grid {
    lower: f64,
    upper: f64,
    width: f64,
    open_ends: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Histogram {
    samples: Vec<f64>,
    buckets: Vec<Bucket>,
    grid: Option<Grid>,
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, value: f64) {
        self.samples.push(value);
        if let Some(idx) = self.bucket_index(value) {
            self.buckets[idx].count += 1;
        }
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.buckets.clear();
        self.grid = None;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn is_sorted(&self) -> bool {
        self.grid.is_some()
    }

    pub fn sort(
        &mut self,
        open_ends: bool,
        min: Option<f64>,
        max: Option<f64>,
        bucket_count: usize,
    ) -> Result<(), StatsError> {
        if bucket_count == 0 {
            return Err(StatsError::OutOfRange {
                what: "bucket count",
                value: 0.0,
                min: 1.0,
                max: f64::INFINITY,
            });
        }

        let lower = min.or_else(|| self.min());
        let upper = max.or_else(|| self.max());
        let (Some(mut lower), Some(mut upper)) = (lower, upper) else {
            self.buckets.clear();
            self.grid = None;
            return Ok(());
        };
        if lower > upper {
            return Err(StatsError::OutOfRange {
                what: "histogram lower bound",
                value: lower,
                min: f64::NEG_INFINITY,
                max: upper,
            });
        }
        if upper - lower <= f64::EPSILON * lower.abs().max(1.0) {
            lower -= 0.5;
            upper += 0.5;
        }

        let width = (upper - lower) / bucket_count as f64;
        let grid = Grid {
            lower,
            upper,
            width,
            open_ends,
        };
        self.buckets = (0..bucket_count)
            .map(|i| {
                let lo = lower + width * i as f64;
                let hi = if i + 1 == bucket_count {
                    upper
                } else {
                    lower + width * (i + 1) as f64
                };
                Bucket {
                    lower: lo,
                    midpoint: 0.5 * (lo + hi),
                    upper: hi,
                    count: 0,
                }
            })
            .collect();
        if open_ends {
            self.buckets[0].lower = f64::NEG_INFINITY;
            self.buckets[bucket_count - 1].upper = f64::INFINITY;
        }
        self.grid = Some(grid);

        for i in 0..self.samples.len() {
            if let Some(idx) = self.bucket_index(self.samples[i]) {
                self.buckets[idx].count += 1;
            }
        }
        Ok(())
    }

    fn bucket_index(&self, value: f64) -> Option<usize> {
        let grid = self.grid?;
        let last = self.buckets.len().checked_sub(1)?;
        if !grid.open_ends && (value < grid.lower || value > grid.upper) {
            return None;
        }
        if value.is_nan() {
            return None;
        }
        let raw = ((value - grid.lower) / grid.width).floor();
        if raw <= 0.0 {
            return Some(0);
        }
        Some((raw as usize).min(last))
    }

    pub fn pdf(&self) -> Result<Vec<f64>, StatsError> {
        let grid = self.grid.ok_or(StatsError::NotInitialized("histogram buckets"))?;
        let n = self.samples.len() as f64;
        if n == 0.0 {
            return Ok(vec![0.0; self.buckets.len()]);
        }
        Ok(self
            .buckets
            .iter()
            .map(|b| b.count as f64 / (n * grid.width))
            .collect())
    }

    pub fn cdf(&self) -> Result<Vec<f64>, StatsError> {
        if self.grid.is_none() {
            return Err(StatsError::NotInitialized("histogram buckets"));
        }
        let n = self.samples.len() as f64;
        if n == 0.0 {
            return Ok(vec![0.0; self.buckets.len()]);
        }
        let mut cumulated = 0usize;
        Ok(self
            .buckets
            .iter()
            .map(|b| {
                cumulated += b.count;
                cumulated as f64 / n
            })
            .collect())
    }

    // Smallest sample whose empirical CDF reaches `p`.
    pub fn percentile(&self, p: f64) -> Result<Option<f64>, StatsError> {
        if !(0.0..=1.0).contains(&p) {
            return Err(StatsError::probability(p));
        }
        if self.samples.is_empty() {
            return Ok(None);
        }
        let sorted = self.sorted_samples();
        let rank = (p * sorted.len() as f64).ceil() as usize;
        Ok(Some(sorted[rank.saturating_sub(1).min(sorted.len() - 1)]))
    }

    pub fn fraction_at_least(&self, threshold: f64) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let hits = self.samples.iter().filter(|v| **v >= threshold).count();
        Some(hits as f64 / self.samples.len() as f64)
    }

    pub fn min(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().copied().fold(f64::INFINITY, f64::min))
    }

    pub fn max(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().copied().fold(f64::NEG_INFINITY, f64::max))
    }

    pub fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().mean())
    }

    pub fn median(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let mut data = Data::new(self.samples.clone());
        Some(data.median())
    }

    pub fn std_dev(&self) -> Option<f64> {
        if self.samples.len() < 2 {
            return None;
        }
        Some(self.samples.iter().std_dev())
    }

    fn sorted_samples(&self) -> Vec<f64> {
        let mut sorted = self.samples.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        sorted
    }
}
