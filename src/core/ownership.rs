use serde::{Deserialize, Serialize};

use super::error::ModelError;

const FRACTION_TOLERANCE: f64 = 1e-6;
const VALUE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Share {
    pub owner: String,
    pub fraction: f64,
}

// Fractions always sum to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ownership {
    shares: Vec<Share>,
}

impl Ownership {
    pub fn new(shares: Vec<Share>) -> Self {
        Self { shares }
    }

    pub fn single(owner: impl Into<String>) -> Self {
        Self {
            shares: vec![Share {
                owner: owner.into(),
                fraction: 1.0,
            }],
        }
    }

    pub fn shares(&self) -> &[Share] {
        &self.shares
    }

    pub fn owners(&self) -> impl Iterator<Item = &str> {
        self.shares.iter().map(|s| s.owner.as_str())
    }

    pub fn validate(&self, asset: &str) -> Result<(), ModelError> {
        let invalid = |reason: String| ModelError::InvalidOwnership {
            asset: asset.to_string(),
            reason,
        };
        if self.shares.is_empty() {
            return Err(invalid("no owner".to_string()));
        }
        for share in &self.shares {
            if !(share.fraction > 0.0 && share.fraction <= 1.0 + FRACTION_TOLERANCE) {
                return Err(invalid(format!(
                    "fraction {} of {} is outside (0, 1]",
                    share.fraction, share.owner
                )));
            }
        }
        let total: f64 = self.shares.iter().map(|s| s.fraction).sum();
        if (total - 1.0).abs() > FRACTION_TOLERANCE {
            return Err(invalid(format!("fractions sum to {total}")));
        }
        Ok(())
    }

    pub fn fraction_of(&self, owner: &str) -> f64 {
        self.fraction_owned_by(|o| o == owner)
    }

    pub fn fraction_owned_by(&self, owned_by: impl Fn(&str) -> bool) -> f64 {
        self.shares
            .iter()
            .filter(|s| owned_by(&s.owner))
            .map(|s| s.fraction)
            .sum()
    }

    pub fn debit(&mut self, value_before: f64, amount: f64, owned_by: impl Fn(&str) -> bool) {
        let matching = value_before * self.fraction_owned_by(&owned_by);
        let value_after = value_before - amount;
        if matching <= VALUE_EPSILON || value_after <= VALUE_EPSILON {
            return;
        }
        let keep = ((matching - amount) / matching).max(0.0);
        for share in &mut self.shares {
            let held = value_before * share.fraction;
            let held = if owned_by(&share.owner) { held * keep } else { held };
            share.fraction = held / value_after;
        }
        self.drop_empty_shares();
    }

    pub fn credit(&mut self, value_before: f64, amount: f64, beneficiaries: &[&str]) {
        let value_after = value_before + amount;
        if value_after <= VALUE_EPSILON || beneficiaries.is_empty() {
            return;
        }
        let value_before = value_before.max(0.0);
        let held = value_before * self.fraction_owned_by(|o| beneficiaries.contains(&o));
        let mut holdings: Vec<(String, f64)> = self
            .shares
            .iter()
            .map(|s| (s.owner.clone(), value_before * s.fraction))
            .collect();
        for beneficiary in beneficiaries {
            let added = if held > VALUE_EPSILON {
                let current: f64 = holdings
                    .iter()
                    .filter(|(o, _)| o == beneficiary)
                    .map(|(_, v)| v)
                    .sum();
                amount * current / held
            } else {
                amount / beneficiaries.len() as f64
            };
            match holdings.iter_mut().find(|(o, _)| o == beneficiary) {
                Some((_, value)) => *value += added,
                None => holdings.push((beneficiary.to_string(), added)),
            }
        }
        self.shares = holdings
            .into_iter()
            .map(|(owner, value)| Share {
                owner,
                fraction: value / value_after,
            })
            .collect();
        self.drop_empty_shares();
    }

    pub fn transfer(&mut self, from: &str, heirs: &[(String, f64)]) {
        let total_weight: f64 = heirs.iter().map(|(_, w)| w).sum();
        let fraction = self.fraction_of(from);
        if fraction <= 0.0 || total_weight <= 0.0 {
            return;
        }
        self.shares.retain(|s| s.owner != from);
        for (heir, weight) in heirs {
            let added = fraction * weight / total_weight;
            match self.shares.iter_mut().find(|s| &s.owner == heir) {
                Some(share) => share.fraction += added,
                None => self.shares.push(Share {
                    owner: heir.clone(),
                    fraction: added,
                }),
            }
        }
        self.drop_empty_shares();
    }

    fn drop_empty_shares(&mut self) {
        if self.shares.len() > 1 {
            self.shares.retain(|s| s.fraction > VALUE_EPSILON);
        }
    }
}
