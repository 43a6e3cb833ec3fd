use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxOutcome {
    pub amount: f64,
    pub marginal_rate: f64,
}

pub trait FiscalModel: fmt::Debug + Send + Sync {
    fn income_tax(&self, taxable_income: f64, nb_adults: usize, nb_children: usize) -> TaxOutcome;
    fn wealth_tax(&self, taxable_asset_value: f64) -> TaxOutcome;
    fn pension_net(&self, gross_pension: f64) -> f64;
    fn pension_taxable(&self, net_pension: f64) -> f64;
    fn work_income_taxable(&self, net_income: f64) -> f64;
    fn financial_social_tax_rate(&self) -> f64;
    fn legal_succession_tax(&self, share: f64) -> f64;
    fn life_insurance_succession_tax(&self, capital: f64) -> f64;
    fn life_insurance_rebate(&self, nb_adults: usize) -> f64;
    fn usufruct_rate(&self, usufructuary_age: u32) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaxSlice {
    pub floor: f64,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxScale {
    slices: Vec<TaxSlice>,
}

impl TaxScale {
    pub fn new(slices: Vec<TaxSlice>) -> Result<Self, ModelError> {
        let scale = Self { slices };
        scale.validate()?;
        Ok(scale)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let Some(first) = self.slices.first() else {
            return Err(ModelError::InvalidScenario("empty tax scale".to_string()));
        };
        if first.floor != 0.0 {
            return Err(ModelError::InvalidScenario(
                "tax scale must start at 0".to_string(),
            ));
        }
        if self.slices.windows(2).any(|w| w[0].floor >= w[1].floor) {
            return Err(ModelError::InvalidScenario(
                "tax scale floors must be strictly increasing".to_string(),
            ));
        }
        if self.slices.iter().any(|s| !(0.0..=1.0).contains(&s.rate)) {
            return Err(ModelError::InvalidScenario(
                "tax scale rates must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tax(&self, amount: f64) -> TaxOutcome {
        let mut outcome = TaxOutcome::default();
        if amount <= 0.0 {
            return outcome;
        }
        for (i, slice) in self.slices.iter().enumerate() {
            if amount <= slice.floor {
                break;
            }
            let ceiling = self
                .slices
                .get(i + 1)
                .map(|next| next.floor)
                .unwrap_or(f64::INFINITY);
            outcome.amount += (amount.min(ceiling) - slice.floor) * slice.rate;
            outcome.marginal_rate = slice.rate;
        }
        outcome
    }
}

fn scale(slices: &[(f64, f64)]) -> TaxScale {
    TaxScale {
        slices: slices
            .iter()
            .map(|&(floor, rate)| TaxSlice { floor, rate })
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FrenchFiscalModel {
    pub income_tax_scale: TaxScale,
    pub wealth_tax_scale: TaxScale,
    pub wealth_tax_threshold: f64,
    pub pension_social_charges_rate: f64,
    pub pension_abatement_rate: f64,
    pub professional_abatement_rate: f64,
    pub financial_social_tax_rate: f64,
    pub legal_succession_abatement: f64,
    pub legal_succession_scale: TaxScale,
    pub life_insurance_abatement: f64,
    pub life_insurance_scale: TaxScale,
    pub life_insurance_rebate_single: f64,
    pub life_insurance_rebate_couple: f64,
}

impl Default for FrenchFiscalModel {
    fn default() -> Self {
        Self {
            income_tax_scale: scale(&[
                (0.0, 0.0),
                (11_294.0, 0.11),
                (28_797.0, 0.30),
                (82_341.0, 0.41),
                (177_106.0, 0.45),
            ]),
            wealth_tax_scale: scale(&[
                (0.0, 0.0),
                (800_000.0, 0.005),
                (1_300_000.0, 0.007),
                (2_570_000.0, 0.01),
                (5_000_000.0, 0.0125),
                (10_000_000.0, 0.015),
            ]),
            wealth_tax_threshold: 1_300_000.0,
            pension_social_charges_rate: 0.091,
            pension_abatement_rate: 0.10,
            professional_abatement_rate: 0.10,
            financial_social_tax_rate: 0.172,
            legal_succession_abatement: 100_000.0,
            legal_succession_scale: scale(&[
                (0.0, 0.05),
                (8_072.0, 0.10),
                (12_109.0, 0.15),
                (15_932.0, 0.20),
                (552_324.0, 0.30),
                (902_838.0, 0.40),
                (1_805_677.0, 0.45),
            ]),
            life_insurance_abatement: 152_500.0,
            life_insurance_scale: scale(&[(0.0, 0.20), (700_000.0, 0.3125)]),
            life_insurance_rebate_single: 4_600.0,
            life_insurance_rebate_couple: 9_200.0,
        }
    }
}

impl FrenchFiscalModel {
    pub fn validate(&self) -> Result<(), ModelError> {
        self.income_tax_scale.validate()?;
        self.wealth_tax_scale.validate()?;
        self.legal_succession_scale.validate()?;
        self.life_insurance_scale.validate()?;
        for (name, rate) in [
            ("pensionSocialChargesRate", self.pension_social_charges_rate),
            ("pensionAbatementRate", self.pension_abatement_rate),
            ("professionalAbatementRate", self.professional_abatement_rate),
            ("financialSocialTaxRate", self.financial_social_tax_rate),
        ] {
            if !(0.0..1.0).contains(&rate) {
                return Err(ModelError::InvalidScenario(format!(
                    "{name} must be in [0, 1)"
                )));
            }
        }
        Ok(())
    }

    fn family_parts(nb_adults: usize, nb_children: usize) -> f64 {
        let adults = nb_adults.max(1) as f64;
        let first_two = nb_children.min(2) as f64 * 0.5;
        let others = nb_children.saturating_sub(2) as f64;
        adults + first_two + others
    }
}

impl FiscalModel for FrenchFiscalModel {
    fn income_tax(&self, taxable_income: f64, nb_adults: usize, nb_children: usize) -> TaxOutcome {
        let parts = Self::family_parts(nb_adults, nb_children);
        let per_part = self.income_tax_scale.tax(taxable_income / parts);
        TaxOutcome {
            amount: per_part.amount * parts,
            marginal_rate: per_part.marginal_rate,
        }
    }

    fn wealth_tax(&self, taxable_asset_value: f64) -> TaxOutcome {
        if taxable_asset_value < self.wealth_tax_threshold {
            return TaxOutcome::default();
        }
        self.wealth_tax_scale.tax(taxable_asset_value)
    }

    fn pension_net(&self, gross_pension: f64) -> f64 {
        gross_pension * (1.0 - self.pension_social_charges_rate)
    }

    fn pension_taxable(&self, net_pension: f64) -> f64 {
        net_pension * (1.0 - self.pension_abatement_rate)
    }

    fn work_income_taxable(&self, net_income: f64) -> f64 {
        net_income * (1.0 - self.professional_abatement_rate)
    }

    fn financial_social_tax_rate(&self) -> f64 {
        self.financial_social_tax_rate
    }

    fn legal_succession_tax(&self, share: f64) -> f64 {
        let taxable = (share - self.legal_succession_abatement).max(0.0);
        self.legal_succession_scale.tax(taxable).amount
    }

    fn life_insurance_succession_tax(&self, capital: f64) -> f64 {
        let taxable = (capital - self.life_insurance_abatement).max(0.0);
        self.life_insurance_scale.tax(taxable).amount
    }

    fn life_insurance_rebate(&self, nb_adults: usize) -> f64 {
        match nb_adults {
            0 => 0.0,
            1 => self.life_insurance_rebate_single,
            _ => self.life_insurance_rebate_couple,
        }
    }

    fn usufruct_rate(&self, usufructuary_age: u32) -> f64 {
        match usufructuary_age {
            0..=20 => 0.9,
            21..=30 => 0.8,
            31..=40 => 0.7,
            41..=50 => 0.6,
            51..=60 => 0.5,
            61..=70 => 0.4,
            71..=80 => 0.3,
            81..=90 => 0.2,
            _ => 0.1,
        }
    }
}
