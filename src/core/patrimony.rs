use serde::{Deserialize, Serialize};

use super::economy::EconomyDraw;
use super::error::ModelError;
use super::household::Household;
use super::ownership::Ownership;
use super::succession::{BeneficiaryClause, Heirs, SpouseOption};

pub const MAIN_RESIDENCE_ABATEMENT: f64 = 0.30;

const AMOUNT_EPSILON: f64 = 1e-6;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvaluationMethod {
    Patrimoine,
    WealthTax,
    LegalSuccession,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Revenue {
    pub revenue: f64,
    pub taxable_irpp: f64,
    pub social_taxes: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Liquidation {
    pub net_revenue: f64,
    pub taxable_irpp_interests: f64,
    pub social_taxes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    pub investment: String,
    pub gross: f64,
    pub net: f64,
    pub interests: f64,
    pub social_taxes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deposit {
    pub investment: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FreeInvestmentKind {
    Pea,
    LifeInsurance {
        #[serde(default)]
        clause: BeneficiaryClause,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeInvestment {
    pub name: String,
    pub kind: FreeInvestmentKind,
    pub value: f64,
    #[serde(default)]
    pub interests: f64,
    pub securities_share: f64,
    pub ownership: Ownership,
}

impl FreeInvestment {
    pub fn is_life_insurance(&self) -> bool {
        matches!(self.kind, FreeInvestmentKind::LifeInsurance { .. })
    }

    pub fn yearly_rate(&self, economy: &EconomyDraw) -> f64 {
        self.securities_share * economy.securities_return
            + (1.0 - self.securities_share) * economy.bonds_return
            - economy.inflation
    }

    pub fn capitalize(&mut self, economy: &EconomyDraw) {
        let gain = self.value * self.yearly_rate(economy);
        self.value = (self.value + gain).max(0.0);
        self.interests = (self.interests + gain).clamp(0.0, self.value);
    }

    pub fn available_to(&self, owned_by: impl Fn(&str) -> bool) -> f64 {
        self.value * self.ownership.fraction_owned_by(owned_by)
    }

    fn interest_ratio(&self) -> f64 {
        if self.value > AMOUNT_EPSILON {
            (self.interests / self.value).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn withdraw_net(
        &mut self,
        net_target: f64,
        social_rate: f64,
        owned_by: impl Fn(&str) -> bool,
    ) -> Withdrawal {
        let ratio = self.interest_ratio();
        let net_per_gross = 1.0 - social_rate * ratio;
        let available = self.available_to(&owned_by);
        let gross = (net_target / net_per_gross).min(available).max(0.0);
        let interests = gross * ratio;
        let social_taxes = interests * social_rate;

        self.ownership.debit(self.value, gross, &owned_by);
        self.value -= gross;
        self.interests = (self.interests - interests).max(0.0);

        Withdrawal {
            investment: self.name.clone(),
            gross,
            net: gross - social_taxes,
            interests,
            social_taxes,
        }
    }

    pub fn deposit(&mut self, amount: f64, beneficiaries: &[&str]) {
        self.ownership.credit(self.value, amount, beneficiaries);
        self.value += amount;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodicInvestment {
    pub name: String,
    #[serde(default)]
    pub initial_value: f64,
    pub yearly_contribution: f64,
    pub first_year: u32,
    pub last_year: u32,
    pub yearly_rate: f64,
    pub ownership: Ownership,
}

impl PeriodicInvestment {
    fn is_active(&self, year: u32) -> bool {
        year >= self.first_year && year <= self.last_year
    }

    fn payments_until(&self, year: u32) -> u32 {
        if year < self.first_year {
            0
        } else {
            year.min(self.last_year) - self.first_year + 1
        }
    }

    fn accumulated(&self, year: u32) -> f64 {
        let n = self.payments_until(year) as i32;
        let growth = (1.0 + self.yearly_rate).powi(n);
        // contributions are paid at the start of each year
        let annuity = if self.yearly_rate.abs() < 1e-12 {
            n as f64
        } else {
            (growth - 1.0) / self.yearly_rate * (1.0 + self.yearly_rate)
        };
        self.initial_value * growth + self.yearly_contribution * annuity
    }

    pub fn value_at_end_of(&self, year: u32) -> f64 {
        if year >= self.last_year {
            0.0
        } else {
            self.accumulated(year)
        }
    }

    pub fn contribution(&self, year: u32) -> f64 {
        if self.is_active(year) {
            self.yearly_contribution
        } else {
            0.0
        }
    }

    pub fn liquidated_value(&self, year: u32, social_rate: f64) -> Option<Liquidation> {
        if year != self.last_year {
            return None;
        }
        let value = self.accumulated(year);
        let paid = self.initial_value + self.yearly_contribution * self.payments_until(year) as f64;
        let interests = (value - paid).max(0.0);
        let social_taxes = interests * social_rate;
        Some(Liquidation {
            net_revenue: value - social_taxes,
            taxable_irpp_interests: interests,
            social_taxes,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealEstate {
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub yearly_rent: f64,
    #[serde(default)]
    pub main_residence: bool,
    pub ownership: Ownership,
}

impl RealEstate {
    pub fn value_at_end_of(&self, _year: u32) -> f64 {
        self.value
    }

    pub fn wealth_tax_value(&self) -> f64 {
        if self.main_residence {
            self.value * (1.0 - MAIN_RESIDENCE_ABATEMENT)
        } else {
            self.value
        }
    }

    pub fn yearly_revenue(&self, _year: u32, social_rate: f64) -> Revenue {
        let social_taxes = self.yearly_rent * social_rate;
        Revenue {
            revenue: self.yearly_rent - social_taxes,
            taxable_irpp: self.yearly_rent,
            social_taxes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub name: String,
    pub yearly_repayment: f64,
    pub first_year: u32,
    pub last_year: u32,
    pub ownership: Ownership,
}

impl Loan {
    pub fn repayment(&self, year: u32) -> f64 {
        if year >= self.first_year && year <= self.last_year {
            self.yearly_repayment
        } else {
            0.0
        }
    }

    pub fn value_at_end_of(&self, year: u32) -> f64 {
        let remaining = if year < self.first_year {
            self.last_year - self.first_year + 1
        } else {
            self.last_year.saturating_sub(year)
        };
        -(self.yearly_repayment * remaining as f64)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Patrimony {
    pub free_investments: Vec<FreeInvestment>,
    pub periodic_investments: Vec<PeriodicInvestment>,
    pub real_estate: Vec<RealEstate>,
    pub loans: Vec<Loan>,
    pub surplus_vehicle: Option<String>,
}

impl Patrimony {
    pub fn validate(&self, household: &Household) -> Result<(), ModelError> {
        let is_person = |name: &str| {
            household.is_adult(name) || household.children.iter().any(|c| c.name == name)
        };
        let check = |asset: &str, ownership: &Ownership| -> Result<(), ModelError> {
            ownership.validate(asset)?;
            match ownership.owners().find(|o| !is_person(o)) {
                Some(unknown) => Err(ModelError::UnknownPerson(unknown.to_string())),
                None => Ok(()),
            }
        };

        for investment in &self.free_investments {
            check(&investment.name, &investment.ownership)?;
            if !(0.0..=1.0).contains(&investment.securities_share) {
                return Err(ModelError::InvalidScenario(format!(
                    "securities share of {} must lie in [0, 1]",
                    investment.name
                )));
            }
            if investment.value < 0.0 || investment.interests < 0.0 {
                return Err(ModelError::InvalidScenario(format!(
                    "{} has a negative value or interests",
                    investment.name
                )));
            }
        }
        for investment in &self.periodic_investments {
            check(&investment.name, &investment.ownership)?;
            if investment.last_year < investment.first_year {
                return Err(ModelError::InvalidScenario(format!(
                    "{} ends before it starts",
                    investment.name
                )));
            }
        }
        for property in &self.real_estate {
            check(&property.name, &property.ownership)?;
        }
        for loan in &self.loans {
            check(&loan.name, &loan.ownership)?;
            if loan.last_year < loan.first_year {
                return Err(ModelError::InvalidScenario(format!(
                    "{} ends before it starts",
                    loan.name
                )));
            }
        }
        if let Some(vehicle) = &self.surplus_vehicle {
            if !self.free_investments.iter().any(|i| &i.name == vehicle) {
                return Err(ModelError::UnknownInvestment(vehicle.clone()));
            }
        }
        Ok(())
    }

    pub fn owned_value(&self, owner: &str, year: u32, method: EvaluationMethod) -> f64 {
        self.owned_value_by(|o| o == owner, year, method)
    }

    pub fn owned_value_by(
        &self,
        owned_by: impl Fn(&str) -> bool,
        year: u32,
        method: EvaluationMethod,
    ) -> f64 {
        let share = |ownership: &Ownership| ownership.fraction_owned_by(&owned_by);
        let loans: f64 = self
            .loans
            .iter()
            .map(|l| l.value_at_end_of(year) * share(&l.ownership))
            .sum();
        let real_estate = |value: fn(&RealEstate) -> f64| -> f64 {
            self.real_estate
                .iter()
                .map(|p| value(p) * share(&p.ownership))
                .sum()
        };

        match method {
            EvaluationMethod::WealthTax => real_estate(RealEstate::wealth_tax_value) + loans,
            EvaluationMethod::Patrimoine | EvaluationMethod::LegalSuccession => {
                let free: f64 = self
                    .free_investments
                    .iter()
                    .filter(|i| method == EvaluationMethod::Patrimoine || !i.is_life_insurance())
                    .map(|i| i.value * share(&i.ownership))
                    .sum();
                let periodic: f64 = self
                    .periodic_investments
                    .iter()
                    .map(|i| i.value_at_end_of(year) * share(&i.ownership))
                    .sum();
                free + periodic + real_estate(|p| p.value) + loans
            }
        }
    }

    pub fn free_investments_value(&self) -> f64 {
        self.free_investments.iter().map(|i| i.value).sum()
    }

    pub fn capitalize(&mut self, economy: &EconomyDraw) {
        for investment in &mut self.free_investments {
            investment.capitalize(economy);
        }
    }

    pub fn surplus_vehicle_index(&self) -> Option<usize> {
        match &self.surplus_vehicle {
            Some(name) => self.free_investments.iter().position(|i| &i.name == name),
            None if self.free_investments.is_empty() => None,
            None => Some(0),
        }
    }

    // PEA first, then life insurance, configuration order within each kind.
    pub fn withdrawal_order(&self) -> Vec<usize> {
        let (mut order, insurances): (Vec<usize>, Vec<usize>) = (0..self.free_investments.len())
            .partition(|i| !self.free_investments[*i].is_life_insurance());
        order.extend(insurances);
        order
    }

    pub fn transfer_ownership_of(
        &mut self,
        decedent: &str,
        children: &[String],
        spouse: Option<&str>,
        option: SpouseOption,
        usufruct_rate: f64,
    ) {
        let heirs = Heirs::new(children, spouse, option, usufruct_rate);
        for investment in &mut self.free_investments {
            let recipients = match &investment.kind {
                FreeInvestmentKind::LifeInsurance { clause } => clause.beneficiaries(children, spouse),
                FreeInvestmentKind::Pea => heirs.legal().to_vec(),
            };
            investment.ownership.transfer(decedent, &recipients);
        }
        for investment in &mut self.periodic_investments {
            investment.ownership.transfer(decedent, heirs.legal());
        }
        for property in &mut self.real_estate {
            property.ownership.transfer(decedent, heirs.legal());
        }
        for loan in &mut self.loans {
            loan.ownership.transfer(decedent, heirs.legal());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ownership::Share;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    fn pea(value: f64, interests: f64) -> FreeInvestment {
        FreeInvestment {
            name: "PEA".to_string(),
            kind: FreeInvestmentKind::Pea,
            value,
            interests,
            securities_share: 1.0,
            ownership: Ownership::single("Ana"),
        }
    }

    fn couple_ownership() -> Ownership {
        Ownership::new(vec![
            Share {
                owner: "Ana".to_string(),
                fraction: 0.5,
            },
            Share {
                owner: "Bob".to_string(),
                fraction: 0.5,
            },
        ])
    }

    #[test]
    fn yearly_rate_blends_securities_and_bonds_net_of_inflation() {
        let mut investment = pea(1_000.0, 0.0);
        investment.securities_share = 0.6;
        let economy = EconomyDraw {
            inflation: 0.02,
            securities_return: 0.07,
            bonds_return: 0.03,
        };
        assert_approx(investment.yearly_rate(&economy), 0.6 * 0.07 + 0.4 * 0.03 - 0.02);
        investment.capitalize(&economy);
        assert_approx(investment.value, 1_034.0);
        assert_approx(investment.interests, 34.0);
    }

    #[test]
    fn withdrawal_grosses_up_social_levies_on_interests() {
        let mut investment = pea(1_000.0, 500.0);
        let withdrawal = investment.withdraw_net(100.0, 0.2, |_| true);
        // half of each euro withdrawn is interest taxed at 20%
        assert_approx(withdrawal.gross, 100.0 / 0.9);
        assert_approx(withdrawal.net, 100.0);
        assert_approx(withdrawal.interests, withdrawal.gross / 2.0);
        assert_approx(investment.value, 1_000.0 - 100.0 / 0.9);
    }

    #[test]
    fn withdrawal_is_limited_to_matching_owners() {
        let mut investment = pea(1_000.0, 0.0);
        investment.ownership = couple_ownership();
        let withdrawal = investment.withdraw_net(800.0, 0.172, |o| o == "Ana");
        assert_approx(withdrawal.gross, 500.0);
        assert_approx(investment.value, 500.0);
        assert_approx(investment.ownership.fraction_of("Bob"), 1.0);
    }

    #[test]
    fn periodic_investment_is_liquidated_in_its_last_year() {
        let plan = PeriodicInvestment {
            name: "PER".to_string(),
            initial_value: 0.0,
            yearly_contribution: 1_000.0,
            first_year: 2025,
            last_year: 2027,
            yearly_rate: 0.0,
            ownership: Ownership::single("Ana"),
        };
        assert_approx(plan.value_at_end_of(2024), 0.0);
        assert_approx(plan.value_at_end_of(2026), 2_000.0);
        assert_approx(plan.value_at_end_of(2027), 0.0);
        assert_eq!(plan.contribution(2027), 1_000.0);
        assert!(plan.liquidated_value(2026, 0.172).is_none());
        let liquidation = plan.liquidated_value(2027, 0.172).expect("last year");
        assert_approx(liquidation.net_revenue, 3_000.0);
        assert_approx(liquidation.taxable_irpp_interests, 0.0);
    }

    #[test]
    fn periodic_investment_interests_are_taxed_on_liquidation() {
        let plan = PeriodicInvestment {
            name: "PER".to_string(),
            initial_value: 0.0,
            yearly_contribution: 1_000.0,
            first_year: 2025,
            last_year: 2026,
            yearly_rate: 0.1,
            ownership: Ownership::single("Ana"),
        };
        assert_approx(plan.value_at_end_of(2025), 1_000.0 * 1.1);
        let liquidation = plan.liquidated_value(2026, 0.2).expect("last year");
        // 1000 * 1.1^2 + 1000 * 1.1 = 2310
        assert_approx(liquidation.taxable_irpp_interests, 310.0);
        assert_approx(liquidation.net_revenue, 2_310.0 - 62.0);
    }

    #[test]
    fn loan_value_is_remaining_repayments() {
        let loan = Loan {
            name: "Mortgage".to_string(),
            yearly_repayment: 12_000.0,
            first_year: 2020,
            last_year: 2029,
            ownership: couple_ownership(),
        };
        assert_approx(loan.value_at_end_of(2019), -120_000.0);
        assert_approx(loan.value_at_end_of(2025), -48_000.0);
        assert_approx(loan.value_at_end_of(2029), 0.0);
        assert_eq!(loan.repayment(2030), 0.0);
    }

    #[test]
    fn owned_value_depends_on_evaluation_method() {
        let patrimony = Patrimony {
            free_investments: vec![
                pea(100_000.0, 0.0),
                FreeInvestment {
                    name: "Life insurance".to_string(),
                    kind: FreeInvestmentKind::LifeInsurance {
                        clause: BeneficiaryClause::SpouseThenChildren,
                    },
                    value: 50_000.0,
                    interests: 0.0,
                    securities_share: 0.3,
                    ownership: Ownership::single("Ana"),
                },
            ],
            real_estate: vec![RealEstate {
                name: "Home".to_string(),
                value: 400_000.0,
                yearly_rent: 0.0,
                main_residence: true,
                ownership: couple_ownership(),
            }],
            ..Patrimony::default()
        };
        assert_approx(
            patrimony.owned_value("Ana", 2025, EvaluationMethod::Patrimoine),
            350_000.0,
        );
        assert_approx(
            patrimony.owned_value("Ana", 2025, EvaluationMethod::LegalSuccession),
            300_000.0,
        );
        assert_approx(
            patrimony.owned_value("Ana", 2025, EvaluationMethod::WealthTax),
            140_000.0,
        );
    }

    #[test]
    fn withdrawal_order_puts_pea_before_life_insurance() {
        let insurance = |name: &str| FreeInvestment {
            name: name.to_string(),
            kind: FreeInvestmentKind::LifeInsurance {
                clause: BeneficiaryClause::Children,
            },
            value: 1.0,
            interests: 0.0,
            securities_share: 0.0,
            ownership: Ownership::single("Ana"),
        };
        let patrimony = Patrimony {
            free_investments: vec![insurance("AV1"), pea(1.0, 0.0), insurance("AV2")],
            ..Patrimony::default()
        };
        assert_eq!(patrimony.withdrawal_order(), vec![1, 0, 2]);
    }
}
