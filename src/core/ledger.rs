use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use super::error::LedgerError;
use super::model::RunScenario;
use super::patrimony::{Deposit, EvaluationMethod, Withdrawal};
use super::succession::{Succession, SuccessionKind, settle_estate};

const CASH_EPSILON: f64 = 1e-6;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RevenueCategory {
    WorkIncome,
    Pensions,
    RealEstateRents,
    PeriodicInvestmentLiquidation,
}

impl RevenueCategory {
    pub const ALL: [Self; 4] = [
        Self::WorkIncome,
        Self::Pensions,
        Self::RealEstateRents,
        Self::PeriodicInvestmentLiquidation,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::WorkIncome => "Work income",
            Self::Pensions => "Pensions",
            Self::RealEstateRents => "Real estate rents",
            Self::PeriodicInvestmentLiquidation => "Periodic investment liquidation",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TaxCategory {
    IncomeTax,
    WealthTax,
    SocialLevies,
    LegalSuccession,
    LifeInsuranceSuccession,
}

impl TaxCategory {
    pub const ALL: [Self; 5] = [
        Self::IncomeTax,
        Self::WealthTax,
        Self::SocialLevies,
        Self::LegalSuccession,
        Self::LifeInsuranceSuccession,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::IncomeTax => "Income tax",
            Self::WealthTax => "Wealth tax",
            Self::SocialLevies => "Social levies",
            Self::LegalSuccession => "Legal succession tax",
            Self::LifeInsuranceSuccession => "Life insurance succession tax",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ExpenseCategory {
    LifeExpenses,
    Dependency,
    LoanRepayments,
    PeriodicContributions,
}

impl ExpenseCategory {
    pub const ALL: [Self; 4] = [
        Self::LifeExpenses,
        Self::Dependency,
        Self::LoanRepayments,
        Self::PeriodicContributions,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::LifeExpenses => "Life expenses",
            Self::Dependency => "Dependency",
            Self::LoanRepayments => "Loan repayments",
            Self::PeriodicContributions => "Periodic contributions",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CategoryTotals<K: Ord>(BTreeMap<K, f64>);

impl<K: Ord> Default for CategoryTotals<K> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<K: Ord + Copy> CategoryTotals<K> {
    pub fn add(&mut self, category: K, amount: f64) {
        if amount != 0.0 {
            *self.0.entry(category).or_default() += amount;
        }
    }

    pub fn get(&self, category: K) -> f64 {
        self.0.get(&category).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, f64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SeriesState {
    // Taxable interests from last year's withdrawals, taxed this year.
    pub carried_taxable_income: f64,
    // Life-insurance rebate left for the whole run.
    pub rebate: f64,
}

impl SeriesState {
    pub fn new(rebate: f64) -> Self {
        Self {
            carried_taxable_income: 0.0,
            rebate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearLedger {
    year: u32,
    revenues: CategoryTotals<RevenueCategory>,
    taxable_revenues: f64,
    carried_taxable_income: f64,
    taxes: CategoryTotals<TaxCategory>,
    marginal_tax_rate: f64,
    expenses: CategoryTotals<ExpenseCategory>,
    successions: Vec<Succession>,
    adult_assets_at_death: Option<f64>,
    withdrawals: Vec<Withdrawal>,
    deposit: Option<Deposit>,
    delayed_taxable_income: f64,
}

impl YearLedger {
    pub fn build(
        year: u32,
        scenario: &mut RunScenario<'_>,
        state: &mut SeriesState,
    ) -> Result<Self, LedgerError> {
        let mut builder = YearLedgerBuilder::start(year, state.carried_taxable_income);
        builder.accumulate_income(scenario);
        builder.compute_taxes(scenario);
        builder.accumulate_expenses(scenario);
        builder.check_successions(scenario);
        builder.balance_cash(scenario, state)?;
        let ledger = builder.finish();
        state.carried_taxable_income = ledger.delayed_taxable_income;
        Ok(ledger)
    }

    pub fn year(&self) -> u32 {
        self.year
    }

    pub fn revenues(&self) -> &CategoryTotals<RevenueCategory> {
        &self.revenues
    }

    pub fn taxable_revenues(&self) -> f64 {
        self.taxable_revenues
    }

    pub fn carried_taxable_income(&self) -> f64 {
        self.carried_taxable_income
    }

    pub fn taxes(&self) -> &CategoryTotals<TaxCategory> {
        &self.taxes
    }

    pub fn marginal_tax_rate(&self) -> f64 {
        self.marginal_tax_rate
    }

    pub fn expenses(&self) -> &CategoryTotals<ExpenseCategory> {
        &self.expenses
    }

    pub fn net_cash_flow(&self) -> f64 {
        self.revenues.total() - self.taxes.total() - self.expenses.total()
    }

    pub fn successions(&self) -> &[Succession] {
        &self.successions
    }

    pub fn adult_assets_at_death(&self) -> Option<f64> {
        self.adult_assets_at_death
    }

    pub fn withdrawals(&self) -> &[Withdrawal] {
        &self.withdrawals
    }

    pub fn withdrawn(&self) -> f64 {
        self.withdrawals.iter().map(|w| w.gross).sum()
    }

    pub fn deposit(&self) -> Option<&Deposit> {
        self.deposit.as_ref()
    }

    pub fn delayed_taxable_income(&self) -> f64 {
        self.delayed_taxable_income
    }
}

struct YearLedgerBuilder {
    ledger: YearLedger,
    social_levies: f64,
}

impl YearLedgerBuilder {
    fn start(year: u32, carried_taxable_income: f64) -> Self {
        Self {
            ledger: YearLedger {
                year,
                revenues: CategoryTotals::default(),
                taxable_revenues: carried_taxable_income,
                carried_taxable_income,
                taxes: CategoryTotals::default(),
                marginal_tax_rate: 0.0,
                expenses: CategoryTotals::default(),
                successions: Vec::new(),
                adult_assets_at_death: None,
                withdrawals: Vec::new(),
                deposit: None,
                delayed_taxable_income: 0.0,
            },
            social_levies: 0.0,
        }
    }

    fn accumulate_income(&mut self, scenario: &RunScenario<'_>) {
        let year = self.ledger.year;
        let fiscal = scenario.fiscal;
        let household = &scenario.household;
        let social_rate = fiscal.financial_social_tax_rate();

        for adult in household.adults.iter().filter(|a| a.is_alive_during(year)) {
            if let Some(net) = adult.work_income(year) {
                self.ledger.revenues.add(RevenueCategory::WorkIncome, net);
                self.ledger.taxable_revenues += fiscal.work_income_taxable(net);
            }
            let devaluation = scenario.socio_economy.pension_devaluation_rate;
            if let Some(gross) = adult.pension_gross(year, devaluation) {
                let net = fiscal.pension_net(gross);
                self.ledger.revenues.add(RevenueCategory::Pensions, net);
                self.ledger.taxable_revenues += fiscal.pension_taxable(net);
            }
        }

        let held_by_adults = |owner: &str| {
            household
                .adult(owner)
                .is_some_and(|a| a.is_alive_during(year))
        };
        for property in &scenario.patrimony.real_estate {
            let share = property.ownership.fraction_owned_by(held_by_adults);
            let revenue = property.yearly_revenue(year, social_rate);
            self.ledger.revenues.add(
                RevenueCategory::RealEstateRents,
                (revenue.revenue + revenue.social_taxes) * share,
            );
            self.ledger.taxable_revenues += revenue.taxable_irpp * share;
            self.social_levies += revenue.social_taxes * share;
        }
        for investment in &scenario.patrimony.periodic_investments {
            if let Some(liquidation) = investment.liquidated_value(year, social_rate) {
                let share = investment.ownership.fraction_owned_by(held_by_adults);
                self.ledger.revenues.add(
                    RevenueCategory::PeriodicInvestmentLiquidation,
                    (liquidation.net_revenue + liquidation.social_taxes) * share,
                );
                self.ledger.taxable_revenues += liquidation.taxable_irpp_interests * share;
                self.social_levies += liquidation.social_taxes * share;
            }
        }
    }

    fn compute_taxes(&mut self, scenario: &RunScenario<'_>) {
        let year = self.ledger.year;
        let household = &scenario.household;
        let nb_adults = household.adults_alive_during(year).len().max(1);
        let nb_children = household.fiscal_children_count(year);

        let income_tax =
            scenario
                .fiscal
                .income_tax(self.ledger.taxable_revenues, nb_adults, nb_children);
        self.ledger.taxes.add(TaxCategory::IncomeTax, income_tax.amount);
        self.ledger.marginal_tax_rate = income_tax.marginal_rate;

        let wealth_base = scenario
            .patrimony
            .owned_value_by(
                |owner| {
                    household
                        .adult(owner)
                        .is_some_and(|a| a.is_alive_during(year))
                },
                year,
                EvaluationMethod::WealthTax,
            )
            .max(0.0);
        let wealth_tax = scenario.fiscal.wealth_tax(wealth_base);
        self.ledger.taxes.add(TaxCategory::WealthTax, wealth_tax.amount);
        self.ledger
            .taxes
            .add(TaxCategory::SocialLevies, self.social_levies);
    }

    fn accumulate_expenses(&mut self, scenario: &RunScenario<'_>) {
        let year = self.ledger.year;
        let household = &scenario.household;

        let life: f64 = household.expenses.iter().map(|e| e.amount(year)).sum();
        let underevaluation = scenario.socio_economy.expenses_underevaluation_rate;
        self.ledger
            .expenses
            .add(ExpenseCategory::LifeExpenses, life * (1.0 + underevaluation));

        let dependents = household
            .adults
            .iter()
            .filter(|a| a.is_dependent_during(year))
            .count();
        self.ledger.expenses.add(
            ExpenseCategory::Dependency,
            dependents as f64 * household.dependency_yearly_cost,
        );

        let patrimony = &scenario.patrimony;
        let repayments: f64 = patrimony.loans.iter().map(|l| l.repayment(year)).sum();
        self.ledger
            .expenses
            .add(ExpenseCategory::LoanRepayments, repayments);
        let contributions: f64 = patrimony
            .periodic_investments
            .iter()
            .map(|i| i.contribution(year))
            .sum();
        self.ledger
            .expenses
            .add(ExpenseCategory::PeriodicContributions, contributions);
    }

    fn check_successions(&mut self, scenario: &mut RunScenario<'_>) {
        let year = self.ledger.year;
        let household = &scenario.household;
        let patrimony = &mut scenario.patrimony;

        let deceased = household.deceased_during(year);
        if deceased.is_empty() {
            return;
        }
        let adult_assets = patrimony.owned_value_by(
            |owner| {
                household
                    .adult(owner)
                    .is_some_and(|a| a.is_alive_during(year))
            },
            year,
            EvaluationMethod::Patrimoine,
        );
        self.ledger.adult_assets_at_death = Some(adult_assets);

        for adult in deceased {
            let succession = settle_estate(
                year,
                adult,
                household,
                patrimony,
                scenario.fiscal,
                scenario.spouse_option,
            );
            self.ledger.taxes.add(
                TaxCategory::LegalSuccession,
                succession.tax(SuccessionKind::Legal),
            );
            self.ledger.taxes.add(
                TaxCategory::LifeInsuranceSuccession,
                succession.tax(SuccessionKind::LifeInsurance),
            );
            info!(
                year,
                decedent = %succession.decedent,
                estate = succession.legal_estate + succession.life_insurance_capital,
                "succession settled"
            );
            self.ledger.successions.push(succession);
        }
    }

    fn balance_cash(
        &mut self,
        scenario: &mut RunScenario<'_>,
        state: &mut SeriesState,
    ) -> Result<(), LedgerError> {
        let year = self.ledger.year;
        let net = self.ledger.net_cash_flow();
        let economy = scenario.economy;
        let social_rate = scenario.fiscal.financial_social_tax_rate();
        // the estate of an adult without heirs still pays for their last year
        let payers = scenario.household.adults_alive_during(year);
        let living = scenario.household.adults_alive_at_end_of(year);
        let patrimony = &mut scenario.patrimony;

        if net >= 0.0 {
            patrimony.capitalize(&economy);
            if net > CASH_EPSILON {
                if let Some(index) = patrimony.surplus_vehicle_index() {
                    let vehicle = &mut patrimony.free_investments[index];
                    vehicle.deposit(net, &living);
                    self.ledger.deposit = Some(Deposit {
                        investment: vehicle.name.clone(),
                        amount: net,
                    });
                }
            }
            return Ok(());
        }

        let owned_by_payers = |owner: &str| payers.contains(&owner);
        let mut remaining = -net;
        for index in patrimony.withdrawal_order() {
            if remaining <= CASH_EPSILON {
                break;
            }
            let investment = &mut patrimony.free_investments[index];
            if investment.available_to(owned_by_payers) <= CASH_EPSILON {
                continue;
            }
            let withdrawal = investment.withdraw_net(remaining, social_rate, owned_by_payers);
            remaining -= withdrawal.net;
            if investment.is_life_insurance() {
                let rebated = withdrawal.interests.min(state.rebate);
                state.rebate -= rebated;
                self.ledger.delayed_taxable_income += withdrawal.interests - rebated;
            }
            self.ledger.withdrawals.push(withdrawal);
        }
        patrimony.capitalize(&economy);

        if remaining > CASH_EPSILON {
            debug!(year, missing = remaining, "free investments exhausted");
            return Err(LedgerError::InsufficientCash {
                year,
                missing: remaining,
            });
        }
        Ok(())
    }

    fn finish(self) -> YearLedger {
        self.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::{self, assert_approx};
    use crate::core::patrimony::{FreeInvestmentKind, Loan, RealEstate};
    use crate::core::ownership::Ownership;
    use crate::core::succession::BeneficiaryClause;

    #[test]
    fn shortfall_is_covered_by_free_investments() {
        let model = fixtures::retired_single(1_500.0, 1_000.0);
        let mut scenario = fixtures::scenario(&model);
        let mut state = SeriesState::new(0.0);

        let ledger = YearLedger::build(2025, &mut scenario, &mut state).expect("enough cash");

        assert_approx(ledger.net_cash_flow(), -1_000.0);
        assert_approx(scenario.patrimony.free_investments_value(), 500.0);
        assert_approx(ledger.withdrawn(), 1_000.0);
        assert_eq!(ledger.delayed_taxable_income(), 0.0);
    }

    #[test]
    fn insufficient_free_investments_fail_with_missing_amount() {
        let model = fixtures::retired_single(800.0, 1_000.0);
        let mut scenario = fixtures::scenario(&model);
        let mut state = SeriesState::new(0.0);

        let err = YearLedger::build(2025, &mut scenario, &mut state).unwrap_err();

        let LedgerError::InsufficientCash { year, missing } = err;
        assert_eq!(year, 2025);
        assert_approx(missing, 200.0);
        assert_approx(scenario.patrimony.free_investments_value(), 0.0);
    }

    #[test]
    fn pea_is_liquidated_before_life_insurance() {
        let mut model = fixtures::retired_single(600.0, 1_000.0);
        model
            .patrimony
            .free_investments
            .insert(0, fixtures::life_insurance("AV", 5_000.0, 0.0));
        let mut scenario = fixtures::scenario(&model);
        let mut state = SeriesState::new(0.0);

        let ledger = YearLedger::build(2025, &mut scenario, &mut state).expect("enough cash");

        let order: Vec<&str> = ledger
            .withdrawals()
            .iter()
            .map(|w| w.investment.as_str())
            .collect();
        assert_eq!(order, vec!["PEA", "AV"]);
        assert_approx(ledger.withdrawals()[0].gross, 600.0);
        assert_approx(ledger.withdrawals()[1].gross, 400.0);
    }

    #[test]
    fn life_insurance_interests_consume_run_rebate_then_carry_over() {
        let mut model = fixtures::retired_single(0.0, 10_000.0);
        model.patrimony.free_investments = vec![fixtures::life_insurance("AV", 100_000.0, 50_000.0)];
        let mut scenario = fixtures::scenario(&model);
        let mut state = SeriesState::new(4_600.0);

        let first = YearLedger::build(2025, &mut scenario, &mut state).expect("enough cash");
        let interests = first.withdrawals()[0].interests;
        assert!(interests > 4_600.0);
        assert_eq!(state.rebate, 0.0);
        assert_approx(first.delayed_taxable_income(), interests - 4_600.0);
        assert_approx(state.carried_taxable_income, interests - 4_600.0);

        let second = YearLedger::build(2026, &mut scenario, &mut state).expect("enough cash");
        assert_approx(second.carried_taxable_income(), interests - 4_600.0);
        assert_approx(second.taxable_revenues(), interests - 4_600.0);
        assert_approx(
            second.delayed_taxable_income(),
            second.withdrawals()[0].interests,
        );
    }

    #[test]
    fn surplus_goes_to_the_designated_vehicle() {
        let mut model = fixtures::working_couple();
        model
            .patrimony
            .free_investments
            .push(fixtures::life_insurance("AV", 0.0, 0.0));
        model.patrimony.surplus_vehicle = Some("AV".to_string());
        let mut scenario = fixtures::scenario(&model);
        let mut state = SeriesState::new(0.0);

        let ledger = YearLedger::build(2025, &mut scenario, &mut state).expect("surplus");

        let deposit = ledger.deposit().expect("deposit");
        assert_eq!(deposit.investment, "AV");
        assert_approx(deposit.amount, ledger.net_cash_flow());
        let vehicle = &scenario.patrimony.free_investments[0];
        assert_approx(vehicle.value, ledger.net_cash_flow());
        assert_approx(vehicle.ownership.fraction_of("Ana"), 0.5);
    }

    #[test]
    fn categories_collect_revenues_taxes_and_expenses() {
        let mut model = fixtures::working_couple();
        model.patrimony.real_estate.push(RealEstate {
            name: "Flat".to_string(),
            value: 200_000.0,
            yearly_rent: 10_000.0,
            main_residence: false,
            ownership: Ownership::single("Ana"),
        });
        model.patrimony.loans.push(Loan {
            name: "Mortgage".to_string(),
            yearly_repayment: 6_000.0,
            first_year: 2020,
            last_year: 2030,
            ownership: Ownership::single("Ana"),
        });
        let mut scenario = fixtures::scenario(&model);
        let mut state = SeriesState::new(0.0);

        let ledger = YearLedger::build(2025, &mut scenario, &mut state).expect("surplus");

        assert_approx(ledger.revenues().get(RevenueCategory::WorkIncome), 80_000.0);
        assert_approx(ledger.revenues().get(RevenueCategory::RealEstateRents), 10_000.0);
        assert_approx(ledger.taxes().get(TaxCategory::SocialLevies), 1_720.0);
        assert!(ledger.taxes().get(TaxCategory::IncomeTax) > 0.0);
        assert_approx(ledger.expenses().get(ExpenseCategory::LoanRepayments), 6_000.0);
        assert_approx(ledger.expenses().get(ExpenseCategory::LifeExpenses), 30_000.0);
        assert_approx(
            ledger.net_cash_flow(),
            ledger.revenues().total() - ledger.taxes().total() - ledger.expenses().total(),
        );
    }

    #[test]
    fn death_triggers_succession_and_its_taxes() {
        let mut model = fixtures::working_couple();
        model.household.adults[1] = fixtures::adult("Bob", 1960, 65.0);
        model.household.expenses.clear();
        model.patrimony.free_investments = vec![fixtures::life_insurance("AV", 400_000.0, 0.0)];
        if let FreeInvestmentKind::LifeInsurance { clause } =
            &mut model.patrimony.free_investments[0].kind
        {
            *clause = BeneficiaryClause::Children;
        }
        model.patrimony.free_investments[0].ownership = Ownership::single("Bob");
        model.patrimony.free_investments.push(fixtures::pea(50_000.0));
        model.patrimony.surplus_vehicle = Some("PEA".to_string());
        let mut scenario = fixtures::scenario(&model);
        let mut state = SeriesState::new(0.0);

        let ledger = YearLedger::build(2025, &mut scenario, &mut state).expect("surplus");

        assert_eq!(ledger.successions().len(), 1);
        assert_eq!(ledger.successions()[0].decedent, "Bob");
        assert_approx(ledger.adult_assets_at_death().expect("death"), 450_000.0);
        assert!(ledger.taxes().get(TaxCategory::LifeInsuranceSuccession) > 0.0);
        let insurance = &scenario.patrimony.free_investments[0];
        assert_approx(insurance.ownership.fraction_of("Bob"), 0.0);
        assert_approx(insurance.ownership.fraction_of("Cleo"), 0.5);
    }
}
