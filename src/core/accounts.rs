use serde::Serialize;
use tracing::{debug, warn};

use super::error::LedgerError;
use super::household::Household;
use super::ledger::{CategoryTotals, SeriesState, YearLedger};
use super::model::RunScenario;
use super::patrimony::{EvaluationMethod, Patrimony};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetCategory {
    FreeInvestments,
    PeriodicInvestments,
    RealEstate,
}

impl AssetCategory {
    pub const ALL: [Self; 3] = [Self::FreeInvestments, Self::PeriodicInvestments, Self::RealEstate];

    pub fn label(self) -> &'static str {
        match self {
            Self::FreeInvestments => "Free investments",
            Self::PeriodicInvestments => "Periodic investments",
            Self::RealEstate => "Real estate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSheet {
    pub year: u32,
    pub assets: CategoryTotals<AssetCategory>,
    pub liabilities: f64,
    pub net_value: f64,
    pub adults_net_value: f64,
    pub adults_alive: usize,
}

impl BalanceSheet {
    pub fn snapshot(year: u32, household: &Household, patrimony: &Patrimony) -> Self {
        let mut assets = CategoryTotals::default();
        assets.add(
            AssetCategory::FreeInvestments,
            patrimony.free_investments_value(),
        );
        assets.add(
            AssetCategory::PeriodicInvestments,
            patrimony
                .periodic_investments
                .iter()
                .map(|i| i.value_at_end_of(year))
                .sum(),
        );
        assets.add(
            AssetCategory::RealEstate,
            patrimony
                .real_estate
                .iter()
                .map(|p| p.value_at_end_of(year))
                .sum(),
        );
        let liabilities: f64 = -patrimony
            .loans
            .iter()
            .map(|l| l.value_at_end_of(year))
            .sum::<f64>();
        let adults_net_value = patrimony.owned_value_by(
            |owner| {
                household
                    .adult(owner)
                    .is_some_and(|a| a.is_alive_during(year))
            },
            year,
            EvaluationMethod::Patrimoine,
        );

        Self {
            year,
            net_value: assets.total() - liabilities,
            assets,
            liabilities,
            adults_net_value,
            adults_alive: household.adults_alive_count(year),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum SeriesEnd {
    Horizon,
    AllAdultsDeceased { year: u32 },
    // `year` could not be financed and is not part of the series.
    InsufficientCash { year: u32, missing: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSeries {
    first_year: u32,
    horizon: u32,
    ledgers: Vec<YearLedger>,
    balance_sheets: Vec<BalanceSheet>,
    end: SeriesEnd,
}

impl LedgerSeries {
    pub fn build(first_year: u32, years: u32, scenario: &mut RunScenario<'_>) -> Self {
        let adults = scenario.household.adults_alive_count(first_year.saturating_sub(1));
        let mut state = SeriesState::new(scenario.fiscal.life_insurance_rebate(adults.max(1)));
        let mut ledgers = Vec::new();
        let mut balance_sheets = Vec::new();
        let mut end = SeriesEnd::Horizon;

        for year in first_year..first_year.saturating_add(years) {
            if scenario.household.adults_alive_during(year).is_empty() {
                end = SeriesEnd::AllAdultsDeceased {
                    year: year.saturating_sub(1),
                };
                break;
            }
            match YearLedger::build(year, scenario, &mut state) {
                Ok(ledger) => {
                    ledgers.push(ledger);
                    balance_sheets.push(BalanceSheet::snapshot(
                        year,
                        &scenario.household,
                        &scenario.patrimony,
                    ));
                }
                Err(LedgerError::InsufficientCash { year, missing }) => {
                    warn!(year, missing, "series truncated by a cash shortfall");
                    end = SeriesEnd::InsufficientCash { year, missing };
                    break;
                }
            }
            if scenario.household.adults_alive_count(year) == 0 {
                end = SeriesEnd::AllAdultsDeceased { year };
                break;
            }
        }

        debug!(completed = ledgers.len(), ?end, "ledger series built");
        Self {
            first_year,
            horizon: years,
            ledgers,
            balance_sheets,
            end,
        }
    }

    pub fn first_year(&self) -> u32 {
        self.first_year
    }

    pub fn horizon(&self) -> u32 {
        self.horizon
    }

    pub fn ledgers(&self) -> &[YearLedger] {
        &self.ledgers
    }

    pub fn balance_sheets(&self) -> &[BalanceSheet] {
        &self.balance_sheets
    }

    pub fn end(&self) -> SeriesEnd {
        self.end
    }

    pub fn ledger(&self, year: u32) -> Option<&YearLedger> {
        self.ledgers.iter().find(|l| l.year() == year)
    }

    pub fn last_completed_year(&self) -> Option<u32> {
        self.ledgers.last().map(YearLedger::year)
    }

    pub fn is_within_horizon(&self, year: u32) -> bool {
        year >= self.first_year && year < self.first_year.saturating_add(self.horizon)
    }

    pub fn shortfall_year(&self) -> Option<u32> {
        match self.end {
            SeriesEnd::InsufficientCash { year, .. } => Some(year),
            _ => None,
        }
    }
}
