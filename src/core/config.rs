use serde::{Deserialize, Serialize};

use super::distribution::{DistributionParams, SamplingMethod};
use super::economy::{Economy, SocioEconomy};
use super::error::{ModelError, SimulationError};
use super::fiscal::FrenchFiscalModel;
use super::household::{Adult, Child, Household, LifeExpense, Pension, WorkIncome};
use super::kpi::{Kpi, KpiConfig, KpiKind};
use super::model::Model;
use super::ownership::{Ownership, Share};
use super::patrimony::{
    FreeInvestment, FreeInvestmentKind, Loan, Patrimony, PeriodicInvestment, RealEstate,
};
use super::random::RandomizedVariableConfig;
use super::simulation::{Simulation, SimulationSettings};
use super::succession::{BeneficiaryClause, SpouseOption};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdultConfig {
    pub name: String,
    pub birth_year: u32,
    pub lifespan: RandomizedVariableConfig,
    #[serde(default = "no_dependency")]
    pub dependency: RandomizedVariableConfig,
    #[serde(default)]
    pub work: Option<WorkIncome>,
    #[serde(default)]
    pub pension: Option<Pension>,
}

fn no_dependency() -> RandomizedVariableConfig {
    fixed(0.0)
}

fn fixed(value: f64) -> RandomizedVariableConfig {
    RandomizedVariableConfig {
        default_value: value,
        distribution: DistributionParams::Discrete {
            values: vec![value],
            weights: vec![1.0],
        },
        sampling: SamplingMethod::InverseTransform,
    }
}

fn beta(default_value: f64, alpha: f64, beta: f64, min: f64, max: f64) -> RandomizedVariableConfig {
    RandomizedVariableConfig {
        default_value,
        distribution: DistributionParams::Beta {
            alpha,
            beta,
            min,
            max,
        },
        sampling: SamplingMethod::InverseTransform,
    }
}

fn discrete(default_value: f64, values: &[f64], weights: &[f64]) -> RandomizedVariableConfig {
    RandomizedVariableConfig {
        default_value,
        distribution: DistributionParams::Discrete {
            values: values.to_vec(),
            weights: weights.to_vec(),
        },
        sampling: SamplingMethod::InverseTransform,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HouseholdConfig {
    pub adults: Vec<AdultConfig>,
    pub children: Vec<Child>,
    pub expenses: Vec<LifeExpense>,
    pub dependency_yearly_cost: f64,
}

impl Default for HouseholdConfig {
    fn default() -> Self {
        let dependency = discrete(0.0, &[0.0, 2.0, 5.0], &[0.6, 0.25, 0.15]);
        Self {
            adults: vec![
                AdultConfig {
                    name: "Alice".to_string(),
                    birth_year: 1968,
                    lifespan: beta(88.0, 3.0, 2.0, 70.0, 100.0),
                    dependency: dependency.clone(),
                    work: Some(WorkIncome {
                        net_yearly: 48_000.0,
                        last_year: 2032,
                    }),
                    pension: Some(Pension {
                        gross_yearly: 30_000.0,
                        first_year: 2033,
                    }),
                },
                AdultConfig {
                    name: "Bruno".to_string(),
                    birth_year: 1966,
                    lifespan: beta(84.0, 3.0, 2.0, 68.0, 98.0),
                    dependency,
                    work: Some(WorkIncome {
                        net_yearly: 42_000.0,
                        last_year: 2030,
                    }),
                    pension: Some(Pension {
                        gross_yearly: 26_000.0,
                        first_year: 2031,
                    }),
                },
            ],
            children: vec![
                Child {
                    name: "Chloe".to_string(),
                    birth_year: 2002,
                    age_of_death: 90,
                    independence_age: 24,
                },
                Child {
                    name: "Hugo".to_string(),
                    birth_year: 2006,
                    age_of_death: 90,
                    independence_age: 24,
                },
            ],
            expenses: vec![
                LifeExpense {
                    name: "Living".to_string(),
                    yearly_amount: 45_000.0,
                    first_year: None,
                    last_year: None,
                },
                LifeExpense {
                    name: "Studies".to_string(),
                    yearly_amount: 8_000.0,
                    first_year: Some(2025),
                    last_year: Some(2028),
                },
            ],
            dependency_yearly_cost: 30_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EconomyConfig {
    pub inflation: RandomizedVariableConfig,
    pub securities_return: RandomizedVariableConfig,
    pub bonds_return: RandomizedVariableConfig,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            inflation: beta(0.02, 2.0, 3.0, 0.0, 0.06),
            securities_return: beta(0.05, 3.0, 3.0, -0.04, 0.14),
            bonds_return: beta(0.025, 3.0, 3.0, 0.0, 0.05),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SocioEconomyConfig {
    pub pension_devaluation_rate: RandomizedVariableConfig,
    pub expenses_underevaluation_rate: RandomizedVariableConfig,
}

impl Default for SocioEconomyConfig {
    fn default() -> Self {
        Self {
            pension_devaluation_rate: beta(0.005, 2.0, 5.0, 0.0, 0.03),
            expenses_underevaluation_rate: discrete(0.0, &[0.0, 0.05, 0.1], &[0.5, 0.3, 0.2]),
        }
    }
}

fn halves(first: &str, second: &str) -> Ownership {
    Ownership::new(vec![
        Share {
            owner: first.to_string(),
            fraction: 0.5,
        },
        Share {
            owner: second.to_string(),
            fraction: 0.5,
        },
    ])
}

fn default_patrimony() -> Patrimony {
    Patrimony {
        free_investments: vec![
            FreeInvestment {
                name: "PEA".to_string(),
                kind: FreeInvestmentKind::Pea,
                value: 120_000.0,
                interests: 40_000.0,
                securities_share: 0.9,
                ownership: halves("Alice", "Bruno"),
            },
            FreeInvestment {
                name: "Life insurance".to_string(),
                kind: FreeInvestmentKind::LifeInsurance {
                    clause: BeneficiaryClause::SpouseThenChildren,
                },
                value: 250_000.0,
                interests: 60_000.0,
                securities_share: 0.4,
                ownership: Ownership::single("Alice"),
            },
        ],
        periodic_investments: vec![PeriodicInvestment {
            name: "Retirement plan".to_string(),
            initial_value: 20_000.0,
            yearly_contribution: 3_000.0,
            first_year: 2025,
            last_year: 2032,
            yearly_rate: 0.03,
            ownership: Ownership::single("Alice"),
        }],
        real_estate: vec![
            RealEstate {
                name: "Home".to_string(),
                value: 450_000.0,
                yearly_rent: 0.0,
                main_residence: true,
                ownership: halves("Alice", "Bruno"),
            },
            RealEstate {
                name: "Rental flat".to_string(),
                value: 180_000.0,
                yearly_rent: 9_000.0,
                main_residence: false,
                ownership: Ownership::single("Bruno"),
            },
        ],
        loans: vec![Loan {
            name: "Mortgage".to_string(),
            yearly_repayment: 14_000.0,
            first_year: 2018,
            last_year: 2032,
            ownership: halves("Alice", "Bruno"),
        }],
        surplus_vehicle: Some("Life insurance".to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScenarioConfig {
    pub household: HouseholdConfig,
    pub patrimony: Patrimony,
    pub economy: EconomyConfig,
    pub socio_economy: SocioEconomyConfig,
    pub fiscal: FrenchFiscalModel,
    pub spouse_option: SpouseOption,
    pub kpis: Vec<KpiConfig>,
    pub simulation: SimulationSettings,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            household: HouseholdConfig::default(),
            patrimony: default_patrimony(),
            economy: EconomyConfig::default(),
            socio_economy: SocioEconomyConfig::default(),
            fiscal: FrenchFiscalModel::default(),
            spouse_option: SpouseOption::default(),
            kpis: vec![
                KpiConfig {
                    kind: KpiKind::MinimumAdultAssets,
                    objective: 100_000.0,
                    target_probability: 0.1,
                },
                KpiConfig {
                    kind: KpiKind::AdultAssetsAtFirstDeath,
                    objective: 300_000.0,
                    target_probability: 0.1,
                },
                KpiConfig {
                    kind: KpiKind::AdultAssetsAtLastDeath,
                    objective: 200_000.0,
                    target_probability: 0.1,
                },
            ],
            simulation: SimulationSettings::default(),
        }
    }
}

impl ScenarioConfig {
    pub fn into_model(&self) -> Result<Model, ModelError> {
        self.fiscal.validate()?;

        let mut adults = Vec::with_capacity(self.household.adults.len());
        for config in &self.household.adults {
            let mut adult = Adult::new(
                config.name.clone(),
                config.birth_year,
                config.lifespan.build()?,
                config.dependency.build()?,
            );
            adult.work = config.work;
            adult.pension = config.pension;
            adults.push(adult);
        }

        let model = Model {
            household: Household {
                adults,
                children: self.household.children.clone(),
                expenses: self.household.expenses.clone(),
                dependency_yearly_cost: self.household.dependency_yearly_cost,
            },
            patrimony: self.patrimony.clone(),
            economy: Economy {
                inflation: self.economy.inflation.build()?,
                securities_return: self.economy.securities_return.build()?,
                bonds_return: self.economy.bonds_return.build()?,
            },
            socio_economy: SocioEconomy {
                pension_devaluation_rate: self.socio_economy.pension_devaluation_rate.build()?,
                expenses_underevaluation_rate: self
                    .socio_economy
                    .expenses_underevaluation_rate
                    .build()?,
            },
            fiscal: Box::new(self.fiscal.clone()),
            spouse_option: self.spouse_option,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn kpis(&self) -> Result<Vec<Kpi>, ModelError> {
        self.kpis
            .iter()
            .map(|k| k.build().map_err(ModelError::from))
            .collect()
    }

    pub fn build_simulation(&self) -> Result<Simulation, SimulationError> {
        Simulation::new(self.into_model()?, self.kpis()?, self.simulation)
    }
}
