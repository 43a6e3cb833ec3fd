use super::economy::{Economy, SocioEconomy};
use super::fiscal::FrenchFiscalModel;
use super::household::{Adult, Child, Household, LifeExpense, WorkIncome};
use super::model::{Model, RunScenario};
use super::ownership::Ownership;
use super::patrimony::{FreeInvestment, FreeInvestmentKind, Patrimony};
use super::random::{RandomizedVariable, SimulationMode};
use super::succession::{BeneficiaryClause, SpouseOption};

pub fn assert_approx(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}

pub fn fixed(value: f64) -> RandomizedVariable {
    RandomizedVariable::fixed(value).expect("finite value")
}

pub fn adult(name: &str, birth_year: u32, age_of_death: f64) -> Adult {
    Adult::new(name, birth_year, fixed(age_of_death), fixed(0.0))
}

pub fn child(name: &str, birth_year: u32) -> Child {
    Child {
        name: name.to_string(),
        birth_year,
        age_of_death: 90,
        independence_age: 24,
    }
}

pub fn expense(yearly_amount: f64) -> LifeExpense {
    LifeExpense {
        name: "Living".to_string(),
        yearly_amount,
        first_year: None,
        last_year: None,
    }
}

pub fn pea(value: f64) -> FreeInvestment {
    FreeInvestment {
        name: "PEA".to_string(),
        kind: FreeInvestmentKind::Pea,
        value,
        interests: 0.0,
        securities_share: 1.0,
        ownership: Ownership::single("Ana"),
    }
}

pub fn life_insurance(name: &str, value: f64, interests: f64) -> FreeInvestment {
    FreeInvestment {
        name: name.to_string(),
        kind: FreeInvestmentKind::LifeInsurance {
            clause: BeneficiaryClause::SpouseThenChildren,
        },
        value,
        interests,
        securities_share: 0.3,
        ownership: Ownership::single("Ana"),
    }
}

pub fn flat_economy() -> (Economy, SocioEconomy) {
    (
        Economy {
            inflation: fixed(0.0),
            securities_return: fixed(0.0),
            bonds_return: fixed(0.0),
        },
        SocioEconomy {
            pension_devaluation_rate: fixed(0.0),
            expenses_underevaluation_rate: fixed(0.0),
        },
    )
}

pub fn model(household: Household, patrimony: Patrimony) -> Model {
    let (economy, socio_economy) = flat_economy();
    Model {
        household,
        patrimony,
        economy,
        socio_economy,
        fiscal: Box::new(FrenchFiscalModel::default()),
        spouse_option: SpouseOption::QuarterFullOwnership,
    }
}

pub fn retired_single(pea_value: f64, yearly_expense: f64) -> Model {
    model(
        Household {
            adults: vec![adult("Ana", 1950, 100.0)],
            expenses: vec![expense(yearly_expense)],
            ..Household::default()
        },
        Patrimony {
            free_investments: vec![pea(pea_value)],
            ..Patrimony::default()
        },
    )
}

pub fn working_couple() -> Model {
    let work = WorkIncome {
        net_yearly: 40_000.0,
        last_year: 2035,
    };
    model(
        Household {
            adults: vec![
                adult("Ana", 1970, 90.0).with_work(work),
                adult("Bob", 1968, 88.0).with_work(work),
            ],
            children: vec![child("Cleo", 2000), child("Dan", 2003)],
            expenses: vec![expense(30_000.0)],
            dependency_yearly_cost: 0.0,
        },
        Patrimony::default(),
    )
}

pub fn scenario(model: &Model) -> RunScenario<'_> {
    model.instantiate(&model.draw(SimulationMode::Deterministic))
}
