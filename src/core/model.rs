use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::economy::{Economy, EconomyDraw, SocioEconomy, SocioEconomyDraw};
use super::error::ModelError;
use super::fiscal::FiscalModel;
use super::household::{Household, MAX_AGE, PersonDraw};
use super::patrimony::Patrimony;
use super::random::{RandomizedVariable, SimulationMode};
use super::succession::SpouseOption;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampledInputs {
    pub economy: EconomyDraw,
    pub socio_economy: SocioEconomyDraw,
    pub persons: BTreeMap<String, PersonDraw>,
}

#[derive(Debug)]
pub struct Model {
    pub household: Household,
    pub patrimony: Patrimony,
    pub economy: Economy,
    pub socio_economy: SocioEconomy,
    pub fiscal: Box<dyn FiscalModel>,
    pub spouse_option: SpouseOption,
}

impl Model {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.household.adults.is_empty() {
            return Err(ModelError::InvalidScenario(
                "household needs at least one adult".to_string(),
            ));
        }
        if self.household.adults.len() > 2 {
            return Err(ModelError::InvalidScenario(
                "household has at most two adults".to_string(),
            ));
        }
        let mut names = BTreeSet::new();
        let people = self
            .household
            .adults
            .iter()
            .map(|a| &a.name)
            .chain(self.household.children.iter().map(|c| &c.name));
        for name in people {
            if !names.insert(name.as_str()) {
                return Err(ModelError::InvalidScenario(format!(
                    "{name} appears twice in the household"
                )));
            }
        }
        for adult in &self.household.adults {
            check_age_variable(&adult.name, "lifespan", &adult.lifespan)?;
            check_age_variable(&adult.name, "dependency", &adult.dependency)?;
        }
        self.patrimony.validate(&self.household)
    }

    pub fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.economy.advance(rng);
        self.socio_economy.advance(rng);
        self.household.advance(rng);
    }

    pub fn draw(&self, mode: SimulationMode) -> SampledInputs {
        SampledInputs {
            economy: self.economy.draw(mode),
            socio_economy: self.socio_economy.draw(mode),
            persons: self
                .household
                .adults
                .iter()
                .map(|a| (a.name.clone(), a.draw(mode)))
                .collect(),
        }
    }

    pub fn inject(&mut self, inputs: &SampledInputs) -> Result<(), ModelError> {
        if let Some(unknown) = inputs
            .persons
            .keys()
            .find(|name| !self.household.is_adult(name))
        {
            return Err(ModelError::UnknownPerson(unknown.clone()));
        }
        for adult in &mut self.household.adults {
            let draw = inputs
                .persons
                .get(&adult.name)
                .ok_or_else(|| ModelError::UnknownPerson(adult.name.clone()))?;
            adult.inject(draw);
        }
        self.economy.inject(&inputs.economy);
        self.socio_economy.inject(&inputs.socio_economy);
        Ok(())
    }

    pub fn instantiate(&self, inputs: &SampledInputs) -> RunScenario<'_> {
        let mut household = self.household.clone();
        for adult in &mut household.adults {
            if let Some(draw) = inputs.persons.get(&adult.name) {
                adult.apply(draw);
            }
        }
        RunScenario {
            household,
            patrimony: self.patrimony.clone(),
            economy: inputs.economy,
            socio_economy: inputs.socio_economy,
            fiscal: self.fiscal.as_ref(),
            spouse_option: self.spouse_option,
        }
    }
}

#[derive(Debug)]
pub struct RunScenario<'a> {
    pub household: Household,
    pub patrimony: Patrimony,
    pub economy: EconomyDraw,
    pub socio_economy: SocioEconomyDraw,
    pub fiscal: &'a dyn FiscalModel,
    pub spouse_option: SpouseOption,
}

fn check_age_variable(
    person: &str,
    what: &str,
    variable: &RandomizedVariable,
) -> Result<(), ModelError> {
    let (min, max) = variable.distribution().domain();
    let limit = MAX_AGE as f64;
    let within = |v: f64| (0.0..=limit).contains(&v);
    if !(within(min) && within(max) && within(variable.default_value())) {
        return Err(ModelError::InvalidScenario(format!(
            "{what} of {person} must stay within [0, {MAX_AGE}] years"
        )));
    }
    Ok(())
}
