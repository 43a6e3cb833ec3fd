use rand::Rng;
use serde::{Deserialize, Serialize};

use super::random::{RandomizedVariable, SimulationMode};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EconomyDraw {
    pub inflation: f64,
    pub securities_return: f64,
    pub bonds_return: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocioEconomyDraw {
    pub pension_devaluation_rate: f64,
    pub expenses_underevaluation_rate: f64,
}

#[derive(Debug, Clone)]
pub struct Economy {
    pub inflation: RandomizedVariable,
    pub securities_return: RandomizedVariable,
    pub bonds_return: RandomizedVariable,
}

impl Economy {
    pub fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.inflation.advance(rng);
        self.securities_return.advance(rng);
        self.bonds_return.advance(rng);
    }

    pub fn draw(&self, mode: SimulationMode) -> EconomyDraw {
        EconomyDraw {
            inflation: self.inflation.value(mode),
            securities_return: self.securities_return.value(mode),
            bonds_return: self.bonds_return.value(mode),
        }
    }

    pub fn inject(&mut self, draw: &EconomyDraw) {
        self.inflation.inject(draw.inflation);
        self.securities_return.inject(draw.securities_return);
        self.bonds_return.inject(draw.bonds_return);
    }
}

#[derive(Debug, Clone)]
pub struct SocioEconomy {
    pub pension_devaluation_rate: RandomizedVariable,
    pub expenses_underevaluation_rate: RandomizedVariable,
}

impl SocioEconomy {
    pub fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.pension_devaluation_rate.advance(rng);
        self.expenses_underevaluation_rate.advance(rng);
    }

    pub fn draw(&self, mode: SimulationMode) -> SocioEconomyDraw {
        SocioEconomyDraw {
            pension_devaluation_rate: self.pension_devaluation_rate.value(mode),
            expenses_underevaluation_rate: self.expenses_underevaluation_rate.value(mode),
        }
    }

    pub fn inject(&mut self, draw: &SocioEconomyDraw) {
        self.pension_devaluation_rate
            .inject(draw.pension_devaluation_rate);
        self.expenses_underevaluation_rate
            .inject(draw.expenses_underevaluation_rate);
    }
}
