use serde::{Deserialize, Serialize};

use super::random::{RandomizedVariable, SimulationMode};

pub const MAX_AGE: u32 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkIncome {
    pub net_yearly: f64,
    pub last_year: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pension {
    pub gross_yearly: f64,
    pub first_year: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonDraw {
    pub age_of_death: f64,
    pub dependency_years: f64,
}

#[derive(Debug, Clone)]
pub struct Adult {
    pub name: String,
    pub birth_year: u32,
    pub lifespan: RandomizedVariable,
    pub dependency: RandomizedVariable,
    pub work: Option<WorkIncome>,
    pub pension: Option<Pension>,
    age_of_death: u32,
    dependency_years: u32,
}

impl Adult {
    pub fn new(
        name: impl Into<String>,
        birth_year: u32,
        lifespan: RandomizedVariable,
        dependency: RandomizedVariable,
    ) -> Self {
        let mut adult = Self {
            name: name.into(),
            birth_year,
            lifespan,
            dependency,
            work: None,
            pension: None,
            age_of_death: 0,
            dependency_years: 0,
        };
        let defaults = adult.draw(SimulationMode::Deterministic);
        adult.apply(&defaults);
        adult
    }

    pub fn with_work(mut self, work: WorkIncome) -> Self {
        self.work = Some(work);
        self
    }

    pub fn with_pension(mut self, pension: Pension) -> Self {
        self.pension = Some(pension);
        self
    }

    pub fn draw(&self, mode: SimulationMode) -> PersonDraw {
        PersonDraw {
            age_of_death: self.lifespan.value(mode),
            dependency_years: self.dependency.value(mode),
        }
    }

    pub fn inject(&mut self, draw: &PersonDraw) {
        self.lifespan.inject(draw.age_of_death);
        self.dependency.inject(draw.dependency_years);
    }

    pub fn apply(&mut self, draw: &PersonDraw) {
        let bounded = |value: f64| value.round().clamp(0.0, MAX_AGE as f64) as u32;
        self.age_of_death = bounded(draw.age_of_death);
        self.dependency_years = bounded(draw.dependency_years);
    }

    pub fn age_of_death(&self) -> u32 {
        self.age_of_death
    }

    pub fn dependency_years(&self) -> u32 {
        self.dependency_years
    }

    pub fn death_year(&self) -> u32 {
        self.birth_year.saturating_add(self.age_of_death)
    }

    pub fn age(&self, year: u32) -> u32 {
        year.saturating_sub(self.birth_year)
    }

    pub fn is_alive(&self, at_end_of: u32) -> bool {
        at_end_of >= self.birth_year && at_end_of < self.death_year()
    }

    pub fn is_alive_during(&self, year: u32) -> bool {
        year >= self.birth_year && year <= self.death_year()
    }

    pub fn dies_during(&self, year: u32) -> bool {
        self.is_alive(year.saturating_sub(1)) && !self.is_alive(year)
    }

    // Dependent during the last `dependency_years` years of life.
    pub fn is_dependent_during(&self, year: u32) -> bool {
        self.is_alive_during(year) && year.saturating_add(self.dependency_years) > self.death_year()
    }

    pub fn work_income(&self, year: u32) -> Option<f64> {
        let work = self.work?;
        (self.is_alive_during(year) && year <= work.last_year).then_some(work.net_yearly)
    }

    pub fn pension_gross(&self, year: u32, devaluation_rate: f64) -> Option<f64> {
        let pension = self.pension?;
        if !self.is_alive_during(year) || year < pension.first_year {
            return None;
        }
        let years = (year - pension.first_year) as i32;
        Some(pension.gross_yearly * (1.0 - devaluation_rate).powi(years))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Child {
    pub name: String,
    pub birth_year: u32,
    #[serde(default = "default_child_age_of_death")]
    pub age_of_death: u32,
    #[serde(default = "default_independence_age")]
    pub independence_age: u32,
}

fn default_child_age_of_death() -> u32 {
    90
}

fn default_independence_age() -> u32 {
    24
}

impl Child {
    pub fn age(&self, year: u32) -> u32 {
        year.saturating_sub(self.birth_year)
    }

    pub fn is_alive(&self, at_end_of: u32) -> bool {
        at_end_of >= self.birth_year && at_end_of < self.birth_year + self.age_of_death
    }

    pub fn is_fiscal_dependent(&self, year: u32) -> bool {
        self.is_alive(year.saturating_sub(1))
            && year >= self.birth_year
            && self.age(year) < self.independence_age
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifeExpense {
    pub name: String,
    pub yearly_amount: f64,
    #[serde(default)]
    pub first_year: Option<u32>,
    #[serde(default)]
    pub last_year: Option<u32>,
}

impl LifeExpense {
    pub fn amount(&self, year: u32) -> f64 {
        let started = self.first_year.is_none_or(|first| year >= first);
        let running = self.last_year.is_none_or(|last| year <= last);
        if started && running {
            self.yearly_amount
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Household {
    pub adults: Vec<Adult>,
    pub children: Vec<Child>,
    pub expenses: Vec<LifeExpense>,
    pub dependency_yearly_cost: f64,
}

impl Household {
    pub fn adult(&self, name: &str) -> Option<&Adult> {
        self.adults.iter().find(|a| a.name == name)
    }

    pub fn is_adult(&self, name: &str) -> bool {
        self.adult(name).is_some()
    }

    pub fn adults_alive_count(&self, at_end_of: u32) -> usize {
        self.adults.iter().filter(|a| a.is_alive(at_end_of)).count()
    }

    pub fn adults_alive_during(&self, year: u32) -> Vec<&str> {
        self.adults
            .iter()
            .filter(|a| a.is_alive_during(year))
            .map(|a| a.name.as_str())
            .collect()
    }

    pub fn adults_alive_at_end_of(&self, year: u32) -> Vec<&str> {
        self.adults
            .iter()
            .filter(|a| a.is_alive(year))
            .map(|a| a.name.as_str())
            .collect()
    }

    pub fn fiscal_children_count(&self, year: u32) -> usize {
        self.children
            .iter()
            .filter(|c| c.is_fiscal_dependent(year))
            .count()
    }

    pub fn children_alive_at_end_of(&self, year: u32) -> Vec<String> {
        self.children
            .iter()
            .filter(|c| c.is_alive(year))
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn surviving_spouse_of(&self, name: &str, year: u32) -> Option<&Adult> {
        self.adults
            .iter()
            .find(|a| a.name != name && a.is_alive(year))
    }

    pub fn deceased_during(&self, year: u32) -> Vec<&Adult> {
        self.adults.iter().filter(|a| a.dies_during(year)).collect()
    }

    pub fn first_death_year(&self) -> Option<u32> {
        self.adults.iter().map(Adult::death_year).min()
    }

    pub fn last_death_year(&self) -> Option<u32> {
        self.adults.iter().map(Adult::death_year).max()
    }

    pub fn advance<R: rand::Rng + ?Sized>(&mut self, rng: &mut R) {
        for adult in &mut self.adults {
            adult.lifespan.advance(rng);
            adult.dependency.advance(rng);
        }
    }
}
