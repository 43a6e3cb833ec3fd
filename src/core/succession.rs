use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::fiscal::FiscalModel;
use super::household::{Adult, Household};
use super::patrimony::{EvaluationMethod, FreeInvestmentKind, Patrimony};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpouseOption {
    #[default]
    UsufructOfAll,
    QuarterFullOwnership,
    DisposableQuota,
}

impl SpouseOption {
    pub fn spouse_fraction(self, nb_children: usize, usufruct_rate: f64) -> f64 {
        if nb_children == 0 {
            return 1.0;
        }
        match self {
            SpouseOption::UsufructOfAll => usufruct_rate.clamp(0.0, 1.0),
            SpouseOption::QuarterFullOwnership => 0.25,
            SpouseOption::DisposableQuota => (1.0 / (nb_children as f64 + 1.0)).max(0.25),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BeneficiaryClause {
    #[default]
    SpouseThenChildren,
    Children,
}

impl BeneficiaryClause {
    pub fn beneficiaries(self, children: &[String], spouse: Option<&str>) -> Vec<(String, f64)> {
        let to_spouse = || spouse.map(|s| vec![(s.to_string(), 1.0)]);
        let to_children = || {
            (!children.is_empty()).then(|| evenly(children))
        };
        let recipients = match self {
            BeneficiaryClause::SpouseThenChildren => to_spouse().or_else(to_children),
            BeneficiaryClause::Children => to_children().or_else(to_spouse),
        };
        recipients.unwrap_or_default()
    }
}

fn evenly(children: &[String]) -> Vec<(String, f64)> {
    let weight = 1.0 / children.len() as f64;
    children.iter().map(|c| (c.clone(), weight)).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Heirs {
    legal: Vec<(String, f64)>,
}

impl Heirs {
    pub fn new(
        children: &[String],
        spouse: Option<&str>,
        option: SpouseOption,
        usufruct_rate: f64,
    ) -> Self {
        let spouse_fraction = match spouse {
            Some(_) => option.spouse_fraction(children.len(), usufruct_rate),
            None => 0.0,
        };
        let mut legal = Vec::with_capacity(children.len() + 1);
        if let Some(spouse) = spouse {
            legal.push((spouse.to_string(), spouse_fraction));
        }
        if !children.is_empty() {
            let each = (1.0 - spouse_fraction) / children.len() as f64;
            legal.extend(children.iter().map(|c| (c.clone(), each)));
        }
        legal.retain(|(_, w)| *w > 0.0);
        Self { legal }
    }

    pub fn legal(&self) -> &[(String, f64)] {
        &self.legal
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuccessionKind {
    Legal,
    LifeInsurance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inheritance {
    pub heir: String,
    pub kind: SuccessionKind,
    pub received: f64,
    pub tax: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Succession {
    pub year: u32,
    pub decedent: String,
    pub legal_estate: f64,
    pub life_insurance_capital: f64,
    pub inheritances: Vec<Inheritance>,
}

impl Succession {
    pub fn tax(&self, kind: SuccessionKind) -> f64 {
        self.inheritances
            .iter()
            .filter(|i| i.kind == kind)
            .map(|i| i.tax)
            .sum()
    }
}

pub fn settle_estate(
    year: u32,
    decedent: &Adult,
    household: &Household,
    patrimony: &mut Patrimony,
    fiscal: &dyn FiscalModel,
    option: SpouseOption,
) -> Succession {
    let children = household.children_alive_at_end_of(year);
    let spouse = household.surviving_spouse_of(&decedent.name, year);
    let spouse_name = spouse.map(|s| s.name.as_str());
    let usufruct_rate = spouse.map_or(0.0, |s| fiscal.usufruct_rate(s.age(year)));
    let is_spouse = |heir: &str| spouse_name == Some(heir);

    let legal_estate = patrimony
        .owned_value(&decedent.name, year, EvaluationMethod::LegalSuccession)
        .max(0.0);
    let heirs = Heirs::new(&children, spouse_name, option, usufruct_rate);
    let mut inheritances: Vec<Inheritance> = heirs
        .legal()
        .iter()
        .map(|(heir, weight)| {
            let received = legal_estate * weight;
            Inheritance {
                heir: heir.clone(),
                kind: SuccessionKind::Legal,
                received,
                tax: if is_spouse(heir) {
                    0.0
                } else {
                    fiscal.legal_succession_tax(received)
                },
            }
        })
        .collect();

    let mut insured: BTreeMap<String, f64> = BTreeMap::new();
    let mut life_insurance_capital = 0.0;
    for investment in &patrimony.free_investments {
        if let FreeInvestmentKind::LifeInsurance { clause } = &investment.kind {
            let capital = investment.value * investment.ownership.fraction_of(&decedent.name);
            life_insurance_capital += capital;
            for (heir, weight) in clause.beneficiaries(&children, spouse_name) {
                *insured.entry(heir).or_default() += capital * weight;
            }
        }
    }
    inheritances.extend(insured.into_iter().map(|(heir, received)| {
        let tax = if is_spouse(&heir) {
            0.0
        } else {
            fiscal.life_insurance_succession_tax(received)
        };
        Inheritance {
            heir,
            kind: SuccessionKind::LifeInsurance,
            received,
            tax,
        }
    }));

    patrimony.transfer_ownership_of(&decedent.name, &children, spouse_name, option, usufruct_rate);

    debug!(
        year,
        decedent = %decedent.name,
        legal_estate,
        life_insurance_capital,
        heirs = inheritances.len(),
        "estate settled"
    );

    Succession {
        year,
        decedent: decedent.name.clone(),
        legal_estate,
        life_insurance_capital,
        inheritances,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fiscal::FrenchFiscalModel;
    use crate::core::household::Child;
    use crate::core::ownership::{Ownership, Share};
    use crate::core::patrimony::{FreeInvestment, RealEstate};
    use crate::core::random::RandomizedVariable;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn adult(name: &str, birth_year: u32, age_of_death: f64) -> Adult {
        Adult::new(
            name,
            birth_year,
            RandomizedVariable::fixed(age_of_death).expect("finite"),
            RandomizedVariable::fixed(0.0).expect("finite"),
        )
    }

    fn child(name: &str, birth_year: u32) -> Child {
        Child {
            name: name.to_string(),
            birth_year,
            age_of_death: 90,
            independence_age: 24,
        }
    }

    #[test]
    fn spouse_fraction_follows_chosen_option() {
        assert_eq!(SpouseOption::QuarterFullOwnership.spouse_fraction(0, 0.4), 1.0);
        assert_eq!(SpouseOption::UsufructOfAll.spouse_fraction(2, 0.4), 0.4);
        assert_eq!(SpouseOption::QuarterFullOwnership.spouse_fraction(2, 0.4), 0.25);
        assert_eq!(SpouseOption::DisposableQuota.spouse_fraction(1, 0.4), 0.5);
        assert_approx(SpouseOption::DisposableQuota.spouse_fraction(2, 0.4), 1.0 / 3.0);
        assert_eq!(SpouseOption::DisposableQuota.spouse_fraction(5, 0.4), 0.25);
    }

    #[test]
    fn heirs_split_the_rest_between_children() {
        let heirs = Heirs::new(
            &names(&["Cleo", "Dan"]),
            Some("Ana"),
            SpouseOption::QuarterFullOwnership,
            0.0,
        );
        assert_eq!(
            heirs.legal(),
            &[
                ("Ana".to_string(), 0.25),
                ("Cleo".to_string(), 0.375),
                ("Dan".to_string(), 0.375)
            ]
        );
        assert!(Heirs::new(&[], None, SpouseOption::UsufructOfAll, 0.0)
            .legal()
            .is_empty());
    }

    #[test]
    fn clause_falls_back_to_children_without_spouse() {
        let children = names(&["Cleo", "Dan"]);
        let to_spouse = BeneficiaryClause::SpouseThenChildren.beneficiaries(&children, Some("Ana"));
        assert_eq!(to_spouse, vec![("Ana".to_string(), 1.0)]);
        let to_children = BeneficiaryClause::SpouseThenChildren.beneficiaries(&children, None);
        assert_eq!(to_children.len(), 2);
        assert!(BeneficiaryClause::Children.beneficiaries(&[], None).is_empty());
    }

    #[test]
    fn estate_is_taxed_for_children_and_transferred() {
        let household = Household {
            adults: vec![adult("Ana", 1960, 90.0), adult("Bob", 1958, 70.0)],
            children: vec![child("Cleo", 1990), child("Dan", 1992)],
            ..Household::default()
        };
        let couple = Ownership::new(vec![
            Share {
                owner: "Ana".to_string(),
                fraction: 0.5,
            },
            Share {
                owner: "Bob".to_string(),
                fraction: 0.5,
            },
        ]);
        let mut patrimony = Patrimony {
            free_investments: vec![FreeInvestment {
                name: "Life insurance".to_string(),
                kind: FreeInvestmentKind::LifeInsurance {
                    clause: BeneficiaryClause::Children,
                },
                value: 400_000.0,
                interests: 0.0,
                securities_share: 0.5,
                ownership: Ownership::single("Bob"),
            }],
            real_estate: vec![RealEstate {
                name: "Home".to_string(),
                value: 1_000_000.0,
                yearly_rent: 0.0,
                main_residence: true,
                ownership: couple,
            }],
            ..Patrimony::default()
        };
        let fiscal = FrenchFiscalModel::default();
        let bob = household.adult("Bob").expect("Bob").clone();

        let succession = settle_estate(
            2028,
            &bob,
            &household,
            &mut patrimony,
            &fiscal,
            SpouseOption::QuarterFullOwnership,
        );

        assert_approx(succession.legal_estate, 500_000.0);
        assert_approx(succession.life_insurance_capital, 400_000.0);
        let cleo_legal = succession
            .inheritances
            .iter()
            .find(|i| i.heir == "Cleo" && i.kind == SuccessionKind::Legal)
            .expect("Cleo inherits");
        assert_approx(cleo_legal.received, 187_500.0);
        assert_approx(cleo_legal.tax, fiscal.legal_succession_tax(187_500.0));
        assert!(succession.tax(SuccessionKind::Legal) > 0.0);
        assert_approx(
            succession.tax(SuccessionKind::LifeInsurance),
            2.0 * fiscal.life_insurance_succession_tax(200_000.0),
        );

        let home = &patrimony.real_estate[0].ownership;
        assert_approx(home.fraction_of("Bob"), 0.0);
        assert_approx(home.fraction_of("Ana"), 0.625);
        assert_approx(home.fraction_of("Cleo"), 0.1875);
        let insurance = &patrimony.free_investments[0].ownership;
        assert_approx(insurance.fraction_of("Dan"), 0.5);
    }
}
