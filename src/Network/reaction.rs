use crate::Network::species::SpeciesCollection;
use crate::errors::EvolutionError;
use RustedSciThe::symbolic::symbolic_engine::Expr;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// reaction elements that are not nuclides; they take part in reactions but are never evolved
pub const NON_NUCLIDES: [&str; 9] = [
    "electron",
    "positron",
    "neutrino_e",
    "anti-neutrino_e",
    "neutrino_mu",
    "anti-neutrino_mu",
    "neutrino_tau",
    "anti-neutrino_tau",
    "gamma",
];

pub fn is_nuclide_name(name: &str) -> bool {
    !NON_NUCLIDES.contains(&name)
}

/// temperature dependence of a rate coefficient, T9 is the temperature in 10^9 K
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RateLaw {
    Constant(f64),
    /// sum over sets of exp(a0 + a1/T9 + a2 T9^(-1/3) + a3 T9^(1/3) + a4 T9 + a5 T9^(5/3) + a6 ln T9)
    Reaclib(Vec<[f64; 7]>),
    /// a T9^n exp(-e9/T9)
    Arrhenius { a: f64, n: f64, e9: f64 },
    /// symbolic expression of the single variable T9
    #[serde(skip)]
    Symbolic(Expr),
}

impl RateLaw {
    pub fn evaluate(&self, t9: f64) -> f64 {
        match self {
            RateLaw::Constant(k) => *k,
            RateLaw::Reaclib(sets) => sets
                .iter()
                .map(|a| {
                    let t913 = t9.powf(1.0 / 3.0);
                    (a[0]
                        + a[1] / t9
                        + a[2] / t913
                        + a[3] * t913
                        + a[4] * t9
                        + a[5] * t9.powf(5.0 / 3.0)
                        + a[6] * t9.ln())
                    .exp()
                })
                .sum(),
            RateLaw::Arrhenius { a, n, e9 } => a * t9.powf(*n) * (-e9 / t9).exp(),
            RateLaw::Symbolic(expr) => expr.clone().lambdify1D()(t9),
        }
    }
    /// the same law as a symbolic expression of `t9`
    pub fn rate_expr(&self, t9: Expr) -> Expr {
        match self {
            RateLaw::Constant(k) => Expr::Const(*k),
            RateLaw::Arrhenius { a, n, e9 } => {
                let k0 = Expr::Const(*a) * t9.clone().pow(Expr::Const(*n));
                k0 * (-Expr::Const(*e9) / t9).exp()
            }
            RateLaw::Reaclib(sets) => {
                let mut total = Expr::Const(0.0);
                for a in sets {
                    let exponent = Expr::Const(a[0])
                        + Expr::Const(a[1]) / t9.clone()
                        + Expr::Const(a[2]) * t9.clone().pow(Expr::Const(-1.0 / 3.0))
                        + Expr::Const(a[3]) * t9.clone().pow(Expr::Const(1.0 / 3.0))
                        + Expr::Const(a[4]) * t9.clone()
                        + Expr::Const(a[5]) * t9.clone().pow(Expr::Const(5.0 / 3.0));
                    // exp(a6 ln T9) = T9^a6
                    total = total + exponent.exp() * t9.clone().pow(Expr::Const(a[6]));
                }
                total
            }
            RateLaw::Symbolic(expr) => expr.clone(),
        }
    }
}

/// a reaction of the network. Reactant and product lists may contain non-nuclides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub label: String,
    pub reactants: Vec<String>,
    pub products: Vec<String>,
    pub forward: RateLaw,
    #[serde(default)]
    pub reverse: Option<RateLaw>,
    #[serde(default)]
    pub q_value: Option<f64>, // MeV, used for weak detailed balance
}

impl Reaction {
    pub fn new(label: &str, reactants: &[&str], products: &[&str], forward: RateLaw) -> Self {
        Self {
            label: label.to_string(),
            reactants: reactants.iter().map(|s| s.to_string()).collect(),
            products: products.iter().map(|s| s.to_string()).collect(),
            forward,
            reverse: None,
            q_value: None,
        }
    }
    pub fn with_reverse(mut self, reverse: RateLaw) -> Self {
        self.reverse = Some(reverse);
        self
    }
    pub fn with_q_value(mut self, q: f64) -> Self {
        self.q_value = Some(q);
        self
    }
    pub fn nuclide_reactants(&self) -> impl Iterator<Item = &String> {
        self.reactants.iter().filter(|s| is_nuclide_name(s))
    }
    pub fn nuclide_products(&self) -> impl Iterator<Item = &String> {
        self.products.iter().filter(|s| is_nuclide_name(s))
    }
    /// all nuclides of the reaction, reactants first, with repetitions
    pub fn nuclides(&self) -> impl Iterator<Item = &String> {
        self.nuclide_reactants().chain(self.nuclide_products())
    }
    /// net change of nuclide charge, products minus reactants
    pub fn charge_change(&self, nuc: &SpeciesCollection) -> Result<i64, EvolutionError> {
        let mut dz: i64 = 0;
        for name in self.nuclide_products() {
            dz += species_z(nuc, name)? as i64;
        }
        for name in self.nuclide_reactants() {
            dz -= species_z(nuc, name)? as i64;
        }
        Ok(dz)
    }
    /// weak reactions change the total nuclide charge
    pub fn is_weak(&self, nuc: &SpeciesCollection) -> Result<bool, EvolutionError> {
        Ok(self.charge_change(nuc)? != 0)
    }
    /// product of factorials of repeated nuclide reactants
    pub fn reactant_duplicate_factor(&self) -> f64 {
        duplicate_factor(self.nuclide_reactants())
    }
    pub fn product_duplicate_factor(&self) -> f64 {
        duplicate_factor(self.nuclide_products())
    }
    /// "c12 + he4 -> o16 + gamma"
    pub fn string(&self) -> String {
        format!("{} -> {}", self.reactants.join(" + "), self.products.join(" + "))
    }
}

fn species_z(nuc: &SpeciesCollection, name: &str) -> Result<u32, EvolutionError> {
    nuc.by_name(name)
        .map(|s| s.z)
        .ok_or_else(|| EvolutionError::SpeciesNotFound(name.to_string()))
}

fn duplicate_factor<'a>(names: impl Iterator<Item = &'a String>) -> f64 {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for name in names {
        *counts.entry(name.as_str()).or_insert(0) += 1;
    }
    counts
        .values()
        .map(|&m| (1..=m).map(|k| k as f64).product::<f64>())
        .product()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Network::species::Species;
    use approx::assert_relative_eq;

    fn nuc() -> SpeciesCollection {
        let mut nuc = SpeciesCollection::new();
        for name in ["n", "h1", "he4", "c12", "o16"] {
            nuc.add(Species::from_name(name).unwrap());
        }
        nuc
    }

    #[test]
    fn test_triple_alpha_duplicate_factor() {
        let r = Reaction::new(
            "3a",
            &["he4", "he4", "he4"],
            &["c12", "gamma"],
            RateLaw::Constant(1.0),
        );
        assert_relative_eq!(r.reactant_duplicate_factor(), 6.0);
        assert_relative_eq!(r.product_duplicate_factor(), 1.0);
        assert_eq!(r.nuclide_products().count(), 1);
        assert!(!r.is_weak(&nuc()).unwrap());
    }

    #[test]
    fn test_neutron_decay_is_weak() {
        let r = Reaction::new(
            "n decay",
            &["n"],
            &["h1", "electron", "anti-neutrino_e"],
            RateLaw::Constant(1.0 / 880.0),
        );
        assert_eq!(r.charge_change(&nuc()).unwrap(), 1);
        assert!(r.is_weak(&nuc()).unwrap());
        assert_eq!(r.string(), "n -> h1 + electron + anti-neutrino_e");
    }

    #[test]
    fn test_rate_laws() {
        let arr = RateLaw::Arrhenius { a: 2.0, n: 1.0, e9: 1.0 };
        assert_relative_eq!(arr.evaluate(1.0), 2.0 * (-1.0f64).exp(), epsilon = 1e-14);
        let reaclib = RateLaw::Reaclib(vec![[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]; 2]);
        assert_relative_eq!(reaclib.evaluate(3.0), 2.0 * 1.0f64.exp(), epsilon = 1e-12);
        let with_log = RateLaw::Reaclib(vec![[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 2.0]]);
        assert_relative_eq!(with_log.evaluate(3.0), 9.0, epsilon = 1e-12);
    }

    #[test]
    fn test_symbolic_rate_law_matches_numeric() {
        let t9 = Expr::Var("T9".to_owned());
        let arr = RateLaw::Arrhenius { a: 3.0, n: 0.5, e9: 2.0 };
        let sym = RateLaw::Symbolic(arr.rate_expr(t9));
        assert_relative_eq!(sym.evaluate(1.7), arr.evaluate(1.7), epsilon = 1e-10);
    }
}
