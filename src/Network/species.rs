use crate::errors::EvolutionError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// mass excess of the neutron, MeV
pub const NEUTRON_MASS_EXCESS: f64 = 8.071_317;
/// mass excess of the proton (h1), MeV
pub const PROTON_MASS_EXCESS: f64 = 7.288_971;

/// chemical symbols in lowercase, indexed by Z (index 0 is the neutron)
const ELEMENTS: [&str; 119] = [
    "n", "h", "he", "li", "be", "b", "c", "n", "o", "f", "ne", "na", "mg", "al", "si", "p", "s",
    "cl", "ar", "k", "ca", "sc", "ti", "v", "cr", "mn", "fe", "co", "ni", "cu", "zn", "ga", "ge",
    "as", "se", "br", "kr", "rb", "sr", "y", "zr", "nb", "mo", "tc", "ru", "rh", "pd", "ag", "cd",
    "in", "sn", "sb", "te", "i", "xe", "cs", "ba", "la", "ce", "pr", "nd", "pm", "sm", "eu", "gd",
    "tb", "dy", "ho", "er", "tm", "yb", "lu", "hf", "ta", "w", "re", "os", "ir", "pt", "au", "hg",
    "tl", "pb", "bi", "po", "at", "rn", "fr", "ra", "ac", "th", "pa", "u", "np", "pu", "am", "cm",
    "bk", "cf", "es", "fm", "md", "no", "lr", "rf", "db", "sg", "bh", "hs", "mt", "ds", "rg", "cn",
    "nh", "fl", "mc", "lv", "ts", "og",
];

/// a nuclide tracked by the network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub name: String,
    pub z: u32,
    pub a: u32,
    #[serde(default)]
    pub mass_excess: f64, // MeV
    #[serde(default)]
    pub spin: f64, // ground state spin
}

impl Species {
    pub fn new(name: &str, z: u32, a: u32, mass_excess: f64, spin: f64) -> Self {
        Self {
            name: name.to_string(),
            z,
            a,
            mass_excess,
            spin,
        }
    }
    /// builds a species from a name like "he4", "fe56" or "n"; mass excess and spin are left at zero
    pub fn from_name(name: &str) -> Result<Self, EvolutionError> {
        let (z, a) = parse_species_name(name)?;
        Ok(Self::new(name, z, a, 0.0, 0.0))
    }
    pub fn n(&self) -> u32 {
        self.a - self.z
    }
    /// binding energy in MeV from the mass excess
    pub fn binding_energy(&self) -> f64 {
        self.z as f64 * PROTON_MASS_EXCESS + self.n() as f64 * NEUTRON_MASS_EXCESS
            - self.mass_excess
    }
    /// ground state statistical weight 2J+1
    pub fn statistical_weight(&self) -> f64 {
        2.0 * self.spin + 1.0
    }
}

/// lowercase chemical symbol of element Z (Z >= 1)
pub fn element_symbol(z: u32) -> Option<&'static str> {
    if z == 0 {
        return None;
    }
    ELEMENTS.get(z as usize).copied()
}

/// splits "fe56" into (26, 56); "n" is the neutron
pub fn parse_species_name(name: &str) -> Result<(u32, u32), EvolutionError> {
    let lowered = name.trim().to_lowercase();
    if lowered == "n" {
        return Ok((0, 1));
    }
    let re = Regex::new(r"^([a-z]{1,2})(\d+)$").map_err(|e| {
        EvolutionError::Configuration(format!("species name pattern failed to compile: {}", e))
    })?;
    let caps = re
        .captures(&lowered)
        .ok_or_else(|| EvolutionError::SpeciesNotFound(name.to_string()))?;
    let symbol = &caps[1];
    let a: u32 = caps[2]
        .parse()
        .map_err(|_| EvolutionError::SpeciesNotFound(name.to_string()))?;
    // index 0 is the neutron, "n" as a symbol with digits means nitrogen
    let z = ELEMENTS
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, s)| **s == symbol)
        .map(|(z, _)| z as u32)
        .ok_or_else(|| EvolutionError::SpeciesNotFound(name.to_string()))?;
    if a < z {
        return Err(EvolutionError::SpeciesNotFound(name.to_string()));
    }
    Ok((z, a))
}

/// ordered catalog of species with lookup by name
#[derive(Debug, Clone, Default)]
pub struct SpeciesCollection {
    species: Vec<Species>,
    by_name: HashMap<String, usize>,
}

impl SpeciesCollection {
    pub fn new() -> Self {
        Self::default()
    }
    /// adds a species and returns its index; a species already in the catalog keeps its index
    pub fn add(&mut self, species: Species) -> usize {
        if let Some(&idx) = self.by_name.get(&species.name) {
            return idx;
        }
        let idx = self.species.len();
        self.by_name.insert(species.name.clone(), idx);
        self.species.push(species);
        idx
    }
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }
    pub fn get(&self, idx: usize) -> Option<&Species> {
        self.species.get(idx)
    }
    pub fn by_name(&self, name: &str) -> Option<&Species> {
        self.index_of(name).and_then(|i| self.species.get(i))
    }
    pub fn len(&self) -> usize {
        self.species.len()
    }
    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &Species> {
        self.species.iter()
    }
}
