//! Typed key-value store of zone properties. A key is a property name optionally qualified by up to
//! two tags; a value is a number or a text flag. Property names used by the engine are collected here.
use crate::errors::EvolutionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/////////////////////////////////PROPERTY NAMES/////////////////////////////////////////
pub const S_T9: &str = "t9";
pub const S_RHO: &str = "rho";
pub const S_TIME: &str = "time";
pub const S_DTIME: &str = "dt";
pub const S_STEPS: &str = "steps";
pub const S_T9_0: &str = "t9_0";
pub const S_RHO_0: &str = "rho_0";
pub const S_TAU: &str = "tau";
pub const S_YE: &str = "Ye";
pub const S_NSE_T9_CEILING: &str = "nse t9 ceiling";
// Newton-Raphson
pub const S_NEWTON_RAPHSON_CONVERGE: &str = "newton raphson convergence";
pub const S_NEWTON_RAPHSON_ABUNDANCE: &str = "newton raphson abundance";
pub const S_NEWTON_RAPHSON_MAX_ITERATIONS: &str = "newton raphson max iterations";
pub const S_NEWTON_RAPHSON_METRIC: &str = "newton raphson metric";
pub const S_LARGE_NEG_ABUND_THRESHOLD: &str = "large negative abundances threshold";
// rates
pub const S_SMALL_RATES_THRESHOLD: &str = "small rates threshold";
pub const S_WEAK_DETAILED_BALANCE: &str = "weak detailed balance";
pub const S_EVOLVE_NSE_PLUS_WEAK_RATES: &str = "evolve nse plus weak rates";
// linear solvers
pub const S_SOLVER: &str = "solver";
pub const S_ARROW: &str = "arrow";
pub const S_ARROW_WIDTH: &str = "arrow width";
pub const S_ITER_SOLVER: &str = "iterative solver method";
pub const S_ITER_SOLVER_T9: &str = "iterative solver t9";
pub const S_ITER_SOLVER_MAX_ITERATIONS: &str = "iterative solver max iterations";
pub const S_ITER_SOLVER_REL_TOL: &str = "iterative solver rel tol";
pub const S_ITER_SOLVER_ABS_TOL: &str = "iterative solver abs tol";
pub const S_ITER_SOLVER_CONVERGENCE_METHOD: &str = "iterative solver convergence method";
pub const S_ITER_SOLVER_DEBUG: &str = "iterative solver debug";
pub const S_ILU_DELTA: &str = "ilu delta";
pub const S_ILU_DROP_TOL: &str = "ilu drop tolerance";
pub const S_GMRES_RESTART: &str = "gmres restart";
// species pinning
pub const S_SPECIFIC_SPECIES: &str = "specific species";
pub const S_SPECIFIC_ABUNDANCE: &str = "specific abundance";
// step control
pub const S_SAFE_EVOLVE_FLOOR_POLICY: &str = "safe evolve floor policy";
// promotes fallback and floor messages from debug to info/warn
pub const S_DEBUG: &str = "debug";

/// name plus up to two tags
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyKey {
    pub name: String,
    pub tag1: Option<String>,
    pub tag2: Option<String>,
}

impl PropertyKey {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tag1: None,
            tag2: None,
        }
    }
    pub fn tagged(name: &str, tag1: &str, tag2: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            tag1: Some(tag1.to_string()),
            tag2: tag2.map(|t| t.to_string()),
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(t) = &self.tag1 {
            write!(f, "[{}]", t)?;
        }
        if let Some(t) = &self.tag2 {
            write!(f, "[{}]", t)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Number(x) => write!(f, "{}", x),
            PropertyValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(x: f64) -> Self {
        PropertyValue::Number(x)
    }
}
impl From<usize> for PropertyValue {
    fn from(x: usize) -> Self {
        PropertyValue::Number(x as f64)
    }
}
impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_string())
    }
}
impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Text(s)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ZoneProperties {
    map: BTreeMap<PropertyKey, PropertyValue>,
}

impl ZoneProperties {
    pub fn new() -> Self {
        Self::default()
    }
    /////////////////////////////////SETTERS/////////////////////////////////////////
    pub fn update_property(&mut self, name: &str, value: impl Into<PropertyValue>) {
        self.map.insert(PropertyKey::new(name), value.into());
    }
    pub fn update_tagged_property(
        &mut self,
        name: &str,
        tag1: &str,
        tag2: Option<&str>,
        value: impl Into<PropertyValue>,
    ) {
        self.map
            .insert(PropertyKey::tagged(name, tag1, tag2), value.into());
    }
    pub fn remove_property(&mut self, name: &str) -> Option<PropertyValue> {
        self.map.remove(&PropertyKey::new(name))
    }
    /////////////////////////////////GETTERS/////////////////////////////////////////
    pub fn has_property(&self, name: &str) -> bool {
        self.map.contains_key(&PropertyKey::new(name))
    }
    pub fn get(&self, key: &PropertyKey) -> Option<&PropertyValue> {
        self.map.get(key)
    }
    pub fn get_value(&self, name: &str) -> Option<&PropertyValue> {
        self.map.get(&PropertyKey::new(name))
    }
    pub fn get_f64(&self, name: &str) -> Result<f64, EvolutionError> {
        match self.get_value(name) {
            Some(value) => value_to_f64(name, value),
            None => Err(EvolutionError::MissingProperty(name.to_string())),
        }
    }
    pub fn get_f64_or(&self, name: &str, default: f64) -> Result<f64, EvolutionError> {
        match self.get_value(name) {
            Some(value) => value_to_f64(name, value),
            None => Ok(default),
        }
    }
    pub fn get_optional_f64(&self, name: &str) -> Result<Option<f64>, EvolutionError> {
        self.get_value(name)
            .map(|value| value_to_f64(name, value))
            .transpose()
    }
    pub fn get_usize_or(&self, name: &str, default: usize) -> Result<usize, EvolutionError> {
        match self.get_value(name) {
            Some(value) => {
                let x = value_to_f64(name, value)?;
                if x < 0.0 || x.fract() != 0.0 {
                    return Err(EvolutionError::InvalidProperty {
                        name: name.to_string(),
                        value: value.to_string(),
                    });
                }
                Ok(x as usize)
            }
            None => Ok(default),
        }
    }
    pub fn get_string(&self, name: &str) -> Option<String> {
        self.get_value(name).map(|v| v.to_string())
    }
    /// true when the property is set to "yes" or "true"
    pub fn is_flag_set(&self, name: &str) -> bool {
        matches!(
            self.get_string(name).as_deref(),
            Some("yes") | Some("true") | Some("1")
        )
    }
    pub fn iter(&self) -> impl Iterator<Item = (&PropertyKey, &PropertyValue)> {
        self.map.iter()
    }
    pub fn len(&self) -> usize {
        self.map.len()
    }
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn value_to_f64(name: &str, value: &PropertyValue) -> Result<f64, EvolutionError> {
    match value {
        PropertyValue::Number(x) => Ok(*x),
        PropertyValue::Text(s) => s.trim().parse::<f64>().map_err(|_| {
            EvolutionError::InvalidProperty {
                name: name.to_string(),
                value: s.clone(),
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_numbers_and_text() {
        let mut props = ZoneProperties::new();
        props.update_property(S_T9, 2.5);
        props.update_property(S_RHO, "1.e5");
        props.update_property(S_SOLVER, S_ARROW);
        assert_relative_eq!(props.get_f64(S_T9).unwrap(), 2.5);
        assert_relative_eq!(props.get_f64(S_RHO).unwrap(), 1.0e5);
        assert_eq!(props.get_string(S_SOLVER).unwrap(), "arrow");
        assert!(matches!(
            props.get_f64(S_SOLVER),
            Err(EvolutionError::InvalidProperty { .. })
        ));
        assert!(matches!(
            props.get_f64(S_TIME),
            Err(EvolutionError::MissingProperty(_))
        ));
        assert_relative_eq!(props.get_f64_or(S_TIME, 3.0).unwrap(), 3.0);
    }

    #[test]
    fn test_usize_and_flags() {
        let mut props = ZoneProperties::new();
        props.update_property(S_ARROW_WIDTH, "3");
        props.update_property(S_WEAK_DETAILED_BALANCE, "yes");
        props.update_property(S_ILU_DELTA, 1.5);
        assert_eq!(props.get_usize_or(S_ARROW_WIDTH, 1).unwrap(), 3);
        assert!(props.get_usize_or(S_ILU_DELTA, 1).is_err());
        assert!(props.is_flag_set(S_WEAK_DETAILED_BALANCE));
        assert!(!props.is_flag_set(S_EVOLVE_NSE_PLUS_WEAK_RATES));
    }

    #[test]
    fn test_tagged_keys_are_distinct() {
        let mut props = ZoneProperties::new();
        props.update_property("factor", 1.0);
        props.update_tagged_property("factor", "view 1", None, 2.0);
        props.update_tagged_property("factor", "view 1", Some("forward"), 3.0);
        assert_eq!(props.len(), 3);
        let key = PropertyKey::tagged("factor", "view 1", Some("forward"));
        assert_eq!(props.get(&key), Some(&PropertyValue::Number(3.0)));
        assert_eq!(key.to_string(), "factor[view 1][forward]");
    }
}
