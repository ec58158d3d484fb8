//! Loading networks, zones and trajectories from JSON.
//!
//! Each object can be read from its own JSON file or from a task file where several JSON bodies
//! follow upper-case section headers:
//! ```text
//! NETWORK
//! { "species": ["he4", "c12", {"name": "o16", "z": 8, "a": 16, "mass_excess": -4.737}],
//!   "reactions": [ ... ] }
//! ZONES
//! [ { "label": "0", "mass_fractions": {"he4": 1.0}, "properties": {"t9_0": 2.0} } ]
//! TRAJECTORY
//! { "time": [...], "t9": [...], "log10_rho": [...] }
//! ```
//! A section ends at the next header line (upper-case letters and underscores only) or at the end
//! of the file.
use crate::Evolution::rate_modifiers::RateModificationView;
use crate::Evolution::trajectory::Trajectory;
use crate::Network::net_view::{NetSelector, Network};
use crate::Network::reaction::Reaction;
use crate::Network::species::Species;
use crate::Zone::nuc_zone::Zone;
use crate::Zone::zone_properties::PropertyValue;
use crate::errors::EvolutionError;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

pub const S_NETWORK_SECTION: &str = "NETWORK";
pub const S_ZONES_SECTION: &str = "ZONES";
pub const S_TRAJECTORY_SECTION: &str = "TRAJECTORY";

/// a species given by name only ("he4") or in full
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpeciesEntry {
    Name(String),
    Full(Species),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkData {
    pub species: Vec<SpeciesEntry>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

impl NetworkData {
    pub fn into_network(self) -> Result<Network, EvolutionError> {
        let mut network = Network::new();
        for entry in self.species {
            let species = match entry {
                SpeciesEntry::Name(name) => Species::from_name(&name)?,
                SpeciesEntry::Full(species) => species,
            };
            network.add_species(species);
        }
        for reaction in self.reactions {
            network.add_reaction(reaction)?;
        }
        Ok(network)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggedProperty {
    pub name: String,
    pub tag1: String,
    #[serde(default)]
    pub tag2: Option<String>,
    pub value: PropertyValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneData {
    pub label: String,
    #[serde(default)]
    pub mass_fractions: BTreeMap<String, f64>,
    #[serde(default)]
    pub abundances: BTreeMap<String, f64>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
    #[serde(default)]
    pub tagged_properties: Vec<TaggedProperty>,
    #[serde(default)]
    pub base_selector: Option<NetSelector>,
    #[serde(default)]
    pub rate_modifications: Vec<RateModificationView>,
}

impl ZoneData {
    pub fn into_zone(self, network: Arc<Network>) -> Result<Zone, EvolutionError> {
        let mut zone = Zone::new(&self.label, network);
        for (name, y) in &self.abundances {
            zone.set_abundance(name, *y)?;
        }
        for (name, x) in &self.mass_fractions {
            zone.set_mass_fraction(name, *x)?;
        }
        for (name, value) in self.properties {
            zone.properties.update_property(&name, value);
        }
        for p in self.tagged_properties {
            zone.properties
                .update_tagged_property(&p.name, &p.tag1, p.tag2.as_deref(), p.value);
        }
        if let Some(selector) = self.base_selector {
            zone.set_base_evolution_selector(selector);
        }
        zone.rate_modification_views = self.rate_modifications;
        if zone.mass_fraction_sum() == 0.0 {
            warn!("zone '{}' was loaded without any abundance", zone.label());
        }
        Ok(zone)
    }
}

/// everything a task file can hold
#[derive(Debug)]
pub struct EvolutionTask {
    pub network: Arc<Network>,
    pub zones: Vec<Zone>,
    pub trajectory: Option<Trajectory>,
}

fn read_lines(file_name: &str) -> Result<Vec<String>, EvolutionError> {
    let path = Path::new(file_name);
    if !path.exists() {
        return Err(EvolutionError::Configuration(format!(
            "File '{}' does not exist",
            file_name
        )));
    }
    let reader = BufReader::new(File::open(path)?);
    Ok(reader.lines().collect::<Result<Vec<_>, _>>()?)
}

fn is_header(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c.is_uppercase() || c == '_')
}

/// Parses the JSON body below `header`. `Ok(None)` when the file has no such section; a JSON error
/// is logged with the offending line of the file and a pointer to the column.
pub fn load_section<T: DeserializeOwned>(
    file_name: &str,
    header: &str,
) -> Result<Option<T>, EvolutionError> {
    let lines = read_lines(file_name)?;
    let start_index = match lines
        .iter()
        .position(|line| line.trim().to_uppercase() == header)
    {
        Some(i) => i + 1,
        None => return Ok(None),
    };
    let end_index = (start_index..lines.len())
        .find(|&i| is_header(&lines[i]))
        .unwrap_or(lines.len());
    let section = lines[start_index..end_index].join("\n");

    match serde_json::from_str(&section) {
        Ok(data) => {
            info!("Parsed section '{}' of file '{}'", header, file_name);
            Ok(Some(data))
        }
        Err(e) => {
            let actual_line = start_index + e.line().saturating_sub(1);
            error!(
                "Error parsing section '{}' at line {}, column {} (line {} in file)",
                header,
                e.line(),
                e.column(),
                actual_line + 1
            );
            if let Some(problem_line) = lines.get(actual_line) {
                error!("Problematic line: {}", problem_line);
                if e.column() >= 1 && e.column() <= problem_line.len() {
                    error!("{}^", " ".repeat(e.column() - 1));
                }
            }
            Err(e.into())
        }
    }
}

fn required_section<T: DeserializeOwned>(file_name: &str, header: &str) -> Result<T, EvolutionError> {
    load_section(file_name, header)?.ok_or_else(|| {
        EvolutionError::Configuration(format!(
            "No '{}' header found in file '{}'",
            header, file_name
        ))
    })
}

/// network, zones and optional trajectory from a sectioned task file
pub fn load_task(file_name: &str) -> Result<EvolutionTask, EvolutionError> {
    let network_data: NetworkData = required_section(file_name, S_NETWORK_SECTION)?;
    let network = Arc::new(network_data.into_network()?);
    let zone_data: Vec<ZoneData> = required_section(file_name, S_ZONES_SECTION)?;
    let zones = zone_data
        .into_iter()
        .map(|z| z.into_zone(Arc::clone(&network)))
        .collect::<Result<Vec<_>, _>>()?;
    let trajectory: Option<Trajectory> = load_section(file_name, S_TRAJECTORY_SECTION)?;
    if let Some(trajectory) = &trajectory {
        trajectory.validate()?;
    }
    info!(
        "Loaded task '{}': {} species, {} reactions, {} zones",
        file_name,
        network.number_of_species(),
        network.number_of_reactions(),
        zones.len()
    );
    Ok(EvolutionTask {
        network,
        zones,
        trajectory,
    })
}

/////////////////////////////////PLAIN JSON FILES/////////////////////////////////////////
fn load_json<T: DeserializeOwned>(file_name: &str) -> Result<T, EvolutionError> {
    let reader = BufReader::new(File::open(file_name)?);
    Ok(serde_json::from_reader(reader)?)
}

pub fn load_network_from_json(file_name: &str) -> Result<Network, EvolutionError> {
    load_json::<NetworkData>(file_name)?.into_network()
}

pub fn load_zones_from_json(
    file_name: &str,
    network: Arc<Network>,
) -> Result<Vec<Zone>, EvolutionError> {
    load_json::<Vec<ZoneData>>(file_name)?
        .into_iter()
        .map(|z| z.into_zone(Arc::clone(&network)))
        .collect()
}

pub fn load_rate_modifications_from_json(
    file_name: &str,
) -> Result<Vec<RateModificationView>, EvolutionError> {
    load_json(file_name)
}

pub fn load_trajectory_from_json(file_name: &str) -> Result<Trajectory, EvolutionError> {
    let trajectory: Trajectory = load_json(file_name)?;
    trajectory.validate()?;
    Ok(trajectory)
}
