use crate::Evolution::rate_modifiers::RateModificationView;
use crate::Evolution::statistical_equilibrium::EquilibriumSolver;
use crate::Evolution::trajectory::InterpolationMemory;
use crate::Network::net_view::{NetSelector, NetView, Network};
use crate::Network::rate_physics::{MassActionRates, RatePhysics};
use crate::Zone::zone_hooks::ZoneHooks;
use crate::Zone::zone_properties::{S_DTIME, S_RHO, S_T9, ZoneProperties};
use crate::errors::EvolutionError;
use nalgebra::DVector;
use prettytable::{Cell, Row, Table};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// forward and reverse rates, indexed like `Network::reactions()`
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    pub forward: Vec<f64>,
    pub reverse: Vec<f64>,
}

impl RateTable {
    pub fn new(n_reactions: usize) -> Self {
        Self {
            forward: vec![0.0; n_reactions],
            reverse: vec![0.0; n_reactions],
        }
    }
    pub fn get_rates_for_reaction(&self, idx: usize) -> (f64, f64) {
        (self.forward[idx], self.reverse[idx])
    }
    pub fn update_rates_for_reaction(&mut self, idx: usize, forward: f64, reverse: f64) {
        self.forward[idx] = forward;
        self.reverse[idx] = reverse;
    }
}

/// A single thermodynamic point of the calculation. The zone owns its abundances, properties,
/// rates, network views and hooks; nothing about a zone lives in process-wide state.
pub struct Zone {
    label: String,
    network: Arc<Network>,
    abundances: DVector<f64>,       // Y_i over the whole network
    abundance_changes: DVector<f64>, // Y_final - Y_old of the last step
    pub properties: ZoneProperties,
    rates: RateTable,
    base_selector: NetSelector,
    evolution_view: Arc<NetView>, // the "evolution network" role
    view_cache: HashMap<NetSelector, Arc<NetView>>,
    pub hooks: ZoneHooks,
    pub rate_modification_views: Vec<RateModificationView>,
    physics: Arc<dyn RatePhysics + Send + Sync>,
    pub equilibrium: Option<Arc<dyn EquilibriumSolver + Send + Sync>>,
    pub interpolation_memory: Option<InterpolationMemory>,
}

impl fmt::Debug for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Zone")
            .field("label", &self.label)
            .field("abundances", &self.abundances.as_slice())
            .field("properties", &self.properties)
            .field("evolution_view", &self.evolution_view)
            .field("hooks", &self.hooks)
            .field("rate_modification_views", &self.rate_modification_views)
            .finish()
    }
}

impl Zone {
    pub fn new(label: &str, network: Arc<Network>) -> Self {
        let n = network.number_of_species();
        let base_selector = NetSelector::all();
        let evolution_view = Arc::new(NetView::new(&network, &base_selector));
        let mut view_cache = HashMap::new();
        view_cache.insert(base_selector.clone(), Arc::clone(&evolution_view));
        Self {
            label: label.to_string(),
            rates: RateTable::new(network.number_of_reactions()),
            network,
            abundances: DVector::zeros(n),
            abundance_changes: DVector::zeros(n),
            properties: ZoneProperties::new(),
            base_selector,
            evolution_view,
            view_cache,
            hooks: ZoneHooks::default(),
            rate_modification_views: Vec::new(),
            physics: Arc::new(MassActionRates),
            equilibrium: None,
            interpolation_memory: None,
        }
    }
    pub fn with_physics(mut self, physics: Arc<dyn RatePhysics + Send + Sync>) -> Self {
        self.physics = physics;
        self
    }
    pub fn with_equilibrium(mut self, solver: Arc<dyn EquilibriumSolver + Send + Sync>) -> Self {
        self.equilibrium = Some(solver);
        self
    }
    pub fn label(&self) -> &str {
        &self.label
    }
    pub fn network(&self) -> &Arc<Network> {
        &self.network
    }
    pub fn physics(&self) -> Arc<dyn RatePhysics + Send + Sync> {
        Arc::clone(&self.physics)
    }
    /////////////////////////////////ABUNDANCES/////////////////////////////////////////
    pub fn abundances(&self) -> &DVector<f64> {
        &self.abundances
    }
    pub fn abundance_changes(&self) -> &DVector<f64> {
        &self.abundance_changes
    }
    pub fn update_abundances(&mut self, abundances: DVector<f64>) -> Result<(), EvolutionError> {
        if abundances.len() != self.abundances.len() {
            return Err(EvolutionError::Configuration(format!(
                "abundance vector of length {} for a network of {} species",
                abundances.len(),
                self.abundances.len()
            )));
        }
        self.abundances = abundances;
        Ok(())
    }
    pub fn update_abundance_changes(&mut self, changes: DVector<f64>) {
        self.abundance_changes = changes;
    }
    pub fn abundances_mut(&mut self) -> &mut DVector<f64> {
        &mut self.abundances
    }
    pub fn species_index(&self, name: &str) -> Result<usize, EvolutionError> {
        self.network
            .nuc
            .index_of(name)
            .ok_or_else(|| EvolutionError::SpeciesNotFound(name.to_string()))
    }
    pub fn get_abundance(&self, name: &str) -> Result<f64, EvolutionError> {
        Ok(self.abundances[self.species_index(name)?])
    }
    pub fn set_abundance(&mut self, name: &str, y: f64) -> Result<(), EvolutionError> {
        let idx = self.species_index(name)?;
        self.abundances[idx] = y;
        Ok(())
    }
    /// sets Y = X/A
    pub fn set_mass_fraction(&mut self, name: &str, x: f64) -> Result<(), EvolutionError> {
        let idx = self.species_index(name)?;
        let a = self.network.nuc.get(idx).map(|s| s.a).unwrap_or(1).max(1);
        self.abundances[idx] = x / a as f64;
        Ok(())
    }
    /// adds corrections over the given view into the abundances
    pub fn add_to_abundances_in_view(&mut self, view: &NetView, dy: &DVector<f64>) {
        view.scatter_add(dy, &mut self.abundances);
    }
    /// sum of A^n Y
    pub fn compute_a_moment(&self, n: i32) -> f64 {
        self.network
            .nuc
            .iter()
            .zip(self.abundances.iter())
            .map(|(s, y)| (s.a as f64).powi(n) * y)
            .sum()
    }
    /// sum of Z^n Y; n = 1 is the electron fraction Ye
    pub fn compute_z_moment(&self, n: i32) -> f64 {
        self.network
            .nuc
            .iter()
            .zip(self.abundances.iter())
            .map(|(s, y)| (s.z as f64).powi(n) * y)
            .sum()
    }
    /// sum of mass fractions, 1 for a normalized zone
    pub fn mass_fraction_sum(&self) -> f64 {
        self.compute_a_moment(1)
    }
    pub fn normalize_abundances(&mut self) -> Result<(), EvolutionError> {
        let xsum = self.mass_fraction_sum();
        if xsum <= 0.0 {
            return Err(EvolutionError::Configuration(format!(
                "zone {} has no mass to normalize",
                self.label
            )));
        }
        self.abundances /= xsum;
        Ok(())
    }
    /////////////////////////////////RATES/////////////////////////////////////////
    pub fn rates(&self) -> &RateTable {
        &self.rates
    }
    pub fn rates_mut(&mut self) -> &mut RateTable {
        &mut self.rates
    }
    /////////////////////////////////VIEWS/////////////////////////////////////////
    pub fn evolution_view(&self) -> Arc<NetView> {
        Arc::clone(&self.evolution_view)
    }
    /// publishes a new evolution network; the previous view stays valid for whoever still holds it
    pub fn set_evolution_view(&mut self, view: NetView) {
        self.evolution_view = Arc::new(view);
    }
    pub fn base_selector(&self) -> &NetSelector {
        &self.base_selector
    }
    /// changes the base (full allowed) network and resets the evolution network to it
    pub fn set_base_evolution_selector(&mut self, selector: NetSelector) {
        self.base_selector = selector;
        self.evolution_view = self.base_view();
    }
    pub fn base_view(&mut self) -> Arc<NetView> {
        let selector = self.base_selector.clone();
        self.get_net_view(&selector)
    }
    /// cached view for the selector, built on first use
    pub fn get_net_view(&mut self, selector: &NetSelector) -> Arc<NetView> {
        if let Some(view) = self.view_cache.get(selector) {
            return Arc::clone(view);
        }
        let view = Arc::new(NetView::new(&self.network, selector));
        self.view_cache.insert(selector.clone(), Arc::clone(&view));
        view
    }
    /////////////////////////////////THERMODYNAMICS/////////////////////////////////////////
    pub fn t9(&self) -> Result<f64, EvolutionError> {
        self.properties.get_f64(S_T9)
    }
    pub fn rho(&self) -> Result<f64, EvolutionError> {
        self.properties.get_f64(S_RHO)
    }
    pub fn dt(&self) -> Result<f64, EvolutionError> {
        self.properties.get_f64(S_DTIME)
    }
    /// Proposes the next timestep: grows dt by (1 + regt) but lets no species with Y > ymin change
    /// by more than a fraction regy of itself over the step.
    pub fn update_time_step(&self, dt: f64, regt: f64, regy: f64, ymin: f64) -> f64 {
        let mut dt_new = (1.0 + regt) * dt;
        for (y, dy) in self.abundances.iter().zip(self.abundance_changes.iter()) {
            if *y > ymin && *dy != 0.0 {
                let dt_species = regy * dt * (y / (dy.abs() + 1.0e-300));
                if dt_species < dt_new {
                    dt_new = dt_species;
                }
            }
        }
        dt_new
    }
    /////////////////////////////////OUTPUT/////////////////////////////////////////
    pub fn abundance_table(&self, min_abundance: f64) -> Table {
        let mut table = Table::new();
        table.add_row(Row::new(vec![
            Cell::new("species"),
            Cell::new("Z"),
            Cell::new("A"),
            Cell::new("Y"),
            Cell::new("X"),
        ]));
        for (s, y) in self.network.nuc.iter().zip(self.abundances.iter()) {
            if y.abs() < min_abundance {
                continue;
            }
            table.add_row(Row::new(vec![
                Cell::new(&s.name),
                Cell::new(&s.z.to_string()),
                Cell::new(&s.a.to_string()),
                Cell::new(&format!("{:.6e}", y)),
                Cell::new(&format!("{:.6e}", s.a as f64 * y)),
            ]));
        }
        table
    }
    pub fn pretty_print_abundances(&self, min_abundance: f64) {
        println!("zone {}:", self.label);
        self.abundance_table(min_abundance).printstd();
    }
}
