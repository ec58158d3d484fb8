use crate::Network::reaction::Reaction;
use crate::Network::species::{Species, SpeciesCollection};
use crate::errors::EvolutionError;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// full catalog of species and reactions. Shared read-only between zones
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub nuc: SpeciesCollection,
    reactions: Vec<Reaction>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn add_species(&mut self, species: Species) -> usize {
        self.nuc.add(species)
    }
    /// adds a reaction; every nuclide it mentions must already be in the species catalog
    pub fn add_reaction(&mut self, reaction: Reaction) -> Result<usize, EvolutionError> {
        if let Some(missing) = reaction.nuclides().find(|s| self.nuc.index_of(s).is_none()) {
            return Err(EvolutionError::SpeciesNotFound(format!(
                "{} (reaction {})",
                missing, reaction.label
            )));
        }
        self.reactions.push(reaction);
        Ok(self.reactions.len() - 1)
    }
    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }
    pub fn reaction(&self, idx: usize) -> Option<&Reaction> {
        self.reactions.get(idx)
    }
    pub fn reaction_index(&self, label: &str) -> Option<usize> {
        self.reactions.iter().position(|r| r.label == label)
    }
    pub fn number_of_species(&self) -> usize {
        self.nuc.len()
    }
    pub fn number_of_reactions(&self) -> usize {
        self.reactions.len()
    }
}

/// species selection predicate
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpeciesFilter {
    #[default]
    All,
    ZRange { min: u32, max: u32 },
    ARange { min: u32, max: u32 },
    Names(Vec<String>),
    Not(Box<SpeciesFilter>),
    AllOf(Vec<SpeciesFilter>),
    AnyOf(Vec<SpeciesFilter>),
}

impl SpeciesFilter {
    pub fn matches(&self, species: &Species) -> bool {
        match self {
            SpeciesFilter::All => true,
            SpeciesFilter::ZRange { min, max } => species.z >= *min && species.z <= *max,
            SpeciesFilter::ARange { min, max } => species.a >= *min && species.a <= *max,
            SpeciesFilter::Names(names) => names.iter().any(|n| *n == species.name),
            SpeciesFilter::Not(inner) => !inner.matches(species),
            SpeciesFilter::AllOf(filters) => filters.iter().all(|f| f.matches(species)),
            SpeciesFilter::AnyOf(filters) => filters.iter().any(|f| f.matches(species)),
        }
    }
}

/// reaction selection predicate
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReactionFilter {
    #[default]
    All,
    Weak,
    Strong,
    Labels(Vec<String>),
    HasReactant(String),
    HasProduct(String),
    Not(Box<ReactionFilter>),
    AllOf(Vec<ReactionFilter>),
    AnyOf(Vec<ReactionFilter>),
}

impl ReactionFilter {
    pub fn matches(&self, reaction: &Reaction, nuc: &SpeciesCollection) -> bool {
        match self {
            ReactionFilter::All => true,
            // reactions with unknown species never reach the network, see Network::add_reaction
            ReactionFilter::Weak => reaction.is_weak(nuc).unwrap_or(false),
            ReactionFilter::Strong => !reaction.is_weak(nuc).unwrap_or(true),
            ReactionFilter::Labels(labels) => labels.iter().any(|l| *l == reaction.label),
            ReactionFilter::HasReactant(name) => reaction.reactants.iter().any(|r| r == name),
            ReactionFilter::HasProduct(name) => reaction.products.iter().any(|p| p == name),
            ReactionFilter::Not(inner) => !inner.matches(reaction, nuc),
            ReactionFilter::AllOf(filters) => filters.iter().all(|f| f.matches(reaction, nuc)),
            ReactionFilter::AnyOf(filters) => filters.iter().any(|f| f.matches(reaction, nuc)),
        }
    }
}

/// pair of predicates defining a view; also the key of the per-zone view cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetSelector {
    #[serde(default)]
    pub species: SpeciesFilter,
    #[serde(default)]
    pub reactions: ReactionFilter,
}

impl NetSelector {
    pub fn new(species: SpeciesFilter, reactions: ReactionFilter) -> Self {
        Self { species, reactions }
    }
    pub fn all() -> Self {
        Self::default()
    }
}

/// filtered subset of a network. Indices refer to the parent `Network`.
/// Published views are shared as `Arc<NetView>` and never mutated; reductions work on a copy.
#[derive(Debug, Clone, PartialEq)]
pub struct NetView {
    species: Vec<usize>,            // network species indices in view order
    positions: Vec<Option<usize>>,  // network species index -> position in the view
    reactions: Vec<usize>,          // network reaction indices
}

impl NetView {
    /// species passing the species filter; reactions passing the reaction filter whose nuclides all belong to the species view
    pub fn new(network: &Network, selector: &NetSelector) -> Self {
        let mut species = Vec::new();
        let mut positions = vec![None; network.number_of_species()];
        for (idx, sp) in network.nuc.iter().enumerate() {
            if selector.species.matches(sp) {
                positions[idx] = Some(species.len());
                species.push(idx);
            }
        }
        let reactions = network
            .reactions()
            .iter()
            .enumerate()
            .filter(|(_, r)| selector.reactions.matches(r, &network.nuc))
            .filter(|(_, r)| {
                r.nuclides().all(|name| {
                    network
                        .nuc
                        .index_of(name)
                        .and_then(|i| positions[i])
                        .is_some()
                })
            })
            .map(|(i, _)| i)
            .collect();
        Self {
            species,
            positions,
            reactions,
        }
    }
    pub fn remove_reaction(&mut self, reaction_idx: usize) {
        self.reactions.retain(|&r| r != reaction_idx);
    }
    /// copy of the view with the given reactions removed
    pub fn without_reactions(&self, removed: &HashSet<usize>) -> Self {
        let mut view = self.clone();
        view.reactions.retain(|r| !removed.contains(r));
        view
    }
    pub fn species(&self) -> &[usize] {
        &self.species
    }
    pub fn reactions(&self) -> &[usize] {
        &self.reactions
    }
    pub fn number_of_species(&self) -> usize {
        self.species.len()
    }
    pub fn number_of_reactions(&self) -> usize {
        self.reactions.len()
    }
    /// position of a network species inside the view
    pub fn position(&self, species_idx: usize) -> Option<usize> {
        self.positions.get(species_idx).copied().flatten()
    }
    pub fn contains_species(&self, species_idx: usize) -> bool {
        self.position(species_idx).is_some()
    }
    pub fn contains_reaction(&self, reaction_idx: usize) -> bool {
        self.reactions.contains(&reaction_idx)
    }
    /// picks the view entries out of a vector over the whole network
    pub fn gather(&self, full: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(self.species.len(), self.species.iter().map(|&i| full[i]))
    }
    /// adds a vector over the view into a vector over the whole network
    pub fn scatter_add(&self, view_values: &DVector<f64>, full: &mut DVector<f64>) {
        for (pos, &i) in self.species.iter().enumerate() {
            full[i] += view_values[pos];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Examples::example_networks::cno_like_network;
    use crate::Network::reaction::RateLaw;

    #[test]
    fn test_add_reaction_with_unknown_species() {
        let mut net = cno_like_network();
        let res = net.add_reaction(Reaction::new("bad", &["fe56"], &["h1"], RateLaw::Constant(1.0)));
        assert!(matches!(res, Err(EvolutionError::SpeciesNotFound(_))));
    }

    #[test]
    fn test_full_view() {
        let net = cno_like_network();
        let view = NetView::new(&net, &NetSelector::all());
        assert_eq!(view.number_of_species(), 7);
        assert_eq!(view.number_of_reactions(), 4);
        assert_eq!(view.position(3), Some(3));
    }

    #[test]
    fn test_species_filter_drops_reactions_outside_view() {
        let net = cno_like_network();
        let selector = NetSelector::new(
            SpeciesFilter::Not(Box::new(SpeciesFilter::Names(vec!["o16".to_string()]))),
            ReactionFilter::All,
        );
        let view = NetView::new(&net, &selector);
        assert_eq!(view.number_of_species(), 6);
        assert!(!view.contains_reaction(3));
        assert_eq!(view.position(6), None);
    }

    #[test]
    fn test_weak_filter_and_removal() {
        let net = cno_like_network();
        let weak = NetView::new(&net, &NetSelector::new(SpeciesFilter::All, ReactionFilter::Weak));
        assert_eq!(weak.reactions(), &[1]);
        let mut all = NetView::new(&net, &NetSelector::all());
        all.remove_reaction(0);
        assert_eq!(all.reactions(), &[1, 2, 3]);
        let fewer = all.without_reactions(&HashSet::from([1, 3]));
        assert_eq!(fewer.reactions(), &[2]);
    }

    #[test]
    fn test_gather_scatter() {
        let net = cno_like_network();
        let selector = NetSelector::new(SpeciesFilter::ZRange { min: 6, max: 7 }, ReactionFilter::All);
        let view = NetView::new(&net, &selector);
        let full = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        let sub = view.gather(&full);
        assert_eq!(sub.as_slice(), &[3.0, 4.0, 5.0, 6.0]);
        let mut target = DVector::zeros(7);
        view.scatter_add(&sub, &mut target);
        assert_eq!(target[5], 6.0);
        assert_eq!(target[0], 0.0);
    }
}
