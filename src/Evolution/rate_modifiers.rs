//! Default rate modification and weak detailed balance, applied by the linear-system builder after
//! the rates of the evolution network have been computed.
use crate::Network::net_view::NetSelector;
use crate::Zone::nuc_zone::Zone;
use crate::errors::EvolutionError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// kT in MeV for T9 = 1
pub const K_B_MEV_PER_T9: f64 = 0.086_173_3;

/// multiplies the rates of every reaction selected by `selector` by `factor`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateModificationView {
    pub id: String,
    #[serde(default)]
    pub selector: NetSelector,
    pub factor: f64,
}

impl RateModificationView {
    pub fn new(id: &str, selector: NetSelector, factor: f64) -> Self {
        Self {
            id: id.to_string(),
            selector,
            factor,
        }
    }
}

/// Applies the zone's rate-modification views to the forward and reverse rates of the evolution
/// network. A reaction selected by several views gets the product of their factors.
pub fn modify_rates(zone: &mut Zone) -> Result<(), EvolutionError> {
    if zone.rate_modification_views.is_empty() {
        return Ok(());
    }
    let evolution = zone.evolution_view();
    let views = zone.rate_modification_views.clone();
    for modifier in &views {
        let selected = zone.get_net_view(&modifier.selector);
        let mut count = 0;
        for &r in evolution.reactions() {
            if !selected.contains_reaction(r) {
                continue;
            }
            let (forward, reverse) = zone.rates().get_rates_for_reaction(r);
            zone.rates_mut().update_rates_for_reaction(
                r,
                forward * modifier.factor,
                reverse * modifier.factor,
            );
            count += 1;
        }
        debug!(
            "rate modification {} scaled {} reactions by {}",
            modifier.id, count, modifier.factor
        );
    }
    Ok(())
}

/// For weak reactions with a Q value: reverse = forward * exp(-Q / kT).
pub fn set_weak_detailed_balance(zone: &mut Zone) -> Result<(), EvolutionError> {
    let kt = K_B_MEV_PER_T9 * zone.t9()?;
    let view = zone.evolution_view();
    let network = Arc::clone(zone.network());
    for &r in view.reactions() {
        let reaction = &network.reactions()[r];
        let Some(q) = reaction.q_value else { continue };
        if !reaction.is_weak(&network.nuc)? {
            continue;
        }
        let (forward, _) = zone.rates().get_rates_for_reaction(r);
        zone.rates_mut()
            .update_rates_for_reaction(r, forward, forward * (-q / kt).exp());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Examples::example_networks::cno_like_network;
    use crate::Network::net_view::{ReactionFilter, SpeciesFilter};
    use approx::assert_relative_eq;

    #[test]
    fn test_modification_views_multiply() {
        let mut zone = Zone::new("0", Arc::new(cno_like_network()));
        for r in 0..4 {
            zone.rates_mut().update_rates_for_reaction(r, 1.0, 0.5);
        }
        zone.rate_modification_views.push(RateModificationView::new(
            "weak x10",
            NetSelector::new(SpeciesFilter::All, ReactionFilter::Weak),
            10.0,
        ));
        zone.rate_modification_views.push(RateModificationView::new(
            "c12 targets",
            NetSelector::new(SpeciesFilter::All, ReactionFilter::HasReactant("c12".into())),
            2.0,
        ));
        modify_rates(&mut zone).unwrap();
        let idx = |label: &str| zone.network().reaction_index(label).unwrap();
        assert_eq!(zone.rates().get_rates_for_reaction(idx("n13 decay")), (10.0, 5.0));
        assert_eq!(zone.rates().get_rates_for_reaction(idx("c12pg")), (2.0, 1.0));
        assert_eq!(zone.rates().get_rates_for_reaction(idx("c12ag")), (2.0, 1.0));
        assert_eq!(zone.rates().get_rates_for_reaction(idx("c13pg")), (1.0, 0.5));
    }

    #[test]
    fn test_modification_view_from_json() {
        let json = r#"{"id": "slow", "selector": {"reactions": {"Labels": ["c12ag"]}}, "factor": 0.1}"#;
        let view: RateModificationView = serde_json::from_str(json).unwrap();
        assert_eq!(view.selector.species, SpeciesFilter::All);
        assert_relative_eq!(view.factor, 0.1);
    }
}
