//! Small networks used by the examples and the unit tests.
use crate::Network::net_view::Network;
use crate::Network::reaction::{RateLaw, Reaction};
use crate::Network::species::{Species, element_symbol};

/// A <-> B toy: c12 <-> n12 with constant rates. Same mass number, so sum A*Y is conserved;
/// the equilibrium ratio Y(n12)/Y(c12) is kf/kr.
pub fn two_species_network(kf: f64, kr: f64) -> Network {
    let mut net = Network::new();
    net.add_species(Species::new("c12", 6, 12, 0.0, 0.0));
    net.add_species(Species::new("n12", 7, 12, 17.338, 1.0));
    // species were just added, the reaction cannot fail
    let _ = net.add_reaction(
        Reaction::new("A <-> B", &["c12"], &["n12"], RateLaw::Constant(kf))
            .with_reverse(RateLaw::Constant(kr)),
    );
    net
}

/// first steps of the CN cycle plus an alpha capture on c12
pub fn cno_like_network() -> Network {
    let mut net = Network::new();
    for name in ["h1", "he4", "c12", "n13", "c13", "n14", "o16"] {
        if let Ok(s) = Species::from_name(name) {
            net.add_species(s);
        }
    }
    let reactions = [
        Reaction::new("c12pg", &["c12", "h1"], &["n13", "gamma"], RateLaw::Constant(1.0)),
        Reaction::new(
            "n13 decay",
            &["n13"],
            &["c13", "positron", "neutrino_e"],
            RateLaw::Constant(1.0),
        ),
        Reaction::new("c13pg", &["c13", "h1"], &["n14", "gamma"], RateLaw::Constant(1.0)),
        Reaction::new("c12ag", &["c12", "he4"], &["o16", "gamma"], RateLaw::Constant(1.0)),
    ];
    for r in reactions {
        let _ = net.add_reaction(r);
    }
    net
}

/// Chain of isobars of mass number `a` from Z = `z_max` down to `z_min`, linked by positron
/// decays with a reverse (electron capture) rate. Rates grow along the chain so the Jacobian is
/// nonsymmetric.
pub fn isobar_chain_network(a: u32, z_min: u32, z_max: u32, rate: f64) -> Network {
    let mut net = Network::new();
    let mut names = Vec::new();
    for z in (z_min..=z_max).rev() {
        if let Some(symbol) = element_symbol(z) {
            let name = format!("{}{}", symbol, a);
            net.add_species(Species::new(&name, z, a, 0.0, 0.0));
            names.push(name);
        }
    }
    for (k, pair) in names.windows(2).enumerate() {
        let forward = rate * (1.0 + 0.1 * k as f64);
        let _ = net.add_reaction(
            Reaction::new(
                &format!("{} decay", pair[0]),
                &[pair[0].as_str()],
                &[pair[1].as_str(), "positron", "neutrino_e"],
                RateLaw::Constant(forward),
            )
            .with_reverse(RateLaw::Constant(0.5 * rate)),
        );
    }
    net
}

/// alpha chain he4 + c12 -> o16 -> ne20 -> mg24 with Arrhenius laws in T9, plus triple alpha
pub fn alpha_chain_network() -> Network {
    let mut net = Network::new();
    for name in ["he4", "c12", "o16", "ne20", "mg24"] {
        if let Ok(s) = Species::from_name(name) {
            net.add_species(s);
        }
    }
    let _ = net.add_reaction(Reaction::new(
        "triple alpha",
        &["he4", "he4", "he4"],
        &["c12", "gamma"],
        RateLaw::Arrhenius { a: 1.0e-8, n: -3.0, e9: 4.4 },
    ));
    let captures = [("c12", "o16", 8.0), ("o16", "ne20", 10.0), ("ne20", "mg24", 12.0)];
    for (target, product, e9) in captures {
        let _ = net.add_reaction(Reaction::new(
            &format!("{}(a,g){}", target, product),
            &[target, "he4"],
            &[product, "gamma"],
            RateLaw::Arrhenius { a: 1.0e6, n: -2.0 / 3.0, e9 },
        ));
    }
    net
}

/// light particles, a few alpha nuclei and the iron peak, with tabulated mass excesses (MeV) so
/// statistical equilibrium can be computed
pub fn iron_peak_network() -> Network {
    let mut net = Network::new();
    for (name, z, a, me, spin) in [
        ("n", 0, 1, 8.071_317, 0.5),
        ("h1", 1, 1, 7.288_971, 0.5),
        ("he4", 2, 4, 2.424_916, 0.0),
        ("c12", 6, 12, 0.0, 0.0),
        ("o16", 8, 16, -4.737_002, 0.0),
        ("fe54", 26, 54, -56.252_5, 0.0),
        ("fe56", 26, 56, -60.607_1, 0.0),
        ("ni56", 28, 56, -53.904_1, 0.0),
    ] {
        net.add_species(Species::new(name, z, a, me, spin));
    }
    let reactions = [
        Reaction::new(
            "triple alpha",
            &["he4", "he4", "he4"],
            &["c12", "gamma"],
            RateLaw::Arrhenius { a: 1.0e-12, n: -3.0, e9: 4.4 },
        ),
        Reaction::new(
            "c12(a,g)o16",
            &["c12", "he4"],
            &["o16", "gamma"],
            RateLaw::Arrhenius { a: 1.0e6, n: -2.0 / 3.0, e9: 8.0 },
        ),
        Reaction::new(
            "fe54(2p,g)ni56",
            &["fe54", "h1", "h1"],
            &["ni56", "gamma"],
            RateLaw::Arrhenius { a: 1.0e-6, n: -2.0 / 3.0, e9: 20.0 },
        )
        .with_reverse(RateLaw::Arrhenius { a: 1.0e2, n: 0.0, e9: 60.0 }),
    ];
    for r in reactions {
        let _ = net.add_reaction(r);
    }
    net
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_networks_are_complete() {
        assert_eq!(two_species_network(1.0, 1.0).number_of_reactions(), 1);
        assert_eq!(cno_like_network().number_of_reactions(), 4);
        let chain = isobar_chain_network(60, 20, 30, 1.0);
        assert_eq!(chain.number_of_species(), 11);
        assert_eq!(chain.number_of_reactions(), 10);
        assert_eq!(alpha_chain_network().number_of_reactions(), 4);
        assert_eq!(iron_peak_network().number_of_species(), 8);
        assert_eq!(iron_peak_network().number_of_reactions(), 3);
    }
}
