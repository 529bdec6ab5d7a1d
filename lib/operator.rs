//! Operators acting on many-body basis states.
//!
//! Every operator maps a single [`State`] to a [`SumState`]; actions that are
//! impossible (e.g. creating a particle where one already exists) produce no
//! terms rather than failing.
//!
//! Fermionic signs follow a Jordan-Wigner ordering in which sites are ordered
//! left to right starting from site 0 and, within a site, the particle comes
//! before the hole. Moving an operator to its position in a state therefore
//! picks up a factor `(-1)^k`, where `k` counts all excitations to its left.

use std::ops::{ Deref, DerefMut };
use crate::{
    config::{ Config, HoleHopping, Lattice, Link },
    hilbert::{ State, SumState },
};

/// Basic requirements for any operator.
///
/// Only [`Self::apply_state_into`] has to be implemented; the remaining
/// methods are its linear extension and may be overridden for efficiency.
pub trait Operator {
    /// Apply to a single basis state, appending all resulting terms to `out`.
    fn apply_state_into(&self, state: &State, out: &mut SumState);

    /// Apply to a single basis state.
    fn apply_state(&self, state: &State) -> SumState {
        let mut out = SumState::new();
        self.apply_state_into(state, &mut out);
        out
    }

    /// Apply to every term of a superposition, appending the results scaled
    /// by the corresponding coefficients to `out`.
    fn apply_into(&self, input: &SumState, out: &mut SumState) {
        let mut start: usize = out.len();
        for (coef, state) in input.iter() {
            self.apply_state_into(state, out);
            out.scale_from(start, coef);
            start = out.len();
        }
    }

    /// Apply to a superposition.
    ///
    /// The result is not compressed.
    fn apply(&self, input: &SumState) -> SumState {
        let mut out = SumState::with_capacity(input.len());
        self.apply_into(input, &mut out);
        out
    }
}

impl<O> Operator for &O
where O: Operator + ?Sized
{
    fn apply_state_into(&self, state: &State, out: &mut SumState) {
        (**self).apply_state_into(state, out)
    }

    fn apply_into(&self, input: &SumState, out: &mut SumState) {
        (**self).apply_into(input, out)
    }
}

impl<O> Operator for Box<O>
where O: Operator + ?Sized
{
    fn apply_state_into(&self, state: &State, out: &mut SumState) {
        (**self).apply_state_into(state, out)
    }

    fn apply_into(&self, input: &SumState, out: &mut SumState) {
        (**self).apply_into(input, out)
    }
}

fn parity(nswaps: u32) -> f64 {
    if nswaps % 2 == 0 { 1.0 } else { -1.0 }
}

// number of operators a particle operator at `site` has to pass
fn particle_swaps(state: &State, site: usize) -> u32 {
    state.count_before(site)
}

// number of operators a hole operator at `site` has to pass, which includes
// the particle on its own site
fn hole_swaps(state: &State, site: usize) -> u32 {
    state.count_before(site) + u32::from(state.has_particle_on(site))
}

/* Ladder operators ***********************************************************/

/// Creates a particle on a single site.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParticleCreator(pub usize);

impl Operator for ParticleCreator {
    fn apply_state_into(&self, state: &State, out: &mut SumState) {
        let site = self.0;
        if state.has_particle_on(site) { return; }
        let mut new = *state;
        new.add_particle_on(site);
        out.push(parity(particle_swaps(state, site)), new);
    }
}

/// Annihilates a particle on a single site.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParticleAnnihilator(pub usize);

impl Operator for ParticleAnnihilator {
    fn apply_state_into(&self, state: &State, out: &mut SumState) {
        let site = self.0;
        if !state.has_particle_on(site) { return; }
        let mut new = *state;
        new.remove_particle_on(site);
        out.push(parity(particle_swaps(state, site)), new);
    }
}

/// Creates a hole on a single site.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HoleCreator(pub usize);

impl Operator for HoleCreator {
    fn apply_state_into(&self, state: &State, out: &mut SumState) {
        let site = self.0;
        if state.has_hole_on(site) { return; }
        let mut new = *state;
        new.add_hole_on(site);
        out.push(parity(hole_swaps(state, site)), new);
    }
}

/// Annihilates a hole on a single site.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HoleAnnihilator(pub usize);

impl Operator for HoleAnnihilator {
    fn apply_state_into(&self, state: &State, out: &mut SumState) {
        let site = self.0;
        if !state.has_hole_on(site) { return; }
        let mut new = *state;
        new.remove_hole_on(site);
        out.push(parity(hole_swaps(state, site)), new);
    }
}

/* Hamiltonian terms **********************************************************/

/// Nearest-neighbor particle hopping,
/// ```math
/// -\kappa \sum_{\langle x, y \rangle} (a_x^\dagger a_y + a_y^\dagger a_x)
/// ```
#[derive(Copy, Clone, Debug)]
pub struct ParticleHop<'a> {
    links: &'a [Link],
    kappa: f64,
}

impl<'a> ParticleHop<'a> {
    /// Create a new `ParticleHop`.
    pub fn new(lattice: &'a Lattice, kappa: f64) -> Self {
        Self { links: lattice.links(), kappa }
    }

    fn hop(&self, state: &State, from: usize, to: usize) -> (f64, State) {
        let nswaps_annihilate = particle_swaps(state, from);
        let mut new = *state;
        new.remove_particle_on(from);
        // the creator sees the state after annihilation
        let nswaps_create = particle_swaps(&new, to);
        new.add_particle_on(to);
        (-self.kappa * parity(nswaps_annihilate + nswaps_create), new)
    }
}

impl Operator for ParticleHop<'_> {
    fn apply_state_into(&self, state: &State, out: &mut SumState) {
        for &(a, b) in self.links.iter() {
            // an excitation can never hop both to and from a site
            if state.has_particle_on(a) && !state.has_particle_on(b) {
                let (coef, new) = self.hop(state, a, b);
                out.push(coef, new);
            } else if state.has_particle_on(b) && !state.has_particle_on(a) {
                let (coef, new) = self.hop(state, b, a);
                out.push(coef, new);
            }
        }
    }
}

/// Nearest-neighbor hole hopping,
/// ```math
/// \mp \kappa \sum_{\langle x, y \rangle} (b_x^\dagger b_y + b_y^\dagger b_x)
/// ```
/// with the overall sign set by a [`HoleHopping`] convention.
#[derive(Copy, Clone, Debug)]
pub struct HoleHop<'a> {
    links: &'a [Link],
    kappa: f64,
    convention: HoleHopping,
}

impl<'a> HoleHop<'a> {
    /// Create a new `HoleHop`.
    pub fn new(lattice: &'a Lattice, kappa: f64, convention: HoleHopping)
        -> Self
    {
        Self { links: lattice.links(), kappa, convention }
    }

    fn hop(&self, state: &State, from: usize, to: usize) -> (f64, State) {
        let nswaps_annihilate = hole_swaps(state, from);
        let mut new = *state;
        new.remove_hole_on(from);
        let nswaps_create = hole_swaps(&new, to);
        new.add_hole_on(to);
        let amp = -self.kappa * self.convention.sign();
        (amp * parity(nswaps_annihilate + nswaps_create), new)
    }
}

impl Operator for HoleHop<'_> {
    fn apply_state_into(&self, state: &State, out: &mut SumState) {
        for &(a, b) in self.links.iter() {
            if state.has_hole_on(a) && !state.has_hole_on(b) {
                let (coef, new) = self.hop(state, a, b);
                out.push(coef, new);
            } else if state.has_hole_on(b) && !state.has_hole_on(a) {
                let (coef, new) = self.hop(state, b, a);
                out.push(coef, new);
            }
        }
    }
}

/// On-site interaction,
/// ```math
/// \frac{U}{2} \sum_x (n_x - \tilde{n}_x)^2
/// ```
/// which counts the sites holding exactly one of a particle or a hole.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Interaction {
    pub U: f64,
}

impl Interaction {
    /// Number of sites holding a particle or a hole but not both.
    pub fn number(state: &State) -> usize {
        (0..state.nsites())
            .filter(|&x| state.has_particle_on(x) ^ state.has_hole_on(x))
            .count()
    }
}

impl Operator for Interaction {
    fn apply_state_into(&self, state: &State, out: &mut SumState) {
        let number = Self::number(state);
        if number != 0 {
            out.push(self.U / 2.0 * number as f64, *state);
        }
    }
}

/// Total charge, number of particles minus number of holes.
///
/// Commutes with every Hamiltonian term in this module.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Charge;

impl Charge {
    /// Eigenvalue of the charge operator for a basis state.
    pub fn number(state: &State) -> i32 {
        (0..state.nsites())
            .map(|x| {
                i32::from(state.has_particle_on(x))
                    - i32::from(state.has_hole_on(x))
            })
            .sum()
    }
}

impl Operator for Charge {
    fn apply_state_into(&self, state: &State, out: &mut SumState) {
        let q = Self::number(state);
        if q != 0 {
            out.push(f64::from(q), *state);
        }
    }
}

/* Composition ****************************************************************/

/// Sum of operators.
///
/// Each term is applied to the input state and all outputs are concatenated
/// without further scaling, so any prefactors must be carried by the terms
/// themselves. This collection is backed by a single [`Vec`], which can be
/// accessed via [`Deref`] and [`DerefMut`].
#[derive(Default)]
pub struct SumOperator<'a>(Vec<Box<dyn Operator + 'a>>);

impl<'a> Deref for SumOperator<'a> {
    type Target = Vec<Box<dyn Operator + 'a>>;

    fn deref(&self) -> &Self::Target { &self.0 }
}

impl<'a> DerefMut for SumOperator<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target { &mut self.0 }
}

impl<'a> From<Vec<Box<dyn Operator + 'a>>> for SumOperator<'a> {
    fn from(ops: Vec<Box<dyn Operator + 'a>>) -> Self { Self(ops) }
}

impl<'a> FromIterator<Box<dyn Operator + 'a>> for SumOperator<'a> {
    fn from_iter<I>(iter: I) -> Self
    where I: IntoIterator<Item = Box<dyn Operator + 'a>>
    {
        Self(iter.into_iter().collect())
    }
}

impl<'a> SumOperator<'a> {
    /// Create a new, empty `SumOperator`.
    pub fn new() -> Self { Self::default() }

    /// Add a term, returning `self`.
    pub fn with<O>(mut self, op: O) -> Self
    where O: Operator + 'a
    {
        self.0.push(Box::new(op));
        self
    }
}

impl Operator for SumOperator<'_> {
    fn apply_state_into(&self, state: &State, out: &mut SumState) {
        self.0.iter().for_each(|op| { op.apply_state_into(state, out); });
    }
}

/// Build the full Hamiltonian of the model: particle hopping, hole hopping,
/// and the on-site interaction.
pub fn hamiltonian(config: &Config) -> SumOperator<'_> {
    let params = config.params();
    SumOperator::new()
        .with(ParticleHop::new(config.lattice(), params.kappa))
        .with(HoleHop::new(config.lattice(), params.kappa, params.hole_hopping))
        .with(Interaction { U: params.U })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hilbert::{ fock_basis, Occupation::* };

    fn compressed(mut sum: SumState) -> SumState {
        sum.compress();
        sum
    }

    // {A, B} applied to a single state
    fn anticommutator<A, B>(a: &A, b: &B, state: &State) -> SumState
    where
        A: Operator,
        B: Operator,
    {
        let mut out = a.apply(&b.apply_state(state));
        b.apply_into(&a.apply_state(state), &mut out);
        compressed(out)
    }

    #[test]
    fn creator_annihilator_round_trip() {
        let basis = fock_basis(3);
        for state in basis.states() {
            for site in 0..3 {
                let particle_first
                    = if state.has_particle_on(site) {
                        ParticleCreator(site)
                            .apply(&ParticleAnnihilator(site).apply_state(state))
                    } else {
                        ParticleAnnihilator(site)
                            .apply(&ParticleCreator(site).apply_state(state))
                    };
                assert_eq!(particle_first.len(), 1);
                assert_eq!(particle_first.get(0), Some((1.0, state)));

                let hole_first
                    = if state.has_hole_on(site) {
                        HoleCreator(site)
                            .apply(&HoleAnnihilator(site).apply_state(state))
                    } else {
                        HoleAnnihilator(site)
                            .apply(&HoleCreator(site).apply_state(state))
                    };
                assert_eq!(hole_first.len(), 1);
                assert_eq!(hole_first.get(0), Some((1.0, state)));
            }
        }
    }

    #[test]
    fn impossible_actions_are_empty() {
        let s = State::from_sites(&[Both, Empty]);
        assert!(ParticleCreator(0).apply_state(&s).is_empty());
        assert!(HoleCreator(0).apply_state(&s).is_empty());
        assert!(ParticleAnnihilator(1).apply_state(&s).is_empty());
        assert!(HoleAnnihilator(1).apply_state(&s).is_empty());
    }

    #[test]
    fn jordan_wigner_signs() {
        let s = State::from_sites(&[Particle, Empty, Empty]);
        assert_eq!(ParticleCreator(1).apply_state(&s).coefs(), &[-1.0]);
        assert_eq!(HoleCreator(0).apply_state(&s).coefs(), &[-1.0]);
        assert_eq!(HoleCreator(1).apply_state(&s).coefs(), &[-1.0]);
        let s = State::from_sites(&[Both, Empty, Hole]);
        assert_eq!(ParticleCreator(2).apply_state(&s).coefs(), &[1.0]);
        assert_eq!(HoleAnnihilator(2).apply_state(&s).coefs(), &[1.0]);
        assert_eq!(ParticleAnnihilator(0).apply_state(&s).coefs(), &[1.0]);
        assert_eq!(HoleAnnihilator(0).apply_state(&s).coefs(), &[-1.0]);
    }

    #[test]
    fn canonical_anticommutators() {
        let basis = fock_basis(3);
        for state in basis.states() {
            for i in 0..3 {
                for j in 0..3 {
                    let pp = anticommutator(
                        &ParticleAnnihilator(i), &ParticleCreator(j), state);
                    let hh = anticommutator(
                        &HoleAnnihilator(i), &HoleCreator(j), state);
                    if i == j {
                        assert_eq!(pp.len(), 1);
                        assert_eq!(pp.get(0), Some((1.0, state)));
                        assert_eq!(hh.len(), 1);
                        assert_eq!(hh.get(0), Some((1.0, state)));
                    } else {
                        assert!(pp.is_empty());
                        assert!(hh.is_empty());
                    }
                    assert!(anticommutator(
                        &ParticleAnnihilator(i), &HoleCreator(j), state)
                        .is_empty());
                    assert!(anticommutator(
                        &ParticleCreator(i), &HoleCreator(j), state)
                        .is_empty());
                    assert!(anticommutator(
                        &ParticleAnnihilator(i), &HoleAnnihilator(j), state)
                        .is_empty());
                }
            }
        }
    }

    #[test]
    fn particle_hop_on_triangle() {
        let lattice = Lattice::triangle();
        let hop = ParticleHop::new(&lattice, 0.5);
        let out = hop.apply_state(&State::from_sites(&[Particle, Empty, Empty]));
        assert_eq!(out.len(), 2);
        assert_eq!(out.get(0), Some((-0.5, &State::from_sites(&[Empty, Particle, Empty]))));
        assert_eq!(out.get(1), Some((-0.5, &State::from_sites(&[Empty, Empty, Particle]))));

        // the particle leaving site 2 has to pass the hole on site 1
        let out = hop.apply_state(&State::from_sites(&[Empty, Hole, Particle]));
        assert_eq!(out.len(), 2);
        assert_eq!(out.get(0), Some((0.5, &State::from_sites(&[Empty, Both, Empty]))));
        assert_eq!(out.get(1), Some((0.5, &State::from_sites(&[Particle, Hole, Empty]))));

        let full = State::from_sites(&[Particle, Particle, Particle]);
        assert!(hop.apply_state(&full).is_empty());
    }

    #[test]
    fn hole_hop_conventions() {
        let lattice = Lattice::triangle();
        let s = State::from_sites(&[Hole, Empty, Empty]);
        let same = HoleHop::new(&lattice, 1.0, HoleHopping::Same).apply_state(&s);
        let opp = HoleHop::new(&lattice, 1.0, HoleHopping::Opposite).apply_state(&s);
        assert_eq!(same.coefs(), &[-1.0, -1.0]);
        assert_eq!(opp.coefs(), &[1.0, 1.0]);
        assert_eq!(same.states(), opp.states());
        // the particle left on site 0 is passed by both annihilator and
        // creator
        let s = State::from_sites(&[Both, Empty, Empty]);
        let same = HoleHop::new(&lattice, 1.0, HoleHopping::Same).apply_state(&s);
        assert_eq!(same.coefs(), &[-1.0, -1.0]);
        // a particle right of the origin is passed by the creator only
        let s = State::from_sites(&[Hole, Particle, Empty]);
        let same = HoleHop::new(&lattice, 1.0, HoleHopping::Same).apply_state(&s);
        assert_eq!(same.coefs(), &[1.0, 1.0]);
    }

    #[test]
    fn interaction_and_charge() {
        let s = State::from_sites(&[Particle, Both, Hole, Empty]);
        assert_eq!(Interaction::number(&s), 2);
        let out = Interaction { U: 3.0 }.apply_state(&s);
        assert_eq!(out.get(0), Some((3.0, &s)));
        assert_eq!(Charge::number(&s), 0);
        assert!(Charge.apply_state(&s).is_empty());
        assert!(Interaction { U: 3.0 }.apply_state(&State::empty(4)).is_empty());

        let s = State::from_sites(&[Particle, Particle, Hole, Empty]);
        assert_eq!(Charge.apply_state(&s).get(0), Some((1.0, &s)));
        for state in fock_basis(3).states() {
            assert_eq!(Charge::number(state), state.charge());
        }
    }

    #[test]
    fn hamiltonian_conserves_charge() {
        let config = Config::triangle();
        let H = hamiltonian(&config);
        for state in fock_basis(3).states() {
            let q = Charge::number(state);
            for term in H.iter() {
                let out = term.apply_state(state);
                assert!(out.states().iter().all(|s| Charge::number(s) == q));
            }
        }
    }

    #[test]
    fn sum_concatenates_and_extends_linearly() {
        let lattice = Lattice::triangle();
        let a = ParticleHop::new(&lattice, 1.0);
        let b = Interaction { U: 2.0 };
        let sum = SumOperator::new().with(a).with(b);
        let s = State::from_sites(&[Particle, Empty, Empty]);
        let out = sum.apply_state(&s);
        assert_eq!(out.len(), a.apply_state(&s).len() + b.apply_state(&s).len());

        let input: SumState = [(2.0, s), (-1.0, s)].into_iter().collect();
        let out = compressed(sum.apply(&input));
        let expected = compressed(sum.apply_state(&s));
        assert_eq!(out, expected);
    }
}
