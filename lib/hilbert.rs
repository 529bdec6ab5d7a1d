//! Definitions to describe many-body basis states and weighted superpositions
//! thereof.

use std::{ fmt, hash::BuildHasherDefault };
use indexmap::IndexMap;
use itertools::Itertools;
use rustc_hash::FxHasher;
use crate::config::MAX_SITES;

/// Coefficients with magnitude below this are dropped by
/// [`SumState::compress`].
pub const COEF_TOL: f64 = 1e-13;

/* States *********************************************************************/

/// Occupation of a single site.
///
/// The discriminant is a bit pattern with the particle in bit 0 and the hole
/// in bit 1.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Occupation {
    Empty = 0b00,
    Particle = 0b01,
    Hole = 0b10,
    Both = 0b11,
}

impl Occupation {
    /// All local states in enumeration order.
    pub const ALL: [Self; 4] = [Self::Empty, Self::Particle, Self::Hole, Self::Both];

    fn from_bits(p: bool, h: bool) -> Self {
        match (p, h) {
            (false, false) => Self::Empty,
            (true,  false) => Self::Particle,
            (false, true ) => Self::Hole,
            (true,  true ) => Self::Both,
        }
    }

    /// Return `true` if a particle is present.
    pub fn has_particle(self) -> bool { (self as u8) & 0b01 != 0 }

    /// Return `true` if a hole is present.
    pub fn has_hole(self) -> bool { (self as u8) & 0b10 != 0 }

    /// Number of excitations, 0, 1, or 2.
    pub fn number(self) -> u32 { (self as u8).count_ones() }
}

impl fmt::Display for Occupation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, ". "),
            Self::Particle => write!(f, "p "),
            Self::Hole => write!(f, " h"),
            Self::Both => write!(f, "ph"),
        }
    }
}

/// A single many-body basis state: particle and hole occupations on every
/// site.
///
/// Occupations are stored as two bit masks, so a state can hold at most
/// [`MAX_SITES`] sites. Site 0 is the leftmost site in the fermionic operator
/// ordering.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct State {
    particles: u64,
    holes: u64,
    nsites: usize,
}

impl State {
    /// Create the state with no excitations on `nsites` sites.
    ///
    /// *Panics* if `nsites` exceeds [`MAX_SITES`].
    pub fn empty(nsites: usize) -> Self {
        assert!(nsites <= MAX_SITES, "State::empty: too many sites");
        Self { particles: 0, holes: 0, nsites }
    }

    /// Create a state from a list of per-site occupations.
    ///
    /// *Panics* if more than [`MAX_SITES`] occupations are given.
    pub fn from_sites(sites: &[Occupation]) -> Self {
        let mut state = Self::empty(sites.len());
        sites.iter().enumerate()
            .for_each(|(i, occ)| { state.set_site(i, *occ); });
        state
    }

    /// Return the number of sites.
    pub fn nsites(&self) -> usize { self.nsites }

    fn bit(&self, site: usize) -> u64 {
        assert!(site < self.nsites, "site {} out of range", site);
        1 << site
    }

    /// Return the occupation of a site.
    pub fn site(&self, site: usize) -> Occupation {
        Occupation::from_bits(self.has_particle_on(site), self.has_hole_on(site))
    }

    /// Overwrite the occupation of a site.
    pub fn set_site(&mut self, site: usize, occ: Occupation) {
        let bit = self.bit(site);
        if occ.has_particle() { self.particles |= bit; }
        else { self.particles &= !bit; }
        if occ.has_hole() { self.holes |= bit; }
        else { self.holes &= !bit; }
    }

    /// Return a copy of `self` with one site's occupation replaced.
    pub fn with_site(mut self, site: usize, occ: Occupation) -> Self {
        self.set_site(site, occ);
        self
    }

    /// Iterate over all sites' occupations in order.
    pub fn sites(&self) -> impl Iterator<Item = Occupation> + '_ {
        (0..self.nsites).map(|i| self.site(i))
    }

    pub fn has_particle_on(&self, site: usize) -> bool {
        self.particles & self.bit(site) != 0
    }

    pub fn has_hole_on(&self, site: usize) -> bool {
        self.holes & self.bit(site) != 0
    }

    /// Number of excitations (0, 1, or 2) on a site.
    pub fn number_on(&self, site: usize) -> u32 {
        u32::from(self.has_particle_on(site)) + u32::from(self.has_hole_on(site))
    }

    pub fn add_particle_on(&mut self, site: usize) {
        self.particles |= self.bit(site);
    }

    pub fn remove_particle_on(&mut self, site: usize) {
        self.particles &= !self.bit(site);
    }

    pub fn add_hole_on(&mut self, site: usize) {
        self.holes |= self.bit(site);
    }

    pub fn remove_hole_on(&mut self, site: usize) {
        self.holes &= !self.bit(site);
    }

    /// Total number of excitations, particles and holes alike, on all sites
    /// strictly before `site`.
    pub fn count_before(&self, site: usize) -> u32 {
        assert!(site < self.nsites, "site {} out of range", site);
        let mask: u64 = (1 << site) - 1;
        (self.particles & mask).count_ones() + (self.holes & mask).count_ones()
    }

    /// Total number of particles minus total number of holes.
    pub fn charge(&self) -> i32 {
        self.particles.count_ones() as i32 - self.holes.count_ones() as i32
    }

    /// Inner product of two basis states, which are orthonormal.
    pub fn overlap(&self, other: &Self) -> f64 {
        if self == other { 1.0 } else { 0.0 }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "|{}>", self.sites().join(" "))
    }
}

/* Superpositions *************************************************************/

/// A linear combination of [`State`]s with real coefficients.
///
/// Coefficients and states are kept in lockstep: the `k`-th coefficient
/// belongs to the `k`-th state. The same state may appear more than once and
/// coefficients may be (close to) zero until [`Self::compress`] is called.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SumState {
    coefs: Vec<f64>,
    states: Vec<State>,
}

impl SumState {
    /// Create a new, empty superposition.
    pub fn new() -> Self { Self::default() }

    /// Create a new, empty superposition with space for `n` terms.
    pub fn with_capacity(n: usize) -> Self {
        Self { coefs: Vec::with_capacity(n), states: Vec::with_capacity(n) }
    }

    /// Append a term.
    pub fn push(&mut self, coef: f64, state: State) {
        self.coefs.push(coef);
        self.states.push(state);
    }

    /// Return the number of terms.
    pub fn len(&self) -> usize { self.coefs.len() }

    /// Return `true` if there are no terms.
    pub fn is_empty(&self) -> bool { self.coefs.is_empty() }

    /// Remove all terms.
    pub fn clear(&mut self) {
        self.coefs.clear();
        self.states.clear();
    }

    /// Reserve space for at least `additional` more terms.
    pub fn reserve(&mut self, additional: usize) {
        self.coefs.reserve(additional);
        self.states.reserve(additional);
    }

    /// Get the `k`-th term.
    pub fn get(&self, k: usize) -> Option<(f64, &State)> {
        self.coefs.get(k).copied().zip(self.states.get(k))
    }

    /// Get the `k`-th term for modification.
    pub fn get_mut(&mut self, k: usize) -> Option<(&mut f64, &mut State)> {
        self.coefs.get_mut(k).zip(self.states.get_mut(k))
    }

    /// Return all coefficients.
    pub fn coefs(&self) -> &[f64] { &self.coefs }

    /// Return all states.
    pub fn states(&self) -> &[State] { &self.states }

    /// Iterate over all terms.
    pub fn iter(&self) -> impl Iterator<Item = (f64, &State)> + Clone + '_ {
        self.coefs.iter().copied().zip(self.states.iter())
    }

    /// Multiply all coefficients by `factor`.
    pub fn scale(&mut self, factor: f64) {
        self.coefs.iter_mut().for_each(|c| { *c *= factor; });
    }

    /// Multiply the coefficients of all terms from index `start` onward by
    /// `factor`.
    pub(crate) fn scale_from(&mut self, start: usize, factor: f64) {
        self.coefs.iter_mut().skip(start).for_each(|c| { *c *= factor; });
    }

    /// Stably sort the terms by a key computed from their states.
    pub fn sort_by_state_key<K, F>(&mut self, mut key: F)
    where
        K: Ord,
        F: FnMut(&State) -> K,
    {
        let mut terms: Vec<(f64, State)>
            = self.coefs.drain(..).zip(self.states.drain(..)).collect();
        terms.sort_by_key(|(_, s)| key(s));
        let (coefs, states): (Vec<f64>, Vec<State>) = terms.into_iter().unzip();
        self.coefs = coefs;
        self.states = states;
    }

    /// Merge all terms with equal states by summing their coefficients, then
    /// remove all terms whose coefficient magnitude is below [`COEF_TOL`].
    ///
    /// Remaining terms keep the order in which their states first appeared.
    pub fn compress(&mut self) {
        let mut merged: IndexMap<State, f64, BuildHasherDefault<FxHasher>>
            = IndexMap::with_capacity_and_hasher(
                self.len(), BuildHasherDefault::default());
        for (c, s) in self.coefs.drain(..).zip(self.states.drain(..)) {
            *merged.entry(s).or_insert(0.0) += c;
        }
        merged.retain(|_, c| c.abs() >= COEF_TOL);
        let (states, coefs): (Vec<State>, Vec<f64>) = merged.into_iter().unzip();
        self.coefs = coefs;
        self.states = states;
    }

    /// Inner product with another superposition.
    ///
    /// Neither operand needs to be compressed; all pairs of terms are summed.
    pub fn overlap(&self, other: &Self) -> f64 {
        self.iter()
            .cartesian_product(other.iter())
            .map(|((ca, sa), (cb, sb))| ca * cb * sa.overlap(sb))
            .sum()
    }
}

impl FromIterator<(f64, State)> for SumState {
    fn from_iter<I>(iter: I) -> Self
    where I: IntoIterator<Item = (f64, State)>
    {
        let (coefs, states) = iter.into_iter().unzip();
        Self { coefs, states }
    }
}

impl Extend<(f64, State)> for SumState {
    fn extend<I>(&mut self, iter: I)
    where I: IntoIterator<Item = (f64, State)>
    {
        iter.into_iter().for_each(|(c, s)| { self.push(c, s); });
    }
}

impl fmt::Display for SumState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() { return write!(f, "0"); }
        let terms = self.iter().map(|(c, s)| format!("{:+} {}", c, s));
        write!(f, "{}", terms.format(" "))
    }
}

/// Generate all `4^nsites` basis states, each with coefficient 1.
///
/// States are ordered as a base-4 counter with site 0 as the least significant
/// digit, with each digit running through [`Occupation::ALL`].
pub fn fock_basis(nsites: usize) -> SumState {
    assert!(
        (1..=MAX_SITES).contains(&nsites),
        "fock_basis: number of sites must be in 1..={}", MAX_SITES
    );
    (0..nsites).map(|_| Occupation::ALL)
        .multi_cartesian_product()
        .map(|mut sites| {
            // the product varies the last site fastest
            sites.reverse();
            (1.0, State::from_sites(&sites))
        })
        .collect()
}
