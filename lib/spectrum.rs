//! Block diagonalization of the Hamiltonian over charge sectors.
//!
//! Every term of the Hamiltonian conserves the total [charge][Charge], so the
//! Hamiltonian is block-diagonal in a basis sorted by charge. Each block is
//! diagonalized on its own and the results are collected into a single
//! [`Spectrum`].

use std::collections::BTreeMap;
use itertools::Itertools;
use ndarray as nd;
use ndarray_linalg::{ error::LinalgError, EighInto, UPLO };
use thiserror::Error;
use crate::{
    config::Config,
    hilbert::{ COEF_TOL, SumState },
    matrix::{ asymmetry, to_matrix, SparseMatrix, SPARSE_TOL },
    operator::{ hamiltonian, Charge, Operator },
};

/// Largest deviation from symmetry, relative to the largest matrix element,
/// tolerated in a sector Hamiltonian.
pub const SYMMETRY_TOL: f64 = 1e-10;

#[derive(Debug, Error)]
pub enum SpectrumError {
    #[error("diagonalization failed in charge sector {0}: {1}")]
    Diagonalization(i32, #[source] LinalgError),

    #[error("Hamiltonian in charge sector {0} is not symmetric (deviation {1:e})")]
    Asymmetric(i32, f64),

    #[error("basis state {0} has {1} sites but the lattice has {2}")]
    SiteMismatch(usize, usize, usize),

    #[error("cannot diagonalize over an empty basis")]
    EmptyBasis,
}
pub type SpectrumResult<T> = Result<T, SpectrumError>;

/* Sectors ********************************************************************/

/// A maximal run of basis states sharing the same charge.
#[derive(Clone, Debug, PartialEq)]
pub struct Sector {
    /// Charge of every state in the sector.
    pub charge: i32,
    /// Position of the sector's first state in the full basis.
    pub start: usize,
    /// States of the sector, in the same order as in the full basis.
    pub basis: SumState,
}

/// Splits a basis into maximal contiguous runs of equal charge.
///
/// The basis should be sorted by charge for the runs to be true charge
/// sectors.
#[derive(Clone, Debug)]
pub struct ChargeSectors<'a> {
    basis: &'a SumState,
    current: usize,
}

impl<'a> ChargeSectors<'a> {
    /// Create a new `ChargeSectors` starting at the beginning of `basis`.
    pub fn new(basis: &'a SumState) -> Self { Self { basis, current: 0 } }

    /// Return `true` if all sectors have been consumed.
    pub fn is_finished(&self) -> bool { self.current == self.basis.len() }

    /// Return the next sector.
    ///
    /// *Panics* if all sectors have already been consumed.
    pub fn next_sector(&mut self) -> Sector {
        assert!(!self.is_finished(), "ChargeSectors is out of states");
        let start = self.current;
        let charge = Charge::number(&self.basis.states()[start]);
        let sector: SumState
            = self.basis.iter()
            .skip(start)
            .take_while(|(_, s)| Charge::number(s) == charge)
            .map(|(c, s)| (c, *s))
            .collect();
        self.current += sector.len();
        Sector { charge, start, basis: sector }
    }
}

impl Iterator for ChargeSectors<'_> {
    type Item = Sector;

    fn next(&mut self) -> Option<Self::Item> {
        (!self.is_finished()).then(|| self.next_sector())
    }
}

/* Spectrum *******************************************************************/

/// Eigenvalues and eigenvectors of the Hamiltonian with their charges.
///
/// Eigenvectors are stored sparsely as indices into [`Self::basis`] with
/// matching coefficients and are normalized. Entry `n` of every per-eigenstate
/// list refers to the same eigenstate.
#[derive(Clone, Debug)]
pub struct Spectrum {
    charges: Vec<i32>,
    energies: nd::Array1<f64>,
    eigenstate_idxs: Vec<Vec<usize>>,
    eigenstate_coefs: Vec<Vec<f64>>,
    basis: SumState,
}

impl Spectrum {
    /// Diagonalize the Hamiltonian of `config` over `basis`.
    ///
    /// The coefficients of `basis` are ignored; the stored reference basis
    /// holds the same states sorted by charge with unit coefficients.
    pub fn compute(config: &Config, basis: &SumState) -> SpectrumResult<Self> {
        if basis.is_empty() { return Err(SpectrumError::EmptyBasis); }
        let nsites = config.nsites();
        if let Some((k, s))
            = basis.states().iter().enumerate().find(|(_, s)| s.nsites() != nsites)
        {
            return Err(SpectrumError::SiteMismatch(k, s.nsites(), nsites));
        }
        let mut sorted: SumState
            = basis.states().iter().map(|s| (1.0, *s)).collect();
        sorted.sort_by_state_key(Charge::number);

        let H = hamiltonian(config);
        let n = sorted.len();
        let mut charges: Vec<i32> = Vec::with_capacity(n);
        let mut energies: Vec<f64> = Vec::with_capacity(n);
        let mut eigenstate_idxs: Vec<Vec<usize>> = Vec::with_capacity(n);
        let mut eigenstate_coefs: Vec<Vec<f64>> = Vec::with_capacity(n);
        let mut nsectors: usize = 0;
        for sector in ChargeSectors::new(&sorted) {
            log::debug!(
                "diagonalizing charge sector {} of dimension {}",
                sector.charge, sector.basis.len(),
            );
            let (E, V) = diagonalize_sector(&H, &sector)?;
            for (e, v) in E.iter().zip(V.columns()) {
                let (idxs, coefs): (Vec<usize>, Vec<f64>)
                    = v.iter().enumerate()
                    .filter(|(_, c)| c.abs() >= COEF_TOL)
                    .map(|(i, c)| (sector.start + i, *c))
                    .unzip();
                charges.push(sector.charge);
                energies.push(*e);
                eigenstate_idxs.push(idxs);
                eigenstate_coefs.push(coefs);
            }
            nsectors += 1;
        }
        log::info!(
            "computed spectrum of {} states in {} charge sectors", n, nsectors);

        Ok(Self {
            charges,
            energies: energies.into(),
            eigenstate_idxs,
            eigenstate_coefs,
            basis: sorted,
        })
    }

    /// Number of eigenstates.
    pub fn len(&self) -> usize { self.charges.len() }

    /// Return `true` if there are no eigenstates.
    pub fn is_empty(&self) -> bool { self.charges.is_empty() }

    /// Charges of all eigenstates.
    pub fn charges(&self) -> &[i32] { &self.charges }

    /// Energies of all eigenstates.
    pub fn energies(&self) -> &nd::Array1<f64> { &self.energies }

    /// Reference basis that eigenstate indices point into.
    pub fn basis(&self) -> &SumState { &self.basis }

    /// Iterate over the nonzero components of the `n`-th eigenstate as
    /// `(basis index, coefficient)`.
    pub fn eigenstate(&self, n: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.eigenstate_idxs[n].iter().copied()
            .zip(self.eigenstate_coefs[n].iter().copied())
    }

    /// Lowest energy in the spectrum.
    pub fn ground_energy(&self) -> f64 {
        self.energies.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Group the spectrum into distinct levels per charge.
    ///
    /// Energies are taken relative to [`Self::ground_energy`] and rounded to
    /// `decimals` decimal places before degenerate levels are merged. Each
    /// level is returned as `(energy, degeneracy)`, ordered by energy.
    pub fn levels(&self, decimals: i32) -> BTreeMap<i32, Vec<(f64, usize)>> {
        let e0 = self.ground_energy();
        let scale = 10.0_f64.powi(decimals);
        let mut by_charge: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
        for (q, e) in self.charges.iter().zip(self.energies.iter()) {
            // adding 0.0 turns -0.0 into 0.0
            let rel = ((e - e0) * scale).round() / scale + 0.0;
            by_charge.entry(*q).or_default().push(rel);
        }
        by_charge.into_iter()
            .map(|(q, mut energies)| {
                energies.sort_by(f64::total_cmp);
                let levels: Vec<(f64, usize)>
                    = energies.into_iter()
                    .dedup_with_count()
                    .map(|(count, e)| (e, count))
                    .collect();
                (q, levels)
            })
            .collect()
    }
}

fn diagonalize_sector<O>(H: &O, sector: &Sector)
    -> SpectrumResult<(nd::Array1<f64>, nd::Array2<f64>)>
where O: Operator + ?Sized
{
    let H_sector: nd::Array2<f64> = to_matrix(H, &sector.basis);
    let scale = H_sector.iter().fold(1.0_f64, |acc, h| acc.max(h.abs()));
    let deviation = asymmetry(&H_sector);
    if deviation > SYMMETRY_TOL * scale {
        return Err(SpectrumError::Asymmetric(sector.charge, deviation));
    }
    H_sector.eigh_into(UPLO::Lower)
        .map_err(|err| SpectrumError::Diagonalization(sector.charge, err))
}

/// Transform the matrix of an operator in the reference basis of `spectrum`
/// into the basis of eigenstates,
/// ```text
/// M'[a, g] = sum_{x, y} v_a[x] v_g[y] M[x, y]
/// ```
/// keeping only elements with magnitude of at least [`SPARSE_TOL`].
pub fn to_eigenspace_matrix(M: &nd::Array2<f64>, spectrum: &Spectrum)
    -> SparseMatrix
{
    let n = spectrum.len();
    // half-transformed rows: T[a, y] = sum_x v_a[x] M[x, y]
    let mut T: nd::Array2<f64> = nd::Array2::zeros((n, M.ncols()));
    for (a, mut t_a) in T.rows_mut().into_iter().enumerate() {
        for (x, v_ax) in spectrum.eigenstate(a) {
            t_a.scaled_add(v_ax, &M.row(x));
        }
    }
    let triplets
        = (0..n).cartesian_product(0..n)
        .map(|(a, g)| {
            let elem: f64
                = spectrum.eigenstate(g)
                .map(|(y, v_gy)| v_gy * T[[a, y]])
                .sum();
            (a, g, elem)
        });
    SparseMatrix::from_triplets(n, n, triplets, SPARSE_TOL)
}

#[cfg(test)]
mod test {
    use std::f64::consts::PI;
    use super::*;
    use crate::{
        config::{ HoleHopping, Lattice, Params },
        hilbert::fock_basis,
        operator::Interaction,
    };

    fn triangle(kappa: f64, U: f64, hole_hopping: HoleHopping) -> Config {
        let params = Params { kappa, U, beta: 1.0, nt: 8, hole_hopping };
        Config::new(Lattice::triangle(), params).unwrap()
    }

    fn sorted(mut x: Vec<f64>) -> Vec<f64> {
        x.sort_by(f64::total_cmp);
        x
    }

    #[test]
    fn sectors_of_two_sites() {
        let mut basis = fock_basis(2);
        basis.sort_by_state_key(Charge::number);
        let sectors: Vec<Sector> = ChargeSectors::new(&basis).collect();
        let charges: Vec<i32> = sectors.iter().map(|s| s.charge).collect();
        let starts: Vec<usize> = sectors.iter().map(|s| s.start).collect();
        let sizes: Vec<usize> = sectors.iter().map(|s| s.basis.len()).collect();
        assert_eq!(charges, vec![-2, -1, 0, 1, 2]);
        assert_eq!(starts, vec![0, 1, 5, 11, 15]);
        assert_eq!(sizes, vec![1, 4, 6, 4, 1]);
        for sector in sectors.iter() {
            assert!(sector.basis.states().iter().all(|s| s.charge() == sector.charge));
        }
    }

    #[test]
    #[should_panic(expected = "out of states")]
    fn exhausted_sectors_panic() {
        let basis = fock_basis(1);
        let mut sectors = ChargeSectors::new(&basis);
        while !sectors.is_finished() { sectors.next_sector(); }
        sectors.next_sector();
    }

    #[test]
    fn spectrum_covers_full_space() {
        let config = triangle(1.0, 4.0, HoleHopping::Opposite);
        let spectrum = Spectrum::compute(&config, &fock_basis(3)).unwrap();
        assert_eq!(spectrum.len(), 64);
        assert_eq!(spectrum.energies().len(), 64);
        assert_eq!(spectrum.basis().len(), 64);
        assert!(spectrum.charges().windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(spectrum.charges().iter().filter(|q| **q == 0).count(), 20);
        for n in 0..spectrum.len() {
            let q = spectrum.charges()[n];
            assert!(
                spectrum.eigenstate(n)
                    .all(|(x, _)| spectrum.basis().states()[x].charge() == q)
            );
        }
    }

    #[test]
    fn basis_must_match_lattice() {
        let config = triangle(1.0, 1.0, HoleHopping::Opposite);
        assert!(matches!(
            Spectrum::compute(&config, &fock_basis(2)),
            Err(SpectrumError::SiteMismatch(0, 2, 3)),
        ));
        assert!(matches!(
            Spectrum::compute(&config, &SumState::new()),
            Err(SpectrumError::EmptyBasis),
        ));
    }

    #[test]
    fn free_spectrum_on_triangle() {
        let kappa: f64 = 1.0;
        let modes: Vec<f64>
            = (0..3)
            .map(|k| -2.0 * kappa * (2.0 * PI * k as f64 / 3.0).cos())
            .collect();
        let subset_sums = |signs: f64| -> Vec<f64> {
            (0..8_usize)
                .cartesian_product(0..8_usize)
                .map(|(p, h)| {
                    (0..3)
                        .map(|k| {
                            let np = ((p >> k) & 1) as f64;
                            let nh = ((h >> k) & 1) as f64;
                            (np + signs * nh) * modes[k]
                        })
                        .sum()
                })
                .collect()
        };

        for (convention, signs) in [(HoleHopping::Same, 1.0), (HoleHopping::Opposite, -1.0)] {
            let config = triangle(kappa, 0.0, convention);
            let spectrum = Spectrum::compute(&config, &fock_basis(3)).unwrap();
            let expected = sorted(subset_sums(signs));
            let computed = sorted(spectrum.energies().to_vec());
            for (e, c) in expected.iter().zip(computed.iter()) {
                assert!((e - c).abs() < 1e-10, "{} != {}", e, c);
            }
        }
    }

    #[test]
    fn atomic_limit() {
        let config = triangle(0.0, 3.0, HoleHopping::Opposite);
        let basis = fock_basis(3);
        let spectrum = Spectrum::compute(&config, &basis).unwrap();
        let expected: Vec<f64>
            = basis.states().iter()
            .map(|s| 1.5 * Interaction::number(s) as f64)
            .collect();
        let computed = sorted(spectrum.energies().to_vec());
        for (e, c) in sorted(expected).iter().zip(computed.iter()) {
            assert!((e - c).abs() < 1e-12);
        }
        assert!(spectrum.ground_energy().abs() < 1e-12);
    }

    #[test]
    fn eigenstates_diagonalize_hamiltonian() {
        let config = triangle(1.0, 4.0, HoleHopping::Opposite);
        let spectrum = Spectrum::compute(&config, &fock_basis(3)).unwrap();
        let n = spectrum.len();
        let mut V: nd::Array2<f64> = nd::Array2::zeros((n, n));
        for a in 0..n {
            spectrum.eigenstate(a).for_each(|(x, v)| { V[[x, a]] = v; });
        }
        let VtV = V.t().dot(&V);
        let H = to_matrix(&hamiltonian(&config), spectrum.basis());
        let VtHV = V.t().dot(&H).dot(&V);
        for ((a, g), x) in VtV.indexed_iter() {
            let id = if a == g { 1.0 } else { 0.0 };
            assert!((x - id).abs() < 1e-10);
            let e = if a == g { spectrum.energies()[a] } else { 0.0 };
            assert!((VtHV[[a, g]] - e).abs() < 1e-9);
        }
    }

    #[test]
    fn eigenspace_charge_matrix() {
        let config = triangle(1.0, 2.0, HoleHopping::Opposite);
        let spectrum = Spectrum::compute(&config, &fock_basis(3)).unwrap();
        let Q = to_matrix(&Charge, spectrum.basis());
        let Q_eig = to_eigenspace_matrix(&Q, &spectrum);
        for (a, g, q) in Q_eig.iter() {
            assert_eq!(a, g);
            assert!((q - f64::from(spectrum.charges()[a])).abs() < 1e-10);
        }
        let nonzero = spectrum.charges().iter().filter(|q| **q != 0).count();
        assert_eq!(Q_eig.nnz(), nonzero);
    }

    #[test]
    fn levels_count_all_states() {
        let config = triangle(1.0, 0.0, HoleHopping::Opposite);
        let spectrum = Spectrum::compute(&config, &fock_basis(3)).unwrap();
        let levels = spectrum.levels(5);
        assert_eq!(levels.keys().copied().collect::<Vec<i32>>(), vec![-3, -2, -1, 0, 1, 2, 3]);
        let total: usize
            = levels.values().flat_map(|l| l.iter().map(|(_, d)| *d)).sum();
        assert_eq!(total, 64);
        // lowest particle mode and both lowest hole modes filled
        assert_eq!(levels[&-1][0], (0.0, 1));
        assert!(levels[&0][0].0 > 0.0);
        assert!(levels.values().flatten().all(|(e, _)| *e >= 0.0));
    }
}
