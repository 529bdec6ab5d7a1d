//! Imaginary-time two-point correlators in the Lehmann representation.
//!
//! For sites `i`, `j` and `0 <= tau <= beta`,
//! ```text
//! C[i, j, tau] = Tr[ exp(-(beta - tau) H) a_i exp(-tau H) a_j^dag ] / Z
//!              = sum_{a, g} exp((tau - beta) E_a - tau E_g) A_i[a, g] A_j[a, g] / Z
//! ```
//! where `A_i` is the particle annihilator at site `i` in the eigenbasis of the
//! Hamiltonian.

use ndarray::{ self as nd, s };
use crate::{
    config::Config,
    matrix::{ to_matrix, SparseMatrix },
    operator::ParticleAnnihilator,
    spectrum::{ to_eigenspace_matrix, Spectrum },
};

/// Compute the partition function `Z = sum_n exp(-beta E_n)`.
pub fn partition_function(spectrum: &Spectrum, beta: f64) -> f64 {
    spectrum.energies().iter().map(|e| (-beta * e).exp()).sum()
}

/// Particle annihilators at every site, expressed in the eigenbasis of
/// `spectrum`.
pub fn eigenspace_annihilators(spectrum: &Spectrum, nsites: usize)
    -> Vec<SparseMatrix>
{
    (0..nsites)
        .map(|i| {
            let A = to_matrix(&ParticleAnnihilator(i), spectrum.basis());
            let A_eig = to_eigenspace_matrix(&A, spectrum);
            let (nrows, ncols) = A_eig.shape();
            log::debug!(
                "annihilator at site {} has {} of {} elements nonzero in the \
                eigenbasis",
                i, A_eig.nnz(), nrows * ncols,
            );
            A_eig
        })
        .collect()
}

/// Table of correlators indexed by `[source site, destination site, time
/// slice]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Correlators {
    data: nd::Array3<f64>,
}

impl From<nd::Array3<f64>> for Correlators {
    fn from(data: nd::Array3<f64>) -> Self { Self { data } }
}

impl Correlators {
    /// Compute the correlators for all site pairs at the `nt` evenly spaced
    /// imaginary times `tau_t = beta * t / (nt - 1)`.
    pub fn compute(config: &Config, spectrum: &Spectrum) -> Self {
        let nsites = config.nsites();
        let nt = config.params().nt;
        let beta = config.params().beta;
        let taus = config.taus();

        // energies relative to the ground state keep every exponent below
        // zero; the shift cancels between numerator and Z
        let e0 = spectrum.ground_energy();
        let E: nd::Array1<f64> = spectrum.energies().mapv(|e| e - e0);
        let Z: f64 = E.iter().map(|e| (-beta * e).exp()).sum();
        log::info!(
            "computing correlators for {} sites at {} time slices",
            nsites, nt,
        );

        let A = eigenspace_annihilators(spectrum, nsites);
        let mut data: nd::Array3<f64> = nd::Array3::zeros((nsites, nsites, nt));
        for (i, A_i) in A.iter().enumerate() {
            for (j, A_j) in A.iter().enumerate() {
                let mut C_ij = data.slice_mut(s![i, j, ..]);
                for (a, g, x) in A_i.iter() {
                    let y = A_j.get(a, g);
                    if y == 0.0 { continue; }
                    C_ij.iter_mut().zip(taus.iter())
                        .for_each(|(c, tau)| {
                            *c += ((tau - beta) * E[a] - tau * E[g]).exp() * x * y;
                        });
                }
                C_ij.mapv_inplace(|c| c / Z);
            }
        }
        Self { data }
    }

    /// Number of sites.
    pub fn nsites(&self) -> usize { self.data.shape()[0] }

    /// Number of time slices.
    pub fn nt(&self) -> usize { self.data.shape()[2] }

    /// Full table, shape `(nsites, nsites, nt)`.
    pub fn data(&self) -> &nd::Array3<f64> { &self.data }

    /// Get a single value.
    ///
    /// *Panics* if any index is out of bounds.
    pub fn get(&self, i: usize, j: usize, t: usize) -> f64 { self.data[[i, j, t]] }

    /// Correlator of a single site pair over all time slices.
    pub fn series(&self, i: usize, j: usize) -> nd::ArrayView1<'_, f64> {
        self.data.slice(s![i, j, ..])
    }

    /// Transform every time slice by `P^T C(t) P`, where the columns of `P`
    /// are the vectors to project onto.
    ///
    /// *Panics* if `P` does not have `nsites` rows.
    pub fn project(&self, P: &nd::Array2<f64>) -> Self {
        assert_eq!(
            P.nrows(), self.nsites(),
            "Correlators::project: projector must have one row per site",
        );
        let m = P.ncols();
        let mut data: nd::Array3<f64> = nd::Array3::zeros((m, m, self.nt()));
        for t in 0..self.nt() {
            let C_t = self.data.slice(s![.., .., t]);
            data.slice_mut(s![.., .., t]).assign(&P.t().dot(&C_t).dot(P));
        }
        Self { data }
    }
}
