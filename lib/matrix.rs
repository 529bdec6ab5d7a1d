//! Matrix representations of operators.
//!
//! Operators are assembled into dense matrices over an arbitrary ordered basis
//! with [`to_matrix`]. Matrices in the eigenbasis of the Hamiltonian are
//! usually sparse and are stored as [`SparseMatrix`].

use ndarray as nd;
use rustc_hash::FxHashMap as HashMap;
use crate::{
    hilbert::{ State, SumState },
    operator::Operator,
};

/// Entries with magnitude below this are not stored in a [`SparseMatrix`]
/// built from floating-point data.
pub const SPARSE_TOL: f64 = 1e-10;

/// Compute the matrix `M[i, j] = <basis[i]| op |basis[j]>`.
///
/// The coefficients of `basis` are treated as normalizations of the basis
/// vectors and enter every element as `c_i * c_j`. States may appear more than
/// once in `basis`, in which case every occurrence contributes to every
/// matching element.
pub fn to_matrix<O>(op: &O, basis: &SumState) -> nd::Array2<f64>
where O: Operator + ?Sized
{
    let n = basis.len();
    let mut index: HashMap<&State, Vec<usize>> = HashMap::default();
    basis.states().iter().enumerate()
        .for_each(|(i, s)| { index.entry(s).or_default().push(i); });

    let mut M: nd::Array2<f64> = nd::Array2::zeros((n, n));
    let mut out = SumState::new();
    for (j, (coef_j, state_j)) in basis.iter().enumerate() {
        out.clear();
        op.apply_state_into(state_j, &mut out);
        for (coef_k, state_k) in out.iter() {
            let Some(rows) = index.get(state_k) else { continue; };
            for &i in rows.iter() {
                M[[i, j]] += coef_k * basis.coefs()[i] * coef_j;
            }
        }
    }
    M
}

/// Return the largest absolute difference between a square matrix and its
/// transpose.
pub fn asymmetry(M: &nd::Array2<f64>) -> f64 {
    M.iter().zip(M.t().iter())
        .map(|(mij, mji)| (mij - mji).abs())
        .fold(0.0, f64::max)
}

/// Real sparse matrix in compressed sparse row format.
///
/// Column indices within each row are sorted and unique.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseMatrix {
    nrows: usize,
    ncols: usize,
    row_ptr: Vec<usize>,
    col_indices: Vec<usize>,
    values: Vec<f64>,
}

impl SparseMatrix {
    /// Build from `(row, col, value)` triplets.
    ///
    /// Duplicate entries are summed, after which entries with magnitude below
    /// `tol` are dropped.
    ///
    /// *Panics* if any index is out of bounds.
    pub fn from_triplets<I>(nrows: usize, ncols: usize, triplets: I, tol: f64)
        -> Self
    where I: IntoIterator<Item = (usize, usize, f64)>
    {
        let mut rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); nrows];
        for (i, j, v) in triplets.into_iter() {
            assert!(
                i < nrows && j < ncols,
                "SparseMatrix::from_triplets: index ({}, {}) out of bounds", i, j
            );
            rows[i].push((j, v));
        }

        let mut row_ptr: Vec<usize> = Vec::with_capacity(nrows + 1);
        let mut col_indices: Vec<usize> = Vec::new();
        let mut values: Vec<f64> = Vec::new();
        row_ptr.push(0);
        for row in rows.iter_mut() {
            row.sort_by_key(|(j, _)| *j);
            let mut merged: Vec<(usize, f64)> = Vec::with_capacity(row.len());
            for &(j, v) in row.iter() {
                match merged.last_mut() {
                    Some(last) if last.0 == j => { last.1 += v; },
                    _ => { merged.push((j, v)); },
                }
            }
            for (j, v) in merged.into_iter() {
                if v.abs() >= tol {
                    col_indices.push(j);
                    values.push(v);
                }
            }
            row_ptr.push(values.len());
        }
        Self { nrows, ncols, row_ptr, col_indices, values }
    }

    /// Return `(nrows, ncols)`.
    pub fn shape(&self) -> (usize, usize) { (self.nrows, self.ncols) }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize { self.values.len() }

    /// Iterate over the stored entries of a row as `(col, value)`.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        self.col_indices[range.clone()].iter().copied()
            .zip(self.values[range].iter().copied())
    }

    /// Iterate over all stored entries as `(row, col, value)` in row-major
    /// order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.nrows)
            .flat_map(move |i| self.row(i).map(move |(j, v)| (i, j, v)))
    }

    /// Get a single element, returning zero if it is not stored.
    ///
    /// *Panics* if `(i, j)` is out of bounds.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        assert!(i < self.nrows && j < self.ncols, "SparseMatrix::get: out of bounds");
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        match self.col_indices[range.clone()].binary_search(&j) {
            Ok(k) => self.values[range.start + k],
            Err(_) => 0.0,
        }
    }
}
