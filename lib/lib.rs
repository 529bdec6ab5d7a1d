#![allow(non_snake_case)]

//! Exact diagonalization of the particle/hole Hubbard model on small lattices
//! and imaginary-time correlators computed from the full spectrum.

pub mod config;
pub mod hilbert;
pub mod operator;
pub mod matrix;
pub mod spectrum;
pub mod correlators;
pub mod io;
