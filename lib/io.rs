//! Reading and writing of computed spectra and correlators.
//!
//! Text files are line-based with `#`-prefixed comment lines and
//! space-separated values. Binary output uses the `.npz` format.

use std::{
    fs,
    io::{ self, BufRead, BufReader, BufWriter, Write },
    path::Path,
};
use ndarray as nd;
use ndarray_npy::{ NpzWriter, WriteNpzError };
use thiserror::Error;
use crate::{
    config::Config,
    correlators::Correlators,
    spectrum::Spectrum,
};

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("error writing npz: {0}")]
    Npz(#[from] WriteNpzError),

    #[error("malformed correlator file at line {0}: {1}")]
    Parse(usize, String),
}
pub type OutputResult<T> = Result<T, OutputError>;

/// Write the spectrum as one `charge energy` line per eigenstate.
pub fn write_spectrum<W>(mut out: W, spectrum: &Spectrum) -> OutputResult<()>
where W: Write
{
    writeln!(out, "#  charge  energy")?;
    for (q, e) in spectrum.charges().iter().zip(spectrum.energies().iter()) {
        writeln!(out, "{} {}", q, e)?;
    }
    Ok(())
}

/// Write the spectrum to a file, creating or truncating it.
pub fn save_spectrum<P>(path: P, spectrum: &Spectrum) -> OutputResult<()>
where P: AsRef<Path>
{
    let mut out = BufWriter::new(fs::File::create(path)?);
    write_spectrum(&mut out, spectrum)?;
    out.flush()?;
    Ok(())
}

/// Model description recorded at the top of a correlator file.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CorrelatorHeader {
    pub nsites: usize,
    pub nt: usize,
    pub U: f64,
    pub kappa: f64,
    pub beta: f64,
}

impl From<&Config> for CorrelatorHeader {
    fn from(config: &Config) -> Self {
        let params = config.params();
        Self {
            nsites: config.nsites(),
            nt: params.nt,
            U: params.U,
            kappa: params.kappa,
            beta: params.beta,
        }
    }
}

/// Write a correlator table, one line of `nt` values per site pair `(i, j)`
/// in row-major order.
pub fn write_correlators<W>(
    mut out: W,
    config: &Config,
    correlators: &Correlators,
) -> OutputResult<()>
where W: Write
{
    let header = CorrelatorHeader::from(config);
    writeln!(out, "#~ correlator")?;
    writeln!(out, "#  nx  nt")?;
    writeln!(out, "{} {}", header.nsites, header.nt)?;
    writeln!(out, "#  U  kappa  beta")?;
    writeln!(out, "{} {} {}", header.U, header.kappa, header.beta)?;
    for i in 0..correlators.nsites() {
        for j in 0..correlators.nsites() {
            let line: Vec<String>
                = correlators.series(i, j).iter()
                .map(|c| c.to_string())
                .collect();
            writeln!(out, "{}", line.join(" "))?;
        }
    }
    Ok(())
}

/// Write a correlator table to a file, creating or truncating it.
pub fn save_correlators<P>(
    path: P,
    config: &Config,
    correlators: &Correlators,
) -> OutputResult<()>
where P: AsRef<Path>
{
    let mut out = BufWriter::new(fs::File::create(path)?);
    write_correlators(&mut out, config, correlators)?;
    out.flush()?;
    Ok(())
}

fn parse_values<T>(lineno: usize, line: &str, expected: usize)
    -> OutputResult<Vec<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let values: Vec<T>
        = line.split_whitespace()
        .map(|tok| {
            tok.parse::<T>()
                .map_err(|err| {
                    OutputError::Parse(lineno, format!("bad value {:?}: {}", tok, err))
                })
        })
        .collect::<OutputResult<Vec<T>>>()?;
    if values.len() != expected {
        return Err(OutputError::Parse(
            lineno,
            format!("expected {} values but found {}", expected, values.len()),
        ));
    }
    Ok(values)
}

/// Read a correlator table in the layout produced by [`write_correlators`].
pub fn read_correlators<R>(input: R)
    -> OutputResult<(CorrelatorHeader, Correlators)>
where R: BufRead
{
    let mut lines
        = input.lines()
        .enumerate()
        .map(|(k, line)| line.map(|l| (k + 1, l)))
        .filter(|line| {
            line.as_ref()
                .map(|(_, l)| !(l.trim().is_empty() || l.trim_start().starts_with('#')))
                .unwrap_or(true)
        });
    let mut next_line = |what: &str| -> OutputResult<(usize, String)> {
        lines.next()
            .ok_or_else(|| OutputError::Parse(0, format!("missing {}", what)))?
            .map_err(OutputError::from)
    };

    let (k, line) = next_line("site and time-slice counts")?;
    let dims: Vec<usize> = parse_values(k, &line, 2)?;
    let (nsites, nt) = (dims[0], dims[1]);
    let (k, line) = next_line("model parameters")?;
    let params: Vec<f64> = parse_values(k, &line, 3)?;
    let header = CorrelatorHeader {
        nsites, nt, U: params[0], kappa: params[1], beta: params[2] };

    let mut data: nd::Array3<f64> = nd::Array3::zeros((nsites, nsites, nt));
    for i in 0..nsites {
        for j in 0..nsites {
            let (k, line) = next_line("correlator values")?;
            let values: Vec<f64> = parse_values(k, &line, nt)?;
            data.slice_mut(nd::s![i, j, ..]).assign(&nd::Array1::from(values));
        }
    }
    if let Some(extra) = lines.next() {
        let (k, _) = extra?;
        return Err(OutputError::Parse(k, "trailing data".into()));
    }
    Ok((header, data.into()))
}

/// Read a correlator table from a file.
pub fn load_correlators<P>(path: P)
    -> OutputResult<(CorrelatorHeader, Correlators)>
where P: AsRef<Path>
{
    read_correlators(BufReader::new(fs::File::open(path)?))
}

/// Save everything computed for a configuration to a single `.npz` archive
/// with arrays `taus`, `charges`, `energies`, `correlators` and
/// `correlators_irreps`, the last holding `correlators` projected onto the
/// eigenvectors of the hopping matrix.
pub fn save_npz<P>(
    path: P,
    config: &Config,
    spectrum: &Spectrum,
    correlators: &Correlators,
    irreps: &Correlators,
) -> OutputResult<()>
where P: AsRef<Path>
{
    let charges: nd::Array1<i32> = spectrum.charges().iter().copied().collect();
    let mut npz = NpzWriter::new(fs::File::create(path)?);
    npz.add_array("taus", &config.taus())?;
    npz.add_array("charges", &charges)?;
    npz.add_array("energies", spectrum.energies())?;
    npz.add_array("correlators", correlators.data())?;
    npz.add_array("correlators_irreps", irreps.data())?;
    npz.finish()?;
    Ok(())
}
