//! Static description of the lattice and model parameters.
//!
//! A [`Config`] is validated once on construction and is read-only afterwards;
//! every builder in the crate borrows it.

use std::{ fs, path::Path };
use ndarray as nd;
use ndarray_linalg::{ EighInto, UPLO };
use rustc_hash::FxHashSet as HashSet;
use thiserror::Error;
use toml::{ Table, Value };

/// Largest number of sites representable by a [`State`][crate::hilbert::State].
pub const MAX_SITES: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("there must be more than 0 sites")]
    NoSites,

    #[error("at most {MAX_SITES} sites are supported, got {0}")]
    TooManySites(usize),

    #[error("link ({0}, {1}) has an endpoint outside 0..{2}")]
    SiteOutOfRange(usize, usize, usize),

    #[error("site {0} does not appear in any link")]
    UnlinkedSite(usize),

    #[error("link ({0}, {1}) is listed more than once")]
    DuplicateLink(usize, usize),

    #[error("inverse temperature must be positive and finite, got {0}")]
    InvalidBeta(f64),

    #[error("parameter `{0}` must be finite, got {1}")]
    NonFinite(&'static str, f64),

    #[error("need at least 2 imaginary-time slices, got {0}")]
    TooFewTimeSlices(usize),

    #[error("missing key `{0}`")]
    MissingKey(String),

    #[error("key `{0}` has the wrong type: expected {1}")]
    BadType(String, &'static str),

    #[error("unknown hole hopping convention `{0}`")]
    UnknownHoleHopping(String),

    #[error("error reading config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("error parsing config file: {0}")]
    Toml(#[from] toml::de::Error),
}
pub type ConfigResult<T> = Result<T, ConfigError>;

/// A nearest-neighbor pair of sites.
///
/// A link `(i, j)` implies `(j, i)`; each unordered pair should be listed only
/// once.
pub type Link = (usize, usize);

/// Lattice geometry: number of sites and nearest-neighbor links.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lattice {
    nsites: usize,
    links: Vec<Link>,
}

impl Lattice {
    /// Create a new `Lattice`, checking that all links are in range, that
    /// every site is linked to at least one other, and that no unordered pair
    /// of sites is linked twice.
    pub fn new<I>(nsites: usize, links: I) -> ConfigResult<Self>
    where I: IntoIterator<Item = Link>
    {
        if nsites == 0 { return Err(ConfigError::NoSites); }
        if nsites > MAX_SITES { return Err(ConfigError::TooManySites(nsites)); }
        let links: Vec<Link> = links.into_iter().collect();
        let mut counts: Vec<usize> = vec![0; nsites];
        let mut seen: HashSet<Link> = HashSet::default();
        for &(a, b) in links.iter() {
            if a >= nsites || b >= nsites {
                return Err(ConfigError::SiteOutOfRange(a, b, nsites));
            }
            // (a, b) and (b, a) are the same link
            if !seen.insert((a.min(b), a.max(b))) {
                return Err(ConfigError::DuplicateLink(a, b));
            }
            counts[a] += 1;
            counts[b] += 1;
        }
        if let Some(site) = counts.iter().position(|c| *c == 0) {
            return Err(ConfigError::UnlinkedSite(site));
        }
        Ok(Self { nsites, links })
    }

    /// Three sites on a ring.
    pub fn triangle() -> Self {
        Self { nsites: 3, links: vec![(0, 1), (1, 2), (2, 0)] }
    }

    /// Return the number of sites.
    pub fn nsites(&self) -> usize { self.nsites }

    /// Return the list of links.
    pub fn links(&self) -> &[Link] { &self.links }

    /// Return the symmetric adjacency matrix of the lattice.
    pub fn adjacency(&self) -> nd::Array2<f64> {
        let mut A: nd::Array2<f64> = nd::Array2::zeros((self.nsites, self.nsites));
        for &(a, b) in self.links.iter() {
            A[[a, b]] = 1.0;
            A[[b, a]] = 1.0;
        }
        A
    }

    /// Return the eigenvectors of the single-particle hopping matrix
    /// `kappa * adjacency` as columns, ordered by ascending eigenvalue.
    ///
    /// These diagonalize the non-interacting problem and are used to project
    /// correlators onto momentum-like channels.
    pub fn hopping_irreps(&self, kappa: f64)
        -> Result<nd::Array2<f64>, ndarray_linalg::error::LinalgError>
    {
        let (_, V) = (kappa * self.adjacency()).eigh_into(UPLO::Lower)?;
        Ok(V)
    }
}

/// Sign convention for the hole hopping term.
///
/// Under `Same`, holes hop with amplitude `-kappa` like particles; under
/// `Opposite`, the amplitude is `+kappa` so that the hole dispersion is the
/// negative of the particle dispersion.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum HoleHopping {
    Same,
    #[default]
    Opposite,
}

impl HoleHopping {
    /// Factor multiplying the particle hopping coefficient.
    pub fn sign(self) -> f64 {
        match self {
            Self::Same => 1.0,
            Self::Opposite => -1.0,
        }
    }
}

impl std::str::FromStr for HoleHopping {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "same" => Ok(Self::Same),
            "opposite" => Ok(Self::Opposite),
            other => Err(ConfigError::UnknownHoleHopping(other.to_string())),
        }
    }
}

/// Model parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Params {
    /// Hopping strength.
    pub kappa: f64,
    /// On-site interaction strength.
    pub U: f64,
    /// Inverse temperature.
    pub beta: f64,
    /// Number of imaginary-time points in `[0, beta]`.
    pub nt: usize,
    pub hole_hopping: HoleHopping,
}

impl Params {
    fn check(&self) -> ConfigResult<()> {
        if !self.kappa.is_finite() {
            return Err(ConfigError::NonFinite("kappa", self.kappa));
        }
        if !self.U.is_finite() {
            return Err(ConfigError::NonFinite("U", self.U));
        }
        if !(self.beta.is_finite() && self.beta > 0.0) {
            return Err(ConfigError::InvalidBeta(self.beta));
        }
        if self.nt < 2 { return Err(ConfigError::TooFewTimeSlices(self.nt)); }
        Ok(())
    }
}

/// Full, validated configuration of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub(crate) lattice: Lattice,
    pub(crate) params: Params,
}

impl Config {
    /// Create a new `Config`, validating the model parameters.
    pub fn new(lattice: Lattice, params: Params) -> ConfigResult<Self> {
        params.check()?;
        Ok(Self { lattice, params })
    }

    /// The three-site ring at `kappa = 1`, `U = 1`, `beta = 1` with 32 time
    /// slices.
    pub fn triangle() -> Self {
        let params = Params {
            kappa: 1.0,
            U: 1.0,
            beta: 1.0,
            nt: 32,
            hole_hopping: HoleHopping::default(),
        };
        Self { lattice: Lattice::triangle(), params }
    }

    /// Return a reference to the lattice.
    pub fn lattice(&self) -> &Lattice { &self.lattice }

    /// Return a reference to the model parameters.
    pub fn params(&self) -> &Params { &self.params }

    /// Return the number of sites.
    pub fn nsites(&self) -> usize { self.lattice.nsites }

    /// Return the imaginary-time coordinates `beta * t / (nt - 1)`.
    pub fn taus(&self) -> nd::Array1<f64> {
        nd::Array1::linspace(0.0, self.params.beta, self.params.nt)
    }

    /// Parse and validate a TOML document.
    ///
    /// Expected layout:
    /// ```toml
    /// [lattice]
    /// nsites = 3
    /// links = [[0, 1], [1, 2], [2, 0]]
    ///
    /// [params]
    /// kappa = 1.0
    /// U = 4.0
    /// beta = 1.0
    /// nt = 32
    /// hole_hopping = "opposite" # optional
    /// ```
    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        let table: Table = s.parse()?;
        let lattice_table = get_table(&table, "lattice")?;
        let nsites = get_usize(lattice_table, "lattice.nsites")?;
        let links: Vec<Link>
            = get_key(lattice_table, "lattice.links")?
            .as_array()
            .ok_or(ConfigError::BadType("lattice.links".into(), "array"))?
            .iter()
            .map(|link| {
                let pair = link.as_array()
                    .filter(|pair| pair.len() == 2)
                    .ok_or(
                        ConfigError::BadType(
                            "lattice.links".into(), "array of pairs"))?;
                let a = value_usize(&pair[0], "lattice.links")?;
                let b = value_usize(&pair[1], "lattice.links")?;
                Ok((a, b))
            })
            .collect::<ConfigResult<_>>()?;
        let lattice = Lattice::new(nsites, links)?;

        let params_table = get_table(&table, "params")?;
        let hole_hopping
            = match params_table.get("hole_hopping") {
                Some(v) => v.as_str()
                    .ok_or(
                        ConfigError::BadType(
                            "params.hole_hopping".into(), "string"))?
                    .parse::<HoleHopping>()?,
                None => HoleHopping::default(),
            };
        let params = Params {
            kappa: get_f64(params_table, "params.kappa")?,
            U: get_f64(params_table, "params.U")?,
            beta: get_f64(params_table, "params.beta")?,
            nt: get_usize(params_table, "params.nt")?,
            hole_hopping,
        };
        Self::new(lattice, params)
    }

    /// Read and validate a TOML config file.
    pub fn load<P>(path: P) -> ConfigResult<Self>
    where P: AsRef<Path>
    {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }
}

fn get_key<'a>(table: &'a Table, path: &str) -> ConfigResult<&'a Value> {
    // only the last component is looked up; `path` is for error reporting
    let key = path.rsplit('.').next().unwrap_or(path);
    table.get(key).ok_or_else(|| ConfigError::MissingKey(path.to_string()))
}

fn get_table<'a>(table: &'a Table, path: &str) -> ConfigResult<&'a Table> {
    get_key(table, path)?
        .as_table()
        .ok_or_else(|| ConfigError::BadType(path.to_string(), "table"))
}

fn value_usize(value: &Value, path: &str) -> ConfigResult<usize> {
    value.as_integer()
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| {
            ConfigError::BadType(path.to_string(), "non-negative integer")
        })
}

fn get_usize(table: &Table, path: &str) -> ConfigResult<usize> {
    value_usize(get_key(table, path)?, path)
}

fn get_f64(table: &Table, path: &str) -> ConfigResult<f64> {
    let value = get_key(table, path)?;
    value.as_float()
        .or_else(|| value.as_integer().map(|i| i as f64))
        .ok_or_else(|| ConfigError::BadType(path.to_string(), "number"))
}
