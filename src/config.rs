//! Angular integral cache grids

use std::path::Path;

use serde::Deserialize;

use crate::{
    error::ErrorKind,
    quadrature::REL_TOL,
    table::{read_to_string, TableError},
};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("the {name} grid needs at least 2 nodes, found {n}")]
    Nodes { name: &'static str, n: usize },
    #[error("largest offset must be strictly positive, found {0}deg")]
    MaxOffset(f64),
    #[error("invalid PSF width anchor {0:?}")]
    WidthAnchor(WidthAnchor),
    #[error("invalid PSF width range [{0:e},{1:e}]rad")]
    WidthRange(f64, f64),
    #[error("relative tolerance must be strictly positive, found {0}")]
    RelTol(f64),
    #[error("Failed to read the cache settings")]
    Table(#[from] TableError),
}
type Result<T> = std::result::Result<T, ConfigError>;
impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

/// Linearly sampled segment `[lo,hi]` of the shape grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub lo: f64,
    pub hi: f64,
    pub n: usize,
}
impl Segment {
    pub fn new(lo: f64, hi: f64, n: usize) -> Self {
        Self { lo, hi, n }
    }
    fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        let step = (self.hi - self.lo) / (self.n.max(2) - 1) as f64;
        (0..self.n).map(move |i| {
            if i + 1 == self.n {
                self.hi
            } else {
                self.lo + step * i as f64
            }
        })
    }
}

/// PSF width anchor: `factor` times the PSF scale factor at `energy` (MeV)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WidthAnchor {
    pub energy: f64,
    pub factor: f64,
}

/// Grids of the PSF angular integral cache
///
/// The offset grid spans `[0, max_offset]` degrees, the width grid is log
/// spaced between the widths given by the 2 anchors (the smallest one from
/// front-converting events, the largest one from back-converting events)
/// and the shape grid concatenates linear segments.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub n_offsets: usize,
    /// degrees
    pub max_offset: f64,
    pub n_widths: usize,
    pub min_width: WidthAnchor,
    pub max_width: WidthAnchor,
    pub shapes: Vec<Segment>,
    pub rel_tol: f64,
}
impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            n_offsets: 500,
            max_offset: 60.,
            n_widths: 50,
            min_width: WidthAnchor {
                energy: 5.62e6,
                factor: 0.15,
            },
            max_width: WidthAnchor {
                energy: 30.,
                factor: 2.,
            },
            shapes: vec![Segment::new(1., 1.2, 50), Segment::new(1.2, 5.1, 50)],
            rel_tol: REL_TOL,
        }
    }
}

/// Grid settings read from a CSV file, empty or missing columns keep the
/// default values
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CacheRecord {
    n_offsets: Option<usize>,
    max_offset: Option<f64>,
    n_widths: Option<usize>,
    min_width_energy: Option<f64>,
    min_width_factor: Option<f64>,
    max_width_energy: Option<f64>,
    max_width_factor: Option<f64>,
    rel_tol: Option<f64>,
}

impl CacheConfig {
    /// Reads the grid settings from the first row of a CSV file
    ///
    /// The columns are `n_offsets`, `max_offset`, `n_widths`,
    /// `min_width_energy`, `min_width_factor`, `max_width_energy`,
    /// `max_width_factor` and `rel_tol`; the shape grid keeps its default.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading {:?}...", path);
        let contents = read_to_string(path)?;
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(contents.as_bytes());
        let record = match rdr.deserialize::<CacheRecord>().next() {
            Some(record) => record.map_err(TableError::from)?,
            None => return Err(TableError::Empty.into()),
        };
        let default = Self::default();
        let config = Self {
            n_offsets: record.n_offsets.unwrap_or(default.n_offsets),
            max_offset: record.max_offset.unwrap_or(default.max_offset),
            n_widths: record.n_widths.unwrap_or(default.n_widths),
            min_width: WidthAnchor {
                energy: record.min_width_energy.unwrap_or(default.min_width.energy),
                factor: record.min_width_factor.unwrap_or(default.min_width.factor),
            },
            max_width: WidthAnchor {
                energy: record.max_width_energy.unwrap_or(default.max_width.energy),
                factor: record.max_width_factor.unwrap_or(default.max_width.factor),
            },
            rel_tol: record.rel_tol.unwrap_or(default.rel_tol),
            ..default
        };
        config.check()?;
        Ok(config)
    }
    /// Checks that every grid has at least 2 nodes and that the offset,
    /// width and tolerance settings are strictly positive
    pub fn check(&self) -> Result<()> {
        for (name, n) in [
            ("offset", self.n_offsets),
            ("width", self.n_widths),
            ("shape", self.shape_grid().len()),
        ] {
            if n < 2 {
                return Err(ConfigError::Nodes { name, n });
            }
        }
        if !(self.max_offset > 0. && self.max_offset.is_finite()) {
            return Err(ConfigError::MaxOffset(self.max_offset));
        }
        for anchor in [self.min_width, self.max_width] {
            if !(anchor.energy > 0. && anchor.factor > 0.) {
                return Err(ConfigError::WidthAnchor(anchor));
            }
        }
        if !(self.rel_tol > 0.) {
            return Err(ConfigError::RelTol(self.rel_tol));
        }
        Ok(())
    }
    /// Checks that the PSF width range (rad) is finite, positive and not empty
    pub fn check_width_range(range: (f64, f64)) -> Result<()> {
        let (min, max) = range;
        if min > 0. && max.is_finite() && min < max {
            Ok(())
        } else {
            Err(ConfigError::WidthRange(min, max))
        }
    }
    pub fn n_offsets(self, n_offsets: usize) -> Self {
        Self { n_offsets, ..self }
    }
    /// Sets the largest offset in degrees
    pub fn max_offset(self, max_offset: f64) -> Self {
        Self { max_offset, ..self }
    }
    pub fn n_widths(self, n_widths: usize) -> Self {
        Self { n_widths, ..self }
    }
    pub fn width_anchors(self, min_width: WidthAnchor, max_width: WidthAnchor) -> Self {
        Self {
            min_width,
            max_width,
            ..self
        }
    }
    pub fn shapes(self, shapes: Vec<Segment>) -> Self {
        Self { shapes, ..self }
    }
    pub fn rel_tol(self, rel_tol: f64) -> Self {
        Self { rel_tol, ..self }
    }
    /// Offset grid in radians
    pub fn offsets(&self) -> Vec<f64> {
        Segment::new(0., self.max_offset.to_radians(), self.n_offsets)
            .samples()
            .collect()
    }
    /// Log spaced width grid in radians
    pub fn widths(&self, min: f64, max: f64) -> Vec<f64> {
        let step = (max / min).ln() / (self.n_widths.max(2) - 1) as f64;
        (0..self.n_widths)
            .map(|i| min * (step * i as f64).exp())
            .collect()
    }
    /// Shape grid, knots shared by consecutive segments appear once
    pub fn shape_grid(&self) -> Vec<f64> {
        let mut grid: Vec<f64> = vec![];
        for segment in &self.shapes {
            for x in segment.samples() {
                if grid.last().map_or(true, |&last| x > last) {
                    grid.push(x);
                }
            }
        }
        grid
    }
}
