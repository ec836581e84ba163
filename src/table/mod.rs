//! Calibration tables sampled on a grid of log10(energy) x cos(inclination)

mod bilinear;
mod parameters;
mod reader;
pub use bilinear::{Bilinear, Corners};
pub(crate) use bilinear::upper_bound;
pub use parameters::{CornerParameters, ParameterSet};
pub(crate) use reader::read_to_string;
pub use reader::{read_columns, read_scaling, Columns};

#[derive(thiserror::Error, Debug)]
pub enum TableError {
    #[error("Failed to open the calibration file {1:?}")]
    Io(#[source] std::io::Error, std::path::PathBuf),
    #[error("Failed to deserialize the CSV file")]
    Csv(#[from] csv::Error),
    #[error("invalid header: expected column {expected:?}, found {found:?}")]
    Header { expected: String, found: String },
    #[error("missing column {0:?}")]
    MissingColumn(String),
    #[error("table size mismatch: expected {expected} values, found {found}")]
    Shape { expected: usize, found: usize },
    #[error("{0} axis is not strictly increasing")]
    NotIncreasing(String),
    #[error("energy bin edge must be strictly positive, found {0} MeV")]
    NonPositiveEnergy(f64),
    #[error("empty table")]
    Empty,
    #[error("tables {0:?} and {1:?} do not share the same binning")]
    Binning(String, String),
}
type Result<T> = std::result::Result<T, TableError>;

/// log10(E/MeV) range of the synthetic padding nodes
pub const LOG_ENERGY_BOUNDS: (f64, f64) = (0., 10.);
/// cos(theta) range of the synthetic padding nodes
pub const COS_THETA_BOUNDS: (f64, f64) = (-1., 1.);

/// Instrument response table function of log10(energy) and cos(theta)
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct GridTable {
    /// log10 of the energy bin centers (geometric mean of the edges)
    log_energies: Vec<f64>,
    /// cos(theta) bin centers
    cos_thetas: Vec<f64>,
    /// log10 of the energy bin edges
    ebounds: Vec<f64>,
    /// cos(theta) bin edges
    tbounds: Vec<f64>,
    /// table values, `values[icosth * n_energies + ilogE]`
    values: Vec<f64>,
    min_cos_theta: f64,
    max_value: f64,
    interpolator: Bilinear,
}
impl GridTable {
    /// Builds a table from the bin edges and the flattened values
    ///
    /// `energ_lo`/`energ_hi` are in MeV, values are ordered with cos(theta)
    /// as rows and energy as columns.
    pub fn new(
        energ_lo: &[f64],
        energ_hi: &[f64],
        ctheta_lo: &[f64],
        ctheta_hi: &[f64],
        values: Vec<f64>,
    ) -> Result<Self> {
        if energ_lo.is_empty() || ctheta_lo.is_empty() {
            return Err(TableError::Empty);
        }
        if energ_lo.len() != energ_hi.len() {
            return Err(TableError::Shape {
                expected: energ_lo.len(),
                found: energ_hi.len(),
            });
        }
        if ctheta_lo.len() != ctheta_hi.len() {
            return Err(TableError::Shape {
                expected: ctheta_lo.len(),
                found: ctheta_hi.len(),
            });
        }
        if let Some(&e) = energ_lo.iter().find(|&&e| !(e > 0.)) {
            return Err(TableError::NonPositiveEnergy(e));
        }
        let expected = energ_lo.len() * ctheta_lo.len();
        if values.len() != expected {
            return Err(TableError::Shape {
                expected,
                found: values.len(),
            });
        }

        let mut ebounds: Vec<f64> = energ_lo.iter().map(|e| e.log10()).collect();
        ebounds.push(energ_hi[energ_hi.len() - 1].log10());
        let log_energies: Vec<f64> = energ_lo
            .iter()
            .zip(energ_hi)
            .map(|(lo, hi)| (lo * hi).sqrt().log10())
            .collect();

        let mut tbounds = ctheta_lo.to_vec();
        tbounds.push(ctheta_hi[ctheta_hi.len() - 1]);
        let cos_thetas: Vec<f64> = ctheta_lo
            .iter()
            .zip(ctheta_hi)
            .map(|(lo, hi)| (lo + hi) / 2.)
            .collect();

        for (axis, edges) in [
            ("energy", &ebounds),
            ("energy center", &log_energies),
            ("cos(theta)", &tbounds),
            ("cos(theta) center", &cos_thetas),
        ] {
            if edges.windows(2).any(|w| !(w[1] > w[0])) {
                return Err(TableError::NotIncreasing(axis.to_string()));
            }
        }

        let max_value = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let interpolator = Bilinear::padded(
            &log_energies,
            &cos_thetas,
            &values,
            LOG_ENERGY_BOUNDS,
            COS_THETA_BOUNDS,
        )?;
        Ok(Self {
            log_energies,
            cos_thetas,
            ebounds,
            tbounds,
            values,
            min_cos_theta: ctheta_lo[0],
            max_value,
            interpolator,
        })
    }
    /// Looks up a value from the table
    ///
    /// With `interpolate`, the value is bilinearly interpolated between bin
    /// centers, otherwise the value of the bin holding (logE, costh) is
    /// returned. Queries outside the table are clamped to the first or last
    /// bin in both cases.
    pub fn value(&self, log_energy: f64, cos_theta: f64, interpolate: bool) -> f64 {
        // exactly on-axis lands on the last bin edge
        let cos_theta = if cos_theta == 1. { 0.9999 } else { cos_theta };
        if interpolate {
            let cos_theta = cos_theta.min(self.cos_thetas[self.cos_thetas.len() - 1]);
            return self.interpolator.value(log_energy, cos_theta);
        }
        let (ilog_e, icosth) = self.bin_index(log_energy, cos_theta);
        self.values[icosth * self.n_energies() + ilog_e]
    }
    /// Indices of the (energy, cos(theta)) bin holding the query point,
    /// clamped onto the table
    pub fn bin_index(&self, log_energy: f64, cos_theta: f64) -> (usize, usize) {
        let ix = upper_bound(&self.ebounds, log_energy).clamp(1, self.ebounds.len() - 1);
        let iy = upper_bound(&self.tbounds, cos_theta).clamp(1, self.tbounds.len() - 1);
        (ix - 1, iy - 1)
    }
    /// Value of bin (ilogE, icosth)
    pub fn bin_value(&self, ilog_e: usize, icosth: usize) -> f64 {
        self.values[icosth * self.n_energies() + ilog_e]
    }
    /// Corners of the interpolation cell holding (logE, costh)
    ///
    /// Corner coordinates include the padding nodes.
    pub fn corners(&self, log_energy: f64, cos_theta: f64) -> Corners {
        let cos_theta = if cos_theta == 1. { 0.9999 } else { cos_theta };
        let cos_theta = cos_theta.min(self.cos_thetas[self.cos_thetas.len() - 1]);
        self.interpolator.corners(log_energy, cos_theta)
    }
    /// The interpolator over the padded grid
    pub fn interpolator(&self) -> &Bilinear {
        &self.interpolator
    }
    pub fn log_energies(&self) -> &[f64] {
        &self.log_energies
    }
    pub fn cos_thetas(&self) -> &[f64] {
        &self.cos_thetas
    }
    /// log10 of the energy bin edges
    pub fn energy_bounds(&self) -> &[f64] {
        &self.ebounds
    }
    /// cos(theta) bin edges
    pub fn cos_theta_bounds(&self) -> &[f64] {
        &self.tbounds
    }
    pub fn values(&self) -> &[f64] {
        &self.values
    }
    pub fn n_energies(&self) -> usize {
        self.log_energies.len()
    }
    pub fn n_cos_thetas(&self) -> usize {
        self.cos_thetas.len()
    }
    /// Largest value in the table
    pub fn maximum(&self) -> f64 {
        self.max_value
    }
    /// Lower edge of the first cos(theta) bin
    pub fn min_cos_theta(&self) -> f64 {
        self.min_cos_theta
    }
    /// Checks that both tables have identical bin edges
    pub fn same_binning(&self, other: &GridTable) -> bool {
        self.ebounds == other.ebounds && self.tbounds == other.tbounds
    }
}
