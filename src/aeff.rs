//! Effective area

use crate::{
    error::{DomainError, ErrorKind},
    table::{GridTable, TableError},
};

#[derive(thiserror::Error, Debug)]
pub enum AeffError {
    #[error("Failed to load the effective area table")]
    Table(#[from] TableError),
    #[error("Invalid effective area argument")]
    Domain(#[from] DomainError),
}
type Result<T> = std::result::Result<T, AeffError>;
impl AeffError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AeffError::Table(_) => ErrorKind::Configuration,
            AeffError::Domain(_) => ErrorKind::Domain,
        }
    }
}

/// Conversion factor from the table unit (m^2) to cm^2
const M2_TO_CM2: f64 = 1e4;

/// Effective area interpolated from a table in m^2
#[derive(Debug, Clone, PartialEq)]
pub struct Aeff {
    table: GridTable,
}
impl From<GridTable> for Aeff {
    fn from(table: GridTable) -> Self {
        Self { table }
    }
}
impl Aeff {
    pub fn table(&self) -> &GridTable {
        &self.table
    }
    /// Effective area (cm^2) at `energy` (MeV) and inclination `theta`
    /// (degree)
    ///
    /// Zero below the table lowest cos(theta).
    pub fn value(&self, energy: f64, theta: f64, _phi: f64) -> Result<f64> {
        DomainError::check_energy(energy)?;
        let cos_theta = DomainError::check_non_negative("inclination", theta)?
            .to_radians()
            .cos();
        if cos_theta < self.table.min_cos_theta() {
            return Ok(0.);
        }
        Ok(self.table.value(energy.log10(), cos_theta, true) * M2_TO_CM2)
    }
    /// Largest effective area (cm^2)
    pub fn upper_limit(&self) -> f64 {
        self.table.maximum() * M2_TO_CM2
    }
}
