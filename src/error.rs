use crate::{
    aeff::AeffError, config::ConfigError, edisp::EdispError, epoch::EpochError, loader::LoaderError, psf::PsfError,
    quadrature::QuadratureError, registry::RegistryError, table::TableError,
};

/// Caller supplied a physically meaningless argument
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("{name} cannot be negative, value passed: {value}")]
    Negative { name: &'static str, value: f64 },
    #[error("energy must be strictly positive, value passed: {0} MeV")]
    NonPositiveEnergy(f64),
    #[error("cos(theta)={0} is outside [-1,1]")]
    CosTheta(f64),
    #[error("at least one acceptance cone is required")]
    NoAcceptanceCone,
    #[error("containment fraction {0} is outside ]0,1[")]
    Fraction(f64),
    #[error("requested MET {0} is not covered by the selected IRFs")]
    NotCovered(f64),
}
impl DomainError {
    /// Returns an error if `value` is negative (or NaN)
    pub fn check_non_negative(name: &'static str, value: f64) -> Result<f64, Self> {
        if value >= 0. {
            Ok(value)
        } else {
            Err(Self::Negative { name, value })
        }
    }
    /// Returns an error if `energy` is not strictly positive
    pub fn check_energy(energy: f64) -> Result<f64, Self> {
        if energy > 0. {
            Ok(energy)
        } else {
            Err(Self::NonPositiveEnergy(energy))
        }
    }
}

/// Error categories seen by the analysis driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed calibration data, raised at load time
    Configuration,
    /// Invalid caller argument
    Domain,
    /// Zero PSF width/shape parameter or a failed quadrature
    NumericDegeneracy,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error in the `table` module")]
    Table(#[from] TableError),
    #[error("Error in the `config` module")]
    Config(#[from] ConfigError),
    #[error("Error in the `quadrature` module")]
    Quadrature(#[from] QuadratureError),
    #[error("Error in the `psf` module")]
    Psf(#[from] PsfError),
    #[error("Error in the `aeff` module")]
    Aeff(#[from] AeffError),
    #[error("Error in the `edisp` module")]
    Edisp(#[from] EdispError),
    #[error("Error in the `epoch` module")]
    Epoch(#[from] EpochError),
    #[error("Error in the `registry` module")]
    Registry(#[from] RegistryError),
    #[error("Error in the `loader` module")]
    Loader(#[from] LoaderError),
    #[error("Invalid argument")]
    Domain(#[from] DomainError),
}
impl Error {
    /// Classifies the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Table(_) | Error::Config(_) | Error::Loader(_) => ErrorKind::Configuration,
            Error::Quadrature(_) => ErrorKind::NumericDegeneracy,
            Error::Domain(_) => ErrorKind::Domain,
            Error::Psf(e) => e.kind(),
            Error::Aeff(e) => e.kind(),
            Error::Edisp(e) => e.kind(),
            Error::Epoch(e) => e.kind(),
            Error::Registry(e) => e.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_checks() {
        assert_eq!(DomainError::check_non_negative("theta", 0.), Ok(0.));
        assert!(DomainError::check_non_negative("theta", -1e-9).is_err());
        assert!(DomainError::check_non_negative("theta", f64::NAN).is_err());
        assert!(DomainError::check_energy(0.).is_err());
        assert_eq!(DomainError::check_energy(100.), Ok(100.));
    }

    #[test]
    fn error_kinds() {
        let e: Error = DomainError::NoAcceptanceCone.into();
        assert_eq!(e.kind(), ErrorKind::Domain);
        let e: Error = QuadratureError::NonFinite { x: 0. }.into();
        assert_eq!(e.kind(), ErrorKind::NumericDegeneracy);
        let e: Error = TableError::Empty.into();
        assert_eq!(e.kind(), ErrorKind::Configuration);
    }
}
