//! # Instrument response functions
//!
//! Effective area, point spread function and energy dispersion of a pair
//! conversion gamma-ray telescope, evaluated from binned calibration tables
//! of log10(energy) and cos(inclination).
//!
//! ```no_run
//! use lat_irfs::{CalibrationLoader, EventType};
//!
//! # fn main() -> Result<(), lat_irfs::Error> {
//! let irfs = CalibrationLoader::new("data/P8R3_SOURCE_V3")
//!     .event_type(EventType::Front)
//!     .load()?;
//! let r68 = irfs.psf_containment_radius(1e3, 30., 0., 0.68, None)?;
//! println!("PSF 68% containment radius at 1GeV: {r68:.3}deg");
//! # Ok(())
//! # }
//! ```

pub mod aeff;
pub mod cone;
pub mod config;
pub mod edisp;
pub mod epoch;
pub mod error;
pub mod irfs;
pub mod loader;
pub mod psf;
pub mod quadrature;
pub mod registry;
pub mod table;

pub use aeff::Aeff;
pub use cone::{AcceptanceCone, SkyDir};
pub use config::{CacheConfig, ConfigError};
pub use edisp::{AsymmetricEdisp, Dispersion, GaussianEdisp};
pub use epoch::{validity_start, EpochDep};
pub use error::{DomainError, Error, ErrorKind};
pub use irfs::Irfs;
pub use loader::CalibrationLoader;
pub use psf::{AngularIntegralCache, EventType, Evaluation, KingPsf, Psf};
pub use quadrature::Quadrature;
pub use registry::IrfRegistry;
pub use table::{Bilinear, GridTable};
