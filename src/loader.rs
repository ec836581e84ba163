//! Calibration directory loader
//!
//! An epoch directory holds the tables of both event types:
//!
//! | file | columns |
//! |------|---------|
//! | `psf_<type>.csv` | NCORE, NTAIL, SCORE, STAIL, GCORE, GTAIL |
//! | `psf_scaling.csv` | PSFSCALE |
//! | `aeff_<type>.csv` | EFFAREA |
//! | `edisp_<type>.csv` | FRACTION or NORM, LS1, RS1, BIAS, LS2, RS2 |
//! | `edisp_scaling.csv` | EDISPSCALE (asymmetric dispersion only) |
//!
//! with `<type>` either `front` or `back`. Every table file may be gzip
//! compressed (`.csv.gz`).

use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use crate::{
    aeff::Aeff,
    config::CacheConfig,
    edisp::{self, AsymmetricEdisp, Dispersion, EdispError, EdispScaling, GaussianEdisp},
    epoch::{self, EpochDep, EpochError},
    irfs::Irfs,
    psf::{self, EventType, Evaluation, KingPsf, Psf, PsfError, PsfScaling},
    table::{read_columns, read_scaling, ParameterSet, TableError},
};

#[derive(thiserror::Error, Debug)]
pub enum LoaderError {
    #[error("no calibration epoch registered")]
    NoEpoch,
    #[error("Failed to load a calibration table")]
    Table(#[from] TableError),
    #[error("Failed to build the PSF")]
    Psf(#[from] PsfError),
    #[error("Failed to build the energy dispersion")]
    Edisp(#[from] EdispError),
    #[error("Invalid calibration epochs")]
    Epoch(#[from] EpochError),
}
type Result<T> = std::result::Result<T, LoaderError>;

/// Gaussian energy dispersion fractional width column
pub const EDISP_FRACTION: &str = "FRACTION";

/// Loads the response functions of one event type from calibration
/// directories, one directory per epoch
#[derive(Debug, Clone)]
pub struct CalibrationLoader {
    epochs: Vec<(f64, PathBuf)>,
    event_type: EventType,
    evaluation: Evaluation,
    cache: CacheConfig,
}
impl Default for CalibrationLoader {
    fn default() -> Self {
        Self {
            epochs: vec![],
            event_type: EventType::Front,
            evaluation: Evaluation::default(),
            cache: CacheConfig::default(),
        }
    }
}
impl CalibrationLoader {
    /// Loader of a single calibration valid at any time
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            epochs: vec![(f64::NEG_INFINITY, path.as_ref().to_path_buf())],
            ..Default::default()
        }
    }
    /// Adds a calibration valid from MET `start` onward
    pub fn epoch<P: AsRef<Path>>(mut self, start: f64, path: P) -> Self {
        self.epochs.push((start, path.as_ref().to_path_buf()));
        self
    }
    /// Adds a calibration valid from the date `YYYY-MM-DD` and time
    /// `hh:mm:ss` onward
    pub fn dated_epoch<P: AsRef<Path>>(self, date: &str, time: &str, path: P) -> Result<Self> {
        Ok(self.epoch(epoch::validity_start(date, time)?, path))
    }
    pub fn event_type(self, event_type: EventType) -> Self {
        Self { event_type, ..self }
    }
    pub fn evaluation(self, evaluation: Evaluation) -> Self {
        Self { evaluation, ..self }
    }
    pub fn cache_config(self, cache: CacheConfig) -> Self {
        Self { cache, ..self }
    }
    pub fn epochs(&self) -> &[(f64, PathBuf)] {
        &self.epochs
    }
    fn table_path(&self, dir: &Path, quantity: &str) -> PathBuf {
        dir.join(format!("{quantity}_{}.csv", self.event_type))
    }
    /// Loads the effective area of the epoch in `dir`
    pub fn load_aeff(&self, dir: &Path) -> Result<Aeff> {
        let columns = read_columns(self.table_path(dir, "aeff"))?;
        Ok(columns.table("EFFAREA")?.into())
    }
    /// Loads the PSF of the epoch in `dir`
    pub fn load_psf(&self, dir: &Path) -> Result<Psf> {
        let columns = read_columns(self.table_path(dir, "psf"))?;
        let pars = ParameterSet::from_columns(&columns, &psf::PAR_NAMES)?;
        let scaling = PsfScaling::from_coefficients(&read_scaling(
            dir.join("psf_scaling.csv"),
            "PSFSCALE",
        )?)?;
        let king = KingPsf::new(&pars, scaling, self.event_type)?.evaluation(self.evaluation);
        Ok(Psf::new(king, self.cache.clone())?)
    }
    /// Loads the energy dispersion of the epoch in `dir`
    pub fn load_edisp(&self, dir: &Path) -> Result<Dispersion> {
        let columns = read_columns(self.table_path(dir, "edisp"))?;
        if columns.column(EDISP_FRACTION).is_ok() {
            return Ok(GaussianEdisp::new(columns.table(EDISP_FRACTION)?).into());
        }
        let pars = ParameterSet::from_columns(&columns, &edisp::PAR_NAMES)?;
        let scaling = EdispScaling::from_coefficients(&read_scaling(
            dir.join("edisp_scaling.csv"),
            "EDISPSCALE",
        )?)?;
        Ok(AsymmetricEdisp::new(&pars, scaling)?.into())
    }
    /// Loads all the epochs
    pub fn load(&self) -> Result<Irfs> {
        if self.epochs.is_empty() {
            return Err(LoaderError::NoEpoch);
        }
        let now = Instant::now();
        let mut epochs = self.epochs.clone();
        epochs.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (mut aeff, mut psf, mut edisp) = (EpochDep::new(), EpochDep::new(), EpochDep::new());
        for (start, dir) in &epochs {
            log::info!("Loading {} IRFs from {:?}...", self.event_type, dir);
            aeff.push(*start, self.load_aeff(dir)?)?;
            psf.push(*start, self.load_psf(dir)?)?;
            edisp.push(*start, self.load_edisp(dir)?)?;
        }
        log::info!(
            "... {} epoch(s) of {} IRFs loaded in {:}ms",
            epochs.len(),
            self.event_type,
            now.elapsed().as_millis()
        );
        Ok(Irfs::new(self.event_type, aeff, psf, edisp))
    }
}
