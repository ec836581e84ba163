//! Point spread function
//!
//! A two components King function PSF ([KingPsf]) with a lazily filled cache
//! of its integrals over a region of interest ([AngularIntegralCache]).

mod cache;
mod king;
pub use cache::AngularIntegralCache;
pub use king::{
    king, king_integral, EventType, Evaluation, KingParameters, KingPsf, PsfScaling,
    ResolvedParameters, PAR_NAMES, THETA_MAX, THRESHOLD_ENERGY,
};
#[cfg(test)]
pub(crate) use king::tests as fixtures;

use crate::{
    cone::{AcceptanceCone, SkyDir},
    config::{CacheConfig, ConfigError},
    error::{DomainError, ErrorKind},
    quadrature::QuadratureError,
    table::TableError,
};

#[derive(thiserror::Error, Debug)]
pub enum PsfError {
    #[error("PSF parameter {name} is zero at {energy} MeV")]
    ZeroParameter { name: &'static str, energy: f64 },
    #[error("PSF normalization failed at {0} MeV")]
    Normalization(f64),
    #[error("expected 6 King PSF parameters, found {0}")]
    Parameters(usize),
    #[error("expected at least 5 PSF scaling coefficients, found {0}")]
    Scaling(usize),
    #[error("unknown event type {0:?}, expected front or back")]
    EventType(String),
    #[error("Failed to integrate the PSF")]
    Quadrature(#[from] QuadratureError),
    #[error("Failed to load the PSF parameters")]
    Table(#[from] TableError),
    #[error("Invalid PSF integral cache settings")]
    Config(#[from] ConfigError),
    #[error("Invalid PSF argument")]
    Domain(#[from] DomainError),
}
type Result<T> = std::result::Result<T, PsfError>;
impl PsfError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PsfError::ZeroParameter { .. }
            | PsfError::Normalization(_)
            | PsfError::Quadrature(_) => ErrorKind::NumericDegeneracy,
            PsfError::Parameters(_)
            | PsfError::Scaling(_)
            | PsfError::EventType(_)
            | PsfError::Table(_)
            | PsfError::Config(_) => ErrorKind::Configuration,
            PsfError::Domain(_) => ErrorKind::Domain,
        }
    }
}

/// Largest radius (degree) of [Psf::angular_containment]
const MAX_CONTAINMENT_RADIUS: f64 = 90.;

/// PSF with its region of interest integral cache
///
/// Angles are in degrees and energies in MeV. The cache is created on the
/// first region of interest query and retargeted when the cone changes.
#[derive(Debug, Clone)]
pub struct Psf {
    king: KingPsf,
    config: CacheConfig,
    cache: Option<AngularIntegralCache>,
    /// parameters of the last region of interest query, keyed by
    /// (log10(energy), cos(theta))
    last: Option<(f64, f64, ResolvedParameters)>,
}
impl From<KingPsf> for Psf {
    fn from(king: KingPsf) -> Self {
        Self {
            king,
            config: CacheConfig::default(),
            cache: None,
            last: None,
        }
    }
}
impl Psf {
    /// Creates the PSF, checking the cache settings against its width scaling
    pub fn new(king: KingPsf, config: CacheConfig) -> Result<Self> {
        let psf = Self {
            king,
            config,
            cache: None,
            last: None,
        };
        psf.config.check()?;
        CacheConfig::check_width_range(psf.width_range())?;
        Ok(psf)
    }
    pub fn king(&self) -> &KingPsf {
        &self.king
    }
    pub fn cache(&self) -> Option<&AngularIntegralCache> {
        self.cache.as_ref()
    }
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
    fn cos_theta(energy: f64, theta: f64) -> Result<f64> {
        DomainError::check_energy(energy)?;
        Ok(DomainError::check_non_negative("inclination", theta)?
            .to_radians()
            .cos())
    }
    /// PSF density per steradian at `separation` from the source
    pub fn value(&self, separation: f64, energy: f64, theta: f64, _phi: f64) -> Result<f64> {
        let separation = DomainError::check_non_negative("separation", separation)?;
        self.king
            .density(separation.to_radians(), energy, Self::cos_theta(energy, theta)?)
    }
    /// Fraction of the PSF within `radius` of the source
    pub fn angular_integral(&self, energy: f64, theta: f64, _phi: f64, radius: f64) -> Result<f64> {
        let radius = DomainError::check_non_negative("radius", radius)?;
        self.king
            .integral(radius.to_radians(), energy, Self::cos_theta(energy, theta)?)
    }
    /// Radius enclosing `fraction` of the PSF
    pub fn angular_containment(&self, energy: f64, theta: f64, phi: f64, fraction: f64) -> Result<f64> {
        if !(fraction > 0. && fraction < 1.) {
            return Err(DomainError::Fraction(fraction).into());
        }
        let (mut lo, mut hi) = (0f64, MAX_CONTAINMENT_RADIUS);
        if self.angular_integral(energy, theta, phi, hi)? < fraction {
            return Ok(hi);
        }
        while hi - lo > 1e-3 * hi {
            let mid = 0.5 * (lo + hi);
            if self.angular_integral(energy, theta, phi, mid)? < fraction {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Ok(0.5 * (lo + hi))
    }
    /// Fraction of the PSF inside `cone` for a source `offset` away from
    /// the cone center
    pub fn containment(
        &mut self,
        offset: f64,
        energy: f64,
        cos_theta: f64,
        cone: &AcceptanceCone,
    ) -> Result<f64> {
        DomainError::check_energy(energy)?;
        let psi = DomainError::check_non_negative("offset", offset)?.to_radians();
        if !(-1. ..=1.).contains(&cos_theta) {
            return Err(DomainError::CosTheta(cos_theta).into());
        }
        let log_energy = energy.log10();
        let pars = match self.last {
            Some((last_log_energy, last_cos_theta, pars))
                if last_log_energy == log_energy && last_cos_theta == cos_theta =>
            {
                pars
            }
            _ => {
                let pars = self.king.resolve_query(energy, cos_theta)?;
                self.last = Some((log_energy, cos_theta, pars));
                pars
            }
        };
        let cache = match self.cache.take() {
            Some(mut cache) => {
                cache.retarget(cone);
                cache
            }
            None => AngularIntegralCache::new(*cone, &self.config, self.width_range())?
                .theta_max(self.king.get_theta_max()),
        };
        let cache = self.cache.insert(cache);
        pars.evaluate(|pars| cache.containment(psi, pars))
    }
    /// Smallest (front events) and largest (back events) PSF widths (rad)
    /// expected by the cache
    pub fn width_range(&self) -> (f64, f64) {
        let scaling = self.king.scaling();
        let (min, max) = (self.config.min_width, self.config.max_width);
        (
            scaling.scale_factor(min.energy, EventType::Front) * min.factor,
            scaling.scale_factor(max.energy, EventType::Back) * max.factor,
        )
    }
    /// Fraction of the PSF of a source at `src_dir` inside the first cone
    /// of `cones`
    pub fn angular_integral_cones(
        &mut self,
        energy: f64,
        src_dir: &SkyDir,
        theta: f64,
        _phi: f64,
        cones: &[AcceptanceCone],
    ) -> Result<f64> {
        let cone = cones.first().ok_or(DomainError::NoAcceptanceCone)?;
        let offset = src_dir.difference(cone.center()).to_degrees();
        self.containment(offset, energy, Self::cos_theta(energy, theta)?, cone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn psf() -> Psf {
        Psf::new(
            fixtures::king_psf(),
            CacheConfig::default().n_offsets(121).n_widths(25),
        )
        .unwrap()
    }

    #[test]
    fn containment_is_monotonic() {
        let psf = psf();
        let mut last = 0.;
        for radius in [0., 0.1, 0.5, 1., 2., 5., 10., 30., 60., 90.] {
            let value = psf.angular_integral(1e3, 30., 0., radius).unwrap();
            assert!(value >= last, "{value} < {last} at {radius}deg");
            last = value;
        }
        assert_eq!(psf.angular_integral(1e3, 30., 0., 0.).unwrap(), 0.);
        assert_relative_eq!(last, 1., max_relative = 1e-5);
    }

    #[test]
    fn containment_radius() {
        let psf = psf();
        let r68 = psf.angular_containment(1e3, 30., 0., 0.68).unwrap();
        let fraction = psf.angular_integral(1e3, 30., 0., r68).unwrap();
        assert_relative_eq!(fraction, 0.68, max_relative = 1e-2);
        assert!(psf.angular_containment(1e3, 30., 0., 1.2).is_err());
    }

    #[test]
    fn domain_errors() {
        let mut psf = psf();
        assert!(matches!(
            psf.value(-1., 1e3, 0., 0.),
            Err(PsfError::Domain(DomainError::Negative { .. }))
        ));
        assert!(psf.angular_integral(0., 10., 0., 1.).is_err());
        assert!(matches!(
            psf.angular_integral_cones(1e3, &SkyDir::from_radec(0., 0.), 0., 0., &[]),
            Err(PsfError::Domain(DomainError::NoAcceptanceCone))
        ));
    }

    #[test]
    fn malformed_cache_settings() {
        let cone = AcceptanceCone::new(SkyDir::from_radec(0., 0.), 10.).unwrap();
        for config in [
            CacheConfig::default().n_offsets(0),
            CacheConfig::default().n_offsets(1),
            CacheConfig::default().n_widths(1),
            CacheConfig::default().max_offset(-1.),
        ] {
            let err = Psf::new(fixtures::king_psf(), config.clone()).unwrap_err();
            assert!(matches!(err, PsfError::Config(_)));
            assert_eq!(err.kind(), ErrorKind::Configuration);
            // the cache built on the first region of interest query checks the
            // settings as well
            let mut psf = Psf::from(fixtures::king_psf());
            psf.config = config;
            assert!(matches!(
                psf.containment(0., 1e3, 0.8, &cone),
                Err(PsfError::Config(_))
            ));
            assert!(psf.cache().is_none());
        }
    }

    #[test]
    fn containment_beyond_theta_max() {
        let mut psf = Psf::new(
            KingPsf::new(
                &fixtures::parameter_set([0.4, 0.3, 0.5, 1.2, 2.2, 2.8]),
                fixtures::scaling(),
                EventType::Back,
            )
            .unwrap(),
            CacheConfig::default().n_offsets(121).n_widths(25),
        )
        .unwrap();
        let theta = 0.8f64.acos().to_degrees();
        let edge = psf.angular_integral(35., theta, 0., 90.).unwrap();
        for radius in [120., 180.] {
            let value = psf.angular_integral(35., theta, 0., radius).unwrap();
            assert_relative_eq!(value, edge, max_relative = 1e-9);
        }
        assert_relative_eq!(edge, 1., max_relative = 1e-5);

        let center = SkyDir::from_radec(0., 0.);
        let wide = psf
            .containment(0., 35., 0.8, &AcceptanceCone::new(center, 170.).unwrap())
            .unwrap();
        assert_relative_eq!(wide, edge, max_relative = 1e-2);
        let right = psf
            .containment(0., 35., 0.8, &AcceptanceCone::new(center, 100.).unwrap())
            .unwrap();
        assert_relative_eq!(wide, right, max_relative = 1e-9);
    }

    #[test]
    fn low_energy_parameters_are_memoized() {
        let mut psf = psf();
        let cone = AcceptanceCone::new(SkyDir::from_radec(0., 0.), 10.).unwrap();
        let a = psf.containment(2., 50., 0.8, &cone).unwrap();
        let king_calls = psf.king().quadrature().calls();
        let b = psf.containment(2., 50., 0.8, &cone).unwrap();
        assert_eq!(a, b);
        assert_eq!(psf.king().quadrature().calls(), king_calls);
        // a new query resolves its parameters again
        psf.containment(2., 60., 0.8, &cone).unwrap();
        assert!(psf.king().quadrature().calls() > king_calls);
    }

    #[test]
    fn roi_containment_matches_cone_integral() {
        let mut psf = psf();
        let center = SkyDir::from_radec(30., 10.);
        let cone = AcceptanceCone::new(center, 5.).unwrap();
        let value = psf.containment(0., 1e3, 0.8, &cone).unwrap();
        let expected = psf
            .angular_integral(1e3, 0.8f64.acos().to_degrees(), 0., 5.)
            .unwrap();
        assert_relative_eq!(value, expected, max_relative = 1e-2);
    }
}
