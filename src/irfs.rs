//! Instrument response functions of one event type
//!
//! Bundles the epoch dependent effective area, PSF and energy dispersion.
//! Angles are in degrees, energies in MeV and times are MET in seconds;
//! a `None` time selects the first epoch.

use rand::Rng;

use crate::{
    aeff::Aeff,
    cone::{AcceptanceCone, SkyDir},
    edisp::Dispersion,
    epoch::EpochDep,
    error::Error,
    psf::{EventType, Psf},
};

type Result<T> = std::result::Result<T, Error>;

/// Response functions of one event type
#[derive(Debug, Clone)]
pub struct Irfs {
    event_type: EventType,
    aeff: EpochDep<Aeff>,
    psf: EpochDep<Psf>,
    edisp: EpochDep<Dispersion>,
}
impl Irfs {
    pub fn new(
        event_type: EventType,
        aeff: EpochDep<Aeff>,
        psf: EpochDep<Psf>,
        edisp: EpochDep<Dispersion>,
    ) -> Self {
        Self {
            event_type,
            aeff,
            psf,
            edisp,
        }
    }
    pub fn event_type(&self) -> EventType {
        self.event_type
    }
    pub fn aeff(&self) -> &EpochDep<Aeff> {
        &self.aeff
    }
    pub fn psf(&self) -> &EpochDep<Psf> {
        &self.psf
    }
    pub fn psf_mut(&mut self) -> &mut EpochDep<Psf> {
        &mut self.psf
    }
    pub fn edisp(&self) -> &EpochDep<Dispersion> {
        &self.edisp
    }
    /// Effective area in cm^2
    pub fn effective_area(&self, energy: f64, theta: f64, phi: f64, time: Option<f64>) -> Result<f64> {
        Ok(self.aeff.get(time)?.value(energy, theta, phi)?)
    }
    /// PSF density per steradian at `separation` from the source
    pub fn psf_value(
        &self,
        separation: f64,
        energy: f64,
        theta: f64,
        phi: f64,
        time: Option<f64>,
    ) -> Result<f64> {
        Ok(self.psf.get(time)?.value(separation, energy, theta, phi)?)
    }
    /// Fraction of the PSF within `radius` of the source
    pub fn psf_angular_integral(
        &self,
        energy: f64,
        theta: f64,
        phi: f64,
        radius: f64,
        time: Option<f64>,
    ) -> Result<f64> {
        Ok(self
            .psf
            .get(time)?
            .angular_integral(energy, theta, phi, radius)?)
    }
    /// Fraction of the PSF of a source at `src_dir` inside the first of
    /// `cones`
    pub fn psf_angular_integral_cones(
        &mut self,
        energy: f64,
        src_dir: &SkyDir,
        theta: f64,
        phi: f64,
        cones: &[AcceptanceCone],
        time: Option<f64>,
    ) -> Result<f64> {
        Ok(self
            .psf
            .get_mut(time)?
            .angular_integral_cones(energy, src_dir, theta, phi, cones)?)
    }
    /// Radius enclosing `fraction` of the PSF
    pub fn psf_containment_radius(
        &self,
        energy: f64,
        theta: f64,
        phi: f64,
        fraction: f64,
        time: Option<f64>,
    ) -> Result<f64> {
        Ok(self
            .psf
            .get(time)?
            .angular_containment(energy, theta, phi, fraction)?)
    }
    /// Energy dispersion density per MeV
    pub fn edisp_value(
        &self,
        app_energy: f64,
        energy: f64,
        theta: f64,
        phi: f64,
        time: Option<f64>,
    ) -> Result<f64> {
        Ok(self.edisp.get(time)?.value(app_energy, energy, theta, phi)?)
    }
    /// Probability of measuring an energy within [emin, emax]
    pub fn edisp_integral(
        &self,
        emin: f64,
        emax: f64,
        energy: f64,
        theta: f64,
        phi: f64,
        time: Option<f64>,
    ) -> Result<f64> {
        Ok(self
            .edisp
            .get(time)?
            .integral(emin, emax, energy, theta, phi)?)
    }
    /// Draws a measured energy
    pub fn app_energy<R: Rng>(
        &self,
        energy: f64,
        theta: f64,
        phi: f64,
        time: Option<f64>,
        rng: &mut R,
    ) -> Result<f64> {
        Ok(self.edisp.get(time)?.app_energy(energy, theta, phi, rng)?)
    }
    /// Mean measured energy
    pub fn mean_app_energy(&self, energy: f64, theta: f64, phi: f64, time: Option<f64>) -> Result<f64> {
        Ok(self.edisp.get(time)?.mean_app_energy(energy, theta, phi)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::CacheConfig,
        error::{DomainError, ErrorKind},
        table::GridTable,
    };

    fn irfs() -> Irfs {
        let aeff: Aeff = GridTable::new(&[30., 1e3], &[1e3, 1e6], &[0.2], &[1.], vec![0.8, 0.9])
            .unwrap()
            .into();
        let psf = Psf::new(
            crate::psf::fixtures::king_psf(),
            CacheConfig::default().n_offsets(61).n_widths(20),
        )
        .unwrap();
        let mut psfs = EpochDep::new();
        psfs.push(0., psf.clone()).unwrap();
        psfs.push(1e8, psf).unwrap();
        let mut aeffs = EpochDep::new();
        aeffs.push(0., aeff).unwrap();
        Irfs::new(
            EventType::Front,
            aeffs,
            psfs,
            EpochDep::from(crate::edisp::tests::gaussian()),
        )
    }

    #[test]
    fn evaluation() {
        let mut irfs = irfs();
        assert!(irfs.effective_area(1e3, 10., 0., Some(10.)).unwrap() > 0.);
        assert!(irfs.psf_value(0.1, 1e3, 10., 0., None).unwrap() > 0.);
        let fraction = irfs.psf_angular_integral(1e3, 10., 0., 5., Some(2e8)).unwrap();
        assert!(fraction > 0.9 && fraction <= 1.);
        let cone = AcceptanceCone::new(SkyDir::from_radec(0., 0.), 5.).unwrap();
        let roi = irfs
            .psf_angular_integral_cones(1e3, &SkyDir::from_radec(1., 0.), 10., 0., &[cone], None)
            .unwrap();
        assert!(roi > 0.9 && roi <= 1. + 1e-6, "{roi}");
        assert!(irfs.edisp_integral(100., 1e4, 1e3, 10., 0., None).unwrap() > 0.99);
    }

    #[test]
    fn uncovered_time() {
        let irfs = irfs();
        let err = irfs.effective_area(1e3, 10., 0., Some(-5.)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Domain);
        assert!(matches!(
            err,
            Error::Epoch(crate::epoch::EpochError::Domain(DomainError::NotCovered(_)))
        ));
    }
}
