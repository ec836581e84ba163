//! Energy dispersion
//!
//! Probability density of the measured energy given the true energy, either
//! a Gaussian of fractional width read from a table or the asymmetric two
//! sided exponential-power form fitted to the calibration data.

use std::f64::consts::PI;

use rand::Rng;

use crate::{
    error::{DomainError, ErrorKind},
    quadrature::{Quadrature, QuadratureError},
    table::{upper_bound, GridTable, ParameterSet, TableError},
};

#[derive(thiserror::Error, Debug)]
pub enum EdispError {
    #[error("expected at least 9 energy dispersion scaling coefficients, found {0}")]
    Scaling(usize),
    #[error("expected 6 energy dispersion parameters, found {0}")]
    Parameters(usize),
    #[error("energy dispersion vanishes around {0} MeV")]
    Degenerate(f64),
    #[error("Failed to integrate the energy dispersion")]
    Quadrature(#[from] QuadratureError),
    #[error("Failed to load the energy dispersion parameters")]
    Table(#[from] TableError),
    #[error("Invalid energy dispersion argument")]
    Domain(#[from] DomainError),
}
type Result<T> = std::result::Result<T, EdispError>;
impl EdispError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EdispError::Scaling(_) | EdispError::Parameters(_) | EdispError::Table(_) => {
                ErrorKind::Configuration
            }
            EdispError::Degenerate(_) | EdispError::Quadrature(_) => ErrorKind::NumericDegeneracy,
            EdispError::Domain(_) => ErrorKind::Domain,
        }
    }
}

/// Parameter table columns of [AsymmetricEdisp]
pub const PAR_NAMES: [&str; 6] = ["NORM", "LS1", "RS1", "BIAS", "LS2", "RS2"];
/// Number of energies sampled by [Dispersion::app_energy]
const N_SAMPLES: usize = 200;

/// Quadrature break points on `[emin,emax]` around the true energy
fn energy_breaks(emin: f64, emax: f64, energy: f64) -> Vec<f64> {
    let mut breaks = vec![emin, emax];
    breaks.extend(
        [-0.5, -0.2, -0.1, 0., 0.1, 0.2, 0.5, 1.]
            .iter()
            .map(|d| energy * (1. + d))
            .filter(|&e| e > emin && e < emax),
    );
    breaks.sort_by(f64::total_cmp);
    breaks
}

/// Gaussian dispersion of width `fraction * E`
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianEdisp {
    fraction: GridTable,
}
impl GaussianEdisp {
    pub fn new(fraction: GridTable) -> Self {
        Self { fraction }
    }
    pub fn value(&self, app_energy: f64, energy: f64, cos_theta: f64) -> f64 {
        let sigma = self.fraction.value(energy.log10(), cos_theta, false) * energy;
        (-0.5 * ((app_energy - energy) / sigma).powi(2)).exp() / ((2. * PI).sqrt() * sigma)
    }
}

/// Coefficients of the energy dispersion scale and of the exponential-power
/// shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdispScaling {
    coefs: [f64; 6],
    p1: f64,
    p2: f64,
    t0: f64,
}
impl EdispScaling {
    /// Scaling from `[c0,...,c5, p1, p2, t0]`
    pub fn from_coefficients(values: &[f64]) -> Result<Self> {
        match values {
            [c0, c1, c2, c3, c4, c5, p1, p2, t0] => Ok(Self {
                coefs: [*c0, *c1, *c2, *c3, *c4, *c5],
                p1: *p1,
                p2: *p2,
                t0: *t0,
            }),
            _ => Err(EdispError::Scaling(values.len())),
        }
    }
    /// Scale factor, quadratic in log10(E) and |cos(theta)|
    pub fn scale_factor(&self, log_energy: f64, cos_theta: f64) -> f64 {
        let c = cos_theta.abs();
        let [c0, c1, c2, c3, c4, c5] = self.coefs;
        c0 * log_energy * log_energy + c1 * c * c + c2 * log_energy + c3 * c + c4 * log_energy * c + c5
    }
}

/// Asymmetric energy dispersion parameters of one (energy, cos(theta)) bin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdispParameters {
    pub norm: f64,
    pub ls1: f64,
    pub rs1: f64,
    pub bias: f64,
    pub ls2: f64,
    pub rs2: f64,
}
impl EdispParameters {
    pub fn from_slice(pars: &[f64]) -> Result<Self> {
        match pars {
            [norm, ls1, rs1, bias, ls2, rs2] => Ok(Self {
                norm: *norm,
                ls1: *ls1,
                rs1: *rs1,
                bias: *bias,
                ls2: *ls2,
                rs2: *rs2,
            }),
            _ => Err(EdispError::Parameters(pars.len())),
        }
    }
    /// Dispersion at the scaled energy offset `xx`
    pub fn shape(&self, xx: f64, scaling: &EdispScaling) -> f64 {
        let tt = (xx - self.bias).abs();
        let (s1, s2) = if xx > self.bias {
            (self.rs1, self.rs2)
        } else {
            (self.ls1, self.ls2)
        };
        let EdispScaling { p1, p2, t0, .. } = *scaling;
        if tt > t0 {
            let nscale = (0.5 * ((t0 / s2).powf(p2) - (t0 / s1).powf(p1))).exp();
            self.norm * nscale * (-0.5 * (tt / s2).powf(p2)).exp()
        } else {
            self.norm * (-0.5 * (tt / s1).powf(p1)).exp()
        }
    }
}

/// Two sided exponential-power energy dispersion
#[derive(Debug, Clone)]
pub struct AsymmetricEdisp {
    pars: ParameterSet,
    scaling: EdispScaling,
    quadrature: Quadrature,
}
impl AsymmetricEdisp {
    /// Creates the dispersion, `pars` must hold the [PAR_NAMES] tables
    pub fn new(pars: &ParameterSet, scaling: EdispScaling) -> Result<Self> {
        let tables = PAR_NAMES
            .iter()
            .map(|name| pars.get(name).cloned())
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            pars: ParameterSet::new(PAR_NAMES.iter().map(|n| n.to_string()).collect(), tables)?,
            scaling,
            quadrature: Quadrature::default(),
        })
    }
    fn unnormalized(&self, pars: &EdispParameters, app_energy: f64, energy: f64, scale: f64) -> f64 {
        let xx = (app_energy - energy) / energy / scale;
        pars.shape(xx, &self.scaling) / energy
    }
    /// Parameters of the bin holding (energy, costh), normalized to unity
    /// over [E/10, 10E]
    pub fn resolve(&self, energy: f64, cos_theta: f64) -> Result<(EdispParameters, f64)> {
        let log_energy = energy.log10();
        let scale = self.scaling.scale_factor(log_energy, cos_theta);
        let mut pars = EdispParameters::from_slice(&self.pars.values(log_energy, cos_theta, false))?;
        let norm = self.quadrature.integrate_with_breaks(
            |e| self.unnormalized(&pars, e, energy, scale),
            &energy_breaks(energy / 10., energy * 10., energy),
        )?;
        if !(norm > 0.) {
            return Err(EdispError::Degenerate(energy));
        }
        pars.norm /= norm;
        Ok((pars, scale))
    }
    pub fn value(&self, app_energy: f64, energy: f64, cos_theta: f64) -> Result<f64> {
        let (pars, scale) = self.resolve(energy, cos_theta)?;
        Ok(self.unnormalized(&pars, app_energy, energy, scale))
    }
}

/// Energy dispersion variants
#[derive(Debug, Clone)]
pub enum Dispersion {
    Gaussian(GaussianEdisp),
    Asymmetric(AsymmetricEdisp),
}
impl From<GaussianEdisp> for Dispersion {
    fn from(edisp: GaussianEdisp) -> Self {
        Dispersion::Gaussian(edisp)
    }
}
impl From<AsymmetricEdisp> for Dispersion {
    fn from(edisp: AsymmetricEdisp) -> Self {
        Dispersion::Asymmetric(edisp)
    }
}
impl Dispersion {
    fn cos_theta(energy: f64, theta: f64) -> Result<f64> {
        DomainError::check_energy(energy)?;
        Ok(DomainError::check_non_negative("inclination", theta)?
            .to_radians()
            .cos())
    }
    /// Returns a density function of the measured energy for a given true
    /// energy (MeV) and inclination (degree)
    fn density(&self, energy: f64, theta: f64) -> Result<Box<dyn Fn(f64) -> f64 + '_>> {
        let cos_theta = Self::cos_theta(energy, theta)?;
        Ok(match self {
            Dispersion::Gaussian(edisp) => {
                Box::new(move |app_energy| edisp.value(app_energy, energy, cos_theta))
            }
            Dispersion::Asymmetric(edisp) => {
                let (pars, scale) = edisp.resolve(energy, cos_theta)?;
                Box::new(move |app_energy| edisp.unnormalized(&pars, app_energy, energy, scale))
            }
        })
    }
    fn quadrature(&self) -> Quadrature {
        match self {
            Dispersion::Asymmetric(edisp) => edisp.quadrature.clone(),
            Dispersion::Gaussian(_) => Quadrature::default(),
        }
    }
    /// Density (per MeV) of measuring `app_energy` for a photon of true
    /// `energy`
    pub fn value(&self, app_energy: f64, energy: f64, theta: f64, _phi: f64) -> Result<f64> {
        DomainError::check_non_negative("measured energy", app_energy)?;
        Ok(self.density(energy, theta)?(app_energy))
    }
    /// Probability of measuring an energy within [emin, emax]
    pub fn integral(&self, emin: f64, emax: f64, energy: f64, theta: f64, _phi: f64) -> Result<f64> {
        DomainError::check_non_negative("measured energy", emin)?;
        if !(emax > emin) {
            return Ok(0.);
        }
        let density = self.density(energy, theta)?;
        Ok(self
            .quadrature()
            .integrate_with_breaks(density, &energy_breaks(emin, emax, energy))?)
    }
    /// Draws a measured energy for a photon of true `energy`
    pub fn app_energy<R: Rng>(&self, energy: f64, theta: f64, _phi: f64, rng: &mut R) -> Result<f64> {
        let density = self.density(energy, theta)?;
        let (emin, emax) = (energy / 10., energy * 10.);
        let step = (emax / emin).ln() / (N_SAMPLES - 1) as f64;
        let energies: Vec<f64> = (0..N_SAMPLES)
            .map(|i| emin * (step * i as f64).exp())
            .collect();
        let integrand: Vec<f64> = energies.iter().map(|&e| density(e)).collect();
        let mut cdf = vec![0f64; N_SAMPLES];
        for i in 1..N_SAMPLES {
            cdf[i] = cdf[i - 1]
                + 0.5 * (integrand[i] + integrand[i - 1]) * (energies[i] - energies[i - 1]);
        }
        let total = cdf[N_SAMPLES - 1];
        if !(total > 0.) {
            return Err(EdispError::Degenerate(energy));
        }
        let xi = rng.gen::<f64>() * total;
        let i = (upper_bound(&cdf, xi).max(1) - 1).min(N_SAMPLES - 2);
        Ok((xi - cdf[i]) / (cdf[i + 1] - cdf[i]) * (energies[i + 1] - energies[i]) + energies[i])
    }
    /// Mean measured energy for a photon of true `energy`
    pub fn mean_app_energy(&self, energy: f64, theta: f64, _phi: f64) -> Result<f64> {
        let density = self.density(energy, theta)?;
        let quadrature = self.quadrature();
        let breaks = energy_breaks(0., energy * 10., energy);
        let moment = quadrature.integrate_with_breaks(|e| e * density(e), &breaks)?;
        let norm = quadrature.integrate_with_breaks(&density, &breaks)?;
        if !(norm > 0.) {
            return Err(EdispError::Degenerate(energy));
        }
        Ok(moment / norm)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, SeedableRng};

    fn flat(value: f64) -> GridTable {
        GridTable::new(
            &[30., 1e3, 1e4],
            &[1e3, 1e4, 1e6],
            &[0.2, 0.6],
            &[0.6, 1.],
            vec![value; 6],
        )
        .unwrap()
    }

    pub fn gaussian() -> Dispersion {
        GaussianEdisp::new(flat(0.1)).into()
    }

    pub fn asymmetric() -> Dispersion {
        let values = [1., 0.8, 1.2, 0.1, 1.5, 2., 0.];
        let pars = ParameterSet::new(
            PAR_NAMES.iter().map(|n| n.to_string()).collect(),
            values[..6].iter().map(|&v| flat(v)).collect(),
        )
        .unwrap();
        let scaling =
            EdispScaling::from_coefficients(&[0., 0., 0., 0., 0., 0.1, 1.6, 0.6, 1.5]).unwrap();
        AsymmetricEdisp::new(&pars, scaling).unwrap().into()
    }

    #[test]
    fn gaussian_normalization() {
        let edisp = gaussian();
        let total = edisp.integral(100., 1e4, 1e3, 30., 0.).unwrap();
        assert_relative_eq!(total, 1., max_relative = 1e-5);
        assert_relative_eq!(
            edisp.value(1e3, 1e3, 30., 0.).unwrap(),
            1. / ((2. * PI).sqrt() * 100.),
            max_relative = 1e-12
        );
        assert_relative_eq!(
            edisp.mean_app_energy(1e3, 30., 0.).unwrap(),
            1e3,
            max_relative = 1e-4
        );
    }

    #[test]
    fn asymmetric_normalization() {
        let edisp = asymmetric();
        for energy in [100., 3e3, 1e5] {
            let total = edisp.integral(energy / 10., energy * 10., energy, 20., 0.).unwrap();
            assert_relative_eq!(total, 1., max_relative = 1e-4);
        }
    }

    #[test]
    fn asymmetric_is_biased() {
        let edisp = asymmetric();
        let mean = edisp.mean_app_energy(1e3, 20., 0.).unwrap();
        assert!(mean > 1e3, "{mean}");
        let below = edisp.value(1e3 * (1. - 0.01), 1e3, 20., 0.).unwrap();
        let above = edisp.value(1e3 * (1. + 0.02), 1e3, 20., 0.).unwrap();
        assert!(above > below);
    }

    #[test]
    fn scale_factor() {
        let s = EdispScaling::from_coefficients(&[1., 2., 3., 4., 5., 6., 1., 1., 1.]).unwrap();
        assert_relative_eq!(s.scale_factor(2., -0.5), 4. + 0.5 + 6. + 2. + 5. + 6.);
        assert!(EdispScaling::from_coefficients(&[1., 2.]).is_err());
    }

    #[test]
    fn sampling() {
        let edisp = gaussian();
        let mut rng = StdRng::seed_from_u64(42);
        let n = 2000;
        let samples: Vec<f64> = (0..n)
            .map(|_| edisp.app_energy(1e3, 10., 0., &mut rng).unwrap())
            .collect();
        assert!(samples.iter().all(|&e| (100. ..=1e4).contains(&e)));
        let mean = samples.iter().sum::<f64>() / n as f64;
        assert_relative_eq!(mean, 1e3, max_relative = 2e-2);
    }

    #[test]
    fn invalid_arguments() {
        let edisp = gaussian();
        assert!(edisp.value(1e3, -1., 0., 0.).is_err());
        assert!(edisp.value(-1., 1e3, 0., 0.).is_err());
        assert_eq!(edisp.integral(2e3, 1e3, 1e3, 0., 0.).unwrap(), 0.);
    }
}
