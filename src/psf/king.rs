use std::{
    f64::consts::{FRAC_PI_2, PI},
    fmt,
    str::FromStr,
};

use strum_macros::EnumIter;

use super::{PsfError, Result};
use crate::{
    quadrature::Quadrature,
    table::{CornerParameters, Corners, ParameterSet},
};

/// Below this energy (MeV) the PSF is normalized by numerical integration
pub const THRESHOLD_ENERGY: f64 = 120.;
/// Upper bound (rad) of the solid angle normalization integral
pub const THETA_MAX: f64 = FRAC_PI_2;
/// Parameter table columns, in [KingParameters] order
pub const PAR_NAMES: [&str; 6] = ["NCORE", "NTAIL", "SCORE", "STAIL", "GCORE", "GTAIL"];

/// Shape fits were bounded at exactly 1 where the King profile vanishes
fn shape(gamma: f64) -> f64 {
    if gamma == 1. {
        1.001
    } else {
        gamma
    }
}
/// King profile `(1-1/g)(1+u/g)^-g`
pub fn king(u: f64, gamma: f64) -> f64 {
    let gamma = shape(gamma);
    (1. - 1. / gamma) * (1. + u / gamma).powf(-gamma)
}
/// Integral of the King profile over `[0,u]`
pub fn king_integral(u: f64, gamma: f64) -> f64 {
    let gamma = shape(gamma);
    1. - (1. + u / gamma).powf(1. - gamma)
}

/// Quadrature break points on `[lo,hi]` at multiples of the PSF widths
pub(crate) fn theta_breaks(lo: f64, hi: f64, widths: &[f64]) -> Vec<f64> {
    let mut breaks = vec![lo, hi];
    for &width in widths {
        let mut theta = 0.25 * width;
        while theta < hi {
            if theta > lo {
                breaks.push(theta);
            }
            theta *= 2.;
        }
    }
    breaks.sort_by(f64::total_cmp);
    breaks.dedup();
    breaks
}

/// Conversion layer of the photon
#[derive(EnumIter, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum EventType {
    Front,
    Back,
}
impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Front => write!(f, "front"),
            EventType::Back => write!(f, "back"),
        }
    }
}
impl FromStr for EventType {
    type Err = PsfError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "front" => Ok(EventType::Front),
            "back" => Ok(EventType::Back),
            _ => Err(PsfError::EventType(s.to_string())),
        }
    }
}

/// PSF width scale factor `sqrt((a (E/100)^p)^2 + b^2)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PsfScaling {
    front: (f64, f64),
    back: (f64, f64),
    index: f64,
}
impl PsfScaling {
    pub fn new(front: (f64, f64), back: (f64, f64), index: f64) -> Self {
        Self { front, back, index }
    }
    /// Scaling from the coefficients `[front a, front b, back a, back b, p]`
    pub fn from_coefficients(coefs: &[f64]) -> Result<Self> {
        match coefs {
            [fa, fb, ba, bb, p, ..] => Ok(Self::new((*fa, *fb), (*ba, *bb), *p)),
            _ => Err(PsfError::Scaling(coefs.len())),
        }
    }
    /// Scale factor (rad) at `energy` (MeV)
    pub fn scale_factor(&self, energy: f64, event_type: EventType) -> f64 {
        let (a, b) = match event_type {
            EventType::Front => self.front,
            EventType::Back => self.back,
        };
        let tt = (energy / 100.).powf(self.index);
        (a * tt).hypot(b)
    }
}

/// Resolved parameters of the 2 components King PSF
///
/// Widths are in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KingParameters {
    pub ncore: f64,
    pub ntail: f64,
    pub score: f64,
    pub stail: f64,
    pub gcore: f64,
    pub gtail: f64,
}
impl KingParameters {
    /// Parameters from a [PAR_NAMES] ordered slice
    pub fn from_slice(pars: &[f64]) -> Result<Self> {
        match pars {
            [ncore, ntail, score, stail, gcore, gtail] => Ok(Self {
                ncore: *ncore,
                ntail: *ntail,
                score: *score,
                stail: *stail,
                gcore: *gcore,
                gtail: *gtail,
            }),
            _ => Err(PsfError::Parameters(pars.len())),
        }
    }
    /// Multiplies both widths by `factor`
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            score: self.score * factor,
            stail: self.stail * factor,
            ..self
        }
    }
    /// Checks that neither widths nor shapes are zero
    pub fn check(&self, energy: f64) -> Result<()> {
        for (name, value) in [
            ("SCORE", self.score),
            ("STAIL", self.stail),
            ("GCORE", self.gcore),
            ("GTAIL", self.gtail),
        ] {
            if value == 0. {
                return Err(PsfError::ZeroParameter { name, energy });
            }
        }
        Ok(())
    }
    /// PSF density at `separation` (rad)
    pub fn density(&self, separation: f64) -> f64 {
        let uc = 0.5 * (separation / self.score).powi(2);
        let ut = 0.5 * (separation / self.stail).powi(2);
        self.ncore * (king(uc, self.gcore) + self.ntail * king(ut, self.gtail))
    }
    /// Small angle integral of the density within `radius` (rad)
    pub fn integral(&self, radius: f64) -> f64 {
        let uc = 0.5 * (radius / self.score).powi(2);
        let ut = 0.5 * (radius / self.stail).powi(2);
        self.ncore
            * (king_integral(uc, self.gcore) * 2. * PI * self.score.powi(2)
                + self.ntail * king_integral(ut, self.gtail) * 2. * PI * self.stail.powi(2))
    }
    /// Solid angle integral of the density within `radius` (rad)
    pub fn solid_angle_integral(&self, radius: f64, quadrature: &Quadrature) -> Result<f64> {
        let integral = quadrature.integrate_with_breaks(
            |theta| self.density(theta) * theta.sin(),
            &theta_breaks(0., radius, &[self.score, self.stail]),
        )?;
        Ok(2. * PI * integral)
    }
}

/// Normalized parameters resolved for one (energy, cos(theta)) query
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolvedParameters {
    Nearest(KingParameters),
    /// Parameters at the 4 grid nodes with the cell geometry
    Corners(Corners, [KingParameters; 4]),
}
impl ResolvedParameters {
    /// Applies `f` to the parameters, bilinearly combining the corner values
    pub fn evaluate<F>(&self, mut f: F) -> Result<f64>
    where
        F: FnMut(&KingParameters) -> Result<f64>,
    {
        match self {
            ResolvedParameters::Nearest(pars) => f(pars),
            ResolvedParameters::Corners(corners, pars) => {
                let mut values = [0f64; 4];
                for (value, pars) in values.iter_mut().zip(pars) {
                    *value = f(pars)?;
                }
                Ok(corners.evaluate(&values))
            }
        }
    }
}

/// PSF parameter lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Evaluation {
    /// Parameters of the bin holding the query
    #[default]
    Nearest,
    /// PSF evaluated at the 4 surrounding grid nodes and bilinearly combined
    Corners,
}

/// Two components King function PSF
#[derive(Debug, Clone)]
pub struct KingPsf {
    pars: ParameterSet,
    scaling: PsfScaling,
    event_type: EventType,
    evaluation: Evaluation,
    threshold_energy: f64,
    theta_max: f64,
    quadrature: Quadrature,
}
impl KingPsf {
    /// Creates the PSF from its parameter tables and width scaling
    ///
    /// `pars` must hold the [PAR_NAMES] tables.
    pub fn new(pars: &ParameterSet, scaling: PsfScaling, event_type: EventType) -> Result<Self> {
        let tables = PAR_NAMES
            .iter()
            .map(|name| pars.get(name).cloned())
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let pars = ParameterSet::new(PAR_NAMES.iter().map(|n| n.to_string()).collect(), tables)?;
        Ok(Self {
            pars,
            scaling,
            event_type,
            evaluation: Evaluation::default(),
            threshold_energy: THRESHOLD_ENERGY,
            theta_max: THETA_MAX,
            quadrature: Quadrature::default(),
        })
    }
    pub fn evaluation(self, evaluation: Evaluation) -> Self {
        Self { evaluation, ..self }
    }
    /// Sets the energy (MeV) below which normalization is numerical
    pub fn threshold_energy(self, threshold_energy: f64) -> Self {
        Self {
            threshold_energy,
            ..self
        }
    }
    /// Sets the upper bound (rad) of the normalization integral
    pub fn theta_max(self, theta_max: f64) -> Self {
        Self { theta_max, ..self }
    }
    pub fn quadrature(&self) -> &Quadrature {
        &self.quadrature
    }
    pub fn parameters(&self) -> &ParameterSet {
        &self.pars
    }
    pub fn scaling(&self) -> &PsfScaling {
        &self.scaling
    }
    pub fn event_type(&self) -> EventType {
        self.event_type
    }
    pub fn mode(&self) -> Evaluation {
        self.evaluation
    }
    pub fn get_threshold_energy(&self) -> f64 {
        self.threshold_energy
    }
    pub fn get_theta_max(&self) -> f64 {
        self.theta_max
    }
    /// Width scale factor (rad) at `energy` (MeV)
    pub fn scale_factor(&self, energy: f64) -> f64 {
        self.scaling.scale_factor(energy, self.event_type)
    }
    /// Scales and normalizes the raw table parameters at `energy`
    pub fn normalize(&self, raw: &[f64], energy: f64) -> Result<KingParameters> {
        let mut pars = KingParameters::from_slice(raw)?.scaled(self.scale_factor(energy));
        pars.check(energy)?;
        if energy < self.threshold_energy {
            let norm = self.quadrature.integrate_with_breaks(
                |theta| pars.density(theta) * theta.sin(),
                &theta_breaks(0., self.theta_max, &[pars.score, pars.stail]),
            )?;
            pars.ncore /= norm * 2. * PI;
        } else {
            let uc = 0.5 * (self.theta_max / pars.score).powi(2);
            let ut = 0.5 * (self.theta_max / pars.stail).powi(2);
            let norm = pars.ncore
                * (2. * PI * pars.score.powi(2) * king_integral(uc, pars.gcore)
                    + pars.ntail * 2. * PI * pars.stail.powi(2) * king_integral(ut, pars.gtail));
            pars.ncore /= norm;
        }
        if !pars.ncore.is_finite() {
            return Err(PsfError::Normalization(energy));
        }
        Ok(pars)
    }
    /// Resolves the normalized parameters of the bin holding (energy, costh)
    pub fn resolve(&self, energy: f64, cos_theta: f64) -> Result<KingParameters> {
        let raw = self.pars.values(energy.log10(), cos_theta, false);
        self.normalize(&raw, energy)
    }
    /// Resolves the normalized parameters at the 4 grid nodes around
    /// (energy, costh)
    pub fn resolve_corners(
        &self,
        energy: f64,
        cos_theta: f64,
    ) -> Result<(CornerParameters, [KingParameters; 4])> {
        let corners = self.pars.corner_pars(energy.log10(), cos_theta);
        let mut pars = Vec::with_capacity(4);
        for k in 0..4 {
            pars.push(self.normalize(&corners.pars[k], corners.energy(k))?);
        }
        let pars = [pars[0], pars[1], pars[2], pars[3]];
        Ok((corners, pars))
    }
    /// Resolves the normalized parameters according to the evaluation mode
    pub fn resolve_query(&self, energy: f64, cos_theta: f64) -> Result<ResolvedParameters> {
        Ok(match self.evaluation {
            Evaluation::Nearest => ResolvedParameters::Nearest(self.resolve(energy, cos_theta)?),
            Evaluation::Corners => {
                let (corners, pars) = self.resolve_corners(energy, cos_theta)?;
                ResolvedParameters::Corners(corners.corners, pars)
            }
        })
    }
    /// Applies `f` to the resolved parameters, combining the corner values in
    /// [Evaluation::Corners] mode
    pub fn evaluate<F>(&self, energy: f64, cos_theta: f64, f: F) -> Result<f64>
    where
        F: FnMut(&KingParameters) -> Result<f64>,
    {
        self.resolve_query(energy, cos_theta)?.evaluate(f)
    }
    /// PSF density (per steradian) at `separation` (rad)
    pub fn density(&self, separation: f64, energy: f64, cos_theta: f64) -> Result<f64> {
        self.evaluate(energy, cos_theta, |pars| Ok(pars.density(separation)))
    }
    /// Fraction of the PSF within `radius` (rad) of the source
    ///
    /// The PSF vanishes beyond the normalization bound.
    pub fn integral(&self, radius: f64, energy: f64, cos_theta: f64) -> Result<f64> {
        let radius = radius.min(self.theta_max);
        let small_angle = energy >= self.threshold_energy;
        self.evaluate(energy, cos_theta, |pars| {
            if small_angle {
                Ok(pars.integral(radius))
            } else {
                pars.solid_angle_integral(radius, &self.quadrature)
            }
        })
    }
}
