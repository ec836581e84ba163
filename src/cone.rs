//! Sky directions and circular regions of interest

use nalgebra as na;

use crate::error::DomainError;

/// Radius tolerance of [AcceptanceCone] equality, in degrees
pub const RADIUS_TOLERANCE: f64 = 1e-5;
/// Center separation tolerance of [AcceptanceCone] equality, in radians
pub const CENTER_TOLERANCE: f64 = 1e-3;

/// Unit vector pointing to the sky
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyDir(na::Vector3<f64>);
impl SkyDir {
    /// Direction from equatorial coordinates in degrees
    pub fn from_radec(ra: f64, dec: f64) -> Self {
        let (ra, dec) = (ra.to_radians(), dec.to_radians());
        Self(na::Vector3::new(
            dec.cos() * ra.cos(),
            dec.cos() * ra.sin(),
            dec.sin(),
        ))
    }
    /// Direction along `v`, normalized
    pub fn from_vector(v: na::Vector3<f64>) -> Self {
        Self(v.normalize())
    }
    pub fn vector(&self) -> &na::Vector3<f64> {
        &self.0
    }
    /// Right ascension in degrees, within [0,360[
    pub fn ra(&self) -> f64 {
        self.0.y.atan2(self.0.x).to_degrees().rem_euclid(360.)
    }
    /// Declination in degrees
    pub fn dec(&self) -> f64 {
        self.0.z.clamp(-1., 1.).asin().to_degrees()
    }
    /// Angular separation with `other` in radians
    pub fn difference(&self, other: &SkyDir) -> f64 {
        self.0.cross(&other.0).norm().atan2(self.0.dot(&other.0))
    }
}

/// Circular region of interest
///
/// Two cones are equal if their radii differ by less than
/// [RADIUS_TOLERANCE] and their centers by less than [CENTER_TOLERANCE].
#[derive(Debug, Clone, Copy)]
pub struct AcceptanceCone {
    center: SkyDir,
    /// half opening angle in degrees
    radius: f64,
}
impl AcceptanceCone {
    /// Creates a cone of `radius` degrees around `center`
    pub fn new(center: SkyDir, radius: f64) -> Result<Self, DomainError> {
        Ok(Self {
            center,
            radius: DomainError::check_non_negative("cone radius", radius)?,
        })
    }
    pub fn center(&self) -> &SkyDir {
        &self.center
    }
    /// Radius in degrees
    pub fn radius(&self) -> f64 {
        self.radius
    }
    /// Checks if `dir` lies inside the cone
    pub fn inside(&self, dir: &SkyDir) -> bool {
        self.center.difference(dir).to_degrees() < self.radius
    }
}
impl PartialEq for AcceptanceCone {
    fn eq(&self, other: &Self) -> bool {
        (self.radius - other.radius).abs() < RADIUS_TOLERANCE
            && self.center.difference(&other.center) < CENTER_TOLERANCE
    }
}
