use std::f64::consts::PI;

use super::{
    king::{king, theta_breaks, KingParameters, THETA_MAX},
    Result,
};
use crate::{
    cone::AcceptanceCone, config::CacheConfig, quadrature::Quadrature, table::upper_bound,
    table::Bilinear,
};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Entry {
    Pending,
    Ready(f64),
}

/// Memoized PSF integrals over a region of interest
///
/// Entries are indexed by (source offset, PSF width, PSF shape) grid nodes;
/// an entry holds the integral of a unit King profile over the acceptance
/// cone, divided by the square of the width. The grids depend only on the
/// instrument, the entries are discarded whenever the cone changes.
#[derive(Debug, Clone)]
pub struct AngularIntegralCache {
    cone: AcceptanceCone,
    offsets: Vec<f64>,
    widths: Vec<f64>,
    log_widths: Vec<f64>,
    shapes: Vec<f64>,
    /// one row of width x shape entries per offset, allocated on first use
    entries: Vec<Option<Vec<Entry>>>,
    /// PSF support (rad)
    theta_max: f64,
    quadrature: Quadrature,
}
impl AngularIntegralCache {
    /// Creates an empty cache for `cone`, with widths spanning `width_range`
    /// (rad)
    pub fn new(
        cone: AcceptanceCone,
        config: &CacheConfig,
        width_range: (f64, f64),
    ) -> Result<Self> {
        config.check()?;
        CacheConfig::check_width_range(width_range)?;
        let offsets = config.offsets();
        let widths = config.widths(width_range.0, width_range.1);
        let log_widths = widths.iter().map(|w| w.ln()).collect();
        let shapes = config.shape_grid();
        log::debug!(
            "PSF integral cache: {} offsets up to {:.1}deg, {} widths in [{:e},{:e}]rad, {} shapes",
            offsets.len(),
            config.max_offset,
            widths.len(),
            width_range.0,
            width_range.1,
            shapes.len()
        );
        Ok(Self {
            cone,
            entries: vec![None; offsets.len()],
            offsets,
            widths,
            log_widths,
            shapes,
            theta_max: THETA_MAX,
            quadrature: Quadrature::new(config.rel_tol),
        })
    }
    /// Sets the angle (rad) beyond which the PSF vanishes
    pub fn theta_max(self, theta_max: f64) -> Self {
        Self { theta_max, ..self }
    }
    pub fn cone(&self) -> &AcceptanceCone {
        &self.cone
    }
    /// Offset grid (rad)
    pub fn offsets(&self) -> &[f64] {
        &self.offsets
    }
    /// Width grid (rad)
    pub fn widths(&self) -> &[f64] {
        &self.widths
    }
    pub fn shapes(&self) -> &[f64] {
        &self.shapes
    }
    /// Number of integrals computed so far
    pub fn evaluations(&self) -> usize {
        self.quadrature.calls()
    }
    /// Number of memoized entries
    pub fn n_ready(&self) -> usize {
        self.entries
            .iter()
            .flatten()
            .flatten()
            .filter(|e| matches!(e, Entry::Ready(_)))
            .count()
    }
    /// Points the cache to `cone`, discarding all the entries if it differs
    /// from the current one
    ///
    /// Returns `true` if the entries were discarded.
    pub fn retarget(&mut self, cone: &AcceptanceCone) -> bool {
        if self.cone == *cone {
            return false;
        }
        log::debug!(
            "PSF integral cache: new cone of radius {}deg, discarding {} entries",
            cone.radius(),
            self.n_ready()
        );
        self.cone = *cone;
        self.entries.iter_mut().for_each(|row| *row = None);
        true
    }
    /// Integral of a unit King profile of width `sigma` (rad) and shape
    /// `gamma` over the cone, for a source `psi` (rad) away from its center
    pub fn psf_integral(&self, psi: f64, sigma: f64, gamma: f64) -> Result<f64> {
        let radius = self.cone.radius().to_radians();
        let profile = |theta: f64| king(0.5 * (theta / sigma).powi(2), gamma);
        let mut total = 0f64;
        // PSF entirely inside the cone
        if psi < radius {
            let inner = self.quadrature.integrate_with_breaks(
                |theta| profile(theta) * theta.sin(),
                &theta_breaks(0., (radius - psi).min(self.theta_max), &[sigma]),
            )?;
            total += 2. * PI * inner;
        }
        // PSF straddling the cone boundary
        let (lo, hi) = (
            (radius - psi).abs(),
            (radius + psi).min(PI).min(self.theta_max),
        );
        if hi > lo {
            let (cr, cp, sp) = (radius.cos(), psi.cos(), psi.sin());
            let boundary = self.quadrature.integrate_with_breaks(
                |theta| {
                    let (st, ct) = theta.sin_cos();
                    let arg = (cr - ct * cp) / (st * sp);
                    let phimin = if arg.is_nan() || arg >= 1. {
                        0.
                    } else if arg <= -1. {
                        PI
                    } else {
                        arg.acos()
                    };
                    2. * phimin * profile(theta) * st
                },
                &theta_breaks(lo, hi, &[sigma]),
            )?;
            total += boundary;
        }
        Ok(total)
    }
    /// Checks if (sigma, gamma) lies within the width and shape grids
    pub fn on_grid(&self, sigma: f64, gamma: f64) -> bool {
        let within = |grid: &[f64], x: f64| x >= grid[0] && x <= grid[grid.len() - 1];
        within(&self.widths, sigma) && within(&self.shapes, gamma)
    }
    fn entry(&mut self, ipsi: usize, iwidth: usize, ishape: usize) -> Result<f64> {
        let k = iwidth * self.shapes.len() + ishape;
        if let Some(Entry::Ready(value)) = self.entries[ipsi].as_ref().map(|row| row[k]) {
            return Ok(value);
        }
        let sigma = self.widths[iwidth];
        let value = self.psf_integral(self.offsets[ipsi], sigma, self.shapes[ishape])? / sigma.powi(2);
        let n = self.widths.len() * self.shapes.len();
        self.entries[ipsi].get_or_insert_with(|| vec![Entry::Pending; n])[k] = Entry::Ready(value);
        Ok(value)
    }
    /// Integral of a unit King profile over the cone divided by `sigma`^2, at
    /// offset node `ipsi`
    ///
    /// Interpolated along shape and log(width) between the memoized entries,
    /// computed directly if (sigma, gamma) is off the grids.
    pub fn angular_integral(&mut self, sigma: f64, gamma: f64, ipsi: usize) -> Result<f64> {
        if !self.on_grid(sigma, gamma) {
            log::trace!("PSF integral cache bypass: sigma={sigma:e}rad, gamma={gamma}");
            return Ok(self.psf_integral(self.offsets[ipsi], sigma, gamma)? / sigma.powi(2));
        }
        let cell = |grid: &[f64], x: f64| upper_bound(grid, x).clamp(1, grid.len() - 1);
        let ig = cell(&self.shapes, gamma);
        let is = cell(&self.log_widths, sigma.ln());
        let tt = (gamma - self.shapes[ig - 1]) / (self.shapes[ig] - self.shapes[ig - 1]);
        let uu = (sigma.ln() - self.log_widths[is - 1])
            / (self.log_widths[is] - self.log_widths[is - 1]);
        let values = [
            self.entry(ipsi, is - 1, ig - 1)?,
            self.entry(ipsi, is - 1, ig)?,
            self.entry(ipsi, is, ig)?,
            self.entry(ipsi, is, ig - 1)?,
        ];
        Ok(Bilinear::evaluate(tt, uu, &values))
    }
    /// Fraction of the PSF with parameters `pars` inside the cone, for a
    /// source `psi` (rad) away from the cone center
    pub fn containment(&mut self, psi: f64, pars: &KingParameters) -> Result<f64> {
        let n = self.offsets.len();
        if psi > self.offsets[n - 1] {
            log::trace!("PSF integral cache bypass: offset={:.2}deg", psi.to_degrees());
            return Ok(pars.ncore
                * (self.psf_integral(psi, pars.score, pars.gcore)?
                    + pars.ntail * self.psf_integral(psi, pars.stail, pars.gtail)?));
        }
        let ii = (upper_bound(&self.offsets, psi).max(1) - 1).min(n - 2);
        let norm_core = pars.ncore * pars.score.powi(2);
        let norm_tail = pars.ncore * pars.ntail * pars.stail.powi(2);
        let mut y = [0f64; 2];
        for (k, y) in y.iter_mut().enumerate() {
            *y = norm_core * self.angular_integral(pars.score, pars.gcore, ii + k)?
                + norm_tail * self.angular_integral(pars.stail, pars.gtail, ii + k)?;
        }
        let t = (psi - self.offsets[ii]) / (self.offsets[ii + 1] - self.offsets[ii]);
        Ok(y[0] + t * (y[1] - y[0]))
    }
}
