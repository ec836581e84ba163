//! Adaptive 1-D numerical integration
//!
//! Globally adaptive 7-point Gauss / 15-point Kronrod scheme: the interval
//! with the largest error estimate is bisected until the summed error falls
//! below the requested relative tolerance.

use std::{
    cmp::Ordering,
    collections::BinaryHeap,
    sync::atomic::{self, AtomicUsize},
};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum QuadratureError {
    #[error("integral did not converge: estimate {estimate} with error {error}")]
    NotConverged { estimate: f64, error: f64 },
    #[error("integrand is not finite at x={x}")]
    NonFinite { x: f64 },
    #[error("invalid integration bounds [{0},{1}]")]
    Bounds(f64, f64),
}
type Result<T> = std::result::Result<T, QuadratureError>;

/// Default relative tolerance
pub const REL_TOL: f64 = 1e-5;

// Kronrod abscissae, the odd ones are the Gauss nodes
const XGK: [f64; 8] = [
    0.991455371120812639206854697526329,
    0.949107912342758524526189684047851,
    0.864864423359769072789712788640926,
    0.741531185599394439863864773280788,
    0.586087235467691130294144845693013,
    0.405845151377397166906606412076961,
    0.207784955007898467600689403773245,
    0.000000000000000000000000000000000,
];
const WGK: [f64; 8] = [
    0.022935322010529224963732008058970,
    0.063092092629978553290700663189204,
    0.104790010322250183839876322541518,
    0.140653259715525918745189590510238,
    0.169004726639267902826583426598550,
    0.190350578064785409913256402421014,
    0.204432940075298892414161999234649,
    0.209482141084727828012999174891714,
];
const WG: [f64; 4] = [
    0.129484966168869693270611432679082,
    0.279705391489276667901467771423780,
    0.381830050505118944950369775488975,
    0.417959183673469387755102040816327,
];

/// Integral estimate over one interval
#[derive(Debug, Clone, Copy)]
struct Segment {
    a: f64,
    b: f64,
    integral: f64,
    error: f64,
}
impl Segment {
    fn new<F: Fn(f64) -> f64>(f: &F, a: f64, b: f64) -> Result<Self> {
        let center = 0.5 * (a + b);
        let half = 0.5 * (b - a);
        let eval = |x: f64| {
            let y = f(x);
            if y.is_finite() {
                Ok(y)
            } else {
                Err(QuadratureError::NonFinite { x })
            }
        };
        let fc = eval(center)?;
        let mut kronrod = fc * WGK[7];
        let mut gauss = fc * WG[3];
        for j in 0..7 {
            let dx = half * XGK[j];
            let fsum = eval(center - dx)? + eval(center + dx)?;
            kronrod += WGK[j] * fsum;
            if j % 2 == 1 {
                gauss += WG[j / 2] * fsum;
            }
        }
        Ok(Self {
            a,
            b,
            integral: kronrod * half,
            error: ((kronrod - gauss) * half).abs(),
        })
    }
}
impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.error == other.error
    }
}
impl Eq for Segment {}
impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        self.error.total_cmp(&other.error)
    }
}

/// Adaptive integrator
///
/// Counts the number of integrals it has been asked for.
#[derive(Debug)]
pub struct Quadrature {
    rel_tol: f64,
    abs_tol: f64,
    max_intervals: usize,
    calls: AtomicUsize,
}
impl Default for Quadrature {
    fn default() -> Self {
        Self {
            rel_tol: REL_TOL,
            abs_tol: 1e-14,
            max_intervals: 2000,
            calls: AtomicUsize::new(0),
        }
    }
}
impl Clone for Quadrature {
    fn clone(&self) -> Self {
        Self {
            calls: AtomicUsize::new(self.calls()),
            ..*self
        }
    }
}
impl Quadrature {
    pub fn new(rel_tol: f64) -> Self {
        Self {
            rel_tol,
            ..Default::default()
        }
    }
    /// Sets the absolute error floor
    pub fn abs_tol(self, abs_tol: f64) -> Self {
        Self { abs_tol, ..self }
    }
    /// Sets the maximum number of subintervals
    pub fn max_intervals(self, max_intervals: usize) -> Self {
        Self {
            max_intervals,
            ..self
        }
    }
    pub fn rel_tol(&self) -> f64 {
        self.rel_tol
    }
    /// Number of integrals computed so far
    pub fn calls(&self) -> usize {
        self.calls.load(atomic::Ordering::Relaxed)
    }
    pub fn reset_calls(&self) {
        self.calls.store(0, atomic::Ordering::Relaxed);
    }
    /// Integrates `f` over `[a,b]`
    pub fn integrate<F: Fn(f64) -> f64>(&self, f: F, a: f64, b: f64) -> Result<f64> {
        self.integrate_with_breaks(f, &[a, b])
    }
    /// Integrates `f` over `[breaks[0], breaks[n-1]]`, with the intermediate
    /// break points as the initial subdivision
    ///
    /// Break points must be sorted, equal consecutive points are skipped.
    pub fn integrate_with_breaks<F: Fn(f64) -> f64>(&self, f: F, breaks: &[f64]) -> Result<f64> {
        self.calls.fetch_add(1, atomic::Ordering::Relaxed);
        let (Some(&a), Some(&b)) = (breaks.first(), breaks.last()) else {
            return Err(QuadratureError::Bounds(f64::NAN, f64::NAN));
        };
        if !a.is_finite() || !b.is_finite() || breaks.windows(2).any(|w| w[1] < w[0]) {
            return Err(QuadratureError::Bounds(a, b));
        }

        let mut heap = BinaryHeap::new();
        for w in breaks.windows(2).filter(|w| w[1] > w[0]) {
            heap.push(Segment::new(&f, w[0], w[1])?);
        }
        loop {
            let (integral, error) = heap
                .iter()
                .fold((0., 0.), |(i, e), s| (i + s.integral, e + s.error));
            if error <= self.abs_tol.max(self.rel_tol * integral.abs()) {
                return Ok(integral);
            }
            let worst = match heap.pop() {
                Some(s) if heap.len() + 2 <= self.max_intervals => s,
                _ => {
                    return Err(QuadratureError::NotConverged {
                        estimate: integral,
                        error,
                    })
                }
            };
            let mid = 0.5 * (worst.a + worst.b);
            if !(mid > worst.a && mid < worst.b) {
                return Err(QuadratureError::NotConverged {
                    estimate: integral,
                    error,
                });
            }
            heap.push(Segment::new(&f, worst.a, mid)?);
            heap.push(Segment::new(&f, mid, worst.b)?);
        }
    }
}

/// Integrates `f` over `[a,b]` at the default tolerance
pub fn integrate<F: Fn(f64) -> f64>(f: F, a: f64, b: f64) -> Result<f64> {
    Quadrature::default().integrate(f, a, b)
}
