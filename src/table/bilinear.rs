use super::{Result, TableError};

/// Index of the first element of `xx` strictly greater than `x`
pub(crate) fn upper_bound(xx: &[f64], x: f64) -> usize {
    xx.partition_point(|&v| v <= x)
}

/// The four grid nodes around a query point
///
/// Nodes are ordered `(i-1,j-1), (i,j-1), (i,j), (i-1,j)` where `i` indexes
/// the first axis and `j` the second one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corners {
    /// fractional coordinate along the first axis
    pub tt: f64,
    /// fractional coordinate along the second axis
    pub uu: f64,
    /// first axis coordinates of the nodes
    pub x: [f64; 4],
    /// second axis coordinates of the nodes
    pub y: [f64; 4],
    /// flat indices of the nodes into the (padded) value array
    pub index: [usize; 4],
    /// node values
    pub values: [f64; 4],
}
impl Corners {
    /// Bilinear combination of arbitrary node values
    pub fn evaluate(&self, values: &[f64; 4]) -> f64 {
        Bilinear::evaluate(self.tt, self.uu, values)
    }
}

/// Bilinear interpolator over a rectilinear grid
///
/// `values` is flattened with the second axis as rows: `values[j * nx + i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bilinear {
    x: Vec<f64>,
    y: Vec<f64>,
    values: Vec<f64>,
}
impl Bilinear {
    /// Creates an interpolator from node coordinates and values
    pub fn new(x: Vec<f64>, y: Vec<f64>, values: Vec<f64>) -> Result<Self> {
        if x.len() < 2 || y.len() < 2 {
            return Err(TableError::Empty);
        }
        for (axis, coords) in [("x", &x), ("y", &y)] {
            if coords.windows(2).any(|w| !(w[1] > w[0])) {
                return Err(TableError::NotIncreasing(axis.to_string()));
            }
        }
        if values.len() != x.len() * y.len() {
            return Err(TableError::Shape {
                expected: x.len() * y.len(),
                found: values.len(),
            });
        }
        Ok(Self { x, y, values })
    }
    /// Creates an interpolator with an extra row and column of nodes at
    /// `x_bounds` and `y_bounds`
    ///
    /// The padding nodes replicate the values of the nearest edge nodes so
    /// queries between the outermost nodes and the bounds are flat.
    pub fn padded(
        x: &[f64],
        y: &[f64],
        values: &[f64],
        x_bounds: (f64, f64),
        y_bounds: (f64, f64),
    ) -> Result<Self> {
        let (nx, ny) = (x.len(), y.len());
        if nx == 0 || ny == 0 {
            return Err(TableError::Empty);
        }
        if values.len() != nx * ny {
            return Err(TableError::Shape {
                expected: nx * ny,
                found: values.len(),
            });
        }
        let pad = |coords: &[f64], (lo, hi): (f64, f64)| {
            let mut out = Vec::with_capacity(coords.len() + 2);
            out.push(lo);
            out.extend_from_slice(coords);
            out.push(hi);
            out
        };
        let row = |j: usize| {
            let row = &values[j * nx..(j + 1) * nx];
            let mut out = Vec::with_capacity(nx + 2);
            out.push(row[0]);
            out.extend_from_slice(row);
            out.push(row[nx - 1]);
            out
        };
        let padded_values: Vec<f64> = std::iter::once(0)
            .chain(0..ny)
            .chain(std::iter::once(ny - 1))
            .flat_map(row)
            .collect();
        Self::new(pad(x, x_bounds), pad(y, y_bounds), padded_values)
    }
    /// Node coordinates along the first axis
    pub fn x(&self) -> &[f64] {
        &self.x
    }
    /// Node coordinates along the second axis
    pub fn y(&self) -> &[f64] {
        &self.y
    }
    /// Node values, second axis as rows
    pub fn values(&self) -> &[f64] {
        &self.values
    }
    /// Upper node index of the cell containing `v`, queries outside the
    /// grid are clamped onto its first or last cell
    fn cell(coords: &[f64], v: f64) -> usize {
        upper_bound(coords, v).clamp(1, coords.len() - 1)
    }
    /// Returns the corners of the grid cell containing (x,y)
    pub fn corners(&self, x: f64, y: f64) -> Corners {
        let nx = self.x.len();
        let x = x.clamp(self.x[0], self.x[nx - 1]);
        let y = y.clamp(self.y[0], self.y[self.y.len() - 1]);
        let i = Self::cell(&self.x, x);
        let j = Self::cell(&self.y, y);
        let tt = (x - self.x[i - 1]) / (self.x[i] - self.x[i - 1]);
        let uu = (y - self.y[j - 1]) / (self.y[j] - self.y[j - 1]);
        let index = [
            (j - 1) * nx + i - 1,
            (j - 1) * nx + i,
            j * nx + i,
            j * nx + i - 1,
        ];
        Corners {
            tt,
            uu,
            x: [self.x[i - 1], self.x[i], self.x[i], self.x[i - 1]],
            y: [self.y[j - 1], self.y[j - 1], self.y[j], self.y[j]],
            index,
            values: index.map(|k| self.values[k]),
        }
    }
    /// Interpolated value at (x,y)
    pub fn value(&self, x: f64, y: f64) -> f64 {
        let corners = self.corners(x, y);
        corners.evaluate(&corners.values)
    }
    /// Bilinear combination of the 4 corner values with fractional
    /// coordinates `tt` (first axis) and `uu` (second axis)
    pub fn evaluate(tt: f64, uu: f64, values: &[f64; 4]) -> f64 {
        (1. - tt) * (1. - uu) * values[0]
            + tt * (1. - uu) * values[1]
            + tt * uu * values[2]
            + (1. - tt) * uu * values[3]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid() -> Bilinear {
        // values = x + 10 y
        let x = vec![0., 1., 3.];
        let y = vec![-1., 0., 2.];
        let values = y
            .iter()
            .flat_map(|y| x.iter().map(move |x| x + 10. * y))
            .collect();
        Bilinear::new(x, y, values).unwrap()
    }

    #[test]
    fn exact_at_nodes() {
        let b = grid();
        for &y in b.y() {
            for &x in b.x() {
                assert_eq!(b.value(x, y), x + 10. * y);
            }
        }
    }

    #[test]
    fn linear_inside_cells() {
        let b = grid();
        assert_relative_eq!(b.value(0.5, -0.5), 0.5 - 5., epsilon = 1e-12);
        assert_relative_eq!(b.value(2.2, 1.3), 2.2 + 13., epsilon = 1e-12);
    }

    #[test]
    fn corner_selection() {
        let b = grid();
        let c = b.corners(2., 1.);
        assert_eq!(c.x, [1., 3., 3., 1.]);
        assert_eq!(c.y, [0., 0., 2., 2.]);
        assert_relative_eq!(c.tt, 0.5);
        assert_relative_eq!(c.uu, 0.5);
        assert_eq!(c.index, [4, 5, 8, 7]);
    }

    #[test]
    fn clamped_outside() {
        let b = grid();
        assert_eq!(b.value(-5., -5.), b.value(0., -1.));
        assert_eq!(b.value(50., 50.), b.value(3., 2.));
    }

    #[test]
    fn padding_replicates_edges() {
        let b = Bilinear::padded(&[1., 2.], &[0.25, 0.75], &[1., 2., 3., 4.], (0., 10.), (-1., 1.))
            .unwrap();
        assert_eq!(b.x(), &[0., 1., 2., 10.]);
        assert_eq!(b.y(), &[-1., 0.25, 0.75, 1.]);
        assert_eq!(b.value(0., -1.), 1.);
        assert_eq!(b.value(10., 1.), 4.);
        assert_eq!(b.value(0.5, 0.5), 2.);
        assert_eq!(b.value(1., 0.25), 1.);
        assert_eq!(b.value(2., 0.75), 4.);
    }

    #[test]
    fn rejects_bad_grids() {
        assert!(Bilinear::new(vec![0., 0.], vec![0., 1.], vec![0.; 4]).is_err());
        assert!(Bilinear::new(vec![0., 1.], vec![0., 1.], vec![0.; 3]).is_err());
    }
}
