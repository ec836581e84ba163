use super::{Columns, Corners, GridTable, Result, TableError};

/// Parameters at the 4 nodes of an interpolation cell
#[derive(Debug, Clone, PartialEq)]
pub struct CornerParameters {
    /// Cell geometry, `corners.x` is log10(E/MeV) and `corners.y` cos(theta)
    pub corners: Corners,
    /// Parameter values at each node, in the [ParameterSet] order
    pub pars: [Vec<f64>; 4],
}
impl CornerParameters {
    /// Energy (MeV) of node `k`
    pub fn energy(&self, k: usize) -> f64 {
        10f64.powf(self.corners.x[k])
    }
    /// cos(theta) of node `k`
    pub fn cos_theta(&self, k: usize) -> f64 {
        self.corners.y[k]
    }
}

/// Named tables sharing the same binning
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    names: Vec<String>,
    tables: Vec<GridTable>,
}
impl ParameterSet {
    /// Creates a set from named tables, all tables must have the same binning
    pub fn new(names: Vec<String>, tables: Vec<GridTable>) -> Result<Self> {
        if tables.is_empty() {
            return Err(TableError::Empty);
        }
        if names.len() != tables.len() {
            return Err(TableError::Shape {
                expected: tables.len(),
                found: names.len(),
            });
        }
        if let Some(k) = tables.iter().position(|t| !t.same_binning(&tables[0])) {
            return Err(TableError::Binning(names[0].clone(), names[k].clone()));
        }
        Ok(Self { names, tables })
    }
    /// Extracts the tables `names` from calibration columns
    pub fn from_columns(columns: &Columns, names: &[&str]) -> Result<Self> {
        let tables = names
            .iter()
            .map(|name| columns.table(name))
            .collect::<Result<Vec<_>>>()?;
        Self::new(names.iter().map(|n| n.to_uppercase()).collect(), tables)
    }
    pub fn names(&self) -> &[String] {
        &self.names
    }
    pub fn len(&self) -> usize {
        self.tables.len()
    }
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
    /// Returns the table `name`
    pub fn get(&self, name: &str) -> Result<&GridTable> {
        self.names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
            .map(|k| &self.tables[k])
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }
    /// The first table, its binning is shared by all the others
    pub fn binning(&self) -> &GridTable {
        &self.tables[0]
    }
    /// Looks up all the parameters at (logE, costh)
    pub fn values(&self, log_energy: f64, cos_theta: f64, interpolate: bool) -> Vec<f64> {
        self.tables
            .iter()
            .map(|t| t.value(log_energy, cos_theta, interpolate))
            .collect()
    }
    /// Parameters at the corners of the interpolation cell holding (logE, costh)
    pub fn corner_pars(&self, log_energy: f64, cos_theta: f64) -> CornerParameters {
        let corners = self.tables[0].corners(log_energy, cos_theta);
        let pars = std::array::from_fn(|k| {
            self.tables
                .iter()
                .map(|t| t.interpolator().values()[corners.index[k]])
                .collect()
        });
        CornerParameters { corners, pars }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> ParameterSet {
        let table = |offset: f64| {
            GridTable::new(
                &[100., 200.],
                &[200., 400.],
                &[0., 0.5],
                &[0.5, 1.],
                vec![1. + offset, 2. + offset, 3. + offset, 4. + offset],
            )
            .unwrap()
        };
        ParameterSet::new(
            vec!["NCORE".into(), "SCORE".into()],
            vec![table(0.), table(10.)],
        )
        .unwrap()
    }

    #[test]
    fn lookup() {
        let pars = set();
        assert_eq!(pars.len(), 2);
        assert_eq!(pars.values(150f64.log10(), 0.75, false), vec![3., 13.]);
        assert_eq!(pars.get("score").unwrap().bin_value(1, 1), 14.);
        assert!(pars.get("GTAIL").is_err());
    }

    #[test]
    fn corners() {
        let pars = set();
        let table = pars.binning();
        let (e0, e1) = (table.log_energies()[0], table.log_energies()[1]);
        let (c0, c1) = (table.cos_thetas()[0], table.cos_thetas()[1]);
        let cp = pars.corner_pars((e0 + e1) / 2., (c0 + c1) / 2.);
        assert_eq!(cp.pars[0], vec![1., 11.]);
        assert_eq!(cp.pars[1], vec![2., 12.]);
        assert_eq!(cp.pars[2], vec![4., 14.]);
        assert_eq!(cp.pars[3], vec![3., 13.]);
        assert_eq!(cp.cos_theta(2), c1);
        approx::assert_relative_eq!(cp.energy(0), 20_000f64.sqrt(), max_relative = 1e-12);
    }

    #[test]
    fn mismatched_binning() {
        let a = GridTable::new(&[100.], &[200.], &[0.], &[1.], vec![1.]).unwrap();
        let b = GridTable::new(&[100.], &[300.], &[0.], &[1.], vec![1.]).unwrap();
        assert!(matches!(
            ParameterSet::new(vec!["A".into(), "B".into()], vec![a, b]),
            Err(TableError::Binning(..))
        ));
    }
}
