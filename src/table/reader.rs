use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
    time::Instant,
};

use flate2::read::GzDecoder;
use itertools::Itertools;

use super::{GridTable, Result, TableError};

/// Mandatory leading columns of a calibration table
pub const BOUNDS_COLUMNS: [&str; 4] = ["ENERG_LO", "ENERG_HI", "CTHETA_LO", "CTHETA_HI"];

/// Resolves `path`, falling back to its gzip-compressed sibling
fn locate(path: &Path) -> Option<PathBuf> {
    if path.exists() {
        return Some(path.to_path_buf());
    }
    let gz = PathBuf::from(format!("{}.gz", path.display()));
    gz.exists().then_some(gz)
}

/// Reads a plain or gzip-compressed text file
pub(crate) fn read_to_string(path: &Path) -> Result<String> {
    let path = locate(path).ok_or_else(|| {
        TableError::Io(
            std::io::Error::from(std::io::ErrorKind::NotFound),
            path.to_path_buf(),
        )
    })?;
    let file = File::open(&path).map_err(|e| TableError::Io(e, path.clone()))?;
    let mut contents = String::new();
    if path.extension().is_some_and(|ext| ext == "gz") {
        GzDecoder::new(file)
            .read_to_string(&mut contents)
            .map_err(|e| TableError::Io(e, path.clone()))?;
    } else {
        let mut file = file;
        file.read_to_string(&mut contents)
            .map_err(|e| TableError::Io(e, path.clone()))?;
    }
    Ok(contents)
}

/// Columns of a calibration table
///
/// Bin edges are unique per axis, every parameter column is flattened with
/// cos(theta) as rows and energy as columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Columns {
    pub energ_lo: Vec<f64>,
    pub energ_hi: Vec<f64>,
    pub ctheta_lo: Vec<f64>,
    pub ctheta_hi: Vec<f64>,
    pub names: Vec<String>,
    pub data: Vec<Vec<f64>>,
}
impl Columns {
    /// Parses the CSV `contents`
    pub fn from_csv(contents: &str) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(contents.as_bytes());
        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
        for (i, expected) in BOUNDS_COLUMNS.iter().enumerate() {
            match headers.get(i) {
                Some(found) if found.eq_ignore_ascii_case(expected) => (),
                found => {
                    return Err(TableError::Header {
                        expected: expected.to_string(),
                        found: found.cloned().unwrap_or_default(),
                    })
                }
            }
        }
        let names: Vec<String> = headers[4..].iter().map(|h| h.to_uppercase()).collect();

        let rows = rdr
            .deserialize::<Vec<f64>>()
            .collect::<std::result::Result<Vec<_>, csv::Error>>()?;
        if rows.is_empty() {
            return Err(TableError::Empty);
        }

        // energy varies fastest: the first cos(theta) row spans all energies
        let n_energies = rows
            .iter()
            .take_while(|row| row[2] == rows[0][2] && row[3] == rows[0][3])
            .count();
        if rows.len() % n_energies != 0 {
            return Err(TableError::Shape {
                expected: n_energies * (rows.len() / n_energies + 1),
                found: rows.len(),
            });
        }
        let (energ_lo, energ_hi): (Vec<f64>, Vec<f64>) =
            rows.iter().take(n_energies).map(|row| (row[0], row[1])).unzip();
        let (ctheta_lo, ctheta_hi): (Vec<f64>, Vec<f64>) = rows
            .iter()
            .step_by(n_energies)
            .map(|row| (row[2], row[3]))
            .unzip();

        let consistent = ctheta_lo
            .iter()
            .zip(&ctheta_hi)
            .cartesian_product(energ_lo.iter().zip(&energ_hi))
            .zip(&rows)
            .all(|(((ctlo, cthi), (elo, ehi)), row)| {
                row[0] == *elo && row[1] == *ehi && row[2] == *ctlo && row[3] == *cthi
            });
        if !consistent {
            return Err(TableError::NotIncreasing(
                "row-major (cos(theta), energy)".to_string(),
            ));
        }

        let data = (0..names.len())
            .map(|k| rows.iter().map(|row| row[4 + k]).collect())
            .collect();
        Ok(Self {
            energ_lo,
            energ_hi,
            ctheta_lo,
            ctheta_hi,
            names,
            data,
        })
    }
    /// Returns the values of column `name`
    pub fn column(&self, name: &str) -> Result<&[f64]> {
        self.names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
            .map(|k| self.data[k].as_slice())
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }
    /// Builds the [GridTable] of column `name`
    pub fn table(&self, name: &str) -> Result<GridTable> {
        GridTable::new(
            &self.energ_lo,
            &self.energ_hi,
            &self.ctheta_lo,
            &self.ctheta_hi,
            self.column(name)?.to_vec(),
        )
    }
}

/// Loads a calibration table from a CSV file (`.csv` or `.csv.gz`)
pub fn read_columns<P: AsRef<Path>>(path: P) -> Result<Columns> {
    let path = path.as_ref();
    log::info!("Loading {:?}...", path);
    let now = Instant::now();
    let columns = Columns::from_csv(&read_to_string(path)?)?;
    log::info!(
        "... loaded {} table(s) of {}x{} bins in {:}ms",
        columns.names.len(),
        columns.energ_lo.len(),
        columns.ctheta_lo.len(),
        now.elapsed().as_millis()
    );
    Ok(columns)
}

/// Loads a single column of scaling coefficients
pub fn read_scaling<P: AsRef<Path>>(path: P, column: &str) -> Result<Vec<f64>> {
    let path = path.as_ref();
    log::info!("Loading {:?}...", path);
    let contents = read_to_string(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(contents.as_bytes());
    let index = rdr
        .headers()?
        .iter()
        .position(|h| h.eq_ignore_ascii_case(column))
        .ok_or_else(|| TableError::MissingColumn(column.to_string()))?;
    let mut values = vec![];
    for result in rdr.deserialize::<Vec<f64>>() {
        values.push(result?[index]);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PSF_CSV: &str = "\
ENERG_LO,ENERG_HI,CTHETA_LO,CTHETA_HI,NCORE,SCORE
100,200,0.0,0.5,1,0.1
200,400,0.0,0.5,2,0.2
100,200,0.5,1.0,3,0.3
200,400,0.5,1.0,4,0.4
";

    #[test]
    fn parse_columns() {
        let columns = Columns::from_csv(PSF_CSV).unwrap();
        assert_eq!(columns.energ_lo, vec![100., 200.]);
        assert_eq!(columns.energ_hi, vec![200., 400.]);
        assert_eq!(columns.ctheta_lo, vec![0., 0.5]);
        assert_eq!(columns.ctheta_hi, vec![0.5, 1.]);
        assert_eq!(columns.names, vec!["NCORE", "SCORE"]);
        assert_eq!(columns.column("ncore").unwrap(), &[1., 2., 3., 4.]);
        let table = columns.table("SCORE").unwrap();
        assert_eq!(table.value(150f64.log10(), 0.25, false), 0.1);
    }

    #[test]
    fn missing_column() {
        let columns = Columns::from_csv(PSF_CSV).unwrap();
        assert!(matches!(
            columns.column("GTAIL"),
            Err(TableError::MissingColumn(_))
        ));
    }

    #[test]
    fn invalid_header() {
        let csv = PSF_CSV.replacen("ENERG_HI", "EHI", 1);
        assert!(matches!(
            Columns::from_csv(&csv),
            Err(TableError::Header { .. })
        ));
    }

    #[test]
    fn scrambled_rows() {
        let mut lines: Vec<&str> = PSF_CSV.lines().collect();
        lines.swap(2, 3);
        let csv = lines.join("\n");
        assert!(Columns::from_csv(&csv).is_err());
    }

    #[test]
    fn gz_fallback() {
        use flate2::{write::GzEncoder, Compression};
        use std::io::Write;
        let path = std::env::temp_dir().join("lat-irfs_reader_test_psf.csv");
        let _ = std::fs::remove_file(&path);
        let gz_path = PathBuf::from(format!("{}.gz", path.display()));
        let mut encoder = GzEncoder::new(File::create(&gz_path).unwrap(), Compression::default());
        encoder.write_all(PSF_CSV.as_bytes()).unwrap();
        encoder.finish().unwrap();
        let columns = read_columns(&path).unwrap();
        assert_eq!(columns.names.len(), 2);
        std::fs::remove_file(gz_path).unwrap();
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            read_columns("/nonexistent/psf_front.csv"),
            Err(TableError::Io(..))
        ));
    }
}
