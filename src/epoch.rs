//! Time dependent calibrations
//!
//! Mission elapsed time (MET) is counted in seconds from 2001-01-01T00:00:00.

use crate::error::{DomainError, ErrorKind};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EpochError {
    #[error("no epoch registered")]
    Empty,
    #[error("epoch start {start} is not after the previous epoch start {last}")]
    NotIncreasing { start: f64, last: f64 },
    #[error("invalid validity date {0:?}, expected YYYY-MM-DD and hh:mm:ss")]
    Date(String),
    #[error("Invalid MET")]
    Domain(#[from] DomainError),
}
type Result<T> = std::result::Result<T, EpochError>;
impl EpochError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EpochError::Domain(_) => ErrorKind::Domain,
            _ => ErrorKind::Configuration,
        }
    }
}

/// Days from 1970-01-01 to the civil date `y-m-d`
fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let doy = (153 * (m + if m > 2 { -3 } else { 9 }) + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe - 719468
}

/// MET of a calibration validity start given as `YYYY-MM-DD` and `hh:mm:ss`
///
/// Leap seconds are ignored.
pub fn validity_start(date: &str, time: &str) -> Result<f64> {
    let invalid = || EpochError::Date(format!("{date} {time}"));
    let ymd: Vec<i64> = date
        .trim()
        .split('-')
        .map(|s| s.parse().map_err(|_| invalid()))
        .collect::<Result<_>>()?;
    let hms: Vec<f64> = time
        .trim()
        .split(':')
        .map(|s| s.parse().map_err(|_| invalid()))
        .collect::<Result<_>>()?;
    match (ymd.as_slice(), hms.as_slice()) {
        ([y, m, d], [h, mn, s]) if (1..=12).contains(m) && (1..=31).contains(d) => {
            let days = days_from_civil(*y, *m, *d) - days_from_civil(2001, 1, 1);
            Ok(days as f64 * 86400. + h * 3600. + mn * 60. + s)
        }
        _ => Err(invalid()),
    }
}

/// Calibrations ordered by validity start (MET)
#[derive(Debug, Clone, PartialEq)]
pub struct EpochDep<T> {
    starts: Vec<f64>,
    items: Vec<T>,
}
impl<T> Default for EpochDep<T> {
    fn default() -> Self {
        Self {
            starts: vec![],
            items: vec![],
        }
    }
}
impl<T> From<T> for EpochDep<T> {
    /// A single calibration valid at any time
    fn from(item: T) -> Self {
        Self {
            starts: vec![f64::NEG_INFINITY],
            items: vec![item],
        }
    }
}
impl<T> EpochDep<T> {
    pub fn new() -> Self {
        Default::default()
    }
    /// Appends a calibration valid from `start` onward
    pub fn push(&mut self, start: f64, item: T) -> Result<()> {
        if let Some(&last) = self.starts.last() {
            if !(start > last) {
                return Err(EpochError::NotIncreasing { start, last });
            }
        }
        self.starts.push(start);
        self.items.push(item);
        Ok(())
    }
    pub fn len(&self) -> usize {
        self.items.len()
    }
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
    pub fn starts(&self) -> &[f64] {
        &self.starts
    }
    pub fn iter(&self) -> impl Iterator<Item = (f64, &T)> {
        self.starts.iter().cloned().zip(&self.items)
    }
    /// Index of the epoch covering `met`, the first epoch if `met` is `None`
    pub fn index(&self, met: Option<f64>) -> Result<usize> {
        if self.starts.is_empty() {
            return Err(EpochError::Empty);
        }
        match met {
            None => Ok(0),
            Some(met) if met < self.starts[0] || met.is_nan() => {
                Err(DomainError::NotCovered(met).into())
            }
            Some(met) => Ok(self.starts.partition_point(|&start| start <= met) - 1),
        }
    }
    pub fn get(&self, met: Option<f64>) -> Result<&T> {
        let index = self.index(met)?;
        Ok(&self.items[index])
    }
    pub fn get_mut(&mut self, met: Option<f64>) -> Result<&mut T> {
        let index = self.index(met)?;
        Ok(&mut self.items[index])
    }
    /// Applies `f` to every calibration
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> EpochDep<U> {
        EpochDep {
            starts: self.starts,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epochs() -> EpochDep<&'static str> {
        let mut epochs = EpochDep::new();
        epochs.push(100., "a").unwrap();
        epochs.push(200., "b").unwrap();
        epochs.push(300., "c").unwrap();
        epochs
    }

    #[test]
    fn selection() {
        let epochs = epochs();
        assert_eq!(*epochs.get(Some(100.)).unwrap(), "a");
        assert_eq!(*epochs.get(Some(199.9)).unwrap(), "a");
        assert_eq!(*epochs.get(Some(200.)).unwrap(), "b");
        assert_eq!(*epochs.get(Some(1e9)).unwrap(), "c");
        assert_eq!(*epochs.get(None).unwrap(), "a");
    }

    #[test]
    fn not_covered() {
        let epochs = epochs();
        let err = epochs.get(Some(99.)).unwrap_err();
        assert_eq!(err, EpochError::Domain(DomainError::NotCovered(99.)));
        assert_eq!(err.kind(), ErrorKind::Domain);
        assert_eq!(
            EpochDep::<u8>::new().index(None).unwrap_err(),
            EpochError::Empty
        );
    }

    #[test]
    fn increasing_starts() {
        let mut epochs = epochs();
        assert!(epochs.push(300., "d").is_err());
        assert_eq!(epochs.len(), 3);
    }

    #[test]
    fn single_epoch() {
        let epochs = EpochDep::from(1u8);
        assert_eq!(*epochs.get(Some(-1e9)).unwrap(), 1);
    }

    #[test]
    fn validity_dates() {
        assert_eq!(validity_start("2001-01-01", "00:00:00").unwrap(), 0.);
        assert_eq!(validity_start("2001-01-02", "01:00:30").unwrap(), 90030.);
        assert_eq!(
            validity_start("2008-08-04", "15:43:36").unwrap(),
            239557417. - 1.
        );
        assert!(validity_start("2008-13-04", "00:00:00").is_err());
        assert!(validity_start("2008/08/04", "00:00:00").is_err());
    }
}
