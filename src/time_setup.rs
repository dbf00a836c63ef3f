//! Derives the inclusive daily date index from a start/end date pair.

use crate::error::{EpiError, Result};
use crate::prelude::Date;
use getset::Getters;

#[derive(Debug, Clone, PartialEq, Getters)]
pub struct TimeSetup {
    #[getset(get_copy = "pub")]
    ti: Date,
    #[getset(get_copy = "pub")]
    tf: Date,
    dates: Vec<Date>,
}

impl TimeSetup {
    pub fn new(ti: Date, tf: Date) -> Result<Self> {
        if tf <= ti {
            return Err(EpiError::Validation(format!(
                "final time ('{tf}') is less than or equal to initial time ('{ti}')"
            )));
        }
        let n_days = (tf - ti).num_days() as usize + 1;
        let dates = (0..n_days)
            .map(|d| ti + chrono::Duration::days(d as i64))
            .collect();
        Ok(TimeSetup { ti, tf, dates })
    }

    pub fn n_days(&self) -> usize {
        self.dates.len()
    }

    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    pub fn index_of(&self, date: Date) -> Option<usize> {
        if date < self.ti || date > self.tf {
            return None;
        }
        Some((date - self.ti).num_days() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn inclusive_day_count() {
        let ti = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let tf = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let ts = TimeSetup::new(ti, tf).unwrap();
        assert_eq!(ts.n_days(), 5);
        assert_eq!(ts.dates().first().copied(), Some(ti));
        assert_eq!(ts.dates().last().copied(), Some(tf));
        assert_eq!(ts.index_of(tf), Some(4));
    }

    #[test]
    fn rejects_non_positive_range() {
        let ti = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let tf = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(TimeSetup::new(ti, tf).is_err());
        assert!(TimeSetup::new(ti, ti).is_err());
    }
}
