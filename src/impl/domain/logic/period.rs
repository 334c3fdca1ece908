use chrono::{Datelike, Duration, NaiveDate};
use fractic_server_error::{CriticalError, ServerError};

use crate::{entities::Period, errors::InvalidInput};

/// Returns the first and last day of the given month.
pub(crate) fn month_range(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), ServerError> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| InvalidInput::new("month", &format!("{}-{:02}", year, month)))?;
    // Compute first day of next month.
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let next = NaiveDate::from_ymd_opt(next_year, next_month, 1).ok_or_else(|| {
        CriticalError::with_debug(
            "last-date-of-month calculation unexpectedly resulted in invalid date",
            &format!("year: {}, month: {}", next_year, next_month),
        )
    })?;
    Ok((first, next - Duration::days(1)))
}

/// Every date of the given month, in order.
pub(crate) fn month_days(year: i32, month: u32) -> Result<Vec<NaiveDate>, ServerError> {
    let (first, last) = month_range(year, month)?;
    Ok(first.iter_days().take_while(|d| *d <= last).collect())
}

pub(crate) fn period_range(period: &Period) -> Result<(NaiveDate, NaiveDate), ServerError> {
    match *period {
        Period::Month { year, month } => month_range(year, month),
        Period::Quarter { year, quarter } => {
            if !(1..=4).contains(&quarter) {
                return Err(InvalidInput::new("quarter", &quarter.to_string()));
            }
            let (start, _) = month_range(year, quarter * 3 - 2)?;
            let (_, end) = month_range(year, quarter * 3)?;
            Ok((start, end))
        }
        Period::Year { year } => {
            let (start, _) = month_range(year, 1)?;
            let (_, end) = month_range(year, 12)?;
            Ok((start, end))
        }
    }
}

pub(crate) fn same_unit(a: &Period, b: &Period) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

/// Parses `YYYY-MM`, `YYYY-Qn` or `YYYY`.
pub(crate) fn parse_period(s: &str) -> Result<Period, ServerError> {
    let invalid = || InvalidInput::new("period", s);
    let s = s.trim();
    match s.split_once('-') {
        None => {
            let year = s.parse::<i32>().map_err(|_| invalid())?;
            Ok(Period::Year { year })
        }
        Some((year, rest)) => {
            let year = year.parse::<i32>().map_err(|_| invalid())?;
            let period = match rest.strip_prefix('Q').or_else(|| rest.strip_prefix('q')) {
                Some(q) => Period::Quarter {
                    year,
                    quarter: q.parse().map_err(|_| invalid())?,
                },
                None => Period::Month {
                    year,
                    month: rest.parse().map_err(|_| invalid())?,
                },
            };
            period_range(&period).map_err(|_| invalid())?;
            Ok(period)
        }
    }
}

pub(crate) fn period_label(period: &Period) -> String {
    match *period {
        Period::Month { year, month } => format!("{}-{:02}", year, month),
        Period::Quarter { year, quarter } => format!("{}-Q{}", year, quarter),
        Period::Year { year } => year.to_string(),
    }
}

/// Position of a date inside its period, used to line up two periods of the
/// same unit: day of month for months, month of quarter for quarters, month
/// for years.
pub(crate) fn bucket_of(period: &Period, date: NaiveDate) -> (u32, String) {
    match period {
        Period::Month { .. } => (date.day(), format!("{:02}", date.day())),
        Period::Quarter { .. } => {
            let m = (date.month() - 1) % 3 + 1;
            (m, format!("M{}", m))
        }
        Period::Year { .. } => (date.month(), format!("{:02}", date.month())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_range_handles_december_and_leap_years() {
        assert_eq!(
            month_range(2024, 2).unwrap(),
            (ymd(2024, 2, 1), ymd(2024, 2, 29))
        );
        assert_eq!(
            month_range(2024, 12).unwrap(),
            (ymd(2024, 12, 1), ymd(2024, 12, 31))
        );
        assert!(month_range(2024, 13).is_err());
        assert_eq!(month_days(2025, 4).unwrap().len(), 30);
    }

    #[test]
    fn parses_periods() {
        assert_eq!(
            parse_period("2025-03").unwrap(),
            Period::Month {
                year: 2025,
                month: 3
            }
        );
        assert_eq!(
            parse_period("2025-Q2").unwrap(),
            Period::Quarter {
                year: 2025,
                quarter: 2
            }
        );
        assert_eq!(parse_period("2024").unwrap(), Period::Year { year: 2024 });
        assert!(parse_period("2025-Q5").is_err());
        assert!(parse_period("2025-13").is_err());
        assert!(parse_period("abc").is_err());
    }

    #[test]
    fn quarter_range() {
        let period = Period::Quarter {
            year: 2025,
            quarter: 3,
        };
        assert_eq!(
            period_range(&period).unwrap(),
            (ymd(2025, 7, 1), ymd(2025, 9, 30))
        );
        assert_eq!(bucket_of(&period, ymd(2025, 8, 15)), (2, "M2".to_string()));
        assert_eq!(period_label(&period), "2025-Q3");
    }
}
