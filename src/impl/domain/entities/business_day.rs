use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use fractic_server_error::ServerError;

use super::{cash_breakdown::CashBreakdown, location::LocationId};
use crate::errors::UnknownValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BusinessDayId(pub(crate) i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayStatus {
    NotStarted,
    Open,
    PendingReport,
    Closed,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signatures {
    /// Base64 data URLs (`data:image/png;base64,...`).
    pub operator: Option<String>,
    pub reviewer: Option<String>,
    pub cashier: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BusinessDay {
    pub id: BusinessDayId,
    pub date: NaiveDate,
    pub location_id: LocationId,
    pub location_notes: Option<String>,
    pub status: DayStatus,
    pub opening_cash: f64,
    /// Net sales: gross product sales minus discounts.
    pub total_sales: f64,
    pub discount_total: f64,
    pub donation_total: f64,
    /// Other income excluding donations.
    pub other_total: f64,
    pub closing_cash: Option<f64>,
    pub expected_cash: Option<f64>,
    pub cash_diff: Option<f64>,
    pub total_items: i64,
    pub total_transactions: i64,
    pub cash_breakdown: Option<CashBreakdown>,
    pub signatures: Signatures,
    pub updated_at: NaiveDateTime,
}

/// Figures shown on the end-of-day report before and after confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyReport {
    pub day: BusinessDay,
    pub location_name: String,
    pub gross_sales: f64,
    pub other_income_total: f64,
    pub expected_total: f64,
    pub counted_total: f64,
    pub difference: f64,
}

/// Per-location status for the cashier dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardEntry {
    pub location_name: String,
    pub location_slug: String,
    pub status: DayStatus,
    pub total_sales: f64,
    pub total_transactions: i64,
}

// --

impl BusinessDayId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for BusinessDayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl DayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayStatus::NotStarted => "NOT_STARTED",
            DayStatus::Open => "OPEN",
            DayStatus::PendingReport => "PENDING_REPORT",
            DayStatus::Closed => "CLOSED",
        }
    }
}

impl FromStr for DayStatus {
    type Err = ServerError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_STARTED" => Ok(DayStatus::NotStarted),
            "OPEN" => Ok(DayStatus::Open),
            "PENDING_REPORT" => Ok(DayStatus::PendingReport),
            "CLOSED" => Ok(DayStatus::Closed),
            _ => Err(UnknownValue::new("day status", s)),
        }
    }
}

impl std::fmt::Display for DayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl BusinessDay {
    pub fn other_income_total(&self) -> f64 {
        self.donation_total + self.other_total
    }

    pub fn gross_sales(&self) -> f64 {
        self.total_sales + self.discount_total
    }

    /// Cash that should be in the drawer: opening cash plus net sales plus
    /// other income.
    pub fn expected_total(&self) -> f64 {
        self.opening_cash + self.total_sales + self.other_income_total()
    }

    pub fn difference(&self) -> f64 {
        self.closing_cash.unwrap_or(0.0) - self.expected_total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_parse_from_their_stored_form() {
        for status in [
            DayStatus::NotStarted,
            DayStatus::Open,
            DayStatus::PendingReport,
            DayStatus::Closed,
        ] {
            assert_eq!(status.as_str().parse::<DayStatus>().unwrap(), status);
        }
        assert!("open".parse::<DayStatus>().is_err());
        assert!("".parse::<DayStatus>().is_err());
    }
}
