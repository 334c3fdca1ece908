use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::business_day::BusinessDay;

/// Combined end-of-day record across all locations for one date.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySettlement {
    pub date: NaiveDate,
    pub total_deposit: f64,
    pub total_next_day_opening_cash: f64,
    pub remarks: BTreeMap<String, String>,
}

/// Request to archive the settlement of a date.
#[derive(Debug, Clone, Default)]
pub struct SettlementRequest {
    /// Defaults to the day's total cash minus next-day opening cash.
    pub total_deposit: Option<f64>,
    pub total_next_day_opening_cash: Option<f64>,
    pub remarks: BTreeMap<String, String>,
}

/// Grand totals over all closed locations of a date.
///
/// Letters follow the printed settlement form:
/// A expected, B sales, C opening, D counted, E over/short, F other cash,
/// G total cash, H deposit, I next-day opening cash, J transactions, K items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettlementTotals {
    pub expected_cash: f64,
    pub total_sales: f64,
    pub opening_cash: f64,
    pub closing_cash: f64,
    pub cash_diff: f64,
    pub other_cash: f64,
    pub total_cash: f64,
    pub deposit: f64,
    pub next_day_cash: f64,
    pub total_transactions: i64,
    pub total_items: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationReport {
    pub location_name: String,
    pub day: BusinessDay,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettlementView {
    pub date: NaiveDate,
    /// Closed reports in display order.
    pub reports: Vec<LocationReport>,
    /// Locations that opened on the date but are not closed yet (sorted).
    pub unclosed_locations: Vec<String>,
    pub all_closed: bool,
    pub settlement: Option<DailySettlement>,
    pub totals: SettlementTotals,
}

/// One row of the cross-day opening cash reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct CarryForwardRow {
    pub date: NaiveDate,
    /// Next-day opening cash recorded by the previous day's settlement.
    pub yesterday_total: f64,
    /// Sum of opening cash across the date's business days.
    pub today_total: f64,
    pub cash_check_diff: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementCalendarStatus {
    Settled,
    Pending,
    InProgress,
    NoData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryCalendarStatus {
    InProgress,
    Ready,
    NoData,
}

// --

impl SettlementView {
    pub fn is_settled(&self) -> bool {
        self.settlement.is_some()
    }
}

impl SettlementCalendarStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementCalendarStatus::Settled => "settled",
            SettlementCalendarStatus::Pending => "pending",
            SettlementCalendarStatus::InProgress => "in_progress",
            SettlementCalendarStatus::NoData => "no_data",
        }
    }
}

impl QueryCalendarStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryCalendarStatus::InProgress => "in_progress",
            QueryCalendarStatus::Ready => "ready",
            QueryCalendarStatus::NoData => "no_data",
        }
    }
}
