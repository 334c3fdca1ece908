use chrono::{NaiveDate, NaiveDateTime};
use fractic_server_error::ServerError;
use serde_derive::Serialize;

use crate::errors::UnknownValue;

use super::{
    business_day::{BusinessDay, DayStatus},
    location::LocationId,
    settlement::{CarryForwardRow, DailySettlement},
    transaction::TransactionId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    DailySummary,
    DailyCashSummary,
    DailyCashCheck,
    TransactionLog,
    CombinedSummaryFinal,
    ProductMix,
    SalesTrend,
    PeakHours,
    PeriodicPerformance,
    DailySettlementQuery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Period {
    Month { year: i32, month: u32 },
    Quarter { year: i32, quarter: u32 },
    Year { year: i32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportQuery {
    pub kind: ReportKind,
    /// `None` means all locations.
    pub location: Option<LocationId>,
    /// `None` means all statuses. Applies to day-based reports.
    pub status: Option<DayStatus>,
    pub start: NaiveDate,
    /// Defaults to `start`.
    pub end: Option<NaiveDate>,
    /// Required for `PeriodicPerformance`; both periods must share a unit.
    pub periods: Option<(Period, Period)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartDataset {
    pub label: String,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayRow {
    pub location_name: String,
    pub day: BusinessDay,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CashGrandTotal {
    pub opening_cash: f64,
    pub total_sales: f64,
    pub expected_cash: f64,
    pub closing_cash: f64,
    pub cash_diff: f64,
    pub donation_total: f64,
    pub other_total: f64,
    pub other_cash: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogItem {
    /// `None` for manually keyed items without a category.
    pub category_name: Option<String>,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionLogRow {
    pub transaction_id: TransactionId,
    pub timestamp: NaiveDateTime,
    pub location_name: String,
    pub items: Vec<LogItem>,
    pub amount: f64,
    pub cash_received: f64,
    pub change_given: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductMixRow {
    pub category_name: String,
    pub items_sold: i64,
    pub total_sales: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SalesTrendRow {
    pub date: NaiveDate,
    pub total_sales: f64,
    pub total_transactions: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeakHourRow {
    pub hour: u32,
    pub transactions: i64,
    pub total_sales: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodicRow {
    pub label: String,
    pub sales_a: f64,
    pub trans_a: i64,
    pub sales_b: f64,
    pub trans_b: i64,
    pub sales_diff: f64,
    /// Growth of B over A in percent; `None` when A has no sales.
    pub sales_perc: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportResult {
    DailySummary {
        rows: Vec<DayRow>,
        chart: Option<ChartData>,
    },
    DailyCash {
        rows: Vec<DayRow>,
        grand_total: Option<CashGrandTotal>,
        chart: Option<ChartData>,
    },
    TransactionLog(Vec<TransactionLogRow>),
    CarryForward(Vec<CarryForwardRow>),
    ProductMix {
        rows: Vec<ProductMixRow>,
        total_revenue: f64,
        chart: ChartData,
    },
    SalesTrend {
        rows: Vec<SalesTrendRow>,
        chart: ChartData,
    },
    PeakHours {
        rows: Vec<PeakHourRow>,
        chart: ChartData,
    },
    PeriodicPerformance {
        rows: Vec<PeriodicRow>,
        chart: ChartData,
    },
    Settlements(Vec<DailySettlement>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CsvExport {
    pub file_name: String,
    /// UTF-8 with BOM.
    pub content: Vec<u8>,
}

// --

impl ReportKind {
    pub fn key(&self) -> &'static str {
        match self {
            ReportKind::DailySummary => "daily_summary",
            ReportKind::DailyCashSummary => "daily_cash_summary",
            ReportKind::DailyCashCheck => "daily_cash_check",
            ReportKind::TransactionLog => "transaction_log",
            ReportKind::CombinedSummaryFinal => "combined_summary_final",
            ReportKind::ProductMix => "product_mix",
            ReportKind::SalesTrend => "sales_trend",
            ReportKind::PeakHours => "peak_hours",
            ReportKind::PeriodicPerformance => "periodic_performance",
            ReportKind::DailySettlementQuery => "daily_settlement_query",
        }
    }

    pub const ALL: [ReportKind; 10] = [
        ReportKind::DailySummary,
        ReportKind::DailyCashSummary,
        ReportKind::DailyCashCheck,
        ReportKind::TransactionLog,
        ReportKind::CombinedSummaryFinal,
        ReportKind::ProductMix,
        ReportKind::SalesTrend,
        ReportKind::PeakHours,
        ReportKind::PeriodicPerformance,
        ReportKind::DailySettlementQuery,
    ];
}

impl std::str::FromStr for ReportKind {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportKind::ALL
            .into_iter()
            .find(|k| k.key() == s)
            .ok_or_else(|| UnknownValue::new("report kind", s))
    }
}

/// Parses `YYYY-MM`, `YYYY-Qn` or `YYYY`.
impl std::str::FromStr for Period {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::domain::logic::period::parse_period(s)
    }
}

impl ReportQuery {
    pub fn new(kind: ReportKind, start: NaiveDate) -> Self {
        Self {
            kind,
            location: None,
            status: None,
            start,
            end: None,
            periods: None,
        }
    }

    pub fn until(mut self, end: NaiveDate) -> Self {
        self.end = Some(end);
        self
    }

    pub fn at_location(mut self, location: LocationId) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_status(mut self, status: DayStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn comparing(mut self, a: Period, b: Period) -> Self {
        self.periods = Some((a, b));
        self
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end.unwrap_or(self.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_kinds_parse_by_key() {
        for kind in ReportKind::ALL {
            assert_eq!(kind.key().parse::<ReportKind>().unwrap(), kind);
        }
        assert!("daily-summary".parse::<ReportKind>().is_err());
    }
}
