use chrono::NaiveDate;
use fractic_server_error::ServerError;
use iso_currency::Currency;

use crate::{
    domain::logic::report_builder::peak_hour_label,
    entities::{CsvExport, DayRow, ReportKind, ReportResult},
    errors::WriteError,
    presentation::utils::decimal_places,
};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const MANUAL_ITEM_LABEL: &str = "手動輸入";

const DAILY_SUMMARY_HEADER: &[&str] = &[
    "日期",
    "據點",
    "開店金",
    "銷售總額",
    "帳面總額",
    "盤點現金",
    "帳差",
    "交易筆數",
    "銷售件數",
];
const DAILY_CASH_HEADER: &[&str] = &[
    "日期",
    "據點",
    "開店現金",
    "手帳營收",
    "應有現金",
    "實有現金",
    "溢短收",
    "捐款",
    "其他收入",
    "其他現金(總)",
    "備註",
];
const TRANSACTION_LOG_HEADER: &[&str] = &[
    "時間",
    "據點",
    "項目/折扣",
    "類型",
    "單價/折扣額",
    "收到現金",
    "交易總額",
    "找零",
];
const CARRY_FORWARD_HEADER: &[&str] = &["日期", "前日結算明日開店現金", "本日開店現金合計", "差額"];
const PRODUCT_MIX_HEADER: &[&str] = &["類別名稱", "銷售數量", "銷售總額"];
const SALES_TREND_HEADER: &[&str] = &["日期", "總銷售額", "總交易筆數"];
const PEAK_HOURS_HEADER: &[&str] = &["時段", "交易筆數", "銷售總額"];
const PERIODIC_HEADER: &[&str] = &[
    "時間單位",
    "期間 A 銷售額",
    "期間 A 交易數",
    "期間 B 銷售額",
    "期間 B 交易數",
    "銷售額差異",
    "增長率",
];
const SETTLEMENTS_HEADER: &[&str] = &["日期", "存款", "明日開店現金", "備註"];

pub(crate) struct CsvExporter {
    currency: Currency,
}

impl CsvExporter {
    pub(crate) fn new(currency: Currency) -> Self {
        Self { currency }
    }

    /// Renders a report result as a spreadsheet-friendly CSV file named
    /// `{kind}_{YYYYMMDD}.csv` after `today`.
    pub(crate) fn export(
        &self,
        kind: ReportKind,
        result: &ReportResult,
        today: NaiveDate,
    ) -> Result<CsvExport, ServerError> {
        let (header, rows) = self.table(result);

        let mut writer = csv::Writer::from_writer(UTF8_BOM.to_vec());
        writer
            .write_record(header)
            .map_err(|e| WriteError::with_debug("csv export", &e))?;
        for row in rows {
            writer
                .write_record(&row)
                .map_err(|e| WriteError::with_debug("csv export", &e))?;
        }
        let content = writer
            .into_inner()
            .map_err(|e| WriteError::with_debug("csv export", &e))?;

        Ok(CsvExport {
            file_name: format!("{}_{}.csv", kind.key(), today.format("%Y%m%d")),
            content,
        })
    }

    fn table(&self, result: &ReportResult) -> (&'static [&'static str], Vec<Vec<String>>) {
        match result {
            ReportResult::DailySummary { rows, .. } => (
                DAILY_SUMMARY_HEADER,
                rows.iter().map(|r| self.summary_row(r)).collect(),
            ),
            ReportResult::DailyCash { rows, .. } => (
                DAILY_CASH_HEADER,
                rows.iter().map(|r| self.cash_row(r)).collect(),
            ),
            ReportResult::TransactionLog(transactions) => (
                TRANSACTION_LOG_HEADER,
                transactions
                    .iter()
                    .flat_map(|t| {
                        t.items.iter().map(move |item| {
                            vec![
                                t.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                                t.location_name.clone(),
                                item.category_name
                                    .clone()
                                    .unwrap_or_else(|| MANUAL_ITEM_LABEL.to_string()),
                                if item.price > 0.0 { "商品" } else { "折扣" }.to_string(),
                                self.amount(item.price),
                                self.amount(t.cash_received),
                                self.amount(t.amount),
                                self.amount(t.change_given),
                            ]
                        })
                    })
                    .collect(),
            ),
            ReportResult::CarryForward(rows) => (
                CARRY_FORWARD_HEADER,
                rows.iter()
                    .map(|r| {
                        vec![
                            r.date.format("%Y-%m-%d").to_string(),
                            self.amount(r.yesterday_total),
                            self.amount(r.today_total),
                            self.amount(r.cash_check_diff),
                        ]
                    })
                    .collect(),
            ),
            ReportResult::ProductMix { rows, .. } => (
                PRODUCT_MIX_HEADER,
                rows.iter()
                    .map(|r| {
                        vec![
                            r.category_name.clone(),
                            r.items_sold.to_string(),
                            self.amount(r.total_sales),
                        ]
                    })
                    .collect(),
            ),
            ReportResult::SalesTrend { rows, .. } => (
                SALES_TREND_HEADER,
                rows.iter()
                    .map(|r| {
                        vec![
                            r.date.format("%Y-%m-%d").to_string(),
                            self.amount(r.total_sales),
                            r.total_transactions.to_string(),
                        ]
                    })
                    .collect(),
            ),
            ReportResult::PeakHours { rows, .. } => (
                PEAK_HOURS_HEADER,
                rows.iter()
                    .map(|r| {
                        vec![
                            peak_hour_label(r.hour),
                            r.transactions.to_string(),
                            self.amount(r.total_sales),
                        ]
                    })
                    .collect(),
            ),
            ReportResult::PeriodicPerformance { rows, .. } => (
                PERIODIC_HEADER,
                rows.iter()
                    .map(|r| {
                        vec![
                            r.label.clone(),
                            self.amount(r.sales_a),
                            r.trans_a.to_string(),
                            self.amount(r.sales_b),
                            r.trans_b.to_string(),
                            self.amount(r.sales_diff),
                            r.sales_perc
                                .map(|p| format!("{:.2}%", p))
                                .unwrap_or_else(|| "N/A".to_string()),
                        ]
                    })
                    .collect(),
            ),
            ReportResult::Settlements(settlements) => (
                SETTLEMENTS_HEADER,
                settlements
                    .iter()
                    .map(|s| {
                        vec![
                            s.date.format("%Y-%m-%d").to_string(),
                            self.amount(s.total_deposit),
                            self.amount(s.total_next_day_opening_cash),
                            s.remarks
                                .iter()
                                .map(|(k, v)| format!("{}: {}", k, v))
                                .collect::<Vec<_>>()
                                .join("; "),
                        ]
                    })
                    .collect(),
            ),
        }
    }

    fn summary_row(&self, row: &DayRow) -> Vec<String> {
        let day = &row.day;
        vec![
            day.date.format("%Y-%m-%d").to_string(),
            row.location_name.clone(),
            self.amount(day.opening_cash),
            self.amount(day.total_sales),
            self.optional(day.expected_cash),
            self.optional(day.closing_cash),
            self.optional(day.cash_diff),
            day.total_transactions.to_string(),
            day.total_items.to_string(),
        ]
    }

    fn cash_row(&self, row: &DayRow) -> Vec<String> {
        let day = &row.day;
        vec![
            day.date.format("%Y-%m-%d").to_string(),
            row.location_name.clone(),
            self.amount(day.opening_cash),
            self.amount(day.total_sales),
            self.optional(day.expected_cash),
            self.optional(day.closing_cash),
            self.optional(day.cash_diff),
            self.amount(day.donation_total),
            self.amount(day.other_total),
            self.amount(day.other_income_total()),
            day.location_notes.clone().unwrap_or_default(),
        ]
    }

    /// Plain decimal without separators, so spreadsheets read it as a number.
    fn amount(&self, amount: f64) -> String {
        let decimal_places = decimal_places(self.currency);
        format!("{:.decimal_places$}", amount)
    }

    fn optional(&self, amount: Option<f64>) -> String {
        amount.map(|a| self.amount(a)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ChartData, SalesTrendRow};
    use pretty_assertions::assert_eq;

    #[test]
    fn writes_bom_header_and_rows() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let result = ReportResult::SalesTrend {
            rows: vec![SalesTrendRow {
                date,
                total_sales: 1234.5,
                total_transactions: 7,
            }],
            chart: ChartData {
                labels: vec![],
                datasets: vec![],
            },
        };

        let export = CsvExporter::new(Currency::TWD)
            .export(ReportKind::SalesTrend, &result, date)
            .unwrap();
        assert_eq!(export.file_name, "sales_trend_20250301.csv");
        assert!(export.content.starts_with(UTF8_BOM));
        let text = String::from_utf8(export.content[UTF8_BOM.len()..].to_vec()).unwrap();
        assert_eq!(text, "日期,總銷售額,總交易筆數\n2025-03-01,1234.50,7\n");
    }
}
