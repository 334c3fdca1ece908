use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::Timelike as _;

use crate::entities::{
    BusinessDay, CashGrandTotal, CategoryId, ChartData, ChartDataset, DayRow, LogItem, Period,
    PeakHourRow, PeriodicRow, ProductMixRow, SalesTrendRow, Transaction, TransactionLogRow,
};

use super::period::bucket_of;

fn chart(labels: Vec<String>, datasets: Vec<(&str, Vec<f64>)>) -> ChartData {
    ChartData {
        labels,
        datasets: datasets
            .into_iter()
            .map(|(label, data)| ChartDataset {
                label: label.to_string(),
                data,
            })
            .collect(),
    }
}

/// Newest date first, then by location.
pub(crate) fn sort_day_rows(rows: &mut [DayRow]) {
    rows.sort_by(|a, b| {
        b.day
            .date
            .cmp(&a.day.date)
            .then(a.day.location_id.cmp(&b.day.location_id))
    });
}

/// Sales per date, one dataset per location.
pub(crate) fn daily_summary_chart(rows: &[DayRow]) -> Option<ChartData> {
    if rows.is_empty() {
        return None;
    }
    let dates: BTreeSet<_> = rows.iter().map(|r| r.day.date).collect();
    let locations: BTreeSet<&str> = rows.iter().map(|r| r.location_name.as_str()).collect();
    let datasets = locations
        .into_iter()
        .map(|location| {
            let data: Vec<f64> = dates
                .iter()
                .map(|date| {
                    rows.iter()
                        .filter(|r| r.day.date == *date && r.location_name == location)
                        .map(|r| r.day.total_sales)
                        .sum::<f64>()
                })
                .collect();
            (location, data)
        })
        .collect();
    Some(chart(
        dates.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect(),
        datasets,
    ))
}

pub(crate) fn cash_grand_total(rows: &[DayRow]) -> Option<CashGrandTotal> {
    if rows.is_empty() {
        return None;
    }
    let mut total = CashGrandTotal::default();
    for BusinessDay {
        opening_cash,
        total_sales,
        expected_cash,
        closing_cash,
        cash_diff,
        donation_total,
        other_total,
        ..
    } in rows.iter().map(|r| &r.day)
    {
        total.opening_cash += opening_cash;
        total.total_sales += total_sales;
        total.expected_cash += expected_cash.unwrap_or(0.0);
        total.closing_cash += closing_cash.unwrap_or(0.0);
        total.cash_diff += cash_diff.unwrap_or(0.0);
        total.donation_total += donation_total;
        total.other_total += other_total;
    }
    total.other_cash = total.donation_total + total.other_total;
    Some(total)
}

/// Sales per location, in order of first appearance.
pub(crate) fn sales_by_location_chart(rows: &[DayRow]) -> Option<ChartData> {
    if rows.is_empty() {
        return None;
    }
    let mut labels: Vec<String> = Vec::new();
    let mut data: Vec<f64> = Vec::new();
    for row in rows {
        match labels.iter().position(|l| *l == row.location_name) {
            Some(i) => data[i] += row.day.total_sales,
            None => {
                labels.push(row.location_name.clone());
                data.push(row.day.total_sales);
            }
        }
    }
    Some(chart(labels, vec![("手帳營收", data)]))
}

/// Transactions in time order with their items resolved to category names.
pub(crate) fn transaction_log(
    transactions: Vec<(String, Transaction)>,
    category_names: &HashMap<CategoryId, String>,
) -> Vec<TransactionLogRow> {
    let mut rows: Vec<TransactionLogRow> = transactions
        .into_iter()
        .map(|(location_name, t)| TransactionLogRow {
            transaction_id: t.id,
            timestamp: t.timestamp,
            location_name,
            items: t
                .items
                .iter()
                .map(|i| LogItem {
                    category_name: i.category_id.and_then(|c| category_names.get(&c).cloned()),
                    price: i.price,
                })
                .collect(),
            amount: t.amount,
            cash_received: t.cash_received,
            change_given: t.change_given,
        })
        .collect();
    rows.sort_by_key(|r| (r.timestamp, r.transaction_id));
    rows
}

/// Units sold and sales of each product category, best sellers first.
/// Only positive items count.
pub(crate) fn product_mix(
    transactions: &[Transaction],
    product_names: &HashMap<CategoryId, String>,
) -> (Vec<ProductMixRow>, f64, ChartData) {
    let mut by_name: BTreeMap<&str, (i64, f64)> = BTreeMap::new();
    for item in transactions.iter().flat_map(|t| t.items.iter()) {
        let Some(name) = item.category_id.and_then(|c| product_names.get(&c)) else {
            continue;
        };
        let entry = by_name.entry(name.as_str()).or_default();
        if item.price > 0.0 {
            entry.0 += 1;
            entry.1 += item.price;
        }
    }
    let mut rows: Vec<ProductMixRow> = by_name
        .into_iter()
        .map(|(name, (items_sold, total_sales))| ProductMixRow {
            category_name: name.to_string(),
            items_sold,
            total_sales,
        })
        .collect();
    rows.sort_by(|a, b| b.total_sales.total_cmp(&a.total_sales));
    let total_revenue = rows.iter().map(|r| r.total_sales).sum();
    let chart = chart(
        rows.iter().map(|r| r.category_name.clone()).collect(),
        vec![("銷售總額", rows.iter().map(|r| r.total_sales).collect())],
    );
    (rows, total_revenue, chart)
}

pub(crate) fn sales_trend(days: &[BusinessDay]) -> (Vec<SalesTrendRow>, ChartData) {
    let mut by_date: BTreeMap<_, (f64, i64)> = BTreeMap::new();
    for day in days {
        let entry = by_date.entry(day.date).or_default();
        entry.0 += day.total_sales;
        entry.1 += day.total_transactions;
    }
    let rows: Vec<SalesTrendRow> = by_date
        .into_iter()
        .map(|(date, (total_sales, total_transactions))| SalesTrendRow {
            date,
            total_sales,
            total_transactions,
        })
        .collect();
    let chart = chart(
        rows.iter()
            .map(|r| r.date.format("%Y-%m-%d").to_string())
            .collect(),
        vec![
            ("總銷售額", rows.iter().map(|r| r.total_sales).collect()),
            (
                "總交易筆數",
                rows.iter().map(|r| r.total_transactions as f64).collect(),
            ),
        ],
    );
    (rows, chart)
}

pub(crate) fn peak_hour_label(hour: u32) -> String {
    format!("{:02}:00 - {}:00", hour, hour + 1)
}

pub(crate) fn peak_hours(transactions: &[Transaction]) -> (Vec<PeakHourRow>, ChartData) {
    let mut by_hour: BTreeMap<u32, (i64, f64)> = BTreeMap::new();
    for t in transactions {
        let entry = by_hour.entry(t.timestamp.hour()).or_default();
        entry.0 += 1;
        entry.1 += t.amount;
    }
    let rows: Vec<PeakHourRow> = by_hour
        .into_iter()
        .map(|(hour, (transactions, total_sales))| PeakHourRow {
            hour,
            transactions,
            total_sales,
        })
        .collect();
    let chart = chart(
        rows.iter().map(|r| peak_hour_label(r.hour)).collect(),
        vec![
            (
                "交易筆數",
                rows.iter().map(|r| r.transactions as f64).collect(),
            ),
            ("銷售總額", rows.iter().map(|r| r.total_sales).collect()),
        ],
    );
    (rows, chart)
}

/// Lines up the buckets of two periods of the same unit and compares their
/// sales.
pub(crate) fn periodic_performance(
    a: (&Period, &[BusinessDay]),
    b: (&Period, &[BusinessDay]),
) -> (Vec<PeriodicRow>, ChartData) {
    fn buckets(period: &Period, days: &[BusinessDay]) -> BTreeMap<u32, (String, f64, i64)> {
        let mut map: BTreeMap<u32, (String, f64, i64)> = BTreeMap::new();
        for day in days {
            let (key, label) = bucket_of(period, day.date);
            let entry = map.entry(key).or_insert((label, 0.0, 0));
            entry.1 += day.total_sales;
            entry.2 += day.total_transactions;
        }
        map
    }
    let map_a = buckets(a.0, a.1);
    let map_b = buckets(b.0, b.1);
    let keys: BTreeSet<u32> = map_a.keys().chain(map_b.keys()).copied().collect();
    let rows: Vec<PeriodicRow> = keys
        .into_iter()
        .map(|key| {
            let (label_a, sales_a, trans_a) = map_a.get(&key).cloned().unwrap_or_default();
            let (label_b, sales_b, trans_b) = map_b.get(&key).cloned().unwrap_or_default();
            let sales_diff = sales_b - sales_a;
            PeriodicRow {
                label: if label_a.is_empty() { label_b } else { label_a },
                sales_a,
                trans_a,
                sales_b,
                trans_b,
                sales_diff,
                sales_perc: (sales_a != 0.0).then(|| sales_diff / sales_a * 100.0),
            }
        })
        .collect();
    let chart = chart(
        rows.iter().map(|r| r.label.clone()).collect(),
        vec![
            ("期間 A", rows.iter().map(|r| r.sales_a).collect()),
            ("期間 B", rows.iter().map(|r| r.sales_b).collect()),
        ],
    );
    (rows, chart)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        BusinessDayId, DayStatus, LocationId, Signatures, TransactionId, TransactionItem,
        TransactionItemId,
    };
    use chrono::{Datelike as _, NaiveDate};
    use pretty_assertions::assert_eq;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn day(location: i64, date: NaiveDate, sales: f64, transactions: i64) -> BusinessDay {
        BusinessDay {
            id: BusinessDayId(location * 100 + date.day0() as i64),
            date,
            location_id: LocationId(location),
            location_notes: None,
            status: DayStatus::Closed,
            opening_cash: 1000.0,
            total_sales: sales,
            discount_total: 0.0,
            donation_total: 10.0,
            other_total: 5.0,
            closing_cash: Some(1000.0 + sales + 15.0),
            expected_cash: Some(1000.0 + sales + 15.0),
            cash_diff: Some(0.0),
            total_items: transactions,
            total_transactions: transactions,
            cash_breakdown: None,
            signatures: Signatures::default(),
            updated_at: date.and_hms_opt(21, 0, 0).unwrap(),
        }
    }

    fn transaction(id: i64, hour: u32, items: &[(i64, f64)]) -> Transaction {
        Transaction {
            id: TransactionId(id),
            business_day_id: BusinessDayId(1),
            timestamp: date(3, 1).and_hms_opt(hour, 15, 0).unwrap(),
            amount: items.iter().map(|(_, p)| p).sum(),
            item_count: items.len() as i64,
            cash_received: 0.0,
            change_given: 0.0,
            items: items
                .iter()
                .enumerate()
                .map(|(i, (c, p))| TransactionItem {
                    id: TransactionItemId(id * 10 + i as i64),
                    category_id: Some(CategoryId(*c)),
                    price: *p,
                })
                .collect(),
        }
    }

    #[test]
    fn daily_rows_are_sorted_and_charted() {
        let mut rows = vec![
            DayRow {
                location_name: "B".into(),
                day: day(2, date(3, 1), 200.0, 2),
            },
            DayRow {
                location_name: "A".into(),
                day: day(1, date(3, 2), 100.0, 1),
            },
            DayRow {
                location_name: "A".into(),
                day: day(1, date(3, 1), 50.0, 1),
            },
        ];
        sort_day_rows(&mut rows);
        assert_eq!(rows[0].day.date, date(3, 2));
        assert_eq!(rows[1].location_name, "A");

        let chart = daily_summary_chart(&rows).unwrap();
        assert_eq!(chart.labels, vec!["2025-03-01", "2025-03-02"]);
        assert_eq!(chart.datasets[0].label, "A");
        assert_eq!(chart.datasets[0].data, vec![50.0, 100.0]);
        assert_eq!(chart.datasets[1].data, vec![200.0, 0.0]);

        let total = cash_grand_total(&rows).unwrap();
        assert_eq!(total.total_sales, 350.0);
        assert_eq!(total.other_cash, 45.0);
    }

    #[test]
    fn product_mix_counts_positive_items_of_products() {
        let names = HashMap::from([
            (CategoryId(1), "Books".to_string()),
            (CategoryId(2), "Toys".to_string()),
        ]);
        let transactions = [
            transaction(1, 10, &[(1, 100.0), (1, 100.0), (3, -20.0)]),
            transaction(2, 11, &[(2, 300.0)]),
        ];
        let (rows, total, _) = product_mix(&transactions, &names);
        assert_eq!(
            rows,
            vec![
                ProductMixRow {
                    category_name: "Toys".into(),
                    items_sold: 1,
                    total_sales: 300.0,
                },
                ProductMixRow {
                    category_name: "Books".into(),
                    items_sold: 2,
                    total_sales: 200.0,
                },
            ]
        );
        assert_eq!(total, 500.0);
    }

    #[test]
    fn peak_hours_group_by_hour() {
        let transactions = [
            transaction(1, 10, &[(1, 100.0)]),
            transaction(2, 10, &[(1, 50.0)]),
            transaction(3, 14, &[(1, 30.0)]),
        ];
        let (rows, chart) = peak_hours(&transactions);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].transactions, 2);
        assert_eq!(rows[0].total_sales, 150.0);
        assert_eq!(chart.labels[1], "14:00 - 15:00");
    }

    #[test]
    fn sales_trend_sums_locations_per_date() {
        let days = [
            day(1, date(3, 1), 100.0, 1),
            day(2, date(3, 1), 200.0, 3),
            day(1, date(3, 2), 50.0, 1),
        ];
        let (rows, _) = sales_trend(&days);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].total_sales, 300.0);
        assert_eq!(rows[0].total_transactions, 4);
    }

    #[test]
    fn periodic_performance_aligns_buckets() {
        let a = Period::Month {
            year: 2025,
            month: 3,
        };
        let b = Period::Month {
            year: 2025,
            month: 4,
        };
        let days_a = [day(1, date(3, 1), 100.0, 1)];
        let days_b = [day(1, date(4, 1), 150.0, 2), day(1, date(4, 2), 80.0, 1)];
        let (rows, _) = periodic_performance((&a, &days_a), (&b, &days_b));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label, "01");
        assert_eq!(rows[0].sales_diff, 50.0);
        assert_eq!(rows[0].sales_perc, Some(50.0));
        assert_eq!(rows[1].sales_perc, None);
    }
}
