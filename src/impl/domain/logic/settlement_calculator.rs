use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::entities::{
    BusinessDay, CarryForwardRow, DailySettlement, DayStatus, QueryCalendarStatus,
    SettlementCalendarStatus, SettlementTotals,
};

/// Computes the grand totals of a date from its closed days.
///
/// When the date is not settled yet, next-day cash is zero and the proposed
/// deposit is the full cash on hand.
pub(crate) fn settlement_totals<'a>(
    closed_days: impl IntoIterator<Item = &'a BusinessDay>,
    settlement: Option<&DailySettlement>,
) -> SettlementTotals {
    let mut totals = SettlementTotals::default();
    for day in closed_days {
        totals.expected_cash += day.expected_cash.unwrap_or_else(|| day.expected_total());
        totals.total_sales += day.total_sales;
        totals.opening_cash += day.opening_cash;
        totals.closing_cash += day.closing_cash.unwrap_or(0.0);
        totals.other_cash += day.other_income_total();
        totals.total_transactions += day.total_transactions;
        totals.total_items += day.total_items;
    }
    totals.cash_diff = totals.closing_cash - totals.expected_cash;
    totals.total_cash = totals.closing_cash;
    match settlement {
        Some(s) => {
            totals.deposit = s.total_deposit;
            totals.next_day_cash = s.total_next_day_opening_cash;
        }
        None => {
            totals.next_day_cash = 0.0;
            totals.deposit = totals.total_cash - totals.next_day_cash;
        }
    }
    totals
}

/// Compares each date's opening cash against the next-day cash recorded by
/// the previous date's settlement. Dates where neither side exists are
/// skipped.
pub(crate) fn carry_forward_rows(
    start: NaiveDate,
    end: NaiveDate,
    opening_cash_by_date: &BTreeMap<NaiveDate, f64>,
    settlements_by_date: &BTreeMap<NaiveDate, DailySettlement>,
) -> Vec<CarryForwardRow> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter_map(|date| {
            let yesterday = date
                .pred_opt()
                .and_then(|y| settlements_by_date.get(&y))
                .map(|s| s.total_next_day_opening_cash);
            let today = opening_cash_by_date.get(&date).copied();
            if yesterday.is_none() && today.is_none() {
                return None;
            }
            let yesterday_total = yesterday.unwrap_or(0.0);
            let today_total = today.unwrap_or(0.0);
            Some(CarryForwardRow {
                date,
                yesterday_total,
                today_total,
                cash_check_diff: today_total - yesterday_total,
            })
        })
        .collect()
}

pub(crate) fn settlement_calendar_status(
    days: &[BusinessDay],
    is_settled: bool,
) -> SettlementCalendarStatus {
    if is_settled {
        SettlementCalendarStatus::Settled
    } else if days.is_empty() {
        SettlementCalendarStatus::NoData
    } else if days.iter().all(|d| d.status == DayStatus::Closed) {
        SettlementCalendarStatus::Pending
    } else {
        SettlementCalendarStatus::InProgress
    }
}

/// Sorts items by the position of their location name in `order`; names not
/// listed come last, alphabetically.
pub(crate) fn sort_by_location_order<T>(
    items: &mut [T],
    order: &[String],
    name: impl Fn(&T) -> &str,
) {
    items.sort_by(|a, b| {
        let (a, b) = (name(a), name(b));
        let rank = |n: &str| order.iter().position(|o| o == n).unwrap_or(usize::MAX);
        rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
    });
}

pub(crate) fn query_calendar_status(days: &[BusinessDay]) -> QueryCalendarStatus {
    if days.is_empty() {
        QueryCalendarStatus::NoData
    } else if days
        .iter()
        .any(|d| matches!(d.status, DayStatus::Open | DayStatus::PendingReport))
    {
        QueryCalendarStatus::InProgress
    } else {
        QueryCalendarStatus::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{BusinessDayId, LocationId, Signatures};
    use pretty_assertions::assert_eq;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn day(id: i64, status: DayStatus, opening: f64, sales: f64, closing: f64) -> BusinessDay {
        BusinessDay {
            id: BusinessDayId(id),
            date: date(10),
            location_id: LocationId(id),
            location_notes: None,
            status,
            opening_cash: opening,
            total_sales: sales,
            discount_total: 0.0,
            donation_total: 100.0,
            other_total: 0.0,
            closing_cash: Some(closing),
            expected_cash: None,
            cash_diff: None,
            total_items: 4,
            total_transactions: 2,
            cash_breakdown: None,
            signatures: Signatures::default(),
            updated_at: date(10).and_hms_opt(20, 0, 0).unwrap(),
        }
    }

    #[test]
    fn unsettled_totals_propose_full_deposit() {
        let days = [
            day(1, DayStatus::Closed, 1000.0, 500.0, 1600.0),
            day(2, DayStatus::Closed, 2000.0, 300.0, 2390.0),
        ];
        let totals = settlement_totals(&days, None);
        assert_eq!(totals.expected_cash, 4000.0);
        assert_eq!(totals.total_sales, 800.0);
        assert_eq!(totals.opening_cash, 3000.0);
        assert_eq!(totals.closing_cash, 3990.0);
        assert_eq!(totals.cash_diff, -10.0);
        assert_eq!(totals.other_cash, 200.0);
        assert_eq!(totals.total_cash, 3990.0);
        assert_eq!(totals.next_day_cash, 0.0);
        assert_eq!(totals.deposit, 3990.0);
        assert_eq!(totals.total_transactions, 4);
        assert_eq!(totals.total_items, 8);
    }

    #[test]
    fn settled_totals_use_stored_values() {
        let days = [day(1, DayStatus::Closed, 1000.0, 500.0, 1600.0)];
        let settlement = DailySettlement {
            date: date(10),
            total_deposit: 600.0,
            total_next_day_opening_cash: 1000.0,
            remarks: BTreeMap::new(),
        };
        let totals = settlement_totals(&days, Some(&settlement));
        assert_eq!(totals.deposit, 600.0);
        assert_eq!(totals.next_day_cash, 1000.0);
    }

    #[test]
    fn carry_forward_compares_against_previous_settlement() {
        let settlements = BTreeMap::from([(
            date(1),
            DailySettlement {
                date: date(1),
                total_deposit: 0.0,
                total_next_day_opening_cash: 3000.0,
                remarks: BTreeMap::new(),
            },
        )]);
        let opening = BTreeMap::from([(date(2), 2900.0), (date(4), 1000.0)]);
        let rows = carry_forward_rows(date(1), date(5), &opening, &settlements);
        assert_eq!(
            rows,
            vec![
                CarryForwardRow {
                    date: date(2),
                    yesterday_total: 3000.0,
                    today_total: 2900.0,
                    cash_check_diff: -100.0,
                },
                CarryForwardRow {
                    date: date(4),
                    yesterday_total: 0.0,
                    today_total: 1000.0,
                    cash_check_diff: 1000.0,
                },
            ]
        );
    }

    #[test]
    fn calendar_statuses() {
        let closed = day(1, DayStatus::Closed, 0.0, 0.0, 0.0);
        let open = day(2, DayStatus::Open, 0.0, 0.0, 0.0);
        assert_eq!(
            settlement_calendar_status(&[], false),
            SettlementCalendarStatus::NoData
        );
        assert_eq!(
            settlement_calendar_status(&[closed.clone()], false),
            SettlementCalendarStatus::Pending
        );
        assert_eq!(
            settlement_calendar_status(&[closed.clone(), open.clone()], false),
            SettlementCalendarStatus::InProgress
        );
        assert_eq!(
            settlement_calendar_status(&[closed.clone()], true),
            SettlementCalendarStatus::Settled
        );
        assert_eq!(query_calendar_status(&[closed.clone()]), QueryCalendarStatus::Ready);
        assert_eq!(
            query_calendar_status(&[closed, open]),
            QueryCalendarStatus::InProgress
        );
    }

    #[test]
    fn configured_location_order_comes_first() {
        let mut names = vec!["Pop-up", "Annex", "Main", "Beta"];
        let order = vec!["Main".to_string(), "Annex".to_string()];
        sort_by_location_order(&mut names, &order, |n| *n);
        assert_eq!(names, vec!["Main", "Annex", "Beta", "Pop-up"]);
    }
}
