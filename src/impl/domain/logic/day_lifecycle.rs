use std::collections::HashMap;

use fractic_server_error::ServerError;

use crate::{
    entities::{BusinessDay, Category, CategoryId, CategoryKind, DayStatus, Transaction},
    errors::InvalidDayStatus,
};

use super::pricing::PricedCart;

pub(crate) fn ensure_status(
    day: &BusinessDay,
    location_name: &str,
    allowed: &[DayStatus],
) -> Result<(), ServerError> {
    if allowed.contains(&day.status) {
        return Ok(());
    }
    let expected = allowed
        .iter()
        .map(DayStatus::as_str)
        .collect::<Vec<_>>()
        .join(" or ");
    Err(InvalidDayStatus::new(
        location_name,
        &day.date,
        day.status.as_str(),
        &expected,
    ))
}

/// Adds a priced cart to the day's running totals.
pub(crate) fn apply_cart(day: &mut BusinessDay, cart: &PricedCart) {
    day.total_sales += cart.net_sales();
    day.discount_total += cart.discount_total;
    day.donation_total += cart.donation_total;
    day.other_total += cart.other_total;
    day.total_items += cart.item_count;
    if cart.item_count > 0 || cart.discount_total > 0.0 {
        day.total_transactions += 1;
    }
}

/// Rebuilds every accumulated figure of a day from its stored transactions,
/// then refreshes the frozen expected cash and difference if the day has
/// been counted.
pub(crate) fn recompute_totals(
    day: &mut BusinessDay,
    transactions: &[Transaction],
    categories: &HashMap<CategoryId, Category>,
    donation_category_name: &str,
) {
    day.total_sales = 0.0;
    day.discount_total = 0.0;
    day.donation_total = 0.0;
    day.other_total = 0.0;
    day.total_items = 0;
    day.total_transactions = 0;
    for transaction in transactions {
        let mut has_sales = false;
        for item in &transaction.items {
            let category = item.category_id.and_then(|c| categories.get(&c));
            match category {
                Some(c) if c.kind == CategoryKind::OtherIncome => {
                    if c.name == donation_category_name {
                        day.donation_total += item.price;
                    } else {
                        day.other_total += item.price;
                    }
                }
                _ => {
                    has_sales = true;
                    day.total_sales += item.price;
                    if item.price < 0.0 {
                        day.discount_total -= item.price;
                    } else {
                        day.total_items += 1;
                    }
                }
            }
        }
        if has_sales {
            day.total_transactions += 1;
        }
    }
    refresh_cash_check(day);
}

/// Recomputes expected cash and difference for days that have already been
/// counted.
pub(crate) fn refresh_cash_check(day: &mut BusinessDay) {
    if day.closing_cash.is_some() && day.status == DayStatus::Closed {
        let expected = day.expected_total();
        day.expected_cash = Some(expected);
        day.cash_diff = Some(day.closing_cash.unwrap_or(0.0) - expected);
    }
}

/// Freezes the expected cash and difference on confirmation.
pub(crate) fn freeze_cash_check(day: &mut BusinessDay) {
    let expected = day.expected_total();
    day.expected_cash = Some(expected);
    day.cash_diff = Some(day.closing_cash.unwrap_or(0.0) - expected);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        BusinessDayId, LocationId, Signatures, TransactionId, TransactionItem, TransactionItemId,
    };
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn day(status: DayStatus) -> BusinessDay {
        let date = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        BusinessDay {
            id: BusinessDayId(1),
            date,
            location_id: LocationId(1),
            location_notes: None,
            status,
            opening_cash: 1000.0,
            total_sales: 0.0,
            discount_total: 0.0,
            donation_total: 0.0,
            other_total: 0.0,
            closing_cash: Some(1500.0),
            expected_cash: Some(0.0),
            cash_diff: Some(0.0),
            total_items: 0,
            total_transactions: 0,
            cash_breakdown: None,
            signatures: Signatures::default(),
            updated_at: date.and_hms_opt(9, 0, 0).unwrap(),
        }
    }

    fn category(id: i64, name: &str, kind: CategoryKind) -> (CategoryId, Category) {
        (
            CategoryId(id),
            Category {
                id: CategoryId(id),
                location_id: LocationId(1),
                name: name.into(),
                color: "#000000".into(),
                kind,
            },
        )
    }

    #[test]
    fn status_guard_lists_expected_states() {
        let d = day(DayStatus::Open);
        assert!(ensure_status(&d, "Main", &[DayStatus::Open]).is_ok());
        assert!(ensure_status(&d, "Main", &[DayStatus::PendingReport, DayStatus::Closed]).is_err());
    }

    #[test]
    fn recompute_splits_sales_and_other_income() {
        let categories = HashMap::from([
            category(1, "Books", CategoryKind::Product),
            category(2, "Sale", CategoryKind::DiscountFixed),
            category(3, "捐款", CategoryKind::OtherIncome),
        ]);
        let item = |id: i64, category: Option<i64>, price: f64| TransactionItem {
            id: TransactionItemId(id),
            category_id: category.map(CategoryId),
            price,
        };
        let ts = NaiveDate::from_ymd_opt(2025, 5, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let transactions = vec![
            Transaction {
                id: TransactionId(1),
                business_day_id: BusinessDayId(1),
                timestamp: ts,
                amount: 380.0,
                item_count: 3,
                cash_received: 400.0,
                change_given: 20.0,
                items: vec![
                    item(1, Some(1), 200.0),
                    item(2, None, 200.0),
                    item(3, Some(2), -20.0),
                ],
            },
            Transaction {
                id: TransactionId(2),
                business_day_id: BusinessDayId(1),
                timestamp: ts,
                amount: 100.0,
                item_count: 0,
                cash_received: 100.0,
                change_given: 0.0,
                items: vec![item(4, Some(3), 100.0)],
            },
        ];
        let mut d = day(DayStatus::Closed);
        recompute_totals(&mut d, &transactions, &categories, "捐款");
        assert_eq!(d.total_sales, 380.0);
        assert_eq!(d.discount_total, 20.0);
        assert_eq!(d.donation_total, 100.0);
        assert_eq!(d.total_items, 2);
        assert_eq!(d.total_transactions, 1);
        assert_eq!(d.expected_cash, Some(1480.0));
        assert_eq!(d.cash_diff, Some(20.0));
    }
}
