use chrono::NaiveDateTime;

use super::{business_day::BusinessDayId, category::CategoryId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub(crate) i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionItemId(pub(crate) i64);

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionItem {
    pub id: TransactionItemId,
    pub category_id: Option<CategoryId>,
    /// Unit price; negative for discounts.
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: TransactionId,
    pub business_day_id: BusinessDayId,
    pub timestamp: NaiveDateTime,
    pub amount: f64,
    pub item_count: i64,
    pub cash_received: f64,
    pub change_given: f64,
    pub items: Vec<TransactionItem>,
}

/// A line entered on the POS keypad: a category button pressed after typing
/// `quantity * value`.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub category_id: CategoryId,
    pub quantity: u32,
    /// Unit price for products and fixed discounts, percentage for percent
    /// discounts; ignored for rule categories.
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtherIncomeKind {
    Donation,
    Other,
}

/// Running totals of the day returned after each recorded transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionReceipt {
    pub transaction_id: TransactionId,
    pub amount: f64,
    pub change_given: f64,
    pub total_sales: f64,
    pub total_items: i64,
    pub total_transactions: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OtherIncomeReceipt {
    pub transaction_id: TransactionId,
    pub donation_total: f64,
    pub other_total: f64,
}

/// Correction of a single recorded item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemEdit {
    pub item_id: TransactionItemId,
    pub price: Option<f64>,
    pub category_id: Option<CategoryId>,
}

/// Item to persist, before it receives an id.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NewTransactionItem {
    pub category_id: Option<CategoryId>,
    pub price: f64,
}

// --

impl TransactionId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TransactionItemId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl CartLine {
    pub fn new(category_id: CategoryId, quantity: u32, value: f64) -> Self {
        Self {
            category_id,
            quantity,
            value,
        }
    }

    /// Single unit at the given value.
    pub fn single(category_id: CategoryId, value: f64) -> Self {
        Self::new(category_id, 1, value)
    }
}
