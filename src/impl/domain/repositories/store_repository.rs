use chrono::{NaiveDate, NaiveDateTime};
use fractic_server_error::ServerError;

use crate::{
    domain::entities::transaction::NewTransactionItem,
    entities::{
        BusinessDay, BusinessDayId, Category, CategoryId, CategorySpec, DailySettlement,
        DayStatus, Location, LocationId, LocationSpec, Permission, Role, RoleId, Transaction,
        TransactionId, User, UserId,
    },
};

/// Transaction to persist, before it receives an id.
#[derive(Debug, Clone)]
pub(crate) struct NewTransaction {
    pub(crate) timestamp: NaiveDateTime,
    pub(crate) amount: f64,
    pub(crate) item_count: i64,
    pub(crate) cash_received: f64,
    pub(crate) change_given: f64,
    pub(crate) items: Vec<NewTransactionItem>,
}

/// Filters for range queries over business days.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DayFilter {
    pub(crate) start: NaiveDate,
    pub(crate) end: NaiveDate,
    pub(crate) location: Option<LocationId>,
    pub(crate) status: Option<DayStatus>,
}

pub(crate) trait StoreRepository: Send + Sync {
    // Locations.
    fn list_locations(&self) -> Result<Vec<Location>, ServerError>;
    fn location_by_id(&self, id: LocationId) -> Result<Option<Location>, ServerError>;
    fn location_by_slug(&self, slug: &str) -> Result<Option<Location>, ServerError>;
    fn location_by_name(&self, name: &str) -> Result<Option<Location>, ServerError>;
    fn insert_location(&self, spec: &LocationSpec) -> Result<Location, ServerError>;
    fn update_location(&self, id: LocationId, spec: &LocationSpec)
        -> Result<Location, ServerError>;
    fn delete_location(&self, id: LocationId) -> Result<(), ServerError>;

    // Categories.
    fn list_categories(&self, location: LocationId) -> Result<Vec<Category>, ServerError>;
    fn category_by_id(&self, id: CategoryId) -> Result<Option<Category>, ServerError>;
    fn insert_category(
        &self,
        location: LocationId,
        spec: &CategorySpec,
    ) -> Result<Category, ServerError>;
    fn update_category(&self, id: CategoryId, spec: &CategorySpec)
        -> Result<Category, ServerError>;
    /// Items that referenced the category keep their price and lose the link.
    fn delete_category(&self, id: CategoryId) -> Result<(), ServerError>;

    // Business days.
    fn business_day(
        &self,
        location: LocationId,
        date: NaiveDate,
    ) -> Result<Option<BusinessDay>, ServerError>;
    fn business_day_by_id(&self, id: BusinessDayId) -> Result<Option<BusinessDay>, ServerError>;
    fn business_days(&self, filter: DayFilter) -> Result<Vec<BusinessDay>, ServerError>;
    fn count_business_days(&self, location: LocationId) -> Result<i64, ServerError>;
    fn insert_business_day(
        &self,
        location: LocationId,
        date: NaiveDate,
        opening_cash: f64,
        notes: Option<&str>,
        now: NaiveDateTime,
    ) -> Result<BusinessDay, ServerError>;
    /// Re-reads the day inside an immediate SQL transaction, lets `f` change
    /// it and stores the result. Nothing is written when `f` fails, so status
    /// checks made in `f` hold for the stored row.
    fn update_business_day<F>(&self, id: BusinessDayId, f: F) -> Result<BusinessDay, ServerError>
    where
        F: FnOnce(&mut BusinessDay) -> Result<(), ServerError>;

    // Transactions.
    /// Stores the transaction with its items. The day is re-read and passed
    /// to `f` for its new running totals within the same SQL transaction.
    fn record_transaction<F>(
        &self,
        day: BusinessDayId,
        transaction: &NewTransaction,
        f: F,
    ) -> Result<(TransactionId, BusinessDay), ServerError>
    where
        F: FnOnce(&mut BusinessDay) -> Result<(), ServerError>;
    fn transaction_by_id(&self, id: TransactionId) -> Result<Option<Transaction>, ServerError>;
    fn transactions_for_days(&self, days: &[BusinessDayId])
        -> Result<Vec<Transaction>, ServerError>;
    /// Stores an edited transaction (and its items), then hands the day and
    /// all of its stored transactions to `f` to recompute the totals.
    fn save_transaction<F>(&self, transaction: &Transaction, f: F) -> Result<BusinessDay, ServerError>
    where
        F: FnOnce(&mut BusinessDay, &[Transaction]) -> Result<(), ServerError>;

    // Settlements.
    fn settlement(&self, date: NaiveDate) -> Result<Option<DailySettlement>, ServerError>;
    fn settlements_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailySettlement>, ServerError>;
    fn insert_settlement(&self, settlement: &DailySettlement) -> Result<(), ServerError>;

    // Users and roles.
    fn user_by_username(&self, username: &str) -> Result<Option<User>, ServerError>;
    fn list_users(&self) -> Result<Vec<User>, ServerError>;
    fn insert_user(
        &self,
        username: &str,
        email: Option<&str>,
        password_hash: &str,
    ) -> Result<User, ServerError>;
    fn update_password(&self, id: UserId, password_hash: &str) -> Result<(), ServerError>;
    fn set_user_roles(&self, id: UserId, roles: &[RoleId]) -> Result<(), ServerError>;
    fn list_roles(&self) -> Result<Vec<Role>, ServerError>;
    fn role_by_name(&self, name: &str) -> Result<Option<Role>, ServerError>;
    fn upsert_role(&self, name: &str, permissions: &[Permission]) -> Result<Role, ServerError>;

    // Runtime settings.
    fn setting(&self, key: &str) -> Result<Option<String>, ServerError>;
    fn set_setting(&self, key: &str, value: &str) -> Result<(), ServerError>;
}
