use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use fractic_server_error::ServerError;
use iso_currency::Currency;

use crate::{
    config::PosConfig,
    data::repositories::store_repository_impl::StoreRepositoryImpl,
    domain::{
        logic::{
            access::ensure_can,
            day_lifecycle::{apply_cart, ensure_status, freeze_cash_check},
            lookup::{day_of, location_by_slug},
            pricing::{round_amount, PriceCalculator},
            settlement_calculator::sort_by_location_order,
            validators::{validate_cash, validate_notes, validate_signature},
        },
        repositories::store_repository::{NewTransaction, StoreRepository},
        usecases::sync_usecase::{SyncUsecase, SyncUsecaseImpl},
    },
    entities::{
        BusinessDay, CartLine, CashBreakdown, Category, CategoryKind, CategorySpec,
        DailyReport, DashboardEntry, DayStatus, Location, OtherIncomeKind, OtherIncomeReceipt,
        Permission, Signatures, TransactionReceipt, User,
    },
    errors::{DayAlreadyStarted, InsufficientPayment, InvalidInput},
};

pub const OTHER_INCOME_CATEGORY_NAME: &str = "其他收入";
const OTHER_INCOME_COLOR: &str = "#6c757d";

/// Day-to-day operations of a location: opening, selling, counting the
/// drawer and confirming the end-of-day report.
#[async_trait]
pub trait CashierUsecase: Send + Sync {
    /// Every location with the status of its day on `date`.
    async fn dashboard(&self, actor: &User, date: NaiveDate)
        -> Result<Vec<DashboardEntry>, ServerError>;

    /// Categories available on the location's POS keypad.
    async fn pos_categories(&self, actor: &User, slug: &str)
        -> Result<Vec<Category>, ServerError>;

    async fn start_day(
        &self,
        actor: &User,
        slug: &str,
        date: NaiveDate,
        opening_cash: f64,
        notes: Option<&str>,
        now: NaiveDateTime,
    ) -> Result<BusinessDay, ServerError>;

    /// Prices the cart and stores it. `cash_received` defaults to the amount
    /// due.
    async fn record_transaction(
        &self,
        actor: &User,
        slug: &str,
        date: NaiveDate,
        timestamp: NaiveDateTime,
        lines: &[CartLine],
        cash_received: Option<f64>,
    ) -> Result<TransactionReceipt, ServerError>;

    async fn record_other_income(
        &self,
        actor: &User,
        slug: &str,
        date: NaiveDate,
        timestamp: NaiveDateTime,
        amount: f64,
        kind: OtherIncomeKind,
    ) -> Result<OtherIncomeReceipt, ServerError>;

    /// Records the drawer count (denomination to number of notes or coins)
    /// and moves the day to pending report.
    async fn close_day(
        &self,
        actor: &User,
        slug: &str,
        date: NaiveDate,
        counts: &BTreeMap<u32, u32>,
        now: NaiveDateTime,
    ) -> Result<BusinessDay, ServerError>;

    async fn daily_report(
        &self,
        actor: &User,
        slug: &str,
        date: NaiveDate,
    ) -> Result<DailyReport, ServerError>;

    async fn confirm_report(
        &self,
        actor: &User,
        slug: &str,
        date: NaiveDate,
        signatures: Signatures,
        now: NaiveDateTime,
    ) -> Result<BusinessDay, ServerError>;
}

pub(crate) struct CashierUsecaseImpl<
    R1 = StoreRepositoryImpl, // Default.
    S1 = SyncUsecaseImpl,     // Default.
> where
    R1: StoreRepository,
    S1: SyncUsecase,
{
    store_repository: Arc<R1>,
    sync_usecase: Arc<S1>,
    config: Arc<PosConfig>,
    currency: Currency,
}

impl<R1, S1> CashierUsecaseImpl<R1, S1>
where
    R1: StoreRepository,
    S1: SyncUsecase,
{
    pub(crate) fn new(
        store_repository: Arc<R1>,
        sync_usecase: Arc<S1>,
        config: Arc<PosConfig>,
        currency: Currency,
    ) -> Self {
        Self {
            store_repository,
            sync_usecase,
            config,
            currency,
        }
    }

    fn open_day(
        &self,
        actor: &User,
        slug: &str,
        date: NaiveDate,
    ) -> Result<(Location, BusinessDay), ServerError> {
        ensure_can(actor, Permission::OperatePos)?;
        let location = location_by_slug(self.store_repository.as_ref(), slug)?;
        let day = day_of(self.store_repository.as_ref(), &location, date, DayStatus::Open)?;
        ensure_status(&day, &location.name, &[DayStatus::Open])?;
        Ok((location, day))
    }

    /// The location's other-income category for `kind`, created on first use.
    fn other_income_category(
        &self,
        location: &Location,
        kind: OtherIncomeKind,
    ) -> Result<Category, ServerError> {
        let name = match kind {
            OtherIncomeKind::Donation => self.config.donation_category_name.as_str(),
            OtherIncomeKind::Other => OTHER_INCOME_CATEGORY_NAME,
        };
        let existing = self
            .store_repository
            .list_categories(location.id)?
            .into_iter()
            .find(|c| c.name == name);
        match existing {
            Some(c) if c.kind == CategoryKind::OtherIncome => Ok(c),
            Some(c) => Err(InvalidInput::new(
                "category",
                &format!("'{}' exists but is not an other-income category", c.name),
            )),
            None => {
                tracing::info!(location = %location.slug, name, "creating other-income category");
                self.store_repository.insert_category(
                    location.id,
                    &CategorySpec::new(name, OTHER_INCOME_COLOR, CategoryKind::OtherIncome),
                )
            }
        }
    }
}

#[async_trait]
impl<R1, S1> CashierUsecase for CashierUsecaseImpl<R1, S1>
where
    R1: StoreRepository,
    S1: SyncUsecase,
{
    async fn dashboard(
        &self,
        actor: &User,
        date: NaiveDate,
    ) -> Result<Vec<DashboardEntry>, ServerError> {
        ensure_can(actor, Permission::OperatePos)?;
        let mut locations = self.store_repository.list_locations()?;
        sort_by_location_order(&mut locations, &self.config.location_order, |l| l.name.as_str());
        locations
            .into_iter()
            .map(|location| {
                let day = self.store_repository.business_day(location.id, date)?;
                Ok(DashboardEntry {
                    status: day.as_ref().map_or(DayStatus::NotStarted, |d| d.status),
                    total_sales: day.as_ref().map_or(0.0, |d| d.total_sales),
                    total_transactions: day.as_ref().map_or(0, |d| d.total_transactions),
                    location_name: location.name,
                    location_slug: location.slug,
                })
            })
            .collect()
    }

    async fn pos_categories(&self, actor: &User, slug: &str) -> Result<Vec<Category>, ServerError> {
        ensure_can(actor, Permission::OperatePos)?;
        let location = location_by_slug(self.store_repository.as_ref(), slug)?;
        self.store_repository.list_categories(location.id)
    }

    async fn start_day(
        &self,
        actor: &User,
        slug: &str,
        date: NaiveDate,
        opening_cash: f64,
        notes: Option<&str>,
        now: NaiveDateTime,
    ) -> Result<BusinessDay, ServerError> {
        ensure_can(actor, Permission::OperatePos)?;
        let location = location_by_slug(self.store_repository.as_ref(), slug)?;
        validate_cash("opening_cash", opening_cash)?;
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());
        validate_notes(notes)?;
        if self.store_repository.business_day(location.id, date)?.is_some() {
            return Err(DayAlreadyStarted::new(&location.name, &date));
        }
        let day = self.store_repository.insert_business_day(
            location.id,
            date,
            round_amount(opening_cash, self.currency),
            notes,
            now,
        )?;
        tracing::info!(location = %slug, date = %date, opening_cash, "business day started");
        Ok(day)
    }

    async fn record_transaction(
        &self,
        actor: &User,
        slug: &str,
        date: NaiveDate,
        timestamp: NaiveDateTime,
        lines: &[CartLine],
        cash_received: Option<f64>,
    ) -> Result<TransactionReceipt, ServerError> {
        let (location, day) = self.open_day(actor, slug, date)?;
        let categories = self.store_repository.list_categories(location.id)?;
        let cart = PriceCalculator::new(self.currency, &self.config.donation_category_name)
            .evaluate(lines, &categories)?;

        let due = round_amount(cart.amount_due(), self.currency);
        let received = round_amount(cash_received.unwrap_or(due), self.currency);
        validate_cash("cash_received", received)?;
        if received < due {
            return Err(InsufficientPayment::new(received, due));
        }
        let change = round_amount(received - due, self.currency);

        let (transaction_id, day) = self.store_repository.record_transaction(
            day.id,
            &NewTransaction {
                timestamp,
                amount: due,
                item_count: cart.item_count,
                cash_received: received,
                change_given: change,
                items: cart.items.clone(),
            },
            |day| {
                ensure_status(day, &location.name, &[DayStatus::Open])?;
                apply_cart(day, &cart);
                day.updated_at = timestamp;
                Ok(())
            },
        )?;
        tracing::info!(
            location = %slug,
            date = %date,
            transaction = %transaction_id,
            amount = due,
            items = cart.item_count,
            "transaction recorded"
        );

        self.sync_usecase
            .sync_transaction(&location, timestamp, due, cart.item_count)
            .await;

        Ok(TransactionReceipt {
            transaction_id,
            amount: due,
            change_given: change,
            total_sales: day.total_sales,
            total_items: day.total_items,
            total_transactions: day.total_transactions,
        })
    }

    async fn record_other_income(
        &self,
        actor: &User,
        slug: &str,
        date: NaiveDate,
        timestamp: NaiveDateTime,
        amount: f64,
        kind: OtherIncomeKind,
    ) -> Result<OtherIncomeReceipt, ServerError> {
        let (location, day) = self.open_day(actor, slug, date)?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err(InvalidInput::new("amount", "must be greater than zero"));
        }
        let category = self.other_income_category(&location, kind)?;
        let amount = round_amount(amount, self.currency);
        let cart = PriceCalculator::new(self.currency, &self.config.donation_category_name)
            .evaluate(&[CartLine::single(category.id, amount)], &[category])?;

        let (transaction_id, day) = self.store_repository.record_transaction(
            day.id,
            &NewTransaction {
                timestamp,
                amount,
                item_count: 0,
                cash_received: amount,
                change_given: 0.0,
                items: cart.items.clone(),
            },
            |day| {
                ensure_status(day, &location.name, &[DayStatus::Open])?;
                apply_cart(day, &cart);
                day.updated_at = timestamp;
                Ok(())
            },
        )?;
        tracing::info!(location = %slug, date = %date, amount, ?kind, "other income recorded");

        Ok(OtherIncomeReceipt {
            transaction_id,
            donation_total: day.donation_total,
            other_total: day.other_total,
        })
    }

    async fn close_day(
        &self,
        actor: &User,
        slug: &str,
        date: NaiveDate,
        counts: &BTreeMap<u32, u32>,
        now: NaiveDateTime,
    ) -> Result<BusinessDay, ServerError> {
        let (location, day) = self.open_day(actor, slug, date)?;
        let breakdown = CashBreakdown::new(
            &self.config.denominations,
            counts.iter().map(|(d, c)| (*d, *c)),
        )?;
        let day = self.store_repository.update_business_day(day.id, |day| {
            ensure_status(day, &location.name, &[DayStatus::Open])?;
            day.closing_cash = Some(breakdown.total());
            day.cash_breakdown = Some(breakdown);
            day.status = DayStatus::PendingReport;
            day.updated_at = now;
            Ok(())
        })?;
        tracing::info!(
            location = %slug,
            date = %date,
            closing_cash = day.closing_cash.unwrap_or(0.0),
            "business day closed"
        );
        Ok(day)
    }

    async fn daily_report(
        &self,
        actor: &User,
        slug: &str,
        date: NaiveDate,
    ) -> Result<DailyReport, ServerError> {
        ensure_can(actor, Permission::OperatePos)?;
        let location = location_by_slug(self.store_repository.as_ref(), slug)?;
        let day = day_of(
            self.store_repository.as_ref(),
            &location,
            date,
            DayStatus::PendingReport,
        )?;
        ensure_status(
            &day,
            &location.name,
            &[DayStatus::PendingReport, DayStatus::Closed],
        )?;
        let expected_total = day.expected_cash.unwrap_or_else(|| day.expected_total());
        let counted_total = day.closing_cash.unwrap_or(0.0);
        Ok(DailyReport {
            location_name: location.name,
            gross_sales: day.gross_sales(),
            other_income_total: day.other_income_total(),
            expected_total,
            counted_total,
            difference: day.cash_diff.unwrap_or(counted_total - expected_total),
            day,
        })
    }

    async fn confirm_report(
        &self,
        actor: &User,
        slug: &str,
        date: NaiveDate,
        signatures: Signatures,
        now: NaiveDateTime,
    ) -> Result<BusinessDay, ServerError> {
        ensure_can(actor, Permission::OperatePos)?;
        let location = location_by_slug(self.store_repository.as_ref(), slug)?;
        let day = day_of(
            self.store_repository.as_ref(),
            &location,
            date,
            DayStatus::PendingReport,
        )?;
        ensure_status(&day, &location.name, &[DayStatus::PendingReport])?;
        for (role, signature) in [
            ("operator", &signatures.operator),
            ("reviewer", &signatures.reviewer),
            ("cashier", &signatures.cashier),
        ] {
            if let Some(signature) = signature {
                validate_signature(role, signature)?;
            }
        }
        let day = self.store_repository.update_business_day(day.id, |day| {
            ensure_status(day, &location.name, &[DayStatus::PendingReport])?;
            day.signatures = signatures;
            freeze_cash_check(day);
            day.status = DayStatus::Closed;
            day.updated_at = now;
            Ok(())
        })?;
        tracing::info!(
            location = %slug,
            date = %date,
            cash_diff = day.cash_diff.unwrap_or(0.0),
            "daily report confirmed"
        );

        self.sync_usecase.sync_day_summary(&location, &day).await;
        Ok(day)
    }
}
