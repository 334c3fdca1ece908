use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use fractic_server_error::ServerError;
use iso_currency::Currency;

use crate::{
    config::PosConfig,
    data::repositories::store_repository_impl::StoreRepositoryImpl,
    domain::{
        logic::{
            access::ensure_admin,
            day_lifecycle::{recompute_totals, refresh_cash_check},
            lookup::day_by_id,
            pricing::round_amount,
            validators::validate_cash,
        },
        repositories::store_repository::StoreRepository,
    },
    entities::{
        BusinessDay, BusinessDayId, CashBreakdown, CategoryKind, ItemEdit, Transaction,
        TransactionId, User,
    },
    errors::{DerivedFieldNotEditable, EntityNotFound, InsufficientPayment, InvalidInput},
};

/// Admin edits of recorded figures. Every edit recomputes the totals that
/// depend on it.
#[async_trait]
pub trait CorrectionUsecase: Send + Sync {
    async fn update_opening_cash(
        &self,
        actor: &User,
        day_id: BusinessDayId,
        opening_cash: f64,
        now: NaiveDateTime,
    ) -> Result<BusinessDay, ServerError>;

    async fn update_cash_count(
        &self,
        actor: &User,
        day_id: BusinessDayId,
        counts: &BTreeMap<u32, u32>,
        now: NaiveDateTime,
    ) -> Result<BusinessDay, ServerError>;

    async fn update_transaction(
        &self,
        actor: &User,
        transaction_id: TransactionId,
        cash_received: Option<f64>,
        edits: &[ItemEdit],
        now: NaiveDateTime,
    ) -> Result<(Transaction, BusinessDay), ServerError>;

    /// Donation and other-income totals are accumulated from transactions;
    /// direct edits are always rejected.
    async fn update_other_income(
        &self,
        actor: &User,
        day_id: BusinessDayId,
        donation_total: Option<f64>,
        other_total: Option<f64>,
    ) -> Result<BusinessDay, ServerError>;
}

pub(crate) struct CorrectionUsecaseImpl<
    R1 = StoreRepositoryImpl, // Default.
> where
    R1: StoreRepository,
{
    store_repository: Arc<R1>,
    config: Arc<PosConfig>,
    currency: Currency,
}

impl<R1: StoreRepository> CorrectionUsecaseImpl<R1> {
    pub(crate) fn new(store_repository: Arc<R1>, config: Arc<PosConfig>, currency: Currency) -> Self {
        Self {
            store_repository,
            config,
            currency,
        }
    }
}

#[async_trait]
impl<R1: StoreRepository> CorrectionUsecase for CorrectionUsecaseImpl<R1> {
    async fn update_opening_cash(
        &self,
        actor: &User,
        day_id: BusinessDayId,
        opening_cash: f64,
        now: NaiveDateTime,
    ) -> Result<BusinessDay, ServerError> {
        ensure_admin(actor)?;
        validate_cash("opening_cash", opening_cash)?;
        let day = self.store_repository.update_business_day(day_id, |day| {
            day.opening_cash = round_amount(opening_cash, self.currency);
            refresh_cash_check(day);
            day.updated_at = now;
            Ok(())
        })?;
        tracing::info!(day = %day_id, user = %actor.username, opening_cash, "opening cash corrected");
        Ok(day)
    }

    async fn update_cash_count(
        &self,
        actor: &User,
        day_id: BusinessDayId,
        counts: &BTreeMap<u32, u32>,
        now: NaiveDateTime,
    ) -> Result<BusinessDay, ServerError> {
        ensure_admin(actor)?;
        let breakdown = CashBreakdown::new(
            &self.config.denominations,
            counts.iter().map(|(d, c)| (*d, *c)),
        )?;
        let day = self.store_repository.update_business_day(day_id, |day| {
            day.closing_cash = Some(breakdown.total());
            day.cash_breakdown = Some(breakdown);
            refresh_cash_check(day);
            day.updated_at = now;
            Ok(())
        })?;
        tracing::info!(
            day = %day_id,
            user = %actor.username,
            closing_cash = day.closing_cash.unwrap_or(0.0),
            "cash count corrected"
        );
        Ok(day)
    }

    async fn update_transaction(
        &self,
        actor: &User,
        transaction_id: TransactionId,
        cash_received: Option<f64>,
        edits: &[ItemEdit],
        now: NaiveDateTime,
    ) -> Result<(Transaction, BusinessDay), ServerError> {
        ensure_admin(actor)?;
        let mut transaction = self
            .store_repository
            .transaction_by_id(transaction_id)?
            .ok_or_else(|| EntityNotFound::new("Transaction", &transaction_id.to_string()))?;
        let day = day_by_id(self.store_repository.as_ref(), transaction.business_day_id)?;
        let categories: HashMap<_, _> = self
            .store_repository
            .list_categories(day.location_id)?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        for edit in edits {
            let item = transaction
                .items
                .iter_mut()
                .find(|i| i.id == edit.item_id)
                .ok_or_else(|| {
                    EntityNotFound::new("TransactionItem", &edit.item_id.value().to_string())
                })?;
            if let Some(price) = edit.price {
                if !price.is_finite() {
                    return Err(InvalidInput::new("price", "must be a finite number"));
                }
                item.price = round_amount(price, self.currency);
            }
            if let Some(category_id) = edit.category_id {
                if !categories.contains_key(&category_id) {
                    return Err(EntityNotFound::new("Category", &category_id.to_string()));
                }
                item.category_id = Some(category_id);
            }
        }

        transaction.amount =
            round_amount(transaction.items.iter().map(|i| i.price).sum(), self.currency);
        transaction.item_count = transaction
            .items
            .iter()
            .filter(|i| i.price > 0.0)
            .filter(|i| {
                i.category_id
                    .and_then(|c| categories.get(&c))
                    .is_none_or(|c| c.kind != CategoryKind::OtherIncome)
            })
            .count() as i64;
        if let Some(received) = cash_received {
            validate_cash("cash_received", received)?;
            transaction.cash_received = round_amount(received, self.currency);
        }
        if transaction.cash_received < transaction.amount {
            return Err(InsufficientPayment::new(
                transaction.cash_received,
                transaction.amount,
            ));
        }
        transaction.change_given =
            round_amount(transaction.cash_received - transaction.amount, self.currency);

        let day = self
            .store_repository
            .save_transaction(&transaction, |day, transactions| {
                recompute_totals(
                    day,
                    transactions,
                    &categories,
                    &self.config.donation_category_name,
                );
                day.updated_at = now;
                Ok(())
            })?;
        tracing::info!(
            transaction = %transaction_id,
            user = %actor.username,
            amount = transaction.amount,
            "transaction corrected"
        );
        Ok((transaction, day))
    }

    async fn update_other_income(
        &self,
        actor: &User,
        _day_id: BusinessDayId,
        donation_total: Option<f64>,
        _other_total: Option<f64>,
    ) -> Result<BusinessDay, ServerError> {
        ensure_admin(actor)?;
        let field = if donation_total.is_some() {
            "donation_total"
        } else {
            "other_total"
        };
        Err(DerivedFieldNotEditable::new(field))
    }
}
