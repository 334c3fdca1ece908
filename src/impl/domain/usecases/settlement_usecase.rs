use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::NaiveDate;
use fractic_server_error::ServerError;
use iso_currency::Currency;

use crate::{
    config::PosConfig,
    data::repositories::store_repository_impl::StoreRepositoryImpl,
    domain::{
        logic::{
            access::ensure_can,
            period::{month_days, month_range},
            pricing::round_amount,
            settlement_calculator::{
                carry_forward_rows, query_calendar_status, settlement_calendar_status,
                settlement_totals, sort_by_location_order,
            },
            validators::validate_cash,
        },
        repositories::store_repository::{DayFilter, StoreRepository},
    },
    entities::{
        BusinessDay, CarryForwardRow, DailySettlement, DayStatus, LocationReport, Permission,
        QueryCalendarStatus, SettlementCalendarStatus, SettlementRequest, SettlementView, User,
    },
    errors::{AlreadySettled, InvalidInput, NotSettled, NothingToSettle, UnclosedLocations},
    presentation::settlement_printer::SettlementPrinter,
};

/// Combined end-of-day settlement across all locations.
#[async_trait]
pub trait SettlementUsecase: Send + Sync {
    async fn settlement_view(&self, actor: &User, date: NaiveDate)
        -> Result<SettlementView, ServerError>;

    /// Archives the settlement of `date`. A date can only be settled once,
    /// and only after every location that opened on it has closed.
    async fn save_settlement(
        &self,
        actor: &User,
        date: NaiveDate,
        request: SettlementRequest,
    ) -> Result<DailySettlement, ServerError>;

    /// Opening cash of each date against the next-day cash left by the
    /// previous date's settlement.
    async fn carry_forward_check(
        &self,
        actor: &User,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CarryForwardRow>, ServerError>;

    async fn settlement_calendar(
        &self,
        actor: &User,
        year: i32,
        month: u32,
    ) -> Result<BTreeMap<NaiveDate, SettlementCalendarStatus>, ServerError>;

    async fn query_calendar(
        &self,
        actor: &User,
        year: i32,
        month: u32,
    ) -> Result<BTreeMap<NaiveDate, QueryCalendarStatus>, ServerError>;

    /// Plain-text settlement report; only available once the date is settled.
    async fn print_settlement(&self, actor: &User, date: NaiveDate)
        -> Result<String, ServerError>;
}

pub(crate) struct SettlementUsecaseImpl<
    R1 = StoreRepositoryImpl, // Default.
> where
    R1: StoreRepository,
{
    store_repository: Arc<R1>,
    config: Arc<PosConfig>,
    currency: Currency,
}

impl<R1: StoreRepository> SettlementUsecaseImpl<R1> {
    pub(crate) fn new(store_repository: Arc<R1>, config: Arc<PosConfig>, currency: Currency) -> Self {
        Self {
            store_repository,
            config,
            currency,
        }
    }

    fn days_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<BusinessDay>, ServerError> {
        self.store_repository.business_days(DayFilter {
            start,
            end,
            location: None,
            status: None,
        })
    }

    fn build_view(&self, date: NaiveDate) -> Result<SettlementView, ServerError> {
        let names: HashMap<_, _> = self
            .store_repository
            .list_locations()?
            .into_iter()
            .map(|l| (l.id, l.name))
            .collect();
        let name_of = |day: &BusinessDay| {
            names
                .get(&day.location_id)
                .cloned()
                .unwrap_or_else(|| day.location_id.to_string())
        };

        let mut reports = Vec::new();
        let mut unclosed_locations = Vec::new();
        for day in self.days_between(date, date)? {
            if day.status == DayStatus::Closed {
                reports.push(LocationReport {
                    location_name: name_of(&day),
                    day,
                });
            } else {
                unclosed_locations.push(name_of(&day));
            }
        }
        sort_by_location_order(&mut reports, &self.config.location_order, |r| {
            r.location_name.as_str()
        });
        unclosed_locations.sort();

        let settlement = self.store_repository.settlement(date)?;
        let totals = settlement_totals(reports.iter().map(|r| &r.day), settlement.as_ref());
        Ok(SettlementView {
            date,
            all_closed: unclosed_locations.is_empty(),
            reports,
            unclosed_locations,
            settlement,
            totals,
        })
    }
}

#[async_trait]
impl<R1: StoreRepository> SettlementUsecase for SettlementUsecaseImpl<R1> {
    async fn settlement_view(
        &self,
        actor: &User,
        date: NaiveDate,
    ) -> Result<SettlementView, ServerError> {
        ensure_can(actor, Permission::ViewReports)?;
        self.build_view(date)
    }

    async fn save_settlement(
        &self,
        actor: &User,
        date: NaiveDate,
        request: SettlementRequest,
    ) -> Result<DailySettlement, ServerError> {
        ensure_can(actor, Permission::ViewReports)?;
        let view = self.build_view(date)?;
        if view.is_settled() {
            return Err(AlreadySettled::new(&date));
        }
        if !view.unclosed_locations.is_empty() {
            return Err(UnclosedLocations::new(
                &date,
                &view.unclosed_locations.join(", "),
            ));
        }
        if view.reports.is_empty() {
            return Err(NothingToSettle::new(&date));
        }

        let next_day_cash = request
            .total_next_day_opening_cash
            .ok_or_else(|| InvalidInput::new("total_next_day_opening_cash", "is required"))?;
        validate_cash("total_next_day_opening_cash", next_day_cash)?;
        let deposit = match request.total_deposit {
            Some(deposit) => {
                validate_cash("total_deposit", deposit)?;
                deposit
            }
            None if next_day_cash > view.totals.total_cash => {
                return Err(InvalidInput::new(
                    "total_next_day_opening_cash",
                    "exceeds the total cash of the day",
                ));
            }
            None => view.totals.total_cash - next_day_cash,
        };

        let settlement = DailySettlement {
            date,
            total_deposit: round_amount(deposit, self.currency),
            total_next_day_opening_cash: round_amount(next_day_cash, self.currency),
            remarks: request
                .remarks
                .into_iter()
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .filter(|(k, v)| !k.is_empty() && !v.is_empty())
                .collect(),
        };
        self.store_repository.insert_settlement(&settlement)?;
        tracing::info!(
            %date,
            user = %actor.username,
            deposit = settlement.total_deposit,
            next_day_cash = settlement.total_next_day_opening_cash,
            "settlement saved"
        );
        Ok(settlement)
    }

    async fn carry_forward_check(
        &self,
        actor: &User,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CarryForwardRow>, ServerError> {
        ensure_can(actor, Permission::ViewReports)?;
        if start > end {
            return Err(InvalidInput::new("date range", "start is after end"));
        }
        let mut opening_cash_by_date = BTreeMap::new();
        for day in self.days_between(start, end)? {
            *opening_cash_by_date.entry(day.date).or_insert(0.0) += day.opening_cash;
        }
        let previous = start.pred_opt().unwrap_or(start);
        let settlements_by_date = self
            .store_repository
            .settlements_between(previous, end)?
            .into_iter()
            .map(|s| (s.date, s))
            .collect();
        Ok(carry_forward_rows(
            start,
            end,
            &opening_cash_by_date,
            &settlements_by_date,
        ))
    }

    async fn settlement_calendar(
        &self,
        actor: &User,
        year: i32,
        month: u32,
    ) -> Result<BTreeMap<NaiveDate, SettlementCalendarStatus>, ServerError> {
        ensure_can(actor, Permission::ViewReports)?;
        let (start, end) = month_range(year, month)?;
        let by_date = group_by_date(self.days_between(start, end)?);
        let settled: Vec<NaiveDate> = self
            .store_repository
            .settlements_between(start, end)?
            .into_iter()
            .map(|s| s.date)
            .collect();
        Ok(month_days(year, month)?
            .into_iter()
            .map(|date| {
                let days = by_date.get(&date).map(Vec::as_slice).unwrap_or_default();
                (date, settlement_calendar_status(days, settled.contains(&date)))
            })
            .collect())
    }

    async fn query_calendar(
        &self,
        actor: &User,
        year: i32,
        month: u32,
    ) -> Result<BTreeMap<NaiveDate, QueryCalendarStatus>, ServerError> {
        ensure_can(actor, Permission::ViewReports)?;
        let (start, end) = month_range(year, month)?;
        let by_date = group_by_date(self.days_between(start, end)?);
        Ok(month_days(year, month)?
            .into_iter()
            .map(|date| {
                let days = by_date.get(&date).map(Vec::as_slice).unwrap_or_default();
                (date, query_calendar_status(days))
            })
            .collect())
    }

    async fn print_settlement(&self, actor: &User, date: NaiveDate) -> Result<String, ServerError> {
        ensure_can(actor, Permission::ViewReports)?;
        let view = self.build_view(date)?;
        if !view.is_settled() {
            return Err(NotSettled::new(&date));
        }
        Ok(SettlementPrinter::new(self.currency).print(&view))
    }
}

fn group_by_date(days: Vec<BusinessDay>) -> HashMap<NaiveDate, Vec<BusinessDay>> {
    let mut by_date: HashMap<NaiveDate, Vec<BusinessDay>> = HashMap::new();
    for day in days {
        by_date.entry(day.date).or_default().push(day);
    }
    by_date
}
