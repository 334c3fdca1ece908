use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::NaiveDate;
use fractic_server_error::ServerError;
use iso_currency::Currency;

use crate::{
    data::repositories::store_repository_impl::StoreRepositoryImpl,
    domain::{
        logic::{
            access::ensure_can,
            period::{period_range, same_unit},
            report_builder::{
                cash_grand_total, daily_summary_chart, periodic_performance, peak_hours,
                product_mix, sales_by_location_chart, sales_trend, sort_day_rows,
                transaction_log,
            },
            settlement_calculator::carry_forward_rows,
        },
        repositories::store_repository::{DayFilter, StoreRepository},
    },
    entities::{
        BusinessDay, Category, CategoryKind, CsvExport, DayRow, Location, LocationId, Permission,
        ReportKind, ReportQuery, ReportResult, Transaction, User,
    },
    errors::InvalidInput,
    presentation::csv_exporter::CsvExporter,
};

/// Read-only reporting over business days, transactions and settlements.
#[async_trait]
pub trait ReportUsecase: Send + Sync {
    /// Locations that reports can be filtered by.
    async fn locations(&self, actor: &User) -> Result<Vec<Location>, ServerError>;

    async fn query(&self, actor: &User, query: &ReportQuery) -> Result<ReportResult, ServerError>;

    /// Runs the query and renders it as CSV named after `today`.
    async fn export_csv(
        &self,
        actor: &User,
        query: &ReportQuery,
        today: NaiveDate,
    ) -> Result<CsvExport, ServerError>;
}

pub(crate) struct ReportUsecaseImpl<
    R1 = StoreRepositoryImpl, // Default.
> where
    R1: StoreRepository,
{
    store_repository: Arc<R1>,
    currency: Currency,
}

impl<R1: StoreRepository> ReportUsecaseImpl<R1> {
    pub(crate) fn new(store_repository: Arc<R1>, currency: Currency) -> Self {
        Self {
            store_repository,
            currency,
        }
    }

    fn days(
        &self,
        query: &ReportQuery,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<BusinessDay>, ServerError> {
        self.store_repository.business_days(DayFilter {
            start,
            end,
            location: query.location,
            status: query.status,
        })
    }

    fn location_names(&self) -> Result<HashMap<LocationId, String>, ServerError> {
        Ok(self
            .store_repository
            .list_locations()?
            .into_iter()
            .map(|l| (l.id, l.name))
            .collect())
    }

    fn day_rows(&self, days: Vec<BusinessDay>) -> Result<Vec<DayRow>, ServerError> {
        let names = self.location_names()?;
        let mut rows: Vec<DayRow> = days
            .into_iter()
            .map(|day| DayRow {
                location_name: names
                    .get(&day.location_id)
                    .cloned()
                    .unwrap_or_else(|| day.location_id.to_string()),
                day,
            })
            .collect();
        sort_day_rows(&mut rows);
        Ok(rows)
    }

    fn transactions(&self, days: &[BusinessDay]) -> Result<Vec<Transaction>, ServerError> {
        let ids: Vec<_> = days.iter().map(|d| d.id).collect();
        self.store_repository.transactions_for_days(&ids)
    }

    /// Categories of every location appearing in `days`.
    fn categories(&self, days: &[BusinessDay]) -> Result<Vec<Category>, ServerError> {
        let locations: BTreeSet<LocationId> = days.iter().map(|d| d.location_id).collect();
        let mut categories = Vec::new();
        for location in locations {
            categories.extend(self.store_repository.list_categories(location)?);
        }
        Ok(categories)
    }

    fn validate(&self, query: &ReportQuery) -> Result<(), ServerError> {
        if query.start > query.end_date() {
            return Err(InvalidInput::new("date range", "start is after end"));
        }
        if query.kind == ReportKind::PeriodicPerformance {
            match &query.periods {
                Some((a, b)) if same_unit(a, b) => {}
                Some(_) => {
                    return Err(InvalidInput::new(
                        "periods",
                        "both periods must use the same unit",
                    ))
                }
                None => return Err(InvalidInput::new("periods", "are required")),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<R1: StoreRepository> ReportUsecase for ReportUsecaseImpl<R1> {
    async fn locations(&self, actor: &User) -> Result<Vec<Location>, ServerError> {
        ensure_can(actor, Permission::ViewReports)?;
        self.store_repository.list_locations()
    }

    async fn query(&self, actor: &User, query: &ReportQuery) -> Result<ReportResult, ServerError> {
        ensure_can(actor, Permission::ViewReports)?;
        self.validate(query)?;
        let (start, end) = (query.start, query.end_date());

        let result = match query.kind {
            ReportKind::DailySummary => {
                let rows = self.day_rows(self.days(query, start, end)?)?;
                let chart = daily_summary_chart(&rows);
                ReportResult::DailySummary { rows, chart }
            }
            ReportKind::DailyCashSummary | ReportKind::DailyCashCheck => {
                let rows = self.day_rows(self.days(query, start, end)?)?;
                ReportResult::DailyCash {
                    grand_total: cash_grand_total(&rows),
                    chart: sales_by_location_chart(&rows),
                    rows,
                }
            }
            ReportKind::TransactionLog => {
                let days = self.days(query, start, end)?;
                let names = self.location_names()?;
                let day_locations: HashMap<_, _> =
                    days.iter().map(|d| (d.id, d.location_id)).collect();
                let category_names: HashMap<_, _> = self
                    .categories(&days)?
                    .into_iter()
                    .map(|c| (c.id, c.name))
                    .collect();
                let transactions = self
                    .transactions(&days)?
                    .into_iter()
                    .map(|t| {
                        let location_name = day_locations
                            .get(&t.business_day_id)
                            .and_then(|l| names.get(l))
                            .cloned()
                            .unwrap_or_default();
                        (location_name, t)
                    })
                    .collect();
                ReportResult::TransactionLog(transaction_log(transactions, &category_names))
            }
            ReportKind::CombinedSummaryFinal => {
                let mut opening_cash_by_date = BTreeMap::new();
                for day in self.store_repository.business_days(DayFilter {
                    start,
                    end,
                    location: None,
                    status: None,
                })? {
                    *opening_cash_by_date.entry(day.date).or_insert(0.0) += day.opening_cash;
                }
                let settlements_by_date = self
                    .store_repository
                    .settlements_between(start.pred_opt().unwrap_or(start), end)?
                    .into_iter()
                    .map(|s| (s.date, s))
                    .collect();
                ReportResult::CarryForward(carry_forward_rows(
                    start,
                    end,
                    &opening_cash_by_date,
                    &settlements_by_date,
                ))
            }
            ReportKind::ProductMix => {
                let days = self.days(query, start, end)?;
                let product_names: HashMap<_, _> = self
                    .categories(&days)?
                    .into_iter()
                    .filter(|c| c.kind == CategoryKind::Product)
                    .map(|c| (c.id, c.name))
                    .collect();
                let (rows, total_revenue, chart) =
                    product_mix(&self.transactions(&days)?, &product_names);
                ReportResult::ProductMix {
                    rows,
                    total_revenue,
                    chart,
                }
            }
            ReportKind::SalesTrend => {
                let (rows, chart) = sales_trend(&self.days(query, start, end)?);
                ReportResult::SalesTrend { rows, chart }
            }
            ReportKind::PeakHours => {
                let days = self.days(query, start, end)?;
                let (rows, chart) = peak_hours(&self.transactions(&days)?);
                ReportResult::PeakHours { rows, chart }
            }
            ReportKind::PeriodicPerformance => {
                let (a, b) = query
                    .periods
                    .as_ref()
                    .ok_or_else(|| InvalidInput::new("periods", "are required"))?;
                let (start_a, end_a) = period_range(a)?;
                let (start_b, end_b) = period_range(b)?;
                let days_a = self.days(query, start_a, end_a)?;
                let days_b = self.days(query, start_b, end_b)?;
                let (rows, chart) = periodic_performance((a, &days_a), (b, &days_b));
                ReportResult::PeriodicPerformance { rows, chart }
            }
            ReportKind::DailySettlementQuery => {
                ReportResult::Settlements(self.store_repository.settlements_between(start, end)?)
            }
        };
        tracing::debug!(kind = query.kind.key(), %start, %end, "report queried");
        Ok(result)
    }

    async fn export_csv(
        &self,
        actor: &User,
        query: &ReportQuery,
        today: NaiveDate,
    ) -> Result<CsvExport, ServerError> {
        let result = self.query(actor, query).await?;
        let export = CsvExporter::new(self.currency).export(query.kind, &result, today)?;
        tracing::info!(
            kind = query.kind.key(),
            file = %export.file_name,
            user = %actor.username,
            "report exported"
        );
        Ok(export)
    }
}
