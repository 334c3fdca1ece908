use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use crate::{
    data::repositories::{
        cloud_repository_impl::CloudRepositoryImpl, store_repository_impl::StoreRepositoryImpl,
    },
    domain::{
        logic::runtime_settings::google_settings,
        repositories::{
            cloud_repository::{CloudRepository, SheetAppend},
            store_repository::StoreRepository,
        },
    },
    entities::{BusinessDay, Location},
    presentation::filename_template::{month_sheet_name, spreadsheet_name, SUMMARY_SHEET_NAME},
};

const TRANSACTION_HEADER: [&str; 3] = ["時間戳", "金額", "品項數"];
const SUMMARY_HEADER: [&str; 9] = [
    "日期",
    "據點",
    "開店準備金",
    "本日銷售總額",
    "帳面總額",
    "盤點現金合計",
    "帳差",
    "交易筆數",
    "銷售件數",
];

/// Mirrors recorded transactions and confirmed day summaries into the
/// location's spreadsheet. Failures are logged and never returned.
#[async_trait]
pub(crate) trait SyncUsecase: Send + Sync {
    async fn sync_transaction(
        &self,
        location: &Location,
        timestamp: NaiveDateTime,
        amount: f64,
        item_count: i64,
    );

    async fn sync_day_summary(&self, location: &Location, day: &BusinessDay);
}

pub(crate) struct SyncUsecaseImpl<
    R1 = StoreRepositoryImpl, // Default.
    C1 = CloudRepositoryImpl, // Default.
> where
    R1: StoreRepository,
    C1: CloudRepository + 'static,
{
    store_repository: Arc<R1>,
    cloud_repository: Arc<C1>,
    background: bool,
}

impl<R1, C1> SyncUsecaseImpl<R1, C1>
where
    R1: StoreRepository,
    C1: CloudRepository + 'static,
{
    pub(crate) fn new(
        store_repository: Arc<R1>,
        cloud_repository: Arc<C1>,
        background: bool,
    ) -> Self {
        Self {
            store_repository,
            cloud_repository,
            background,
        }
    }

    async fn push(
        &self,
        location: &Location,
        date: NaiveDate,
        sheet_name: String,
        header: &[&str],
        row: Vec<String>,
    ) {
        let settings = match google_settings(self.store_repository.as_ref()) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::error!(error = %e, "cannot read google settings; sheet sync skipped");
                return;
            }
        };
        let append = SheetAppend {
            spreadsheet_name: spreadsheet_name(&settings.sheets_filename_format, location, date),
            sheet_name,
            header: header.iter().map(|h| h.to_string()).collect(),
            row,
        };
        let cloud = Arc::clone(&self.cloud_repository);
        let folder = settings.drive_folder_name;
        let slug = location.slug.clone();
        let task = async move {
            if !cloud.is_connected().await {
                tracing::warn!(location = %slug, "google not connected; sheet sync skipped");
                return;
            }
            match cloud.append_row(&folder, &append).await {
                Ok(()) => tracing::info!(
                    location = %slug,
                    spreadsheet = %append.spreadsheet_name,
                    sheet = %append.sheet_name,
                    "row appended to sheet"
                ),
                Err(e) => tracing::error!(location = %slug, error = %e, "sheet sync failed"),
            }
        };
        if self.background {
            tokio::spawn(task);
        } else {
            task.await;
        }
    }
}

#[async_trait]
impl<R1, C1> SyncUsecase for SyncUsecaseImpl<R1, C1>
where
    R1: StoreRepository,
    C1: CloudRepository + 'static,
{
    async fn sync_transaction(
        &self,
        location: &Location,
        timestamp: NaiveDateTime,
        amount: f64,
        item_count: i64,
    ) {
        let row = vec![
            timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            amount.to_string(),
            item_count.to_string(),
        ];
        self.push(
            location,
            timestamp.date(),
            month_sheet_name(timestamp.date()),
            &TRANSACTION_HEADER,
            row,
        )
        .await;
    }

    async fn sync_day_summary(&self, location: &Location, day: &BusinessDay) {
        let optional = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
        let row = vec![
            day.date.format("%Y-%m-%d").to_string(),
            location.name.clone(),
            day.opening_cash.to_string(),
            day.total_sales.to_string(),
            optional(day.expected_cash),
            optional(day.closing_cash),
            optional(day.cash_diff),
            day.total_transactions.to_string(),
            day.total_items.to_string(),
        ];
        self.push(
            location,
            day.date,
            SUMMARY_SHEET_NAME.to_string(),
            &SUMMARY_HEADER,
            row,
        )
        .await;
    }
}
