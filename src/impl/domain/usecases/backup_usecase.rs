use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use fractic_server_error::ServerError;

use crate::{
    config::PosConfig,
    data::repositories::{
        cloud_repository_impl::CloudRepositoryImpl, store_repository_impl::StoreRepositoryImpl,
    },
    domain::{
        logic::runtime_settings::{backup_settings, google_settings},
        repositories::{cloud_repository::CloudRepository, store_repository::StoreRepository},
    },
    entities::{BackupFrequency, BackupReport, BackupStart},
    errors::GoogleNotConnected,
};

/// Copies instance files (database, credentials) to the Drive folder.
///
/// These operations act with the operator's authority; they are started
/// from the command line or at process startup.
#[async_trait]
pub trait BackupUsecase: Send + Sync {
    /// Uploads every configured file as `{stem}_{YYYY-MM-DD_HH-MM-SS}{ext}`.
    async fn run_backup(&self, now: NaiveDateTime) -> Result<BackupReport, ServerError>;

    /// Acts on the configured frequency: runs once for `startup`, spawns the
    /// interval loop for `interval`, and does nothing otherwise.
    async fn init(&self) -> Result<BackupStart, ServerError>;
}

pub(crate) struct BackupUsecaseImpl<
    R1 = StoreRepositoryImpl, // Default.
    C1 = CloudRepositoryImpl, // Default.
> where
    R1: StoreRepository + 'static,
    C1: CloudRepository + 'static,
{
    store_repository: Arc<R1>,
    cloud_repository: Arc<C1>,
    config: Arc<PosConfig>,
}

impl<R1, C1> BackupUsecaseImpl<R1, C1>
where
    R1: StoreRepository + 'static,
    C1: CloudRepository + 'static,
{
    pub(crate) fn new(
        store_repository: Arc<R1>,
        cloud_repository: Arc<C1>,
        config: Arc<PosConfig>,
    ) -> Self {
        Self {
            store_repository,
            cloud_repository,
            config,
        }
    }

    /// Sleeps for the configured interval, then backs up, for as long as the
    /// frequency setting stays `interval`. Settings are re-read every cycle.
    fn spawn_interval_loop(&self) -> tokio::task::JoinHandle<()> {
        let repo = Arc::clone(&self.store_repository);
        let cloud = Arc::clone(&self.cloud_repository);
        let config = Arc::clone(&self.config);
        tokio::spawn(async move {
            loop {
                let settings = match backup_settings(repo.as_ref(), &config.backup.default_files) {
                    Ok(settings) => settings,
                    Err(e) => {
                        tracing::error!(error = %e, "cannot read backup settings; scheduler stopped");
                        return;
                    }
                };
                if settings.frequency != BackupFrequency::Interval {
                    tracing::info!(
                        frequency = settings.frequency.as_str(),
                        "backup scheduler stopped"
                    );
                    return;
                }
                tracing::info!(minutes = settings.interval_minutes, "next backup scheduled");
                tokio::time::sleep(settings.interval()).await;

                let still_interval = backup_settings(repo.as_ref(), &config.backup.default_files)
                    .is_ok_and(|s| s.frequency == BackupFrequency::Interval);
                if !still_interval {
                    continue;
                }
                if let Err(e) =
                    backup_once(repo.as_ref(), cloud.as_ref(), &config, Local::now().naive_local())
                        .await
                {
                    tracing::error!(error = %e, "scheduled backup failed");
                }
            }
        })
    }
}

#[async_trait]
impl<R1, C1> BackupUsecase for BackupUsecaseImpl<R1, C1>
where
    R1: StoreRepository + 'static,
    C1: CloudRepository + 'static,
{
    async fn run_backup(&self, now: NaiveDateTime) -> Result<BackupReport, ServerError> {
        backup_once(
            self.store_repository.as_ref(),
            self.cloud_repository.as_ref(),
            &self.config,
            now,
        )
        .await
    }

    async fn init(&self) -> Result<BackupStart, ServerError> {
        let settings = backup_settings(
            self.store_repository.as_ref(),
            &self.config.backup.default_files,
        )?;
        Ok(match settings.frequency {
            BackupFrequency::Off => BackupStart::Off,
            BackupFrequency::Startup => {
                BackupStart::RanAtStartup(self.run_backup(Local::now().naive_local()).await?)
            }
            BackupFrequency::Shutdown => BackupStart::OnShutdown,
            BackupFrequency::Interval => BackupStart::Scheduled(self.spawn_interval_loop()),
        })
    }
}

async fn backup_once<R1, C1>(
    repo: &R1,
    cloud: &C1,
    config: &PosConfig,
    now: NaiveDateTime,
) -> Result<BackupReport, ServerError>
where
    R1: StoreRepository + ?Sized,
    C1: CloudRepository + ?Sized,
{
    if !cloud.is_connected().await {
        return Err(GoogleNotConnected::new());
    }
    let files = backup_settings(repo, &config.backup.default_files)?.files;
    let folder = google_settings(repo)?.drive_folder_name;
    let mut report = BackupReport::default();
    if files.is_empty() {
        tracing::warn!("no backup files selected");
        return Ok(report);
    }

    for file in files {
        let path = config.backup.instance_dir.join(&file);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::warn!(path = %path.display(), "backup file not found; skipped");
            report.skipped.push(file);
            continue;
        }
        let upload_name = upload_name(&file, now);
        match cloud.upload_file(&folder, &path, &upload_name).await {
            Ok(id) => {
                tracing::info!(file = %file, upload = %upload_name, id = %id, "file backed up");
                report.uploaded.push(upload_name);
            }
            Err(e) => {
                tracing::error!(file = %file, error = %e, "backup upload failed");
                report.failed.push(file);
            }
        }
    }
    Ok(report)
}

/// `pos.db` becomes `pos_2025-03-01_18-30-00.db`.
fn upload_name(file: &str, now: NaiveDateTime) -> String {
    let path = Path::new(file);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.to_string());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    format!("{}_{}{}", stem, now.format("%Y-%m-%d_%H-%M-%S"), ext)
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, sync::Mutex};

    use chrono::NaiveDate;

    use super::*;
    use crate::{
        config::BackupConfig,
        domain::{
            logic::runtime_settings::save_backup_settings,
            repositories::cloud_repository::SheetAppend,
        },
        entities::BackupSettings,
    };
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct RecordingCloud {
        uploads: Mutex<Vec<(String, PathBuf, String)>>,
    }

    #[async_trait]
    impl CloudRepository for RecordingCloud {
        async fn is_connected(&self) -> bool {
            true
        }

        async fn append_row(&self, _: &str, _: &SheetAppend) -> Result<(), ServerError> {
            Ok(())
        }

        async fn upload_file(
            &self,
            folder_name: &str,
            path: &Path,
            upload_name: &str,
        ) -> Result<String, ServerError> {
            self.uploads.lock().unwrap().push((
                folder_name.to_string(),
                path.to_path_buf(),
                upload_name.to_string(),
            ));
            Ok("file-id".into())
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(18, 30, 0)
            .unwrap()
    }

    fn setup(
        dir: &Path,
        files: Vec<String>,
        frequency: BackupFrequency,
    ) -> (BackupUsecaseImpl<StoreRepositoryImpl, RecordingCloud>, Arc<RecordingCloud>) {
        let repo = Arc::new(StoreRepositoryImpl::open_in_memory().unwrap());
        save_backup_settings(
            repo.as_ref(),
            &BackupSettings {
                files,
                frequency,
                ..BackupSettings::default()
            },
        )
        .unwrap();
        let cloud = Arc::new(RecordingCloud::default());
        let config = PosConfig {
            backup: BackupConfig {
                instance_dir: dir.to_path_buf(),
                default_files: vec![],
            },
            ..PosConfig::default()
        };
        (
            BackupUsecaseImpl::new(repo, Arc::clone(&cloud), Arc::new(config)),
            cloud,
        )
    }

    #[test]
    fn upload_names_keep_the_extension() {
        assert_eq!(upload_name("pos.db", now()), "pos_2025-03-01_18-30-00.db");
        assert_eq!(upload_name("notes", now()), "notes_2025-03-01_18-30-00");
    }

    #[tokio::test]
    async fn uploads_existing_files_and_skips_missing_ones() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pos.db"), b"sqlite").unwrap();
        let (usecase, cloud) = setup(
            dir.path(),
            vec!["pos.db".into(), "token.json".into()],
            BackupFrequency::Off,
        );

        let report = usecase.run_backup(now()).await.unwrap();
        assert_eq!(report.uploaded, vec!["pos_2025-03-01_18-30-00.db"]);
        assert_eq!(report.skipped, vec!["token.json"]);
        let uploads = cloud.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, "Cashier_System_Reports");
        assert_eq!(uploads[0].1, dir.path().join("pos.db"));
    }

    #[tokio::test]
    async fn init_follows_the_frequency() {
        let dir = tempfile::tempdir().unwrap();
        let (usecase, _) = setup(dir.path(), vec![], BackupFrequency::Off);
        assert!(matches!(usecase.init().await.unwrap(), BackupStart::Off));

        let (usecase, _) = setup(dir.path(), vec!["pos.db".into()], BackupFrequency::Shutdown);
        assert!(matches!(usecase.init().await.unwrap(), BackupStart::OnShutdown));
    }

    #[tokio::test]
    async fn interval_loop_stops_when_frequency_changes() {
        let dir = tempfile::tempdir().unwrap();
        let (usecase, _) = setup(dir.path(), vec![], BackupFrequency::Off);
        // Not in interval mode: the loop returns on its first check.
        usecase.spawn_interval_loop().await.unwrap();
    }
}
