use fractic_server_error::ServerError;

use crate::{
    domain::repositories::store_repository::StoreRepository,
    entities::{
        keys, BackupFrequency, BackupSettings, GoogleSettings, DEFAULT_BACKUP_INTERVAL_MINUTES,
        MAX_BACKUP_INTERVAL_MINUTES,
    },
    errors::InvalidInput,
};

pub(crate) fn google_settings<R: StoreRepository + ?Sized>(
    repo: &R,
) -> Result<GoogleSettings, ServerError> {
    let defaults = GoogleSettings::default();
    Ok(GoogleSettings {
        drive_folder_name: non_empty(repo.setting(keys::DRIVE_FOLDER_NAME)?)
            .unwrap_or(defaults.drive_folder_name),
        sheets_filename_format: non_empty(repo.setting(keys::SHEETS_FILENAME_FORMAT)?)
            .unwrap_or(defaults.sheets_filename_format),
    })
}

pub(crate) fn save_google_settings<R: StoreRepository + ?Sized>(
    repo: &R,
    settings: &GoogleSettings,
) -> Result<(), ServerError> {
    if settings.drive_folder_name.trim().is_empty() {
        return Err(InvalidInput::new("drive_folder_name", "must not be empty"));
    }
    if settings.sheets_filename_format.trim().is_empty() {
        return Err(InvalidInput::new("sheets_filename_format", "must not be empty"));
    }
    repo.set_setting(keys::DRIVE_FOLDER_NAME, settings.drive_folder_name.trim())?;
    repo.set_setting(
        keys::SHEETS_FILENAME_FORMAT,
        settings.sheets_filename_format.trim(),
    )
}

/// Backup settings; the file list is stored as a JSON array and falls back to
/// `default_files` when unset. Unparsable or out-of-range intervals fall back
/// to the default.
pub(crate) fn backup_settings<R: StoreRepository + ?Sized>(
    repo: &R,
    default_files: &[String],
) -> Result<BackupSettings, ServerError> {
    let files = match non_empty(repo.setting(keys::INSTANCE_BACKUP_FILES)?) {
        Some(raw) => serde_json::from_str::<Vec<String>>(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "invalid backup file list setting");
            Vec::new()
        }),
        None => default_files.to_vec(),
    };
    let frequency = repo
        .setting(keys::INSTANCE_BACKUP_FREQUENCY)?
        .map(|f| BackupFrequency::parse(&f))
        .unwrap_or(BackupFrequency::Off);
    let interval_minutes = repo
        .setting(keys::INSTANCE_BACKUP_INTERVAL_MINUTES)?
        .and_then(|m| m.trim().parse::<u64>().ok())
        .filter(|m| (1..=MAX_BACKUP_INTERVAL_MINUTES).contains(m))
        .unwrap_or(DEFAULT_BACKUP_INTERVAL_MINUTES);
    Ok(BackupSettings {
        files,
        frequency,
        interval_minutes,
    })
}

pub(crate) fn save_backup_settings<R: StoreRepository + ?Sized>(
    repo: &R,
    settings: &BackupSettings,
) -> Result<(), ServerError> {
    if settings.interval_minutes == 0 {
        return Err(InvalidInput::new("interval_minutes", "must be positive"));
    }
    if settings.interval_minutes > MAX_BACKUP_INTERVAL_MINUTES {
        return Err(InvalidInput::new(
            "interval_minutes",
            &format!("must be at most {}", MAX_BACKUP_INTERVAL_MINUTES),
        ));
    }
    if settings
        .files
        .iter()
        .any(|f| f.trim().is_empty() || f.contains("..") || f.starts_with('/'))
    {
        return Err(InvalidInput::new(
            "files",
            "must be names relative to the instance directory",
        ));
    }
    let files = serde_json::to_string(&settings.files)
        .map_err(|e| InvalidInput::with_debug("files", "cannot be serialized", &e))?;
    repo.set_setting(keys::INSTANCE_BACKUP_FILES, &files)?;
    repo.set_setting(keys::INSTANCE_BACKUP_FREQUENCY, settings.frequency.as_str())?;
    repo.set_setting(
        keys::INSTANCE_BACKUP_INTERVAL_MINUTES,
        &settings.interval_minutes.to_string(),
    )
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::repositories::store_repository_impl::StoreRepositoryImpl;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_then_saved_values() {
        let repo = StoreRepositoryImpl::open_in_memory().unwrap();
        assert_eq!(google_settings(&repo).unwrap(), GoogleSettings::default());
        let defaults = backup_settings(&repo, &["pos.db".to_string()]).unwrap();
        assert_eq!(defaults.files, vec!["pos.db"]);
        assert_eq!(defaults.frequency, BackupFrequency::Off);

        save_backup_settings(
            &repo,
            &BackupSettings {
                files: vec!["pos.db".into(), "token.json".into()],
                frequency: BackupFrequency::Interval,
                interval_minutes: 30,
            },
        )
        .unwrap();
        let saved = backup_settings(&repo, &[]).unwrap();
        assert_eq!(saved.files, vec!["pos.db", "token.json"]);
        assert_eq!(saved.frequency, BackupFrequency::Interval);
        assert_eq!(saved.interval_minutes, 30);
    }

    #[test]
    fn rejects_paths_outside_instance_dir() {
        let repo = StoreRepositoryImpl::open_in_memory().unwrap();
        let settings = BackupSettings {
            files: vec!["../secrets".into()],
            ..BackupSettings::default()
        };
        assert!(save_backup_settings(&repo, &settings).is_err());
    }

    #[test]
    fn interval_is_bounded() {
        let repo = StoreRepositoryImpl::open_in_memory().unwrap();
        let huge = BackupSettings {
            frequency: BackupFrequency::Interval,
            interval_minutes: u64::MAX,
            ..BackupSettings::default()
        };
        assert!(save_backup_settings(&repo, &huge).is_err());
        assert_eq!(huge.interval(), std::time::Duration::from_secs(u64::MAX));

        // Values written by other tools are clamped back to the default.
        repo.set_setting(keys::INSTANCE_BACKUP_INTERVAL_MINUTES, &u64::MAX.to_string())
            .unwrap();
        let loaded = backup_settings(&repo, &[]).unwrap();
        assert_eq!(loaded.interval_minutes, DEFAULT_BACKUP_INTERVAL_MINUTES);
        assert_eq!(loaded.interval(), std::time::Duration::from_secs(86_400));
    }
}
