/// Keys of the runtime settings stored in the `system_setting` table.
pub mod keys {
    pub const DRIVE_FOLDER_NAME: &str = "drive_folder_name";
    pub const SHEETS_FILENAME_FORMAT: &str = "sheets_filename_format";
    pub const INSTANCE_BACKUP_FILES: &str = "instance_backup_files";
    pub const INSTANCE_BACKUP_FREQUENCY: &str = "instance_backup_frequency";
    pub const INSTANCE_BACKUP_INTERVAL_MINUTES: &str = "instance_backup_interval_minutes";
}

pub const DEFAULT_DRIVE_FOLDER_NAME: &str = "Cashier_System_Reports";
pub const DEFAULT_SHEETS_FILENAME_FORMAT: &str = "{location_name}_{year}_transactions";
pub const DEFAULT_BACKUP_INTERVAL_MINUTES: u64 = 1440;
/// Thirty days.
pub const MAX_BACKUP_INTERVAL_MINUTES: u64 = 43_200;

#[derive(Debug, Clone, PartialEq)]
pub struct GoogleSettings {
    pub drive_folder_name: String,
    /// Supports `{location_name}`, `{location_slug}`, `{year}`, `{month}`.
    pub sheets_filename_format: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupFrequency {
    Off,
    Startup,
    Shutdown,
    Interval,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackupSettings {
    pub files: Vec<String>,
    pub frequency: BackupFrequency,
    pub interval_minutes: u64,
}

/// Outcome of one backup run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackupReport {
    /// Names the files were uploaded under.
    pub uploaded: Vec<String>,
    /// Configured files that do not exist.
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

/// What initializing backups did, depending on the configured frequency.
#[derive(Debug)]
pub enum BackupStart {
    Off,
    RanAtStartup(BackupReport),
    /// The caller runs a backup when it exits.
    OnShutdown,
    Scheduled(tokio::task::JoinHandle<()>),
}

// --

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            drive_folder_name: DEFAULT_DRIVE_FOLDER_NAME.to_string(),
            sheets_filename_format: DEFAULT_SHEETS_FILENAME_FORMAT.to_string(),
        }
    }
}

impl BackupFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupFrequency::Off => "off",
            BackupFrequency::Startup => "startup",
            BackupFrequency::Shutdown => "shutdown",
            BackupFrequency::Interval => "interval",
        }
    }

    /// Unknown values disable backups.
    pub fn parse(s: &str) -> Self {
        match s {
            "startup" => BackupFrequency::Startup,
            "shutdown" => BackupFrequency::Shutdown,
            "interval" => BackupFrequency::Interval,
            _ => BackupFrequency::Off,
        }
    }
}

impl BackupSettings {
    /// Time between interval backups.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            frequency: BackupFrequency::Off,
            interval_minutes: DEFAULT_BACKUP_INTERVAL_MINUTES,
        }
    }
}
