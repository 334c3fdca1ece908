use std::path::{Path, PathBuf};

use fractic_server_error::ServerError;
use iso_currency::Currency;
use serde_derive::Deserialize;

use crate::errors::{InvalidConfig, InvalidIsoCurrencyCode, ReadError};

/// Environment variable pointing at the TOML configuration file.
pub const CONFIG_ENV_VAR: &str = "POS_SETTLEMENT_CONFIG";

pub const DEFAULT_DENOMINATIONS: [u32; 8] = [1000, 500, 200, 100, 50, 10, 5, 1];
pub const DEFAULT_DONATION_CATEGORY_NAME: &str = "捐款";

/// Static configuration of an installation. Settings that can be changed at
/// runtime (Drive folder, backup schedule) live in the database instead.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PosConfig {
    pub db_path: PathBuf,
    /// ISO 4217 code used for rounding and amount formatting.
    pub currency: String,
    pub denominations: Vec<u32>,
    /// Name of the `OtherIncome` category that counts as a donation.
    pub donation_category_name: String,
    /// Location names in the order they appear on the settlement form.
    /// Unlisted locations follow, sorted by name.
    pub location_order: Vec<String>,
    pub google: GoogleConfig,
    pub backup: BackupConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GoogleConfig {
    /// Authorized-user credentials file, rewritten on refresh.
    pub token_path: PathBuf,
    pub drive_api_url: String,
    pub sheets_api_url: String,
    /// When false, spreadsheet rows are appended before the operation
    /// returns instead of on a spawned task.
    pub background_sync: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackupConfig {
    /// Directory that backup file names are resolved against.
    pub instance_dir: PathBuf,
    /// Files backed up when the `instance_backup_files` setting is unset.
    pub default_files: Vec<String>,
}

// --

impl Default for PosConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("instance/pos.db"),
            currency: "TWD".to_string(),
            denominations: DEFAULT_DENOMINATIONS.to_vec(),
            donation_category_name: DEFAULT_DONATION_CATEGORY_NAME.to_string(),
            location_order: Vec::new(),
            google: GoogleConfig::default(),
            backup: BackupConfig::default(),
        }
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            token_path: PathBuf::from("instance/token.json"),
            drive_api_url: "https://www.googleapis.com".to_string(),
            sheets_api_url: "https://sheets.googleapis.com".to_string(),
            background_sync: true,
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            instance_dir: PathBuf::from("instance"),
            default_files: vec!["pos.db".to_string()],
        }
    }
}

impl PosConfig {
    pub fn from_string(s: &str) -> Result<Self, ServerError> {
        let config: PosConfig =
            toml::from_str(s).map_err(|e| InvalidConfig::with_debug(&e.message().to_string(), &e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ServerError> {
        Self::from_string(
            &std::fs::read_to_string(path).map_err(|e| ReadError::with_debug(&e))?,
        )
    }

    /// Reads the file given explicitly, else the one named by
    /// `POS_SETTLEMENT_CONFIG`, else falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ServerError> {
        match explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
        {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading configuration");
                Self::from_file(path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn currency(&self) -> Result<Currency, ServerError> {
        Currency::from_code(&self.currency).ok_or_else(|| InvalidIsoCurrencyCode::new(&self.currency))
    }

    fn validate(&self) -> Result<(), ServerError> {
        self.currency()?;
        if self.denominations.is_empty() || self.denominations.contains(&0) {
            return Err(InvalidConfig::new("denominations must be non-empty and positive"));
        }
        if self.donation_category_name.trim().is_empty() {
            return Err(InvalidConfig::new("donation_category_name must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = PosConfig::from_string(
            r#"
            currency = "USD"
            location_order = ["North", "South"]

            [google]
            background_sync = false
            "#,
        )
        .unwrap();
        assert_eq!(config.currency().unwrap(), Currency::USD);
        assert_eq!(config.denominations, DEFAULT_DENOMINATIONS.to_vec());
        assert_eq!(config.location_order, vec!["North", "South"]);
        assert!(!config.google.background_sync);
        assert_eq!(config.google.token_path, PathBuf::from("instance/token.json"));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(PosConfig::from_string("currency = \"XYZ\"").is_err());
        assert!(PosConfig::from_string("denominations = []").is_err());
        assert!(PosConfig::from_string("unknown = 1").is_err());
    }
}
