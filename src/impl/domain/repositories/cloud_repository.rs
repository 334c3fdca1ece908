use std::path::Path;

use async_trait::async_trait;
use fractic_server_error::ServerError;

/// Row to append to a sheet of a spreadsheet kept in the reports folder.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetAppend {
    pub spreadsheet_name: String,
    pub sheet_name: String,
    /// Written once, when the sheet is created.
    pub header: Vec<String>,
    pub row: Vec<String>,
}

/// Remote storage for report sheets and instance backups.
#[async_trait]
pub trait CloudRepository: Send + Sync {
    /// Whether usable credentials are available.
    async fn is_connected(&self) -> bool;

    /// Appends `append.row`, creating the folder, spreadsheet and sheet (with
    /// its header row) when missing.
    async fn append_row(&self, folder_name: &str, append: &SheetAppend)
        -> Result<(), ServerError>;

    /// Uploads a local file into the folder under `upload_name`, returning
    /// the remote file id.
    async fn upload_file(
        &self,
        folder_name: &str,
        path: &Path,
        upload_name: &str,
    ) -> Result<String, ServerError>;
}
