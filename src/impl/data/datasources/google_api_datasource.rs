use async_trait::async_trait;
use fractic_server_error::ServerError;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_derive::Deserialize;
use serde_json::json;

use crate::errors::GoogleApiError;

pub(crate) const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
pub(crate) const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";

const MULTIPART_BOUNDARY: &str = "pos_settlement_upload_boundary";

/// Thin client over the Drive v3 and Sheets v4 REST endpoints.
#[async_trait]
pub(crate) trait GoogleApiDatasource: Send + Sync {
    async fn find_file(
        &self,
        token: &str,
        name: &str,
        mime_type: &str,
        parent: Option<&str>,
    ) -> Result<Option<String>, ServerError>;

    async fn create_file(
        &self,
        token: &str,
        name: &str,
        mime_type: &str,
        parent: Option<&str>,
    ) -> Result<String, ServerError>;

    async fn upload_file(
        &self,
        token: &str,
        name: &str,
        parent: &str,
        content: Vec<u8>,
    ) -> Result<String, ServerError>;

    async fn sheet_titles(&self, token: &str, spreadsheet_id: &str)
        -> Result<Vec<String>, ServerError>;

    async fn add_sheet(&self, token: &str, spreadsheet_id: &str, title: &str)
        -> Result<(), ServerError>;

    async fn append_values(
        &self,
        token: &str,
        spreadsheet_id: &str,
        sheet: &str,
        rows: &[Vec<String>],
    ) -> Result<(), ServerError>;
}

pub(crate) struct GoogleApiDatasourceImpl {
    client: Client,
    drive_url: String,
    sheets_url: String,
}

#[derive(Debug, Deserialize)]
struct FileListResponse {
    #[serde(default)]
    files: Vec<FileResponse>,
}

#[derive(Debug, Deserialize)]
struct FileResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetResponse {
    #[serde(default)]
    sheets: Vec<SheetResponse>,
}

#[derive(Debug, Deserialize)]
struct SheetResponse {
    properties: SheetPropertiesResponse,
}

#[derive(Debug, Deserialize)]
struct SheetPropertiesResponse {
    title: String,
}

impl GoogleApiDatasourceImpl {
    pub(crate) fn new(drive_url: &str, sheets_url: &str) -> Self {
        Self {
            client: Client::new(),
            drive_url: drive_url.trim_end_matches('/').to_string(),
            sheets_url: sheets_url.trim_end_matches('/').to_string(),
        }
    }

    async fn send(operation: &str, request: RequestBuilder) -> Result<reqwest::Response, ServerError> {
        let response = request
            .send()
            .await
            .map_err(|e| GoogleApiError::with_debug(operation, &e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GoogleApiError::with_debug(
                operation,
                &format!("HTTP {}: {}", status, body),
            ));
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        operation: &str,
        request: RequestBuilder,
    ) -> Result<T, ServerError> {
        Self::send(operation, request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| GoogleApiError::with_debug(operation, &e))
    }
}

/// Drive query literal with quotes and backslashes escaped.
fn query_literal(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

fn a1_range(sheet: &str) -> String {
    format!("'{}'!A1", sheet.replace('\'', "''"))
}

#[async_trait]
impl GoogleApiDatasource for GoogleApiDatasourceImpl {
    async fn find_file(
        &self,
        token: &str,
        name: &str,
        mime_type: &str,
        parent: Option<&str>,
    ) -> Result<Option<String>, ServerError> {
        let mut query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            query_literal(name),
            mime_type
        );
        if let Some(parent) = parent {
            query.push_str(&format!(" and '{}' in parents", query_literal(parent)));
        }
        let request = self
            .client
            .get(format!("{}/drive/v3/files", self.drive_url))
            .bearer_auth(token)
            .query(&[
                ("q", query.as_str()),
                ("spaces", "drive"),
                ("fields", "files(id, name)"),
            ]);
        let list: FileListResponse = Self::send_json("list drive files", request).await?;
        Ok(list.files.into_iter().next().map(|f| f.id))
    }

    async fn create_file(
        &self,
        token: &str,
        name: &str,
        mime_type: &str,
        parent: Option<&str>,
    ) -> Result<String, ServerError> {
        let mut metadata = json!({ "name": name, "mimeType": mime_type });
        if let Some(parent) = parent {
            metadata["parents"] = json!([parent]);
        }
        let request = self
            .client
            .post(format!("{}/drive/v3/files", self.drive_url))
            .bearer_auth(token)
            .query(&[("fields", "id")])
            .json(&metadata);
        let file: FileResponse = Self::send_json("create drive file", request).await?;
        Ok(file.id)
    }

    async fn upload_file(
        &self,
        token: &str,
        name: &str,
        parent: &str,
        content: Vec<u8>,
    ) -> Result<String, ServerError> {
        let metadata = json!({ "name": name, "parents": [parent] });
        let mut body = Vec::with_capacity(content.len() + 512);
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{m}\r\n\
                 --{b}\r\nContent-Type: application/octet-stream\r\n\r\n",
                b = MULTIPART_BOUNDARY,
                m = metadata
            )
            .as_bytes(),
        );
        body.extend_from_slice(&content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());
        let request = self
            .client
            .post(format!("{}/upload/drive/v3/files", self.drive_url))
            .bearer_auth(token)
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
            )
            .body(body);
        let file: FileResponse = Self::send_json("upload drive file", request).await?;
        Ok(file.id)
    }

    async fn sheet_titles(
        &self,
        token: &str,
        spreadsheet_id: &str,
    ) -> Result<Vec<String>, ServerError> {
        let request = self
            .client
            .get(format!("{}/v4/spreadsheets/{}", self.sheets_url, spreadsheet_id))
            .bearer_auth(token)
            .query(&[("fields", "sheets.properties.title")]);
        let spreadsheet: SpreadsheetResponse =
            Self::send_json("get spreadsheet", request).await?;
        Ok(spreadsheet
            .sheets
            .into_iter()
            .map(|s| s.properties.title)
            .collect())
    }

    async fn add_sheet(
        &self,
        token: &str,
        spreadsheet_id: &str,
        title: &str,
    ) -> Result<(), ServerError> {
        let request = self
            .client
            .post(format!(
                "{}/v4/spreadsheets/{}:batchUpdate",
                self.sheets_url, spreadsheet_id
            ))
            .bearer_auth(token)
            .json(&json!({
                "requests": [{ "addSheet": { "properties": { "title": title } } }]
            }));
        Self::send("add sheet", request).await?;
        Ok(())
    }

    async fn append_values(
        &self,
        token: &str,
        spreadsheet_id: &str,
        sheet: &str,
        rows: &[Vec<String>],
    ) -> Result<(), ServerError> {
        let request = self
            .client
            .post(format!(
                "{}/v4/spreadsheets/{}/values/{}:append",
                self.sheets_url,
                spreadsheet_id,
                a1_range(sheet)
            ))
            .bearer_auth(token)
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&json!({ "values": rows }));
        Self::send("append sheet values", request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_literals_are_escaped() {
        assert_eq!(query_literal("Bob's"), "Bob\\'s");
        assert_eq!(a1_range("2025年06月"), "'2025年06月'!A1");
        assert_eq!(a1_range("it's"), "'it''s'!A1");
    }
}
