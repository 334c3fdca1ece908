use std::path::Path;

use async_trait::async_trait;
use fractic_server_error::ServerError;

use crate::{
    data::datasources::{
        google_api_datasource::{
            GoogleApiDatasource, GoogleApiDatasourceImpl, FOLDER_MIME_TYPE, SPREADSHEET_MIME_TYPE,
        },
        token_file_datasource::{TokenDatasource, TokenFileDatasourceImpl},
    },
    domain::repositories::cloud_repository::{CloudRepository, SheetAppend},
    errors::{GoogleNotConnected, ReadError},
};

pub(crate) struct CloudRepositoryImpl<
    G: GoogleApiDatasource = GoogleApiDatasourceImpl,
    T: TokenDatasource = TokenFileDatasourceImpl,
> {
    api: G,
    tokens: T,
}

impl CloudRepositoryImpl {
    pub(crate) fn new(token_path: &Path, drive_url: &str, sheets_url: &str) -> Self {
        Self {
            api: GoogleApiDatasourceImpl::new(drive_url, sheets_url),
            tokens: TokenFileDatasourceImpl::new(token_path),
        }
    }
}

impl<G: GoogleApiDatasource, T: TokenDatasource> CloudRepositoryImpl<G, T> {
    async fn token(&self) -> Result<String, ServerError> {
        self.tokens
            .access_token()
            .await?
            .ok_or_else(GoogleNotConnected::new)
    }

    async fn find_or_create(
        &self,
        token: &str,
        name: &str,
        mime_type: &str,
        parent: Option<&str>,
    ) -> Result<String, ServerError> {
        if let Some(id) = self.api.find_file(token, name, mime_type, parent).await? {
            return Ok(id);
        }
        let id = self.api.create_file(token, name, mime_type, parent).await?;
        tracing::info!(name, mime_type, "created drive file");
        Ok(id)
    }
}

#[async_trait]
impl<G: GoogleApiDatasource, T: TokenDatasource> CloudRepository for CloudRepositoryImpl<G, T> {
    async fn is_connected(&self) -> bool {
        match self.tokens.access_token().await {
            Ok(token) => token.is_some(),
            Err(e) => {
                tracing::warn!(error = %e, "google credentials unusable");
                false
            }
        }
    }

    async fn append_row(
        &self,
        folder_name: &str,
        append: &SheetAppend,
    ) -> Result<(), ServerError> {
        let token = self.token().await?;
        let folder = self
            .find_or_create(&token, folder_name, FOLDER_MIME_TYPE, None)
            .await?;
        let spreadsheet = self
            .find_or_create(
                &token,
                &append.spreadsheet_name,
                SPREADSHEET_MIME_TYPE,
                Some(&folder),
            )
            .await?;
        let titles = self.api.sheet_titles(&token, &spreadsheet).await?;
        let mut rows = Vec::with_capacity(2);
        if !titles.contains(&append.sheet_name) {
            self.api
                .add_sheet(&token, &spreadsheet, &append.sheet_name)
                .await?;
            rows.push(append.header.clone());
        }
        rows.push(append.row.clone());
        self.api
            .append_values(&token, &spreadsheet, &append.sheet_name, &rows)
            .await
    }

    async fn upload_file(
        &self,
        folder_name: &str,
        path: &Path,
        upload_name: &str,
    ) -> Result<String, ServerError> {
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| ReadError::with_debug(&e))?;
        let token = self.token().await?;
        let folder = self
            .find_or_create(&token, folder_name, FOLDER_MIME_TYPE, None)
            .await?;
        self.api
            .upload_file(&token, upload_name, &folder, content)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct FakeApi {
        files: Mutex<Vec<(String, String, Option<String>)>>,
        sheets: Mutex<Vec<String>>,
        appended: Mutex<Vec<Vec<String>>>,
    }

    struct FixedToken(Option<&'static str>);

    #[async_trait]
    impl TokenDatasource for FixedToken {
        async fn access_token(&self) -> Result<Option<String>, ServerError> {
            Ok(self.0.map(str::to_string))
        }
    }

    #[async_trait]
    impl GoogleApiDatasource for FakeApi {
        async fn find_file(
            &self,
            _token: &str,
            name: &str,
            mime_type: &str,
            parent: Option<&str>,
        ) -> Result<Option<String>, ServerError> {
            let files = self.files.lock().unwrap();
            Ok(files
                .iter()
                .position(|(n, m, p)| n == name && m == mime_type && p.as_deref() == parent)
                .map(|i| format!("id{}", i)))
        }

        async fn create_file(
            &self,
            _token: &str,
            name: &str,
            mime_type: &str,
            parent: Option<&str>,
        ) -> Result<String, ServerError> {
            let mut files = self.files.lock().unwrap();
            files.push((name.into(), mime_type.into(), parent.map(str::to_string)));
            Ok(format!("id{}", files.len() - 1))
        }

        async fn upload_file(
            &self,
            _token: &str,
            _name: &str,
            _parent: &str,
            _content: Vec<u8>,
        ) -> Result<String, ServerError> {
            Ok("upload".into())
        }

        async fn sheet_titles(&self, _: &str, _: &str) -> Result<Vec<String>, ServerError> {
            Ok(self.sheets.lock().unwrap().clone())
        }

        async fn add_sheet(&self, _: &str, _: &str, title: &str) -> Result<(), ServerError> {
            self.sheets.lock().unwrap().push(title.into());
            Ok(())
        }

        async fn append_values(
            &self,
            _: &str,
            _: &str,
            _: &str,
            rows: &[Vec<String>],
        ) -> Result<(), ServerError> {
            self.appended.lock().unwrap().extend(rows.iter().cloned());
            Ok(())
        }
    }

    fn append(value: &str) -> SheetAppend {
        SheetAppend {
            spreadsheet_name: "Main_2025_transactions".into(),
            sheet_name: "2025年06月".into(),
            header: vec!["時間".into()],
            row: vec![value.into()],
        }
    }

    #[tokio::test]
    async fn header_is_written_once_per_sheet() {
        let repo = CloudRepositoryImpl {
            api: FakeApi::default(),
            tokens: FixedToken(Some("t")),
        };
        repo.append_row("Reports", &append("a")).await.unwrap();
        repo.append_row("Reports", &append("b")).await.unwrap();
        assert_eq!(
            *repo.api.appended.lock().unwrap(),
            vec![vec!["時間".to_string()], vec!["a".into()], vec!["b".into()]]
        );
        assert_eq!(repo.api.files.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_credentials_are_reported() {
        let repo = CloudRepositoryImpl {
            api: FakeApi::default(),
            tokens: FixedToken(None),
        };
        assert!(!repo.is_connected().await);
        assert!(repo.append_row("Reports", &append("a")).await.is_err());
    }
}
