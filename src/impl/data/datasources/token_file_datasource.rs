use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use fractic_server_error::ServerError;
use reqwest::Client;

use crate::{
    data::models::token_model::{RefreshResponseModel, TokenModel},
    errors::{GoogleApiError, WriteError},
};

const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

#[async_trait]
pub(crate) trait TokenDatasource: Send + Sync {
    /// A usable access token, refreshing (and rewriting the token file) when
    /// the stored one has expired. `None` when no valid credentials exist.
    async fn access_token(&self) -> Result<Option<String>, ServerError>;
}

pub(crate) struct TokenFileDatasourceImpl {
    path: PathBuf,
    client: Client,
}

impl TokenFileDatasourceImpl {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            client: Client::new(),
        }
    }

    async fn load(&self) -> Option<TokenModel> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "no google token file");
                return None;
            }
        };
        match serde_json::from_str::<TokenModel>(&raw) {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "invalid google token file");
                None
            }
        }
    }

    async fn refresh(&self, token: &mut TokenModel) -> Result<(), ServerError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", token.refresh_token.as_deref().unwrap_or_default()),
            ("client_id", token.client_id.as_deref().unwrap_or_default()),
            ("client_secret", token.client_secret.as_deref().unwrap_or_default()),
        ];
        let response = self
            .client
            .post(&token.token_uri)
            .form(&form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| GoogleApiError::with_debug("refresh access token", &e))?;
        let refreshed: RefreshResponseModel = response
            .json()
            .await
            .map_err(|e| GoogleApiError::with_debug("refresh access token", &e))?;
        let lifetime = refreshed.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        token.token = Some(refreshed.access_token);
        token.expiry = Some((Utc::now() + Duration::seconds(lifetime)).to_rfc3339());

        let path = self.path.display().to_string();
        let serialized =
            serde_json::to_string_pretty(token).map_err(|e| WriteError::with_debug(&path, &e))?;
        tokio::fs::write(&self.path, serialized)
            .await
            .map_err(|e| WriteError::with_debug(&path, &e))?;
        tracing::info!("google access token refreshed");
        Ok(())
    }
}

#[async_trait]
impl TokenDatasource for TokenFileDatasourceImpl {
    async fn access_token(&self) -> Result<Option<String>, ServerError> {
        let Some(mut token) = self.load().await else {
            return Ok(None);
        };
        if !token.is_expired(Utc::now()) {
            return Ok(token.token);
        }
        if !token.can_refresh() {
            tracing::warn!("google token expired and cannot be refreshed");
            return Ok(None);
        }
        self.refresh(&mut token).await?;
        Ok(token.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::{
        matchers::{body_string_contains, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    #[tokio::test]
    async fn missing_file_means_not_connected() {
        let dir = tempfile::tempdir().unwrap();
        let ds = TokenFileDatasourceImpl::new(dir.path().join("token.json"));
        assert_eq!(ds.access_token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_rewritten() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh",
                "expires_in": 3599,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("token.json");
        std::fs::write(
            &file,
            serde_json::json!({
                "token": "stale",
                "refresh_token": "r",
                "client_id": "c",
                "client_secret": "s",
                "token_uri": format!("{}/token", server.uri()),
                "expiry": "2000-01-01T00:00:00Z",
            })
            .to_string(),
        )
        .unwrap();

        let ds = TokenFileDatasourceImpl::new(&file);
        assert_eq!(ds.access_token().await.unwrap().as_deref(), Some("fresh"));
        let stored: TokenModel =
            serde_json::from_str(&std::fs::read_to_string(&file).unwrap()).unwrap();
        assert_eq!(stored.token.as_deref(), Some("fresh"));
        assert!(!stored.is_expired(Utc::now()));
    }
}
