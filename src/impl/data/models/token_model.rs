use chrono::{DateTime, NaiveDateTime, Utc};
use serde_derive::{Deserialize, Serialize};

pub(crate) const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Google "authorized user" credentials file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct TokenModel {
    #[serde(default)]
    pub(crate) token: Option<String>,
    #[serde(default)]
    pub(crate) refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub(crate) token_uri: String,
    #[serde(default)]
    pub(crate) client_id: Option<String>,
    #[serde(default)]
    pub(crate) client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) scopes: Option<Vec<String>>,
    /// RFC 3339 or naive UTC (`2025-01-01T10:00:00.123456`).
    #[serde(default)]
    pub(crate) expiry: Option<String>,
}

/// Response of the OAuth token endpoint to a refresh grant.
#[derive(Debug, Deserialize)]
pub(crate) struct RefreshResponseModel {
    pub(crate) access_token: String,
    #[serde(default)]
    pub(crate) expires_in: Option<i64>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl TokenModel {
    pub(crate) fn expiry(&self) -> Option<DateTime<Utc>> {
        let raw = self.expiry.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .map(|d| d.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|n| n.and_utc())
            })
    }

    /// Tokens without a known expiry are treated as expired.
    pub(crate) fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match (&self.token, self.expiry()) {
            (Some(_), Some(expiry)) => expiry <= now + chrono::Duration::seconds(60),
            _ => true,
        }
    }

    pub(crate) fn can_refresh(&self) -> bool {
        self.refresh_token.is_some() && self.client_id.is_some() && self.client_secret.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_formats() {
        let now = DateTime::parse_from_rfc3339("2025-01-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut token: TokenModel = serde_json::from_str(
            r#"{"token": "abc", "refresh_token": "r", "client_id": "c", "client_secret": "s",
                "expiry": "2025-01-01T11:00:00.000001"}"#,
        )
        .unwrap();
        assert_eq!(token.token_uri, DEFAULT_TOKEN_URI);
        assert!(!token.is_expired(now));
        token.expiry = Some("2025-01-01T10:00:30Z".into());
        assert!(token.is_expired(now));
        token.expiry = None;
        assert!(token.is_expired(now));
        assert!(token.can_refresh());
    }
}
