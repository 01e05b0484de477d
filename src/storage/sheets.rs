//! Google Sheets implementation of [`RowStore`].
//!
//! Talks to the Sheets v4 REST API with a service-account bearer token:
//! a short-lived RS256 JWT is exchanged at the key's token endpoint and the
//! resulting access token is cached until shortly before expiry.

use super::{RowStore, SheetRow, StoreError, StoreResult, Table, HEADER};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const TOKEN_LIFETIME_SECS: i64 = 3600;
/// Refresh the cached token this long before it actually expires.
const TOKEN_SLACK_SECS: i64 = 60;

/// Relevant fields of a Google service-account key file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: String,
}

#[derive(Debug, Serialize)]
struct TokenClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

pub struct SheetsStore {
    client: reqwest::Client,
    spreadsheet_id: String,
    votes_sheet: String,
    archive_sheet: String,
    key: ServiceAccountKey,
    encoding_key: jsonwebtoken::EncodingKey,
    token: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for SheetsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsStore")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("votes_sheet", &self.votes_sheet)
            .field("archive_sheet", &self.archive_sheet)
            .finish_non_exhaustive()
    }
}

impl SheetsStore {
    /// Build a store from a service-account key file's JSON contents.
    /// Fails early when the key does not parse or its RSA PEM is invalid.
    pub fn new(spreadsheet_id: String, service_account_json: &str) -> StoreResult<Self> {
        let key: ServiceAccountKey = serde_json::from_str(service_account_json)
            .map_err(|e| StoreError::Auth(format!("invalid service account key: {e}")))?;
        let encoding_key = jsonwebtoken::EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| StoreError::Auth(format!("invalid private key PEM: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            spreadsheet_id,
            votes_sheet: "Notes".to_string(),
            archive_sheet: "Archives".to_string(),
            key,
            encoding_key,
            token: Mutex::new(None),
        })
    }

    fn sheet_name(&self, table: Table) -> &str {
        match table {
            Table::Votes => &self.votes_sheet,
            Table::Archive => &self.archive_sheet,
        }
    }

    fn values_url(&self, range: &str, suffix: &str) -> String {
        format!(
            "https://sheets.googleapis.com/v4/spreadsheets/{}/values/{}{}",
            self.spreadsheet_id, range, suffix
        )
    }

    /// Current bearer token, fetching a fresh one when the cache is stale.
    async fn bearer(&self) -> StoreResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    async fn fetch_token(&self) -> StoreResult<CachedToken> {
        let now = Utc::now();
        let claims = TokenClaims {
            iss: &self.key.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.key.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + TOKEN_LIFETIME_SECS,
        };
        let header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
        let assertion = jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| StoreError::Auth(format!("failed to sign JWT: {e}")))?;

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Auth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Utc::now()
                + ChronoDuration::seconds(token.expires_in - TOKEN_SLACK_SECS),
        })
    }

    async fn check(response: reqwest::Response) -> StoreResult<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(StoreError::Api { status, body })
        }
    }
}

#[derive(Debug, Serialize)]
struct ValueRangeBody {
    values: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[async_trait]
impl RowStore for SheetsStore {
    async fn append(&self, table: Table, row: SheetRow) -> StoreResult<()> {
        let bearer = self.bearer().await?;
        let url = self.values_url(
            &format!("{}!A1:E1", self.sheet_name(table)),
            ":append?valueInputOption=USER_ENTERED",
        );
        let body = ValueRangeBody {
            values: vec![row.to_cells()],
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(bearer)
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn read_all(&self, table: Table) -> StoreResult<Vec<SheetRow>> {
        let bearer = self.bearer().await?;
        // A2:E skips the header row.
        let url = self.values_url(&format!("{}!A2:E", self.sheet_name(table)), "");

        let response = self.client.get(&url).bearer_auth(bearer).send().await?;
        let range: ValueRange = Self::check(response).await?.json().await?;

        let mut rows = Vec::with_capacity(range.values.len());
        for cells in &range.values {
            match SheetRow::from_values(cells) {
                Some(row) => rows.push(row),
                None => tracing::warn!(?cells, "skipping malformed sheet row"),
            }
        }
        Ok(rows)
    }

    async fn replace_all(&self, table: Table, rows: Vec<SheetRow>) -> StoreResult<()> {
        let bearer = self.bearer().await?;
        let sheet = self.sheet_name(table).to_string();

        let clear_url = self.values_url(&format!("{sheet}!A1:E"), ":clear");
        let response = self
            .client
            .post(&clear_url)
            .bearer_auth(&bearer)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        Self::check(response).await?;

        let mut values: Vec<Vec<String>> =
            vec![HEADER.iter().map(|s| s.to_string()).collect()];
        values.extend(rows.iter().map(SheetRow::to_cells));

        let write_url =
            self.values_url(&format!("{sheet}!A1"), "?valueInputOption=USER_ENTERED");
        let response = self
            .client
            .put(&write_url)
            .bearer_auth(&bearer)
            .json(&ValueRangeBody { values })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAKE_KEY_JSON: &str = r#"{
        "client_email": "bot@example.iam.gserviceaccount.com",
        "private_key": "not a pem",
        "token_uri": "https://oauth2.googleapis.com/token"
    }"#;

    #[test]
    fn rejects_garbage_key_json() {
        let err = SheetsStore::new("sheet-id".to_string(), "{ not json").unwrap_err();
        assert!(matches!(err, StoreError::Auth(_)));
    }

    #[test]
    fn rejects_invalid_private_key_pem() {
        let err = SheetsStore::new("sheet-id".to_string(), FAKE_KEY_JSON).unwrap_err();
        assert!(matches!(err, StoreError::Auth(_)));
    }

    #[test]
    fn key_file_parses_expected_fields() {
        let key: ServiceAccountKey = serde_json::from_str(FAKE_KEY_JSON).unwrap();
        assert_eq!(key.client_email, "bot@example.iam.gserviceaccount.com");
        assert_eq!(key.token_uri, "https://oauth2.googleapis.com/token");
    }
}
