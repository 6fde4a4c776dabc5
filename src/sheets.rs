use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::ServiceAccountKey;
use crate::error::FetchError;
use crate::normalize::{self, NormalizedData};

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const TOKEN_EXPIRY_SLACK_SECS: i64 = 60;

/// Seam between the cache layer and the remote spreadsheet, so the cache
/// can be exercised against an in-memory source.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
    ) -> Result<NormalizedData, FetchError>;
}

/// Read-only Google Sheets v4 client authenticated with a service-account
/// key. Access tokens are cached until shortly before expiry.
pub struct SheetsClient {
    http: reqwest::Client,
    key: ServiceAccountKey,
    base_url: String,
    token: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_lifetime")]
    expires_in: i64,
}

fn default_token_lifetime() -> i64 {
    3600
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

impl SheetsClient {
    pub fn new(key: ServiceAccountKey, timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(SheetsClient {
            http,
            key,
            base_url: SHEETS_BASE_URL.to_string(),
            token: Mutex::new(None),
        })
    }

    /// Fetches the worksheet as a grid of rows, header row first.
    pub async fn fetch_grid(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
    ) -> Result<Vec<Vec<String>>, FetchError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url,
            encode_path_segment(spreadsheet_id),
            encode_path_segment(sheet_name)
        );
        tracing::debug!(spreadsheet_id, sheet = sheet_name, "fetching worksheet grid");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .query(&[("majorDimension", "ROWS")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "sheets values request failed");
            return Err(classify_values_failure(
                status.as_u16(),
                spreadsheet_id,
                sheet_name,
                &body,
            ));
        }

        let body = response.text().await?;
        let range: ValueRange = serde_json::from_str(&body)
            .map_err(|err| FetchError::Transient(format!("failed to parse Sheets response: {err}")))?;
        if range.values.is_empty() {
            return Err(FetchError::NotFound(format!(
                "worksheet '{sheet_name}' returned no data"
            )));
        }
        Ok(range.values)
    }

    /// Returns a bearer token, exchanging a signed assertion for a fresh
    /// one when the cached token is missing or about to expire.
    async fn access_token(&self) -> Result<String, FetchError> {
        let mut slot = self.token.lock().await;
        if let Some(cached) = slot.as_ref() {
            if Utc::now() < cached.expires_at {
                return Ok(cached.value.clone());
            }
        }

        let assertion = self.sign_assertion()?;
        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "token exchange failed");
            return Err(classify_token_failure(status.as_u16(), &body));
        }

        let token: TokenResponse = response.json().await?;
        let expires_at = Utc::now()
            + chrono::Duration::seconds((token.expires_in - TOKEN_EXPIRY_SLACK_SECS).max(0));
        let value = token.access_token.clone();
        *slot = Some(CachedToken {
            value: token.access_token,
            expires_at,
        });
        tracing::debug!("obtained sheets access token");
        Ok(value)
    }

    fn sign_assertion(&self) -> Result<String, FetchError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let encoding_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())?;
        let jwt = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)?;
        Ok(jwt)
    }
}

#[async_trait]
impl RecordSource for SheetsClient {
    async fn fetch(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
    ) -> Result<NormalizedData, FetchError> {
        let grid = self.fetch_grid(spreadsheet_id, sheet_name).await?;
        normalize::normalize(&grid)
    }
}

fn classify_token_failure(status: u16, body: &str) -> FetchError {
    let detail = excerpt(body);
    match status {
        // The token endpoint answers bad assertions and revoked keys
        // with 400/401/403.
        400 | 401 | 403 => FetchError::Auth(format!(
            "token endpoint rejected the service account ({status}): {detail}"
        )),
        429 | 500..=599 => FetchError::Transient(format!(
            "token endpoint unavailable ({status}): {detail}"
        )),
        _ => FetchError::Transient(format!("token endpoint returned {status}: {detail}")),
    }
}

fn classify_values_failure(
    status: u16,
    spreadsheet_id: &str,
    sheet_name: &str,
    body: &str,
) -> FetchError {
    let detail = excerpt(body);
    match status {
        401 | 403 => FetchError::Auth(format!(
            "service account lacks access to spreadsheet {spreadsheet_id} ({status}): {detail}"
        )),
        // 400 means the range (worksheet name) did not parse, 404 an
        // unknown spreadsheet id.
        400 => FetchError::NotFound(format!(
            "worksheet '{sheet_name}' not found in spreadsheet {spreadsheet_id}: {detail}"
        )),
        404 => FetchError::NotFound(format!(
            "spreadsheet {spreadsheet_id} not found: {detail}"
        )),
        429 | 500..=599 => FetchError::Transient(format!(
            "sheets API unavailable ({status}): {detail}"
        )),
        _ => FetchError::Transient(format!("sheets API returned {status}: {detail}")),
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= 200 {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(200).collect();
        format!("{head}...")
    }
}

fn encode_path_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => {
                out.push('%');
                out.push_str(&format!("{byte:02X}"));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_names_with_spaces_are_encoded() {
        assert_eq!(
            encode_path_segment("Non-Conformance Details"),
            "Non-Conformance%20Details"
        );
        assert_eq!(encode_path_segment("NC_2024"), "NC_2024");
    }

    #[test]
    fn values_failures_map_onto_the_taxonomy() {
        assert!(matches!(
            classify_values_failure(403, "sheet-id", "NCs", ""),
            FetchError::Auth(_)
        ));
        assert!(matches!(
            classify_values_failure(400, "sheet-id", "NCs", "Unable to parse range"),
            FetchError::NotFound(_)
        ));
        assert!(matches!(
            classify_values_failure(404, "sheet-id", "NCs", ""),
            FetchError::NotFound(_)
        ));
        assert!(matches!(
            classify_values_failure(429, "sheet-id", "NCs", ""),
            FetchError::Transient(_)
        ));
        assert!(matches!(
            classify_values_failure(503, "sheet-id", "NCs", ""),
            FetchError::Transient(_)
        ));
    }

    #[test]
    fn token_failures_map_onto_the_taxonomy() {
        assert!(matches!(
            classify_token_failure(400, "invalid_grant"),
            FetchError::Auth(_)
        ));
        assert!(matches!(
            classify_token_failure(500, ""),
            FetchError::Transient(_)
        ));
    }

    #[test]
    fn value_range_parses_with_and_without_values() {
        let body = r#"{
            "range": "'Non-Conformance Details'!A1:U3",
            "majorDimension": "ROWS",
            "values": [["NC Number", "Status"], ["NC-001", "Open"]]
        }"#;
        let range: ValueRange = serde_json::from_str(body).unwrap();
        assert_eq!(range.values.len(), 2);
        assert_eq!(range.values[1][0], "NC-001");

        let empty: ValueRange = serde_json::from_str(r#"{"range": "Empty!A1"}"#).unwrap();
        assert!(empty.values.is_empty());
    }

    #[test]
    fn token_response_defaults_expiry() {
        let token: TokenResponse =
            serde_json::from_str(r#"{"access_token": "abc"}"#).unwrap();
        assert_eq!(token.expires_in, 3600);
        let token: TokenResponse =
            serde_json::from_str(r#"{"access_token": "abc", "expires_in": 1200, "token_type": "Bearer"}"#)
                .unwrap();
        assert_eq!(token.expires_in, 1200);
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(500);
        let err = classify_values_failure(500, "sheet-id", "NCs", &body);
        let text = err.to_string();
        assert!(text.len() < 400);
        assert!(text.contains("..."));
    }
}
