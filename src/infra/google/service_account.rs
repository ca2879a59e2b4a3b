// =============================================================================
// SERVICE ACCOUNT AUTHENTICATION
// =============================================================================
//
// Exchanges a signed JWT (RS256) for an OAuth2 access token and caches it
// until shortly before it expires.
//
// **Environment Variables:**
// - `GOOGLE_SERVICE_ACCOUNT_KEY` - Path to the service account JSON file
// - `GOOGLE_SERVICE_ACCOUNT_JSON` - The JSON content itself (for deployment)
//
// The service account needs the Sheets and Drive APIs enabled on its project.
// Spreadsheets it creates are owned by the service account, which is why the
// service grants "anyone with the link" access after creation.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::core::sheets::SheetsApiError;

const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
];

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens are refreshed this long before Google says they expire.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("Neither GOOGLE_SERVICE_ACCOUNT_KEY nor GOOGLE_SERVICE_ACCOUNT_JSON is set")]
    Missing,
    #[error("Could not read service account key file '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid service account JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Could not sign token request: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountCredentials {
    client_email: String,
    /// PEM-encoded RSA key.
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

pub struct ServiceAccountAuth {
    credentials: ServiceAccountCredentials,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl ServiceAccountAuth {
    pub async fn from_file(path: &str) -> Result<Self, CredentialsError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CredentialsError::Io {
                path: path.to_string(),
                source,
            })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, CredentialsError> {
        let credentials: ServiceAccountCredentials = serde_json::from_str(json)?;
        Ok(Self {
            credentials,
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(None)),
        })
    }

    /// Prefers the key file path over inline JSON when both are set.
    pub async fn from_env() -> Result<Self, CredentialsError> {
        if let Ok(path) = std::env::var("GOOGLE_SERVICE_ACCOUNT_KEY") {
            if !path.trim().is_empty() {
                return Self::from_file(path.trim()).await;
            }
        }

        match std::env::var("GOOGLE_SERVICE_ACCOUNT_JSON") {
            Ok(json) if !json.trim().is_empty() => Self::from_json(&json),
            _ => Err(CredentialsError::Missing),
        }
    }

    pub fn client_email(&self) -> &str {
        &self.credentials.client_email
    }

    /// Gets a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String, SheetsApiError> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS) {
                    return Ok(token.token.clone());
                }
            }
        }

        let fresh = self.fetch_new_token().await?;
        let token = fresh.access_token.clone();

        let mut cached = self.cached_token.write().await;
        *cached = Some(CachedToken {
            token: fresh.access_token,
            expires_at: Utc::now() + Duration::seconds(fresh.expires_in),
        });
        tracing::debug!(
            account = %self.credentials.client_email,
            expires_in = fresh.expires_in,
            "Refreshed Google access token"
        );

        Ok(token)
    }

    fn signed_assertion(&self, now: DateTime<Utc>) -> Result<String, CredentialsError> {
        let issued_at = now.timestamp();
        let claims = JwtClaims {
            iss: &self.credentials.client_email,
            scope: SCOPES.join(" "),
            aud: &self.credentials.token_uri,
            iat: issued_at,
            exp: issued_at + 3600,
        };

        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())?;
        Ok(encode(&Header::new(Algorithm::RS256), &claims, &key)?)
    }

    async fn fetch_new_token(&self) -> Result<TokenResponse, SheetsApiError> {
        let jwt = self
            .signed_assertion(Utc::now())
            .map_err(|e| SheetsApiError::Auth(e.to_string()))?;

        let response = self
            .client
            .post(&self.credentials.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", jwt.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SheetsApiError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            // Google answers a rejected grant with 400; that is a credential problem.
            return Err(match status.as_u16() {
                400 | 401 | 403 => SheetsApiError::Auth(format!("Token exchange failed: {text}")),
                code => SheetsApiError::from_status(code, &text),
            });
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| SheetsApiError::Decode(e.to_string()))
    }
}
