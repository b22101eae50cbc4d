//! Service-account OAuth2: a signed RS256 JWT exchanged for an access token.

use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{api_error, GoogleError, CREDENTIALS_ENV};

pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Drive access for reading shared files and creating new ones.
pub const DRIVE_SCOPES: &[&str] = &[DRIVE_READONLY_SCOPE, DRIVE_FILE_SCOPE];

/// Shown in sharing instructions when no key file is configured.
pub const EMAIL_PLACEHOLDER: &str = "SERVICE_ACCOUNT_EMAIL";

const JWT_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// The fields of a service-account JSON key that token exchange needs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceAccountCredentials {
    #[serde(rename = "type", default)]
    pub account_type: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    pub token_uri: String,
}

impl ServiceAccountCredentials {
    pub fn from_file(path: &Path) -> Result<Self, GoogleError> {
        let content = std::fs::read_to_string(path).map_err(|e| GoogleError::CredentialsFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Path named by `GOOGLE_APPLICATION_CREDENTIALS`.
    pub fn path_from_env() -> Option<PathBuf> {
        std::env::var_os(CREDENTIALS_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    pub fn from_env() -> Result<Self, GoogleError> {
        let path = Self::path_from_env().ok_or(GoogleError::MissingCredentials)?;
        Self::from_file(&path)
    }
}

/// The `client_email` of the configured key, or a placeholder.
pub fn service_account_email(path: Option<&Path>) -> Result<String, GoogleError> {
    let Some(path) = path else {
        return Ok(EMAIL_PLACEHOLDER.to_string());
    };
    let content = std::fs::read_to_string(path).map_err(|e| GoogleError::CredentialsFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    let json: serde_json::Value = serde_json::from_str(&content)?;
    Ok(json
        .get("client_email")
        .and_then(|v| v.as_str())
        .unwrap_or(EMAIL_PLACEHOLDER)
        .to_string())
}

#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: i64,
}

/// Signs the assertion for `scopes`, valid for one hour.
fn sign_assertion(credentials: &ServiceAccountCredentials, scopes: &[&str]) -> Result<String, GoogleError> {
    let now = Utc::now();
    let claims = JwtClaims {
        iss: credentials.client_email.clone(),
        scope: scopes.join(" "),
        aud: credentials.token_uri.clone(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(1)).timestamp(),
    };

    let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes()).map_err(|e| {
        debug!(error = %e, "Invalid private key format");
        GoogleError::Jwt(format!(
            "Invalid private key format. Ensure you're using a valid service account JSON file. Error: {e}"
        ))
    })?;

    encode(&Header::new(Algorithm::RS256), &claims, &key).map_err(|e| {
        debug!(error = %e, "Failed to encode JWT");
        GoogleError::Jwt(format!("Failed to sign JWT token: {e}"))
    })
}

/// Exchanges a signed JWT for an OAuth2 access token.
pub async fn access_token(
    http: &Client,
    credentials: &ServiceAccountCredentials,
    scopes: &[&str],
) -> Result<String, GoogleError> {
    info!(client_email = %credentials.client_email, "Requesting access token for service account");
    let jwt = sign_assertion(credentials, scopes)?;

    debug!(token_uri = %credentials.token_uri, "Exchanging JWT for access token");
    let response = http
        .post(&credentials.token_uri)
        .form(&[("grant_type", JWT_GRANT_TYPE), ("assertion", jwt.as_str())])
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(match api_error(response).await {
            GoogleError::Api(message) => GoogleError::Auth(format!("OAuth token exchange failed ({message})")),
            other => other,
        });
    }

    let token: TokenResponse = response.json().await?;
    info!(expires_in = token.expires_in, "Obtained access token");
    Ok(token.access_token)
}

impl ServiceAccountCredentials {
    /// [`access_token`] over a fresh client with the given request timeout.
    pub async fn token(&self, scopes: &[&str], timeout: std::time::Duration) -> Result<String, GoogleError> {
        let http = Client::builder().timeout(timeout).build()?;
        access_token(&http, self, scopes).await
    }
}
