//! Google APIs reached with a service-account key: Drive v3 and Vertex AI.

pub mod auth;
pub mod drive;
pub mod ids;
pub mod image;
pub mod workspace;

use std::path::PathBuf;

use thiserror::Error;

use crate::convert::ConvertError;

/// Environment variable pointing at the service-account JSON key.
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

#[derive(Error, Debug)]
pub enum GoogleError {
    #[error("GOOGLE_APPLICATION_CREDENTIALS env var required")]
    MissingCredentials,

    #[error("GOOGLE_CLOUD_PROJECT or CLOUDSDK_CORE_PROJECT env var required")]
    MissingProject,

    #[error("Failed to read service account file {}: {source}", .path.display())]
    CredentialsFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JWT error: {0}")]
    Jwt(String),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Could not extract file ID from: {0}")]
    BadFileId(String),

    #[error(
        "File not found. Make sure the file is shared with your service account email. File ID: {0}"
    )]
    FileNotFound(String),

    #[error("Markdown file not found: {}", .0.display())]
    MarkdownNotFound(PathBuf),

    #[error("Image not found: {}", .0.display())]
    ImageNotFound(PathBuf),

    #[error("Model returned no candidates. This could be due to safety filters or model refusal.")]
    NoCandidates,

    #[error("No image found in response")]
    NoImage,

    /// Non-2xx from a Google API, already formatted as `HTTP <code>: <message>`.
    #[error("API error: {0}")]
    Api(String),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid image data: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns a failed Google API response into [`GoogleError::Api`], preferring `error.message`.
pub(crate) async fn api_error(response: reqwest::Response) -> GoogleError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|json| {
            json.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or(text);
    tracing::debug!(status = %status, message = %message, "Google API error");
    GoogleError::Api(format!("HTTP {}: {}", status.as_u16(), message))
}
