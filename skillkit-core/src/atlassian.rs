//! HTTP plumbing shared by the Confluence and Jira Data Center clients.
//!
//! Both products accept the same two credentials (a Personal Access Token sent
//! as a bearer token, or username/password basic auth) and answer with JSON.
//! They differ only in the REST prefix and in how they describe errors, which
//! is captured by [`ErrorStyle`].

use std::path::Path;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0} environment variable required")]
    MissingBaseUrl(String),

    #[error("Set {0}_PAT or both {0}_USERNAME and {0}_PASSWORD")]
    MissingCredentials(String),

    /// Non-2xx answer; `message` is what the server said, or the status line.
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("{0}")]
    NotFound(String),

    #[error("empty response from {0}")]
    EmptyResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid credential header: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Credentials for a Data Center product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    Bearer(String),
    Basic { username: String, password: String },
}

/// Base URL and credentials, usually read from `<PREFIX>_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub base_url: String,
    pub auth: Auth,
}

impl Connection {
    /// Reads `<PREFIX>_BASE_URL`, then `<PREFIX>_PAT` or `<PREFIX>_USERNAME` + `<PREFIX>_PASSWORD`.
    pub fn from_env(prefix: &str) -> Result<Self, ApiError> {
        Self::from_lookup(prefix, |key| std::env::var(key).ok())
    }

    /// Same as [`Connection::from_env`] but with an injectable lookup. Empty values count as unset.
    pub fn from_lookup<F>(prefix: &str, lookup: F) -> Result<Self, ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |suffix: &str| lookup(&format!("{prefix}_{suffix}")).filter(|v| !v.is_empty());

        let base_url = get("BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or_else(|| ApiError::MissingBaseUrl(format!("{prefix}_BASE_URL")))?;

        let auth = match get("PAT") {
            Some(pat) => Auth::Bearer(pat),
            None => match (get("USERNAME"), get("PASSWORD")) {
                (Some(username), Some(password)) => Auth::Basic { username, password },
                _ => return Err(ApiError::MissingCredentials(prefix.to_string())),
            },
        };

        debug!(
            prefix,
            base_url = %base_url,
            bearer = matches!(auth, Auth::Bearer(_)),
            "Resolved Data Center connection"
        );
        Ok(Self { base_url, auth })
    }
}

/// How a product reports errors in its JSON body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStyle {
    /// `{"message": "..."}`
    Confluence,
    /// `{"errorMessages": [...], "errors": {"field": "..."}}`
    Jira,
}

impl ErrorStyle {
    /// Pulls the human-readable message out of an error body, if there is one.
    pub fn extract(self, body: &str) -> Option<String> {
        let json: Value = serde_json::from_str(body).ok()?;
        match self {
            ErrorStyle::Confluence => json
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            ErrorStyle::Jira => {
                if let Some(messages) = json.get("errorMessages").and_then(Value::as_array) {
                    let joined = messages
                        .iter()
                        .map(|m| m.as_str().map(str::to_string).unwrap_or_else(|| m.to_string()))
                        .collect::<Vec<_>>()
                        .join("; ");
                    // Jira sends an empty list next to a populated `errors` map.
                    if !joined.is_empty() {
                        return Some(joined);
                    }
                }
                let errors = json.get("errors").and_then(Value::as_object)?;
                if errors.is_empty() {
                    return None;
                }
                Some(
                    errors
                        .iter()
                        .map(|(k, v)| match v.as_str() {
                            Some(s) => format!("{k}: {s}"),
                            None => format!("{k}: {v}"),
                        })
                        .collect::<Vec<_>>()
                        .join("; "),
                )
            }
        }
    }
}

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("HTTP {} {}", status.as_u16(), reason),
        None => format!("HTTP {}", status.as_u16()),
    }
}

/// A configured session against one product's REST API.
#[derive(Debug, Clone)]
pub struct AtlassianHttp {
    http: Client,
    base_url: String,
    api_url: String,
    auth: Auth,
    style: ErrorStyle,
}

impl AtlassianHttp {
    pub fn new(
        connection: Connection,
        api_path: &str,
        style: ErrorStyle,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        let api_url = format!("{}/{}", connection.base_url, api_path.trim_matches('/'));
        Ok(Self {
            http,
            base_url: connection.base_url,
            api_url,
            auth: connection.auth,
            style,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn endpoint(&self, endpoint: &str) -> String {
        format!("{}/{}", self.api_url, endpoint.trim_start_matches('/'))
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Auth::Bearer(token) => req.bearer_auth(token),
            Auth::Basic { username, password } => req.basic_auth(username, Some(password)),
        }
    }

    /// Turns a non-2xx response into [`ApiError::Status`].
    async fn check(&self, url: &str, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = self
            .style
            .extract(&body)
            .unwrap_or_else(|| status_line(status));
        debug!(status = %status, url = %url, message = %message, "Data Center API returned error");
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    /// Issues a request relative to the API root.
    ///
    /// Returns `None` for 204, parsed JSON for JSON responses and
    /// `{"content": <text>}` for anything else.
    pub async fn call(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Option<Value>, ApiError> {
        let url = self.endpoint(endpoint);
        info!(method = %method, url = %url, "Calling Data Center API");
        debug!(?query, "Request query");

        let mut req = self.authorize(self.http.request(method, &url)).query(query);
        if let Some(body) = body {
            req = req
                .header(CONTENT_TYPE, "application/json")
                .body(serde_json::to_vec(body)?);
        }

        let response = self.check(&url, req.send().await?).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));
        let text = response.text().await?;
        if is_json {
            if text.trim().is_empty() {
                return Ok(None);
            }
            Ok(Some(serde_json::from_str(&text)?))
        } else {
            Ok(Some(serde_json::json!({ "content": text })))
        }
    }

    /// [`AtlassianHttp::call`] followed by deserialisation into `T`.
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<T, ApiError> {
        let value = self
            .call(method, endpoint, query, body)
            .await?
            .ok_or_else(|| ApiError::EmptyResponse(self.endpoint(endpoint)))?;
        Ok(serde_json::from_value(value)?)
    }

    /// Raw GET against a URL relative to the product base URL (not the API root).
    pub async fn get_bytes(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<u8>, ApiError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        info!(url = %url, "Downloading from Data Center");
        let req = self.authorize(self.http.get(&url)).query(query);
        let response = self.check(&url, req.send().await?).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Multipart upload of a single file as the `file` field.
    pub async fn upload(&self, endpoint: &str, file_path: &Path) -> Result<Value, ApiError> {
        let url = self.endpoint(endpoint);
        let bytes = tokio::fs::read(file_path).await?;
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        info!(url = %url, file = %file_name, size = bytes.len(), "Uploading file");

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new().part("file", part);
        let req = self
            .authorize(self.http.post(&url))
            .header("X-Atlassian-Token", "no-check")
            .multipart(form);

        let response = self.check(&url, req.send().await?).await?;
        Ok(response.json().await?)
    }
}
