//! Confluence Data Center REST client (`<base>/rest/api`).

use std::path::Path;
use std::time::Duration;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::atlassian::{ApiError, AtlassianHttp, Connection, ErrorStyle};

/// Environment variable prefix for the connection.
pub const ENV_PREFIX: &str = "CONFLUENCE";

const API_PATH: &str = "rest/api";
const PAGE_EXPAND: &str = "body.storage,version,space,ancestors";
const FIND_EXPAND: &str = "body.storage,version,space";

/// Representation of a page body, as named by the `--format` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyFormat {
    /// Markdown, converted to storage format before sending.
    #[default]
    Markdown,
    Html,
    Storage,
}

impl std::str::FromStr for BodyFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "markdown" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            "storage" => Ok(Self::Storage),
            other => Err(format!("Unsupported format: {other}")),
        }
    }
}

impl BodyFormat {
    /// The representation name sent to the server for a body in this format.
    pub fn representation(self) -> &'static str {
        match self {
            Self::Markdown | Self::Storage => "storage",
            Self::Html => "html",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpaceRef {
    #[serde(default)]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Version {
    #[serde(default)]
    pub number: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageBody {
    #[serde(default)]
    pub value: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Body {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageBody>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A page, blog post, comment or attachment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space: Option<SpaceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Content {
    pub fn space_key(&self) -> &str {
        self.space.as_ref().map(|s| s.key.as_str()).unwrap_or("")
    }

    pub fn version_number(&self) -> u64 {
        self.version.as_ref().map(|v| v.number).unwrap_or(0)
    }

    /// The storage-format body, or an empty string when it was not expanded.
    pub fn storage(&self) -> &str {
        self.body
            .as_ref()
            .and_then(|b| b.storage.as_ref())
            .map(|s| s.value.as_str())
            .unwrap_or("")
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsPage<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(rename = "totalSize", default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl<T> ResultsPage<T> {
    /// `totalSize` when the server reports it, else the number of results returned.
    pub fn total(&self) -> u64 {
        self.total_size.unwrap_or(self.results.len() as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPage {
    pub space: String,
    pub title: String,
    pub body: String,
    pub parent: Option<String>,
    pub representation: String,
}

impl NewPage {
    pub fn payload(&self) -> Value {
        let mut data = json!({
            "type": "page",
            "title": self.title,
            "space": { "key": self.space },
            "body": body_value(&self.representation, &self.body),
        });
        if let Some(parent) = &self.parent {
            data["ancestors"] = json!([{ "id": parent }]);
        }
        data
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    pub representation: String,
    pub minor: bool,
}

impl PageUpdate {
    /// Payload for `PUT content/{id}` against the page as it currently stands.
    pub fn payload(&self, current: &Content) -> Value {
        let title = self
            .title
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(&current.title);
        let mut data = json!({
            "type": "page",
            "title": title,
            "version": {
                "number": current.version_number() + 1,
                "minorEdit": self.minor,
            },
        });
        if let Some(body) = self.body.as_deref().filter(|b| !b.is_empty()) {
            data["body"] = body_value(&self.representation, body);
        }
        data
    }
}

fn body_value(representation: &str, value: &str) -> Value {
    let mut body = Map::new();
    body.insert(
        representation.to_string(),
        json!({ "value": value, "representation": representation }),
    );
    Value::Object(body)
}

pub struct ConfluenceClient {
    http: AtlassianHttp,
}

impl ConfluenceClient {
    pub fn new(connection: Connection, timeout: Duration) -> Result<Self, ApiError> {
        let http = AtlassianHttp::new(connection, API_PATH, ErrorStyle::Confluence, timeout)?;
        Ok(Self { http })
    }

    pub fn from_env(timeout: Duration) -> Result<Self, ApiError> {
        Self::new(Connection::from_env(ENV_PREFIX)?, timeout)
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    pub fn page_url(&self, page_id: &str) -> String {
        format!("{}/pages/viewpage.action?pageId={}", self.base_url(), page_id)
    }

    pub async fn get_page(&self, page_id: &str) -> Result<Content, ApiError> {
        let query = [("expand", PAGE_EXPAND.to_string())];
        self.http
            .call_as(Method::GET, &format!("content/{page_id}"), &query, None)
            .await
    }

    pub async fn find_page(&self, space_key: &str, title: &str) -> Result<Content, ApiError> {
        let query = [
            ("spaceKey", space_key.to_string()),
            ("title", title.to_string()),
            ("expand", FIND_EXPAND.to_string()),
        ];
        let page: ResultsPage<Content> =
            self.http.call_as(Method::GET, "content", &query, None).await?;
        page.results.into_iter().next().ok_or_else(|| {
            ApiError::NotFound(format!("Page '{title}' not found in space '{space_key}'"))
        })
    }

    /// CQL search. A content type narrows the query to `type = <type> AND (<cql>)`.
    pub async fn search(
        &self,
        cql: &str,
        limit: u32,
        content_type: Option<&str>,
    ) -> Result<ResultsPage<Content>, ApiError> {
        let cql = match content_type {
            Some(kind) => format!("type = {kind} AND ({cql})"),
            None => cql.to_string(),
        };
        info!(cql = %cql, limit, "Searching Confluence");
        let query = [
            ("cql", cql),
            ("limit", limit.to_string()),
            ("expand", "space,version".to_string()),
        ];
        self.http
            .call_as(Method::GET, "content/search", &query, None)
            .await
    }

    pub async fn create_page(&self, page: &NewPage) -> Result<Content, ApiError> {
        info!(space = %page.space, title = %page.title, "Creating page");
        self.http
            .call_as(Method::POST, "content", &[], Some(&page.payload()))
            .await
    }

    /// Reads the current version, then writes the next one.
    pub async fn update_page(&self, page_id: &str, update: &PageUpdate) -> Result<Content, ApiError> {
        let current = self.get_page(page_id).await?;
        let payload = update.payload(&current);
        info!(page_id, version = current.version_number() + 1, "Updating page");
        self.http
            .call_as(Method::PUT, &format!("content/{page_id}"), &[], Some(&payload))
            .await
    }

    pub async fn delete_page(&self, page_id: &str) -> Result<(), ApiError> {
        info!(page_id, "Deleting page");
        self.http
            .call(Method::DELETE, &format!("content/{page_id}"), &[], None)
            .await?;
        Ok(())
    }

    pub async fn children(&self, page_id: &str, limit: u32) -> Result<ResultsPage<Content>, ApiError> {
        let query = [("expand", "version".to_string()), ("limit", limit.to_string())];
        self.http
            .call_as(Method::GET, &format!("content/{page_id}/child/page"), &query, None)
            .await
    }

    pub async fn spaces(&self, space_type: Option<&str>) -> Result<ResultsPage<SpaceRef>, ApiError> {
        let mut query = vec![
            ("limit", "100".to_string()),
            ("expand", "description.plain".to_string()),
        ];
        if let Some(kind) = space_type {
            query.push(("type", kind.to_string()));
        }
        self.http.call_as(Method::GET, "space", &query, None).await
    }

    pub async fn attachments(&self, page_id: &str) -> Result<ResultsPage<Content>, ApiError> {
        let query = [("expand", "version".to_string())];
        self.http
            .call_as(
                Method::GET,
                &format!("content/{page_id}/child/attachment"),
                &query,
                None,
            )
            .await
    }

    pub async fn upload_attachment(&self, page_id: &str, file: &Path) -> Result<Value, ApiError> {
        self.http
            .upload(&format!("content/{page_id}/child/attachment"), file)
            .await
    }

    /// PDF export through the flyingpdf plugin; not part of the REST API.
    pub async fn export_pdf(&self, page_id: &str) -> Result<Vec<u8>, ApiError> {
        self.http
            .get_bytes(
                "spaces/flyingpdf/pdfpageexport.action",
                &[("pageId", page_id.to_string())],
            )
            .await
    }
}
