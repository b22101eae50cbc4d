//! Google Drive v3: metadata, export/download, multipart upload and listing.

use std::path::Path;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::{api_error, GoogleError};

pub const DRIVE_API_BASE: &str = "https://www.googleapis.com";

pub const GOOGLE_DOC_MIME: &str = "application/vnd.google-apps.document";
pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const PPTX_MIME: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";

const METADATA_FIELDS: &str = "id,name,mimeType,owners,shared";
const LIST_FIELDS: &str = "files(id, name, mimeType, owners)";
const UPLOAD_FIELDS: &str = "id,name,webViewLink";

/// A Workspace-native type and the format it is exported as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkspaceType {
    pub mime_type: &'static str,
    pub name: &'static str,
    pub export_mime: &'static str,
    pub extension: &'static str,
}

pub const WORKSPACE_TYPES: &[WorkspaceType] = &[
    WorkspaceType {
        mime_type: GOOGLE_DOC_MIME,
        name: "Google Doc",
        export_mime: DOCX_MIME,
        extension: ".docx",
    },
    WorkspaceType {
        mime_type: "application/vnd.google-apps.spreadsheet",
        name: "Google Sheet",
        export_mime: XLSX_MIME,
        extension: ".xlsx",
    },
    WorkspaceType {
        mime_type: "application/vnd.google-apps.presentation",
        name: "Google Slides",
        export_mime: PPTX_MIME,
        extension: ".pptx",
    },
    WorkspaceType {
        mime_type: "application/vnd.google-apps.drawing",
        name: "Google Drawing",
        export_mime: "image/png",
        extension: ".png",
    },
];

pub fn workspace_type(mime_type: &str) -> Option<&'static WorkspaceType> {
    WORKSPACE_TYPES.iter().find(|t| t.mime_type == mime_type)
}

/// Friendly name for Workspace types, the raw MIME type otherwise.
pub fn type_label(mime_type: &str) -> &str {
    workspace_type(mime_type).map(|t| t.name).unwrap_or(mime_type)
}

const REGULAR_EXTENSIONS: &[(&str, &str)] = &[
    ("application/pdf", ".pdf"),
    (DOCX_MIME, ".docx"),
    (XLSX_MIME, ".xlsx"),
    (PPTX_MIME, ".pptx"),
    ("text/html", ".html"),
    ("text/plain", ".txt"),
    ("image/png", ".png"),
    ("image/jpeg", ".jpg"),
];

/// Local file name for a downloaded non-Workspace file.
///
/// The extension comes from the MIME type, else from the name, else `.bin`,
/// and is not repeated when the name already ends with it.
pub fn download_name(name: &str, mime_type: &str) -> String {
    let ext = REGULAR_EXTENSIONS
        .iter()
        .find(|(mime, _)| *mime == mime_type)
        .map(|(_, ext)| (*ext).to_string())
        .or_else(|| {
            Path::new(name)
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
        })
        .unwrap_or_else(|| ".bin".to_string());

    if name.ends_with(&ext) {
        name.to_string()
    } else {
        format!("{name}{ext}")
    }
}

/// Replaces characters that are not allowed in file names with `_`.
pub fn safe_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            other => other,
        })
        .collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriveFile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "mimeType", default)]
    pub mime_type: String,
    #[serde(rename = "webViewLink", default, skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DriveFile {
    /// `webViewLink`, or the Docs edit URL built from the id.
    pub fn doc_url(&self) -> String {
        self.web_view_link
            .clone()
            .unwrap_or_else(|| format!("https://docs.google.com/document/d/{}/edit", self.id))
    }
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

pub struct DriveClient {
    http: Client,
    token: String,
    api_base: String,
}

impl DriveClient {
    pub fn new(token: String, timeout: Duration) -> Result<Self, GoogleError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            token,
            api_base: DRIVE_API_BASE.to_string(),
        })
    }

    /// Points the client at another host, e.g. a local mock server.
    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    fn files_url(&self, suffix: &str) -> String {
        format!("{}/drive/v3/files{}", self.api_base, suffix)
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, GoogleError> {
        let response = req.bearer_auth(&self.token).send().await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(api_error(response).await)
        }
    }

    pub async fn get_file(&self, file_id: &str) -> Result<DriveFile, GoogleError> {
        let url = self.files_url(&format!("/{file_id}"));
        debug!(url = %url, "Fetching Drive metadata");
        let response = self
            .http
            .get(&url)
            .query(&[("fields", METADATA_FIELDS)])
            .bearer_auth(&self.token)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(GoogleError::FileNotFound(file_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(response.json().await?)
    }

    /// Server-side export of a Workspace file into `dest`.
    pub async fn export_file(&self, file_id: &str, mime_type: &str, dest: &Path) -> Result<(), GoogleError> {
        info!(file_id, mime_type, "Exporting Workspace file");
        let req = self
            .http
            .get(self.files_url(&format!("/{file_id}/export")))
            .query(&[("mimeType", mime_type)]);
        let bytes = self.send(req).await?.bytes().await?;
        tokio::fs::write(dest, &bytes).await?;
        Ok(())
    }

    /// Raw content of a regular file into `dest`.
    pub async fn download_file(&self, file_id: &str, dest: &Path) -> Result<(), GoogleError> {
        info!(file_id, "Downloading Drive file");
        let req = self
            .http
            .get(self.files_url(&format!("/{file_id}")))
            .query(&[("alt", "media")]);
        let bytes = self.send(req).await?.bytes().await?;
        tokio::fs::write(dest, &bytes).await?;
        Ok(())
    }

    /// Uploads a DOCX and has Drive convert it into a Google Doc.
    pub async fn upload_as_gdoc(
        &self,
        docx: &Path,
        name: &str,
        folder_id: Option<&str>,
    ) -> Result<DriveFile, GoogleError> {
        let mut metadata = json!({ "name": name, "mimeType": GOOGLE_DOC_MIME });
        if let Some(folder) = folder_id {
            metadata["parents"] = json!([folder]);
        }
        let content = tokio::fs::read(docx).await?;
        let boundary = format!("skillkit-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_related(&boundary, &metadata, DOCX_MIME, &content);

        info!(name, folder = ?folder_id, size = content.len(), "Uploading to Google Drive");
        let req = self
            .http
            .post(format!("{}/upload/drive/v3/files", self.api_base))
            .query(&[("uploadType", "multipart"), ("fields", UPLOAD_FIELDS)])
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body);
        Ok(self.send(req).await?.json().await?)
    }

    pub async fn list_files(&self, limit: u32) -> Result<Vec<DriveFile>, GoogleError> {
        let req = self
            .http
            .get(self.files_url(""))
            .query(&[("pageSize", limit.to_string()), ("fields", LIST_FIELDS.to_string())]);
        let list: FileList = self.send(req).await?.json().await?;
        Ok(list.files)
    }
}

/// A two-part `multipart/related` body: JSON metadata, then the media.
fn multipart_related(boundary: &str, metadata: &Value, media_mime: &str, media: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(media.len() + 512);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n--{boundary}\r\nContent-Type: {media_mime}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(media);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> DriveClient {
        DriveClient::new("tok".into(), Duration::from_secs(5))
            .unwrap()
            .with_api_base(&server.uri())
    }

    #[test]
    fn download_name_picks_extension() {
        assert_eq!(download_name("report", "application/pdf"), "report.pdf");
        assert_eq!(download_name("report.pdf", "application/pdf"), "report.pdf");
        assert_eq!(download_name("notes.md", "application/octet-stream"), "notes.md");
        assert_eq!(download_name("blob", "application/octet-stream"), "blob.bin");
    }

    #[test]
    fn safe_file_name_replaces_reserved_characters() {
        assert_eq!(safe_file_name(r#"Q1: plan/"draft"?"#), "Q1_ plan__draft__");
    }

    #[test]
    fn labels_use_friendly_workspace_names() {
        assert_eq!(type_label("application/vnd.google-apps.spreadsheet"), "Google Sheet");
        assert_eq!(type_label("application/pdf"), "application/pdf");
        assert_eq!(workspace_type(GOOGLE_DOC_MIME).unwrap().extension, ".docx");
    }

    #[test]
    fn related_body_has_metadata_then_media() {
        let body = multipart_related("b", &json!({"name": "x"}), DOCX_MIME, b"DOCX");
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("--b\r\nContent-Type: application/json"));
        assert!(text.contains(r#"{"name":"x"}"#));
        assert!(text.ends_with("DOCX\r\n--b--\r\n"));
    }

    #[tokio::test]
    async fn missing_file_explains_sharing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files/abc"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server).get_file("abc").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "File not found. Make sure the file is shared with your service account email. File ID: abc"
        );
    }

    #[tokio::test]
    async fn get_file_requests_metadata_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files/abc"))
            .and(query_param("fields", METADATA_FIELDS))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "abc", "name": "Plan", "mimeType": GOOGLE_DOC_MIME, "shared": true
            })))
            .mount(&server)
            .await;

        let file = client(&server).get_file("abc").await.unwrap();
        assert_eq!(file.name, "Plan");
        assert_eq!(file.extra["shared"], true);
    }

    #[tokio::test]
    async fn export_writes_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files/abc/export"))
            .and(query_param("mimeType", DOCX_MIME))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK\x03\x04".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("Plan.docx");
        client(&server).export_file("abc", DOCX_MIME, &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"PK\x03\x04");
    }

    #[tokio::test]
    async fn upload_uses_multipart_related() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/drive/v3/files"))
            .and(query_param("uploadType", "multipart"))
            .and(body_string_contains(GOOGLE_DOC_MIME))
            .and(body_string_contains(r#""parents":["folder1"]"#))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "new1", "name": "Notes"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let docx = dir.path().join("Notes.docx");
        std::fs::write(&docx, b"docx-bytes").unwrap();

        let file = client(&server)
            .upload_as_gdoc(&docx, "Notes", Some("folder1"))
            .await
            .unwrap();
        assert_eq!(file.doc_url(), "https://docs.google.com/document/d/new1/edit");
    }

    #[tokio::test]
    async fn api_errors_carry_google_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": { "code": 403, "message": "Drive API has not been used" }
            })))
            .mount(&server)
            .await;

        let err = client(&server).list_files(20).await.unwrap_err();
        assert_eq!(err.to_string(), "API error: HTTP 403: Drive API has not been used");
    }
}
