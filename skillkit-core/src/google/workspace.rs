//! Drive file ⇄ Markdown, built on [`DriveClient`] and the conversion tools.

use std::path::{Path, PathBuf};

use tracing::info;

use super::drive::{download_name, safe_file_name, workspace_type, DriveClient, DriveFile};
use super::{ids, GoogleError};
use crate::contract::ConversionBackend;
use crate::convert::{ConvertError, Toolchain};

/// Downloads or exports a Drive file and converts it to Markdown.
///
/// Without `output` the file lands in the current directory as
/// `<safe name>.md`. Returns the absolute path written.
pub async fn to_markdown<B>(
    drive: &DriveClient,
    backend: &B,
    url_or_id: &str,
    output: Option<&Path>,
    ocr: bool,
) -> Result<PathBuf, GoogleError>
where
    B: ConversionBackend + ?Sized,
{
    let file_id = ids::file_id(url_or_id)?;
    info!(file_id = %file_id, "Resolved Drive file");

    let file = drive.get_file(&file_id).await?;
    info!(name = %file.name, mime_type = %file.mime_type, "Fetched file metadata");

    let tmp = tempfile::tempdir()?;
    let local = fetch_local_copy(drive, &file, tmp.path()).await?;

    let markdown = backend
        .extract(&local, ocr)
        .await
        .filter(|md| !md.is_empty())
        .ok_or_else(|| ConvertError::Failed(local.clone()))?;

    let out = match output {
        Some(out) => out.to_path_buf(),
        None => std::env::current_dir()?.join(format!("{}.md", safe_file_name(&file.name))),
    };
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&out, markdown)?;
    Ok(std::fs::canonicalize(&out)?)
}

/// Exports Workspace-native files, downloads everything else.
async fn fetch_local_copy(drive: &DriveClient, file: &DriveFile, dir: &Path) -> Result<PathBuf, GoogleError> {
    match workspace_type(&file.mime_type) {
        Some(kind) => {
            info!(kind = kind.name, extension = kind.extension, "Exporting Workspace file");
            let dest = dir.join(format!("{}{}", safe_file_name(&file.name), kind.extension));
            drive.export_file(&file.id, kind.export_mime, &dest).await?;
            Ok(dest)
        }
        None => {
            let dest = dir.join(safe_file_name(&download_name(&file.name, &file.mime_type)));
            drive.download_file(&file.id, &dest).await?;
            Ok(dest)
        }
    }
}

/// Renders a Markdown file to DOCX and uploads it as a Google Doc. Returns the document URL.
pub async fn create_gdoc_from_markdown(
    drive: &DriveClient,
    tools: &Toolchain,
    markdown: &Path,
    name: Option<&str>,
    folder_id: Option<&str>,
) -> Result<String, GoogleError> {
    if !markdown.exists() {
        return Err(GoogleError::MarkdownNotFound(markdown.to_path_buf()));
    }
    let name = match name {
        Some(name) => name.to_string(),
        None => markdown
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Untitled".to_string()),
    };
    info!(source = %markdown.display(), name = %name, "Creating Google Doc from Markdown");

    let tmp = tempfile::tempdir()?;
    let docx = tmp.path().join(format!("{}.docx", safe_file_name(&name)));
    tools.markdown_to_docx(markdown, &docx).await?;

    let created = drive.upload_as_gdoc(&docx, &name, folder_id).await?;
    Ok(created.doc_url())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::contract::MockConversionBackend;
    use mockall::predicate::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn drive(server: &MockServer) -> DriveClient {
        DriveClient::new("tok".into(), Duration::from_secs(5))
            .unwrap()
            .with_api_base(&server.uri())
    }

    #[tokio::test]
    async fn sheet_is_exported_then_converted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files/sheet_id_that_is_long_enough"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "sheet_id_that_is_long_enough",
                "name": "Budget: 2024",
                "mimeType": "application/vnd.google-apps.spreadsheet"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files/sheet_id_that_is_long_enough/export"))
            .and(query_param("mimeType", super::super::drive::XLSX_MIME))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"xlsx".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let mut backend = MockConversionBackend::new();
        backend
            .expect_extract()
            .withf(|p, ocr| p.to_string_lossy().ends_with("Budget_ 2024.xlsx") && !*ocr)
            .returning(|_, _| Some("| a | b |".into()));

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/budget.md");
        let written = to_markdown(
            &drive(&server),
            &backend,
            "sheet_id_that_is_long_enough",
            Some(&out),
            false,
        )
        .await
        .unwrap();
        assert_eq!(std::fs::read_to_string(written).unwrap(), "| a | b |");
    }

    #[tokio::test]
    async fn regular_file_is_downloaded_with_alt_media() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files/pdf1"))
            .and(query_param("fields", "id,name,mimeType,owners,shared"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pdf1", "name": "paper", "mimeType": "application/pdf"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files/pdf1"))
            .and(query_param("alt", "media"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let mut backend = MockConversionBackend::new();
        backend
            .expect_extract()
            .with(always(), eq(true))
            .returning(|_, _| Some("# Paper".into()));

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("paper.md");
        to_markdown(
            &drive(&server),
            &backend,
            "https://drive.google.com/file/d/pdf1/view",
            Some(&out),
            true,
        )
        .await
        .unwrap();
        assert_eq!(std::fs::read_to_string(out).unwrap(), "# Paper");
    }

    #[tokio::test]
    async fn missing_markdown_is_reported_before_any_call() {
        let server = MockServer::start().await;
        let tools = Toolchain::new(&Settings::default());
        let err = create_gdoc_from_markdown(
            &drive(&server),
            &tools,
            Path::new("/no/such/notes.md"),
            None,
            None,
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Markdown file not found: /no/such/notes.md");
    }
}
