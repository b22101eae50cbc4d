//! Document to Markdown conversion.
//!
//! Routing is by file extension: formats pandoc reads natively go to pandoc
//! first, everything else goes to the extraction library first, and each
//! path falls back to the other. PDFs can additionally be run through both a
//! text pass and an OCR pass whose results are merged by
//! [`merge_extractions`].

mod backend;

pub use backend::Toolchain;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;
use tracing::{info, warn};

use crate::contract::ConversionBackend;
use crate::google::ids;

/// Extensions pandoc converts better than the extraction library.
pub const PANDOC_FORMATS: &[&str] = &["epub", "org", "rst", "tex", "latex", "odt", "rtf"];

/// Extensions that get OCR in `auto` mode.
pub const IMAGE_FORMATS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// OCR output has to beat the text pass by this factor before it is trusted.
const OCR_PREFERENCE_RATIO: f64 = 1.2;

const MERGE_SEPARATOR: &str = "\n\n---\n\n## Additional Text Extraction\n\n";

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to convert {}", .0.display())]
    Failed(PathBuf),

    #[error("Could not extract Google Doc ID from URL: {0}")]
    BadGoogleDocUrl(String),

    #[error("Could not download Google Doc. Make sure the document is publicly accessible.")]
    Download,

    #[error("Pandoc failed: {0}")]
    Pandoc(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExtractionMode {
    /// OCR for images only.
    #[default]
    Auto,
    /// Always OCR.
    Ocr,
    /// Never OCR.
    Text,
}

impl FromStr for ExtractionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "ocr" => Ok(Self::Ocr),
            "text" => Ok(Self::Text),
            other => Err(format!("unknown extraction mode '{other}' (expected auto, ocr or text)")),
        }
    }
}

impl fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Ocr => "ocr",
            Self::Text => "text",
        })
    }
}

/// Which converter runs first for a given file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// pandoc, then the extraction library.
    PandocFirst,
    /// Text and OCR extraction, merged.
    Hybrid,
    /// Extraction library, then pandoc.
    ExtractorFirst { ocr: bool },
}

/// Lowercased extension without the dot, or an empty string.
fn extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

pub fn route(path: &Path, mode: ExtractionMode, hybrid: bool) -> Route {
    let ext = extension(path);
    if PANDOC_FORMATS.contains(&ext.as_str()) {
        return Route::PandocFirst;
    }
    if ext == "pdf" && hybrid {
        return Route::Hybrid;
    }
    let ocr = match mode {
        ExtractionMode::Ocr => true,
        ExtractionMode::Auto => IMAGE_FORMATS.contains(&ext.as_str()),
        ExtractionMode::Text => false,
    };
    Route::ExtractorFirst { ocr }
}

/// Combines a direct text extraction with an OCR extraction of the same document.
///
/// Similar lengths mean OCR found nothing new and the cleaner text pass wins.
/// A much longer OCR result probably picked up scanned pages or images, so it
/// leads and the text pass is appended after a separator.
pub fn merge_extractions(text: Option<&str>, ocr: Option<&str>) -> String {
    let text = text.filter(|t| !t.is_empty());
    let ocr = ocr.filter(|o| !o.is_empty());

    match (text, ocr) {
        (None, None) => String::new(),
        (Some(text), None) => text.to_string(),
        (None, Some(ocr)) => ocr.to_string(),
        (Some(text), Some(ocr)) => {
            let text_len = text.trim().chars().count() as f64;
            let ocr_len = ocr.trim().chars().count() as f64;
            if ocr_len <= text_len * OCR_PREFERENCE_RATIO {
                text.to_string()
            } else {
                format!("{ocr}{MERGE_SEPARATOR}{text}")
            }
        }
    }
}

fn non_empty(content: Option<String>) -> Option<String> {
    content.filter(|c| !c.is_empty())
}

/// Converts a local file to Markdown text, trying converters in route order.
pub async fn convert_content<B>(
    backend: &B,
    path: &Path,
    mode: ExtractionMode,
    hybrid: bool,
) -> Result<String, ConvertError>
where
    B: ConversionBackend + ?Sized,
{
    let route = route(path, mode, hybrid);
    info!(path = %path.display(), ?route, "Converting document");

    let content = match route {
        Route::PandocFirst => match non_empty(backend.pandoc(path).await) {
            Some(md) => Some(md),
            None => {
                warn!(path = %path.display(), "pandoc failed, falling back to extraction library");
                non_empty(backend.extract(path, false).await)
            }
        },
        Route::Hybrid => {
            info!("Running hybrid extraction (text + OCR)");
            let text = match non_empty(backend.extract(path, false).await) {
                Some(text) => Some(text),
                None => non_empty(backend.pdf_text(path).await),
            };
            let ocr = non_empty(backend.extract(path, true).await);
            // Hybrid mode never fails outright; an empty merge is a valid result.
            return Ok(merge_extractions(text.as_deref(), ocr.as_deref()));
        }
        Route::ExtractorFirst { ocr } => match non_empty(backend.extract(path, ocr).await) {
            Some(md) => Some(md),
            None => {
                warn!(path = %path.display(), "extraction failed, falling back to pandoc");
                non_empty(backend.pandoc(path).await)
            }
        },
    };

    content.ok_or_else(|| ConvertError::Failed(path.to_path_buf()))
}

/// Where a conversion input comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Local(PathBuf),
    GoogleDoc(String),
}

impl Input {
    pub fn parse(raw: &str) -> Self {
        let is_url = raw.starts_with("http://") || raw.starts_with("https://");
        if is_url && raw.contains("docs.google.com") {
            Input::GoogleDoc(raw.to_string())
        } else {
            Input::Local(PathBuf::from(raw))
        }
    }
}

/// Public export URL of a Google Doc as DOCX.
pub fn google_doc_export_url(doc_id: &str) -> String {
    format!("https://docs.google.com/document/d/{doc_id}/export?format=docx")
}

/// Downloads a link-shared Google Doc as DOCX into `dir`.
pub async fn download_google_doc<B>(backend: &B, url: &str, dir: &Path) -> Result<PathBuf, ConvertError>
where
    B: ConversionBackend + ?Sized,
{
    let doc_id =
        ids::document_id(url).ok_or_else(|| ConvertError::BadGoogleDocUrl(url.to_string()))?;
    let dest = dir.join(format!("gdoc_{doc_id}.docx"));
    info!(doc_id = %doc_id, "Downloading Google Doc export");

    if backend.fetch(&google_doc_export_url(&doc_id), &dest).await {
        Ok(dest)
    } else {
        Err(ConvertError::Download)
    }
}

fn absolute(path: &Path) -> Result<PathBuf, ConvertError> {
    Ok(std::fs::canonicalize(path)?)
}

/// Converts a file or Google Docs URL and writes the Markdown.
///
/// Without an explicit `output`, local files get a sibling `.md` and Google
/// Docs land in the current directory as `gdoc_<id>.md`. Returns the absolute
/// path written.
pub async fn convert_file<B>(
    backend: &B,
    input: &str,
    output: Option<&Path>,
    mode: ExtractionMode,
    hybrid: bool,
) -> Result<PathBuf, ConvertError>
where
    B: ConversionBackend + ?Sized,
{
    let (markdown, out) = match Input::parse(input) {
        Input::GoogleDoc(url) => {
            let tmp = tempfile::tempdir()?;
            let downloaded = download_google_doc(backend, &url, tmp.path()).await?;
            let markdown = convert_content(backend, &downloaded, mode, hybrid).await?;
            let out = match output {
                Some(out) => out.to_path_buf(),
                None => {
                    let stem = downloaded
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "gdoc".to_string());
                    PathBuf::from(format!("{stem}.md"))
                }
            };
            (markdown, out)
        }
        Input::Local(path) => {
            if !path.exists() {
                return Err(ConvertError::NotFound(path));
            }
            let markdown = convert_content(backend, &path, mode, hybrid).await?;
            let out = output
                .map(Path::to_path_buf)
                .unwrap_or_else(|| path.with_extension("md"));
            (markdown, out)
        }
    };

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&out, markdown)?;
    let written = absolute(&out)?;
    info!(path = %written.display(), "Wrote Markdown");
    Ok(written)
}
