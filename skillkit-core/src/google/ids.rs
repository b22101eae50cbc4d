//! Pulling Drive file and folder ids out of URLs.

use std::sync::LazyLock;

use regex::Regex;

use super::GoogleError;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("static pattern"))
        .collect()
}

static DOCUMENT_PATTERNS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile(&[r"/document/d/([a-zA-Z0-9_-]+)", r"id=([a-zA-Z0-9_-]+)"]));

static FILE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"/document/d/([a-zA-Z0-9_-]+)",
        r"/spreadsheets/d/([a-zA-Z0-9_-]+)",
        r"/presentation/d/([a-zA-Z0-9_-]+)",
        r"/file/d/([a-zA-Z0-9_-]+)",
        r"/drawings/d/([a-zA-Z0-9_-]+)",
        r"id=([a-zA-Z0-9_-]+)",
    ])
});

static FOLDER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/folders/([a-zA-Z0-9_-]+)").expect("static pattern"));

fn first_capture(patterns: &[Regex], input: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|re| re.captures(input))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Drive ids are long and never contain a slash.
fn looks_like_bare_id(input: &str) -> bool {
    !input.contains('/') && input.chars().count() > 20
}

/// Document id of a Google Docs URL.
pub fn document_id(url: &str) -> Option<String> {
    first_capture(&DOCUMENT_PATTERNS, url)
}

/// File id from a Docs/Sheets/Slides/Drawings/Drive URL, or a bare id.
pub fn file_id(url_or_id: &str) -> Result<String, GoogleError> {
    if looks_like_bare_id(url_or_id) {
        return Ok(url_or_id.to_string());
    }
    first_capture(&FILE_PATTERNS, url_or_id)
        .ok_or_else(|| GoogleError::BadFileId(url_or_id.to_string()))
}

/// Folder id from a `/folders/<id>` URL. Anything else is assumed to already be an id.
pub fn folder_id(url_or_id: &str) -> String {
    if looks_like_bare_id(url_or_id) {
        return url_or_id.to_string();
    }
    FOLDER_PATTERN
        .captures(url_or_id)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| url_or_id.to_string())
}
