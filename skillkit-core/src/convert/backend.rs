use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::ConvertError;
use crate::config::{Binaries, Settings, Timeouts};
use crate::contract::ConversionBackend;
use crate::subprocess::{self, SubprocessError};

/// The external tools installed on this machine.
#[derive(Debug, Clone, Default)]
pub struct Toolchain {
    binaries: Binaries,
    timeouts: Timeouts,
}

impl Toolchain {
    pub fn new(settings: &Settings) -> Self {
        Self {
            binaries: settings.binaries.clone(),
            timeouts: settings.timeouts.clone(),
        }
    }

    /// Converts a Markdown fragment to HTML through pandoc's stdin.
    pub async fn markdown_to_html(&self, markdown: &str) -> Result<String, SubprocessError> {
        let out = subprocess::run(
            &self.binaries.pandoc,
            ["-f", "markdown", "-t", "html"],
            Some(markdown.as_bytes()),
            Duration::from_secs(self.timeouts.pandoc_fragment_secs),
        )
        .await?;
        Ok(out.stdout_lossy())
    }

    /// Renders a Markdown file to DOCX.
    pub async fn markdown_to_docx(&self, markdown: &Path, docx: &Path) -> Result<(), ConvertError> {
        let args = [
            markdown.as_os_str(),
            OsStr::new("-f"),
            OsStr::new("markdown"),
            OsStr::new("-t"),
            OsStr::new("docx"),
            OsStr::new("-o"),
            docx.as_os_str(),
        ];
        subprocess::run(
            &self.binaries.pandoc,
            args,
            None,
            Duration::from_secs(self.timeouts.pandoc_docx_secs),
        )
        .await
        .map_err(|e| match e {
            SubprocessError::Failed { stderr, .. } => ConvertError::Pandoc(stderr.trim().to_string()),
            other => ConvertError::Pandoc(other.to_string()),
        })?;
        info!(docx = %docx.display(), "Rendered DOCX");
        Ok(())
    }

    async fn stdout_of(
        &self,
        program: &Path,
        args: Vec<&OsStr>,
        secs: u64,
    ) -> Option<String> {
        match subprocess::run(program, args, None, Duration::from_secs(secs)).await {
            Ok(out) => Some(out.stdout_lossy()),
            Err(e) => {
                warn!(error = %e, "Converter failed");
                None
            }
        }
    }
}

#[async_trait]
impl ConversionBackend for Toolchain {
    async fn pandoc(&self, path: &Path) -> Option<String> {
        let args = vec![
            path.as_os_str(),
            OsStr::new("-t"),
            OsStr::new("markdown"),
            OsStr::new("-o"),
            OsStr::new("-"),
        ];
        self.stdout_of(&self.binaries.pandoc, args, self.timeouts.pandoc_secs)
            .await
    }

    async fn extract(&self, path: &Path, ocr: bool) -> Option<String> {
        let mut args: Vec<&OsStr> = Vec::new();
        if ocr {
            args.push(OsStr::new("--use-plugins"));
        }
        args.push(path.as_os_str());
        debug!(path = %path.display(), ocr, "Running extraction library");
        self.stdout_of(&self.binaries.markitdown, args, self.timeouts.markitdown_secs)
            .await
    }

    async fn pdf_text(&self, path: &Path) -> Option<String> {
        let args = vec![OsStr::new("-layout"), path.as_os_str(), OsStr::new("-")];
        self.stdout_of(&self.binaries.pdftotext, args, self.timeouts.pdftotext_secs)
            .await
    }

    async fn fetch(&self, url: &str, dest: &Path) -> bool {
        let args = vec![
            OsStr::new("-sSL"),
            OsStr::new("-o"),
            dest.as_os_str(),
            OsStr::new(url),
        ];
        if self
            .stdout_of(&self.binaries.curl, args, self.timeouts.download_secs)
            .await
            .is_none()
        {
            return false;
        }
        tokio::fs::metadata(dest)
            .await
            .map(|m| m.len() > 0)
            .unwrap_or(false)
    }
}
