//! # contract: the seam between conversion logic and the tools that do the work
//!
//! Document conversion never parses PDFs or Office files itself. It routes a
//! file to one of a few external converters and decides what to do when one
//! of them fails. [`ConversionBackend`] is that set of converters; the real
//! implementation shells out (see [`crate::convert::Toolchain`]) and tests use
//! the generated `MockConversionBackend`.
//!
//! Every method reports failure as `None` rather than an error: a missing
//! binary or a timeout is a reason to try the next converter, not to abort.

use std::path::Path;

use async_trait::async_trait;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ConversionBackend: Send + Sync {
    /// `pandoc -t markdown` on a file.
    async fn pandoc(&self, path: &Path) -> Option<String>;

    /// Markdown from the extraction library; `ocr` turns on its image/OCR plugins.
    async fn extract(&self, path: &Path, ocr: bool) -> Option<String>;

    /// Layout-preserving text layer of a PDF.
    async fn pdf_text(&self, path: &Path) -> Option<String>;

    /// Downloads `url` into `dest`, following redirects. True when a non-empty file was written.
    async fn fetch(&self, url: &str, dest: &Path) -> bool;
}
