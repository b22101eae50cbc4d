use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use skillkit_core::convert::{convert_file, ExtractionMode, Toolchain};

/// Convert documents to Markdown.
///
/// PDF, Word, PowerPoint, Excel, HTML and images go through markitdown;
/// EPUB, Org, reStructuredText, LaTeX, ODT and RTF through pandoc. Google Docs
/// URLs are downloaded as DOCX first.
#[derive(Parser, Debug)]
#[clap(name = "convert-to-markdown", version)]
pub struct Cli {
    /// Input file path or Google Docs URL
    pub input: String,

    /// Output file path (default: input with .md extension)
    #[clap(long, short)]
    pub output: Option<PathBuf>,

    /// Extraction mode: auto, ocr, text
    #[clap(long, default_value_t = ExtractionMode::Auto)]
    pub mode: ExtractionMode,

    /// For PDFs, merge text extraction and OCR
    #[clap(long)]
    pub hybrid: bool,

    /// YAML settings file (tool paths, timeouts)
    #[clap(long)]
    pub config: Option<PathBuf>,
}

pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let settings = super::load_settings(cli.config.as_deref())?;
    let tools = Toolchain::new(&settings);

    let written = convert_file(
        &tools,
        &cli.input,
        cli.output.as_deref(),
        cli.mode,
        cli.hybrid,
    )
    .await?;
    println!("Converted to: {}", written.display());
    Ok(())
}
