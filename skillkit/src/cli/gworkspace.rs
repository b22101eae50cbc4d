use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use skillkit_core::convert::Toolchain;
use skillkit_core::google::auth::{service_account_email, ServiceAccountCredentials, DRIVE_SCOPES};
use skillkit_core::google::drive::{type_label, DriveClient};
use skillkit_core::google::{ids, GoogleError};
use skillkit_core::google::workspace::{create_gdoc_from_markdown, to_markdown};

/// Convert between Google Workspace files and Markdown.
///
/// Authenticates with the service-account key named by
/// GOOGLE_APPLICATION_CREDENTIALS. Files must be shared with that account.
#[derive(Parser, Debug)]
#[clap(name = "gworkspace", version)]
pub struct Cli {
    /// YAML settings file (tool paths, timeouts)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert Google file to Markdown
    #[clap(name = "to-markdown", visible_aliases = ["tomd", "download"])]
    ToMarkdown {
        /// Google Drive URL or file ID
        input: String,
        /// Output path (default: current dir)
        #[clap(long, short)]
        output: Option<PathBuf>,
        /// Enable OCR for image content
        #[clap(long)]
        ocr: bool,
    },
    /// Create Google Doc from Markdown
    #[clap(name = "to-gdoc", visible_aliases = ["togdoc", "upload"])]
    ToGdoc {
        /// Path to Markdown file
        input: PathBuf,
        /// Name for the Google Doc (default: filename)
        #[clap(long, short)]
        name: Option<String>,
        /// Google Drive folder ID or URL to upload to
        #[clap(long, short)]
        folder: Option<String>,
    },
    /// List accessible files
    List {
        /// Max files to list
        #[clap(long, short = 'n', default_value_t = 20)]
        limit: u32,
    },
    /// Show service account info for sharing
    Info,
}

async fn drive_client(timeout: std::time::Duration) -> Result<DriveClient> {
    let credentials = ServiceAccountCredentials::from_env()?;
    let token = credentials.token(DRIVE_SCOPES, timeout).await?;
    Ok(DriveClient::new(token, timeout)?)
}

fn print_sharing_info(email: &str) {
    println!("\nService Account Email: {email}");
    println!("\nTo give access to a file:");
    println!("  1. Open the file in Google Drive");
    println!("  2. Click 'Share'");
    println!("  3. Add: {email}");
    println!("  4. Give 'Viewer' access (or 'Editor' for upload)");
}

pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let settings = super::load_settings(cli.config.as_deref())?;
    let timeout = settings.timeouts.http();

    match cli.command {
        Commands::ToMarkdown { input, output, ocr } => {
            // Reject unusable input before spending a token exchange on it.
            ids::file_id(&input)?;
            let drive = drive_client(timeout).await?;
            let tools = Toolchain::new(&settings);
            let written = to_markdown(&drive, &tools, &input, output.as_deref(), ocr).await?;
            println!("Converted to: {}", written.display());
        }

        Commands::ToGdoc {
            input,
            name,
            folder,
        } => {
            if !input.exists() {
                return Err(GoogleError::MarkdownNotFound(input).into());
            }
            let drive = drive_client(timeout).await?;
            let tools = Toolchain::new(&settings);
            let folder = folder.as_deref().map(ids::folder_id);
            let url =
                create_gdoc_from_markdown(&drive, &tools, &input, name.as_deref(), folder.as_deref())
                    .await?;
            println!("Created Google Doc: {url}");
        }

        Commands::List { limit } => {
            let drive = drive_client(timeout).await?;
            let files = drive.list_files(limit).await?;
            if files.is_empty() {
                println!("No files found. Share files with your service account email to access them.");
                return Ok(());
            }

            println!("\nAccessible files ({}):\n", files.len());
            for file in &files {
                println!("  {}", file.name);
                println!("    ID: {}", file.id);
                println!("    Type: {}", type_label(&file.mime_type));
                println!();
            }
        }

        Commands::Info => {
            let path = ServiceAccountCredentials::path_from_env();
            let email = service_account_email(path.as_deref())?;
            print_sharing_info(&email);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_subcommands() {
        let cli = Cli::parse_from(["gworkspace", "tomd", "abc", "--ocr"]);
        assert!(matches!(cli.command, Commands::ToMarkdown { ocr: true, .. }));

        let cli = Cli::parse_from(["gworkspace", "upload", "notes.md", "-n", "Notes"]);
        match cli.command {
            Commands::ToGdoc { input, name, .. } => {
                assert_eq!(input, PathBuf::from("notes.md"));
                assert_eq!(name.as_deref(), Some("Notes"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn list_limit_defaults_to_twenty() {
        let cli = Cli::parse_from(["gworkspace", "list"]);
        assert!(matches!(cli.command, Commands::List { limit: 20 }));
    }
}
