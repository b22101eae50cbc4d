use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use skillkit_core::confluence::{BodyFormat, ConfluenceClient, NewPage, PageUpdate};
use skillkit_core::convert::Toolchain;
use skillkit_core::storage::{markdown_to_storage, spread_tags, storage_to_markdown};

use crate::render::{print_json, Table};

/// Confluence Data Center CLI.
#[derive(Parser, Debug)]
#[clap(name = "confluence", version, about = "Confluence Data Center CLI")]
pub struct Cli {
    /// YAML settings file (tool paths, timeouts)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Get page content by ID or title
    Get {
        /// Page ID
        page_id: Option<String>,
        /// Space key
        #[clap(long, short)]
        space: Option<String>,
        /// Page title
        #[clap(long, short)]
        title: Option<String>,
        /// Output format: markdown, html, storage
        #[clap(long = "format", short = 'f', default_value = "markdown")]
        format: BodyFormat,
        /// Output as JSON
        #[clap(long, short)]
        json: bool,
    },
    /// Search content using CQL
    Search {
        /// CQL query
        cql: String,
        /// Maximum results
        #[clap(long = "max", short = 'm', default_value_t = 25)]
        max: u32,
        /// Content type: page, blogpost, comment
        #[clap(long = "type", short = 't')]
        content_type: Option<String>,
        #[clap(long, short)]
        json: bool,
    },
    /// Create a new page
    Create {
        #[clap(long, short)]
        space: String,
        #[clap(long, short)]
        title: String,
        /// Page content
        #[clap(long, short)]
        body: Option<String>,
        /// Read body from file
        #[clap(long)]
        body_file: Option<PathBuf>,
        /// Parent page ID
        #[clap(long, short)]
        parent: Option<String>,
        /// Body format: markdown, html, storage
        #[clap(long = "format", short = 'f', default_value = "markdown")]
        format: BodyFormat,
        #[clap(long, short)]
        json: bool,
    },
    /// Update a page
    Update {
        page_id: String,
        /// New title
        #[clap(long, short)]
        title: Option<String>,
        /// New content
        #[clap(long, short)]
        body: Option<String>,
        #[clap(long)]
        body_file: Option<PathBuf>,
        #[clap(long = "format", short = 'f', default_value = "markdown")]
        format: BodyFormat,
        /// Mark as minor edit
        #[clap(long)]
        minor: bool,
    },
    /// Delete a page
    Delete {
        page_id: String,
        /// Skip confirmation
        #[clap(long, short)]
        force: bool,
    },
    /// List child pages
    Children {
        /// Parent page ID
        page_id: String,
        #[clap(long, short)]
        json: bool,
    },
    /// List available spaces
    Spaces {
        /// Filter: global, personal
        #[clap(long = "type", short = 't')]
        space_type: Option<String>,
        #[clap(long, short)]
        json: bool,
    },
    /// List or upload attachments
    Attachments {
        page_id: String,
        /// File to upload
        #[clap(long, short)]
        upload: Option<PathBuf>,
        #[clap(long, short)]
        json: bool,
    },
    /// Export page to file
    Export {
        page_id: String,
        /// Export format
        #[clap(long, short, value_enum, default_value_t = ExportFormat::Markdown)]
        format: ExportFormat,
        /// Output file path
        #[clap(long, short)]
        output: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Pdf,
    Markdown,
}

/// `--body-file` wins over `--body`.
fn read_body(body: Option<String>, body_file: Option<&Path>) -> Result<Option<String>> {
    match body_file {
        Some(path) => Ok(Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?,
        )),
        None => Ok(body),
    }
}

/// Converts Markdown bodies to storage format; other formats pass through.
async fn prepare_body(tools: &Toolchain, content: String, format: BodyFormat) -> String {
    match format {
        BodyFormat::Markdown => markdown_to_storage(tools, &content).await,
        BodyFormat::Html | BodyFormat::Storage => content,
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let settings = super::load_settings(cli.config.as_deref())?;
    let tools = Toolchain::new(&settings);
    let client = ConfluenceClient::from_env(settings.timeouts.http())?;

    match cli.command {
        Commands::Get {
            page_id,
            space,
            title,
            format,
            json,
        } => {
            let page = match (page_id, space, title) {
                (Some(id), _, _) => client.get_page(&id).await?,
                (None, Some(space), Some(title)) => client.find_page(&space, &title).await?,
                _ => bail!("Provide page_id or both --space and --title"),
            };
            if json {
                return print_json(&page);
            }

            println!("\n{}", page.title);
            println!("ID: {}  Space: {}", page.id, page.space_key());
            println!("URL: {}\n", client.page_url(&page.id));
            match format {
                BodyFormat::Markdown => println!("{}", storage_to_markdown(page.storage())),
                BodyFormat::Html => println!("{}", spread_tags(page.storage())),
                BodyFormat::Storage => println!("{}", page.storage()),
            }
        }

        Commands::Search {
            cql,
            max,
            content_type,
            json,
        } => {
            let results = client.search(&cql, max, content_type.as_deref()).await?;
            if json {
                return print_json(&results);
            }

            println!(
                "\nFound {} results (showing {})\n",
                results.total(),
                results.results.len()
            );
            let mut table = Table::new(["ID", "Space", "Title", "Type"]);
            for item in &results.results {
                table.row([
                    item.id.as_str(),
                    item.space_key(),
                    item.title.as_str(),
                    item.kind.as_deref().unwrap_or(""),
                ]);
            }
            print!("{table}");
        }

        Commands::Create {
            space,
            title,
            body,
            body_file,
            parent,
            format,
            json,
        } => {
            let content = read_body(body, body_file.as_deref())?
                .filter(|c| !c.is_empty())
                .context("Provide --body or --body-file")?;
            let page = NewPage {
                space,
                title: title.clone(),
                body: prepare_body(&tools, content, format).await,
                parent,
                representation: format.representation().to_string(),
            };
            let created = client.create_page(&page).await?;
            if json {
                return print_json(&created);
            }

            println!("\nCreated: {title}");
            println!("ID: {}", created.id);
            println!("URL: {}", client.page_url(&created.id));
        }

        Commands::Update {
            page_id,
            title,
            body,
            body_file,
            format,
            minor,
        } => {
            let body = match read_body(body, body_file.as_deref())?.filter(|c| !c.is_empty()) {
                Some(content) => Some(prepare_body(&tools, content, format).await),
                None => None,
            };
            let update = PageUpdate {
                title,
                body,
                representation: format.representation().to_string(),
                minor,
            };
            client.update_page(&page_id, &update).await?;
            println!("Updated: {page_id}");
        }

        Commands::Delete { page_id, force } => {
            if !force {
                let page = client.get_page(&page_id).await?;
                let title = if page.title.is_empty() {
                    "Unknown"
                } else {
                    page.title.as_str()
                };
                let prompt = format!("Delete page '{title}' (ID: {page_id})?");
                if !super::confirm(&prompt, &mut std::io::stdin().lock())? {
                    println!("Cancelled");
                    return Ok(());
                }
            }
            client.delete_page(&page_id).await?;
            println!("Deleted: {page_id}");
        }

        Commands::Children { page_id, json } => {
            let children = client.children(&page_id, 50).await?;
            if json {
                return print_json(&children);
            }

            println!("\nChild pages ({}):\n", children.results.len());
            for child in &children.results {
                println!("  {}", child.title);
                println!("    ID: {}", child.id);
            }
        }

        Commands::Spaces { space_type, json } => {
            let spaces = client.spaces(space_type.as_deref()).await?;
            if json {
                return print_json(&spaces);
            }

            println!("\nSpaces ({}):\n", spaces.results.len());
            let mut table = Table::new(["Key", "Name", "Type"]);
            for space in &spaces.results {
                table.row([
                    space.key.as_str(),
                    space.name.as_deref().unwrap_or(""),
                    space.kind.as_deref().unwrap_or(""),
                ]);
            }
            print!("{table}");
        }

        Commands::Attachments {
            page_id,
            upload,
            json,
        } => {
            if let Some(file) = upload {
                if !file.exists() {
                    bail!("File not found: {}", file.display());
                }
                let result = client.upload_attachment(&page_id, &file).await?;
                if json {
                    return print_json(&result);
                }
                let name = file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                println!("Uploaded: {name}");
                return Ok(());
            }

            let attachments = client.attachments(&page_id).await?;
            if json {
                return print_json(&attachments);
            }

            println!("\nAttachments ({}):\n", attachments.results.len());
            for attachment in &attachments.results {
                println!("  {}", attachment.title);
                println!("    ID: {}", attachment.id);
            }
        }

        Commands::Export {
            page_id,
            format,
            output,
        } => {
            match format {
                ExportFormat::Pdf => {
                    let pdf = client.export_pdf(&page_id).await?;
                    std::fs::write(&output, pdf)
                        .with_context(|| format!("Failed to write {}", output.display()))?;
                }
                ExportFormat::Markdown => {
                    let page = client.get_page(&page_id).await?;
                    std::fs::write(&output, storage_to_markdown(page.storage()))
                        .with_context(|| format!("Failed to write {}", output.display()))?;
                }
            }
            println!("Exported to: {}", output.display());
        }
    }

    Ok(())
}
