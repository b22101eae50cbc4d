use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use skillkit_core::jira::{
    find_transition, split_csv, truncate, IssueUpdate, JiraClient, NewIssue, SUMMARY_WIDTH,
};

use crate::render::{print_json, Table};

/// Jira Data Center CLI.
#[derive(Parser, Debug)]
#[clap(name = "jira", version, about = "Jira Data Center CLI")]
pub struct Cli {
    /// YAML settings file (HTTP timeout)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Get issue details
    Get {
        /// Issue key (e.g., PROJ-123)
        issue_key: String,
        /// Comma-separated fields to return
        #[clap(long, short)]
        fields: Option<String>,
        /// Include comments
        #[clap(long, short)]
        comments: bool,
        /// Output as JSON
        #[clap(long, short)]
        json: bool,
    },
    /// Search issues using JQL
    Search {
        /// JQL query string
        jql: String,
        /// Maximum results
        #[clap(long = "max", short = 'm', default_value_t = 50)]
        max: u32,
        #[clap(long, short)]
        fields: Option<String>,
        #[clap(long, short)]
        json: bool,
    },
    /// Create a new issue
    Create {
        /// Project key
        #[clap(long, short)]
        project: String,
        /// Issue type (Bug, Task, Story, etc.)
        #[clap(long = "type", short = 't')]
        issue_type: String,
        /// Issue summary/title
        #[clap(long, short)]
        summary: String,
        #[clap(long, short)]
        description: Option<String>,
        /// Priority name
        #[clap(long)]
        priority: Option<String>,
        /// Assignee username
        #[clap(long, short)]
        assignee: Option<String>,
        /// Comma-separated labels
        #[clap(long, short)]
        labels: Option<String>,
        /// Comma-separated components
        #[clap(long)]
        components: Option<String>,
        #[clap(long, short)]
        json: bool,
    },
    /// Update issue fields
    Update {
        issue_key: String,
        #[clap(long, short)]
        summary: Option<String>,
        #[clap(long, short)]
        description: Option<String>,
        #[clap(long)]
        priority: Option<String>,
        /// Replace labels
        #[clap(long, short)]
        labels: Option<String>,
        #[clap(long)]
        add_labels: Option<String>,
        #[clap(long)]
        remove_labels: Option<String>,
    },
    /// List available transitions for an issue
    Transitions {
        issue_key: String,
        #[clap(long, short)]
        json: bool,
    },
    /// Transition issue to a new status
    Transition {
        issue_key: String,
        /// Target status name or transition ID
        status: String,
        #[clap(long, short)]
        comment: Option<String>,
    },
    /// Add a comment to an issue
    Comment {
        issue_key: String,
        /// Comment text
        body: String,
    },
    /// Assign issue to a user
    Assign {
        issue_key: String,
        /// Username (or '-' to unassign)
        username: String,
    },
    /// List available projects
    Projects {
        #[clap(long, short)]
        json: bool,
    },
}

fn csv(raw: Option<&str>) -> Vec<String> {
    raw.map(split_csv).unwrap_or_default()
}

pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let settings = super::load_settings(cli.config.as_deref())?;
    let client = JiraClient::from_env(settings.timeouts.http())?;

    match cli.command {
        Commands::Get {
            issue_key,
            fields,
            comments,
            json,
        } => {
            let mut expand = vec!["renderedFields"];
            if comments {
                expand.push("comments");
            }
            let issue = client
                .get_issue(&issue_key, &csv(fields.as_deref()), &expand)
                .await?;
            if json {
                return print_json(&issue);
            }

            let f = &issue.fields;
            println!("\n{issue_key}: {}", f.summary.as_deref().unwrap_or("N/A"));
            println!("URL: {}", client.issue_url(&issue_key));
            println!(
                "Type: {}  Status: {}  Priority: {}",
                f.type_name(),
                f.status_name(),
                f.priority_name()
            );
            println!("Assignee: {}", f.assignee_name());
            if let Some(labels) = f.labels.as_ref().filter(|l| !l.is_empty()) {
                println!("Labels: {}", labels.join(", "));
            }
            if let Some(description) = f.description.as_deref().filter(|d| !d.is_empty()) {
                println!("\nDescription:\n{description}");
            }
            if comments && !f.comments().is_empty() {
                println!("\nComments ({}):", f.comments().len());
                for comment in f.comments() {
                    let author = comment
                        .author
                        .as_ref()
                        .and_then(|a| a.display_name.as_deref())
                        .unwrap_or("Unknown");
                    println!("\n{} {author}:", comment.created_date());
                    println!("{}", comment.body);
                }
            }
        }

        Commands::Search {
            jql,
            max,
            fields,
            json,
        } => {
            let results = client.search(&jql, max, &csv(fields.as_deref())).await?;
            if json {
                return print_json(&results);
            }

            println!(
                "\nFound {} issues (showing {})\n",
                results.total,
                results.issues.len()
            );
            let mut table = Table::new(["Key", "Type", "Status", "Assignee", "Summary"]);
            for issue in &results.issues {
                let f = &issue.fields;
                table.row([
                    issue.key.as_str(),
                    f.issuetype.as_ref().map(|n| n.name.as_str()).unwrap_or(""),
                    f.status.as_ref().map(|n| n.name.as_str()).unwrap_or(""),
                    f.assignee_name(),
                    truncate(f.summary.as_deref().unwrap_or(""), SUMMARY_WIDTH),
                ]);
            }
            print!("{table}");
        }

        Commands::Create {
            project,
            issue_type,
            summary,
            description,
            priority,
            assignee,
            labels,
            components,
            json,
        } => {
            let issue = NewIssue {
                project,
                issue_type,
                summary,
                description,
                priority,
                assignee,
                labels: csv(labels.as_deref()),
                components: csv(components.as_deref()),
            };
            let created = client.create_issue(&issue).await?;
            if json {
                return print_json(&created);
            }

            println!("\nCreated: {}", created.key);
            println!("URL: {}", client.issue_url(&created.key));
        }

        Commands::Update {
            issue_key,
            summary,
            description,
            priority,
            labels,
            add_labels,
            remove_labels,
        } => {
            let update = IssueUpdate {
                summary,
                description,
                priority,
                labels: labels.as_deref().map(split_csv),
                add_labels: csv(add_labels.as_deref()),
                remove_labels: csv(remove_labels.as_deref()),
            };
            client.update_issue(&issue_key, &update).await?;
            println!("Updated: {issue_key}");
        }

        Commands::Transitions { issue_key, json } => {
            let transitions = client.transitions(&issue_key).await?;
            if json {
                return print_json(&transitions);
            }

            println!("\nAvailable transitions for {issue_key}:\n");
            for t in &transitions {
                println!("  [{}] {} -> {}", t.id, t.name, t.target_name());
            }
        }

        Commands::Transition {
            issue_key,
            status,
            comment,
        } => {
            let transitions = client.transitions(&issue_key).await?;
            let chosen = find_transition(&transitions, &status)?;
            client
                .transition(&issue_key, &chosen.id, comment.as_deref())
                .await?;
            println!("Transitioned: {issue_key} -> {status}");
        }

        Commands::Comment { issue_key, body } => {
            client.add_comment(&issue_key, &body).await?;
            println!("Added comment to: {issue_key}");
        }

        Commands::Assign {
            issue_key,
            username,
        } => {
            let user = (username != "-").then_some(username.as_str());
            client.assign(&issue_key, user).await?;
            match user {
                Some(user) => println!("Assigned: {issue_key} -> {user}"),
                None => println!("Unassigned: {issue_key}"),
            }
        }

        Commands::Projects { json } => {
            let projects = client.projects().await?;
            if json {
                return print_json(&projects);
            }

            println!("\nAvailable projects:\n");
            let mut table = Table::new(["Key", "Name"]);
            for project in &projects {
                table.row([project.key.as_str(), project.name.as_str()]);
            }
            print!("{table}");
        }
    }

    Ok(())
}
