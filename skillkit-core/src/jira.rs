//! Jira Data Center REST client (`<base>/rest/api/2`).

use std::time::Duration;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::atlassian::{ApiError, AtlassianHttp, Connection, ErrorStyle};

pub const ENV_PREFIX: &str = "JIRA";

const API_PATH: &str = "rest/api/2";

/// Width of the summary column in search listings.
pub const SUMMARY_WIDTH: usize = 50;

/// Anything Jira identifies by `name`: issue types, statuses, priorities, components.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Named {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "displayName", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub body: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Comment {
    /// The date part of the `created` timestamp.
    pub fn created_date(&self) -> &str {
        self.created.get(..10).unwrap_or(&self.created)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentPage {
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuetype: Option<Named>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Named>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Named>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<CommentPage>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IssueFields {
    fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.issuetype.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.assignee.is_none()
            && self.labels.is_none()
            && self.description.is_none()
            && self.comment.is_none()
            && self.extra.is_empty()
    }

    /// Assignee display name, or `Unassigned`.
    pub fn assignee_name(&self) -> &str {
        self.assignee
            .as_ref()
            .and_then(|a| a.display_name.as_deref())
            .unwrap_or("Unassigned")
    }

    pub fn comments(&self) -> &[Comment] {
        self.comment
            .as_ref()
            .map(|c| c.comments.as_slice())
            .unwrap_or(&[])
    }
}

fn name_or<'a>(named: &'a Option<Named>, default: &'a str) -> &'a str {
    named.as_ref().map(|n| n.name.as_str()).unwrap_or(default)
}

impl IssueFields {
    pub fn type_name(&self) -> &str {
        name_or(&self.issuetype, "N/A")
    }

    pub fn status_name(&self) -> &str {
        name_or(&self.status, "N/A")
    }

    pub fn priority_name(&self) -> &str {
        name_or(&self.priority, "N/A")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Issue {
    #[serde(default)]
    pub key: String,
    #[serde(default, skip_serializing_if = "IssueFields::is_empty")]
    pub fields: IssueFields,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub total: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transition {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Named>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Transition {
    pub fn target_name(&self) -> &str {
        name_or(&self.to, "N/A")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TransitionList {
    #[serde(default)]
    transitions: Vec<Transition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Splits a comma-separated flag value, dropping blank entries.
pub fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// First `max` characters of `text`.
pub fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Finds a transition by exact id or case-insensitive name.
pub fn find_transition<'a>(transitions: &'a [Transition], wanted: &str) -> Result<&'a Transition, ApiError> {
    transitions
        .iter()
        .find(|t| t.id == wanted || t.name.to_lowercase() == wanted.to_lowercase())
        .ok_or_else(|| {
            let available = transitions
                .iter()
                .map(|t| t.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            ApiError::NotFound(format!("Transition '{wanted}' not found. Available: {available}"))
        })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewIssue {
    pub project: String,
    pub issue_type: String,
    pub summary: String,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub labels: Vec<String>,
    pub components: Vec<String>,
}

impl NewIssue {
    pub fn payload(&self) -> Value {
        let mut fields = json!({
            "project": { "key": self.project },
            "issuetype": { "name": self.issue_type },
            "summary": self.summary,
        });
        if let Some(description) = self.description.as_deref().filter(|d| !d.is_empty()) {
            fields["description"] = json!(description);
        }
        if let Some(priority) = self.priority.as_deref().filter(|p| !p.is_empty()) {
            fields["priority"] = json!({ "name": priority });
        }
        if let Some(assignee) = self.assignee.as_deref().filter(|a| !a.is_empty()) {
            fields["assignee"] = json!({ "name": assignee });
        }
        if !self.labels.is_empty() {
            fields["labels"] = json!(self.labels);
        }
        if !self.components.is_empty() {
            let components: Vec<Value> = self
                .components
                .iter()
                .map(|c| json!({ "name": c }))
                .collect();
            fields["components"] = Value::Array(components);
        }
        json!({ "fields": fields })
    }
}

/// Field edits plus label add/remove operations for `PUT issue/{key}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueUpdate {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    /// Replaces every label.
    pub labels: Option<Vec<String>>,
    pub add_labels: Vec<String>,
    pub remove_labels: Vec<String>,
}

impl IssueUpdate {
    pub fn fields(&self) -> Option<Value> {
        let mut fields = Map::new();
        if let Some(summary) = self.summary.as_deref().filter(|s| !s.is_empty()) {
            fields.insert("summary".into(), json!(summary));
        }
        if let Some(description) = self.description.as_deref().filter(|s| !s.is_empty()) {
            fields.insert("description".into(), json!(description));
        }
        if let Some(priority) = self.priority.as_deref().filter(|s| !s.is_empty()) {
            fields.insert("priority".into(), json!({ "name": priority }));
        }
        if let Some(labels) = self.labels.as_ref().filter(|l| !l.is_empty()) {
            fields.insert("labels".into(), json!(labels));
        }
        (!fields.is_empty()).then_some(Value::Object(fields))
    }

    pub fn operations(&self) -> Option<Value> {
        let ops: Vec<Value> = self
            .add_labels
            .iter()
            .map(|l| json!({ "add": l }))
            .chain(self.remove_labels.iter().map(|l| json!({ "remove": l })))
            .collect();
        (!ops.is_empty()).then(|| json!({ "labels": ops }))
    }

    pub fn payload(&self) -> Value {
        let mut data = Map::new();
        if let Some(fields) = self.fields() {
            data.insert("fields".into(), fields);
        }
        if let Some(update) = self.operations() {
            data.insert("update".into(), update);
        }
        Value::Object(data)
    }
}

pub struct JiraClient {
    http: AtlassianHttp,
}

impl JiraClient {
    pub fn new(connection: Connection, timeout: Duration) -> Result<Self, ApiError> {
        let http = AtlassianHttp::new(connection, API_PATH, ErrorStyle::Jira, timeout)?;
        Ok(Self { http })
    }

    pub fn from_env(timeout: Duration) -> Result<Self, ApiError> {
        Self::new(Connection::from_env(ENV_PREFIX)?, timeout)
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    pub fn issue_url(&self, key: &str) -> String {
        format!("{}/browse/{}", self.base_url(), key)
    }

    pub async fn get_issue(
        &self,
        key: &str,
        fields: &[String],
        expand: &[&str],
    ) -> Result<Issue, ApiError> {
        let mut query = Vec::new();
        if !fields.is_empty() {
            query.push(("fields", fields.join(",")));
        }
        if !expand.is_empty() {
            query.push(("expand", expand.join(",")));
        }
        self.http
            .call_as(Method::GET, &format!("issue/{key}"), &query, None)
            .await
    }

    pub async fn search(
        &self,
        jql: &str,
        max_results: u32,
        fields: &[String],
    ) -> Result<SearchResults, ApiError> {
        let mut body = json!({ "jql": jql, "maxResults": max_results });
        if !fields.is_empty() {
            body["fields"] = json!(fields);
        }
        info!(jql, max_results, "Searching Jira");
        self.http
            .call_as(Method::POST, "search", &[], Some(&body))
            .await
    }

    pub async fn create_issue(&self, issue: &NewIssue) -> Result<Issue, ApiError> {
        info!(project = %issue.project, issue_type = %issue.issue_type, "Creating issue");
        self.http
            .call_as(Method::POST, "issue", &[], Some(&issue.payload()))
            .await
    }

    pub async fn update_issue(&self, key: &str, update: &IssueUpdate) -> Result<(), ApiError> {
        self.http
            .call(Method::PUT, &format!("issue/{key}"), &[], Some(&update.payload()))
            .await?;
        Ok(())
    }

    pub async fn transitions(&self, key: &str) -> Result<Vec<Transition>, ApiError> {
        let list: TransitionList = self
            .http
            .call_as(Method::GET, &format!("issue/{key}/transitions"), &[], None)
            .await?;
        Ok(list.transitions)
    }

    pub async fn transition(
        &self,
        key: &str,
        transition_id: &str,
        comment: Option<&str>,
    ) -> Result<(), ApiError> {
        let mut body = json!({ "transition": { "id": transition_id } });
        if let Some(comment) = comment.filter(|c| !c.is_empty()) {
            body["update"] = json!({ "comment": [{ "add": { "body": comment } }] });
        }
        info!(key, transition_id, "Transitioning issue");
        self.http
            .call(
                Method::POST,
                &format!("issue/{key}/transitions"),
                &[],
                Some(&body),
            )
            .await?;
        Ok(())
    }

    pub async fn add_comment(&self, key: &str, body: &str) -> Result<Comment, ApiError> {
        self.http
            .call_as(
                Method::POST,
                &format!("issue/{key}/comment"),
                &[],
                Some(&json!({ "body": body })),
            )
            .await
    }

    /// Assigns to `user`, or unassigns with `None`.
    pub async fn assign(&self, key: &str, user: Option<&str>) -> Result<(), ApiError> {
        self.http
            .call(
                Method::PUT,
                &format!("issue/{key}/assignee"),
                &[],
                Some(&json!({ "name": user })),
            )
            .await?;
        Ok(())
    }

    pub async fn projects(&self) -> Result<Vec<Project>, ApiError> {
        self.http.call_as(Method::GET, "project", &[], None).await
    }
}
