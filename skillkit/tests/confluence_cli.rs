use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Runs `confluence` from an empty directory so no `.env` is picked up.
fn confluence(workdir: &TempDir, base_url: Option<&str>) -> Command {
    let mut cmd = Command::cargo_bin("confluence").expect("binary exists");
    cmd.current_dir(workdir.path())
        .env_remove("CONFLUENCE_USERNAME")
        .env_remove("CONFLUENCE_PASSWORD")
        .env_remove("SKILLKIT_CONFIG")
        .env_remove("RUST_LOG");
    match base_url {
        Some(url) => {
            cmd.env("CONFLUENCE_BASE_URL", url)
                .env("CONFLUENCE_PAT", "test-token");
        }
        None => {
            cmd.env_remove("CONFLUENCE_BASE_URL")
                .env_remove("CONFLUENCE_PAT");
        }
    }
    cmd
}

fn page_json() -> serde_json::Value {
    json!({
        "id": "123",
        "type": "page",
        "title": "Runbook",
        "space": { "key": "OPS", "name": "Operations" },
        "version": { "number": 4 },
        "body": { "storage": { "value": "<p>Hello <strong>world</strong></p>", "representation": "storage" } }
    })
}

#[test]
fn missing_base_url_fails_with_env_hint() {
    let dir = tempfile::tempdir().unwrap();
    confluence(&dir, None)
        .args(["spaces"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "CONFLUENCE_BASE_URL environment variable required",
        ));
}

#[tokio::test(flavor = "multi_thread")]
async fn get_prints_header_and_markdown_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/content/123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let url = format!("{}/pages/viewpage.action?pageId=123", server.uri());
    confluence(&dir, Some(&server.uri()))
        .args(["get", "123"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Runbook"))
        .stdout(predicate::str::contains("ID: 123  Space: OPS"))
        .stdout(predicate::str::contains(url))
        .stdout(predicate::str::contains("**world**"));
}

#[test]
fn get_without_id_or_title_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    confluence(&dir, Some("http://127.0.0.1:9"))
        .args(["get", "--space", "OPS"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Provide page_id or both --space and --title",
        ));
}

#[tokio::test(flavor = "multi_thread")]
async fn search_json_echoes_full_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/content/search"))
        .and(query_param("cql", "type = page AND (text ~ \"deploy\")"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [page_json()],
            "totalSize": 1,
            "_links": { "base": "https://wiki.example.com" }
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let output = confluence(&dir, Some(&server.uri()))
        .args(["search", "text ~ \"deploy\"", "--type", "page", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let echoed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(echoed["totalSize"], 1);
    assert_eq!(echoed["_links"]["base"], "https://wiki.example.com");
    assert_eq!(echoed["results"][0]["space"]["key"], "OPS");
}

#[tokio::test(flavor = "multi_thread")]
async fn search_table_reports_counts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/content/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [page_json()],
            "totalSize": 7
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    confluence(&dir, Some(&server.uri()))
        .args(["search", "space = OPS", "-m", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 7 results (showing 1)"))
        .stdout(predicate::str::contains("Runbook"));
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_declined_at_prompt_keeps_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/content/123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json()))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/api/content/123"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    confluence(&dir, Some(&server.uri()))
        .args(["delete", "123"])
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Delete page 'Runbook' (ID: 123)?"))
        .stdout(predicate::str::contains("Cancelled"));
}

#[tokio::test(flavor = "multi_thread")]
async fn forced_delete_skips_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/rest/api/content/123"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    confluence(&dir, Some(&server.uri()))
        .args(["delete", "123", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted: 123"));
}

#[test]
fn create_without_body_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    confluence(&dir, Some("http://127.0.0.1:9"))
        .args(["create", "--space", "OPS", "--title", "Empty"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Provide --body or --body-file"));
}

#[tokio::test(flavor = "multi_thread")]
async fn create_storage_body_is_sent_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/api/content"))
        .and(wiremock::matchers::body_partial_json(json!({
            "type": "page",
            "title": "Notes",
            "space": { "key": "OPS" },
            "body": { "storage": { "value": "<p>raw</p>", "representation": "storage" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "555",
            "title": "Notes"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    confluence(&dir, Some(&server.uri()))
        .args([
            "create", "--space", "OPS", "--title", "Notes", "--body", "<p>raw</p>", "-f", "storage",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created: Notes"))
        .stdout(predicate::str::contains("ID: 555"));
}

#[tokio::test(flavor = "multi_thread")]
async fn export_markdown_writes_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/content/123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("runbook.md");
    confluence(&dir, Some(&server.uri()))
        .args(["export", "123", "--output"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported to:"));
    assert!(std::fs::read_to_string(out).unwrap().contains("**world**"));
}
