use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn jira(workdir: &TempDir, base_url: &str) -> Command {
    let mut cmd = Command::cargo_bin("jira").expect("binary exists");
    cmd.current_dir(workdir.path())
        .env("JIRA_BASE_URL", base_url)
        .env("JIRA_PAT", "test-token")
        .env_remove("JIRA_USERNAME")
        .env_remove("JIRA_PASSWORD")
        .env_remove("SKILLKIT_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

async fn mount_transitions(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rest/api/2/issue/OPS-1/transitions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transitions": [
                { "id": "11", "name": "Start Progress", "to": { "name": "In Progress" } },
                { "id": "31", "name": "Done", "to": { "name": "Done" } }
            ]
        })))
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_transition_lists_available_names() {
    let server = MockServer::start().await;
    mount_transitions(&server).await;
    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue/OPS-1/transitions"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    jira(&dir, &server.uri())
        .args(["transition", "OPS-1", "Closed"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Transition 'Closed' not found. Available: Start Progress, Done",
        ));
}

#[tokio::test(flavor = "multi_thread")]
async fn transition_matches_name_case_insensitively() {
    let server = MockServer::start().await;
    mount_transitions(&server).await;
    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue/OPS-1/transitions"))
        .and(body_json(json!({ "transition": { "id": "31" } })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    jira(&dir, &server.uri())
        .args(["transition", "OPS-1", "done"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Transitioned: OPS-1 -> done"));
}

#[tokio::test(flavor = "multi_thread")]
async fn transitions_lists_targets() {
    let server = MockServer::start().await;
    mount_transitions(&server).await;

    let dir = tempfile::tempdir().unwrap();
    jira(&dir, &server.uri())
        .args(["transitions", "OPS-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("  [11] Start Progress -> In Progress"));
}

#[tokio::test(flavor = "multi_thread")]
async fn assign_dash_unassigns() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/rest/api/2/issue/OPS-1/assignee"))
        .and(body_json(json!({ "name": null })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    jira(&dir, &server.uri())
        .args(["assign", "OPS-1", "-"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Unassigned: OPS-1"));
}

#[tokio::test(flavor = "multi_thread")]
async fn get_shows_fields_and_comments() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/2/issue/OPS-1"))
        .and(wiremock::matchers::query_param("expand", "renderedFields,comments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "key": "OPS-1",
            "fields": {
                "summary": "Rotate certificates",
                "issuetype": { "name": "Task" },
                "status": { "name": "Open" },
                "labels": ["infra", "security"],
                "comment": { "comments": [
                    { "author": { "displayName": "Dana" }, "created": "2024-05-01T10:00:00.000+0000", "body": "On it." }
                ] }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    jira(&dir, &server.uri())
        .args(["get", "OPS-1", "--comments"])
        .assert()
        .success()
        .stdout(predicate::str::contains("OPS-1: Rotate certificates"))
        .stdout(predicate::str::contains("Type: Task  Status: Open  Priority: N/A"))
        .stdout(predicate::str::contains("Assignee: Unassigned"))
        .stdout(predicate::str::contains("Labels: infra, security"))
        .stdout(predicate::str::contains("2024-05-01 Dana:"))
        .stdout(predicate::str::contains(format!("URL: {}/browse/OPS-1", server.uri())));
}

#[tokio::test(flavor = "multi_thread")]
async fn api_error_messages_reach_stderr() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue/OPS-1/comment"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errorMessages": ["Comment body can not be empty!"],
            "errors": {}
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    jira(&dir, &server.uri())
        .args(["comment", "OPS-1", " "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Comment body can not be empty!"));
}

#[tokio::test(flavor = "multi_thread")]
async fn fatal_error_is_printed_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue/OPS-1/comment"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errorMessages": ["Comment body can not be empty!"],
            "errors": {}
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let output = jira(&dir, &server.uri())
        .args(["comment", "OPS-1", " "])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(
        stderr.matches("Comment body can not be empty!").count(),
        1,
        "stderr was: {stderr}"
    );
}
