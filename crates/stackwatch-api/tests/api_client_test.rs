#![allow(clippy::unwrap_used)]
// Integration tests for `ApiClient` using wiremock.

use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use stackwatch_api::{ApiClient, Error, RefreshState, StackStatus};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ApiClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = ApiClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

// ── Stacks ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_stacks() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/stacks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "path": "apps/api", "composeFile": "docker-compose.yml", "composeHash": "h1", "status": "synced",
              "containersRunning": 2, "containersTotal": 2 },
            { "path": "apps/web", "composeFile": "docker-compose.yml", "composeHash": "h2", "status": "syncing",
              "containersRunning": 0, "containersTotal": 1 }
        ])))
        .mount(&server)
        .await;

    let stacks = client.list_stacks().await.unwrap();
    assert_eq!(stacks.len(), 2);
    assert_eq!(stacks[0].path, "apps/api");
    assert_eq!(stacks[1].status, StackStatus::Syncing);
    assert_eq!(stacks[1].containers_total, Some(1));
}

#[tokio::test]
async fn test_list_stacks_server_error_message() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/stacks"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client.list_stacks().await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to fetch stacks: 500");
}

#[tokio::test]
async fn test_list_stacks_bad_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/stacks"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result = client.list_stacks().await;
    assert!(
        matches!(result, Err(Error::Deserialization { ref body, .. }) if body.contains("oops")),
        "expected Deserialization error, got: {result:?}"
    );
}

// ── Refresh ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_refresh_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/refresh-status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "revision": "abc123",
            "commitMessage": "initial",
            "ref": "main",
            "refType": "branch",
            "refreshedAt": "2024-01-01T00:00:00Z",
            "refreshStatus": "queued",
            "stacks": []
        })))
        .mount(&server)
        .await;

    let snap = client.refresh_status().await.unwrap();
    assert_eq!(snap.revision, "abc123");
    assert_eq!(snap.ref_type, "branch");
    assert_eq!(snap.refresh_status, RefreshState::Queued);
}

#[tokio::test]
async fn test_trigger_refresh() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/refresh"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    client.trigger_refresh().await.unwrap();
}

#[tokio::test]
async fn test_trigger_refresh_conflict() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/refresh"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let err = client.trigger_refresh().await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to trigger refresh: 409");
    assert_eq!(err.status(), Some(409));
}

// ── Containers ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_containers_nested_path() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/stacks/containers/apps/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "c0ffee",
            "name": "api-web-1",
            "service": "web",
            "state": "running",
            "health": "healthy",
            "image": "ghcr.io/example/api:1.2.3",
            "ports": "0.0.0.0:8080->80/tcp"
        }])))
        .mount(&server)
        .await;

    let containers = client.list_containers("apps/api").await.unwrap();
    assert_eq!(containers.len(), 1);
    assert_eq!(containers[0].service, "web");
    assert_eq!(containers[0].ports.as_deref(), Some("0.0.0.0:8080->80/tcp"));
}

#[tokio::test]
async fn test_list_containers_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/stacks/containers/nope"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client.list_containers("nope").await.unwrap_err();
    assert!(err.is_not_found());
}
