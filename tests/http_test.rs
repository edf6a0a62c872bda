//! Contract tests for the JSON notification endpoints.
//!
//! Every test runs against both the in-memory and the SQLite-backed store.

mod common;

use axum::body::to_bytes;
use axum::http::StatusCode;
use axum::response::Response;
use common::{request, TestApp};
use serde_json::Value;
use tidings::service::BroadcasterConfig;
use tidings::{Notification, StoreConfig};
use tower::ServiceExt;

fn apps() -> Vec<TestApp> {
    vec![
        TestApp::in_memory(StoreConfig::default(), BroadcasterConfig::default()),
        TestApp::sqlite(StoreConfig::default(), BroadcasterConfig::default()),
    ]
}

async fn call(app: &TestApp, method: &str, uri: &str, user: Option<&str>) -> Response {
    app.router
        .clone()
        .oneshot(request(method, uri, user))
        .await
        .expect("request failed")
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    serde_json::from_slice(&bytes).expect("body is not JSON")
}

#[tokio::test]
async fn test_requests_without_identity_are_rejected() {
    for app in apps() {
        for (method, uri) in [
            ("GET", "/notifications"),
            ("GET", "/notifications/unread"),
            ("GET", "/notifications/unread/count"),
            ("POST", "/notifications/some-id/read"),
            ("POST", "/notifications/read-all"),
        ] {
            let response = call(&app, method, uri, None).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert_eq!(json_body(response).await["code"], "unauthorized");
        }
    }
}

#[tokio::test]
async fn test_list_returns_entity_json() {
    for app in apps() {
        app.state
            .store
            .send(
                "alice",
                Notification::info("Hi", "Welcome back").with_action("/admin", "Open"),
            )
            .await;

        let response = call(&app, "GET", "/notifications", Some("alice")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let items = body.as_array().expect("array");
        assert_eq!(items.len(), 1);

        let item = &items[0];
        assert_eq!(item["title"], "Hi");
        assert_eq!(item["body"], "Welcome back");
        assert_eq!(item["level"], "info");
        assert_eq!(item["read"], false);
        assert_eq!(item["user_id"], "alice");
        assert_eq!(item["action_url"], "/admin");
        assert_eq!(item["action_label"], "Open");
        assert!(item["id"].as_str().is_some_and(|id| !id.is_empty()));
        assert!(item["created_at"].as_i64().is_some_and(|ts| ts > 0));
    }
}

#[tokio::test]
async fn test_lists_are_scoped_to_caller() {
    for app in apps() {
        app.state
            .store
            .send("alice", Notification::info("for alice", ""))
            .await;

        let body = json_body(call(&app, "GET", "/notifications", Some("bob")).await).await;
        assert_eq!(body, serde_json::json!([]));
    }
}

#[tokio::test]
async fn test_mark_read_flow() {
    for app in apps() {
        let store = &app.state.store;
        let first = store.send("carol", Notification::info("one", "")).await;
        store.send("carol", Notification::warning("two", "")).await;

        let count = json_body(call(&app, "GET", "/notifications/unread/count", Some("carol")).await).await;
        assert_eq!(count["count"], 2);

        let uri = format!("/notifications/{}/read", first.id);
        let response = call(&app, "POST", &uri, Some("carol")).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let unread = json_body(call(&app, "GET", "/notifications/unread", Some("carol")).await).await;
        let unread = unread.as_array().expect("array");
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0]["title"], "two");

        let response = call(&app, "POST", "/notifications/read-all", Some("carol")).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(store.unread_count("carol").await, 0);

        // All history is still listed, now read.
        let all = json_body(call(&app, "GET", "/notifications", Some("carol")).await).await;
        let all = all.as_array().expect("array");
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|n| n["read"] == true));
    }
}

#[tokio::test]
async fn test_mark_read_unknown_id_is_noop() {
    for app in apps() {
        app.state
            .store
            .send("dave", Notification::info("one", ""))
            .await;

        let response = call(&app, "POST", "/notifications/missing/read", Some("dave")).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(app.state.store.unread_count("dave").await, 1);
    }
}

#[tokio::test]
async fn test_cannot_mark_another_users_notification() {
    for app in apps() {
        let sent = app
            .state
            .store
            .send("erin", Notification::danger("private", ""))
            .await;

        let uri = format!("/notifications/{}/read", sent.id);
        call(&app, "POST", &uri, Some("mallory")).await;
        assert_eq!(app.state.store.unread_count("erin").await, 1);
    }
}

#[tokio::test]
async fn test_history_cap_applies_to_listing() {
    let config = StoreConfig {
        max_per_user: 2,
        ..StoreConfig::default()
    };
    for app in [
        TestApp::in_memory(config, BroadcasterConfig::default()),
        TestApp::sqlite(config, BroadcasterConfig::default()),
    ] {
        for title in ["a", "b", "c"] {
            app.state
                .store
                .send("frank", Notification::info(title, ""))
                .await;
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let body = json_body(call(&app, "GET", "/notifications", Some("frank")).await).await;
        let titles: Vec<_> = body
            .as_array()
            .expect("array")
            .iter()
            .map(|n| n["title"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(titles, vec!["c", "b"]);

        let count = json_body(call(&app, "GET", "/notifications/unread/count", Some("frank")).await).await;
        let unread = json_body(call(&app, "GET", "/notifications/unread", Some("frank")).await).await;
        assert_eq!(count["count"], 2);
        assert_eq!(unread.as_array().map(Vec::len), Some(2));
    }
}

#[tokio::test]
async fn test_probes() {
    let app = TestApp::in_memory(StoreConfig::default(), BroadcasterConfig::default());

    let response = call(&app, "GET", "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = call(&app, "GET", "/ready", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}
