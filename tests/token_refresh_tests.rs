// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tests for the single-flight token refresher.

use futures_util::future::join_all;
use rh_session::AuthError;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{any, body_json, header};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{flaky_session, refresh_endpoint, seeded_session};

#[tokio::test]
async fn test_concurrent_refreshes_share_one_request() {
    let server = MockServer::start().await;
    refresh_endpoint()
        .and(body_json(json!({ "refresh_token": "r1" })))
        .and(header("apikey", "test_anon_key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "new", "refresh_token": "r2" }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (session, _) = seeded_session(&server.uri(), "old", Some("r1")).await;
    let refresher = session.refresher().clone();

    let results = join_all((0..5).map(|_| {
        let refresher = refresher.clone();
        async move { refresher.refresh().await }
    }))
    .await;

    let first = results[0].clone().expect("refresh should succeed");
    assert_eq!(first.access_token, "new");
    assert_eq!(first.refresh_token.as_deref(), Some("r2"));
    for result in &results {
        assert_eq!(result, &results[0], "All waiters should see the same outcome");
    }
    assert!(!refresher.is_refreshing());
}

#[tokio::test]
async fn test_spawned_callers_share_one_request() {
    let server = MockServer::start().await;
    refresh_endpoint()
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "new", "refresh_token": "r2" }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (session, _) = seeded_session(&server.uri(), "old", Some("r1")).await;

    let mut handles = vec![];
    for _ in 0..4 {
        let session = session.clone();
        handles.push(tokio::spawn(async move { session.refresh().await }));
    }

    for handle in handles {
        let credential = handle
            .await
            .expect("Task join failed")
            .expect("refresh should succeed");
        assert_eq!(credential.access_token, "new");
    }
}

#[tokio::test]
async fn test_new_token_readable_when_refresh_resolves() {
    let server = MockServer::start().await;
    refresh_endpoint()
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new",
            "refresh_token": "r2",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (session, _) = seeded_session(&server.uri(), "old", Some("r1")).await;

    session.refresh().await.expect("refresh should succeed");

    assert_eq!(session.store().read_access_token().await.as_deref(), Some("new"));
    assert_eq!(session.store().read_refresh_token().await.as_deref(), Some("r2"));
    let credential = session.store().read_credential().await.unwrap();
    assert_eq!(credential.token_type, "bearer");
    assert!(credential.expires_at.is_some());
}

#[tokio::test]
async fn test_refresh_rejected_clears_store() {
    let server = MockServer::start().await;
    refresh_endpoint()
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "error": "refresh token revoked" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (session, storage) = seeded_session(&server.uri(), "old", Some("r1")).await;

    assert_eq!(session.refresh().await, Err(AuthError::SessionExpired));
    assert_eq!(session.store().read_access_token().await, None);
    assert_eq!(session.store().read_refresh_token().await, None);
    assert!(storage.is_empty());
    assert!(!session.is_authenticated().await);
}

#[tokio::test]
async fn test_server_error_preserves_store() {
    let server = MockServer::start().await;
    refresh_endpoint()
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .expect(1)
        .mount(&server)
        .await;

    let (session, _) = seeded_session(&server.uri(), "old", Some("r1")).await;

    let result = session.refresh().await;
    assert!(matches!(result, Err(AuthError::RefreshFailed(_))));
    assert_eq!(session.store().read_access_token().await.as_deref(), Some("old"));
    assert_eq!(session.store().read_refresh_token().await.as_deref(), Some("r1"));
}

#[tokio::test]
async fn test_timeout_preserves_store() {
    let server = MockServer::start().await;
    refresh_endpoint()
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "late" }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let (session, _) = seeded_session(&server.uri(), "old", Some("r1")).await;

    let result = session.refresh().await;
    assert!(matches!(result, Err(AuthError::RefreshFailed(_))));
    assert!(result.unwrap_err().is_transient());
    assert_eq!(session.store().read_access_token().await.as_deref(), Some("old"));
}

#[tokio::test]
async fn test_missing_refresh_token_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (session, _) = seeded_session(&server.uri(), "old", None).await;

    let results = join_all((0..3).map(|_| session.refresh())).await;
    for result in results {
        assert_eq!(result, Err(AuthError::NoRefreshToken));
    }
    assert_eq!(session.store().read_access_token().await.as_deref(), Some("old"));
}

#[tokio::test]
async fn test_refresh_without_rotation_keeps_refresh_token() {
    let server = MockServer::start().await;
    refresh_endpoint()
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "new" })))
        .expect(1)
        .mount(&server)
        .await;

    let (session, _) = seeded_session(&server.uri(), "old", Some("r1")).await;

    let credential = session.refresh().await.expect("refresh should succeed");
    assert_eq!(credential.refresh_token.as_deref(), Some("r1"));
    assert_eq!(session.store().read_refresh_token().await.as_deref(), Some("r1"));
}

#[tokio::test]
async fn test_sequential_refreshes_each_hit_endpoint() {
    let server = MockServer::start().await;
    refresh_endpoint()
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "new", "refresh_token": "r2" })),
        )
        .expect(2)
        .mount(&server)
        .await;

    let (session, _) = seeded_session(&server.uri(), "old", Some("r1")).await;

    session.refresh().await.expect("first refresh");
    session.refresh().await.expect("second refresh");
}

#[tokio::test]
async fn test_empty_access_token_in_response_is_refresh_failure() {
    let server = MockServer::start().await;
    refresh_endpoint()
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "" })))
        .expect(1)
        .mount(&server)
        .await;

    let (session, _) = seeded_session(&server.uri(), "old", Some("r1")).await;

    let result = session.refresh().await;
    assert!(matches!(result, Err(AuthError::RefreshFailed(_))), "{:?}", result);
    assert_eq!(session.store().read_access_token().await.as_deref(), Some("old"));
    assert_eq!(session.store().read_refresh_token().await.as_deref(), Some("r1"));
}

#[tokio::test]
async fn test_storage_failure_while_saving_is_refresh_failure() {
    let server = MockServer::start().await;
    refresh_endpoint()
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new",
            "refresh_token": "r2",
            "user": { "id": "u-42" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (session, storage) = flaky_session(&server.uri(), "old", Some("r1")).await;
    // Token and refresh token are written, then the profile write fails.
    *storage.fail_key.lock().unwrap() = Some("-user".to_string());

    let result = session.refresh().await;
    assert!(matches!(result, Err(AuthError::RefreshFailed(_))), "{:?}", result);

    // The partial write was rolled back by clearing the session.
    assert!(storage.inner().is_empty());
    assert!(!session.is_authenticated().await);
}
