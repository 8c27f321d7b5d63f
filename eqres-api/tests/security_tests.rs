//! Security-related behavior: login throttling, registration switch,
//! session expiry and the SSE query-token fallback

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::Duration;
use common::{TestApp, USER_PASSWORD};
use eqres_api::db::{sessions, users};
use serde_json::json;
use tower::util::ServiceExt;

#[tokio::test]
async fn test_login_rate_limited_per_username() {
    let app = TestApp::with_login_limit(3).await;

    for _ in 0..3 {
        let (status, _) = app
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"username": "alice", "password": "wrong-password"})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // correct password no longer helps once the bucket is empty
    let (status, body) = app
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"username": "Alice", "password": USER_PASSWORD})),
        )
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMITED");

    // other accounts are unaffected
    app.admin_token().await;
}

#[tokio::test]
async fn test_rate_limited_response_has_retry_after() {
    let app = TestApp::with_login_limit(1).await;
    app.user_token().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"username": "alice", "password": USER_PASSWORD}).to_string(),
        ))
        .unwrap();
    let response = app.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1);
}

#[tokio::test]
async fn test_registration_can_be_disabled() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let (status, _) = app
        .send(
            "PUT",
            "/api/admin/settings/allow_self_registration",
            Some(&admin),
            Some(json!({"value": "false"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"username": "eve", "password": "eve-password"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_expired_session_rejected_and_purged() {
    let app = TestApp::new().await;
    let alice = users::find_credentials(&app.db, "alice")
        .await
        .unwrap()
        .unwrap()
        .user;

    let expired = sessions::create_session(&app.db, alice.id, Duration::hours(-1))
        .await
        .unwrap();

    let (status, _) = app
        .send("GET", "/api/users/me", Some(&expired.token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let live = app.user_token().await;
    assert_eq!(sessions::purge_expired(&app.db).await.unwrap(), 1);

    let (status, _) = app.send("GET", "/api/users/me", Some(&live), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_session_ends_when_user_deleted() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let user = app.user_token().await;

    let (_, me) = app.send("GET", "/api/users/me", Some(&user), None).await;
    let (status, _) = app
        .send(
            "DELETE",
            &format!("/api/admin/users/{}", me["id"].as_str().unwrap()),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.send("GET", "/api/users/me", Some(&user), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_event_stream_accepts_query_token() {
    let app = TestApp::new().await;
    let user = app.user_token().await;

    let request = Request::builder()
        .uri(format!("/api/events?token={}", user))
        .body(Body::empty())
        .unwrap();
    let response = app.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/event-stream"));

    let request = Request::builder()
        .uri("/api/events")
        .body(Body::empty())
        .unwrap();
    let response = app.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_events_published_for_reservations() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let user = app.user_token().await;
    let mut rx = app.state.events.subscribe();

    let eq = app.create_equipment(&admin, "Projector").await;
    let start = common::hours_ahead(24);
    app.reserve(&user, &eq, start, start + Duration::hours(1)).await;

    let first = rx.recv().await.unwrap();
    assert_eq!(first.event_type(), "EquipmentChanged");
    let second = rx.recv().await.unwrap();
    assert_eq!(second.event_type(), "ReservationCreated");
}
