//! Integration tests for eqres-api routing, authentication and equipment
//! management

mod common;

use axum::http::StatusCode;
use common::{TestApp, USER_PASSWORD};
use serde_json::json;

// =============================================================================
// Public endpoints
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let app = TestApp::new().await;

    let (status, body) = app.send("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "eqres-api");
    assert_eq!(body["database"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_buildinfo_no_auth_required() {
    let app = TestApp::new().await;

    let (status, body) = app.send("GET", "/api/buildinfo", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["git_hash"].is_string());
    assert!(body["build_profile"].is_string());
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_protected_route_requires_token() {
    let app = TestApp::new().await;

    let (status, body) = app.send("GET", "/api/equipment", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_unknown_token_rejected() {
    let app = TestApp::new().await;

    let (status, _) = app
        .send("GET", "/api/users/me", Some("not-a-real-token"), None)
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_route_forbidden_for_user() {
    let app = TestApp::new().await;
    let user = app.user_token().await;

    let (status, body) = app.send("GET", "/api/admin/dashboard", Some(&user), None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_wrong_password_rejected() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"username": "alice", "password": "wrong-password"})),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Invalid username or password");
}

#[tokio::test]
async fn test_login_is_case_insensitive_on_username() {
    let app = TestApp::new().await;
    let token = app.login("ALICE", USER_PASSWORD).await;

    let (status, body) = app.send("GET", "/api/users/me", Some(&token), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["role"], "user");
}

#[tokio::test]
async fn test_logout_invalidates_token() {
    let app = TestApp::new().await;
    let token = app.user_token().await;

    let (status, _) = app.send("POST", "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.send("GET", "/api/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_then_login() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"username": "bob", "password": "bob-password", "email": "bob@lab.example"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["display_name"], "bob");
    assert_eq!(body["role"], "user");

    let (status, _) = app
        .send(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"username": "Bob", "password": "other-password"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.login("bob", "bob-password").await;
}

#[tokio::test]
async fn test_register_validates_input() {
    let app = TestApp::new().await;

    let (status, _) = app
        .send(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"username": "x", "password": "long-enough"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"username": "carol", "password": "short"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Profile
// =============================================================================

#[tokio::test]
async fn test_update_profile() {
    let app = TestApp::new().await;
    let token = app.user_token().await;

    let (status, body) = app
        .send(
            "PATCH",
            "/api/users/me",
            Some(&token),
            Some(json!({"display_name": "Alice Liddell", "email": "alice@lab.example"})),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["display_name"], "Alice Liddell");
    assert_eq!(body["email"], "alice@lab.example");
}

#[tokio::test]
async fn test_password_change_revokes_other_sessions() {
    let app = TestApp::new().await;
    let first = app.user_token().await;
    let second = app.user_token().await;

    let (status, _) = app
        .send(
            "PATCH",
            "/api/users/me",
            Some(&first),
            Some(json!({"new_password": "a-new-password", "current_password": "wrong"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            "PATCH",
            "/api/users/me",
            Some(&first),
            Some(json!({"new_password": "a-new-password", "current_password": USER_PASSWORD})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send("GET", "/api/users/me", Some(&first), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send("GET", "/api/users/me", Some(&second), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    app.login("alice", "a-new-password").await;
}

#[tokio::test]
async fn test_rejected_profile_update_keeps_password() {
    let app = TestApp::new().await;
    let token = app.user_token().await;
    let other = app.user_token().await;

    let (status, _) = app
        .send(
            "PATCH",
            "/api/users/me",
            Some(&token),
            Some(json!({
                "current_password": USER_PASSWORD,
                "new_password": "brand-new-pass",
                "email": "not-an-email",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // nothing was written: old password works, other session survives
    app.login("alice", USER_PASSWORD).await;
    let (status, _) = app
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"username": "alice", "password": "brand-new-pass"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.send("GET", "/api/users/me", Some(&other), None).await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Equipment
// =============================================================================

#[tokio::test]
async fn test_equipment_crud() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let user = app.user_token().await;

    let id = app.create_equipment(&admin, "Projector A").await;

    let (status, body) = app
        .send("GET", &format!("/api/equipment/{}", id), Some(&user), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Projector A");
    assert_eq!(body["active"], true);

    let (status, body) = app
        .send(
            "PUT",
            &format!("/api/admin/equipment/{}", id),
            Some(&admin),
            Some(json!({"name": "Projector B", "category": "AV", "description": "Ceiling mount"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Projector B");
    assert_eq!(body["location"], serde_json::Value::Null);

    let (status, _) = app
        .send("DELETE", &format!("/api/admin/equipment/{}", id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send("GET", &format!("/api/equipment/{}", id), Some(&user), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_equipment_duplicate_name_conflict() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    app.create_equipment(&admin, "Room 101").await;

    let (status, body) = app
        .send(
            "POST",
            "/api/admin/equipment",
            Some(&admin),
            Some(json!({"name": "room 101", "category": "Rooms"})),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_equipment_requires_name() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let (status, _) = app
        .send(
            "POST",
            "/api/admin/equipment",
            Some(&admin),
            Some(json!({"name": "  ", "category": "AV"})),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_retired_equipment_hidden_from_users() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let user = app.user_token().await;

    app.create_equipment(&admin, "Microscope").await;
    let retired = app.create_equipment(&admin, "Old Microscope").await;
    app.send(
        "PUT",
        &format!("/api/admin/equipment/{}", retired),
        Some(&admin),
        Some(json!({"name": "Old Microscope", "category": "AV", "active": false})),
    )
    .await;

    let (_, body) = app
        .send("GET", "/api/equipment?include_inactive=true", Some(&user), None)
        .await;
    assert_eq!(body["total_results"], 1);

    let (_, body) = app
        .send("GET", "/api/equipment?include_inactive=true", Some(&admin), None)
        .await;
    assert_eq!(body["total_results"], 2);

    let (status, _) = app
        .send("GET", &format!("/api/equipment/{}", retired), Some(&user), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_equipment_search_and_categories() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    app.create_equipment(&admin, "Projector 1").await;
    app.create_equipment(&admin, "Projector 2").await;
    app.send(
        "POST",
        "/api/admin/equipment",
        Some(&admin),
        Some(json!({"name": "Seminar Room", "category": "Rooms"})),
    )
    .await;

    let (status, body) = app
        .send("GET", "/api/equipment?q=projector", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_results"], 2);
    assert_eq!(body["page"], 1);

    let (_, body) = app
        .send("GET", "/api/equipment?category=Rooms", Some(&admin), None)
        .await;
    assert_eq!(body["items"][0]["name"], "Seminar Room");

    let (status, body) = app
        .send("GET", "/api/equipment/categories", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{"category": "AV", "count": 2}, {"category": "Rooms", "count": 1}]));
}

// =============================================================================
// Admin: users and settings
// =============================================================================

#[tokio::test]
async fn test_admin_user_management() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let (status, body) = app.send("GET", "/api/admin/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_results"], 2);

    let alice_id = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["username"] == "alice")
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();
    let admin_id = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["username"] == "admin")
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    // Last admin cannot be demoted or delete themselves
    let (status, _) = app
        .send(
            "PATCH",
            &format!("/api/admin/users/{}", admin_id),
            Some(&admin),
            Some(json!({"role": "user"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = app
        .send("DELETE", &format!("/api/admin/users/{}", admin_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .send(
            "PATCH",
            &format!("/api/admin/users/{}", alice_id),
            Some(&admin),
            Some(json!({"role": "admin"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "admin");

    let (status, _) = app
        .send("DELETE", &format!("/api/admin/users/{}", alice_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = app.send("GET", "/api/admin/users", Some(&admin), None).await;
    assert_eq!(body["total_results"], 1);
}

#[tokio::test]
async fn test_settings_update_and_validation() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let (status, body) = app.send("GET", "/api/admin/settings", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let entry = body
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["key"] == "booking_max_duration_minutes")
        .unwrap()
        .clone();
    assert_eq!(entry["value"], "480");
    assert_eq!(entry["default"], "480");

    let (status, body) = app
        .send(
            "PUT",
            "/api/admin/settings/booking_max_duration_minutes",
            Some(&admin),
            Some(json!({"value": "120"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], "120");

    let (status, _) = app
        .send(
            "PUT",
            "/api/admin/settings/booking_max_duration_minutes",
            Some(&admin),
            Some(json!({"value": "-5"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // oversized values would overflow date arithmetic
    for (key, value) in [
        ("booking_horizon_days", "100000000"),
        ("session_ttl_hours", "9223372036854775807"),
        ("booking_min_lead_minutes", "99999999999"),
    ] {
        let (status, body) = app
            .send(
                "PUT",
                &format!("/api/admin/settings/{}", key),
                Some(&admin),
                Some(json!({"value": value})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{} = {}", key, value);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }

    // minimum above maximum
    let (status, _) = app
        .send(
            "PUT",
            "/api/admin/settings/booking_min_duration_minutes",
            Some(&admin),
            Some(json!({"value": "121"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            "PUT",
            "/api/admin/settings/no_such_setting",
            Some(&admin),
            Some(json!({"value": "1"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
