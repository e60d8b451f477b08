//! Integration tests for the user routes.

mod common;

use axum::http::StatusCode;
use authstream_core::container::ContainerRepository;
use authstream_core::notify::CheckpointRequest;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_get_user_returns_record() {
    // Arrange
    let app = common::TestApp::new();
    let (_, claims) = app.sign_in("get@shop.com").await;

    // Act
    let (status, json) = common::send(
        app.router(),
        common::get(&format!("/api/v1/users/{}", claims.sub), None),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], claims.sub);
    assert_eq!(json["email"], "get@shop.com");
    assert_eq!(json["normalizedEmail"], "GET@SHOP.COM");
    assert_eq!(json["atSequence"], 0);
}

#[tokio::test]
async fn test_get_unknown_user_returns_404() {
    let app = common::TestApp::new();

    let (status, json) = common::send(
        app.router(),
        common::get(&format!("/api/v1/users/{}", Uuid::new_v4()), None),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "aggregate_not_found");
}

#[tokio::test]
async fn test_find_user_by_email_matches_any_case() {
    let app = common::TestApp::new();
    let (_, claims) = app.sign_in("Find@Shop.com").await;

    let (status, json) = common::send(
        app.router(),
        common::get("/api/v1/users?email=find%40shop.com", None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], claims.sub);
    assert_eq!(json["normalizedEmail"], "FIND@SHOP.COM");
}

#[tokio::test]
async fn test_find_unknown_email_returns_404() {
    let app = common::TestApp::new();

    let (status, json) = common::send(
        app.router(),
        common::get("/api/v1/users?email=ghost%40shop.com", None),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_logout_with_own_token_records_logout() {
    // Arrange
    let app = common::TestApp::new();
    let (token, claims) = app.sign_in("out@shop.com").await;

    // Act
    let (status, json) = common::send(
        app.router(),
        common::post_json(
            &format!("/api/v1/users/{}/logout", claims.sub),
            &json!({}),
            Some(&token),
        ),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["atSequence"], 1);
    assert_eq!(json["updatedBy"], "out@shop.com");
    assert!(json["lastLogout"].is_string());
}

#[tokio::test]
async fn test_logout_with_another_users_token_returns_401() {
    let app = common::TestApp::new();
    let (_, victim) = app.sign_in("victim@shop.com").await;
    let (token, _) = app.sign_in("other@shop.com").await;

    let (status, _) = common::send(
        app.router(),
        common::post_json(
            &format!("/api/v1/users/{}/logout", victim.sub),
            &json!({}),
            Some(&token),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let stream = app.events.stream(&format!("User-{}", victim.sub));
    assert_eq!(stream.len(), 1);
}

#[tokio::test]
async fn test_refresh_checkpoint_projects_view() {
    // Arrange
    let app = common::TestApp::new();
    let (_, claims) = app.sign_in("view@shop.com").await;
    let user_id: Uuid = claims.sub.parse().unwrap();

    // Act
    let (status, json) = common::send(
        app.router(),
        common::post_json(
            &format!("/api/v1/users/{user_id}/checkpoint"),
            &json!({}),
            None,
        ),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["atSequence"], 0);
    let view = app.views.get_by_id(user_id).await.unwrap().unwrap();
    assert_eq!(view.normalized_email, "VIEW@SHOP.COM");
}

#[tokio::test]
async fn test_rebuild_is_queued() {
    let app = common::TestApp::new();

    let (status, json) = common::send(
        app.router(),
        common::post_json("/api/v1/users/rebuild", &json!({}), None),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["status"], "queued");
    assert_eq!(
        app.notifier.sent(),
        vec![CheckpointRequest::Rebuild {
            stream_type: "User".to_owned(),
        }]
    );
}
