mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::{expect_status, TestApp};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::json;
use uuid::Uuid;

use bigcorp_api::auth::hash_token;
use bigcorp_api::entities::account_token::{self, TokenPurpose};

async fn seed_account_token(
    app: &TestApp,
    user_id: Uuid,
    raw: &str,
    purpose: TokenPurpose,
    expires_in: Duration,
) {
    account_token::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        token_hash: Set(hash_token(raw)),
        purpose: Set(purpose),
        expires_at: Set(Utc::now() + expires_in),
        consumed: Set(false),
        created_at: Set(Utc::now()),
    }
    .insert(&*app.state.db)
    .await
    .expect("seed account token");
}

#[tokio::test]
async fn registration_verification_and_login_round_trip() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            Some(json!({
                "username": "alice",
                "email": "alice@example.com",
                "password": "correct-horse-battery",
            })),
            None,
        )
        .await;
    let body = expect_status(response, StatusCode::CREATED).await;
    assert_eq!(body["data"]["is_active"], json!(false));
    let user_id: Uuid = body["data"]["id"].as_str().unwrap().parse().unwrap();

    // Login before verification is refused.
    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({"email": "alice@example.com", "password": "correct-horse-battery"})),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Consume a verification token.
    seed_account_token(
        &app,
        user_id,
        "verify-token-alice",
        TokenPurpose::EmailVerify,
        Duration::hours(1),
    )
    .await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/verify-email",
            Some(json!({"token": "verify-token-alice"})),
            None,
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["data"]["is_active"], json!(true));

    // Login now succeeds and the token opens protected endpoints.
    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({"email": "alice@example.com", "password": "correct-horse-battery"})),
            None,
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    let access = body["data"]["access_token"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["token_type"], json!("Bearer"));

    let response = app
        .request(Method::GET, "/api/v1/orders", None, Some(&access))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn verification_tokens_are_single_use_and_expire() {
    let app = TestApp::new().await;
    let account = app
        .create_active_user("bob", "bob@example.com", "password-bob-1")
        .await;

    // Expired token is rejected outright.
    seed_account_token(
        &app,
        account.id,
        "stale-token",
        TokenPurpose::EmailVerify,
        Duration::hours(-1),
    )
    .await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/verify-email",
            Some(json!({"token": "stale-token"})),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // A live token works exactly once.
    seed_account_token(
        &app,
        account.id,
        "fresh-token",
        TokenPurpose::EmailVerify,
        Duration::hours(1),
    )
    .await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/verify-email",
            Some(json!({"token": "fresh-token"})),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/verify-email",
            Some(json!({"token": "fresh-token"})),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = TestApp::new().await;

    let payload = json!({
        "username": "carol",
        "email": "carol@example.com",
        "password": "password-carol-1",
    });
    let response = app
        .request(Method::POST, "/api/v1/auth/register", Some(payload.clone()), None)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .request(Method::POST, "/api/v1/auth/register", Some(payload), None)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn refresh_rotates_and_revokes_the_presented_token() {
    let app = TestApp::new().await;
    app.create_active_user("dave", "dave@example.com", "password-dave-1")
        .await;

    let pair = app
        .state
        .services
        .accounts
        .login("dave@example.com", "password-dave-1")
        .await
        .unwrap();

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/refresh",
            Some(json!({"refresh_token": pair.refresh_token})),
            None,
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    let rotated = body["data"]["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(rotated, pair.refresh_token);

    // The old refresh token is dead after rotation.
    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/refresh",
            Some(json!({"refresh_token": pair.refresh_token})),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The rotated one still works.
    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/refresh",
            Some(json!({"refresh_token": rotated})),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn password_reset_flow_changes_credentials_and_revokes_sessions() {
    let app = TestApp::new().await;
    let account = app
        .create_active_user("erin", "erin@example.com", "old-password-erin")
        .await;

    // Requesting a reset never discloses whether the address exists.
    for email in ["erin@example.com", "nobody@example.com"] {
        let response = app
            .request(
                Method::POST,
                "/api/v1/auth/password-reset",
                Some(json!({"email": email})),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let pair_before = app
        .state
        .services
        .accounts
        .login("erin@example.com", "old-password-erin")
        .await
        .unwrap();

    seed_account_token(
        &app,
        account.id,
        "reset-token-erin",
        TokenPurpose::PasswordReset,
        Duration::hours(1),
    )
    .await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/password-reset/confirm",
            Some(json!({"token": "reset-token-erin", "new_password": "new-password-erin"})),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Old password is out, new one is in.
    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({"email": "erin@example.com", "password": "old-password-erin"})),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({"email": "erin@example.com", "password": "new-password-erin"})),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Refresh tokens issued before the reset are revoked.
    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/refresh",
            Some(json!({"refresh_token": pair_before.refresh_token})),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_endpoints_require_a_valid_bearer() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/orders", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(Method::GET, "/api/v1/orders", None, Some("not-a-jwt"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
