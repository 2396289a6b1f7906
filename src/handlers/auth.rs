use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::TokenPair,
    entities::user,
    errors::ServiceError,
    handlers::common::validate_input,
    services::accounts::RegisterInput,
    ApiResponse, AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/verify-email", post(verify_email))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/password-reset", post(request_password_reset))
        .route("/password-reset/confirm", post(confirm_password_reset))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 150))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyEmailRequest {
    #[validate(length(min = 1))]
    pub token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PasswordResetRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PasswordResetConfirmRequest {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            is_active: model.is_active,
            created_at: model.created_at,
        }
    }
}

/// Register a new account. The account stays inactive until the emailed
/// verification token is confirmed.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already registered", body = crate::errors::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ServiceError> {
    validate_input(&payload)?;

    let account = state
        .services
        .accounts
        .register(RegisterInput {
            username: payload.username,
            email: payload.email,
            password: payload.password,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(account.into())),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/verify-email",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid or expired token", body = crate::errors::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn verify_email(
    State(state): State<AppState>,
    Json(payload): Json<VerifyEmailRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ServiceError> {
    validate_input(&payload)?;
    let account = state.services.accounts.verify_email(&payload.token).await?;
    Ok(Json(ApiResponse::success(account.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair", body = ApiResponse<TokenPair>),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<TokenPair>>, ServiceError> {
    validate_input(&payload)?;
    let pair = state
        .services
        .accounts
        .login(&payload.email, &payload.password)
        .await?;
    Ok(Json(ApiResponse::success(pair)))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Rotated token pair", body = ApiResponse<TokenPair>),
        (status = 401, description = "Invalid refresh token", body = crate::errors::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<TokenPair>>, ServiceError> {
    validate_input(&payload)?;
    let pair = state
        .services
        .accounts
        .refresh(&payload.refresh_token)
        .await?;
    Ok(Json(ApiResponse::success(pair)))
}

/// Always responds 200 so callers cannot probe which emails have accounts.
#[utoipa::path(
    post,
    path = "/api/v1/auth/password-reset",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Reset requested", body = ApiResponse<serde_json::Value>)
    ),
    tag = "Auth"
)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ServiceError> {
    validate_input(&payload)?;
    state
        .services
        .accounts
        .request_password_reset(&payload.email)
        .await?;
    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "If the address is registered, a reset email has been sent"
    }))))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/password-reset/confirm",
    request_body = PasswordResetConfirmRequest,
    responses(
        (status = 200, description = "Password changed", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid or expired token", body = crate::errors::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetConfirmRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ServiceError> {
    validate_input(&payload)?;
    state
        .services
        .accounts
        .confirm_password_reset(&payload.token, &payload.new_password)
        .await?;
    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Password has been reset"
    }))))
}
