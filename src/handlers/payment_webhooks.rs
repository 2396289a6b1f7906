use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use bytes::Bytes;

use crate::{errors::ServiceError, AppState};

pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/payments/:provider", post(payment_webhook))
}

/// Payment gateway callback. Not bearer-authenticated; the request is
/// trusted only after its signature verifies against the provider's
/// configured webhook secret.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/payments/{provider}",
    request_body = String,
    responses(
        (status = 200, description = "Webhook accepted"),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown provider", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), ServiceError> {
    state
        .services
        .payments
        .handle_webhook(&provider, &headers, &body)
        .await?;

    Ok((StatusCode::OK, "ok"))
}
