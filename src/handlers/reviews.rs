use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    entities::review,
    errors::ServiceError,
    handlers::common::{total_pages, validate_input},
    services::reviews::CreateReviewInput,
    ApiResponse, AppState, ListQuery, PaginatedResponse,
};

pub fn reviews_routes() -> Router<AppState> {
    Router::new().route("/", post(create_review))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateReviewRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub created_by: Uuid,
    pub rating: i16,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<review::Model> for ReviewResponse {
    fn from(model: review::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            created_by: model.created_by,
            rating: model.rating,
            content: model.content,
            created_at: model.created_at,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/reviews",
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created", body = ApiResponse<ReviewResponse>),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Reviews"
)]
pub async fn create_review(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ReviewResponse>>), ServiceError> {
    validate_input(&payload)?;

    let review = state
        .services
        .reviews
        .create_review(CreateReviewInput {
            product_id: payload.product_id,
            created_by: user.user_id,
            rating: payload.rating,
            content: payload.content,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(review.into())),
    ))
}

/// Reviews for one product, newest first. Routed under `/products/{id}/reviews`.
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}/reviews",
    responses(
        (status = 200, description = "Product reviews", body = ApiResponse<PaginatedResponse<ReviewResponse>>)
    ),
    tag = "Reviews"
)]
pub async fn list_product_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<ReviewResponse>>>, ServiceError> {
    let page = query.page_number();
    let per_page = query.page_size(state.config.page_size);
    let (reviews, total) = state
        .services
        .reviews
        .list_for_product(product_id, page, per_page)
        .await?;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items: reviews.into_iter().map(ReviewResponse::from).collect(),
        total,
        page,
        limit: per_page,
        total_pages: total_pages(total, per_page),
    })))
}
