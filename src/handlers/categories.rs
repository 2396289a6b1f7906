use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    entities::category,
    errors::ServiceError,
    handlers::common::{total_pages, validate_input},
    handlers::products::ProductResponse,
    services::catalog::CreateCategoryInput,
    ApiResponse, AppState, ListQuery, PaginatedResponse,
};

pub fn categories_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/:slug", get(get_category))
        .route("/:slug/products", get(list_category_products))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 250))]
    pub name: String,
    pub parent_id: Option<Uuid>,
    /// Explicit slug; synthesized when absent.
    #[validate(length(min = 1, max = 250))]
    pub slug: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<category::Model> for CategoryResponse {
    fn from(model: category::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            slug: model.slug,
            parent_id: model.parent_id,
            created_at: model.created_at,
        }
    }
}

/// Category detail including its root-to-leaf breadcrumb.
#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryDetailResponse {
    #[serde(flatten)]
    pub category: CategoryResponse,
    pub path: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/categories",
    responses(
        (status = 200, description = "All categories", body = ApiResponse<Vec<CategoryResponse>>)
    ),
    tag = "Categories"
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<CategoryResponse>>>, ServiceError> {
    let categories = state.services.catalog.list_categories().await?;
    Ok(Json(ApiResponse::success(
        categories.into_iter().map(CategoryResponse::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/{slug}",
    responses(
        (status = 200, description = "Category detail with breadcrumb", body = ApiResponse<CategoryDetailResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Categories"
)]
pub async fn get_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<CategoryDetailResponse>>, ServiceError> {
    let category = state.services.catalog.get_category_by_slug(&slug).await?;
    let path = state.services.catalog.category_path(category.id).await?;
    Ok(Json(ApiResponse::success(CategoryDetailResponse {
        category: category.into(),
        path,
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = ApiResponse<CategoryResponse>),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 409, description = "Slug conflict", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Categories"
)]
pub async fn create_category(
    _user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryResponse>>), ServiceError> {
    validate_input(&payload)?;

    let category = state
        .services
        .catalog
        .create_category(CreateCategoryInput {
            name: payload.name,
            parent_id: payload.parent_id,
            slug: payload.slug,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(category.into())),
    ))
}

/// Storefront listing of a category's available products.
#[utoipa::path(
    get,
    path = "/api/v1/categories/{slug}/products",
    responses(
        (status = 200, description = "Products in category", body = ApiResponse<PaginatedResponse<ProductResponse>>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Categories"
)]
pub async fn list_category_products(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<ProductResponse>>>, ServiceError> {
    let category = state.services.catalog.get_category_by_slug(&slug).await?;

    let page = query.page_number();
    let per_page = query.page_size(state.config.page_size);
    let (products, total) = state
        .services
        .catalog
        .list_available_products(page, per_page, Some(category.id))
        .await?;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items: products.into_iter().map(ProductResponse::from).collect(),
        total,
        page,
        limit: per_page,
        total_pages: total_pages(total, per_page),
    })))
}
