use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    entities::product,
    errors::ServiceError,
    handlers::common::{total_pages, validate_input},
    services::catalog::{CreateProductInput, UpdateProductInput},
    ApiResponse, AppState, ListQuery, PaginatedResponse,
};

pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(hide_product),
        )
        .route("/:id/reviews", get(super::reviews::list_product_reviews))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 250))]
    pub title: String,
    #[validate(length(min = 1, max = 250))]
    pub brand: String,
    #[serde(default)]
    pub description: String,
    pub category_id: Uuid,
    pub slug: Option<String>,
    pub price: Decimal,
    pub image: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0, max = 100))]
    pub discount: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 250))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 250))]
    pub brand: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub image: Option<String>,
    pub available: Option<bool>,
    #[validate(range(min = 0, max = 100))]
    pub discount: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub category_id: Uuid,
    pub title: String,
    pub brand: String,
    pub description: String,
    pub slug: String,
    pub price: Decimal,
    pub discounted_price: Decimal,
    pub image: String,
    pub available: bool,
    pub discount: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<product::Model> for ProductResponse {
    fn from(model: product::Model) -> Self {
        Self {
            discounted_price: model.discounted_price(),
            image: model.image_or_default().to_string(),
            id: model.id,
            category_id: model.category_id,
            title: model.title,
            brand: model.brand,
            description: model.description,
            slug: model.slug,
            price: model.price,
            available: model.available,
            discount: model.discount,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub category_id: Option<Uuid>,
}

/// Storefront listing: only available products, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/products",
    responses(
        (status = 200, description = "Available products", body = ApiResponse<PaginatedResponse<ProductResponse>>)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<ProductResponse>>>, ServiceError> {
    let paging = ListQuery {
        page: query.page,
        limit: query.limit,
    };
    let page = paging.page_number();
    let per_page = paging.page_size(state.config.page_size);
    let (products, total) = state
        .services
        .catalog
        .list_available_products(page, per_page, query.category_id)
        .await?;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items: products.into_iter().map(ProductResponse::from).collect(),
        total,
        page,
        limit: per_page,
        total_pages: total_pages(total, per_page),
    })))
}

/// Storefront read over the available scope.
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    responses(
        (status = 200, description = "Product detail", body = ApiResponse<ProductResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ProductResponse>>, ServiceError> {
    let product = state.services.catalog.get_available_product(id).await?;
    Ok(Json(ApiResponse::success(product.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<ProductResponse>),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn create_product(
    _user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProductResponse>>), ServiceError> {
    validate_input(&payload)?;

    let product = state
        .services
        .catalog
        .create_product(CreateProductInput {
            category_id: payload.category_id,
            title: payload.title,
            brand: payload.brand,
            description: payload.description,
            slug: payload.slug,
            price: payload.price,
            image: payload.image,
            discount: payload.discount,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(product.into())),
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<ProductResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn update_product(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<Json<ApiResponse<ProductResponse>>, ServiceError> {
    validate_input(&payload)?;

    let product = state
        .services
        .catalog
        .update_product(
            id,
            UpdateProductInput {
                title: payload.title,
                brand: payload.brand,
                description: payload.description,
                price: payload.price,
                image: payload.image,
                available: payload.available,
                discount: payload.discount,
            },
        )
        .await?;

    Ok(Json(ApiResponse::success(product.into())))
}

/// Soft-hide: the product disappears from the storefront but the row stays.
#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    responses(
        (status = 200, description = "Product hidden", body = ApiResponse<ProductResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn hide_product(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ProductResponse>>, ServiceError> {
    let product = state.services.catalog.hide_product(id).await?;
    Ok(Json(ApiResponse::success(product.into())))
}
