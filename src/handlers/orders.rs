use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
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
    entities::{order, order_item},
    errors::ServiceError,
    handlers::common::{total_pages, validate_input},
    services::orders::{compute_totals, CheckoutInput, CheckoutItem, OrderTotals},
    ApiResponse, AppState, ListQuery, PaginatedResponse,
};

pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/checkout", post(checkout))
        .route("/:id", get(get_order))
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CheckoutItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CheckoutRequest {
    /// Explicit address; when absent the user's stored (or sentinel) address
    /// is used.
    pub shipping_address_id: Option<Uuid>,
    /// Item quantities are re-checked by the order service.
    #[validate(length(min = 1))]
    pub items: Vec<CheckoutItemRequest>,
    #[validate(range(min = 0, max = 100))]
    pub discount: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
    pub cost: Decimal,
}

impl From<order_item::Model> for OrderItemResponse {
    fn from(model: order_item::Model) -> Self {
        Self {
            cost: model.cost(),
            id: model.id,
            product_id: model.product_id,
            quantity: model.quantity,
            price: model.price,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderTotalsResponse {
    pub total_before_discount: Decimal,
    pub discount_amount: Decimal,
    pub total_cost: Decimal,
}

impl From<OrderTotals> for OrderTotalsResponse {
    fn from(totals: OrderTotals) -> Self {
        Self {
            total_before_discount: totals.total_before_discount,
            discount_amount: totals.discount_amount,
            total_cost: totals.total_cost,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub shipping_address_id: Option<Uuid>,
    pub amount: Decimal,
    pub paid: bool,
    pub discount: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
    pub totals: OrderTotalsResponse,
}

impl OrderResponse {
    fn from_parts(order: order::Model, items: Vec<order_item::Model>) -> Self {
        let totals = compute_totals(&items, order.discount);
        Self {
            id: order.id,
            shipping_address_id: order.shipping_address_id,
            amount: order.amount,
            paid: order.paid,
            discount: order.discount,
            created_at: order.created_at,
            items: items.into_iter().map(OrderItemResponse::from).collect(),
            totals: totals.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderSummaryResponse {
    pub id: Uuid,
    pub amount: Decimal,
    pub paid: bool,
    pub discount: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl From<order::Model> for OrderSummaryResponse {
    fn from(model: order::Model) -> Self {
        Self {
            id: model.id,
            amount: model.amount,
            paid: model.paid,
            discount: model.discount,
            created_at: model.created_at,
        }
    }
}

/// Convert the caller's cart into an order plus line items.
#[utoipa::path(
    post,
    path = "/api/v1/orders/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn checkout(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), ServiceError> {
    validate_input(&payload)?;

    let shipping_address_id = match payload.shipping_address_id {
        Some(id) => Some(id),
        None => Some(
            state
                .services
                .shipping
                .default_for_user(user.user_id)
                .await?
                .id,
        ),
    };

    let (order, items) = state
        .services
        .orders
        .checkout(CheckoutInput {
            user_id: user.user_id,
            shipping_address_id,
            items: payload
                .items
                .into_iter()
                .map(|item| CheckoutItem {
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
                .collect(),
            discount: payload.discount,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(OrderResponse::from_parts(
            order, items,
        ))),
    ))
}

/// The caller's orders, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    responses(
        (status = 200, description = "Orders for the caller", body = ApiResponse<PaginatedResponse<OrderSummaryResponse>>)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<OrderSummaryResponse>>>, ServiceError> {
    let page = query.page_number();
    let per_page = query.page_size(state.config.page_size);
    let (orders, total) = state
        .services
        .orders
        .list_orders_for_user(user.user_id, page, per_page)
        .await?;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items: orders.into_iter().map(OrderSummaryResponse::from).collect(),
        total,
        page,
        limit: per_page,
        total_pages: total_pages(total, per_page),
    })))
}

/// Owner-scoped order detail with line items and derived totals.
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    responses(
        (status = 200, description = "Order detail", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let (order, items) = state
        .services
        .orders
        .get_order_for_user(id, user.user_id)
        .await?;

    Ok(Json(ApiResponse::success(OrderResponse::from_parts(
        order, items,
    ))))
}
