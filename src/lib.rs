//! BigCorp Commerce API Library
//!
//! This crate provides the core functionality for the BigCorp storefront API
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;

use std::sync::Arc;

use axum::{extract::FromRef, routing::get, Router};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use auth::AuthService;
use handlers::AppServices;

/// Hard ceiling for caller-supplied page sizes.
const MAX_PAGE_SIZE: u64 = 100;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub auth: Arc<AuthService>,
    pub services: AppServices,
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

// Common query parameters for list endpoints
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl ListQuery {
    pub fn page_number(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Requested page size, defaulting to the configured fixed size.
    pub fn page_size(&self, default: u64) -> u64 {
        self.limit.unwrap_or(default).clamp(1, MAX_PAGE_SIZE)
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<axum::Json<ApiResponse<T>>, errors::ServiceError>;

/// All v1 routes. Mount under `/api/v1`.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/products", handlers::products::products_routes())
        .nest("/categories", handlers::categories::categories_routes())
        .nest("/reviews", handlers::reviews::reviews_routes())
        .nest("/orders", handlers::orders::orders_routes())
        .nest("/auth", handlers::auth::auth_routes())
        .nest("/webhooks", handlers::payment_webhooks::webhook_routes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_defaults_and_clamps() {
        let q = ListQuery {
            page: None,
            limit: None,
        };
        assert_eq!(q.page_number(), 1);
        assert_eq!(q.page_size(15), 15);

        let q = ListQuery {
            page: Some(0),
            limit: Some(10_000),
        };
        assert_eq!(q.page_number(), 1);
        assert_eq!(q.page_size(15), MAX_PAGE_SIZE);
    }

    #[test]
    fn api_response_wrappers() {
        let ok = ApiResponse::success(42);
        assert!(ok.success);
        assert_eq!(ok.data, Some(42));

        let err = ApiResponse::<()>::error("nope".into());
        assert!(!err.success);
        assert_eq!(err.message.as_deref(), Some("nope"));
    }
}
