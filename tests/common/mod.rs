use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::Utc;
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use bigcorp_api::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db,
    entities::{category, product, user},
    events::{self, EventSender},
    handlers::AppServices,
    AppState,
};

/// Helper harness spinning up an application state backed by a temp-file
/// SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    token: String,
    pub user_id: Uuid,
    _tmp: tempfile::TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Construct a test application after tweaking the config (e.g. webhook
    /// secrets).
    pub async fn with_config(mutate: impl FnOnce(&mut AppConfig)) -> Self {
        let tmp = tempfile::tempdir().expect("create temp dir for test database");
        let db_path = tmp.path().join("bigcorp_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "test_secret_key_for_testing_purposes_only".to_string(),
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        mutate(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth_service = Arc::new(AuthService::new(AuthConfig::from_app_config(&cfg)));
        let services = AppServices::new(
            db_arc.clone(),
            event_sender.clone(),
            auth_service.clone(),
            &cfg,
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            auth: auth_service,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", bigcorp_api::api_v1_routes())
            .with_state(state.clone());

        let mut app = Self {
            router,
            state,
            token: String::new(),
            user_id: Uuid::nil(),
            _tmp: tmp,
            _event_task: event_task,
        };

        // Default verified account, logged in through the real flow.
        let account = app
            .create_active_user("testuser", "test@example.com", "test-password-123")
            .await;
        let pair = app
            .state
            .services
            .accounts
            .login("test@example.com", "test-password-123")
            .await
            .expect("login default test user");
        app.user_id = account.id;
        app.token = pair.access_token;

        app
    }

    /// Access the bearer token for the default verified user.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Insert an already-verified user directly, bypassing the email flow.
    pub async fn create_active_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> user::Model {
        let hash = self
            .state
            .auth
            .hash_password(password)
            .expect("hash test password");
        let now = Utc::now();
        user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username.to_string()),
            email: Set(email.to_string()),
            password_hash: Set(hash),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("insert test user")
    }

    pub async fn seed_category(&self, name: &str) -> category::Model {
        self.state
            .services
            .catalog
            .create_category(bigcorp_api::services::catalog::CreateCategoryInput {
                name: name.to_string(),
                parent_id: None,
                slug: None,
            })
            .await
            .expect("seed category")
    }

    pub async fn seed_product(
        &self,
        category_id: Uuid,
        title: &str,
        price: Decimal,
        discount: i32,
    ) -> product::Model {
        self.state
            .services
            .catalog
            .create_product(bigcorp_api::services::catalog::CreateProductInput {
                category_id,
                title: title.to_string(),
                brand: "Acme".to_string(),
                description: format!("{title} seeded for integration tests"),
                slug: None,
                price,
                image: None,
                discount,
            })
            .await
            .expect("seed product")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Convenience helper for authenticated JSON requests.
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        self.request(method, uri, body, Some(self.token())).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Vec<u8>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        builder = builder.header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let request = builder
            .body(Body::from(body))
            .expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect response body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("response body should be valid json")
}

/// Assert status and return the parsed body.
pub async fn expect_status(response: Response, status: StatusCode) -> Value {
    assert_eq!(response.status(), status, "unexpected response status");
    body_json(response).await
}

/// Parse a money field. Decimals serialize as strings, but their scale can
/// change across storage round-trips ("2.5" vs "2.50"), so tests compare
/// values, not strings.
#[allow(dead_code)]
pub fn money(value: &Value) -> rust_decimal::Decimal {
    value
        .as_str()
        .expect("decimal fields serialize as strings")
        .parse()
        .expect("valid decimal")
}

#[allow(dead_code)]
pub fn checkout_body(items: &[(Uuid, i32)], discount: Option<i32>) -> Value {
    json!({
        "items": items
            .iter()
            .map(|(product_id, quantity)| json!({
                "product_id": product_id,
                "quantity": quantity,
            }))
            .collect::<Vec<_>>(),
        "discount": discount,
    })
}
