use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "BigCorp Commerce API",
        version = "1.0.0",
        description = r#"
# BigCorp Commerce API

Storefront backend: catalog browsing, product reviews, checkout, order
history and account management.

## Authentication

Mutating endpoints require a JWT access token:

```
Authorization: Bearer <your-jwt-token>
```

Tokens are issued by `POST /api/v1/auth/login` and renewed through
`POST /api/v1/auth/refresh`.

## Pagination

List endpoints accept `page` and `limit` query parameters; the default page
size is fixed at 15.
        "#,
        contact(
            name = "BigCorp Engineering",
            email = "engineering@bigcorp.example"
        ),
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Products", description = "Catalog browsing and management"),
        (name = "Categories", description = "Category tree"),
        (name = "Reviews", description = "Product reviews"),
        (name = "Orders", description = "Checkout and order history"),
        (name = "Auth", description = "Accounts and tokens"),
        (name = "Payments", description = "Payment gateway callbacks"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Products
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::hide_product,

        // Categories
        crate::handlers::categories::list_categories,
        crate::handlers::categories::get_category,
        crate::handlers::categories::create_category,
        crate::handlers::categories::list_category_products,

        // Reviews
        crate::handlers::reviews::create_review,
        crate::handlers::reviews::list_product_reviews,

        // Orders
        crate::handlers::orders::checkout,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,

        // Auth
        crate::handlers::auth::register,
        crate::handlers::auth::verify_email,
        crate::handlers::auth::login,
        crate::handlers::auth::refresh,
        crate::handlers::auth::request_password_reset,
        crate::handlers::auth::confirm_password_reset,

        // Webhooks
        crate::handlers::payment_webhooks::payment_webhook,

        // Health
        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,
            crate::ListQuery,

            crate::handlers::products::ProductResponse,
            crate::handlers::products::CreateProductRequest,
            crate::handlers::products::UpdateProductRequest,

            crate::handlers::categories::CategoryResponse,
            crate::handlers::categories::CategoryDetailResponse,
            crate::handlers::categories::CreateCategoryRequest,

            crate::handlers::reviews::ReviewResponse,
            crate::handlers::reviews::CreateReviewRequest,

            crate::handlers::orders::OrderResponse,
            crate::handlers::orders::OrderSummaryResponse,
            crate::handlers::orders::OrderItemResponse,
            crate::handlers::orders::OrderTotalsResponse,
            crate::handlers::orders::CheckoutRequest,
            crate::handlers::orders::CheckoutItemRequest,

            crate::handlers::auth::UserResponse,
            crate::handlers::auth::RegisterRequest,
            crate::handlers::auth::LoginRequest,
            crate::auth::TokenPair,

            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/api/docs")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
