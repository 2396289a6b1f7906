mod common;

use axum::http::{Method, StatusCode};
use common::{checkout_body, expect_status, money, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn checkout_totals_follow_the_documented_scenario() {
    let app = TestApp::new().await;
    let category = app.seed_category("Checkout").await;
    let tea = app.seed_product(category.id, "Tea", dec!(10.00), 0).await;
    let jam = app.seed_product(category.id, "Jam", dec!(5.00), 0).await;

    // Two items (10.00 x 2, 5.00 x 1) with a 10 percent order discount.
    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/orders/checkout",
            Some(checkout_body(&[(tea.id, 2), (jam.id, 1)], Some(10))),
        )
        .await;
    let body = expect_status(response, StatusCode::CREATED).await;

    let totals = &body["data"]["totals"];
    assert_eq!(money(&totals["total_before_discount"]), dec!(25.00));
    assert_eq!(money(&totals["discount_amount"]), dec!(2.50));
    assert_eq!(money(&totals["total_cost"]), dec!(22.50));
    assert_eq!(money(&body["data"]["amount"]), dec!(22.50));
    assert_eq!(body["data"]["paid"], json!(false));
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn non_positive_quantities_are_rejected() {
    let app = TestApp::new().await;
    let category = app.seed_category("Qty").await;
    let product = app.seed_product(category.id, "Thing", dec!(1.00), 0).await;

    for quantity in [0, -3] {
        let response = app
            .request_authenticated(
                Method::POST,
                "/api/v1/orders/checkout",
                Some(checkout_body(&[(product.id, quantity)], None)),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // Nothing was persisted by the failed attempts.
    let response = app
        .request_authenticated(Method::GET, "/api/v1/orders", None)
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["data"]["total"], json!(0));
}

#[tokio::test]
async fn checkout_rejects_hidden_and_unknown_products_atomically() {
    let app = TestApp::new().await;
    let category = app.seed_category("Atomic").await;
    let good = app.seed_product(category.id, "Good", dec!(2.00), 0).await;
    let hidden = app.seed_product(category.id, "Gone", dec!(2.00), 0).await;
    app.state
        .services
        .catalog
        .hide_product(hidden.id)
        .await
        .unwrap();

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/orders/checkout",
            Some(checkout_body(&[(good.id, 1), (hidden.id, 1)], None)),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The valid line did not survive on its own.
    let response = app
        .request_authenticated(Method::GET, "/api/v1/orders", None)
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["data"]["total"], json!(0));
}

#[tokio::test]
async fn captured_price_is_stable_against_later_price_changes() {
    let app = TestApp::new().await;
    let category = app.seed_category("Snapshot").await;
    // 20% off 50.00 -> captured price 40
    let product = app
        .seed_product(category.id, "Volatile", dec!(50.00), 20)
        .await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/orders/checkout",
            Some(checkout_body(&[(product.id, 1)], None)),
        )
        .await;
    let body = expect_status(response, StatusCode::CREATED).await;
    let order_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(money(&body["data"]["items"][0]["price"]), dec!(40));

    // Reprice the product afterwards.
    app.state
        .services
        .catalog
        .update_product(
            product.id,
            bigcorp_api::services::catalog::UpdateProductInput {
                price: Some(dec!(999.00)),
                discount: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // The historical order still shows the captured price.
    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/orders/{order_id}"), None)
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(money(&body["data"]["items"][0]["price"]), dec!(40));
    assert_eq!(money(&body["data"]["totals"]["total_cost"]), dec!(40));
}

#[tokio::test]
async fn orders_are_visible_only_to_their_owner() {
    let app = TestApp::new().await;
    let category = app.seed_category("Private").await;
    let product = app.seed_product(category.id, "Secret", dec!(3.00), 0).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/orders/checkout",
            Some(checkout_body(&[(product.id, 1)], None)),
        )
        .await;
    let body = expect_status(response, StatusCode::CREATED).await;
    let order_id = body["data"]["id"].as_str().unwrap().to_string();

    // A different verified user cannot see the order.
    app.create_active_user("rival", "rival@example.com", "rival-password-1")
        .await;
    let rival_pair = app
        .state
        .services
        .accounts
        .login("rival@example.com", "rival-password-1")
        .await
        .unwrap();

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{order_id}"),
            None,
            Some(&rival_pair.access_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The owner still can.
    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/orders/{order_id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn checkout_without_address_synthesizes_the_sentinel() {
    let app = TestApp::new().await;
    let category = app.seed_category("Addressless").await;
    let product = app.seed_product(category.id, "Parcel", dec!(7.00), 0).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/orders/checkout",
            Some(checkout_body(&[(product.id, 1)], None)),
        )
        .await;
    let body = expect_status(response, StatusCode::CREATED).await;
    assert!(body["data"]["shipping_address_id"].is_string());

    let address = app
        .state
        .services
        .shipping
        .get_for_user(app.user_id)
        .await
        .unwrap()
        .expect("sentinel address should have been persisted");
    assert_eq!(address.full_name, "No name");
    assert_eq!(address.street_address, "Fill Address");
    assert_eq!(address.email, "example@mail.com");
}

#[tokio::test]
async fn upserted_address_replaces_the_sentinel_data() {
    let app = TestApp::new().await;
    let shipping = &app.state.services.shipping;

    let sentinel = shipping.default_for_user(app.user_id).await.unwrap();
    assert_eq!(sentinel.full_name, "No name");

    let updated = shipping
        .upsert_address(
            app.user_id,
            bigcorp_api::services::shipping::AddressInput {
                full_name: "Ada Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                street_address: "12 Analytical Way".to_string(),
                apartment_address: "Engine 1".to_string(),
                country: Some("UK".to_string()),
                zip_code: Some("N1 9GU".to_string()),
                city: Some("London".to_string()),
            },
        )
        .await
        .unwrap();

    // Same row, new content.
    assert_eq!(updated.id, sentinel.id);
    assert_eq!(updated.full_name, "Ada Lovelace");

    let roundtrip = shipping.get_for_user(app.user_id).await.unwrap().unwrap();
    assert_eq!(roundtrip.city.as_deref(), Some("London"));
}

#[tokio::test]
async fn aggregates_handle_the_empty_store() {
    let app = TestApp::new().await;
    let orders = &app.state.services.orders;
    let category = app.seed_category("Empty").await;
    let unsold = app.seed_product(category.id, "Unsold", dec!(9.99), 0).await;

    // No order items at all: sum is zero, average is absent.
    assert_eq!(orders.total_quantity_for_product(unsold.id).await.unwrap(), 0);
    assert_eq!(orders.average_order_item_price().await.unwrap(), None);
}

#[tokio::test]
async fn aggregates_sum_and_average_across_orders() {
    let app = TestApp::new().await;
    let orders = &app.state.services.orders;
    let category = app.seed_category("Sold").await;
    let tea = app.seed_product(category.id, "Tea", dec!(10.00), 0).await;
    let jam = app.seed_product(category.id, "Jam", dec!(5.00), 0).await;

    for _ in 0..2 {
        app.request_authenticated(
            Method::POST,
            "/api/v1/orders/checkout",
            Some(checkout_body(&[(tea.id, 2), (jam.id, 1)], None)),
        )
        .await;
    }

    assert_eq!(orders.total_quantity_for_product(tea.id).await.unwrap(), 4);
    assert_eq!(orders.total_quantity_for_product(jam.id).await.unwrap(), 2);

    // Captured prices are 10 and 5 across four rows: mean 7.5.
    let average = orders
        .average_order_item_price()
        .await
        .unwrap()
        .expect("average exists once items do");
    assert_eq!(average.round_dp(2), dec!(7.50));
}

#[tokio::test]
async fn order_listing_is_paginated_newest_first() {
    let app = TestApp::new().await;
    let category = app.seed_category("History").await;
    let product = app.seed_product(category.id, "Repeat", dec!(1.00), 0).await;

    for _ in 0..3 {
        app.request_authenticated(
            Method::POST,
            "/api/v1/orders/checkout",
            Some(checkout_body(&[(product.id, 1)], None)),
        )
        .await;
    }

    let response = app
        .request_authenticated(Method::GET, "/api/v1/orders?limit=2", None)
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["data"]["total"], json!(3));
    assert_eq!(body["data"]["total_pages"], json!(2));
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn order_amount_equals_total_cost_with_discount() {
    let app = TestApp::new().await;
    let category = app.seed_category("Amount").await;
    let product = app
        .seed_product(category.id, "Pricey", dec!(100.00), 0)
        .await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/orders/checkout",
            Some(checkout_body(&[(product.id, 1)], Some(100))),
        )
        .await;
    let body = expect_status(response, StatusCode::CREATED).await;

    // A full discount yields a zero-amount order, never a negative one.
    let amount = money(&body["data"]["amount"]);
    assert_eq!(amount, Decimal::ZERO);
}
