//! Property-based tests for the pricing and slug helpers.
//!
//! These use proptest to verify the arithmetic identities across a wide
//! range of inputs rather than a handful of fixtures.

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use bigcorp_api::entities::{order_item, product};
use bigcorp_api::services::catalog::slugify;
use bigcorp_api::services::orders::compute_totals;

fn money_strategy() -> impl Strategy<Value = Decimal> {
    // Prices up to 99,999.99 with two decimal places.
    (0i64..10_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn product_with(price: Decimal, discount: i32) -> product::Model {
    product::Model {
        id: Uuid::new_v4(),
        category_id: Uuid::new_v4(),
        title: "Prop".into(),
        brand: "Acme".into(),
        description: String::new(),
        slug: "prop".into(),
        price,
        image: None,
        available: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        discount,
    }
}

fn item_with(price: Decimal, quantity: i32) -> order_item::Model {
    order_item::Model {
        id: Uuid::new_v4(),
        order_id: Uuid::new_v4(),
        product_id: Uuid::new_v4(),
        user_id: None,
        quantity,
        price,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // discounted_price(price, 0) == round(price)
    #[test]
    fn zero_discount_only_rounds(price in money_strategy()) {
        let product = product_with(price, 0);
        let expected = price.round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointNearestEven);
        prop_assert_eq!(product.discounted_price(), expected);
    }

    #[test]
    fn discounted_price_never_exceeds_price_or_goes_negative(
        price in money_strategy(),
        discount in 0i32..=100,
    ) {
        let product = product_with(price, discount);
        let discounted = product.discounted_price();
        prop_assert!(discounted >= Decimal::ZERO);
        // Rounding to whole units can add at most half a unit.
        prop_assert!(discounted <= price + Decimal::new(5, 1));
    }

    #[test]
    fn line_cost_is_price_times_quantity(
        price in money_strategy(),
        quantity in 1i32..1_000,
    ) {
        let item = item_with(price, quantity);
        prop_assert_eq!(item.cost(), price * Decimal::from(quantity));
    }

    // total_cost == total_before_discount * (1 - d/100), exactly
    #[test]
    fn totals_follow_the_discount_identity(
        prices in proptest::collection::vec((money_strategy(), 1i32..50), 1..8),
        discount in 0i32..=100,
    ) {
        let items: Vec<_> = prices
            .into_iter()
            .map(|(price, quantity)| item_with(price, quantity))
            .collect();

        let totals = compute_totals(&items, Some(discount));
        let expected =
            totals.total_before_discount * (Decimal::ONE - Decimal::from(discount) / Decimal::ONE_HUNDRED);

        prop_assert_eq!(totals.total_cost, expected);
        prop_assert!(totals.total_cost >= Decimal::ZERO);
        prop_assert_eq!(
            totals.total_cost + totals.discount_amount,
            totals.total_before_discount
        );
    }

    #[test]
    fn unset_discount_is_identity(
        prices in proptest::collection::vec((money_strategy(), 1i32..50), 0..8),
    ) {
        let items: Vec<_> = prices
            .into_iter()
            .map(|(price, quantity)| item_with(price, quantity))
            .collect();

        let totals = compute_totals(&items, None);
        prop_assert_eq!(totals.total_cost, totals.total_before_discount);
        prop_assert_eq!(totals.discount_amount, Decimal::ZERO);
    }

    #[test]
    fn slugify_output_is_always_url_safe(input in ".{0,64}") {
        let slug = slugify(&input);
        prop_assert!(slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        prop_assert!(!slug.starts_with('-'));
        prop_assert!(!slug.ends_with('-'));
        prop_assert!(!slug.contains("--"));
    }

    #[test]
    fn slugify_is_idempotent(input in "[a-zA-Z0-9 _.]{0,64}") {
        let once = slugify(&input);
        prop_assert_eq!(slugify(&once), once.clone());
    }
}
