use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func, SimpleExpr},
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::order::{self, Entity as Order},
    entities::order_item::{self, Entity as OrderItem},
    entities::product::{self, Entity as Product},
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Clone)]
pub struct CheckoutItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct CheckoutInput {
    pub user_id: Uuid,
    pub shipping_address_id: Option<Uuid>,
    pub items: Vec<CheckoutItem>,
    pub discount: Option<i32>,
}

/// The three derived figures for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTotals {
    pub total_before_discount: Decimal,
    pub discount_amount: Decimal,
    pub total_cost: Decimal,
}

/// Pure fold over loaded line items; the storage-layer aggregation and this
/// computation must agree.
pub fn compute_totals(items: &[order_item::Model], discount: Option<i32>) -> OrderTotals {
    let total_before_discount: Decimal = items.iter().map(|item| item.cost()).sum();

    let discount_amount = match discount {
        Some(d) if d > 0 => total_before_discount * Decimal::from(d) / Decimal::ONE_HUNDRED,
        _ => Decimal::ZERO,
    };

    OrderTotals {
        total_before_discount,
        discount_amount,
        total_cost: total_before_discount - discount_amount,
    }
}

/// Order creation and inspection. Orders are composed at checkout from
/// explicit line items, priced off the catalog at that moment.
pub struct OrderService {
    db: Arc<DbPool>,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Convert a cart into an order plus its line items. The whole operation
    /// runs in one transaction; any failure aborts it entirely.
    #[instrument(skip(self, input), fields(user_id = %input.user_id))]
    pub async fn checkout(
        &self,
        input: CheckoutInput,
    ) -> Result<(order::Model, Vec<order_item::Model>), ServiceError> {
        if input.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "Checkout requires at least one item".to_string(),
            ));
        }
        if let Some(d) = input.discount {
            if !(0..=100).contains(&d) {
                return Err(ServiceError::ValidationError(
                    "Discount must be between 0 and 100".to_string(),
                ));
            }
        }
        for item in &input.items {
            if item.quantity <= 0 {
                return Err(ServiceError::ValidationError(
                    "Quantity must be greater than zero".to_string(),
                ));
            }
        }

        // Snapshot current discounted prices before opening the transaction;
        // the captured price is what the order keeps forever.
        let mut priced = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let product = Product::available()
                .filter(product::Column::Id.eq(item.product_id))
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "Product {} is not available",
                        item.product_id
                    ))
                })?;
            priced.push((item.product_id, item.quantity, product.discounted_price()));
        }

        let draft_items: Vec<order_item::Model> = priced
            .iter()
            .map(|(product_id, quantity, price)| order_item::Model {
                id: Uuid::new_v4(),
                order_id: Uuid::nil(), // patched below
                product_id: *product_id,
                user_id: Some(input.user_id),
                quantity: *quantity,
                price: *price,
            })
            .collect();
        let totals = compute_totals(&draft_items, input.discount);

        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let txn = self.db.begin().await?;

        let order = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(Some(input.user_id)),
            shipping_address_id: Set(input.shipping_address_id),
            amount: Set(totals.total_cost),
            paid: Set(false),
            discount: Set(input.discount),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(draft_items.len());
        for draft in draft_items {
            let inserted = order_item::ActiveModel {
                id: Set(draft.id),
                order_id: Set(order_id),
                product_id: Set(draft.product_id),
                user_id: Set(draft.user_id),
                quantity: Set(draft.quantity),
                price: Set(draft.price),
            }
            .insert(&txn)
            .await?;
            items.push(inserted);
        }

        txn.commit().await?;

        if let Err(e) = self.event_sender.send(Event::OrderCreated(order.id)).await {
            warn!(error = %e, "failed to publish order created event");
        }
        info!(order_id = %order.id, amount = %order.amount, "order created");

        Ok((order, items))
    }

    pub async fn get_order(&self, id: Uuid) -> Result<order::Model, ServiceError> {
        Order::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {id} not found")))
    }

    /// Owner-scoped read. Unowned orders are reported as missing rather than
    /// forbidden, to avoid leaking order ids.
    pub async fn get_order_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<(order::Model, Vec<order_item::Model>), ServiceError> {
        let order = self.get_order(id).await?;
        if order.user_id != Some(user_id) {
            return Err(ServiceError::NotFound(format!("Order {id} not found")));
        }
        let items = self.get_order_items(id).await?;
        Ok((order, items))
    }

    pub async fn get_order_items(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<order_item::Model>, ServiceError> {
        Ok(OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?)
    }

    pub async fn list_orders_for_user(
        &self,
        user_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let paginator = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    /// Derived totals for an order, computed from its loaded items.
    pub async fn totals(&self, order: &order::Model) -> Result<OrderTotals, ServiceError> {
        let items = self.get_order_items(order.id).await?;
        Ok(compute_totals(&items, order.discount))
    }

    /// Webhook-driven transition. Idempotent: marking an already-paid order
    /// is a no-op.
    #[instrument(skip(self))]
    pub async fn mark_paid(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        let order = self.get_order(order_id).await?;
        if order.paid {
            return Ok(order);
        }

        let mut active: order::ActiveModel = order.into();
        active.paid = Set(true);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        if let Err(e) = self.event_sender.send(Event::OrderPaid(updated.id)).await {
            warn!(error = %e, "failed to publish order paid event");
        }
        info!(order_id = %updated.id, "order marked paid");

        Ok(updated)
    }

    /// Total quantity sold for a product across all orders; 0 when the
    /// product has never been ordered.
    pub async fn total_quantity_for_product(
        &self,
        product_id: Uuid,
    ) -> Result<i64, ServiceError> {
        let total: Option<i64> = OrderItem::find()
            .filter(order_item::Column::ProductId.eq(product_id))
            .select_only()
            .column_as(SimpleExpr::from(Func::sum(Expr::col(order_item::Column::Quantity))), "total")
            .into_tuple()
            .one(&*self.db)
            .await?
            .flatten();

        Ok(total.unwrap_or(0))
    }

    /// Mean captured unit price across all order items; `None` when no items
    /// exist.
    pub async fn average_order_item_price(&self) -> Result<Option<Decimal>, ServiceError> {
        let average: Option<Decimal> = OrderItem::find()
            .select_only()
            .column_as(SimpleExpr::from(Func::avg(Expr::col(order_item::Column::Price))), "average")
            .into_tuple()
            .one(&*self.db)
            .await?
            .flatten();

        Ok(average)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(price: Decimal, quantity: i32) -> order_item::Model {
        order_item::Model {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            user_id: None,
            quantity,
            price,
        }
    }

    #[test]
    fn totals_match_checkout_scenario() {
        // Two items (10.00 x 2, 5.00 x 1) with a 10 percent order discount.
        let items = vec![item(dec!(10.00), 2), item(dec!(5.00), 1)];
        let totals = compute_totals(&items, Some(10));

        assert_eq!(totals.total_before_discount, dec!(25.00));
        assert_eq!(totals.discount_amount, dec!(2.50));
        assert_eq!(totals.total_cost, dec!(22.50));
    }

    #[test]
    fn zero_or_unset_discount_changes_nothing() {
        let items = vec![item(dec!(19.99), 3)];

        let unset = compute_totals(&items, None);
        assert_eq!(unset.total_cost, unset.total_before_discount);
        assert_eq!(unset.discount_amount, Decimal::ZERO);

        let zero = compute_totals(&items, Some(0));
        assert_eq!(zero.total_cost, zero.total_before_discount);
    }

    #[test]
    fn full_discount_is_never_negative() {
        let items = vec![item(dec!(42.00), 1)];
        let totals = compute_totals(&items, Some(100));
        assert_eq!(totals.total_cost, Decimal::ZERO);
    }

    #[test]
    fn empty_order_totals_are_zero() {
        let totals = compute_totals(&[], Some(50));
        assert_eq!(totals.total_before_discount, Decimal::ZERO);
        assert_eq!(totals.discount_amount, Decimal::ZERO);
        assert_eq!(totals.total_cost, Decimal::ZERO);
    }

    #[test]
    fn discounted_total_matches_percentage_identity() {
        let items = vec![item(dec!(13.37), 7), item(dec!(0.01), 3)];
        for d in [1, 25, 50, 99] {
            let totals = compute_totals(&items, Some(d));
            let expected = totals.total_before_discount
                * (Decimal::ONE - Decimal::from(d) / Decimal::ONE_HUNDRED);
            assert_eq!(totals.total_cost, expected);
        }
    }
}
