use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::entity::prelude::*;
use sea_orm::{QueryFilter, Select};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default placeholder shown for products uploaded without an image.
pub const DEFAULT_IMAGE: &str = "products/def.jpg";

/// A sellable catalog item. Storefront visibility is controlled by the
/// `available` flag; products are soft-hidden, never deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub category_id: Uuid,
    pub title: String,
    pub brand: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub slug: String,
    pub price: Decimal,
    pub image: Option<String>,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Integer percent in [0, 100], enforced by a check constraint.
    pub discount: i32,
}

impl Model {
    /// Price after the product-level discount, rounded to whole currency
    /// units with banker's rounding.
    pub fn discounted_price(&self) -> Decimal {
        let rebate = self.price * Decimal::from(self.discount) / Decimal::ONE_HUNDRED;
        (self.price - rebate).round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
    }

    pub fn image_or_default(&self) -> &str {
        self.image.as_deref().unwrap_or(DEFAULT_IMAGE)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,

    #[sea_orm(has_many = "super::review::Entity")]
    Reviews,

    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl Entity {
    /// Storefront scope: the filtered view over the same storage that only
    /// yields products currently purchasable.
    pub fn available() -> Select<Entity> {
        Self::find().filter(Column::Available.eq(true))
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product(price: Decimal, discount: i32) -> Model {
        Model {
            id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            title: "Teapot".into(),
            brand: "Acme".into(),
            description: String::new(),
            slug: "teapot".into(),
            price,
            image: None,
            available: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            discount,
        }
    }

    #[test]
    fn zero_discount_rounds_price_to_whole_units() {
        assert_eq!(product(dec!(99.99), 0).discounted_price(), dec!(100));
        assert_eq!(product(dec!(99.00), 0).discounted_price(), dec!(99));
    }

    #[test]
    fn discount_is_applied_before_rounding() {
        // 99.99 - 9.999 = 89.991 -> 90
        assert_eq!(product(dec!(99.99), 10).discounted_price(), dec!(90));
        // 10.00 - 5.00 = 5.00
        assert_eq!(product(dec!(10.00), 50).discounted_price(), dec!(5));
    }

    #[test]
    fn full_discount_is_free() {
        assert_eq!(product(dec!(123.45), 100).discounted_price(), dec!(0));
    }

    #[test]
    fn half_unit_amounts_use_bankers_rounding() {
        assert_eq!(product(dec!(2.50), 0).discounted_price(), dec!(2));
        assert_eq!(product(dec!(3.50), 0).discounted_price(), dec!(4));
    }

    #[test]
    fn missing_image_falls_back_to_placeholder() {
        assert_eq!(product(dec!(1), 0).image_or_default(), DEFAULT_IMAGE);
    }
}
