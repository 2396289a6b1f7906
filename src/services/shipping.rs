use std::sync::Arc;

use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::shipping_address::{self, Entity as ShippingAddress},
    errors::ServiceError,
};

#[derive(Debug, Clone)]
pub struct AddressInput {
    pub full_name: String,
    pub email: String,
    pub street_address: String,
    pub apartment_address: String,
    pub country: Option<String>,
    pub zip_code: Option<String>,
    pub city: Option<String>,
}

/// Shipping addresses, one per user.
pub struct ShippingService {
    db: Arc<DbPool>,
}

impl ShippingService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Create or replace the user's address.
    #[instrument(skip(self, input))]
    pub async fn upsert_address(
        &self,
        user_id: Uuid,
        input: AddressInput,
    ) -> Result<shipping_address::Model, ServiceError> {
        let existing = ShippingAddress::find()
            .filter(shipping_address::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?;

        match existing {
            Some(address) => {
                let mut active: shipping_address::ActiveModel = address.into();
                active.full_name = Set(input.full_name);
                active.email = Set(input.email);
                active.street_address = Set(input.street_address);
                active.apartment_address = Set(input.apartment_address);
                active.country = Set(input.country);
                active.zip_code = Set(input.zip_code);
                active.city = Set(input.city);
                Ok(active.update(&*self.db).await?)
            }
            None => {
                let model = shipping_address::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    full_name: Set(input.full_name),
                    email: Set(input.email),
                    street_address: Set(input.street_address),
                    apartment_address: Set(input.apartment_address),
                    country: Set(input.country),
                    zip_code: Set(input.zip_code),
                    city: Set(input.city),
                };
                Ok(model.insert(&*self.db).await?)
            }
        }
    }

    pub async fn get_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<shipping_address::Model>, ServiceError> {
        Ok(ShippingAddress::find()
            .filter(shipping_address::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?)
    }

    /// The user's address, or a freshly persisted sentinel record carrying
    /// "Fill Address" markers for them to complete later.
    pub async fn default_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<shipping_address::Model, ServiceError> {
        if let Some(address) = self.get_for_user(user_id).await? {
            return Ok(address);
        }

        let sentinel = shipping_address::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            full_name: Set("No name".to_string()),
            email: Set("example@mail.com".to_string()),
            street_address: Set("Fill Address".to_string()),
            apartment_address: Set("Fill Address".to_string()),
            country: Set(Some(String::new())),
            zip_code: Set(None),
            city: Set(None),
        };

        Ok(sentinel.insert(&*self.db).await?)
    }
}
