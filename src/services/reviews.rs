use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::product::{self, Entity as Product},
    entities::review::{self, Entity as Review},
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Clone)]
pub struct CreateReviewInput {
    pub product_id: Uuid,
    pub created_by: Uuid,
    pub rating: i16,
    pub content: String,
}

/// Product reviews. Ratings are bounded 1..=5 here and by the storage check
/// constraint.
pub struct ReviewService {
    db: Arc<DbPool>,
    event_sender: EventSender,
}

impl ReviewService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, input), fields(product_id = %input.product_id))]
    pub async fn create_review(
        &self,
        input: CreateReviewInput,
    ) -> Result<review::Model, ServiceError> {
        if !(1..=5).contains(&input.rating) {
            return Err(ServiceError::ValidationError(
                "Rating must be between 1 and 5".to_string(),
            ));
        }

        // Reviews can only target products the storefront actually shows.
        Product::available()
            .filter(product::Column::Id.eq(input.product_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Product {} is not available",
                    input.product_id
                ))
            })?;

        let model = review::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(input.product_id),
            created_by: Set(input.created_by),
            rating: Set(input.rating),
            content: Set(input.content),
            created_at: Set(Utc::now()),
        };

        let created = model.insert(&*self.db).await?;

        if let Err(e) = self
            .event_sender
            .send(Event::ReviewCreated {
                product_id: created.product_id,
                review_id: created.id,
            })
            .await
        {
            warn!(error = %e, "failed to publish review created event");
        }

        Ok(created)
    }

    /// Reviews for a product, newest first.
    pub async fn list_for_product(
        &self,
        product_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<review::Model>, u64), ServiceError> {
        let paginator = Review::find()
            .filter(review::Column::ProductId.eq(product_id))
            .order_by_desc(review::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));

        let total = paginator.num_items().await?;
        let reviews = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((reviews, total))
    }
}
