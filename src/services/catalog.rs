use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::category::{self, Entity as Category},
    entities::product::{self, Entity as Product},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Attempts before a synthesized slug collision is reported as a conflict.
const SLUG_ATTEMPTS: usize = 3;

/// Brand suffix folded into synthesized category slugs.
const SLUG_BRAND: &str = "bigcorp";

#[derive(Debug, Clone)]
pub struct CreateCategoryInput {
    pub name: String,
    pub parent_id: Option<Uuid>,
    /// Explicit slug; synthesized when absent.
    pub slug: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateProductInput {
    pub category_id: Uuid,
    pub title: String,
    pub brand: String,
    pub description: String,
    pub slug: Option<String>,
    pub price: Decimal,
    pub image: Option<String>,
    pub discount: i32,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateProductInput {
    pub title: Option<String>,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub image: Option<String>,
    pub available: Option<bool>,
    pub discount: Option<i32>,
}

/// Catalog management: the category tree and the products hanging off it.
pub struct CatalogService {
    db: Arc<DbPool>,
    event_sender: EventSender,
}

impl CatalogService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Create a category. A caller-supplied slug colliding under the same
    /// parent is rejected immediately; a synthesized slug is regenerated up
    /// to `SLUG_ATTEMPTS` times before the conflict is surfaced.
    #[instrument(skip(self))]
    pub async fn create_category(
        &self,
        input: CreateCategoryInput,
    ) -> Result<category::Model, ServiceError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::ValidationError(
                "Category name cannot be blank".to_string(),
            ));
        }

        if let Some(parent_id) = input.parent_id {
            Category::find_by_id(parent_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "Parent category {parent_id} does not exist"
                    ))
                })?;
        }

        let slug = match input.slug {
            Some(supplied) => {
                let supplied = slugify(&supplied);
                if supplied.is_empty() {
                    return Err(ServiceError::ValidationError(
                        "Slug cannot be blank".to_string(),
                    ));
                }
                if self.slug_taken(&supplied, input.parent_id, None).await? {
                    return Err(ServiceError::Conflict(format!(
                        "Category slug '{supplied}' already exists under this parent"
                    )));
                }
                supplied
            }
            None => self.synthesize_slug(&name, input.parent_id).await?,
        };

        let model = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            slug: Set(slug),
            parent_id: Set(input.parent_id),
            created_at: Set(Utc::now()),
        };

        // A concurrent creation can still hit the (slug, parent) unique
        // index between the check and the insert; surface that as a
        // definitive conflict, not a storage error.
        let created = model.insert(&*self.db).await.map_err(|err| {
            match err.sql_err() {
                Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => ServiceError::Conflict(
                    "Category slug already exists under this parent".to_string(),
                ),
                _ => ServiceError::DatabaseError(err),
            }
        })?;

        if let Err(e) = self.event_sender.send(Event::CategoryCreated(created.id)).await {
            warn!(error = %e, "failed to publish category created event");
        }
        info!(category_id = %created.id, slug = %created.slug, "category created");

        Ok(created)
    }

    /// Re-parent a category. Rejects moves that would make a node its own
    /// descendant's child.
    #[instrument(skip(self))]
    pub async fn move_category(
        &self,
        id: Uuid,
        new_parent_id: Option<Uuid>,
    ) -> Result<category::Model, ServiceError> {
        let node = Category::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {id} not found")))?;

        if let Some(parent_id) = new_parent_id {
            if parent_id == id {
                return Err(ServiceError::ValidationError(
                    "A category cannot be its own parent".to_string(),
                ));
            }

            // Walk the prospective ancestor chain; hitting the node itself
            // means the move would create a cycle.
            let mut cursor = Some(parent_id);
            let mut seen = HashSet::new();
            while let Some(current) = cursor {
                if current == id {
                    return Err(ServiceError::ValidationError(
                        "A category cannot become a descendant of itself".to_string(),
                    ));
                }
                if !seen.insert(current) {
                    break;
                }
                let ancestor = Category::find_by_id(current)
                    .one(&*self.db)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::ValidationError(format!(
                            "Parent category {current} does not exist"
                        ))
                    })?;
                cursor = ancestor.parent_id;
            }
        }

        if self.slug_taken(&node.slug, new_parent_id, Some(node.id)).await? {
            return Err(ServiceError::Conflict(format!(
                "Category slug '{}' already exists under the target parent",
                node.slug
            )));
        }

        let mut active: category::ActiveModel = node.into();
        active.parent_id = Set(new_parent_id);
        Ok(active.update(&*self.db).await?)
    }

    /// All categories, oldest first.
    pub async fn list_categories(&self) -> Result<Vec<category::Model>, ServiceError> {
        Ok(Category::find()
            .order_by_asc(category::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    pub async fn get_category_by_slug(
        &self,
        slug: &str,
    ) -> Result<category::Model, ServiceError> {
        Category::find()
            .filter(category::Column::Slug.eq(slug))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category '{slug}' not found")))
    }

    /// Root-to-leaf breadcrumb of category names joined with `" > "`.
    /// Bounded by a visited set so a corrupt tree cannot loop forever.
    pub async fn category_path(&self, id: Uuid) -> Result<String, ServiceError> {
        let mut names = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = Some(id);

        while let Some(current) = cursor {
            if !seen.insert(current) {
                warn!(category_id = %current, "cycle detected while walking category parents");
                break;
            }
            let node = Category::find_by_id(current)
                .one(&*self.db)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Category {current} not found")))?;
            names.push(node.name);
            cursor = node.parent_id;
        }

        names.reverse();
        Ok(names.join(" > "))
    }

    #[instrument(skip(self))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<product::Model, ServiceError> {
        validate_discount(input.discount)?;
        if input.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Price cannot be negative".to_string(),
            ));
        }

        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(ServiceError::ValidationError(
                "Product title cannot be blank".to_string(),
            ));
        }

        Category::find_by_id(input.category_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Category {} does not exist",
                    input.category_id
                ))
            })?;

        let slug = match input.slug {
            Some(s) => slugify(&s),
            None => slugify(&title),
        };

        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            category_id: Set(input.category_id),
            title: Set(title),
            brand: Set(input.brand),
            description: Set(input.description),
            slug: Set(slug),
            price: Set(input.price),
            image: Set(input.image),
            available: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            discount: Set(input.discount),
        };

        let created = model.insert(&*self.db).await?;

        if let Err(e) = self.event_sender.send(Event::ProductCreated(created.id)).await {
            warn!(error = %e, "failed to publish product created event");
        }
        info!(product_id = %created.id, title = %created.title, "product created");

        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn update_product(
        &self,
        id: Uuid,
        input: UpdateProductInput,
    ) -> Result<product::Model, ServiceError> {
        let existing = Product::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {id} not found")))?;

        if let Some(discount) = input.discount {
            validate_discount(discount)?;
        }
        if let Some(price) = input.price {
            if price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Price cannot be negative".to_string(),
                ));
            }
        }

        let mut active: product::ActiveModel = existing.into();
        if let Some(title) = input.title {
            active.title = Set(title);
        }
        if let Some(brand) = input.brand {
            active.brand = Set(brand);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(image) = input.image {
            active.image = Set(Some(image));
        }
        if let Some(available) = input.available {
            active.available = Set(available);
        }
        if let Some(discount) = input.discount {
            active.discount = Set(discount);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db).await?;

        if let Err(e) = self.event_sender.send(Event::ProductUpdated(updated.id)).await {
            warn!(error = %e, "failed to publish product updated event");
        }

        Ok(updated)
    }

    /// Soft-hide from the storefront. Products are never deleted.
    pub async fn hide_product(&self, id: Uuid) -> Result<product::Model, ServiceError> {
        self.update_product(
            id,
            UpdateProductInput {
                available: Some(false),
                ..Default::default()
            },
        )
        .await
    }

    /// Storefront read: only available products are visible.
    pub async fn get_available_product(&self, id: Uuid) -> Result<product::Model, ServiceError> {
        Product::available()
            .filter(product::Column::Id.eq(id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {id} not found")))
    }

    /// Storefront listing over the available scope, newest first.
    pub async fn list_available_products(
        &self,
        page: u64,
        per_page: u64,
        category_id: Option<Uuid>,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        let mut query = Product::available().order_by_desc(product::Column::CreatedAt);

        if let Some(category_id) = category_id {
            query = query.filter(product::Column::CategoryId.eq(category_id));
        }

        let paginator = query.paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((products, total))
    }

    async fn slug_taken(
        &self,
        slug: &str,
        parent_id: Option<Uuid>,
        exclude_id: Option<Uuid>,
    ) -> Result<bool, ServiceError> {
        let mut query = Category::find().filter(category::Column::Slug.eq(slug));
        query = match parent_id {
            Some(parent_id) => query.filter(category::Column::ParentId.eq(parent_id)),
            None => query.filter(category::Column::ParentId.is_null()),
        };
        if let Some(exclude_id) = exclude_id {
            query = query.filter(category::Column::Id.ne(exclude_id));
        }
        Ok(query.count(&*self.db).await? > 0)
    }

    /// Bounded retry-with-regeneration loop for synthesized slugs. The token
    /// space is small (36^3 per name), so exhaustion is reported as a
    /// definitive conflict rather than retried forever.
    async fn synthesize_slug(
        &self,
        name: &str,
        parent_id: Option<Uuid>,
    ) -> Result<String, ServiceError> {
        for _ in 0..SLUG_ATTEMPTS {
            let candidate = slugify(&format!("{}-{}-{}", rand_token(3), SLUG_BRAND, name));
            if !self.slug_taken(&candidate, parent_id, None).await? {
                return Ok(candidate);
            }
        }
        Err(ServiceError::Conflict(format!(
            "Could not allocate a unique slug for category '{name}'"
        )))
    }
}

fn validate_discount(discount: i32) -> Result<(), ServiceError> {
    if !(0..=100).contains(&discount) {
        return Err(ServiceError::ValidationError(
            "Discount must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

/// Random lowercase-alphanumeric token for slug synthesis.
fn rand_token(len: usize) -> String {
    use rand::Rng;
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// ASCII slugify: lowercase, non-alphanumerics collapsed to single hyphens.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_hyphen = true;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_hyphen = false;
        } else if !last_hyphen {
            out.push('-');
            last_hyphen = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_and_trims() {
        assert_eq!(slugify("Garden & Tools"), "garden-tools");
        assert_eq!(slugify("  spaced   out  "), "spaced-out");
        assert_eq!(slugify("MixedCase99"), "mixedcase99");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn rand_token_has_requested_length_and_alphabet() {
        let token = rand_token(3);
        assert_eq!(token.len(), 3);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn synthesized_slug_shape() {
        let slug = slugify(&format!("{}-{}-{}", rand_token(3), SLUG_BRAND, "Phones"));
        assert!(slug.contains("bigcorp-phones"));
        assert_eq!(slug.len(), "xxx-bigcorp-phones".len());
    }

    #[test]
    fn discount_bounds_are_inclusive() {
        assert!(validate_discount(0).is_ok());
        assert!(validate_discount(100).is_ok());
        assert!(validate_discount(-1).is_err());
        assert!(validate_discount(101).is_err());
    }
}
