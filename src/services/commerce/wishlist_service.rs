use crate::{
    entities::commerce::{wishlist_item, Product, WishlistItem, WishlistItemModel},
    errors::ServiceError,
    services::commerce::catalog_service::{find_product, ProductSummary},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WishlistEntry {
    pub id: Uuid,
    pub added_at: DateTime<Utc>,
    pub product: ProductSummary,
}

/// Outcome of adding to the wishlist
#[derive(Debug, Clone)]
pub enum WishlistAddOutcome {
    Added(WishlistItemModel),
    AlreadyPresent(WishlistItemModel),
}

#[derive(Clone)]
pub struct WishlistService {
    db: Arc<DatabaseConnection>,
}

impl WishlistService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Adds a product; adding it twice is reported, not an error.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<WishlistAddOutcome, ServiceError> {
        find_product(&*self.db, product_id).await?;

        if let Some(existing) = self.find_entry(user_id, product_id).await? {
            return Ok(WishlistAddOutcome::AlreadyPresent(existing));
        }

        let entry = wishlist_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            product_id: Set(product_id),
            created_at: Set(Utc::now()),
        };

        match entry.insert(&*self.db).await {
            Ok(entry) => {
                info!("Product {} added to wishlist of {}", product_id, user_id);
                Ok(WishlistAddOutcome::Added(entry))
            }
            Err(e) => {
                let err = ServiceError::from(e);
                if !err.is_unique_violation() {
                    return Err(err);
                }
                // Lost a race with a concurrent add of the same product.
                self.find_entry(user_id, product_id)
                    .await?
                    .map(WishlistAddOutcome::AlreadyPresent)
                    .ok_or(err)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: Uuid, product_id: Uuid) -> Result<(), ServiceError> {
        let entry = self.find_entry(user_id, product_id).await?.ok_or_else(|| {
            ServiceError::NotFound(format!("Product {} is not in your wishlist", product_id))
        })?;
        entry.delete(&*self.db).await?;
        info!("Product {} removed from wishlist of {}", product_id, user_id);
        Ok(())
    }

    /// Wishlist entries with product summaries, newest first.
    #[instrument(skip(self))]
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<WishlistEntry>, ServiceError> {
        let rows = WishlistItem::find()
            .filter(wishlist_item::Column::UserId.eq(user_id))
            .order_by_desc(wishlist_item::Column::CreatedAt)
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(entry, product)| {
                product.map(|p| WishlistEntry {
                    id: entry.id,
                    added_at: entry.created_at,
                    product: ProductSummary::from(&p),
                })
            })
            .collect())
    }

    async fn find_entry(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<WishlistItemModel>, ServiceError> {
        Ok(WishlistItem::find()
            .filter(wishlist_item::Column::UserId.eq(user_id))
            .filter(wishlist_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?)
    }
}
