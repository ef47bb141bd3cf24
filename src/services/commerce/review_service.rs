use crate::{
    entities::commerce::{review, Review, ReviewModel},
    errors::ServiceError,
    services::commerce::catalog_service::find_product,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddReviewInput {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(min = 1, max = 2000), custom = "comment_not_blank")]
    pub comment: String,
}

fn comment_not_blank(comment: &str) -> Result<(), ValidationError> {
    if comment.trim().is_empty() {
        return Err(ValidationError::new("blank_comment"));
    }
    Ok(())
}

/// One review per shopper per product.
#[derive(Clone)]
pub struct ReviewService {
    db: Arc<DatabaseConnection>,
}

impl ReviewService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, input))]
    pub async fn add_review(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        input: AddReviewInput,
    ) -> Result<ReviewModel, ServiceError> {
        input.validate()?;
        find_product(&*self.db, product_id).await?;

        let existing = Review::find()
            .filter(review::Column::ProductId.eq(product_id))
            .filter(review::Column::UserId.eq(user_id))
            .count(&*self.db)
            .await?;
        if existing > 0 {
            return Err(already_reviewed());
        }

        let model = review::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            user_id: Set(user_id),
            rating: Set(input.rating),
            comment: Set(input.comment.trim().to_string()),
            created_at: Set(Utc::now()),
        };

        let review = model.insert(&*self.db).await.map_err(|e| {
            let err = ServiceError::from(e);
            if err.is_unique_violation() {
                already_reviewed()
            } else {
                err
            }
        })?;

        info!("Review {} added to product {}", review.id, product_id);
        Ok(review)
    }

    /// Reviews of a product, newest first.
    #[instrument(skip(self))]
    pub async fn list_reviews(&self, product_id: Uuid) -> Result<Vec<ReviewModel>, ServiceError> {
        find_product(&*self.db, product_id).await?;
        Ok(Review::find()
            .filter(review::Column::ProductId.eq(product_id))
            .order_by_desc(review::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }
}

fn already_reviewed() -> ServiceError {
    ServiceError::Conflict("You have already reviewed this product".to_string())
}
