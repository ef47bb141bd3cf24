use crate::{
    entities::commerce::{cart_item, CartItem, CartItemModel, Category, Product, ProductModel, Size},
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Largest quantity a single cart line (or order item) may hold.
pub const MAX_LINE_QUANTITY: i32 = 999;

/// Per-user shopping cart.
///
/// A cart is simply the set of `cart_items` rows owned by a user. Lines are
/// keyed by (product, size): adding the same key again increments the
/// quantity of the existing line instead of creating a second one.
///
/// Every lookup by line id is scoped to the acting user, so another user's
/// line is reported as not found.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
}

/// Input for adding a product to the cart
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddToCartInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 999, message = "Quantity must be between 1 and 999"))]
    pub quantity: i32,
    pub size: Option<Size>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLineView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_slug: String,
    pub size: Option<Size>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl CartLineView {
    pub fn new(line: &CartItemModel, product: &ProductModel) -> Self {
        let unit_price = product.final_price();
        Self {
            id: line.id,
            product_id: product.id,
            product_name: product.name.clone(),
            product_slug: product.slug.clone(),
            size: line.size,
            quantity: line.quantity,
            unit_price,
            line_total: unit_price * Decimal::from(line.quantity),
        }
    }
}

/// Cart contents with totals at current prices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartSummary {
    pub lines: Vec<CartLineView>,
    pub total_quantity: i32,
    pub subtotal: Decimal,
}

impl CartSummary {
    pub fn from_lines(lines: Vec<CartLineView>) -> Self {
        let total_quantity = lines
            .iter()
            .fold(0i32, |acc, l| acc.saturating_add(l.quantity));
        let subtotal = lines.iter().map(|l| l.line_total).sum();
        Self {
            lines,
            total_quantity,
            subtotal,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Returns the user's cart, oldest line first.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, user_id: Uuid) -> Result<CartSummary, ServiceError> {
        let lines = load_cart_lines(&*self.db, user_id).await?;
        Ok(CartSummary::from_lines(
            lines
                .iter()
                .map(|(line, product)| CartLineView::new(line, product))
                .collect(),
        ))
    }

    /// Adds a product to the cart, merging with an existing (product, size) line.
    ///
    /// # Errors
    ///
    /// * `ValidationError` - quantity below 1, product unavailable, or a size
    ///   is required by the product's category but missing
    /// * `NotFound` - the product does not exist
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        input: AddToCartInput,
    ) -> Result<CartItemModel, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;

        let product = Product::find_by_id(input.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        if !product.is_available {
            return Err(ServiceError::ValidationError(format!(
                "{} is not available",
                product.name
            )));
        }

        ensure_size_selected(&txn, &product, input.size).await?;

        let existing = find_line_by_key(&txn, user_id, product.id, input.size).await?;
        let now = Utc::now();

        let line = if let Some(line) = existing {
            let merged = line
                .quantity
                .checked_add(input.quantity)
                .filter(|q| *q <= MAX_LINE_QUANTITY)
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "A cart line may hold at most {} of {}",
                        MAX_LINE_QUANTITY, product.name
                    ))
                })?;
            let mut line: cart_item::ActiveModel = line.into();
            line.quantity = Set(merged);
            line.updated_at = Set(now);
            line.update(&txn).await?
        } else {
            cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user_id),
                product_id: Set(product.id),
                size: Set(input.size),
                quantity: Set(input.quantity),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?
        };

        txn.commit().await?;

        info!(
            "Cart of {}: product {} size {:?} now x{}",
            user_id, line.product_id, line.size, line.quantity
        );
        Ok(line)
    }

    /// Sets a line's quantity. A quantity of zero or less removes the line and
    /// returns `None`; more than [`MAX_LINE_QUANTITY`] is a validation error.
    #[instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        user_id: Uuid,
        line_id: Uuid,
        quantity: i32,
    ) -> Result<Option<CartItemModel>, ServiceError> {
        if quantity > MAX_LINE_QUANTITY {
            return Err(ServiceError::ValidationError(format!(
                "Quantity must be at most {}",
                MAX_LINE_QUANTITY
            )));
        }

        let line = find_owned_line(&*self.db, user_id, line_id).await?;

        if quantity <= 0 {
            line.delete(&*self.db).await?;
            info!("Removed cart line {} of {}", line_id, user_id);
            return Ok(None);
        }

        let mut line: cart_item::ActiveModel = line.into();
        line.quantity = Set(quantity);
        line.updated_at = Set(Utc::now());
        Ok(Some(line.update(&*self.db).await?))
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: Uuid, line_id: Uuid) -> Result<(), ServiceError> {
        let line = find_owned_line(&*self.db, user_id, line_id).await?;
        line.delete(&*self.db).await?;
        info!("Removed cart line {} of {}", line_id, user_id);
        Ok(())
    }
}

/// All cart lines of a user joined with their products, oldest first.
pub(crate) async fn load_cart_lines<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<Vec<(CartItemModel, ProductModel)>, ServiceError> {
    let rows = CartItem::find()
        .filter(cart_item::Column::UserId.eq(user_id))
        .order_by_asc(cart_item::Column::CreatedAt)
        .find_also_related(Product)
        .all(conn)
        .await?;

    rows.into_iter()
        .map(|(line, product)| {
            product.map(|p| (line, p)).ok_or_else(|| {
                ServiceError::InternalError("Cart line references a missing product".to_string())
            })
        })
        .collect()
}

/// A single cart line owned by `user_id`, or `NotFound`.
pub(crate) async fn find_owned_line<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    line_id: Uuid,
) -> Result<CartItemModel, ServiceError> {
    CartItem::find_by_id(line_id)
        .filter(cart_item::Column::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", line_id)))
}

async fn find_line_by_key<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    product_id: Uuid,
    size: Option<Size>,
) -> Result<Option<CartItemModel>, ServiceError> {
    let mut query = CartItem::find()
        .filter(cart_item::Column::UserId.eq(user_id))
        .filter(cart_item::Column::ProductId.eq(product_id));

    // NULL never compares equal, so "no size" is matched explicitly.
    query = match size {
        Some(size) => query.filter(cart_item::Column::Size.eq(size)),
        None => query.filter(cart_item::Column::Size.is_null()),
    };

    Ok(query.one(conn).await?)
}

/// Fails with a validation error when the product's category requires a size
/// and none was given.
pub(crate) async fn ensure_size_selected<C: ConnectionTrait>(
    conn: &C,
    product: &ProductModel,
    size: Option<Size>,
) -> Result<(), ServiceError> {
    if size.is_some() {
        return Ok(());
    }

    let category = product
        .find_related(Category)
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::InternalError(format!("Product {} has no category", product.id))
        })?;

    if category.requires_size {
        return Err(ServiceError::ValidationError(format!(
            "Please select a size for {}",
            product.name
        )));
    }
    Ok(())
}
