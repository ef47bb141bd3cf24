use crate::{
    entities::{
        commerce::{cart_item, CartItem, Product, ProductModel, Size},
        order::{self, OrderStatus},
        order_item,
    },
    errors::ServiceError,
    services::{
        commerce::{
            cart_service::{
                ensure_size_selected, find_owned_line, load_cart_lines, CartLineView, CartSummary,
            },
            order_number::generate_order_number,
        },
        orders::{load_order_details, OrderDetails},
    },
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Whole-checkout attempts when the order id insert races another writer.
pub const MAX_CHECKOUT_ATTEMPTS: usize = 3;

/// Order id candidates tried per attempt before giving up.
const MAX_ORDER_NUMBER_CANDIDATES: usize = 5;

/// Source of order id candidates.
pub type OrderNumberGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Shipping form submitted with every checkout
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ShippingDetails {
    #[validate(length(min = 1, max = 10), custom = "not_blank")]
    pub phone: String,
    #[validate(length(min = 1), custom = "not_blank")]
    pub shipping_address: String,
    #[validate(length(min = 1, max = 100), custom = "not_blank")]
    pub city: String,
    #[validate(length(min = 1, max = 100), custom = "not_blank")]
    pub state: String,
    #[validate(length(min = 1, max = 10), custom = "not_blank")]
    pub zip_code: String,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Direct purchase of a single product, bypassing the cart
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BuyNowInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 999, message = "Quantity must be between 1 and 999"))]
    pub quantity: i32,
    pub size: Option<Size>,
}

#[derive(Debug, Clone)]
enum OrderSource {
    Cart,
    CartLine(Uuid),
    BuyNow(BuyNowInput),
}

/// Line about to become an order item
#[derive(Debug, Clone)]
struct PendingLine {
    cart_line_id: Option<Uuid>,
    product_id: Uuid,
    product_name: String,
    quantity: i32,
    unit_price: Decimal,
    size: Option<Size>,
}

impl PendingLine {
    fn from_product(
        product: &ProductModel,
        quantity: i32,
        size: Option<Size>,
        cart_line_id: Option<Uuid>,
    ) -> Self {
        Self {
            cart_line_id,
            product_id: product.id,
            product_name: product.name.clone(),
            quantity,
            unit_price: product.final_price(),
            size,
        }
    }

    fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Converts carts (or a single product) into orders.
///
/// The order row, its items and the deletion of the consumed cart lines are
/// written in one transaction; any error drops the transaction and nothing
/// becomes visible. Prices are snapshotted into the items at this point.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    order_numbers: OrderNumberGenerator,
}

impl CheckoutService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            order_numbers: Arc::new(generate_order_number),
        }
    }

    /// Replaces the order id source.
    pub fn with_order_number_generator(mut self, generator: OrderNumberGenerator) -> Self {
        self.order_numbers = generator;
        self
    }

    /// Summary of what a full-cart checkout would buy.
    #[instrument(skip(self))]
    pub async fn checkout_preview(&self, user_id: Uuid) -> Result<CartSummary, ServiceError> {
        let lines = load_cart_lines(&*self.db, user_id).await?;
        let summary = CartSummary::from_lines(
            lines
                .iter()
                .map(|(line, product)| CartLineView::new(line, product))
                .collect(),
        );
        if summary.is_empty() {
            return Err(ServiceError::ValidationError(
                "Your cart is empty".to_string(),
            ));
        }
        Ok(summary)
    }

    /// Buys every line in the user's cart.
    #[instrument(skip(self, shipping))]
    pub async fn checkout_cart(
        &self,
        user_id: Uuid,
        shipping: ShippingDetails,
    ) -> Result<OrderDetails, ServiceError> {
        self.place_order(user_id, OrderSource::Cart, shipping).await
    }

    /// Buys a single cart line; the rest of the cart is left alone.
    #[instrument(skip(self, shipping))]
    pub async fn checkout_cart_line(
        &self,
        user_id: Uuid,
        line_id: Uuid,
        shipping: ShippingDetails,
    ) -> Result<OrderDetails, ServiceError> {
        self.place_order(user_id, OrderSource::CartLine(line_id), shipping)
            .await
    }

    /// Buys a product directly. Requires the product to be available and the
    /// quantity to be in stock.
    #[instrument(skip(self, shipping))]
    pub async fn buy_now(
        &self,
        user_id: Uuid,
        input: BuyNowInput,
        shipping: ShippingDetails,
    ) -> Result<OrderDetails, ServiceError> {
        input.validate()?;
        self.place_order(user_id, OrderSource::BuyNow(input), shipping)
            .await
    }

    async fn place_order(
        &self,
        user_id: Uuid,
        source: OrderSource,
        shipping: ShippingDetails,
    ) -> Result<OrderDetails, ServiceError> {
        shipping.validate()?;

        let mut attempt = 1;
        loop {
            match self.try_place_order(user_id, &source, &shipping).await {
                Err(err) if err.is_unique_violation() && attempt < MAX_CHECKOUT_ATTEMPTS => {
                    warn!(
                        attempt,
                        "order id collided with a concurrent checkout; retrying"
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn try_place_order(
        &self,
        user_id: Uuid,
        source: &OrderSource,
        shipping: &ShippingDetails,
    ) -> Result<OrderDetails, ServiceError> {
        let txn = self.db.begin().await?;

        let lines = collect_lines(&txn, user_id, source).await?;
        let total: Decimal = lines.iter().map(PendingLine::line_total).sum();
        let order_number = self.allocate_order_number(&txn).await?;

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user_id),
            order_number: Set(order_number),
            status: Set(OrderStatus::Pending),
            total_amount: Set(total),
            phone: Set(shipping.phone.trim().to_string()),
            shipping_address: Set(shipping.shipping_address.trim().to_string()),
            city: Set(shipping.city.trim().to_string()),
            state: Set(shipping.state.trim().to_string()),
            zip_code: Set(shipping.zip_code.trim().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        for line in &lines {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                product_name: Set(line.product_name.clone()),
                quantity: Set(line.quantity),
                price: Set(line.unit_price),
                size: Set(line.size),
                is_cancelled: Set(false),
                cancelled_at: Set(None),
                cancellation_reason: Set(None),
            }
            .insert(&txn)
            .await?;
        }

        let consumed: Vec<Uuid> = lines.iter().filter_map(|l| l.cart_line_id).collect();
        if !consumed.is_empty() {
            CartItem::delete_many()
                .filter(cart_item::Column::UserId.eq(user_id))
                .filter(cart_item::Column::Id.is_in(consumed))
                .exec(&txn)
                .await?;
        }

        let details = load_order_details(&txn, order).await?;
        txn.commit().await?;

        info!(
            "Order {} placed by {}: {} item(s), total {}",
            details.order.order_number,
            user_id,
            details.items.len(),
            details.order.total_amount
        );
        Ok(details)
    }

    async fn allocate_order_number<C: ConnectionTrait>(
        &self,
        conn: &C,
    ) -> Result<String, ServiceError> {
        for _ in 0..MAX_ORDER_NUMBER_CANDIDATES {
            let candidate = (self.order_numbers.as_ref())();
            let taken = order::Entity::find()
                .filter(order::Column::OrderNumber.eq(candidate.as_str()))
                .count(conn)
                .await?;
            if taken == 0 {
                return Ok(candidate);
            }
        }
        Err(ServiceError::InternalError(
            "Could not allocate a unique order id".to_string(),
        ))
    }
}

async fn collect_lines<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    source: &OrderSource,
) -> Result<Vec<PendingLine>, ServiceError> {
    match source {
        OrderSource::Cart => {
            let cart = load_cart_lines(conn, user_id).await?;
            if cart.is_empty() {
                return Err(ServiceError::ValidationError(
                    "Your cart is empty".to_string(),
                ));
            }
            let mut lines = Vec::with_capacity(cart.len());
            for (line, product) in &cart {
                ensure_size_selected(conn, product, line.size).await?;
                lines.push(PendingLine::from_product(
                    product,
                    line.quantity,
                    line.size,
                    Some(line.id),
                ));
            }
            Ok(lines)
        }
        OrderSource::CartLine(line_id) => {
            let line = find_owned_line(conn, user_id, *line_id).await?;
            let product = Product::find_by_id(line.product_id)
                .one(conn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", line.product_id))
                })?;
            ensure_size_selected(conn, &product, line.size).await?;
            Ok(vec![PendingLine::from_product(
                &product,
                line.quantity,
                line.size,
                Some(line.id),
            )])
        }
        OrderSource::BuyNow(input) => {
            let product = Product::find_by_id(input.product_id)
                .one(conn)
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
            if !product.in_stock(input.quantity) {
                return Err(ServiceError::InsufficientStock(format!(
                    "Only {} of {} left in stock",
                    product.stock, product.name
                )));
            }
            ensure_size_selected(conn, &product, input.size).await?;

            Ok(vec![PendingLine::from_product(
                &product,
                input.quantity,
                input.size,
                None,
            )])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn shipping() -> ShippingDetails {
        ShippingDetails {
            phone: "5551234567".into(),
            shipping_address: "1 Main St".into(),
            city: "Springfield".into(),
            state: "IL".into(),
            zip_code: "62701".into(),
        }
    }

    #[test]
    fn shipping_form_accepts_complete_details() {
        assert!(shipping().validate().is_ok());
    }

    #[test]
    fn shipping_form_rejects_blank_and_long_fields() {
        let mut blank_city = shipping();
        blank_city.city = "   ".into();
        let errors = blank_city.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("city"));

        let mut long_phone = shipping();
        long_phone.phone = "12345678901".into();
        let errors = long_phone.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("phone"));

        let mut long_zip = shipping();
        long_zip.zip_code = "12345-67890".into();
        assert!(long_zip.validate().is_err());
    }

    #[test]
    fn pending_line_total() {
        let line = PendingLine {
            cart_line_id: None,
            product_id: Uuid::new_v4(),
            product_name: "Tee".into(),
            quantity: 3,
            unit_price: dec!(19.99),
            size: Some(Size::L),
        };
        assert_eq!(line.line_total(), dec!(59.97));
    }
}
