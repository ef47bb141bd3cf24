use crate::{
    entities::order::{self, Entity as OrderEntity, Model as OrderModel, OrderStatus},
    entities::order_item::{self, Entity as OrderItemEntity, Model as OrderItemModel},
    errors::ServiceError,
    services::commerce::order_number::is_valid_order_number,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

const CUSTOMER_CANCELLATION_REASON: &str = "Cancelled by customer";
const ADMIN_CANCELLATION_REASON: &str = "Cancelled by administrator";

/// Order with its items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
    /// Sum over non-cancelled items. Display only; `total_amount` stays the
    /// checkout snapshot.
    pub active_total: Decimal,
}

impl OrderDetails {
    pub fn new(order: OrderModel, items: Vec<OrderItemModel>) -> Self {
        let active_total = items
            .iter()
            .filter(|item| !item.is_cancelled)
            .map(OrderItemModel::line_total)
            .sum();
        Self {
            order,
            items,
            active_total,
        }
    }

    pub fn active_items(&self) -> impl Iterator<Item = &OrderItemModel> {
        self.items.iter().filter(|item| !item.is_cancelled)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderDetails>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, Validate)]
pub struct CancelRequest {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

/// Result of a cancellation request
#[derive(Debug, Clone)]
pub enum CancellationOutcome {
    /// Something was cancelled. `order_cancelled` is set when the order
    /// itself ended up cancelled.
    Cancelled {
        order: OrderDetails,
        order_cancelled: bool,
    },
    /// Nothing to do; the target was already cancelled.
    AlreadyCancelled { order: OrderDetails },
}

impl CancellationOutcome {
    pub fn order(&self) -> &OrderDetails {
        match self {
            Self::Cancelled { order, .. } | Self::AlreadyCancelled { order } => order,
        }
    }

    pub fn into_order(self) -> OrderDetails {
        match self {
            Self::Cancelled { order, .. } | Self::AlreadyCancelled { order } => order,
        }
    }
}

/// Order reads, cancellation and administrative status changes.
///
/// Cancellation never deletes rows: items are flagged with a timestamp and
/// reason and the order status flips to `cancelled`. Cancelling the last
/// active item cancels the order in the same transaction.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Lists the user's orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        user_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let page = page.max(1);
        let per_page = per_page.max(1);

        let paginator = OrderEntity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        let mut details = Vec::with_capacity(orders.len());
        for order in orders {
            details.push(load_order_details(&*self.db, order).await?);
        }

        Ok(OrderListResponse {
            orders: details,
            total,
            page,
            per_page,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderDetails, ServiceError> {
        let order = find_owned_order(&*self.db, user_id, order_id).await?;
        load_order_details(&*self.db, order).await
    }

    /// Looks up one of the user's orders by its public 8-character order id.
    /// Lowercase input is accepted; anything else that is not a well-formed
    /// id is simply not found.
    #[instrument(skip(self))]
    pub async fn get_order_by_number(
        &self,
        user_id: Uuid,
        order_number: &str,
    ) -> Result<OrderDetails, ServiceError> {
        let order_number = order_number.trim().to_ascii_uppercase();
        if !is_valid_order_number(&order_number) {
            return Err(ServiceError::NotFound(format!(
                "Order {} not found",
                order_number
            )));
        }

        let order = OrderEntity::find()
            .filter(order::Column::OrderNumber.eq(order_number.as_str()))
            .filter(order::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_number)))?;
        load_order_details(&*self.db, order).await
    }

    /// Cancels one item of the user's order.
    ///
    /// # Errors
    ///
    /// * `NotFound` - the item does not exist or belongs to someone else
    /// * `Conflict` - the order has already shipped or been delivered
    #[instrument(skip(self))]
    pub async fn cancel_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        reason: Option<String>,
    ) -> Result<CancellationOutcome, ServiceError> {
        let txn = self.db.begin().await?;

        let item = OrderItemEntity::find_by_id(item_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order item {} not found", item_id)))?;

        let order = OrderEntity::find_by_id(item.order_id)
            .filter(order::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order item {} not found", item_id)))?;

        if item.is_cancelled || order.status == OrderStatus::Cancelled {
            let order = load_order_details(&txn, order).await?;
            return Ok(CancellationOutcome::AlreadyCancelled { order });
        }

        ensure_cancellable(&order)?;

        let now = Utc::now();
        let order_id = order.id;
        let mut active_item: order_item::ActiveModel = item.into();
        active_item.is_cancelled = Set(true);
        active_item.cancelled_at = Set(Some(now));
        active_item.cancellation_reason = Set(Some(
            reason.unwrap_or_else(|| CUSTOMER_CANCELLATION_REASON.to_string()),
        ));
        active_item.update(&txn).await?;

        let remaining = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .filter(order_item::Column::IsCancelled.eq(false))
            .count(&txn)
            .await?;

        let order_cancelled = remaining == 0;
        let mut active_order: order::ActiveModel = order.into();
        if order_cancelled {
            active_order.status = Set(OrderStatus::Cancelled);
        }
        active_order.updated_at = Set(now);
        let order = active_order.update(&txn).await?;

        let details = load_order_details(&txn, order).await?;
        txn.commit().await?;

        info!(
            "Cancelled item {} of order {} (order cancelled: {})",
            item_id, details.order.order_number, order_cancelled
        );
        Ok(CancellationOutcome::Cancelled {
            order: details,
            order_cancelled,
        })
    }

    /// Cancels the whole order and every active item in it.
    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        reason: Option<String>,
    ) -> Result<CancellationOutcome, ServiceError> {
        let txn = self.db.begin().await?;
        let order = find_owned_order(&txn, user_id, order_id).await?;

        if order.status == OrderStatus::Cancelled {
            let order = load_order_details(&txn, order).await?;
            return Ok(CancellationOutcome::AlreadyCancelled { order });
        }

        ensure_cancellable(&order)?;

        let reason = reason.unwrap_or_else(|| CUSTOMER_CANCELLATION_REASON.to_string());
        let order = cancel_order_in_txn(&txn, order, reason).await?;
        let details = load_order_details(&txn, order).await?;
        txn.commit().await?;

        info!("Cancelled order {}", details.order.order_number);
        Ok(CancellationOutcome::Cancelled {
            order: details,
            order_cancelled: true,
        })
    }

    /// Administrative status change along the allowed lifecycle edges.
    ///
    /// Moving to `cancelled` goes through whole-order cancellation so the
    /// items are flagged as well.
    #[instrument(skip(self))]
    pub async fn advance_status(
        &self,
        order_id: Uuid,
        target: OrderStatus,
        reason: Option<String>,
    ) -> Result<OrderDetails, ServiceError> {
        let txn = self.db.begin().await?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if !order.status.can_transition_to(target) {
            return Err(ServiceError::ValidationError(format!(
                "Cannot change order status from {} to {}",
                order.status, target
            )));
        }

        let from = order.status;
        let order = if target == OrderStatus::Cancelled {
            let reason = reason.unwrap_or_else(|| ADMIN_CANCELLATION_REASON.to_string());
            cancel_order_in_txn(&txn, order, reason).await?
        } else {
            let mut active: order::ActiveModel = order.into();
            active.status = Set(target);
            active.updated_at = Set(Utc::now());
            active.update(&txn).await?
        };

        let details = load_order_details(&txn, order).await?;
        txn.commit().await?;

        info!(
            "Order {} moved from {} to {}",
            details.order.order_number, from, target
        );
        Ok(details)
    }
}

fn ensure_cancellable(order: &OrderModel) -> Result<(), ServiceError> {
    if order.status.is_cancellable() {
        Ok(())
    } else {
        Err(ServiceError::Conflict(format!(
            "Order {} has already been {} and can no longer be cancelled",
            order.order_number, order.status
        )))
    }
}

async fn cancel_order_in_txn(
    txn: &DatabaseTransaction,
    order: OrderModel,
    reason: String,
) -> Result<OrderModel, ServiceError> {
    let now = Utc::now();

    OrderItemEntity::update_many()
        .col_expr(order_item::Column::IsCancelled, Expr::value(true))
        .col_expr(order_item::Column::CancelledAt, Expr::value(now))
        .col_expr(order_item::Column::CancellationReason, Expr::value(reason))
        .filter(order_item::Column::OrderId.eq(order.id))
        .filter(order_item::Column::IsCancelled.eq(false))
        .exec(txn)
        .await?;

    let mut active: order::ActiveModel = order.into();
    active.status = Set(OrderStatus::Cancelled);
    active.updated_at = Set(now);
    Ok(active.update(txn).await?)
}

/// Order owned by `user_id`, or `NotFound` for missing and foreign orders alike.
pub(crate) async fn find_owned_order<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    order_id: Uuid,
) -> Result<OrderModel, ServiceError> {
    OrderEntity::find_by_id(order_id)
        .filter(order::Column::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
}

pub(crate) async fn load_order_details<C: ConnectionTrait>(
    conn: &C,
    order: OrderModel,
) -> Result<OrderDetails, ServiceError> {
    let items = OrderItemEntity::find()
        .filter(order_item::Column::OrderId.eq(order.id))
        .order_by_asc(order_item::Column::ProductName)
        .order_by_asc(order_item::Column::Id)
        .all(conn)
        .await?;
    Ok(OrderDetails::new(order, items))
}
