use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;

use crate::handlers::common::{
    map_service_error, message_response, success_response, validate_input, PaginationParams,
};
use crate::services::orders::{CancelRequest, CancellationOutcome, UpdateOrderStatusRequest};
use crate::{auth::AuthUser, errors::ApiError, AppState};

/// Routes for the caller's own orders
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/:order_id", get(get_order))
        .route("/orders/number/:order_number", get(get_order_by_number))
        .route("/orders/:order_id/cancel", post(cancel_order))
        .route("/orders/items/:item_id/cancel", post(cancel_order_item))
}

/// Administrative order routes; the caller must layer admin authorization.
pub fn admin_orders_routes() -> Router<AppState> {
    Router::new().route("/admin/orders/:order_id/status", put(update_order_status))
}

/// List the caller's orders, newest first
async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let per_page = state.config.clamp_page_size(Some(params.per_page));

    let orders = state
        .services
        .orders
        .list_orders(user.user_id, params.page, per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(orders))
}

async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .get_order(user.user_id, order_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Order confirmation lookup by the public order id shown to the customer
async fn get_order_by_number(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_number): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .get_order_by_number(user.user_id, &order_number)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Cancel the whole order. The body is optional.
async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
    payload: Option<Json<CancelRequest>>,
) -> Result<Response, ApiError> {
    let request = payload.map(|Json(p)| p).unwrap_or_default();
    validate_input(&request)?;

    let outcome = state
        .services
        .orders
        .cancel_order(user.user_id, order_id, request.reason)
        .await
        .map_err(map_service_error)?;

    Ok(match outcome {
        CancellationOutcome::Cancelled { order, .. } => {
            message_response(order, "Order cancelled")
        }
        CancellationOutcome::AlreadyCancelled { order } => {
            message_response(order, "Order is already cancelled")
        }
    })
}

/// Cancel one item. Cancelling the last active item cancels the order.
async fn cancel_order_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
    payload: Option<Json<CancelRequest>>,
) -> Result<Response, ApiError> {
    let request = payload.map(|Json(p)| p).unwrap_or_default();
    validate_input(&request)?;

    let outcome = state
        .services
        .orders
        .cancel_item(user.user_id, item_id, request.reason)
        .await
        .map_err(map_service_error)?;

    Ok(match outcome {
        CancellationOutcome::Cancelled {
            order,
            order_cancelled: true,
        } => message_response(
            order,
            "Item cancelled; no active items remain so the order was cancelled",
        ),
        CancellationOutcome::Cancelled { order, .. } => message_response(order, "Item cancelled"),
        CancellationOutcome::AlreadyCancelled { order } => {
            message_response(order, "Item is already cancelled")
        }
    })
}

/// Move an order along its lifecycle (admin only)
async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let order = state
        .services
        .orders
        .advance_status(order_id, payload.status, payload.reason)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}
