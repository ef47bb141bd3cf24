use crate::handlers::common::{
    created_response, map_service_error, success_response, validate_input,
};
use crate::{
    auth::AuthUser,
    entities::commerce::Size,
    errors::ApiError,
    services::commerce::{BuyNowInput, ShippingDetails},
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Creates the router for checkout endpoints
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout", get(checkout_preview).post(checkout_cart))
        .route("/checkout/cart-items/:line_id", post(checkout_cart_line))
        .route("/checkout/buy-now", post(buy_now))
}

/// What a full-cart checkout would buy
async fn checkout_preview(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .services
        .checkout
        .checkout_preview(user.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(summary))
}

/// Place an order for every line in the cart
async fn checkout_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(shipping): Json<ShippingDetails>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&shipping)?;

    let order = state
        .services
        .checkout
        .checkout_cart(user.user_id, shipping)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(order))
}

/// Place an order for a single cart line
async fn checkout_cart_line(
    State(state): State<AppState>,
    user: AuthUser,
    Path(line_id): Path<Uuid>,
    Json(shipping): Json<ShippingDetails>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&shipping)?;

    let order = state
        .services
        .checkout
        .checkout_cart_line(user.user_id, line_id, shipping)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(order))
}

/// Buy a product directly without touching the cart
async fn buy_now(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<BuyNowRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let input = BuyNowInput {
        product_id: payload.product_id,
        quantity: payload.quantity,
        size: payload.size,
    };

    let order = state
        .services
        .checkout
        .buy_now(user.user_id, input, payload.shipping)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(order))
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct BuyNowRequest {
    pub product_id: Uuid,
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, max = 999, message = "Quantity must be between 1 and 999"))]
    pub quantity: i32,
    pub size: Option<Size>,
    #[validate]
    pub shipping: ShippingDetails,
}

fn default_quantity() -> i32 {
    1
}
