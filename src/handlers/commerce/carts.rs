use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
};
use crate::{
    auth::AuthUser,
    entities::commerce::Size,
    errors::ApiError,
    services::commerce::AddToCartInput,
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Creates the router for cart endpoints
pub fn carts_routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(get_cart))
        .route("/cart/items", post(add_to_cart))
        .route(
            "/cart/items/:line_id",
            put(update_cart_item).delete(remove_cart_item),
        )
}

/// Get the caller's cart with line totals
async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .cart
        .get_cart(user.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

/// Add item to cart; an existing (product, size) line is incremented
async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let input = AddToCartInput {
        product_id: payload.product_id,
        quantity: payload.quantity,
        size: payload.size,
    };

    let line = state
        .services
        .cart
        .add_item(user.user_id, input)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(line))
}

/// Update a line's quantity; zero or less removes it. Returns the cart.
async fn update_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(line_id): Path<Uuid>,
    Json(payload): Json<UpdateItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    state
        .services
        .cart
        .update_item_quantity(user.user_id, line_id, payload.quantity)
        .await
        .map_err(map_service_error)?;

    let cart = state
        .services
        .cart
        .get_cart(user.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

async fn remove_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(line_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .cart
        .remove_item(user.user_id, line_id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}

// Request DTOs

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, max = 999, message = "Quantity must be between 1 and 999"))]
    pub quantity: i32,
    pub size: Option<Size>,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateItemRequest {
    /// Zero or less removes the line.
    #[validate(range(max = 999, message = "Quantity must be at most 999"))]
    pub quantity: i32,
}
