use crate::handlers::common::{
    created_response, map_service_error, message_response, no_content_response, success_response,
};
use crate::{
    auth::AuthUser, errors::ApiError, services::commerce::WishlistAddOutcome, AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use uuid::Uuid;

pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/wishlist", get(list_wishlist))
        .route(
            "/wishlist/:product_id",
            post(add_to_wishlist).delete(remove_from_wishlist),
        )
}

async fn list_wishlist(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state
        .services
        .wishlist
        .list(user.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(entries))
}

/// Adding a product that is already saved answers 200 with a message
async fn add_to_wishlist(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .services
        .wishlist
        .add(user.user_id, product_id)
        .await
        .map_err(map_service_error)?;

    Ok(match outcome {
        WishlistAddOutcome::Added(entry) => created_response(entry),
        WishlistAddOutcome::AlreadyPresent(entry) => {
            message_response(entry, "Product is already in your wishlist")
        }
    })
}

async fn remove_from_wishlist(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .wishlist
        .remove(user.user_id, product_id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}
