use crate::auth::AuthUser;
use crate::handlers::common::{
    created_response, map_service_error, success_response, validate_input,
};
use crate::{
    errors::ApiError,
    services::commerce::{AddReviewInput, ProductQuery},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use uuid::Uuid;

/// Public catalog routes.
///
/// Product detail and the review routes share the `:product` segment; the
/// detail route reads it as a slug, the review routes as a product id.
/// Posting a review authenticates through the [`AuthUser`] extractor.
pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/products", get(list_products))
        .route("/products/:product", get(product_detail))
        .route(
            "/products/:product/reviews",
            get(list_reviews).post(add_review),
        )
}

/// List active categories
async fn list_categories(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let categories = state
        .services
        .catalog
        .list_categories()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(categories))
}

/// Search and page through available products
async fn list_products(
    State(state): State<AppState>,
    Query(mut query): Query<ProductQuery>,
) -> Result<impl IntoResponse, ApiError> {
    query.per_page = Some(state.config.clamp_page_size(query.per_page));
    query.search = query
        .search
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let page = state
        .services
        .catalog
        .list_products(query)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(page))
}

async fn product_detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state
        .services
        .catalog
        .product_detail(&slug)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(detail))
}

/// Reviews of a product, newest first
async fn list_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let reviews = state
        .services
        .reviews
        .list_reviews(product_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(reviews))
}

async fn add_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<AddReviewInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let review = state
        .services
        .reviews
        .add_review(user.user_id, product_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(review))
}
