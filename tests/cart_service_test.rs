mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use storefront_api::{
    entities::commerce::Size,
    errors::ServiceError,
    services::commerce::{AddToCartInput, CartService, MAX_LINE_QUANTITY},
};
use uuid::Uuid;

fn add(product_id: Uuid, quantity: i32, size: Option<Size>) -> AddToCartInput {
    AddToCartInput {
        product_id,
        quantity,
        size,
    }
}

#[tokio::test]
async fn adding_same_product_and_size_merges_quantities() {
    let app = TestApp::new().await;
    let carts = CartService::new(app.db());
    let category = app.create_category(true).await;
    let product = app.create_product(&category, dec!(40.00), 20).await;
    let user = Uuid::new_v4();

    let first = carts
        .add_item(user, add(product.id, 2, Some(Size::M)))
        .await
        .unwrap();
    let second = carts
        .add_item(user, add(product.id, 3, Some(Size::M)))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.quantity, 5);

    let cart = carts.get_cart(user).await.unwrap();
    assert_eq!(cart.lines.len(), 1);
    assert_eq!(cart.total_quantity, 5);
    assert_eq!(cart.subtotal, dec!(200.00));
}

#[tokio::test]
async fn different_size_creates_a_separate_line() {
    let app = TestApp::new().await;
    let carts = CartService::new(app.db());
    let category = app.create_category(true).await;
    let product = app.create_product(&category, dec!(10.00), 20).await;
    let user = Uuid::new_v4();

    carts
        .add_item(user, add(product.id, 1, Some(Size::S)))
        .await
        .unwrap();
    carts
        .add_item(user, add(product.id, 1, Some(Size::Xl)))
        .await
        .unwrap();

    let cart = carts.get_cart(user).await.unwrap();
    assert_eq!(cart.lines.len(), 2);
    assert_eq!(cart.total_quantity, 2);
}

#[tokio::test]
async fn sizeless_lines_merge_for_categories_without_sizes() {
    let app = TestApp::new().await;
    let carts = CartService::new(app.db());
    let category = app.create_category(false).await;
    let product = app.create_product(&category, dec!(12.50), 20).await;
    let user = Uuid::new_v4();

    carts.add_item(user, add(product.id, 1, None)).await.unwrap();
    let line = carts.add_item(user, add(product.id, 4, None)).await.unwrap();

    assert_eq!(line.quantity, 5);
    assert_eq!(carts.get_cart(user).await.unwrap().lines.len(), 1);
}

#[tokio::test]
async fn size_is_required_when_category_demands_it() {
    let app = TestApp::new().await;
    let carts = CartService::new(app.db());
    let category = app.create_category(true).await;
    let product = app.create_product(&category, dec!(10.00), 20).await;
    let user = Uuid::new_v4();

    let result = carts.add_item(user, add(product.id, 1, None)).await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
    assert!(carts.get_cart(user).await.unwrap().lines.is_empty());
}

#[tokio::test]
async fn non_positive_quantity_and_unavailable_products_are_rejected() {
    let app = TestApp::new().await;
    let carts = CartService::new(app.db());
    let category = app.create_category(false).await;
    let product = app.create_product(&category, dec!(10.00), 20).await;
    let hidden = app
        .create_product_with(&category, dec!(10.00), None, 20, false)
        .await;
    let user = Uuid::new_v4();

    assert_matches!(
        carts.add_item(user, add(product.id, 0, None)).await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        carts.add_item(user, add(hidden.id, 1, None)).await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        carts.add_item(user, add(Uuid::new_v4(), 1, None)).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn updating_to_zero_removes_the_line() {
    let app = TestApp::new().await;
    let carts = CartService::new(app.db());
    let category = app.create_category(false).await;
    let product = app.create_product(&category, dec!(10.00), 20).await;
    let user = Uuid::new_v4();

    let line = carts.add_item(user, add(product.id, 2, None)).await.unwrap();

    let updated = carts.update_item_quantity(user, line.id, 7).await.unwrap();
    assert_eq!(updated.map(|l| l.quantity), Some(7));

    let removed = carts.update_item_quantity(user, line.id, 0).await.unwrap();
    assert!(removed.is_none());
    assert!(carts.get_cart(user).await.unwrap().lines.is_empty());
}

#[tokio::test]
async fn other_users_lines_are_not_found() {
    let app = TestApp::new().await;
    let carts = CartService::new(app.db());
    let category = app.create_category(false).await;
    let product = app.create_product(&category, dec!(10.00), 20).await;
    let owner = Uuid::new_v4();
    let intruder = Uuid::new_v4();

    let line = carts.add_item(owner, add(product.id, 2, None)).await.unwrap();

    assert_matches!(
        carts.update_item_quantity(intruder, line.id, 9).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        carts.remove_item(intruder, line.id).await,
        Err(ServiceError::NotFound(_))
    );

    let cart = carts.get_cart(owner).await.unwrap();
    assert_eq!(cart.lines[0].quantity, 2);
}

#[tokio::test]
async fn cart_prices_use_the_discounted_price() {
    let app = TestApp::new().await;
    let carts = CartService::new(app.db());
    let category = app.create_category(false).await;
    let product = app
        .create_product_with(&category, dec!(100.00), Some(dec!(80.00)), 5, true)
        .await;
    let user = Uuid::new_v4();

    carts.add_item(user, add(product.id, 2, None)).await.unwrap();

    let cart = carts.get_cart(user).await.unwrap();
    assert_eq!(cart.lines[0].unit_price, dec!(80.00));
    assert_eq!(cart.subtotal, dec!(160.00));
}

#[tokio::test]
async fn merged_quantity_is_capped_without_overflow() {
    let app = TestApp::new().await;
    let carts = CartService::new(app.db());
    let category = app.create_category(true).await;
    let product = app.create_product(&category, dec!(1.00), 5).await;
    let user = Uuid::new_v4();

    assert_matches!(
        carts
            .add_item(user, add(product.id, i32::MAX, Some(Size::M)))
            .await,
        Err(ServiceError::ValidationError(_))
    );

    carts
        .add_item(user, add(product.id, MAX_LINE_QUANTITY, Some(Size::M)))
        .await
        .unwrap();
    assert_matches!(
        carts
            .add_item(user, add(product.id, MAX_LINE_QUANTITY, Some(Size::M)))
            .await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        carts.add_item(user, add(product.id, 1, Some(Size::M))).await,
        Err(ServiceError::ValidationError(_))
    );

    let cart = carts.get_cart(user).await.unwrap();
    assert_eq!(cart.lines.len(), 1);
    assert_eq!(cart.lines[0].quantity, MAX_LINE_QUANTITY);

    assert_matches!(
        carts
            .update_item_quantity(user, cart.lines[0].id, MAX_LINE_QUANTITY + 1)
            .await,
        Err(ServiceError::ValidationError(_))
    );
    assert_eq!(
        carts.get_cart(user).await.unwrap().total_quantity,
        MAX_LINE_QUANTITY
    );
}
