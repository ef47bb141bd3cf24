mod common;

use assert_matches::assert_matches;
use common::{shipping, TestApp};
use rstest::rstest;
use rust_decimal_macros::dec;
use storefront_api::{
    entities::{commerce::Size, OrderStatus},
    errors::ServiceError,
    services::{
        commerce::{AddToCartInput, CartService, CheckoutService},
        orders::{CancellationOutcome, OrderDetails, OrderService},
    },
};
use uuid::Uuid;

/// Places an order with two items (2 x 100.00 and 1 x 50.00) for `user`.
async fn place_two_item_order(app: &TestApp, user: Uuid) -> OrderDetails {
    let carts = CartService::new(app.db());
    let category = app.create_category(true).await;
    let jacket = app.create_product(&category, dec!(100.00), 10).await;
    let shirt = app.create_product(&category, dec!(50.00), 10).await;

    for (product_id, quantity) in [(jacket.id, 2), (shirt.id, 1)] {
        carts
            .add_item(
                user,
                AddToCartInput {
                    product_id,
                    quantity,
                    size: Some(Size::M),
                },
            )
            .await
            .unwrap();
    }

    CheckoutService::new(app.db())
        .checkout_cart(user, shipping())
        .await
        .unwrap()
}

async fn advance(orders: &OrderService, order_id: Uuid, path: &[OrderStatus]) {
    for status in path {
        orders
            .advance_status(order_id, *status, None)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn cancelling_every_item_cancels_the_order() {
    let app = TestApp::new().await;
    let orders = OrderService::new(app.db());
    let user = Uuid::new_v4();
    let placed = place_two_item_order(&app, user).await;

    let first = orders
        .cancel_item(user, placed.items[0].id, Some("Changed my mind".into()))
        .await
        .unwrap();
    assert_matches!(
        &first,
        CancellationOutcome::Cancelled {
            order_cancelled: false,
            ..
        }
    );
    assert_eq!(first.order().order.status, OrderStatus::Pending);
    assert_eq!(first.order().active_items().count(), 1);
    assert_eq!(
        first.order().active_total,
        placed.items[1].price * rust_decimal::Decimal::from(placed.items[1].quantity)
    );
    // Snapshot total is unchanged by cancellation.
    assert_eq!(first.order().order.total_amount, dec!(250.00));

    let second = orders
        .cancel_item(user, placed.items[1].id, None)
        .await
        .unwrap();
    assert_matches!(
        &second,
        CancellationOutcome::Cancelled {
            order_cancelled: true,
            ..
        }
    );

    let order = orders.get_order(user, placed.order.id).await.unwrap();
    assert_eq!(order.order.status, OrderStatus::Cancelled);
    assert!(order.items.iter().all(|i| i.is_cancelled));
    assert!(order.items.iter().all(|i| i.cancelled_at.is_some()));
    assert_eq!(
        order.items[0].cancellation_reason.as_deref(),
        Some("Changed my mind")
    );
    assert_eq!(order.active_total, dec!(0));
}

#[tokio::test]
async fn recancelling_is_reported_as_already_cancelled() {
    let app = TestApp::new().await;
    let orders = OrderService::new(app.db());
    let user = Uuid::new_v4();
    let placed = place_two_item_order(&app, user).await;
    let item_id = placed.items[0].id;

    orders.cancel_item(user, item_id, None).await.unwrap();
    assert_matches!(
        orders.cancel_item(user, item_id, None).await,
        Ok(CancellationOutcome::AlreadyCancelled { .. })
    );

    orders.cancel_order(user, placed.order.id, None).await.unwrap();
    assert_matches!(
        orders.cancel_order(user, placed.order.id, None).await,
        Ok(CancellationOutcome::AlreadyCancelled { .. })
    );
    // Items of a cancelled order are already cancelled too.
    assert_matches!(
        orders.cancel_item(user, placed.items[1].id, None).await,
        Ok(CancellationOutcome::AlreadyCancelled { .. })
    );
}

#[tokio::test]
async fn whole_order_cancellation_flags_every_item() {
    let app = TestApp::new().await;
    let orders = OrderService::new(app.db());
    let user = Uuid::new_v4();
    let placed = place_two_item_order(&app, user).await;

    let outcome = orders
        .cancel_order(user, placed.order.id, Some("Ordered twice".into()))
        .await
        .unwrap();

    let details = outcome.into_order();
    assert_eq!(details.order.status, OrderStatus::Cancelled);
    assert!(details.items.iter().all(|i| i.is_cancelled));
    assert!(details
        .items
        .iter()
        .all(|i| i.cancellation_reason.as_deref() == Some("Ordered twice")));
}

#[rstest]
#[case::shipped(&[OrderStatus::Confirmed, OrderStatus::Shipped])]
#[case::delivered(&[OrderStatus::Confirmed, OrderStatus::Shipped, OrderStatus::Delivered])]
#[tokio::test]
async fn shipped_orders_cannot_be_cancelled(#[case] path: &[OrderStatus]) {
    let app = TestApp::new().await;
    let orders = OrderService::new(app.db());
    let user = Uuid::new_v4();
    let placed = place_two_item_order(&app, user).await;
    advance(&orders, placed.order.id, path).await;

    assert_matches!(
        orders.cancel_item(user, placed.items[0].id, None).await,
        Err(ServiceError::Conflict(_))
    );
    assert_matches!(
        orders.cancel_order(user, placed.order.id, None).await,
        Err(ServiceError::Conflict(_))
    );

    let order = orders.get_order(user, placed.order.id).await.unwrap();
    assert_eq!(Some(&order.order.status), path.last());
    assert!(order.items.iter().all(|i| !i.is_cancelled));
}

#[tokio::test]
async fn confirmed_orders_can_still_be_cancelled() {
    let app = TestApp::new().await;
    let orders = OrderService::new(app.db());
    let user = Uuid::new_v4();
    let placed = place_two_item_order(&app, user).await;
    advance(&orders, placed.order.id, &[OrderStatus::Confirmed]).await;

    let outcome = orders
        .cancel_order(user, placed.order.id, None)
        .await
        .unwrap();
    assert_eq!(outcome.order().order.status, OrderStatus::Cancelled);
}

#[rstest]
#[case::skip_to_shipped(&[], OrderStatus::Shipped)]
#[case::backwards(&[OrderStatus::Confirmed], OrderStatus::Pending)]
#[case::cancel_after_shipping(&[OrderStatus::Confirmed, OrderStatus::Shipped], OrderStatus::Cancelled)]
#[case::revive_cancelled(&[OrderStatus::Cancelled], OrderStatus::Pending)]
#[tokio::test]
async fn invalid_status_edges_are_rejected(
    #[case] path: &[OrderStatus],
    #[case] target: OrderStatus,
) {
    let app = TestApp::new().await;
    let orders = OrderService::new(app.db());
    let user = Uuid::new_v4();
    let placed = place_two_item_order(&app, user).await;
    advance(&orders, placed.order.id, path).await;

    assert_matches!(
        orders.advance_status(placed.order.id, target, None).await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn admin_cancellation_goes_through_item_cancellation() {
    let app = TestApp::new().await;
    let orders = OrderService::new(app.db());
    let user = Uuid::new_v4();
    let placed = place_two_item_order(&app, user).await;

    let details = orders
        .advance_status(placed.order.id, OrderStatus::Cancelled, None)
        .await
        .unwrap();

    assert_eq!(details.order.status, OrderStatus::Cancelled);
    assert!(details.items.iter().all(|i| i.is_cancelled));
    assert!(details
        .items
        .iter()
        .all(|i| i.cancellation_reason.as_deref() == Some("Cancelled by administrator")));
}

#[tokio::test]
async fn full_forward_lifecycle() {
    let app = TestApp::new().await;
    let orders = OrderService::new(app.db());
    let user = Uuid::new_v4();
    let placed = place_two_item_order(&app, user).await;

    advance(
        &orders,
        placed.order.id,
        &[
            OrderStatus::Confirmed,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ],
    )
    .await;

    let order = orders.get_order(user, placed.order.id).await.unwrap();
    assert_eq!(order.order.status, OrderStatus::Delivered);
}

#[tokio::test]
async fn foreign_orders_and_items_are_not_found() {
    let app = TestApp::new().await;
    let orders = OrderService::new(app.db());
    let owner = Uuid::new_v4();
    let intruder = Uuid::new_v4();
    let placed = place_two_item_order(&app, owner).await;

    assert_matches!(
        orders.get_order(intruder, placed.order.id).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        orders.cancel_order(intruder, placed.order.id, None).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        orders.cancel_item(intruder, placed.items[0].id, None).await,
        Err(ServiceError::NotFound(_))
    );

    let order = orders.get_order(owner, placed.order.id).await.unwrap();
    assert_eq!(order.order.status, OrderStatus::Pending);
    assert!(order.items.iter().all(|i| !i.is_cancelled));
}

#[tokio::test]
async fn orders_are_listed_newest_first_per_user() {
    let app = TestApp::new().await;
    let orders = OrderService::new(app.db());
    let user = Uuid::new_v4();
    let older = place_two_item_order(&app, user).await;
    let newer = place_two_item_order(&app, user).await;
    place_two_item_order(&app, Uuid::new_v4()).await;

    let page = orders.list_orders(user, 1, 10).await.unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.orders[0].order.id, newer.order.id);
    assert_eq!(page.orders[1].order.id, older.order.id);
    assert_eq!(page.orders[0].items.len(), 2);
}

#[tokio::test]
async fn orders_are_found_by_their_public_id() {
    let app = TestApp::new().await;
    let orders = OrderService::new(app.db());
    let owner = Uuid::new_v4();
    let placed = place_two_item_order(&app, owner).await;
    let number = placed.order.order_number.clone();

    let found = orders.get_order_by_number(owner, &number).await.unwrap();
    assert_eq!(found.order.id, placed.order.id);
    assert_eq!(found.items.len(), 2);

    let lowercase = orders
        .get_order_by_number(owner, &number.to_lowercase())
        .await
        .unwrap();
    assert_eq!(lowercase.order.id, placed.order.id);

    assert_matches!(
        orders.get_order_by_number(Uuid::new_v4(), &number).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        orders.get_order_by_number(owner, "NOPE").await,
        Err(ServiceError::NotFound(_))
    );
}
