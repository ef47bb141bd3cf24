//! Property-based tests for the storefront invariants.

mod common;

use std::collections::HashSet;

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use storefront_api::{
    entities::{OrderItemModel, OrderModel, OrderStatus},
    services::{
        commerce::{
            order_number::{generate_order_number, is_valid_order_number},
            AddToCartInput, CartService,
        },
        orders::OrderDetails,
    },
};
use uuid::Uuid;

fn price_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn line_strategy() -> impl Strategy<Value = (Decimal, i32, bool)> {
    (price_strategy(), 1i32..50, any::<bool>())
}

fn order_with_items(lines: &[(Decimal, i32, bool)]) -> OrderDetails {
    let order_id = Uuid::new_v4();
    let items: Vec<OrderItemModel> = lines
        .iter()
        .map(|(price, quantity, cancelled)| OrderItemModel {
            id: Uuid::new_v4(),
            order_id,
            product_id: Uuid::new_v4(),
            product_name: "Item".into(),
            quantity: *quantity,
            price: *price,
            size: None,
            is_cancelled: *cancelled,
            cancelled_at: None,
            cancellation_reason: None,
        })
        .collect();
    let total = items
        .iter()
        .map(|i| i.price * Decimal::from(i.quantity))
        .sum();

    OrderDetails::new(
        OrderModel {
            id: order_id,
            user_id: Uuid::new_v4(),
            order_number: generate_order_number(),
            status: OrderStatus::Pending,
            total_amount: total,
            phone: "5550100".into(),
            shipping_address: "1 Main St".into(),
            city: "Springfield".into(),
            state: "IL".into(),
            zip_code: "62701".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        },
        items,
    )
}

#[test]
fn ten_thousand_order_ids_are_well_formed_and_distinct() {
    let mut seen = HashSet::with_capacity(10_000);
    for _ in 0..10_000 {
        let id = generate_order_number();
        assert!(!id.is_empty());
        assert!(is_valid_order_number(&id), "malformed order id {id}");
        seen.insert(id);
    }
    assert_eq!(seen.len(), 10_000);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn active_total_never_exceeds_snapshot_total(
        lines in prop::collection::vec(line_strategy(), 1..8)
    ) {
        let details = order_with_items(&lines);

        let expected_active: Decimal = lines
            .iter()
            .filter(|(_, _, cancelled)| !cancelled)
            .map(|(price, qty, _)| *price * Decimal::from(*qty))
            .sum();

        prop_assert_eq!(details.active_total, expected_active);
        prop_assert!(details.active_total <= details.order.total_amount);
        prop_assert_eq!(
            details.active_items().count(),
            lines.iter().filter(|(_, _, c)| !c).count()
        );
    }

    #[test]
    fn order_number_validator_accepts_only_the_generated_shape(candidate in "[A-Za-z0-9-]{0,12}") {
        let expected = candidate.len() == 8
            && candidate.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
        prop_assert_eq!(is_valid_order_number(&candidate), expected);
    }
}

proptest! {
    // Each case spins up a database; keep the count small.
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn repeated_adds_merge_into_one_line(quantities in prop::collection::vec(1i32..20, 1..6)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let (lines, quantity) = runtime.block_on(async {
            let app = common::TestApp::new().await;
            let carts = CartService::new(app.db());
            let category = app.create_category(false).await;
            let product = app
                .create_product(&category, Decimal::new(1000, 2), 100)
                .await;
            let user = Uuid::new_v4();

            for quantity in &quantities {
                carts
                    .add_item(
                        user,
                        AddToCartInput {
                            product_id: product.id,
                            quantity: *quantity,
                            size: None,
                        },
                    )
                    .await
                    .unwrap();
            }

            let cart = carts.get_cart(user).await.unwrap();
            (cart.lines.len(), cart.total_quantity)
        });

        prop_assert_eq!(lines, 1);
        prop_assert_eq!(quantity, quantities.iter().sum::<i32>());
    }
}
