mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use storefront_api::{
    errors::ServiceError,
    services::commerce::{
        AddReviewInput, CatalogService, CreateProductInput, ProductQuery, ReviewService,
        WishlistAddOutcome, WishlistService,
    },
};
use uuid::Uuid;

fn review(rating: i32, comment: &str) -> AddReviewInput {
    AddReviewInput {
        rating,
        comment: comment.to_string(),
    }
}

#[tokio::test]
async fn product_listing_filters_and_paginates() {
    let app = TestApp::new().await;
    let catalog = CatalogService::new(app.db());
    let apparel = app.create_category(true).await;
    let home = app.create_category(false).await;

    for _ in 0..3 {
        app.create_product(&apparel, dec!(20.00), 5).await;
    }
    app.create_product(&home, dec!(9.00), 5).await;
    app.create_product_with(&home, dec!(9.00), None, 5, false)
        .await;

    let all = catalog.list_products(ProductQuery::default()).await.unwrap();
    assert_eq!(all.total, 4, "unavailable products are hidden");

    let apparel_page = catalog
        .list_products(ProductQuery {
            category: Some(apparel.slug.clone()),
            per_page: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(apparel_page.total, 3);
    assert_eq!(apparel_page.items.len(), 2);
    assert_eq!(apparel_page.total_pages, 2);

    let unknown = catalog
        .list_products(ProductQuery {
            category: Some("no-such-category".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(unknown.total, 0);
    assert!(unknown.items.is_empty());
}

#[tokio::test]
async fn product_search_matches_name_or_description() {
    let app = TestApp::new().await;
    let catalog = CatalogService::new(app.db());
    let category = app.create_category(false).await;

    catalog
        .create_product(CreateProductInput {
            category_id: category.id,
            name: "Linen Throw".into(),
            slug: "linen-throw".into(),
            description: "Washed blanket".into(),
            price: dec!(70.00),
            discount_price: None,
            stock: 3,
            is_available: true,
            color: None,
        })
        .await
        .unwrap();
    app.create_product(&category, dec!(5.00), 3).await;

    for term in ["linen", "BLANKET"] {
        let page = catalog
            .list_products(ProductQuery {
                search: Some(term.into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1, "search term {term}");
        assert_eq!(page.items[0].slug, "linen-throw");
    }
}

fn named_product(category_id: Uuid, name: &str, slug: &str) -> CreateProductInput {
    CreateProductInput {
        category_id,
        name: name.into(),
        slug: slug.into(),
        description: String::new(),
        price: dec!(12.00),
        discount_price: None,
        stock: 3,
        is_available: true,
        color: None,
    }
}

#[tokio::test]
async fn search_treats_wildcards_literally() {
    let app = TestApp::new().await;
    let catalog = CatalogService::new(app.db());
    let category = app.create_category(false).await;

    for (name, slug) in [
        ("Tee 50% off", "tee-50-off"),
        ("Tee 500 pack", "tee-500-pack"),
        ("snake_case mug", "snake-case-mug"),
        ("snakeXcase mug", "snakexcase-mug"),
    ] {
        catalog
            .create_product(named_product(category.id, name, slug))
            .await
            .unwrap();
    }

    for (term, expected) in [("50%", "tee-50-off"), ("e_c", "snake-case-mug")] {
        let page = catalog
            .list_products(ProductQuery {
                search: Some(term.into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1, "search term {term}");
        assert_eq!(page.items[0].slug, expected);
    }
}

#[tokio::test]
async fn curated_similar_products_take_precedence_over_category() {
    let app = TestApp::new().await;
    let catalog = CatalogService::new(app.db());
    let shoes = app.create_category(false).await;
    let socks = app.create_category(false).await;
    let sneaker = app.create_product(&shoes, dec!(80.00), 5).await;
    let other_shoe = app.create_product(&shoes, dec!(60.00), 5).await;
    let sock = app.create_product(&socks, dec!(5.00), 5).await;
    let hidden_sock = app
        .create_product_with(&socks, dec!(5.00), None, 5, false)
        .await;

    let detail = catalog.product_detail(&sneaker.slug).await.unwrap();
    assert_eq!(detail.similar_products.len(), 1);
    assert_eq!(detail.similar_products[0].id, other_shoe.id, "category fallback");

    catalog.add_similar_product(sneaker.id, sock.id).await.unwrap();
    catalog
        .add_similar_product(sneaker.id, hidden_sock.id)
        .await
        .unwrap();

    let detail = catalog.product_detail(&sneaker.slug).await.unwrap();
    let similar: Vec<Uuid> = detail.similar_products.iter().map(|p| p.id).collect();
    assert_eq!(similar, vec![sock.id]);
    assert_eq!(detail.related_products.len(), 1);
    assert_eq!(detail.related_products[0].id, other_shoe.id);

    // Links are one-way.
    let sock_detail = catalog.product_detail(&sock.slug).await.unwrap();
    assert!(sock_detail.similar_products.is_empty());

    assert_matches!(
        catalog.add_similar_product(sneaker.id, sock.id).await,
        Err(ServiceError::Conflict(_))
    );
    assert_matches!(
        catalog.add_similar_product(sneaker.id, sneaker.id).await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        catalog.add_similar_product(sneaker.id, Uuid::new_v4()).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn product_detail_includes_reviews_and_related_products() {
    let app = TestApp::new().await;
    let catalog = CatalogService::new(app.db());
    let reviews = ReviewService::new(app.db());
    let category = app.create_category(false).await;
    let product = app
        .create_product_with(&category, dec!(100.00), Some(dec!(75.00)), 5, true)
        .await;
    for _ in 0..5 {
        app.create_product(&category, dec!(10.00), 5).await;
    }

    reviews
        .add_review(Uuid::new_v4(), product.id, review(5, "Great"))
        .await
        .unwrap();
    reviews
        .add_review(Uuid::new_v4(), product.id, review(4, "Good"))
        .await
        .unwrap();

    let detail = catalog.product_detail(&product.slug).await.unwrap();
    assert_eq!(detail.product.final_price, dec!(75.00));
    assert_eq!(detail.product.discount_percentage, 25);
    assert_eq!(detail.review_count, 2);
    assert_eq!(detail.average_rating, Some(dec!(4.5)));
    assert_eq!(detail.related_products.len(), 4);
    assert!(detail.related_products.iter().all(|p| p.id != product.id));
    assert_eq!(detail.category.id, category.id);
}

#[tokio::test]
async fn duplicate_slugs_conflict() {
    let app = TestApp::new().await;
    let catalog = CatalogService::new(app.db());
    let category = app.create_category(false).await;
    let product = app.create_product(&category, dec!(10.00), 1).await;

    let result = catalog
        .create_product(CreateProductInput {
            category_id: category.id,
            name: "Copy".into(),
            slug: product.slug.clone(),
            description: String::new(),
            price: dec!(10.00),
            discount_price: None,
            stock: 1,
            is_available: true,
            color: None,
        })
        .await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));
}

#[tokio::test]
async fn one_review_per_user_and_product() {
    let app = TestApp::new().await;
    let reviews = ReviewService::new(app.db());
    let category = app.create_category(false).await;
    let product = app.create_product(&category, dec!(10.00), 1).await;
    let user = Uuid::new_v4();

    reviews
        .add_review(user, product.id, review(3, "Okay"))
        .await
        .unwrap();
    assert_matches!(
        reviews.add_review(user, product.id, review(5, "Better")).await,
        Err(ServiceError::Conflict(_))
    );
    assert_matches!(
        reviews
            .add_review(user, Uuid::new_v4(), review(5, "Ghost"))
            .await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        reviews
            .add_review(Uuid::new_v4(), product.id, review(9, "Too high"))
            .await,
        Err(ServiceError::ValidationError(_))
    );

    let listed = reviews.list_reviews(product.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].rating, 3);
}

#[tokio::test]
async fn wishlist_add_is_idempotent_and_remove_requires_entry() {
    let app = TestApp::new().await;
    let wishlist = WishlistService::new(app.db());
    let category = app.create_category(false).await;
    let first = app.create_product(&category, dec!(10.00), 1).await;
    let second = app.create_product(&category, dec!(20.00), 1).await;
    let user = Uuid::new_v4();

    let added = wishlist.add(user, first.id).await.unwrap();
    let entry_id = match added {
        WishlistAddOutcome::Added(entry) => entry.id,
        other => panic!("expected Added, got {:?}", other),
    };
    assert_matches!(
        wishlist.add(user, first.id).await,
        Ok(WishlistAddOutcome::AlreadyPresent(entry)) if entry.id == entry_id
    );
    wishlist.add(user, second.id).await.unwrap();

    let entries = wishlist.list(user).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].product.id, second.id);
    assert!(wishlist.list(Uuid::new_v4()).await.unwrap().is_empty());

    wishlist.remove(user, first.id).await.unwrap();
    assert_matches!(
        wishlist.remove(user, first.id).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        wishlist.add(user, Uuid::new_v4()).await,
        Err(ServiceError::NotFound(_))
    );
}
