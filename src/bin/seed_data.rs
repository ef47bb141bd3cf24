//! Seed data script - populates the database with a demo catalog
//!
//! Run with: cargo run --bin seed-data
//!
//! This creates:
//! - 3 categories (apparel requires a size, the others do not)
//! - 8 products, a couple of them discounted
//! - hand-picked similar-product links across categories
//! - bearer tokens for a demo shopper and a demo administrator

use anyhow::Context;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use storefront_api::{
    auth::{AuthConfig, AuthService, ADMIN_ROLE},
    config,
    db,
    entities::commerce::{CategoryModel, ProductModel},
    errors::ServiceError,
    services::commerce::{
        AddProductImageInput, CatalogService, CreateCategoryInput, CreateProductInput,
    },
};

/// (product, similar product) slug pairs
const SIMILAR_LINKS: &[(&str, &str)] = &[
    ("denim-jacket", "leather-belt"),
    ("classic-cotton-tee", "canvas-tote"),
    ("wool-sweater", "linen-throw"),
];

struct SeedProduct {
    name: &'static str,
    slug: &'static str,
    description: &'static str,
    price: Decimal,
    discount_price: Option<Decimal>,
    stock: i32,
    color: Option<&'static str>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    info!("=== Storefront Seed Data ===");

    let pool = db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to the database")?;
    db::run_migrations(&pool)
        .await
        .context("failed to run migrations")?;

    let catalog = CatalogService::new(Arc::new(pool));

    let apparel = seed_category(&catalog, "Apparel", "apparel", true).await?;
    let accessories = seed_category(&catalog, "Accessories", "accessories", false).await?;
    let home = seed_category(&catalog, "Home", "home", false).await?;

    let mut created = HashMap::new();
    for (category, products) in [
        (&apparel, apparel_products()),
        (&accessories, accessory_products()),
        (&home, home_products()),
    ] {
        if let Some(category) = category {
            for product in products {
                if let Some(product) = seed_product(&catalog, category, product).await? {
                    created.insert(product.slug.clone(), product.id);
                }
            }
        }
    }
    info!("Created {} products", created.len());

    let mut linked = 0;
    for (from, to) in SIMILAR_LINKS {
        if let (Some(from), Some(to)) = (created.get(*from), created.get(*to)) {
            catalog.add_similar_product(*from, *to).await?;
            linked += 1;
        }
    }
    info!("Linked {} similar products", linked);

    let auth = AuthService::new(AuthConfig::from(&cfg));
    let shopper = Uuid::new_v4();
    let admin = Uuid::new_v4();
    let shopper_token = auth.issue_token(shopper, &[])?;
    let admin_token = auth.issue_token(admin, &[ADMIN_ROLE])?;

    info!("=== Seed Data Complete ===");
    info!("Demo shopper {}:", shopper);
    info!("  Authorization: Bearer {}", shopper_token);
    info!("Demo administrator {}:", admin);
    info!("  Authorization: Bearer {}", admin_token);
    info!("Try these API calls:");
    info!("  curl http://localhost:{}/api/v1/products", cfg.port);
    info!(
        "  curl -H 'Authorization: Bearer <token>' http://localhost:{}/api/v1/cart",
        cfg.port
    );

    Ok(())
}

/// Creates a category, or returns `None` when its slug already exists.
async fn seed_category(
    catalog: &CatalogService,
    name: &str,
    slug: &str,
    requires_size: bool,
) -> anyhow::Result<Option<CategoryModel>> {
    let input = CreateCategoryInput {
        name: name.to_string(),
        slug: slug.to_string(),
        description: Some(format!("{} collection", name)),
        requires_size,
    };

    match catalog.create_category(input).await {
        Ok(category) => {
            info!("Created category {}", category.slug);
            Ok(Some(category))
        }
        Err(ServiceError::Conflict(_)) => {
            warn!("Category {} already exists; skipping its products", slug);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

async fn seed_product(
    catalog: &CatalogService,
    category: &CategoryModel,
    seed: SeedProduct,
) -> anyhow::Result<Option<ProductModel>> {
    let input = CreateProductInput {
        category_id: category.id,
        name: seed.name.to_string(),
        slug: seed.slug.to_string(),
        description: seed.description.to_string(),
        price: seed.price,
        discount_price: seed.discount_price,
        stock: seed.stock,
        is_available: true,
        color: seed.color.map(str::to_string),
    };

    let product = match catalog.create_product(input).await {
        Ok(product) => product,
        Err(ServiceError::Conflict(_)) => {
            warn!("Product {} already exists", seed.slug);
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    catalog
        .add_product_image(
            product.id,
            AddProductImageInput {
                image_url: format!("https://images.example.com/products/{}.jpg", product.slug),
                title: Some(product.name.clone()),
                description: None,
                is_primary: true,
            },
        )
        .await?;

    Ok(Some(product))
}

fn apparel_products() -> Vec<SeedProduct> {
    vec![
        SeedProduct {
            name: "Classic Cotton Tee",
            slug: "classic-cotton-tee",
            description: "Midweight cotton t-shirt with a relaxed fit.",
            price: dec!(25.00),
            discount_price: None,
            stock: 120,
            color: Some("White"),
        },
        SeedProduct {
            name: "Denim Jacket",
            slug: "denim-jacket",
            description: "Washed denim jacket with brass buttons.",
            price: dec!(100.00),
            discount_price: Some(dec!(79.99)),
            stock: 35,
            color: Some("Blue"),
        },
        SeedProduct {
            name: "Wool Sweater",
            slug: "wool-sweater",
            description: "Merino wool crew neck sweater.",
            price: dec!(89.00),
            discount_price: None,
            stock: 40,
            color: Some("Charcoal"),
        },
    ]
}

fn accessory_products() -> Vec<SeedProduct> {
    vec![
        SeedProduct {
            name: "Leather Belt",
            slug: "leather-belt",
            description: "Full grain leather belt.",
            price: dec!(45.00),
            discount_price: None,
            stock: 60,
            color: Some("Brown"),
        },
        SeedProduct {
            name: "Canvas Tote",
            slug: "canvas-tote",
            description: "Heavy canvas tote bag with inner pocket.",
            price: dec!(30.00),
            discount_price: Some(dec!(24.00)),
            stock: 80,
            color: Some("Natural"),
        },
        SeedProduct {
            name: "Steel Watch",
            slug: "steel-watch",
            description: "Stainless steel analog watch.",
            price: dec!(199.00),
            discount_price: None,
            stock: 5,
            color: None,
        },
    ]
}

fn home_products() -> Vec<SeedProduct> {
    vec![
        SeedProduct {
            name: "Ceramic Mug",
            slug: "ceramic-mug",
            description: "Stoneware mug, 350ml.",
            price: dec!(14.00),
            discount_price: None,
            stock: 200,
            color: Some("Sand"),
        },
        SeedProduct {
            name: "Linen Throw",
            slug: "linen-throw",
            description: "Washed linen throw blanket.",
            price: dec!(70.00),
            discount_price: None,
            stock: 15,
            color: Some("Olive"),
        },
    ]
}
