#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseBackend as DbBackend, DatabaseConnection, Statement};
use serde_json::Value;
use storefront_api::{
    auth::{AuthService, ADMIN_ROLE},
    build_router,
    config::AppConfig,
    db::{self, DbConfig},
    entities::commerce::{CategoryModel, ProductModel},
    services::commerce::{
        CatalogService, CreateCategoryInput, CreateProductInput, ShippingDetails,
    },
    AppState,
};
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

/// Application state and router backed by a fresh in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        let pool = db::establish_connection_with_config(&DbConfig::in_memory_sqlite())
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.cors_allow_any_origin = true;

        let state = AppState::new(Arc::new(pool), cfg);
        let router = build_router(state.clone());

        Self { router, state }
    }

    pub fn db(&self) -> Arc<DatabaseConnection> {
        self.state.db.clone()
    }

    pub fn auth(&self) -> Arc<AuthService> {
        self.state.auth.clone()
    }

    /// Bearer token for an ordinary shopper.
    pub fn token_for(&self, user_id: Uuid) -> String {
        self.state
            .auth
            .issue_token(user_id, &[])
            .expect("issue shopper token")
    }

    pub fn admin_token(&self) -> String {
        self.state
            .auth
            .issue_token(Uuid::new_v4(), &[ADMIN_ROLE])
            .expect("issue admin token")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        self.request_with_headers(method, uri, body, token, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Runs raw SQL against the test database.
    pub async fn execute_sql(&self, sql: &str) {
        self.state
            .db
            .execute(Statement::from_string(DbBackend::Sqlite, sql.to_string()))
            .await
            .expect("raw sql");
    }

    pub async fn create_category(&self, requires_size: bool) -> CategoryModel {
        let slug = format!("cat-{}", short_id());
        CatalogService::new(self.db())
            .create_category(CreateCategoryInput {
                name: format!("Category {}", slug),
                slug,
                description: None,
                requires_size,
            })
            .await
            .expect("seed category")
    }

    pub async fn create_product(
        &self,
        category: &CategoryModel,
        price: Decimal,
        stock: i32,
    ) -> ProductModel {
        self.create_product_with(category, price, None, stock, true)
            .await
    }

    pub async fn create_product_with(
        &self,
        category: &CategoryModel,
        price: Decimal,
        discount_price: Option<Decimal>,
        stock: i32,
        is_available: bool,
    ) -> ProductModel {
        let slug = format!("product-{}", short_id());
        CatalogService::new(self.db())
            .create_product(CreateProductInput {
                category_id: category.id,
                name: format!("Product {}", slug),
                slug,
                description: "Seeded for integration tests".to_string(),
                price,
                discount_price,
                stock,
                is_available,
                color: None,
            })
            .await
            .expect("seed product")
    }
}

pub fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

pub fn shipping() -> ShippingDetails {
    ShippingDetails {
        phone: "5550100".to_string(),
        shipping_address: "1 Main St".to_string(),
        city: "Springfield".to_string(),
        state: "IL".to_string(),
        zip_code: "62701".to_string(),
    }
}

pub fn shipping_json() -> Value {
    serde_json::to_value(shipping()).expect("shipping json")
}

pub async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}
