use crate::{
    entities::commerce::{
        category, product, product_image, product_similar, review, Category, CategoryModel,
        Product, ProductImage, ProductImageModel, ProductModel, ProductSimilar,
        ProductSimilarModel, Review, ReviewModel,
    },
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func, LikeExpr},
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Number of related (and similar) products shown on a product page.
pub const RELATED_PRODUCTS_LIMIT: u64 = 4;

/// Default catalog page size.
pub const DEFAULT_PAGE_SIZE: u64 = 12;

/// Catalog reads for the storefront plus the write path used by seeding.
///
/// Only available products are ever returned to shoppers; unavailable ones
/// behave as if they do not exist.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

/// Product listing row with derived pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub slug: String,
    pub price: Decimal,
    pub discount_price: Option<Decimal>,
    pub final_price: Decimal,
    pub discount_percentage: i32,
    pub stock: i32,
    pub is_available: bool,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&ProductModel> for ProductSummary {
    fn from(p: &ProductModel) -> Self {
        Self {
            id: p.id,
            category_id: p.category_id,
            name: p.name.clone(),
            slug: p.slug.clone(),
            price: p.price,
            discount_price: p.discount_price,
            final_price: p.final_price(),
            discount_percentage: p.discount_percentage(),
            stock: p.stock,
            is_available: p.is_available,
            color: p.color.clone(),
            created_at: p.created_at,
        }
    }
}

/// Product page payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: ProductSummary,
    pub description: String,
    pub category: CategoryModel,
    pub images: Vec<ProductImageModel>,
    pub reviews: Vec<ReviewModel>,
    pub review_count: usize,
    pub average_rating: Option<Decimal>,
    /// Hand-picked links, or same-category products when none are set.
    pub similar_products: Vec<ProductSummary>,
    pub related_products: Vec<ProductSummary>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    pub search: Option<String>,
    /// Category slug
    pub category: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductPage {
    pub items: Vec<ProductSummary>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCategoryInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 120), custom = "validate_slug")]
    pub slug: String,
    pub description: Option<String>,
    #[serde(default)]
    pub requires_size: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProductInput {
    pub category_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 220), custom = "validate_slug")]
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub discount_price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub stock: i32,
    #[serde(default = "default_true")]
    pub is_available: bool,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddProductImageInput {
    #[validate(url)]
    pub image_url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

fn default_true() -> bool {
    true
}

fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    let ok = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if ok && !slug.starts_with('-') && !slug.ends_with('-') {
        Ok(())
    } else {
        let mut err = ValidationError::new("slug");
        err.message = Some("slug may only contain lowercase letters, digits and hyphens".into());
        Err(err)
    }
}

/// Checks the pricing rules: price > 0 and 0 < discount_price < price.
pub fn validate_pricing(price: Decimal, discount_price: Option<Decimal>) -> Result<(), ServiceError> {
    if price <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Price must be greater than zero".to_string(),
        ));
    }
    if let Some(discount) = discount_price {
        if discount <= Decimal::ZERO || discount >= price {
            return Err(ServiceError::ValidationError(
                "Discount price must be positive and lower than the regular price".to_string(),
            ));
        }
    }
    Ok(())
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Active categories ordered by name.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<CategoryModel>, ServiceError> {
        let categories = Category::find()
            .filter(category::Column::IsActive.eq(true))
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await?;
        Ok(categories)
    }

    /// Paginated listing of available products, newest first.
    ///
    /// `search` matches a case-insensitive substring of the name or the
    /// description. An unknown category slug yields an empty page.
    #[instrument(skip(self))]
    pub async fn list_products(&self, query: ProductQuery) -> Result<ProductPage, ServiceError> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(DEFAULT_PAGE_SIZE).max(1);

        let mut select = Product::find().filter(product::Column::IsAvailable.eq(true));

        if let Some(search) = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
            select = select.filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col((
                            product::Entity,
                            product::Column::Name,
                        ))))
                        .like(LikeExpr::new(pattern.clone()).escape('\\')),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col((
                            product::Entity,
                            product::Column::Description,
                        ))))
                        .like(LikeExpr::new(pattern).escape('\\')),
                    ),
            );
        }

        if let Some(slug) = query.category.as_deref().filter(|s| !s.is_empty()) {
            let category = Category::find()
                .filter(category::Column::Slug.eq(slug))
                .one(&*self.db)
                .await?;
            match category {
                Some(category) => {
                    select = select.filter(product::Column::CategoryId.eq(category.id));
                }
                None => {
                    return Ok(ProductPage {
                        items: Vec::new(),
                        total: 0,
                        page,
                        per_page,
                        total_pages: 0,
                    })
                }
            }
        }

        let paginator = select
            .order_by_desc(product::Column::CreatedAt)
            .order_by_asc(product::Column::Name)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;

        Ok(ProductPage {
            items: items.iter().map(ProductSummary::from).collect(),
            total,
            page,
            per_page,
            total_pages: total.div_ceil(per_page),
        })
    }

    /// Product page for an available product.
    #[instrument(skip(self))]
    pub async fn product_detail(&self, slug: &str) -> Result<ProductDetail, ServiceError> {
        let product = Product::find()
            .filter(product::Column::Slug.eq(slug))
            .filter(product::Column::IsAvailable.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", slug)))?;

        let category = product
            .find_related(Category)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!("Product {} has no category", product.id))
            })?;

        let images = product
            .find_related(ProductImage)
            .order_by_desc(product_image::Column::IsPrimary)
            .order_by_asc(product_image::Column::UploadedAt)
            .all(&*self.db)
            .await?;

        let reviews = product
            .find_related(Review)
            .order_by_desc(review::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let related = Product::find()
            .filter(product::Column::CategoryId.eq(product.category_id))
            .filter(product::Column::IsAvailable.eq(true))
            .filter(product::Column::Id.ne(product.id))
            .order_by_desc(product::Column::CreatedAt)
            .limit(RELATED_PRODUCTS_LIMIT)
            .all(&*self.db)
            .await?;

        let linked: Vec<Uuid> = ProductSimilar::find()
            .filter(product_similar::Column::ProductId.eq(product.id))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|link| link.similar_product_id)
            .collect();

        let mut similar = if linked.is_empty() {
            Vec::new()
        } else {
            Product::find()
                .filter(product::Column::Id.is_in(linked))
                .filter(product::Column::IsAvailable.eq(true))
                .order_by_desc(product::Column::CreatedAt)
                .limit(RELATED_PRODUCTS_LIMIT)
                .all(&*self.db)
                .await?
        };
        if similar.is_empty() {
            similar = related.clone();
        }

        Ok(ProductDetail {
            product: ProductSummary::from(&product),
            description: product.description.clone(),
            category,
            images,
            review_count: reviews.len(),
            average_rating: average_rating(&reviews),
            reviews,
            similar_products: similar.iter().map(ProductSummary::from).collect(),
            related_products: related.iter().map(ProductSummary::from).collect(),
        })
    }

    #[instrument(skip(self))]
    pub async fn create_category(
        &self,
        input: CreateCategoryInput,
    ) -> Result<CategoryModel, ServiceError> {
        input.validate()?;

        let existing = Category::find()
            .filter(category::Column::Slug.eq(input.slug.as_str()))
            .count(&*self.db)
            .await?;
        if existing > 0 {
            return Err(ServiceError::Conflict(format!(
                "Category slug {} is already taken",
                input.slug
            )));
        }

        let model = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            slug: Set(input.slug),
            description: Set(input.description),
            is_active: Set(true),
            requires_size: Set(input.requires_size),
            created_at: Set(Utc::now()),
        };

        let category = model.insert(&*self.db).await.map_err(slug_conflict)?;
        info!("Created category {}", category.slug);
        Ok(category)
    }

    #[instrument(skip(self))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        input.validate()?;
        validate_pricing(input.price, input.discount_price)?;

        Category::find_by_id(input.category_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Category {} not found", input.category_id))
            })?;

        let existing = Product::find()
            .filter(product::Column::Slug.eq(input.slug.as_str()))
            .count(&*self.db)
            .await?;
        if existing > 0 {
            return Err(ServiceError::Conflict(format!(
                "Product slug {} is already taken",
                input.slug
            )));
        }

        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            category_id: Set(input.category_id),
            name: Set(input.name),
            slug: Set(input.slug),
            description: Set(input.description),
            price: Set(input.price),
            discount_price: Set(input.discount_price),
            stock: Set(input.stock),
            is_available: Set(input.is_available),
            color: Set(input.color),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let product = model.insert(&*self.db).await.map_err(slug_conflict)?;
        info!("Created product {} ({})", product.slug, product.id);
        Ok(product)
    }

    pub async fn add_product_image(
        &self,
        product_id: Uuid,
        input: AddProductImageInput,
    ) -> Result<ProductImageModel, ServiceError> {
        input.validate()?;
        find_product(&*self.db, product_id).await?;

        let image = product_image::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            image_url: Set(input.image_url),
            title: Set(input.title),
            description: Set(input.description),
            is_primary: Set(input.is_primary),
            uploaded_at: Set(Utc::now()),
        };

        Ok(image.insert(&*self.db).await?)
    }

    /// Lists `similar_product_id` on the page of `product_id`.
    ///
    /// # Errors
    ///
    /// * `ValidationError` - a product linked to itself
    /// * `NotFound` - either product does not exist
    /// * `Conflict` - the link already exists
    #[instrument(skip(self))]
    pub async fn add_similar_product(
        &self,
        product_id: Uuid,
        similar_product_id: Uuid,
    ) -> Result<ProductSimilarModel, ServiceError> {
        if product_id == similar_product_id {
            return Err(ServiceError::ValidationError(
                "A product cannot be similar to itself".to_string(),
            ));
        }
        find_product(&*self.db, product_id).await?;
        find_product(&*self.db, similar_product_id).await?;

        let link = product_similar::ActiveModel {
            product_id: Set(product_id),
            similar_product_id: Set(similar_product_id),
            created_at: Set(Utc::now()),
        };

        link.insert(&*self.db).await.map_err(|err| {
            let err = ServiceError::from(err);
            if err.is_unique_violation() {
                ServiceError::Conflict(format!(
                    "Product {} is already linked to {}",
                    similar_product_id, product_id
                ))
            } else {
                err
            }
        })
    }
}

/// Escapes `LIKE` wildcards so user input only ever matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub(crate) async fn find_product<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<ProductModel, ServiceError> {
    Product::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
}

fn slug_conflict(err: sea_orm::DbErr) -> ServiceError {
    let err = ServiceError::from(err);
    if err.is_unique_violation() {
        ServiceError::Conflict("Slug is already taken".to_string())
    } else {
        err
    }
}

/// Mean rating rounded to one decimal place.
pub fn average_rating(reviews: &[ReviewModel]) -> Option<Decimal> {
    if reviews.is_empty() {
        return None;
    }
    let sum: i64 = reviews.iter().map(|r| i64::from(r.rating)).sum();
    Some((Decimal::from(sum) / Decimal::from(reviews.len() as u64)).round_dp(1))
}
