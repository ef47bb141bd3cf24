/// Commerce services module - storefront business logic
pub mod cart_service;
pub mod catalog_service;
pub mod checkout_service;
pub mod order_number;
pub mod review_service;
pub mod wishlist_service;

// Re-export services for convenience
pub use cart_service::{
    AddToCartInput, CartLineView, CartService, CartSummary, MAX_LINE_QUANTITY,
};
pub use catalog_service::{
    AddProductImageInput, CatalogService, CreateCategoryInput, CreateProductInput, ProductDetail,
    ProductPage, ProductQuery, ProductSummary,
};
pub use checkout_service::{
    BuyNowInput, CheckoutService, OrderNumberGenerator, ShippingDetails, MAX_CHECKOUT_ATTEMPTS,
};
pub use review_service::{AddReviewInput, ReviewService};
pub use wishlist_service::{WishlistAddOutcome, WishlistEntry, WishlistService};
