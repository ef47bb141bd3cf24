/// Commerce entities module
pub mod cart_item;
pub mod category;
pub mod product;
pub mod product_image;
pub mod product_similar;
pub mod review;
pub mod wishlist_item;

// Re-export entities
pub use cart_item::{Entity as CartItem, Model as CartItemModel, Size};
pub use category::{Entity as Category, Model as CategoryModel};
pub use product::{Entity as Product, Model as ProductModel};
pub use product_image::{Entity as ProductImage, Model as ProductImageModel};
pub use product_similar::{Entity as ProductSimilar, Model as ProductSimilarModel};
pub use review::{Entity as Review, Model as ReviewModel};
pub use wishlist_item::{Entity as WishlistItem, Model as WishlistItemModel};
