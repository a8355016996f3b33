//! Domain models returned by repositories and serialized by routes.
//!
//! JSON field names are camelCase to match the public API.

pub mod category;
pub mod order;
pub mod product;
pub mod user;

pub use category::{Category, CategoryDetail, CategorySummary};
pub use order::{Order, OrderItem, OrderView};
pub use product::{Dimensions, Product, ProductView};
pub use user::User;
