//! Domain models.
//!
//! These types represent validated domain objects, separate from the row
//! types the storefront repositories exchange with the backend.

pub mod product;
pub mod quote;
pub mod review;
pub mod settings;
pub mod user;

pub use product::{Product, ProductSpecifications};
pub use quote::QuoteRequest;
pub use review::{Review, ReviewSummary};
pub use settings::BrandSettings;
pub use user::SessionUser;
