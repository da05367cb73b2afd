//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Session management over the managed identity service
//! - `catalog` - Customer listing, categories, detail and related products
//! - `quote_workflow` - Quote request state machine and its controller
//! - `reviews` - Review list, summary and submission
//! - `migration` - Import of legacy browser-local data

pub mod auth;
pub mod catalog;
pub mod migration;
pub mod quote_workflow;
pub mod reviews;
