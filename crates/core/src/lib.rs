//! DDH Masale Core - Shared domain types.
//!
//! This crate provides the types used across all DDH Masale components:
//! - `storefront` - Catalog, quote workflow, reviews and session handling
//! - `admin` - Product, quote and brand settings management
//! - `cli` - Seeding, legacy migration and maintenance commands
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. Persistence lives behind the storefront repositories.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, emails, prices, ratings and statuses
//! - [`models`] - Products, quote requests, reviews, brand settings, session users
//! - [`seed`] - The default catalog and brand settings

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod models;
pub mod seed;
pub mod types;

pub use models::*;
pub use types::*;
