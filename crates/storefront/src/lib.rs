//! DDH Masale Storefront library.
//!
//! Client-side core of the storefront: the Supabase backend client,
//! repositories over its tables, session management, and the catalog,
//! review and quote workflows built on them.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod error;
pub mod repository;
pub mod services;
pub mod state;

pub use error::{AppError, ValidationError};
pub use state::{AppState, LoadKind, ViewScope};
