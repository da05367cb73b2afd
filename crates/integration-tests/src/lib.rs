//! Integration tests for DDH Masale.
//!
//! The tests run the storefront and admin crates end to end over the
//! in-process [`MemoryBackend`], so they need no network or database.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p ddh-masale-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `quote_workflow` - Quote requests from product selection to storage
//! - `admin_console` - Product, quote and settings management
//! - `repository_bootstrap` - Seeding and fail-open reads
//! - `migration` - Legacy local-storage import

#![cfg_attr(not(test), forbid(unsafe_code))]

use ddh_masale_core::{Email, Role};
use ddh_masale_storefront::AppState;
use ddh_masale_storefront::backend::MemoryBackend;

pub const ADMIN_EMAIL: &str = "owner@ddhmasale.com";
pub const BUYER_EMAIL: &str = "buyer@asha-traders.in";
pub const PASSWORD: &str = "correct-horse";

/// State over a fresh backend with one admin and one customer account.
///
/// # Panics
///
/// Panics if the fixture emails fail to parse.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn fixture() -> (MemoryBackend, AppState<MemoryBackend>) {
    let backend = MemoryBackend::new();
    backend.add_account(&Email::parse(ADMIN_EMAIL).unwrap(), PASSWORD, Some(Role::Admin));
    backend.add_account(&Email::parse(BUYER_EMAIL).unwrap(), PASSWORD, None);
    let state = AppState::new(backend.clone(), None, None);
    (backend, state)
}
