//! Integration tests for first-load seeding and fail-open reads.

#![allow(clippy::unwrap_used)]

use ddh_masale_core::seed::{default_catalog, default_settings};
use ddh_masale_core::{Email, ProductId};
use ddh_masale_integration_tests::{BUYER_EMAIL, PASSWORD, fixture};
use ddh_masale_storefront::repository::{DataOrigin, PRODUCTS_TABLE, SETTINGS_TABLE};
use ddh_masale_storefront::services::catalog::CatalogQuery;
use ddh_masale_storefront::{AppState, ViewScope};

// =============================================================================
// Seeding
// =============================================================================

#[tokio::test]
async fn test_empty_tables_are_seeded_once() {
    let (backend, state) = fixture();
    let scope = ViewScope::new();

    let products = state.refresh_products(&scope).await.unwrap();
    assert_eq!(products.origin, DataOrigin::Seeded);
    assert_eq!(products.value, default_catalog());

    let settings = state.refresh_settings(&scope).await.unwrap();
    assert_eq!(settings.origin, DataOrigin::Seeded);

    let writes = backend.write_count();

    let products = state.refresh_products(&scope).await.unwrap();
    assert_eq!(products.origin, DataOrigin::Remote);
    let settings = state.refresh_settings(&scope).await.unwrap();
    assert_eq!(settings.origin, DataOrigin::Remote);

    assert_eq!(backend.write_count(), writes);
    assert_eq!(backend.rows(PRODUCTS_TABLE).len(), default_catalog().len());
    assert_eq!(backend.rows(SETTINGS_TABLE).len(), 1);
}

#[tokio::test]
async fn test_seeded_catalog_browses_by_category_and_search() {
    let (_backend, state) = fixture();
    state.refresh_products(&ViewScope::new()).await.unwrap();
    let catalog = state.catalog();

    let categories = catalog.categories();
    assert_eq!(categories.first(), Some(&"All"));

    let whole = catalog.list(&CatalogQuery::default().category("Whole Spices"));
    assert!(!whole.is_empty());
    assert!(whole.iter().all(|p| p.category == "Whole Spices"));

    let haldi = catalog.list(&CatalogQuery::default().search("haldi"));
    assert_eq!(haldi.len(), 1);
    assert_eq!(haldi[0].id, ProductId::new("1"));
}

// =============================================================================
// Fail-open Reads
// =============================================================================

#[tokio::test]
async fn test_unreachable_backend_serves_defaults_without_writing() {
    let (backend, state) = fixture();
    backend.set_fail_reads(true);
    let scope = ViewScope::new();

    let products = state.refresh_products(&scope).await.unwrap();
    assert!(products.is_fallback());
    assert_eq!(products.value, default_catalog());

    let settings = state.refresh_settings(&scope).await.unwrap();
    assert!(settings.is_fallback());
    assert_eq!(settings.value, default_settings());

    assert_eq!(backend.write_count(), 0);
}

#[tokio::test]
async fn test_failed_seed_falls_back() {
    let (backend, state) = fixture();
    backend.set_fail_writes(true);

    let products = state.refresh_products(&ViewScope::new()).await.unwrap();
    assert!(products.is_fallback());
    assert!(backend.rows(PRODUCTS_TABLE).is_empty());

    // Once writes recover, the next load seeds.
    backend.set_fail_writes(false);
    let products = state.refresh_products(&ViewScope::new()).await.unwrap();
    assert_eq!(products.origin, DataOrigin::Seeded);
}

#[tokio::test]
async fn test_reviews_fail_open_on_read() {
    let (backend, state) = fixture();
    backend.set_fail_reads(true);

    let loaded = state.reviews().load(&ProductId::new("1")).await;
    assert!(loaded.is_fallback());
    assert!(loaded.value.reviews.is_empty());
    assert_eq!(loaded.value.summary.count, 0);
}

// =============================================================================
// Reviews
// =============================================================================

#[tokio::test]
async fn test_signed_in_review_updates_summary() {
    let (_backend, state) = fixture();
    let turmeric = ProductId::new("1");

    assert!(state.reviews().submit(None, &turmeric, 5, "Great").await.is_err());

    let user = state.auth().sign_in(BUYER_EMAIL, PASSWORD).await.unwrap();
    state
        .reviews()
        .submit(Some(&user), &turmeric, 5, "Bright colour, strong aroma.")
        .await
        .unwrap();
    let after = state
        .reviews()
        .submit(Some(&user), &turmeric, 4, "Reordered, same quality.")
        .await
        .unwrap();

    assert_eq!(after.reviews.len(), 2);
    assert_eq!(after.summary.count, 2);
    assert_eq!(after.summary.average, Some(4.5));
    assert!(after.reviews.iter().all(|r| r.user_email == user.email));
}

// =============================================================================
// Legacy Admin
// =============================================================================

#[tokio::test]
async fn test_legacy_admin_email_only_applies_without_stored_role() {
    let (backend, _state) = fixture();
    let legacy = Email::parse("owner@example.com").unwrap();
    backend.add_account(&legacy, PASSWORD, None);
    let state = AppState::new(backend, Some(legacy), None);

    let owner = state.auth().sign_in("Owner@Example.com", PASSWORD).await.unwrap();
    assert!(owner.is_admin());
    state.auth().sign_out().await.unwrap();

    let buyer = state.auth().sign_in(BUYER_EMAIL, PASSWORD).await.unwrap();
    assert!(!buyer.is_admin());
}
