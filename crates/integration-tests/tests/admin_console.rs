//! Integration tests for the admin console.
//!
//! These cover access control, product edits flowing through to the customer
//! catalog, the quote status lifecycle and brand settings.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;

use ddh_masale_admin::{AdminConsole, ProductForm};
use ddh_masale_core::{ProductId, QuoteStatus, seed::default_catalog};
use ddh_masale_integration_tests::{ADMIN_EMAIL, BUYER_EMAIL, PASSWORD, fixture};
use ddh_masale_storefront::repository::PRODUCTS_TABLE;
use ddh_masale_storefront::services::auth::AuthError;
use ddh_masale_storefront::{AppError, ValidationError, ViewScope};

// =============================================================================
// Access Control
// =============================================================================

#[tokio::test]
async fn test_customer_cannot_open_console() {
    let (_backend, state) = fixture();

    assert!(matches!(
        AdminConsole::open(&state),
        Err(AppError::Auth(AuthError::NotSignedIn))
    ));

    state.auth().sign_in(BUYER_EMAIL, PASSWORD).await.unwrap();
    assert!(matches!(
        AdminConsole::open(&state),
        Err(AppError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_console_stops_working_after_sign_out() {
    let (_backend, state) = fixture();
    state.auth().sign_in(ADMIN_EMAIL, PASSWORD).await.unwrap();
    let console = AdminConsole::open(&state).unwrap();

    state.auth().sign_out().await.unwrap();
    assert!(matches!(
        console.quotes("").await,
        Err(AppError::Auth(AuthError::NotSignedIn))
    ));
}

// =============================================================================
// Products
// =============================================================================

#[tokio::test]
async fn test_new_product_appears_in_catalog() {
    let (backend, state) = fixture();
    state.auth().sign_in(ADMIN_EMAIL, PASSWORD).await.unwrap();
    let console = AdminConsole::open(&state).unwrap();
    console.inventory().await.unwrap();

    let form = ProductForm {
        name: "Black Pepper (Kali Mirch)".to_owned(),
        category: "Whole Spices".to_owned(),
        price: Decimal::new(780, 0),
        moq: 10,
        ..ProductForm::new()
    };
    let saved = console.save_product(form).await.unwrap();
    assert!(saved.is_active);

    let catalog = state.catalog();
    assert!(catalog.find_visible(&saved.id).is_some());
    assert!(catalog.categories().contains(&"Whole Spices"));
    assert_eq!(
        backend.rows(PRODUCTS_TABLE).len(),
        default_catalog().len() + 1
    );
}

#[tokio::test]
async fn test_invalid_product_is_rejected_without_write() {
    let (backend, state) = fixture();
    state.auth().sign_in(ADMIN_EMAIL, PASSWORD).await.unwrap();
    let console = AdminConsole::open(&state).unwrap();
    let writes = backend.write_count();

    let form = ProductForm {
        name: "Nameless price".to_owned(),
        price: Decimal::ZERO,
        ..ProductForm::new()
    };
    let err = console.save_product(form).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Validation(ValidationError::InvalidProduct)
    ));
    assert_eq!(backend.write_count(), writes);
}

#[tokio::test]
async fn test_hidden_product_leaves_customer_catalog() {
    let (_backend, state) = fixture();
    state.auth().sign_in(ADMIN_EMAIL, PASSWORD).await.unwrap();
    let console = AdminConsole::open(&state).unwrap();
    console.inventory().await.unwrap();

    let pickle = ProductId::new("7");
    let hidden = console.toggle_active(&pickle).await.unwrap();
    assert!(!hidden.is_active);
    assert!(state.catalog().find_visible(&pickle).is_none());

    // A fresh load sees the stored flag, not just the cache.
    state.refresh_products(&ViewScope::new()).await.unwrap();
    assert!(state.catalog().find_visible(&pickle).is_none());
    assert!(state.products().iter().any(|p| p.id == pickle));

    console.toggle_active(&pickle).await.unwrap();
    assert!(state.catalog().find_visible(&pickle).is_some());
}

#[tokio::test]
async fn test_edit_keeps_identity() {
    let (_backend, state) = fixture();
    state.auth().sign_in(ADMIN_EMAIL, PASSWORD).await.unwrap();
    let console = AdminConsole::open(&state).unwrap();
    let inventory = console.inventory().await.unwrap().into_inner();

    let mut form = ProductForm::edit(&inventory[0]);
    form.moq = 100;
    let saved = console.save_product(form).await.unwrap();

    assert_eq!(saved.id, inventory[0].id);
    assert_eq!(saved.moq, 100);
    assert_eq!(state.products().len(), inventory.len());
}

// =============================================================================
// Quotes
// =============================================================================

#[tokio::test]
async fn test_quote_lifecycle() {
    let (_backend, state) = fixture();

    state.auth().sign_in(BUYER_EMAIL, PASSWORD).await.unwrap();
    let controller = state.quote_controller();
    controller.select(default_catalog().remove(3));
    controller.edit(|draft| {
        draft.customer_name = "Asha Traders".to_owned();
        draft.phone = "+91 98200 00000".to_owned();
        draft.consent = true;
    });
    let quote = controller.submit().await.unwrap();
    state.auth().sign_out().await.unwrap();

    state.auth().sign_in(ADMIN_EMAIL, PASSWORD).await.unwrap();
    let console = AdminConsole::open(&state).unwrap();

    let found = console.quotes("asha").await.unwrap();
    assert_eq!(found.len(), 1);
    assert!(console.quotes("nobody").await.unwrap().is_empty());

    let responded = console
        .transition_quote(&quote.id, QuoteStatus::Responded)
        .await
        .unwrap();
    assert_eq!(responded.status, QuoteStatus::Responded);

    let closed = console
        .transition_quote(&quote.id, QuoteStatus::Closed)
        .await
        .unwrap();
    assert_eq!(closed.status, QuoteStatus::Closed);

    let err = console
        .transition_quote(&quote.id, QuoteStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Validation(ValidationError::InvalidTransition { .. })
    ));
}

// =============================================================================
// Settings
// =============================================================================

#[tokio::test]
async fn test_settings_edit_is_shared() {
    let (_backend, state) = fixture();
    state.auth().sign_in(ADMIN_EMAIL, PASSWORD).await.unwrap();
    let console = AdminConsole::open(&state).unwrap();

    let mut settings = console.settings_draft();
    settings.hero_title = "Wholesale spices, direct from Unjha".to_owned();
    console.save_settings(&settings).await.unwrap();
    assert_eq!(state.settings().hero_title, settings.hero_title);

    // Another view loading later gets the saved row.
    state.set_settings(ddh_masale_core::seed::default_settings());
    let loaded = state.refresh_settings(&ViewScope::new()).await.unwrap();
    assert_eq!(loaded.value.hero_title, settings.hero_title);
}
