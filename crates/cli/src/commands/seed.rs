//! Seed empty tables with the default catalog and brand settings.
//!
//! Seeding only happens on an empty table, so running this twice is safe.

use tracing::{info, warn};

use ddh_masale_storefront::backend::SupabaseClient;
use ddh_masale_storefront::repository::DataOrigin;
use ddh_masale_storefront::{AppState, ViewScope};

use super::{CommandError, sign_in_admin};

/// Load products and settings, seeding whichever table is empty.
///
/// # Errors
///
/// Returns an error if admin credentials are missing or rejected.
pub async fn run(state: &AppState<SupabaseClient>) -> Result<(), CommandError> {
    sign_in_admin(state).await?;
    let scope = ViewScope::new();

    if let Some(products) = state.refresh_products(&scope).await {
        report("products", products.origin, products.value.len());
    }
    if let Some(settings) = state.refresh_settings(&scope).await {
        report("settings", settings.origin, 1);
    }

    state.auth().sign_out().await.map_err(ddh_masale_storefront::AppError::from)?;
    Ok(())
}

fn report(table: &str, origin: DataOrigin, rows: usize) {
    match origin {
        DataOrigin::Seeded => info!(table, rows, "Seeded table"),
        DataOrigin::Remote => info!(table, rows, "Table already populated, left untouched"),
        DataOrigin::Fallback => warn!(table, "Backend unavailable, nothing was written"),
    }
}
