//! Product, quote and settings commands.

use ddh_masale_admin::AdminConsole;
use ddh_masale_core::{Product, ProductId, QuoteId, QuoteRequest, QuoteStatus};
use ddh_masale_storefront::backend::SupabaseClient;
use ddh_masale_storefront::{AppError, AppState, ViewScope};

use super::{CommandError, sign_in_admin};

/// List products. `all` includes inactive ones and needs an admin session.
pub async fn list_products(state: &AppState<SupabaseClient>, all: bool) -> Result<(), CommandError> {
    if all {
        sign_in_admin(state).await?;
        let console = AdminConsole::open(state)?;
        let inventory = console.inventory().await?;
        print_products(inventory.value.iter());
        state.auth().sign_out().await.map_err(AppError::from)?;
    } else {
        state.refresh_products(&ViewScope::new()).await;
        let catalog = state.catalog();
        print_products(catalog.visible());
    }
    Ok(())
}

/// Flip a product's visibility.
pub async fn toggle_product(state: &AppState<SupabaseClient>, id: &str) -> Result<(), CommandError> {
    sign_in_admin(state).await?;
    let console = AdminConsole::open(state)?;
    let product = console.toggle_active(&ProductId::new(id)).await?;
    tracing::info!(
        product_id = %product.id,
        active = product.is_active,
        "Product visibility updated"
    );
    state.auth().sign_out().await.map_err(AppError::from)?;
    Ok(())
}

/// List quote requests matching `search`.
pub async fn list_quotes(state: &AppState<SupabaseClient>, search: &str) -> Result<(), CommandError> {
    sign_in_admin(state).await?;
    let console = AdminConsole::open(state)?;
    let quotes = console.quotes(search).await?;
    print_quotes(&quotes);
    state.auth().sign_out().await.map_err(AppError::from)?;
    Ok(())
}

/// Move a quote request to `status`.
pub async fn set_quote_status(
    state: &AppState<SupabaseClient>,
    id: &str,
    status: &str,
) -> Result<(), CommandError> {
    let status: QuoteStatus = status.parse().map_err(CommandError::InvalidArgument)?;

    sign_in_admin(state).await?;
    let console = AdminConsole::open(state)?;
    let quote = console.transition_quote(&QuoteId::new(id), status).await?;
    tracing::info!(quote_id = %quote.id, status = %quote.status, "Quote status updated");
    state.auth().sign_out().await.map_err(AppError::from)?;
    Ok(())
}

/// Print the brand settings as JSON.
#[allow(clippy::print_stdout)]
pub async fn show_settings(state: &AppState<SupabaseClient>) -> Result<(), CommandError> {
    let settings = state.refresh_settings(&ViewScope::new()).await;
    if settings.as_ref().is_some_and(|s| s.is_fallback()) {
        tracing::warn!("Backend unavailable, showing default settings");
    }
    println!("{}", serde_json::to_string_pretty(&state.settings())?);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_products<'a>(products: impl Iterator<Item = &'a Product>) {
    for p in products {
        println!(
            "{:<38} {:<32} {:<16} {:>12} moq {:>4} {}",
            p.id,
            p.name,
            p.category,
            p.price.per_unit(&p.unit),
            p.moq,
            if p.is_active { "" } else { "(inactive)" }
        );
    }
}

#[allow(clippy::print_stdout)]
fn print_quotes(quotes: &[QuoteRequest]) {
    for q in quotes {
        println!(
            "{:<38} {:<10} {} {:<24} {:<28} {:>6} x {}",
            q.id,
            q.status,
            q.created_at.format("%Y-%m-%d"),
            q.customer_name,
            q.email,
            q.quantity,
            q.product_name
        );
    }
}
