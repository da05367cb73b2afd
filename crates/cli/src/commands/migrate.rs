//! Legacy data migration command.

use std::path::Path;

use tracing::info;

use ddh_masale_storefront::backend::SupabaseClient;
use ddh_masale_storefront::services::migration::{EntityReport, LegacySnapshot, migrate};
use ddh_masale_storefront::{AppError, AppState};

use super::{CommandError, sign_in_admin};

/// Import a local-storage export into the backend.
///
/// # Arguments
///
/// * `file_path` - Path to a JSON object with `ddh_products_v2` and
///   `ddh_quotes_v2` keys
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, admin sign-in
/// fails, or existing rows cannot be listed. Individual rows that fail are
/// reported, not returned as errors.
pub async fn legacy(state: &AppState<SupabaseClient>, file_path: &str) -> Result<(), CommandError> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(CommandError::InvalidArgument(format!(
            "File not found: {file_path}"
        )));
    }

    info!(path = %file_path, "Loading legacy export");
    let content = tokio::fs::read_to_string(path).await?;
    let snapshot = LegacySnapshot::from_json(&content)?;

    sign_in_admin(state).await?;
    let report = migrate(state.backend(), &snapshot)
        .await
        .map_err(AppError::from)?;

    print_report("products", &report.products);
    print_report("quotes", &report.quotes);

    state.auth().sign_out().await.map_err(AppError::from)?;
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_report(kind: &str, report: &EntityReport) {
    println!(
        "{kind}: {} imported, {} skipped, {} failed",
        report.imported,
        report.skipped,
        report.failed.len()
    );
    for failure in &report.failed {
        println!(
            "  - {}: {}",
            failure.id.as_deref().unwrap_or("<no id>"),
            failure.reason
        );
    }
}
