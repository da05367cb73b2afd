//! CLI command implementations.

pub mod catalog;
pub mod migrate;
pub mod seed;

use thiserror::Error;

use ddh_masale_storefront::backend::{BackendError, SupabaseClient};
use ddh_masale_storefront::config::{ConfigError, StorefrontConfig};
use ddh_masale_storefront::{AppError, AppState};

use crate::{Commands, ProductAction, QuoteAction, SettingsAction};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Backend client could not be created.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// A storefront or admin action failed.
    #[error("{}", .0.user_message())]
    App(#[from] AppError),

    /// Input file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input or output JSON was malformed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Bad command-line argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Dispatch a parsed command.
pub async fn run(command: Commands, config: &StorefrontConfig) -> Result<(), CommandError> {
    let state = AppState::from_config(config)?;

    match command {
        Commands::Seed => seed::run(&state).await,
        Commands::MigrateLegacy { file } => migrate::legacy(&state, &file).await,
        Commands::Products { action } => match action {
            ProductAction::List { all } => catalog::list_products(&state, all).await,
            ProductAction::Toggle { id } => catalog::toggle_product(&state, &id).await,
        },
        Commands::Quotes { action } => match action {
            QuoteAction::List { search } => catalog::list_quotes(&state, &search).await,
            QuoteAction::SetStatus { id, status } => {
                catalog::set_quote_status(&state, &id, &status).await
            }
        },
        Commands::Settings { action } => match action {
            SettingsAction::Show => catalog::show_settings(&state).await,
        },
    }
}

/// Sign in with the admin credentials from the environment.
///
/// Table writes beyond quote submission need an admin session.
pub async fn sign_in_admin(state: &AppState<SupabaseClient>) -> Result<(), CommandError> {
    let email =
        std::env::var("DDH_ADMIN_EMAIL").map_err(|_| CommandError::MissingEnvVar("DDH_ADMIN_EMAIL"))?;
    let password = std::env::var("DDH_ADMIN_PASSWORD")
        .map_err(|_| CommandError::MissingEnvVar("DDH_ADMIN_PASSWORD"))?;

    let user = state
        .auth()
        .sign_in(&email, &password)
        .await
        .map_err(AppError::from)?;
    tracing::info!(user_id = %user.id, role = %user.role, "Signed in");
    Ok(())
}
