//! DDH Masale CLI - Seeding, legacy migration and catalog management.
//!
//! # Usage
//!
//! ```bash
//! # Seed empty products and settings tables with the defaults
//! ddh-cli seed
//!
//! # Import a local-storage export from the old storefront
//! ddh-cli migrate-legacy export.json
//!
//! # Inspect and manage the catalog
//! ddh-cli products list --all
//! ddh-cli products toggle 3
//!
//! # Work the quote inbox
//! ddh-cli quotes list --search traders
//! ddh-cli quotes set-status <id> responded
//!
//! # Show brand settings
//! ddh-cli settings show
//! ```
//!
//! # Environment Variables
//!
//! - `SUPABASE_URL`, `SUPABASE_ANON_KEY` - Backend project (required)
//! - `DDH_ADMIN_EMAIL`, `DDH_ADMIN_PASSWORD` - Admin account for write commands
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT` - Error reporting (optional)

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ddh_masale_storefront::config::StorefrontConfig;

mod commands;

#[derive(Parser)]
#[command(name = "ddh-cli")]
#[command(author, version, about = "DDH Masale CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed empty products and settings tables with the defaults
    Seed,
    /// Import products and quotes from a legacy local-storage export
    MigrateLegacy {
        /// Path to the JSON export
        file: String,
    },
    /// Manage catalog products
    Products {
        #[command(subcommand)]
        action: ProductAction,
    },
    /// Manage quote requests
    Quotes {
        #[command(subcommand)]
        action: QuoteAction,
    },
    /// Inspect brand settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum ProductAction {
    /// List products
    List {
        /// Include inactive products (requires admin credentials)
        #[arg(short, long)]
        all: bool,
    },
    /// Show or hide a product in the customer catalog
    Toggle {
        /// Product ID
        id: String,
    },
}

#[derive(Subcommand)]
enum QuoteAction {
    /// List quote requests, newest first
    List {
        /// Filter by customer name or email
        #[arg(short, long, default_value = "")]
        search: String,
    },
    /// Move a quote request to a new status (`responded`, `closed`)
    SetStatus {
        /// Quote ID
        id: String,
        /// Target status
        status: String,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the current brand settings as JSON
    Show,
}

fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(std::borrow::Cow::Owned(config.sentry_environment.clone())),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Map tracing levels to Sentry: errors and warnings become events, info
/// and debug become breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        tracing::Level::TRACE => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ddh_masale_storefront=info,ddh_masale_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::from(2);
        }
    };

    let sentry_guard = init_sentry(&config);
    init_tracing();

    let code = match commands::run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Command failed: {e}");
            ExitCode::FAILURE
        }
    };

    // Flush pending Sentry events before exiting.
    drop(sentry_guard);
    code
}
