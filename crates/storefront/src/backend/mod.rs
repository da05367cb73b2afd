//! Remote persistence and identity backend.
//!
//! # Architecture
//!
//! - The backend is the source of truth for products, quotes, reviews and
//!   settings. Nothing is cached beyond the application state container.
//! - [`RemoteStore`] is the row-level table API (PostgREST semantics).
//! - [`AuthBackend`] is the managed identity API (GoTrue semantics).
//!
//! # Implementations
//!
//! - [`SupabaseClient`] - HTTPS client for a Supabase project
//! - [`MemoryBackend`] - in-process backend for tests and offline runs
//!
//! # Example
//!
//! ```rust,ignore
//! use ddh_masale_storefront::backend::{Query, RemoteStore, SupabaseClient};
//!
//! let client = SupabaseClient::new(&config.supabase)?;
//! let rows = client
//!     .select("quotes", &Query::new().eq("user_id", user_id.as_str()).order_desc("created_at"))
//!     .await?;
//! ```

pub mod memory;
mod query;
pub mod supabase;

pub use memory::MemoryBackend;
pub use query::{Order, Query};
pub use supabase::SupabaseClient;

use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use ddh_masale_core::{Email, UserId};

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be parsed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Endpoint URL could not be built.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The backend answered with an error status.
    #[error("rejected ({status}): {message}")]
    Rejected {
        status: u16,
        /// Machine-readable code (`invalid_credentials`, `23505`, ...).
        code: Option<String>,
        message: String,
    },

    /// Rate limited by the backend.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Backend could not be reached.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Response parsed but lacked required data.
    #[error("unexpected response: {0}")]
    Malformed(String),
}

impl BackendError {
    /// Whether the request never reached the backend.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Unavailable(_))
    }

    /// Whether the same request may succeed later: the backend was
    /// unreachable, rate limited us, or failed on its side (5xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::Unavailable(_) | Self::RateLimited(_) => true,
            Self::Rejected { status, .. } => *status >= 500,
            Self::Parse(_) | Self::Url(_) | Self::Malformed(_) => false,
        }
    }

    /// Machine-readable rejection code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Rejected { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Whether this is a unique constraint violation.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Rejected { status, code, .. } => {
                *status == 409 || code.as_deref() == Some("23505")
            }
            _ => false,
        }
    }
}

// =============================================================================
// Table API
// =============================================================================

/// Row-level access to the backend tables.
///
/// Rows travel as JSON objects keyed by column name; repositories own the
/// mapping to domain types.
#[allow(async_fn_in_trait)]
pub trait RemoteStore: Send + Sync {
    /// Fetch rows matching `query`.
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, BackendError>;

    /// Insert rows and return them as stored.
    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, BackendError>;

    /// Apply `patch` to every row matching `query` and return the updated rows.
    async fn update(
        &self,
        table: &str,
        query: &Query,
        patch: Value,
    ) -> Result<Vec<Value>, BackendError>;

    /// Insert rows, replacing any existing row with the same primary key.
    async fn upsert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, BackendError>;

    /// Delete every row matching `query` and return how many were removed.
    async fn delete(&self, table: &str, query: &Query) -> Result<usize, BackendError>;
}

// =============================================================================
// Identity API
// =============================================================================

/// OAuth identity providers enabled on the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OAuthProvider {
    Google,
    Github,
}

impl OAuthProvider {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OAuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "github" => Ok(Self::Github),
            other => Err(format!("unsupported OAuth provider: {other}")),
        }
    }
}

/// Account as reported by the identity service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUser {
    pub id: UserId,
    pub email: Email,
    /// Role provisioned on the account (`app_metadata.role`), if any.
    pub role: Option<String>,
}

/// Tokens and identity for a signed-in account.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub expires_at: Option<DateTime<Utc>>,
    pub user: RemoteUser,
}

/// Result of a sign-up request.
#[derive(Debug, Clone)]
pub enum SignUpOutcome {
    /// Account created and signed in immediately.
    SignedIn(AuthSession),
    /// Account created; a confirmation email must be followed first.
    ConfirmationPending(RemoteUser),
}

/// Managed identity operations.
#[allow(async_fn_in_trait)]
pub trait AuthBackend: Send + Sync {
    /// Register a new account.
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<SignUpOutcome, BackendError>;

    /// Exchange email and password for a session.
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, BackendError>;

    /// URL that starts the provider's consent flow.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Url` if the URL cannot be built.
    fn authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: Option<&str>,
    ) -> Result<Url, BackendError>;

    /// Look up the account owning `access_token`.
    async fn user_for_token(&self, access_token: &SecretString)
    -> Result<RemoteUser, BackendError>;

    /// Exchange a refresh token for a new session.
    async fn refresh_session(
        &self,
        refresh_token: &SecretString,
    ) -> Result<AuthSession, BackendError>;

    /// Revoke the session owning `access_token`.
    async fn sign_out(&self, access_token: &SecretString) -> Result<(), BackendError>;

    /// Use `token` as the bearer for subsequent table requests.
    ///
    /// `None` reverts to anonymous access.
    async fn use_session_token(&self, token: Option<SecretString>);
}
