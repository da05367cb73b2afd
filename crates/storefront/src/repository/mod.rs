//! Repositories over the remote tables.
//!
//! # Tables
//!
//! - `products` - Wholesale catalog
//! - `quotes` - Quote requests, newest first
//! - `reviews` - Append-only product reviews
//! - `settings` - Brand settings singleton (row `id = 1`)
//!
//! Product and settings reads fail open: a backend failure yields the built-in
//! defaults with [`DataOrigin::Fallback`] instead of an error, and an empty
//! table is seeded once with the defaults. Writes always propagate errors.

pub mod products;
pub mod quotes;
pub mod reviews;
pub mod settings;

pub use products::ProductRepository;
pub use quotes::QuoteRepository;
pub use reviews::ReviewRepository;
pub use settings::SettingsRepository;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::backend::BackendError;

pub const PRODUCTS_TABLE: &str = "products";
pub const QUOTES_TABLE: &str = "quotes";
pub const REVIEWS_TABLE: &str = "reviews";
pub const SETTINGS_TABLE: &str = "settings";

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Backend request failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Stored row could not be turned into a domain value.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// No row matched.
    #[error("not found: {0}")]
    NotFound(String),

    /// A row with the same key already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Refused before writing because the value breaks a domain rule.
    #[error("constraint violated: {0}")]
    Constraint(String),
}

impl RepositoryError {
    /// Classify a backend error from a write.
    pub(crate) fn from_write(err: BackendError) -> Self {
        if err.is_conflict() {
            Self::Conflict(err.to_string())
        } else {
            Self::Backend(err)
        }
    }
}

/// Where a read's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    /// Read from the backend.
    Remote,
    /// Backend was empty; defaults were written and returned.
    Seeded,
    /// Backend failed; defaults were returned without writing.
    Fallback,
}

impl DataOrigin {
    /// Whether defaults stood in for remote data.
    #[must_use]
    pub const fn is_default(self) -> bool {
        matches!(self, Self::Seeded | Self::Fallback)
    }
}

/// A fail-open read result.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub value: T,
    pub origin: DataOrigin,
}

impl<T> Loaded<T> {
    #[must_use]
    pub const fn remote(value: T) -> Self {
        Self {
            value,
            origin: DataOrigin::Remote,
        }
    }

    #[must_use]
    pub const fn seeded(value: T) -> Self {
        Self {
            value,
            origin: DataOrigin::Seeded,
        }
    }

    #[must_use]
    pub const fn fallback(value: T) -> Self {
        Self {
            value,
            origin: DataOrigin::Fallback,
        }
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.origin == DataOrigin::Fallback
    }

    #[must_use]
    pub fn into_inner(self) -> T {
        self.value
    }
}

// =============================================================================
// Row Helpers
// =============================================================================

/// Serialize a record into a JSON row.
pub(crate) fn to_row<R: Serialize>(record: &R) -> Result<Value, RepositoryError> {
    serde_json::to_value(record)
        .map_err(|e| RepositoryError::DataCorruption(format!("failed to encode row: {e}")))
}

/// Deserialize a JSON row into a record.
pub(crate) fn from_row<R: DeserializeOwned>(table: &str, row: Value) -> Result<R, RepositoryError> {
    serde_json::from_value(row)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid row in {table}: {e}")))
}

/// Take the first row a write returned.
pub(crate) fn first_row(table: &str, rows: Vec<Value>) -> Result<Value, RepositoryError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| RepositoryError::DataCorruption(format!("write to {table} returned no rows")))
}
