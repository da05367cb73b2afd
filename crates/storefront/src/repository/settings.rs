//! Brand settings repository.
//!
//! The settings table holds a single row keyed by [`SETTINGS_ROW_ID`].

use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use ddh_masale_core::BrandSettings;
use ddh_masale_core::seed::default_settings;

use super::{Loaded, RepositoryError, SETTINGS_TABLE, first_row, from_row, to_row};
use crate::backend::{Query, RemoteStore};

/// Fixed key of the settings row.
pub const SETTINGS_ROW_ID: i64 = 1;

/// Row shape of the `settings` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SettingsRecord {
    id: i64,
    #[serde(flatten)]
    settings: BrandSettings,
}

/// Repository for the brand settings singleton.
pub struct SettingsRepository<'a, S> {
    store: &'a S,
}

impl<'a, S: RemoteStore> SettingsRepository<'a, S> {
    /// Create a new settings repository.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Read the settings, failing open.
    ///
    /// The first read against an empty table writes and returns the
    /// defaults. Once a row exists it is never re-seeded. A backend failure
    /// returns the defaults without writing.
    #[instrument(skip(self))]
    pub async fn get(&self) -> Loaded<BrandSettings> {
        let query = Query::new().eq("id", SETTINGS_ROW_ID).limit(1);
        let rows = match self.store.select(SETTINGS_TABLE, &query).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Settings read failed, serving defaults");
                return Loaded::fallback(default_settings());
            }
        };

        let Some(row) = rows.into_iter().next() else {
            return self.seed().await;
        };

        match from_row::<SettingsRecord>(SETTINGS_TABLE, row) {
            Ok(record) => Loaded::remote(record.settings),
            Err(e) => {
                warn!(error = %e, "Settings row unreadable, serving defaults");
                Loaded::fallback(default_settings())
            }
        }
    }

    async fn seed(&self) -> Loaded<BrandSettings> {
        let defaults = default_settings();
        match self.write(&defaults).await {
            Ok(stored) => {
                tracing::info!("Seeded empty settings table");
                Loaded::seeded(stored)
            }
            Err(e) => {
                warn!(error = %e, "Seeding settings failed, serving defaults");
                Loaded::fallback(defaults)
            }
        }
    }

    /// Save the settings, replacing the stored row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the write fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row cannot be decoded.
    #[instrument(skip(self, settings), fields(brand_name = %settings.brand_name))]
    pub async fn save(&self, settings: &BrandSettings) -> Result<BrandSettings, RepositoryError> {
        self.write(settings).await
    }

    async fn write(&self, settings: &BrandSettings) -> Result<BrandSettings, RepositoryError> {
        let row = to_row(&SettingsRecord {
            id: SETTINGS_ROW_ID,
            settings: settings.clone(),
        })?;
        let rows = self
            .store
            .upsert(SETTINGS_TABLE, vec![row])
            .await
            .map_err(RepositoryError::from_write)?;

        let record: SettingsRecord = from_row(SETTINGS_TABLE, first_row(SETTINGS_TABLE, rows)?)?;
        Ok(record.settings)
    }
}
