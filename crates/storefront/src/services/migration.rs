//! One-time import of browser-local catalog data.
//!
//! Earlier storefront builds kept products and quote requests in local
//! storage under [`LEGACY_PRODUCTS_KEY`] and [`LEGACY_QUOTES_KEY`]. An export
//! of those keys is a JSON object whose values are either the stored JSON
//! strings or the arrays they encode.
//!
//! The import is idempotent: rows whose id already exists remotely are
//! skipped, so re-running after a partial failure imports only the rest.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{info, instrument, warn};

use ddh_masale_core::{
    Email, Price, Product, ProductId, ProductSpecifications, QuoteId, QuoteRequest, QuoteStatus,
    UserId,
};

use crate::backend::RemoteStore;
use crate::repository::{ProductRepository, QuoteRepository, RepositoryError};

pub const LEGACY_PRODUCTS_KEY: &str = "ddh_products_v2";
pub const LEGACY_QUOTES_KEY: &str = "ddh_quotes_v2";

// =============================================================================
// Snapshot
// =============================================================================

/// Exported local-storage contents.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacySnapshot {
    #[serde(rename = "ddh_products_v2", default, deserialize_with = "stored_array")]
    pub products: Vec<Value>,
    #[serde(rename = "ddh_quotes_v2", default, deserialize_with = "stored_array")]
    pub quotes: Vec<Value>,
}

impl LegacySnapshot {
    /// Parse an export file.
    ///
    /// # Errors
    ///
    /// Returns an error if the export is not a JSON object or a key holds
    /// something other than an array.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Accept either an array or a string holding one, as local storage keeps it.
fn stored_array<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Value>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(rows) => Ok(rows),
        Value::String(encoded) => serde_json::from_str(&encoded).map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!(
            "expected an array, found {other}"
        ))),
    }
}

/// Legacy ids were sometimes numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LegacyId {
    Text(String),
    Number(i64),
}

impl LegacyId {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyProduct {
    id: LegacyId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    description: String,
    price: Price,
    #[serde(default)]
    image: String,
    #[serde(default)]
    images: Option<Vec<String>>,
    #[serde(default)]
    unit: String,
    moq: i64,
    #[serde(default)]
    is_active: Option<bool>,
    #[serde(default)]
    specifications: Option<ProductSpecifications>,
    #[serde(default)]
    features: Option<Vec<String>>,
    #[serde(default)]
    origin: Option<String>,
}

impl TryFrom<LegacyProduct> for Product {
    type Error = String;

    fn try_from(p: LegacyProduct) -> Result<Self, Self::Error> {
        if p.name.trim().is_empty() || !p.price.is_positive() {
            return Err("missing name or non-positive price".to_owned());
        }
        let moq = u32::try_from(p.moq)
            .ok()
            .filter(|moq| *moq >= 1)
            .ok_or_else(|| format!("invalid minimum order quantity {}", p.moq))?;

        Ok(Self {
            id: ProductId::new(p.id.into_string()),
            name: p.name,
            category: p.category,
            description: p.description,
            price: p.price,
            image: p.image,
            images: p.images.unwrap_or_default(),
            unit: p.unit,
            moq,
            is_active: p.is_active.unwrap_or(true),
            specifications: p.specifications,
            features: p.features.unwrap_or_default(),
            origin: p.origin,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyQuote {
    id: LegacyId,
    product_id: LegacyId,
    #[serde(default)]
    product_name: String,
    #[serde(default)]
    customer_name: String,
    email: String,
    #[serde(default)]
    phone: String,
    quantity: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    consent: bool,
    #[serde(default)]
    status: QuoteStatus,
    #[serde(default)]
    user_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LegacyQuote> for QuoteRequest {
    type Error = String;

    fn try_from(q: LegacyQuote) -> Result<Self, Self::Error> {
        if !q.consent {
            return Err("customer did not consent to be contacted".to_owned());
        }
        let email = Email::parse(&q.email).map_err(|e| format!("invalid email: {e}"))?;
        let quantity = u32::try_from(q.quantity)
            .ok()
            .filter(|quantity| *quantity > 0)
            .ok_or_else(|| format!("invalid quantity {}", q.quantity))?;

        Ok(Self {
            id: QuoteId::new(q.id.into_string()),
            product_id: ProductId::new(q.product_id.into_string()),
            product_name: q.product_name,
            customer_name: q.customer_name,
            email,
            phone: q.phone,
            quantity,
            message: q.message,
            consent: true,
            status: q.status,
            user_id: q.user_id.map(UserId::new),
            created_at: q.created_at,
        })
    }
}

// =============================================================================
// Report
// =============================================================================

/// A legacy row that was not imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFailure {
    /// The row's id, when it had a readable one.
    pub id: Option<String>,
    pub reason: String,
}

/// Outcome for one kind of row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityReport {
    pub imported: usize,
    /// Already present remotely, or repeated in the export.
    pub skipped: usize,
    pub failed: Vec<MigrationFailure>,
}

impl EntityReport {
    fn fail(&mut self, id: Option<String>, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(id = ?id, reason = %reason, "Legacy row not imported");
        self.failed.push(MigrationFailure { id, reason });
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub products: EntityReport,
    pub quotes: EntityReport,
}

impl MigrationReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.products.failed.is_empty() && self.quotes.failed.is_empty()
    }
}

// =============================================================================
// Migration
// =============================================================================

/// Import `snapshot` into the backend.
///
/// Rows are written one at a time; a failed row is reported and the run
/// continues.
///
/// # Errors
///
/// Returns `RepositoryError` only if the existing ids cannot be read, in
/// which case nothing is written.
#[instrument(skip_all, fields(products = snapshot.products.len(), quotes = snapshot.quotes.len()))]
pub async fn migrate<S: RemoteStore>(
    store: &S,
    snapshot: &LegacySnapshot,
) -> Result<MigrationReport, RepositoryError> {
    let products = ProductRepository::new(store);
    let quotes = QuoteRepository::new(store);

    let mut product_ids: HashSet<String> = products
        .list_remote()
        .await?
        .into_iter()
        .map(|p| p.id.to_string())
        .collect();
    let mut quote_ids: HashSet<String> = quotes
        .list()
        .await?
        .into_iter()
        .map(|q| q.id.to_string())
        .collect();

    let mut report = MigrationReport::default();

    for row in &snapshot.products {
        let entry = &mut report.products;
        let product = match decode::<LegacyProduct>(row).and_then(Product::try_from) {
            Ok(product) => product,
            Err(reason) => {
                entry.fail(row_id(row), reason);
                continue;
            }
        };
        if !product_ids.insert(product.id.to_string()) {
            entry.skipped += 1;
            continue;
        }
        match products.create(&product).await {
            Ok(_) => entry.imported += 1,
            Err(RepositoryError::Conflict(_)) => entry.skipped += 1,
            Err(e) => entry.fail(Some(product.id.to_string()), e.to_string()),
        }
    }

    for row in &snapshot.quotes {
        let entry = &mut report.quotes;
        let quote = match decode::<LegacyQuote>(row).and_then(QuoteRequest::try_from) {
            Ok(quote) => quote,
            Err(reason) => {
                entry.fail(row_id(row), reason);
                continue;
            }
        };
        if !quote_ids.insert(quote.id.to_string()) {
            entry.skipped += 1;
            continue;
        }
        match quotes.create(&quote).await {
            Ok(_) => entry.imported += 1,
            Err(RepositoryError::Conflict(_)) => entry.skipped += 1,
            Err(e) => entry.fail(Some(quote.id.to_string()), e.to_string()),
        }
    }

    info!(
        products_imported = report.products.imported,
        products_skipped = report.products.skipped,
        products_failed = report.products.failed.len(),
        quotes_imported = report.quotes.imported,
        quotes_skipped = report.quotes.skipped,
        quotes_failed = report.quotes.failed.len(),
        "Legacy migration finished"
    );
    Ok(report)
}

fn decode<T: for<'de> Deserialize<'de>>(row: &Value) -> Result<T, String> {
    T::deserialize(row).map_err(|e| format!("unreadable row: {e}"))
}

fn row_id(row: &Value) -> Option<String> {
    match row.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::repository::{PRODUCTS_TABLE, QUOTES_TABLE};
    use serde_json::json;

    fn export() -> String {
        let products = json!([
            {
                "id": 1, "name": "Turmeric Powder (Haldi)", "category": "Ground Spices",
                "description": "Bright", "price": 180, "image": "t.jpg", "unit": "kg",
                "moq": 50, "isActive": true,
                "specifications": { "shelfLife": "12 months" }
            },
            {
                "id": "legacy-8", "name": "Black Pepper", "category": "Whole Spices",
                "description": "", "price": 640.5, "image": "p.jpg", "unit": "kg", "moq": 10
            },
            { "id": "bad", "name": "", "category": "X", "price": 0, "unit": "kg", "moq": 1 }
        ]);
        let quotes = json!([
            {
                "id": "q1", "productId": "1", "productName": "Turmeric Powder (Haldi)",
                "customerName": "Asha Traders", "email": "asha@traders.in",
                "phone": "+91 90000 00000", "quantity": 50, "message": "",
                "consent": true, "status": "responded", "createdAt": "2025-11-02T10:00:00Z"
            },
            {
                "id": "q2", "productId": "1", "productName": "Turmeric Powder (Haldi)",
                "customerName": "No Consent", "email": "x@example.com", "phone": "1",
                "quantity": 50, "consent": false, "status": "pending",
                "createdAt": "2025-11-03T10:00:00Z"
            }
        ]);
        json!({
            "ddh_products_v2": products.to_string(),
            "ddh_quotes_v2": quotes,
        })
        .to_string()
    }

    #[test]
    fn test_snapshot_accepts_encoded_strings_and_arrays() {
        let snapshot = LegacySnapshot::from_json(&export()).unwrap();
        assert_eq!(snapshot.products.len(), 3);
        assert_eq!(snapshot.quotes.len(), 2);

        let empty = LegacySnapshot::from_json("{}").unwrap();
        assert!(empty.products.is_empty());
        assert!(LegacySnapshot::from_json(r#"{"ddh_quotes_v2": 5}"#).is_err());
    }

    #[tokio::test]
    async fn test_migrate_reports_and_is_idempotent() {
        let backend = MemoryBackend::new();
        let snapshot = LegacySnapshot::from_json(&export()).unwrap();

        let first = migrate(&backend, &snapshot).await.unwrap();
        assert_eq!(first.products.imported, 2);
        assert_eq!(first.products.failed.len(), 1);
        assert_eq!(first.products.failed[0].id.as_deref(), Some("bad"));
        assert_eq!(first.quotes.imported, 1);
        assert_eq!(first.quotes.failed[0].id.as_deref(), Some("q2"));
        assert!(!first.is_clean());

        let second = migrate(&backend, &snapshot).await.unwrap();
        assert_eq!(second.products.imported, 0);
        assert_eq!(second.products.skipped, 2);
        assert_eq!(second.quotes.skipped, 1);

        assert_eq!(backend.rows(PRODUCTS_TABLE).len(), 2);
        assert_eq!(backend.rows(QUOTES_TABLE).len(), 1);
    }

    #[tokio::test]
    async fn test_numeric_ids_become_strings() {
        let backend = MemoryBackend::new();
        let snapshot = LegacySnapshot::from_json(&export()).unwrap();
        migrate(&backend, &snapshot).await.unwrap();

        let product = ProductRepository::new(&backend)
            .get(&ProductId::new("1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            product.specifications.unwrap().shelf_life.as_deref(),
            Some("12 months")
        );
        assert!(product.is_active);
    }

    #[tokio::test]
    async fn test_unreadable_remote_aborts_before_writing() {
        let backend = MemoryBackend::new();
        backend.set_fail_reads(true);
        let snapshot = LegacySnapshot::from_json(&export()).unwrap();

        assert!(migrate(&backend, &snapshot).await.is_err());
        assert_eq!(backend.write_count(), 0);
    }
}
