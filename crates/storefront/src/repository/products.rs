//! Product repository.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{instrument, warn};

use ddh_masale_core::seed::default_catalog;
use ddh_masale_core::{Price, Product, ProductId, ProductSpecifications};

use super::{Loaded, PRODUCTS_TABLE, RepositoryError, first_row, from_row, to_row};
use crate::backend::{Query, RemoteStore};

/// Row shape of the `products` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ProductRecord {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub price: Price,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    pub unit: String,
    pub moq: i64,
    /// Rows written before the flag existed carry `null`.
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub specifications: Option<ProductSpecifications>,
    #[serde(default)]
    pub features: Option<Vec<String>>,
    #[serde(default)]
    pub origin: Option<String>,
}

impl TryFrom<ProductRecord> for Product {
    type Error = RepositoryError;

    fn try_from(r: ProductRecord) -> Result<Self, Self::Error> {
        let moq = u32::try_from(r.moq)
            .ok()
            .filter(|moq| *moq >= 1)
            .ok_or_else(|| {
                RepositoryError::DataCorruption(format!("product {} has invalid moq {}", r.id, r.moq))
            })?;

        Ok(Self {
            id: ProductId::new(r.id),
            name: r.name,
            category: r.category,
            description: r.description,
            price: r.price,
            image: r.image,
            images: r.images.unwrap_or_default(),
            unit: r.unit,
            moq,
            is_active: r.is_active.unwrap_or(true),
            specifications: r.specifications,
            features: r.features.unwrap_or_default(),
            origin: r.origin,
        })
    }
}

impl From<&Product> for ProductRecord {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id.to_string(),
            name: p.name.clone(),
            category: p.category.clone(),
            description: p.description.clone(),
            price: p.price,
            image: p.image.clone(),
            images: (!p.images.is_empty()).then(|| p.images.clone()),
            unit: p.unit.clone(),
            moq: i64::from(p.moq),
            is_active: Some(p.is_active),
            specifications: p.specifications.clone(),
            features: (!p.features.is_empty()).then(|| p.features.clone()),
            origin: p.origin.clone(),
        }
    }
}

/// Repository for catalog products.
pub struct ProductRepository<'a, S> {
    store: &'a S,
}

impl<'a, S: RemoteStore> ProductRepository<'a, S> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// List the catalog by id, failing open.
    ///
    /// A backend failure returns the built-in catalog without writing. An
    /// empty table is seeded with the built-in catalog, which is returned.
    /// Rows that cannot be decoded are skipped and logged.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Loaded<Vec<Product>> {
        let rows = match self.store.select(PRODUCTS_TABLE, &catalog_order()).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Product read failed, serving built-in catalog");
                return Loaded::fallback(default_catalog());
            }
        };

        if rows.is_empty() {
            return self.seed().await;
        }

        let products = rows
            .into_iter()
            .filter_map(|row| match decode(row) {
                Ok(product) => Some(product),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable product row");
                    None
                }
            })
            .collect();

        Loaded::remote(products)
    }

    /// List every product stored remotely, without fallback or seeding.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the read fails.
    /// Returns `RepositoryError::DataCorruption` if a row cannot be decoded.
    pub async fn list_remote(&self) -> Result<Vec<Product>, RepositoryError> {
        self.store
            .select(PRODUCTS_TABLE, &catalog_order())
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    async fn seed(&self) -> Loaded<Vec<Product>> {
        let catalog = default_catalog();
        let rows: Result<Vec<_>, _> = catalog
            .iter()
            .map(|p| to_row(&ProductRecord::from(p)))
            .collect();

        let written = match rows {
            Ok(rows) => self
                .store
                .insert(PRODUCTS_TABLE, rows)
                .await
                .map_err(RepositoryError::from_write),
            Err(e) => Err(e),
        };

        match written {
            Ok(_) => {
                tracing::info!(count = catalog.len(), "Seeded empty product table");
                Loaded::seeded(catalog)
            }
            Err(e) => {
                warn!(error = %e, "Seeding product table failed, serving built-in catalog");
                Loaded::fallback(catalog)
            }
        }
    }

    /// Get a product by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the read fails.
    /// Returns `RepositoryError::DataCorruption` if the row cannot be decoded.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let rows = self
            .store
            .select(PRODUCTS_TABLE, &Query::new().eq("id", id).limit(1))
            .await?;

        rows.into_iter().next().map(decode).transpose()
    }

    /// Insert a new product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the ID already exists.
    /// Returns `RepositoryError::Backend` for other backend errors.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn create(&self, product: &Product) -> Result<Product, RepositoryError> {
        let row = to_row(&ProductRecord::from(product))?;
        let rows = self
            .store
            .insert(PRODUCTS_TABLE, vec![row])
            .await
            .map_err(RepositoryError::from_write)?;

        decode(first_row(PRODUCTS_TABLE, rows)?)
    }

    /// Replace a product's stored fields. Last write wins.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no product has this ID.
    /// Returns `RepositoryError::Backend` for backend errors.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn update(&self, product: &Product) -> Result<Product, RepositoryError> {
        let row = to_row(&ProductRecord::from(product))?;
        let rows = self
            .store
            .update(PRODUCTS_TABLE, &Query::new().eq("id", &product.id), row)
            .await
            .map_err(RepositoryError::from_write)?;

        if rows.is_empty() {
            return Err(RepositoryError::NotFound(format!("product {}", product.id)));
        }
        decode(first_row(PRODUCTS_TABLE, rows)?)
    }

    /// Show or hide a product in the customer catalog.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no product has this ID.
    /// Returns `RepositoryError::Backend` for backend errors.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn set_active(&self, id: &ProductId, active: bool) -> Result<Product, RepositoryError> {
        let rows = self
            .store
            .update(
                PRODUCTS_TABLE,
                &Query::new().eq("id", id),
                json!({ "is_active": active }),
            )
            .await
            .map_err(RepositoryError::from_write)?;

        if rows.is_empty() {
            return Err(RepositoryError::NotFound(format!("product {id}")));
        }
        decode(first_row(PRODUCTS_TABLE, rows)?)
    }

    /// Remove a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no product has this ID.
    /// Returns `RepositoryError::Backend` for backend errors.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete(&self, id: &ProductId) -> Result<(), RepositoryError> {
        let removed = self
            .store
            .delete(PRODUCTS_TABLE, &Query::new().eq("id", id))
            .await
            .map_err(RepositoryError::from_write)?;

        if removed == 0 {
            return Err(RepositoryError::NotFound(format!("product {id}")));
        }
        Ok(())
    }
}

/// Rows come back in storage order otherwise, which shifts after updates.
fn catalog_order() -> Query {
    Query::new().order_asc("id")
}

fn decode(row: serde_json::Value) -> Result<Product, RepositoryError> {
    Product::try_from(from_row::<ProductRecord>(PRODUCTS_TABLE, row)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::repository::DataOrigin;

    fn legacy_row(id: &str, is_active: serde_json::Value) -> serde_json::Value {
        json!({
            "id": id,
            "name": "Ajwain Seeds",
            "category": "Whole Spices",
            "description": "Carom seeds",
            "price": 210,
            "image": "ajwain.jpg",
            "unit": "kg",
            "moq": 5,
            "is_active": is_active,
        })
    }

    #[tokio::test]
    async fn test_list_seeds_empty_table() {
        let backend = MemoryBackend::new();
        let repo = ProductRepository::new(&backend);

        let loaded = repo.list().await;
        assert_eq!(loaded.origin, DataOrigin::Seeded);
        assert_eq!(loaded.value, default_catalog());
        assert_eq!(backend.rows(PRODUCTS_TABLE).len(), default_catalog().len());

        let again = repo.list().await;
        assert_eq!(again.origin, DataOrigin::Remote);
        assert_eq!(again.value, default_catalog());
        assert_eq!(backend.write_count(), 1);
    }

    #[tokio::test]
    async fn test_list_falls_back_on_read_failure() {
        let backend = MemoryBackend::new();
        backend.set_fail_reads(true);

        let loaded = ProductRepository::new(&backend).list().await;
        assert!(loaded.is_fallback());
        assert_eq!(loaded.value, default_catalog());
        assert_eq!(backend.write_count(), 0);
    }

    #[tokio::test]
    async fn test_list_falls_back_when_seeding_fails() {
        let backend = MemoryBackend::new();
        backend.set_fail_writes(true);

        let loaded = ProductRepository::new(&backend).list().await;
        assert!(loaded.is_fallback());
        assert!(loaded.origin.is_default());
        assert_eq!(loaded.value.len(), 7);
    }

    #[tokio::test]
    async fn test_missing_active_flag_reads_as_active() {
        let backend = MemoryBackend::new();
        backend.put_rows(
            PRODUCTS_TABLE,
            vec![
                legacy_row("a", serde_json::Value::Null),
                {
                    let mut row = legacy_row("b", serde_json::Value::Null);
                    row.as_object_mut().unwrap().remove("is_active");
                    row
                },
                legacy_row("c", json!(false)),
            ],
        );

        let products = ProductRepository::new(&backend).list().await.into_inner();
        let active: Vec<_> = products.iter().map(|p| p.is_active).collect();
        assert_eq!(active, vec![true, true, false]);
    }

    #[tokio::test]
    async fn test_list_order_survives_updates() {
        let backend = MemoryBackend::new();
        backend.put_rows(
            PRODUCTS_TABLE,
            vec![
                legacy_row("c", json!(true)),
                legacy_row("a", json!(true)),
                legacy_row("b", json!(true)),
            ],
        );
        let repo = ProductRepository::new(&backend);
        let ids = |products: Vec<Product>| -> Vec<String> {
            products.into_iter().map(|p| p.id.to_string()).collect()
        };

        assert_eq!(ids(repo.list().await.into_inner()), vec!["a", "b", "c"]);

        repo.set_active(&ProductId::new("a"), false).await.unwrap();
        assert_eq!(ids(repo.list().await.into_inner()), vec!["a", "b", "c"]);
        assert_eq!(ids(repo.list_remote().await.unwrap()), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_corrupt_rows_are_skipped() {
        let backend = MemoryBackend::new();
        let mut bad = legacy_row("bad", json!(true));
        bad["moq"] = json!(0);
        backend.put_rows(PRODUCTS_TABLE, vec![legacy_row("good", json!(true)), bad]);

        let repo = ProductRepository::new(&backend);
        let products = repo.list().await.into_inner();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id.as_str(), "good");

        assert!(matches!(
            repo.list_remote().await,
            Err(RepositoryError::DataCorruption(_))
        ));
    }

    #[tokio::test]
    async fn test_create_update_toggle_delete() {
        let backend = MemoryBackend::new();
        let repo = ProductRepository::new(&backend);
        let mut product = default_catalog().remove(0);
        product.id = ProductId::new("p-new");

        repo.create(&product).await.unwrap();
        assert!(matches!(
            repo.create(&product).await,
            Err(RepositoryError::Conflict(_))
        ));

        product.price = Price::from_rupees(199);
        let updated = repo.update(&product).await.unwrap();
        assert_eq!(updated.price, Price::from_rupees(199));

        let hidden = repo.set_active(&product.id, false).await.unwrap();
        assert!(!hidden.is_active);
        assert!(!repo.get(&product.id).await.unwrap().unwrap().is_active);

        repo.delete(&product.id).await.unwrap();
        assert!(repo.get(&product.id).await.unwrap().is_none());
        assert!(matches!(
            repo.delete(&product.id).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_write_failure_propagates() {
        let backend = MemoryBackend::new();
        backend.set_fail_writes(true);
        let product = default_catalog().remove(0);

        let err = ProductRepository::new(&backend)
            .create(&product)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Backend(_)));
    }
}
