//! Catalog product.

use serde::{Deserialize, Serialize};

use crate::types::{Price, ProductId};

/// A product in the wholesale catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Open-ended category label ("Ground Spices", "Whole Spices", ...).
    pub category: String,
    pub description: String,
    /// Wholesale price per `unit`.
    pub price: Price,
    /// Primary display image.
    pub image: String,
    /// Gallery images. Empty means "only the primary image".
    #[serde(default)]
    pub images: Vec<String>,
    /// Unit label, e.g. "kg".
    pub unit: String,
    /// Minimum order quantity, in `unit`s. Always at least 1.
    pub moq: u32,
    /// Hidden from customers when false; admins still see it.
    pub is_active: bool,
    #[serde(default)]
    pub specifications: Option<ProductSpecifications>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub origin: Option<String>,
}

/// Technical sheet shown on the product detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSpecifications {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shelf_life: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packaging: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certification: Option<String>,
}

impl Product {
    /// Images to show in the gallery, falling back to the primary image.
    #[must_use]
    pub fn gallery(&self) -> Vec<&str> {
        if self.images.is_empty() {
            vec![self.image.as_str()]
        } else {
            self.images.iter().map(String::as_str).collect()
        }
    }

    /// Whether `quantity` meets the minimum order quantity.
    #[must_use]
    pub const fn accepts_quantity(&self, quantity: u32) -> bool {
        quantity >= self.moq
    }

    /// Case-insensitive match against name and description.
    ///
    /// An empty needle matches everything.
    #[must_use]
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        needle.is_empty()
            || self.name.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
    }
}
