//! Admin form types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ddh_masale_core::{Price, Product, ProductId, ProductSpecifications};
use ddh_masale_storefront::ValidationError;

pub const DEFAULT_CATEGORY: &str = "Ground Spices";
pub const DEFAULT_UNIT: &str = "kg";

/// Product create/edit form.
///
/// `id` is `None` for a new product. Editing keeps the product's active flag;
/// new products always start active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductForm {
    pub id: Option<ProductId>,
    pub name: String,
    pub category: String,
    pub description: String,
    pub price: Decimal,
    pub image: String,
    pub images: Vec<String>,
    pub unit: String,
    pub moq: u32,
    pub is_active: bool,
    pub specifications: Option<ProductSpecifications>,
    pub features: Vec<String>,
    pub origin: Option<String>,
}

impl Default for ProductForm {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            category: DEFAULT_CATEGORY.to_owned(),
            description: String::new(),
            price: Decimal::ZERO,
            image: String::new(),
            images: Vec::new(),
            unit: DEFAULT_UNIT.to_owned(),
            moq: 1,
            is_active: true,
            specifications: None,
            features: Vec::new(),
            origin: None,
        }
    }
}

impl ProductForm {
    /// Blank form for a new product.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Form pre-filled from an existing product.
    #[must_use]
    pub fn edit(product: &Product) -> Self {
        Self {
            id: Some(product.id.clone()),
            name: product.name.clone(),
            category: product.category.clone(),
            description: product.description.clone(),
            price: product.price.amount(),
            image: product.image.clone(),
            images: product.images.clone(),
            unit: product.unit.clone(),
            moq: product.moq,
            is_active: product.is_active,
            specifications: product.specifications.clone(),
            features: product.features.clone(),
            origin: product.origin.clone(),
        }
    }

    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Check the form before anything is sent.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidProduct` for a blank name or a price
    /// that is not positive.
    /// Returns `ValidationError::InvalidMinimumOrder` for an MOQ of zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() || self.price <= Decimal::ZERO {
            return Err(ValidationError::InvalidProduct);
        }
        if self.moq < 1 {
            return Err(ValidationError::InvalidMinimumOrder);
        }
        Ok(())
    }

    /// Validate and build the product to store.
    ///
    /// # Errors
    ///
    /// Returns the `ValidationError` from [`validate`](Self::validate).
    pub fn into_product(self) -> Result<Product, ValidationError> {
        self.validate()?;

        let (id, is_active) = match self.id {
            Some(id) => (id, self.is_active),
            None => (ProductId::generate(), true),
        };

        Ok(Product {
            id,
            name: self.name.trim().to_owned(),
            category: self.category,
            description: self.description,
            price: Price::new(self.price),
            image: self.image,
            images: self.images,
            unit: self.unit,
            moq: self.moq,
            is_active,
            specifications: self.specifications,
            features: self.features,
            origin: self.origin,
        })
    }
}
