//! Customer-facing catalog views.
//!
//! Pure filtering over a product snapshot. Inactive products never reach a
//! customer through any of these views.

use ddh_masale_core::{Product, ProductId};

/// Category filter value that matches every product.
pub const ALL_CATEGORIES: &str = "All";

/// Maximum number of related products on a detail page.
pub const RELATED_LIMIT: usize = 3;

/// Filter applied to the customer listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    /// [`ALL_CATEGORIES`] or an exact category label.
    pub category: String,
    /// Case-insensitive needle over name and description.
    pub search: String,
}

impl Default for CatalogQuery {
    fn default() -> Self {
        Self {
            category: ALL_CATEGORIES.to_owned(),
            search: String::new(),
        }
    }
}

impl CatalogQuery {
    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    #[must_use]
    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    fn accepts(&self, product: &Product) -> bool {
        (self.category == ALL_CATEGORIES || product.category == self.category)
            && product.matches_search(&self.search)
    }
}

/// Read-only view of the catalog as a customer sees it.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    #[must_use]
    pub const fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    /// Active products in catalog order.
    pub fn visible(&self) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(|p| p.is_active)
    }

    /// Active products matching `query`.
    #[must_use]
    pub fn list(&self, query: &CatalogQuery) -> Vec<&Product> {
        self.visible().filter(|p| query.accepts(p)).collect()
    }

    /// `All` followed by each visible category in first-appearance order.
    #[must_use]
    pub fn categories(&self) -> Vec<&str> {
        let mut categories = vec![ALL_CATEGORIES];
        for product in self.visible() {
            if !categories.contains(&product.category.as_str()) {
                categories.push(&product.category);
            }
        }
        categories
    }

    /// Look up a product for its detail page. Inactive products are not found.
    #[must_use]
    pub fn find_visible(&self, id: &ProductId) -> Option<&Product> {
        self.visible().find(|p| &p.id == id)
    }

    /// Other visible products in the same category.
    #[must_use]
    pub fn related(&self, product: &Product) -> Vec<&Product> {
        self.visible()
            .filter(|p| p.category == product.category && p.id != product.id)
            .take(RELATED_LIMIT)
            .collect()
    }
}
