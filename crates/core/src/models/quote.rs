//! Wholesale quote request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Email, ProductId, QuoteId, QuoteStatus, UserId};

/// A customer's pricing inquiry for one product.
///
/// Only persisted with `consent == true` and `quantity` at or above the
/// product's minimum order quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub id: QuoteId,
    pub product_id: ProductId,
    /// Product name at the time of the request.
    pub product_name: String,
    pub customer_name: String,
    pub email: Email,
    pub phone: String,
    pub quantity: u32,
    pub message: String,
    pub consent: bool,
    pub status: QuoteStatus,
    /// Account that submitted the request, when signed in.
    pub user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl QuoteRequest {
    /// Case-insensitive match on customer name or email.
    #[must_use]
    pub fn matches_customer(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        needle.is_empty()
            || self.customer_name.to_lowercase().contains(&needle)
            || self.email.as_str().to_lowercase().contains(&needle)
    }
}
