//! Customer product reviews.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Email, ProductId, Rating, ReviewId, UserId};

/// A review left by a signed-in customer. Read-only once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    /// Shown as the author.
    pub user_email: Email,
    pub rating: Rating,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Aggregate shown above the review list.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReviewSummary {
    pub count: usize,
    /// Mean rating rounded to one decimal place; `None` without reviews.
    pub average: Option<f64>,
}

impl ReviewSummary {
    #[must_use]
    pub fn from_reviews(reviews: &[Review]) -> Self {
        if reviews.is_empty() {
            return Self::default();
        }

        let total: u32 = reviews.iter().map(|r| u32::from(r.rating.get())).sum();
        #[allow(clippy::cast_precision_loss)] // review counts stay far below f64 precision
        let mean = f64::from(total) / reviews.len() as f64;

        Self {
            count: reviews.len(),
            average: Some((mean * 10.0).round() / 10.0),
        }
    }

    /// Number of filled stars to draw.
    #[must_use]
    pub fn stars(&self) -> u8 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // average is within 1..=5
        self.average.map_or(0, |avg| avg.round() as u8)
    }
}
