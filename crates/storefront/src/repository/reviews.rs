//! Review repository. Reviews are append-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use ddh_masale_core::{Email, ProductId, Rating, Review, ReviewId, UserId};

use super::{REVIEWS_TABLE, RepositoryError, first_row, from_row, to_row};
use crate::backend::{Query, RemoteStore};

/// Row shape of the `reviews` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ReviewRecord {
    pub id: String,
    pub product_id: String,
    pub user_id: String,
    pub user_email: String,
    pub rating: i64,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ReviewRecord> for Review {
    type Error = RepositoryError;

    fn try_from(r: ReviewRecord) -> Result<Self, Self::Error> {
        let user_email = Email::parse(&r.user_email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in review {}: {e}", r.id))
        })?;
        let rating = Rating::new(r.rating).map_err(|e| {
            RepositoryError::DataCorruption(format!("review {}: {e}", r.id))
        })?;

        Ok(Self {
            id: ReviewId::new(r.id),
            product_id: ProductId::new(r.product_id),
            user_id: UserId::new(r.user_id),
            user_email,
            rating,
            comment: r.comment,
            created_at: r.created_at,
        })
    }
}

impl From<&Review> for ReviewRecord {
    fn from(r: &Review) -> Self {
        Self {
            id: r.id.to_string(),
            product_id: r.product_id.to_string(),
            user_id: r.user_id.to_string(),
            user_email: r.user_email.to_string(),
            rating: i64::from(r.rating.get()),
            comment: r.comment.clone(),
            created_at: r.created_at,
        }
    }
}

/// Repository for product reviews.
pub struct ReviewRepository<'a, S> {
    store: &'a S,
}

impl<'a, S: RemoteStore> ReviewRepository<'a, S> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Reviews of one product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the read fails.
    /// Returns `RepositoryError::DataCorruption` if a row cannot be decoded.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn list_for_product(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<Review>, RepositoryError> {
        self.store
            .select(
                REVIEWS_TABLE,
                &Query::new()
                    .eq("product_id", product_id)
                    .order_desc("created_at"),
            )
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// Append a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the ID already exists.
    /// Returns `RepositoryError::Backend` for other backend errors.
    #[instrument(skip(self, review), fields(review_id = %review.id, product_id = %review.product_id))]
    pub async fn create(&self, review: &Review) -> Result<Review, RepositoryError> {
        let row = to_row(&ReviewRecord::from(review))?;
        let rows = self
            .store
            .insert(REVIEWS_TABLE, vec![row])
            .await
            .map_err(RepositoryError::from_write)?;

        decode(first_row(REVIEWS_TABLE, rows)?)
    }
}

fn decode(row: serde_json::Value) -> Result<Review, RepositoryError> {
    Review::try_from(from_row::<ReviewRecord>(REVIEWS_TABLE, row)?)
}
