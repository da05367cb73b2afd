//! Product reviews.

use chrono::Utc;
use tracing::{instrument, warn};

use ddh_masale_core::{ProductId, Rating, Review, ReviewId, ReviewSummary, SessionUser};

use crate::backend::RemoteStore;
use crate::error::{AppError, ValidationError, add_breadcrumb};
use crate::repository::{Loaded, ReviewRepository};
use crate::services::auth::AuthError;

/// Reviews of one product together with their summary.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductReviews {
    /// Newest first.
    pub reviews: Vec<Review>,
    pub summary: ReviewSummary,
}

impl ProductReviews {
    fn new(reviews: Vec<Review>) -> Self {
        let summary = ReviewSummary::from_reviews(&reviews);
        Self { reviews, summary }
    }
}

/// Reads and writes reviews for the product detail page.
pub struct ReviewService<'a, S> {
    reviews: ReviewRepository<'a, S>,
}

impl<'a, S: RemoteStore> ReviewService<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self {
            reviews: ReviewRepository::new(store),
        }
    }

    /// Reviews of `product_id`, failing open to an empty list.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn load(&self, product_id: &ProductId) -> Loaded<ProductReviews> {
        match self.reviews.list_for_product(product_id).await {
            Ok(reviews) => Loaded::remote(ProductReviews::new(reviews)),
            Err(e) => {
                warn!(error = %e, "Failed to load reviews");
                Loaded::fallback(ProductReviews::new(Vec::new()))
            }
        }
    }

    /// Post a review as `user` and return the refreshed list.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Auth` if nobody is signed in.
    /// Returns `AppError::Validation` for an empty comment or a rating
    /// outside 1 to 5; nothing is written.
    /// Returns `AppError::Persistence` if the write fails.
    #[instrument(skip(self, user, comment), fields(product_id = %product_id))]
    pub async fn submit(
        &self,
        user: Option<&SessionUser>,
        product_id: &ProductId,
        rating: i64,
        comment: &str,
    ) -> Result<ProductReviews, AppError> {
        let user = user.ok_or(AuthError::NotSignedIn)?;
        let comment = comment.trim();
        if comment.is_empty() {
            return Err(ValidationError::EmptyComment.into());
        }
        let rating = Rating::new(rating).map_err(|_| ValidationError::InvalidRating)?;

        let review = Review {
            id: ReviewId::generate(),
            product_id: product_id.clone(),
            user_id: user.id.clone(),
            user_email: user.email.clone(),
            rating,
            comment: comment.to_owned(),
            created_at: Utc::now(),
        };
        let created = self.reviews.create(&review).await?;
        add_breadcrumb("review", "Posted review", Some(&[("product_id", product_id.as_str())]));

        let refreshed = self.load(product_id).await;
        if refreshed.is_fallback() {
            return Ok(ProductReviews::new(vec![created]));
        }
        Ok(refreshed.into_inner())
    }
}
