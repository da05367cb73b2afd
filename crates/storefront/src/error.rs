//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type for every user-initiated action. Storage
//! failures are captured to Sentry via [`AppError::report`] before being
//! surfaced.

use thiserror::Error;

use ddh_masale_core::QuoteStatus;

use crate::repository::RepositoryError;
use crate::services::auth::AuthError;

/// Input rejected locally, before any network call.
///
/// `Display` is the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please agree to be contacted to proceed with the quote request.")]
    ConsentRequired,

    #[error("Minimum order quantity is {moq} {unit}.")]
    BelowMinimumOrder { moq: u32, unit: String },

    #[error("Please fill in your {0}.")]
    MissingField(&'static str),

    #[error("Please enter a valid email address.")]
    InvalidEmail,

    #[error("Please provide a valid name and price.")]
    InvalidProduct,

    #[error("Minimum order quantity must be at least 1.")]
    InvalidMinimumOrder,

    #[error("Rating must be between 1 and 5.")]
    InvalidRating,

    #[error("Please write a comment.")]
    EmptyComment,

    #[error("A {from} quote cannot be marked {to}.")]
    InvalidTransition { from: QuoteStatus, to: QuoteStatus },

    #[error("No quote request is in progress.")]
    NoQuoteInProgress,
}

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Input rejected locally.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Remote read or write failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] RepositoryError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Signed-in user lacks the required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl AppError {
    /// Message safe to show the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => err.to_string(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => {
                    "Invalid email or password".to_string()
                }
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_string()
                }
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::EmailNotConfirmed => {
                    "Please confirm your email address before signing in".to_string()
                }
                AuthError::Network(_) => {
                    "Could not reach the server. Please check your connection and try again."
                        .to_string()
                }
                AuthError::NotSignedIn => "Please sign in to continue".to_string(),
                AuthError::Rejected(_) => "Authentication failed".to_string(),
            },
            Self::Persistence(RepositoryError::NotFound(_)) | Self::NotFound(_) => {
                "The requested item no longer exists".to_string()
            }
            Self::Persistence(_) => "Could not save your changes. Please try again.".to_string(),
            Self::Forbidden(_) => "You do not have access to this area".to_string(),
        }
    }

    /// Whether repeating the same action may succeed.
    ///
    /// Backend rejections such as a row-level security 403 are permanent;
    /// only transient backend failures count.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Persistence(RepositoryError::Backend(err)) => err.is_transient(),
            Self::Auth(AuthError::Network(_)) => true,
            _ => false,
        }
    }

    /// Capture persistence failures to Sentry and log them.
    ///
    /// Validation and auth failures are expected user errors and are not
    /// reported.
    pub fn report(&self) {
        if matches!(self, Self::Persistence(_)) {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Action failed"
            );
        }
    }
}

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on sign-out to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("quote", "Opened quote form", Some(&[("product_id", "1")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::Forbidden("admin only".to_string());
        assert_eq!(err.to_string(), "Forbidden: admin only");
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            AppError::from(ValidationError::ConsentRequired).user_message(),
            "Please agree to be contacted to proceed with the quote request."
        );
        assert_eq!(
            AppError::from(ValidationError::InvalidProduct).user_message(),
            "Please provide a valid name and price."
        );
        assert_eq!(
            ValidationError::BelowMinimumOrder {
                moq: 50,
                unit: "kg".to_owned()
            }
            .to_string(),
            "Minimum order quantity is 50 kg."
        );
        assert_eq!(
            ValidationError::InvalidTransition {
                from: QuoteStatus::Closed,
                to: QuoteStatus::Responded
            }
            .to_string(),
            "A closed quote cannot be marked responded."
        );
    }

    #[test]
    fn test_retryable() {
        let write_failure = AppError::Persistence(RepositoryError::Backend(
            BackendError::Unavailable("down".to_owned()),
        ));
        assert!(write_failure.is_retryable());
        assert_eq!(
            write_failure.user_message(),
            "Could not save your changes. Please try again."
        );

        assert!(AppError::Auth(AuthError::Network("down".to_owned())).is_retryable());
        assert!(!AppError::from(ValidationError::ConsentRequired).is_retryable());
        assert!(!AppError::Persistence(RepositoryError::NotFound("x".to_owned())).is_retryable());
    }

    #[test]
    fn test_permanent_rejection_is_not_retryable() {
        let forbidden = AppError::Persistence(RepositoryError::Backend(BackendError::Rejected {
            status: 403,
            code: Some("42501".to_owned()),
            message: "new row violates row-level security policy".to_owned(),
        }));
        assert!(!forbidden.is_retryable());

        let server_error = AppError::Persistence(RepositoryError::Backend(BackendError::Rejected {
            status: 502,
            code: None,
            message: "Bad Gateway".to_owned(),
        }));
        assert!(server_error.is_retryable());

        let throttled =
            AppError::Persistence(RepositoryError::Backend(BackendError::RateLimited(60)));
        assert!(throttled.is_retryable());
    }

    #[test]
    fn test_auth_messages_do_not_leak_account_existence() {
        assert_eq!(
            AppError::Auth(AuthError::UserNotFound).user_message(),
            AppError::Auth(AuthError::InvalidCredentials).user_message()
        );
    }
}
