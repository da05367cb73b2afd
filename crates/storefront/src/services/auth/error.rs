//! Authentication error types.

use thiserror::Error;

use crate::backend::BackendError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] ddh_masale_core::EmailError),

    /// Wrong password for an existing account.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// No account for this email.
    #[error("user not found")]
    UserNotFound,

    /// An account with this email already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Account exists but its email has not been confirmed.
    #[error("email not confirmed")]
    EmailNotConfirmed,

    /// Identity service could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// Identity service refused the request for another reason.
    #[error("rejected by identity service: {0}")]
    Rejected(String),

    /// Operation needs an active session.
    #[error("not signed in")]
    NotSignedIn,
}

impl From<BackendError> for AuthError {
    fn from(err: BackendError) -> Self {
        if err.is_network() {
            return Self::Network(err.to_string());
        }

        match err.code() {
            Some("invalid_credentials" | "invalid_grant") => Self::InvalidCredentials,
            Some("user_not_found") => Self::UserNotFound,
            Some("user_already_exists" | "email_exists") => Self::UserAlreadyExists,
            Some("email_not_confirmed") => Self::EmailNotConfirmed,
            Some("weak_password") => Self::WeakPassword(match err {
                BackendError::Rejected { message, .. } => message,
                other => other.to_string(),
            }),
            _ => match err {
                BackendError::Rejected { message, .. } => Self::Rejected(message),
                other => Self::Rejected(other.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(code: &str, message: &str) -> BackendError {
        BackendError::Rejected {
            status: 400,
            code: Some(code.to_owned()),
            message: message.to_owned(),
        }
    }

    #[test]
    fn test_classifies_backend_rejections() {
        assert!(matches!(
            AuthError::from(rejected("invalid_credentials", "Invalid login credentials")),
            AuthError::InvalidCredentials
        ));
        assert!(matches!(
            AuthError::from(rejected("invalid_grant", "Invalid login credentials")),
            AuthError::InvalidCredentials
        ));
        assert!(matches!(
            AuthError::from(rejected("user_already_exists", "User already registered")),
            AuthError::UserAlreadyExists
        ));
        assert!(matches!(
            AuthError::from(rejected("user_not_found", "User not found")),
            AuthError::UserNotFound
        ));
        assert!(matches!(
            AuthError::from(rejected("weak_password", "too short")),
            AuthError::WeakPassword(msg) if msg == "too short"
        ));
        assert!(matches!(
            AuthError::from(rejected("over_email_send_rate_limit", "slow down")),
            AuthError::Rejected(msg) if msg == "slow down"
        ));
    }

    #[test]
    fn test_unreachable_backend_is_network_error() {
        let err = AuthError::from(BackendError::Unavailable("connection refused".to_owned()));
        assert!(matches!(err, AuthError::Network(_)));
    }
}
