//! Wire types for the Supabase auth and REST endpoints.

use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use ddh_masale_core::{Email, UserId};

use crate::backend::{AuthSession, BackendError, RemoteUser};

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Serialize)]
pub(super) struct PasswordCredentials<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct RefreshTokenGrant<'a> {
    pub refresh_token: &'a str,
}

// =============================================================================
// Responses
// =============================================================================

/// Session payload from `/token` and auto-confirmed `/signup`.
#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: UserResponse,
}

/// Account payload from `/user` and unconfirmed `/signup`.
#[derive(Debug, Deserialize)]
pub(super) struct UserResponse {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub app_metadata: AppMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct AppMetadata {
    #[serde(default)]
    pub role: Option<String>,
}

/// Error body shapes returned by PostgREST and GoTrue.
///
/// PostgREST sends `{code, message, details, hint}` with a string code. GoTrue
/// sends either `{code, error_code, msg}` with a numeric code or the older
/// `{error, error_description}`.
#[derive(Debug, Default, Deserialize)]
pub(super) struct ErrorBody {
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, alias = "msg", alias = "error_description")]
    pub message: Option<String>,
}

impl ErrorBody {
    /// The most specific machine-readable code present.
    pub fn code(&self) -> Option<String> {
        self.error_code
            .clone()
            .or_else(|| {
                self.code
                    .as_ref()
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_owned)
            })
            .or_else(|| self.error.clone())
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl TryFrom<UserResponse> for RemoteUser {
    type Error = BackendError;

    fn try_from(user: UserResponse) -> Result<Self, Self::Error> {
        let email = user
            .email
            .as_deref()
            .ok_or_else(|| BackendError::Malformed(format!("account {} has no email", user.id)))?;
        let email = Email::parse(email)
            .map_err(|e| BackendError::Malformed(format!("account {}: {e}", user.id)))?;

        Ok(Self {
            id: UserId::new(user.id),
            email,
            role: user.app_metadata.role,
        })
    }
}

impl TryFrom<TokenResponse> for AuthSession {
    type Error = BackendError;

    fn try_from(token: TokenResponse) -> Result<Self, Self::Error> {
        let expires_at = token
            .expires_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .or_else(|| {
                token
                    .expires_in
                    .map(|secs| Utc::now() + Duration::seconds(secs))
            });

        Ok(Self {
            access_token: SecretString::from(token.access_token),
            refresh_token: SecretString::from(token.refresh_token),
            expires_at,
            user: RemoteUser::try_from(token.user)?,
        })
    }
}
