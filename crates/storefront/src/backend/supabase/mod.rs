//! Supabase REST (PostgREST) and Auth (GoTrue) client.
//!
//! Every request carries the project's anon key in the `apikey` header. Table
//! requests are authorized with the signed-in user's access token when one has
//! been set via [`AuthBackend::use_session_token`], and with the anon key
//! otherwise, so row-level security policies see the real caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use ddh_masale_storefront::backend::{AuthBackend, SupabaseClient};
//!
//! let client = SupabaseClient::new(&config.supabase)?;
//! let session = client.sign_in_with_password(&email, &password).await?;
//! client.use_session_token(Some(session.access_token.clone())).await;
//! ```

mod types;

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::instrument;
use url::Url;

use ddh_masale_core::Email;

use self::types::{
    ErrorBody, PasswordCredentials, RefreshTokenGrant, TokenResponse, UserResponse,
};
use super::{
    AuthBackend, AuthSession, BackendError, OAuthProvider, Query, RemoteStore, RemoteUser,
    SignUpOutcome,
};
use crate::config::SupabaseConfig;

const RETURN_REPRESENTATION: &str = "return=representation";
const UPSERT_PREFERENCE: &str = "resolution=merge-duplicates,return=representation";

/// Client for a Supabase project.
///
/// Cheaply cloneable; clones share the HTTP connection pool and the session
/// token.
#[derive(Clone)]
pub struct SupabaseClient {
    inner: Arc<SupabaseClientInner>,
}

struct SupabaseClientInner {
    client: reqwest::Client,
    rest_url: Url,
    auth_url: Url,
    anon_key: SecretString,
    /// Access token of the signed-in user, if any.
    session_token: RwLock<Option<SecretString>>,
}

impl SupabaseClient {
    /// Create a new client for the configured project.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Url` if the project URL cannot be extended.
    /// Returns `BackendError::Malformed` if the anon key is not a valid header value.
    /// Returns `BackendError::Http` if the HTTP client fails to build.
    pub fn new(config: &SupabaseConfig) -> Result<Self, BackendError> {
        let mut base = config.url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(config.anon_key.expose_secret())
                .map_err(|e| BackendError::Malformed(format!("invalid anon key: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent("DDHMasale/1.0")
            .build()?;

        Ok(Self {
            inner: Arc::new(SupabaseClientInner {
                client,
                rest_url: base.join("rest/v1/")?,
                auth_url: base.join("auth/v1/")?,
                anon_key: config.anon_key.clone(),
                session_token: RwLock::new(None),
            }),
        })
    }

    /// Base URL of the REST endpoint.
    #[must_use]
    pub fn rest_url(&self) -> &Url {
        &self.inner.rest_url
    }

    /// Whether table requests currently run as a signed-in user.
    pub async fn has_session_token(&self) -> bool {
        self.inner.session_token.read().await.is_some()
    }

    // =========================================================================
    // Request Building
    // =========================================================================

    /// Bearer for table requests: the session token, or the anon key.
    async fn table_bearer(&self) -> String {
        self.inner.session_token.read().await.as_ref().map_or_else(
            || self.inner.anon_key.expose_secret().to_owned(),
            |token| token.expose_secret().to_owned(),
        )
    }

    async fn table_request(
        &self,
        method: Method,
        table: &str,
        query: &Query,
    ) -> Result<RequestBuilder, BackendError> {
        let mut url = self.inner.rest_url.join(table)?;
        let mut pairs = query.to_pairs();
        if method == Method::GET {
            pairs.insert(0, ("select".to_owned(), "*".to_owned()));
        }
        if !pairs.is_empty() {
            let mut serializer = url.query_pairs_mut();
            for (key, value) in &pairs {
                serializer.append_pair(key, value);
            }
        }

        let bearer = self.table_bearer().await;
        Ok(self.inner.client.request(method, url).bearer_auth(bearer))
    }

    fn auth_endpoint(&self, path: &str, pairs: &[(&str, &str)]) -> Result<Url, BackendError> {
        let mut url = self.inner.auth_url.join(path)?;
        if !pairs.is_empty() {
            let mut serializer = url.query_pairs_mut();
            for (key, value) in pairs {
                serializer.append_pair(key, value);
            }
        }
        Ok(url)
    }

    // =========================================================================
    // Response Handling
    // =========================================================================

    /// Send a request and turn error statuses into `BackendError`.
    async fn send(request: RequestBuilder) -> Result<Response, BackendError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(BackendError::RateLimited(retry_after));
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(rejection(status, &text));
        }

        Ok(response)
    }

    /// Send a request and parse the JSON body.
    async fn execute<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, BackendError> {
        let response = Self::send(request).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Build a `Rejected` error from an error response body.
fn rejection(status: StatusCode, text: &str) -> BackendError {
    let body: ErrorBody = serde_json::from_str(text).unwrap_or_default();
    let message = body
        .message
        .clone()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            if text.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_owned()
            } else {
                text.to_owned()
            }
        });

    BackendError::Rejected {
        status: status.as_u16(),
        code: body.code(),
        message,
    }
}

// =============================================================================
// Table API
// =============================================================================

impl RemoteStore for SupabaseClient {
    #[instrument(skip(self, query), fields(table = %table))]
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, BackendError> {
        let request = self.table_request(Method::GET, table, query).await?;
        Self::execute(request).await
    }

    #[instrument(skip(self, rows), fields(table = %table, rows = rows.len()))]
    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, BackendError> {
        let request = self
            .table_request(Method::POST, table, &Query::new())
            .await?
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&rows);
        Self::execute(request).await
    }

    #[instrument(skip(self, query, patch), fields(table = %table))]
    async fn update(
        &self,
        table: &str,
        query: &Query,
        patch: Value,
    ) -> Result<Vec<Value>, BackendError> {
        let request = self
            .table_request(Method::PATCH, table, query)
            .await?
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&patch);
        Self::execute(request).await
    }

    #[instrument(skip(self, rows), fields(table = %table, rows = rows.len()))]
    async fn upsert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, BackendError> {
        let request = self
            .table_request(Method::POST, table, &Query::new())
            .await?
            .header("Prefer", UPSERT_PREFERENCE)
            .json(&rows);
        Self::execute(request).await
    }

    #[instrument(skip(self, query), fields(table = %table))]
    async fn delete(&self, table: &str, query: &Query) -> Result<usize, BackendError> {
        let request = self
            .table_request(Method::DELETE, table, query)
            .await?
            .header("Prefer", RETURN_REPRESENTATION);
        let deleted: Vec<Value> = Self::execute(request).await?;
        Ok(deleted.len())
    }
}

// =============================================================================
// Identity API
// =============================================================================

impl AuthBackend for SupabaseClient {
    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<SignUpOutcome, BackendError> {
        let url = self.auth_endpoint("signup", &[])?;
        let request = self
            .inner
            .client
            .post(url)
            .bearer_auth(self.inner.anon_key.expose_secret())
            .json(&PasswordCredentials {
                email: email.as_str(),
                password: password.expose_secret(),
            });

        // Auto-confirmed projects answer with a session, others with the
        // bare account awaiting confirmation.
        let body: Value = Self::execute(request).await?;
        if body.get("access_token").is_some() {
            let token: TokenResponse = serde_json::from_value(body)?;
            Ok(SignUpOutcome::SignedIn(AuthSession::try_from(token)?))
        } else {
            let user: UserResponse = serde_json::from_value(body)?;
            Ok(SignUpOutcome::ConfirmationPending(RemoteUser::try_from(user)?))
        }
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, BackendError> {
        let url = self.auth_endpoint("token", &[("grant_type", "password")])?;
        let request = self
            .inner
            .client
            .post(url)
            .bearer_auth(self.inner.anon_key.expose_secret())
            .json(&PasswordCredentials {
                email: email.as_str(),
                password: password.expose_secret(),
            });

        let token: TokenResponse = Self::execute(request).await?;
        AuthSession::try_from(token)
    }

    fn authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: Option<&str>,
    ) -> Result<Url, BackendError> {
        let mut pairs = vec![("provider", provider.as_str())];
        if let Some(redirect) = redirect_to {
            pairs.push(("redirect_to", redirect));
        }
        self.auth_endpoint("authorize", &pairs)
    }

    #[instrument(skip(self, access_token))]
    async fn user_for_token(
        &self,
        access_token: &SecretString,
    ) -> Result<RemoteUser, BackendError> {
        let url = self.auth_endpoint("user", &[])?;
        let request = self
            .inner
            .client
            .get(url)
            .bearer_auth(access_token.expose_secret());

        let user: UserResponse = Self::execute(request).await?;
        RemoteUser::try_from(user)
    }

    #[instrument(skip(self, refresh_token))]
    async fn refresh_session(
        &self,
        refresh_token: &SecretString,
    ) -> Result<AuthSession, BackendError> {
        let url = self.auth_endpoint("token", &[("grant_type", "refresh_token")])?;
        let request = self
            .inner
            .client
            .post(url)
            .bearer_auth(self.inner.anon_key.expose_secret())
            .json(&RefreshTokenGrant {
                refresh_token: refresh_token.expose_secret(),
            });

        let token: TokenResponse = Self::execute(request).await?;
        AuthSession::try_from(token)
    }

    #[instrument(skip(self, access_token))]
    async fn sign_out(&self, access_token: &SecretString) -> Result<(), BackendError> {
        let url = self.auth_endpoint("logout", &[])?;
        let request = self
            .inner
            .client
            .post(url)
            .bearer_auth(access_token.expose_secret());

        Self::send(request).await?;
        Ok(())
    }

    async fn use_session_token(&self, token: Option<SecretString>) {
        *self.inner.session_token.write().await = token;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_client(url: &str) -> SupabaseClient {
        SupabaseClient::new(&SupabaseConfig {
            url: Url::parse(url).unwrap(),
            anon_key: SecretString::from("anon-key"),
        })
        .unwrap()
    }

    #[test]
    fn test_endpoints_are_rooted_at_project_url() {
        let client = test_client("https://abc.supabase.co");
        assert_eq!(client.rest_url().as_str(), "https://abc.supabase.co/rest/v1/");

        let client = test_client("https://proxy.example.com/supabase");
        assert_eq!(
            client.rest_url().as_str(),
            "https://proxy.example.com/supabase/rest/v1/"
        );
    }

    #[test]
    fn test_authorize_url() {
        let client = test_client("https://abc.supabase.co");
        let url = client
            .authorize_url(OAuthProvider::Google, Some("https://ddhmasale.com/auth/callback"))
            .unwrap();

        assert_eq!(url.path(), "/auth/v1/authorize");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("provider".to_owned(), "google".to_owned()),
                (
                    "redirect_to".to_owned(),
                    "https://ddhmasale.com/auth/callback".to_owned()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_table_request_uses_session_token_when_set() {
        let client = test_client("https://abc.supabase.co");
        assert_eq!(client.table_bearer().await, "anon-key");

        client
            .use_session_token(Some(SecretString::from("user-token")))
            .await;
        assert!(client.has_session_token().await);
        assert_eq!(client.table_bearer().await, "user-token");

        client.use_session_token(None).await;
        assert_eq!(client.table_bearer().await, "anon-key");
    }

    #[tokio::test]
    async fn test_select_url() {
        let client = test_client("https://abc.supabase.co");
        let request = client
            .table_request(
                Method::GET,
                "quotes",
                &Query::new().eq("user_id", "u-1").order_desc("created_at"),
            )
            .await
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(
            request.url().as_str(),
            "https://abc.supabase.co/rest/v1/quotes?select=*&user_id=eq.u-1&order=created_at.desc"
        );
    }

    #[test]
    fn test_rejection_prefers_body_message() {
        let err = rejection(
            StatusCode::BAD_REQUEST,
            r#"{"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#,
        );
        match err {
            BackendError::Rejected {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 400);
                assert_eq!(code.as_deref(), Some("invalid_credentials"));
                assert_eq!(message, "Invalid login credentials");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejection_without_body() {
        let err = rejection(StatusCode::SERVICE_UNAVAILABLE, "");
        assert!(err.to_string().contains("Service Unavailable"));
    }
}
