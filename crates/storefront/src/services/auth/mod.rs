//! Authentication service.
//!
//! Owns the active session. Credentials never touch this crate beyond the
//! request that carries them; the identity service verifies passwords and
//! issues tokens. Components that depend on who is signed in subscribe to
//! [`SessionChange`] notifications instead of polling.

mod error;

pub use error::AuthError;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use secrecy::SecretString;
use tracing::{info, instrument, warn};
use url::Url;

use ddh_masale_core::{Email, Role, SessionUser};

use crate::backend::{AuthBackend, AuthSession, OAuthProvider, SignUpOutcome};
use crate::error::{clear_sentry_user, set_sentry_user};

/// Minimum password length accepted by the identity service.
pub const MIN_PASSWORD_LENGTH: usize = 6;

// =============================================================================
// Role Resolution
// =============================================================================

/// Decide the role of a signed-in account.
///
/// A role provisioned on the account always wins; an unrecognised value is
/// treated as `customer`. Accounts without a provisioned role are admins only
/// when their email matches the configured legacy admin address.
#[must_use]
pub fn resolve_role(stored: Option<&str>, email: &Email, legacy_admin: Option<&Email>) -> Role {
    match stored {
        Some(value) => value.parse().unwrap_or_else(|_| {
            warn!(role = %value, "Unrecognised role on account, treating as customer");
            Role::Customer
        }),
        None if legacy_admin.is_some_and(|admin| admin.matches(email)) => Role::Admin,
        None => Role::Customer,
    }
}

// =============================================================================
// Session Notifications
// =============================================================================

/// What happened to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// Notification delivered to subscribers after the session changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionChange {
    pub event: SessionEvent,
    /// The user after the change; `None` once signed out.
    pub user: Option<SessionUser>,
}

type Listener = Arc<dyn Fn(&SessionChange) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// Handle for a registered session listener.
///
/// Dropping the handle unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Listeners>>,
}

impl Subscription {
    /// Unsubscribe now.
    pub fn cancel(self) {
        drop(self);
    }

    /// Keep the listener registered for the manager's lifetime.
    pub fn detach(mut self) {
        self.registry = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entries
                .retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

// =============================================================================
// Session Manager
// =============================================================================

/// Outcome of [`AuthSessionManager::sign_up`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpResult {
    /// The account is ready and now signed in.
    SignedIn(SessionUser),
    /// The identity service sent a confirmation email; sign in after
    /// following it.
    ConfirmationPending { email: Email },
}

struct ActiveSession {
    access_token: SecretString,
    refresh_token: SecretString,
    user: SessionUser,
}

struct ManagerInner<A> {
    backend: Arc<A>,
    legacy_admin_email: Option<Email>,
    oauth_redirect_url: Option<Url>,
    session: RwLock<Option<ActiveSession>>,
    listeners: Arc<Mutex<Listeners>>,
}

/// Holds the current session and notifies subscribers when it changes.
///
/// Cheaply cloneable; clones share the same session.
pub struct AuthSessionManager<A> {
    inner: Arc<ManagerInner<A>>,
}

impl<A> Clone for AuthSessionManager<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: AuthBackend> AuthSessionManager<A> {
    /// Create a signed-out session manager.
    #[must_use]
    pub fn new(
        backend: Arc<A>,
        legacy_admin_email: Option<Email>,
        oauth_redirect_url: Option<Url>,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                backend,
                legacy_admin_email,
                oauth_redirect_url,
                session: RwLock::new(None),
                listeners: Arc::new(Mutex::new(Listeners::default())),
            }),
        }
    }

    /// The signed-in user, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<SessionUser> {
        self.inner
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.user.clone())
    }

    /// Register a listener for session changes.
    ///
    /// Listeners run on the task that changed the session, after the change
    /// is visible through [`current_user`](Self::current_user).
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionChange) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners();
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, Arc::new(listener)));

        Subscription {
            id,
            registry: Arc::downgrade(&self.inner.listeners),
        }
    }

    fn listeners(&self) -> MutexGuard<'_, Listeners> {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent, user: Option<SessionUser>) {
        let change = SessionChange { event, user };
        // Listeners may subscribe or unsubscribe, so call them unlocked.
        let listeners: Vec<Listener> = self
            .listeners()
            .entries
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(&change);
        }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new account with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password is too short.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    /// Returns `AuthError::Network` if the identity service is unreachable.
    #[instrument(skip(self, password))]
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpResult, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;

        let outcome = self
            .inner
            .backend
            .sign_up(&email, &SecretString::from(password))
            .await?;

        match outcome {
            SignUpOutcome::SignedIn(session) => {
                let user = self.install(session, SessionEvent::SignedIn).await;
                Ok(SignUpResult::SignedIn(user))
            }
            SignUpOutcome::ConfirmationPending(user) => {
                info!(user_id = %user.id, "Account created, awaiting email confirmation");
                Ok(SignUpResult::ConfirmationPending { email: user.email })
            }
        }
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::InvalidCredentials` or `AuthError::UserNotFound` if
    /// the identity service refuses the credentials.
    /// Returns `AuthError::EmailNotConfirmed` if the account is unconfirmed.
    /// Returns `AuthError::Network` if the identity service is unreachable.
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionUser, AuthError> {
        let email = Email::parse(email)?;
        let session = self
            .inner
            .backend
            .sign_in_with_password(&email, &SecretString::from(password))
            .await?;

        Ok(self.install(session, SessionEvent::SignedIn).await)
    }

    // =========================================================================
    // OAuth
    // =========================================================================

    /// URL to send the user to for provider sign-in.
    ///
    /// The provider redirects back to the configured OAuth redirect URL with
    /// tokens that [`complete_oauth_sign_in`](Self::complete_oauth_sign_in)
    /// accepts.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Rejected` if the authorize URL cannot be built.
    pub fn sign_in_with_oauth(&self, provider: OAuthProvider) -> Result<Url, AuthError> {
        let redirect = self.inner.oauth_redirect_url.as_ref().map(Url::as_str);
        Ok(self.inner.backend.authorize_url(provider, redirect)?)
    }

    /// Adopt the tokens returned by an OAuth redirect.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Rejected` if the access token is not valid.
    /// Returns `AuthError::Network` if the identity service is unreachable.
    #[instrument(skip_all)]
    pub async fn complete_oauth_sign_in(
        &self,
        access_token: SecretString,
        refresh_token: SecretString,
    ) -> Result<SessionUser, AuthError> {
        let user = self.inner.backend.user_for_token(&access_token).await?;
        let session = AuthSession {
            access_token,
            refresh_token,
            expires_at: None,
            user,
        };
        Ok(self.install(session, SessionEvent::SignedIn).await)
    }

    // =========================================================================
    // Session Lifecycle
    // =========================================================================

    /// Exchange the refresh token for a fresh session.
    ///
    /// A refresh token the identity service refuses ends the session locally.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotSignedIn` if there is no session.
    /// Returns `AuthError::Network` if the identity service is unreachable;
    /// the session is kept.
    /// Returns the mapped backend error if the refresh token was refused.
    #[instrument(skip(self))]
    pub async fn refresh_session(&self) -> Result<SessionUser, AuthError> {
        let refresh_token = self
            .inner
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .ok_or(AuthError::NotSignedIn)?;

        match self.inner.backend.refresh_session(&refresh_token).await {
            Ok(session) => Ok(self.install(session, SessionEvent::TokenRefreshed).await),
            Err(e) if e.is_network() => Err(e.into()),
            Err(e) => {
                warn!(error = %e, "Refresh token refused, ending session");
                self.clear_local().await;
                Err(e.into())
            }
        }
    }

    /// Sign out.
    ///
    /// The local session always ends, even if the identity service cannot
    /// be told. Signing out without a session is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the mapped backend error if revoking the remote session failed.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let Some(access_token) = self.clear_local().await else {
            return Ok(());
        };

        if let Err(e) = self.inner.backend.sign_out(&access_token).await {
            warn!(error = %e, "Failed to revoke remote session");
            return Err(e.into());
        }
        Ok(())
    }

    async fn install(&self, session: AuthSession, event: SessionEvent) -> SessionUser {
        let role = resolve_role(
            session.user.role.as_deref(),
            &session.user.email,
            self.inner.legacy_admin_email.as_ref(),
        );
        let user = SessionUser {
            id: session.user.id,
            email: session.user.email,
            role,
        };

        self.inner
            .backend
            .use_session_token(Some(session.access_token.clone()))
            .await;
        *self
            .inner
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(ActiveSession {
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            user: user.clone(),
        });

        set_sentry_user(&user.id, Some(user.email.as_str()));
        info!(user_id = %user.id, role = %user.role, ?event, "Session established");
        self.emit(event, Some(user.clone()));
        user
    }

    /// End the local session, returning its access token if there was one.
    async fn clear_local(&self) -> Option<SecretString> {
        let previous = self
            .inner
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;

        self.inner.backend.use_session_token(None).await;
        clear_sentry_user();
        info!(user_id = %previous.user.id, "Signed out");
        self.emit(SessionEvent::SignedOut, None);
        Some(previous.access_token)
    }
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password should be at least {MIN_PASSWORD_LENGTH} characters."
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    fn manager(backend: &MemoryBackend) -> AuthSessionManager<MemoryBackend> {
        AuthSessionManager::new(
            Arc::new(backend.clone()),
            Some(email("admin@ddhmasale.com")),
            None,
        )
    }

    #[test]
    fn test_resolve_role_prefers_stored_role() {
        let legacy = email("admin@ddhmasale.com");
        assert_eq!(
            resolve_role(Some("customer"), &legacy, Some(&legacy)),
            Role::Customer
        );
        assert_eq!(
            resolve_role(Some("admin"), &email("ops@example.com"), Some(&legacy)),
            Role::Admin
        );
        assert_eq!(
            resolve_role(Some("superuser"), &email("ops@example.com"), None),
            Role::Customer
        );
    }

    #[test]
    fn test_resolve_role_legacy_admin_fallback() {
        let legacy = email("admin@ddhmasale.com");
        assert_eq!(
            resolve_role(None, &email("Admin@DDHMasale.com"), Some(&legacy)),
            Role::Admin
        );
        assert_eq!(
            resolve_role(None, &email("buyer@example.com"), Some(&legacy)),
            Role::Customer
        );
        assert_eq!(resolve_role(None, &legacy, None), Role::Customer);
    }

    #[tokio::test]
    async fn test_sign_in_notifies_and_switches_bearer() {
        let backend = MemoryBackend::new();
        backend.add_account(&email("buyer@example.com"), "secret1", None);
        let auth = manager(&backend);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = auth.subscribe(move |change| sink.lock().unwrap().push(change.clone()));

        let user = auth.sign_in("buyer@example.com", "secret1").await.unwrap();
        assert_eq!(user.role, Role::Customer);
        assert_eq!(auth.current_user(), Some(user.clone()));
        assert!(backend.session_bearer().is_some());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].event, SessionEvent::SignedIn);
        assert_eq!(seen[0].user, Some(user));
    }

    #[tokio::test]
    async fn test_legacy_admin_email_signs_in_as_admin() {
        let backend = MemoryBackend::new();
        backend.add_account(&email("admin@ddhmasale.com"), "masale-admin", None);

        let user = manager(&backend)
            .sign_in("admin@ddhmasale.com", "masale-admin")
            .await
            .unwrap();
        assert!(user.is_admin());
    }

    #[tokio::test]
    async fn test_wrong_password_keeps_signed_out() {
        let backend = MemoryBackend::new();
        backend.add_account(&email("buyer@example.com"), "secret1", None);
        let auth = manager(&backend);

        let err = auth.sign_in("buyer@example.com", "wrong!").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert!(auth.current_user().is_none());
        assert!(backend.session_bearer().is_none());
    }

    #[tokio::test]
    async fn test_sign_up_validates_locally() {
        let backend = MemoryBackend::new();
        let auth = manager(&backend);

        assert!(matches!(
            auth.sign_up("not-an-email", "secret1").await,
            Err(AuthError::InvalidEmail(_))
        ));
        assert!(matches!(
            auth.sign_up("new@example.com", "12345").await,
            Err(AuthError::WeakPassword(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_up_with_confirmation_pending() {
        let backend = MemoryBackend::new();
        backend.require_email_confirmation(true);
        let auth = manager(&backend);

        let result = auth.sign_up("new@example.com", "secret1").await.unwrap();
        assert_eq!(
            result,
            SignUpResult::ConfirmationPending {
                email: email("new@example.com")
            }
        );
        assert!(auth.current_user().is_none());

        assert!(matches!(
            auth.sign_in("new@example.com", "secret1").await,
            Err(AuthError::EmailNotConfirmed)
        ));
        backend.confirm_account(&email("new@example.com"));
        assert!(auth.sign_in("new@example.com", "secret1").await.is_ok());
    }

    #[tokio::test]
    async fn test_sign_up_duplicate() {
        let backend = MemoryBackend::new();
        let auth = manager(&backend);

        assert!(matches!(
            auth.sign_up("new@example.com", "secret1").await.unwrap(),
            SignUpResult::SignedIn(_)
        ));
        assert!(matches!(
            auth.sign_up("new@example.com", "secret1").await,
            Err(AuthError::UserAlreadyExists)
        ));
    }

    #[tokio::test]
    async fn test_sign_out_clears_locally_even_when_offline() {
        let backend = MemoryBackend::new();
        backend.add_account(&email("buyer@example.com"), "secret1", None);
        let auth = manager(&backend);
        auth.sign_in("buyer@example.com", "secret1").await.unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let _sub = auth.subscribe(move |change| sink.lock().unwrap().push(change.event));

        backend.set_offline(true);
        assert!(matches!(auth.sign_out().await, Err(AuthError::Network(_))));
        assert!(auth.current_user().is_none());
        assert!(backend.session_bearer().is_none());
        assert_eq!(*events.lock().unwrap(), vec![SessionEvent::SignedOut]);

        // Already signed out.
        assert!(auth.sign_out().await.is_ok());
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_rotates_tokens() {
        let backend = MemoryBackend::new();
        backend.add_account(&email("buyer@example.com"), "secret1", None);
        let auth = manager(&backend);
        auth.sign_in("buyer@example.com", "secret1").await.unwrap();
        let first_bearer = backend.session_bearer();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let _sub = auth.subscribe(move |change| sink.lock().unwrap().push(change.event));

        auth.refresh_session().await.unwrap();
        assert_ne!(backend.session_bearer(), first_bearer);
        assert_eq!(*events.lock().unwrap(), vec![SessionEvent::TokenRefreshed]);
    }

    #[tokio::test]
    async fn test_refresh_without_session() {
        let backend = MemoryBackend::new();
        assert!(matches!(
            manager(&backend).refresh_session().await,
            Err(AuthError::NotSignedIn)
        ));
    }

    #[tokio::test]
    async fn test_oauth_round_trip() {
        let backend = MemoryBackend::new();
        let auth = AuthSessionManager::new(
            Arc::new(backend.clone()),
            None,
            Some(Url::parse("https://ddhmasale.com/").unwrap()),
        );

        let url = auth.sign_in_with_oauth(OAuthProvider::Google).unwrap();
        let pairs: Vec<_> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("provider".to_owned(), "google".to_owned())));
        assert!(pairs.contains(&("redirect_to".to_owned(), "https://ddhmasale.com/".to_owned())));

        let (access, refresh) = backend.issue_oauth_tokens(&email("chef@gmail.com"));
        let user = auth.complete_oauth_sign_in(access, refresh).await.unwrap();
        assert_eq!(user.email, email("chef@gmail.com"));
        assert_eq!(user.role, Role::Customer);
    }

    #[tokio::test]
    async fn test_dropped_subscription_stops_delivery() {
        let backend = MemoryBackend::new();
        backend.add_account(&email("buyer@example.com"), "secret1", None);
        let auth = manager(&backend);

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sub = auth.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        auth.sign_in("buyer@example.com", "secret1").await.unwrap();
        sub.cancel();
        auth.sign_out().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_detached_subscription_stays_registered() {
        let backend = MemoryBackend::new();
        backend.add_account(&email("buyer@example.com"), "secret1", None);
        let auth = manager(&backend);

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        auth.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .detach();

        auth.sign_in("buyer@example.com", "secret1").await.unwrap();
        auth.sign_out().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
