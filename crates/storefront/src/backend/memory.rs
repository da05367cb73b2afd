//! In-process backend.
//!
//! Implements both [`RemoteStore`] and [`AuthBackend`] over plain maps so the
//! repositories, session manager and quote workflow can run without a network.
//! Failures can be injected per direction to exercise the fail-open read path
//! and the propagated write path.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use url::Url;

use ddh_masale_core::{Email, Role, UserId};

use super::{
    AuthBackend, AuthSession, BackendError, OAuthProvider, Order, Query, RemoteStore, RemoteUser,
    SignUpOutcome,
};

/// Minimum password length enforced by the identity service.
const MIN_PASSWORD_LENGTH: usize = 6;
const SESSION_LIFETIME_SECS: i64 = 3600;

/// Backend holding everything in memory.
///
/// Cheaply cloneable; clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    state: Mutex<MemoryState>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    offline: AtomicBool,
    require_confirmation: AtomicBool,
    writes: AtomicUsize,
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<String, Vec<Value>>,
    /// Keyed by lowercased email.
    accounts: HashMap<String, Account>,
    /// Access token to account key.
    sessions: HashMap<String, String>,
    /// Refresh token to account key.
    refresh_tokens: HashMap<String, String>,
    bearer: Option<String>,
}

#[derive(Debug, Clone)]
struct Account {
    id: UserId,
    email: Email,
    password: String,
    role: Option<String>,
    confirmed: bool,
}

impl Account {
    fn remote_user(&self) -> RemoteUser {
        RemoteUser {
            id: self.id.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
        }
    }
}

fn rejected(status: u16, code: &str, message: &str) -> BackendError {
    BackendError::Rejected {
        status,
        code: Some(code.to_owned()),
        message: message.to_owned(),
    }
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Test Controls
    // =========================================================================

    /// Make every table read fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, AtomicOrdering::SeqCst);
    }

    /// Make every table write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, AtomicOrdering::SeqCst);
    }

    /// Make every request, tables and identity alike, fail as unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, AtomicOrdering::SeqCst);
    }

    /// Require new accounts to confirm their email before signing in.
    pub fn require_email_confirmation(&self, required: bool) {
        self.inner
            .require_confirmation
            .store(required, AtomicOrdering::SeqCst);
    }

    /// Number of successful table writes so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(AtomicOrdering::SeqCst)
    }

    /// Snapshot of a table's rows in storage order.
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state().tables.get(table).cloned().unwrap_or_default()
    }

    /// Put rows straight into a table, bypassing checks and the write counter.
    pub fn put_rows(&self, table: &str, rows: Vec<Value>) {
        self.state()
            .tables
            .entry(table.to_owned())
            .or_default()
            .extend(rows);
    }

    /// Provision a confirmed account.
    pub fn add_account(&self, email: &Email, password: &str, role: Option<Role>) -> UserId {
        let id = UserId::generate();
        self.state().accounts.insert(
            email.as_str().to_lowercase(),
            Account {
                id: id.clone(),
                email: email.clone(),
                password: password.to_owned(),
                role: role.map(|r| r.to_string()),
                confirmed: true,
            },
        );
        id
    }

    /// Mark an account's email as confirmed.
    pub fn confirm_account(&self, email: &Email) {
        if let Some(account) = self.state().accounts.get_mut(&email.as_str().to_lowercase()) {
            account.confirmed = true;
        }
    }

    /// Simulate the provider redirect after OAuth consent.
    ///
    /// Creates the account on first use, as the identity service does, and
    /// returns the `(access, refresh)` tokens carried by the redirect.
    pub fn issue_oauth_tokens(&self, email: &Email) -> (SecretString, SecretString) {
        let mut state = self.state();
        let key = email.as_str().to_lowercase();
        state.accounts.entry(key.clone()).or_insert_with(|| Account {
            id: UserId::generate(),
            email: email.clone(),
            password: String::new(),
            role: None,
            confirmed: true,
        });
        let session = Self::open_session(&mut state, &key);
        drop(state);
        session.map_or_else(
            || (SecretString::from(""), SecretString::from("")),
            |s| (s.access_token, s.refresh_token),
        )
    }

    /// Bearer token currently used for table requests.
    #[must_use]
    pub fn session_bearer(&self) -> Option<String> {
        self.state().bearer.clone()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn check_read(&self) -> Result<(), BackendError> {
        if self.inner.offline.load(AtomicOrdering::SeqCst) {
            return Err(BackendError::Unavailable("backend offline".to_owned()));
        }
        if self.inner.fail_reads.load(AtomicOrdering::SeqCst) {
            return Err(BackendError::Unavailable("simulated read failure".to_owned()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), BackendError> {
        if self.inner.offline.load(AtomicOrdering::SeqCst) {
            return Err(BackendError::Unavailable("backend offline".to_owned()));
        }
        if self.inner.fail_writes.load(AtomicOrdering::SeqCst) {
            return Err(BackendError::Unavailable("simulated write failure".to_owned()));
        }
        Ok(())
    }

    fn check_online(&self) -> Result<(), BackendError> {
        if self.inner.offline.load(AtomicOrdering::SeqCst) {
            return Err(BackendError::Unavailable("backend offline".to_owned()));
        }
        Ok(())
    }

    fn record_write(&self) {
        self.inner.writes.fetch_add(1, AtomicOrdering::SeqCst);
    }

    fn open_session(state: &mut MemoryState, key: &str) -> Option<AuthSession> {
        let user = state.accounts.get(key)?.remote_user();
        let access = uuid::Uuid::new_v4().to_string();
        let refresh = uuid::Uuid::new_v4().to_string();
        state.sessions.insert(access.clone(), key.to_owned());
        state.refresh_tokens.insert(refresh.clone(), key.to_owned());

        Some(AuthSession {
            access_token: SecretString::from(access),
            refresh_token: SecretString::from(refresh),
            expires_at: Some(Utc::now() + Duration::seconds(SESSION_LIFETIME_SECS)),
            user,
        })
    }
}

// =============================================================================
// Row Matching
// =============================================================================

fn row_id(row: &Value) -> Option<&Value> {
    row.get("id").filter(|v| !v.is_null())
}

fn matches(row: &Value, filters: &[(String, String)]) -> bool {
    filters.iter().all(|(column, expected)| match row.get(column) {
        Some(Value::String(s)) => s == expected,
        Some(Value::Null) | None => false,
        Some(other) => other.to_string() == *expected,
    })
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (
                DateTime::parse_from_rfc3339(x),
                DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), Some(_)) => Ordering::Less,
        (Some(_), None | Some(Value::Null)) => Ordering::Greater,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

fn merge(target: &mut Value, patch: &Value) {
    if let (Value::Object(target), Value::Object(patch)) = (target, patch) {
        for (key, value) in patch {
            target.insert(key.clone(), value.clone());
        }
    }
}

// =============================================================================
// Table API
// =============================================================================

impl RemoteStore for MemoryBackend {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, BackendError> {
        // Suspend once like a network round trip, so concurrent loads interleave.
        tokio::task::yield_now().await;
        self.check_read()?;
        let state = self.state();
        let rows = state.tables.get(table).map(Vec::as_slice).unwrap_or_default();

        let mut selected: Vec<Value> = rows
            .iter()
            .filter(|row| matches(row, query.filters()))
            .cloned()
            .collect();

        match query.ordering() {
            Some((column, Order::Asc)) => {
                selected.sort_by(|a, b| compare(a.get(column), b.get(column)));
            }
            Some((column, Order::Desc)) => {
                // Later inserts win ties.
                selected.reverse();
                selected.sort_by(|a, b| compare(b.get(column), a.get(column)));
            }
            None => {}
        }

        if let Some(limit) = query.max_rows() {
            selected.truncate(limit);
        }

        Ok(selected)
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, BackendError> {
        self.check_write()?;
        let mut state = self.state();
        let existing = state.tables.entry(table.to_owned()).or_default();

        for (i, row) in rows.iter().enumerate() {
            let Some(id) = row_id(row) else { continue };
            let clashes_existing = existing.iter().any(|r| row_id(r) == Some(id));
            let clashes_batch = rows.iter().take(i).any(|r| row_id(r) == Some(id));
            if clashes_existing || clashes_batch {
                return Err(rejected(
                    409,
                    "23505",
                    &format!("duplicate key value violates unique constraint \"{table}_pkey\""),
                ));
            }
        }

        existing.extend(rows.iter().cloned());
        drop(state);
        self.record_write();
        Ok(rows)
    }

    async fn update(
        &self,
        table: &str,
        query: &Query,
        patch: Value,
    ) -> Result<Vec<Value>, BackendError> {
        self.check_write()?;
        let mut state = self.state();
        let mut updated = Vec::new();

        if let Some(rows) = state.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|row| matches(row, query.filters())) {
                merge(row, &patch);
                updated.push(row.clone());
            }
        }

        drop(state);
        self.record_write();
        Ok(updated)
    }

    async fn upsert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, BackendError> {
        self.check_write()?;
        let mut state = self.state();
        let existing = state.tables.entry(table.to_owned()).or_default();
        let mut stored = Vec::with_capacity(rows.len());

        for row in rows {
            let position = row_id(&row)
                .and_then(|id| existing.iter().position(|r| row_id(r) == Some(id)));
            match position.and_then(|i| existing.get_mut(i)) {
                Some(current) => {
                    merge(current, &row);
                    stored.push(current.clone());
                }
                None => {
                    existing.push(row.clone());
                    stored.push(row);
                }
            }
        }

        drop(state);
        self.record_write();
        Ok(stored)
    }

    async fn delete(&self, table: &str, query: &Query) -> Result<usize, BackendError> {
        self.check_write()?;
        let mut state = self.state();
        let removed = state.tables.get_mut(table).map_or(0, |rows| {
            let before = rows.len();
            rows.retain(|row| !matches(row, query.filters()));
            before - rows.len()
        });

        drop(state);
        self.record_write();
        Ok(removed)
    }
}

// =============================================================================
// Identity API
// =============================================================================

impl AuthBackend for MemoryBackend {
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<SignUpOutcome, BackendError> {
        self.check_online()?;
        let password = password.expose_secret();
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(rejected(
                422,
                "weak_password",
                &format!("Password should be at least {MIN_PASSWORD_LENGTH} characters."),
            ));
        }

        let key = email.as_str().to_lowercase();
        let confirmed = !self.inner.require_confirmation.load(AtomicOrdering::SeqCst);
        let mut state = self.state();
        if state.accounts.contains_key(&key) {
            return Err(rejected(422, "user_already_exists", "User already registered"));
        }

        let account = Account {
            id: UserId::generate(),
            email: email.clone(),
            password: password.to_owned(),
            role: None,
            confirmed,
        };
        let user = account.remote_user();
        state.accounts.insert(key.clone(), account);

        if !confirmed {
            return Ok(SignUpOutcome::ConfirmationPending(user));
        }

        Self::open_session(&mut state, &key)
            .map(SignUpOutcome::SignedIn)
            .ok_or_else(|| BackendError::Malformed("account vanished during sign-up".to_owned()))
    }

    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, BackendError> {
        self.check_online()?;
        let key = email.as_str().to_lowercase();
        let mut state = self.state();

        let account = state
            .accounts
            .get(&key)
            .ok_or_else(|| rejected(400, "user_not_found", "User not found"))?;
        if account.password.is_empty() || account.password != password.expose_secret() {
            return Err(rejected(400, "invalid_credentials", "Invalid login credentials"));
        }
        if !account.confirmed {
            return Err(rejected(400, "email_not_confirmed", "Email not confirmed"));
        }

        Self::open_session(&mut state, &key)
            .ok_or_else(|| BackendError::Malformed("account vanished during sign-in".to_owned()))
    }

    fn authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: Option<&str>,
    ) -> Result<Url, BackendError> {
        let mut url = Url::parse("http://localhost/auth/v1/authorize")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("provider", provider.as_str());
            if let Some(redirect) = redirect_to {
                pairs.append_pair("redirect_to", redirect);
            }
        }
        Ok(url)
    }

    async fn user_for_token(
        &self,
        access_token: &SecretString,
    ) -> Result<RemoteUser, BackendError> {
        self.check_online()?;
        let state = self.state();
        state
            .sessions
            .get(access_token.expose_secret())
            .and_then(|key| state.accounts.get(key))
            .map(Account::remote_user)
            .ok_or_else(|| rejected(401, "bad_jwt", "invalid JWT"))
    }

    async fn refresh_session(
        &self,
        refresh_token: &SecretString,
    ) -> Result<AuthSession, BackendError> {
        self.check_online()?;
        let mut state = self.state();
        let key = state
            .refresh_tokens
            .remove(refresh_token.expose_secret())
            .ok_or_else(|| rejected(400, "refresh_token_not_found", "Invalid Refresh Token"))?;

        Self::open_session(&mut state, &key)
            .ok_or_else(|| rejected(400, "user_not_found", "User not found"))
    }

    async fn sign_out(&self, access_token: &SecretString) -> Result<(), BackendError> {
        self.check_online()?;
        self.state().sessions.remove(access_token.expose_secret());
        Ok(())
    }

    async fn use_session_token(&self, token: Option<SecretString>) {
        self.state().bearer = token.map(|t| t.expose_secret().to_owned());
    }
}
