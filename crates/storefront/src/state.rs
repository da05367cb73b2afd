//! Application state shared across views.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use ddh_masale_core::seed::default_settings;
use ddh_masale_core::{BrandSettings, Email, Product, QuoteRequest, SessionUser};

use crate::backend::{AuthBackend, BackendError, RemoteStore, SupabaseClient};
use crate::config::StorefrontConfig;
use crate::error::AppError;
use crate::repository::{Loaded, ProductRepository, QuoteRepository, SettingsRepository};
use crate::services::auth::{AuthError, AuthSessionManager};
use crate::services::catalog::Catalog;
use crate::services::quote_workflow::QuoteController;
use crate::services::reviews::ReviewService;

// =============================================================================
// View Scope
// =============================================================================

/// Kind of data a view loads. Loads of different kinds never supersede
/// each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    Products,
    Settings,
}

/// Lifetime of a view that loads data.
///
/// A load started through a scope only lands if the view is still mounted
/// and no newer load of the same kind was started from the same scope.
#[derive(Debug, Clone)]
pub struct ViewScope {
    inner: Arc<ScopeInner>,
}

#[derive(Debug)]
struct ScopeInner {
    mounted: AtomicBool,
    products: AtomicU64,
    settings: AtomicU64,
}

impl Default for ViewScope {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewScope {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                mounted: AtomicBool::new(true),
                products: AtomicU64::new(0),
                settings: AtomicU64::new(0),
            }),
        }
    }

    fn generation(&self, kind: LoadKind) -> &AtomicU64 {
        match kind {
            LoadKind::Products => &self.inner.products,
            LoadKind::Settings => &self.inner.settings,
        }
    }

    /// Start a load of `kind`, superseding any load of the same kind already
    /// in flight.
    #[must_use]
    pub fn begin_load(&self, kind: LoadKind) -> LoadTicket {
        let generation = self.generation(kind).fetch_add(1, Ordering::SeqCst) + 1;
        LoadTicket {
            scope: self.clone(),
            kind,
            generation,
        }
    }

    /// The view went away; every outstanding load is now stale.
    pub fn unmount(&self) {
        self.inner.mounted.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.load(Ordering::SeqCst)
    }
}

/// Token for one load started from a [`ViewScope`].
#[derive(Debug)]
pub struct LoadTicket {
    scope: ViewScope,
    kind: LoadKind,
    generation: u64,
}

impl LoadTicket {
    /// Whether the result of this load may still be applied.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.scope.is_mounted()
            && self.scope.generation(self.kind).load(Ordering::SeqCst) == self.generation
    }
}

// =============================================================================
// App State
// =============================================================================

/// Application state shared across all views.
///
/// This struct is cheaply cloneable via `Arc` and owns the backend client,
/// the session manager, and the last loaded catalog and brand settings.
pub struct AppState<B> {
    inner: Arc<AppStateInner<B>>,
}

impl<B> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct AppStateInner<B> {
    backend: Arc<B>,
    auth: AuthSessionManager<B>,
    products: RwLock<Vec<Product>>,
    settings: RwLock<BrandSettings>,
}

impl AppState<SupabaseClient> {
    /// Create state backed by the configured Supabase project.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the HTTP client cannot be built.
    pub fn from_config(config: &StorefrontConfig) -> Result<Self, BackendError> {
        let client = SupabaseClient::new(&config.supabase)?;
        Ok(Self::new(
            client,
            config.legacy_admin_email.clone(),
            config.oauth_redirect_url.clone(),
        ))
    }
}

impl<B: RemoteStore + AuthBackend> AppState<B> {
    /// Create state over `backend`, signed out, with an empty catalog and the
    /// default brand settings.
    #[must_use]
    pub fn new(
        backend: B,
        legacy_admin_email: Option<Email>,
        oauth_redirect_url: Option<url::Url>,
    ) -> Self {
        let backend = Arc::new(backend);
        let auth = AuthSessionManager::new(
            Arc::clone(&backend),
            legacy_admin_email,
            oauth_redirect_url,
        );

        Self {
            inner: Arc::new(AppStateInner {
                backend,
                auth,
                products: RwLock::new(Vec::new()),
                settings: RwLock::new(default_settings()),
            }),
        }
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    #[must_use]
    pub fn auth(&self) -> &AuthSessionManager<B> {
        &self.inner.auth
    }

    #[must_use]
    pub fn current_user(&self) -> Option<SessionUser> {
        self.inner.auth.current_user()
    }

    /// Last loaded products, inactive ones included.
    #[must_use]
    pub fn products(&self) -> Vec<Product> {
        self.inner
            .products
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the cached products after an edit.
    pub fn set_products(&self, products: Vec<Product>) {
        *self
            .inner
            .products
            .write()
            .unwrap_or_else(PoisonError::into_inner) = products;
    }

    #[must_use]
    pub fn settings(&self) -> BrandSettings {
        self.inner
            .settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the cached settings after an edit.
    pub fn set_settings(&self, settings: BrandSettings) {
        *self
            .inner
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner) = settings;
    }

    /// Customer view of the cached products.
    #[must_use]
    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.products())
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Reload the catalog for a view.
    ///
    /// Returns `None`, leaving the cache untouched, if the result arrived
    /// after the view unmounted or a newer product load started.
    pub async fn refresh_products(&self, scope: &ViewScope) -> Option<Loaded<Vec<Product>>> {
        let ticket = scope.begin_load(LoadKind::Products);
        let loaded = ProductRepository::new(self.backend()).list().await;
        if !ticket.is_current() {
            debug!("Discarding stale product load");
            return None;
        }
        self.set_products(loaded.value.clone());
        Some(loaded)
    }

    /// Reload brand settings for a view. Stale results are discarded as in
    /// [`refresh_products`](Self::refresh_products).
    pub async fn refresh_settings(&self, scope: &ViewScope) -> Option<Loaded<BrandSettings>> {
        let ticket = scope.begin_load(LoadKind::Settings);
        let loaded = SettingsRepository::new(self.backend()).get().await;
        if !ticket.is_current() {
            debug!("Discarding stale settings load");
            return None;
        }
        self.set_settings(loaded.value.clone());
        Some(loaded)
    }

    // =========================================================================
    // Services
    // =========================================================================

    /// A quote workflow following this state's session.
    #[must_use]
    pub fn quote_controller(&self) -> QuoteController<B> {
        QuoteController::new(Arc::clone(&self.inner.backend), &self.inner.auth)
    }

    #[must_use]
    pub fn reviews(&self) -> ReviewService<'_, B> {
        ReviewService::new(self.backend())
    }

    /// Quote requests submitted by the signed-in user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Auth` if nobody is signed in.
    /// Returns `AppError::Persistence` if the read fails.
    pub async fn my_quotes(&self) -> Result<Vec<QuoteRequest>, AppError> {
        let user = self.current_user().ok_or(AuthError::NotSignedIn)?;
        Ok(QuoteRepository::new(self.backend())
            .list_for_user(&user.id)
            .await?)
    }
}
