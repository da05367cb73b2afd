//! Admin console.
//!
//! Every action re-checks that the session still belongs to an admin, then
//! validates locally before touching the backend. Write failures are
//! reported and returned; nothing is retried.

use tracing::{info, instrument};

use ddh_masale_core::{BrandSettings, Product, ProductId, QuoteId, QuoteRequest, QuoteStatus, SessionUser};
use ddh_masale_storefront::backend::{AuthBackend, RemoteStore};
use ddh_masale_storefront::error::add_breadcrumb;
use ddh_masale_storefront::repository::{
    Loaded, ProductRepository, QuoteRepository, RepositoryError, SettingsRepository,
};
use ddh_masale_storefront::services::auth::AuthError;
use ddh_masale_storefront::{AppError, AppState, ValidationError};

use crate::forms::ProductForm;

/// Admin view over the shared application state.
pub struct AdminConsole<B> {
    state: AppState<B>,
}

impl<B: RemoteStore + AuthBackend> AdminConsole<B> {
    /// Open the console for the signed-in admin.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Auth` if nobody is signed in.
    /// Returns `AppError::Forbidden` if the user is not an admin.
    pub fn open(state: &AppState<B>) -> Result<Self, AppError> {
        let console = Self {
            state: state.clone(),
        };
        let admin = console.authorize()?;
        info!(user_id = %admin.id, "Admin console opened");
        Ok(console)
    }

    fn authorize(&self) -> Result<SessionUser, AppError> {
        let user = self.state.current_user().ok_or(AuthError::NotSignedIn)?;
        if !user.is_admin() {
            return Err(AppError::Forbidden(format!(
                "{} is not an admin",
                user.email
            )));
        }
        Ok(user)
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Every product, inactive ones included.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` or `AppError::Auth` if the session is no
    /// longer an admin's.
    #[instrument(skip(self))]
    pub async fn inventory(&self) -> Result<Loaded<Vec<Product>>, AppError> {
        self.authorize()?;
        let loaded = ProductRepository::new(self.state.backend()).list().await;
        self.state.set_products(loaded.value.clone());
        Ok(loaded)
    }

    /// Create or update a product from `form`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for an invalid form; nothing is written.
    /// Returns `AppError::Persistence` if the write fails.
    #[instrument(skip(self, form), fields(product_id = ?form.id, new = form.is_new()))]
    pub async fn save_product(&self, form: ProductForm) -> Result<Product, AppError> {
        self.authorize()?;
        let is_new = form.is_new();
        let product = form.into_product()?;

        let repo = ProductRepository::new(self.state.backend());
        let saved = if is_new {
            repo.create(&product).await
        } else {
            repo.update(&product).await
        }
        .map_err(reported)?;

        let mut products = self.state.products();
        match products.iter_mut().find(|p| p.id == saved.id) {
            Some(existing) => *existing = saved.clone(),
            None => products.push(saved.clone()),
        }
        self.state.set_products(products);

        add_breadcrumb("admin", "Saved product", Some(&[("product_id", saved.id.as_str())]));
        Ok(saved)
    }

    /// Flip a product's visibility and persist it immediately.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product does not exist.
    /// Returns `AppError::Persistence` if the write fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn toggle_active(&self, id: &ProductId) -> Result<Product, AppError> {
        self.authorize()?;
        let repo = ProductRepository::new(self.state.backend());
        let current = repo
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

        let updated = repo
            .set_active(id, !current.is_active)
            .await
            .map_err(reported)?;

        let mut products = self.state.products();
        if let Some(existing) = products.iter_mut().find(|p| p.id == updated.id) {
            existing.is_active = updated.is_active;
        }
        self.state.set_products(products);
        Ok(updated)
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Persistence` if the product does not exist or the
    /// write fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: &ProductId) -> Result<(), AppError> {
        self.authorize()?;
        ProductRepository::new(self.state.backend())
            .delete(id)
            .await
            .map_err(reported)?;

        let mut products = self.state.products();
        products.retain(|p| &p.id != id);
        self.state.set_products(products);
        Ok(())
    }

    // =========================================================================
    // Quotes
    // =========================================================================

    /// Quote requests newest first, filtered by customer name or email.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Persistence` if the read fails.
    #[instrument(skip(self))]
    pub async fn quotes(&self, search: &str) -> Result<Vec<QuoteRequest>, AppError> {
        self.authorize()?;
        let quotes = QuoteRepository::new(self.state.backend()).list().await?;
        Ok(quotes
            .into_iter()
            .filter(|q| q.matches_customer(search))
            .collect())
    }

    /// Move a quote to `next`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the quote does not exist.
    /// Returns `AppError::Validation` if the transition is not allowed.
    /// Returns `AppError::Persistence` if the write fails.
    #[instrument(skip(self), fields(quote_id = %id, status = %next))]
    pub async fn transition_quote(
        &self,
        id: &QuoteId,
        next: QuoteStatus,
    ) -> Result<QuoteRequest, AppError> {
        self.authorize()?;
        let repo = QuoteRepository::new(self.state.backend());
        let current = repo
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("quote {id}")))?;

        if !current.status.can_transition_to(next) {
            return Err(ValidationError::InvalidTransition {
                from: current.status,
                to: next,
            }
            .into());
        }

        let updated = repo.update_status(id, next).await.map_err(reported)?;
        add_breadcrumb("admin", "Updated quote status", Some(&[("quote_id", id.as_str())]));
        Ok(updated)
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Editable copy of the current brand settings.
    #[must_use]
    pub fn settings_draft(&self) -> BrandSettings {
        self.state.settings()
    }

    /// Persist `settings`, replacing the stored singleton.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Persistence` if the write fails; the shared settings
    /// are left unchanged.
    #[instrument(skip(self, settings))]
    pub async fn save_settings(&self, settings: &BrandSettings) -> Result<BrandSettings, AppError> {
        self.authorize()?;
        let saved = SettingsRepository::new(self.state.backend())
            .save(settings)
            .await
            .map_err(reported)?;
        self.state.set_settings(saved.clone());
        info!("Brand settings updated");
        Ok(saved)
    }
}

fn reported(err: RepositoryError) -> AppError {
    let err = AppError::from(err);
    err.report();
    err
}
