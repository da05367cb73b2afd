//! Quote request workflow.
//!
//! [`QuoteWorkflow`] is the synchronous state machine behind the "Request a
//! quote" button:
//!
//! ```text
//! Idle ─select─▶ AwaitingAuth ─sign-in─▶ FormOpen ─submit─▶ Submitted
//!   └──select (signed in)──────────────────▲   └──cancel──▶ Cancelled
//! ```
//!
//! [`QuoteController`] drives it from session notifications and persists
//! submissions, so a product picked while signed out opens its form as soon
//! as the asynchronous sign-in completes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{info, instrument};

use ddh_masale_core::{Email, Product, QuoteId, QuoteRequest, QuoteStatus, SessionUser};

use crate::backend::{AuthBackend, RemoteStore};
use crate::error::{AppError, ValidationError, add_breadcrumb};
use crate::repository::QuoteRepository;
use crate::services::auth::{AuthSessionManager, Subscription};

// =============================================================================
// State Machine
// =============================================================================

/// Editable contents of the quote form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuoteDraft {
    pub customer_name: String,
    pub email: String,
    pub phone: String,
    pub quantity: u32,
    pub message: String,
    pub consent: bool,
}

impl QuoteDraft {
    /// Fresh draft: quantity at the product's MOQ, email from the session.
    #[must_use]
    pub fn for_product(product: &Product, user: Option<&SessionUser>) -> Self {
        Self {
            quantity: product.moq,
            email: user.map(|u| u.email.to_string()).unwrap_or_default(),
            ..Self::default()
        }
    }
}

/// Where the workflow currently is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum QuoteStage {
    #[default]
    Idle,
    /// Sign-in prompt is showing; the product is kept for resumption.
    AwaitingAuth { product: Product },
    /// `pending` is the id of the last request built from this form.
    FormOpen {
        product: Product,
        draft: QuoteDraft,
        pending: Option<QuoteId>,
    },
    Submitted { quote: QuoteRequest },
    Cancelled,
}

/// The quote workflow state machine. Performs no I/O.
#[derive(Debug, Clone, Default)]
pub struct QuoteWorkflow {
    stage: QuoteStage,
}

impl QuoteWorkflow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn stage(&self) -> &QuoteStage {
        &self.stage
    }

    #[must_use]
    pub const fn is_auth_prompt_open(&self) -> bool {
        matches!(self.stage, QuoteStage::AwaitingAuth { .. })
    }

    #[must_use]
    pub const fn is_form_open(&self) -> bool {
        matches!(self.stage, QuoteStage::FormOpen { .. })
    }

    /// Start a quote for `product`, replacing whatever was in progress.
    pub fn select(&mut self, product: Product, user: Option<&SessionUser>) {
        self.stage = match user {
            Some(user) => QuoteStage::FormOpen {
                draft: QuoteDraft::for_product(&product, Some(user)),
                product,
                pending: None,
            },
            None => QuoteStage::AwaitingAuth { product },
        };
    }

    /// React to a session change.
    ///
    /// A sign-in while the prompt is showing opens the pre-filled form for
    /// the retained product. Every other combination leaves the stage as is.
    pub fn on_session_change(&mut self, user: Option<&SessionUser>) {
        let Some(user) = user else { return };
        if let QuoteStage::AwaitingAuth { product } = &self.stage {
            let product = product.clone();
            self.stage = QuoteStage::FormOpen {
                draft: QuoteDraft::for_product(&product, Some(user)),
                product,
                pending: None,
            };
        }
    }

    /// The open form's draft, for editing.
    pub const fn draft_mut(&mut self) -> Option<&mut QuoteDraft> {
        match &mut self.stage {
            QuoteStage::FormOpen { draft, .. } => Some(draft),
            _ => None,
        }
    }

    /// Validate the open form and build the request to persist.
    ///
    /// The draft is left untouched either way. On success the new request's
    /// id is remembered so only that request can close this form.
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found, checking consent, then the
    /// required contact fields, then the quantity against the MOQ.
    pub fn prepare_submission(
        &mut self,
        user: Option<&SessionUser>,
    ) -> Result<QuoteRequest, ValidationError> {
        let QuoteStage::FormOpen {
            product,
            draft,
            pending,
        } = &mut self.stage
        else {
            return Err(ValidationError::NoQuoteInProgress);
        };

        if !draft.consent {
            return Err(ValidationError::ConsentRequired);
        }
        let customer_name = required(&draft.customer_name, "name")?;
        let email = required(&draft.email, "email")?;
        let phone = required(&draft.phone, "phone number")?;
        let email = Email::parse(email).map_err(|_| ValidationError::InvalidEmail)?;
        if !product.accepts_quantity(draft.quantity) {
            return Err(ValidationError::BelowMinimumOrder {
                moq: product.moq,
                unit: product.unit.clone(),
            });
        }

        let id = QuoteId::generate();
        *pending = Some(id.clone());

        Ok(QuoteRequest {
            id,
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            customer_name: customer_name.to_owned(),
            email,
            phone: phone.to_owned(),
            quantity: draft.quantity,
            message: draft.message.trim().to_owned(),
            consent: true,
            status: QuoteStatus::Pending,
            user_id: user.map(|u| u.id.clone()),
            created_at: Utc::now(),
        })
    }

    /// Close the form after `quote` was stored.
    ///
    /// Ignored unless `quote` is the request last prepared from the form that
    /// is open now. A reselection, even of the same product, opens a new form.
    pub fn complete_submission(&mut self, quote: QuoteRequest) {
        if let QuoteStage::FormOpen {
            pending: Some(pending),
            ..
        } = &self.stage
        {
            if *pending == quote.id {
                self.stage = QuoteStage::Submitted { quote };
            }
        }
    }

    /// Abandon the sign-in prompt or the open form.
    ///
    /// Returns `false` if there was nothing to cancel.
    pub fn cancel(&mut self) -> bool {
        if matches!(
            self.stage,
            QuoteStage::AwaitingAuth { .. } | QuoteStage::FormOpen { .. }
        ) {
            self.stage = QuoteStage::Cancelled;
            true
        } else {
            false
        }
    }
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(value)
    }
}

// =============================================================================
// Controller
// =============================================================================

/// Runs a [`QuoteWorkflow`] against the session and the quotes table.
///
/// Unsubscribes from session changes when dropped.
pub struct QuoteController<S> {
    workflow: Arc<Mutex<QuoteWorkflow>>,
    user: Arc<Mutex<Option<SessionUser>>>,
    store: Arc<S>,
    _subscription: Subscription,
}

impl<S: RemoteStore> QuoteController<S> {
    /// Create a controller following `auth`'s session.
    pub fn new<A: AuthBackend>(store: Arc<S>, auth: &AuthSessionManager<A>) -> Self {
        let workflow = Arc::new(Mutex::new(QuoteWorkflow::new()));
        let user = Arc::new(Mutex::new(auth.current_user()));

        let subscription = {
            let workflow = Arc::clone(&workflow);
            let user = Arc::clone(&user);
            auth.subscribe(move |change| {
                *lock(&user) = change.user.clone();
                lock(&workflow).on_session_change(change.user.as_ref());
            })
        };

        Self {
            workflow,
            user,
            store,
            _subscription: subscription,
        }
    }

    /// Snapshot of the current stage.
    #[must_use]
    pub fn stage(&self) -> QuoteStage {
        lock(&self.workflow).stage().clone()
    }

    /// "Request a quote" on `product`.
    pub fn select(&self, product: Product) {
        add_breadcrumb("quote", "Selected product", Some(&[("product_id", product.id.as_str())]));
        let user = lock(&self.user).clone();
        lock(&self.workflow).select(product, user.as_ref());
    }

    /// Edit the open form. Returns `false` if no form is open.
    pub fn edit(&self, f: impl FnOnce(&mut QuoteDraft)) -> bool {
        lock(&self.workflow).draft_mut().map(f).is_some()
    }

    /// Abandon the current quote.
    pub fn cancel(&self) -> bool {
        lock(&self.workflow).cancel()
    }

    /// Validate and persist the open form.
    ///
    /// On success the form closes. On failure the form stays open with the
    /// draft intact so the user can correct it or retry.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if the form is incomplete; nothing is
    /// written.
    /// Returns `AppError::Persistence` if the write fails.
    #[instrument(skip(self))]
    pub async fn submit(&self) -> Result<QuoteRequest, AppError> {
        let quote = {
            let user = lock(&self.user).clone();
            lock(&self.workflow).prepare_submission(user.as_ref())?
        };

        match QuoteRepository::new(self.store.as_ref()).create(&quote).await {
            Ok(stored) => {
                info!(quote_id = %stored.id, product_id = %stored.product_id, "Quote request submitted");
                add_breadcrumb("quote", "Submitted quote", Some(&[("quote_id", stored.id.as_str())]));
                lock(&self.workflow).complete_submission(stored.clone());
                Ok(stored)
            }
            Err(e) => {
                let err = AppError::from(e);
                err.report();
                Err(err)
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ddh_masale_core::seed::default_catalog;
    use ddh_masale_core::{Role, UserId};

    fn turmeric() -> Product {
        default_catalog().into_iter().next().unwrap()
    }

    fn buyer() -> SessionUser {
        SessionUser {
            id: UserId::new("u1"),
            email: Email::parse("buyer@example.com").unwrap(),
            role: Role::Customer,
        }
    }

    fn open_form() -> QuoteWorkflow {
        let mut workflow = QuoteWorkflow::new();
        workflow.select(turmeric(), Some(&buyer()));
        let draft = workflow.draft_mut().unwrap();
        draft.customer_name = "Asha Traders".to_owned();
        draft.phone = "+91 90000 00000".to_owned();
        draft.consent = true;
        workflow
    }

    #[test]
    fn test_select_signed_out_awaits_auth() {
        let mut workflow = QuoteWorkflow::new();
        workflow.select(turmeric(), None);
        assert!(workflow.is_auth_prompt_open());
        assert!(workflow.draft_mut().is_none());
    }

    #[test]
    fn test_sign_in_resumes_with_prefill() {
        let mut workflow = QuoteWorkflow::new();
        workflow.select(turmeric(), None);
        workflow.on_session_change(Some(&buyer()));

        let QuoteStage::FormOpen { product, draft, .. } = workflow.stage() else {
            panic!("form should be open");
        };
        assert_eq!(product.id, turmeric().id);
        assert_eq!(draft.quantity, turmeric().moq);
        assert_eq!(draft.email, "buyer@example.com");
    }

    #[test]
    fn test_sign_out_event_does_not_resume() {
        let mut workflow = QuoteWorkflow::new();
        workflow.select(turmeric(), None);
        workflow.on_session_change(None);
        assert!(workflow.is_auth_prompt_open());
    }

    #[test]
    fn test_session_change_when_idle_is_noop() {
        let mut workflow = QuoteWorkflow::new();
        workflow.on_session_change(Some(&buyer()));
        assert_eq!(workflow.stage(), &QuoteStage::Idle);
    }

    #[test]
    fn test_consent_checked_first() {
        let mut workflow = open_form();
        let draft = workflow.draft_mut().unwrap();
        draft.consent = false;
        draft.customer_name.clear();

        assert_eq!(
            workflow.prepare_submission(Some(&buyer())),
            Err(ValidationError::ConsentRequired)
        );
        assert!(workflow.is_form_open());
    }

    #[test]
    fn test_missing_and_invalid_fields() {
        let mut workflow = open_form();
        workflow.draft_mut().unwrap().phone = "  ".to_owned();
        assert_eq!(
            workflow.prepare_submission(None),
            Err(ValidationError::MissingField("phone number"))
        );

        let mut workflow = open_form();
        workflow.draft_mut().unwrap().email = "not-an-email".to_owned();
        assert_eq!(
            workflow.prepare_submission(None),
            Err(ValidationError::InvalidEmail)
        );
    }

    #[test]
    fn test_quantity_below_moq() {
        let mut workflow = open_form();
        workflow.draft_mut().unwrap().quantity = turmeric().moq - 1;
        assert_eq!(
            workflow.prepare_submission(None),
            Err(ValidationError::BelowMinimumOrder {
                moq: turmeric().moq,
                unit: turmeric().unit,
            })
        );
    }

    #[test]
    fn test_prepare_builds_pending_request() {
        let mut workflow = open_form();
        let quote = workflow.prepare_submission(Some(&buyer())).unwrap();
        assert_eq!(quote.status, QuoteStatus::Pending);
        assert!(quote.consent);
        assert_eq!(quote.product_name, turmeric().name);
        assert_eq!(quote.user_id, Some(buyer().id));
        assert!(workflow.is_form_open());
    }

    #[test]
    fn test_no_quote_in_progress() {
        assert_eq!(
            QuoteWorkflow::new().prepare_submission(None),
            Err(ValidationError::NoQuoteInProgress)
        );
    }

    #[test]
    fn test_complete_closes_prepared_form() {
        let mut workflow = open_form();
        let quote = workflow.prepare_submission(None).unwrap();
        workflow.complete_submission(quote.clone());
        assert_eq!(workflow.stage(), &QuoteStage::Submitted { quote });
    }

    #[test]
    fn test_complete_ignores_other_product() {
        let mut workflow = open_form();
        let quote = workflow.prepare_submission(None).unwrap();
        workflow.select(default_catalog().remove(6), Some(&buyer()));
        workflow.complete_submission(quote);
        assert!(workflow.is_form_open());
    }

    #[test]
    fn test_complete_ignores_earlier_form_for_same_product() {
        let mut workflow = open_form();
        let stale = workflow.prepare_submission(None).unwrap();

        // Same product picked again before the first write returned.
        workflow.select(turmeric(), Some(&buyer()));
        workflow.complete_submission(stale);
        assert!(workflow.is_form_open());

        // A retry from the old form supersedes the earlier request too.
        let mut workflow = open_form();
        let first = workflow.prepare_submission(None).unwrap();
        let second = workflow.prepare_submission(None).unwrap();
        workflow.complete_submission(first);
        assert!(workflow.is_form_open());
        workflow.complete_submission(second);
        assert!(matches!(workflow.stage(), QuoteStage::Submitted { .. }));
    }

    #[test]
    fn test_cancel() {
        let mut workflow = open_form();
        assert!(workflow.cancel());
        assert_eq!(workflow.stage(), &QuoteStage::Cancelled);
        assert!(!workflow.cancel());
    }
}
