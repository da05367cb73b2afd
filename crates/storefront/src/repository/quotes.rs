//! Quote request repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use ddh_masale_core::{Email, ProductId, QuoteId, QuoteRequest, QuoteStatus, UserId};

use super::{QUOTES_TABLE, RepositoryError, first_row, from_row, to_row};
use crate::backend::{Query, RemoteStore};

/// Row shape of the `quotes` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct QuoteRecord {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub customer_name: String,
    pub email: String,
    pub phone: String,
    pub quantity: i64,
    #[serde(default)]
    pub message: String,
    pub consent: bool,
    pub status: QuoteStatus,
    #[serde(default)]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<QuoteRecord> for QuoteRequest {
    type Error = RepositoryError;

    fn try_from(r: QuoteRecord) -> Result<Self, Self::Error> {
        let email = Email::parse(&r.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in quote {}: {e}", r.id))
        })?;
        let quantity = u32::try_from(r.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "invalid quantity in quote {}: {}",
                r.id, r.quantity
            ))
        })?;

        Ok(Self {
            id: QuoteId::new(r.id),
            product_id: ProductId::new(r.product_id),
            product_name: r.product_name,
            customer_name: r.customer_name,
            email,
            phone: r.phone,
            quantity,
            message: r.message,
            consent: r.consent,
            status: r.status,
            user_id: r.user_id.map(UserId::new),
            created_at: r.created_at,
        })
    }
}

impl From<&QuoteRequest> for QuoteRecord {
    fn from(q: &QuoteRequest) -> Self {
        Self {
            id: q.id.to_string(),
            product_id: q.product_id.to_string(),
            product_name: q.product_name.clone(),
            customer_name: q.customer_name.clone(),
            email: q.email.to_string(),
            phone: q.phone.clone(),
            quantity: i64::from(q.quantity),
            message: q.message.clone(),
            consent: q.consent,
            status: q.status,
            user_id: q.user_id.as_ref().map(ToString::to_string),
            created_at: q.created_at,
        }
    }
}

/// Repository for quote requests.
pub struct QuoteRepository<'a, S> {
    store: &'a S,
}

impl<'a, S: RemoteStore> QuoteRepository<'a, S> {
    /// Create a new quote repository.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// All quote requests, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the read fails.
    /// Returns `RepositoryError::DataCorruption` if a row cannot be decoded.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<QuoteRequest>, RepositoryError> {
        self.fetch(Query::new().order_desc("created_at")).await
    }

    /// Quote requests submitted by one account, newest first.
    ///
    /// The filter runs on the backend.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the read fails.
    /// Returns `RepositoryError::DataCorruption` if a row cannot be decoded.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<QuoteRequest>, RepositoryError> {
        self.fetch(
            Query::new()
                .eq("user_id", user_id)
                .order_desc("created_at"),
        )
        .await
    }

    /// Get a quote request by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the read fails.
    /// Returns `RepositoryError::DataCorruption` if the row cannot be decoded.
    pub async fn get(&self, id: &QuoteId) -> Result<Option<QuoteRequest>, RepositoryError> {
        Ok(self
            .fetch(Query::new().eq("id", id).limit(1))
            .await?
            .into_iter()
            .next())
    }

    async fn fetch(&self, query: Query) -> Result<Vec<QuoteRequest>, RepositoryError> {
        self.store
            .select(QUOTES_TABLE, &query)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// Persist a new quote request.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Constraint` if consent was not given or the
    /// quantity is zero; nothing is written.
    /// Returns `RepositoryError::Conflict` if the ID already exists.
    /// Returns `RepositoryError::Backend` for other backend errors.
    #[instrument(skip(self, quote), fields(quote_id = %quote.id, product_id = %quote.product_id))]
    pub async fn create(&self, quote: &QuoteRequest) -> Result<QuoteRequest, RepositoryError> {
        if !quote.consent {
            return Err(RepositoryError::Constraint(
                "quote requests require contact consent".to_owned(),
            ));
        }
        if quote.quantity == 0 {
            return Err(RepositoryError::Constraint(
                "quote quantity must be positive".to_owned(),
            ));
        }

        let row = to_row(&QuoteRecord::from(quote))?;
        let rows = self
            .store
            .insert(QUOTES_TABLE, vec![row])
            .await
            .map_err(RepositoryError::from_write)?;

        decode(first_row(QUOTES_TABLE, rows)?)
    }

    /// Set a quote request's status. Last write wins.
    ///
    /// Transition rules are enforced by the caller, which knows the current
    /// status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no quote has this ID.
    /// Returns `RepositoryError::Backend` for backend errors.
    #[instrument(skip(self), fields(quote_id = %id, status = %status))]
    pub async fn update_status(
        &self,
        id: &QuoteId,
        status: QuoteStatus,
    ) -> Result<QuoteRequest, RepositoryError> {
        let rows = self
            .store
            .update(
                QUOTES_TABLE,
                &Query::new().eq("id", id),
                json!({ "status": status }),
            )
            .await
            .map_err(RepositoryError::from_write)?;

        if rows.is_empty() {
            return Err(RepositoryError::NotFound(format!("quote {id}")));
        }
        decode(first_row(QUOTES_TABLE, rows)?)
    }
}

fn decode(row: serde_json::Value) -> Result<QuoteRequest, RepositoryError> {
    QuoteRequest::try_from(from_row::<QuoteRecord>(QUOTES_TABLE, row)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use chrono::Duration;

    fn quote(user: Option<&str>, minutes_ago: i64) -> QuoteRequest {
        QuoteRequest {
            id: QuoteId::generate(),
            product_id: ProductId::new("1"),
            product_name: "Turmeric Powder (Haldi)".to_owned(),
            customer_name: "Asha Traders".to_owned(),
            email: Email::parse("asha@traders.in").unwrap(),
            phone: "+91 90000 00000".to_owned(),
            quantity: 50,
            message: String::new(),
            consent: true,
            status: QuoteStatus::Pending,
            user_id: user.map(UserId::new),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let backend = MemoryBackend::new();
        let repo = QuoteRepository::new(&backend);
        let old = repo.create(&quote(None, 30)).await.unwrap();
        let new = repo.create(&quote(None, 1)).await.unwrap();

        let ids: Vec<_> = repo.list().await.unwrap().into_iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![new.id, old.id]);
    }

    #[tokio::test]
    async fn test_list_for_user_filters_on_owner() {
        let backend = MemoryBackend::new();
        let repo = QuoteRepository::new(&backend);
        repo.create(&quote(Some("u1"), 5)).await.unwrap();
        repo.create(&quote(Some("u2"), 4)).await.unwrap();
        repo.create(&quote(None, 3)).await.unwrap();

        let mine = repo.list_for_user(&UserId::new("u1")).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].user_id, Some(UserId::new("u1")));
    }

    #[tokio::test]
    async fn test_create_refuses_without_consent() {
        let backend = MemoryBackend::new();
        let mut q = quote(None, 0);
        q.consent = false;

        let err = QuoteRepository::new(&backend).create(&q).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Constraint(_)));
        assert_eq!(backend.write_count(), 0);
    }

    #[tokio::test]
    async fn test_update_status() {
        let backend = MemoryBackend::new();
        let repo = QuoteRepository::new(&backend);
        let q = repo.create(&quote(None, 0)).await.unwrap();

        let responded = repo.update_status(&q.id, QuoteStatus::Responded).await.unwrap();
        assert_eq!(responded.status, QuoteStatus::Responded);
        assert_eq!(
            repo.get(&q.id).await.unwrap().unwrap().status,
            QuoteStatus::Responded
        );

        assert!(matches!(
            repo.update_status(&QuoteId::new("missing"), QuoteStatus::Closed).await,
            Err(RepositoryError::NotFound(_))
        ));
    }
}
