use chrono::{DateTime, Utc};

use sqlx::PgPool;

use uuid::Uuid;

use crate::domain::{Subscriber, SubscriberState, SubscriberToken, VerificationToken};

use super::{StoreError, StoreResult};

/// Subscriber persistence, implemented for each backing store.
/// NOTE: Uniqueness of emails and tokens must be enforced by the store itself.
#[async_trait::async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Insert a brand new subscriber, failing with `StoreError::Conflict` on duplicates
    async fn insert(&self, subscriber: &Subscriber) -> StoreResult<()>;

    /// Overwrite a subscriber that is still pending with the `expected` verification token.
    /// Returns `false` if the stored record moved on (or vanished) in the meantime.
    async fn update_pending(
        &self,
        expected: &SubscriberToken,
        subscriber: &Subscriber,
    ) -> StoreResult<bool>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Subscriber>>;

    /// Only pending subscribers carry a verification token
    async fn find_by_verification_token(&self, token: &str) -> StoreResult<Option<Subscriber>>;

    async fn find_by_unsubscribe_token(&self, token: &str) -> StoreResult<Option<Subscriber>>;

    async fn find_all_verified(&self) -> StoreResult<Vec<Subscriber>>;

    /// Returns `false` if there was nothing to delete
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;

    /// Delete every pending subscriber whose token expired before `now`
    async fn delete_expired_unverified(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

/// Postgres subscriber store
#[derive(Debug, Clone)]
pub struct PgSubscriberStore {
    pool: PgPool,
}

impl PgSubscriberStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SUBSCRIBER_COLUMNS: &str = "id, email, verified, verification_token, token_created_at, token_expires_at, unsubscribe_token";

#[derive(Debug, sqlx::FromRow)]
struct SubscriberRow {
    id: Uuid,
    email: String,
    verified: bool,
    verification_token: Option<String>,
    token_created_at: Option<DateTime<Utc>>,
    token_expires_at: Option<DateTime<Utc>>,
    unsubscribe_token: Option<String>,
}

impl TryFrom<SubscriberRow> for Subscriber {
    type Error = StoreError;

    fn try_from(row: SubscriberRow) -> StoreResult<Self> {
        let id = row.id;
        let email = row.email.parse().map_err(StoreError::Corrupt)?;

        let state = match row {
            SubscriberRow {
                verified: true,
                unsubscribe_token: Some(token),
                ..
            } => SubscriberState::Verified {
                unsubscribe_token: token.into(),
            },
            SubscriberRow {
                verified: false,
                verification_token: Some(token),
                token_created_at: Some(created_at),
                token_expires_at: Some(expires_at),
                ..
            } => SubscriberState::Pending(VerificationToken {
                token: token.into(),
                created_at,
                expires_at,
            }),
            _ => {
                return Err(StoreError::Corrupt(format!(
                    "subscriber {} has an incomplete token state",
                    id
                )))
            }
        };

        Ok(Self { id, email, state })
    }
}

/// Column values for a subscriber, flattened for binding
struct SubscriberColumns<'a> {
    verified: bool,
    verification_token: Option<&'a str>,
    token_created_at: Option<DateTime<Utc>>,
    token_expires_at: Option<DateTime<Utc>>,
    unsubscribe_token: Option<&'a str>,
}

impl<'a> From<&'a Subscriber> for SubscriberColumns<'a> {
    fn from(subscriber: &'a Subscriber) -> Self {
        match &subscriber.state {
            SubscriberState::Pending(verification) => Self {
                verified: false,
                verification_token: Some(verification.token.as_ref()),
                token_created_at: Some(verification.created_at),
                token_expires_at: Some(verification.expires_at),
                unsubscribe_token: None,
            },
            SubscriberState::Verified { unsubscribe_token } => Self {
                verified: true,
                verification_token: None,
                token_created_at: None,
                token_expires_at: None,
                unsubscribe_token: Some(unsubscribe_token.as_ref()),
            },
        }
    }
}

impl PgSubscriberStore {
    async fn fetch_one_where(&self, filter: &str, value: &str) -> StoreResult<Option<Subscriber>> {
        let query = format!("select {} from subscribers where {}", SUBSCRIBER_COLUMNS, filter);
        sqlx::query_as::<_, SubscriberRow>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?
            .map(Subscriber::try_from)
            .transpose()
    }
}

#[async_trait::async_trait]
impl SubscriberStore for PgSubscriberStore {
    #[tracing::instrument(name = "Insert subscriber", skip(self, subscriber), fields(subscriber_id = %subscriber.id))]
    async fn insert(&self, subscriber: &Subscriber) -> StoreResult<()> {
        let columns = SubscriberColumns::from(subscriber);
        sqlx::query(
            "insert into subscribers(id, email, verified, verification_token, token_created_at, token_expires_at, unsubscribe_token) \
             values ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(subscriber.id)
        .bind(subscriber.email.as_ref())
        .bind(columns.verified)
        .bind(columns.verification_token)
        .bind(columns.token_created_at)
        .bind(columns.token_expires_at)
        .bind(columns.unsubscribe_token)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(name = "Update pending subscriber", skip(self, expected, subscriber), fields(subscriber_id = %subscriber.id))]
    async fn update_pending(
        &self,
        expected: &SubscriberToken,
        subscriber: &Subscriber,
    ) -> StoreResult<bool> {
        let columns = SubscriberColumns::from(subscriber);
        let result = sqlx::query(
            "update subscribers \
             set verified=$2, verification_token=$3, token_created_at=$4, token_expires_at=$5, unsubscribe_token=$6 \
             where id=$1 and verified=false and verification_token=$7",
        )
        .bind(subscriber.id)
        .bind(columns.verified)
        .bind(columns.verification_token)
        .bind(columns.token_created_at)
        .bind(columns.token_expires_at)
        .bind(columns.unsubscribe_token)
        .bind(expected.as_ref())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(name = "Fetch subscriber by email", skip(self))]
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Subscriber>> {
        self.fetch_one_where("email=$1", email).await
    }

    #[tracing::instrument(name = "Fetch subscriber by verification token", skip(self, token))]
    async fn find_by_verification_token(&self, token: &str) -> StoreResult<Option<Subscriber>> {
        self.fetch_one_where("verified=false and verification_token=$1", token)
            .await
    }

    #[tracing::instrument(name = "Fetch subscriber by unsubscribe token", skip(self, token))]
    async fn find_by_unsubscribe_token(&self, token: &str) -> StoreResult<Option<Subscriber>> {
        self.fetch_one_where("verified=true and unsubscribe_token=$1", token)
            .await
    }

    #[tracing::instrument(name = "Fetch all verified subscribers", skip(self))]
    async fn find_all_verified(&self) -> StoreResult<Vec<Subscriber>> {
        let query = format!(
            "select {} from subscribers where verified=true order by created_at",
            SUBSCRIBER_COLUMNS
        );
        sqlx::query_as::<_, SubscriberRow>(&query)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Subscriber::try_from)
            .collect()
    }

    #[tracing::instrument(name = "Delete subscriber", skip(self))]
    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("delete from subscribers where id=$1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(name = "Delete expired unverified subscribers", skip(self))]
    async fn delete_expired_unverified(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result =
            sqlx::query("delete from subscribers where verified=false and token_expires_at < $1")
                .bind(now)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
