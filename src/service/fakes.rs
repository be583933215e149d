use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use uuid::Uuid;

use crate::client::{Email, EmailSender, HumanVerifier};
use crate::domain::{EmailAddress, Subscriber, SubscriberToken, TokenPolicy};
use crate::repo::{InMemoryStore, StoreResult, SubscriberStore};

/// Human-verification gate with a canned answer
pub enum FixedVerifier {
    Pass,
    Fail,
    Unavailable,
}

#[async_trait::async_trait]
impl HumanVerifier for FixedVerifier {
    async fn verify(&self, _credential: &str) -> anyhow::Result<bool> {
        match self {
            Self::Pass => Ok(true),
            Self::Fail => Ok(false),
            Self::Unavailable => anyhow::bail!("Gate unreachable"),
        }
    }
}

/// Email sender that keeps every message instead of delivering it
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(EmailAddress, Email)>>,
    fail_for: Option<String>,
    fail_all: bool,
}

impl RecordingSender {
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Default::default()
        }
    }

    pub fn failing_for(recipient: &str) -> Self {
        Self {
            fail_for: Some(recipient.to_string()),
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<(EmailAddress, Email)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl EmailSender for RecordingSender {
    async fn send(&self, recipient: &EmailAddress, email: &Email) -> anyhow::Result<()> {
        if self.fail_all || self.fail_for.as_deref() == Some(recipient.as_ref()) {
            anyhow::bail!("Mail server unavailable");
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.clone(), email.clone()));
        Ok(())
    }
}

/// A write another request slips in between a read and `update_pending`
#[derive(Debug, Clone, Copy)]
pub enum Interleaving {
    /// Another subscribe regenerated the token at the given instant
    Regenerate(DateTime<Utc>),
    /// The sweep or an unsubscribe removed the row
    Delete,
}

/// Wraps an `InMemoryStore` to replay lost races deterministically
pub struct RacingStore {
    inner: Arc<InMemoryStore>,
    hide_next_email_lookup: AtomicBool,
    interleaving: Mutex<Option<Interleaving>>,
}

impl RacingStore {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            hide_next_email_lookup: AtomicBool::new(false),
            interleaving: Mutex::new(None),
        }
    }

    /// The next `find_by_email` misses, as if a concurrent insert had not landed yet
    pub fn hide_next_email_lookup(&self) {
        self.hide_next_email_lookup.store(true, Ordering::SeqCst);
    }

    /// Apply `interleaving` right before the next `update_pending`
    pub fn interleave_next_update(&self, interleaving: Interleaving) {
        *self.interleaving.lock().unwrap() = Some(interleaving);
    }

    async fn apply(&self, interleaving: Interleaving, id: Uuid) -> StoreResult<()> {
        let current = self.inner.subscribers().into_iter().find(|s| s.id == id);
        let current = match current {
            Some(current) => current,
            None => return Ok(()),
        };

        match interleaving {
            Interleaving::Regenerate(now) => {
                if let (Some(verification), Some(regenerated)) = (
                    current.verification(),
                    current.with_regenerated_token(&TokenPolicy::default(), now),
                ) {
                    self.inner
                        .update_pending(&verification.token, &regenerated)
                        .await?;
                }
            }
            Interleaving::Delete => {
                self.inner.delete(id).await?;
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl SubscriberStore for RacingStore {
    async fn insert(&self, subscriber: &Subscriber) -> StoreResult<()> {
        SubscriberStore::insert(&*self.inner, subscriber).await
    }

    async fn update_pending(
        &self,
        expected: &SubscriberToken,
        subscriber: &Subscriber,
    ) -> StoreResult<bool> {
        let interleaving = self.interleaving.lock().unwrap().take();
        if let Some(interleaving) = interleaving {
            self.apply(interleaving, subscriber.id).await?;
        }
        self.inner.update_pending(expected, subscriber).await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Subscriber>> {
        if self.hide_next_email_lookup.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.find_by_email(email).await
    }

    async fn find_by_verification_token(&self, token: &str) -> StoreResult<Option<Subscriber>> {
        self.inner.find_by_verification_token(token).await
    }

    async fn find_by_unsubscribe_token(&self, token: &str) -> StoreResult<Option<Subscriber>> {
        self.inner.find_by_unsubscribe_token(token).await
    }

    async fn find_all_verified(&self) -> StoreResult<Vec<Subscriber>> {
        self.inner.find_all_verified().await
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        self.inner.delete(id).await
    }

    async fn delete_expired_unverified(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        self.inner.delete_expired_unverified(now).await
    }
}
