use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use uuid::Uuid;

use crate::domain::{EmailAddress, Subscriber, SubscriberState, SubscriberToken};

use super::{
    NewNewsletter, NewUser, Newsletter, NewsletterStore, NewsletterTemplate,
    NewsletterTemplateStore, StoreError, StoreResult, SubscriberStore, UserCredentials, UserStore,
};

/// Process-local store with the same uniqueness rules as the Postgres schema,
/// used by the unit and API tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    subscribers: Vec<Subscriber>,
    users: Vec<UserCredentials>,
    newsletters: Vec<Newsletter>,
    template: Option<NewsletterTemplate>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of every stored subscriber
    pub fn subscribers(&self) -> Vec<Subscriber> {
        self.lock().subscribers.clone()
    }

    /// Snapshot of every stored newsletter
    pub fn newsletters(&self) -> Vec<Newsletter> {
        self.lock().newsletters.clone()
    }
}

impl Inner {
    /// Mirrors the unique indexes on email, verification token and unsubscribe token
    fn collides(&self, candidate: &Subscriber) -> bool {
        let tokens = tokens_of(candidate);
        self.subscribers
            .iter()
            .filter(|existing| existing.id != candidate.id)
            .any(|existing| existing.email == candidate.email || tokens_of(existing) == tokens)
    }
}

fn tokens_of(subscriber: &Subscriber) -> &SubscriberToken {
    match &subscriber.state {
        SubscriberState::Pending(verification) => &verification.token,
        SubscriberState::Verified { unsubscribe_token } => unsubscribe_token,
    }
}

#[async_trait::async_trait]
impl SubscriberStore for InMemoryStore {
    async fn insert(&self, subscriber: &Subscriber) -> StoreResult<()> {
        let mut inner = self.lock();
        if inner.subscribers.iter().any(|s| s.id == subscriber.id) || inner.collides(subscriber) {
            return Err(StoreError::Conflict);
        }
        inner.subscribers.push(subscriber.clone());
        Ok(())
    }

    async fn update_pending(
        &self,
        expected: &SubscriberToken,
        subscriber: &Subscriber,
    ) -> StoreResult<bool> {
        let mut inner = self.lock();
        if inner.collides(subscriber) {
            return Err(StoreError::Conflict);
        }
        let stored = inner.subscribers.iter_mut().find(|s| {
            s.id == subscriber.id && s.verification().map(|v| &v.token) == Some(expected)
        });
        match stored {
            Some(stored) => {
                *stored = subscriber.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Subscriber>> {
        Ok(self
            .lock()
            .subscribers
            .iter()
            .find(|s| s.email.as_ref() == email)
            .cloned())
    }

    async fn find_by_verification_token(&self, token: &str) -> StoreResult<Option<Subscriber>> {
        Ok(self
            .lock()
            .subscribers
            .iter()
            .find(|s| s.verification().map(|v| v.token.as_ref()) == Some(token))
            .cloned())
    }

    async fn find_by_unsubscribe_token(&self, token: &str) -> StoreResult<Option<Subscriber>> {
        Ok(self
            .lock()
            .subscribers
            .iter()
            .find(|s| s.unsubscribe_token().map(AsRef::as_ref) == Some(token))
            .cloned())
    }

    async fn find_all_verified(&self) -> StoreResult<Vec<Subscriber>> {
        Ok(self
            .lock()
            .subscribers
            .iter()
            .filter(|s| s.is_verified())
            .cloned()
            .collect())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let mut inner = self.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|s| s.id != id);
        Ok(inner.subscribers.len() < before)
    }

    async fn delete_expired_unverified(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut inner = self.lock();
        let before = inner.subscribers.len();
        inner
            .subscribers
            .retain(|s| s.verification().map_or(true, |v| v.expires_at >= now));
        Ok((before - inner.subscribers.len()) as u64)
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryStore {
    async fn insert(&self, new_user: &NewUser) -> StoreResult<Uuid> {
        let mut inner = self.lock();
        if inner.users.iter().any(|u| u.email == new_user.email) {
            return Err(StoreError::Conflict);
        }
        let id = Uuid::new_v4();
        inner.users.push(UserCredentials {
            id,
            email: new_user.email.clone(),
            password_hash: new_user.password_hash.clone(),
            roles: new_user.roles.clone(),
        });
        Ok(id)
    }

    async fn fetch_credentials_by_email(
        &self,
        email: &EmailAddress,
    ) -> StoreResult<Option<UserCredentials>> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| &u.email == email)
            .cloned())
    }
}

#[async_trait::async_trait]
impl NewsletterStore for InMemoryStore {
    async fn insert(&self, newsletter: &NewNewsletter) -> StoreResult<Newsletter> {
        let stored = Newsletter {
            id: Uuid::new_v4(),
            subject: newsletter.subject.clone(),
            content: newsletter.content.clone(),
            created_at: Utc::now(),
        };
        self.lock().newsletters.push(stored.clone());
        Ok(stored)
    }
}

#[async_trait::async_trait]
impl NewsletterTemplateStore for InMemoryStore {
    async fn fetch_template(&self) -> StoreResult<Option<NewsletterTemplate>> {
        Ok(self.lock().template.clone())
    }

    async fn save_template(&self, template: &NewsletterTemplate) -> StoreResult<()> {
        self.lock().template = Some(template.clone());
        Ok(())
    }
}
