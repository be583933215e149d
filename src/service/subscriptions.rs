use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::client::{Email, EmailSender, HumanVerifier};
use crate::clock::Clock;
use crate::domain::{EmailAddress, Subscriber, TokenPolicy, VerificationToken};
use crate::repo::{StoreError, SubscriberStore};

use super::SubscriptionLinks;

/// Ways a subscription lifecycle operation can fail
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("Human verification failed")]
    InvalidVerification,
    #[error("{0} is already subscribed")]
    AlreadyVerified(EmailAddress),
    #[error("A verification email was already sent to {0}")]
    VerificationPending(EmailAddress),
    #[error("Subscription not found")]
    NotFound,
    #[error("Verification link has expired")]
    TokenExpired,
    /// The subscriber was persisted but the email never left
    #[error("Failed to send email")]
    EmailDeliveryFailed(#[source] anyhow::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Human verification could not be performed")]
    Gate(#[source] anyhow::Error),
}

pub type SubscriptionResult<T> = Result<T, SubscriptionError>;

/// What a successful subscription request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// A new pending subscriber was stored and sent a verification email
    Created,
    /// An expired pending subscriber got a new token and a new email
    Resent,
}

/// Owns every transition of the subscriber lifecycle
#[derive(Clone)]
pub struct SubscriptionService {
    subscribers: Arc<dyn SubscriberStore>,
    email_sender: Arc<dyn EmailSender>,
    verifier: Arc<dyn HumanVerifier>,
    clock: Arc<dyn Clock>,
    policy: TokenPolicy,
    links: SubscriptionLinks,
}

impl SubscriptionService {
    pub fn new(
        subscribers: Arc<dyn SubscriberStore>,
        email_sender: Arc<dyn EmailSender>,
        verifier: Arc<dyn HumanVerifier>,
        clock: Arc<dyn Clock>,
        policy: TokenPolicy,
        links: SubscriptionLinks,
    ) -> Self {
        Self {
            subscribers,
            email_sender,
            verifier,
            clock,
            policy,
            links,
        }
    }

    /// Register `email`, or re-send the verification email if its previous token lapsed
    #[tracing::instrument(name = "Subscribe", skip(self, credential))]
    pub async fn subscribe(
        &self,
        email: EmailAddress,
        credential: &str,
    ) -> SubscriptionResult<SubscribeOutcome> {
        let is_human = self
            .verifier
            .verify(credential)
            .await
            .map_err(SubscriptionError::Gate)?;
        if !is_human {
            return Err(SubscriptionError::InvalidVerification);
        }

        let now = self.clock.now();
        match self.subscribers.find_by_email(email.as_ref()).await? {
            None => self.create(email, now).await,
            Some(existing) => self.regenerate(existing, now).await,
        }
    }

    async fn create(
        &self,
        email: EmailAddress,
        now: DateTime<Utc>,
    ) -> SubscriptionResult<SubscribeOutcome> {
        let verification = self.policy.mint(now);
        let subscriber = Subscriber::pending(email, verification.clone());

        match self.subscribers.insert(&subscriber).await {
            Ok(()) => {}
            Err(StoreError::Conflict) => {
                // Another request stored this email first
                let winner = self
                    .subscribers
                    .find_by_email(subscriber.email.as_ref())
                    .await?;
                return Err(match winner {
                    Some(winner) if winner.is_verified() => {
                        SubscriptionError::AlreadyVerified(winner.email)
                    }
                    _ => SubscriptionError::VerificationPending(subscriber.email),
                });
            }
            Err(e) => return Err(e.into()),
        }
        tracing::info!(subscriber_id = %subscriber.id, "Stored new pending subscriber");

        self.send_verification(&subscriber.email, &verification).await?;
        Ok(SubscribeOutcome::Created)
    }

    async fn regenerate(
        &self,
        existing: Subscriber,
        now: DateTime<Utc>,
    ) -> SubscriptionResult<SubscribeOutcome> {
        let expected = match existing.verification() {
            None => return Err(SubscriptionError::AlreadyVerified(existing.email.clone())),
            Some(verification) if verification.is_live_at(now) => {
                return Err(SubscriptionError::VerificationPending(existing.email.clone()))
            }
            Some(verification) => verification.token.clone(),
        };

        let verification = self.policy.mint(now);
        let regenerated = existing
            .with_verification(verification.clone())
            .ok_or_else(|| SubscriptionError::AlreadyVerified(existing.email.clone()))?;

        if !self.subscribers.update_pending(&expected, &regenerated).await? {
            // The row changed or vanished since it was read; decide from what is stored now
            return match self.subscribers.find_by_email(existing.email.as_ref()).await? {
                None => self.create(existing.email, now).await,
                Some(current) if current.is_verified() => {
                    Err(SubscriptionError::AlreadyVerified(current.email))
                }
                Some(current) => Err(SubscriptionError::VerificationPending(current.email)),
            };
        }
        tracing::info!(subscriber_id = %regenerated.id, "Regenerated verification token");

        self.send_verification(&regenerated.email, &verification).await?;
        Ok(SubscribeOutcome::Resent)
    }

    /// Confirm the email address owning `token`
    #[tracing::instrument(name = "Verify subscriber", skip(self, token))]
    pub async fn verify(&self, token: &str) -> SubscriptionResult<Subscriber> {
        let now = self.clock.now();

        let subscriber = self
            .subscribers
            .find_by_verification_token(token)
            .await?
            .ok_or(SubscriptionError::NotFound)?;

        let expected = match subscriber.verification() {
            Some(verification) if !verification.accepts_verification_at(now) => {
                return Err(SubscriptionError::TokenExpired)
            }
            Some(verification) => verification.token.clone(),
            None => return Err(SubscriptionError::NotFound),
        };

        let verified = subscriber
            .into_verified()
            .ok_or(SubscriptionError::NotFound)?;

        if !self.subscribers.update_pending(&expected, &verified).await? {
            return Err(SubscriptionError::NotFound);
        }
        tracing::info!(subscriber_id = %verified.id, "Subscriber verified");

        Ok(verified)
    }

    /// Remove the verified subscriber owning `token`
    #[tracing::instrument(name = "Unsubscribe", skip(self, token))]
    pub async fn unsubscribe(&self, token: &str) -> SubscriptionResult<()> {
        let subscriber = self
            .subscribers
            .find_by_unsubscribe_token(token)
            .await?
            .ok_or(SubscriptionError::NotFound)?;

        if !self.subscribers.delete(subscriber.id).await? {
            return Err(SubscriptionError::NotFound);
        }
        tracing::info!(subscriber_id = %subscriber.id, "Subscriber removed");

        Ok(())
    }

    /// Delete unverified subscribers whose token has expired
    #[tracing::instrument(name = "Sweep expired subscribers", skip(self))]
    pub async fn sweep(&self) -> SubscriptionResult<u64> {
        let deleted = self
            .subscribers
            .delete_expired_unverified(self.clock.now())
            .await?;
        tracing::info!(deleted, "Swept expired unverified subscribers");

        Ok(deleted)
    }

    async fn send_verification(
        &self,
        recipient: &EmailAddress,
        verification: &VerificationToken,
    ) -> SubscriptionResult<()> {
        let link = self.links.verify(verification.token.as_ref());

        self.email_sender
            .send(recipient, &verification_email(link.as_str()))
            .await
            .map_err(SubscriptionError::EmailDeliveryFailed)
    }
}

fn verification_email(link: &str) -> Email {
    Email {
        subject: "Subscription Verification".into(),
        html_body: format!(
            "<p>Hello,</p>\
             <p>Thank you for subscribing to our newsletter. To complete your subscription, \
             please verify your email address by clicking the link below:</p>\
             <p><a href=\"{link}\">Verify my email address</a></p>\
             <p>If you did not subscribe, you can ignore this email.</p>\
             <p>Best regards,</p>\
             <p>The Ceramic Affair Team</p>"
        ),
        text_body: format!(
            "Hello,\n\n\
             Thank you for subscribing to our newsletter. To complete your subscription, \
             please verify your email address by visiting:\n{link}\n\n\
             If you did not subscribe, you can ignore this email.\n\n\
             The Ceramic Affair Team"
        ),
    }
}
