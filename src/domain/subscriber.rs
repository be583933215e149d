use chrono::{DateTime, Utc};

use uuid::Uuid;

use super::{EmailAddress, SubscriberToken, TokenPolicy, VerificationToken};

/// Where a subscriber is in the subscription lifecycle
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriberState {
    /// Waiting for the subscriber to follow the verification link
    Pending(VerificationToken),
    /// Receives newsletters until unsubscribed
    Verified { unsubscribe_token: SubscriberToken },
}

/// A newsletter subscriber
#[derive(Debug, Clone, PartialEq)]
pub struct Subscriber {
    pub id: Uuid,
    pub email: EmailAddress,
    pub state: SubscriberState,
}

impl Subscriber {
    /// A new unverified subscriber with a freshly minted verification token
    pub fn new(email: EmailAddress, policy: &TokenPolicy, now: DateTime<Utc>) -> Self {
        Self::pending(email, policy.mint(now))
    }

    /// A new unverified subscriber holding `verification`
    pub fn pending(email: EmailAddress, verification: VerificationToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            state: SubscriberState::Pending(verification),
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self.state, SubscriberState::Verified { .. })
    }

    /// The pending verification token, if the subscriber is not verified yet
    pub fn verification(&self) -> Option<&VerificationToken> {
        match &self.state {
            SubscriberState::Pending(verification) => Some(verification),
            SubscriberState::Verified { .. } => None,
        }
    }

    pub fn unsubscribe_token(&self) -> Option<&SubscriberToken> {
        match &self.state {
            SubscriberState::Verified { unsubscribe_token } => Some(unsubscribe_token),
            SubscriberState::Pending(_) => None,
        }
    }

    /// Replace the verification token of a pending subscriber.
    /// Returns `None` for verified subscribers.
    pub fn with_regenerated_token(&self, policy: &TokenPolicy, now: DateTime<Utc>) -> Option<Self> {
        self.with_verification(policy.mint(now))
    }

    /// Swap in `verification` for the token of a pending subscriber.
    /// Returns `None` for verified subscribers.
    pub fn with_verification(&self, verification: VerificationToken) -> Option<Self> {
        self.verification()?;

        Some(Self {
            state: SubscriberState::Pending(verification),
            ..self.clone()
        })
    }

    /// Promote a pending subscriber to verified, minting its unsubscribe token.
    /// Returns `None` for subscribers that are already verified.
    pub fn into_verified(self) -> Option<Self> {
        self.verification()?;

        Some(Self {
            state: SubscriberState::Verified {
                unsubscribe_token: SubscriberToken::generate(),
            },
            ..self
        })
    }
}
