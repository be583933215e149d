use std::fmt;

use chrono::{DateTime, Duration, Utc};

use uuid::Uuid;

/// Default lifetime of a verification token
pub const DEFAULT_VERIFICATION_TTL_HOURS: i64 = 24;

/// Random, globally unique token handed out to subscribers in links
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriberToken(String);

impl SubscriberToken {
    /// Mint a fresh random token
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl From<String> for SubscriberToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for SubscriberToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriberToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A time-limited token proving control of a subscribed email address
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationToken {
    pub token: SubscriberToken,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl VerificationToken {
    /// A pending verification email is still live, so another one must not be sent
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// The token may still be redeemed; the deadline itself is inclusive
    pub fn accepts_verification_at(&self, now: DateTime<Utc>) -> bool {
        now <= self.expires_at
    }
}

/// Policy for minting verification tokens
#[derive(Debug, Clone, Copy)]
pub struct TokenPolicy {
    ttl: Duration,
}

impl TokenPolicy {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a new verification token starting at `now`
    pub fn mint(&self, now: DateTime<Utc>) -> VerificationToken {
        VerificationToken {
            token: SubscriberToken::generate(),
            created_at: now,
            expires_at: now + self.ttl,
        }
    }
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_VERIFICATION_TTL_HOURS))
    }
}
