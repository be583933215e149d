use std::str::FromStr;

use hmac::Mac;

use serde::{Deserialize, Serialize};

use chrono::{DateTime, Duration, TimeZone, Utc};

use base64::{
    alphabet,
    engine::{self, general_purpose},
    Engine as _,
};

lazy_static::lazy_static! {
    // URL-safe, unpadded, so tokens fit in headers and query strings untouched
    static ref BASE64_ENGINE: engine::GeneralPurpose =
        engine::GeneralPurpose::new(&alphabet::URL_SAFE, general_purpose::NO_PAD);
}

/// Errors that can occur when signing or verifying tokens
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token signature does not match")]
    SignatureMismatch,
    #[error("Token is expired")]
    Expired,
    #[error("Token is malformed")]
    Malformed,
}

impl From<std::str::Utf8Error> for TokenError {
    fn from(_e: std::str::Utf8Error) -> Self {
        Self::Malformed
    }
}

impl From<serde_json::Error> for TokenError {
    fn from(_e: serde_json::Error) -> Self {
        Self::Malformed
    }
}

impl From<base64::DecodeError> for TokenError {
    fn from(_e: base64::DecodeError) -> Self {
        Self::Malformed
    }
}

pub type TokenResult<T> = Result<T, TokenError>;

/// A serialized, HMAC-signed token of the form `<payload>.<signature>`
#[derive(Debug, Clone, PartialEq)]
pub struct Token(String);

impl Token {
    pub fn builder<T: Serialize>(payload: T) -> TokenBuilder<T> {
        TokenBuilder::new(payload)
    }

    /// Check the signature and expiry as of `now`, then decode the payload
    pub fn verify_at<T, K>(&self, key: &K, now: DateTime<Utc>) -> TokenResult<T>
    where
        T: for<'de> Deserialize<'de>,
        K: Mac + Clone,
    {
        let (msg, sig) = self.split().ok_or(TokenError::Malformed)?;
        let msg = BASE64_ENGINE.decode(msg)?;
        let sig = BASE64_ENGINE.decode(sig)?;

        verify_message(key, &msg, &sig)?;

        let msg: TokenMessage<T> = serde_json::from_str(std::str::from_utf8(&msg)?)?;
        if msg.is_expired_at(now) {
            Err(TokenError::Expired)
        } else {
            Ok(msg.data)
        }
    }

    pub fn verify<T, K>(&self, key: &K) -> TokenResult<T>
    where
        T: for<'de> Deserialize<'de>,
        K: Mac + Clone,
    {
        self.verify_at(key, Utc::now())
    }

    fn split(&self) -> Option<(&str, &str)> {
        self.0.split_once('.')
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Token {
    type Err = TokenError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let token = token.trim();
        if token.is_empty() || !token.contains('.') {
            return Err(TokenError::Malformed);
        }
        Ok(Self(token.to_string()))
    }
}

/// Builder for creating and signing tokens
#[derive(Debug)]
pub struct TokenBuilder<T> {
    issued_at: DateTime<Utc>,
    expiration: Option<DateTime<Utc>>,
    payload: T,
}

impl<T: Serialize> TokenBuilder<T> {
    pub fn new(payload: T) -> Self {
        Self {
            issued_at: Utc::now(),
            expiration: None,
            payload,
        }
    }

    pub fn issued_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.issued_at = timestamp;
        self
    }

    /// Expire `duration` after the issue time
    pub fn expires_in(mut self, duration: Duration) -> Self {
        self.expiration = Some(self.issued_at + duration);
        self
    }

    pub fn expires_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.expiration = Some(timestamp);
        self
    }

    pub fn sign<K>(self, key: &K) -> TokenResult<Token>
    where
        K: Mac + Clone,
    {
        let msg = serde_json::to_string(&TokenMessage::from(self))?;
        let sig = sign_message(key, msg.as_bytes());

        Ok(Token(format!(
            "{}.{}",
            BASE64_ENGINE.encode(msg),
            BASE64_ENGINE.encode(sig)
        )))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenMessage<T> {
    iat: i64,
    exp: Option<i64>,
    data: T,
}

impl<T> TokenMessage<T> {
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp
            // NOTE: Ambiguous timestamps resolve to the earliest instant
            .and_then(|exp| Utc.timestamp_opt(exp, 0u32).earliest())
            .map(|exp| now >= exp)
            // Tokens without an expiry never expire
            .unwrap_or(false)
    }
}

impl<T> From<TokenBuilder<T>> for TokenMessage<T> {
    fn from(value: TokenBuilder<T>) -> Self {
        Self {
            iat: value.issued_at.timestamp(),
            exp: value.expiration.map(|date| date.timestamp()),
            data: value.payload,
        }
    }
}

fn sign_message<K>(key: &K, msg: &[u8]) -> Vec<u8>
where
    K: Mac + Clone,
{
    key.clone().chain_update(msg).finalize().into_bytes().to_vec()
}

fn verify_message<K>(key: &K, msg: &[u8], signature: &[u8]) -> TokenResult<()>
where
    K: Mac + Clone,
{
    key.clone()
        .chain_update(msg)
        .verify_slice(signature)
        .map_err(|_| TokenError::SignatureMismatch)
}
