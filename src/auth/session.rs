use chrono::Duration;

use serde::{Deserialize, Serialize};

use uuid::Uuid;

use crate::crypto::{SigningKey, Token, TokenResult};
use crate::domain::Role;
use crate::repo::UserCredentials;

/// Claims carried by an admin session token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminClaims {
    /// Email address of the user
    pub sub: String,
    pub user_id: Uuid,
    pub roles: Vec<Role>,
}

impl AdminClaims {
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }
}

impl From<&UserCredentials> for AdminClaims {
    fn from(user: &UserCredentials) -> Self {
        Self {
            sub: user.email.to_string(),
            user_id: user.id,
            roles: user.roles.clone(),
        }
    }
}

/// Issues and checks signed, expiring session tokens
#[derive(Debug, Clone)]
pub struct SessionTokens {
    key: SigningKey,
    ttl: Duration,
}

impl SessionTokens {
    pub fn new(key: SigningKey, ttl: Duration) -> Self {
        Self { key, ttl }
    }

    pub fn issue(&self, claims: &AdminClaims) -> TokenResult<Token> {
        Token::builder(claims)
            .expires_in(self.ttl)
            .sign(self.key.as_ref())
    }

    pub fn verify(&self, token: &Token) -> TokenResult<AdminClaims> {
        token.verify(self.key.as_ref())
    }
}
