use actix_web::http::header::{self, HeaderMap};

use anyhow::Context;

use secrecy::Secret;

use crate::crypto::Token;
use crate::domain::EmailAddress;

const BEARER_AUTH_PREFIX: &str = "Bearer ";

/// Email and password presented at login
#[derive(Debug)]
pub struct Credentials {
    pub email: EmailAddress,
    pub password: Secret<String>,
}

/// Extract the session token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> anyhow::Result<Token> {
    // Get the authorization header value from the map
    let header_value = headers
        .get(header::AUTHORIZATION)
        .context("Missing authorization in header")?
        .to_str()
        .context("Authorization header is not valid UTF-8")?;
    // Only bearer tokens are accepted
    let token = header_value
        .strip_prefix(BEARER_AUTH_PREFIX)
        .context("Authorization scheme not bearer")?;

    token.parse().context("Malformed bearer token")
}
