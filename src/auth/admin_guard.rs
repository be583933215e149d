use std::future::{ready, Ready};

use actix_web::{dev, web, FromRequest, HttpRequest};

use crate::error::RestError;

use super::{bearer_token, AdminClaims, SessionTokens};

/// Extractor that only succeeds for requests carrying a valid admin session token
#[derive(Debug)]
pub struct Administrator(AdminClaims);

impl Administrator {
    fn authorize(req: &HttpRequest) -> Result<Self, RestError> {
        // NOTE: Must be registered with the application at startup
        let tokens = req
            .app_data::<web::Data<SessionTokens>>()
            .ok_or_else(|| RestError::InternalError("Session tokens not registered".into()))?;

        let token = bearer_token(req.headers()).map_err(RestError::FailedToAuthenticate)?;
        let claims = tokens
            .verify(&token)
            .map_err(|e| RestError::FailedToAuthenticate(e.into()))?;

        if !claims.is_admin() {
            return Err(RestError::FailedToAuthenticate(anyhow::anyhow!(
                "User {} is not an administrator",
                claims.user_id
            )));
        }
        Ok(Self(claims))
    }
}

impl FromRequest for Administrator {
    type Error = RestError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        ready(Self::authorize(req))
    }
}

impl AsRef<AdminClaims> for Administrator {
    fn as_ref(&self) -> &AdminClaims {
        &self.0
    }
}
