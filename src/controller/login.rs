use actix_web::dev::HttpServiceFactory;
use actix_web::{post, web, HttpResponse};

use anyhow::Context;

use secrecy::Secret;

use serde::{Deserialize, Serialize};

use crate::auth::{validate_credentials, AdminClaims, Credentials, SessionTokens};
use crate::error::{RestError, RestResult};
use crate::repo::UserStore;

use super::ApiResponse;

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    email: String,
    password: Secret<String>,
}

impl TryFrom<LoginBody> for Credentials {
    type Error = RestError;

    fn try_from(body: LoginBody) -> RestResult<Self> {
        Ok(Self {
            email: body.email.parse().map_err(RestError::ParseError)?,
            password: body.password,
        })
    }
}

#[derive(Debug, Serialize)]
struct LoginData {
    token: String,
}

/// Exchange administrator credentials for a session token
#[tracing::instrument(name = "Log in", skip(body, users, sessions), fields(user_id = tracing::field::Empty))]
#[post("")]
async fn login(
    body: web::Json<LoginBody>,
    users: web::Data<dyn UserStore>,
    sessions: web::Data<SessionTokens>,
) -> RestResult<HttpResponse> {
    let credentials: Credentials = body.into_inner().try_into()?;

    let user = validate_credentials(users.get_ref(), credentials).await?;
    tracing::Span::current().record("user_id", tracing::field::display(&user.id));

    let token = sessions
        .issue(&AdminClaims::from(&user))
        .context("Failed to sign session token")?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(
        "Login successful",
        LoginData {
            token: token.as_ref().to_string(),
        },
    )))
}

/// Login API endpoints
pub fn scope() -> impl HttpServiceFactory {
    web::scope("/login").service(login)
}
