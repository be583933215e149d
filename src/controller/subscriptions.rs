use actix_web::dev::HttpServiceFactory;
use actix_web::http::header;
use actix_web::{get, post, web, HttpResponse};

use serde::Deserialize;

use url::Url;

use crate::domain::EmailAddress;
use crate::error::{RestError, RestResult};
use crate::service::{SubscribeOutcome, SubscriptionError, SubscriptionService};

use super::ApiResponse;

/// JSON body of a subscription request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeBody {
    email: String,
    #[serde(alias = "verificationCredential")]
    recaptcha_token: String,
}

impl SubscribeBody {
    fn parse(self) -> RestResult<(EmailAddress, String)> {
        let email = self.email.parse().map_err(RestError::ParseError)?;

        let credential = self.recaptcha_token.trim();
        if credential.is_empty() {
            return Err(RestError::ParseError("reCAPTCHA token is required".into()));
        }
        Ok((email, credential.to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    token: String,
}

/// Where browsers following emailed links are sent, if anywhere
#[derive(Debug, Clone, Default)]
pub struct FrontendRedirect {
    frontend_url: Option<Url>,
}

impl FrontendRedirect {
    pub fn new(frontend_url: Option<Url>) -> Self {
        Self { frontend_url }
    }

    /// `{frontend_url}/confirmation?status={status}`
    fn location(&self, status: &str) -> Option<Url> {
        let mut url = self.frontend_url.clone()?;
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("confirmation");
        }
        url.query_pairs_mut().clear().append_pair("status", status);
        Some(url)
    }

    /// Turn the outcome of a link-following request into a response
    fn respond(&self, result: Result<&str, SubscriptionError>, message: &str) -> RestResult<HttpResponse> {
        let status = match &result {
            Ok(status) => *status,
            Err(SubscriptionError::NotFound) => "not_found",
            Err(SubscriptionError::TokenExpired) => "expired",
            Err(_) => "error",
        };

        match (self.location(status), result) {
            (Some(location), Ok(_))
            | (
                Some(location),
                Err(SubscriptionError::NotFound | SubscriptionError::TokenExpired),
            ) => Ok(HttpResponse::Found()
                .insert_header((header::LOCATION, location.as_str()))
                .finish()),
            (_, Ok(_)) => Ok(HttpResponse::Ok().json(ApiResponse::ok(message, ()))),
            (_, Err(e)) => Err(e.into()),
        }
    }
}

/// Request a subscription for an email address
#[tracing::instrument(name = "Create a new subscriber", skip(body, service))]
#[post("")]
async fn subscribe(
    body: web::Json<SubscribeBody>,
    service: web::Data<SubscriptionService>,
) -> RestResult<HttpResponse> {
    let (email, credential) = body.into_inner().parse()?;

    let message = match service.subscribe(email.clone(), &credential).await? {
        SubscribeOutcome::Created => "Verification email has been sent",
        SubscribeOutcome::Resent => "Verification email has been resent",
    };

    Ok(HttpResponse::Ok().json(ApiResponse::ok(message, email)))
}

/// Follow the link from a verification email
#[tracing::instrument(name = "Verify a subscriber by token", skip(query, service, redirect))]
#[get("/verify")]
async fn verify(
    query: web::Query<TokenQuery>,
    service: web::Data<SubscriptionService>,
    redirect: web::Data<FrontendRedirect>,
) -> RestResult<HttpResponse> {
    let result = service.verify(&query.token).await.map(|_| "subscribed");

    redirect.respond(result, "Subscription verified")
}

/// Follow the unsubscribe link from a newsletter
#[tracing::instrument(name = "Unsubscribe a subscriber by token", skip(query, service, redirect))]
#[get("/unsubscribe")]
async fn unsubscribe(
    query: web::Query<TokenQuery>,
    service: web::Data<SubscriptionService>,
    redirect: web::Data<FrontendRedirect>,
) -> RestResult<HttpResponse> {
    let result = service.unsubscribe(&query.token).await.map(|_| "unsubscribed");

    redirect.respond(result, "Subscription cancelled")
}

/// Subscriptions API endpoints
pub fn scope() -> impl HttpServiceFactory {
    web::scope("/subscriptions")
        .service(subscribe)
        .service(verify)
        .service(unsubscribe)
}
