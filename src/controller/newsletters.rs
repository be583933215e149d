use actix_web::dev::HttpServiceFactory;
use actix_web::{get, post, put, web, HttpResponse};

use serde::Deserialize;

use crate::auth::Administrator;
use crate::error::{RestError, RestResult};
use crate::repo::{NewNewsletter, NewsletterTemplate};
use crate::service::NewsletterService;

use super::ApiResponse;

/// Subject and content of an issue or of the template
#[derive(Debug, Deserialize)]
pub struct NewsletterBody {
    subject: String,
    content: String,
}

impl TryFrom<NewsletterBody> for NewNewsletter {
    type Error = RestError;

    fn try_from(body: NewsletterBody) -> RestResult<Self> {
        if body.subject.trim().is_empty() {
            return Err(RestError::ParseError("Newsletter subject is required".into()));
        }
        if body.content.trim().is_empty() {
            return Err(RestError::ParseError("Newsletter content is required".into()));
        }
        Ok(Self {
            subject: body.subject.trim().to_string(),
            content: body.content,
        })
    }
}

impl TryFrom<NewsletterBody> for NewsletterTemplate {
    type Error = RestError;

    fn try_from(body: NewsletterBody) -> RestResult<Self> {
        let NewNewsletter { subject, content } = body.try_into()?;
        Ok(Self { subject, content })
    }
}

/// Send a newsletter issue to every verified subscriber
#[tracing::instrument(name = "Publish a newsletter", skip(admin, body, service), fields(admin = %admin.as_ref().sub))]
#[post("")]
async fn publish(
    admin: Administrator, // Administrator guard
    body: web::Json<NewsletterBody>,
    service: web::Data<NewsletterService>,
) -> RestResult<HttpResponse> {
    let newsletter: NewNewsletter = body.into_inner().try_into()?;

    let report = service.publish(newsletter).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(
        format!("Newsletter sent to {} subscribers", report.delivered),
        report,
    )))
}

#[tracing::instrument(name = "Get the newsletter template", skip(admin, service), fields(admin = %admin.as_ref().sub))]
#[get("/template")]
async fn get_template(
    admin: Administrator, // Administrator guard
    service: web::Data<NewsletterService>,
) -> RestResult<HttpResponse> {
    let template = service.template().await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok("Newsletter template", template)))
}

#[tracing::instrument(name = "Update the newsletter template", skip(admin, body, service), fields(admin = %admin.as_ref().sub))]
#[put("/template")]
async fn update_template(
    admin: Administrator, // Administrator guard
    body: web::Json<NewsletterBody>,
    service: web::Data<NewsletterService>,
) -> RestResult<HttpResponse> {
    let template: NewsletterTemplate = body.into_inner().try_into()?;

    service.update_template(template).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok("Newsletter template updated", ())))
}

/// Newsletter API endpoints
pub fn scope() -> impl HttpServiceFactory {
    web::scope("/newsletters")
        .service(publish)
        .service(get_template)
        .service(update_template)
}
