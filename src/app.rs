use std::net::TcpListener;
use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::{get, HttpResponse, Responder};
use actix_web::{web, App, HttpServer};

use tracing_actix_web::TracingLogger;

use crate::auth::SessionTokens;
use crate::controller::subscriptions::FrontendRedirect;
use crate::controller::{login, newsletters, subscriptions};
use crate::error::RestError;
use crate::repo::UserStore;
use crate::service::{NewsletterService, SubscriptionService};

/// Everything the request handlers share
#[derive(Clone)]
pub struct AppState {
    pub subscriptions: SubscriptionService,
    pub newsletters: NewsletterService,
    pub users: Arc<dyn UserStore>,
    pub sessions: SessionTokens,
    pub redirect: FrontendRedirect,
}

/// Simple health-check endpoint
#[tracing::instrument(name = "Health check")]
#[get("/health_check")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("I am alive")
}

/// Run the application on a specified TCP listener
pub fn run(listener: TcpListener, state: AppState) -> anyhow::Result<Server> {
    // Wrap application data
    let subscription_service = web::Data::new(state.subscriptions);
    let newsletter_service = web::Data::new(state.newsletters);
    let users: web::Data<dyn UserStore> = web::Data::from(state.users);
    let sessions = web::Data::new(state.sessions);
    let redirect = web::Data::new(state.redirect);

    // Malformed bodies and queries get the same JSON error shape as everything else
    let json_config = web::JsonConfig::default()
        .error_handler(|err, _req| RestError::ParseError(err.to_string()).into());
    let query_config = web::QueryConfig::default()
        .error_handler(|err, _req| RestError::ParseError(err.to_string()).into());

    // Start the server
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(json_config.clone())
            .app_data(query_config.clone())
            .app_data(subscription_service.clone())
            .app_data(newsletter_service.clone())
            .app_data(users.clone())
            .app_data(sessions.clone())
            .app_data(redirect.clone())
            .service(health_check)
            .service(subscriptions::scope())
            .service(newsletters::scope())
            .service(login::scope())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
