use std::net::TcpListener;
use std::sync::Arc;

use anyhow::Context;

use sqlx::PgPool;

use tokio_util::sync::CancellationToken;

use ceramic_affair::app::{self, AppState};
use ceramic_affair::auth::{seed_admin, SessionTokens};
use ceramic_affair::client::{EmailClient, RecaptchaClient};
use ceramic_affair::clock::SystemClock;
use ceramic_affair::controller::subscriptions::FrontendRedirect;
use ceramic_affair::crypto::SigningKey;
use ceramic_affair::repo::{PgNewsletterStore, PgSubscriberStore, PgUserStore, UserStore};
use ceramic_affair::service::{NewsletterService, SubscriptionLinks, SubscriptionService};
use ceramic_affair::settings::Settings;
use ceramic_affair::sweeper::SweepTask;
use ceramic_affair::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = telemetry::create_subscriber("info".into(), std::io::stdout);
    telemetry::set_subscriber(subscriber)?;

    let settings = Settings::load().context("Failed to load settings")?;

    let pool = PgPool::connect_with(settings.database.with_db())
        .await
        .context("Failed to connect to the database")?;
    sqlx::migrate!()
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool.clone()));
    seed_admin(
        users.as_ref(),
        &settings.admin.email()?,
        settings.admin.password(),
    )
    .await?;

    let email_client = EmailClient::new(
        settings.email.sender()?,
        settings.email.api_timeout(),
        settings.email.api_base_url()?,
        settings.email.api_auth_token(),
    )?;
    let recaptcha_client = RecaptchaClient::new(
        settings.recaptcha.api_base_url()?,
        settings.recaptcha.secret_key(),
        settings.recaptcha.score_threshold(),
        settings.recaptcha.api_timeout(),
    )?;

    let email_sender = Arc::new(email_client);
    let subscribers = Arc::new(PgSubscriberStore::new(pool.clone()));
    let links = SubscriptionLinks::new(settings.app.base_url()?)?;

    let subscriptions = SubscriptionService::new(
        subscribers.clone(),
        email_sender.clone(),
        Arc::new(recaptcha_client),
        Arc::new(SystemClock),
        settings.subscriptions.token_policy()?,
        links.clone(),
    );
    let newsletter_store = Arc::new(PgNewsletterStore::new(pool));
    let newsletters = NewsletterService::new(
        subscribers,
        newsletter_store.clone(),
        newsletter_store,
        email_sender,
        links,
    );

    let signing_key = SigningKey::new(settings.app.secret_key())?;
    let state = AppState {
        subscriptions: subscriptions.clone(),
        newsletters,
        users,
        sessions: SessionTokens::new(signing_key, settings.admin.token_ttl()?),
        redirect: FrontendRedirect::new(settings.app.frontend_url()?),
    };

    let shutdown = CancellationToken::new();
    let sweeper = SweepTask::new(subscriptions, settings.subscriptions.sweep_interval()?)
        .start(shutdown.clone());

    let listener = TcpListener::bind(settings.app.addr())?;
    tracing::info!(addr = ?listener.local_addr()?, "Listening");

    let result = app::run(listener, state)?
        .await
        .context("Failed to run app");

    shutdown.cancel();
    sweeper.await.context("Sweep task panicked")?;

    result
}
