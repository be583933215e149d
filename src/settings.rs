use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;

use config::{Config, Environment, File};

use secrecy::Secret;

use serde::Deserialize;
use serde_aux::prelude::*;

use sqlx::postgres::{PgConnectOptions, PgSslMode};

use url::Url;

use crate::domain::{EmailAddress, TokenPolicy};

/// Runtime environment, either `Dev` for local development, or `Prod` for release
#[derive(Debug)]
pub enum Runtime {
    Dev,
    Prod,
}

impl Runtime {
    pub fn as_str(&self) -> &str {
        match self {
            Runtime::Dev => "dev",
            Runtime::Prod => "prod",
        }
    }
}

impl TryFrom<String> for Runtime {
    type Error = anyhow::Error;

    fn try_from(s: String) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            other => anyhow::bail!("{} is not a valid runtime environment", other),
        }
    }
}

/// Application settings wrapper
#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: ApplicationSettings,
    pub database: DatabaseSettings,
    pub email: EmailSettings,
    pub recaptcha: RecaptchaSettings,
    pub subscriptions: SubscriptionSettings,
    pub admin: AdminSettings,
}

impl Settings {
    /// Load application settings from the settings directory
    pub fn load() -> anyhow::Result<Self> {
        // Get the path to the settings directory
        let path = env::current_dir()?.join("settings");
        // Get the current environment based on the `APP_ENV` environment variable, default to `Dev`
        let runtime: Runtime = env::var("APP_ENV")
            .unwrap_or_else(|_| "dev".into())
            .try_into()?;

        Self::load_from(runtime, &path)
    }
    /// Load application settings from a specified path and runtime
    pub fn load_from(runtime: Runtime, base_path: &Path) -> anyhow::Result<Self> {
        Config::builder()
            // Include the base settings
            .add_source(File::from(base_path.join("base")).required(true))
            // Include the runtime settings
            .add_source(File::from(base_path.join(runtime.as_str())).required(true))
            // Override/include any settings from environment variables
            // NOTE: Should be used for any prod secrets. Takes the form `APP_<settings category>__<setting name>`.
            .add_source(
                Environment::with_prefix("app")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
            .context("Failed to load/deserialize settings")
    }
}

#[derive(Debug, Deserialize)]
pub struct ApplicationSettings {
    host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    port: u16,
    /// Externally reachable root of this service, used in emailed links
    base_url: String,
    /// When set, verify/unsubscribe redirect to `{frontend_url}/confirmation`
    #[serde(default)]
    frontend_url: Option<String>,
    /// Key for signing admin session tokens
    secret_key: Secret<String>,
}

impl ApplicationSettings {
    /// The application address to bind to
    pub fn addr(&self) -> (&str, u16) {
        (&self.host, self.port)
    }
    /// The application secret key
    pub fn secret_key(&self) -> &Secret<String> {
        &self.secret_key
    }

    pub fn base_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.base_url).context("Failed to parse application base URL")
    }

    pub fn frontend_url(&self) -> anyhow::Result<Option<Url>> {
        self.frontend_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .map(|url| Url::parse(url).context("Failed to parse frontend URL"))
            .transpose()
    }
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    port: u16,
    host: String,
    name: String,
    username: String,
    password: Secret<String>,
    require_ssl: bool,
}

impl DatabaseSettings {
    /// The database connection options, without specifying the database name
    pub fn without_db(&self) -> PgConnectOptions {
        use secrecy::ExposeSecret;

        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };

        PgConnectOptions::new()
            .port(self.port)
            .host(&self.host)
            .ssl_mode(ssl_mode)
            .username(&self.username)
            .password(self.password.expose_secret())
    }
    /// The database connection options, with the database name
    pub fn with_db(&self) -> PgConnectOptions {
        self.without_db().database(&self.name)
    }
}

#[derive(Debug, Deserialize)]
pub struct EmailSettings {
    sender: String,
    api_base_url: String,
    api_auth_token: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    api_timeout_milliseconds: u64,
}

impl EmailSettings {
    /// The email address to send application emails from
    pub fn sender(&self) -> anyhow::Result<EmailAddress> {
        self.sender
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))
            .context("Failed to parse email sender address")
    }
    /// The email REST API timeout duration
    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api_timeout_milliseconds)
    }
    /// The base URL for the email REST service
    pub fn api_base_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.api_base_url).context("Failed to parse email base URL")
    }
    /// The authentication token to include when making email requests
    pub fn api_auth_token(&self) -> Secret<String> {
        self.api_auth_token.clone()
    }
}

#[derive(Debug, Deserialize)]
pub struct RecaptchaSettings {
    /// Must end with `/`, `siteverify` is joined onto it
    api_base_url: String,
    secret_key: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    score_threshold: f32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    api_timeout_milliseconds: u64,
}

impl RecaptchaSettings {
    pub fn api_base_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.api_base_url).context("Failed to parse reCAPTCHA base URL")
    }

    pub fn secret_key(&self) -> Secret<String> {
        self.secret_key.clone()
    }

    pub fn score_threshold(&self) -> f32 {
        self.score_threshold
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api_timeout_milliseconds)
    }
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    token_ttl_hours: i64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    sweep_interval_hours: u64,
}

impl SubscriptionSettings {
    /// Lifetime of the verification tokens sent to new subscribers
    pub fn token_policy(&self) -> anyhow::Result<TokenPolicy> {
        if self.token_ttl_hours <= 0 {
            anyhow::bail!("subscriptions.token_ttl_hours must be positive");
        }
        let ttl = chrono::Duration::try_hours(self.token_ttl_hours)
            .context("subscriptions.token_ttl_hours is out of range")?;
        Ok(TokenPolicy::new(ttl))
    }

    pub fn sweep_interval(&self) -> anyhow::Result<Duration> {
        if self.sweep_interval_hours == 0 {
            anyhow::bail!("subscriptions.sweep_interval_hours must be positive");
        }
        self.sweep_interval_hours
            .checked_mul(60 * 60)
            .map(Duration::from_secs)
            .context("subscriptions.sweep_interval_hours is out of range")
    }
}

#[derive(Debug, Deserialize)]
pub struct AdminSettings {
    email: String,
    password: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    token_ttl_minutes: i64,
}

impl AdminSettings {
    /// Address of the administrator account seeded at startup
    pub fn email(&self) -> anyhow::Result<EmailAddress> {
        self.email
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))
            .context("Failed to parse administrator email address")
    }

    pub fn password(&self) -> &Secret<String> {
        &self.password
    }

    /// Lifetime of the session tokens issued at login
    pub fn token_ttl(&self) -> anyhow::Result<chrono::Duration> {
        if self.token_ttl_minutes <= 0 {
            anyhow::bail!("admin.token_ttl_minutes must be positive");
        }
        chrono::Duration::try_minutes(self.token_ttl_minutes)
            .context("admin.token_ttl_minutes is out of range")
    }
}
