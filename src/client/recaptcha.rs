use std::time::Duration;

use anyhow::Context;

use reqwest::Client;

use secrecy::Secret;

use serde::{Deserialize, Serialize};

use url::Url;

/// Default minimum reCAPTCHA v3 score for a request to count as human
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.5;

/// Gate that tells humans from bots before a subscription is accepted
#[async_trait::async_trait]
pub trait HumanVerifier: Send + Sync {
    /// `Ok(false)` means the credential was checked and rejected;
    /// `Err` means the check itself could not be performed.
    async fn verify(&self, credential: &str) -> anyhow::Result<bool>;
}

/// Client for the reCAPTCHA `siteverify` endpoint
#[derive(Debug)]
pub struct RecaptchaClient {
    client: Client,
    verify_url: Url,
    secret_key: Secret<String>,
    score_threshold: f32,
}

impl RecaptchaClient {
    pub fn new(
        api_base_url: Url,
        secret_key: Secret<String>,
        score_threshold: f32,
        api_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(api_timeout)
            .build()
            .context("Failed to build http client")?;

        let verify_url = api_base_url
            .join("siteverify")
            .context("Failed to create siteverify endpoint URL")?;

        Ok(Self {
            client,
            verify_url,
            secret_key,
            score_threshold,
        })
    }
}

#[derive(Debug, Serialize)]
struct SiteVerifyRequest<'a> {
    secret: &'a str,
    response: &'a str,
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    /// Only present for v3 keys
    score: Option<f32>,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

impl SiteVerifyResponse {
    fn passes(&self, threshold: f32) -> bool {
        self.success && self.score.unwrap_or(0.0) >= threshold
    }
}

#[async_trait::async_trait]
impl HumanVerifier for RecaptchaClient {
    #[tracing::instrument(name = "Verify reCAPTCHA token", skip(self, credential))]
    async fn verify(&self, credential: &str) -> anyhow::Result<bool> {
        use secrecy::ExposeSecret;

        let form = SiteVerifyRequest {
            secret: self.secret_key.expose_secret(),
            response: credential,
        };

        let response: SiteVerifyResponse = self
            .client
            .post(self.verify_url.clone())
            .form(&form)
            .send()
            .await
            .context("reCAPTCHA request failed")?
            .error_for_status()
            .context("reCAPTCHA rejected the request")?
            .json()
            .await
            .context("Failed to decode reCAPTCHA response")?;

        let passed = response.passes(self.score_threshold);
        if !passed {
            tracing::info!(
                score = ?response.score,
                error_codes = ?response.error_codes,
                "reCAPTCHA check failed"
            );
        }
        Ok(passed)
    }
}
