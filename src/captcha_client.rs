use std::time::Duration;

use reqwest::Client;
use secrecy::ExposeSecret;
use secrecy::Secret;
use serde::Deserialize;

const VERIFY_PATH: &str = "/turnstile/v0/siteverify";

/// Only `success` matters; anything without it is treated as unparsable.
#[derive(Deserialize, Debug)]
struct VerifyResponse {
    success: bool,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

/// Client for the CAPTCHA verification service.
pub struct CaptchaClient {
    http_client: Client,
    base_url: String,
    secret_key: Option<Secret<String>>,
}

impl CaptchaClient {
    pub fn new(
        base_url: String,
        secret_key: Option<Secret<String>>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http_client: Client::builder().timeout(timeout).build()?,
            base_url,
            secret_key,
        })
    }

    /// Verification only runs when the deployment has a secret
    pub fn is_enabled(&self) -> bool { self.secret_key.is_some() }

    /// `Ok(false)` when the service rejects the token. Transport errors,
    /// timeouts, and bodies that are not `{"success": bool, ..}` are `Err`.
    /// A disabled client never makes a request and rejects every token.
    #[tracing::instrument(name = "Verifying spam check token", skip(self, token))]
    pub async fn verify(
        &self,
        token: &str,
        remote_ip: &str,
    ) -> Result<bool, reqwest::Error> {
        let Some(secret) = &self.secret_key else {
            return Ok(false);
        };

        let url = format!("{}{VERIFY_PATH}", self.base_url);
        let resp: VerifyResponse = self
            .http_client
            .post(&url)
            .form(&[
                ("secret", secret.expose_secret().as_str()),
                ("response", token),
                ("remoteip", remote_ip),
            ])
            .send()
            .await?
            .json()
            .await?;

        if !resp.success {
            tracing::warn!(error_codes = ?resp.error_codes, "token rejected");
        }
        Ok(resp.success)
    }
}
