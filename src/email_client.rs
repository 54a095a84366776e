use std::time::Duration;

use reqwest::Client;
use secrecy::ExposeSecret;
use secrecy::Secret;
use serde::Serialize;

/// Everything the provider needs for one message. Addresses are passed
/// through as configured/submitted.
#[derive(Debug)]
pub struct OutgoingEmail<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub reply_to: &'a str,
    pub subject: &'a str,
    pub text: &'a str,
}

/// Wire format of the provider's `POST /emails`
#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    reply_to: &'a str,
    text: &'a str,
}

#[derive(thiserror::Error, Debug)]
pub enum EmailClientError {
    #[error("No authorization token configured for the email provider")]
    MissingAuthorizationToken,
    /// Transport failure, timeout, or non-2xx response
    #[error("Email provider request failed")]
    Delivery(#[from] reqwest::Error),
}

/// Client for the transactional email provider.
///
/// Holds a single `reqwest::Client` so connections are pooled across
/// requests; share it via `web::Data` rather than building one per request.
pub struct EmailClient {
    http_client: Client,
    base_url: String,
    authorization_token: Option<Secret<String>>,
}

impl EmailClient {
    pub fn new(
        base_url: String,
        authorization_token: Option<Secret<String>>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http_client: Client::builder().timeout(timeout).build()?,
            base_url,
            authorization_token,
        })
    }

    /// Fails before any network I/O if no token is configured.
    pub async fn send_email(
        &self,
        email: &OutgoingEmail<'_>,
    ) -> Result<(), EmailClientError> {
        let token = self
            .authorization_token
            .as_ref()
            .ok_or(EmailClientError::MissingAuthorizationToken)?;

        let url = format!("{}/emails", self.base_url);
        let body = SendEmailRequest {
            from: email.from,
            to: email.to,
            subject: email.subject,
            reply_to: email.reply_to,
            text: email.text,
        };

        self.http_client
            .post(&url)
            .bearer_auth(token.expose_secret())
            .json(&body)
            .send()
            .await?
            // any non-2xx counts as a failed delivery
            .error_for_status()?;
        Ok(())
    }
}
