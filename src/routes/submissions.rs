use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

use actix_multipart::form::text::Text;
use actix_multipart::form::MultipartForm;
use actix_multipart::MultipartError;
use actix_web::dev::Payload;
use actix_web::http::header::USER_AGENT;
use actix_web::http::StatusCode;
use actix_web::web;
use actix_web::FromRequest;
use actix_web::HttpMessage;
use actix_web::HttpRequest;
use actix_web::HttpResponse;
use actix_web::ResponseError;
use anyhow::Context;
use serde::Deserialize;

use super::error_chain_fmt;
use crate::archive::Archive;
use crate::archive::ArchiveRecord;
use crate::archive::RequestMeta;
use crate::captcha_client::CaptchaClient;
use crate::domain::RequestType;
use crate::domain::RequiredText;
use crate::domain::Submission;
use crate::email_client::EmailClient;
use crate::email_client::EmailClientError;
use crate::email_client::OutgoingEmail;
use crate::routing::RouteError;
use crate::routing::RouteTable;

/// Set by the CDN in front of the site; preferred over the socket address
const CLIENT_IP_HEADER: &str = "CF-Connecting-IP";

/// Largest accepted body, in either encoding. Messages are relayed without
/// truncation, so this only guards against abuse.
pub const FORM_LIMIT: usize = 1024 * 1024;

/// Raw form fields. Everything is optional at this stage; absent fields are
/// empty strings, and validation happens in `parse_submission`.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct FormData {
    /// Honeypot, hidden from humans
    company: String,
    name: String,
    email: String,
    phone: String,
    message: String,
    request_type: String,
    #[serde(rename = "cf-turnstile-response")]
    captcha_token: String,
}

impl FormData {
    fn is_bot(&self) -> bool { !self.company.trim().is_empty() }
}

/// `FormData` as sent by `fetch(url, { body: new FormData(form) })`
#[derive(MultipartForm)]
struct MultipartFormData {
    company: Option<Text<String>>,
    name: Option<Text<String>>,
    email: Option<Text<String>>,
    phone: Option<Text<String>>,
    message: Option<Text<String>>,
    request_type: Option<Text<String>>,
    #[multipart(rename = "cf-turnstile-response")]
    captcha_token: Option<Text<String>>,
}

impl From<MultipartFormData> for FormData {
    fn from(form: MultipartFormData) -> Self {
        let text = |field: Option<Text<String>>| field.map(|t| t.0).unwrap_or_default();
        Self {
            company: text(form.company),
            name: text(form.name),
            email: text(form.email),
            phone: text(form.phone),
            message: text(form.message),
            request_type: text(form.request_type),
            captcha_token: text(form.captcha_token),
        }
    }
}

/// Form body in either encoding a browser produces: url-encoded (plain
/// `<form>` post) or multipart (`FormData` posted by script). Dispatches on
/// the content type; anything that is not multipart goes through
/// `web::Form`, which rejects unsupported content types itself.
pub struct SubmittedForm(FormData);

impl FromRequest for SubmittedForm {
    type Error = actix_web::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(
        req: &HttpRequest,
        payload: &mut Payload,
    ) -> Self::Future {
        if req.content_type().eq_ignore_ascii_case("multipart/form-data") {
            let form = MultipartForm::<MultipartFormData>::from_request(req, payload);
            Box::pin(async move { Ok(Self(form.await?.into_inner().into())) })
        } else {
            let form = web::Form::<FormData>::from_request(req, payload);
            Box::pin(async move { Ok(Self(form.await?.into_inner())) })
        }
    }
}

/// Every way a submission can be turned down. The `Display` string of each
/// variant is exactly what the caller sees in `{"error": ...}`; causes are
/// only visible in logs.
#[derive(thiserror::Error)]
pub enum SubmissionError {
    #[error("Missing required fields.")]
    MissingFields,
    #[error("Invalid request type.")]
    InvalidRequestType,
    #[error("Spam check missing.")]
    SpamCheckMissing,
    #[error("Spam check failed.")]
    SpamCheckFailed(#[source] anyhow::Error),
    /// Deployment misconfiguration: no address for one side of the email
    #[error(transparent)]
    Routing(#[from] RouteError),
    #[error("Missing RESEND_API_KEY.")]
    MissingApiKey,
    #[error("Email failed. Please try again later.")]
    EmailFailed(#[source] anyhow::Error),
    /// Anything not covered above, including bodies that cannot be decoded
    #[error("Bad request.")]
    Unexpected(#[source] anyhow::Error),
}

impl Debug for SubmissionError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for SubmissionError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingFields
            | Self::InvalidRequestType
            | Self::SpamCheckMissing
            | Self::Unexpected(_) => StatusCode::BAD_REQUEST,
            Self::SpamCheckFailed(_) => StatusCode::FORBIDDEN,
            Self::Routing(_) | Self::MissingApiKey => StatusCode::INTERNAL_SERVER_ERROR,
            Self::EmailFailed(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(serde_json::json!({ "error": self.to_string() }))
    }
}

impl From<EmailClientError> for SubmissionError {
    fn from(e: EmailClientError) -> Self {
        match e {
            EmailClientError::MissingAuthorizationToken => Self::MissingApiKey,
            e @ EmailClientError::Delivery(_) => {
                Self::EmailFailed(anyhow::Error::new(e).context("Relay did not accept the email"))
            }
        }
    }
}

/// Handler for undecodable bodies (wrong content type, bad encoding, too
/// large), registered through `web::FormConfig`. Collapses them into the same
/// generic 400 as any other unexpected failure.
pub fn form_error_handler(
    err: actix_web::error::UrlencodedError,
    _req: &HttpRequest,
) -> actix_web::Error {
    SubmissionError::Unexpected(anyhow::anyhow!("{err}").context("Could not decode form body"))
        .into()
}

/// Same as `form_error_handler`, for multipart bodies
pub fn multipart_error_handler(
    err: MultipartError,
    _req: &HttpRequest,
) -> actix_web::Error {
    SubmissionError::Unexpected(
        anyhow::anyhow!("{err}").context("Could not decode multipart body"),
    )
    .into()
}

fn accepted() -> HttpResponse { HttpResponse::Ok().json(serde_json::json!({ "ok": true })) }

/// Required fields are checked before the request type, so a form missing
/// both reports the missing fields.
fn parse_submission(
    form: &FormData,
    table: &RouteTable,
) -> Result<Submission, SubmissionError> {
    let (name, email, message) = match (
        RequiredText::parse(form.name.clone()),
        RequiredText::parse(form.email.clone()),
        RequiredText::parse(form.message.clone()),
    ) {
        (Ok(name), Ok(email), Ok(message)) => (name, email, message),
        _ => return Err(SubmissionError::MissingFields),
    };

    let request_type = RequestType::parse(form.request_type.clone(), table)
        .map_err(|_| SubmissionError::InvalidRequestType)?;

    let phone = Some(form.phone.trim())
        .filter(|p| !p.is_empty())
        .map(String::from);

    Ok(Submission {
        name,
        email,
        phone,
        message,
        request_type,
    })
}

fn request_meta(req: &HttpRequest) -> RequestMeta {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
    };
    RequestMeta {
        source_ip: header(CLIENT_IP_HEADER)
            .or_else(|| req.peer_addr().map(|a| a.ip().to_string()))
            .unwrap_or_default(),
        user_agent: header(USER_AGENT.as_str()).unwrap_or_default(),
    }
}

/// Runs only when the deployment has a spam-check secret.
async fn check_spam(
    captcha_client: &CaptchaClient,
    token: &str,
    remote_ip: &str,
) -> Result<(), SubmissionError> {
    if !captcha_client.is_enabled() {
        return Ok(());
    }
    let token = token.trim();
    if token.is_empty() {
        tracing::warn!("submission without spam check token");
        return Err(SubmissionError::SpamCheckMissing);
    }
    let passed = captcha_client
        .verify(token, remote_ip)
        .await
        .context("Verification service call failed")
        .map_err(SubmissionError::SpamCheckFailed)?;
    match passed {
        true => Ok(()),
        false => Err(SubmissionError::SpamCheckFailed(anyhow::anyhow!(
            "Verification service rejected the token"
        ))),
    }
}

/// `POST /api/appointment`
///
/// Validates a contact form, optionally archives it, and relays it by email.
/// Responds with `{"ok": true}` on success, otherwise `{"error": "..."}` with
/// one of 400, 403, 500, 502.
///
/// # Request example
///
/// ```sh
///     curl -v --data 'name=Jane&email=jane%40example.com&message=Hi&request_type=Sales' \
///         http://127.0.0.1:8000/api/appointment
/// ```
///
/// The body may be url-encoded or `multipart/form-data`, with the same field
/// names either way.
///
/// A filled honeypot (`company`) gets the same 200 as a real submission, but
/// nothing else happens.
///
/// Every failure below is an explicit `Result`; there is no panic path, so
/// panics are not caught.
#[tracing::instrument(
    name = "Relaying form submission",
    skip_all,
    fields(
        submitter_name = tracing::field::Empty,
        submitter_email = tracing::field::Empty,
        request_type = tracing::field::Empty,
    )
)]
pub async fn submit(
    req: HttpRequest,
    form: SubmittedForm,
    email_client: web::Data<EmailClient>,
    captcha_client: web::Data<CaptchaClient>,
    route_table: web::Data<RouteTable>,
    archive: web::Data<Archive>,
) -> Result<HttpResponse, SubmissionError> {
    let SubmittedForm(form) = form;

    if form.is_bot() {
        tracing::info!("honeypot field filled, discarding submission");
        return Ok(accepted());
    }

    let submission = parse_submission(&form, &route_table)?;
    tracing::Span::current()
        .record("submitter_name", submission.name.as_ref())
        .record("submitter_email", submission.email.as_ref())
        .record("request_type", submission.request_type.as_ref());

    let meta = request_meta(&req);
    check_spam(&captcha_client, &form.captcha_token, &meta.source_ip).await?;

    let route = route_table
        .resolve(submission.request_type.as_ref())
        .inspect_err(|e| tracing::error!("deployment misconfigured: {e}"))?;

    let record = archive
        .is_enabled()
        .then(|| ArchiveRecord::new(&submission, &route, &meta));
    if let Some(record) = &record {
        archive.store(record).await;
    }

    let subject = submission.email_subject();
    let text = submission.email_text(record.as_ref());
    email_client
        .send_email(&OutgoingEmail {
            from: route.sender,
            to: route.recipient,
            reply_to: submission.email.as_ref(),
            subject: &subject,
            text: &text,
        })
        .await
        .map_err(SubmissionError::from)
        .inspect_err(|e| tracing::error!(error.cause_chain = ?e, "email relay failed"))?;

    Ok(accepted())
}
