use std::env;
use std::env::current_dir;
use std::fmt::Display;
use std::time::Duration;

use config::Config;
use config::ConfigError;
use secrecy::ExposeSecret;
use secrecy::Secret;
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;

use crate::captcha_client::CaptchaClient;
use crate::email_client::EmailClient;
use crate::routing::RouteTable;

/// Global configuration, loaded from `configuration/*.yaml` and the
/// environment. See `get_configuration`.
#[derive(Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub email_client: EmailClientSettings,
    pub captcha: CaptchaSettings,
    pub routing: RouteTable,

    /// Absent (or `~`) disables archival entirely
    #[serde(default)]
    pub archive: Option<ArchiveSettings>,
}

/// Server configuration
#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    /// Should be localhost on dev machine, 0.0.0.0 on prod
    pub host: String,

    /// 0 lets the OS pick a free port (tests)
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
}

/// Transactional email provider
#[derive(Deserialize, Clone)]
pub struct EmailClientSettings {
    pub base_url: String,

    /// Checked per request, not at startup; a missing token turns every
    /// accepted submission into a 500.
    #[serde(default)]
    pub authorization_token: Option<Secret<String>>,

    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

impl EmailClientSettings {
    pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_milliseconds) }

    pub fn client(self) -> Result<EmailClient, reqwest::Error> {
        let timeout = self.timeout();
        EmailClient::new(
            self.base_url,
            configured(self.authorization_token),
            timeout,
        )
    }
}

/// CAPTCHA verification service
#[derive(Deserialize, Clone)]
pub struct CaptchaSettings {
    pub base_url: String,

    /// Spam checking is opt-in: without a secret, tokens are never verified
    #[serde(default)]
    pub secret_key: Option<Secret<String>>,

    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

impl CaptchaSettings {
    pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_milliseconds) }

    pub fn client(self) -> Result<CaptchaClient, reqwest::Error> {
        let timeout = self.timeout();
        CaptchaClient::new(self.base_url, configured(self.secret_key), timeout)
    }
}

/// Backup copies of accepted submissions
#[derive(Deserialize, Clone)]
pub struct ArchiveSettings {
    pub redis_uri: Secret<String>,

    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

impl ArchiveSettings {
    pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_milliseconds) }
}

/// Empty secrets count as unset
fn configured(secret: Option<Secret<String>>) -> Option<Secret<String>> {
    secret.filter(|s| !s.expose_secret().trim().is_empty())
}

#[derive(Debug)]
pub enum Environment {
    Local,
    Production,
}

impl Display for Environment {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Environment::Local => "local",
                Environment::Production => "production",
            }
        )
    }
}

impl TryFrom<String> for Environment {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            e => Err(format!(
                "{e} is not a supported environment; use either `local` or `production`"
            )),
        }
    }
}

/// Variables set by the hosting platform under the provider's own names.
/// They take precedence over both the yaml files and `APP_*` variables.
const PROVIDER_VARIABLES: [(&str, &str); 4] = [
    ("RESEND_API_KEY", "email_client.authorization_token"),
    ("TURNSTILE_SECRET_KEY", "captcha.secret_key"),
    ("FROM_EMAIL", "routing.default_sender"),
    ("TO_EMAIL", "routing.default_recipient"),
];

/// Load yaml configuration files at `<project_root>/configuration`, then
/// layer environment variables on top.
///
/// `APP_ENVIRONMENT` selects the environment file (`local` by default).
/// Nested keys can be overridden with `APP_<SECTION>__<KEY>`, e.g.
/// `APP_APPLICATION__PORT=5001` -> `Settings.application.port`. Env vars are
/// always strings, hence `serde-aux` for numeric fields. Per-type addresses
/// come from `<TYPE>_TO_EMAIL` / `<TYPE>_FROM_EMAIL`, see
/// `RouteTable::with_overrides`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let cfg_dir = current_dir()
        .map_err(|e| ConfigError::Foreign(Box::new(e)))?
        .join("configuration");

    let env: Environment = env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".to_string())
        .try_into()
        .map_err(ConfigError::Message)?;

    let mut builder = Config::builder()
        .add_source(config::File::from(cfg_dir.join("base.yaml")))
        .add_source(config::File::from(cfg_dir.join(format!("{env}.yaml"))))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        );

    for (var, key) in PROVIDER_VARIABLES {
        builder = builder.set_override_option(key, env::var(var).ok())?;
    }

    let mut settings = builder.build()?.try_deserialize::<Settings>()?;
    // list entries cannot be addressed through `APP_*`
    settings.routing = settings.routing.with_overrides(|var| env::var(var).ok());
    Ok(settings)
}
