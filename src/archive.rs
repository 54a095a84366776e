use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use redis::AsyncCommands;
use secrecy::ExposeSecret;
use serde::Serialize;
use uuid::Uuid;

use crate::configuration::ArchiveSettings;
use crate::domain::Submission;
use crate::routing::Route;

/// 180 days
pub const RETENTION_SECONDS: u64 = 15_552_000;

/// Backup copy of an accepted submission. Written once, never read back by
/// this service.
#[derive(Serialize, Debug, Clone)]
pub struct ArchiveRecord {
    pub id: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub request_type: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: String,
    pub to: String,
    pub from: String,
    pub source_ip: String,
    pub user_agent: String,
}

/// Connection metadata recorded alongside the submission
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub source_ip: String,
    pub user_agent: String,
}

impl ArchiveRecord {
    pub fn new(
        submission: &Submission,
        route: &Route<'_>,
        meta: &RequestMeta,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            submitted_at: Utc::now(),
            request_type: submission.request_type.as_ref().to_string(),
            name: submission.name.as_ref().to_string(),
            email: submission.email.as_ref().to_string(),
            phone: submission.phone.clone(),
            message: submission.message.as_ref().to_string(),
            to: route.recipient.to_string(),
            from: route.sender.to_string(),
            source_ip: meta.source_ip.clone(),
            user_agent: meta.user_agent.clone(),
        }
    }

    /// `<timestamp>_<id>`. The fixed-width UTC timestamp comes first so keys
    /// sort chronologically.
    pub fn key(&self) -> String {
        format!(
            "{}_{}",
            self.submitted_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            self.id
        )
    }
}

/// Key-value store that accepts expiring writes
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    async fn put(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<(), anyhow::Error>;
}

pub struct RedisArchive {
    client: redis::Client,
    timeout: Duration,
}

impl RedisArchive {
    /// Only parses the uri; no connection is made until the first write, so an
    /// unreachable Redis never prevents the server from starting.
    pub fn new(cfg: &ArchiveSettings) -> Result<Self, anyhow::Error> {
        let client = redis::Client::open(cfg.redis_uri.expose_secret().as_str())
            .context("Invalid archive redis uri")?;
        Ok(Self {
            client,
            timeout: cfg.timeout(),
        })
    }
}

#[async_trait]
impl ArchiveStore for RedisArchive {
    async fn put(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<(), anyhow::Error> {
        let write = async {
            let mut conn = self
                .client
                .get_multiplexed_async_connection()
                .await
                .context("Failed to connect to redis")?;
            let _: () = conn
                .set_ex(key, value, ttl_seconds)
                .await
                .context("Redis rejected the write")?;
            Ok::<(), anyhow::Error>(())
        };
        tokio::time::timeout(self.timeout, write)
            .await
            .context("Archive write timed out")?
    }
}

/// Optional archive handle shared by all workers. Disabled means no record is
/// ever built.
#[derive(Clone, Default)]
pub struct Archive(Option<Arc<dyn ArchiveStore>>);

impl Archive {
    pub fn disabled() -> Self { Self(None) }

    pub fn new(store: Arc<dyn ArchiveStore>) -> Self { Self(Some(store)) }

    pub fn from_settings(cfg: Option<&ArchiveSettings>) -> Result<Self, anyhow::Error> {
        match cfg {
            Some(cfg) => Ok(Self::new(Arc::new(RedisArchive::new(cfg)?))),
            None => Ok(Self::disabled()),
        }
    }

    pub fn is_enabled(&self) -> bool { self.0.is_some() }

    /// Best effort. Every failure is logged and dropped here; the caller
    /// cannot observe whether the write happened.
    #[tracing::instrument(
        name = "Archiving submission",
        skip_all,
        fields(archive_key = %record.key())
    )]
    pub async fn store(
        &self,
        record: &ArchiveRecord,
    ) {
        let Some(store) = &self.0 else {
            return;
        };
        let outcome = match serde_json::to_string(record) {
            Ok(value) => store.put(&record.key(), &value, RETENTION_SECONDS).await,
            Err(e) => Err(anyhow::Error::new(e).context("Failed to serialize archive record")),
        };
        if let Err(e) = outcome {
            tracing::warn!(
                error.cause_chain = ?e,
                error.message = %e,
                "archive write failed, continuing without backup"
            );
        }
    }
}
