use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::NotificationsConfig;
use crate::db::DatabaseBackend;
use crate::error::{Result, VigilError};
use crate::models::{Alert, NotificationRecord, NotificationStatus};

/// A delivery target for triggered alerts. Delivery is best-effort; the
/// persisted alert is the source of truth and a channel failure never
/// rolls it back.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;
    async fn deliver(&self, alert: &Alert) -> Result<()>;
}

/// POSTs the alert as JSON to a configured URL.
pub struct WebhookChannel {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(name: impl Into<String>, url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            name: name.into(),
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, alert: &Alert) -> Result<()> {
        let response = self.client.post(&self.url).json(alert).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(VigilError::Internal(format!(
                "webhook '{}' returned HTTP {status}",
                self.name
            )));
        }
        Ok(())
    }
}

/// Fans a persisted alert out to every configured channel and records the
/// per-channel outcome on the alert row.
pub struct AlertDispatcher {
    db: Arc<dyn DatabaseBackend>,
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl AlertDispatcher {
    pub fn new(db: Arc<dyn DatabaseBackend>, channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self { db, channels }
    }

    pub fn from_config(db: Arc<dyn DatabaseBackend>, config: &NotificationsConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let channels = config
            .webhooks
            .iter()
            .map(|(name, url)| {
                WebhookChannel::new(name.clone(), url.clone(), timeout)
                    .map(|c| Arc::new(c) as Arc<dyn NotificationChannel>)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(db, channels))
    }

    pub async fn dispatch(&self, alert: &Alert) -> Result<Vec<NotificationRecord>> {
        let mut records = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            match channel.deliver(alert).await {
                Ok(()) => {
                    info!(alert_id = %alert.id, channel = channel.name(), "Alert delivered");
                    records.push(NotificationRecord {
                        channel: channel.name().to_string(),
                        status: NotificationStatus::Sent,
                        error: None,
                    });
                }
                Err(err) => {
                    warn!(
                        alert_id = %alert.id,
                        channel = channel.name(),
                        error = %err,
                        "Alert delivery failed"
                    );
                    records.push(NotificationRecord {
                        channel: channel.name().to_string(),
                        status: NotificationStatus::Failed,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        if !records.is_empty() {
            self.db.update_alert_notifications(&alert.id, &records).await?;
        }

        Ok(records)
    }
}
