//! Webhook notifier

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;
use tracing::{debug, info, instrument};

use kubackup_core::config::{NotificationConfig, NotifyFormat};

use crate::error::{NotifyError, Result};
use crate::message::{render_payload, Notification};
use crate::traits::Notifier;

/// Response bodies are cut to this length in errors
const MAX_ERROR_BODY: usize = 512;

/// Posts notifications to a webhook URL
pub struct WebhookNotifier {
    client: Client,
    url: Url,
    format: NotifyFormat,
    username: Option<String>,
    channel: Option<String>,
}

impl WebhookNotifier {
    /// Create a notifier for `url`
    pub fn new(url: impl Into<String>, format: NotifyFormat, timeout: Duration) -> Result<Self> {
        let raw = url.into();
        let url = match Url::parse(&raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => url,
            _ => return Err(NotifyError::InvalidUrl(raw)),
        };

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("kubackup/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url,
            format,
            username: None,
            channel: None,
        })
    }

    /// Build from configuration; `None` when no webhook is configured
    pub fn from_config(config: &NotificationConfig) -> Result<Option<Self>> {
        let Some(url) = &config.webhook_url else {
            return Ok(None);
        };

        let mut notifier = Self::new(
            url.clone(),
            config.format,
            Duration::from_secs(config.timeout_secs),
        )?;
        notifier.username = config.username.clone();
        notifier.channel = config.channel.clone();
        Ok(Some(notifier))
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Target host, for display; the path of chat webhooks is a secret
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    #[instrument(skip(self, notification), fields(host = %self.host(), success = notification.success))]
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let payload = render_payload(
            self.format,
            notification,
            self.username.as_deref(),
            self.channel.as_deref(),
        );
        debug!(format = ?self.format, "posting notification");

        let response = self.client.post(self.url.clone()).json(&payload).send().await?;
        let status = response.status();

        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(status = status.as_u16(), "notification sent");
        Ok(())
    }
}
