//! Notifier trait

use async_trait::async_trait;

use crate::error::Result;
use crate::message::Notification;

/// Something that delivers run notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Deliver one notification
    async fn notify(&self, notification: &Notification) -> Result<()>;
}
