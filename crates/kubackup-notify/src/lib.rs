//! kubackup Notify - Run completion notifications
//!
//! One webhook POST per run, formatted for chat tools (Slack, Mattermost,
//! Rocket.Chat) or as the raw JSON run summary.

pub mod error;
pub mod message;
pub mod traits;
pub mod webhook;

pub use error::{NotifyError, Result};
pub use message::{render_payload, Notification};
pub use traits::Notifier;
pub use webhook::WebhookNotifier;
