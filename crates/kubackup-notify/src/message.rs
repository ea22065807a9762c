//! Notification content and payload formats

use serde::Serialize;
use serde_json::{json, Value};

use kubackup_core::config::NotifyFormat;

/// What a run reports
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    /// One-line headline
    pub title: String,
    pub success: bool,
    /// One line per target
    pub lines: Vec<String>,
    /// Full machine-readable summary, sent as-is in `json` format
    pub summary: Value,
}

impl Notification {
    pub fn new(title: impl Into<String>, success: bool) -> Self {
        Self {
            title: title.into(),
            success,
            lines: Vec::new(),
            summary: Value::Null,
        }
    }

    pub fn with_line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    pub fn with_summary(mut self, summary: Value) -> Self {
        self.summary = summary;
        self
    }

    /// Plain text rendering: the title followed by the target lines
    pub fn text(&self) -> String {
        let mut text = self.title.clone();
        for line in &self.lines {
            text.push('\n');
            text.push_str(line);
        }
        text
    }
}

/// Build the request body for a payload format
pub fn render_payload(
    format: NotifyFormat,
    notification: &Notification,
    username: Option<&str>,
    channel: Option<&str>,
) -> Value {
    match format {
        NotifyFormat::Slack => {
            let mut payload = json!({ "text": notification.text() });
            if let Some(username) = username {
                payload["username"] = json!(username);
            }
            if let Some(channel) = channel {
                payload["channel"] = json!(channel);
            }
            payload
        }
        NotifyFormat::Json => match &notification.summary {
            Value::Null => json!({
                "title": notification.title,
                "success": notification.success,
                "lines": notification.lines,
            }),
            summary => summary.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification() -> Notification {
        Notification::new("kubackup: 1 of 2 targets failed", false)
            .with_line("ok   db -> kubackup/prod/postgres/20240305T010203Z.sql.gz")
            .with_line("FAIL zk: no running pod")
    }

    #[test]
    fn test_text() {
        let text = notification().text();
        assert!(text.starts_with("kubackup: 1 of 2 targets failed\nok   db"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_slack_payload() {
        let payload = render_payload(NotifyFormat::Slack, &notification(), Some("backup-bot"), None);
        assert_eq!(payload["username"], "backup-bot");
        assert!(payload.get("channel").is_none());
        assert!(payload["text"].as_str().unwrap().contains("FAIL zk"));
    }

    #[test]
    fn test_json_payload_uses_summary() {
        let with_summary = notification().with_summary(json!({"run_id": "abc", "failed": 1}));
        let payload = render_payload(NotifyFormat::Json, &with_summary, Some("ignored"), None);
        assert_eq!(payload, json!({"run_id": "abc", "failed": 1}));

        let bare = render_payload(NotifyFormat::Json, &notification(), None, None);
        assert_eq!(bare["success"], false);
        assert_eq!(bare["lines"].as_array().unwrap().len(), 2);
    }
}
