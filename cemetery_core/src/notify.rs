//! Office notifications sent when exhumation requests are filed.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub recipient: String,
    pub template_id: String,
    pub params: Map<String, Value>,
}

impl Notification {
    pub fn new(recipient: impl Into<String>, template_id: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            template_id: template_id.into(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification has no recipient")]
    MissingRecipient,
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait NotificationDispatch: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl NotificationDispatch for LogNotifier {
    async fn send(&self, notification: Notification) -> Result<(), NotifyError> {
        if notification.recipient.trim().is_empty() {
            return Err(NotifyError::MissingRecipient);
        }
        let params = Value::Object(notification.params.clone());
        info!(
            target: "cemetery::notify",
            recipient = %notification.recipient,
            template = %notification.template_id,
            %params,
            "notification.sent"
        );
        Ok(())
    }
}

/// Fire-and-forget send. Failures are logged and never reach the caller.
///
/// Must be called from within a tokio runtime.
pub fn dispatch_detached(
    dispatcher: Arc<dyn NotificationDispatch>,
    notification: Notification,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let template = notification.template_id.clone();
        if let Err(err) = dispatcher.send(notification).await {
            warn!(
                target: "cemetery::notify",
                %template,
                error = %err,
                "notification.failed"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    #[async_trait]
    impl NotificationDispatch for Failing {
        async fn send(&self, _notification: Notification) -> Result<(), NotifyError> {
            Err(NotifyError::Delivery("smtp down".to_string()))
        }
    }

    #[tokio::test]
    async fn log_notifier_requires_recipient() {
        let result = LogNotifier.send(Notification::new(" ", "exhumation_request")).await;
        assert!(matches!(result, Err(NotifyError::MissingRecipient)));
        let ok = Notification::new("office@example.org", "exhumation_request")
            .with_param("plot_id", "lb-10a");
        assert_eq!(ok.params.get("plot_id"), Some(&Value::from("lb-10a")));
        assert!(LogNotifier.send(ok).await.is_ok());
    }

    #[tokio::test]
    async fn detached_failures_do_not_propagate() {
        let handle = dispatch_detached(
            Arc::new(Failing),
            Notification::new("office@example.org", "exhumation_request"),
        );
        assert!(handle.await.is_ok());
    }
}
