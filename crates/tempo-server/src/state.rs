use std::sync::Arc;

use tokio::sync::broadcast;

use tempo_core::{Notification, Task, TaskEvent, TaskEventKind};
use tempo_engine::engine::TaskEngine;
use uuid::Uuid;

use crate::metrics::get_metrics;

/// Shared application state.
pub struct AppState {
    pub engine: Arc<TaskEngine>,
    pub event_tx: broadcast::Sender<TaskEvent>,
    pub notification_tx: broadcast::Sender<Notification>,
    pub webhook_config: WebhookConfig,
    /// Shared HTTP client for outbound requests.
    pub http_client: reqwest::Client,
}

/// Configuration for webhook notifications.
#[derive(Clone, Debug, Default)]
pub struct WebhookConfig {
    pub notification_url: Option<String>,
    pub event_url: Option<String>,
    pub timeout_secs: u64,
}

impl WebhookConfig {
    pub fn from_env() -> Self {
        Self {
            notification_url: std::env::var("TEMPO_WEBHOOK_NOTIFICATION_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            event_url: std::env::var("TEMPO_WEBHOOK_EVENT_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            timeout_secs: std::env::var("TEMPO_WEBHOOK_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        }
    }
}

impl AppState {
    pub fn new(engine: Arc<TaskEngine>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let (notification_tx, _) = broadcast::channel(256);
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            engine,
            event_tx,
            notification_tx,
            webhook_config: WebhookConfig::from_env(),
            http_client,
        }
    }

    /// Broadcast a task mutation to subscribers and the event webhook.
    pub fn notify_event(&self, kind: TaskEventKind, task_id: Uuid, task: Option<Task>) {
        let event = TaskEvent::new(kind, task_id, task);
        let _ = self.event_tx.send(event.clone());

        if let Some(ref url) = self.webhook_config.event_url {
            self.dispatch_webhook(url.clone(), serde_json::json!(event));
        }
    }

    /// Broadcast a notification to subscribers and the notification webhook.
    pub fn notify_notification(&self, notification: Notification) {
        get_metrics().incr_notification_sent();
        let _ = self.notification_tx.send(notification.clone());

        if let Some(ref url) = self.webhook_config.notification_url {
            self.dispatch_webhook(url.clone(), serde_json::json!(notification));
        }
    }

    // Fire-and-forget webhook dispatch
    fn dispatch_webhook(&self, url: String, payload: serde_json::Value) {
        let timeout = self.webhook_config.timeout_secs;
        let client = self.http_client.clone();
        tokio::spawn(async move {
            let _ = client
                .post(&url)
                .timeout(std::time::Duration::from_secs(timeout))
                .header("Content-Type", "application/json")
                .json(&payload)
                .send()
                .await;
        });
    }
}
