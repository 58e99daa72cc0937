use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Push provider an app is registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Wpns,
}

/// An application registered with the gateway.
///
/// Provider credentials are owned by the store and never inspected here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub provider: Provider,
}

impl App {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            provider: Provider::Wpns,
        }
    }
}

/// One push message waiting to be delivered to a device channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    /// Owning app. Workers are keyed on this.
    pub app_id: Uuid,
    /// Alert text shown to the user.
    pub alert: String,
    /// Device channel URI handed out by the provider.
    pub uri: String,
    /// Earliest time the scheduler may hand this notification to a worker.
    pub deliver_after: DateTime<Utc>,
}

impl Notification {
    pub fn new(app: &App, alert: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            app_id: app.id,
            alert: alert.into(),
            uri: uri.into(),
            deliver_after: Utc::now(),
        }
    }
}

/// Terminal or scheduling state recorded against a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
    Retryable,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Pending => write!(f, "pending"),
            DeliveryStatus::Delivered => write!(f, "delivered"),
            DeliveryStatus::Failed => write!(f, "failed"),
            DeliveryStatus::Retryable => write!(f, "retryable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_deserializes_from_json_line() {
        let line = r#"{
            "id": "7d0b1c1e-4f0b-4a86-9d7b-1d2f3c4b5a69",
            "app_id": "0b9a2f8e-3c55-4c1f-8f9b-3e1d2a6b7c80",
            "alert": "hello",
            "uri": "http://push.example/channel/1",
            "deliver_after": "2026-10-19T12:00:00Z"
        }"#;
        let n: Notification = serde_json::from_str(line).unwrap();
        assert_eq!(n.alert, "hello");
        assert_eq!(n.uri, "http://push.example/channel/1");
    }

    #[test]
    fn test_notification_belongs_to_app() {
        let app = App::new("MyApp");
        let n = Notification::new(&app, "test", "http://some.example/");
        assert_eq!(n.app_id, app.id);
        assert_eq!(app.provider, Provider::Wpns);
    }

    #[test]
    fn test_delivery_status_display() {
        assert_eq!(DeliveryStatus::Retryable.to_string(), "retryable");
        assert_eq!(
            serde_json::to_string(&DeliveryStatus::Delivered).unwrap(),
            "\"delivered\""
        );
    }
}
