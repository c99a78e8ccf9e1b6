//! Push payloads and notification clicks.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::worker::Worker;

const ACTION_VIEW: &str = "view";
const ACTION_DISMISS: &str = "dismiss";

/// Static parts of every notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDefaults {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
}

impl Default for NotificationDefaults {
    fn default() -> Self {
        Self {
            title: "Weather".to_string(),
            body: "New weather information is available".to_string(),
            icon: "./icon-192.png".to_string(),
            badge: "./icon-72.png".to_string(),
            tag: "weather-update".to_string(),
        }
    }
}

/// What a push message may carry. Missing fields take the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushPayload {
    pub title: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// A notification ready for the platform to display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub renotify: bool,
    pub require_interaction: bool,
    pub actions: Vec<NotificationAction>,
}

impl Notification {
    fn compose(defaults: &NotificationDefaults, payload: PushPayload) -> Self {
        Self {
            title: payload.title.unwrap_or_else(|| defaults.title.clone()),
            body: payload.body.unwrap_or_else(|| defaults.body.clone()),
            icon: defaults.icon.clone(),
            badge: defaults.badge.clone(),
            tag: defaults.tag.clone(),
            renotify: true,
            require_interaction: false,
            actions: vec![
                NotificationAction {
                    action: ACTION_VIEW.to_string(),
                    title: "View Weather".to_string(),
                    icon: Some(defaults.icon.clone()),
                },
                NotificationAction { action: ACTION_DISMISS.to_string(), title: "Dismiss".to_string(), icon: None },
            ],
        }
    }
}

impl Worker {
    /// Build the notification for a push message.
    ///
    /// An absent payload shows the defaults; a payload that is not the
    /// expected JSON is logged and shows nothing.
    pub fn on_push(&self, data: Option<&[u8]>) -> Option<Notification> {
        let payload = match data {
            None => PushPayload::default(),
            Some(bytes) => match serde_json::from_slice::<PushPayload>(bytes) {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::warn!(error = %err, "ignoring unparsable push payload");
                    return None;
                }
            },
        };

        let notification = Notification::compose(&self.settings.notification, payload);
        tracing::info!(title = %notification.title, tag = %notification.tag, "showing notification");
        Some(notification)
    }

    /// URL to open for a clicked action: the shell for `view`, nothing otherwise.
    pub fn on_notification_click(&self, action: Option<&str>) -> Option<Url> {
        match action {
            Some(ACTION_VIEW) => Some(self.settings.shell.clone()),
            other => {
                tracing::debug!(action = ?other, "notification closed without navigation");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedNetwork, fresh_worker};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_push_with_payload() {
        let worker = fresh_worker(Arc::new(ScriptedNetwork::new())).await;
        let n = worker.on_push(Some(br#"{"title":"Storm warning","body":"Gusts up to 90 km/h"}"#)).unwrap();
        assert_eq!(n.title, "Storm warning");
        assert_eq!(n.body, "Gusts up to 90 km/h");
        assert_eq!(n.tag, "weather-update");
        assert!(n.renotify);
        let actions: Vec<_> = n.actions.iter().map(|a| a.action.as_str()).collect();
        assert_eq!(actions, ["view", "dismiss"]);
    }

    #[tokio::test]
    async fn test_push_defaults() {
        let worker = fresh_worker(Arc::new(ScriptedNetwork::new())).await;
        let n = worker.on_push(None).unwrap();
        assert_eq!(n.title, "Weather");
        assert_eq!(n.body, "New weather information is available");

        let partial = worker.on_push(Some(br#"{"body":"Rain at 5pm"}"#)).unwrap();
        assert_eq!(partial.title, "Weather");
        assert_eq!(partial.body, "Rain at 5pm");
    }

    #[tokio::test]
    async fn test_push_garbage_is_ignored() {
        let worker = fresh_worker(Arc::new(ScriptedNetwork::new())).await;
        assert!(worker.on_push(Some(b"not json")).is_none());
    }

    #[tokio::test]
    async fn test_notification_click() {
        let worker = fresh_worker(Arc::new(ScriptedNetwork::new())).await;
        assert_eq!(
            worker.on_notification_click(Some("view")).map(|u| u.to_string()),
            Some("http://localhost:8080/app.html".to_string())
        );
        assert!(worker.on_notification_click(Some("dismiss")).is_none());
        assert!(worker.on_notification_click(None).is_none());
    }

    #[test]
    fn test_notification_serializes_camel_case() {
        let n = Notification::compose(&NotificationDefaults::default(), PushPayload::default());
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["requireInteraction"], false);
        assert!(json["actions"][1].get("icon").is_none());
    }
}
