//! Transient user notifications
//!
//! Notifications are broadcast to whichever renderer is attached. A
//! notification with an id that is already shown replaces the earlier one,
//! which is how a "loading" entry turns into "success" or "failure".

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

/// Stable identifier of a notification slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NotificationId(String);

impl NotificationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random id
    pub fn unique() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serialized under the same names [`Level::name`] renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[serde(rename = "pending")]
    Loading,
    Success,
    #[serde(rename = "failure")]
    Error,
    Info,
}

impl Level {
    pub fn name(&self) -> &'static str {
        match self {
            Level::Loading => "pending",
            Level::Success => "success",
            Level::Error => "failure",
            Level::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub level: Level,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Publishes notifications to all subscribers
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn loading(&self, id: &NotificationId, message: impl Into<String>) {
        self.emit(id.clone(), Level::Loading, message.into());
    }

    pub fn success(&self, id: &NotificationId, message: impl Into<String>) {
        self.emit(id.clone(), Level::Success, message.into());
    }

    pub fn error(&self, id: &NotificationId, message: impl Into<String>) {
        self.emit(id.clone(), Level::Error, message.into());
    }

    /// Error in a slot of its own
    pub fn error_once(&self, message: impl Into<String>) {
        self.emit(NotificationId::unique(), Level::Error, message.into());
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(NotificationId::unique(), Level::Info, message.into());
    }

    fn emit(&self, id: NotificationId, level: Level, message: String) {
        tracing::debug!(id = %id, level = level.name(), message = %message, "Notification");
        // No subscribers is fine: nobody is rendering
        let _ = self.tx.send(Notification {
            id,
            level,
            message,
            timestamp: Utc::now(),
        });
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

/// The set of currently visible notifications, in arrival order
#[derive(Debug, Default)]
pub struct NotificationBoard {
    entries: Vec<Notification>,
}

impl NotificationBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show a notification, replacing any entry with the same id
    pub fn apply(&mut self, notification: Notification) {
        match self.entries.iter_mut().find(|n| n.id == notification.id) {
            Some(existing) => *existing = notification,
            None => self.entries.push(notification),
        }
    }

    pub fn get(&self, id: &NotificationId) -> Option<&Notification> {
        self.entries.iter().find(|n| &n.id == id)
    }

    pub fn entries(&self) -> &[Notification] {
        &self.entries
    }

    /// Drop everything that is no longer loading
    pub fn dismiss_settled(&mut self) {
        self.entries.retain(|n| n.level == Level::Loading);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_serializes_as_its_name() {
        for level in [Level::Loading, Level::Success, Level::Error, Level::Info] {
            let encoded = serde_json::to_value(level).unwrap();
            assert_eq!(encoded, serde_json::Value::from(level.name()));
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let id = NotificationId::new("transfer");

        notifier.loading(&id, "Processing transfer...");
        notifier.success(&id, "Transfer completed successfully!");

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.level, Level::Loading);
        assert_eq!(second.level, Level::Success);
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let notifier = Notifier::new();
        notifier.info("nobody listening");
    }

    #[tokio::test]
    async fn test_board_replaces_by_id() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let mut board = NotificationBoard::new();

        let register = NotificationId::new("register");
        notifier.loading(&register, "Registering user...");
        notifier.info("Wallet connected successfully!");
        notifier.error(&register, "Registration failed");

        for _ in 0..3 {
            board.apply(rx.recv().await.unwrap());
        }

        assert_eq!(board.entries().len(), 2);
        let entry = board.get(&register).unwrap();
        assert_eq!(entry.level, Level::Error);
        assert_eq!(entry.message, "Registration failed");
        // Replacement keeps the original position
        assert_eq!(board.entries()[0].id, register);

        board.dismiss_settled();
        assert!(board.entries().is_empty());
    }

    #[test]
    fn test_unique_ids_differ() {
        assert_ne!(NotificationId::unique(), NotificationId::unique());
    }
}
