// Database status notifications
// A single value object on a watch channel; the UI layer reads the current
// value and subscribes for changes. There is no ambient global.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum DbStatus {
    Initializing { message: String },
    Connected,
    Error { message: String },
}

impl DbStatus {
    pub fn isConnected(&self) -> bool {
        matches!(self, DbStatus::Connected)
    }
}

/// Publishes database status transitions to any number of subscribers
#[derive(Debug)]
pub struct StatusManager {
    tx: watch::Sender<DbStatus>,
}

impl StatusManager {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(DbStatus::Initializing {
            message: "Database not started".to_string(),
        });
        Self { tx }
    }

    /// Current status snapshot
    pub fn status(&self) -> DbStatus {
        self.tx.borrow().clone()
    }

    /// Receiver that observes every subsequent transition
    pub fn subscribe(&self) -> watch::Receiver<DbStatus> {
        self.tx.subscribe()
    }

    pub fn setInitializing(&self, message: &str) {
        tracing::info!("[StatusManager] initializing: {}", message);
        self.tx.send_replace(DbStatus::Initializing {
            message: message.to_string(),
        });
    }

    pub fn setConnected(&self) {
        tracing::info!("[StatusManager] database connected");
        self.tx.send_replace(DbStatus::Connected);
    }

    pub fn setError(&self, message: &str) {
        tracing::error!("[StatusManager] database error: {}", message);
        self.tx.send_replace(DbStatus::Error {
            message: message.to_string(),
        });
    }
}

impl Default for StatusManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        let manager = StatusManager::new();
        assert!(!manager.status().isConnected());

        manager.setInitializing("Provisioning data directory");
        assert_eq!(
            manager.status(),
            DbStatus::Initializing {
                message: "Provisioning data directory".to_string()
            }
        );

        manager.setConnected();
        assert!(manager.status().isConnected());

        manager.setError("disk full");
        assert_eq!(
            manager.status(),
            DbStatus::Error {
                message: "disk full".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_subscribers_observe_changes() {
        let manager = StatusManager::new();
        let mut rx = manager.subscribe();

        manager.setConnected();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), DbStatus::Connected);
    }

    #[test]
    fn test_status_wire_shape() {
        let json = serde_json::to_value(DbStatus::Error {
            message: "boom".to_string(),
        })
        .unwrap();
        assert_eq!(json["state"], "error");
        assert_eq!(json["message"], "boom");

        let json = serde_json::to_value(DbStatus::Connected).unwrap();
        assert_eq!(json["state"], "connected");
    }
}
