//! Outbound transport collaborator.
//!
//! The terminal `RequestComplete` action serializes the final envelope and
//! hands the JSON to a [`ResponsePublisher`].

use crate::error::{Result, WorkflowError};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Sink for serialized responses.
pub trait ResponsePublisher: Send + Sync {
    fn publish(&self, json: String) -> Result<()>;
}

/// Publisher forwarding responses into a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelPublisher {
    /// Create a publisher and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ResponsePublisher for ChannelPublisher {
    fn publish(&self, json: String) -> Result<()> {
        self.tx.send(json).map_err(|_| {
            WorkflowError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "response receiver dropped",
            ))
        })
    }
}

/// Publisher collecting responses in memory.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    published: Mutex<Vec<String>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<String> {
        self.published
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.published.lock().map(|p| p.len()).unwrap_or_default()
    }
}

impl ResponsePublisher for MemoryPublisher {
    fn publish(&self, json: String) -> Result<()> {
        if let Ok(mut published) = self.published.lock() {
            published.push(json);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_publisher() {
        let (publisher, mut rx) = ChannelPublisher::new();
        publisher.publish("{}".to_string()).unwrap();

        assert_eq!(rx.recv().await.as_deref(), Some("{}"));
    }

    #[test]
    fn test_channel_publisher_closed() {
        let (publisher, rx) = ChannelPublisher::new();
        drop(rx);

        assert!(publisher.publish("{}".to_string()).is_err());
    }

    #[test]
    fn test_memory_publisher() {
        let publisher = MemoryPublisher::new();
        publisher.publish("a".to_string()).unwrap();
        publisher.publish("b".to_string()).unwrap();

        assert_eq!(publisher.count(), 2);
        assert_eq!(publisher.published(), vec!["a", "b"]);
    }
}
