//! Device event channel.
//!
//! Terminals raise events outside of request/response calls: a cardholder
//! presses cancel, the USB cable is pulled, a command runs into the terminal's
//! own timeout. Devices publish these through a [`DeviceEventPublisher`]
//! attached during discovery; the workflow engine reads the most recent one
//! from the [`DeviceEventChannel`] when deciding whether a device needs
//! recovery.
//!
//! ```text
//! ┌──────────┐  publish   ┌────────────────────┐  current()  ┌──────────────┐
//! │ Device A │───────────►│                    │────────────►│ SanityCheck  │
//! └──────────┘            │ DeviceEventChannel │             └──────────────┘
//! ┌──────────┐  publish   │  (latest value)    │  reset()
//! │ Device B │───────────►│                    │◄────────────
//! └──────────┘            └────────────────────┘
//! ```
//!
//! Only the latest event is retained; an unread event is overwritten by the
//! next one.
//!
//! # Examples
//!
//! ```
//! use pinpad_core::DeviceEvent;
//! use pinpad_hardware::events::DeviceEventChannel;
//!
//! let channel = DeviceEventChannel::new();
//! let publisher = channel.publisher();
//!
//! publisher.publish(DeviceEvent::DeviceUnplugged);
//! assert_eq!(channel.current(), DeviceEvent::DeviceUnplugged);
//!
//! channel.reset();
//! assert!(channel.current().is_none());
//! ```

use pinpad_core::DeviceEvent;
use std::sync::Arc;
use tokio::sync::watch;

/// Shared holder of the most recent device event.
#[derive(Debug, Clone)]
pub struct DeviceEventChannel {
    tx: Arc<watch::Sender<DeviceEvent>>,
}

impl DeviceEventChannel {
    /// Create a channel holding `DeviceEvent::None`.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(DeviceEvent::None);
        Self { tx: Arc::new(tx) }
    }

    /// Create a publisher that devices use to raise events.
    pub fn publisher(&self) -> DeviceEventPublisher {
        DeviceEventPublisher {
            tx: Arc::clone(&self.tx),
        }
    }

    /// Get the most recent event.
    pub fn current(&self) -> DeviceEvent {
        *self.tx.borrow()
    }

    /// Clear the most recent event.
    pub fn reset(&self) {
        self.tx.send_replace(DeviceEvent::None);
    }

    /// Subscribe to event changes.
    pub fn subscribe(&self) -> watch::Receiver<DeviceEvent> {
        self.tx.subscribe()
    }
}

impl Default for DeviceEventChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Device-side end of the event channel.
#[derive(Debug, Clone)]
pub struct DeviceEventPublisher {
    tx: Arc<watch::Sender<DeviceEvent>>,
}

impl DeviceEventPublisher {
    /// Publish an event, replacing any unread one.
    pub fn publish(&self, event: DeviceEvent) {
        tracing::debug!(%event, "device event published");
        self.tx.send_replace(event);
    }
}
