//! # Event Bus System
//!
//! Broadcasts what the sync service is doing using `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: [`CoreEvent`] wrapping [`SyncEvent`] and [`LockEvent`]
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Receiver wrapper with an optional filter
//!
//! Emitting never blocks. When nobody is subscribed `emit` returns an error,
//! which publishers ignore.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, LockEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Lock(LockEvent::Contended {
//!         key: "pda-sync".to_string(),
//!     }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "Lock held by another instance");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Reconciliation run events
    Sync(SyncEvent),
    /// Lease lock events
    Lock(LockEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Lock(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Lock(LockEvent::LeaseLost { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::Completed { errors, .. }) if *errors > 0 => {
                EventSeverity::Warning
            }
            CoreEvent::Sync(SyncEvent::Aborted { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Lock(LockEvent::Contended { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Sync Events
// ============================================================================

/// Events emitted by the reconciliation engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// A run computed its window and is about to fetch.
    Started {
        run_id: String,
        /// Window start, RFC 3339
        window_from: String,
        /// Window end, RFC 3339
        window_to: String,
    },
    /// A run reached the end of the apply phase.
    ///
    /// `errors > 0` means a step failed and later steps were skipped.
    Completed {
        run_id: String,
        firms_created: u64,
        firms_updated: u64,
        firms_disabled: u64,
        firms_reactivated: u64,
        offices_created: u64,
        offices_updated: u64,
        offices_removed: u64,
        offices_reactivated: u64,
        warnings: u64,
        errors: u64,
        duration_ms: u64,
    },
    /// A run stopped without applying anything.
    Failed { run_id: String, message: String },
    /// Shutdown was requested before the run started fetching.
    Aborted { run_id: String },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Sync started",
            SyncEvent::Completed { .. } => "Sync completed",
            SyncEvent::Failed { .. } => "Sync failed",
            SyncEvent::Aborted { .. } => "Sync aborted for shutdown",
        }
    }
}

// ============================================================================
// Lock Events
// ============================================================================

/// Events emitted by the lease lock coordinator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LockEvent {
    Acquired {
        key: String,
        owner_id: String,
        /// Lease expiry, Unix epoch milliseconds
        expires_at: i64,
    },
    Contended {
        key: String,
    },
    Released {
        key: String,
    },
    /// A renewal found the lease no longer belongs to this instance.
    LeaseLost {
        key: String,
    },
}

impl LockEvent {
    fn description(&self) -> &str {
        match self {
            LockEvent::Acquired { .. } => "Lock acquired",
            LockEvent::Contended { .. } => "Lock held by another instance",
            LockEvent::Released { .. } => "Lock released",
            LockEvent::LeaseLost { .. } => "Lock lease lost",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus clones the sender, so every clone publishes to the same
/// subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventSeverity, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let important = EventStream::new(event_bus.subscribe())
///     .filter(|event| event.severity() >= EventSeverity::Warning);
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(errors: u64) -> CoreEvent {
        CoreEvent::Sync(SyncEvent::Completed {
            run_id: "run-1".to_string(),
            firms_created: 1,
            firms_updated: 0,
            firms_disabled: 0,
            firms_reactivated: 0,
            offices_created: 2,
            offices_updated: 0,
            offices_removed: 0,
            offices_reactivated: 0,
            warnings: 0,
            errors,
            duration_ms: 12,
        })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);

        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::default();
        let event = CoreEvent::Lock(LockEvent::Released {
            key: "pda-sync".to_string(),
        });

        assert!(bus.emit(event).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Sync(SyncEvent::Started {
            run_id: "run-1".to_string(),
            window_from: "2024-03-01T00:00:00Z".to_string(),
            window_to: "2024-03-01T01:00:00Z".to_string(),
        });

        assert_eq!(bus.emit(event.clone()).unwrap(), 2);
        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| event.severity() >= EventSeverity::Warning);

        bus.emit(completed(0)).ok();
        bus.emit(CoreEvent::Lock(LockEvent::LeaseLost {
            key: "pda-sync".to_string(),
        }))
        .ok();

        let received = stream.recv().await.unwrap();
        assert_eq!(received.description(), "Lock lease lost");
    }

    #[test]
    fn test_event_severity() {
        assert_eq!(completed(0).severity(), EventSeverity::Info);
        assert_eq!(completed(2).severity(), EventSeverity::Warning);
        assert_eq!(
            CoreEvent::Sync(SyncEvent::Failed {
                run_id: "run-1".to_string(),
                message: "timeout".to_string(),
            })
            .severity(),
            EventSeverity::Error
        );
        assert_eq!(
            CoreEvent::Lock(LockEvent::Acquired {
                key: "pda-sync".to_string(),
                owner_id: "owner".to_string(),
                expires_at: 0,
            })
            .severity(),
            EventSeverity::Debug
        );
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = CoreEvent::Lock(LockEvent::Contended {
            key: "pda-sync".to_string(),
        });
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "Lock");
        assert_eq!(json["payload"]["event"], "Contended");
        assert_eq!(json["payload"]["key"], "pda-sync");

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
