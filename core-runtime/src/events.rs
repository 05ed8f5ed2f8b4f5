//! # Event Bus System
//!
//! Typed events broadcast over `tokio::sync::broadcast`, so a CLI progress
//! printer or a GUI can follow a resolution run without the engine knowing
//! about either.
//!
//! ## Overview
//!
//! - **Event Types**: [`ResolutionEvent`] for single lookups, [`BatchEvent`]
//!   for batch runs, both wrapped in [`CoreEvent`]
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{BatchEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Batch(BatchEvent::Started {
//!         run_id: "run-1".to_string(),
//!         field: "cover_image".to_string(),
//!         total: 12,
//!     }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Batch(_)));
//! # }
//! ```
//!
//! Emitting with no subscribers returns an error; publishers in the engine
//! ignore it.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, SendError};

pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published and received through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Events from resolving a single query
    Resolution(ResolutionEvent),
    /// Events from batch runs
    Batch(BatchEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Resolution(e) => e.description(),
            CoreEvent::Batch(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Resolution(ResolutionEvent::SourceDisabled { .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::Batch(BatchEvent::RecordFailed { .. }) => EventSeverity::Error,
            CoreEvent::Resolution(ResolutionEvent::Resolved { .. }) => EventSeverity::Info,
            CoreEvent::Batch(BatchEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Batch(BatchEvent::Cancelled { .. }) => EventSeverity::Warning,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Resolution Events
// ============================================================================

/// Events emitted while resolving one query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum ResolutionEvent {
    /// A source was marked unusable for the rest of the run.
    SourceDisabled {
        run_id: String,
        source: String,
        reason: String,
    },
    /// A query was answered.
    Resolved {
        title: String,
        field: String,
        source: String,
        variant: String,
    },
    /// Every source and variant was tried without an accepted match.
    Exhausted {
        title: String,
        field: String,
        /// Number of outbound attempts made for the query
        attempts: u32,
    },
}

impl ResolutionEvent {
    fn description(&self) -> &str {
        match self {
            ResolutionEvent::SourceDisabled { .. } => "Source disabled for this run",
            ResolutionEvent::Resolved { .. } => "Metadata resolved",
            ResolutionEvent::Exhausted { .. } => "No source could resolve the query",
        }
    }
}

// ============================================================================
// Batch Events
// ============================================================================

/// Events emitted by batch runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum BatchEvent {
    Started {
        run_id: String,
        field: String,
        total: u64,
    },
    Progress {
        run_id: String,
        processed: u64,
        total: u64,
        found: u64,
        not_found: u64,
        failed: u64,
        percent: u8,
    },
    /// Persisting or resolving one record failed; the batch continues.
    RecordFailed {
        run_id: String,
        record_id: i64,
        message: String,
    },
    Completed {
        run_id: String,
        processed: u64,
        found: u64,
        not_found: u64,
        failed: u64,
        duration_ms: u64,
    },
    /// Stopped between two queries on request.
    Cancelled { run_id: String, processed: u64 },
}

impl BatchEvent {
    fn description(&self) -> &str {
        match self {
            BatchEvent::Started { .. } => "Batch started",
            BatchEvent::Progress { .. } => "Batch in progress",
            BatchEvent::RecordFailed { .. } => "Batch record failed",
            BatchEvent::Completed { .. } => "Batch completed",
            BatchEvent::Cancelled { .. } => "Batch cancelled",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel. Cloning shares the same channel.
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
    /// error if there are none.
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

/// A `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let batch_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Batch(_)));
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

    /// Only events matching `predicate` will be returned.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |f| f(event))
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

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
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

#[cfg(test)]
mod tests {
    use super::*;

    fn disabled(source: &str) -> CoreEvent {
        CoreEvent::Resolution(ResolutionEvent::SourceDisabled {
            run_id: "run-1".to_string(),
            source: source.to_string(),
            reason: "quota exhausted".to_string(),
        })
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(disabled("thegamesdb")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let event = disabled("thegamesdb");
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream =
            EventStream::new(bus.subscribe()).filter(|event| matches!(event, CoreEvent::Batch(_)));

        bus.emit(disabled("metacritic")).ok();
        let batch = CoreEvent::Batch(BatchEvent::Cancelled {
            run_id: "run-1".to_string(),
            processed: 3,
        });
        bus.emit(batch.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), batch);
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(CoreEvent::Batch(BatchEvent::Progress {
                run_id: "run-1".to_string(),
                processed: i,
                total: 5,
                found: i,
                not_found: 0,
                failed: 0,
                percent: (i * 20) as u8,
            }))
            .ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        assert_eq!(disabled("x").severity(), EventSeverity::Warning);

        let failed = CoreEvent::Batch(BatchEvent::RecordFailed {
            run_id: "run-1".to_string(),
            record_id: 7,
            message: "database is locked".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Error);

        let exhausted = CoreEvent::Resolution(ResolutionEvent::Exhausted {
            title: "Obscure Game".to_string(),
            field: "genre".to_string(),
            attempts: 6,
        });
        assert_eq!(exhausted.severity(), EventSeverity::Debug);
        assert_eq!(exhausted.description(), "No source could resolve the query");
    }

    #[test]
    fn test_event_serialization_shape() {
        let json = serde_json::to_value(disabled("thegamesdb")).unwrap();
        assert_eq!(json["type"], "Resolution");
        assert_eq!(json["payload"]["event"], "SourceDisabled");
        assert_eq!(json["payload"]["source"], "thegamesdb");
    }
}
