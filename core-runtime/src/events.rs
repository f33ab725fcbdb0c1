//! # Event Bus System
//!
//! Provides an event-driven architecture for the lyrics pipeline using `tokio::sync::broadcast`.
//! The task queue and the directory watcher publish typed events here so that
//! callers, tests and metrics can observe outcomes without parsing logs.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: `TaskEvent` for queue lifecycle, `WatcherEvent` for filesystem activity
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     emit      ┌───────────┐
//! │  Watcher    ├──────────────>│           │     subscribe    ┌────────────┐
//! └─────────────┘               │ EventBus  ├─────────────────>│ Subscriber │
//!                               │ (broadcast│                  └────────────┘
//! ┌─────────────┐     emit      │  channel) │     subscribe    ┌────────────┐
//! │ Task Queue  ├──────────────>│           ├─────────────────>│ Subscriber │
//! └─────────────┘               └───────────┘                  └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, TaskEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Task(TaskEvent::Revoked {
//!         task_type: "lyrics:download".to_string(),
//!         task_id: "/music/a/song.flac".to_string(),
//!         reason: "lyrics already present".to_string(),
//!     }))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Task(TaskEvent::Revoked { .. })));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! `emit` fails only when nobody is subscribed. Publishers treat that as a
//! no-op (`.ok()`). Subscribers that fall behind receive `RecvError::Lagged`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export for convenience
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus.
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
    /// Task queue lifecycle events
    Task(TaskEvent),
    /// Directory watcher events
    Watcher(WatcherEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Task(e) => e.description(),
            CoreEvent::Watcher(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Task(TaskEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Watcher(WatcherEvent::SourceError { .. }) => EventSeverity::Warning,
            CoreEvent::Task(TaskEvent::Skipped { .. }) => EventSeverity::Warning,
            CoreEvent::Task(TaskEvent::Succeeded { .. }) => EventSeverity::Info,
            CoreEvent::Task(TaskEvent::Revoked { .. }) => EventSeverity::Info,
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
// Task Events
// ============================================================================

/// Events emitted by the task queue as tasks move through their lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum TaskEvent {
    /// Task accepted into the queue.
    Submitted {
        task_type: String,
        task_id: String,
    },
    /// A worker claimed the task and invoked its handler.
    Started {
        task_type: String,
        task_id: String,
        /// Executions completed before this one.
        attempts: u32,
    },
    /// The handler did its work.
    Succeeded {
        task_type: String,
        task_id: String,
    },
    /// The input could not be processed. Never retried.
    Skipped {
        task_type: String,
        task_id: String,
        reason: String,
    },
    /// The task was already satisfied or no longer applicable.
    Revoked {
        task_type: String,
        task_id: String,
        reason: String,
    },
    /// Transient failure; the task is rescheduled.
    Retrying {
        task_type: String,
        task_id: String,
        attempts: u32,
        retry_at: DateTime<Utc>,
        error: String,
    },
    /// Retries exhausted.
    Failed {
        task_type: String,
        task_id: String,
        attempts: u32,
        error: String,
    },
}

impl TaskEvent {
    fn description(&self) -> &str {
        match self {
            TaskEvent::Submitted { .. } => "Task submitted",
            TaskEvent::Started { .. } => "Task started",
            TaskEvent::Succeeded { .. } => "Task succeeded",
            TaskEvent::Skipped { .. } => "Task skipped",
            TaskEvent::Revoked { .. } => "Task revoked",
            TaskEvent::Retrying { .. } => "Task scheduled for retry",
            TaskEvent::Failed { .. } => "Task failed permanently",
        }
    }

    /// Identifier of the task this event refers to.
    pub fn task_id(&self) -> &str {
        match self {
            TaskEvent::Submitted { task_id, .. }
            | TaskEvent::Started { task_id, .. }
            | TaskEvent::Succeeded { task_id, .. }
            | TaskEvent::Skipped { task_id, .. }
            | TaskEvent::Revoked { task_id, .. }
            | TaskEvent::Retrying { task_id, .. }
            | TaskEvent::Failed { task_id, .. } => task_id,
        }
    }

    /// True for events after which the task will never run again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskEvent::Succeeded { .. }
                | TaskEvent::Skipped { .. }
                | TaskEvent::Revoked { .. }
                | TaskEvent::Failed { .. }
        )
    }
}

// ============================================================================
// Watcher Events
// ============================================================================

/// Events emitted by the directory watcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum WatcherEvent {
    /// A directory was added to the watched set.
    DirectoryWatched { path: String },
    /// A filesystem change was classified and dispatched.
    FileObserved {
        /// `created`, `written`, `removed`, `renamed` or `permission_changed`.
        kind: String,
        path: String,
    },
    /// The notification source reported an error.
    SourceError { message: String },
}

impl WatcherEvent {
    fn description(&self) -> &str {
        match self {
            WatcherEvent::DirectoryWatched { .. } => "Directory watched",
            WatcherEvent::FileObserved { .. } => "File change observed",
            WatcherEvent::SourceError { .. } => "Watcher source error",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{EventBus, CoreEvent, TaskEvent};
///
/// # #[tokio::main]
/// # async fn main() {
/// let event_bus = EventBus::new(100);
///
/// // Subscribe to events
/// let mut subscriber1 = event_bus.subscribe();
/// let mut subscriber2 = event_bus.subscribe();
///
/// // Emit an event
/// let event = CoreEvent::Task(TaskEvent::Submitted {
///     task_type: "lyrics:download".to_string(),
///     task_id: "/music/a/song.flac".to_string(),
/// });
/// event_bus.emit(event).ok();
///
/// // Both subscribers receive the event
/// # tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
/// # }
/// ```
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    ///   When a subscriber falls behind by more than this amount, it will
    ///   receive a `RecvError::Lagged` error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use core_runtime::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    ///
    /// # Example
    ///
    /// ```rust
    /// use core_runtime::events::EventBus;
    ///
    /// let event_bus = EventBus::default();
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// Returns an error if there are no active subscribers.
    ///
    /// # Example
    ///
    /// ```rust
    /// use core_runtime::events::{EventBus, CoreEvent, TaskEvent};
    ///
    /// let event_bus = EventBus::new(100);
    /// let event = CoreEvent::Task(TaskEvent::Submitted {
    ///     task_type: "lyrics:download".to_string(),
    ///     task_id: "/music/a/song.flac".to_string(),
    /// });
    ///
    /// match event_bus.emit(event) {
    ///     Ok(n) => println!("Event sent to {} subscribers", n),
    ///     Err(_) => println!("No active subscribers"),
    /// }
    /// ```
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all future events.
    /// Past events are not replayed.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use core_runtime::events::EventBus;
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let event_bus = EventBus::new(100);
    /// let mut subscriber = event_bus.subscribe();
    ///
    /// tokio::spawn(async move {
    ///     while let Ok(event) = subscriber.recv().await {
    ///         println!("Received: {:?}", event);
    ///     }
    /// });
    /// # }
    /// ```
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    ///
    /// # Example
    ///
    /// ```rust
    /// use core_runtime::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.subscriber_count(), 0);
    ///
    /// let _subscriber = event_bus.subscribe();
    /// assert_eq!(event_bus.subscriber_count(), 1);
    /// ```
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
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

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with additional filtering capabilities.
///
/// This provides a more ergonomic API for consuming events with optional filtering
/// by event type or severity.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream, CoreEvent};
///
/// # #[tokio::main]
/// # async fn main() {
/// let event_bus = EventBus::new(100);
/// let stream = EventStream::new(event_bus.subscribe());
///
/// // Filter for watcher events only
/// let mut watcher_stream = stream.filter(|event| {
///     matches!(event, CoreEvent::Watcher(_))
/// });
/// # }
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter will be returned by `recv()`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use core_runtime::events::{EventBus, EventStream, CoreEvent};
    ///
    /// let event_bus = EventBus::new(100);
    /// let stream = EventStream::new(event_bus.subscribe());
    ///
    /// let task_stream = stream.filter(|event| {
    ///     matches!(event, CoreEvent::Task(_))
    /// });
    /// ```
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// This will skip events that don't match the filter and return the next matching event.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }

        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                            let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                            if filter(&event) {
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

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn submitted(id: &str) -> CoreEvent {
        CoreEvent::Task(TaskEvent::Submitted {
            task_type: "lyrics:download".to_string(),
            task_id: id.to_string(),
        })
    }

    #[tokio::test]
    async fn test_event_bus_creation() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(submitted("/music/a.flac")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = submitted("/music/a.flac");
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream =
            EventStream::new(bus.subscribe()).filter(|e| matches!(e, CoreEvent::Watcher(_)));

        bus.emit(submitted("/music/a.flac")).ok();
        let watcher_event = CoreEvent::Watcher(WatcherEvent::DirectoryWatched {
            path: "/music/new".to_string(),
        });
        bus.emit(watcher_event.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), watcher_event);
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(submitted(&format!("/music/{}.flac", i))).ok();
        }

        let result = sub.recv().await;
        assert!(matches!(result, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let failed = CoreEvent::Task(TaskEvent::Failed {
            task_type: "lyrics:download".to_string(),
            task_id: "/music/a.flac".to_string(),
            attempts: 10,
            error: "not found".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Error);

        let revoked = CoreEvent::Task(TaskEvent::Revoked {
            task_type: "lyrics:download".to_string(),
            task_id: "/music/a.flac".to_string(),
            reason: "satisfied".to_string(),
        });
        assert_eq!(revoked.severity(), EventSeverity::Info);
        assert_eq!(submitted("/x").severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_task_event_helpers() {
        let event = TaskEvent::Skipped {
            task_type: "lyrics:download".to_string(),
            task_id: "/music/notes.txt".to_string(),
            reason: "not audio".to_string(),
        };
        assert_eq!(event.task_id(), "/music/notes.txt");
        assert!(event.is_terminal());
        assert_eq!(CoreEvent::Task(event).description(), "Task skipped");
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Task(TaskEvent::Retrying {
            task_type: "lyrics:download".to_string(),
            task_id: "/music/a.flac".to_string(),
            attempts: 1,
            retry_at: Utc::now(),
            error: "HTTP 503".to_string(),
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("Retrying"));

        let deserialized: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_try_recv_with_event() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());

        let event = CoreEvent::Watcher(WatcherEvent::FileObserved {
            kind: "created".to_string(),
            path: "/music/a.flac".to_string(),
        });
        bus.emit(event.clone()).ok();

        let received = stream.try_recv().unwrap().unwrap();
        assert_eq!(received, event);
    }
}
