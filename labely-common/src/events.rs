//! Event types for the Labely event system
//!
//! Events are broadcast in-process over a [`EventBus`] and forwarded to SSE
//! clients by the server's `/events` endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::Verdict;

/// Labely event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LabelyEvent {
    /// A labeler opened a new session
    SessionStarted {
        session_id: Uuid,
        user_id: String,
        dataset: String,
        task_limit: u32,
        timestamp: DateTime<Utc>,
    },

    /// A label was accepted, inside a session or through a direct endpoint
    LabelSubmitted {
        session_id: Option<Uuid>,
        user_id: String,
        dataset: String,
        item_id: u64,
        verdict: Verdict,
        timestamp: DateTime<Utc>,
    },

    /// Session reached its task limit and was flushed into the profile
    SessionCompleted {
        session_id: Uuid,
        user_id: String,
        elo_delta: i64,
        earned: i64,
        timestamp: DateTime<Utc>,
    },

    /// Session was reclaimed after sitting idle past the TTL
    SessionExpired {
        session_id: Uuid,
        user_id: String,
        tasks_completed: u32,
        timestamp: DateTime<Utc>,
    },
}

impl LabelyEvent {
    /// SSE `event:` name
    pub fn event_type(&self) -> &'static str {
        match self {
            LabelyEvent::SessionStarted { .. } => "SessionStarted",
            LabelyEvent::LabelSubmitted { .. } => "LabelSubmitted",
            LabelyEvent::SessionCompleted { .. } => "SessionCompleted",
            LabelyEvent::SessionExpired { .. } => "SessionExpired",
        }
    }
}

/// Broadcast channel for [`LabelyEvent`]s
///
/// Cloning the bus shares the underlying channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LabelyEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use labely_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<LabelyEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: LabelyEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
