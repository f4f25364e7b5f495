//! Progress events for external observers.
//!
//! Front ends run the agent loop on a worker thread and watch progress (log
//! lines, the latest screenshot, the current URL) through this broadcast bus.
//! The loop publishes without knowing whether a consumer exists; publishing to
//! an empty bus is a no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Everything the agent loop reports while running a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentEvent {
    /// A new loop iteration began.
    IterationStarted {
        task_id: String,
        iteration: u32,
        timestamp: DateTime<Utc>,
    },

    /// The decision service answered.
    ModelResponded {
        task_id: String,
        latency_ms: u64,
        candidates: usize,
        timestamp: DateTime<Utc>,
    },

    /// One action proposal was dispatched.
    ActionDispatched {
        task_id: String,
        action: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A browser action returned fresh page state.
    ScreenshotCaptured {
        task_id: String,
        url: String,
        png: Vec<u8>,
        timestamp: DateTime<Utc>,
    },

    /// The decision service flagged an action for confirmation.
    SafetyConfirmationRequested {
        task_id: String,
        explanation: String,
        timestamp: DateTime<Utc>,
    },

    /// The loop ended normally.
    TaskCompleted {
        task_id: String,
        iterations: u32,
        final_reasoning: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// The loop ended with a recorded failure.
    TaskFailed {
        task_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub; slow consumers
/// drop old events rather than backpressuring the loop.
pub struct EventBus {
    sender: broadcast::Sender<Arc<AgentEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: AgentEvent) {
        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AgentEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
