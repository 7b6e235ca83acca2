//! State feed
//!
//! Fire-and-forget stream of state snapshots and messages for UI clients.
//! Delivery failures are logged and never abort a run.

use std::sync::Arc;

use serde::Serialize;
use futures::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::agent::state::ConversationState;
use crate::core::{Message, Result};

/// An event published while a run executes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FeedEvent {
    /// Full snapshot of a conversation
    State(ConversationState),
    /// A message produced by a node
    Message { thread_id: String, message: Message },
    /// The run suspended waiting for approval
    Interrupted { thread_id: String, node: String },
}

impl FeedEvent {
    pub fn thread_id(&self) -> &str {
        match self {
            FeedEvent::State(state) => &state.thread_id,
            FeedEvent::Message { thread_id, .. } | FeedEvent::Interrupted { thread_id, .. } => {
                thread_id
            }
        }
    }
}

/// A sink for feed events
pub trait StateSubscriber: Send + Sync {
    fn emit(&self, event: &FeedEvent) -> Result<()>;
}

/// Publishes feed events to broadcast receivers and registered subscribers
#[derive(Clone)]
pub struct StateFeed {
    sender: broadcast::Sender<FeedEvent>,
    subscribers: Vec<Arc<dyn StateSubscriber>>,
}

impl StateFeed {
    /// Receivers lagging more than `capacity` events lose the oldest ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            subscribers: Vec::new(),
        }
    }

    pub fn with_subscriber(mut self, subscriber: Arc<dyn StateSubscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.sender.subscribe()
    }

    /// Events for one thread as a stream; lagged events are skipped
    pub fn stream(&self, thread_id: impl Into<String>) -> impl Stream<Item = FeedEvent> {
        let thread_id = thread_id.into();
        BroadcastStream::new(self.sender.subscribe()).filter_map(move |event| match event {
            Ok(event) if event.thread_id() == thread_id => Some(event),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %e, "state feed receiver lagged");
                None
            }
        })
    }

    pub fn publish(&self, event: FeedEvent) {
        for subscriber in &self.subscribers {
            if let Err(e) = subscriber.emit(&event) {
                tracing::warn!(thread = event.thread_id(), error = %e, "state subscriber failed");
            }
        }
        // no receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn emit_state(&self, state: &ConversationState) {
        self.publish(FeedEvent::State(state.clone()));
    }

    pub fn emit_message(&self, state: &ConversationState, message: &Message) {
        self.publish(FeedEvent::Message {
            thread_id: state.thread_id.clone(),
            message: message.clone(),
        });
    }
}

impl Default for StateFeed {
    fn default() -> Self {
        Self::new(64)
    }
}
