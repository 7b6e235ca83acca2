//! Agent service - per-thread entry point for clients
//!
//! Owns the executor and makes sure a thread is driven by at most one run
//! at a time.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use futures::Stream;
use tokio::sync::broadcast;

use crate::agent::checkpoint::{Checkpoint, Checkpointer, FileCheckpointer, MemoryCheckpointer};
use crate::agent::executor::{GraphExecutor, ResumeDecision, RunOutcome};
use crate::agent::feed::FeedEvent;
use crate::agent::nodes::NodeContext;
use crate::agent::state::{ConversationState, SessionContext};
use crate::agent::AgentKind;
use crate::core::{Config, EventflowError, Message, Result};
use crate::llm::CompletionAdapter;
use crate::store::DocumentStore;

/// Tool result recorded for calls a failed run never answered
const NOT_RUN: &str = "Not run: the previous run did not finish.";

/// Conversation threads served over one set of collaborators
pub struct AgentService {
    executor: GraphExecutor,
    leases: Arc<Mutex<HashSet<String>>>,
}

/// Exclusive right to drive a thread; released on drop
struct ThreadLease {
    leases: Arc<Mutex<HashSet<String>>>,
    thread_id: String,
}

impl Drop for ThreadLease {
    fn drop(&mut self) {
        if let Ok(mut leases) = self.leases.lock() {
            leases.remove(&self.thread_id);
        }
    }
}

impl AgentService {
    pub fn new(executor: GraphExecutor) -> Self {
        Self {
            executor,
            leases: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Wire up a service from configuration; checkpoints go to
    /// `checkpoint.dir` when set, otherwise they live in memory
    pub fn from_config(
        config: &Config,
        completion: Arc<dyn CompletionAdapter>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        let checkpointer: Arc<dyn Checkpointer> = match &config.checkpoint.dir {
            Some(dir) => Arc::new(FileCheckpointer::new(dir.clone())),
            None => Arc::new(MemoryCheckpointer::new()),
        };
        let ctx = NodeContext::new(completion, store, config);
        Self::new(GraphExecutor::new(ctx, checkpointer, &config.agent))
    }

    pub fn executor(&self) -> &GraphExecutor {
        &self.executor
    }

    fn lease(&self, thread_id: &str) -> Result<ThreadLease> {
        let mut leases = self
            .leases
            .lock()
            .map_err(|_| EventflowError::Other("thread lease lock poisoned".into()))?;
        if !leases.insert(thread_id.to_string()) {
            return Err(EventflowError::ThreadBusy(thread_id.to_string()));
        }
        Ok(ThreadLease {
            leases: self.leases.clone(),
            thread_id: thread_id.to_string(),
        })
    }

    async fn checkpoint(&self, thread_id: &str) -> Result<Checkpoint> {
        self.executor
            .checkpointer()
            .get(thread_id)
            .await?
            .ok_or_else(|| EventflowError::UnknownThread(thread_id.to_string()))
    }

    /// Open a thread, or return it unchanged if it already exists
    pub async fn start(
        &self,
        thread_id: &str,
        agent: AgentKind,
        session: SessionContext,
    ) -> Result<ConversationState> {
        let _lease = self.lease(thread_id)?;
        let checkpointer = self.executor.checkpointer();

        if let Some(existing) = checkpointer.get(thread_id).await? {
            if existing.state.agent != agent {
                return Err(EventflowError::Other(format!(
                    "thread '{}' belongs to the {} agent",
                    thread_id, existing.state.agent
                )));
            }
            return Ok(existing.state);
        }

        let state = ConversationState::new(thread_id, agent, session);
        checkpointer
            .put(&Checkpoint::new(state.clone(), None, 0))
            .await?;
        tracing::info!(thread = thread_id, agent = %agent, "thread started");
        Ok(state)
    }

    /// Append a human message and run the graph
    pub async fn send(&self, thread_id: &str, text: &str) -> Result<RunOutcome> {
        let _lease = self.lease(thread_id)?;
        let checkpoint = self.checkpoint(thread_id).await?;
        if checkpoint.is_interrupted() {
            return Err(EventflowError::AwaitingApproval(thread_id.to_string()));
        }

        let mut state = checkpoint.state;
        let tools = &self.executor.context().tools;
        for call in state.unanswered_calls() {
            // the food graph ends on undeclared tools without answering them
            let content = match tools.intent(state.agent, &call.name) {
                Some(_) => NOT_RUN.to_string(),
                None => format!("Unknown tool: {}", call.name),
            };
            state.append(Message::tool_result(call.call_id, content))?;
        }
        state.append(Message::human(text))?;
        self.executor.run(state).await
    }

    /// Continue a run suspended for approval
    pub async fn resume(&self, thread_id: &str, decision: ResumeDecision) -> Result<RunOutcome> {
        let _lease = self.lease(thread_id)?;
        self.executor.resume(thread_id, decision).await
    }

    /// Re-run from the last checkpoint after a failed run
    pub async fn retry(&self, thread_id: &str) -> Result<RunOutcome> {
        let _lease = self.lease(thread_id)?;
        self.executor.retry(thread_id).await
    }

    /// Clear the transcript; any pending approval is dropped
    pub async fn reset(&self, thread_id: &str) -> Result<ConversationState> {
        let _lease = self.lease(thread_id)?;
        let checkpoint = self.checkpoint(thread_id).await?;
        let mut state = checkpoint.state;
        state.reset();
        self.executor
            .checkpointer()
            .put(&Checkpoint::new(state.clone(), None, checkpoint.step))
            .await?;
        self.executor.context().feed.emit_state(&state);
        Ok(state)
    }

    /// Latest checkpointed state of a thread
    pub async fn snapshot(&self, thread_id: &str) -> Result<Option<ConversationState>> {
        Ok(self
            .executor
            .checkpointer()
            .get(thread_id)
            .await?
            .map(|cp| cp.state))
    }

    /// Whether the thread waits for an approval decision
    pub async fn is_interrupted(&self, thread_id: &str) -> Result<bool> {
        Ok(self
            .executor
            .checkpointer()
            .get(thread_id)
            .await?
            .is_some_and(|cp| cp.is_interrupted()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.executor.context().feed.subscribe()
    }

    /// Feed events of one thread
    pub fn stream(&self, thread_id: &str) -> impl Stream<Item = FeedEvent> {
        self.executor.context().feed.stream(thread_id.to_string())
    }
}
