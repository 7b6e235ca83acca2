//! Graph nodes
//!
//! Each node reads the conversation state, talks to at most one
//! collaborator and appends its result. Nodes never pick their successor;
//! the graph edges and the router do.

pub mod chat;
pub mod perform;
pub mod search;
pub mod summary;

pub use perform::PerformReport;

use std::sync::Arc;

use crate::agent::feed::StateFeed;
use crate::agent::graph::Node;
use crate::agent::state::ConversationState;
use crate::agent::AgentKind;
use crate::core::{Config, EventflowError, Message, Result, ToolCall};
use crate::core::config::ModelConfig;
use crate::llm::CompletionAdapter;
use crate::store::DocumentStore;
use crate::tools::ToolRegistry;

/// Collaborators shared by all nodes
#[derive(Clone)]
pub struct NodeContext {
    pub completion: Arc<dyn CompletionAdapter>,
    pub store: Arc<dyn DocumentStore>,
    pub feed: StateFeed,
    pub tools: Arc<ToolRegistry>,
    pub models: ModelConfig,
    food_prompt: Option<String>,
    license_prompt: Option<String>,
}

impl NodeContext {
    pub fn new(
        completion: Arc<dyn CompletionAdapter>,
        store: Arc<dyn DocumentStore>,
        config: &Config,
    ) -> Self {
        Self {
            completion,
            store,
            feed: StateFeed::new(config.feed.capacity),
            tools: Arc::new(ToolRegistry::new()),
            models: config.models.clone(),
            food_prompt: config.agent.food_prompt.clone(),
            license_prompt: config.agent.license_prompt.clone(),
        }
    }

    pub fn system_prompt(&self, agent: AgentKind) -> &str {
        let custom = match agent {
            AgentKind::Food => self.food_prompt.as_deref(),
            AgentKind::License => self.license_prompt.as_deref(),
        };
        custom.unwrap_or_else(|| agent.default_prompt())
    }

    /// Append a message and publish it
    pub(crate) fn append(&self, state: &mut ConversationState, message: Message) -> Result<()> {
        state.append(message.clone())?;
        self.feed.emit_message(state, &message);
        Ok(())
    }
}

/// Execute one node against the state
pub async fn run_node(ctx: &NodeContext, node: Node, state: &mut ConversationState) -> Result<()> {
    match node {
        Node::Chat => chat::chat_node(ctx, state).await,
        Node::Search => search::search_node(ctx, state).await,
        Node::Propose => perform::propose_node(ctx, state).await,
        Node::Perform => {
            let report = perform::perform_node(ctx, state).await?;
            if report.is_partial() {
                tracing::warn!(
                    thread = %state.thread_id,
                    ignored = ?report.ignored,
                    unknown = ?report.unknown,
                    "mutation honoured only part of the proposed tool calls"
                );
            }
            Ok(())
        }
        Node::Summary => summary::summary_node(ctx, state).await,
    }
}

/// The tool call a tool node answers: the first call of the last message
pub(crate) fn current_call(state: &ConversationState, node: &str) -> Result<ToolCall> {
    state.pending_call().cloned().ok_or_else(|| {
        EventflowError::protocol(format!(
            "{} expects the last message to be an AI message with a tool call",
            node
        ))
    })
}
