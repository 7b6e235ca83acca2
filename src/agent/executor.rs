//! Graph executor
//!
//! Drives a conversation through the agent graph one node at a time,
//! checkpointing after every node. A run ends when the router returns END,
//! suspends after an interrupt node, or fails. Non-protocol failures are
//! reported back into the conversation and leave the last checkpoint in
//! place so the run can be retried; protocol violations fail loudly.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::Instrument;

use crate::agent::checkpoint::{Checkpoint, Checkpointer};
use crate::agent::feed::FeedEvent;
use crate::agent::graph::{Edge, GraphSpec, Node};
use crate::agent::nodes::perform::{APPROVED, CANCEL};
use crate::agent::nodes::{run_node, NodeContext};
use crate::agent::router::{route, Step};
use crate::agent::state::ConversationState;
use crate::core::config::AgentConfig;
use crate::core::{EventflowError, Message, Result, ToolCall};

/// Signal that continues a suspended run
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeDecision {
    Approve,
    Cancel,
    /// Answer the proposed call with an arbitrary tool result
    ToolResult { call_id: String, content: String },
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    /// The router returned END
    Completed,
    /// Suspended after `node`, waiting for a decision on `call`
    Interrupted { node: Node, call: ToolCall },
    /// `node` failed; the error was appended as an AI message
    Failed { node: Node, error: String },
}

/// Result of driving a thread
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: ConversationState,
    pub status: RunStatus,
    /// Nodes executed by this run
    pub steps: usize,
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self.status, RunStatus::Interrupted { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, RunStatus::Failed { .. })
    }

    /// The call awaiting approval
    pub fn pending_call(&self) -> Option<&ToolCall> {
        match &self.status {
            RunStatus::Interrupted { call, .. } => Some(call),
            _ => None,
        }
    }

    /// Content of the last AI message
    pub fn reply(&self) -> Option<&str> {
        self.state
            .messages()
            .iter()
            .rev()
            .find(|m| matches!(m, Message::Ai { .. }))
            .map(|m| m.content())
    }
}

/// Runs agent graphs against a checkpoint store
pub struct GraphExecutor {
    ctx: NodeContext,
    checkpointer: Arc<dyn Checkpointer>,
    max_steps: usize,
    interrupt_ttl: Option<Duration>,
}

impl GraphExecutor {
    pub fn new(ctx: NodeContext, checkpointer: Arc<dyn Checkpointer>, config: &AgentConfig) -> Self {
        Self {
            ctx,
            checkpointer,
            max_steps: config.max_steps,
            interrupt_ttl: config.interrupt_ttl_secs.map(Duration::from_secs),
        }
    }

    pub fn context(&self) -> &NodeContext {
        &self.ctx
    }

    pub fn checkpointer(&self) -> &Arc<dyn Checkpointer> {
        &self.checkpointer
    }

    /// Run from the entry node
    pub async fn run(&self, state: ConversationState) -> Result<RunOutcome> {
        let graph = GraphSpec::for_agent(state.agent);
        let step = self
            .checkpointer
            .get(&state.thread_id)
            .await?
            .map(|cp| cp.step)
            .unwrap_or(0);
        self.run_from(state, graph.entry, step).await
    }

    /// Continue a suspended run.
    ///
    /// The decision becomes the tool result answering the proposed call;
    /// an expired interrupt is treated as a cancellation.
    pub async fn resume(&self, thread_id: &str, decision: ResumeDecision) -> Result<RunOutcome> {
        let checkpoint = self
            .checkpointer
            .get(thread_id)
            .await?
            .ok_or_else(|| EventflowError::UnknownThread(thread_id.to_string()))?;
        let interrupt = checkpoint
            .interrupt
            .clone()
            .ok_or_else(|| EventflowError::NotInterrupted(thread_id.to_string()))?;

        let mut state = checkpoint.state;
        let call = state.pending_call().cloned().ok_or_else(|| {
            EventflowError::protocol("interrupted thread has no proposed tool call")
        })?;

        let expired = self.interrupt_ttl.is_some_and(|ttl| {
            (Utc::now() - interrupt.interrupted_at)
                .to_std()
                .map(|age| age > ttl)
                .unwrap_or(false)
        });

        let (call_id, content) = match decision {
            _ if expired => {
                tracing::info!(thread = thread_id, "approval expired, cancelling");
                (call.call_id.clone(), CANCEL.to_string())
            }
            ResumeDecision::Approve => (call.call_id.clone(), APPROVED.to_string()),
            ResumeDecision::Cancel => (call.call_id.clone(), CANCEL.to_string()),
            ResumeDecision::ToolResult { call_id, content } => {
                // rejected before anything is saved so the interrupt stays pending
                if call_id != call.call_id {
                    return Err(EventflowError::protocol(format!(
                        "tool result '{}' does not answer the proposed call '{}'",
                        call_id, call.call_id
                    )));
                }
                (call_id, content)
            }
        };

        let cancelled = content == CANCEL;
        tracing::info!(
            thread = thread_id,
            after = interrupt.after.name(state.agent),
            cancelled,
            "resuming"
        );

        let gate = Message::tool_result(call_id, content);
        state.append(gate.clone())?;
        self.ctx.feed.emit_message(&state, &gate);

        let next = match checkpoint.next {
            Some(node) => node,
            None => return Err(EventflowError::protocol("interrupt without a next node")),
        };
        self.run_from(state, next, checkpoint.step).await
    }

    /// Re-run the node a failed run stopped at
    pub async fn retry(&self, thread_id: &str) -> Result<RunOutcome> {
        let checkpoint = self
            .checkpointer
            .get(thread_id)
            .await?
            .ok_or_else(|| EventflowError::UnknownThread(thread_id.to_string()))?;

        if checkpoint.is_interrupted() {
            return Err(EventflowError::AwaitingApproval(thread_id.to_string()));
        }

        match checkpoint.next {
            Some(node) => {
                tracing::info!(thread = thread_id, node = node.name(checkpoint.state.agent), "retrying");
                self.run_from(checkpoint.state, node, checkpoint.step).await
            }
            None => Ok(RunOutcome {
                state: checkpoint.state,
                status: RunStatus::Completed,
                steps: 0,
            }),
        }
    }

    async fn run_from(
        &self,
        mut state: ConversationState,
        start: Node,
        mut step: u64,
    ) -> Result<RunOutcome> {
        let graph = GraphSpec::for_agent(state.agent);
        let agent = state.agent;
        let mut current = Step::Node(start);
        let mut executed = 0usize;

        self.save(Checkpoint::new(state.clone(), Some(start), step))
            .await?;

        loop {
            let node = match current {
                Step::End => {
                    self.save(Checkpoint::new(state.clone(), None, step)).await?;
                    self.ctx.feed.emit_state(&state);
                    tracing::debug!(thread = %state.thread_id, steps = executed, "run completed");
                    return Ok(RunOutcome {
                        state,
                        status: RunStatus::Completed,
                        steps: executed,
                    });
                }
                Step::Node(node) => node,
            };

            if !graph.contains(node) {
                return Err(EventflowError::protocol(format!(
                    "{} graph has no node {}",
                    agent,
                    node.name(agent)
                )));
            }

            if executed >= self.max_steps {
                let error = EventflowError::StepLimit(self.max_steps);
                return Ok(self.fail(state, node, error, executed));
            }

            let span = tracing::info_span!("node", thread = %state.thread_id, node = node.name(agent));
            let mut working = state.clone();
            match run_node(&self.ctx, node, &mut working).instrument(span).await {
                Ok(()) => {}
                Err(e) if e.is_protocol() => {
                    tracing::error!(thread = %state.thread_id, node = node.name(agent), error = %e, "protocol violation");
                    return Err(e);
                }
                Err(e) => return Ok(self.fail(state, node, e, executed)),
            }

            state = working;
            state.version += 1;
            executed += 1;
            step += 1;

            let next = match graph.edge(node) {
                Some(Edge::To(next)) => Step::Node(next),
                Some(Edge::Route) => route(&state),
                None => Step::End,
            };
            tracing::debug!(
                from = node.name(agent),
                to = next.node().map(|n| n.name(agent)).unwrap_or("END"),
                "transition"
            );

            if graph.interrupts_after(node) {
                let call = state.pending_call().cloned().ok_or_else(|| {
                    EventflowError::protocol(format!(
                        "{} suspended without a proposed tool call",
                        node.name(agent)
                    ))
                })?;
                self.save(Checkpoint::new(state.clone(), next.node(), step).interrupted(node))
                    .await?;
                self.ctx.feed.publish(FeedEvent::Interrupted {
                    thread_id: state.thread_id.clone(),
                    node: node.name(agent).to_string(),
                });
                tracing::info!(thread = %state.thread_id, node = node.name(agent), tool = %call.name, "interrupted");
                return Ok(RunOutcome {
                    state,
                    status: RunStatus::Interrupted { node, call },
                    steps: executed,
                });
            }

            self.save(Checkpoint::new(state.clone(), next.node(), step))
                .await?;
            current = next;
        }
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<()> {
        self.checkpointer.put(&checkpoint).await
    }

    /// Report a failure without touching the checkpoint.
    ///
    /// The returned state is the last good state plus an AI message
    /// describing the failure.
    fn fail(
        &self,
        mut state: ConversationState,
        node: Node,
        error: EventflowError,
        steps: usize,
    ) -> RunOutcome {
        tracing::warn!(
            thread = %state.thread_id,
            node = node.name(state.agent),
            error = %error,
            "run failed"
        );

        let message = Message::ai(format!("Sorry, something went wrong: {}", error));
        if state.append(message.clone()).is_ok() {
            self.ctx.feed.emit_message(&state, &message);
        }

        RunOutcome {
            state,
            status: RunStatus::Failed {
                node,
                error: error.to_string(),
            },
            steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::checkpoint::MemoryCheckpointer;
    use crate::agent::state::SessionContext;
    use crate::agent::AgentKind;
    use crate::core::Config;
    use crate::llm::ScriptedCompletion;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn executor_with(
        script: Arc<ScriptedCompletion>,
        configure: impl FnOnce(&mut AgentConfig),
    ) -> (GraphExecutor, Arc<MemoryCheckpointer>) {
        let mut config = Config::default();
        config.agent.max_steps = 25;
        config.agent.interrupt_ttl_secs = None;
        configure(&mut config.agent);
        let checkpoints = Arc::new(MemoryCheckpointer::new());
        let ctx = NodeContext::new(script, Arc::new(MemoryStore::new()), &config);
        (
            GraphExecutor::new(ctx, checkpoints.clone(), &config.agent),
            checkpoints,
        )
    }

    fn executor(script: Arc<ScriptedCompletion>) -> (GraphExecutor, Arc<MemoryCheckpointer>) {
        executor_with(script, |_| {})
    }

    fn asking(text: &str) -> ConversationState {
        let mut state =
            ConversationState::new("t1", AgentKind::Food, SessionContext::new("e1", "u1"));
        state.append(Message::human(text)).unwrap();
        state
    }

    #[tokio::test]
    async fn test_plain_reply_completes() {
        let script = Arc::new(ScriptedCompletion::new());
        script.push_reply("Hi! How can I help with the menu?");
        let (executor, checkpoints) = executor(script);

        let outcome = executor.run(asking("hello")).await.unwrap();
        assert!(outcome.is_completed());
        assert_eq!(outcome.steps, 1);
        assert_eq!(outcome.state.version, 1);

        let cp = checkpoints.get("t1").await.unwrap().unwrap();
        assert_eq!(cp.next, None);
        assert_eq!(cp.step, 1);
    }

    #[tokio::test]
    async fn test_step_limit_fails_run() {
        let script = Arc::new(ScriptedCompletion::new());
        for _ in 0..5 {
            script.push_tool_call("search_for_food", json!({"query": "soup"}));
            script.push_structured(json!({"items": []}));
        }
        let (executor, _) = executor_with(script, |agent| agent.max_steps = 3);

        let outcome = executor.run(asking("soup forever")).await.unwrap();
        assert!(outcome.is_failed());
        assert_eq!(outcome.steps, 3);
        assert!(outcome.reply().unwrap().contains("Step limit"));
    }

    #[tokio::test]
    async fn test_resume_requires_interrupt() {
        let script = Arc::new(ScriptedCompletion::new());
        script.push_reply("hello");
        let (executor, _) = executor(script);

        assert!(matches!(
            executor.resume("t1", ResumeDecision::Approve).await,
            Err(EventflowError::UnknownThread(_))
        ));

        executor.run(asking("hi")).await.unwrap();
        assert!(matches!(
            executor.resume("t1", ResumeDecision::Approve).await,
            Err(EventflowError::NotInterrupted(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_interrupt_cancels() {
        let script = Arc::new(ScriptedCompletion::new());
        script.push_tool_call(
            "add_foods",
            json!({"foods": [{"name": "Soup", "type": "starter"}]}),
        );
        script.push_reply("Okay, nothing was added.");
        let (executor, _) = executor_with(script, |agent| agent.interrupt_ttl_secs = Some(0));

        let outcome = executor.run(asking("add soup")).await.unwrap();
        assert!(outcome.is_interrupted());

        tokio::time::sleep(Duration::from_millis(5)).await;
        let outcome = executor
            .resume("t1", ResumeDecision::Approve)
            .await
            .unwrap();
        assert!(outcome.is_completed());
        assert!(outcome
            .state
            .messages()
            .iter()
            .any(|m| m.content() == "Cancelled the food operation."));
        assert!(outcome.state.foods.is_empty());
    }

    #[tokio::test]
    async fn test_mismatched_resume_keeps_interrupt() {
        let script = Arc::new(ScriptedCompletion::new());
        script.push_tool_calls(vec![
            ("add_foods", json!({"foods": [{"name": "Soup", "type": "starter"}]})),
            ("add_foods", json!({"foods": [{"name": "Cake", "type": "dessert"}]})),
        ]);
        let (executor, checkpoints) = executor(script.clone());
        let outcome = executor.run(asking("add soup and cake")).await.unwrap();
        let second = outcome.state.last_message().unwrap().tool_calls()[1]
            .call_id
            .clone();

        let err = executor
            .resume(
                "t1",
                ResumeDecision::ToolResult {
                    call_id: second,
                    content: APPROVED.into(),
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_protocol());

        let saved = checkpoints.get("t1").await.unwrap().unwrap();
        assert!(saved.is_interrupted());
        assert_eq!(saved.state, outcome.state);

        script.push_reply("Soup is on the menu.");
        let outcome = executor.resume("t1", ResumeDecision::Approve).await.unwrap();
        assert!(outcome.is_completed());
        assert_eq!(outcome.state.foods.len(), 1);
    }
}
