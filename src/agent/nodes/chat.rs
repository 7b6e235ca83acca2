//! Chat node - one completion with the agent's tools bound

use crate::agent::nodes::NodeContext;
use crate::agent::state::ConversationState;
use crate::core::{Message, Result};
use crate::llm::CompletionRequest;

pub async fn chat_node(ctx: &NodeContext, state: &mut ConversationState) -> Result<()> {
    // unknown calls and calls after the first arrive here unanswered;
    // answer them so the transcript stays well formed for the model
    for call in state.unanswered_calls() {
        let intent = ctx.tools.intent(state.agent, &call.name);
        let content = match intent {
            Some(_) => format!("Skipped {}: only the first tool call of a turn is run.", call.name),
            None => format!("Unknown tool: {}", call.name),
        };
        tracing::debug!(tool = %call.name, ?intent, "answering unhandled tool call");
        ctx.append(state, Message::tool_result(&call.call_id, content))?;
    }

    let mut messages = Vec::with_capacity(state.messages().len() + 1);
    messages.push(Message::system(ctx.system_prompt(state.agent)));
    messages.extend(state.messages().iter().cloned());

    let request = CompletionRequest::new(&ctx.models.chat, messages)
        .with_tools(ctx.tools.definitions_for(state.agent))
        .with_temperature(0.1);

    let completion = ctx.completion.complete(request).await?;
    if let Some(usage) = completion.usage() {
        tracing::debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "chat completion"
        );
    }
    let reply = completion.into_message()?;

    if reply.tool_calls().len() > 1 {
        tracing::debug!(
            calls = reply.tool_calls().len(),
            "model proposed several tool calls; only the first is acted on"
        );
    }

    ctx.append(state, reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::state::SessionContext;
    use crate::agent::AgentKind;
    use crate::core::{Config, Role, ToolCall};
    use crate::llm::ScriptedCompletion;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn setup(script: Arc<ScriptedCompletion>) -> NodeContext {
        NodeContext::new(script, Arc::new(MemoryStore::new()), &Config::default())
    }

    #[tokio::test]
    async fn test_chat_binds_agent_tools() {
        let script = Arc::new(ScriptedCompletion::new());
        script.push_reply("Hello! Which permits do you need?");
        let ctx = setup(script.clone());

        let mut state =
            ConversationState::new("t", AgentKind::License, SessionContext::new("e", "u"));
        state.append(Message::human("hi")).unwrap();
        chat_node(&ctx, &mut state).await.unwrap();

        let requests = script.requests();
        let request = &requests[0];
        assert_eq!(request.messages[0].role(), Role::System);
        assert_eq!(request.tools.len(), 2);
        assert_eq!(state.last_message().unwrap().role(), Role::Ai);
    }

    #[tokio::test]
    async fn test_chat_answers_unknown_calls_first() {
        let script = Arc::new(ScriptedCompletion::new());
        script.push_reply("I can't do that, but I can search for licenses.");
        let ctx = setup(script.clone());

        let mut state =
            ConversationState::new("t", AgentKind::License, SessionContext::new("e", "u"));
        state
            .append(Message::ai_with_tools(
                "",
                vec![ToolCall::new("book_venue", json!({}), "c1")],
            ))
            .unwrap();
        chat_node(&ctx, &mut state).await.unwrap();

        let messages = state.messages();
        assert_eq!(messages[1], Message::tool_result("c1", "Unknown tool: book_venue"));
        assert_eq!(messages[2].role(), Role::Ai);
    }

    #[tokio::test]
    async fn test_adapter_failure_propagates_without_append() {
        let script = Arc::new(ScriptedCompletion::new());
        script.push_error("model crashed");
        let ctx = setup(script);

        let mut state =
            ConversationState::new("t", AgentKind::Food, SessionContext::new("e", "u"));
        state.append(Message::human("hi")).unwrap();
        assert!(chat_node(&ctx, &mut state).await.is_err());
        assert_eq!(state.messages().len(), 1);
    }
}
