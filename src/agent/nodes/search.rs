//! Search node - answers a search tool call with structured results
//!
//! Progress is streamed in three snapshots: query pending, results filled
//! in, progress cleared. The results then land in the transcript as the
//! tool result.

use serde_json::Value;

use crate::agent::nodes::{current_call, NodeContext};
use crate::agent::state::{ConversationState, SearchProgress};
use crate::agent::AgentKind;
use crate::core::{Message, Result};
use crate::domain::{FoodList, LicenseList};
use crate::llm::{complete_structured, OutputSchema};

const FOOD_SEARCH_PROMPT: &str = "You suggest dishes for event menus. \
Return dishes matching the request. Use the course types main, starter or dessert, \
and a dietary class only when the dish clearly has one.";

const LICENSE_SEARCH_PROMPT: &str = "You identify the licenses and permits an event needs. \
For each, give the issuing authority, the expected cost, the documents required and any notes.";

pub async fn search_node(ctx: &NodeContext, state: &mut ConversationState) -> Result<()> {
    let call = current_call(state, "search_node")?;

    let query = match call.get_string("query").filter(|q| !q.trim().is_empty()) {
        Some(query) => query,
        None => {
            ctx.append(
                state,
                Message::tool_result(&call.call_id, "Search failed: missing 'query' argument"),
            )?;
            ctx.feed.emit_state(state);
            return Ok(());
        }
    };

    state.search_progress.push(SearchProgress::pending(&query));
    ctx.feed.emit_state(state);

    let outcome = match state.agent {
        AgentKind::Food => search_foods(ctx, &query).await,
        AgentKind::License => search_licenses(ctx, &query).await,
    };

    let content = match outcome {
        Ok(results) => {
            tracing::debug!(query = %query, results = results.len(), "search finished");
            if let Some(progress) = state.search_progress.last_mut() {
                progress.results = results.clone();
                progress.done = true;
            }
            ctx.feed.emit_state(state);
            serde_json::to_string(&results)?
        }
        Err(e) => {
            tracing::warn!(query = %query, error = %e, "search failed");
            format!("Search failed: {}", e)
        }
    };

    state.search_progress.clear();
    ctx.feed.emit_state(state);

    ctx.append(state, Message::tool_result(&call.call_id, content))?;
    ctx.feed.emit_state(state);
    Ok(())
}

async fn search_foods(ctx: &NodeContext, query: &str) -> Result<Vec<Value>> {
    let list: FoodList = complete_structured(
        ctx.completion.as_ref(),
        &ctx.models.search,
        vec![Message::system(FOOD_SEARCH_PROMPT), Message::human(query)],
        OutputSchema::of::<FoodList>("FoodList"),
    )
    .await?;

    list.into_results()
        .into_iter()
        .map(|r| serde_json::to_value(r).map_err(Into::into))
        .collect()
}

async fn search_licenses(ctx: &NodeContext, query: &str) -> Result<Vec<Value>> {
    let list: LicenseList = complete_structured(
        ctx.completion.as_ref(),
        &ctx.models.search,
        vec![Message::system(LICENSE_SEARCH_PROMPT), Message::human(query)],
        OutputSchema::of::<LicenseList>("LicenseList"),
    )
    .await?;

    list.into_results()
        .into_iter()
        .map(|r| serde_json::to_value(r).map_err(Into::into))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::feed::FeedEvent;
    use crate::agent::state::SessionContext;
    use crate::core::{Config, ToolCall};
    use crate::llm::ScriptedCompletion;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn food_state(query: Value) -> ConversationState {
        let mut state =
            ConversationState::new("t", AgentKind::Food, SessionContext::new("e", "u"));
        state.append(Message::human("find vegan mains")).unwrap();
        state
            .append(Message::ai_with_tools(
                "",
                vec![ToolCall::new("search_for_food", query, "c1")],
            ))
            .unwrap();
        state
    }

    #[tokio::test]
    async fn test_progress_snapshots() {
        let script = Arc::new(ScriptedCompletion::new());
        script.push_structured(json!({"items": [
            {"name": "Chickpea curry", "type": "main", "dietary": "vegan", "description": "Mild"}
        ]}));
        let ctx = NodeContext::new(script, Arc::new(MemoryStore::new()), &Config::default());
        let mut rx = ctx.feed.subscribe();

        let mut state = food_state(json!({"query": "vegan mains"}));
        search_node(&ctx, &mut state).await.unwrap();

        let mut progress = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let FeedEvent::State(snapshot) = event {
                progress.push(snapshot.search_progress);
            }
        }
        assert_eq!(progress[0], vec![SearchProgress::pending("vegan mains")]);
        assert!(progress[1][0].done);
        assert_eq!(progress[1][0].results.len(), 1);
        assert!(progress[2].is_empty());

        let results: Vec<Value> =
            serde_json::from_str(state.last_message().unwrap().content()).unwrap();
        assert_eq!(results[0]["name"], "Chickpea curry");
        assert_eq!(results[0]["id"], "0");
    }

    #[tokio::test]
    async fn test_missing_query_answers_with_error() {
        let script = Arc::new(ScriptedCompletion::new());
        let ctx = NodeContext::new(script.clone(), Arc::new(MemoryStore::new()), &Config::default());

        let mut state = food_state(json!({}));
        search_node(&ctx, &mut state).await.unwrap();

        assert!(state.last_message().unwrap().content().contains("missing"));
        assert!(script.requests().is_empty());
    }

    #[tokio::test]
    async fn test_adapter_failure_becomes_tool_result() {
        let script = Arc::new(ScriptedCompletion::new());
        script.push_error("timeout");
        let ctx = NodeContext::new(script, Arc::new(MemoryStore::new()), &Config::default());

        let mut state = food_state(json!({"query": "tapas"}));
        search_node(&ctx, &mut state).await.unwrap();

        let last = state.last_message().unwrap();
        assert_eq!(last.call_id(), Some("c1"));
        assert!(last.content().starts_with("Search failed"));
        assert!(state.search_progress.is_empty());
    }

    #[tokio::test]
    async fn test_requires_tool_call() {
        let ctx = NodeContext::new(
            Arc::new(ScriptedCompletion::new()),
            Arc::new(MemoryStore::new()),
            &Config::default(),
        );
        let mut state =
            ConversationState::new("t", AgentKind::Food, SessionContext::new("e", "u"));
        state.append(Message::human("hi")).unwrap();
        assert!(search_node(&ctx, &mut state).await.unwrap_err().is_protocol());
    }
}
