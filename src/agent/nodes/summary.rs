//! Summary node - analytics over the persisted menu

use crate::agent::nodes::{current_call, NodeContext};
use crate::agent::state::ConversationState;
use crate::agent::AgentKind;
use crate::core::{EventflowError, Message, Result};
use crate::domain::Analytics;
use crate::store::{Filter, FOOD_COLLECTION};

/// Read the event's menu and answer with its analytics.
///
/// Reads only; running it twice over the same menu gives the same answer.
pub async fn summary_node(ctx: &NodeContext, state: &mut ConversationState) -> Result<()> {
    if state.agent != AgentKind::Food {
        return Err(EventflowError::protocol(format!(
            "the {} agent has no summary",
            state.agent
        )));
    }
    let call = current_call(state, "summary_node")?;

    let filter = Filter::eq("event_id", state.session.event_id.clone());
    let content = match ctx.store.find_one(FOOD_COLLECTION, &filter).await {
        Ok(document) => {
            let items = document
                .as_ref()
                .and_then(|d| d.get("menu_items"))
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default();
            let analytics = Analytics::from_menu_items(&items);
            let content = serde_json::to_string(&analytics)?;
            state.analytics = Some(analytics);
            content
        }
        Err(e) => {
            tracing::warn!(event = %state.session.event_id, error = %e, "menu summary failed");
            format!("Failed to summarize the menu: {}", e)
        }
    };

    ctx.append(state, Message::tool_result(&call.call_id, content))?;
    ctx.feed.emit_state(state);
    Ok(())
}
