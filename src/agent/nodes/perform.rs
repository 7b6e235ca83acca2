//! Mutation nodes
//!
//! `propose_node` (foods_node / licenses_node) only announces the proposed
//! mutation; the run suspends after it. Once a tool result for the proposed
//! call arrives, `perform_node` either cancels or writes the records to the
//! store and, only after the write succeeded, reflects them in the state.

use serde::Deserialize;
use serde_json::Value;

use crate::agent::nodes::NodeContext;
use crate::agent::state::ConversationState;
use crate::agent::AgentKind;
use crate::core::{EventflowError, Message, Result, ToolCall};
use crate::domain::{identity_key, Food, License};
use crate::store::{Filter, Update, FOOD_COLLECTION, LICENSE_COLLECTION};
use crate::tools::{ADD_FOODS, ADD_LICENSES};

/// Tool result content that cancels a proposed mutation
pub const CANCEL: &str = "CANCEL";
/// Tool result content sent when the user approves
pub const APPROVED: &str = "APPROVED";

/// Which of the proposed tool calls were acted on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerformReport {
    /// Call that was executed or cancelled
    pub handled: Option<String>,
    /// Known calls beyond the first; only one mutation runs per approval
    pub ignored: Vec<String>,
    /// Calls naming no mutation of this agent
    pub unknown: Vec<String>,
    pub cancelled: bool,
}

impl PerformReport {
    /// Some proposed calls were not acted on
    pub fn is_partial(&self) -> bool {
        !self.ignored.is_empty() || !self.unknown.is_empty()
    }
}

/// Mutations the perform node knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mutation {
    AddFoods,
    AddLicenses,
}

impl Mutation {
    fn lookup(agent: AgentKind, tool: &str) -> Option<Self> {
        match (agent, tool) {
            (AgentKind::Food, ADD_FOODS) => Some(Mutation::AddFoods),
            (AgentKind::License, ADD_LICENSES) => Some(Mutation::AddLicenses),
            _ => None,
        }
    }
}

pub async fn propose_node(ctx: &NodeContext, state: &mut ConversationState) -> Result<()> {
    let call = super::current_call(state, "propose_node")?;
    tracing::info!(
        thread = %state.thread_id,
        tool = %call.name,
        "mutation proposed, waiting for approval"
    );
    ctx.feed.emit_state(state);
    Ok(())
}

pub async fn perform_node(
    ctx: &NodeContext,
    state: &mut ConversationState,
) -> Result<PerformReport> {
    let (gate, calls) = approval(state)?;
    let mut report = PerformReport::default();

    if gate.trim() == CANCEL {
        report.handled = calls.first().map(|c| c.call_id.clone());
        report.cancelled = true;
        let message = Message::ai(format!("Cancelled the {} operation.", state.agent.noun()));
        ctx.append(state, message)?;
        ctx.feed.emit_state(state);
        return Ok(report);
    }

    let mut executed = false;
    for call in &calls {
        match Mutation::lookup(state.agent, &call.name) {
            Some(_) if executed => report.ignored.push(call.call_id.clone()),
            Some(mutation) => {
                let reply = match mutation {
                    Mutation::AddFoods => add_foods(ctx, state, &call.arguments).await,
                    Mutation::AddLicenses => add_licenses(ctx, state, &call.arguments).await,
                };
                ctx.append(state, Message::ai(reply))?;
                report.handled = Some(call.call_id.clone());
                executed = true;
            }
            None => report.unknown.push(call.call_id.clone()),
        }
    }

    ctx.feed.emit_state(state);
    Ok(report)
}

/// The gate content and the proposed calls.
///
/// The last message must be the tool result answering the first call of
/// the AI message before it.
fn approval(state: &ConversationState) -> Result<(String, Vec<ToolCall>)> {
    let gate = match state.last_message() {
        Some(Message::Tool {
            content, call_id, ..
        }) => (content.clone(), call_id.clone()),
        _ => {
            return Err(EventflowError::protocol(
                "perform node expects a tool result as the last message",
            ))
        }
    };

    let calls = state
        .previous_message()
        .map(|m| m.tool_calls().to_vec())
        .unwrap_or_default();

    match calls.first() {
        Some(first) if first.call_id == gate.1 => Ok((gate.0, calls)),
        _ => Err(EventflowError::protocol(format!(
            "tool result '{}' does not answer the proposed call",
            gate.1
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct AddFoodsArgs {
    foods: Vec<Food>,
}

#[derive(Debug, Deserialize)]
struct AddLicensesArgs {
    licenses: Vec<License>,
}

/// Keep the first record per identity key, skipping ones already known
fn fresh<T>(items: Vec<T>, name: impl Fn(&T) -> &str, known: impl Fn(&str) -> bool) -> Vec<T> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| {
            let key = identity_key(name(item));
            !known(name(item)) && seen.insert(key)
        })
        .collect()
}

async fn add_foods(ctx: &NodeContext, state: &mut ConversationState, arguments: &Value) -> String {
    let args: AddFoodsArgs = match serde_json::from_value(arguments.clone()) {
        Ok(args) => args,
        Err(e) => return format!("Failed to add foods: invalid arguments: {}", e),
    };

    let foods = fresh(args.foods, |f| f.name.as_str(), |name| state.knows_food(name));
    if foods.is_empty() {
        return "No new foods to add; they are already on the menu.".to_string();
    }

    let mut items = Vec::with_capacity(foods.len());
    for food in &foods {
        match serde_json::to_value(food) {
            Ok(value) => items.push(value),
            Err(e) => return format!("Failed to add foods: {}", e),
        }
    }
    let with_dietary = foods.iter().filter(|f| f.dietary.is_some()).count();

    let update = Update::new()
        .push_each("menu_items", items)
        .inc("summary.menu_item_count", foods.len() as i64)
        .inc("summary.dietary_options_count", with_dietary as i64)
        .set("summary.last_updated", chrono::Utc::now().to_rfc3339())
        .set_on_insert("user_id", state.session.user_id.clone())
        .set_on_insert("summary.status", "Planning");

    let filter = Filter::eq("event_id", state.session.event_id.clone());
    match ctx.store.update_one(FOOD_COLLECTION, &filter, &update, true).await {
        Ok(_) => {
            tracing::info!(
                event = %state.session.event_id,
                count = foods.len(),
                "foods added"
            );
            state.foods.extend(foods);
            "Successfully added the foods!".to_string()
        }
        Err(e) => {
            tracing::warn!(event = %state.session.event_id, error = %e, "adding foods failed");
            format!("Failed to add foods: {}", e)
        }
    }
}

async fn add_licenses(
    ctx: &NodeContext,
    state: &mut ConversationState,
    arguments: &Value,
) -> String {
    let args: AddLicensesArgs = match serde_json::from_value(arguments.clone()) {
        Ok(args) => args,
        Err(e) => return format!("Failed to add licenses: invalid arguments: {}", e),
    };

    let licenses = fresh(args.licenses, |l| l.name.as_str(), |name| state.knows_license(name));
    if licenses.is_empty() {
        return "No new licenses to add; they are already on the event.".to_string();
    }

    let mut records = Vec::with_capacity(licenses.len());
    for license in &licenses {
        let mut record = match serde_json::to_value(license) {
            Ok(record) => record,
            Err(e) => return format!("Failed to add licenses: {}", e),
        };
        if let Some(fields) = record.as_object_mut() {
            fields.insert("eventId".into(), state.session.event_id.clone().into());
            fields.insert("userId".into(), state.session.user_id.clone().into());
        }
        records.push(record);
    }

    let update = Update::new()
        .push_each("licenses", records)
        .inc("license_count", licenses.len() as i64)
        .set("last_updated", chrono::Utc::now().to_rfc3339())
        .set_on_insert("user_id", state.session.user_id.clone());

    let filter = Filter::eq("event_id", state.session.event_id.clone());
    match ctx.store.update_one(LICENSE_COLLECTION, &filter, &update, true).await {
        Ok(_) => {
            tracing::info!(
                event = %state.session.event_id,
                count = licenses.len(),
                "licenses added"
            );
            state.licenses.extend(licenses);
            "Successfully added the licenses!".to_string()
        }
        Err(e) => {
            tracing::warn!(event = %state.session.event_id, error = %e, "adding licenses failed");
            format!("Failed to add licenses: {}", e)
        }
    }
}
