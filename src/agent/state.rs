//! Conversation state
//!
//! The record every node reads and updates. Messages are append-only and
//! every append is checked against the tool call protocol: a tool result
//! must answer a call made by the AI message it follows.

use serde::{Deserialize, Serialize};

use crate::agent::AgentKind;
use crate::core::{EventflowError, Message, Result, ToolCall};
use crate::domain::{identity_key, Analytics, Food, License};

/// Who a conversation belongs to and which event it plans
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Key of the event aggregate the agent writes to
    pub event_id: String,
    pub user_id: String,
}

impl SessionContext {
    pub fn new(event_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            user_id: user_id.into(),
        }
    }
}

/// Progress of a search, streamed to the client while it runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchProgress {
    pub query: String,
    pub results: Vec<serde_json::Value>,
    pub done: bool,
}

impl SearchProgress {
    pub fn pending(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            results: Vec::new(),
            done: false,
        }
    }
}

/// Shared, versioned record of one conversation thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub thread_id: String,
    pub agent: AgentKind,
    pub session: SessionContext,
    messages: Vec<Message>,
    /// Foods this conversation has persisted
    #[serde(default)]
    pub foods: Vec<Food>,
    /// Licenses this conversation has persisted
    #[serde(default)]
    pub licenses: Vec<License>,
    /// Searches in flight; empty between searches
    #[serde(default)]
    pub search_progress: Vec<SearchProgress>,
    /// Latest menu analytics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics: Option<Analytics>,
    /// Bumped once per executed node
    #[serde(default)]
    pub version: u64,
}

impl ConversationState {
    pub fn new(thread_id: impl Into<String>, agent: AgentKind, session: SessionContext) -> Self {
        Self {
            thread_id: thread_id.into(),
            agent,
            session,
            messages: Vec::new(),
            foods: Vec::new(),
            licenses: Vec::new(),
            search_progress: Vec::new(),
            analytics: None,
            version: 0,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The message before the last one
    pub fn previous_message(&self) -> Option<&Message> {
        self.messages.iter().rev().nth(1)
    }

    /// Append a message, enforcing the tool call protocol
    pub fn append(&mut self, message: Message) -> Result<()> {
        if let Message::Tool { call_id, .. } = &message {
            self.check_tool_result(call_id)?;
        }
        self.messages.push(message);
        Ok(())
    }

    /// A tool result must answer a call of the AI message directly before
    /// the current run of tool results, and only once.
    fn check_tool_result(&self, call_id: &str) -> Result<()> {
        let mut answered = Vec::new();
        for message in self.messages.iter().rev() {
            match message {
                Message::Tool { call_id: id, .. } => answered.push(id.as_str()),
                Message::Ai { tool_calls, .. } => {
                    if !tool_calls.iter().any(|c| c.call_id == call_id) {
                        return Err(EventflowError::protocol(format!(
                            "tool result '{}' does not match a call of the preceding AI message",
                            call_id
                        )));
                    }
                    if answered.contains(&call_id) {
                        return Err(EventflowError::protocol(format!(
                            "tool call '{}' was already answered",
                            call_id
                        )));
                    }
                    return Ok(());
                }
                _ => break,
            }
        }
        Err(EventflowError::protocol(format!(
            "tool result '{}' does not follow an AI message",
            call_id
        )))
    }

    /// First tool call of the last message, when it is an AI message
    pub fn pending_call(&self) -> Option<&ToolCall> {
        self.last_message().and_then(|m| m.tool_calls().first())
    }

    /// Tool calls of the last AI message that have no result yet
    pub fn unanswered_calls(&self) -> Vec<ToolCall> {
        let mut answered = Vec::new();
        for message in self.messages.iter().rev() {
            match message {
                Message::Tool { call_id, .. } => answered.push(call_id.as_str()),
                Message::Ai { tool_calls, .. } => {
                    return tool_calls
                        .iter()
                        .filter(|c| !answered.contains(&c.call_id.as_str()))
                        .cloned()
                        .collect();
                }
                _ => break,
            }
        }
        Vec::new()
    }

    /// Whether a food with the same identity key was already persisted
    pub fn knows_food(&self, name: &str) -> bool {
        let key = identity_key(name);
        self.foods.iter().any(|f| identity_key(&f.name) == key)
    }

    pub fn knows_license(&self, name: &str) -> bool {
        let key = identity_key(name);
        self.licenses.iter().any(|l| identity_key(&l.name) == key)
    }

    /// Clear the transcript and transient search state.
    ///
    /// Persisted records and the session stay; they mirror the store.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.search_progress.clear();
        self.analytics = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> ConversationState {
        ConversationState::new("t1", AgentKind::Food, SessionContext::new("e1", "u1"))
    }

    fn call(id: &str) -> ToolCall {
        ToolCall::new("search_for_food", json!({"query": "soup"}), id)
    }

    #[test]
    fn test_tool_result_must_match_preceding_call() {
        let mut state = state();
        state.append(Message::human("soup please")).unwrap();
        state
            .append(Message::ai_with_tools("", vec![call("c1")]))
            .unwrap();

        let err = state.append(Message::tool_result("c2", "[]")).unwrap_err();
        assert!(err.is_protocol());

        state.append(Message::tool_result("c1", "[]")).unwrap();
        assert_eq!(state.messages().len(), 3);
    }

    #[test]
    fn test_tool_result_without_ai_message_rejected() {
        let mut state = state();
        state.append(Message::human("hi")).unwrap();
        assert!(state
            .append(Message::tool_result("c1", "[]"))
            .unwrap_err()
            .is_protocol());
        assert!(ConversationState::new("t", AgentKind::Food, SessionContext::new("e", "u"))
            .append(Message::tool_result("c1", "[]"))
            .is_err());
    }

    #[test]
    fn test_duplicate_answer_rejected() {
        let mut state = state();
        state
            .append(Message::ai_with_tools("", vec![call("c1"), call("c2")]))
            .unwrap();
        state.append(Message::tool_result("c1", "[]")).unwrap();
        assert!(state.append(Message::tool_result("c1", "[]")).is_err());
        state.append(Message::tool_result("c2", "[]")).unwrap();
    }

    #[test]
    fn test_result_after_later_ai_message_rejected() {
        let mut state = state();
        state
            .append(Message::ai_with_tools("", vec![call("c1")]))
            .unwrap();
        state.append(Message::tool_result("c1", "ok")).unwrap();
        state.append(Message::ai("done")).unwrap();
        assert!(state.append(Message::tool_result("c1", "again")).is_err());
    }

    #[test]
    fn test_unanswered_calls() {
        let mut state = state();
        assert!(state.unanswered_calls().is_empty());
        state
            .append(Message::ai_with_tools("", vec![call("c1"), call("c2")]))
            .unwrap();
        state.append(Message::tool_result("c1", "ok")).unwrap();
        let pending: Vec<_> = state
            .unanswered_calls()
            .into_iter()
            .map(|c| c.call_id)
            .collect();
        assert_eq!(pending, vec!["c2"]);
    }

    #[test]
    fn test_reset_keeps_session_and_records() {
        let mut state = state();
        state.append(Message::human("hi")).unwrap();
        state.foods.push(Food::new(
            "Soup",
            crate::domain::CourseType::Starter,
            None,
        ));
        state.search_progress.push(SearchProgress::pending("soup"));
        state.reset();

        assert!(state.messages().is_empty());
        assert!(state.search_progress.is_empty());
        assert_eq!(state.foods.len(), 1);
        assert_eq!(state.session.event_id, "e1");
        assert!(state.knows_food(" SOUP "));
    }

    #[test]
    fn test_serde_roundtrip_keeps_messages() {
        let mut state = state();
        state.append(Message::human("hi")).unwrap();
        let json = serde_json::to_string(&state).unwrap();
        let back: ConversationState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
