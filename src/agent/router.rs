//! Router - picks the next step after the chat node
//!
//! Routing is a pure function of the conversation state. It looks at the
//! last message only: a tool result returns to chat, and of an AI message
//! only the first tool call counts.

use crate::agent::graph::Node;
use crate::agent::state::ConversationState;
use crate::agent::AgentKind;
use crate::core::Message;
use crate::tools::{
    ADD_FOODS, ADD_LICENSES, SEARCH_FOR_FOOD, SEARCH_FOR_LICENSES, SEARCH_FOR_SUMMARY,
};

/// Where the run goes next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Node(Node),
    /// Terminate the run
    End,
}

impl Step {
    pub fn node(self) -> Option<Node> {
        match self {
            Step::Node(node) => Some(node),
            Step::End => None,
        }
    }
}

/// Static tool name to step table of one agent
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: &'static [(&'static str, Step)],
    /// Step for tool calls the table does not name
    fallback: Step,
}

const FOOD_ROUTES: &[(&str, Step)] = &[
    (ADD_FOODS, Step::Node(Node::Propose)),
    (SEARCH_FOR_FOOD, Step::Node(Node::Search)),
    (SEARCH_FOR_SUMMARY, Step::Node(Node::Summary)),
];

const LICENSE_ROUTES: &[(&str, Step)] = &[
    (ADD_LICENSES, Step::Node(Node::Propose)),
    (SEARCH_FOR_LICENSES, Step::Node(Node::Search)),
];

impl RouteTable {
    pub fn for_agent(agent: AgentKind) -> Self {
        match agent {
            AgentKind::Food => Self {
                routes: FOOD_ROUTES,
                fallback: Step::End,
            },
            // the chat node answers unknown calls before asking the model again
            AgentKind::License => Self {
                routes: LICENSE_ROUTES,
                fallback: Step::Node(Node::Chat),
            },
        }
    }

    pub fn lookup(&self, tool: &str) -> Step {
        self.routes
            .iter()
            .find(|(name, _)| *name == tool)
            .map(|(_, step)| *step)
            .unwrap_or(self.fallback)
    }

    pub fn fallback(&self) -> Step {
        self.fallback
    }

    /// Every step this table can produce
    pub fn targets(&self) -> impl Iterator<Item = Step> + '_ {
        self.routes
            .iter()
            .map(|(_, step)| *step)
            .chain(std::iter::once(self.fallback))
    }
}

/// Decide the next step from the last message of the conversation.
///
/// A tool result always goes back to chat so the model can react to it.
pub fn route(state: &ConversationState) -> Step {
    match state.last_message() {
        Some(Message::Tool { .. }) => Step::Node(Node::Chat),
        Some(message) => match message.tool_calls().first() {
            Some(call) => RouteTable::for_agent(state.agent).lookup(&call.name),
            None => Step::End,
        },
        None => Step::End,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::state::SessionContext;
    use crate::core::ToolCall;
    use crate::tools::ToolRegistry;
    use serde_json::json;

    fn state_with(agent: AgentKind, messages: Vec<Message>) -> ConversationState {
        let mut state = ConversationState::new("t", agent, SessionContext::new("e", "u"));
        for message in messages {
            state.append(message).unwrap();
        }
        state
    }

    fn calls(names: &[&str]) -> Message {
        Message::ai_with_tools(
            "",
            names
                .iter()
                .enumerate()
                .map(|(i, n)| ToolCall::new(*n, json!({}), format!("c{}", i)))
                .collect(),
        )
    }

    #[test]
    fn test_food_routes() {
        let cases = [
            (ADD_FOODS, Step::Node(Node::Propose)),
            (SEARCH_FOR_FOOD, Step::Node(Node::Search)),
            (SEARCH_FOR_SUMMARY, Step::Node(Node::Summary)),
            ("book_venue", Step::End),
        ];
        for (tool, expected) in cases {
            let state = state_with(AgentKind::Food, vec![calls(&[tool])]);
            assert_eq!(route(&state), expected, "tool {}", tool);
        }
    }

    #[test]
    fn test_license_routes() {
        let cases = [
            (ADD_LICENSES, Step::Node(Node::Propose)),
            (SEARCH_FOR_LICENSES, Step::Node(Node::Search)),
            (SEARCH_FOR_SUMMARY, Step::Node(Node::Chat)),
        ];
        for (tool, expected) in cases {
            let state = state_with(AgentKind::License, vec![calls(&[tool])]);
            assert_eq!(route(&state), expected, "tool {}", tool);
        }
    }

    #[test]
    fn test_plain_reply_ends() {
        for agent in AgentKind::ALL {
            let state = state_with(agent, vec![Message::human("hi"), Message::ai("hello")]);
            assert_eq!(route(&state), Step::End);
            assert_eq!(route(&state_with(agent, vec![])), Step::End);
        }
    }

    #[test]
    fn test_tool_result_last_goes_to_chat() {
        let cases = [
            (AgentKind::Food, SEARCH_FOR_FOOD),
            (AgentKind::License, SEARCH_FOR_LICENSES),
        ];
        for (agent, tool) in cases {
            let mut state = state_with(agent, vec![calls(&[tool])]);
            state.append(Message::tool_result("c0", "[]")).unwrap();
            assert_eq!(route(&state), Step::Node(Node::Chat), "{} agent", agent);
        }
    }

    #[test]
    fn test_only_first_call_routes() {
        let state = state_with(AgentKind::Food, vec![calls(&[ADD_FOODS, SEARCH_FOR_FOOD])]);
        assert_eq!(route(&state), Step::Node(Node::Propose));
    }

    #[test]
    fn test_route_is_pure() {
        let state = state_with(AgentKind::Food, vec![calls(&[SEARCH_FOR_FOOD])]);
        let before = state.clone();
        assert_eq!(route(&state), route(&state));
        assert_eq!(state, before);
    }

    #[test]
    fn test_every_declared_tool_is_routed() {
        let registry = ToolRegistry::new();
        for agent in AgentKind::ALL {
            let table = RouteTable::for_agent(agent);
            for tool in registry.tools_for(agent) {
                assert_ne!(
                    table.lookup(tool.definition.name()),
                    table.fallback(),
                    "{} has no route",
                    tool.definition.name()
                );
            }
        }
    }
}
