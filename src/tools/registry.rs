//! Tool registry - the tools each agent exposes to the model
//!
//! Tools are declarations only. The graph executes them by routing the
//! model's tool call to a node, so the registry records each tool's intent
//! next to its definition.

use crate::agent::AgentKind;
use crate::core::ToolDefinition;
use crate::domain::{schema_value, Food, License};
use crate::tools::{
    ADD_FOODS, ADD_LICENSES, SEARCH_FOR_FOOD, SEARCH_FOR_LICENSES, SEARCH_FOR_SUMMARY,
};

/// What a tool call asks the graph to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolIntent {
    /// Read-only lookup answered by the search node
    Search,
    /// Mutation that needs human approval
    Mutate,
    /// Aggregate view over persisted records
    Summarize,
}

/// A registered tool
#[derive(Debug, Clone)]
pub struct RegisteredTool {
    pub definition: ToolDefinition,
    pub agent: AgentKind,
    pub intent: ToolIntent,
}

/// Registry of available tools, in declaration order
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Create a registry holding the food and license tools
    pub fn new() -> Self {
        let mut registry = Self { tools: Vec::new() };

        registry.register_food_tools();
        registry.register_license_tools();

        registry
    }

    fn register_food_tools(&mut self) {
        self.register(
            AgentKind::Food,
            ToolIntent::Search,
            ToolDefinition::function(
                SEARCH_FOR_FOOD,
                "Search for dishes that match a request, e.g. 'vegan starters for 40 guests'",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "What to look for"
                        }
                    },
                    "required": ["query"]
                }),
            ),
        );

        self.register(
            AgentKind::Food,
            ToolIntent::Mutate,
            ToolDefinition::function(
                ADD_FOODS,
                "Add dishes to the event menu. The user is asked to approve before anything is saved.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "foods": {
                            "type": "array",
                            "description": "Dishes to add",
                            "items": schema_value::<Food>()
                        }
                    },
                    "required": ["foods"]
                }),
            ),
        );

        self.register(
            AgentKind::Food,
            ToolIntent::Summarize,
            ToolDefinition::function(
                SEARCH_FOR_SUMMARY,
                "Summarize the saved menu: item count and dietary and course breakdowns",
                serde_json::json!({
                    "type": "object",
                    "properties": {}
                }),
            ),
        );
    }

    fn register_license_tools(&mut self) {
        self.register(
            AgentKind::License,
            ToolIntent::Search,
            ToolDefinition::function(
                SEARCH_FOR_LICENSES,
                "Search for licenses and permits an event needs, e.g. 'outdoor concert with alcohol'",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "What to look for"
                        }
                    },
                    "required": ["query"]
                }),
            ),
        );

        self.register(
            AgentKind::License,
            ToolIntent::Mutate,
            ToolDefinition::function(
                ADD_LICENSES,
                "Add licenses to the event. The user is asked to approve before anything is saved.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "licenses": {
                            "type": "array",
                            "description": "Licenses to add",
                            "items": schema_value::<License>()
                        }
                    },
                    "required": ["licenses"]
                }),
            ),
        );
    }

    /// Register a tool definition
    pub fn register(&mut self, agent: AgentKind, intent: ToolIntent, definition: ToolDefinition) {
        // a later registration replaces an earlier one with the same name
        self.tools
            .retain(|t| !(t.agent == agent && t.definition.name() == definition.name()));
        self.tools.push(RegisteredTool {
            definition,
            agent,
            intent,
        });
    }

    /// Definitions bound to the model for one agent
    pub fn definitions_for(&self, agent: AgentKind) -> Vec<ToolDefinition> {
        self.tools_for(agent)
            .map(|t| t.definition.clone())
            .collect()
    }

    /// Look up a tool by name within one agent
    pub fn get(&self, agent: AgentKind, name: &str) -> Option<&RegisteredTool> {
        self.tools
            .iter()
            .find(|t| t.agent == agent && t.definition.name() == name)
    }

    /// Intent of a tool, if the agent declares it
    pub fn intent(&self, agent: AgentKind, name: &str) -> Option<ToolIntent> {
        self.get(agent, name).map(|t| t.intent)
    }

    pub fn tools_for(&self, agent: AgentKind) -> impl Iterator<Item = &RegisteredTool> {
        self.tools.iter().filter(move |t| t.agent == agent)
    }
}
