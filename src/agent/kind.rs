//! Agent kinds
//!
//! The food and license agents run the same graph shape; they differ in
//! node names, tools, route tables and the nouns used in their replies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::EventflowError;

/// Which planning agent a conversation talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Food,
    License,
}

impl AgentKind {
    pub const ALL: [AgentKind; 2] = [AgentKind::Food, AgentKind::License];

    /// Singular noun, as in "Cancelled the food operation."
    pub fn noun(self) -> &'static str {
        match self {
            AgentKind::Food => "food",
            AgentKind::License => "license",
        }
    }

    pub fn default_prompt(self) -> &'static str {
        match self {
            AgentKind::Food => FOOD_PROMPT,
            AgentKind::License => LICENSE_PROMPT,
        }
    }
}

const FOOD_PROMPT: &str = "You are an agent that plans foods and helps the user with planning and managing their foods.

Call search_for_food when you need to find dishes; pass the user's request as the query.
Call add_foods when the user wants dishes added to the menu.
Call search_for_summary when the user asks for an overview of the menu.
Only call one tool at a time. If no tool is needed, answer the user directly.";

const LICENSE_PROMPT: &str = "You are an agent that helps the user find and manage the licenses and permits their event needs.

Call search_for_licenses when you need to find licenses; pass the user's request as the query.
Call add_licenses when the user wants licenses added to the event.
Only call one tool at a time. If no tool is needed, answer the user directly.";

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.noun())
    }
}

impl FromStr for AgentKind {
    type Err = EventflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "food" | "foods" | "menu" => Ok(AgentKind::Food),
            "license" | "licenses" | "licence" | "permit" => Ok(AgentKind::License),
            other => Err(EventflowError::config(format!(
                "unknown agent '{}' (expected 'food' or 'license')",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("food".parse::<AgentKind>().unwrap(), AgentKind::Food);
        assert_eq!(" License ".parse::<AgentKind>().unwrap(), AgentKind::License);
        assert!("venue".parse::<AgentKind>().is_err());
    }

    #[test]
    fn test_prompts_name_their_tools() {
        assert!(AgentKind::Food.default_prompt().contains("add_foods"));
        assert!(AgentKind::License
            .default_prompt()
            .contains("search_for_licenses"));
    }
}
