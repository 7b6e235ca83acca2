//! Tools module - tool declarations bound to the agents' chat model

pub mod registry;

pub use registry::{RegisteredTool, ToolIntent, ToolRegistry};

pub const SEARCH_FOR_FOOD: &str = "search_for_food";
pub const ADD_FOODS: &str = "add_foods";
pub const SEARCH_FOR_SUMMARY: &str = "search_for_summary";
pub const SEARCH_FOR_LICENSES: &str = "search_for_licenses";
pub const ADD_LICENSES: &str = "add_licenses";
