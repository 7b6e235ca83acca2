//! Domain module - event planning records
//!
//! Food and license types shared by the agents, the store layout and the
//! search result shapes.

pub mod food;
pub mod license;

pub use food::{Analytics, CourseType, Dietary, Food, FoodList, FoodResult, FoodSuggestion};
pub use license::{License, LicenseList, LicenseResult, LicenseSuggestion};

/// Identity key used to de-duplicate records by name
pub fn identity_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// JSON Schema for a type, as sent to the completion service
pub fn schema_value<T: schemars::JsonSchema>() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(serde_json::Value::Null)
}
