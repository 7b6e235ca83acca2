//! Food planning domain
//!
//! Menu items, the structured search output the completion service fills in,
//! and the menu analytics computed by the summary node.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// Bucket for items with no dietary class (or no course type)
pub const UNSPECIFIED: &str = "unspecified";

/// Course a menu item is served as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CourseType {
    Main,
    Starter,
    Dessert,
}

impl CourseType {
    pub fn as_str(self) -> &'static str {
        match self {
            CourseType::Main => "main",
            CourseType::Starter => "starter",
            CourseType::Dessert => "dessert",
        }
    }
}

/// Dietary class of a menu item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Dietary {
    Vegetarian,
    Vegan,
    GlutenFree,
    DairyFree,
}

impl Dietary {
    pub fn as_str(self) -> &'static str {
        match self {
            Dietary::Vegetarian => "vegetarian",
            Dietary::Vegan => "vegan",
            Dietary::GlutenFree => "gluten-free",
            Dietary::DairyFree => "dairy-free",
        }
    }
}

/// A menu item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Food {
    /// Dish name; identifies the item within a menu
    pub name: String,
    /// Course the dish is served as
    #[serde(rename = "type")]
    pub course: CourseType,
    /// Dietary class, if any
    #[serde(
        default,
        deserialize_with = "lenient_dietary",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Option<Dietary>")]
    pub dietary: Option<Dietary>,
}

impl Food {
    pub fn new(name: impl Into<String>, course: CourseType, dietary: Option<Dietary>) -> Self {
        Self {
            name: name.into(),
            course,
            dietary,
        }
    }
}

/// One dish proposed by the completion service for a search query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FoodSuggestion {
    /// Dish name
    pub name: String,
    /// Course the dish is served as
    #[serde(rename = "type")]
    pub course: CourseType,
    /// Dietary class, if any
    #[serde(default, deserialize_with = "lenient_dietary")]
    #[schemars(with = "Option<Dietary>")]
    pub dietary: Option<Dietary>,
    /// Short description of the dish
    #[serde(default)]
    pub description: String,
}

/// A list of dishes matching a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FoodList {
    /// Matching dishes
    pub items: Vec<FoodSuggestion>,
}

/// A search hit as shown to the client and the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodResult {
    /// Position within the search batch
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub course: CourseType,
    #[serde(default)]
    pub dietary: Option<Dietary>,
    #[serde(default)]
    pub description: String,
}

impl FoodList {
    /// Number each suggestion by its position in the batch
    pub fn into_results(self) -> Vec<FoodResult> {
        self.items
            .into_iter()
            .enumerate()
            .map(|(i, item)| FoodResult {
                id: i.to_string(),
                name: item.name,
                course: item.course,
                dietary: item.dietary,
                description: item.description,
            })
            .collect()
    }
}

/// Aggregate view over a persisted menu
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analytics {
    pub menu_item_count: usize,
    /// Distinct dietary buckets, `unspecified` included
    pub dietary_options_count: usize,
    pub dietary_breakdown: BTreeMap<String, usize>,
    pub type_breakdown: BTreeMap<String, usize>,
}

impl Analytics {
    /// Compute analytics over raw menu item documents.
    ///
    /// Documents come straight from the store, so fields may be missing or
    /// hold legacy values such as `"None"`.
    pub fn from_menu_items(items: &[serde_json::Value]) -> Self {
        let mut dietary_breakdown = BTreeMap::new();
        let mut type_breakdown = BTreeMap::new();

        for item in items {
            *dietary_breakdown
                .entry(dietary_bucket(item.get("dietary")))
                .or_insert(0) += 1;
            *type_breakdown
                .entry(type_bucket(item.get("type")))
                .or_insert(0) += 1;
        }

        Self {
            menu_item_count: items.len(),
            dietary_options_count: dietary_breakdown.len(),
            dietary_breakdown,
            type_breakdown,
        }
    }
}

/// Missing, empty and `"None"` all count as unspecified
pub fn dietary_bucket(value: Option<&serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => UNSPECIFIED.to_string(),
        Some(serde_json::Value::String(s)) if s.is_empty() || s == "None" => {
            UNSPECIFIED.to_string()
        }
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn type_bucket(value: Option<&serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => UNSPECIFIED.to_string(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Models and older records write "none", "" or null for "no restriction"
fn lenient_dietary<'de, D>(deserializer: D) -> Result<Option<Dietary>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("none") => Ok(None),
        Some(s) => serde_json::from_value(serde_json::Value::String(s.to_lowercase()))
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_food_wire_shape() {
        let food = Food::new("Bruschetta", CourseType::Starter, Some(Dietary::Vegetarian));
        let value = serde_json::to_value(&food).unwrap();
        assert_eq!(
            value,
            json!({"name": "Bruschetta", "type": "starter", "dietary": "vegetarian"})
        );
    }

    #[test]
    fn test_lenient_dietary() {
        let food: Food =
            serde_json::from_value(json!({"name": "Steak", "type": "main", "dietary": "None"}))
                .unwrap();
        assert_eq!(food.dietary, None);

        let food: Food =
            serde_json::from_value(json!({"name": "Salad", "type": "starter", "dietary": "Gluten-Free"}))
                .unwrap();
        assert_eq!(food.dietary, Some(Dietary::GlutenFree));

        let food: Food = serde_json::from_value(json!({"name": "Soup", "type": "starter"})).unwrap();
        assert_eq!(food.dietary, None);
    }

    #[test]
    fn test_unknown_course_rejected() {
        let result: std::result::Result<Food, _> =
            serde_json::from_value(json!({"name": "Tea", "type": "drink"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_results_numbered_from_zero() {
        let list = FoodList {
            items: vec![
                FoodSuggestion {
                    name: "Chickpea curry".into(),
                    course: CourseType::Main,
                    dietary: Some(Dietary::Vegan),
                    description: String::new(),
                },
                FoodSuggestion {
                    name: "Mushroom risotto".into(),
                    course: CourseType::Main,
                    dietary: Some(Dietary::Vegan),
                    description: String::new(),
                },
            ],
        };
        let ids: Vec<_> = list.into_results().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["0", "1"]);
    }

    #[test]
    fn test_dietary_buckets() {
        assert_eq!(dietary_bucket(None), UNSPECIFIED);
        assert_eq!(dietary_bucket(Some(&json!(null))), UNSPECIFIED);
        assert_eq!(dietary_bucket(Some(&json!(""))), UNSPECIFIED);
        assert_eq!(dietary_bucket(Some(&json!("None"))), UNSPECIFIED);
        // only the exact legacy spelling is merged
        assert_eq!(dietary_bucket(Some(&json!("none"))), "none");
        assert_eq!(dietary_bucket(Some(&json!("vegan"))), "vegan");
    }

    #[test]
    fn test_analytics() {
        let items = vec![
            json!({"name": "Bruschetta", "type": "starter", "dietary": "vegetarian"}),
            json!({"name": "Steak", "type": "main", "dietary": "None"}),
            json!({"name": "Tiramisu", "type": "dessert", "dietary": ""}),
            json!({"name": "Lentil stew", "type": "main"}),
        ];
        let analytics = Analytics::from_menu_items(&items);

        assert_eq!(analytics.menu_item_count, 4);
        assert_eq!(analytics.dietary_options_count, 2);
        assert_eq!(analytics.dietary_breakdown[UNSPECIFIED], 3);
        assert_eq!(analytics.dietary_breakdown["vegetarian"], 1);
        assert_eq!(analytics.type_breakdown["main"], 2);
    }

    #[test]
    fn test_analytics_empty_menu() {
        let analytics = Analytics::from_menu_items(&[]);
        assert_eq!(analytics, Analytics::default());
    }
}
