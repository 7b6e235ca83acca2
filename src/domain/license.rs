//! License and permit domain

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A license or permit the event needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct License {
    /// License name; identifies the license within an event
    pub name: String,
    /// Authority that issues the license
    pub issuing_authority: String,
    /// Fee charged by the authority
    pub cost: f64,
    /// Documents the authority asks for
    #[serde(default)]
    pub required_documents: Vec<String>,
    /// Additional notes
    #[serde(default)]
    pub notes: String,
    /// License or permit category
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
}

fn default_kind() -> String {
    "License".to_string()
}

/// A license proposed by the completion service for a search query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LicenseSuggestion {
    /// The name of the issuing authority
    pub issuing_authority: String,
    /// The cost of the license
    pub cost: f64,
    /// The documents required to obtain the license
    #[serde(default)]
    pub required_documents: Vec<String>,
    /// Any additional notes about the license
    #[serde(default)]
    pub notes: String,
}

/// A list of License items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LicenseList {
    /// List of license items
    pub items: Vec<LicenseSuggestion>,
}

/// Upload state of a required document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentStatus {
    pub name: String,
    pub uploaded: bool,
}

/// A search hit in the shape the license board renders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseResult {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub status: String,
    pub due_date: String,
    pub issuing_authority: String,
    pub cost: f64,
    pub icon: String,
    pub documents: Vec<DocumentStatus>,
    pub notes: String,
}

impl LicenseList {
    /// Number each suggestion by its position in the batch
    pub fn into_results(self) -> Vec<LicenseResult> {
        self.items
            .into_iter()
            .enumerate()
            .map(|(i, item)| LicenseResult {
                id: i.to_string(),
                name: item.issuing_authority.clone(),
                kind: default_kind(),
                description: item.notes.clone(),
                status: "pending".to_string(),
                due_date: String::new(),
                issuing_authority: item.issuing_authority,
                cost: item.cost,
                icon: "FileCheck".to_string(),
                documents: item
                    .required_documents
                    .into_iter()
                    .map(|name| DocumentStatus {
                        name,
                        uploaded: false,
                    })
                    .collect(),
                notes: item.notes,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_license_defaults() {
        let license: License = serde_json::from_value(json!({
            "name": "Temporary event notice",
            "issuing_authority": "City Council",
            "cost": 21.0
        }))
        .unwrap();
        assert_eq!(license.kind, "License");
        assert!(license.required_documents.is_empty());
    }

    #[test]
    fn test_result_shape() {
        let list = LicenseList {
            items: vec![LicenseSuggestion {
                issuing_authority: "Fire Department".into(),
                cost: 150.0,
                required_documents: vec!["Floor plan".into()],
                notes: "Needed for indoor pyrotechnics".into(),
            }],
        };
        let results = list.into_results();
        let value = serde_json::to_value(&results[0]).unwrap();

        assert_eq!(value["id"], "0");
        assert_eq!(value["name"], "Fire Department");
        assert_eq!(value["issuingAuthority"], "Fire Department");
        assert_eq!(value["type"], "License");
        assert_eq!(value["status"], "pending");
        assert_eq!(value["dueDate"], "");
        assert_eq!(value["icon"], "FileCheck");
        assert_eq!(value["documents"][0], json!({"name": "Floor plan", "uploaded": false}));
    }
}
