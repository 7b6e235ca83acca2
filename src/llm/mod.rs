//! LLM module - completion service integrations
//!
//! The graph only sees [`CompletionAdapter`]; Ollama is the production
//! backend and [`ScriptedCompletion`] replays canned completions.

pub mod ollama;
pub mod scripted;
pub mod traits;

pub use ollama::OllamaClient;
pub use scripted::ScriptedCompletion;
pub use traits::{
    Completion, CompletionAdapter, CompletionRequest, GenerateOptions, OutputSchema, TokenUsage,
};

use serde::de::DeserializeOwned;

use crate::core::{Message, Result};

/// Ask for an object of type `T`.
///
/// A reply that does not decode as `T` is retried once; a second mismatch
/// (or any transport failure) is returned to the caller.
pub async fn complete_structured<T>(
    adapter: &dyn CompletionAdapter,
    model: &str,
    messages: Vec<Message>,
    schema: OutputSchema,
) -> Result<T>
where
    T: DeserializeOwned,
{
    let request = CompletionRequest::new(model, messages).with_schema(schema);

    match adapter.complete(request.clone()).await?.into_structured() {
        Ok(value) => Ok(value),
        Err(first) => {
            tracing::warn!(
                adapter = adapter.name(),
                error = %first,
                "structured reply did not match schema, retrying once"
            );
            adapter.complete(request).await?.into_structured()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FoodList;
    use serde_json::json;

    #[tokio::test]
    async fn test_structured_retries_once() {
        let script = ScriptedCompletion::new();
        script.push_structured(json!({"wrong": true}));
        script.push_structured(json!({"items": []}));

        let list: FoodList = complete_structured(
            &script,
            "m",
            vec![Message::human("vegan mains")],
            OutputSchema::of::<FoodList>("FoodList"),
        )
        .await
        .unwrap();
        assert!(list.items.is_empty());
        assert_eq!(script.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_structured_gives_up_after_second_mismatch() {
        let script = ScriptedCompletion::new();
        script.push_structured(json!({"wrong": true}));
        script.push_structured(json!({"still": "wrong"}));
        script.push_structured(json!({"items": []}));

        let result: Result<FoodList> = complete_structured(
            &script,
            "m",
            vec![Message::human("vegan mains")],
            OutputSchema::of::<FoodList>("FoodList"),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(script.remaining(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_not_retried() {
        let script = ScriptedCompletion::new();
        script.push_error("connection refused");
        script.push_structured(json!({"items": []}));

        let result: Result<FoodList> = complete_structured(
            &script,
            "m",
            vec![Message::human("q")],
            OutputSchema::of::<FoodList>("FoodList"),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(script.requests().len(), 1);
    }
}
