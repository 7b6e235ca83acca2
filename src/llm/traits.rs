//! Completion adapter trait
//!
//! The single capability the agent graph needs from a language model:
//! messages in, either a model turn or a schema-constrained object out.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::core::{EventflowError, Message, Result, ToolCall, ToolDefinition};

/// Token usage information
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Options for LLM generation
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Temperature for sampling (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

/// Target shape for a structured completion
#[derive(Debug, Clone)]
pub struct OutputSchema {
    /// Schema title, used in prompts and logs
    pub name: String,
    /// JSON Schema the returned object must satisfy
    pub schema: serde_json::Value,
}

impl OutputSchema {
    /// Build the schema for a Rust type
    pub fn of<T: schemars::JsonSchema>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: crate::domain::schema_value::<T>(),
        }
    }
}

/// A request to the completion service
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model identifier
    pub model: String,
    /// Conversation so far, system prompt first
    pub messages: Vec<Message>,
    /// Tools the model may propose calls for
    pub tools: Vec<ToolDefinition>,
    /// When set, the reply must be an object of this shape
    pub output_schema: Option<OutputSchema>,
    pub options: GenerateOptions,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            output_schema: None,
            options: GenerateOptions::default(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_schema(mut self, schema: OutputSchema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = Some(temperature);
        self
    }
}

/// What the completion service returned
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// A model turn: a plain reply, or proposed tool calls
    Turn {
        content: String,
        tool_calls: Vec<ToolCall>,
        usage: Option<TokenUsage>,
    },
    /// An object produced under an output schema
    Structured(serde_json::Value),
}

impl Completion {
    pub fn reply(content: impl Into<String>) -> Self {
        Self::Turn {
            content: content.into(),
            tool_calls: Vec::new(),
            usage: None,
        }
    }

    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self::Turn {
            content: String::new(),
            tool_calls,
            usage: None,
        }
    }

    /// Token counts reported for a model turn
    pub fn usage(&self) -> Option<&TokenUsage> {
        match self {
            Self::Turn { usage, .. } => usage.as_ref(),
            Self::Structured(_) => None,
        }
    }

    /// Convert a model turn into the AI message appended to the conversation
    pub fn into_message(self) -> Result<Message> {
        match self {
            Self::Turn {
                content,
                tool_calls,
                ..
            } => Ok(Message::ai_with_tools(content, tool_calls)),
            Self::Structured(_) => Err(EventflowError::adapter(
                "expected a model turn but received a structured object",
            )),
        }
    }

    /// Decode a structured completion into `T`
    pub fn into_structured<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            Self::Structured(value) => serde_json::from_value(value).map_err(|e| {
                EventflowError::adapter(format!("response did not match schema: {}", e))
            }),
            Self::Turn { .. } => Err(EventflowError::adapter(
                "expected a structured object but received a model turn",
            )),
        }
    }
}

/// Injected completion capability
///
/// Implementations must return `Completion::Structured` when the request
/// carries an output schema, and `Completion::Turn` otherwise.
#[async_trait]
pub trait CompletionAdapter: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion>;

    /// Get the provider name
    fn name(&self) -> &str {
        "completion"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_turn_into_message() {
        let call = ToolCall::new("search_for_food", json!({"query": "tapas"}), "call-1");
        let msg = Completion::tool_calls(vec![call.clone()])
            .into_message()
            .unwrap();
        assert_eq!(msg.tool_calls(), &[call]);
    }

    #[test]
    fn test_structured_mismatch_is_adapter_error() {
        #[derive(Debug, serde::Deserialize)]
        struct Wanted {
            #[allow(dead_code)]
            items: Vec<String>,
        }

        let err = Completion::Structured(json!({"nope": 1}))
            .into_structured::<Wanted>()
            .unwrap_err();
        assert!(matches!(err, EventflowError::Adapter(_)));

        let err = Completion::reply("hi").into_structured::<Wanted>().unwrap_err();
        assert!(matches!(err, EventflowError::Adapter(_)));
    }
}
