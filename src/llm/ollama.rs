//! Ollama client implementation
//!
//! Async HTTP client for the Ollama chat API with tool calling and
//! schema-constrained (`format`) output.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::{Config, EventflowError, Message, Result, ToolCall, ToolDefinition};
use crate::llm::traits::{
    Completion, CompletionAdapter, CompletionRequest, GenerateOptions, TokenUsage,
};

/// Ollama API client
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

/// Ollama chat request
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
    stream: bool,
}

/// Ollama message format
#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

/// Ollama tool call format
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    function: OllamaFunction,
}

/// Ollama function in tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaFunction {
    name: String,
    arguments: serde_json::Value,
}

/// Ollama generation options
#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Ollama chat response (non-streaming)
#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// Ollama models list response
#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

/// Model information
#[derive(Debug, Deserialize)]
struct ModelInfo {
    name: String,
}

impl OllamaClient {
    /// Create a new Ollama client from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.ollama.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.ollama_url(),
        })
    }

    /// Convert internal Message to Ollama format
    fn to_ollama_message(msg: &Message) -> OllamaMessage {
        let role = match msg {
            Message::System { .. } => "system",
            Message::Human { .. } => "user",
            Message::Ai { .. } => "assistant",
            Message::Tool { .. } => "tool",
        };

        let tool_calls = if msg.has_tool_calls() {
            Some(
                msg.tool_calls()
                    .iter()
                    .map(|tc| OllamaToolCall {
                        id: Some(tc.call_id.clone()),
                        function: OllamaFunction {
                            name: tc.name.clone(),
                            arguments: tc.arguments.clone(),
                        },
                    })
                    .collect(),
            )
        } else {
            None
        };

        OllamaMessage {
            role: role.to_string(),
            content: msg.content().to_string(),
            tool_calls,
        }
    }

    fn to_ollama_options(options: &GenerateOptions) -> Option<OllamaOptions> {
        if options.temperature.is_none() && options.max_tokens.is_none() {
            return None;
        }
        Some(OllamaOptions {
            temperature: options.temperature,
            num_predict: options.max_tokens,
        })
    }

    /// Convert a model turn, minting call ids when Ollama leaves them out
    fn to_completion(response: ChatResponse) -> Completion {
        let tool_calls = response
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall {
                name: tc.function.name,
                arguments: tc.function.arguments,
                call_id: tc
                    .id
                    .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple())),
            })
            .collect();

        let usage = match (response.prompt_eval_count, response.eval_count) {
            (Some(prompt), Some(completion)) => Some(TokenUsage {
                prompt_tokens: prompt,
                completion_tokens: completion,
                total_tokens: prompt + completion,
            }),
            _ => None,
        };

        Completion::Turn {
            content: response.message.content,
            tool_calls,
            usage,
        }
    }

    /// Parse the content of a `format`-constrained reply
    fn to_structured(response: ChatResponse) -> Result<Completion> {
        let value: serde_json::Value = serde_json::from_str(response.message.content.trim())
            .map_err(|e| {
                EventflowError::adapter(format!("structured reply is not valid JSON: {}", e))
            })?;

        if !value.is_object() {
            return Err(EventflowError::adapter(
                "structured reply is not a JSON object",
            ));
        }

        Ok(Completion::Structured(value))
    }

    fn connect_error(&self, e: reqwest::Error) -> EventflowError {
        if e.is_connect() {
            EventflowError::adapter(format!(
                "Cannot connect to Ollama at {}. Is it running?",
                self.base_url
            ))
        } else {
            EventflowError::from(e)
        }
    }

    /// List available models
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| self.connect_error(e))?;

        if !response.status().is_success() {
            return Err(EventflowError::adapter("Failed to list models"));
        }

        let models_response: ModelsResponse = response.json().await?;
        Ok(models_response.models.into_iter().map(|m| m.name).collect())
    }

    /// Check if a model is available
    pub async fn is_model_available(&self, model: &str) -> Result<bool> {
        let models = self.list_models().await?;
        Ok(models
            .iter()
            .any(|m| m == model || m.split(':').next() == model.split(':').next()))
    }

    /// Fail early when a configured model has not been pulled
    pub async fn ensure_models(&self, models: &[&str]) -> Result<()> {
        for model in models {
            if !self.is_model_available(model).await? {
                return Err(EventflowError::ModelNotFound(model.to_string()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CompletionAdapter for OllamaClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let ollama_messages: Vec<OllamaMessage> = request
            .messages
            .iter()
            .map(Self::to_ollama_message)
            .collect();

        let body = ChatRequest {
            model: &request.model,
            messages: ollama_messages,
            tools: if request.tools.is_empty() || request.output_schema.is_some() {
                None
            } else {
                Some(&request.tools)
            },
            format: request.output_schema.as_ref().map(|s| &s.schema),
            options: Self::to_ollama_options(&request.options),
            stream: false,
        };

        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            structured = request.output_schema.is_some(),
            "ollama chat request"
        );

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.connect_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 404 && error_text.contains("not found") {
                return Err(EventflowError::ModelNotFound(request.model.clone()));
            }

            return Err(EventflowError::adapter(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        let response_text = response.text().await?;
        tracing::trace!(body = %response_text, "ollama chat response");

        let chat_response: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| EventflowError::adapter(format!("Failed to parse response: {}", e)))?;

        if request.output_schema.is_some() {
            Self::to_structured(chat_response)
        } else {
            Ok(Self::to_completion(chat_response))
        }
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(content: &str, tool_calls: Option<Vec<OllamaToolCall>>) -> ChatResponse {
        ChatResponse {
            message: OllamaMessage {
                role: "assistant".into(),
                content: content.into(),
                tool_calls,
            },
            prompt_eval_count: Some(10),
            eval_count: Some(5),
        }
    }

    #[test]
    fn test_client_creation() {
        let mut config = Config::default();
        config.ollama.host = "ollama.internal".to_string();
        config.ollama.port = 8080;
        let client = OllamaClient::from_config(&config).unwrap();
        assert_eq!(client.base_url, "http://ollama.internal:8080");
    }

    #[test]
    fn test_message_conversion() {
        let msg = Message::human("Hello");
        let ollama_msg = OllamaClient::to_ollama_message(&msg);
        assert_eq!(ollama_msg.role, "user");
        assert_eq!(ollama_msg.content, "Hello");

        let msg = Message::tool_result("call-1", "[]");
        assert_eq!(OllamaClient::to_ollama_message(&msg).role, "tool");
    }

    #[test]
    fn test_tool_calls_get_ids() {
        let calls = vec![OllamaToolCall {
            id: None,
            function: OllamaFunction {
                name: "search_for_food".into(),
                arguments: json!({"query": "canapes"}),
            },
        }];
        let completion = OllamaClient::to_completion(response("", Some(calls)));
        assert_eq!(completion.usage().map(|u| u.total_tokens), Some(15));
        let msg = completion.into_message().unwrap();
        assert_eq!(msg.tool_calls().len(), 1);
        assert!(msg.tool_calls()[0].call_id.starts_with("call_"));
    }

    #[test]
    fn test_structured_reply_parsing() {
        let ok = OllamaClient::to_structured(response(r#"{"items": []}"#, None)).unwrap();
        assert_eq!(ok, Completion::Structured(json!({"items": []})));

        assert!(OllamaClient::to_structured(response("sure! here you go", None)).is_err());
        assert!(OllamaClient::to_structured(response("[1, 2]", None)).is_err());
    }
}
