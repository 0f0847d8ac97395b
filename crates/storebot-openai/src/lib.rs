// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible adapters for the Storebot assistant.
//!
//! [`OpenAiProvider`] implements [`ProviderAdapter`] over Chat Completions
//! with function tools. Completions are synchronous, so every run it starts
//! is already terminal. [`OpenAiEmbedder`] implements [`EmbeddingAdapter`]
//! for catalog image search.

pub mod client;
pub mod embedding;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use storebot_config::model::OpenAiConfig;
use storebot_core::traits::{PluginAdapter, ProviderAdapter};
use storebot_core::{
    AdapterType, ChatMessage, GenerationRequest, HealthStatus, Role, RunSnapshot, RunStatus,
    StorebotError, TokenUsage, ToolCall, ToolDefinition,
};
use tracing::{debug, info};

pub use crate::client::OpenAiClient;
pub use crate::embedding::OpenAiEmbedder;
use crate::types::{
    ApiContent, ApiFunctionCall, ApiFunctionDef, ApiMessage, ApiTool, ApiToolCall, ApiUsage,
    ChatCompletionRequest, ChatCompletionResponse,
};

/// Chat Completions provider implementing [`ProviderAdapter`].
///
/// API key resolution order: config -> `OPENAI_API_KEY` env var -> error.
pub struct OpenAiProvider {
    client: OpenAiClient,
    model: String,
    max_tokens: u32,
}

impl OpenAiProvider {
    pub fn new(config: &OpenAiConfig) -> Result<Self, StorebotError> {
        let client = build_client(config)?;
        info!(model = config.model, "OpenAI provider initialized");
        Ok(Self {
            client,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    #[cfg(test)]
    fn with_client(client: OpenAiClient) -> Self {
        Self {
            client,
            model: "gpt-4o-mini".into(),
            max_tokens: 256,
        }
    }

    fn to_completion_request(&self, request: &GenerationRequest) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.instructions.is_empty() {
            messages.push(ApiMessage {
                role: Role::System.to_string(),
                content: Some(ApiContent::Text(request.instructions.clone())),
                tool_calls: None,
                tool_call_id: None,
            });
        }
        messages.extend(request.messages.iter().map(convert_message));

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(request.tools.iter().map(convert_tool).collect())
        };

        ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            tools,
            max_tokens: Some(self.max_tokens),
        }
    }
}

pub(crate) fn build_client(config: &OpenAiConfig) -> Result<OpenAiClient, StorebotError> {
    let api_key = resolve_api_key(&config.api_key)?;
    OpenAiClient::new(
        &api_key,
        &config.base_url,
        Duration::from_secs(config.timeout_secs),
    )
}

#[async_trait]
impl PluginAdapter for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, StorebotError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), StorebotError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiProvider {
    async fn start_run(&self, request: GenerationRequest) -> Result<RunSnapshot, StorebotError> {
        let api_request = self.to_completion_request(&request);
        debug!(
            messages = api_request.messages.len(),
            tools = request.tools.len(),
            "sending chat completion"
        );
        let response = self.client.chat_completion(&api_request).await?;
        snapshot_from_response(response)
    }
}

/// Maps a completion to a terminal run snapshot.
fn snapshot_from_response(response: ChatCompletionResponse) -> Result<RunSnapshot, StorebotError> {
    let usage = convert_usage(response.usage.unwrap_or_default());
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| StorebotError::provider("completion contained no choices"))?;

    let tool_calls = choice.message.tool_calls.unwrap_or_default();
    let status = if !tool_calls.is_empty() {
        RunStatus::RequiresToolOutput(
            tool_calls
                .into_iter()
                .map(|call| ToolCall {
                    id: call.id,
                    name: call.function.name,
                    arguments: call.function.arguments,
                })
                .collect(),
        )
    } else if let Some(refusal) = choice.message.refusal {
        RunStatus::Failed { reason: refusal }
    } else if choice.finish_reason.as_deref() == Some("content_filter") {
        RunStatus::Failed {
            reason: "completion stopped by content filter".into(),
        }
    } else {
        RunStatus::Completed {
            text: choice.message.content.unwrap_or_default(),
        }
    };

    Ok(RunSnapshot {
        run_id: response.id,
        status,
        usage,
    })
}

fn convert_usage(usage: ApiUsage) -> TokenUsage {
    TokenUsage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
    }
}

fn convert_message(message: &ChatMessage) -> ApiMessage {
    let tool_calls = if message.tool_calls.is_empty() {
        None
    } else {
        Some(
            message
                .tool_calls
                .iter()
                .map(|call| ApiToolCall {
                    id: call.id.clone(),
                    type_: "function".into(),
                    function: ApiFunctionCall {
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    },
                })
                .collect(),
        )
    };
    ApiMessage {
        role: message.role.to_string(),
        content: message.content.clone().map(ApiContent::Text),
        tool_calls,
        tool_call_id: message.tool_call_id.clone(),
    }
}

fn convert_tool(tool: &ToolDefinition) -> ApiTool {
    ApiTool {
        type_: "function",
        function: ApiFunctionDef {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
            strict: tool.strict,
        },
    }
}

/// Resolves the API key from config or environment.
fn resolve_api_key(config_key: &Option<String>) -> Result<String, StorebotError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.clone());
    }

    std::env::var("OPENAI_API_KEY").map_err(|_| {
        StorebotError::Config(
            "OpenAI API key not found. Set openai.api_key in config or OPENAI_API_KEY environment variable.".into(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenAiProvider {
        let client = OpenAiClient::new("sk-test", "https://unused.invalid", Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.uri());
        OpenAiProvider::with_client(client)
    }

    fn search_tool() -> ToolDefinition {
        ToolDefinition {
            name: "searchItems".into(),
            description: "Search the catalog".into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
            strict: false,
        }
    }

    #[test]
    fn resolve_api_key_from_config() {
        assert_eq!(resolve_api_key(&Some("sk-123".into())).unwrap(), "sk-123");
    }

    #[test]
    fn resolve_api_key_none_falls_back_to_env() {
        let result = resolve_api_key(&None);
        if let Err(err) = result {
            assert!(err.to_string().contains("API key not found"), "got: {err}");
        }
    }

    #[test]
    fn request_puts_instructions_first_and_maps_tool_turns() {
        let client = OpenAiClient::new("k", "https://api.openai.com/v1", Duration::from_secs(1)).unwrap();
        let provider = OpenAiProvider::with_client(client);
        let call = ToolCall {
            id: "call_1".into(),
            name: "searchItems".into(),
            arguments: "{}".into(),
        };
        let request = GenerationRequest {
            instructions: "You are Nour.".into(),
            messages: vec![
                ChatMessage::user("shirts?"),
                ChatMessage::assistant_tool_calls(vec![call]),
                ChatMessage::tool_result("call_1", "[]"),
            ],
            tools: vec![search_tool()],
        };

        let api = provider.to_completion_request(&request);
        let json = serde_json::to_value(&api).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "You are Nour.");
        assert_eq!(json["messages"][2]["tool_calls"][0]["function"]["name"], "searchItems");
        assert!(json["messages"][2].get("content").is_none());
        assert_eq!(json["messages"][3]["role"], "tool");
        assert_eq!(json["messages"][3]["tool_call_id"], "call_1");
        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["max_tokens"], 256);
    }

    #[tokio::test]
    async fn start_run_returns_completed_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-4o-mini"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-9",
                "choices": [{"message": {"role": "assistant", "content": "Hello!"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 30, "completion_tokens": 4, "total_tokens": 34}
            })))
            .mount(&server)
            .await;

        let snapshot = provider_for(&server)
            .start_run(GenerationRequest {
                instructions: "be nice".into(),
                messages: vec![ChatMessage::user("hi")],
                tools: vec![],
            })
            .await
            .unwrap();
        assert_eq!(snapshot.run_id, "chatcmpl-9");
        assert_eq!(
            snapshot.status,
            RunStatus::Completed {
                text: "Hello!".into()
            }
        );
        assert_eq!(snapshot.usage.total_tokens, 34);
    }

    #[tokio::test]
    async fn start_run_surfaces_tool_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-10",
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [
                            {"id": "a", "type": "function", "function": {"name": "searchItems", "arguments": "{\"name\":\"red\"}"}},
                            {"id": "b", "type": "function", "function": {"name": "searchCategories", "arguments": "{}"}}
                        ]
                    },
                    "finish_reason": "tool_calls"
                }],
                "usage": {"prompt_tokens": 50, "completion_tokens": 20, "total_tokens": 70}
            })))
            .mount(&server)
            .await;

        let snapshot = provider_for(&server)
            .start_run(GenerationRequest {
                instructions: String::new(),
                messages: vec![ChatMessage::user("red things")],
                tools: vec![search_tool()],
            })
            .await
            .unwrap();
        match snapshot.status {
            RunStatus::RequiresToolOutput(calls) => {
                assert_eq!(calls.len(), 2);
                assert_eq!(calls[0].arguments, "{\"name\":\"red\"}");
                assert_eq!(calls[1].name, "searchCategories");
            }
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[tokio::test]
    async fn refusal_maps_to_failed_run() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-11",
                "choices": [{"message": {"role": "assistant", "content": null, "refusal": "cannot help"}, "finish_reason": "stop"}]
            })))
            .mount(&server)
            .await;

        let snapshot = provider_for(&server)
            .start_run(GenerationRequest {
                instructions: String::new(),
                messages: vec![ChatMessage::user("x")],
                tools: vec![],
            })
            .await
            .unwrap();
        assert_eq!(
            snapshot.status,
            RunStatus::Failed {
                reason: "cannot help".into()
            }
        );
        assert_eq!(snapshot.usage, TokenUsage::default());
    }

    #[test]
    fn plugin_adapter_metadata() {
        let client = OpenAiClient::new("k", "https://api.openai.com/v1", Duration::from_secs(1)).unwrap();
        let provider = OpenAiProvider::with_client(client);
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.version(), semver::Version::new(0, 1, 0));
        assert_eq!(provider.adapter_type(), AdapterType::Provider);
    }
}
