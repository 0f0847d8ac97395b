// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vision description and text embeddings for image-similarity search.

use async_trait::async_trait;
use storebot_config::model::OpenAiConfig;
use storebot_core::traits::{EmbeddingAdapter, PluginAdapter};
use storebot_core::{AdapterType, HealthStatus, StorebotError};
use tracing::{debug, info};

use crate::client::OpenAiClient;
use crate::types::{
    ApiContent, ApiMessage, ChatCompletionRequest, ContentPart, EmbeddingRequest, ImageUrl,
};

const DESCRIBE_PROMPT: &str =
    "Describe this product in 2-3 keywords for search. Focus on color, type, and main features.";
const DESCRIBE_MAX_TOKENS: u32 = 50;

/// Describes product photos with a vision model and embeds the result.
pub struct OpenAiEmbedder {
    client: OpenAiClient,
    vision_model: String,
    embedding_model: String,
}

impl OpenAiEmbedder {
    pub fn new(config: &OpenAiConfig) -> Result<Self, StorebotError> {
        let client = crate::build_client(config)?;
        info!(
            vision_model = config.vision_model,
            embedding_model = config.embedding_model,
            "OpenAI embedder initialized"
        );
        Ok(Self {
            client,
            vision_model: config.vision_model.clone(),
            embedding_model: config.embedding_model.clone(),
        })
    }

    #[cfg(test)]
    fn with_client(client: OpenAiClient) -> Self {
        Self {
            client,
            vision_model: "gpt-4o-mini".into(),
            embedding_model: "text-embedding-3-small".into(),
        }
    }
}

#[async_trait]
impl PluginAdapter for OpenAiEmbedder {
    fn name(&self) -> &str {
        "openai-embedding"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, StorebotError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), StorebotError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for OpenAiEmbedder {
    async fn describe_image(&self, image_url: &str) -> Result<String, StorebotError> {
        let request = ChatCompletionRequest {
            model: self.vision_model.clone(),
            messages: vec![ApiMessage {
                role: "user".into(),
                content: Some(ApiContent::Parts(vec![
                    ContentPart::Text {
                        text: DESCRIBE_PROMPT.into(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image_url.to_string(),
                        },
                    },
                ])),
                tool_calls: None,
                tool_call_id: None,
            }],
            tools: None,
            max_tokens: Some(DESCRIBE_MAX_TOKENS),
        };
        let response = self.client.chat_completion(&request).await?;
        let description = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| StorebotError::provider("vision model returned no description"))?;
        debug!(description = %description, "image described");
        Ok(description)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, StorebotError> {
        let response = self
            .client
            .embeddings(&EmbeddingRequest {
                model: self.embedding_model.clone(),
                input: text.to_string(),
            })
            .await?;
        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| StorebotError::provider("embedding response contained no vectors"))
    }
}
