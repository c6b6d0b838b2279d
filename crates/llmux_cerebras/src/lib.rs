/* Copyright 2023- The Binedge, Lda team. All rights reserved.
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *     http://www.apache.org/licenses/LICENSE-2.0
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! The cloud provider: translates the OpenAI capability set onto the cloud
//! inference service. The service does not stream through this gateway, so
//! [`Provider::stream_chat_completions`] keeps its "not implemented" default.

#![deny(unsafe_code)]

use tracing::debug;

use llmux_core::openai::{
    unix_now, ChatCompletion, ChatCompletionChoice, ChatCompletionRequest, ChatCompletionUsage,
    ChatMessage, EmbeddingsRequest, EmbeddingsResponse, EmbeddingsUsage, FinishReason, ModelCard,
    ModelList,
};
use llmux_core::provider::{Provider, ProviderError};
use llmux_core::settings::Settings;

pub mod client;

use client::{CerebrasChatPayload, CerebrasChatResponse, CerebrasClient, CerebrasEmbeddingsPayload};

/// The provider bound to the cloud inference service.
///
/// Construction never fails: when no API key is configured the provider still
/// exists, and every capability call normalizes the missing credential into
/// [`ProviderError::Credentials`].
pub struct CerebrasProvider {
    client: Option<CerebrasClient>,
}

impl CerebrasProvider {
    /// Build the provider from configuration. Without `CEREBRAS_API_KEY` the
    /// provider is present but unusable.
    pub fn from_settings(settings: &Settings) -> Self {
        let client = settings.cerebras_api_key.clone().map(|api_key| {
            CerebrasClient::new(api_key, settings.cerebras_base_url.clone(), settings.timeout())
        });

        Self { client }
    }

    /// Build the provider over a preconstructed client. Test entry point.
    pub fn with_client(client: CerebrasClient) -> Self {
        Self {
            client: Some(client),
        }
    }

    fn client(&self) -> Result<&CerebrasClient, ProviderError> {
        self.client.as_ref().ok_or_else(|| {
            ProviderError::Credentials("CEREBRAS_API_KEY is not configured".to_string())
        })
    }
}

fn chat_payload(request: &ChatCompletionRequest) -> CerebrasChatPayload {
    CerebrasChatPayload {
        model: request.model.clone(),
        messages: request.messages.0.clone(),
        stream: false,
        temperature: request.temperature,
        top_p: request.top_p,
        max_tokens: request.max_tokens,
        stop: request.stop.clone(),
        seed: request.seed,
        user: request.user.clone(),
        tools: request.tools.clone(),
        tool_choice: request.tool_choice.clone(),
        response_format: request.response_format.clone(),
    }
}

/// Translate a cloud answer back to strict OpenAI shape, echoing the request
/// model and minting a fresh identifier.
fn map_chat_response(
    model: &str,
    response: CerebrasChatResponse,
) -> Result<ChatCompletion, ProviderError> {
    if response.choices.is_empty() {
        return Err(ProviderError::Decode(
            "cloud answer contained no choices".to_string(),
        ));
    }

    let created = response.created.unwrap_or_else(unix_now);
    let usage = response
        .usage
        .map(|usage| ChatCompletionUsage::from_counts(usage.prompt_tokens, usage.completion_tokens))
        .unwrap_or_default();

    let choices = response
        .choices
        .into_iter()
        .enumerate()
        .map(|(position, choice)| ChatCompletionChoice {
            index: choice.index.unwrap_or(position as u32),
            message: ChatMessage::assistant(choice.message.content.unwrap_or_default()),
            finish_reason: Some(
                choice
                    .finish_reason
                    .as_deref()
                    .map(FinishReason::from_upstream)
                    .unwrap_or(FinishReason::Stop),
            ),
            logprobs: None,
        })
        .collect();

    Ok(ChatCompletion::assemble(model, created, choices, usage))
}

#[async_trait::async_trait]
impl Provider for CerebrasProvider {
    fn name(&self) -> &'static str {
        "cerebras"
    }

    async fn list_models(&self) -> Result<ModelList, ProviderError> {
        let response = self.client()?.list_models().await?;

        Ok(ModelList::new(
            response
                .data
                .into_iter()
                .map(|model| {
                    ModelCard::new(
                        model.id,
                        model.created.unwrap_or_else(unix_now),
                        model.owned_by.unwrap_or_else(|| "cerebras".to_string()),
                    )
                })
                .collect(),
        ))
    }

    async fn embeddings(
        &self,
        request: EmbeddingsRequest,
    ) -> Result<EmbeddingsResponse, ProviderError> {
        let client = self.client()?;

        let payload = CerebrasEmbeddingsPayload {
            model: request.model.clone(),
            input: request.input,
            dimensions: request.dimensions,
            user: request.user,
        };

        debug!(model = %payload.model, "embedding via cloud service");

        let response = client.embeddings(&payload).await?;
        let usage = response
            .usage
            .map(|usage| EmbeddingsUsage {
                prompt_tokens: usage.prompt_tokens.unwrap_or(0),
                total_tokens: usage
                    .prompt_tokens
                    .unwrap_or(0)
                    .saturating_add(usage.completion_tokens.unwrap_or(0)),
            })
            .unwrap_or_default();

        // Vectors arrive indexed; reassemble in input order.
        let mut data: Vec<_> = response.data.into_iter().enumerate().collect();
        data.sort_by_key(|(position, item)| item.index.unwrap_or(*position as u32));

        Ok(EmbeddingsResponse::assemble(
            request.model,
            data.into_iter().map(|(_, item)| item.embedding).collect(),
            usage,
        ))
    }

    async fn chat_completions(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletion, ProviderError> {
        if request.wants_stream() {
            return Err(ProviderError::UnaryStream);
        }

        let client = self.client()?;
        let payload = chat_payload(&request);
        let response = client.chat(&payload).await?;

        map_chat_response(&request.model, response)
    }
}
