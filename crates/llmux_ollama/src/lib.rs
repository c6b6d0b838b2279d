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

//! The local-runner provider: translates the OpenAI capability set onto the
//! runner's `/api/chat`, `/api/embeddings` and `/api/tags` endpoints. This is
//! the only provider with a natively streaming upstream, and therefore the
//! only one implementing [`Provider::stream_chat_completions`].

#![deny(unsafe_code)]

use either::Either;
use futures::StreamExt;
use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

use llmux_core::openai::{
    completion_id, unix_now, ChatCompletion, ChatCompletionChoice, ChatCompletionChunk,
    ChatCompletionRequest, ChatCompletionUsage, ChatMessage, ChatMessages, EmbeddingsRequest,
    EmbeddingsResponse, EmbeddingsUsage, FinishReason, ModelCard, ModelList,
};
use llmux_core::provider::{ChunkStream, Provider, ProviderError};
use llmux_core::settings::Settings;

pub mod client;

use client::{ChatPayload, OllamaChatResponse, OllamaClient, OllamaMessage};

/// The provider bound to one local-runner deployment.
pub struct OllamaProvider {
    client: OllamaClient,
}

impl OllamaProvider {
    /// Build the provider against the configured runner base URL.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            client: OllamaClient::new(settings.ollama_host.clone(), settings.timeout()),
        }
    }

    /// Build the provider over a preconstructed client. Test entry point.
    pub fn with_client(client: OllamaClient) -> Self {
        Self { client }
    }

    fn chat_payload(request: &ChatCompletionRequest, stream: bool) -> ChatPayload {
        ChatPayload {
            model: request.model.clone(),
            messages: messages_for_upstream(&request.messages),
            stream,
            format: request.wants_json_object().then(|| "json".to_string()),
            options: build_options(request),
        }
    }
}

/// Project OpenAI messages onto the runner's wire shape.
///
/// The runner answers HTTP 400 to list-form content, so typed parts are
/// concatenated into a single string before being (re-)offered upstream.
fn messages_for_upstream(messages: &ChatMessages) -> Vec<OllamaMessage> {
    messages
        .iter()
        .map(|message| OllamaMessage {
            role: message.role().to_string(),
            content: message.text().unwrap_or_default(),
        })
        .collect()
}

/// Build the runner options map from an OpenAI request.
///
/// Names the runner understands are translated (`max_tokens` →
/// `num_predict`, `stop` always a list); everything else the runner may learn
/// to use is captured as-is.
fn build_options(request: &ChatCompletionRequest) -> Map<String, Value> {
    let mut options = Map::new();

    if let Some(max_tokens) = request.max_tokens {
        options.insert("num_predict".to_string(), max_tokens.into());
    }

    match &request.stop {
        Some(Either::Left(phrase)) => {
            options.insert("stop".to_string(), Value::from(vec![phrase.clone()]));
        }
        Some(Either::Right(phrases)) => {
            options.insert("stop".to_string(), Value::from(phrases.clone()));
        }
        None => {}
    }

    if let Some(temperature) = request.temperature {
        options.insert("temperature".to_string(), temperature.into());
    }
    if let Some(top_p) = request.top_p {
        options.insert("top_p".to_string(), top_p.into());
    }
    if let Some(top_k) = request.top_k {
        options.insert("top_k".to_string(), top_k.into());
    }
    if let Some(seed) = request.seed {
        options.insert("seed".to_string(), seed.into());
    }
    if let Some(presence_penalty) = request.presence_penalty {
        options.insert("presence_penalty".to_string(), presence_penalty.into());
    }
    if let Some(frequency_penalty) = request.frequency_penalty {
        options.insert("frequency_penalty".to_string(), frequency_penalty.into());
    }
    if let Some(logprobs) = request.logprobs {
        options.insert("logprobs".to_string(), logprobs.into());
    }
    if let Some(n) = request.n {
        options.insert("n".to_string(), n.into());
    }
    if let Some(user) = &request.user {
        options.insert("user".to_string(), user.clone().into());
    }
    if let Some(logit_bias) = &request.logit_bias {
        if let Ok(value) = serde_json::to_value(logit_bias) {
            options.insert("logit_bias".to_string(), value);
        }
    }
    if let Some(tools) = &request.tools {
        if let Ok(value) = serde_json::to_value(tools) {
            options.insert("tools".to_string(), value);
        }
    }
    if let Some(tool_choice) = &request.tool_choice {
        let value = match tool_choice {
            Either::Left(name) => Value::String(name.clone()),
            Either::Right(stub) => serde_json::to_value(stub).unwrap_or(Value::Null),
        };
        options.insert("tool_choice".to_string(), value);
    }
    if let Some(function_call) = &request.function_call {
        options.insert("function_call".to_string(), function_call.clone());
    }

    if request.wants_json_object() {
        options.insert("structured".to_string(), true.into());
    }

    options
}

/// Epoch seconds from an RFC 3339 upstream timestamp, falling back to "now"
/// when the timestamp is absent or unparseable.
fn created_from(created_at: Option<&str>) -> i64 {
    created_at
        .and_then(|raw| OffsetDateTime::parse(raw, &Rfc3339).ok())
        .map(|moment| moment.unix_timestamp())
        .unwrap_or_else(unix_now)
}

fn finish_reason_of(record: &OllamaChatResponse) -> Option<FinishReason> {
    match record.done_reason.as_deref() {
        Some(reason) => Some(FinishReason::from_upstream(reason)),
        None => record.done.then_some(FinishReason::Stop),
    }
}

/// Shape one upstream stream record into an OpenAI chunk carrying the
/// stream-constant identity.
fn chunk_from_record(
    id: &str,
    created: i64,
    model: &str,
    value: Value,
) -> Result<ChatCompletionChunk, ProviderError> {
    let record: OllamaChatResponse = serde_json::from_value(value)
        .map_err(|err| ProviderError::Decode(format!("unexpected stream record: {err}")))?;

    if record.done {
        let reason = finish_reason_of(&record).unwrap_or(FinishReason::Stop);
        Ok(ChatCompletionChunk::finished(id, created, model, reason))
    } else {
        let piece = record
            .message
            .map(|message| message.content)
            .unwrap_or_default();
        Ok(ChatCompletionChunk::content(id, created, model, piece))
    }
}

#[async_trait::async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn list_models(&self) -> Result<ModelList, ProviderError> {
        let tags = self.client.list_tags().await?;

        Ok(ModelList::new(
            tags.models
                .into_iter()
                .map(|tag| {
                    let created = created_from(tag.modified_at.as_deref());
                    ModelCard::new(tag.name, created, "library")
                })
                .collect(),
        ))
    }

    async fn embeddings(
        &self,
        request: EmbeddingsRequest,
    ) -> Result<EmbeddingsResponse, ProviderError> {
        let model = request.model.clone();
        let dimensions = request.dimensions;
        let prompts = request.input.into_prompts();

        debug!(model = %model, inputs = prompts.len(), "embedding via local runner");

        // One upstream call per input, issued sequentially so response order
        // always matches input order.
        let mut vectors = Vec::with_capacity(prompts.len());
        for prompt in &prompts {
            vectors.push(self.client.embeddings(&model, prompt, dimensions).await?);
        }

        Ok(EmbeddingsResponse::assemble(
            model,
            vectors,
            EmbeddingsUsage::default(),
        ))
    }

    async fn chat_completions(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletion, ProviderError> {
        if request.wants_stream() {
            return Err(ProviderError::UnaryStream);
        }

        let payload = Self::chat_payload(&request, false);
        let response = self.client.chat(&payload).await?;

        let created = created_from(response.created_at.as_deref());
        let finish_reason = finish_reason_of(&response);
        let usage =
            ChatCompletionUsage::from_counts(response.prompt_eval_count, response.eval_count);
        let content = response
            .message
            .map(|message| message.content)
            .unwrap_or_default();

        Ok(ChatCompletion::assemble(
            request.model,
            created,
            vec![ChatCompletionChoice {
                index: 0,
                message: ChatMessage::assistant(content),
                finish_reason,
                logprobs: None,
            }],
            usage,
        ))
    }

    async fn stream_chat_completions(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChunkStream, ProviderError> {
        let payload = Self::chat_payload(&request, true);
        let records = self.client.chat_stream(&payload).await?;

        let id = completion_id();
        let created = unix_now();
        let model = request.model.clone();

        let chunks = records.map(move |record| {
            record.and_then(|value| chunk_from_record(&id, created, &model, value))
        });

        Ok(Box::new(Box::pin(chunks)))
    }
}
