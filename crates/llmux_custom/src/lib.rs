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

//! The deterministic "custom" provider behind the gateway's own `/v1`
//! namespace: fixed answers, no upstream, no network. Used for development
//! and hermetic testing.

#![deny(unsafe_code)]

use tracing::info;

use llmux_core::openai::{
    unix_now, ChatCompletion, ChatCompletionChoice, ChatCompletionRequest, ChatCompletionUsage,
    ChatMessage, EmbeddingsRequest, EmbeddingsResponse, EmbeddingsUsage, FinishReason, ModelCard,
    ModelList,
};
use llmux_core::provider::{Provider, ProviderError};

/// The fixed assistant reply returned for every chat completion.
pub const ECHO_REPLY: &str =
    "This is a deterministic response from the llmux custom provider.";

/// The vector length used when the caller does not request `dimensions`.
pub const DEFAULT_EMBEDDING_DIM: usize = 8;

/// The static model catalog advertised on `/v1/models`.
const CATALOG: &[(&str, i64)] = &[
    ("llmux-echo", 1_700_000_000),
    ("llmux-echo-mini", 1_700_000_000),
];

/// The deterministic echo provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct CustomProvider;

impl CustomProvider {
    /// A new echo provider. Stateless; all instances are interchangeable.
    pub fn new() -> Self {
        Self
    }
}

fn embedding_for(index: usize, dimensions: usize) -> Vec<f32> {
    // Deterministic per (item, position): hermetic tests can assert on exact
    // vectors.
    (0..dimensions)
        .map(|position| ((index * 31 + position * 7) % 13) as f32 / 13.0)
        .collect()
}

#[async_trait::async_trait]
impl Provider for CustomProvider {
    fn name(&self) -> &'static str {
        "custom"
    }

    async fn list_models(&self) -> Result<ModelList, ProviderError> {
        Ok(ModelList::new(
            CATALOG
                .iter()
                .map(|(id, created)| ModelCard::new(*id, *created, "llmux"))
                .collect(),
        ))
    }

    async fn embeddings(
        &self,
        request: EmbeddingsRequest,
    ) -> Result<EmbeddingsResponse, ProviderError> {
        let dimensions = request
            .dimensions
            .map(|dimensions| dimensions as usize)
            .unwrap_or(DEFAULT_EMBEDDING_DIM);
        let count = request.input.len();

        info!(
            model = %request.model,
            inputs = count,
            dimensions,
            "custom provider serving embeddings"
        );

        let vectors = (0..count)
            .map(|index| embedding_for(index, dimensions))
            .collect();

        Ok(EmbeddingsResponse::assemble(
            request.model,
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

        // Message bodies are never logged, only their count.
        info!(
            model = %request.model,
            messages = request.messages.len(),
            "custom provider serving chat completion"
        );

        Ok(ChatCompletion::assemble(
            request.model,
            unix_now(),
            vec![ChatCompletionChoice {
                index: 0,
                message: ChatMessage::assistant(ECHO_REPLY),
                finish_reason: Some(FinishReason::Stop),
                logprobs: None,
            }],
            ChatCompletionUsage::default(),
        ))
    }
}
