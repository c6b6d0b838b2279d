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

//! The provider capability set.
//!
//! A provider is a bound implementation translating the OpenAI capability set
//! to one specific upstream. Providers own their upstream clients and live for
//! the whole process; the router only holds shared references to them.

use futures::Stream;
use thiserror::Error;

use crate::openai::{
    ChatCompletion, ChatCompletionChunk, ChatCompletionRequest, EmbeddingsRequest,
    EmbeddingsResponse, ModelList,
};

/// A lazy, single-pass, finite sequence of completion chunks. Not restartable.
pub type ChunkStream = Box<dyn Stream<Item = Result<ChatCompletionChunk, ProviderError>> + Unpin + Send>;

/// An error raised by a provider. No other error type escapes a provider
/// method.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The upstream transport failed, or the upstream answered outside 2xx.
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// The initial upstream call did not complete within the configured
    /// deadline.
    #[error("upstream request timed out after {0:.1}s")]
    Timeout(f64),

    /// The upstream answered with a payload the gateway could not decode.
    #[error("failed to decode upstream response: {0}")]
    Decode(String),

    /// The provider cannot be exercised without credentials that were not
    /// configured.
    #[error("missing upstream credentials: {0}")]
    Credentials(String),

    /// The requested capability is unavailable on this provider.
    #[error("{0}")]
    NotImplemented(String),

    /// `stream=true` reached a unary chat completion call.
    #[error("streaming requests must be dispatched to the streaming endpoint")]
    UnaryStream,
}

impl ProviderError {
    /// Whether this error maps onto "feature unavailable" rather than an
    /// upstream failure.
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, ProviderError::NotImplemented(_))
    }
}

/// A bound upstream translation layer, exposing the OpenAI capability set.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Short identifier used in routing and log records.
    fn name(&self) -> &'static str;

    /// List the models this provider can serve.
    async fn list_models(&self) -> Result<ModelList, ProviderError>;

    /// Embed the request input(s), preserving input order in the response.
    async fn embeddings(
        &self,
        request: EmbeddingsRequest,
    ) -> Result<EmbeddingsResponse, ProviderError>;

    /// Generate a unary chat completion.
    ///
    /// Implementations reject `stream=true` with
    /// [`ProviderError::UnaryStream`]; streaming goes through
    /// [`Provider::stream_chat_completions`].
    async fn chat_completions(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletion, ProviderError>;

    /// Generate a streamed chat completion.
    ///
    /// Only providers with a natively streaming upstream implement this; the
    /// default answers "not implemented", which the HTTP layer surfaces as
    /// `501` rather than `502`.
    async fn stream_chat_completions(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChunkStream, ProviderError> {
        let _ = request;
        Err(ProviderError::NotImplemented(format!(
            "streaming chat completions are not available on the {} provider",
            self.name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openai::{ChatCompletionUsage, ChatMessage, ChatCompletionChoice, FinishReason};

    struct Unary;

    #[async_trait::async_trait]
    impl Provider for Unary {
        fn name(&self) -> &'static str {
            "unary"
        }

        async fn list_models(&self) -> Result<ModelList, ProviderError> {
            Ok(ModelList::new(vec![]))
        }

        async fn embeddings(
            &self,
            request: EmbeddingsRequest,
        ) -> Result<EmbeddingsResponse, ProviderError> {
            Ok(EmbeddingsResponse::assemble(
                request.model,
                vec![],
                Default::default(),
            ))
        }

        async fn chat_completions(
            &self,
            request: ChatCompletionRequest,
        ) -> Result<ChatCompletion, ProviderError> {
            Ok(ChatCompletion::assemble(
                request.model,
                1,
                vec![ChatCompletionChoice {
                    index: 0,
                    message: ChatMessage::assistant("ok"),
                    finish_reason: Some(FinishReason::Stop),
                    logprobs: None,
                }],
                ChatCompletionUsage::default(),
            ))
        }
    }

    #[tokio::test]
    async fn streaming_defaults_to_not_implemented() {
        let request: ChatCompletionRequest = serde_json::from_str(
            r#"{"model":"m","messages":[{"role":"user","content":"x"}],"stream":true}"#,
        )
        .unwrap();

        let err = Unary.stream_chat_completions(request).await.err().unwrap();
        assert!(err.is_not_implemented());
        assert!(err.to_string().contains("unary"));
    }
}
