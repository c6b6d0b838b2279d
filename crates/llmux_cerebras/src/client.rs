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

//! Thin wire client for the cloud inference service.
//!
//! Unlike the local-runner client there is no fallback of any kind: every
//! transport failure propagates for normalization by the provider.

use std::time::Duration;

use either::Either;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use llmux_core::context;
use llmux_core::openai::{ChatMessage, EmbeddingsInput, ToolStub};
use llmux_core::provider::ProviderError;

/// The body of the cloud service's `chat/completions` call. Message content
/// unions are serialized as-is; the service accepts both wire forms.
#[derive(Serialize, Debug, Clone)]
pub struct CerebrasChatPayload {
    /// The cloud-side model name.
    pub model: String,

    /// The dialogue so far, in OpenAI shape.
    pub messages: Vec<ChatMessage>,

    /// Always `false`; the gateway does not stream through this provider.
    pub stream: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(
        with = "either::serde_untagged_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub stop: Option<Either<String, Vec<String>>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolStub>>,

    #[serde(
        with = "either::serde_untagged_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub tool_choice: Option<Either<String, ToolStub>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,
}

/// A message in a cloud chat answer.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct CerebrasMessage {
    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub content: Option<String>,
}

/// One choice in a cloud chat answer.
#[derive(Deserialize, Debug, Clone)]
pub struct CerebrasChoice {
    #[serde(default)]
    pub index: Option<u32>,

    #[serde(default)]
    pub message: CerebrasMessage,

    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Token counts in a cloud answer.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct CerebrasUsage {
    #[serde(default)]
    pub prompt_tokens: Option<u32>,

    #[serde(default)]
    pub completion_tokens: Option<u32>,
}

/// A complete cloud chat answer.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct CerebrasChatResponse {
    #[serde(default)]
    pub created: Option<i64>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub choices: Vec<CerebrasChoice>,

    #[serde(default)]
    pub usage: Option<CerebrasUsage>,
}

/// One model descriptor in a cloud models answer.
#[derive(Deserialize, Debug, Clone)]
pub struct CerebrasModel {
    pub id: String,

    #[serde(default)]
    pub created: Option<i64>,

    #[serde(default)]
    pub owned_by: Option<String>,
}

/// The cloud models list container.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct CerebrasModelsResponse {
    #[serde(default)]
    pub data: Vec<CerebrasModel>,
}

/// One embedding vector in a cloud embeddings answer.
#[derive(Deserialize, Debug, Clone)]
pub struct CerebrasEmbedding {
    #[serde(default)]
    pub index: Option<u32>,

    #[serde(default)]
    pub embedding: Vec<f32>,
}

/// The cloud embeddings answer.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct CerebrasEmbeddingsResponse {
    #[serde(default)]
    pub data: Vec<CerebrasEmbedding>,

    #[serde(default)]
    pub usage: Option<CerebrasUsage>,
}

/// The body of the cloud embeddings call.
#[derive(Serialize, Debug, Clone)]
pub struct CerebrasEmbeddingsPayload {
    pub model: String,

    /// Forwarded verbatim; the service accepts the same input union the
    /// gateway does.
    pub input: EmbeddingsInput,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// The wire client for the cloud service.
pub struct CerebrasClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl CerebrasClient {
    /// A client with its own connection pool.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self::with_http(reqwest::Client::new(), api_key, base_url, timeout)
    }

    /// A client over a caller-provided transport. The pool stays owned by the
    /// caller.
    pub fn with_http(
        http: reqwest::Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        path: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ProviderError> {
        let mut builder = builder
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key));
        if let Some(id) = context::current_request_id() {
            builder = builder.header(context::REQUEST_ID_HEADER, id);
        }

        let response = tokio::time::timeout(self.timeout, builder.send())
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout.as_secs_f64()))?
            .map_err(|err| {
                if err.is_timeout() {
                    ProviderError::Timeout(self.timeout.as_secs_f64())
                } else {
                    ProviderError::Upstream(format!("cloud request failed: {err}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Upstream(format!(
                "{path} answered HTTP {status}"
            )));
        }

        Ok(response)
    }

    /// `POST /v1/chat/completions`.
    pub async fn chat(
        &self,
        payload: &CerebrasChatPayload,
    ) -> Result<CerebrasChatResponse, ProviderError> {
        let path = "/v1/chat/completions";
        let response = self
            .send(path, self.http.post(self.url(path)).json(payload))
            .await?;

        response
            .json()
            .await
            .map_err(|err| ProviderError::Decode(err.to_string()))
    }

    /// `GET /v1/models`.
    pub async fn list_models(&self) -> Result<CerebrasModelsResponse, ProviderError> {
        let path = "/v1/models";
        let response = self.send(path, self.http.get(self.url(path))).await?;

        response
            .json()
            .await
            .map_err(|err| ProviderError::Decode(err.to_string()))
    }

    /// `POST /v1/embeddings`.
    pub async fn embeddings(
        &self,
        payload: &CerebrasEmbeddingsPayload,
    ) -> Result<CerebrasEmbeddingsResponse, ProviderError> {
        let path = "/v1/embeddings";
        let response = self
            .send(path, self.http.post(self.url(path)).json(payload))
            .await?;

        response
            .json()
            .await
            .map_err(|err| ProviderError::Decode(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_preserves_content_unions() {
        let messages: Vec<ChatMessage> = serde_json::from_str(
            r#"[
                {"role": "user", "content": "plain"},
                {"role": "user", "content": [{"type": "text", "text": "parts"}]}
            ]"#,
        )
        .unwrap();

        let payload = CerebrasChatPayload {
            model: "llama3.1-8b".to_string(),
            messages,
            stream: false,
            temperature: Some(0.1),
            top_p: None,
            max_tokens: None,
            stop: None,
            seed: None,
            user: None,
            tools: None,
            tool_choice: None,
            response_format: None,
        };

        let encoded = serde_json::to_value(&payload).unwrap();
        assert_eq!(encoded["messages"][0]["content"], "plain");
        assert_eq!(encoded["messages"][1]["content"][0]["text"], "parts");
        assert!(encoded.get("top_p").is_none());
        assert_eq!(encoded["stream"], false);
    }

    #[test]
    fn decodes_a_minimal_chat_answer() {
        let answer: CerebrasChatResponse = serde_json::from_str(
            r#"{
                "id": "chatcmpl-upstream",
                "object": "chat.completion",
                "created": 1700000000,
                "model": "llama3.1-8b",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "hi"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4}
            }"#,
        )
        .unwrap();

        assert_eq!(answer.created, Some(1_700_000_000));
        assert_eq!(answer.choices[0].message.content.as_deref(), Some("hi"));
        assert_eq!(answer.usage.unwrap().prompt_tokens, Some(3));
    }

    #[test]
    fn base_url_is_normalized() {
        let client = CerebrasClient::new("k", "https://api.test/", Duration::from_secs(1));
        assert_eq!(client.url("/v1/models"), "https://api.test/v1/models");
    }
}
