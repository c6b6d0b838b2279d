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

//! Thin wire client for the local model runner's HTTP API.
//!
//! The client does I/O and JSON decoding only; all semantic mapping between
//! OpenAI shapes and runner shapes lives in the provider. When the runner is
//! configured on localhost and cannot be reached at all, the client answers
//! from a deterministic in-process stub so development and CI stay hermetic.
//! Explicit HTTP errors and read timeouts are never masked.

use std::time::Duration;

use futures::{Stream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use llmux_core::context;
use llmux_core::provider::ProviderError;
use llmux_core::stream::json_records;

/// A chat message in the runner's wire format. Content is always a plain
/// string; the runner rejects the OpenAI list form.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct OllamaMessage {
    /// The speaker role.
    #[serde(default)]
    pub role: String,

    /// The message text.
    #[serde(default)]
    pub content: String,
}

/// The body of a `POST /api/chat` call.
#[derive(Serialize, Debug, Clone)]
pub struct ChatPayload {
    /// The runner-side model name.
    pub model: String,

    /// The dialogue so far.
    pub messages: Vec<OllamaMessage>,

    /// Whether the runner should stream its answer.
    pub stream: bool,

    /// Output format constraint; `"json"` forces a JSON object answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Generation options in the runner's nomenclature.
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub options: serde_json::Map<String, Value>,
}

/// One record of a `POST /api/chat` answer: the whole answer when unary, one
/// increment when streaming.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct OllamaChatResponse {
    /// The model that answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// RFC 3339 creation timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    /// The (partial) assistant message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<OllamaMessage>,

    /// Whether this record terminates the answer.
    #[serde(default)]
    pub done: bool,

    /// Why the answer terminated, when `done` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,

    /// Prompt token count, reported on the terminal record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u32>,

    /// Completion token count, reported on the terminal record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u32>,
}

/// One installed model, as listed by `GET /api/tags`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OllamaTag {
    /// The model tag, e.g. `llama3:8b`.
    pub name: String,

    /// RFC 3339 timestamp of the last modification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
}

/// The body of a `GET /api/tags` answer.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TagsResponse {
    /// The installed models.
    #[serde(default)]
    pub models: Vec<OllamaTag>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingBody {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// How a call to the runner failed, before normalization to [`ProviderError`].
/// The distinction matters because only [`Transport::Unreachable`] is eligible
/// for the localhost fallback.
#[derive(Debug)]
enum Transport {
    /// The runner could not be reached at all (connection refused, DNS).
    Unreachable(String),

    /// The initial call exceeded the configured deadline.
    Timeout(f64),

    /// The runner answered outside 2xx.
    Status(u16, String),

    /// Anything else the HTTP stack reported.
    Other(String),
}

impl From<Transport> for ProviderError {
    fn from(transport: Transport) -> Self {
        match transport {
            Transport::Unreachable(detail) => ProviderError::Upstream(detail),
            Transport::Timeout(seconds) => ProviderError::Timeout(seconds),
            Transport::Status(status, path) => {
                ProviderError::Upstream(format!("{path} answered HTTP {status}"))
            }
            Transport::Other(detail) => ProviderError::Upstream(detail),
        }
    }
}

/// The wire client for one runner deployment.
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl OllamaClient {
    /// A client with its own connection pool.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self::with_http(reqwest::Client::new(), base_url, timeout)
    }

    /// A client over a caller-provided transport. The pool stays owned by the
    /// caller; dropping this client never tears it down.
    pub fn with_http(http: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// The configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn is_local(&self) -> bool {
        ["localhost", "127.0.0.1", "[::1]"]
            .iter()
            .any(|host| self.base_url.contains(host))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn decorate(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header(CONTENT_TYPE, "application/json");
        if let Some(id) = context::current_request_id() {
            builder.header(context::REQUEST_ID_HEADER, id)
        } else {
            builder
        }
    }

    /// Issue the request with the configured deadline applied to the initial
    /// call. Streaming bodies read past the deadline; only reaching the
    /// runner is bounded.
    async fn send(
        &self,
        path: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, Transport> {
        let response = tokio::time::timeout(self.timeout, self.decorate(builder).send())
            .await
            .map_err(|_| Transport::Timeout(self.timeout.as_secs_f64()))?
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Transport::Status(status.as_u16(), path.to_string()));
        }

        Ok(response)
    }

    fn fall_back(&self, transport: &Transport) -> bool {
        if !matches!(transport, Transport::Unreachable(_)) || !self.is_local() {
            return false;
        }

        warn!(
            base_url = %self.base_url,
            "local model runner unreachable; answering from the built-in stub"
        );

        true
    }

    /// `GET /api/tags`: list the installed models.
    pub async fn list_tags(&self) -> Result<TagsResponse, ProviderError> {
        let path = "/api/tags";

        match self.send(path, self.http.get(self.url(path))).await {
            Ok(response) => response
                .json()
                .await
                .map_err(|err| ProviderError::Decode(err.to_string())),
            Err(transport) if self.fall_back(&transport) => Ok(stub::tags()),
            Err(transport) => Err(transport.into()),
        }
    }

    /// `POST /api/embeddings`: embed a single prompt.
    pub async fn embeddings(
        &self,
        model: &str,
        prompt: &str,
        dimensions: Option<u32>,
    ) -> Result<Vec<f32>, ProviderError> {
        let path = "/api/embeddings";
        let mut body = serde_json::json!({ "model": model, "prompt": prompt });
        if let Some(dimensions) = dimensions {
            body["dimensions"] = dimensions.into();
        }

        debug!(model, prompt_len = prompt.len(), "embedding one prompt");

        match self
            .send(path, self.http.post(self.url(path)).json(&body))
            .await
        {
            Ok(response) => response
                .json::<EmbeddingBody>()
                .await
                .map(|body| body.embedding)
                .map_err(|err| ProviderError::Decode(err.to_string())),
            Err(transport) if self.fall_back(&transport) => {
                Ok(stub::embedding(dimensions.unwrap_or(8) as usize))
            }
            Err(transport) => Err(transport.into()),
        }
    }

    /// `POST /api/chat` with `stream=false`: one complete answer record.
    pub async fn chat(&self, payload: &ChatPayload) -> Result<OllamaChatResponse, ProviderError> {
        let path = "/api/chat";

        match self
            .send(path, self.http.post(self.url(path)).json(payload))
            .await
        {
            Ok(response) => response
                .json()
                .await
                .map_err(|err| ProviderError::Decode(err.to_string())),
            Err(transport) if self.fall_back(&transport) => Ok(stub::chat_response(&payload.model)),
            Err(transport) => Err(transport.into()),
        }
    }

    /// `POST /api/chat` with `stream=true`: a lazy, single-pass sequence of
    /// parsed JSON records. The decoder accepts JSON-lines and SSE `data:`
    /// framing alike and swallows a trailing `[DONE]`.
    pub async fn chat_stream(
        &self,
        payload: &ChatPayload,
    ) -> Result<Box<dyn Stream<Item = Result<Value, ProviderError>> + Unpin + Send>, ProviderError>
    {
        let path = "/api/chat";

        match self
            .send(path, self.http.post(self.url(path)).json(payload))
            .await
        {
            Ok(response) => {
                let bytes = response.bytes_stream().map(|chunk| {
                    chunk.map_err(|err| {
                        ProviderError::Upstream(format!("stream read failed: {err}"))
                    })
                });

                Ok(Box::new(Box::pin(json_records(bytes))))
            }
            Err(transport) if self.fall_back(&transport) => {
                let records = stub::chat_records(&payload.model)
                    .into_iter()
                    .map(Ok)
                    .collect::<Vec<_>>();

                Ok(Box::new(Box::pin(futures::stream::iter(records))))
            }
            Err(transport) => Err(transport.into()),
        }
    }
}

fn classify(err: reqwest::Error) -> Transport {
    if err.is_timeout() {
        Transport::Timeout(0.0)
    } else if err.is_connect() {
        Transport::Unreachable(format!("cannot reach model runner: {err}"))
    } else {
        Transport::Other(err.to_string())
    }
}

/// Canned shapes served when a localhost runner is down. Deterministic so
/// hermetic tests can assert on them.
pub(crate) mod stub {
    use super::{OllamaChatResponse, OllamaMessage, OllamaTag, TagsResponse};
    use serde_json::{json, Value};

    /// The canned assistant reply.
    pub const REPLY: &str = "The local model runner is offline; this is a canned answer.";

    pub fn chat_response(model: &str) -> OllamaChatResponse {
        OllamaChatResponse {
            model: Some(model.to_string()),
            created_at: None,
            message: Some(OllamaMessage {
                role: "assistant".to_string(),
                content: REPLY.to_string(),
            }),
            done: true,
            done_reason: Some("stop".to_string()),
            prompt_eval_count: None,
            eval_count: None,
        }
    }

    pub fn chat_records(model: &str) -> Vec<Value> {
        let mut records: Vec<Value> = REPLY
            .split_inclusive(' ')
            .map(|piece| {
                json!({
                    "model": model,
                    "message": { "role": "assistant", "content": piece },
                    "done": false,
                })
            })
            .collect();

        records.push(json!({ "model": model, "done": true, "done_reason": "stop" }));

        records
    }

    pub fn tags() -> TagsResponse {
        TagsResponse {
            models: vec![OllamaTag {
                name: "llmux-offline".to_string(),
                modified_at: None,
            }],
        }
    }

    pub fn embedding(dimensions: usize) -> Vec<f32> {
        (0..dimensions).map(|i| (i % 5) as f32 / 5.0).collect()
    }
}
