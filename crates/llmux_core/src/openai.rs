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

//! JSON structures compatible with [OpenAI's API][openai], shared by every
//! provider and by the HTTP surface.
//!
//! Incoming request types are deliberately permissive: known fields are
//! validated, unknown fields are collected into a side-channel map and carried
//! through untouched, so a request aimed at a newer upstream feature still
//! round-trips.
//!
//! [openai]: https://platform.openai.com/docs/api-reference

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use derive_more::{Deref, DerefMut, From};
use either::Either;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tinyvec::TinyVec;
use utoipa::ToSchema;
use uuid::Uuid;

/// Mint a fresh chat completion identifier in the `chatcmpl-<opaque>` form.
pub fn completion_id() -> String {
    format!("chatcmpl-{}", Uuid::new_v4().simple())
}

/// The current UNIX timestamp, in whole seconds.
pub fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// The plaintext or image content of a [`ChatMessage`].
///
/// See [the documentation for creating chat completions][openai] for more
/// details.
///
/// [openai]: https://platform.openai.com/docs/api-reference/chat/create
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(tag = "type")]
pub enum ContentPart {
    /// Plain text.
    #[serde(rename = "text")]
    Text {
        /// The plain text.
        text: String,
    },
    /// A URL to an image.
    #[serde(rename = "image_url")]
    ImageUrl {
        /// The URL, and an optional rendering detail hint.
        image_url: ImageUrl,
    },
}

/// The target of an `image_url` content part.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ImageUrl {
    /// The URL of the image.
    pub url: String,

    /// A detail hint for the image, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Display for ContentPart {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentPart::Text { text } => write!(f, "{}", text),
            ContentPart::ImageUrl { image_url } => {
                if let Some(detail) = &image_url.detail {
                    write!(f, "<IMAGE {}> ({})", image_url.url, detail)
                } else {
                    write!(f, "<IMAGE {}>", image_url.url)
                }
            }
        }
    }
}

/// Message content on the wire: a plain string, or an ordered list of typed
/// parts.
pub type MessageContent = Either<String, Vec<ContentPart>>;

/// Project message content onto a single string, concatenating part text.
///
/// Some upstreams reject the list form outright; this is the projection used
/// before re-offering content to them.
pub fn content_text(content: &MessageContent) -> String {
    match content {
        Either::Left(text) => text.clone(),
        Either::Right(parts) => {
            let mut out = String::new();
            for part in parts {
                out.push_str(&part.to_string());
            }
            out
        }
    }
}

/// A description of a function that an assistant called.
///
/// This is included in [`ChatMessage`]s when the `tool_calls` field is
/// present.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct AssistantToolCall {
    /// A unique identifier for the invocation of this function.
    pub id: String,

    /// The type of the invoked tool.
    ///
    /// OpenAI currently specifies this to always be `function`, but more
    /// variants may be added in the future.
    #[serde(rename = "type")]
    pub type_: String,

    /// The invoked function.
    pub function: AssistantFunctionStub,
}

/// The function invoked by an [`AssistantToolCall`].
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct AssistantFunctionStub {
    /// The name of the function from the assistant's point of view.
    pub name: String,

    /// The arguments passed into the function.
    pub arguments: String,
}

/// A chat message in a multi-user dialogue.
///
/// See [the documentation for creating chat completions][openai] for more
/// details.
///
/// [openai]: https://platform.openai.com/docs/api-reference/chat/create
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(tag = "role")]
pub enum ChatMessage {
    /// A message from the system, typically the initial system prompt.
    #[serde(rename = "system")]
    System {
        /// The content of the message.
        #[serde(with = "either::serde_untagged")]
        #[schema(value_type = String)]
        content: MessageContent,

        /// If present, a name for the system.
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// A message from the developer; treated like a system message by
    /// upstreams that predate the role.
    #[serde(rename = "developer")]
    Developer {
        /// The content of the message.
        #[serde(with = "either::serde_untagged")]
        #[schema(value_type = String)]
        content: MessageContent,

        /// If present, a name for the developer.
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// A message from a user.
    #[serde(rename = "user")]
    User {
        /// The content of the message. This can be a sequence of multiple
        /// plain text or image parts.
        #[serde(with = "either::serde_untagged")]
        #[schema(value_type = String)]
        content: MessageContent,

        /// If present, a name for the user.
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// A message from an assistant.
    #[serde(rename = "assistant")]
    Assistant {
        /// The content of the message, if any.
        #[serde(default, with = "either::serde_untagged_optional")]
        #[schema(value_type = String)]
        content: Option<MessageContent>,

        /// The name of the assistant, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,

        /// If the assistant used any tools in generating this message, the
        /// tools that the assistant used.
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<AssistantToolCall>>,
    },
    /// A message carrying the output of a tool invocation.
    #[serde(rename = "tool")]
    Tool {
        /// The plaintext that the tool generated.
        #[serde(with = "either::serde_untagged")]
        #[schema(value_type = String)]
        content: MessageContent,

        /// A unique identifier for the specific invocation that generated
        /// this message.
        tool_call_id: String,
    },
    /// A legacy function-call result message.
    #[serde(rename = "function")]
    Function {
        /// The plaintext that the function generated, if any.
        #[serde(default, with = "either::serde_untagged_optional")]
        #[schema(value_type = String)]
        content: Option<MessageContent>,

        /// The name of the invoked function.
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl ChatMessage {
    /// A plain assistant message carrying `text`.
    pub fn assistant(text: impl Into<String>) -> Self {
        ChatMessage::Assistant {
            content: Some(Either::Left(text.into())),
            name: None,
            tool_calls: None,
        }
    }

    /// The message content projected onto a single string, if the message
    /// carries content.
    pub fn text(&self) -> Option<String> {
        match self {
            ChatMessage::System { content, .. }
            | ChatMessage::Developer { content, .. }
            | ChatMessage::User { content, .. }
            | ChatMessage::Tool { content, .. } => Some(content_text(content)),
            ChatMessage::Assistant { content, .. } | ChatMessage::Function { content, .. } => {
                content.as_ref().map(content_text)
            }
        }
    }

    /// The wire name of this message's role.
    pub fn role(&self) -> &'static str {
        match self {
            ChatMessage::System { .. } => "system",
            ChatMessage::Developer { .. } => "developer",
            ChatMessage::User { .. } => "user",
            ChatMessage::Assistant { .. } => "assistant",
            ChatMessage::Tool { .. } => "tool",
            ChatMessage::Function { .. } => "function",
        }
    }
}

/// A sequence of chat messages in a [`ChatCompletionRequest`].
#[derive(Serialize, Deserialize, Debug, Clone, Default, Deref, DerefMut, From, ToSchema)]
pub struct ChatMessages(
    #[deref]
    #[deref_mut]
    pub Vec<ChatMessage>,
);

/// A tool made available to an assistant that invokes a named function.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct FunctionStub {
    /// A human-readable description of what the tool does.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// The name of the tool.
    pub name: String,

    /// A [JSON schema][json-schema] describing the parameters that the tool
    /// accepts.
    ///
    /// [json-schema]: https://json-schema.org/
    pub parameters: serde_json::Value,
}

/// A tool made available to an assistant.
///
/// At present, this can only be a [`FunctionStub`], but this enum is marked
/// `#[non_exhaustive]` for the (likely) event that more variants are added in
/// the future.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(tag = "type")]
#[non_exhaustive]
pub enum ToolStub {
    /// A named function that can be invoked by an assistant.
    #[serde(rename = "function")]
    Function {
        /// The named function.
        function: FunctionStub,
    },
}

/// A request to generate chat completions for the provided context.
///
/// Unknown fields are accepted and preserved in [`extra`]; validation runs
/// only on the known fields.
///
/// [`extra`]: ChatCompletionRequest::extra
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ChatCompletionRequest {
    /// The model to use for generating completions.
    pub model: String,

    /// The messages that have been sent in the dialogue so far.
    #[serde(default)]
    pub messages: ChatMessages,

    /// The sampling temperature, in `[0.0, 2.0]`. Higher values make the
    /// output more random.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling: only the tokens comprising the top `top_p`
    /// probability mass are considered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Consider only the `top_k` most likely tokens when sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    /// The maximum number of tokens to generate. If `None`, terminates at the
    /// first stop token or the end of sentence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// How many choices to generate for each token in the output. `1` by
    /// default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,

    /// A stop phrase or set of stop phrases.
    #[serde(
        default,
        with = "either::serde_untagged_optional",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = String)]
    pub stop: Option<Either<String, Vec<String>>>,

    /// A number in `[-2.0, 2.0]`. Positive values "increase the model's
    /// likelihood to talk about new topics."
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    /// A number in `[-2.0, 2.0]`. A higher number decreases the likelihood
    /// that the model repeats itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    /// An RNG seed for the session. Random by default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,

    /// A unique identifier for the _end user_ creating this request, used for
    /// upstream telemetry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// A map of token IDs to `[-100.0, +100.0]`. Adds a bias to those tokens
    /// before sampling; a value of `-100.0` prevents the token from being
    /// selected at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logit_bias: Option<HashMap<String, f32>>,

    /// Whether to return log probabilities of the output tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<bool>,

    /// The number of most-likely tokens to return at each position, when
    /// `logprobs` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_logprobs: Option<u32>,

    /// A list of tools made available to the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolStub>>,

    /// If present, the tool that the user has chosen to use.
    ///
    /// OpenAI states:
    ///
    /// - `none` prevents any tool from being used,
    /// - `auto` allows any tool to be used, or
    /// - you can provide a description of the tool entirely instead of a name.
    #[serde(
        default,
        with = "either::serde_untagged_optional",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = String)]
    pub tool_choice: Option<Either<String, ToolStub>>,

    /// Legacy pre-`tools` function descriptions, passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub functions: Option<serde_json::Value>,

    /// Legacy pre-`tool_choice` function selector, passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<serde_json::Value>,

    /// The requested response format, e.g. `{"type": "json_object"}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,

    /// If `true`, emit [`ChatCompletionChunk`]s over server-sent events
    /// instead of a single [`ChatCompletion`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    /// Options controlling the stream, passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<serde_json::Value>,

    /// Arbitrary caller metadata, passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,

    /// Unknown fields, preserved as-is so nothing a downstream provider needs
    /// is dropped.
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChatCompletionRequest {
    /// Validate the known fields. The permissive remainder is never checked.
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("model must be a non-empty string".to_string());
        }

        if self.messages.is_empty() {
            return Err("messages must contain at least one message".to_string());
        }

        Ok(())
    }

    /// Whether the caller asked for a streamed response.
    pub fn wants_stream(&self) -> bool {
        self.stream.unwrap_or(false)
    }

    /// Whether the caller asked for a JSON-object response format.
    pub fn wants_json_object(&self) -> bool {
        self.response_format
            .as_ref()
            .and_then(|format| format.get("type"))
            .and_then(|kind| kind.as_str())
            .map(|kind| kind == "json_object")
            .unwrap_or(false)
    }
}

/// The reason generation terminated at a choice.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// A stop sequence or the end of sentence was reached.
    Stop,
    /// The length cutoff was reached.
    Length,
    /// Content was withheld by an upstream filter.
    ContentFilter,
    /// The model invoked one or more tools.
    ToolCalls,
}

impl FinishReason {
    /// Map an upstream `done_reason` string onto the OpenAI set, defaulting
    /// to [`FinishReason::Stop`] for unrecognized values.
    pub fn from_upstream(reason: &str) -> Self {
        match reason {
            "length" | "max_tokens" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            "tool_calls" => FinishReason::ToolCalls,
            _ => FinishReason::Stop,
        }
    }
}

/// A single generated choice within a [`ChatCompletion`].
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ChatCompletionChoice {
    /// The index of this choice.
    pub index: u32,

    /// The generated message.
    pub message: ChatMessage,

    /// If present, the reason that generation terminated at this choice.
    pub finish_reason: Option<FinishReason>,

    /// Log-probability information for the choice, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<serde_json::Value>,
}

/// Token statistics about a completed chat completion.
///
/// Counts default to zero when an upstream does not report them.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, ToSchema)]
pub struct ChatCompletionUsage {
    /// The number of tokens in the prompt.
    #[serde(default)]
    pub prompt_tokens: u32,

    /// The number of generated tokens.
    #[serde(default)]
    pub completion_tokens: u32,

    /// `completion_tokens` + `prompt_tokens`.
    #[serde(default)]
    pub total_tokens: u32,
}

impl ChatCompletionUsage {
    /// Build a usage record from optionally-reported upstream counts.
    pub fn from_counts(prompt_tokens: Option<u32>, completion_tokens: Option<u32>) -> Self {
        let prompt_tokens = prompt_tokens.unwrap_or(0);
        let completion_tokens = completion_tokens.unwrap_or(0);
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// A fully generated chat completion.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ChatCompletion {
    /// A unique identifier for this completion, in the `chatcmpl-` form.
    pub id: String,

    /// The object type. This is always `chat.completion`.
    pub object: String,

    /// The UNIX timestamp at which the completion was generated.
    pub created: i64,

    /// The model that generated the completion.
    pub model: String,

    /// The generated choices. Never empty.
    pub choices: Vec<ChatCompletionChoice>,

    /// Usage information about this completion.
    #[serde(default)]
    pub usage: ChatCompletionUsage,
}

impl ChatCompletion {
    /// Assemble a completion with a fresh id and the fixed object tag.
    pub fn assemble(
        model: impl Into<String>,
        created: i64,
        choices: Vec<ChatCompletionChoice>,
        usage: ChatCompletionUsage,
    ) -> Self {
        Self {
            id: completion_id(),
            object: "chat.completion".to_string(),
            created,
            model: model.into(),
            choices,
            usage,
        }
    }
}

/// A delta-encoded difference for an ongoing, stream-mode chat completion.
#[derive(Serialize, Deserialize, Debug, Clone, Default, ToSchema)]
pub struct ChatCompletionChunkDelta {
    /// If present, `content` is being generated under a new role.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// If present, new content added to the end of the completion stream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// A chunk of a stream-mode chat completion.
#[derive(Serialize, Deserialize, Debug, Clone, Default, ToSchema)]
pub struct ChatCompletionChunkChoice {
    /// The index of this choice.
    pub index: u32,

    /// The delta-encoded difference to append to the completion stream.
    pub delta: ChatCompletionChunkDelta,

    /// If present, this choice terminated the completion stream.
    pub finish_reason: Option<FinishReason>,
}

/// A chunk generated in streaming mode from a [`ChatCompletionRequest`].
///
/// The `id` and `created` values are fixed across all chunks of one stream.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ChatCompletionChunk {
    /// The identifier of the completion this chunk belongs to.
    pub id: String,

    /// The object type. This is always `chat.completion.chunk`.
    pub object: String,

    /// The UNIX timestamp at which the stream started.
    pub created: i64,

    /// The model that generated the chunk.
    pub model: String,

    /// The choices advanced by this chunk.
    #[schema(value_type = [ChatCompletionChunkChoice])]
    pub choices: TinyVec<[ChatCompletionChunkChoice; 1]>,
}

impl ChatCompletionChunk {
    /// A chunk carrying a piece of generated content.
    pub fn content(id: &str, created: i64, model: &str, piece: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            object: "chat.completion.chunk".to_string(),
            created,
            model: model.to_string(),
            choices: tinyvec::tiny_vec![ChatCompletionChunkChoice {
                index: 0,
                delta: ChatCompletionChunkDelta {
                    role: None,
                    content: Some(piece.into()),
                },
                finish_reason: None,
            }],
        }
    }

    /// The terminal chunk of a stream: no content, a finish reason.
    pub fn finished(id: &str, created: i64, model: &str, reason: FinishReason) -> Self {
        Self {
            id: id.to_string(),
            object: "chat.completion.chunk".to_string(),
            created,
            model: model.to_string(),
            choices: tinyvec::tiny_vec![ChatCompletionChunkChoice {
                index: 0,
                delta: ChatCompletionChunkDelta::default(),
                finish_reason: Some(reason),
            }],
        }
    }
}

/// The input of an embeddings request: a string, a batch of strings, a token
/// sequence, or a batch of token sequences.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(untagged)]
pub enum EmbeddingsInput {
    /// A single piece of text.
    Text(String),
    /// A batch of texts, each embedded separately.
    TextBatch(Vec<String>),
    /// A single pre-tokenized input.
    Tokens(Vec<i64>),
    /// A batch of pre-tokenized inputs.
    TokenBatches(Vec<Vec<i64>>),
}

impl EmbeddingsInput {
    /// The number of embedding vectors this input produces.
    pub fn len(&self) -> usize {
        match self {
            EmbeddingsInput::Text(_) | EmbeddingsInput::Tokens(_) => 1,
            EmbeddingsInput::TextBatch(batch) => batch.len(),
            EmbeddingsInput::TokenBatches(batches) => batches.len(),
        }
    }

    /// Whether the input holds no items at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten the input into one prompt string per output vector. Token
    /// sequences are rendered as space-separated decimal ids.
    pub fn into_prompts(self) -> Vec<String> {
        fn render(tokens: &[i64]) -> String {
            tokens
                .iter()
                .map(|token| token.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        }

        match self {
            EmbeddingsInput::Text(text) => vec![text],
            EmbeddingsInput::TextBatch(batch) => batch,
            EmbeddingsInput::Tokens(tokens) => vec![render(&tokens)],
            EmbeddingsInput::TokenBatches(batches) => {
                batches.iter().map(|tokens| render(tokens)).collect()
            }
        }
    }
}

/// The encoding requested for embedding vectors.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EncodingFormat {
    /// Plain arrays of floats. The default.
    Float,
    /// Base64-packed little-endian floats.
    Base64,
}

/// A request to embed one or more inputs.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct EmbeddingsRequest {
    /// The model to embed with.
    pub model: String,

    /// The input(s) to embed.
    pub input: EmbeddingsInput,

    /// The number of dimensions the resulting vectors should have, where the
    /// model supports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<u32>,

    /// A unique identifier for the _end user_ creating this request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// The requested vector encoding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding_format: Option<EncodingFormat>,

    /// Unknown fields, preserved as-is.
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl EmbeddingsRequest {
    /// Validate the known fields.
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("model must be a non-empty string".to_string());
        }

        Ok(())
    }
}

/// A single embedding vector and its position within the request input.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct EmbeddingObject {
    /// The object type. This is always `embedding`.
    pub object: String,

    /// The position of the corresponding input.
    pub index: u32,

    /// The embedding vector.
    pub embedding: Vec<f32>,
}

/// Token statistics for an embeddings request.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, ToSchema)]
pub struct EmbeddingsUsage {
    /// The number of tokens in the input(s).
    #[serde(default)]
    pub prompt_tokens: u32,

    /// The total number of tokens consumed.
    #[serde(default)]
    pub total_tokens: u32,
}

/// The list container returned by the embeddings endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct EmbeddingsResponse {
    /// The object type. This is always `list`.
    pub object: String,

    /// One embedding per input item, in input order.
    pub data: Vec<EmbeddingObject>,

    /// The model that produced the embeddings.
    pub model: String,

    /// Usage information about this request.
    #[serde(default)]
    pub usage: EmbeddingsUsage,
}

impl EmbeddingsResponse {
    /// Assemble a response container around ordered vectors.
    pub fn assemble(
        model: impl Into<String>,
        vectors: Vec<Vec<f32>>,
        usage: EmbeddingsUsage,
    ) -> Self {
        Self {
            object: "list".to_string(),
            data: vectors
                .into_iter()
                .enumerate()
                .map(|(index, embedding)| EmbeddingObject {
                    object: "embedding".to_string(),
                    index: index as u32,
                    embedding,
                })
                .collect(),
            model: model.into(),
            usage,
        }
    }
}

/// A model known to a provider.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ModelCard {
    /// The model identifier.
    pub id: String,

    /// The object type. This is always `model`.
    pub object: String,

    /// The UNIX timestamp at which the model was created or last modified.
    pub created: i64,

    /// The party owning the model.
    pub owned_by: String,
}

impl ModelCard {
    /// A model card with the fixed object tag.
    pub fn new(id: impl Into<String>, created: i64, owned_by: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object: "model".to_string(),
            created,
            owned_by: owned_by.into(),
        }
    }
}

/// The list container returned by the models endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ModelList {
    /// The object type. This is always `list`.
    pub object: String,

    /// The models the provider can serve.
    pub data: Vec<ModelCard>,
}

impl ModelList {
    /// A list container around the given cards.
    pub fn new(data: Vec<ModelCard>) -> Self {
        Self {
            object: "list".to_string(),
            data,
        }
    }
}
