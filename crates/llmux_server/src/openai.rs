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

//! Axum endpoints compatible with [OpenAI's API][openai], dispatching to
//! whichever provider the route was mounted with.
//!
//! Dispatch is transport-only: parse and validate the body, await the
//! provider capability method, shape the response. The single branch is
//! `stream=true` versus unary on the chat route.
//!
//! [openai]: https://platform.openai.com/docs/api-reference

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::{future, stream, StreamExt};
use tracing::warn;

use llmux_core::context;
use llmux_core::openai::{
    ChatCompletion, ChatCompletionRequest, EmbeddingsRequest, EmbeddingsResponse, ModelList,
};
use llmux_core::provider::{ChunkStream, Provider};
use llmux_core::stream::DONE_SENTINEL;

use crate::error::{ErrorEnvelope, GatewayError};
use crate::middleware;

/// The provider a route subtree was mounted with.
pub type ProviderRef = Arc<dyn Provider>;

type Payload<T> = Result<Json<T>, JsonRejection>;

fn parsed<T>(payload: Payload<T>) -> Result<T, GatewayError> {
    let Json(request) = payload.map_err(|rejection| {
        GatewayError::Validation(format!("invalid request body: {}", rejection.body_text()))
    })?;

    Ok(request)
}

/// GET `/<ns>/models`: list the models the provider can serve.
#[utoipa::path(
get,
path = "/models",
responses(
(status = 200, description = "OK", body = ModelList),
(status = 401, description = "authentication failed", body = ErrorEnvelope),
(status = 502, description = "upstream failure", body = ErrorEnvelope)
),
)]
pub async fn models(State(provider): State<ProviderRef>) -> Result<Json<ModelList>, GatewayError> {
    Ok(Json(provider.list_models().await?))
}

/// POST `/<ns>/embeddings`: embed the request input(s).
#[utoipa::path(
post,
path = "/embeddings",
request_body = EmbeddingsRequest,
responses(
(status = 200, description = "OK", body = EmbeddingsResponse),
(status = 401, description = "authentication failed", body = ErrorEnvelope),
(status = 422, description = "request body failed validation", body = ErrorEnvelope),
(status = 502, description = "upstream failure", body = ErrorEnvelope)
),
)]
pub async fn embeddings(
    State(provider): State<ProviderRef>,
    payload: Payload<EmbeddingsRequest>,
) -> Result<Json<EmbeddingsResponse>, GatewayError> {
    let request = parsed(payload)?;
    request.validate().map_err(GatewayError::Validation)?;

    Ok(Json(provider.embeddings(request).await?))
}

/// POST `/<ns>/chat/completions`: generate chat completions, optionally
/// streaming them in real time.
///
/// With `stream=true` the response is a server-sent event stream of
/// [`ChatCompletionChunk`][llmux_core::openai::ChatCompletionChunk]s closed
/// by the literal `data: [DONE]` event; otherwise a single JSON-encoded
/// [`ChatCompletion`].
#[utoipa::path(
post,
path = "/chat/completions",
request_body = ChatCompletionRequest,
responses(
(status = 200, description = "OK", body = ChatCompletion),
(status = 401, description = "authentication failed", body = ErrorEnvelope),
(status = 422, description = "request body failed validation", body = ErrorEnvelope),
(status = 501, description = "streaming unavailable on this provider", body = ErrorEnvelope),
(status = 502, description = "upstream failure", body = ErrorEnvelope)
),
)]
pub async fn chat_completions(
    State(provider): State<ProviderRef>,
    payload: Payload<ChatCompletionRequest>,
) -> Result<Response, GatewayError> {
    let request = parsed(payload)?;
    request.validate().map_err(GatewayError::Validation)?;

    if request.wants_stream() {
        // Failures up to this point surface as plain status codes; once the
        // stream below starts, the 200 is committed.
        let chunks = provider.stream_chat_completions(request).await?;

        Ok(sse_response(chunks))
    } else {
        Ok(Json(provider.chat_completions(request).await?).into_response())
    }
}

/// Frame a chunk stream as server-sent events.
///
/// Chunks pass through in upstream arrival order. An upstream failure
/// mid-stream becomes a single error event; consumption stops there. Either
/// way the stream is closed by the `[DONE]` sentinel. The correlation ID is
/// captured by value because the body outlives the handler scope.
fn sse_response(chunks: ChunkStream) -> Response {
    let request_id = context::current_request_id().unwrap_or_default();

    let events = chunks
        .scan(false, move |errored, item| {
            if *errored {
                return future::ready(None);
            }

            let event = match item {
                Ok(chunk) => Event::default().json_data(&chunk),
                Err(err) => {
                    *errored = true;
                    let err = GatewayError::from(err);
                    warn!(request_id = %request_id, "upstream failed mid-stream: {err}");
                    Event::default().json_data(&ErrorEnvelope::from(&err))
                }
            };

            future::ready(Some(event))
        })
        .chain(stream::once(future::ready(Ok(
            Event::default().data(DONE_SENTINEL)
        ))));

    let mut response = Sse::new(events).into_response();
    middleware::no_cache(&mut response);

    response
}
