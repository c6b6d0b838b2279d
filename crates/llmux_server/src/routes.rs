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

//! Contains all routes served by the gateway.
//!
//! Three namespaces expose the same capability surface, each bound to one
//! provider: `/v1` (custom echo), `/cerebras/v1` (cloud), `/ollama/v1`
//! (local runner). The unauthenticated health probe lives at the root.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::Router;

use llmux_core::provider::Provider;
use llmux_core::settings::Settings;

use llmux_cerebras::CerebrasProvider;
use llmux_custom::CustomProvider;
use llmux_ollama::OllamaProvider;

use crate::auth;
use crate::error::ErrorEnvelope;
use crate::misc;
use crate::openai;

/// The provider instances the router dispatches to. Owned by the composition
/// root; the router holds shared references.
#[derive(Clone)]
pub struct ProviderRegistry {
    /// The deterministic echo provider behind `/v1`.
    pub custom: Arc<dyn Provider>,

    /// The local-runner provider behind `/ollama/v1`.
    pub ollama: Arc<dyn Provider>,

    /// The cloud provider behind `/cerebras/v1`.
    pub cerebras: Arc<dyn Provider>,
}

impl ProviderRegistry {
    /// The production wiring: one provider per configured upstream.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            custom: Arc::new(CustomProvider::new()),
            ollama: Arc::new(OllamaProvider::from_settings(settings)),
            cerebras: Arc::new(CerebrasProvider::from_settings(settings)),
        }
    }

    /// Arbitrary wiring, for tests substituting providers.
    pub fn new(
        custom: Arc<dyn Provider>,
        ollama: Arc<dyn Provider>,
        cerebras: Arc<dyn Provider>,
    ) -> Self {
        Self {
            custom,
            ollama,
            cerebras,
        }
    }
}

/// The full route table, without middleware layers.
pub fn routes(registry: &ProviderRegistry) -> Router {
    Router::new()
        // -- Health -----------------------------------------------------------
        .route("/healthz", axum::routing::get(misc::healthz))
        // -- Provider namespaces ----------------------------------------------
        .nest("/v1", provider_routes(registry.custom.clone()))
        .nest("/cerebras/v1", provider_routes(registry.cerebras.clone()))
        .nest("/ollama/v1", provider_routes(registry.ollama.clone()))
        // -- Everything else --------------------------------------------------
        .fallback(unknown_route)
}

/// The capability surface of one provider namespace, gated by bearer auth.
fn provider_routes(provider: Arc<dyn Provider>) -> Router {
    Router::new()
        .route("/models", axum::routing::get(openai::models))
        .route("/embeddings", axum::routing::post(openai::embeddings))
        .route(
            "/chat/completions",
            axum::routing::post(openai::chat_completions),
        )
        .route_layer(axum::middleware::from_fn(auth::require_bearer))
        .with_state(provider)
}

/// Unknown paths, including unknown provider namespaces, answer 404 with the
/// standard envelope.
async fn unknown_route() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorEnvelope::of(
            "not_found",
            "unknown route or provider namespace",
        )),
    )
        .into_response()
}
