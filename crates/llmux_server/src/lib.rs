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

//! A provider-agnostic, OpenAI-compatible HTTP gateway for LLM inference.
//!
//! Clients speaking the OpenAI chat-completions / embeddings / models REST
//! protocols point at this gateway unchanged; three namespaces route to a
//! local model runner, a cloud inference service, or a deterministic echo
//! provider for development.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use axum::Router;
use tracing::{info, warn};
use utoipa::OpenApi;

use llmux_core::settings::{LogLevel, Settings, SETTINGS};

#[macro_use]
pub mod misc;

pub mod auth;
pub mod cli;
pub mod error;
pub mod middleware;
pub mod openai;
pub mod redact;
pub mod routes;

pub use routes::ProviderRegistry;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "llmux API",
        description = "OpenAI-compatible multi-provider LLM gateway.",
    ),
    paths(
        misc::healthz,
        openai::models,
        openai::embeddings,
        openai::chat_completions
    ),
    components(schemas(
        misc::Health,
        error::ErrorEnvelope,
        error::ErrorBody,
        llmux_core::openai::ChatCompletionRequest,
        llmux_core::openai::ChatCompletion,
        llmux_core::openai::ChatCompletionChoice,
        llmux_core::openai::ChatCompletionUsage,
        llmux_core::openai::ChatCompletionChunk,
        llmux_core::openai::ChatCompletionChunkChoice,
        llmux_core::openai::ChatCompletionChunkDelta,
        llmux_core::openai::ChatMessage,
        llmux_core::openai::ChatMessages,
        llmux_core::openai::ContentPart,
        llmux_core::openai::ImageUrl,
        llmux_core::openai::ToolStub,
        llmux_core::openai::FunctionStub,
        llmux_core::openai::AssistantToolCall,
        llmux_core::openai::AssistantFunctionStub,
        llmux_core::openai::FinishReason,
        llmux_core::openai::EmbeddingsRequest,
        llmux_core::openai::EmbeddingsResponse,
        llmux_core::openai::EmbeddingsInput,
        llmux_core::openai::EmbeddingObject,
        llmux_core::openai::EmbeddingsUsage,
        llmux_core::openai::EncodingFormat,
        llmux_core::openai::ModelCard,
        llmux_core::openai::ModelList,
    ))
)]
struct ApiDoc;

/// Result for main functions
pub type GatewayResult = Result<(), String>;

/// Main entry point for the gateway process.
pub fn start(command: &cli::TopLevel) -> GatewayResult {
    match &command.subcommand {
        None => serve(&cli::Serve::default()),
        Some(cli::Command::Serve(serve_args)) => serve(serve_args),
        Some(cli::Command::Version(_)) => version(),
        Some(cli::Command::Oasgen(oasgen_args)) => oasgen(oasgen_args),
    }
}

/// Prints the llmux version to stdout.
pub fn version() -> GatewayResult {
    println!(cargo_crate_version!());

    Ok(())
}

/// Generates the OpenAPI spec.
pub fn oasgen(args: &cli::Oasgen) -> GatewayResult {
    if args.json {
        println!("{}", ApiDoc::openapi().to_pretty_json().unwrap());
    } else {
        println!("{}", ApiDoc::openapi().to_yaml().unwrap());
    }

    Ok(())
}

/// The fully-layered application router.
///
/// Pure with respect to process state: tests hand in their own registry and
/// settings. Ingress order is correlation-ID → security headers → CORS →
/// access log → routes.
pub fn build_router(registry: &ProviderRegistry, settings: &Settings) -> Router {
    let mut router =
        routes::routes(registry).layer(axum::middleware::from_fn(middleware::access_log));

    if settings.enable_cors {
        router = router.layer(middleware::cors_layer(settings));
    }

    if settings.enable_security_headers {
        router = router.layer(axum::middleware::from_fn(middleware::security_headers));
    }

    router.layer(axum::middleware::from_fn(middleware::correlation))
}

// Synchronous code needed before the tokio runtime goes here.
fn serve(args: &cli::Serve) -> GatewayResult {
    start_server(args)
}

#[tokio::main]
async fn start_server(args: &cli::Serve) -> GatewayResult {
    {
        let mut cached = SETTINGS.write().await;
        cached
            .init()
            .map_err(|err| format!("invalid configuration: {err}"))?;

        if let Some(host) = &args.host {
            cached.host = host.clone();
        }
        if let Some(port) = args.port {
            cached.port = port;
        }
    }

    let settings = SETTINGS.read().await.clone();
    init_tracing(settings.log_level);

    if settings.auth_is_relaxed() {
        warn!(
            "DEVELOPMENT_MODE is enabled with an empty ALLOWED_API_KEYS; \
             any well-formed bearer token will be accepted"
        );
    }

    let registry = ProviderRegistry::from_settings(&settings);
    let router = build_router(&registry, &settings);

    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|err| format!("could not bind to {addr}: {err}"))?;

    info!("listening on http://{addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| format!("server error: {err}"))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;

    info!("shutdown signal received");
}

fn init_tracing(level: LogLevel) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.as_filter()));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
