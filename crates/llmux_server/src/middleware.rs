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

//! Request middleware: correlation-ID assignment, security headers, CORS, and
//! the per-request access log.
//!
//! Ingress order is correlation → security headers → CORS → access log →
//! routes; the composition root layers them accordingly.

use std::time::Instant;

use axum::extract::Request;
use axum::http::header::{HeaderName, HeaderValue, CACHE_CONTROL};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info};

use llmux_core::context;
use llmux_core::settings::Settings;

use crate::redact;

/// Assign the request correlation ID and echo it on the response.
///
/// The ID is taken from the incoming `X-Request-Id` header under any casing
/// (header lookup is case-insensitive) or freshly generated, and stays in
/// scope for the whole handler, including the construction of streaming
/// bodies.
pub async fn correlation(request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(context::REQUEST_ID_HEADER_LOWER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(context::new_request_id);

    let mut response = context::scope(id.clone(), next.run(request)).await;

    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(
            HeaderName::from_static(context::REQUEST_ID_HEADER_LOWER),
            value,
        );
    }

    response
}

/// Emit one structured record per completed request.
///
/// Bodies, prompts and vectors are never logged; at DEBUG the (redacted)
/// request headers are included.
pub async fn access_log(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let provider = provider_of(&path);

    debug!(
        method = %method,
        path = %path,
        headers = ?redact::redact_headers(request.headers()),
        "request received"
    );

    let response = next.run(request).await;

    info!(
        request_id = %context::current_request_id().unwrap_or_default(),
        method = %method,
        path = %path,
        provider = provider,
        status = response.status().as_u16(),
        duration_ms = started.elapsed().as_millis() as u64,
        "request completed"
    );

    response
}

/// The provider namespace a path dispatches to, for the access log.
pub fn provider_of(path: &str) -> &'static str {
    if path.starts_with("/ollama/") {
        "ollama"
    } else if path.starts_with("/cerebras/") {
        "cerebras"
    } else if path.starts_with("/v1/") {
        "custom"
    } else {
        "-"
    }
}

/// Attach the fixed security headers to every response.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("no-referrer"),
    );
    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static("()"),
    );

    response
}

/// Mark streaming responses as non-cacheable.
pub fn no_cache(response: &mut Response) {
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
}

/// Build the allowlist CORS layer from configuration. Everything not listed
/// fails closed; an empty origin list allows no cross-origin caller at all.
pub fn cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors
        .allow_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let methods: Vec<Method> = settings
        .cors
        .allow_methods
        .iter()
        .filter_map(|method| method.parse().ok())
        .collect();

    let headers: Vec<HeaderName> = settings
        .cors
        .allow_headers
        .iter()
        .filter_map(|header| header.parse().ok())
        .collect();

    let mut layer = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(methods)
        .allow_headers(headers);

    if settings.cors.allow_credentials {
        layer = layer.allow_credentials(true);
    }

    layer
}
