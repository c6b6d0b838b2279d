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

//! Gateway error handling.
//!
//! Every non-2xx response the gateway produces carries the standardized
//! envelope `{"error": {"type", "message", "details"?}}`. Upstream internals
//! (raw upstream messages, stack traces) never reach that payload; they are
//! logged with the correlation ID instead.

use axum::http::header::WWW_AUTHENTICATE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};
use utoipa::ToSchema;

use llmux_core::context;
use llmux_core::provider::ProviderError;

/// The failure kinds a request can end in, mapped 1:1 onto HTTP statuses.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Authentication failed. Rendered as 401 with `WWW-Authenticate: Bearer`.
    #[error("{0}")]
    Auth(String),

    /// The request body failed schema validation. Rendered as 422.
    #[error("{0}")]
    Validation(String),

    /// An upstream provider failed (502), or lacks the capability (501).
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// An unclassified failure. Rendered as 500 without leaking internals.
    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    /// The wire value of the envelope's `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Auth(_) => "auth_error",
            GatewayError::Validation(_) => "validation_error",
            GatewayError::Provider(inner) if inner.is_not_implemented() => "not_implemented",
            GatewayError::Provider(_) => "provider_error",
            GatewayError::Internal(_) => "internal_error",
        }
    }

    /// The HTTP status this error renders as.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Auth(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayError::Provider(inner) if inner.is_not_implemented() => {
                StatusCode::NOT_IMPLEMENTED
            }
            GatewayError::Provider(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message exposed to the caller. Auth, validation, capability and
    /// credential messages are the gateway's own words and pass through;
    /// upstream failures are collapsed to a fixed phrase.
    fn public_message(&self) -> String {
        match self {
            GatewayError::Auth(message) | GatewayError::Validation(message) => message.clone(),
            GatewayError::Provider(inner) if inner.is_not_implemented() => inner.to_string(),
            GatewayError::Provider(ProviderError::Credentials(_)) => self.to_string(),
            GatewayError::Provider(_) => "the upstream provider request failed".to_string(),
            GatewayError::Internal(_) => "an unexpected internal error occurred".to_string(),
        }
    }
}

/// The canonical error envelope.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ErrorEnvelope {
    /// The failure description.
    pub error: ErrorBody,
}

/// The payload inside an [`ErrorEnvelope`].
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ErrorBody {
    /// The failure kind, e.g. `auth_error`.
    #[serde(rename = "type")]
    pub kind: String,

    /// A human-readable description, free of upstream internals.
    pub message: String,

    /// Optional structured context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorEnvelope {
    /// An envelope with the given kind and message, no details.
    pub fn of(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                kind: kind.into(),
                message: message.into(),
                details: None,
            },
        }
    }
}

impl From<&GatewayError> for ErrorEnvelope {
    fn from(err: &GatewayError) -> Self {
        ErrorEnvelope::of(err.kind(), err.public_message())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let request_id = context::current_request_id().unwrap_or_default();

        // The full (possibly upstream-tainted) detail goes to the log, never
        // to the wire.
        if status.is_server_error() {
            error!(request_id = %request_id, status = status.as_u16(), "{self}");
        } else {
            warn!(request_id = %request_id, status = status.as_u16(), "{self}");
        }

        let envelope = ErrorEnvelope::from(&self);
        let mut response = (status, Json(envelope)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, "Bearer".parse().unwrap());
        }

        response
    }
}
