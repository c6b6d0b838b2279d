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

//! Masking of secret-like values before anything reaches a log record.
//!
//! The table is deliberately aggressive: any key that merely *looks* like it
//! carries a credential is masked. Log call sites never format raw request
//! bodies, prompts or embedding vectors; this module guards the header and
//! key/value paths that remain.

use axum::http::HeaderMap;

/// The replacement emitted instead of a secret value.
pub const MASK: &str = "***";

/// Key fragments that mark a value as secret-like.
const SECRET_MARKERS: &[&str] = &[
    "authorization",
    "api_key",
    "api-key",
    "apikey",
    "token",
    "secret",
    "password",
    "bearer",
    "credential",
];

/// Whether a key names a value that must never be logged verbatim.
pub fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SECRET_MARKERS.iter().any(|marker| key.contains(marker))
}

/// The value to log for a given key: the value itself, or [`MASK`].
pub fn redact<'a>(key: &str, value: &'a str) -> &'a str {
    if is_secret_key(key) {
        MASK
    } else {
        value
    }
}

/// A loggable rendition of a header map with secret-like values masked.
/// Non-UTF-8 header values are dropped rather than escaped.
pub fn redact_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let value = value.to_str().ok()?;
            Some((
                name.as_str().to_string(),
                redact(name.as_str(), value).to_string(),
            ))
        })
        .collect()
}
