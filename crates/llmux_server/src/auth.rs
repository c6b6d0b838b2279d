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

//! The bearer-token gate applied to every provider route.
//!
//! Required format: `Authorization: Bearer <token>` with a case-insensitive
//! scheme and a case-sensitive token. Any failure renders as 401 with
//! `WWW-Authenticate: Bearer`. In development mode with an empty allowlist,
//! any well-formed bearer token is accepted; the composition root warns about
//! that state at startup.

use axum::extract::Request;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use llmux_core::settings::SETTINGS;

use crate::error::GatewayError;

/// Extract the token from a `Bearer` authorization value.
///
/// Returns `None` unless the value has a scheme part and that scheme is
/// `bearer` in any casing. The token may still be empty; the caller rejects
/// that separately.
pub fn parse_bearer(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(char::is_whitespace)?;

    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
}

/// Decide whether the given authorization header value passes the gate.
pub fn authorize(
    header: Option<&str>,
    allowlist: &[String],
    development_mode: bool,
) -> Result<(), GatewayError> {
    let value = header.ok_or_else(|| GatewayError::Auth("missing Authorization header".into()))?;

    let token = parse_bearer(value).ok_or_else(|| {
        GatewayError::Auth("Authorization header must use the Bearer scheme".into())
    })?;

    if token.is_empty() {
        return Err(GatewayError::Auth("empty bearer token".into()));
    }

    if allowlist.is_empty() && development_mode {
        return Ok(());
    }

    if allowlist.iter().any(|allowed| allowed == token) {
        return Ok(());
    }

    Err(GatewayError::Auth("invalid bearer token".into()))
}

/// Middleware enforcing the gate, reading the allowlist from [`SETTINGS`].
pub async fn require_bearer(request: Request, next: Next) -> Result<Response, GatewayError> {
    let (require_auth, development_mode, allowlist) = {
        let settings = SETTINGS.read().await;
        (
            settings.require_auth,
            settings.development_mode,
            settings.allowed_api_keys.clone(),
        )
    };

    if !require_auth {
        return Ok(next.run(request).await);
    }

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    authorize(header, &allowlist, development_mode)?;

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowlist() -> Vec<String> {
        vec!["k-one".to_string(), "k-two".to_string()]
    }

    #[test]
    fn parses_well_formed_bearer_values() {
        assert_eq!(parse_bearer("Bearer abc"), Some("abc"));
        assert_eq!(parse_bearer("bearer abc"), Some("abc"));
        assert_eq!(parse_bearer("BEARER  abc "), Some("abc"));
        assert_eq!(parse_bearer(" Bearer abc"), Some("abc"));
    }

    #[test]
    fn rejects_other_schemes_and_bare_values() {
        assert_eq!(parse_bearer("Basic abc"), None);
        assert_eq!(parse_bearer("Bearer"), None);
        assert_eq!(parse_bearer(""), None);
    }

    #[test]
    fn known_token_is_accepted() {
        assert!(authorize(Some("Bearer k-one"), &allowlist(), false).is_ok());
    }

    #[test]
    fn token_comparison_is_case_sensitive() {
        let err = authorize(Some("Bearer K-ONE"), &allowlist(), false)
            .err()
            .unwrap();
        assert!(matches!(err, GatewayError::Auth(_)));
    }

    #[test]
    fn scheme_comparison_is_case_insensitive() {
        assert!(authorize(Some("bEaReR k-two"), &allowlist(), false).is_ok());
    }

    #[test]
    fn missing_header_fails() {
        assert!(matches!(
            authorize(None, &allowlist(), false),
            Err(GatewayError::Auth(_))
        ));
    }

    #[test]
    fn empty_token_fails() {
        assert!(matches!(
            authorize(Some("Bearer   "), &allowlist(), false),
            Err(GatewayError::Auth(_))
        ));
    }

    #[test]
    fn unknown_token_fails() {
        assert!(matches!(
            authorize(Some("Bearer other"), &allowlist(), false),
            Err(GatewayError::Auth(_))
        ));
    }

    #[test]
    fn development_mode_accepts_any_token_only_with_empty_allowlist() {
        assert!(authorize(Some("Bearer anything"), &[], true).is_ok());
        assert!(authorize(Some("Bearer other"), &allowlist(), true).is_err());
        assert!(authorize(Some("Basic anything"), &[], true).is_err());
        assert!(authorize(None, &[], true).is_err());
    }

    #[test]
    fn empty_allowlist_outside_development_mode_rejects() {
        assert!(authorize(Some("Bearer anything"), &[], false).is_err());
    }
}
