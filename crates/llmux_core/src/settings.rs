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

//! Gateway configuration, resolved once from the process environment.
//!
//! Every component reads the shared [`SETTINGS`] value; nothing is built at
//! module load, so tests (and the composition root) can substitute their own
//! [`Settings`] before the first request is served.

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// The global settings cache. Populated exactly once by [`StaticSettings::init`]
/// (or replaced wholesale by tests through [`StaticSettings::init_with`]).
pub static SETTINGS: Lazy<RwLock<StaticSettings>> = Lazy::new(Default::default);

/// An error encountered while resolving [`Settings`] from the environment.
///
/// Any of these is fatal at startup; there is no partially usable
/// configuration.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// A variable could not be parsed as its expected type.
    #[error("invalid value for {var}: {reason}")]
    Invalid {
        /// The environment variable at fault.
        var: &'static str,
        /// Why its value was rejected.
        reason: String,
    },

    /// `LOG_LEVEL` was set to something outside the allowed set.
    #[error("LOG_LEVEL must be one of DEBUG, INFO, WARNING, ERROR; got {0:?}")]
    LogLevel(String),

    /// `REQUEST_TIMEOUT_S` must be strictly positive.
    #[error("REQUEST_TIMEOUT_S must be strictly positive; got {0}")]
    Timeout(f64),

    /// Authentication is required outside development mode, but no bearer
    /// tokens were configured.
    #[error(
        "ALLOWED_API_KEYS must not be empty while REQUIRE_AUTH is enabled \
         outside development mode"
    )]
    EmptyAllowlist,
}

/// The structured-log threshold, normalized to upper case on parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Everything, including per-request header dumps (redacted).
    Debug,
    /// The default: one record per request plus lifecycle messages.
    Info,
    /// Degraded upstream behavior and security-sensitive configuration.
    Warning,
    /// Failures only.
    Error,
}

impl LogLevel {
    /// Parse a level, coercing case. Unrecognized values are rejected.
    pub fn parse(raw: &str) -> Result<Self, SettingsError> {
        match raw.trim().to_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            _ => Err(SettingsError::LogLevel(raw.to_string())),
        }
    }

    /// The equivalent `tracing` filter directive.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Allowlist-based CORS configuration. Only consulted when `ENABLE_CORS` is
/// set; everything defaults closed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorsSettings {
    /// Origins allowed to make cross-origin requests. Empty means none.
    pub allow_origins: Vec<String>,

    /// Methods allowed in cross-origin requests.
    pub allow_methods: Vec<String>,

    /// Request headers allowed in cross-origin requests.
    pub allow_headers: Vec<String>,

    /// Whether credentialed requests are allowed.
    pub allow_credentials: bool,
}

/// Fully-validated gateway configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Host the HTTP server binds to.
    pub host: String,

    /// Port the HTTP server binds to.
    pub port: u16,

    /// Structured-log threshold.
    pub log_level: LogLevel,

    /// Ordered allowlist of accepted bearer tokens.
    pub allowed_api_keys: Vec<String>,

    /// When false, the bearer gate is disabled entirely.
    pub require_auth: bool,

    /// Relaxes the empty-allowlist invariant and enables dev conveniences.
    pub development_mode: bool,

    /// Credential for the cloud provider, if configured.
    pub cerebras_api_key: Option<String>,

    /// Base URL of the cloud provider's API.
    pub cerebras_base_url: String,

    /// Base URL of the local model runner.
    pub ollama_host: String,

    /// Outbound call deadline in seconds. Strictly positive.
    pub request_timeout_s: f64,

    /// Install the security-header middleware.
    pub enable_security_headers: bool,

    /// Install the CORS middleware.
    pub enable_cors: bool,

    /// CORS allowlists, consulted only when `enable_cors` is set.
    pub cors: CorsSettings,

    /// Reserved feature toggle; accepted but currently without effect.
    pub enable_enrichment: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            log_level: LogLevel::Info,
            allowed_api_keys: vec![],
            require_auth: true,
            development_mode: false,
            cerebras_api_key: None,
            cerebras_base_url: "https://api.cerebras.ai".to_string(),
            ollama_host: "http://127.0.0.1:11434".to_string(),
            request_timeout_s: 30.0,
            enable_security_headers: true,
            enable_cors: false,
            cors: CorsSettings {
                allow_origins: vec![],
                allow_methods: vec!["GET".to_string(), "POST".to_string()],
                allow_headers: vec![
                    "Authorization".to_string(),
                    "Content-Type".to_string(),
                    "X-Request-Id".to_string(),
                ],
                allow_credentials: false,
            },
            enable_enrichment: false,
        }
    }
}

impl Settings {
    /// Resolve settings from the process environment, loading a dotenv file
    /// first when one is present in the working directory.
    pub fn from_env() -> Result<Self, SettingsError> {
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings from an arbitrary key lookup. This is the test entry
    /// point; [`Settings::from_env`] is a thin wrapper over it.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let mut settings = Settings::default();

        if let Some(host) = get("SERVICE_HOST") {
            settings.host = host.trim().to_string();
        }
        if let Some(port) = get("SERVICE_PORT") {
            settings.port = port
                .trim()
                .parse()
                .map_err(|_| SettingsError::Invalid {
                    var: "SERVICE_PORT",
                    reason: format!("{port:?} is not a valid port number"),
                })?;
        }
        if let Some(level) = get("LOG_LEVEL") {
            settings.log_level = LogLevel::parse(&level)?;
        }
        if let Some(keys) = get("ALLOWED_API_KEYS") {
            settings.allowed_api_keys = parse_allowlist(&keys);
        }
        if let Some(raw) = get("REQUIRE_AUTH") {
            settings.require_auth = parse_bool("REQUIRE_AUTH", &raw)?;
        }
        if let Some(raw) = get("DEVELOPMENT_MODE") {
            settings.development_mode = parse_bool("DEVELOPMENT_MODE", &raw)?;
        }
        if let Some(key) = get("CEREBRAS_API_KEY") {
            let key = key.trim().to_string();
            settings.cerebras_api_key = (!key.is_empty()).then_some(key);
        }
        if let Some(url) = get("CEREBRAS_BASE_URL") {
            settings.cerebras_base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(url) = get("OLLAMA_HOST") {
            settings.ollama_host = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(raw) = get("REQUEST_TIMEOUT_S") {
            let timeout: f64 = raw.trim().parse().map_err(|_| SettingsError::Invalid {
                var: "REQUEST_TIMEOUT_S",
                reason: format!("{raw:?} is not a number"),
            })?;
            settings.request_timeout_s = timeout;
        }
        if let Some(raw) = get("ENABLE_SECURITY_HEADERS") {
            settings.enable_security_headers = parse_bool("ENABLE_SECURITY_HEADERS", &raw)?;
        }
        if let Some(raw) = get("ENABLE_CORS") {
            settings.enable_cors = parse_bool("ENABLE_CORS", &raw)?;
        }
        if let Some(raw) = get("CORS_ALLOW_ORIGINS") {
            settings.cors.allow_origins = parse_list(&raw);
        }
        if let Some(raw) = get("CORS_ALLOW_METHODS") {
            settings.cors.allow_methods = parse_list(&raw);
        }
        if let Some(raw) = get("CORS_ALLOW_HEADERS") {
            settings.cors.allow_headers = parse_list(&raw);
        }
        if let Some(raw) = get("CORS_ALLOW_CREDENTIALS") {
            settings.cors.allow_credentials = parse_bool("CORS_ALLOW_CREDENTIALS", &raw)?;
        }
        if let Some(raw) = get("ENABLE_ENRICHMENT") {
            settings.enable_enrichment = parse_bool("ENABLE_ENRICHMENT", &raw)?;
        }

        settings.validate()?;

        Ok(settings)
    }

    /// The model-level invariants that hold across fields.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.request_timeout_s.is_finite() || self.request_timeout_s <= 0.0 {
            return Err(SettingsError::Timeout(self.request_timeout_s));
        }

        if self.require_auth && !self.development_mode && self.allowed_api_keys.is_empty() {
            return Err(SettingsError::EmptyAllowlist);
        }

        Ok(())
    }

    /// The outbound call deadline as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout_s)
    }

    /// The `host:port` pair the server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// True when the bearer gate accepts any well-formed token: development
    /// mode with an empty allowlist. The composition root warns loudly about
    /// this state at startup.
    pub fn auth_is_relaxed(&self) -> bool {
        self.development_mode && self.allowed_api_keys.is_empty()
    }
}

/// Parse the bearer-token allowlist. Accepts a JSON array of strings or a
/// comma-separated list; entries are trimmed and empties dropped either way.
pub fn parse_allowlist(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();

    if trimmed.starts_with('[') {
        if let Ok(items) = serde_json::from_str::<Vec<String>>(trimmed) {
            return items
                .iter()
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect();
        }
    }

    parse_list(trimmed)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, SettingsError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SettingsError::Invalid {
            var,
            reason: format!("{raw:?} is not a boolean"),
        }),
    }
}

/// The lazily-populated holder behind [`SETTINGS`].
#[derive(Default)]
pub struct StaticSettings {
    inner: Option<Settings>,
}

impl StaticSettings {
    /// Populate the cache from the environment. Idempotent: once a value is
    /// cached, later calls are no-ops.
    pub fn init(&mut self) -> Result<(), SettingsError> {
        if self.inner.is_none() {
            self.inner = Some(Settings::from_env()?);
        }

        Ok(())
    }

    /// Replace the cached value outright. Test entry point.
    pub fn init_with(&mut self, settings: Settings) {
        self.inner = Some(settings);
    }

    /// Drop the cached value so the next [`StaticSettings::init`] re-reads
    /// the environment. Test entry point.
    pub fn invalidate(&mut self) {
        self.inner = None;
    }
}

impl Deref for StaticSettings {
    type Target = Settings;

    fn deref(&self) -> &Self::Target {
        if let Some(settings) = &self.inner {
            settings
        } else {
            panic!("Settings have not been initialised yet")
        }
    }
}

impl DerefMut for StaticSettings {
    fn deref_mut(&mut self) -> &mut Self::Target {
        if let Some(settings) = &mut self.inner {
            settings
        } else {
            panic!("Settings have not been initialised yet")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        move |key| map.get(key).map(|value| value.to_string())
    }

    #[test]
    fn allowlist_drops_empties_and_trims() {
        assert_eq!(parse_allowlist(" a , b ,, c "), vec!["a", "b", "c"]);
    }

    #[test]
    fn allowlist_accepts_json_arrays() {
        assert_eq!(
            parse_allowlist(r#"[" a ", "b", "", "c"]"#),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn allowlist_of_empty_string_is_empty() {
        assert!(parse_allowlist("").is_empty());
        assert!(parse_allowlist(" , , ").is_empty());
        assert!(parse_allowlist("[]").is_empty());
    }

    #[test]
    fn log_level_coerces_case() {
        assert_eq!(LogLevel::parse("warning").unwrap(), LogLevel::Warning);
        assert_eq!(LogLevel::parse(" debug ").unwrap(), LogLevel::Debug);
    }

    #[test]
    fn log_level_rejects_unknown_values() {
        assert!(matches!(
            LogLevel::parse("TRACE"),
            Err(SettingsError::LogLevel(_))
        ));
    }

    #[test]
    fn rejects_non_positive_timeout() {
        let result = Settings::from_lookup(lookup(&[
            ("ALLOWED_API_KEYS", "k"),
            ("REQUEST_TIMEOUT_S", "0"),
        ]));
        assert!(matches!(result, Err(SettingsError::Timeout(_))));

        let result = Settings::from_lookup(lookup(&[
            ("ALLOWED_API_KEYS", "k"),
            ("REQUEST_TIMEOUT_S", "-2.5"),
        ]));
        assert!(matches!(result, Err(SettingsError::Timeout(_))));
    }

    #[test]
    fn accepts_fractional_timeout() {
        let settings = Settings::from_lookup(lookup(&[
            ("ALLOWED_API_KEYS", "k"),
            ("REQUEST_TIMEOUT_S", "2.5"),
        ]))
        .unwrap();
        assert_eq!(settings.timeout(), Duration::from_millis(2500));
    }

    #[test]
    fn empty_allowlist_rejected_when_auth_required() {
        let result = Settings::from_lookup(lookup(&[]));
        assert!(matches!(result, Err(SettingsError::EmptyAllowlist)));
    }

    #[test]
    fn empty_allowlist_allowed_when_auth_disabled() {
        let settings = Settings::from_lookup(lookup(&[("REQUIRE_AUTH", "false")])).unwrap();
        assert!(!settings.require_auth);
        assert!(settings.allowed_api_keys.is_empty());
    }

    #[test]
    fn empty_allowlist_allowed_in_development_mode() {
        let settings = Settings::from_lookup(lookup(&[("DEVELOPMENT_MODE", "true")])).unwrap();
        assert!(settings.development_mode);
        assert!(settings.auth_is_relaxed());
    }

    #[test]
    fn populated_allowlist_is_not_relaxed() {
        let settings = Settings::from_lookup(lookup(&[
            ("DEVELOPMENT_MODE", "true"),
            ("ALLOWED_API_KEYS", "k1,k2"),
        ]))
        .unwrap();
        assert!(!settings.auth_is_relaxed());
        assert_eq!(settings.allowed_api_keys, vec!["k1", "k2"]);
    }

    #[test]
    fn boolean_parsing_accepts_common_spellings() {
        for raw in ["1", "true", "YES", "On"] {
            assert!(parse_bool("REQUIRE_AUTH", raw).unwrap());
        }
        for raw in ["0", "False", "no", "OFF"] {
            assert!(!parse_bool("REQUIRE_AUTH", raw).unwrap());
        }
        assert!(parse_bool("REQUIRE_AUTH", "maybe").is_err());
    }

    #[test]
    fn base_urls_are_normalized() {
        let settings = Settings::from_lookup(lookup(&[
            ("REQUIRE_AUTH", "false"),
            ("OLLAMA_HOST", "http://10.0.0.5:11434/ "),
            ("CEREBRAS_BASE_URL", "https://example.test/api/"),
        ]))
        .unwrap();
        assert_eq!(settings.ollama_host, "http://10.0.0.5:11434");
        assert_eq!(settings.cerebras_base_url, "https://example.test/api");
    }

    #[test]
    fn cors_lists_are_parsed() {
        let settings = Settings::from_lookup(lookup(&[
            ("REQUIRE_AUTH", "false"),
            ("ENABLE_CORS", "true"),
            ("CORS_ALLOW_ORIGINS", "https://a.test, https://b.test"),
            ("CORS_ALLOW_METHODS", "GET,POST"),
            ("CORS_ALLOW_CREDENTIALS", "true"),
        ]))
        .unwrap();
        assert!(settings.enable_cors);
        assert_eq!(
            settings.cors.allow_origins,
            vec!["https://a.test", "https://b.test"]
        );
        assert!(settings.cors.allow_credentials);
    }

    #[test]
    fn static_settings_can_be_replaced_and_invalidated() {
        let mut cached = StaticSettings::default();
        let mut settings = Settings::default();
        settings.require_auth = false;
        settings.port = 9999;

        cached.init_with(settings);
        assert_eq!(cached.port, 9999);
        assert_eq!(cached.bind_addr(), "127.0.0.1:9999");

        cached.invalidate();
        assert!(cached.inner.is_none());
    }
}
