// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Application configuration management.
//!
//! Settings are persisted as TOML through `confy`. Every field carries a
//! serde default so that files written by older versions keep loading.

use std::num::NonZeroU64;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shard_status::fetch::{DEFAULT_API_KEY_HEADER, DEFAULT_BASE_URL};
use shard_status::{default_interval, FetcherConfig, PollerConfig};

/// Application name used for the configuration directory.
pub const APP_NAME: &str = "shardwatch";

/// Environment variable that overrides the configured API key.
pub const API_KEY_ENV: &str = "RIOT_API_KEY";

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Configuration schema version for migrations
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// Region code polled at startup
    #[serde(default = "default_region")]
    pub region: String,

    /// Seconds between polling cycles
    #[serde(default = "default_polling_interval")]
    pub polling_interval_secs: u64,

    /// Status feed base URL; the lowercase region code is appended
    #[serde(default = "default_status_base_url")]
    pub status_base_url: String,

    /// Status API key (optional, env var takes precedence)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Header carrying the API key
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,

    /// Bound on a single status request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Read status documents from `debug_file` instead of the network
    #[serde(default)]
    pub debug_mode: bool,

    /// Local status document used in debug mode
    #[serde(default)]
    pub debug_file: Option<PathBuf>,

    /// Measure region latency after each successful cycle
    #[serde(default = "default_true")]
    pub probe_latency: bool,

    /// TCP port used by the latency probe
    #[serde(default = "default_latency_port")]
    pub latency_port: u16,
}

// Default value functions for serde
fn default_config_version() -> u32 {
    1
}

fn default_region() -> String {
    "NA".to_string()
}

fn default_polling_interval() -> u64 {
    default_interval().get()
}

fn default_status_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_api_key_header() -> String {
    DEFAULT_API_KEY_HEADER.to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_latency_port() -> u16 {
    443
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            region: default_region(),
            polling_interval_secs: default_polling_interval(),
            status_base_url: default_status_base_url(),
            api_key: None,
            api_key_header: default_api_key_header(),
            request_timeout_secs: default_request_timeout(),
            debug_mode: false,
            debug_file: None,
            probe_latency: true,
            latency_port: default_latency_port(),
        }
    }
}

impl AppConfig {
    /// Load configuration from disk, creating it with defaults on first run
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load(APP_NAME, "config")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store(APP_NAME, "config", self)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, "config")
    }

    /// Polling interval, falling back to the default when zero.
    #[must_use]
    pub fn polling_interval(&self) -> NonZeroU64 {
        NonZeroU64::new(self.polling_interval_secs).unwrap_or_else(default_interval)
    }

    /// Use `path` as the debug file and switch debug mode on.
    pub fn set_debug_file(&mut self, path: PathBuf) {
        self.debug_mode = true;
        self.debug_file = Some(path);
    }

    /// Resolve the API key: environment variable first, then config file.
    #[must_use]
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_api_key(std::env::var(API_KEY_ENV).ok(), self.api_key.as_deref())
    }

    /// Get the source of the API key for display
    #[must_use]
    pub fn api_key_source(&self) -> Option<&'static str> {
        if std::env::var(API_KEY_ENV).is_ok_and(|k| !k.is_empty()) {
            Some("environment variable")
        } else if self.api_key.as_deref().is_some_and(|k| !k.is_empty()) {
            Some("config file")
        } else {
            None
        }
    }

    /// Poller settings derived from this configuration.
    #[must_use]
    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            fetcher: FetcherConfig {
                base_url: self.status_base_url.clone(),
                api_key: self.resolve_api_key(),
                api_key_header: self.api_key_header.clone(),
                request_timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
                latency_port: self.latency_port,
                ..Default::default()
            },
            probe_latency: self.probe_latency,
            ..Default::default()
        }
    }
}

fn resolve_api_key(env_key: Option<String>, config_key: Option<&str>) -> Option<String> {
    env_key
        .filter(|k| !k.is_empty())
        .or_else(|| config_key.map(str::to_string).filter(|k| !k.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.region, "NA");
        assert_eq!(config.polling_interval_secs, 10);
        assert_eq!(config.api_key_header, "X-Riot-Token");
        assert_eq!(config.request_timeout_secs, 10);
        assert!(!config.debug_mode);
        assert!(config.probe_latency);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"region": "EUW"}"#).unwrap();
        assert_eq!(config.region, "EUW");
        assert_eq!(config.polling_interval_secs, 10);
        assert_eq!(config.status_base_url, DEFAULT_BASE_URL);
        assert_eq!(config.latency_port, 443);
    }

    #[test]
    fn test_zero_interval_falls_back() {
        let config = AppConfig {
            polling_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.polling_interval(), default_interval());
    }

    #[test]
    fn test_api_key_precedence() {
        assert_eq!(
            resolve_api_key(Some("env".to_string()), Some("file")),
            Some("env".to_string())
        );
        assert_eq!(
            resolve_api_key(Some(String::new()), Some("file")),
            Some("file".to_string())
        );
        assert_eq!(resolve_api_key(None, Some("")), None);
        assert_eq!(resolve_api_key(None, None), None);
    }

    #[test]
    fn test_debug_file_enables_debug_mode() {
        let mut config = AppConfig::default();
        config.set_debug_file(PathBuf::from("/tmp/status.json"));
        assert!(config.debug_mode);
        assert_eq!(config.debug_file, Some(PathBuf::from("/tmp/status.json")));
    }
}
