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

//! Raw status document retrieval.
//!
//! A fetch either performs an HTTP GET against `<base>/<region>` or, in debug
//! mode, reads a local JSON file with the same shape as the response body.
//! Host resolution failure is the only failure classified as
//! [`FetchError::NetworkUnreachable`]; everything else is transient.

use std::error::Error as _;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use log::debug;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};

use crate::region::Region;

/// Default status feed base URL; the lowercase region code is appended.
pub const DEFAULT_BASE_URL: &str = "http://status.leagueoflegends.com/shards";

/// Header carrying the API credential.
pub const DEFAULT_API_KEY_HEADER: &str = "X-Riot-Token";

/// Errors that can occur while fetching a status document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The status host could not be resolved.
    #[error("network unreachable: could not resolve {host}")]
    NetworkUnreachable { host: String },

    /// Reading the debug file failed.
    #[error("failed to read debug file: {0}")]
    Io(#[from] std::io::Error),

    /// Any other transport or HTTP status failure.
    #[error("status request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl FetchError {
    /// Whether the failure should only skip the current cycle.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        !matches!(self, FetchError::NetworkUnreachable { .. })
    }
}

/// Where a status document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchSource {
    /// HTTP GET against the configured base URL.
    Network,
    /// A local JSON file, read on every fetch. Never touches the network.
    File(Option<PathBuf>),
}

/// Result of a latency probe against a region endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Latency {
    Measured(Duration),
    /// The region has no probe endpoint.
    NotAvailable,
    Unreachable,
}

impl fmt::Display for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Latency::Measured(elapsed) => write!(f, "{}ms", elapsed.as_millis()),
            Latency::NotAvailable => f.write_str("Not Available"),
            Latency::Unreachable => f.write_str("Unreachable"),
        }
    }
}

/// Configuration for the status fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Base URL; the lowercase region code is appended as the last path segment.
    pub base_url: String,
    /// Static API credential attached to every request when present.
    pub api_key: Option<String>,
    /// Header name used for the API credential.
    pub api_key_header: String,
    /// Bound on a whole status request.
    pub request_timeout: Duration,
    /// TCP port used by the latency probe.
    pub latency_port: u16,
    /// Bound on a single latency probe.
    pub latency_timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            request_timeout: Duration::from_secs(10),
            latency_port: 443,
            latency_timeout: Duration::from_secs(3),
        }
    }
}

/// Fetches raw status documents for a region.
#[derive(Debug, Clone)]
pub struct StatusFetcher {
    client: reqwest::Client,
    config: FetcherConfig,
}

impl StatusFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// Status endpoint URL for a region.
    #[must_use]
    pub fn url_for(&self, region: &Region) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            region.path_segment()
        )
    }

    /// Fetch the raw status document for a region.
    pub async fn fetch(&self, region: &Region, source: &FetchSource) -> Result<String, FetchError> {
        match source {
            FetchSource::File(Some(path)) => Ok(tokio::fs::read_to_string(path).await?),
            FetchSource::File(None) => Err(FetchError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "debug mode is enabled but no debug file is set",
            ))),
            FetchSource::Network => self.fetch_remote(region).await,
        }
    }

    async fn fetch_remote(&self, region: &Region) -> Result<String, FetchError> {
        let url = self.url_for(region);
        let mut request = self.client.get(&url);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.header(self.config.api_key_header.as_str(), key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify(e, &url))?
            .error_for_status()?;

        Ok(response.text().await?)
    }

    /// Check that the status host can be reached without parsing anything.
    ///
    /// Only a host resolution failure reports `false`. Debug mode is always
    /// reachable.
    pub async fn network_check(&self, region: &Region, source: &FetchSource) -> bool {
        if matches!(source, FetchSource::File(_)) {
            return true;
        }
        match self.fetch_remote(region).await {
            Ok(_) => true,
            Err(FetchError::NetworkUnreachable { host }) => {
                debug!("Network check for {} failed: cannot resolve {}", region, host);
                false
            }
            Err(e) => {
                debug!("Network check for {} reached the host but failed: {}", region, e);
                true
            }
        }
    }

    /// Measure the time to open a TCP connection to the region's endpoint.
    pub async fn probe_latency(&self, region: &Region) -> Latency {
        let Some(ip) = region.endpoint() else {
            return Latency::NotAvailable;
        };

        let started = Instant::now();
        match timeout(
            self.config.latency_timeout,
            TcpStream::connect((ip, self.config.latency_port)),
        )
        .await
        {
            Ok(Ok(_stream)) => Latency::Measured(started.elapsed()),
            Ok(Err(e)) => {
                debug!("Latency probe to {} failed: {}", ip, e);
                Latency::Unreachable
            }
            Err(_elapsed) => Latency::Unreachable,
        }
    }
}

/// Split host resolution failures out of other request errors.
fn classify(error: reqwest::Error, url: &str) -> FetchError {
    if error.is_connect() && is_resolution_failure(&error) {
        let host = reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| url.to_string());
        FetchError::NetworkUnreachable { host }
    } else {
        FetchError::Http(error)
    }
}

fn is_resolution_failure(error: &reqwest::Error) -> bool {
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string().to_lowercase();
        if text.contains("dns error")
            || text.contains("failed to lookup address")
            || text.contains("name or service not known")
            || text.contains("no such host")
        {
            return true;
        }
        source = cause.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fetcher(base_url: &str) -> StatusFetcher {
        StatusFetcher::new(FetcherConfig {
            base_url: base_url.to_string(),
            request_timeout: Duration::from_secs(5),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_url_for_region() {
        let f = fetcher("http://status.example.com/shards/");
        assert_eq!(
            f.url_for(&Region::new("EUW", None)),
            "http://status.example.com/shards/euw"
        );
    }

    #[test]
    fn test_transient_classification() {
        let unreachable = FetchError::NetworkUnreachable {
            host: "status.example.com".to_string(),
        };
        assert!(!unreachable.is_transient());
        let io = FetchError::Io(std::io::Error::other("boom"));
        assert!(io.is_transient());
    }

    #[tokio::test]
    async fn test_debug_file_is_returned_unchanged() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"services\": []}}").unwrap();

        let f = fetcher(DEFAULT_BASE_URL);
        let source = FetchSource::File(Some(file.path().to_path_buf()));
        let body = f.fetch(&Region::new("NA", None), &source).await.unwrap();
        assert_eq!(body, "{\"services\": []}");
        assert!(f.network_check(&Region::new("NA", None), &source).await);
    }

    #[tokio::test]
    async fn test_missing_debug_file_is_transient() {
        let f = fetcher(DEFAULT_BASE_URL);
        let missing = FetchSource::File(Some(PathBuf::from("/definitely/not/here.json")));
        let err = f.fetch(&Region::new("NA", None), &missing).await.unwrap_err();
        assert!(matches!(err, FetchError::Io(_)));
        assert!(err.is_transient());

        let unset = f
            .fetch(&Region::new("NA", None), &FetchSource::File(None))
            .await
            .unwrap_err();
        assert!(unset.is_transient());
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_unreachable() {
        // The .invalid TLD is reserved and never resolves.
        let f = fetcher("http://status.shardwatch.invalid/shards");
        let err = f
            .fetch(&Region::new("NA", None), &FetchSource::Network)
            .await
            .unwrap_err();
        assert!(
            matches!(err, FetchError::NetworkUnreachable { ref host } if host == "status.shardwatch.invalid"),
            "unexpected error: {err}"
        );
        assert!(
            !f.network_check(&Region::new("NA", None), &FetchSource::Network)
                .await
        );
    }

    #[tokio::test]
    async fn test_probe_without_endpoint() {
        let f = fetcher(DEFAULT_BASE_URL);
        assert_eq!(
            f.probe_latency(&Region::new("KR", None)).await,
            Latency::NotAvailable
        );
    }
}
