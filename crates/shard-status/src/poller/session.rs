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

use std::num::NonZeroU64;
use std::path::PathBuf;
use std::time::Duration;

use crate::fetch::FetchSource;
use crate::region::{Region, DEFAULT_POLLING_RATE};

/// Settings of a polling session.
///
/// Debug mode lives here rather than in process-wide state, so two pollers
/// can run against different sources side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingSession {
    pub region: Region,
    pub interval_secs: NonZeroU64,
    pub debug_mode: bool,
    /// Local status document read instead of the network in debug mode.
    pub debug_file: Option<PathBuf>,
}

impl PollingSession {
    #[must_use]
    pub fn new(region: Region, interval_secs: NonZeroU64) -> Self {
        Self {
            region,
            interval_secs,
            debug_mode: false,
            debug_file: None,
        }
    }

    /// Enable debug mode reading from `path`.
    #[must_use]
    pub fn with_debug_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_mode = true;
        self.debug_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.get())
    }

    /// Where this session's documents come from.
    #[must_use]
    pub fn source(&self) -> FetchSource {
        if self.debug_mode {
            FetchSource::File(self.debug_file.clone())
        } else {
            FetchSource::Network
        }
    }

    /// Region and source together. A change here invalidates incident memory.
    pub(crate) fn target(&self) -> (Region, FetchSource) {
        (self.region.clone(), self.source())
    }
}

/// Interval used when a configured value is zero.
#[must_use]
pub fn default_interval() -> NonZeroU64 {
    NonZeroU64::new(DEFAULT_POLLING_RATE).unwrap_or(NonZeroU64::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_follows_debug_mode() {
        let session = PollingSession::new(Region::new("NA", None), default_interval());
        assert_eq!(session.source(), FetchSource::Network);
        assert_eq!(session.interval(), Duration::from_secs(10));

        let debug = session.clone().with_debug_file("/tmp/offline.json");
        assert_eq!(
            debug.source(),
            FetchSource::File(Some(PathBuf::from("/tmp/offline.json")))
        );
        assert_ne!(session.target(), debug.target());
    }

    #[test]
    fn test_debug_file_ignored_outside_debug_mode() {
        let mut session = PollingSession::new(Region::new("NA", None), default_interval());
        let before = session.target();
        session.debug_file = Some(PathBuf::from("/tmp/other.json"));
        assert_eq!(session.target(), before);

        session.interval_secs = NonZeroU64::new(60).unwrap();
        assert_eq!(session.target(), before);
    }
}
