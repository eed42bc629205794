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

//! Static catalog of regions and the services monitored in each of them.
//!
//! The catalog is loaded once at startup and never changes afterwards. Region
//! codes are canonicalised to uppercase; lookups are case-insensitive.

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

/// Polling intervals (in seconds) offered to users. Any positive interval is accepted.
pub const POLLING_RATES: [u64; 6] = [1, 5, 10, 30, 45, 60];

/// Polling interval used when nothing else is configured.
pub const DEFAULT_POLLING_RATE: u64 = 10;

/// A monitored service. The set is fixed configuration, not polled data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Service {
    Client,
    Game,
    Store,
    Website,
}

impl Service {
    /// All services in display order.
    pub const ALL: [Service; 4] = [Service::Client, Service::Game, Service::Store, Service::Website];

    /// Display label, which is also the name the status feed uses.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Service::Client => "Client",
            Service::Game => "Game",
            Service::Store => "Store",
            Service::Website => "Website",
        }
    }

    /// Resolve a feed service name, ignoring ASCII case.
    #[must_use]
    pub fn from_label(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|service| service.label().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A geographic shard of the status feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Region {
    code: String,
    endpoint: Option<IpAddr>,
}

impl Region {
    /// Create a region; the code is stored uppercase.
    #[must_use]
    pub fn new(code: &str, endpoint: Option<IpAddr>) -> Self {
        Self {
            code: code.trim().to_uppercase(),
            endpoint,
        }
    }

    /// Canonical uppercase code, e.g. `NA`.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Lowercase code as used in the status endpoint path.
    #[must_use]
    pub fn path_segment(&self) -> String {
        self.code.to_lowercase()
    }

    /// Address used for latency probing, if one is known.
    #[must_use]
    pub fn endpoint(&self) -> Option<IpAddr> {
        self.endpoint
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

/// Region codes in the order they are offered.
const REGION_CODES: [&str; 11] = [
    "NA", "EUW", "EUNE", "LAN", "LAS", "BR", "TR", "RU", "OCE", "JP", "KR",
];

/// Latency probe endpoints for the regions that publish one.
const REGION_ENDPOINTS: [(&str, Ipv4Addr); 5] = [
    ("NA", Ipv4Addr::new(104, 160, 131, 3)),
    ("EUW", Ipv4Addr::new(104, 160, 141, 3)),
    ("EUNE", Ipv4Addr::new(104, 160, 142, 3)),
    ("OCE", Ipv4Addr::new(104, 160, 156, 1)),
    ("LAN", Ipv4Addr::new(104, 160, 136, 3)),
];

/// Immutable mapping of region codes to regions and their services.
#[derive(Debug, Clone)]
pub struct RegionCatalog {
    regions: Vec<Region>,
    index: HashMap<String, usize>,
}

impl RegionCatalog {
    /// Build a catalog from explicit regions. Later duplicates of a code are ignored.
    #[must_use]
    pub fn from_regions(regions: impl IntoIterator<Item = Region>) -> Self {
        let mut catalog = Self {
            regions: Vec::new(),
            index: HashMap::new(),
        };
        for region in regions {
            if !catalog.index.contains_key(region.code()) {
                catalog.index.insert(region.code().to_string(), catalog.regions.len());
                catalog.regions.push(region);
            }
        }
        catalog
    }

    /// Look up a region by code, ignoring case.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<&Region> {
        self.index
            .get(&code.trim().to_uppercase())
            .map(|&i| &self.regions[i])
    }

    /// All regions in catalog order.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// First region in the catalog.
    #[must_use]
    pub fn default_region(&self) -> Option<&Region> {
        self.regions.first()
    }

    /// Services monitored for a region. Every region carries the same set.
    #[must_use]
    pub fn services(&self, _region: &Region) -> &'static [Service] {
        &Service::ALL
    }
}

impl Default for RegionCatalog {
    fn default() -> Self {
        let endpoints: HashMap<&str, Ipv4Addr> = REGION_ENDPOINTS.into_iter().collect();
        Self::from_regions(REGION_CODES.into_iter().map(|code| {
            Region::new(code, endpoints.get(code).copied().map(IpAddr::V4))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let catalog = RegionCatalog::default();
        let region = catalog.get("euw").unwrap();
        assert_eq!(region.code(), "EUW");
        assert_eq!(region.path_segment(), "euw");
        assert_eq!(
            region.endpoint(),
            Some(IpAddr::V4(Ipv4Addr::new(104, 160, 141, 3)))
        );
    }

    #[test]
    fn test_regions_without_endpoint() {
        let catalog = RegionCatalog::default();
        assert_eq!(catalog.regions().len(), 11);
        assert!(catalog.get("KR").unwrap().endpoint().is_none());
        assert!(catalog.get("XX").is_none());
        assert_eq!(catalog.default_region().unwrap().code(), "NA");
    }

    #[test]
    fn test_service_labels() {
        assert_eq!(Service::from_label("game"), Some(Service::Game));
        assert_eq!(Service::from_label(" Website "), Some(Service::Website));
        assert_eq!(Service::from_label("Boards"), None);
        assert_eq!(Service::Store.to_string(), "Store");
    }
}
