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

//! Status polling and incident reconciliation for regional service feeds.
//!
//! The crate is split into layers that can be used independently or wired
//! together through the [`Poller`]:
//!
//! - **Region layer**: the fixed catalog of regions and the services each exposes
//! - **Fetch layer**: HTTP or debug-file retrieval of raw status documents,
//!   connectivity checks and latency probes
//! - **Protocol layer**: parsing a status document into per-service entries
//! - **Incident layer**: de-duplicated incident memory for a polling session
//! - **Poller**: the cancellable polling cycle and its countdown
//!
//! # Quick Start
//!
//! ```no_run
//! use shard_status::{Poller, PollerConfig, PollEvent, PollingSession, RegionCatalog, default_interval};
//!
//! #[tokio::main]
//! async fn main() {
//!     let catalog = RegionCatalog::default();
//!     let region = catalog.get("NA").cloned().unwrap();
//!     let session = PollingSession::new(region, default_interval());
//!
//!     let mut poller = Poller::new(PollerConfig::default(), catalog, session.clone()).unwrap();
//!     let mut events = poller.subscribe();
//!     poller.start(session);
//!
//!     while let Ok(event) = events.recv().await {
//!         if let PollEvent::Updated(report) = event {
//!             println!("{}: {:?}", report.region, report.health);
//!         }
//!     }
//! }
//! ```
//!
//! # Parsing Only
//!
//! ```
//! use shard_status::protocol::{Protocol, ServiceStatus, ShardStatusParser};
//! use shard_status::Service;
//!
//! let parser = ShardStatusParser::new();
//! let doc = parser
//!     .parse(r#"{"services":[{"name":"Game","status":"offline","incidents":[]}]}"#)
//!     .unwrap();
//! assert_eq!(doc[&Service::Game].status, ServiceStatus::Offline);
//! ```

pub mod fetch;
pub mod health;
pub mod incidents;
pub mod poller;
pub mod protocol;
pub mod region;
pub mod severity;

pub use fetch::{FetchError, FetchSource, FetcherConfig, Latency, StatusFetcher};
pub use health::{summarize, HealthState};
pub use incidents::{Incident, IncidentSet};
pub use poller::{
    default_interval, CycleReport, PollEvent, Poller, PollerConfig, PollerState, PollingSession,
    ServiceReport, CONNECTIVITY_LOST_MESSAGE,
};
pub use protocol::{ParseError, Protocol, ServiceStatus, Severity, StatusColor};
pub use region::{Region, RegionCatalog, Service, DEFAULT_POLLING_RATE, POLLING_RATES};
pub use severity::most_severe;
