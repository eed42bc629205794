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

//! Session incident memory and reconciliation.
//!
//! Incidents accumulate across polling cycles for as long as a session keeps
//! the same region. Identity is the feed-provided `id` alone: an id that is
//! already stored is never updated, even if its content was edited upstream.
//! New ids are placed in front of older ones so each service's list reads
//! most recently discovered first.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::protocol::{ParsedIncident, Severity};
use crate::region::{Region, Service};

/// A reconciled incident as stored for the session.
#[derive(Debug, Clone, PartialEq)]
pub struct Incident {
    pub id: String,
    /// `None` when the feed used a severity label this crate does not know.
    pub severity: Option<Severity>,
    /// Display timestamp, e.g. `2024-01-02 @ 03:04:05 GMT`.
    pub updated_at: String,
    pub updated: Option<DateTime<Utc>>,
    pub content: String,
    pub region: Region,
    pub service: Service,
}

impl Incident {
    fn from_parsed(parsed: &ParsedIncident, region: &Region) -> Self {
        Self {
            id: parsed.id.clone(),
            severity: Severity::from_label(&parsed.severity),
            updated_at: parsed.updated_at.clone(),
            updated: parsed.updated,
            content: parsed.content.clone(),
            region: region.clone(),
            service: parsed.service,
        }
    }

    /// Area label, e.g. `[NA Game]`.
    #[must_use]
    pub fn area(&self) -> String {
        format!("[{} {}]", self.region.code(), self.service)
    }

    /// One-line summary: `area :: severity :: time :: content`.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} :: {} :: {} :: {}",
            self.area(),
            self.severity.map_or("Unknown", Severity::label),
            self.updated_at,
            self.content
        )
    }
}

/// Per-service incident lists for one polling session, newest first.
#[derive(Debug, Clone, Default)]
pub struct IncidentSet {
    by_service: HashMap<Service, Vec<Incident>>,
}

impl IncidentSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge freshly parsed incidents for `service` into the set.
    ///
    /// Returns the number of incidents whose id was not already stored.
    pub fn reconcile(&mut self, region: &Region, service: Service, parsed: &[ParsedIncident]) -> usize {
        let existing = self.by_service.entry(service).or_default();
        let mut seen: HashSet<&str> = existing.iter().map(|i| i.id.as_str()).collect();

        let mut added = Vec::new();
        for incident in parsed {
            if seen.insert(incident.id.as_str()) {
                added.push(Incident::from_parsed(incident, region));
            }
        }

        let count = added.len();
        if count > 0 {
            existing.splice(0..0, added);
        }
        count
    }

    /// Incidents stored for a service, newest first.
    #[must_use]
    pub fn for_service(&self, service: Service) -> &[Incident] {
        self.by_service.get(&service).map_or(&[][..], Vec::as_slice)
    }

    /// Services that currently have at least one incident.
    pub fn services(&self) -> impl Iterator<Item = Service> + '_ {
        self.by_service
            .iter()
            .filter(|(_, incidents)| !incidents.is_empty())
            .map(|(service, _)| *service)
    }

    /// Total number of stored incidents across services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_service.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_service.values().all(Vec::is_empty)
    }

    pub fn clear(&mut self) {
        self.by_service.clear();
    }

    /// Render a service's incidents for a detail view, separated by blank lines.
    #[must_use]
    pub fn describe(&self, service: Service) -> String {
        let mut text = String::new();
        for (i, incident) in self.for_service(service).iter().enumerate() {
            if i > 0 {
                text.push_str("\n\n");
            }
            text.push_str(&incident.summary());
        }
        text
    }
}
