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

//! Protocol layer for status document parsing.
//!
//! This module defines the structured form of a status document and a
//! trait-based abstraction over document formats. The shard status JSON
//! format is the only one implemented.

mod shard;

pub use shard::{capitalize_first, format_status_key, format_updated_at, strip_quotes, ShardStatusParser};

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::region::Service;

/// Errors that can occur while parsing a status document.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The document is not the expected JSON shape. The whole parse fails.
    #[error("malformed status document: {0}")]
    MalformedDocument(String),
}

/// Current status of a service. Unrecognized values fall back to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServiceStatus {
    Online,
    Offline,
    Alert,
    Deploying,
    #[default]
    Unknown,
}

/// Colour hint a presentation layer can use for a status label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColor {
    Green,
    Red,
    Yellow,
    Blue,
    Neutral,
}

impl ServiceStatus {
    /// Map a normalized status label (e.g. `Offline`) to a status.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            "Online" => ServiceStatus::Online,
            "Offline" => ServiceStatus::Offline,
            "Alert" => ServiceStatus::Alert,
            "Deploying" => ServiceStatus::Deploying,
            _ => ServiceStatus::Unknown,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ServiceStatus::Online => "Online",
            ServiceStatus::Offline => "Offline",
            ServiceStatus::Alert => "Alert",
            ServiceStatus::Deploying => "Deploying",
            ServiceStatus::Unknown => "Unknown",
        }
    }

    #[must_use]
    pub fn color(self) -> StatusColor {
        match self {
            ServiceStatus::Online => StatusColor::Green,
            ServiceStatus::Offline => StatusColor::Red,
            ServiceStatus::Alert => StatusColor::Yellow,
            ServiceStatus::Deploying => StatusColor::Blue,
            ServiceStatus::Unknown => StatusColor::Neutral,
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Urgency of an incident update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Warn,
    Alert,
    Error,
}

impl Severity {
    /// Map a severity label, ignoring ASCII case. Unrecognized labels yield `None`.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let label = strip_quotes(label.trim());
        [Severity::Info, Severity::Warn, Severity::Alert, Severity::Error]
            .into_iter()
            .find(|severity| severity.label().eq_ignore_ascii_case(label))
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Severity::Info => "Info",
            Severity::Warn => "Warn",
            Severity::Alert => "Alert",
            Severity::Error => "Error",
        }
    }

    /// Precedence used when summarizing several incidents. Info and Warn tie.
    #[must_use]
    pub fn precedence(self) -> u8 {
        match self {
            Severity::Info | Severity::Warn => 1,
            Severity::Alert => 2,
            Severity::Error => 3,
        }
    }

    /// Short marker shown next to a service with incidents.
    #[must_use]
    pub fn symbol(severity: Option<Self>) -> &'static str {
        match severity {
            Some(Severity::Info | Severity::Warn) => "!",
            Some(Severity::Alert) => "! !",
            Some(Severity::Error) => "! ! !",
            None => "?",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One incident update, flattened out of its owning incident.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedIncident {
    /// Stable identity as provided by the feed.
    pub id: String,
    /// Service the incident was reported under.
    pub service: Service,
    /// Normalized severity label, kept even when unrecognized.
    pub severity: String,
    /// Display timestamp, e.g. `2024-01-02 @ 03:04:05 GMT`.
    pub updated_at: String,
    /// Parsed timestamp when the raw value is RFC 3339.
    pub updated: Option<DateTime<Utc>>,
    pub content: String,
}

/// Parsed state of a single service.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedServiceEntry {
    pub status: ServiceStatus,
    /// Normalized status label as it appeared in the document.
    pub status_label: String,
    /// Incidents, most recently updated first.
    pub incidents: Vec<ParsedIncident>,
}

/// A fully parsed status document, keyed by service.
pub type StatusDocument = HashMap<Service, ParsedServiceEntry>;

/// Trait for status document parsers.
///
/// Implement this trait to support another feed format.
pub trait Protocol {
    /// The structured document produced by this parser.
    type Document;
    /// The error type for parsing failures.
    type Error;

    /// Parse a raw document. Parsing is all-or-nothing.
    fn parse(&self, input: &str) -> Result<Self::Document, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_fallback_is_unknown() {
        assert_eq!(ServiceStatus::from_label("Offline"), ServiceStatus::Offline);
        assert_eq!(ServiceStatus::from_label("Trembling"), ServiceStatus::Unknown);
        assert_eq!(ServiceStatus::default(), ServiceStatus::Unknown);
        assert_eq!(ServiceStatus::Deploying.color(), StatusColor::Blue);
    }

    #[test]
    fn test_severity_labels_and_symbols() {
        assert_eq!(Severity::from_label("warn"), Some(Severity::Warn));
        assert_eq!(Severity::from_label("\"Error\""), Some(Severity::Error));
        assert_eq!(Severity::from_label("critical"), None);
        assert_eq!(Severity::symbol(Some(Severity::Alert)), "! !");
        assert_eq!(Severity::symbol(None), "?");
    }
}
