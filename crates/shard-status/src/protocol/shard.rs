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

//! Shard status JSON parser.
//!
//! Document shape:
//!
//! ```text
//! { "services": [ { "name", "status", "incidents": [ { "updates": [
//!     { "id", "severity", "updated_at", "content" } ] } ] } ] }
//! ```
//!
//! Every `(incident, update)` pair becomes one [`ParsedIncident`]. The flattened
//! list is reversed so the most recently updated entry comes first.

use chrono::{DateTime, Utc};
use log::debug;
use serde::Deserialize;
use serde_json::Value;

use super::{ParseError, ParsedIncident, ParsedServiceEntry, Protocol, ServiceStatus, StatusDocument};
use crate::region::Service;

#[derive(Debug, Deserialize)]
struct RawDocument {
    services: Vec<RawService>,
}

#[derive(Debug, Deserialize)]
struct RawService {
    name: Value,
    status: Value,
    #[serde(default)]
    incidents: Vec<RawIncident>,
}

#[derive(Debug, Deserialize)]
struct RawIncident {
    #[serde(default)]
    updates: Vec<RawUpdate>,
}

#[derive(Debug, Deserialize)]
struct RawUpdate {
    id: Value,
    severity: Value,
    updated_at: Value,
    content: Value,
}

/// Render a scalar JSON value as text. Strings come out without JSON quoting.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Remove surrounding double quotes.
#[must_use]
pub fn strip_quotes(raw: &str) -> &str {
    raw.trim_matches('"')
}

/// Uppercase the first character and leave the remainder untouched.
#[must_use]
pub fn capitalize_first(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Normalize a status key that may arrive in a set-like form such as `["offline"]`.
#[must_use]
pub fn format_status_key(raw: &str) -> String {
    let without_brackets: String = raw.chars().filter(|c| *c != '[' && *c != ']').collect();
    capitalize_first(strip_quotes(without_brackets.trim()))
}

/// Convert `<date>T<time>.<fraction>...` into `<date> @ <time> GMT`.
///
/// Values without a `T` are returned unchanged; values without a fractional
/// part keep the full time with any trailing `Z` removed.
#[must_use]
pub fn format_updated_at(raw: &str) -> String {
    let raw = strip_quotes(raw.trim());
    let Some((date, rest)) = raw.split_once('T') else {
        return raw.to_string();
    };
    let time = match rest.find('.') {
        Some(end) => &rest[..end],
        None => rest.trim_end_matches('Z'),
    };
    format!("{date} @ {time} GMT")
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(strip_quotes(raw.trim()))
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Parser for the shard status JSON document.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShardStatusParser;

impl ShardStatusParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn parse_service(service: Service, raw: &RawService) -> ParsedServiceEntry {
        let status_label = format_status_key(&value_text(&raw.status));

        let mut incidents: Vec<ParsedIncident> = raw
            .incidents
            .iter()
            .flat_map(|incident| incident.updates.iter())
            .map(|update| {
                let updated_raw = value_text(&update.updated_at);
                ParsedIncident {
                    id: strip_quotes(&value_text(&update.id)).to_string(),
                    service,
                    severity: capitalize_first(strip_quotes(&value_text(&update.severity))),
                    updated_at: format_updated_at(&updated_raw),
                    updated: parse_timestamp(&updated_raw),
                    content: strip_quotes(&value_text(&update.content)).to_string(),
                }
            })
            .collect();
        incidents.reverse();

        ParsedServiceEntry {
            status: ServiceStatus::from_label(&status_label),
            status_label,
            incidents,
        }
    }
}

impl Protocol for ShardStatusParser {
    type Document = StatusDocument;
    type Error = ParseError;

    fn parse(&self, input: &str) -> Result<StatusDocument, ParseError> {
        let raw: RawDocument = serde_json::from_str(input)
            .map_err(|e| ParseError::MalformedDocument(e.to_string()))?;

        let mut document = StatusDocument::new();
        for raw_service in &raw.services {
            let name = capitalize_first(strip_quotes(&value_text(&raw_service.name)));
            let Some(service) = Service::from_label(&name) else {
                debug!("Ignoring unmonitored service '{}'", name);
                continue;
            };
            document.insert(service, Self::parse_service(service, raw_service));
        }

        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "name": "North America",
        "slug": "na",
        "services": [
            { "name": "Client", "slug": "client", "status": "online", "incidents": [] },
            { "name": "Game", "slug": "game", "status": "offline", "incidents": [
                { "id": 1, "active": true, "updates": [
                    { "id": "a1", "severity": "info", "updated_at": "2024-01-02T03:04:05.000Z", "content": "Queue delays" },
                    { "id": "a2", "severity": "alert", "updated_at": "2024-01-02T04:00:00.000Z", "content": "Queues disabled" }
                ]},
                { "id": 2, "active": true, "updates": [
                    { "id": "b1", "severity": "error", "updated_at": "2024-01-02T05:00:00.000Z", "content": "Login down" }
                ]}
            ]},
            { "name": "Store", "slug": "store", "status": "deploying", "incidents": [] },
            { "name": "Website", "slug": "website", "status": "online" }
        ]
    }"#;

    #[test]
    fn test_parse_statuses() {
        let doc = ShardStatusParser::new().parse(SAMPLE).unwrap();
        assert_eq!(doc.len(), 4);

        let game = &doc[&Service::Game];
        assert_eq!(game.status, ServiceStatus::Offline);
        assert_eq!(game.status_label, "Offline");
        assert_eq!(doc[&Service::Store].status, ServiceStatus::Deploying);
        assert!(doc[&Service::Website].incidents.is_empty());
    }

    #[test]
    fn test_incidents_flattened_newest_first() {
        let doc = ShardStatusParser::new().parse(SAMPLE).unwrap();
        let ids: Vec<&str> = doc[&Service::Game]
            .incidents
            .iter()
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(ids, vec!["b1", "a2", "a1"]);

        let newest = &doc[&Service::Game].incidents[0];
        assert_eq!(newest.severity, "Error");
        assert_eq!(newest.service, Service::Game);
        assert_eq!(newest.updated_at, "2024-01-02 @ 05:00:00 GMT");
        assert!(newest.updated.is_some());
        assert_eq!(newest.content, "Login down");
    }

    #[test]
    fn test_unknown_status_value_is_not_an_error() {
        let json = r#"{"services":[{"name":"game","status":"melting","incidents":[]}]}"#;
        let doc = ShardStatusParser::new().parse(json).unwrap();
        assert_eq!(doc[&Service::Game].status, ServiceStatus::Unknown);
        assert_eq!(doc[&Service::Game].status_label, "Melting");
    }

    #[test]
    fn test_unmonitored_services_are_skipped() {
        let json = r#"{"services":[{"name":"Boards","status":"online","incidents":[]}]}"#;
        let doc = ShardStatusParser::new().parse(json).unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_malformed_documents() {
        let parser = ShardStatusParser::new();
        for bad in [
            "",
            "not json",
            r#"{"regions": []}"#,
            r#"{"services": {"name": "Game"}}"#,
            r#"{"services":[{"name":"Game","status":"online","incidents":[{"updates":[{"id":"x"}]}]}]}"#,
        ] {
            assert!(
                matches!(parser.parse(bad), Err(ParseError::MalformedDocument(_))),
                "expected malformed: {bad}"
            );
        }
    }

    #[test]
    fn test_numeric_ids_are_accepted() {
        let json = r#"{"services":[{"name":"Store","status":"alert","incidents":[
            {"updates":[{"id":42,"severity":"warn","updated_at":"2024-03-04T10:11:12.5Z","content":"Slow"}]}]}]}"#;
        let doc = ShardStatusParser::new().parse(json).unwrap();
        let incident = &doc[&Service::Store].incidents[0];
        assert_eq!(incident.id, "42");
        assert_eq!(incident.severity, "Warn");
        assert_eq!(doc[&Service::Store].status, ServiceStatus::Alert);
    }

    #[test]
    fn test_text_normalization() {
        assert_eq!(strip_quotes("\"online\""), "online");
        assert_eq!(capitalize_first("offline"), "Offline");
        assert_eq!(capitalize_first("oNLINE"), "ONLINE");
        assert_eq!(capitalize_first(""), "");
        assert_eq!(format_status_key("[online]"), "Online");
        assert_eq!(format_status_key("[\"deploying\"]"), "Deploying");
    }

    #[test]
    fn test_format_updated_at() {
        assert_eq!(
            format_updated_at("2024-01-02T03:04:05.000Z"),
            "2024-01-02 @ 03:04:05 GMT"
        );
        assert_eq!(
            format_updated_at("\"2016-05-01T18:32:12.917Z\""),
            "2016-05-01 @ 18:32:12 GMT"
        );
        assert_eq!(format_updated_at("2024-01-02T03:04:05Z"), "2024-01-02 @ 03:04:05 GMT");
        assert_eq!(format_updated_at("yesterday"), "yesterday");
    }
}
