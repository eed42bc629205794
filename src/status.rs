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

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use shard_status::{
    HealthState, Latency, PollEvent, Service, ServiceStatus, Severity, StatusColor,
};

/// Text shown for a service while not polling
pub const PLACEHOLDER: &str = "N/A";

/// Diagnostic message with timestamp
#[derive(Debug, Clone)]
pub struct DiagnosticMessage {
    pub timestamp: DateTime<Utc>,
    pub level: DiagnosticLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

/// What the presentation shows for one service
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRow {
    pub service: Service,

    /// Status label, or the placeholder while idle
    pub label: String,

    pub color: StatusColor,

    /// Severity hint for the incident button
    pub symbol: &'static str,

    /// Whether the service has incidents to show
    pub has_incidents: bool,
}

impl ServiceRow {
    fn placeholder(service: Service) -> Self {
        Self {
            service,
            label: PLACEHOLDER.to_string(),
            color: StatusColor::Neutral,
            symbol: Severity::symbol(None),
            has_incidents: false,
        }
    }
}

/// Indicator text for the overall health
#[must_use]
pub fn health_text(health: HealthState) -> &'static str {
    match health {
        HealthState::Idle => "Idle",
        HealthState::AllOnlineNoIncidents => "All services online",
        HealthState::AllOnlineWithIncidents => "All services online, incidents reported",
        HealthState::SomeOffline => "Service disruption",
    }
}

/// Countdown text, e.g. `Refreshing NA in 5 seconds...`
#[must_use]
pub fn countdown_text(region: &str, remaining: u64) -> String {
    let unit = if remaining == 1 { "second" } else { "seconds" };
    format!("Refreshing {region} in {remaining} {unit}...")
}

/// Everything a presentation layer reads to render the monitor
#[derive(Debug)]
pub struct StatusBoard {
    pub region: String,
    pub polling: bool,
    pub health: HealthState,
    pub services: HashMap<Service, ServiceRow>,
    pub countdown: Option<String>,
    pub latency: Option<Latency>,

    /// Connectivity message shown when polling was refused or lost
    pub connectivity_message: Option<String>,

    pub last_update: Option<DateTime<Utc>>,
    pub cycles_completed: u64,
    pub cycles_skipped: u64,

    // Diagnostic messages (keep last 50)
    pub diagnostics: VecDeque<DiagnosticMessage>,
    max_diagnostics: usize,

    /// Diagnostics ever added, including those already dropped
    pub diagnostics_total: u64,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new("NA")
    }
}

impl StatusBoard {
    pub fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            polling: false,
            health: HealthState::Idle,
            services: Service::ALL
                .into_iter()
                .map(|s| (s, ServiceRow::placeholder(s)))
                .collect(),
            countdown: None,
            latency: None,
            connectivity_message: None,
            last_update: None,
            cycles_completed: 0,
            cycles_skipped: 0,
            diagnostics: VecDeque::with_capacity(50),
            max_diagnostics: 50,
            diagnostics_total: 0,
        }
    }

    /// Diagnostics added after `seen` of `diagnostics_total`, oldest first
    pub fn diagnostics_since(&self, seen: u64) -> impl Iterator<Item = &DiagnosticMessage> {
        let fresh = usize::try_from(self.diagnostics_total.saturating_sub(seen)).unwrap_or(usize::MAX);
        let skip = self.diagnostics.len().saturating_sub(fresh);
        self.diagnostics.iter().skip(skip)
    }

    /// Text rendering of the board, one line per entry
    #[must_use]
    pub fn render(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "{} :: {} ({} refreshes, {} skipped)",
            self.region,
            health_text(self.health),
            self.cycles_completed,
            self.cycles_skipped
        )];

        for service in Service::ALL {
            let Some(row) = self.row(service) else {
                continue;
            };
            let color = format!("{:?}", row.color);
            let marker = if row.has_incidents { " (incidents)" } else { "" };
            lines.push(format!(
                "  {:<8} {:<10} {:<8} {}{}",
                service.label(),
                row.label,
                color,
                row.symbol,
                marker
            ));
        }

        if let Some(latency) = self.latency {
            lines.push(format!("  Latency: {latency}"));
        }
        if let Some(updated) = self.last_update {
            lines.push(format!("  Updated: {}", updated.format("%Y-%m-%d %H:%M:%S UTC")));
        }
        if let Some(message) = &self.connectivity_message {
            lines.push(format!("  {message}"));
        }
        lines
    }

    /// Row for a service
    #[must_use]
    pub fn row(&self, service: Service) -> Option<&ServiceRow> {
        self.services.get(&service)
    }

    /// Reset every service to the idle placeholder
    pub fn reset_services(&mut self) {
        for (service, row) in &mut self.services {
            *row = ServiceRow::placeholder(*service);
        }
        self.latency = None;
    }

    /// Mark polling as started for a region
    pub fn set_polling(&mut self, region: &str) {
        self.region = region.to_string();
        self.polling = true;
        self.connectivity_message = None;
        self.add_diagnostic(DiagnosticLevel::Info, format!("Polling started for {region}"));
    }

    /// Return to the idle state
    pub fn set_idle(&mut self) {
        self.polling = false;
        self.health = HealthState::Idle;
        self.countdown = None;
        self.reset_services();
    }

    /// Record a refused or lost connection
    pub fn set_connectivity_error(&mut self, message: &str) {
        self.set_idle();
        self.connectivity_message = Some(message.to_string());
        self.add_diagnostic(DiagnosticLevel::Error, message.to_string());
    }

    /// Fold a poller event into the board
    pub fn apply_event(&mut self, event: &PollEvent) {
        match event {
            PollEvent::CycleStarted { region } => {
                self.region = region.code().to_string();
            }
            PollEvent::Countdown { region, remaining } => {
                if self.polling {
                    self.countdown = Some(countdown_text(region.code(), *remaining));
                }
            }
            PollEvent::Updated(report) => {
                if !self.polling {
                    return;
                }
                for entry in &report.services {
                    let row = ServiceRow {
                        service: entry.service,
                        label: entry.status_label.clone(),
                        color: entry.status.color(),
                        symbol: Severity::symbol(entry.most_severe),
                        has_incidents: entry.incident_count > 0,
                    };
                    self.services.insert(entry.service, row);
                }
                self.health = report.health;
                self.latency = report.latency;
                self.last_update = Some(Utc::now());
                self.cycles_completed += 1;

                if report.new_incidents > 0 {
                    self.add_diagnostic(
                        DiagnosticLevel::Warning,
                        format!("[{}] {} new incident(s)", report.region, report.new_incidents),
                    );
                }
                if report.services.iter().any(|s| s.status == ServiceStatus::Unknown) {
                    self.add_diagnostic(
                        DiagnosticLevel::Warning,
                        format!("[{}] Some services reported an unknown status", report.region),
                    );
                }
            }
            PollEvent::CycleSkipped { region, reason } => {
                self.cycles_skipped += 1;
                self.add_diagnostic(
                    DiagnosticLevel::Warning,
                    format!("[{region}] Refresh skipped: {reason}"),
                );
            }
            PollEvent::SessionReset { region } => {
                self.region = region.code().to_string();
                self.reset_services();
                self.countdown = None;
                self.add_diagnostic(DiagnosticLevel::Info, format!("Switched to {region}"));
            }
            PollEvent::ConnectivityLost { message, .. } => {
                self.set_connectivity_error(message);
            }
            PollEvent::Stopped => {
                self.set_idle();
                self.add_diagnostic(DiagnosticLevel::Info, "Polling stopped".to_string());
            }
        }
    }

    /// Add a diagnostic message
    pub fn add_diagnostic(&mut self, level: DiagnosticLevel, message: String) {
        let diagnostic = DiagnosticMessage {
            timestamp: Utc::now(),
            level,
            message,
        };

        self.diagnostics.push_back(diagnostic);
        self.diagnostics_total += 1;

        // Keep only the last N messages
        while self.diagnostics.len() > self.max_diagnostics {
            self.diagnostics.pop_front();
        }
    }
}

/// Thread-safe wrapper for StatusBoard
pub type SharedStatusBoard = Arc<Mutex<StatusBoard>>;

#[cfg(test)]
mod tests {
    use super::*;
    use shard_status::{CycleReport, Region, ServiceReport};

    fn report(status: ServiceStatus, severity: Option<Severity>, count: usize) -> CycleReport {
        CycleReport {
            region: Region::new("NA", None),
            services: vec![ServiceReport {
                service: Service::Game,
                status,
                status_label: status.label().to_string(),
                most_severe: severity,
                incident_count: count,
            }],
            health: HealthState::SomeOffline,
            new_incidents: count,
            total_incidents: count,
            latency: Some(Latency::NotAvailable),
        }
    }

    #[test]
    fn test_countdown_text() {
        assert_eq!(countdown_text("NA", 5), "Refreshing NA in 5 seconds...");
        assert_eq!(countdown_text("EUW", 1), "Refreshing EUW in 1 second...");
        assert_eq!(countdown_text("NA", 0), "Refreshing NA in 0 seconds...");
    }

    #[test]
    fn test_idle_board_shows_placeholders() {
        let board = StatusBoard::new("NA");
        for service in Service::ALL {
            let row = board.row(service).unwrap();
            assert_eq!(row.label, PLACEHOLDER);
            assert_eq!(row.symbol, "?");
        }
        assert_eq!(board.health, HealthState::Idle);
    }

    #[test]
    fn test_update_fills_rows() {
        let mut board = StatusBoard::new("NA");
        board.set_polling("NA");
        board.apply_event(&PollEvent::Updated(report(
            ServiceStatus::Offline,
            Some(Severity::Error),
            2,
        )));

        let row = board.row(Service::Game).unwrap();
        assert_eq!(row.label, "Offline");
        assert_eq!(row.color, StatusColor::Red);
        assert_eq!(row.symbol, "! ! !");
        assert!(row.has_incidents);
        assert_eq!(board.health, HealthState::SomeOffline);
        assert_eq!(board.cycles_completed, 1);
        assert_eq!(board.row(Service::Store).unwrap().label, PLACEHOLDER);
    }

    #[test]
    fn test_updates_ignored_while_idle() {
        let mut board = StatusBoard::new("NA");
        board.apply_event(&PollEvent::Updated(report(ServiceStatus::Online, None, 0)));
        assert_eq!(board.row(Service::Game).unwrap().label, PLACEHOLDER);
        assert_eq!(board.cycles_completed, 0);
    }

    #[test]
    fn test_stop_and_connectivity_loss_reset_rows() {
        let mut board = StatusBoard::new("NA");
        board.set_polling("NA");
        board.apply_event(&PollEvent::Updated(report(ServiceStatus::Online, None, 0)));
        board.apply_event(&PollEvent::Countdown {
            region: Region::new("NA", None),
            remaining: 3,
        });
        assert_eq!(board.countdown.as_deref(), Some("Refreshing NA in 3 seconds..."));

        board.apply_event(&PollEvent::Stopped);
        assert!(!board.polling);
        assert!(board.countdown.is_none());
        assert_eq!(board.row(Service::Game).unwrap().label, PLACEHOLDER);

        board.set_polling("NA");
        board.apply_event(&PollEvent::ConnectivityLost {
            region: Region::new("NA", None),
            message: "unreachable".to_string(),
        });
        assert!(!board.polling);
        assert_eq!(board.connectivity_message.as_deref(), Some("unreachable"));
    }

    #[test]
    fn test_diagnostics_are_capped() {
        let mut board = StatusBoard::new("NA");
        for i in 0..60 {
            board.add_diagnostic(DiagnosticLevel::Info, format!("message {i}"));
        }
        assert_eq!(board.diagnostics.len(), 50);
        assert_eq!(board.diagnostics[0].message, "message 10");
        assert_eq!(board.diagnostics_total, 60);

        let fresh: Vec<&str> = board
            .diagnostics_since(57)
            .map(|d| d.message.as_str())
            .collect();
        assert_eq!(fresh, vec!["message 57", "message 58", "message 59"]);
        assert_eq!(board.diagnostics_since(0).count(), 50);
        assert_eq!(board.diagnostics_since(60).count(), 0);
    }

    #[test]
    fn test_render() {
        let mut board = StatusBoard::new("NA");
        board.set_polling("NA");
        board.apply_event(&PollEvent::Updated(report(
            ServiceStatus::Offline,
            Some(Severity::Alert),
            1,
        )));

        let lines = board.render();
        assert_eq!(lines[0], "NA :: Service disruption (1 refreshes, 0 skipped)");
        assert!(lines[2].contains("Offline"));
        assert!(lines[2].contains("Red"));
        assert!(lines[2].ends_with("! ! (incidents)"));
        assert!(lines.iter().any(|l| l == "  Latency: Not Available"));
    }
}
