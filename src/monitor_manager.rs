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

use log::{info, warn};
use std::num::NonZeroU64;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use shard_status::{
    FetchError, PollEvent, Poller, PollingSession, Region, RegionCatalog, Service,
    CONNECTIVITY_LOST_MESSAGE, POLLING_RATES,
};

use crate::config::AppConfig;
use crate::status::{DiagnosticLevel, SharedStatusBoard, StatusBoard};

/// Drives the poller the way the presentation layer would: an on/off toggle,
/// a region selector, an interval selector and debug controls.
pub struct MonitorManager {
    /// Polling scheduler
    poller: Poller,

    /// Board the presentation reads
    status: SharedStatusBoard,

    /// Cancellation token for the event pump
    pump_token: CancellationToken,

    pump: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for MonitorManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorManager")
            .field("poller", &self.poller)
            .finish_non_exhaustive()
    }
}

impl MonitorManager {
    /// Create an idle monitor from the application configuration.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: &AppConfig) -> Result<Self, FetchError> {
        let catalog = RegionCatalog::default();
        let region = initial_region(&catalog, &config.region);

        let mut session = PollingSession::new(region.clone(), config.polling_interval());
        session.debug_mode = config.debug_mode;
        session.debug_file.clone_from(&config.debug_file);

        let poller = Poller::new(config.poller_config(), catalog, session)?;
        let status = Arc::new(Mutex::new(StatusBoard::new(region.code())));

        let pump_token = CancellationToken::new();
        let pump = spawn_event_pump(poller.subscribe(), Arc::clone(&status), pump_token.clone());

        Ok(Self {
            poller,
            status,
            pump_token,
            pump: Some(pump),
        })
    }

    /// Shared status board
    #[must_use]
    pub fn status(&self) -> SharedStatusBoard {
        Arc::clone(&self.status)
    }

    #[must_use]
    pub fn session(&self) -> PollingSession {
        self.poller.session()
    }

    #[must_use]
    pub fn is_on(&self) -> bool {
        self.poller.is_running()
    }

    /// Check that the current region's status host is reachable
    pub async fn network_check(&self) -> bool {
        self.poller.network_check().await
    }

    /// Check connectivity, then start polling.
    ///
    /// Returns `false` and stays idle when the status host cannot be reached.
    pub async fn turn_on(&mut self) -> bool {
        if self.poller.is_running() {
            return true;
        }

        let session = self.poller.session();
        if !self.poller.network_check().await {
            warn!("Not starting: {} status host is unreachable", session.region);
            lock(&self.status).set_connectivity_error(CONNECTIVITY_LOST_MESSAGE);
            return false;
        }

        info!("Turning monitor on for {}", session.region);
        lock(&self.status).set_polling(session.region.code());
        self.poller.start(session);
        true
    }

    /// Stop polling and reset the board to placeholders
    pub fn turn_off(&mut self) {
        if !self.poller.is_running() {
            return;
        }
        info!("Turning monitor off");
        self.poller.stop();
        lock(&self.status).apply_event(&PollEvent::Stopped);
    }

    /// Switch to a region by code. Unknown codes are ignored.
    pub fn change_region(&mut self, code: &str) -> bool {
        let Some(region) = self.poller.catalog().get(code).cloned() else {
            warn!("Attempted to switch to unknown region: {}", code);
            return false;
        };

        info!("Switching region to {}", region);
        lock(&self.status).region = region.code().to_string();
        self.poller.set_region(region);
        true
    }

    /// Change the polling interval. Zero is rejected.
    pub fn set_interval(&mut self, secs: u64) -> bool {
        let Some(interval) = NonZeroU64::new(secs) else {
            warn!("Ignoring polling interval of 0 seconds");
            return false;
        };
        if !POLLING_RATES.contains(&secs) {
            info!("Using non-standard polling interval of {}s", secs);
        }
        self.poller.set_interval(interval);
        true
    }

    pub fn set_debug_mode(&mut self, enabled: bool) {
        info!("Debug mode {}", if enabled { "enabled" } else { "disabled" });
        lock(&self.status).add_diagnostic(
            DiagnosticLevel::Info,
            format!("Debug mode {}", if enabled { "on" } else { "off" }),
        );
        self.poller.set_debug_mode(enabled);
    }

    pub fn set_debug_file(&mut self, path: Option<PathBuf>) {
        self.poller.set_debug_file(path);
    }

    /// Incident detail text for a service
    #[must_use]
    pub fn incident_detail(&self, service: Service) -> String {
        self.poller.incident_set().describe(service)
    }

    /// Regions offered by the selector
    #[must_use]
    pub fn regions(&self) -> Vec<Region> {
        self.poller.catalog().regions().to_vec()
    }

    /// Stop polling and wait for background tasks to exit
    pub async fn shutdown(&mut self) {
        info!("Shutting down MonitorManager");
        self.poller.shutdown().await;
        self.pump_token.cancel();
        if let Some(pump) = self.pump.take() {
            if let Err(e) = pump.await {
                warn!("Event pump ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for MonitorManager {
    fn drop(&mut self) {
        self.pump_token.cancel();
    }
}

fn initial_region(catalog: &RegionCatalog, code: &str) -> Region {
    if let Some(region) = catalog.get(code) {
        return region.clone();
    }
    warn!("Unknown region '{}' in configuration, using default", code);
    catalog
        .default_region()
        .cloned()
        .unwrap_or_else(|| Region::new(code, None))
}

fn lock(status: &SharedStatusBoard) -> std::sync::MutexGuard<'_, StatusBoard> {
    status.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fold poller events into the status board until cancelled.
///
/// `Stopped` is applied synchronously by `turn_off`, so the pump skips it.
fn spawn_event_pump(
    mut events: broadcast::Receiver<PollEvent>,
    status: SharedStatusBoard,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                () = cancel_token.cancelled() => break,
                event = events.recv() => event,
            };

            match event {
                Ok(PollEvent::Stopped) => {}
                Ok(event) => lock(&status).apply_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Status board fell behind by {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::PLACEHOLDER;
    use shard_status::HealthState;
    use std::time::Duration;
    use tempfile::NamedTempFile;
    use tokio::time::timeout;

    const DOCUMENT: &str = r#"{"services":[
        {"name":"Client","status":"online","incidents":[]},
        {"name":"Game","status":"online","incidents":[
            {"updates":[{"id":"g1","severity":"warn","updated_at":"2024-01-02T03:04:05.000Z","content":"Queue delays"}]}]},
        {"name":"Store","status":"online","incidents":[]},
        {"name":"Website","status":"online","incidents":[]}
    ]}"#;

    fn debug_config(file: &NamedTempFile) -> AppConfig {
        let mut config = AppConfig {
            polling_interval_secs: 60,
            probe_latency: false,
            ..Default::default()
        };
        config.set_debug_file(file.path().to_path_buf());
        config
    }

    async fn wait_until<F>(status: &SharedStatusBoard, mut ready: F)
    where
        F: FnMut(&StatusBoard) -> bool,
    {
        timeout(Duration::from_secs(15), async {
            loop {
                if ready(&lock(status)) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("timed out waiting for status board");
    }

    #[tokio::test]
    async fn test_turn_on_fills_board() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), DOCUMENT).unwrap();

        let mut manager = MonitorManager::new(&debug_config(&file)).unwrap();
        assert!(manager.turn_on().await);
        assert!(manager.is_on());

        let status = manager.status();
        wait_until(&status, |board| board.cycles_completed > 0).await;
        {
            let board = lock(&status);
            assert_eq!(board.health, HealthState::AllOnlineWithIncidents);
            let game = board.row(Service::Game).unwrap();
            assert_eq!(game.label, "Online");
            assert_eq!(game.symbol, "!");
            assert!(game.has_incidents);
        }

        assert_eq!(
            manager.incident_detail(Service::Game),
            "[NA Game] :: Warn :: 2024-01-02 @ 03:04:05 GMT :: Queue delays"
        );

        manager.turn_off();
        assert!(!manager.is_on());
        {
            let board = lock(&status);
            assert!(!board.polling);
            assert_eq!(board.health, HealthState::Idle);
            assert_eq!(board.row(Service::Game).unwrap().label, PLACEHOLDER);
        }

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_change_region() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), DOCUMENT).unwrap();

        let mut manager = MonitorManager::new(&debug_config(&file)).unwrap();
        assert!(!manager.change_region("XX"));
        assert_eq!(manager.session().region.code(), "NA");

        assert!(manager.turn_on().await);
        assert!(manager.change_region("euw"));
        assert_eq!(manager.session().region.code(), "EUW");

        let status = manager.status();
        wait_until(&status, |board| {
            board.region == "EUW" && board.row(Service::Game).is_some_and(|r| r.label == "Online")
        })
        .await;
        wait_until(&status, |_| {
            manager.incident_detail(Service::Game).starts_with("[EUW Game]")
        })
        .await;

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_interval_validation() {
        let file = NamedTempFile::new().unwrap();
        let mut manager = MonitorManager::new(&debug_config(&file)).unwrap();
        assert!(!manager.set_interval(0));
        assert!(manager.set_interval(5));
        assert_eq!(manager.session().interval_secs.get(), 5);
        assert_eq!(manager.regions().len(), 11);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_unreachable_host_refuses_to_start() {
        let config = AppConfig {
            status_base_url: "http://status.shardwatch.invalid/shards".to_string(),
            request_timeout_secs: 5,
            probe_latency: false,
            ..Default::default()
        };
        let mut manager = MonitorManager::new(&config).unwrap();
        assert!(!manager.turn_on().await);
        assert!(!manager.is_on());

        let status = manager.status();
        let board = lock(&status);
        assert!(!board.polling);
        assert_eq!(
            board.connectivity_message.as_deref(),
            Some(CONNECTIVITY_LOST_MESSAGE)
        );
        drop(board);

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_debug_toggle_off_uses_network_source() {
        let file = NamedTempFile::new().unwrap();
        let mut manager = MonitorManager::new(&debug_config(&file)).unwrap();
        assert!(manager.session().debug_mode);
        manager.set_debug_mode(false);
        assert!(!manager.session().debug_mode);
        manager.set_debug_file(None);
        assert!(manager.session().debug_file.is_none());
        manager.shutdown().await;
    }
}
