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

//! Cancellable polling scheduler.
//!
//! A [`Poller`] owns at most one running session. Each session runs a single
//! background task that repeats fetch, parse, reconcile and summarize, then
//! sleeps for the session interval. Once a cycle's result is published, a
//! countdown task ticks once per second towards the next refresh.
//!
//! One [`CancellationToken`] per running session stops both tasks; the
//! countdown holds a child token that is also cancelled when the sleep ends. Region, debug mode and debug file changes reach the running task
//! over a watch channel and restart the cycle immediately with cleared
//! incident memory. Cancellation is checked between steps and at every
//! await point.

mod session;

pub use session::{default_interval, PollingSession};

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, error, info, warn};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::fetch::{FetchError, FetchSource, FetcherConfig, Latency, StatusFetcher};
use crate::health::{summarize, HealthState};
use crate::incidents::{Incident, IncidentSet};
use crate::protocol::{Protocol, ServiceStatus, Severity, ShardStatusParser, StatusDocument};
use crate::region::{Region, RegionCatalog, Service};
use crate::severity::most_severe;

/// Message reported when the status host cannot be resolved.
pub const CONNECTIVITY_LOST_MESSAGE: &str = "A connection to the server was unable to be made.";

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollerState {
    #[default]
    Idle,
    Polling,
    /// Stop was requested and the session task has not exited yet.
    Stopping,
}

/// Per-service outcome of one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceReport {
    pub service: Service,
    pub status: ServiceStatus,
    /// Normalized label from the document, e.g. `Offline`.
    pub status_label: String,
    /// Most urgent severity among this cycle's incidents for the service.
    pub most_severe: Option<Severity>,
    /// Incidents stored for the service after reconciliation.
    pub incident_count: usize,
}

/// Outcome of one completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub region: Region,
    pub services: Vec<ServiceReport>,
    pub health: HealthState,
    /// Incidents whose id was first seen this cycle.
    pub new_incidents: usize,
    pub total_incidents: usize,
    pub latency: Option<Latency>,
}

/// Events published to collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    CycleStarted { region: Region },
    /// Seconds left until the next refresh.
    Countdown { region: Region, remaining: u64 },
    Updated(CycleReport),
    /// The cycle failed with a transient error; polling continues.
    CycleSkipped { region: Region, reason: String },
    /// Region or source changed; incident memory was cleared.
    SessionReset { region: Region },
    /// The status host could not be resolved; polling stopped.
    ConnectivityLost { region: Region, message: String },
    Stopped,
}

/// Configuration for the poller.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub fetcher: FetcherConfig,
    /// Probe region latency after each successful fetch.
    pub probe_latency: bool,
    /// Broadcast channel capacity for events.
    pub event_channel_capacity: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            fetcher: FetcherConfig::default(),
            probe_latency: true,
            event_channel_capacity: 256,
        }
    }
}

/// State shared between the cycle task and readers.
#[derive(Debug, Default)]
struct SessionState {
    state: PollerState,
    statuses: HashMap<Service, ServiceStatus>,
    incidents: IncidentSet,
    latency: Option<Latency>,
    /// Bumped by every `start`; a task only settles the state it owns.
    generation: u64,
}

impl SessionState {
    /// Reset to the idle placeholder for every service.
    fn clear_statuses(&mut self) {
        self.statuses.clear();
        self.latency = None;
    }
}

type SharedState = Arc<RwLock<SessionState>>;

fn write_state(shared: &SharedState) -> RwLockWriteGuard<'_, SessionState> {
    shared.write().unwrap_or_else(PoisonError::into_inner)
}

fn read_state(shared: &SharedState) -> RwLockReadGuard<'_, SessionState> {
    shared.read().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct RunningTask {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
    /// `stop` already ran; the handle is kept so `shutdown` can join it.
    halted: bool,
}

/// Handle to the polling scheduler.
///
/// `start` and `stop` never block; both may be called repeatedly in any
/// order. Must be used from within a Tokio runtime.
pub struct Poller {
    fetcher: Arc<StatusFetcher>,
    catalog: Arc<RegionCatalog>,
    probe_latency: bool,
    shared: SharedState,
    session_tx: watch::Sender<PollingSession>,
    event_tx: broadcast::Sender<PollEvent>,
    task: Option<RunningTask>,
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("session", &*self.session_tx.borrow())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Poller {
    /// Create an idle poller for the given session settings.
    pub fn new(
        config: PollerConfig,
        catalog: RegionCatalog,
        session: PollingSession,
    ) -> Result<Self, FetchError> {
        let fetcher = StatusFetcher::new(config.fetcher)?;
        let (session_tx, _) = watch::channel(session);
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));

        Ok(Self {
            fetcher: Arc::new(fetcher),
            catalog: Arc::new(catalog),
            probe_latency: config.probe_latency,
            shared: Arc::new(RwLock::new(SessionState::default())),
            session_tx,
            event_tx,
            task: None,
        })
    }

    /// Subscribe to poller events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
        self.event_tx.subscribe()
    }

    /// Start polling with the given settings.
    ///
    /// Any running session is cancelled first, so cycles never overlap.
    /// Incident memory starts empty.
    pub fn start(&mut self, session: PollingSession) {
        if let Some(task) = self.task.take() {
            task.cancel_token.cancel();
        }
        self.session_tx.send_replace(session);

        let generation = {
            let mut shared = write_state(&self.shared);
            shared.generation += 1;
            shared.state = PollerState::Polling;
            shared.clear_statuses();
            shared.incidents.clear();
            shared.generation
        };

        let cancel_token = CancellationToken::new();
        let ctx = CycleContext {
            fetcher: Arc::clone(&self.fetcher),
            catalog: Arc::clone(&self.catalog),
            parser: ShardStatusParser::new(),
            probe_latency: self.probe_latency,
            shared: Arc::clone(&self.shared),
            event_tx: self.event_tx.clone(),
            cancel_token: cancel_token.clone(),
            generation,
        };
        let session_rx = self.session_tx.subscribe();

        let handle = tokio::spawn(poll_loop(ctx, session_rx));
        self.task = Some(RunningTask {
            cancel_token,
            handle,
            halted: false,
        });
    }

    /// Stop polling. A no-op when nothing is running.
    ///
    /// Returns immediately. The state reads [`PollerState::Stopping`] until
    /// the task exits at its next await point, then [`PollerState::Idle`].
    pub fn stop(&mut self) {
        self.halt();
    }

    /// Stop polling and wait for the cycle task to exit.
    pub async fn shutdown(&mut self) {
        self.halt();
        let Some(task) = self.task.take() else {
            return;
        };
        if let Err(e) = task.handle.await {
            warn!("Polling task ended abnormally: {}", e);
            let mut shared = write_state(&self.shared);
            if shared.state == PollerState::Stopping {
                shared.state = PollerState::Idle;
            }
        }
    }

    fn halt(&mut self) {
        let Some(task) = self.task.as_mut() else {
            return;
        };
        if task.halted {
            return;
        }
        task.halted = true;

        {
            // Cancel under the lock so the task cannot settle in between.
            let mut shared = write_state(&self.shared);
            task.cancel_token.cancel();
            if shared.state == PollerState::Polling {
                shared.state = PollerState::Stopping;
            }
            shared.clear_statuses();
        }

        info!("Polling stopped for {}", self.session_tx.borrow().region);
        let _ = self.event_tx.send(PollEvent::Stopped);
    }

    /// Switch region. A running cycle restarts immediately for the new region.
    pub fn set_region(&self, region: Region) {
        self.session_tx.send_if_modified(|session| {
            let changed = session.region != region;
            session.region = region;
            changed
        });
    }

    /// Change the interval. Takes effect from the next sleep.
    pub fn set_interval(&self, interval_secs: NonZeroU64) {
        self.session_tx.send_if_modified(|session| {
            let changed = session.interval_secs != interval_secs;
            session.interval_secs = interval_secs;
            changed
        });
    }

    /// Toggle debug mode. A running cycle restarts immediately.
    pub fn set_debug_mode(&self, enabled: bool) {
        self.session_tx.send_if_modified(|session| {
            let changed = session.debug_mode != enabled;
            session.debug_mode = enabled;
            changed
        });
    }

    /// Swap the debug file. A running debug-mode cycle restarts immediately.
    pub fn set_debug_file(&self, path: Option<PathBuf>) {
        self.session_tx.send_if_modified(|session| {
            let changed = session.debug_file != path;
            session.debug_file = path;
            changed
        });
    }

    /// Current session settings.
    #[must_use]
    pub fn session(&self) -> PollingSession {
        self.session_tx.borrow().clone()
    }

    #[must_use]
    pub fn catalog(&self) -> &RegionCatalog {
        &self.catalog
    }

    /// Check that the current region's status host is reachable.
    pub async fn network_check(&self) -> bool {
        let session = self.session();
        self.fetcher
            .network_check(&session.region, &session.source())
            .await
    }

    #[must_use]
    pub fn state(&self) -> PollerState {
        read_state(&self.shared).state
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == PollerState::Polling
    }

    /// Latest status per service. Services showing the idle placeholder are absent.
    #[must_use]
    pub fn statuses(&self) -> HashMap<Service, ServiceStatus> {
        read_state(&self.shared).statuses.clone()
    }

    /// Stored incidents for a service, newest first.
    #[must_use]
    pub fn incidents(&self, service: Service) -> Vec<Incident> {
        read_state(&self.shared).incidents.for_service(service).to_vec()
    }

    /// Snapshot of the whole incident set.
    #[must_use]
    pub fn incident_set(&self) -> IncidentSet {
        read_state(&self.shared).incidents.clone()
    }

    #[must_use]
    pub fn latency(&self) -> Option<Latency> {
        read_state(&self.shared).latency
    }

    #[must_use]
    pub fn health(&self) -> HealthState {
        let shared = read_state(&self.shared);
        summarize(
            shared.state == PollerState::Polling,
            &shared.statuses,
            &shared.incidents,
        )
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.cancel_token.cancel();
        }
    }
}

/// Everything the cycle task needs, owned.
struct CycleContext {
    fetcher: Arc<StatusFetcher>,
    catalog: Arc<RegionCatalog>,
    parser: ShardStatusParser,
    probe_latency: bool,
    shared: SharedState,
    event_tx: broadcast::Sender<PollEvent>,
    cancel_token: CancellationToken,
    generation: u64,
}

impl CycleContext {
    /// Publish an event unless this session has been cancelled.
    fn emit(&self, event: PollEvent) {
        if !self.cancel_token.is_cancelled() {
            let _ = self.event_tx.send(event);
        }
    }
}

enum CycleOutcome {
    Completed(CycleReport),
    Skipped(String),
    Unreachable(String),
    /// The session was retargeted while the cycle was in flight.
    Superseded,
    Cancelled,
}

enum Step {
    Cycle(CycleOutcome),
    Retarget(PollingSession),
    Elapsed,
    Cancelled,
}

async fn poll_loop(ctx: CycleContext, session_rx: watch::Receiver<PollingSession>) {
    run_session(&ctx, session_rx).await;

    let mut shared = write_state(&ctx.shared);
    if shared.generation == ctx.generation && shared.state == PollerState::Stopping {
        shared.state = PollerState::Idle;
    }
}

async fn run_session(ctx: &CycleContext, mut session_rx: watch::Receiver<PollingSession>) {
    let guard_rx = session_rx.clone();
    let mut session = session_rx.borrow_and_update().clone();

    loop {
        if ctx.cancel_token.is_cancelled() {
            info!("Polling cancelled");
            return;
        }

        let target = session.target();
        let step = tokio::select! {
            biased;
            () = ctx.cancel_token.cancelled() => Step::Cancelled,
            next = next_retarget(&mut session_rx, &target) => match next {
                Some(next) => Step::Retarget(next),
                None => Step::Cancelled,
            },
            outcome = run_cycle(ctx, &session, &guard_rx) => Step::Cycle(outcome),
        };

        match step {
            Step::Cancelled | Step::Elapsed | Step::Cycle(CycleOutcome::Cancelled) => {
                info!("Polling cancelled for {}", session.region);
                return;
            }
            Step::Retarget(next) => {
                session = restart(ctx, next);
                continue;
            }
            Step::Cycle(CycleOutcome::Superseded) => {
                let next = session_rx.borrow_and_update().clone();
                session = restart(ctx, next);
                continue;
            }
            Step::Cycle(CycleOutcome::Unreachable(reason)) => {
                connectivity_lost(ctx, &session.region, &reason);
                return;
            }
            Step::Cycle(CycleOutcome::Skipped(reason)) => {
                warn!("Skipping {} cycle: {}", session.region, reason);
                ctx.emit(PollEvent::CycleSkipped {
                    region: session.region.clone(),
                    reason,
                });
            }
            Step::Cycle(CycleOutcome::Completed(report)) => {
                ctx.emit(PollEvent::Updated(report));
            }
        }

        let interval = guard_rx.borrow().interval();
        let started = Instant::now();
        let deadline = started + interval;
        let countdown_token = ctx.cancel_token.child_token();
        tokio::spawn(run_countdown(
            ctx.event_tx.clone(),
            session.region.clone(),
            started,
            interval.as_secs(),
            countdown_token.clone(),
        ));

        let step = tokio::select! {
            biased;
            () = ctx.cancel_token.cancelled() => Step::Cancelled,
            next = next_retarget(&mut session_rx, &target) => match next {
                Some(next) => Step::Retarget(next),
                None => Step::Cancelled,
            },
            () = sleep_until(deadline) => Step::Elapsed,
        };
        countdown_token.cancel();

        match step {
            Step::Cancelled => {
                info!("Polling cancelled for {}", session.region);
                return;
            }
            Step::Retarget(next) => session = restart(ctx, next),
            Step::Elapsed => ctx.emit(PollEvent::Countdown {
                region: session.region.clone(),
                remaining: 0,
            }),
            Step::Cycle(_) => {}
        }
    }
}

/// Wait for a settings change that alters region or source.
///
/// Interval-only changes are absorbed. Returns `None` once the poller is gone.
async fn next_retarget(
    session_rx: &mut watch::Receiver<PollingSession>,
    target: &(Region, FetchSource),
) -> Option<PollingSession> {
    loop {
        if session_rx.changed().await.is_err() {
            return None;
        }
        let next = session_rx.borrow_and_update().clone();
        if next.target() != *target {
            return Some(next);
        }
        debug!("Polling interval for {} is now {}s", next.region, next.interval_secs);
    }
}

/// Clear incident memory for a retargeted session.
fn restart(ctx: &CycleContext, next: PollingSession) -> PollingSession {
    {
        let mut shared = write_state(&ctx.shared);
        if !ctx.cancel_token.is_cancelled() {
            shared.incidents.clear();
            shared.clear_statuses();
        }
    }
    info!(
        "Session changed, restarting immediately for {} ({})",
        next.region,
        source_label(&next.source())
    );
    ctx.emit(PollEvent::SessionReset {
        region: next.region.clone(),
    });
    next
}

fn connectivity_lost(ctx: &CycleContext, region: &Region, reason: &str) {
    {
        let mut shared = write_state(&ctx.shared);
        if ctx.cancel_token.is_cancelled() {
            return;
        }
        shared.state = PollerState::Idle;
        shared.clear_statuses();
    }
    error!("Connectivity lost while polling {}: {}", region, reason);
    ctx.emit(PollEvent::ConnectivityLost {
        region: region.clone(),
        message: CONNECTIVITY_LOST_MESSAGE.to_string(),
    });
}

fn source_label(source: &FetchSource) -> String {
    match source {
        FetchSource::Network => "network".to_string(),
        FetchSource::File(Some(path)) => format!("debug file {}", path.display()),
        FetchSource::File(None) => "debug file (unset)".to_string(),
    }
}

async fn run_cycle(
    ctx: &CycleContext,
    session: &PollingSession,
    guard_rx: &watch::Receiver<PollingSession>,
) -> CycleOutcome {
    let region = &session.region;
    let source = session.source();
    info!(
        "Polling {} every {}s from {}",
        region,
        session.interval_secs,
        source_label(&source)
    );
    ctx.emit(PollEvent::CycleStarted {
        region: region.clone(),
    });

    let raw = match ctx.fetcher.fetch(region, &source).await {
        Ok(raw) => raw,
        Err(e) if e.is_transient() => return CycleOutcome::Skipped(e.to_string()),
        Err(e) => return CycleOutcome::Unreachable(e.to_string()),
    };

    let document = match ctx.parser.parse(&raw) {
        Ok(document) => document,
        Err(e) => return CycleOutcome::Skipped(e.to_string()),
    };

    let latency = if ctx.probe_latency {
        Some(ctx.fetcher.probe_latency(region).await)
    } else {
        None
    };

    let mut shared = write_state(&ctx.shared);
    if ctx.cancel_token.is_cancelled() {
        return CycleOutcome::Cancelled;
    }
    if guard_rx.borrow().target() != session.target() {
        return CycleOutcome::Superseded;
    }
    let services = ctx.catalog.services(region);
    CycleOutcome::Completed(apply_document(&mut shared, region, services, &document, latency))
}

/// Replace statuses and merge incidents from one parsed document.
fn apply_document(
    state: &mut SessionState,
    region: &Region,
    services: &[Service],
    document: &StatusDocument,
    latency: Option<Latency>,
) -> CycleReport {
    state.statuses.clear();
    let mut reports = Vec::with_capacity(services.len());
    let mut new_incidents = 0;

    for &service in services {
        let Some(entry) = document.get(&service) else {
            state.statuses.insert(service, ServiceStatus::Unknown);
            reports.push(ServiceReport {
                service,
                status: ServiceStatus::Unknown,
                status_label: ServiceStatus::Unknown.label().to_string(),
                most_severe: None,
                incident_count: state.incidents.for_service(service).len(),
            });
            continue;
        };

        for incident in &entry.incidents {
            debug!(
                "[{} {}] :: {} :: {} :: {}",
                region, service, incident.severity, incident.updated_at, incident.content
            );
        }

        new_incidents += state.incidents.reconcile(region, service, &entry.incidents);
        state.statuses.insert(service, entry.status);
        reports.push(ServiceReport {
            service,
            status: entry.status,
            status_label: entry.status_label.clone(),
            most_severe: most_severe(entry.incidents.iter().map(|i| i.severity.as_str())),
            incident_count: state.incidents.for_service(service).len(),
        });
    }

    state.latency = latency;
    if new_incidents > 0 {
        info!("{} new incident(s) for {}", new_incidents, region);
    }

    CycleReport {
        region: region.clone(),
        services: reports,
        health: summarize(true, &state.statuses, &state.incidents),
        new_incidents,
        total_incidents: state.incidents.len(),
        latency,
    }
}

/// Tick once per second from `seconds` down to one, starting at `started`.
///
/// The zero tick is sent by the cycle task when the sleep ends.
async fn run_countdown(
    event_tx: broadcast::Sender<PollEvent>,
    region: Region,
    started: Instant,
    seconds: u64,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(started, Duration::from_secs(1));
    for remaining in (1..=seconds).rev() {
        tokio::select! {
            () = cancel_token.cancelled() => return,
            _ = ticker.tick() => {}
        }
        if cancel_token.is_cancelled() {
            return;
        }
        let _ = event_tx.send(PollEvent::Countdown {
            region: region.clone(),
            remaining,
        });
    }
}
