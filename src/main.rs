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

mod config;
mod console;
mod monitor_manager;
mod status;

use std::path::PathBuf;
use std::sync::PoisonError;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Parser;
use log::{debug, error, info, warn};
use shard_status::CONNECTIVITY_LOST_MESSAGE;
use tokio::io::{AsyncBufReadExt, BufReader};

use config::AppConfig;
use console::Command;
use monitor_manager::MonitorManager;
use status::{DiagnosticLevel, SharedStatusBoard};

/// Watch regional service status and report incidents as they appear
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Region code to poll, e.g. NA or EUW
    #[arg(long)]
    region: Option<String>,

    /// Seconds between refreshes
    #[arg(long)]
    interval: Option<u64>,

    /// Read status from a local JSON file instead of the network
    #[arg(long)]
    debug_file: Option<PathBuf>,

    /// Status API key (RIOT_API_KEY takes precedence)
    #[arg(long)]
    api_key: Option<String>,

    /// Status feed base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Persist the effective configuration
    #[arg(long)]
    save: bool,

    /// Run one network check and exit
    #[arg(long)]
    check: bool,
}

impl Args {
    /// Override file settings with command line flags
    fn apply(&self, config: &mut AppConfig) {
        if let Some(region) = &self.region {
            config.region = region.to_uppercase();
        }
        if let Some(interval) = self.interval {
            config.polling_interval_secs = interval;
        }
        if let Some(path) = &self.debug_file {
            config.set_debug_file(path.clone());
        }
        if let Some(key) = &self.api_key {
            config.api_key = Some(key.clone());
        }
        if let Some(url) = &self.base_url {
            config.status_base_url.clone_from(url);
        }
    }
}

/// What the last repaint showed
#[derive(Debug, Default)]
struct View {
    last_update: Option<DateTime<Utc>>,
    diagnostics_seen: u64,
    countdown: Option<String>,
}

/// Log whatever changed on the board since the last repaint
fn repaint(status: &SharedStatusBoard, view: &mut View) {
    let board = status.lock().unwrap_or_else(PoisonError::into_inner);

    for diagnostic in board.diagnostics_since(view.diagnostics_seen) {
        let time = diagnostic.timestamp.format("%H:%M:%S");
        match diagnostic.level {
            DiagnosticLevel::Info => info!("[{}] {}", time, diagnostic.message),
            DiagnosticLevel::Warning => warn!("[{}] {}", time, diagnostic.message),
            DiagnosticLevel::Error => error!("[{}] {}", time, diagnostic.message),
        }
    }
    view.diagnostics_seen = board.diagnostics_total;

    if board.last_update != view.last_update {
        view.last_update = board.last_update;
        for line in board.render() {
            info!("{}", line);
        }
    }

    if board.countdown != view.countdown {
        if let Some(text) = &board.countdown {
            debug!("{}", text);
        }
        view.countdown.clone_from(&board.countdown);
    }
}

fn region_list(manager: &MonitorManager) -> String {
    manager
        .regions()
        .iter()
        .map(|r| r.code().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Run one console command. Returns `false` when the user asked to quit.
async fn handle_command(manager: &mut MonitorManager, command: Command) -> bool {
    match command {
        Command::On => {
            if !manager.turn_on().await {
                warn!("{}", CONNECTIVITY_LOST_MESSAGE);
            }
        }
        Command::Off => manager.turn_off(),
        Command::Region(code) => {
            if !manager.change_region(&code) {
                info!("Available regions: {}", region_list(manager));
            }
        }
        Command::Interval(secs) => {
            manager.set_interval(secs);
        }
        Command::Debug(enabled) => manager.set_debug_mode(enabled),
        Command::DebugFile(path) => manager.set_debug_file(path),
        Command::Incidents(service) => {
            let detail = manager.incident_detail(service);
            if detail.is_empty() {
                info!("No incidents for {}", service);
            } else {
                info!("{}", detail);
            }
        }
        Command::Regions => info!("Available regions: {}", region_list(manager)),
        Command::Help => info!("{}", console::HELP),
        Command::Quit => return false,
    }
    true
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!("Failed to load configuration, using defaults: {}", e);
        AppConfig::default()
    });
    args.apply(&mut config);

    if args.save {
        config.save()?;
        info!("Configuration saved to {}", AppConfig::get_config_path()?.display());
    }
    if let Some(source) = config.api_key_source() {
        info!("Using API key from {}", source);
    }

    let mut manager = MonitorManager::new(&config)?;
    let session = manager.session();
    if !session.region.code().eq_ignore_ascii_case(&config.region) {
        info!("Available regions: {}", region_list(&manager));
    }

    if args.check {
        let reachable = manager.network_check().await;
        manager.shutdown().await;
        if reachable {
            info!("Status host for {} is reachable", session.region);
            return Ok(());
        }
        return Err(CONNECTIVITY_LOST_MESSAGE.into());
    }

    if !manager.turn_on().await {
        manager.shutdown().await;
        return Err(CONNECTIVITY_LOST_MESSAGE.into());
    }
    info!("{}", console::HELP);

    let status = manager.status();
    let mut view = View::default();
    let mut repaint_interval = tokio::time::interval(Duration::from_millis(500));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                break;
            }
            _ = repaint_interval.tick() => repaint(&status, &mut view),
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match console::parse(&line) {
                    Some(Ok(command)) => {
                        if !handle_command(&mut manager, command).await {
                            break;
                        }
                    }
                    Some(Err(message)) => warn!("{}; {}", message, console::HELP),
                    None => {}
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!("Failed to read console input: {}", e);
                    stdin_open = false;
                }
            },
        }
    }

    manager.turn_off();
    repaint(&status, &mut view);
    manager.shutdown().await;
    Ok(())
}
