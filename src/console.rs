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

//! Line commands read from stdin while the monitor runs.

use std::path::PathBuf;

use shard_status::Service;

/// Usage text printed for `help` and unrecognized input
pub const HELP: &str = "commands: on | off | region <CODE> | interval <SECS> | \
debug on|off | debug-file [PATH] | incidents <SERVICE> | regions | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    On,
    Off,
    Region(String),
    Interval(u64),
    Debug(bool),
    /// `None` clears the debug file
    DebugFile(Option<PathBuf>),
    Incidents(Service),
    Regions,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Option<Result<Command, String>> {
    let mut words = line.split_whitespace();
    let name = words.next()?.to_lowercase();
    let arg = words.next();

    let command = match (name.as_str(), arg) {
        ("on", None) => Ok(Command::On),
        ("off", None) => Ok(Command::Off),
        ("region", Some(code)) => Ok(Command::Region(code.to_uppercase())),
        ("interval", Some(secs)) => secs
            .parse()
            .map(Command::Interval)
            .map_err(|e| format!("invalid interval '{secs}': {e}")),
        ("debug", Some("on")) => Ok(Command::Debug(true)),
        ("debug", Some("off")) => Ok(Command::Debug(false)),
        ("debug-file", path) => Ok(Command::DebugFile(path.map(PathBuf::from))),
        ("incidents", Some(label)) => Service::from_label(label)
            .map(Command::Incidents)
            .ok_or_else(|| format!("unknown service '{label}'")),
        ("regions", None) => Ok(Command::Regions),
        ("help", _) => Ok(Command::Help),
        ("quit" | "exit", None) => Ok(Command::Quit),
        _ => Err(format!("unrecognized command '{}'", line.trim())),
    };
    Some(command)
}
