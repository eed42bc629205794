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

//! Overall health indicator derived from service statuses and incidents.

use std::collections::HashMap;

use crate::incidents::IncidentSet;
use crate::protocol::ServiceStatus;
use crate::region::Service;

/// Single indicator state for the whole region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HealthState {
    /// Polling is not active.
    #[default]
    Idle,
    AllOnlineNoIncidents,
    AllOnlineWithIncidents,
    /// At least one service reports something other than `Online`.
    SomeOffline,
}

/// Summarize the current statuses and incidents.
///
/// A service missing from `statuses` is showing the idle placeholder and
/// counts as neither online nor offline.
#[must_use]
pub fn summarize(
    polling: bool,
    statuses: &HashMap<Service, ServiceStatus>,
    incidents: &IncidentSet,
) -> HealthState {
    if !polling {
        return HealthState::Idle;
    }

    if statuses.values().any(|status| *status != ServiceStatus::Online) {
        HealthState::SomeOffline
    } else if incidents.is_empty() {
        HealthState::AllOnlineNoIncidents
    } else {
        HealthState::AllOnlineWithIncidents
    }
}
