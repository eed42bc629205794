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

//! Picks the most urgent severity observed for a service in one cycle.

use crate::protocol::Severity;

/// Return the most severe of the given severity labels.
///
/// Precedence is Error > Alert > Warn = Info. The running maximum is only
/// replaced on a strictly greater precedence, so on a tie the first label
/// seen wins. Unrecognized labels never win. An empty input, or one with no
/// recognized label, yields `None`.
#[must_use]
pub fn most_severe<I, S>(severities: I) -> Option<Severity>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut highest: Option<Severity> = None;
    for label in severities {
        let Some(severity) = Severity::from_label(label.as_ref()) else {
            continue;
        };
        match highest {
            Some(current) if current.precedence() >= severity.precedence() => {}
            _ => highest = Some(severity),
        }
    }
    highest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_none() {
        assert_eq!(most_severe(Vec::<String>::new()), None);
    }

    #[test]
    fn test_precedence() {
        assert_eq!(most_severe(["Info", "Warn", "Alert"]), Some(Severity::Alert));
        assert_eq!(most_severe(["Error", "Alert"]), Some(Severity::Error));
        assert_eq!(most_severe(["Alert", "Error", "Info"]), Some(Severity::Error));
    }

    #[test]
    fn test_tie_keeps_first_seen() {
        assert_eq!(most_severe(["Info", "Warn"]), Some(Severity::Info));
        assert_eq!(most_severe(["Warn", "Info"]), Some(Severity::Warn));
    }

    #[test]
    fn test_unrecognized_labels_are_ignored() {
        assert_eq!(most_severe(["Catastrophic"]), None);
        assert_eq!(most_severe(["Catastrophic", "Warn"]), Some(Severity::Warn));
        assert_eq!(most_severe(["Alert", "Catastrophic"]), Some(Severity::Alert));
    }
}
