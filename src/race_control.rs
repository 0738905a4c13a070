//! Safety-car interval detection from race control messages
//!
//! A two-state machine over `SafetyCar` messages ordered by lap:
//!
//! ```text
//!            deployment                 end
//!   Idle ─────────────────► Active(start) ─────► Idle   emits [start, max(lap, start)]
//!
//!   stream ends in Active(start)                         emits [start, max(last_lap, start)]
//! ```
//!
//! Messages matching both vocabularies are reported as ambiguous and cause no
//! transition.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{trace, warn};

use crate::api::RaceControlMessage;

const SAFETY_CAR_CATEGORY: &str = "SafetyCar";

const DEPLOYMENT_PHRASES: &[&str] = &["deploy", "enters the track", "out on track"];

const END_PHRASES: &[&str] =
    &["in this lap", "returns to the pit", "returning to the pit", "ending", "withdrawn"];

/// Closed lap range with a safety car on track. `start_lap <= end_lap` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct SafetyCarInterval {
    start_lap: u32,
    end_lap: u32,
}

impl SafetyCarInterval {
    /// An `end_lap` before `start_lap` is raised to `start_lap`.
    pub fn new(start_lap: u32, end_lap: u32) -> Self {
        Self { start_lap, end_lap: end_lap.max(start_lap) }
    }

    pub fn start_lap(&self) -> u32 {
        self.start_lap
    }

    pub fn end_lap(&self) -> u32 {
        self.end_lap
    }

    pub fn laps(&self) -> impl Iterator<Item = u32> + use<> {
        self.start_lap..=self.end_lap
    }

    pub fn contains(&self, lap: u32) -> bool {
        (self.start_lap..=self.end_lap).contains(&lap)
    }
}

/// A message that matched both deployment and end wording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct FlaggedMessage {
    pub lap_number: u32,
    pub message: String,
}

/// Safety-car periods for a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct SafetyCarSummary {
    /// Sorted by start lap, then end lap
    pub intervals: Vec<SafetyCarInterval>,
    /// Every lap covered by any interval
    pub laps: BTreeSet<u32>,
    /// Messages left unresolved
    pub ambiguous: Vec<FlaggedMessage>,
}

impl SafetyCarSummary {
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn is_safety_car_lap(&self, lap: u32) -> bool {
        self.laps.contains(&lap)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Active { start_lap: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Deployment,
    End,
    Ambiguous,
    None,
}

fn classify(message: &str) -> Signal {
    let text = message.to_lowercase();
    let deploys = DEPLOYMENT_PHRASES.iter().any(|phrase| text.contains(phrase));
    let ends = END_PHRASES.iter().any(|phrase| text.contains(phrase));
    match (deploys, ends) {
        (true, true) => Signal::Ambiguous,
        (true, false) => Signal::Deployment,
        (false, true) => Signal::End,
        (false, false) => Signal::None,
    }
}

/// Build safety-car intervals from race control messages.
///
/// `last_known_lap` closes an interval still open when the messages run out.
pub fn summarize_safety_car(
    messages: &[RaceControlMessage],
    last_known_lap: Option<u32>,
) -> SafetyCarSummary {
    let mut relevant: Vec<(u32, &str)> = messages
        .iter()
        .filter(|m| m.category.eq_ignore_ascii_case(SAFETY_CAR_CATEGORY))
        .filter_map(|m| m.lap_number.map(|lap| (lap, m.message.as_str())))
        .collect();
    // Stable: same-lap messages keep their upstream (chronological) order
    relevant.sort_by_key(|(lap, _)| *lap);

    let mut summary = SafetyCarSummary::default();
    let mut phase = Phase::Idle;

    for (lap, message) in relevant {
        match (phase, classify(message)) {
            (_, Signal::Ambiguous) => {
                warn!(lap, message, "Ambiguous safety car message left unresolved");
                summary
                    .ambiguous
                    .push(FlaggedMessage { lap_number: lap, message: message.to_string() });
            }
            (Phase::Idle, Signal::Deployment) => {
                trace!(lap, "Safety car deployed");
                phase = Phase::Active { start_lap: lap };
            }
            (Phase::Active { start_lap }, Signal::End) => {
                trace!(start_lap, lap, "Safety car period ended");
                summary.intervals.push(SafetyCarInterval::new(start_lap, lap));
                phase = Phase::Idle;
            }
            _ => {}
        }
    }

    if let Phase::Active { start_lap } = phase {
        let end_lap = last_known_lap.unwrap_or(start_lap);
        trace!(start_lap, end_lap, "Closing open safety car period at session end");
        summary.intervals.push(SafetyCarInterval::new(start_lap, end_lap));
    }

    summary.intervals.sort();
    summary.laps = summary.intervals.iter().flat_map(SafetyCarInterval::laps).collect();
    summary
}
