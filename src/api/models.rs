//! OpenF1 resource models
//!
//! One struct per endpoint row. Every field the upstream may omit or null is
//! optional, and unknown fields are ignored, so schema additions upstream never
//! break decoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A race weekend (`/meetings`).
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Meeting {
    pub meeting_key: u32,
    pub meeting_name: String,
    pub meeting_official_name: Option<String>,
    pub year: Option<i32>,
    pub country_name: Option<String>,
    pub country_code: Option<String>,
    pub location: Option<String>,
    pub circuit_key: Option<u32>,
    pub circuit_short_name: Option<String>,
    pub date_start: Option<DateTime<Utc>>,
    pub gmt_offset: Option<String>,
}

/// A single session within a meeting (`/sessions`).
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Session {
    pub session_key: u32,
    pub meeting_key: u32,
    /// e.g. "Practice 1", "Sprint Qualifying", "Race"
    pub session_name: String,
    /// e.g. "Practice", "Qualifying", "Race"
    pub session_type: String,
    pub year: Option<i32>,
    pub country_name: Option<String>,
    pub location: Option<String>,
    pub circuit_short_name: Option<String>,
    pub date_start: Option<DateTime<Utc>>,
    pub date_end: Option<DateTime<Utc>>,
}

impl Session {
    pub fn kind(&self) -> Option<SessionKind> {
        SessionKind::classify(&self.session_type, &self.session_name)
    }
}

/// Analytic family of a session, deciding which raw inputs a detail view needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum SessionKind {
    Race,
    Qualifying,
    Practice,
}

impl SessionKind {
    /// Classify from OpenF1's `session_type` and `session_name`.
    ///
    /// Sprint shootouts and sprint qualifying are tagged "Qualifying" or "Race"
    /// depending on the season, so the name takes precedence.
    pub fn classify(session_type: &str, session_name: &str) -> Option<Self> {
        let name = session_name.to_ascii_lowercase();
        let kind = session_type.to_ascii_lowercase();

        if name.contains("shootout") || name.contains("qualifying") || kind == "qualifying" {
            Some(SessionKind::Qualifying)
        } else if name.contains("practice") || kind == "practice" {
            Some(SessionKind::Practice)
        } else if name.contains("sprint") || name == "race" || kind == "race" {
            Some(SessionKind::Race)
        } else {
            None
        }
    }

    /// Whether pit stops and the starting grid exist for this kind.
    pub fn has_race_inputs(&self) -> bool {
        matches!(self, SessionKind::Race)
    }
}

/// A driver entry for one session (`/drivers`).
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Driver {
    pub driver_number: u32,
    pub session_key: u32,
    pub meeting_key: Option<u32>,
    pub broadcast_name: Option<String>,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub name_acronym: Option<String>,
    pub team_name: Option<String>,
    /// Hex colour without leading '#'
    pub team_colour: Option<String>,
    pub country_code: Option<String>,
    pub headshot_url: Option<String>,
}

/// One timed lap (`/laps`).
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Lap {
    pub driver_number: u32,
    pub session_key: u32,
    pub lap_number: u32,
    /// Seconds; absent for incomplete laps
    pub lap_duration: Option<f64>,
    pub duration_sector_1: Option<f64>,
    pub duration_sector_2: Option<f64>,
    pub duration_sector_3: Option<f64>,
    pub is_pit_out_lap: bool,
    pub i1_speed: Option<f64>,
    pub i2_speed: Option<f64>,
    pub st_speed: Option<f64>,
    pub date_start: Option<DateTime<Utc>>,
}

impl Lap {
    /// Sector time by 1-based index.
    pub fn sector(&self, sector: u8) -> Option<f64> {
        match sector {
            1 => self.duration_sector_1,
            2 => self.duration_sector_2,
            3 => self.duration_sector_3,
            _ => None,
        }
    }
}

/// A tyre stint (`/stints`).
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Stint {
    pub driver_number: u32,
    pub session_key: u32,
    pub stint_number: u32,
    pub lap_start: u32,
    /// Absent while the stint is still running
    pub lap_end: Option<u32>,
    pub compound: Option<String>,
    pub tyre_age_at_start: Option<u32>,
}

impl Stint {
    pub fn contains_lap(&self, lap_number: u32) -> bool {
        lap_number >= self.lap_start && self.lap_end.is_none_or(|end| lap_number <= end)
    }
}

/// A pit lane visit (`/pit`).
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PitStop {
    pub driver_number: u32,
    pub session_key: u32,
    pub lap_number: u32,
    /// Pit lane time in seconds
    pub pit_duration: Option<f64>,
    pub date: Option<DateTime<Utc>>,
}

/// Classification row (`/session_result`).
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionResult {
    pub driver_number: u32,
    pub session_key: u32,
    pub position: Option<u32>,
    pub points: Option<f64>,
    pub number_of_laps: Option<u32>,
    pub dnf: bool,
    pub dns: bool,
    pub dsq: bool,
    /// Seconds, "+N LAP(S)", or one value per qualifying segment
    pub gap_to_leader: Value,
    /// Seconds, or one value per qualifying segment
    pub duration: Value,
}

/// Grid slot (`/starting_grid`).
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StartingGridEntry {
    pub driver_number: u32,
    pub session_key: u32,
    pub position: u32,
    /// Qualifying lap that earned the slot
    pub lap_duration: Option<f64>,
}

/// Race director message (`/race_control`).
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RaceControlMessage {
    pub session_key: u32,
    /// e.g. "Flag", "SafetyCar", "Drs", "CarEvent", "Other"
    pub category: String,
    pub message: String,
    pub lap_number: Option<u32>,
    pub driver_number: Option<u32>,
    pub flag: Option<String>,
    pub scope: Option<String>,
    pub sector: Option<u32>,
    pub date: Option<DateTime<Utc>>,
}

/// An on-track position change (`/overtakes`).
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Overtake {
    pub session_key: u32,
    pub overtaking_driver_number: u32,
    pub overtaken_driver_number: u32,
    /// Position gained by the overtaking driver
    pub position: Option<u32>,
    pub date: Option<DateTime<Utc>>,
}

/// Track-side weather sample (`/weather`).
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Weather {
    pub session_key: u32,
    pub air_temperature: Option<f64>,
    pub track_temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub rainfall: Option<f64>,
    pub wind_direction: Option<f64>,
    pub wind_speed: Option<f64>,
    pub date: Option<DateTime<Utc>>,
}

/// Running order sample (`/position`).
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Position {
    pub session_key: u32,
    pub driver_number: u32,
    pub position: u32,
    pub date: Option<DateTime<Utc>>,
}
