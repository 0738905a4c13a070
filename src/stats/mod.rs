//! Statistics engine
//!
//! Pure functions over a [`SessionComposite`](crate::aggregate::SessionComposite)
//! and the session's safety-car laps. Every analytic works on *valid* laps only:
//! a recorded, positive lap time that is neither a pit-out lap nor run under the
//! safety car.
//!
//! Output ordering is fully determined by explicit sort keys, so the same inputs
//! always produce the same records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::api::{Driver, Lap};

pub mod degradation;
pub mod overtakes;
pub mod pace;
pub mod pit_impact;
pub mod qualifying;

pub use degradation::{TyreDegradation, driver_tyre_degradation, tyre_degradation};
pub use overtakes::{DriverOvertakes, OvertakeLeaderboard, TeamOvertakes, overtake_leaderboard};
pub use pace::{PaceConsistency, driver_pace_consistency, pace_consistency};
pub use pit_impact::{PitStopImpact, driver_pit_stop_impact, pit_stop_impact};
pub use qualifying::{
    DriverSectors, QualifyingAnalysis, SectorKing, SectorWins, qualifying_analysis,
};

/// Driver identity carried by every insight record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct DriverRef {
    pub driver_number: u32,
    pub name_acronym: Option<String>,
    pub full_name: Option<String>,
    pub team_name: Option<String>,
    pub team_colour: Option<String>,
}

impl DriverRef {
    /// A reference for a driver number with no roster entry.
    pub fn bare(driver_number: u32) -> Self {
        Self { driver_number, ..Default::default() }
    }
}

impl From<&Driver> for DriverRef {
    fn from(driver: &Driver) -> Self {
        Self {
            driver_number: driver.driver_number,
            name_acronym: driver.name_acronym.clone(),
            full_name: driver.full_name.clone(),
            team_name: driver.team_name.clone(),
            team_colour: driver.team_colour.clone(),
        }
    }
}

/// Lap time of a lap that counts towards analytics, if it does.
pub fn valid_lap_time(lap: &Lap, safety_car_laps: &BTreeSet<u32>) -> Option<f64> {
    if lap.is_pit_out_lap || safety_car_laps.contains(&lap.lap_number) {
        return None;
    }
    lap.lap_duration.filter(|duration| duration.is_finite() && *duration > 0.0)
}

/// Valid laps, in input order.
pub fn valid_laps<'a>(
    laps: &'a [Lap],
    safety_car_laps: &'a BTreeSet<u32>,
) -> impl Iterator<Item = (&'a Lap, f64)> + 'a {
    laps.iter()
        .filter_map(move |lap| valid_lap_time(lap, safety_car_laps).map(|time| (lap, time)))
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub(crate) fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Population standard deviation (divides by `n`).
pub(crate) fn std_dev(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let variance =
        values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}
