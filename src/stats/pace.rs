//! Pace consistency: how tightly a driver's racing laps cluster.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{DriverRef, mean, median, std_dev, valid_laps};
use crate::aggregate::{SessionComposite, SessionDriverData};

/// Fewest valid laps that yield a record.
pub const MIN_PACE_LAPS: usize = 5;

/// Laps slower than this multiple of the median are treated as outliers.
pub const OUTLIER_FACTOR: f64 = 1.08;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct PaceConsistency {
    pub driver: DriverRef,
    pub lap_count: u32,
    pub mean_lap: f64,
    pub std_dev: f64,
    /// `std_dev / mean_lap * 100`
    pub coefficient_of_variation: f64,
    pub outliers_removed: u32,
}

/// Consistency records for every driver with enough valid laps, most consistent first.
pub fn pace_consistency(
    composite: &SessionComposite,
    safety_car_laps: &BTreeSet<u32>,
) -> Vec<PaceConsistency> {
    let mut records: Vec<PaceConsistency> = composite
        .drivers()
        .iter()
        .filter_map(|data| driver_pace_consistency(data, safety_car_laps))
        .collect();
    records.sort_by(|a, b| {
        a.std_dev
            .total_cmp(&b.std_dev)
            .then_with(|| a.driver.driver_number.cmp(&b.driver.driver_number))
    });
    records
}

pub fn driver_pace_consistency(
    data: &SessionDriverData,
    safety_car_laps: &BTreeSet<u32>,
) -> Option<PaceConsistency> {
    let times: Vec<f64> = valid_laps(&data.laps, safety_car_laps).map(|(_, time)| time).collect();
    if times.len() < MIN_PACE_LAPS {
        return None;
    }

    let threshold = median(&times)? * OUTLIER_FACTOR;
    let filtered: Vec<f64> = times.iter().copied().filter(|time| *time <= threshold).collect();
    let sample = if filtered.len() < MIN_PACE_LAPS { &times } else { &filtered };

    let mean_lap = mean(sample)?;
    let std_dev = std_dev(sample)?;
    Some(PaceConsistency {
        driver: data.driver_ref(),
        lap_count: sample.len() as u32,
        mean_lap,
        std_dev,
        coefficient_of_variation: std_dev / mean_lap * 100.0,
        outliers_removed: (times.len() - sample.len()) as u32,
    })
}
