//! Tyre degradation per stint.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{DriverRef, mean, valid_laps};
use crate::aggregate::{SessionComposite, SessionDriverData};

/// Fewest valid laps in a stint that yield a record.
pub const MIN_STINT_LAPS: usize = 4;

/// Laps averaged at each end of a stint.
const WINDOW: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct TyreDegradation {
    pub driver: DriverRef,
    pub stint_number: u32,
    pub compound: Option<String>,
    pub lap_start: u32,
    pub lap_end: Option<u32>,
    pub lap_count: u32,
    pub first_avg: f64,
    pub last_avg: f64,
    /// `last_avg - first_avg`; positive means the stint got slower
    pub delta: f64,
    /// Least-squares seconds per lap of tyre age
    pub slope_per_lap: f64,
}

pub fn tyre_degradation(
    composite: &SessionComposite,
    safety_car_laps: &BTreeSet<u32>,
) -> Vec<TyreDegradation> {
    let mut records: Vec<TyreDegradation> = composite
        .drivers()
        .iter()
        .flat_map(|data| driver_tyre_degradation(data, safety_car_laps))
        .collect();
    records.sort_by(|a, b| {
        a.slope_per_lap
            .total_cmp(&b.slope_per_lap)
            .then_with(|| a.driver.driver_number.cmp(&b.driver.driver_number))
            .then_with(|| a.stint_number.cmp(&b.stint_number))
    });
    records
}

pub fn driver_tyre_degradation(
    data: &SessionDriverData,
    safety_car_laps: &BTreeSet<u32>,
) -> Vec<TyreDegradation> {
    let driver = data.driver_ref();
    data.stints
        .iter()
        .filter_map(|stint| {
            let points: Vec<(f64, f64)> = valid_laps(&data.laps, safety_car_laps)
                .filter(|(lap, _)| stint.contains_lap(lap.lap_number))
                .map(|(lap, time)| (f64::from(lap.lap_number - stint.lap_start), time))
                .collect();
            if points.len() < MIN_STINT_LAPS {
                return None;
            }

            let times: Vec<f64> = points.iter().map(|(_, time)| *time).collect();
            let k = WINDOW.min(times.len());
            let first_avg = mean(&times[..k])?;
            let last_avg = mean(&times[times.len() - k..])?;
            let slope_per_lap = least_squares_slope(&points)?;

            Some(TyreDegradation {
                driver: driver.clone(),
                stint_number: stint.stint_number,
                compound: stint.compound.clone(),
                lap_start: stint.lap_start,
                lap_end: stint.lap_end,
                lap_count: points.len() as u32,
                first_avg,
                last_avg,
                delta: last_avg - first_avg,
                slope_per_lap,
            })
        })
        .collect()
}

/// Slope of the ordinary least-squares line through `(x, y)`; `None` without x spread.
fn least_squares_slope(points: &[(f64, f64)]) -> Option<f64> {
    let n = points.len() as f64;
    if points.len() < 2 {
        return None;
    }
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;
    let covariance: f64 = points.iter().map(|(x, y)| (x - mean_x) * (y - mean_y)).sum();
    let variance: f64 = points.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
    if variance == 0.0 {
        return None;
    }
    Some(covariance / variance)
}
