//! Pace change across each pit stop.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{DriverRef, mean, valid_laps};
use crate::aggregate::{SessionComposite, SessionDriverData};

/// Valid laps taken on each side of the stop.
const WINDOW: usize = 3;
/// Fewest laps on each side that yield a record.
const MIN_SIDE_LAPS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct PitStopImpact {
    pub driver: DriverRef,
    pub lap_number: u32,
    pub pit_duration: Option<f64>,
    pub laps_before: u32,
    pub laps_after: u32,
    pub before_avg: f64,
    pub after_avg: f64,
    /// `after_avg - before_avg`; negative means faster after the stop
    pub delta: f64,
}

pub fn pit_stop_impact(
    composite: &SessionComposite,
    safety_car_laps: &BTreeSet<u32>,
) -> Vec<PitStopImpact> {
    let mut records: Vec<PitStopImpact> = composite
        .drivers()
        .iter()
        .flat_map(|data| driver_pit_stop_impact(data, safety_car_laps))
        .collect();
    records.sort_by(|a, b| {
        a.delta
            .total_cmp(&b.delta)
            .then_with(|| a.driver.driver_number.cmp(&b.driver.driver_number))
            .then_with(|| a.lap_number.cmp(&b.lap_number))
    });
    records
}

pub fn driver_pit_stop_impact(
    data: &SessionDriverData,
    safety_car_laps: &BTreeSet<u32>,
) -> Vec<PitStopImpact> {
    // Composite laps are already in lap order
    let valid: Vec<(u32, f64)> =
        valid_laps(&data.laps, safety_car_laps).map(|(lap, time)| (lap.lap_number, time)).collect();
    let driver = data.driver_ref();

    data.pit_stops
        .iter()
        .filter_map(|stop| {
            let pit_lap = stop.lap_number;
            let before: Vec<f64> = valid
                .iter()
                .filter(|(n, _)| *n < pit_lap)
                .rev()
                .take(WINDOW)
                .map(|(_, time)| *time)
                .collect();
            let after: Vec<f64> = valid
                .iter()
                .filter(|(n, _)| *n > pit_lap)
                .take(WINDOW)
                .map(|(_, time)| *time)
                .collect();
            if before.len() < MIN_SIDE_LAPS || after.len() < MIN_SIDE_LAPS {
                return None;
            }

            let before_avg = mean(&before)?;
            let after_avg = mean(&after)?;
            Some(PitStopImpact {
                driver: driver.clone(),
                lap_number: pit_lap,
                pit_duration: stop.pit_duration,
                laps_before: before.len() as u32,
                laps_after: after.len() as u32,
                before_avg,
                after_avg,
                delta: after_avg - before_avg,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{driver_data, lap, pit};

    fn stint_laps() -> SessionDriverData {
        let mut laps: Vec<_> = (1..=10).map(|n| lap(11, n, Some(92.0))).collect();
        for l in laps.iter_mut().filter(|l| l.lap_number > 5) {
            l.lap_duration = Some(91.0);
        }
        // In-lap and out-lap
        laps[4].lap_duration = Some(97.0);
        laps[5].is_pit_out_lap = true;
        driver_data(11, laps)
    }

    #[test]
    fn nearest_valid_laps_on_each_side() {
        let mut data = stint_laps();
        data.pit_stops = vec![pit(11, 5, Some(23.1))];

        let records = driver_pit_stop_impact(&data, &BTreeSet::new());
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!((record.laps_before, record.laps_after), (3, 3));
        assert!((record.before_avg - 92.0).abs() < 1e-9);
        assert!((record.after_avg - 91.0).abs() < 1e-9);
        assert!((record.delta + 1.0).abs() < 1e-9);
        assert_eq!(record.pit_duration, Some(23.1));
    }

    #[test]
    fn stop_without_two_laps_each_side_is_skipped() {
        let mut data = stint_laps();
        data.pit_stops = vec![pit(11, 2, None), pit(11, 9, None)];
        assert!(driver_pit_stop_impact(&data, &BTreeSet::new()).is_empty());
    }

    #[test]
    fn safety_car_laps_are_skipped_when_picking_neighbours() {
        let mut data = stint_laps();
        data.pit_stops = vec![pit(11, 5, None)];

        let records = driver_pit_stop_impact(&data, &BTreeSet::from([3, 4, 7, 8]));
        assert_eq!(records.len(), 1);
        assert_eq!((records[0].laps_before, records[0].laps_after), (2, 2));
    }
}
