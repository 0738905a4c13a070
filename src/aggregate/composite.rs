//! Per-driver joined view of a session's raw resources.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::api::{Driver, Lap, PitStop, SessionResult, StartingGridEntry, Stint};
use crate::stats::DriverRef;

/// Raw collections fetched independently for one session.
#[derive(Debug, Clone, Default)]
pub struct RawSessionData {
    pub drivers: Vec<Driver>,
    pub laps: Vec<Lap>,
    pub stints: Vec<Stint>,
    pub pit_stops: Vec<PitStop>,
    pub results: Vec<SessionResult>,
    pub starting_grid: Vec<StartingGridEntry>,
}

/// Everything known about one driver in one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionDriverData {
    pub driver: Driver,
    /// Sorted by lap number
    pub laps: Vec<Lap>,
    /// Sorted by start lap, then stint number
    pub stints: Vec<Stint>,
    /// Sorted by lap number
    pub pit_stops: Vec<PitStop>,
    pub grid_position: Option<u32>,
    pub result: Option<SessionResult>,
}

impl SessionDriverData {
    pub fn driver_number(&self) -> u32 {
        self.driver.driver_number
    }

    pub fn driver_ref(&self) -> DriverRef {
        DriverRef::from(&self.driver)
    }

    pub fn classified_position(&self) -> Option<u32> {
        self.result.as_ref().and_then(|result| result.position)
    }

    pub fn last_lap(&self) -> Option<u32> {
        self.laps.last().map(|lap| lap.lap_number)
    }
}

/// Immutable composite built from [`RawSessionData`].
///
/// Drivers are ordered by classified position, unclassified drivers last, ties by
/// driver number. Rows for driver numbers absent from the roster are dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionComposite {
    pub session_key: u32,
    drivers: Vec<SessionDriverData>,
}

impl SessionComposite {
    pub fn build(session_key: u32, raw: RawSessionData) -> Self {
        let mut by_number: BTreeMap<u32, SessionDriverData> = BTreeMap::new();
        for driver in raw.drivers {
            by_number
                .entry(driver.driver_number)
                .or_insert_with(|| SessionDriverData { driver, ..Default::default() });
        }

        for lap in raw.laps {
            if let Some(data) = by_number.get_mut(&lap.driver_number) {
                data.laps.push(lap);
            }
        }
        for stint in raw.stints {
            if let Some(data) = by_number.get_mut(&stint.driver_number) {
                data.stints.push(stint);
            }
        }
        for stop in raw.pit_stops {
            if let Some(data) = by_number.get_mut(&stop.driver_number) {
                data.pit_stops.push(stop);
            }
        }
        for entry in raw.starting_grid {
            if let Some(data) = by_number.get_mut(&entry.driver_number) {
                data.grid_position = Some(match data.grid_position {
                    Some(existing) => existing.min(entry.position),
                    None => entry.position,
                });
            }
        }
        for result in raw.results {
            if let Some(data) = by_number.get_mut(&result.driver_number) {
                let replace = match &data.result {
                    None => true,
                    Some(existing) => position_order(result.position, existing.position).is_lt(),
                };
                if replace {
                    data.result = Some(result);
                }
            }
        }

        let mut drivers: Vec<SessionDriverData> = by_number.into_values().collect();
        for data in &mut drivers {
            data.laps.sort_by(|a, b| {
                a.lap_number
                    .cmp(&b.lap_number)
                    .then_with(|| option_f64_order(a.lap_duration, b.lap_duration))
            });
            data.stints.sort_by_key(|stint| (stint.lap_start, stint.stint_number));
            data.pit_stops.sort_by(|a, b| {
                a.lap_number
                    .cmp(&b.lap_number)
                    .then_with(|| option_f64_order(a.pit_duration, b.pit_duration))
            });
        }
        drivers.sort_by(|a, b| {
            position_order(a.classified_position(), b.classified_position())
                .then_with(|| a.driver_number().cmp(&b.driver_number()))
        });

        Self { session_key, drivers }
    }

    pub fn drivers(&self) -> &[SessionDriverData] {
        &self.drivers
    }

    pub fn driver(&self, driver_number: u32) -> Option<&SessionDriverData> {
        self.drivers.iter().find(|data| data.driver_number() == driver_number)
    }

    pub fn into_driver(self, driver_number: u32) -> Option<SessionDriverData> {
        self.drivers.into_iter().find(|data| data.driver_number() == driver_number)
    }

    pub fn into_drivers(self) -> Vec<SessionDriverData> {
        self.drivers
    }

    /// Highest lap number anyone recorded.
    pub fn last_lap(&self) -> Option<u32> {
        self.drivers.iter().filter_map(SessionDriverData::last_lap).max()
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

/// Classified positions first, ascending.
fn position_order(a: Option<u32>, b: Option<u32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn option_f64_order(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
