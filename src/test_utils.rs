//! Fixture builders for unit tests and benchmarks
//!
//! Small constructors for OpenF1 rows plus a deterministic synthetic race used by
//! the statistics benchmarks.

#![cfg(any(test, feature = "benchmark"))]

use crate::aggregate::{RawSessionData, SessionDriverData};
use crate::api::{
    Driver, Lap, Overtake, PitStop, RaceControlMessage, SessionResult, StartingGridEntry, Stint,
};

/// Team colours keyed by team name, as OpenF1 reports them (no leading '#').
const TEAM_COLOURS: &[(&str, &str)] = &[
    ("Red Bull Racing", "3671C6"),
    ("Ferrari", "E8002D"),
    ("Mercedes", "27F4D2"),
    ("McLaren", "FF8000"),
    ("Aston Martin", "229971"),
    ("Alpine", "FF87BC"),
    ("Williams", "64C4FF"),
    ("RB", "6692FF"),
    ("Kick Sauber", "52E252"),
    ("Haas F1 Team", "B6BABD"),
];

pub fn driver(driver_number: u32, acronym: &str, team: &str) -> Driver {
    Driver {
        driver_number,
        name_acronym: Some(acronym.to_string()),
        full_name: Some(format!("Driver {}", acronym)),
        team_name: Some(team.to_string()),
        team_colour: TEAM_COLOURS
            .iter()
            .find(|(name, _)| *name == team)
            .map(|(_, colour)| colour.to_string()),
        ..Default::default()
    }
}

pub fn lap(driver_number: u32, lap_number: u32, lap_duration: Option<f64>) -> Lap {
    Lap { driver_number, lap_number, lap_duration, ..Default::default() }
}

/// A lap whose duration is the sum of its sectors.
pub fn sector_lap(driver_number: u32, lap_number: u32, sectors: [f64; 3]) -> Lap {
    Lap {
        driver_number,
        lap_number,
        lap_duration: Some(sectors.iter().sum()),
        duration_sector_1: Some(sectors[0]),
        duration_sector_2: Some(sectors[1]),
        duration_sector_3: Some(sectors[2]),
        ..Default::default()
    }
}

pub fn stint(
    driver_number: u32,
    stint_number: u32,
    lap_start: u32,
    lap_end: Option<u32>,
    compound: &str,
) -> Stint {
    Stint {
        driver_number,
        stint_number,
        lap_start,
        lap_end,
        compound: Some(compound.to_string()),
        ..Default::default()
    }
}

pub fn pit(driver_number: u32, lap_number: u32, pit_duration: Option<f64>) -> PitStop {
    PitStop { driver_number, lap_number, pit_duration, ..Default::default() }
}

pub fn result(driver_number: u32, position: Option<u32>) -> SessionResult {
    SessionResult { driver_number, position, ..Default::default() }
}

pub fn grid(driver_number: u32, position: u32) -> StartingGridEntry {
    StartingGridEntry { driver_number, position, ..Default::default() }
}

pub fn overtake(overtaking: u32, overtaken: u32) -> Overtake {
    Overtake {
        overtaking_driver_number: overtaking,
        overtaken_driver_number: overtaken,
        ..Default::default()
    }
}

pub fn race_control(lap_number: u32, category: &str, message: &str) -> RaceControlMessage {
    RaceControlMessage {
        category: category.to_string(),
        message: message.to_string(),
        lap_number: Some(lap_number),
        ..Default::default()
    }
}

/// Composite entry for one driver with the given laps and nothing else.
pub fn driver_data(driver_number: u32, laps: Vec<Lap>) -> SessionDriverData {
    SessionDriverData {
        driver: driver(driver_number, "TST", "Williams"),
        laps,
        ..Default::default()
    }
}

/// Deterministic race with a one-stop strategy per driver.
///
/// Lap times vary by driver, tyre age, and a fixed pseudo-random jitter so every
/// analytic has something to chew on. Drivers pit between laps 18 and 27.
pub fn synthetic_race(driver_count: u32, lap_count: u32) -> RawSessionData {
    let mut raw = RawSessionData::default();
    let teams: Vec<&str> = TEAM_COLOURS.iter().map(|(name, _)| *name).collect();

    for index in 0..driver_count {
        let number = index + 1;
        let team = teams[index as usize % teams.len()];
        raw.drivers.push(driver(number, &format!("D{:02}", number), team));
        raw.starting_grid.push(grid(number, index + 1));
        raw.results.push(result(number, Some(driver_count - index)));

        let pit_lap = (18 + index % 10).min(lap_count.saturating_sub(1).max(1));
        raw.pit_stops.push(pit(number, pit_lap, Some(21.5 + f64::from(index % 5) * 0.3)));
        raw.stints.push(stint(number, 1, 1, Some(pit_lap), "MEDIUM"));
        raw.stints.push(stint(number, 2, pit_lap + 1, None, "HARD"));

        for lap_number in 1..=lap_count {
            let tyre_age = if lap_number > pit_lap { lap_number - pit_lap } else { lap_number };
            let jitter = f64::from((number * 7919 + lap_number * 104_729) % 400) / 1000.0;
            let base = 92.0 + f64::from(index) * 0.05 + f64::from(tyre_age) * 0.04 + jitter;
            let s1 = base * 0.29;
            let s2 = base * 0.39;
            let mut lap = sector_lap(number, lap_number, [s1, s2, base - s1 - s2]);
            lap.is_pit_out_lap = lap_number == pit_lap + 1;
            if lap_number == pit_lap {
                lap.lap_duration = lap.lap_duration.map(|d| d + 18.0);
            }
            raw.laps.push(lap);
        }
    }

    raw
}

/// Overtakes to go with [`synthetic_race`], one every four laps.
pub fn synthetic_overtakes(driver_count: u32, lap_count: u32) -> Vec<Overtake> {
    let drivers = driver_count.max(1);
    (3..lap_count)
        .step_by(4)
        .map(|lap_number| (lap_number % drivers + 1, (lap_number + 3) % drivers + 1))
        .filter(|(overtaking, overtaken)| overtaking != overtaken)
        .map(|(overtaking, overtaken)| overtake(overtaking, overtaken))
        .collect()
}
