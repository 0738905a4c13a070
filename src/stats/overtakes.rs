//! Overtake leaderboards for drivers and teams.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::DriverRef;
use crate::aggregate::SessionComposite;
use crate::api::Overtake;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct DriverOvertakes {
    pub driver: DriverRef,
    pub made: u32,
    pub suffered: u32,
    pub net: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct TeamOvertakes {
    pub team_name: String,
    pub team_colour: Option<String>,
    pub made: u32,
    pub suffered: u32,
    pub net: i32,
    /// Sorted ascending
    pub driver_numbers: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct OvertakeLeaderboard {
    pub drivers: Vec<DriverOvertakes>,
    pub teams: Vec<TeamOvertakes>,
}

impl OvertakeLeaderboard {
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

#[derive(Default)]
struct Tally {
    made: u32,
    suffered: u32,
}

impl Tally {
    fn net(&self) -> i32 {
        self.made as i32 - self.suffered as i32
    }
}

/// Tally made and suffered overtakes.
///
/// Drivers missing from the roster still get a row, with a bare [`DriverRef`],
/// but count towards no team.
pub fn overtake_leaderboard(
    composite: &SessionComposite,
    overtakes: &[Overtake],
) -> OvertakeLeaderboard {
    let mut tallies: BTreeMap<u32, Tally> = BTreeMap::new();
    for overtake in overtakes {
        tallies.entry(overtake.overtaking_driver_number).or_default().made += 1;
        tallies.entry(overtake.overtaken_driver_number).or_default().suffered += 1;
    }

    let mut teams: BTreeMap<String, TeamOvertakes> = BTreeMap::new();
    let mut drivers: Vec<DriverOvertakes> = Vec::with_capacity(tallies.len());

    for (driver_number, tally) in &tallies {
        let data = composite.driver(*driver_number);
        let driver =
            data.map(|d| d.driver_ref()).unwrap_or_else(|| DriverRef::bare(*driver_number));

        if let Some(team_name) = data.and_then(|d| d.driver.team_name.clone()) {
            let team = teams.entry(team_name.clone()).or_insert_with(|| TeamOvertakes {
                team_name,
                team_colour: None,
                made: 0,
                suffered: 0,
                net: 0,
                driver_numbers: Vec::new(),
            });
            if team.team_colour.is_none() {
                team.team_colour = driver.team_colour.clone();
            }
            team.made += tally.made;
            team.suffered += tally.suffered;
            team.net = team.made as i32 - team.suffered as i32;
            // BTreeMap iteration keeps this ascending
            team.driver_numbers.push(*driver_number);
        }

        drivers.push(DriverOvertakes {
            driver,
            made: tally.made,
            suffered: tally.suffered,
            net: tally.net(),
        });
    }

    drivers.sort_by(|a, b| {
        b.net
            .cmp(&a.net)
            .then_with(|| b.made.cmp(&a.made))
            .then_with(|| a.driver.driver_number.cmp(&b.driver.driver_number))
    });
    let mut teams: Vec<TeamOvertakes> = teams.into_values().collect();
    teams.sort_by(|a, b| {
        b.net
            .cmp(&a.net)
            .then_with(|| b.made.cmp(&a.made))
            .then_with(|| a.team_name.cmp(&b.team_name))
    });

    OvertakeLeaderboard { drivers, teams }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::RawSessionData;
    use crate::test_utils::{driver, overtake};

    fn composite() -> SessionComposite {
        SessionComposite::build(
            9158,
            RawSessionData {
                drivers: vec![
                    driver(1, "VER", "Red Bull Racing"),
                    driver(11, "PER", "Red Bull Racing"),
                    driver(44, "HAM", "Mercedes"),
                    driver(63, "RUS", "Mercedes"),
                ],
                ..Default::default()
            },
        )
    }

    #[test]
    fn drivers_and_teams_are_ranked_by_net() {
        let board = overtake_leaderboard(
            &composite(),
            &[
                overtake(44, 1),
                overtake(44, 11),
                overtake(63, 11),
                overtake(1, 63),
                overtake(11, 44),
            ],
        );

        let order: Vec<(u32, i32)> =
            board.drivers.iter().map(|d| (d.driver.driver_number, d.net)).collect();
        assert_eq!(order, vec![(44, 1), (1, 0), (63, 0), (11, -1)]);

        let teams: Vec<(&str, i32)> =
            board.teams.iter().map(|t| (t.team_name.as_str(), t.net)).collect();
        assert_eq!(teams, vec![("Mercedes", 1), ("Red Bull Racing", -1)]);
        assert_eq!(board.teams[0].driver_numbers, vec![44, 63]);
    }

    #[test]
    fn unknown_drivers_are_listed_without_a_team() {
        let board = overtake_leaderboard(&composite(), &[overtake(99, 44)]);

        let unknown = board.drivers.iter().find(|d| d.driver.driver_number == 99).unwrap();
        assert_eq!(unknown.driver, DriverRef::bare(99));
        assert_eq!(unknown.made, 1);

        let mercedes = &board.teams[0];
        assert_eq!(mercedes.team_name, "Mercedes");
        assert_eq!((mercedes.made, mercedes.suffered), (0, 1));
        assert_eq!(board.teams.len(), 1);
    }

    #[test]
    fn no_overtakes_gives_empty_board() {
        assert!(overtake_leaderboard(&composite(), &[]).is_empty());
    }
}
