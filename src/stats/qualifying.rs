//! Qualifying sector analysis: personal-best sectors, ideal laps, sector kings.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

use super::{DriverRef, valid_laps};
use crate::aggregate::{SessionComposite, SessionDriverData};

const SECTORS: [u8; 3] = [1, 2, 3];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct DriverSectors {
    pub driver: DriverRef,
    pub best_sector_1: Option<f64>,
    pub best_sector_2: Option<f64>,
    pub best_sector_3: Option<f64>,
    pub best_lap: Option<f64>,
    /// Sum of the three best sectors
    pub ideal_lap: Option<f64>,
    /// `best_lap - ideal_lap`
    pub potential_gain: Option<f64>,
}

impl DriverSectors {
    pub fn best_sector(&self, sector: u8) -> Option<f64> {
        match sector {
            1 => self.best_sector_1,
            2 => self.best_sector_2,
            3 => self.best_sector_3,
            _ => None,
        }
    }
}

/// Fastest holder of one sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct SectorKing {
    pub sector: u8,
    pub driver: DriverRef,
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct SectorWins {
    pub driver: DriverRef,
    pub wins: u32,
    /// Sectors held, ascending
    pub sectors: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct QualifyingAnalysis {
    /// Ideal lap ascending, then best lap, then driver number; missing times last
    pub drivers: Vec<DriverSectors>,
    /// One per sector with any valid time, in sector order
    pub sector_kings: Vec<SectorKing>,
    pub sector_wins: Vec<SectorWins>,
}

pub fn qualifying_analysis(
    composite: &SessionComposite,
    safety_car_laps: &BTreeSet<u32>,
) -> QualifyingAnalysis {
    let mut drivers: Vec<DriverSectors> =
        composite.drivers().iter().map(|data| driver_sectors(data, safety_car_laps)).collect();
    drivers.sort_by(|a, b| {
        nones_last(a.ideal_lap, b.ideal_lap)
            .then_with(|| nones_last(a.best_lap, b.best_lap))
            .then_with(|| a.driver.driver_number.cmp(&b.driver.driver_number))
    });

    let sector_kings: Vec<SectorKing> = SECTORS
        .iter()
        .filter_map(|&sector| {
            drivers
                .iter()
                .filter_map(|d| d.best_sector(sector).map(|time| (time, d)))
                .min_by(|(a_time, a), (b_time, b)| {
                    a_time
                        .total_cmp(b_time)
                        .then_with(|| a.driver.driver_number.cmp(&b.driver.driver_number))
                })
                .map(|(time, d)| SectorKing { sector, driver: d.driver.clone(), time })
        })
        .collect();

    let mut sector_wins: Vec<SectorWins> = Vec::new();
    for king in &sector_kings {
        match sector_wins.iter_mut().find(|w| w.driver.driver_number == king.driver.driver_number) {
            Some(entry) => {
                entry.wins += 1;
                entry.sectors.push(king.sector);
            }
            None => sector_wins.push(SectorWins {
                driver: king.driver.clone(),
                wins: 1,
                sectors: vec![king.sector],
            }),
        }
    }
    sector_wins.sort_by(|a, b| {
        b.wins.cmp(&a.wins).then_with(|| a.driver.driver_number.cmp(&b.driver.driver_number))
    });

    QualifyingAnalysis { drivers, sector_kings, sector_wins }
}

fn driver_sectors(data: &SessionDriverData, safety_car_laps: &BTreeSet<u32>) -> DriverSectors {
    // Aborted laps often have no lap time but still carry real sector times
    let sector_laps: Vec<_> = data
        .laps
        .iter()
        .filter(|lap| !lap.is_pit_out_lap && !safety_car_laps.contains(&lap.lap_number))
        .collect();
    let best = |sector: u8| {
        sector_laps
            .iter()
            .filter_map(|lap| lap.sector(sector))
            .filter(|time| time.is_finite() && *time > 0.0)
            .min_by(f64::total_cmp)
    };

    let best_sector_1 = best(1);
    let best_sector_2 = best(2);
    let best_sector_3 = best(3);
    let best_lap =
        valid_laps(&data.laps, safety_car_laps).map(|(_, time)| time).min_by(f64::total_cmp);
    let ideal_lap = match (best_sector_1, best_sector_2, best_sector_3) {
        (Some(s1), Some(s2), Some(s3)) => Some(s1 + s2 + s3),
        _ => None,
    };
    let potential_gain = best_lap.zip(ideal_lap).map(|(best, ideal)| best - ideal);

    DriverSectors {
        driver: data.driver_ref(),
        best_sector_1,
        best_sector_2,
        best_sector_3,
        best_lap,
        ideal_lap,
        potential_gain,
    }
}

fn nones_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
