//! Session-level detail views
//!
//! Each builder fetches its raw inputs concurrently through the [`OpenF1Client`],
//! joins them into a [`SessionComposite`], and runs the statistics engine over it.
//! Results are memoized per key in an [`AggregateCache`].
//!
//! Required inputs fail the whole build. Optional inputs (race control, overtakes)
//! degrade only the feature that depends on them.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::cache::AggregateCache;
use super::composite::{RawSessionData, SessionComposite, SessionDriverData};
use crate::api::{OpenF1Client, SessionKind};
use crate::race_control::{SafetyCarSummary, summarize_safety_car};
use crate::stats::{
    OvertakeLeaderboard, PaceConsistency, PitStopImpact, QualifyingAnalysis, TyreDegradation,
    driver_pace_consistency, driver_pit_stop_impact, driver_tyre_degradation,
    overtake_leaderboard, pace_consistency, pit_stop_impact, qualifying_analysis,
    tyre_degradation,
};
use crate::{PaddockError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceSessionDetail {
    pub session_key: u32,
    pub drivers: Vec<SessionDriverData>,
    pub safety_car: SafetyCarSummary,
    /// False when the overtakes feed could not be loaded
    pub overtakes_available: bool,
    pub pace_consistency: Vec<PaceConsistency>,
    pub tyre_degradation: Vec<TyreDegradation>,
    pub pit_stop_impact: Vec<PitStopImpact>,
    pub overtakes: OvertakeLeaderboard,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualifyingSessionDetail {
    pub session_key: u32,
    pub drivers: Vec<SessionDriverData>,
    pub sectors: QualifyingAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PracticeSessionDetail {
    pub session_key: u32,
    pub drivers: Vec<SessionDriverData>,
    pub pace_consistency: Vec<PaceConsistency>,
    pub tyre_degradation: Vec<TyreDegradation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverSessionDetail {
    pub session_key: u32,
    pub kind: SessionKind,
    pub driver: SessionDriverData,
    pub pace_consistency: Option<PaceConsistency>,
    pub tyre_degradation: Vec<TyreDegradation>,
    /// Empty outside races
    pub pit_stop_impact: Vec<PitStopImpact>,
}

/// Detail view chosen by session kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionDetail {
    Race(Arc<RaceSessionDetail>),
    Qualifying(Arc<QualifyingSessionDetail>),
    Practice(Arc<PracticeSessionDetail>),
}

impl SessionDetail {
    pub fn kind(&self) -> SessionKind {
        match self {
            SessionDetail::Race(_) => SessionKind::Race,
            SessionDetail::Qualifying(_) => SessionKind::Qualifying,
            SessionDetail::Practice(_) => SessionKind::Practice,
        }
    }

    pub fn session_key(&self) -> u32 {
        match self {
            SessionDetail::Race(detail) => detail.session_key,
            SessionDetail::Qualifying(detail) => detail.session_key,
            SessionDetail::Practice(detail) => detail.session_key,
        }
    }
}

/// Cached builders for session and driver detail views.
#[derive(Debug)]
pub struct SessionAggregator {
    client: OpenF1Client,
    race: AggregateCache<u32, RaceSessionDetail>,
    qualifying: AggregateCache<u32, QualifyingSessionDetail>,
    practice: AggregateCache<u32, PracticeSessionDetail>,
    driver: AggregateCache<(u32, u32), DriverSessionDetail>,
}

impl SessionAggregator {
    pub fn new(client: OpenF1Client, ttl: Duration) -> Self {
        Self {
            client,
            race: AggregateCache::new("race", ttl),
            qualifying: AggregateCache::new("qualifying", ttl),
            practice: AggregateCache::new("practice", ttl),
            driver: AggregateCache::new("driver", ttl),
        }
    }

    pub fn client(&self) -> &OpenF1Client {
        &self.client
    }

    pub async fn race_detail(&self, session_key: u32) -> Result<Arc<RaceSessionDetail>> {
        let client = self.client.clone();
        self.race.get_or_build(session_key, move || build_race(client, session_key)).await
    }

    pub async fn qualifying_detail(
        &self,
        session_key: u32,
    ) -> Result<Arc<QualifyingSessionDetail>> {
        let client = self.client.clone();
        self.qualifying
            .get_or_build(session_key, move || build_qualifying(client, session_key))
            .await
    }

    pub async fn practice_detail(&self, session_key: u32) -> Result<Arc<PracticeSessionDetail>> {
        let client = self.client.clone();
        self.practice.get_or_build(session_key, move || build_practice(client, session_key)).await
    }

    /// One driver's view of a session; `None` when the session or driver is unknown.
    pub async fn driver_detail(
        &self,
        session_key: u32,
        driver_number: u32,
    ) -> Result<Option<Arc<DriverSessionDetail>>> {
        let client = self.client.clone();
        let built = self
            .driver
            .get_or_build((session_key, driver_number), move || {
                build_driver(client, session_key, driver_number)
            })
            .await;

        match built {
            Ok(detail) => Ok(Some(detail)),
            Err(PaddockError::NotFound { resource }) => {
                debug!(session_key, driver_number, %resource, "No driver detail");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Look up the session and build the detail view for its kind.
    pub async fn session_detail(&self, session_key: u32) -> Result<Option<SessionDetail>> {
        let session = self
            .client
            .session_info(session_key)
            .await
            .map_err(|e| e.into_service("Failed to load session"))?;
        let Some(session) = session else {
            debug!(session_key, "Unknown session");
            return Ok(None);
        };

        let detail = match session.kind() {
            Some(SessionKind::Race) => SessionDetail::Race(self.race_detail(session_key).await?),
            Some(SessionKind::Qualifying) => {
                SessionDetail::Qualifying(self.qualifying_detail(session_key).await?)
            }
            Some(SessionKind::Practice) => {
                SessionDetail::Practice(self.practice_detail(session_key).await?)
            }
            None => {
                warn!(
                    session_key,
                    session_type = %session.session_type,
                    session_name = %session.session_name,
                    "Unrecognised session kind"
                );
                return Ok(None);
            }
        };
        Ok(Some(detail))
    }

    /// Empty every aggregate cache. The durable fetch cache is untouched.
    pub fn clear(&self) {
        self.race.clear();
        self.qualifying.clear();
        self.practice.clear();
        self.driver.clear();
    }
}

/// Keep an optional input, logging and dropping it on failure.
fn optional<T>(result: Result<Vec<T>>, session_key: u32, input: &'static str) -> Option<Vec<T>> {
    result
        .inspect_err(|e| {
            warn!(session_key, input, error = %e, "Optional input unavailable, degrading feature")
        })
        .ok()
}

async fn build_race(client: OpenF1Client, session_key: u32) -> Result<RaceSessionDetail> {
    let context = "Failed to load race session";
    let (drivers, laps, stints, pit_stops, results, grid, race_control, overtakes) = tokio::join!(
        client.drivers(session_key),
        client.laps(session_key, None),
        client.stints(session_key, None),
        client.pit_stops(session_key, None),
        client.session_results(session_key, None),
        client.starting_grid(session_key, None),
        client.race_control(session_key),
        client.overtakes(session_key),
    );

    let raw = RawSessionData {
        drivers: drivers.map_err(|e| e.into_service(context))?,
        laps: laps.map_err(|e| e.into_service(context))?,
        stints: stints.map_err(|e| e.into_service(context))?,
        pit_stops: pit_stops.map_err(|e| e.into_service(context))?,
        results: results.map_err(|e| e.into_service(context))?,
        starting_grid: grid.map_err(|e| e.into_service(context))?,
    };
    let composite = SessionComposite::build(session_key, raw);

    let messages = optional(race_control, session_key, "race_control").unwrap_or_default();
    let safety_car = summarize_safety_car(&messages, composite.last_lap());
    let (overtakes, overtakes_available) = match optional(overtakes, session_key, "overtakes") {
        Some(rows) => (overtake_leaderboard(&composite, &rows), true),
        None => (OvertakeLeaderboard::default(), false),
    };

    let sc_laps = &safety_car.laps;
    let pace_consistency = pace_consistency(&composite, sc_laps);
    let tyre_degradation = tyre_degradation(&composite, sc_laps);
    let pit_stop_impact = pit_stop_impact(&composite, sc_laps);

    info!(
        session_key,
        drivers = composite.len(),
        safety_car_periods = safety_car.intervals.len(),
        overtakes_available,
        "Built race session detail"
    );

    Ok(RaceSessionDetail {
        session_key,
        drivers: composite.into_drivers(),
        safety_car,
        overtakes_available,
        pace_consistency,
        tyre_degradation,
        pit_stop_impact,
        overtakes,
    })
}

/// Drivers, laps, stints, and results; the inputs every session kind needs.
async fn fetch_core(
    client: &OpenF1Client,
    session_key: u32,
    context: &str,
) -> Result<RawSessionData> {
    let (drivers, laps, stints, results) = tokio::join!(
        client.drivers(session_key),
        client.laps(session_key, None),
        client.stints(session_key, None),
        client.session_results(session_key, None),
    );
    Ok(RawSessionData {
        drivers: drivers.map_err(|e| e.into_service(context))?,
        laps: laps.map_err(|e| e.into_service(context))?,
        stints: stints.map_err(|e| e.into_service(context))?,
        results: results.map_err(|e| e.into_service(context))?,
        ..Default::default()
    })
}

async fn build_qualifying(
    client: OpenF1Client,
    session_key: u32,
) -> Result<QualifyingSessionDetail> {
    let raw = fetch_core(&client, session_key, "Failed to load qualifying session").await?;
    let composite = SessionComposite::build(session_key, raw);
    let sectors = qualifying_analysis(&composite, &BTreeSet::new());

    info!(
        session_key,
        drivers = composite.len(),
        sector_kings = sectors.sector_kings.len(),
        "Built qualifying session detail"
    );

    Ok(QualifyingSessionDetail { session_key, drivers: composite.into_drivers(), sectors })
}

async fn build_practice(client: OpenF1Client, session_key: u32) -> Result<PracticeSessionDetail> {
    let raw = fetch_core(&client, session_key, "Failed to load practice session").await?;
    let composite = SessionComposite::build(session_key, raw);
    let no_safety_car = BTreeSet::new();
    let pace_consistency = pace_consistency(&composite, &no_safety_car);
    let tyre_degradation = tyre_degradation(&composite, &no_safety_car);

    info!(session_key, drivers = composite.len(), "Built practice session detail");

    Ok(PracticeSessionDetail {
        session_key,
        drivers: composite.into_drivers(),
        pace_consistency,
        tyre_degradation,
    })
}

async fn build_driver(
    client: OpenF1Client,
    session_key: u32,
    driver_number: u32,
) -> Result<DriverSessionDetail> {
    let context = "Failed to load driver session";
    let not_found = |resource: String| PaddockError::NotFound { resource };

    let session = client
        .session_info(session_key)
        .await
        .map_err(|e| e.into_service(context))?
        .ok_or_else(|| not_found(format!("session {}", session_key)))?;
    let kind = session.kind().ok_or_else(|| {
        not_found(format!("analysable session {} ({})", session_key, session.session_name))
    })?;
    let race = kind.has_race_inputs();
    let driver = Some(driver_number);

    let (roster, laps, stints, results, pit_stops, grid, race_control) = tokio::join!(
        client.driver(session_key, driver_number),
        client.laps(session_key, driver),
        client.stints(session_key, driver),
        client.session_results(session_key, driver),
        async {
            if race { client.pit_stops(session_key, driver).await } else { Ok(Vec::new()) }
        },
        async {
            if race { client.starting_grid(session_key, driver).await } else { Ok(Vec::new()) }
        },
        async { if race { client.race_control(session_key).await } else { Ok(Vec::new()) } },
    );

    let roster = roster
        .map_err(|e| e.into_service(context))?
        .ok_or_else(|| not_found(format!("driver {} in session {}", driver_number, session_key)))?;
    let raw = RawSessionData {
        drivers: vec![roster],
        laps: laps.map_err(|e| e.into_service(context))?,
        stints: stints.map_err(|e| e.into_service(context))?,
        pit_stops: pit_stops.map_err(|e| e.into_service(context))?,
        results: results.map_err(|e| e.into_service(context))?,
        starting_grid: grid.map_err(|e| e.into_service(context))?,
    };
    let data = SessionComposite::build(session_key, raw)
        .into_driver(driver_number)
        .ok_or_else(|| not_found(format!("driver {} in session {}", driver_number, session_key)))?;

    let messages = optional(race_control, session_key, "race_control").unwrap_or_default();
    let safety_car = summarize_safety_car(&messages, data.last_lap());
    let sc_laps = &safety_car.laps;

    let detail = DriverSessionDetail {
        session_key,
        kind,
        pace_consistency: driver_pace_consistency(&data, sc_laps),
        tyre_degradation: driver_tyre_degradation(&data, sc_laps),
        pit_stop_impact: driver_pit_stop_impact(&data, sc_laps),
        driver: data,
    };

    info!(
        session_key,
        driver_number,
        ?kind,
        laps = detail.driver.laps.len(),
        "Built driver detail"
    );
    Ok(detail)
}
