//! Typed OpenF1 accessors
//!
//! Thin wrappers that build query parameters and decode rows. All traffic goes
//! through the shared [`Fetcher`], so every accessor is cached, queued, retried,
//! and deduplicated. Absent single resources come back as `Ok(None)`.

use serde::de::DeserializeOwned;

use super::models::{
    Driver, Lap, Meeting, Overtake, PitStop, Position, RaceControlMessage, Session, SessionResult,
    StartingGridEntry, Stint, Weather,
};
use crate::Result;
use crate::fetch::{Fetcher, QueryParams};

pub const MEETINGS: &str = "/meetings";
pub const SESSIONS: &str = "/sessions";
pub const DRIVERS: &str = "/drivers";
pub const LAPS: &str = "/laps";
pub const STINTS: &str = "/stints";
pub const PIT: &str = "/pit";
pub const SESSION_RESULT: &str = "/session_result";
pub const STARTING_GRID: &str = "/starting_grid";
pub const RACE_CONTROL: &str = "/race_control";
pub const OVERTAKES: &str = "/overtakes";
pub const WEATHER: &str = "/weather";
pub const POSITION: &str = "/position";

/// Client for the OpenF1 REST API.
#[derive(Debug, Clone)]
pub struct OpenF1Client {
    fetcher: Fetcher,
}

impl OpenF1Client {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    async fn rows<T: DeserializeOwned>(&self, path: &str, params: QueryParams) -> Result<Vec<T>> {
        self.fetcher.fetch(path, &params, None).await
    }

    fn session_params(session_key: u32, driver_number: Option<u32>) -> QueryParams {
        QueryParams::new()
            .with("session_key", session_key)
            .with_opt("driver_number", driver_number)
    }

    pub async fn meetings(&self, year: i32) -> Result<Vec<Meeting>> {
        self.rows(MEETINGS, QueryParams::new().with("year", year)).await
    }

    pub async fn meeting(&self, meeting_key: u32) -> Result<Option<Meeting>> {
        let rows: Vec<Meeting> =
            self.rows(MEETINGS, QueryParams::new().with("meeting_key", meeting_key)).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn sessions_for_meeting(&self, meeting_key: u32) -> Result<Vec<Session>> {
        self.rows(SESSIONS, QueryParams::new().with("meeting_key", meeting_key)).await
    }

    pub async fn sessions_for_year(&self, year: i32) -> Result<Vec<Session>> {
        self.rows(SESSIONS, QueryParams::new().with("year", year)).await
    }

    pub async fn session_info(&self, session_key: u32) -> Result<Option<Session>> {
        let rows: Vec<Session> =
            self.rows(SESSIONS, Self::session_params(session_key, None)).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn drivers(&self, session_key: u32) -> Result<Vec<Driver>> {
        self.rows(DRIVERS, Self::session_params(session_key, None)).await
    }

    pub async fn driver(&self, session_key: u32, driver_number: u32) -> Result<Option<Driver>> {
        let rows: Vec<Driver> =
            self.rows(DRIVERS, Self::session_params(session_key, Some(driver_number))).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn laps(&self, session_key: u32, driver_number: Option<u32>) -> Result<Vec<Lap>> {
        self.rows(LAPS, Self::session_params(session_key, driver_number)).await
    }

    pub async fn stints(&self, session_key: u32, driver_number: Option<u32>) -> Result<Vec<Stint>> {
        self.rows(STINTS, Self::session_params(session_key, driver_number)).await
    }

    pub async fn pit_stops(
        &self,
        session_key: u32,
        driver_number: Option<u32>,
    ) -> Result<Vec<PitStop>> {
        self.rows(PIT, Self::session_params(session_key, driver_number)).await
    }

    pub async fn session_results(
        &self,
        session_key: u32,
        driver_number: Option<u32>,
    ) -> Result<Vec<SessionResult>> {
        self.rows(SESSION_RESULT, Self::session_params(session_key, driver_number)).await
    }

    pub async fn starting_grid(
        &self,
        session_key: u32,
        driver_number: Option<u32>,
    ) -> Result<Vec<StartingGridEntry>> {
        self.rows(STARTING_GRID, Self::session_params(session_key, driver_number)).await
    }

    pub async fn race_control(&self, session_key: u32) -> Result<Vec<RaceControlMessage>> {
        self.rows(RACE_CONTROL, Self::session_params(session_key, None)).await
    }

    pub async fn overtakes(&self, session_key: u32) -> Result<Vec<Overtake>> {
        self.rows(OVERTAKES, Self::session_params(session_key, None)).await
    }

    pub async fn weather(&self, session_key: u32) -> Result<Vec<Weather>> {
        self.rows(WEATHER, Self::session_params(session_key, None)).await
    }

    pub async fn positions(
        &self,
        session_key: u32,
        driver_number: Option<u32>,
    ) -> Result<Vec<Position>> {
        self.rows(POSITION, Self::session_params(session_key, driver_number)).await
    }
}
