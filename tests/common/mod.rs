//! Shared fixtures for integration tests
//!
//! `StubUpstream` answers OpenF1 paths from in-memory JSON, filtering rows by the
//! query parameters the way the real API does, and counts every call.

#![allow(dead_code)]

use async_trait::async_trait;
use paddock::fetch::MemoryStore;
use paddock::{Paddock, PaddockConfig, PaddockError, QueryParams, Upstream};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const RACE: u32 = 9158;
pub const QUALIFYING: u32 = 9159;
pub const PRACTICE: u32 = 9157;

/// Driver numbers in roster order; results put 44 first, then 1, then 16.
pub const DRIVERS: [(u32, &str, &str); 3] =
    [(1, "VER", "Red Bull Racing"), (16, "LEC", "Ferrari"), (44, "HAM", "Mercedes")];

pub const PIT_LAP: u32 = 6;
pub const LAPS: u32 = 12;

#[derive(Default)]
struct Route {
    payload: Value,
    /// Errors returned, in order, before the payload is served
    failures: Vec<PaddockError>,
    /// Error returned on every call once `failures` is exhausted
    always_fail: Option<PaddockError>,
}

#[derive(Default)]
pub struct StubUpstream {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<(String, QueryParams)>>,
    delay: Mutex<Duration>,
}

impl StubUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, path: &str, payload: Value) -> &Self {
        self.routes.lock().unwrap().entry(path.to_string()).or_default().payload = payload;
        self
    }

    pub fn fail_times(&self, path: &str, times: usize, error: PaddockError) -> &Self {
        let mut routes = self.routes.lock().unwrap();
        let route = routes.entry(path.to_string()).or_default();
        route.failures.extend(std::iter::repeat_n(error, times));
        self
    }

    pub fn fail_always(&self, path: &str, error: PaddockError) -> &Self {
        self.routes.lock().unwrap().entry(path.to_string()).or_default().always_fail = Some(error);
        self
    }

    pub fn heal(&self, path: &str) -> &Self {
        if let Some(route) = self.routes.lock().unwrap().get_mut(path) {
            route.failures.clear();
            route.always_fail = None;
        }
        self
    }

    /// Every call sleeps this long before answering.
    pub fn with_delay(&self, delay: Duration) -> &Self {
        *self.delay.lock().unwrap() = delay;
        self
    }

    pub fn calls(&self, path: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(p, _)| p == path).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn params_for(&self, path: &str) -> Vec<QueryParams> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, params)| params.clone())
            .collect()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl Upstream for StubUpstream {
    async fn get(&self, path: &str, params: &QueryParams) -> paddock::Result<Value> {
        self.calls.lock().unwrap().push((path.to_string(), params.clone()));
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut routes = self.routes.lock().unwrap();
        let Some(route) = routes.get_mut(path) else {
            return Ok(json!([]));
        };
        if !route.failures.is_empty() {
            return Err(route.failures.remove(0));
        }
        if let Some(error) = &route.always_fail {
            return Err(error.clone());
        }
        Ok(filter_rows(&route.payload, params))
    }
}

/// Keep array rows whose fields match every query parameter they carry.
fn filter_rows(payload: &Value, params: &QueryParams) -> Value {
    let Value::Array(rows) = payload else {
        return payload.clone();
    };
    let matches = |row: &Value| {
        params.pairs().into_iter().all(|(key, expected)| match row.get(key) {
            Some(Value::String(s)) => s == expected,
            Some(Value::Number(n)) => n.to_string() == expected,
            _ => true,
        })
    };
    Value::Array(rows.iter().filter(|row| matches(*row)).cloned().collect())
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Defaults with a short backoff so failing paths finish quickly.
pub fn test_config() -> PaddockConfig {
    PaddockConfig { retry_delay_ms: 10, ..Default::default() }
}

pub fn paddock_with(stub: &Arc<StubUpstream>) -> Paddock {
    Paddock::with_upstream(test_config(), stub.clone(), Arc::new(MemoryStore::new()))
        .expect("valid test config")
}

fn lap_time(driver_index: usize, lap: u32) -> f64 {
    let base = 90.0 + driver_index as f64 * 0.2 + f64::from(lap % 3) * 0.1;
    if lap == PIT_LAP { base + 20.0 } else { base }
}

/// A race, qualifying, and practice session with the same three drivers.
///
/// Race: safety car on laps 3 and 4, everyone pits on lap 6, two overtakes.
pub fn race_weekend() -> StubUpstream {
    let stub = StubUpstream::new();
    let sessions = [
        (RACE, "Race", "Race"),
        (QUALIFYING, "Qualifying", "Qualifying"),
        (PRACTICE, "Practice", "Practice 3"),
    ];

    stub.route(
        "/sessions",
        Value::Array(
            sessions
                .iter()
                .map(|(key, session_type, name)| {
                    json!({
                        "session_key": key,
                        "meeting_key": 1229,
                        "session_type": session_type,
                        "session_name": name,
                        "year": 2024
                    })
                })
                .chain(std::iter::once(json!({
                    "session_key": 9000,
                    "meeting_key": 1200,
                    "session_type": "Testing",
                    "session_name": "Day 1"
                })))
                .collect(),
        ),
    );

    let mut drivers = Vec::new();
    let mut laps = Vec::new();
    let mut stints = Vec::new();
    let mut results = Vec::new();
    for (session_key, _, _) in sessions {
        for (index, (number, acronym, team)) in DRIVERS.iter().enumerate() {
            drivers.push(json!({
                "session_key": session_key,
                "driver_number": number,
                "name_acronym": acronym,
                "full_name": format!("Driver {}", acronym),
                "team_name": team
            }));
            for lap in 1..=LAPS {
                let time = lap_time(index, lap);
                laps.push(json!({
                    "session_key": session_key,
                    "driver_number": number,
                    "lap_number": lap,
                    "lap_duration": time,
                    "duration_sector_1": time * 0.3,
                    "duration_sector_2": time * 0.4,
                    "duration_sector_3": time * 0.3,
                    "is_pit_out_lap": lap == PIT_LAP + 1
                }));
            }
            stints.push(json!({
                "session_key": session_key,
                "driver_number": number,
                "stint_number": 1,
                "lap_start": 1,
                "lap_end": PIT_LAP,
                "compound": "MEDIUM"
            }));
            stints.push(json!({
                "session_key": session_key,
                "driver_number": number,
                "stint_number": 2,
                "lap_start": PIT_LAP + 1,
                "lap_end": null,
                "compound": "HARD"
            }));
            let position = match number {
                44 => 1,
                1 => 2,
                _ => 3,
            };
            results.push(json!({
                "session_key": session_key,
                "driver_number": number,
                "position": position
            }));
        }
    }
    stub.route("/drivers", Value::Array(drivers));
    stub.route("/laps", Value::Array(laps));
    stub.route("/stints", Value::Array(stints));
    stub.route("/session_result", Value::Array(results));

    stub.route(
        "/pit",
        Value::Array(
            DRIVERS
                .iter()
                .map(|(number, _, _)| {
                    json!({
                        "session_key": RACE,
                        "driver_number": number,
                        "lap_number": PIT_LAP,
                        "pit_duration": 22.5
                    })
                })
                .collect(),
        ),
    );
    stub.route(
        "/starting_grid",
        Value::Array(
            DRIVERS
                .iter()
                .enumerate()
                .map(|(index, (number, _, _))| {
                    json!({ "session_key": RACE, "driver_number": number, "position": index + 1 })
                })
                .collect(),
        ),
    );
    stub.route(
        "/race_control",
        json!([
            { "session_key": RACE, "category": "Flag", "flag": "GREEN", "message": "GREEN LIGHT - PIT EXIT OPEN", "lap_number": 1 },
            { "session_key": RACE, "category": "SafetyCar", "message": "SAFETY CAR DEPLOYED", "lap_number": 3 },
            { "session_key": RACE, "category": "SafetyCar", "message": "SAFETY CAR IN THIS LAP", "lap_number": 4 }
        ]),
    );
    stub.route(
        "/overtakes",
        json!([
            { "session_key": RACE, "overtaking_driver_number": 44, "overtaken_driver_number": 1, "position": 1 },
            { "session_key": RACE, "overtaking_driver_number": 16, "overtaken_driver_number": 1, "position": 2 }
        ]),
    );

    stub
}
