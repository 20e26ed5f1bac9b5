//! Shared fixtures for the integration tests
#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fleet_sim::publisher::{EventSink, PublishError};
use fleet_sim::simulation::{Poi, PoiRegistry, Tick, VehicleParams, EARTH_RADIUS_KM};

/// Degrees of latitude spanning `km` kilometers along a meridian
pub fn lat_degrees_for_km(km: f64) -> f64 {
    (km / EARTH_RADIUS_KM).to_degrees()
}

pub const BASE_LAT: f64 = -27.47;
pub const BASE_LON: f64 = -58.83;

/// Two POIs exactly `km` apart on the same meridian
pub fn line_registry(region: &str, km: f64) -> Arc<PoiRegistry> {
    registry(
        region,
        &[
            ("origin", BASE_LAT, BASE_LON),
            ("destination", BASE_LAT + lat_degrees_for_km(km), BASE_LON),
        ],
    )
}

pub fn registry(region: &str, pois: &[(&str, f64, f64)]) -> Arc<PoiRegistry> {
    let pois = pois
        .iter()
        .map(|(name, lat, lon)| Poi::new(*name, *lat, *lon))
        .collect();
    Arc::new(PoiRegistry::new(region, pois).expect("valid registry"))
}

/// A small city-sized grid of POIs roughly 1-3 km apart
pub fn city_registry(region: &str) -> Arc<PoiRegistry> {
    let mut pois = Vec::new();
    for row in 0..3 {
        for col in 0..3 {
            pois.push(Poi::new(
                format!("poi-{}-{}", row, col),
                BASE_LAT + row as f64 * 0.012,
                BASE_LON + col as f64 * 0.015,
            ));
        }
    }
    Arc::new(PoiRegistry::new(region, pois).expect("valid registry"))
}

/// Parameters with a steady 60 km/h speed and no spontaneous trip offers
pub fn fixed_params() -> VehicleParams {
    VehicleParams {
        assign_probability: 0.0,
        speed_range_kph: (60.0, 60.0),
        speed_jitter_kph: 0.0,
        ..VehicleParams::default()
    }
}

pub fn tick(index: u64, duration_secs: f64) -> Tick {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    Tick {
        index,
        duration_secs,
        timestamp: start + chrono::Duration::milliseconds(((index + 1) as f64 * duration_secs * 1000.0) as i64),
    }
}

pub fn poi_json(pois: &[(&str, f64, f64)]) -> String {
    let entries: Vec<String> = pois
        .iter()
        .map(|(name, lat, lon)| {
            format!(
                r#"{{"name": "{}", "latitude": {}, "longitude": {}}}"#,
                name, lat, lon
            )
        })
        .collect();
    format!("[{}]", entries.join(", "))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub topic: String,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

/// Sink keeping every message in memory
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub records: Arc<Mutex<Vec<Record>>>,
    pub flushes: Arc<Mutex<u32>>,
}

impl RecordingSink {
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn send(&mut self, topic: &str, key: Option<&[u8]>, payload: &[u8]) -> Result<(), PublishError> {
        self.records.lock().unwrap().push(Record {
            topic: topic.to_string(),
            key: key.map(|k| k.to_vec()),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    fn flush(&mut self, _timeout: Duration) -> Result<(), PublishError> {
        *self.flushes.lock().unwrap() += 1;
        Ok(())
    }
}

/// Sink failing its first `failures` sends, then recording like [`RecordingSink`]
#[derive(Clone, Default)]
pub struct FlakySink {
    pub failures: Arc<Mutex<u32>>,
    pub attempts: Arc<Mutex<u32>>,
    pub inner: RecordingSink,
}

impl FlakySink {
    pub fn failing(failures: u32) -> Self {
        Self {
            failures: Arc::new(Mutex::new(failures)),
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> u32 {
        *self.attempts.lock().unwrap()
    }
}

impl EventSink for FlakySink {
    fn send(&mut self, topic: &str, key: Option<&[u8]>, payload: &[u8]) -> Result<(), PublishError> {
        *self.attempts.lock().unwrap() += 1;
        let mut failures = self.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(PublishError::Transport("broker unavailable".to_string()));
        }
        drop(failures);
        self.inner.send(topic, key, payload)
    }
}
