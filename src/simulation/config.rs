//! Immutable run configuration
//!
//! Loaded once at startup from an optional JSON file, overridden by CLI flags,
//! validated, then shared read-only (behind an `Arc`) by the fleet and every
//! vehicle.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::error::{SimError, SimResult};
use super::types::DEFAULT_ARRIVAL_TOLERANCE_KM;

/// When an out-of-service vehicle gets back on the road
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPolicy {
    /// Fixed number of ticks spent out of service
    AfterTicks(u32),
    /// Independent chance of rescue on every tick
    Probability(f64),
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        RecoveryPolicy::Probability(0.01)
    }
}

/// Where status events are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Kafka topic on `broker_address` (requires the `kafka` feature)
    Kafka,
    /// Newline-delimited JSON on standard output
    Stdout,
}

impl Default for SinkKind {
    fn default() -> Self {
        if cfg!(feature = "kafka") {
            SinkKind::Kafka
        } else {
            SinkKind::Stdout
        }
    }
}

/// Tunables of the per-vehicle state machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleParams {
    /// Chance per tick that an available vehicle is offered a trip
    pub assign_probability: f64,
    /// Inclusive [min, max] cruising speed drawn for each trip
    pub speed_range_kph: (f64, f64),
    /// Largest random speed change per tick while driving
    pub speed_jitter_kph: f64,
    /// Inclusive [min, max] bounds the varied speed is clamped to
    pub speed_limits_kph: (f64, f64),
    /// Fuel percentage burned per kilometer driven
    pub fuel_consumption_per_km: f64,
    /// Fuel percentage added per tick while paused
    pub refuel_rate_per_tick: f64,
    /// At or below this level a trip offer sends the vehicle to refuel
    pub low_fuel_threshold: f64,
    /// Refueling stops once this level is reached
    pub refuel_target: f64,
    /// Inclusive [min, max] fuel percentage at spawn
    pub initial_fuel_range: (f64, f64),
    pub recovery: RecoveryPolicy,
    /// Fuel level a rescued vehicle restarts with
    pub recovery_fuel_percentage: f64,
    pub arrival_tolerance_km: f64,
    /// Destinations closer than this to the pickup are never chosen
    pub min_trip_distance_km: f64,
    pub max_passengers: u8,
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self {
            assign_probability: 0.05,
            speed_range_kph: (30.0, 80.0),
            speed_jitter_kph: 1.0,
            speed_limits_kph: (10.0, 120.0),
            fuel_consumption_per_km: 0.7,
            refuel_rate_per_tick: 2.0,
            low_fuel_threshold: 20.0,
            refuel_target: 95.0,
            initial_fuel_range: (70.0, 100.0),
            recovery: RecoveryPolicy::default(),
            recovery_fuel_percentage: 50.0,
            arrival_tolerance_km: DEFAULT_ARRIVAL_TOLERANCE_KM,
            min_trip_distance_km: 0.5,
            max_passengers: 4,
        }
    }
}

impl VehicleParams {
    pub fn validate(&self) -> SimResult<()> {
        check_probability("vehicle.assign_probability", self.assign_probability)?;
        check_range("vehicle.speed_range_kph", self.speed_range_kph, 0.0, f64::MAX)?;
        if self.speed_range_kph.0 <= 0.0 {
            return Err(SimError::config("vehicle.speed_range_kph must be positive"));
        }
        check_non_negative("vehicle.speed_jitter_kph", self.speed_jitter_kph)?;
        check_range("vehicle.speed_limits_kph", self.speed_limits_kph, 0.0, f64::MAX)?;
        let (min_limit, max_limit) = self.speed_limits_kph;
        if min_limit <= 0.0 {
            return Err(SimError::config("vehicle.speed_limits_kph must be positive"));
        }
        if self.speed_range_kph.0 < min_limit || self.speed_range_kph.1 > max_limit {
            return Err(SimError::config(format!(
                "vehicle.speed_range_kph must lie within vehicle.speed_limits_kph [{}, {}]",
                min_limit, max_limit
            )));
        }
        check_range("vehicle.initial_fuel_range", self.initial_fuel_range, 0.0, 100.0)?;
        check_non_negative("vehicle.fuel_consumption_per_km", self.fuel_consumption_per_km)?;
        check_non_negative("vehicle.refuel_rate_per_tick", self.refuel_rate_per_tick)?;
        if self.refuel_rate_per_tick == 0.0 {
            return Err(SimError::config(
                "vehicle.refuel_rate_per_tick must be positive or paused vehicles never recover",
            ));
        }
        check_percentage("vehicle.low_fuel_threshold", self.low_fuel_threshold)?;
        check_percentage("vehicle.refuel_target", self.refuel_target)?;
        check_percentage("vehicle.recovery_fuel_percentage", self.recovery_fuel_percentage)?;
        if self.refuel_target <= self.low_fuel_threshold {
            return Err(SimError::config(
                "vehicle.refuel_target must be above vehicle.low_fuel_threshold",
            ));
        }
        if let RecoveryPolicy::Probability(p) = self.recovery {
            check_probability("vehicle.recovery.probability", p)?;
        }
        if !(self.arrival_tolerance_km.is_finite() && self.arrival_tolerance_km > 0.0) {
            return Err(SimError::config("vehicle.arrival_tolerance_km must be positive"));
        }
        check_non_negative("vehicle.min_trip_distance_km", self.min_trip_distance_km)?;
        if self.max_passengers == 0 {
            return Err(SimError::config("vehicle.max_passengers must be at least 1"));
        }
        Ok(())
    }
}

/// Delivery tunables of the publisher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishParams {
    /// Extra attempts for an event after a transport failure
    pub max_retries: u32,
    /// Linear backoff step between attempts
    pub retry_backoff_ms: u64,
    pub flush_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Broker-side delivery timeout of a single message
    pub message_timeout_ms: u64,
}

impl Default for PublishParams {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_backoff_ms: 50,
            flush_timeout_secs: 10,
            connect_timeout_secs: 5,
            message_timeout_ms: 5000,
        }
    }
}

/// Full configuration of a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub broker_address: String,
    pub topic_name: String,
    /// Signed so that negative counts in a file are reported instead of rejected by the parser
    pub vehicles_per_region: BTreeMap<String, i64>,
    pub duration_seconds: i64,
    pub tick_seconds: f64,
    /// Folder holding `pois_<region>.json` files
    pub poi_dir: PathBuf,
    /// Master seed; each vehicle derives its own generator from it
    pub seed: Option<u64>,
    /// Pace ticks to wall-clock time instead of running flat out
    pub realtime: bool,
    pub sink: SinkKind,
    pub progress_every_ticks: u64,
    pub vehicle: VehicleParams,
    pub publish: PublishParams,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            broker_address: "localhost:9092".to_string(),
            topic_name: "uber-trips-raw".to_string(),
            vehicles_per_region: BTreeMap::from([("corrientes".to_string(), 50)]),
            duration_seconds: 120,
            tick_seconds: 1.0,
            poi_dir: PathBuf::from("data"),
            seed: None,
            realtime: true,
            sink: SinkKind::default(),
            progress_every_ticks: 10,
            vehicle: VehicleParams::default(),
            publish: PublishParams::default(),
        }
    }
}

impl FleetConfig {
    /// Read a JSON configuration file; missing fields take their defaults
    pub fn load(path: &Path) -> SimResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
            .map_err(|err| SimError::config(format!("{}: {}", path.display(), err)))
    }

    pub fn from_json(text: &str) -> SimResult<Self> {
        serde_json::from_str(text).map_err(|err| SimError::config(err.to_string()))
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.duration_seconds <= 0 {
            return Err(SimError::config(format!(
                "duration_seconds must be positive, got {}",
                self.duration_seconds
            )));
        }
        if !(self.tick_seconds.is_finite() && self.tick_seconds > 0.0) {
            return Err(SimError::config(format!(
                "tick_seconds must be positive, got {}",
                self.tick_seconds
            )));
        }
        if let Some((region, count)) = self.vehicles_per_region.iter().find(|(_, c)| **c < 0) {
            return Err(SimError::config(format!(
                "vehicle count for region '{}' is negative ({})",
                region, count
            )));
        }
        if self.topic_name.trim().is_empty() {
            return Err(SimError::config("topic_name must not be empty"));
        }
        if self.sink == SinkKind::Kafka && self.broker_address.trim().is_empty() {
            return Err(SimError::config("broker_address must not be empty"));
        }
        if self.progress_every_ticks == 0 {
            return Err(SimError::config("progress_every_ticks must be at least 1"));
        }
        self.vehicle.validate()
    }

    /// Number of ticks covering the configured duration (at least one)
    pub fn total_ticks(&self) -> u64 {
        ((self.duration_seconds as f64 / self.tick_seconds).floor() as u64).max(1)
    }

    pub fn total_vehicles(&self) -> u64 {
        self.vehicles_per_region
            .values()
            .map(|count| (*count).max(0) as u64)
            .sum()
    }
}

fn check_probability(name: &str, value: f64) -> SimResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SimError::config(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )))
    }
}

fn check_percentage(name: &str, value: f64) -> SimResult<()> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(SimError::config(format!(
            "{} must be within [0, 100], got {}",
            name, value
        )))
    }
}

fn check_non_negative(name: &str, value: f64) -> SimResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SimError::config(format!(
            "{} must be a non-negative number, got {}",
            name, value
        )))
    }
}

fn check_range(name: &str, (min, max): (f64, f64), lower: f64, upper: f64) -> SimResult<()> {
    if min.is_finite() && max.is_finite() && lower <= min && min <= max && max <= upper {
        Ok(())
    } else {
        Err(SimError::config(format!(
            "{} must be an ordered [min, max] pair within [{}, {}], got [{}, {}]",
            name, lower, upper, min, max
        )))
    }
}
