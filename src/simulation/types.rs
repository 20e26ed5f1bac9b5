//! Core types for the fleet simulation
//!
//! Geography, identifiers and the vehicle lifecycle states.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mean Earth radius used by the haversine distance
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Radius within which a vehicle counts as arrived (50 meters)
pub const DEFAULT_ARRIVAL_TOLERANCE_KM: f64 = 0.05;

/// A point on the Earth's surface in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance in kilometers
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_KM * c
    }

    /// Linear interpolation in latitude/longitude space
    pub fn lerp(&self, other: &GeoPoint, t: f64) -> GeoPoint {
        GeoPoint {
            latitude: self.latitude + (other.latitude - self.latitude) * t,
            longitude: self.longitude + (other.longitude - self.longitude) * t,
        }
    }

    /// Initial compass bearing from this point to another, in [0, 360)
    pub fn bearing_degrees(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let y = dlon.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
        if x == 0.0 && y == 0.0 {
            return 0.0;
        }

        (y.atan2(x).to_degrees() + 360.0) % 360.0
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Build a v4 UUID from the caller's RNG so seeded runs reproduce identifiers
pub fn random_uuid<R: Rng + ?Sized>(rng: &mut R) -> String {
    uuid::Builder::from_random_bytes(rng.random())
        .into_uuid()
        .to_string()
}

/// Identifier of a vehicle, stable for the whole run
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub String);

impl VehicleId {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(random_uuid(rng))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VehicleId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Lifecycle state of a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleState {
    /// Idle and waiting for a trip
    Available,
    /// Carrying passengers toward a destination
    InTrip,
    /// Stopped for refueling
    Paused,
    /// Broken down, waiting for assistance
    OutOfService,
}

impl VehicleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleState::Available => "AVAILABLE",
            VehicleState::InTrip => "IN_TRIP",
            VehicleState::Paused => "PAUSED",
            VehicleState::OutOfService => "OUT_OF_SERVICE",
        }
    }
}

impl fmt::Display for VehicleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discrete simulated time step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Zero-based index of the tick within the run
    pub index: u64,
    pub duration_secs: f64,
    /// Simulated wall-clock time at the end of the tick
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Tick {
    pub fn duration_hours(&self) -> f64 {
        self.duration_secs / 3600.0
    }
}
