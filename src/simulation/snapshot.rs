//! Per-tick status events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{GeoPoint, VehicleId, VehicleState};

/// Immutable projection of a vehicle's observable fields at one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub vehicle_id: VehicleId,
    pub province: String,
    pub state: VehicleState,
    pub latitude: f64,
    pub longitude: f64,
    pub speed_kph: f64,
    pub fuel_percentage: f64,
    pub trip_id: Option<String>,
    pub km_remaining: Option<f64>,
    pub eta_minutes: Option<f64>,
    pub passengers: u8,
    pub heading_degrees: f64,
    pub destination: Option<GeoPoint>,
    pub tick: u64,
    pub timestamp: DateTime<Utc>,
}

impl StatusSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Message key: events of one vehicle share a partition
    pub fn key(&self) -> &[u8] {
        self.vehicle_id.as_str().as_bytes()
    }

    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Two decimals, as telemetry consumers expect
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
