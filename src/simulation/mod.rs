//! Ride-hailing fleet simulation core
//!
//! Everything needed to run the fleet without any broker: points of interest,
//! trips, the per-vehicle state machine and the tick loop. Delivery of the
//! resulting events lives in [`crate::publisher`].

mod config;
mod error;
mod fleet;
mod poi;
mod snapshot;
mod stats;
mod trip;
mod types;
mod vehicle;

pub use config::{FleetConfig, PublishParams, RecoveryPolicy, SinkKind, VehicleParams};
pub use error::{SimError, SimResult};
pub use fleet::Fleet;
pub use poi::{Poi, PoiRegistry};
pub use snapshot::StatusSnapshot;
pub use stats::{FleetStats, StateCounts};
pub use trip::{Trip, TripFactory};
pub use types::{
    random_uuid, GeoPoint, Tick, VehicleId, VehicleState, DEFAULT_ARRIVAL_TOLERANCE_KM,
    EARTH_RADIUS_KM,
};
pub use vehicle::Vehicle;
