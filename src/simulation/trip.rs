//! Trips and the factory that creates them

use rand::Rng;
use std::sync::Arc;

use super::config::VehicleParams;
use super::error::{SimError, SimResult};
use super::poi::{Poi, PoiRegistry};
use super::types::{random_uuid, GeoPoint};

/// A straight-line ride between two points of interest
#[derive(Debug, Clone, PartialEq)]
pub struct Trip {
    pub id: String,
    pub origin: Poi,
    pub destination: Poi,
    /// Always positive
    pub total_distance_km: f64,
    pub speed_kph: f64,
    pub started_at_tick: u64,
    pub passengers: u8,
}

impl Trip {
    /// Position once `km_remaining` of the trip is left
    pub fn position_at(&self, km_remaining: f64) -> GeoPoint {
        let covered = (1.0 - km_remaining / self.total_distance_km).clamp(0.0, 1.0);
        self.origin
            .location()
            .lerp(&self.destination.location(), covered)
    }

    pub fn eta_minutes(&self, km_remaining: f64) -> f64 {
        km_remaining / self.speed_kph * 60.0
    }

    pub fn heading_degrees(&self) -> f64 {
        self.origin
            .location()
            .bearing_degrees(&self.destination.location())
    }
}

/// Builds trips using the configured speed and passenger ranges
#[derive(Debug, Clone)]
pub struct TripFactory {
    params: Arc<VehicleParams>,
}

impl TripFactory {
    pub fn new(params: Arc<VehicleParams>) -> Self {
        Self { params }
    }

    pub fn create_trip<R: Rng + ?Sized>(
        &self,
        origin: &Poi,
        destination: &Poi,
        tick: u64,
        rng: &mut R,
    ) -> SimResult<Trip> {
        let total_distance_km = origin.location().distance_km(&destination.location());
        if !(total_distance_km > 0.0) {
            return Err(SimError::DegenerateTrip {
                origin: origin.name.clone(),
                destination: destination.name.clone(),
            });
        }

        let (min_speed, max_speed) = self.params.speed_range_kph;
        let speed_kph = if min_speed < max_speed {
            rng.random_range(min_speed..=max_speed)
        } else {
            min_speed
        };
        let passengers = rng.random_range(1..=self.params.max_passengers);

        Ok(Trip {
            id: random_uuid(rng),
            origin: origin.clone(),
            destination: destination.clone(),
            total_distance_km,
            speed_kph,
            started_at_tick: tick,
            passengers,
        })
    }

    /// Trip from `origin` to a random destination of the registry
    ///
    /// Returns `Ok(None)` when no destination is far enough from the origin.
    pub fn dispatch<R: Rng + ?Sized>(
        &self,
        registry: &PoiRegistry,
        origin: &Poi,
        tick: u64,
        rng: &mut R,
    ) -> SimResult<Option<Trip>> {
        match registry.pick_destination(origin, self.params.min_trip_distance_km, rng)? {
            Some(destination) => self.create_trip(origin, destination, tick, rng).map(Some),
            None => Ok(None),
        }
    }

    /// Trip between two distinct random POIs of the registry
    pub fn random_trip<R: Rng + ?Sized>(
        &self,
        registry: &PoiRegistry,
        tick: u64,
        rng: &mut R,
    ) -> SimResult<Trip> {
        let (origin, destination) = registry.pick_two_distinct(rng)?;
        self.create_trip(origin, destination, tick, rng)
    }
}
