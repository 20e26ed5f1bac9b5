//! Vehicle state machine for the fleet simulation
//!
//! A vehicle only ever changes through its own `update`, called once per tick,
//! or through the explicit dispatcher commands (`assign_trip`,
//! `pause_for_refuel`). Each `update` applies at most one state transition.

use log::{debug, info, warn};
use rand::Rng;
use std::sync::Arc;

use super::config::{RecoveryPolicy, VehicleParams};
use super::error::{SimError, SimResult};
use super::poi::{Poi, PoiRegistry};
use super::snapshot::{round2, StatusSnapshot};
use super::trip::{Trip, TripFactory};
use super::types::{GeoPoint, Tick, VehicleId, VehicleState};

/// A ride-hailing vehicle
#[derive(Debug, Clone)]
pub struct Vehicle {
    id: VehicleId,
    registry: Arc<PoiRegistry>,
    params: Arc<VehicleParams>,
    trips: TripFactory,
    state: VehicleState,
    location: GeoPoint,
    /// POI the vehicle is standing at; `None` while driving or broken down
    parked_at: Option<Poi>,
    fuel_percentage: f64,
    /// Present if and only if the state is `InTrip`
    active_trip: Option<Trip>,
    km_remaining: Option<f64>,
    eta_minutes: Option<f64>,
    speed_kph: f64,
    heading_degrees: f64,
    ticks_out_of_service: u32,
}

impl Vehicle {
    /// Place a new vehicle at a random POI of its region with a random fuel level
    pub fn new<R: Rng + ?Sized>(
        id: VehicleId,
        registry: Arc<PoiRegistry>,
        params: Arc<VehicleParams>,
        rng: &mut R,
    ) -> SimResult<Self> {
        params.validate()?;
        let start = registry.random(rng)?.clone();
        let (min_fuel, max_fuel) = params.initial_fuel_range;
        let fuel = if min_fuel < max_fuel {
            rng.random_range(min_fuel..=max_fuel)
        } else {
            min_fuel
        };

        let vehicle = Self::parked_at(id, registry, params, &start, fuel)?;
        debug!(
            "Vehicle {} ({}) initialized at {} ({:.4}, {:.4})",
            vehicle.id,
            vehicle.region(),
            start.name,
            start.latitude,
            start.longitude
        );
        Ok(vehicle)
    }

    /// An available vehicle standing at `poi` with the given fuel level
    pub fn parked_at(
        id: VehicleId,
        registry: Arc<PoiRegistry>,
        params: Arc<VehicleParams>,
        poi: &Poi,
        fuel_percentage: f64,
    ) -> SimResult<Self> {
        params.validate()?;
        if !(0.0..=100.0).contains(&fuel_percentage) {
            return Err(SimError::config(format!(
                "fuel percentage of vehicle {} must be within [0, 100], got {}",
                id, fuel_percentage
            )));
        }

        Ok(Self {
            id,
            registry,
            trips: TripFactory::new(params.clone()),
            params,
            state: VehicleState::Available,
            location: poi.location(),
            parked_at: Some(poi.clone()),
            fuel_percentage,
            active_trip: None,
            km_remaining: None,
            eta_minutes: None,
            speed_kph: 0.0,
            heading_degrees: 0.0,
            ticks_out_of_service: 0,
        })
    }

    pub fn id(&self) -> &VehicleId {
        &self.id
    }

    pub fn region(&self) -> &str {
        self.registry.region()
    }

    pub fn state(&self) -> VehicleState {
        self.state
    }

    pub fn location(&self) -> GeoPoint {
        self.location
    }

    pub fn parked_at_poi(&self) -> Option<&Poi> {
        self.parked_at.as_ref()
    }

    pub fn fuel_percentage(&self) -> f64 {
        self.fuel_percentage
    }

    pub fn active_trip(&self) -> Option<&Trip> {
        self.active_trip.as_ref()
    }

    pub fn km_remaining(&self) -> Option<f64> {
        self.km_remaining
    }

    pub fn eta_minutes(&self) -> Option<f64> {
        self.eta_minutes
    }

    pub fn speed_kph(&self) -> f64 {
        self.speed_kph
    }

    pub fn heading_degrees(&self) -> f64 {
        self.heading_degrees
    }

    pub fn passengers(&self) -> u8 {
        self.active_trip.as_ref().map_or(0, |trip| trip.passengers)
    }

    /// Distance left to the destination of the active trip, in kilometers
    pub fn distance_to_destination_km(&self) -> Option<f64> {
        self.active_trip
            .as_ref()
            .map(|trip| self.location.distance_km(&trip.destination.location()))
    }

    /// Hand a trip to an available vehicle; it departs from the trip's origin
    pub fn assign_trip(&mut self, trip: Trip) -> SimResult<()> {
        self.require_available("accept a trip")?;
        self.start_trip(trip);
        Ok(())
    }

    /// Send an available vehicle to refuel
    pub fn pause_for_refuel(&mut self) -> SimResult<()> {
        self.require_available("pause for refueling")?;
        self.state = VehicleState::Paused;
        Ok(())
    }

    /// Advance the vehicle by one tick and report its status
    pub fn update<R: Rng + ?Sized>(&mut self, tick: &Tick, rng: &mut R) -> StatusSnapshot {
        match self.state {
            VehicleState::Available => self.offer_trip(tick, rng),
            VehicleState::InTrip => self.advance_trip(tick, rng),
            VehicleState::Paused => self.refuel(),
            VehicleState::OutOfService => self.await_recovery(rng),
        }
        self.snapshot(tick)
    }

    /// Project the observable fields, stamped with the tick's time
    pub fn snapshot(&self, tick: &Tick) -> StatusSnapshot {
        let trip = self.active_trip.as_ref();
        StatusSnapshot {
            vehicle_id: self.id.clone(),
            province: self.region().to_string(),
            state: self.state,
            latitude: self.location.latitude,
            longitude: self.location.longitude,
            speed_kph: round2(self.speed_kph),
            fuel_percentage: round2(self.fuel_percentage),
            trip_id: trip.map(|trip| trip.id.clone()),
            km_remaining: self.km_remaining.map(round2),
            eta_minutes: self.eta_minutes.map(round2),
            passengers: self.passengers(),
            heading_degrees: round2(self.heading_degrees),
            destination: trip.map(|trip| trip.destination.location()),
            tick: tick.index,
            timestamp: tick.timestamp,
        }
    }

    fn require_available(&self, action: &'static str) -> SimResult<()> {
        if self.state == VehicleState::Available {
            Ok(())
        } else {
            Err(SimError::InvalidTransition {
                vehicle_id: self.id.to_string(),
                state: self.state,
                action,
            })
        }
    }

    fn offer_trip<R: Rng + ?Sized>(&mut self, tick: &Tick, rng: &mut R) {
        if !rng.random_bool(self.params.assign_probability) {
            return;
        }

        if self.fuel_percentage <= self.params.low_fuel_threshold {
            debug!(
                "Vehicle {} ({}): low fuel ({:.1}%), pausing to refuel",
                self.id,
                self.region(),
                self.fuel_percentage
            );
            self.state = VehicleState::Paused;
            return;
        }

        let Some(origin) = self.parked_at.clone() else {
            warn!(
                "Vehicle {} ({}) is not at a point of interest, cannot take a trip",
                self.id,
                self.region()
            );
            return;
        };

        match self.trips.dispatch(&self.registry, &origin, tick.index, rng) {
            Ok(Some(trip)) => self.start_trip(trip),
            Ok(None) => warn!(
                "Vehicle {} ({}) found no destination at least {:.2} km from {}",
                self.id,
                self.region(),
                self.params.min_trip_distance_km,
                origin.name
            ),
            Err(err) => warn!(
                "Vehicle {} ({}): no trip assigned: {}",
                self.id,
                self.region(),
                err
            ),
        }
    }

    fn start_trip(&mut self, trip: Trip) {
        debug!(
            "Vehicle {} ({}) assigned to trip {} from {} to {} ({:.2} km at {:.0} km/h)",
            self.id,
            self.region(),
            trip.id,
            trip.origin.name,
            trip.destination.name,
            trip.total_distance_km,
            trip.speed_kph
        );

        self.state = VehicleState::InTrip;
        self.location = trip.origin.location();
        self.parked_at = None;
        self.km_remaining = Some(trip.total_distance_km);
        self.eta_minutes = Some(trip.eta_minutes(trip.total_distance_km));
        self.speed_kph = trip.speed_kph;
        self.heading_degrees = trip.heading_degrees();
        self.active_trip = Some(trip);
    }

    fn advance_trip<R: Rng + ?Sized>(&mut self, tick: &Tick, rng: &mut R) {
        let remaining = match self.km_remaining {
            Some(remaining) if self.active_trip.is_some() => remaining,
            _ => {
                // No trip to drive, back to idle
                self.clear_trip();
                self.state = VehicleState::Available;
                return;
            }
        };

        if self.fuel_percentage <= 0.0 {
            self.break_down();
            return;
        }

        self.vary_speed(rng);
        let Some(trip) = self.active_trip.as_ref() else {
            return;
        };

        let mut travel_km = (self.speed_kph * tick.duration_hours()).min(remaining);
        let consumption = self.params.fuel_consumption_per_km;
        let mut exhausted = false;
        if consumption > 0.0 {
            let range_km = self.fuel_percentage / consumption;
            if range_km <= travel_km {
                travel_km = range_km;
                exhausted = true;
            }
        }

        let remaining = (remaining - travel_km).max(0.0);
        self.fuel_percentage = if exhausted {
            0.0
        } else {
            (self.fuel_percentage - consumption * travel_km).clamp(0.0, 100.0)
        };
        self.location = trip.position_at(remaining);
        self.km_remaining = Some(remaining);
        self.eta_minutes = Some(remaining / self.speed_kph * 60.0);

        // An empty tank ends the trip even within reach of the destination
        if self.fuel_percentage <= 0.0 {
            self.break_down();
        } else if remaining <= self.params.arrival_tolerance_km {
            self.arrive();
        }
    }

    /// Traffic: nudge the cruising speed by up to `speed_jitter_kph` each tick
    fn vary_speed<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let jitter = self.params.speed_jitter_kph;
        if jitter <= 0.0 {
            return;
        }
        let (min_speed, max_speed) = self.params.speed_limits_kph;
        let varied = self.speed_kph + rng.random_range(-jitter..=jitter);
        self.speed_kph = varied.clamp(min_speed, max_speed);
    }

    fn arrive(&mut self) {
        let Some(trip) = self.active_trip.take() else {
            return;
        };
        debug!(
            "Vehicle {} ({}) arrived at {}, trip {} finished",
            self.id,
            self.region(),
            trip.destination.name,
            trip.id
        );

        self.location = trip.destination.location();
        self.parked_at = Some(trip.destination);
        self.clear_trip();
        self.state = VehicleState::Available;
    }

    fn break_down(&mut self) {
        info!(
            "Vehicle {} ({}) ran out of fuel during trip {}, out of service",
            self.id,
            self.region(),
            self.active_trip
                .as_ref()
                .map_or("-", |trip| trip.id.as_str())
        );

        self.clear_trip();
        self.parked_at = None;
        self.ticks_out_of_service = 0;
        self.state = VehicleState::OutOfService;
    }

    fn refuel(&mut self) {
        self.fuel_percentage = (self.fuel_percentage + self.params.refuel_rate_per_tick).min(100.0);
        if self.fuel_percentage >= self.params.refuel_target {
            debug!(
                "Vehicle {} ({}) refueled to {:.1}%, available",
                self.id,
                self.region(),
                self.fuel_percentage
            );
            self.state = VehicleState::Available;
        }
    }

    fn await_recovery<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.ticks_out_of_service = self.ticks_out_of_service.saturating_add(1);
        let recovered = match self.params.recovery {
            RecoveryPolicy::AfterTicks(ticks) => self.ticks_out_of_service >= ticks,
            RecoveryPolicy::Probability(p) => rng.random_bool(p),
        };
        if !recovered {
            return;
        }

        // Roadside assistance tows the vehicle to the closest POI
        if let Some(poi) = self.registry.nearest(&self.location) {
            self.location = poi.location();
            self.parked_at = Some(poi.clone());
        }
        self.fuel_percentage = self.params.recovery_fuel_percentage;
        self.ticks_out_of_service = 0;
        self.state = VehicleState::Available;
        info!(
            "Vehicle {} ({}) rescued with {:.1}% fuel, back in service",
            self.id,
            self.region(),
            self.fuel_percentage
        );
    }

    fn clear_trip(&mut self) {
        self.active_trip = None;
        self.km_remaining = None;
        self.eta_minutes = None;
        self.speed_kph = 0.0;
        self.heading_degrees = 0.0;
    }
}
