//! Run statistics for the fleet simulation

use log::info;

use super::types::VehicleState;

/// Counters accumulated over a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FleetStats {
    pub ticks: u64,
    pub snapshots: u64,
    pub trips_started: u64,
    pub trips_completed: u64,
    pub breakdowns: u64,
    pub recoveries: u64,
    pub refuel_stops: u64,
    /// Events the publisher refused to queue
    pub publish_rejections: u64,
    pub simulated_secs: f64,
}

impl FleetStats {
    /// Count the transition a vehicle made during one tick
    pub fn record_transition(&mut self, from: VehicleState, to: VehicleState) {
        use VehicleState::*;
        match (from, to) {
            (Available, InTrip) => self.trips_started += 1,
            (InTrip, Available) => self.trips_completed += 1,
            (InTrip, OutOfService) => self.breakdowns += 1,
            (OutOfService, Available) => self.recoveries += 1,
            (Available, Paused) => self.refuel_stops += 1,
            _ => {}
        }
    }

    /// Share of started trips that reached their destination, in percent
    pub fn completion_rate(&self) -> f64 {
        if self.trips_started > 0 {
            self.trips_completed as f64 / self.trips_started as f64 * 100.0
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        info!("=== SIMULATION COMPLETE ===");
        info!("Simulated time: {:.1}s", self.simulated_secs);
        info!("Ticks: {}", self.ticks);
        info!("Events emitted: {}", self.snapshots);
        info!("Trips started: {}", self.trips_started);
        info!("Trips completed: {}", self.trips_completed);
        info!("Breakdowns: {}", self.breakdowns);
        info!("Recoveries: {}", self.recoveries);
        info!("Refuel stops: {}", self.refuel_stops);
        info!("Completion rate: {:.1}%", self.completion_rate());
        if self.publish_rejections > 0 {
            info!("Events rejected by publisher: {}", self.publish_rejections);
        }
    }
}

/// Number of vehicles in each state at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub available: usize,
    pub in_trip: usize,
    pub paused: usize,
    pub out_of_service: usize,
}

impl StateCounts {
    pub fn add(&mut self, state: VehicleState) {
        match state {
            VehicleState::Available => self.available += 1,
            VehicleState::InTrip => self.in_trip += 1,
            VehicleState::Paused => self.paused += 1,
            VehicleState::OutOfService => self.out_of_service += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.available + self.in_trip + self.paused + self.out_of_service
    }
}

impl FromIterator<VehicleState> for StateCounts {
    fn from_iter<I: IntoIterator<Item = VehicleState>>(iter: I) -> Self {
        let mut counts = StateCounts::default();
        for state in iter {
            counts.add(state);
        }
        counts
    }
}
