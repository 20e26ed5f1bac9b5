//! Fleet simulation loop
//!
//! Owns every vehicle and advances them in fixed ticks. Vehicles share no
//! mutable state, so each tick updates them in parallel; a vehicle's own ticks
//! stay strictly sequential because the next tick only starts once the whole
//! fleet has finished the current one.

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::config::{FleetConfig, VehicleParams};
use super::error::{SimError, SimResult};
use super::poi::PoiRegistry;
use super::snapshot::StatusSnapshot;
use super::stats::{FleetStats, StateCounts};
use super::types::{Tick, VehicleId, VehicleState};
use super::vehicle::Vehicle;
use crate::publisher::Publisher;

/// A vehicle together with its private random source
#[derive(Debug)]
struct FleetVehicle {
    vehicle: Vehicle,
    rng: StdRng,
}

/// The simulated fleet across all regions
pub struct Fleet {
    config: Arc<FleetConfig>,
    regions: BTreeMap<String, Arc<PoiRegistry>>,
    /// Regions left out because their POI data cannot form trips
    skipped_regions: Vec<String>,
    vehicles: HashMap<VehicleId, FleetVehicle>,
    tick: u64,
    clock_start: DateTime<Utc>,
    stats: FleetStats,
}

impl Fleet {
    /// Validate the configuration and spawn the vehicles of every region
    pub fn new(config: FleetConfig, registries: BTreeMap<String, PoiRegistry>) -> SimResult<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let params = Arc::new(config.vehicle.clone());
        let mut master = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let regions: BTreeMap<String, Arc<PoiRegistry>> = registries
            .into_iter()
            .map(|(region, registry)| (region, Arc::new(registry)))
            .collect();

        let mut fleet = Self {
            config: config.clone(),
            regions,
            skipped_regions: Vec::new(),
            vehicles: HashMap::new(),
            tick: 0,
            clock_start: Utc::now(),
            stats: FleetStats::default(),
        };

        for (region, count) in &config.vehicles_per_region {
            if *count <= 0 {
                continue;
            }
            let registry = fleet.regions.get(region).cloned().ok_or_else(|| {
                SimError::config(format!(
                    "no POI data for region '{}' (expected pois_{}.json in {})",
                    region,
                    region,
                    config.poi_dir.display()
                ))
            })?;

            if let Err(err) = registry.ensure_routable() {
                error!("{}; no vehicles will run in this region", err);
                fleet.skipped_regions.push(region.clone());
                continue;
            }

            fleet.spawn_region(&registry, &params, *count as u64, &mut master)?;
        }

        if fleet.vehicles.is_empty() {
            return Err(SimError::config(
                "no vehicles to simulate, check vehicles_per_region and the POI files",
            ));
        }

        Ok(fleet)
    }

    fn spawn_region(
        &mut self,
        registry: &Arc<PoiRegistry>,
        params: &Arc<VehicleParams>,
        count: u64,
        master: &mut StdRng,
    ) -> SimResult<()> {
        for _ in 0..count {
            let id = VehicleId::random(master);
            let mut rng = StdRng::from_rng(master);
            let vehicle = Vehicle::new(id.clone(), registry.clone(), params.clone(), &mut rng)?;
            self.vehicles.insert(id, FleetVehicle { vehicle, rng });
        }
        info!(
            "Spawned {} vehicle(s) in region {}",
            count,
            registry.region()
        );
        Ok(())
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    /// Number of ticks completed so far
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn stats(&self) -> &FleetStats {
        &self.stats
    }

    pub fn skipped_regions(&self) -> &[String] {
        &self.skipped_regions
    }

    pub fn registry(&self, region: &str) -> Option<&PoiRegistry> {
        self.regions.get(region).map(|registry| registry.as_ref())
    }

    pub fn vehicle(&self, id: &VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(id).map(|slot| &slot.vehicle)
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values().map(|slot| &slot.vehicle)
    }

    /// Number of regions with at least one vehicle
    pub fn active_regions(&self) -> usize {
        self.vehicles()
            .map(Vehicle::region)
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn state_counts(&self) -> StateCounts {
        self.vehicles().map(Vehicle::state).collect()
    }

    /// Use a fixed origin for the simulated clock
    pub fn set_clock_start(&mut self, start: DateTime<Utc>) {
        self.clock_start = start;
    }

    fn next_tick(&self) -> Tick {
        let elapsed_ms = ((self.tick + 1) as f64 * self.config.tick_seconds * 1000.0).round() as i64;
        Tick {
            index: self.tick,
            duration_secs: self.config.tick_seconds,
            timestamp: self.clock_start + chrono::Duration::milliseconds(elapsed_ms),
        }
    }

    /// Advance every vehicle by one tick and return their snapshots
    pub fn step(&mut self) -> Vec<StatusSnapshot> {
        let tick = self.next_tick();

        let results: Vec<(VehicleState, StatusSnapshot)> = self
            .vehicles
            .par_iter_mut()
            .map(|(_, slot)| {
                let before = slot.vehicle.state();
                let snapshot = slot.vehicle.update(&tick, &mut slot.rng);
                (before, snapshot)
            })
            .collect();

        self.tick += 1;
        self.stats.ticks += 1;
        self.stats.simulated_secs += tick.duration_secs;
        self.stats.snapshots += results.len() as u64;

        results
            .into_iter()
            .map(|(before, snapshot)| {
                self.stats.record_transition(before, snapshot.state);
                snapshot
            })
            .collect()
    }

    /// Run for the configured duration, publishing every snapshot
    ///
    /// `stop` is checked between ticks, so a requested shutdown always lets the
    /// current tick finish.
    pub fn run(&mut self, publisher: &Publisher, stop: &AtomicBool) -> FleetStats {
        let total_ticks = self.config.total_ticks();
        let tick_budget = Duration::from_secs_f64(self.config.tick_seconds);
        info!(
            "Starting simulation for {} vehicle(s) across {} region(s): {} tick(s) of {}s",
            self.vehicles.len(),
            self.active_regions(),
            total_ticks,
            self.config.tick_seconds
        );

        for _ in 0..total_ticks {
            if stop.load(Ordering::SeqCst) {
                warn!("Shutdown requested, stopping after tick {}", self.tick);
                break;
            }

            let started = Instant::now();
            for snapshot in self.step() {
                if let Err(err) = publisher.publish(&snapshot) {
                    self.stats.publish_rejections += 1;
                    warn!(
                        "Event for vehicle {} not published: {}",
                        snapshot.vehicle_id, err
                    );
                }
            }

            if self.tick % self.config.progress_every_ticks == 0 {
                self.log_progress();
            }

            if self.config.realtime && self.tick < total_ticks {
                if let Some(rest) = tick_budget.checked_sub(started.elapsed()) {
                    std::thread::sleep(rest);
                }
            }
        }

        self.stats.clone()
    }

    pub fn log_progress(&self) {
        let counts = self.state_counts();
        info!(
            "--- After tick {} ({:.1}s simulated time) --- available={} in_trip={} paused={} out_of_service={}",
            self.tick,
            self.stats.simulated_secs,
            counts.available,
            counts.in_trip,
            counts.paused,
            counts.out_of_service
        );
    }
}
