mod support;

use chrono::{TimeZone, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::AtomicBool;

use fleet_sim::publisher::Publisher;
use fleet_sim::simulation::{
    Fleet, FleetConfig, PoiRegistry, PublishParams, SimError, StatusSnapshot, VehicleState,
};
use support::{city_registry, registry, FlakySink, RecordingSink};

fn config(regions: &[(&str, i64)], duration: i64) -> FleetConfig {
    FleetConfig {
        vehicles_per_region: regions
            .iter()
            .map(|(region, count)| (region.to_string(), *count))
            .collect(),
        duration_seconds: duration,
        tick_seconds: 1.0,
        seed: Some(7),
        realtime: false,
        ..FleetConfig::default()
    }
}

fn registries(regions: &[&str]) -> BTreeMap<String, PoiRegistry> {
    regions
        .iter()
        .map(|region| (region.to_string(), (*city_registry(region)).clone()))
        .collect()
}

fn quick_publish() -> PublishParams {
    PublishParams {
        max_retries: 1,
        retry_backoff_ms: 0,
        ..PublishParams::default()
    }
}

#[test]
fn test_fleet_spawns_configured_vehicles() {
    let fleet = Fleet::new(
        config(&[("north", 4), ("south", 3), ("empty", 0)], 10),
        registries(&["north", "south"]),
    )
    .unwrap();

    assert_eq!(fleet.len(), 7);
    assert_eq!(fleet.active_regions(), 2);
    assert_eq!(fleet.tick(), 0);
    assert_eq!(fleet.vehicles().filter(|v| v.region() == "north").count(), 4);
    let counts = fleet.state_counts();
    assert_eq!(counts.available, 7);
    assert_eq!(counts.total(), 7);
    for vehicle in fleet.vehicles() {
        let id = uuid::Uuid::parse_str(vehicle.id().as_str()).unwrap();
        assert_eq!(id.get_version_num(), 4);
        let registry = fleet.registry(vehicle.region()).unwrap();
        let parked = vehicle.parked_at_poi().unwrap();
        assert!(registry.get(&parked.name).is_some());
        assert!((70.0..=100.0).contains(&vehicle.fuel_percentage()));
    }
}

#[test]
fn test_step_emits_one_snapshot_per_vehicle() {
    let mut fleet = Fleet::new(config(&[("north", 5)], 10), registries(&["north"])).unwrap();

    for expected_tick in 0..3 {
        let snapshots = fleet.step();
        assert_eq!(snapshots.len(), 5);
        let ids: HashSet<_> = snapshots.iter().map(|s| s.vehicle_id.clone()).collect();
        assert_eq!(ids.len(), 5);
        assert!(snapshots.iter().all(|s| s.tick == expected_tick));
        assert!(snapshots.iter().all(|s| fleet.vehicle(&s.vehicle_id).is_some()));
    }
    assert_eq!(fleet.tick(), 3);
    assert_eq!(fleet.stats().snapshots, 15);
}

#[test]
fn test_region_without_enough_pois_is_skipped() {
    let mut registries = registries(&["north"]);
    registries.insert(
        "tiny".to_string(),
        (*registry("tiny", &[("lonely", -27.0, -58.0)])).clone(),
    );

    let fleet = Fleet::new(config(&[("north", 2), ("tiny", 3)], 10), registries).unwrap();
    assert_eq!(fleet.len(), 2);
    assert_eq!(fleet.skipped_regions(), ["tiny".to_string()]);
    assert!(fleet.vehicles().all(|v| v.region() == "north"));
}

#[test]
fn test_fleet_construction_errors() {
    let missing = Fleet::new(config(&[("nowhere", 2)], 10), registries(&["north"]));
    assert!(matches!(missing, Err(SimError::Config(_))));

    let mut only_tiny = BTreeMap::new();
    only_tiny.insert(
        "tiny".to_string(),
        (*registry("tiny", &[("lonely", -27.0, -58.0)])).clone(),
    );
    let unroutable = Fleet::new(config(&[("tiny", 2)], 10), only_tiny);
    assert!(matches!(unroutable, Err(SimError::Config(_))));

    let invalid = Fleet::new(config(&[("north", 2)], 0), registries(&["north"]));
    assert!(matches!(invalid, Err(SimError::Config(_))));
}

#[test]
fn test_run_publishes_every_snapshot() {
    let mut fleet = Fleet::new(config(&[("north", 3), ("south", 2)], 6), registries(&["north", "south"])).unwrap();
    let sink = RecordingSink::default();
    let publisher = Publisher::start(Box::new(sink.clone()), "uber-trips-raw", quick_publish()).unwrap();

    let stats = fleet.run(&publisher, &AtomicBool::new(false));
    let report = publisher.shutdown();

    assert_eq!(stats.ticks, 6);
    assert_eq!(stats.snapshots, 30);
    assert_eq!(stats.simulated_secs, 6.0);
    assert_eq!(report.delivered, 30);
    assert_eq!(report.dropped, 0);
    assert!(report.flushed);

    let records = sink.records();
    assert_eq!(records.len(), 30);
    for record in &records {
        assert_eq!(record.topic, "uber-trips-raw");
        let snapshot = StatusSnapshot::from_json(std::str::from_utf8(&record.payload).unwrap()).unwrap();
        assert_eq!(record.key.as_deref(), Some(snapshot.key()));
        assert!(snapshot.tick < 6);
    }
}

#[test]
fn test_run_survives_a_broken_sink() {
    let mut fleet = Fleet::new(config(&[("north", 2)], 3), registries(&["north"])).unwrap();
    let sink = FlakySink::failing(u32::MAX);
    let publisher = Publisher::start(Box::new(sink.clone()), "topic", quick_publish()).unwrap();

    let stats = fleet.run(&publisher, &AtomicBool::new(false));
    let report = publisher.shutdown();

    assert_eq!(stats.ticks, 3);
    assert_eq!(report.delivered, 0);
    assert_eq!(report.dropped, 6);
    assert_eq!(sink.attempts(), 12);
}

#[test]
fn test_stop_flag_ends_run_before_next_tick() {
    let mut fleet = Fleet::new(config(&[("north", 2)], 100), registries(&["north"])).unwrap();
    let sink = RecordingSink::default();
    let publisher = Publisher::start(Box::new(sink.clone()), "topic", quick_publish()).unwrap();

    let stats = fleet.run(&publisher, &AtomicBool::new(true));
    let report = publisher.shutdown();

    assert_eq!(stats.ticks, 0);
    assert_eq!(report.delivered, 0);
    assert!(sink.records().is_empty());
}

#[test]
fn test_same_seed_replays_the_same_run() {
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
    let run = || {
        let mut cfg = config(&[("north", 4), ("south", 4)], 50);
        cfg.vehicle.assign_probability = 0.5;
        let mut fleet = Fleet::new(cfg, registries(&["north", "south"])).unwrap();
        fleet.set_clock_start(start);
        let mut all = Vec::new();
        for _ in 0..50 {
            let mut snapshots = fleet.step();
            snapshots.sort_by(|a, b| a.vehicle_id.cmp(&b.vehicle_id));
            all.extend(snapshots);
        }
        (all, fleet.stats().clone())
    };

    let (first, first_stats) = run();
    let (second, second_stats) = run();
    assert_eq!(first, second);
    assert_eq!(first_stats, second_stats);
    assert!(first_stats.trips_started > 0);
    assert!(first.iter().any(|s| s.state == VehicleState::InTrip));
    assert_eq!(first[0].timestamp, start + chrono::Duration::seconds(1));
}
