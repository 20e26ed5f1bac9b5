//! Configuration loading and validation tests

use std::path::PathBuf;

use fleet_sim::simulation::{FleetConfig, RecoveryPolicy, SimError, SinkKind};

#[test]
fn test_defaults_are_valid() {
    let config = FleetConfig::default();
    config.validate().unwrap();
    assert_eq!(config.topic_name, "uber-trips-raw");
    assert_eq!(config.vehicles_per_region.get("corrientes"), Some(&50));
    assert_eq!(config.duration_seconds, 120);
    assert_eq!(config.tick_seconds, 1.0);
    assert_eq!(config.total_ticks(), 120);
    assert_eq!(config.total_vehicles(), 50);
}

#[test]
fn test_partial_json_keeps_defaults() {
    let config = FleetConfig::from_json(
        r#"{
            "topic_name": "telemetry",
            "vehicles_per_region": {"corrientes": 10, "mendoza": 5},
            "duration_seconds": 30,
            "tick_seconds": 0.5,
            "sink": "stdout",
            "vehicle": {"recovery": {"after_ticks": 12}, "speed_range_kph": [20, 40]}
        }"#,
    )
    .unwrap();

    config.validate().unwrap();
    assert_eq!(config.topic_name, "telemetry");
    assert_eq!(config.broker_address, "localhost:9092");
    assert_eq!(config.total_vehicles(), 15);
    assert_eq!(config.total_ticks(), 60);
    assert_eq!(config.sink, SinkKind::Stdout);
    assert_eq!(config.poi_dir, PathBuf::from("data"));
    assert_eq!(config.vehicle.recovery, RecoveryPolicy::AfterTicks(12));
    assert_eq!(config.vehicle.speed_range_kph, (20.0, 40.0));
    assert_eq!(config.vehicle.low_fuel_threshold, 20.0);
}

#[test]
fn test_non_positive_duration_fails_fast() {
    for duration in [0, -10] {
        let config = FleetConfig {
            duration_seconds: duration,
            ..FleetConfig::default()
        };
        assert!(matches!(config.validate(), Err(SimError::Config(_))));
    }
}

#[test]
fn test_negative_vehicle_count_fails_fast() {
    let mut config = FleetConfig::default();
    config.vehicles_per_region.insert("mendoza".to_string(), -1);
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("mendoza"));
}

#[test]
fn test_invalid_tick_and_vehicle_params_rejected() {
    for tick in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        let config = FleetConfig {
            tick_seconds: tick,
            ..FleetConfig::default()
        };
        assert!(config.validate().is_err(), "accepted tick {}", tick);
    }

    let mut config = FleetConfig::default();
    config.vehicle.speed_range_kph = (80.0, 30.0);
    assert!(config.validate().is_err());

    let mut config = FleetConfig::default();
    config.vehicle.recovery = RecoveryPolicy::Probability(2.0);
    assert!(config.validate().is_err());

    let mut config = FleetConfig::default();
    config.vehicle.refuel_target = 10.0;
    assert!(config.validate().is_err());

    let mut config = FleetConfig::default();
    config.vehicle.max_passengers = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_tick_count_covers_duration() {
    let config = FleetConfig {
        duration_seconds: 10,
        tick_seconds: 3.0,
        ..FleetConfig::default()
    };
    assert_eq!(config.total_ticks(), 3);

    let config = FleetConfig {
        duration_seconds: 1,
        tick_seconds: 60.0,
        ..FleetConfig::default()
    };
    assert_eq!(config.total_ticks(), 1);
}

#[test]
fn test_load_reports_missing_and_malformed_files() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("fleet.json");
    assert!(matches!(
        FleetConfig::load(&missing),
        Err(SimError::Io { .. })
    ));

    std::fs::write(&missing, "{ \"duration_seconds\": \"long\" }").unwrap();
    assert!(matches!(
        FleetConfig::load(&missing),
        Err(SimError::Config(_))
    ));

    std::fs::write(&missing, "{ \"duration_seconds\": 5, \"seed\": 9 }").unwrap();
    let config = FleetConfig::load(&missing).unwrap();
    assert_eq!(config.duration_seconds, 5);
    assert_eq!(config.seed, Some(9));
}

#[test]
fn test_publish_timeouts_configurable() {
    let config = FleetConfig::default();
    assert_eq!(config.publish.message_timeout_ms, 5000);
    assert_eq!(config.vehicle.speed_jitter_kph, 1.0);
    assert_eq!(config.vehicle.speed_limits_kph, (10.0, 120.0));

    let config = FleetConfig::from_json(
        r#"{"publish": {"message_timeout_ms": 750}, "vehicle": {"speed_jitter_kph": 0}}"#,
    )
    .unwrap();
    assert_eq!(config.publish.message_timeout_ms, 750);
    assert_eq!(config.publish.max_retries, 5);
    assert_eq!(config.vehicle.speed_jitter_kph, 0.0);
    config.validate().unwrap();

    let mut config = FleetConfig::default();
    config.vehicle.speed_jitter_kph = -1.0;
    assert!(config.validate().is_err());
}

#[test]
fn test_sample_config_runs_on_a_default_build() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fleet.json");
    let config = FleetConfig::load(&path).unwrap();
    config.validate().unwrap();
    assert_eq!(config.sink, SinkKind::Stdout);
    assert!(fleet_sim::publisher::open_sink(&config).is_ok());
}
