//! Tests for CLI argument parsing functionality
//!
//! These tests verify that command line arguments are properly parsed and
//! merged with configuration files and defaults.

use clap::Parser;
use patient_flow_simulator::types::config::{defaults, CliArgs, ConfigError, SimulationConfig};
use patient_flow_simulator::types::LogFormat;
use std::fs;

/// Test that no arguments yields the defaults
#[test]
fn test_defaults_without_arguments() {
    let args = CliArgs::try_parse_from(["test"]).unwrap();
    assert!(args.topology.is_none());
    assert!(!args.list_simulations);
    assert!(!args.show_occupancy);

    let config = SimulationConfig::from_cli_args(args).unwrap();
    assert_eq!(config.time_multiplier, defaults::TIME_MULTIPLIER);
    assert_eq!(config.time_unit_secs, defaults::TIME_UNIT_SECS);
    assert_eq!(config.monitor_interval_ms, defaults::MONITOR_INTERVAL_MS);
    assert_eq!(config.log_directory, defaults::LOG_DIRECTORY);
    assert!(config.admit_on_start);
    assert!(config.validate().is_ok());
}

/// Test parsing of the topology and simulation selection arguments
#[test]
fn test_topology_selection_arguments() {
    let args = CliArgs::try_parse_from([
        "test",
        "--topology",
        "hospital.json",
        "--simulation",
        "ER",
        "--list-simulations",
    ])
    .unwrap();

    assert_eq!(args.topology.as_deref(), Some("hospital.json"));
    assert_eq!(args.simulation.as_deref(), Some("ER"));
    assert!(args.list_simulations);

    let config = SimulationConfig::from_cli_args(args).unwrap();
    assert_eq!(config.topology_path.as_deref(), Some("hospital.json"));
    assert_eq!(config.simulation_name.as_deref(), Some("ER"));
}

/// Test parsing of the timing arguments
#[test]
fn test_timing_arguments() {
    let args = CliArgs::try_parse_from([
        "test",
        "--time-multiplier",
        "60",
        "--time-unit-secs",
        "3600",
        "--monitor-interval-ms",
        "50",
        "--max-duration-secs",
        "120",
        "--simulated-start",
        "2024-03-01T09:00:00Z",
    ])
    .unwrap();
    let config = SimulationConfig::from_cli_args(args).unwrap();

    assert_eq!(config.time_multiplier, 60.0);
    assert_eq!(config.time_unit_secs, 3600.0);
    assert_eq!(config.monitor_interval_ms, 50);
    assert_eq!(config.max_duration_secs, Some(120));
    assert_eq!(config.simulated_start.unwrap().to_rfc3339(), "2024-03-01T09:00:00+00:00");
}

/// Test that invalid numeric values are rejected by clap or by validation
#[test]
fn test_invalid_values_rejected() {
    assert!(CliArgs::try_parse_from(["test", "--time-multiplier", "fast"]).is_err());
    assert!(CliArgs::try_parse_from(["test", "--seed", "-1"]).is_err());

    let args = CliArgs::try_parse_from(["test", "--time-multiplier", "0"]).unwrap();
    let config = SimulationConfig::from_cli_args(args).unwrap();
    assert!(config.validate().is_err());

    let args = CliArgs::try_parse_from(["test", "--log-format", "xml"]).unwrap();
    let config = SimulationConfig::from_cli_args(args).unwrap();
    assert!(config.validate().is_err());
}

/// Test the switch-like flags
#[test]
fn test_flags() {
    let args = CliArgs::try_parse_from([
        "test",
        "--show-occupancy",
        "--no-initial-admission",
        "--dry-run",
        "--verbose",
    ])
    .unwrap();
    assert!(args.dry_run);
    assert!(args.verbose);
    assert!(!args.debug);

    let config = SimulationConfig::from_cli_args(args).unwrap();
    assert!(config.show_occupancy);
    assert!(!config.admit_on_start);
}

/// Test that the configuration file is read and CLI arguments win over it
#[test]
fn test_config_file_with_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.json");
    fs::write(
        &path,
        r#"{
            "time_multiplier": 30.0,
            "seed": 9,
            "log_format": "json",
            "admit_on_start": false,
            "topology_path": "from-file.json"
        }"#,
    )
    .unwrap();

    let args = CliArgs::try_parse_from([
        "test",
        "--config",
        path.to_str().unwrap(),
        "--seed",
        "11",
        "--topology",
        "from-cli.json",
    ])
    .unwrap();
    let config = SimulationConfig::from_cli_args(args).unwrap();

    assert_eq!(config.time_multiplier, 30.0);
    assert_eq!(config.seed, Some(11));
    assert_eq!(config.get_log_format().unwrap(), LogFormat::Json);
    assert!(!config.admit_on_start);
    assert_eq!(config.topology_path.as_deref(), Some("from-cli.json"));
}

/// Test that a missing configuration file is reported
#[test]
fn test_missing_config_file() {
    let args = CliArgs::try_parse_from(["test", "--config", "missing/run.json"]).unwrap();
    assert!(matches!(
        SimulationConfig::from_cli_args(args),
        Err(ConfigError::FileNotFound(_))
    ));
}

/// Test that the printed default configuration loads back unchanged
#[test]
fn test_saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("saved.json");

    let config = SimulationConfig { time_multiplier: 12.5, seed: Some(3), ..Default::default() };
    config.save_to_file(&path).unwrap();

    let loaded = SimulationConfig::from_file(&path).unwrap();
    assert_eq!(loaded.time_multiplier, 12.5);
    assert_eq!(loaded.seed, Some(3));
    assert!(config.print_json().unwrap().contains("\"time_unit_secs\": 60.0"));
}
