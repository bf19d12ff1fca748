//! Configuration structures for the flow simulator
//!
//! This module contains the command line interface, the partial configuration
//! file and the merged [`SimulationConfig`] with its validation rules.

use super::LogFormat;
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Defaults shared by the CLI help text and [`SimulationConfig::default`]
pub mod defaults {
    /// Simulated seconds that pass per wall-clock second
    pub const TIME_MULTIPLIER: f64 = 1.0;

    /// Length of the simulated time unit that transition frequencies refer to
    pub const TIME_UNIT_SECS: f64 = 60.0;

    /// How often the termination monitor re-checks the population
    pub const MONITOR_INTERVAL_MS: u64 = 250;

    /// Bound of the occupancy snapshot channel
    pub const SNAPSHOT_BUFFER: usize = 64;

    /// Root directory for audit log files
    pub const LOG_DIRECTORY: &str = "Simulation Logs";
}

/// Command line arguments structure
#[derive(Debug, Clone, Parser)]
#[command(
    name = "patient-flow-simulator",
    version = "0.1.0",
    about = "Patient Flow Simulator - Moves entities through capacity-bounded states on probabilistic schedules",
    long_about = "Runs a discrete-event simulation in which entities enter a network of capacity-bounded states, move along independently scheduled probabilistic transitions and eventually leave. Every state change is written to an audit log.

EXAMPLES:
    # Run the first simulation of a topology file
    patient-flow-simulator --topology hospital.json

    # Pick a simulation by name and run it ten times faster
    patient-flow-simulator --topology hospital.json --simulation ER --time-multiplier 10

    # List the simulations defined in a topology file
    patient-flow-simulator --topology hospital.json --list-simulations

    # Generate configuration template
    patient-flow-simulator --print-config > my-config.json

    # Validate configuration and topology without running
    patient-flow-simulator --config my-config.json --topology hospital.json --dry-run

CONFIGURATION:
    Configuration can be provided via:
    1. Command line arguments (highest priority)
    2. Configuration file (--config flag)
    3. Default values (lowest priority)

    Supported configuration file formats: JSON (.json)

    Use --print-config to generate a template configuration file."
)]
pub struct CliArgs {
    /// Configuration file path (JSON format)
    #[arg(
        short,
        long,
        help = "Configuration file path (JSON format)",
        long_help = "Path to a JSON configuration file. CLI arguments will override file settings."
    )]
    pub config: Option<String>,

    /// Topology file path (JSON format)
    #[arg(
        short,
        long,
        help = "Topology file path (JSON format)",
        long_help = "Path to a JSON file describing one simulation or a {\"simulations\": [...]} list."
    )]
    pub topology: Option<String>,

    /// Name of the simulation to run when the topology file holds several
    #[arg(short, long, help = "Simulation to run (defaults to the first one)")]
    pub simulation: Option<String>,

    /// List simulations in the topology file and exit
    #[arg(long, help = "List simulations in the topology file and exit")]
    pub list_simulations: bool,

    /// Simulated seconds per wall-clock second
    #[arg(
        long,
        help = "Simulated seconds per wall-clock second",
        long_help = "Acceleration of the simulated clock. Trigger periods shrink by this factor. Must be greater than 0. Default: 1.0"
    )]
    pub time_multiplier: Option<f64>,

    /// Length of the simulated time unit in seconds
    #[arg(
        long,
        help = "Simulated time unit in seconds",
        long_help = "Transition frequencies count attempts per simulated time unit. Must be greater than 0. Default: 60 (per minute)"
    )]
    pub time_unit_secs: Option<f64>,

    /// Random seed for reproducible results
    #[arg(long, help = "Random seed for reproducible results")]
    pub seed: Option<u64>,

    /// Interval between termination checks in milliseconds
    #[arg(long, help = "Termination monitor interval in milliseconds")]
    pub monitor_interval_ms: Option<u64>,

    /// Root directory for audit log files
    #[arg(long, help = "Directory for audit log files")]
    pub log_directory: Option<String>,

    /// Audit log format
    #[arg(
        long,
        help = "Audit log format (text or json)",
        long_help = "Format of the audit log file. Supported formats: text, json. Default: text"
    )]
    pub log_format: Option<String>,

    /// Origin of the simulated clock (RFC 3339)
    #[arg(long, help = "Simulated start time (RFC 3339), defaults to now")]
    pub simulated_start: Option<DateTime<Utc>>,

    /// Wall-clock limit after which the run is cancelled
    #[arg(long, help = "Cancel the run after this many wall-clock seconds")]
    pub max_duration_secs: Option<u64>,

    /// Print every occupancy snapshot
    #[arg(long, help = "Print state occupancy after every successful firing")]
    pub show_occupancy: bool,

    /// Skip the admission performed when the run starts
    #[arg(long, help = "Do not admit an entity when the run starts")]
    pub no_initial_admission: bool,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(short, long, help = "Enable debug logging")]
    pub debug: bool,

    /// Dry run mode - validate configuration without running simulation
    #[arg(long, help = "Validate configuration and topology without running simulation")]
    pub dry_run: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in JSON format and exit")]
    pub print_config: bool,
}

/// Configuration file structure (allows partial configuration)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    /// Simulated seconds per wall-clock second
    pub time_multiplier: Option<f64>,

    /// Length of the simulated time unit in seconds
    pub time_unit_secs: Option<f64>,

    /// Random seed for reproducible results
    pub seed: Option<u64>,

    /// Admit one entity when the run starts
    pub admit_on_start: Option<bool>,

    /// Interval between termination checks in milliseconds
    pub monitor_interval_ms: Option<u64>,

    /// Root directory for audit log files
    pub log_directory: Option<String>,

    /// Audit log format
    pub log_format: Option<String>,

    /// Print every occupancy snapshot
    pub show_occupancy: Option<bool>,

    /// Bound of the occupancy snapshot channel
    pub snapshot_buffer: Option<usize>,

    /// Origin of the simulated clock
    pub simulated_start: Option<DateTime<Utc>>,

    /// Wall-clock limit after which the run is cancelled
    pub max_duration_secs: Option<u64>,

    /// Topology file path
    pub topology_path: Option<String>,

    /// Simulation to run from the topology file
    pub simulation_name: Option<String>,
}

/// Configuration for a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Simulated seconds per wall-clock second
    pub time_multiplier: f64,

    /// Length of the simulated time unit in seconds
    pub time_unit_secs: f64,

    /// Random seed for reproducible results
    pub seed: Option<u64>,

    /// Admit one entity when the run starts, bypassing the probability gate
    pub admit_on_start: bool,

    /// Interval between termination checks in milliseconds
    pub monitor_interval_ms: u64,

    /// Root directory for audit log files
    pub log_directory: String,

    /// Audit log format
    pub log_format: String,

    /// Print every occupancy snapshot
    pub show_occupancy: bool,

    /// Bound of the occupancy snapshot channel
    pub snapshot_buffer: usize,

    /// Origin of the simulated clock, `None` means the wall clock at start
    pub simulated_start: Option<DateTime<Utc>>,

    /// Wall-clock limit after which the run is cancelled
    pub max_duration_secs: Option<u64>,

    /// Topology file path
    pub topology_path: Option<String>,

    /// Simulation to run from the topology file
    pub simulation_name: Option<String>,
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// Configuration file read error
    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    /// JSON parsing error
    #[error("Failed to parse JSON configuration: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Unsupported configuration file format
    #[error("Unsupported configuration file format: {0} (supported: .json)")]
    UnsupportedFormat(String),

    /// Requested simulation is not in the topology file
    #[error("Simulation '{0}' not found in topology file")]
    SimulationNotFound(String),
}

/// Validation errors for simulation configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    /// Time multiplier is not a positive finite number
    #[error("Time multiplier must be a positive number, got {0}")]
    InvalidTimeMultiplier(f64),

    /// Time unit is not a positive finite number
    #[error("Time unit must be a positive number of seconds, got {0}")]
    InvalidTimeUnit(f64),

    /// Monitor interval is zero
    #[error("Monitor interval must be greater than 0 ms, got {0}")]
    InvalidMonitorInterval(u64),

    /// Snapshot buffer is zero
    #[error("Snapshot buffer must be greater than 0, got {0}")]
    InvalidSnapshotBuffer(usize),

    /// Log format is not recognised
    #[error("Invalid log format: {0} (supported: text, json)")]
    InvalidLogFormat(String),
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            time_multiplier: defaults::TIME_MULTIPLIER,
            time_unit_secs: defaults::TIME_UNIT_SECS,
            seed: None,
            admit_on_start: true,
            monitor_interval_ms: defaults::MONITOR_INTERVAL_MS,
            log_directory: defaults::LOG_DIRECTORY.to_string(),
            log_format: "text".to_string(),
            show_occupancy: false,
            snapshot_buffer: defaults::SNAPSHOT_BUFFER,
            simulated_start: None,
            max_duration_secs: None,
            topology_path: None,
            simulation_name: None,
        }
    }
}

impl SimulationConfig {
    /// Create a new configuration from command line arguments and optional config file
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::from_cli_args(args)
    }

    /// Create configuration from parsed CLI arguments
    pub fn from_cli_args(args: CliArgs) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(config_path) = &args.config {
            config = Self::from_file(config_path)?;
        }

        // CLI takes precedence over the file
        Self::apply_cli_overrides(&mut config, args);

        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let content = fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => {
                let config_file: ConfigFile = serde_json::from_str(&content)?;
                Ok(Self::from_config_file(config_file))
            }
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => Err(ConfigError::UnsupportedFormat("no extension".to_string())),
        }
    }

    /// Create configuration from a config file, merging with defaults
    fn from_config_file(config_file: ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            time_multiplier: config_file.time_multiplier.unwrap_or(defaults.time_multiplier),
            time_unit_secs: config_file.time_unit_secs.unwrap_or(defaults.time_unit_secs),
            seed: config_file.seed.or(defaults.seed),
            admit_on_start: config_file.admit_on_start.unwrap_or(defaults.admit_on_start),
            monitor_interval_ms: config_file
                .monitor_interval_ms
                .unwrap_or(defaults.monitor_interval_ms),
            log_directory: config_file.log_directory.unwrap_or(defaults.log_directory),
            log_format: config_file.log_format.unwrap_or(defaults.log_format),
            show_occupancy: config_file.show_occupancy.unwrap_or(defaults.show_occupancy),
            snapshot_buffer: config_file.snapshot_buffer.unwrap_or(defaults.snapshot_buffer),
            simulated_start: config_file.simulated_start.or(defaults.simulated_start),
            max_duration_secs: config_file.max_duration_secs.or(defaults.max_duration_secs),
            topology_path: config_file.topology_path.or(defaults.topology_path),
            simulation_name: config_file.simulation_name.or(defaults.simulation_name),
        }
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(config: &mut Self, args: CliArgs) {
        if let Some(value) = args.time_multiplier {
            config.time_multiplier = value;
        }
        if let Some(value) = args.time_unit_secs {
            config.time_unit_secs = value;
        }
        if let Some(value) = args.seed {
            config.seed = Some(value);
        }
        if let Some(value) = args.monitor_interval_ms {
            config.monitor_interval_ms = value;
        }
        if let Some(value) = args.log_directory {
            config.log_directory = value;
        }
        if let Some(value) = args.log_format {
            config.log_format = value;
        }
        if let Some(value) = args.simulated_start {
            config.simulated_start = Some(value);
        }
        if let Some(value) = args.max_duration_secs {
            config.max_duration_secs = Some(value);
        }
        if let Some(value) = args.topology {
            config.topology_path = Some(value);
        }
        if let Some(value) = args.simulation {
            config.simulation_name = Some(value);
        }

        // Flags only ever switch behaviour on relative to the file
        if args.show_occupancy {
            config.show_occupancy = true;
        }
        if args.no_initial_admission {
            config.admit_on_start = false;
        }
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Print configuration as JSON
    pub fn print_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !self.time_multiplier.is_finite() || self.time_multiplier <= 0.0 {
            return Err(ConfigValidationError::InvalidTimeMultiplier(self.time_multiplier));
        }

        if !self.time_unit_secs.is_finite() || self.time_unit_secs <= 0.0 {
            return Err(ConfigValidationError::InvalidTimeUnit(self.time_unit_secs));
        }

        if self.monitor_interval_ms == 0 {
            return Err(ConfigValidationError::InvalidMonitorInterval(self.monitor_interval_ms));
        }

        if self.snapshot_buffer == 0 {
            return Err(ConfigValidationError::InvalidSnapshotBuffer(self.snapshot_buffer));
        }

        self.get_log_format().map_err(|_| {
            ConfigValidationError::InvalidLogFormat(self.log_format.clone())
        })?;

        Ok(())
    }

    /// Get the audit log format as an enum value
    pub fn get_log_format(&self) -> Result<LogFormat, String> {
        self.log_format.parse()
    }

    /// Monitor interval as a duration
    pub fn monitor_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.monitor_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.time_multiplier, 1.0);
        assert_eq!(config.time_unit_secs, 60.0);
        assert!(config.admit_on_start);
        assert_eq!(config.get_log_format().unwrap(), LogFormat::Text);
    }

    #[test]
    fn test_invalid_multiplier_rejected() {
        let config = SimulationConfig { time_multiplier: 0.0, ..Default::default() };
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidTimeMultiplier(_))
        ));

        let config = SimulationConfig { time_multiplier: f64::NAN, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_format_rejected() {
        let config = SimulationConfig { log_format: "csv".to_string(), ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigValidationError::InvalidLogFormat(_))));
    }

    #[test]
    fn test_config_file_merges_with_defaults() {
        let file: ConfigFile =
            serde_json::from_str(r#"{ "time_multiplier": 30.0, "seed": 7 }"#).unwrap();
        let config = SimulationConfig::from_config_file(file);
        assert_eq!(config.time_multiplier, 30.0);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.time_unit_secs, defaults::TIME_UNIT_SECS);
        assert_eq!(config.log_directory, defaults::LOG_DIRECTORY);
    }

    #[test]
    fn test_cli_overrides_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "time_multiplier": 30.0, "log_format": "json" }"#).unwrap();

        let args = CliArgs::try_parse_from([
            "test",
            "--config",
            path.to_str().unwrap(),
            "--time-multiplier",
            "120",
            "--no-initial-admission",
        ])
        .unwrap();

        let config = SimulationConfig::from_cli_args(args).unwrap();
        assert_eq!(config.time_multiplier, 120.0);
        assert_eq!(config.log_format, "json");
        assert!(!config.admit_on_start);
    }

    #[test]
    fn test_unsupported_config_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "time_multiplier = 2.0").unwrap();
        assert!(matches!(
            SimulationConfig::from_file(&path),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }
}
