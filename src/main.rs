// Patient Flow Simulator - Main Entry Point
//
// You can run it via Cargo:
//
// ```console
// $ cargo build --release
// $ ./target/release/patient-flow-simulator --topology hospital.json
// ```
//
// Or with custom configuration:
//
// ```console
// $ ./target/release/patient-flow-simulator --topology hospital.json --simulation ER --time-multiplier 60 --verbose
// ```

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use clap::Parser;
use patient_flow_simulator::simulation::{
    ChannelObserver, Collaborators, LoggingConfig, Simulation, SimulationReport,
};
use patient_flow_simulator::topology::{ConfigurationFile, Topology};
use patient_flow_simulator::types::config::CliArgs;
use patient_flow_simulator::types::SimulationConfig;
use patient_flow_simulator::FileSink;
use std::process;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Parse CLI arguments first to check for special flags
    let args = CliArgs::parse();

    // Handle special CLI flags that don't require full initialization
    if args.print_config {
        match SimulationConfig::default().print_json() {
            Ok(json) => {
                println!("{}", json);
                return;
            }
            Err(e) => {
                eprintln!("Failed to serialize default configuration: {}", e);
                process::exit(1);
            }
        }
    }

    // Initialize logging based on CLI flags
    let logging_result = if args.debug {
        LoggingConfig::init_debug()
    } else if args.verbose {
        LoggingConfig::init_verbose()
    } else {
        // Default: minimal logging for normal users
        LoggingConfig::new().with_level(tracing::Level::WARN).init()
    };

    // Keep the guard alive so buffered file logs are flushed on exit
    let _guard = match logging_result {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            process::exit(1);
        }
    };

    info!("Starting Patient Flow Simulator");

    if let Err(e) = run(args).await {
        error!("Simulation failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }

    info!("Patient Flow Simulator completed successfully");
}

async fn run(args: CliArgs) -> Result<()> {
    let list_only = args.list_simulations;
    let dry_run = args.dry_run;

    // Load configuration from CLI arguments and optional config file
    let config =
        SimulationConfig::from_cli_args(args).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;
    info!("Configuration loaded and validated successfully");

    let topology_path = config
        .topology_path
        .clone()
        .ok_or_else(|| anyhow!("No topology file given (use --topology or topology_path)"))?;
    let file = ConfigurationFile::load(&topology_path)
        .with_context(|| format!("Failed to load topology file '{}'", topology_path))?;

    if list_only {
        eprintln!("Simulations in {}:", topology_path);
        for name in file.simulation_names() {
            eprintln!("  {}", name);
        }
        return Ok(());
    }

    let definition = file.select(config.simulation_name.as_deref())?;
    let topology = Topology::build(definition)
        .with_context(|| format!("Invalid topology '{}'", definition.name))?;

    // Handle dry run mode
    if dry_run {
        eprintln!("Configuration validation successful!");
        eprintln!("Dry run mode - simulation will not be executed.");
        print_configuration_summary(&config, &topology);
        return Ok(());
    }

    print_startup_banner(&config, &topology);

    let format = config
        .get_log_format()
        .map_err(|e| anyhow!("Invalid log format: {}", e))?;
    let sink = FileSink::create(&config.log_directory, topology.name(), format, Local::now())
        .with_context(|| format!("Failed to create audit log in '{}'", config.log_directory))?;

    let mut collaborators = Collaborators::seeded(sink, config.seed);
    if config.show_occupancy {
        let (observer, mut snapshots) = ChannelObserver::channel(config.snapshot_buffer);
        collaborators = collaborators.with_observer(observer);
        tokio::spawn(async move {
            while let Some(snapshot) = snapshots.recv().await {
                eprintln!("Occupancy: {}", snapshot);
            }
        });
    }

    let simulation = Simulation::new(topology, config.clone(), collaborators)?;
    simulation.start()?;
    eprintln!("Simulation {} started, press Ctrl+C to stop", simulation.run_id());

    let deadline = async {
        match config.max_duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };

    let mut status = simulation.subscribe_status();
    tokio::select! {
        result = status.wait_for(|status| status.is_terminal()) => {
            if result.is_err() {
                warn!("Status channel closed before the run stopped");
            }
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                bail!("Failed to listen for Ctrl+C: {}", e);
            }
            eprintln!("Stopping simulation...");
            simulation.stop();
        }
        _ = deadline => {
            eprintln!("Maximum duration reached, stopping simulation...");
            simulation.stop();
        }
    }

    let report = simulation.wait().await?;
    print_final_report(&report);

    Ok(())
}

/// Print startup banner and configuration summary
fn print_startup_banner(config: &SimulationConfig, topology: &Topology) {
    eprintln!("Patient Flow Simulator");
    eprintln!("======================");
    eprintln!("Entities moving through capacity-bounded states");
    eprintln!();

    print_configuration_summary(config, topology);
}

/// Print configuration summary
fn print_configuration_summary(config: &SimulationConfig, topology: &Topology) {
    eprintln!("Configuration:");
    eprintln!("  Time Multiplier: {}x", config.time_multiplier);
    eprintln!("  Time Unit: {}s", config.time_unit_secs);
    eprintln!("  Initial Admission: {}", config.admit_on_start);
    eprintln!("  Log Directory: {}", config.log_directory);
    eprintln!("  Log Format: {}", config.log_format);
    if let Some(seed) = config.seed {
        eprintln!("  Random Seed: {}", seed);
    }
    if let Some(secs) = config.max_duration_secs {
        eprintln!("  Max Duration: {}s", secs);
    }
    eprintln!();
    eprintln!("{}", topology);
}

/// Print the run report and where the audit log went
fn print_final_report(report: &SimulationReport) {
    eprintln!();
    eprintln!("{}", report);
    if let Some(path) = &report.audit_log {
        eprintln!();
        eprintln!("The output of the simulation was saved on '{}'", path.display());
    }
}
