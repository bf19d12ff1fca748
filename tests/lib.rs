// Integration tests test your crate's public API. They only have access to items
// in your crate that are marked pub. See the Cargo Targets page of the Cargo Book
// for more information.
//
//   https://doc.rust-lang.org/cargo/reference/cargo-targets.html#integration-tests
//

use patient_flow_simulator::*;

// Topology loading and validation
mod topology_validation_tests;

// Run lifecycle and audit output
mod audit_log_tests;

// Command line and configuration
mod cli_argument_parsing_tests;

#[test]
fn test_core_id_types() {
    let ids = IdGenerator::new();
    let first = ids.next_id();
    let second = ids.next_id();

    // Identifiers are sequential and never reused
    assert_ne!(first, second);
    assert_eq!(second.value(), first.value() + 1);

    // Test string formatting
    assert_eq!(first.to_string(), "000001");
    assert!(RunId::new().to_string().starts_with("RUN_"));
    assert_ne!(RunId::new(), RunId::new());
    assert_eq!(StateId(3).to_string(), "STATE_3");
}

#[test]
fn test_enum_types() {
    for event in EventKind::ALL {
        assert!(!event.to_string().is_empty());
        assert_eq!(EventKind::from_label(&event.to_string()).unwrap(), Some(event));
    }

    let statuses = [RunStatus::Idle, RunStatus::Running, RunStatus::Draining, RunStatus::Stopped];
    for status in &statuses {
        assert!(!status.to_string().is_empty());
    }
    assert!(RunStatus::Stopped.is_terminal());
    assert!(!RunStatus::Draining.is_terminal());

    let reasons = [BlockReason::TargetFull, BlockReason::SourceEmpty, BlockReason::MissingState];
    for reason in &reasons {
        assert!(!reason.to_string().is_empty());
    }
}

#[test]
fn test_serialization_roundtrip() {
    let run_id = RunId::new();
    let json = serde_json::to_string(&run_id).unwrap();
    assert!(json.contains("RUN_"));
    let deserialized: RunId = serde_json::from_str(&json).unwrap();
    assert_eq!(run_id, deserialized);

    let status = RunStatus::Draining;
    let json = serde_json::to_string(&status).unwrap();
    assert_eq!(json, "\"DRAINING\"");
    let deserialized: RunStatus = serde_json::from_str(&json).unwrap();
    assert_eq!(status, deserialized);
}

#[test]
fn test_simulation_is_created_idle() {
    let definition = TopologyDefinition::new("Clinic", "Waiting Room", "Waiting Room")
        .with_state("Waiting Room", 2)
        .with_transition(TransitionDefinition::ingress("Waiting Room", 1.0, 1.0))
        .with_transition(TransitionDefinition::egress("Waiting Room", 1.0, 1.0));

    let simulation =
        Simulation::from_definition(&definition, SimulationConfig::default(), Collaborators::default())
            .unwrap();

    assert_eq!(simulation.status(), RunStatus::Idle);
    assert_eq!(simulation.topology().name(), "Clinic");
    assert_eq!(simulation.population().admitted(), 0);
    assert!(simulation.audit_log().location().is_none());

    let report = simulation.report();
    assert_eq!(report.status, RunStatus::Idle);
    assert_eq!(report.remaining, 0);
}

#[test]
fn test_invalid_config_rejected_on_creation() {
    let definition = TopologyDefinition::new("Clinic", "A", "A")
        .with_state("A", 1)
        .with_transition(TransitionDefinition::ingress("A", 1.0, 1.0))
        .with_transition(TransitionDefinition::egress("A", 1.0, 1.0));
    let config = SimulationConfig { time_unit_secs: -1.0, ..Default::default() };

    let error = Simulation::from_definition(&definition, config, Collaborators::default()).unwrap_err();
    assert!(matches!(error, SimulationError::InvalidConfig(_)));
}
