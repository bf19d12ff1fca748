//! Tests for the audit log written to disk
//!
//! A short run writes through a real [`FileSink`] into a temporary directory,
//! then the file is read back in both formats.

use chrono::{Local, TimeZone, Utc};
use patient_flow_simulator::events::{FileSink, LogRecord};
use patient_flow_simulator::simulation::{Collaborators, Simulation};
use patient_flow_simulator::topology::{TopologyDefinition, TransitionDefinition};
use patient_flow_simulator::types::{EventKind, LogAction, LogFormat, SimulationConfig};
use std::fs;

fn admission_and_discharge() -> TopologyDefinition {
    TopologyDefinition::new("Day Clinic", "Consult", "Consult")
        .with_state("Consult", 3)
        .with_transition(TransitionDefinition::ingress("Consult", 1.0, 60.0).with_event(EventKind::AdtA01))
        .with_transition(TransitionDefinition::egress("Consult", 1.0, 60.0).with_event(EventKind::AdtA03))
}

fn config() -> SimulationConfig {
    SimulationConfig {
        seed: Some(5),
        simulated_start: Some(Utc.with_ymd_and_hms(2024, 6, 3, 14, 30, 0).unwrap()),
        ..Default::default()
    }
}

async fn run_with_sink(sink: FileSink) -> std::path::PathBuf {
    let collaborators = Collaborators::seeded(sink, Some(5));
    let simulation =
        Simulation::from_definition(&admission_and_discharge(), config(), collaborators).unwrap();

    simulation.start().unwrap();
    let report = simulation.wait().await.unwrap();
    assert!(!report.audit_sink_failed);
    assert_eq!(report.audit_records, 2);
    report.audit_log.unwrap()
}

/// Test the text audit file of a complete run
#[tokio::test(start_paused = true)]
async fn test_text_audit_file() {
    let dir = tempfile::tempdir().unwrap();
    let started = Local.with_ymd_and_hms(2024, 6, 3, 14, 30, 0).unwrap();
    let sink = FileSink::create(dir.path(), "Day Clinic", LogFormat::Text, started).unwrap();

    let path = run_with_sink(sink).await;
    assert_eq!(path, dir.path().join("Day Clinic").join("Day Clinic_20240603_143000.txt"));

    let content = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();

    assert!(lines[0].starts_with("2024-06-03 14:30:00 - Added "));
    assert!(lines[0].ends_with(" to Consult"));
    assert_eq!(
        lines[1],
        "2024-06-03 14:30:00 - HL7 Event: ADT_A01 - Admit/visit Notification"
    );
    assert!(lines[2].starts_with("MSH|"));
    assert!(content.contains("2024-06-03 14:30:01 - Removed "));
    assert!(content.contains("HL7 Event: ADT_A03 - Discharge/End Visit"));
}

/// Test the JSON Lines audit file of a complete run
#[tokio::test(start_paused = true)]
async fn test_json_lines_audit_file() {
    let dir = tempfile::tempdir().unwrap();
    let sink = FileSink::create(dir.path(), "Day Clinic", LogFormat::Json, Local::now()).unwrap();

    let path = run_with_sink(sink).await;
    assert_eq!(path.extension().unwrap(), "jsonl");

    let records: Vec<LogRecord> = fs::read_to_string(&path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].action, LogAction::Entered);
    assert_eq!(records[0].target.as_deref(), Some("Consult"));
    assert_eq!(records[1].action, LogAction::Removed);
    assert_eq!(records[1].source.as_deref(), Some("Consult"));
    assert_eq!(records[0].entity_id, records[1].entity_id);
    assert_eq!(records[1].event, Some(EventKind::AdtA03));
}

/// Test that an unwritable log directory is reported before anything runs
#[test]
fn test_unwritable_log_directory() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-directory");
    fs::write(&blocker, "").unwrap();

    let result = FileSink::create(&blocker, "Day Clinic", LogFormat::Text, Local::now());
    assert!(result.is_err());
}
