//! Tests for loading and validating topology documents
//!
//! These tests go through the same path as the command line tool: parse a
//! JSON document, select a simulation, then build the validated topology.

use patient_flow_simulator::topology::{ConfigurationFile, Topology, TopologyError, TransitionKind};
use patient_flow_simulator::types::EventKind;

const HOSPITAL: &str = r#"{
    "simulations": [
        {
            "name": "Emergency",
            "states": [
                { "name": "Triage", "maxCapacity": 4, "stateID": 1 },
                { "name": "Radiology", "maxCapacity": 2, "stateID": 2 },
                { "name": "Discharge", "maxCapacity": 10, "stateID": 3 }
            ],
            "transitions": [
                { "source": null, "target": "Triage",
                  "event": "ADT_A01 - Admit/visit Notification", "probability": 0.9, "frequency": 6 },
                { "source": "Triage", "target": "Radiology",
                  "event": "ORM_O01 - General Order Message", "probability": 0.4, "frequency": 3 },
                { "source": "Radiology", "target": "Discharge",
                  "event": "ORU_R01 - Observation Result", "probability": 0.8, "frequency": 2 },
                { "source": "Triage", "target": "Discharge",
                  "probability": 0.6, "frequency": 2 },
                { "source": "Discharge", "target": null,
                  "event": "ADT_A03 - Discharge/end visit", "probability": 1.0, "frequency": 4 }
            ],
            "startState": "Triage",
            "endState": "Discharge"
        },
        {
            "name": "Broken",
            "states": [
                { "name": "Lobby", "maxCapacity": 4 },
                { "name": "Exit Hall", "maxCapacity": 4 }
            ],
            "transitions": [
                { "source": null, "target": "Lobby", "probability": 1.0, "frequency": 1 },
                { "source": "Exit Hall", "target": null, "probability": 1.0, "frequency": 1 }
            ],
            "startState": "Lobby",
            "endState": "Exit Hall"
        }
    ]
}"#;

/// Test building the full emergency pathway
#[test]
fn test_build_emergency_pathway() {
    let file = ConfigurationFile::from_json(HOSPITAL).unwrap();
    assert_eq!(file.simulation_names(), vec!["Emergency", "Broken"]);

    let topology = Topology::build(file.select(Some("Emergency")).unwrap()).unwrap();
    assert_eq!(topology.name(), "Emergency");
    assert_eq!(topology.states().len(), 3);
    assert_eq!(topology.transitions().len(), 5);
    assert_eq!(topology.start_state().name, "Triage");
    assert_eq!(topology.end_state().name, "Discharge");

    let ingress = topology.ingress().unwrap();
    assert!(matches!(ingress.kind, TransitionKind::Ingress { .. }));
    assert_eq!(ingress.event, Some(EventKind::AdtA01));
    assert_eq!(topology.describe(ingress), "Simulation Entry -> Triage");

    let events: Vec<Option<EventKind>> = topology.transitions().iter().map(|t| t.event).collect();
    assert_eq!(
        events,
        vec![
            Some(EventKind::AdtA01),
            Some(EventKind::OrmO01),
            Some(EventKind::OruR01),
            None,
            Some(EventKind::AdtA03),
        ]
    );

    assert_eq!(topology.egress_transitions().count(), 1);
    assert_eq!(topology.state_by_name("Radiology").unwrap().capacity, 2);
}

/// Test that a simulation whose end state cannot be reached is rejected
#[test]
fn test_unreachable_end_state_rejected() {
    let file = ConfigurationFile::from_json(HOSPITAL).unwrap();
    let result = Topology::build(file.select(Some("Broken")).unwrap());

    assert_eq!(
        result.unwrap_err(),
        TopologyError::Unreachable { start: "Lobby".to_string(), end: "Exit Hall".to_string() }
    );
}

/// Test that an event tag outside the catalogue is rejected
#[test]
fn test_unknown_event_rejected() {
    let document = HOSPITAL.replace("ORU_R01 - Observation Result", "SIU_S12");
    let file = ConfigurationFile::from_json(&document).unwrap();
    let result = Topology::build(file.select(None).unwrap());

    assert!(matches!(
        result,
        Err(TopologyError::UnknownEvent { transition: 2, ref label }) if label == "SIU_S12"
    ));
}

/// Test that a transition to a state that is not declared is rejected
#[test]
fn test_unknown_state_rejected() {
    let document = HOSPITAL.replace(r#""target": "Radiology""#, r#""target": "Cardiology""#);
    let file = ConfigurationFile::from_json(&document).unwrap();
    let result = Topology::build(file.select(None).unwrap());

    assert!(matches!(
        result,
        Err(TopologyError::UnknownState { transition: 1, ref state }) if state == "Cardiology"
    ));
}

/// Test that a probability above one is rejected
#[test]
fn test_probability_above_one_rejected() {
    let document = HOSPITAL.replace(r#""probability": 0.4"#, r#""probability": 1.4"#);
    let file = ConfigurationFile::from_json(&document).unwrap();
    let error = Topology::build(file.select(None).unwrap()).unwrap_err();

    assert_eq!(error, TopologyError::InvalidProbability { transition: 1, value: 1.4 });
    assert!(error.to_string().contains("must be between 0.0 and 1.0"));
}

/// Test that a malformed document does not parse
#[test]
fn test_malformed_document_rejected() {
    assert!(ConfigurationFile::from_json(r#"{ "simulations": [ { "name": 3 } ] }"#).is_err());
    assert!(ConfigurationFile::from_json("not json").is_err());
}
