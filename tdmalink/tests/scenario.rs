use std::fs::File;
use std::path::Path;

use tdmalink::scenario::{Scenario, Summary, TerminalSummary};
use tdmalink::{ObservedEvent, Recorder};

fn run_sample() -> (Summary, Vec<ObservedEvent>) {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios/relay.json");
    let scenario: Scenario = serde_json::from_reader(File::open(path).unwrap()).unwrap();
    let recorder = Recorder::default();
    let mut simulation = scenario.build(vec![Box::new(recorder.clone())]).unwrap();
    (simulation.run(), recorder.events())
}

fn terminal<'a>(summary: &'a Summary, address: &str) -> &'a TerminalSummary {
    summary
        .terminals
        .iter()
        .find(|terminal| terminal.address.to_string() == address)
        .unwrap()
}

fn serials(terminal: &TerminalSummary) -> Vec<u64> {
    terminal
        .received
        .iter()
        .map(|reception| reception.serial)
        .collect()
}

#[test]
fn test_sample_scenario() {
    let (summary, events) = run_sample();
    assert_eq!(summary.terminals.len(), 4);

    let wingman = serials(terminal(&summary, "wingman.jtids"));
    // Heard directly and again through the relay, but not while switched off.
    assert_eq!(wingman.iter().filter(|&&serial| serial == 1).count(), 2);
    assert!(!wingman.contains(&4));
    assert!(wingman.contains(&5));

    let awacs = serials(terminal(&summary, "awacs.jtids"));
    assert!(awacs.contains(&1));
    assert!(awacs.contains(&3));
    assert!(!awacs.contains(&2));

    let flight_lead = serials(terminal(&summary, "flight_lead.jtids"));
    assert!(flight_lead.contains(&3));

    let ship = terminal(&summary, "ship.jtids");
    assert_eq!((ship.sent, ship.refused), (3, 0));
    assert!(ship.received.is_empty());

    assert!(events
        .iter()
        .any(|event| event.kind.to_string() == "message_updated" && event.serial == 3));
}

#[test]
fn test_summary_serializes() {
    let (summary, events) = run_sample();
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["terminals"][0]["address"], "awacs.jtids");
    let event = serde_json::to_value(&events[0]).unwrap();
    assert!(event["kind"].is_string());
    assert!(event["time"].is_number());
}
