//! Scenario files and the concrete terminal and message types used to run them.
//!
//! A scenario is a JSON document listing slot group prototypes (as input directives),
//! terminals carrying them, and timed status changes and message sends:
//!
//! ```json
//! {
//!   "seed": 7,
//!   "end_time": 30.0,
//!   "slot_groups": { "ppli": ["network 1", "slots_per_frame 64"] },
//!   "terminals": [
//!     { "platform": "alpha", "slot_groups": ["ppli"] },
//!     { "platform": "bravo", "slot_groups": ["ppli"] }
//!   ],
//!   "messages": [
//!     { "time": 1.0, "from": "alpha", "group": "ppli", "to": "bravo", "serial": 1, "size_bits": 450 }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use simclock::{Disposition, Scheduler};

use crate::{
    Address, FrameTiming, Message, Network, Observer, PlatformIndex, ScenarioError,
    SlotGroupConfig, Terminal, TerminalId,
};

/// A report sent over the link. Reports on the same track supersede each other in the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    serial: u64,
    size_bits: usize,
    track: Option<u32>,
    #[serde(skip)]
    destination: Option<Address>,
    #[serde(skip)]
    received: bool,
}

impl Report {
    /// Creates a report not tied to any track.
    #[must_use]
    pub fn new(serial: u64, size_bits: usize) -> Self {
        Self {
            serial,
            size_bits,
            track: None,
            destination: None,
            received: false,
        }
    }

    /// Ties the report to a track.
    #[must_use]
    pub fn with_track(mut self, track: u32) -> Self {
        self.track = Some(track);
        self
    }

    /// Track the report is about.
    #[must_use]
    pub fn track(&self) -> Option<u32> {
        self.track
    }

    /// Terminal the report was last handed to.
    #[must_use]
    pub fn destination(&self) -> Option<&Address> {
        self.destination.as_ref()
    }

    /// Whether the last delivery attempt succeeded.
    #[must_use]
    pub fn is_received(&self) -> bool {
        self.received
    }
}

impl Message for Report {
    fn serial_number(&self) -> u64 {
        self.serial
    }

    fn size_bits(&self) -> usize {
        self.size_bits
    }

    fn can_be_replaced_by(&self, other: &Self) -> bool {
        self.track.is_some() && self.track == other.track && self.serial != other.serial
    }

    fn set_destination(&mut self, address: Address) {
        self.destination = Some(address);
    }

    fn reset_result(&mut self) {
        self.received = false;
    }
}

/// A report as received by a [`Radio`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reception {
    /// Time of delivery.
    pub time: f64,
    /// Terminal that transmitted the report.
    pub source: TerminalId,
    /// Serial number of the report.
    pub serial: u64,
}

/// A simple radio terminal that can be switched on and off and records what it receives.
#[derive(Debug, Clone)]
pub struct Radio {
    name: String,
    platform: String,
    platform_index: PlatformIndex,
    on: bool,
    status_time: f64,
    mover: bool,
    relay: bool,
    received: Vec<Reception>,
    sent: usize,
    refused: usize,
}

impl Radio {
    /// Creates a radio that is on, stationary, and asks for no relaying.
    #[must_use]
    pub fn new(name: &str, platform: &str, platform_index: PlatformIndex) -> Self {
        Self {
            name: name.to_string(),
            platform: platform.to_string(),
            platform_index,
            on: true,
            status_time: 0.0,
            mover: false,
            relay: false,
            received: Vec::new(),
            sent: 0,
            refused: 0,
        }
    }

    /// Sets whether the platform moves.
    #[must_use]
    pub fn mover(mut self, mover: bool) -> Self {
        self.mover = mover;
        self
    }

    /// Sets whether received reports should be relayed further.
    #[must_use]
    pub fn relay(mut self, relay: bool) -> Self {
        self.relay = relay;
        self
    }

    /// Turns the radio on or off at `time`. Returns `false` if the status did not change.
    pub fn set_on(&mut self, on: bool, time: f64) -> bool {
        if self.on == on {
            false
        } else {
            self.on = on;
            self.status_time = time;
            true
        }
    }

    /// Reports received so far.
    #[must_use]
    pub fn received(&self) -> &[Reception] {
        &self.received
    }

    /// Counts a send attempt.
    pub fn record_send(&mut self, accepted: bool) {
        if accepted {
            self.sent += 1;
        } else {
            self.refused += 1;
        }
    }
}

impl Terminal for Radio {
    type Message = Report;

    fn name(&self) -> &str {
        &self.name
    }

    fn platform_index(&self) -> PlatformIndex {
        self.platform_index
    }

    fn platform_name(&self) -> &str {
        &self.platform
    }

    fn address(&self) -> Address {
        Address::from(format!("{}.{}", self.platform, self.name))
    }

    fn is_turned_on(&self) -> bool {
        self.on
    }

    fn last_status_change_time(&self) -> f64 {
        self.status_time
    }

    fn is_mover(&self) -> bool {
        self.mover
    }

    fn receive(&mut self, time: f64, source: TerminalId, message: &mut Report) -> bool {
        message.received = true;
        self.received.push(Reception {
            time,
            source,
            serial: message.serial,
        });
        self.relay
    }
}

/// A terminal of the scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalSpec {
    /// Platform the terminal is mounted on. Terminals are referred to by platform name.
    pub platform: String,
    /// Terminal name.
    #[serde(default = "default_terminal_name")]
    pub name: String,
    /// Names of the slot group prototypes the terminal carries, in initialization order.
    pub slot_groups: Vec<String>,
    /// Whether the platform moves.
    #[serde(default)]
    pub mover: bool,
    /// Whether the terminal relays what it receives.
    #[serde(default)]
    pub relay: bool,
    /// Whether the terminal is on at the start.
    #[serde(default = "default_on")]
    pub on: bool,
}

fn default_terminal_name() -> String {
    String::from("jtids")
}

fn default_on() -> bool {
    true
}

/// Turns a terminal on or off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    /// Simulation time of the change.
    pub time: f64,
    /// Platform of the terminal.
    pub platform: String,
    /// New status.
    pub on: bool,
}

/// Sends a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendSpec {
    /// Simulation time of the send.
    pub time: f64,
    /// Sending platform.
    pub from: String,
    /// Slot group to send on.
    pub group: String,
    /// Recipient platform.
    pub to: String,
    /// Serial number of the report.
    pub serial: u64,
    /// Size of the report in bits.
    pub size_bits: usize,
    /// Track of the report.
    #[serde(default)]
    pub track: Option<u32>,
}

/// A complete scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Seed of the generated slot layouts.
    #[serde(default)]
    pub seed: u64,
    /// Frame timing.
    #[serde(default)]
    pub frame: FrameTiming,
    /// The simulation stops after this time.
    pub end_time: f64,
    /// Slot group prototypes by name, each given as a list of input directives.
    pub slot_groups: BTreeMap<String, Vec<String>>,
    /// Terminals, initialized in order.
    pub terminals: Vec<TerminalSpec>,
    /// Scheduled status changes.
    #[serde(default)]
    pub status_changes: Vec<StatusChange>,
    /// Scheduled sends.
    #[serde(default)]
    pub messages: Vec<SendSpec>,
}

/// A network with its scheduler, ready to run.
pub struct Simulation {
    /// Terminals and slot groups.
    pub network: Network<Radio>,
    /// Pending events.
    pub scheduler: Scheduler<Network<Radio>>,
    /// The run stops after this time.
    pub end_time: f64,
}

impl Simulation {
    /// Runs all events up to the end time.
    pub fn run(&mut self) -> Summary {
        let time = self.scheduler.run_until(&mut self.network, self.end_time);
        log::info!(
            "Simulation finished at {:.6} with {} pending events",
            time,
            self.scheduler.pending()
        );
        Summary {
            end_time: time,
            terminals: self
                .network
                .terminals()
                .map(|(_, radio)| TerminalSummary {
                    address: radio.address(),
                    sent: radio.sent,
                    refused: radio.refused,
                    received: radio.received.clone(),
                })
                .collect(),
        }
    }
}

/// Per-terminal outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct TerminalSummary {
    /// Address of the terminal.
    pub address: Address,
    /// Accepted sends.
    pub sent: usize,
    /// Refused sends.
    pub refused: usize,
    /// Received reports.
    pub received: Vec<Reception>,
}

/// Outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    /// Time of the last executed event.
    pub end_time: f64,
    /// Terminal outcomes, in scenario order.
    pub terminals: Vec<TerminalSummary>,
}

impl Scenario {
    /// Builds the network, initializes all terminals, and schedules status changes and sends.
    ///
    /// # Errors
    ///
    /// Fails on malformed slot group directives, references to unknown slot groups or
    /// platforms, and slot group initialization failures.
    pub fn build(
        &self,
        observers: Vec<Box<dyn Observer<Report>>>,
    ) -> Result<Simulation, ScenarioError> {
        self.frame.validate().map_err(ScenarioError::Frame)?;
        let prototypes = self
            .slot_groups
            .iter()
            .map(|(name, directives)| {
                SlotGroupConfig::from_directives(name, directives, &self.frame)
                    .map(|config| (name.as_str(), config))
                    .map_err(|source| ScenarioError::Config {
                        group: name.clone(),
                        source,
                    })
            })
            .collect::<Result<HashMap<_, _>, _>>()?;

        let mut network =
            Network::new(self.frame.clone(), self.seed).map_err(ScenarioError::Frame)?;
        for observer in observers {
            network.add_observer(observer);
        }

        let mut platforms: HashMap<&str, (PlatformIndex, TerminalId)> = HashMap::new();
        for spec in &self.terminals {
            let next_index = PlatformIndex::from(platforms.len());
            let platform_index = platforms
                .get(spec.platform.as_str())
                .map_or(next_index, |&(index, _)| index);
            let mut radio = Radio::new(&spec.name, &spec.platform, platform_index)
                .mover(spec.mover)
                .relay(spec.relay);
            radio.set_on(spec.on, 0.0);
            let terminal = network.add_terminal(radio);
            platforms
                .entry(spec.platform.as_str())
                .or_insert((platform_index, terminal));
            for name in &spec.slot_groups {
                let config = prototypes
                    .get(name.as_str())
                    .ok_or_else(|| ScenarioError::UnknownGroup(name.clone()))?;
                network.add_group(terminal, config);
            }
            network.initialize_terminal(terminal, 0.0)?;
        }

        let platform = |name: &str| {
            platforms
                .get(name)
                .copied()
                .ok_or_else(|| ScenarioError::UnknownPlatform(name.to_string()))
        };

        let mut scheduler = Scheduler::default();
        for change in &self.status_changes {
            let (_, terminal) = platform(&change.platform)?;
            let on = change.on;
            scheduler.schedule(
                change.time,
                Box::new(
                    move |time: f64, _: &mut Scheduler<Network<Radio>>, network: &mut Network<Radio>| {
                        if let Some(radio) = network.terminal_mut(terminal) {
                            if radio.set_on(on, time) {
                                log::info!(
                                    "[{:.6}] {} turned {}",
                                    time,
                                    radio.address(),
                                    if on { "on" } else { "off" }
                                );
                            }
                        }
                        Disposition::Delete
                    },
                ),
            );
        }
        for send in &self.messages {
            let (_, from) = platform(&send.from)?;
            let (recipient, _) = platform(&send.to)?;
            let group = network
                .find_group(from, &send.group)
                .ok_or_else(|| ScenarioError::UnknownGroup(send.group.clone()))?;
            let report = match send.track {
                Some(track) => Report::new(send.serial, send.size_bits).with_track(track),
                None => Report::new(send.serial, send.size_bits),
            };
            scheduler.schedule(
                send.time,
                Box::new(
                    move |time: f64,
                          scheduler: &mut Scheduler<Network<Radio>>,
                          network: &mut Network<Radio>| {
                        let accepted = network.send_message(
                            time,
                            group,
                            report.clone(),
                            recipient,
                            true,
                            scheduler,
                        );
                        if let Some(radio) = network.terminal_mut(from) {
                            radio.record_send(accepted);
                        }
                        Disposition::Delete
                    },
                ),
            );
        }

        Ok(Simulation {
            network,
            scheduler,
            end_time: self.end_time,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{ConfigError, Recorder};
    use float_cmp::approx_eq;

    fn scenario(json: &str) -> Scenario {
        serde_json::from_str(json).unwrap()
    }

    const TWO_TERMINALS: &str = r#"{
        "seed": 3,
        "end_time": 30.0,
        "slot_groups": { "ppli": ["network 1", "slots_per_frame 96"] },
        "terminals": [
            { "platform": "alpha", "slot_groups": ["ppli"] },
            { "platform": "bravo", "slot_groups": ["ppli"], "mover": true }
        ],
        "messages": [
            { "time": 1.0, "from": "alpha", "group": "ppli", "to": "bravo", "serial": 1, "size_bits": 450 },
            { "time": 1.0, "from": "alpha", "group": "ppli", "to": "bravo", "serial": 2, "size_bits": 225 }
        ]
    }"#;

    #[test]
    fn test_report_replacement() {
        let a = Report::new(1, 100).with_track(4);
        let b = Report::new(2, 100).with_track(4);
        let c = Report::new(3, 100).with_track(5);
        let untracked = Report::new(4, 100);
        assert!(a.can_be_replaced_by(&b));
        assert!(!a.can_be_replaced_by(&a));
        assert!(!a.can_be_replaced_by(&c));
        assert!(!untracked.can_be_replaced_by(&Report::new(5, 100)));
    }

    #[test]
    fn test_radio_status() {
        let mut radio = Radio::new("jtids", "alpha", PlatformIndex::from(0));
        assert!(radio.is_turned_on());
        assert!(!radio.set_on(true, 2.0));
        assert!(approx_eq!(f64, radio.last_status_change_time(), 0.0));
        assert!(radio.set_on(false, 3.0));
        assert!(!radio.is_turned_on());
        assert!(approx_eq!(f64, radio.last_status_change_time(), 3.0));
        assert_eq!(radio.address(), Address::from("alpha.jtids"));
    }

    #[test]
    fn test_run_delivers_in_order() {
        let recorder = Recorder::default();
        let mut simulation = scenario(TWO_TERMINALS)
            .build(vec![Box::new(recorder.clone())])
            .unwrap();
        let summary = simulation.run();
        assert_eq!(summary.terminals.len(), 2);
        assert_eq!(summary.terminals[0].sent, 2);
        let serials: Vec<_> = summary.terminals[1]
            .received
            .iter()
            .map(|reception| reception.serial)
            .collect();
        assert_eq!(serials, vec![1, 2]);
        assert!(summary.terminals[0].received.is_empty());
        assert_eq!(recorder.count("message_transmitted"), 2);
        assert_eq!(recorder.count("message_transmit_ended"), 2);
        assert_eq!(recorder.count("message_queued"), 1);
    }

    #[test]
    fn test_unknown_references() {
        let mut bad_group = scenario(TWO_TERMINALS);
        bad_group.terminals[0].slot_groups.push(String::from("voice"));
        assert!(matches!(
            bad_group.build(Vec::new()),
            Err(ScenarioError::UnknownGroup(name)) if name == "voice"
        ));

        let mut bad_platform = scenario(TWO_TERMINALS);
        bad_platform.messages[0].to = String::from("charlie");
        assert!(matches!(
            bad_platform.build(Vec::new()),
            Err(ScenarioError::UnknownPlatform(name)) if name == "charlie"
        ));
    }

    #[test]
    fn test_bad_directive() {
        let mut bad = scenario(TWO_TERMINALS);
        bad.slot_groups
            .insert(String::from("ppli"), vec![String::from("network 200")]);
        assert!(matches!(
            bad.build(Vec::new()),
            Err(ScenarioError::Config { group, .. }) if group == "ppli"
        ));
    }

    #[test]
    fn test_bad_frame_timing() {
        for (field, json) in [
            ("slots_per_frame", r#"{ "slots_per_frame": 0 }"#),
            ("bits_per_slot", r#"{ "bits_per_slot": 0 }"#),
            ("seconds_per_slot", r#"{ "seconds_per_slot": 0.0 }"#),
        ] {
            let mut bad = scenario(TWO_TERMINALS);
            bad.frame = serde_json::from_str(json).unwrap();
            match bad.build(Vec::new()) {
                Err(ScenarioError::Frame(ConfigError::BadFrameTiming { field: name, .. })) => {
                    assert_eq!(name, field);
                }
                Err(err) => panic!("unexpected error for {}: {}", field, err),
                Ok(_) => panic!("accepted invalid {}", field),
            }
        }
    }
}
