use serde::Serialize;

use crate::{
    BlockRole, ConfigError, FrameTiming, NetGroupKey, PackingFormat, TimeSlotBlock,
    DEFAULT_QUEUE_LIMIT,
};

/// Standard network participation groups that can be named in the `npg` directive.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Npg {
    InitialEntry = 1,
    RttA = 2,
    RttB = 3,
    NetworkManagement = 4,
    PpliA = 5,
    PpliB = 6,
    Surveillance = 7,
    WeaponsCoordination = 8,
    AirControl = 9,
    ElectronicWarfare = 10,
    Unassigned = 11,
    VoiceA = 12,
    VoiceB = 13,
    IndirectPpli = 14,
    Wc = 18,
    FighterToFighterDedicated = 19,
    FighterToFighterContention = 20,
    EngagementCoordination = 21,
    JointPpli = 27,
    DistributedNetworkManagement = 28,
    ResidualMessage = 29,
    IjmsPosition = 30,
    IjmsMessage = 31,
}

impl Npg {
    /// Numeric NPG.
    #[must_use]
    pub fn number(self) -> u16 {
        self as u16
    }
}

/// How the group accesses its slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccessMode {
    /// Each slot is assigned to a single transmitter.
    Dedicated,
    /// Slots are shared by several transmitters, with the given access rate (1 to 15).
    Contention(u8),
}

impl Default for AccessMode {
    fn default() -> Self {
        Self::Dedicated
    }
}

impl From<u8> for AccessMode {
    fn from(mode: u8) -> Self {
        match mode {
            0 => Self::Dedicated,
            rate => Self::Contention(rate),
        }
    }
}

/// Configuration of a slot group, as read from its input directives.
///
/// A configured group is the prototype from which a [`SlotGroup`](crate::SlotGroup) is created
/// for every terminal that carries it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotGroupConfig {
    /// Group name; part of the net group identity.
    pub name: String,
    /// Network number (0 to 127).
    pub network: u32,
    /// Transmission security crypto variable (0 to 127).
    pub tsec: u32,
    /// Message security crypto variable (0 to 127).
    pub msec: u32,
    /// Network participation group (1 to 511), or 0 if not given.
    pub npg: u16,
    /// Slot access mode.
    pub access_mode: AccessMode,
    /// Densest packing the group may use.
    pub packing: PackingFormat,
    /// Number of slots the net group uses in each frame.
    pub slots_per_frame: usize,
    /// Number of those slots this group transmits in: all if `None`, none if `Some(0)`.
    pub per_unit_slots_per_frame: Option<usize>,
    /// Explicit time slot blocks. If any are given, no slots are generated.
    pub blocks: Vec<TimeSlotBlock>,
    /// Maximum queue length, including the entry in transmission.
    pub queue_limit: usize,
    /// Whether messages received on this group are relayed by its paired relay group.
    pub relay: bool,
    /// Name of the group on the same terminal whose slots this relay pair is offset from.
    pub paired_relay_source: Option<String>,
    /// Offset of the relay pair's slots from the source's slots.
    pub relay_slot_offset: usize,
}

impl SlotGroupConfig {
    /// Default configuration of a group with the given name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            network: 0,
            tsec: 0,
            msec: 0,
            npg: 0,
            access_mode: AccessMode::default(),
            packing: PackingFormat::default(),
            slots_per_frame: 1,
            per_unit_slots_per_frame: None,
            blocks: Vec::new(),
            queue_limit: DEFAULT_QUEUE_LIMIT,
            relay: false,
            paired_relay_source: None,
            relay_slot_offset: 6,
        }
    }

    /// Builds a configuration by processing each directive in order.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered; see [`SlotGroupConfig::process_input`].
    pub fn from_directives<I, S>(
        name: &str,
        directives: I,
        frame: &FrameTiming,
    ) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Self::new(name);
        for directive in directives {
            config.process_input(directive.as_ref(), frame)?;
        }
        Ok(config)
    }

    /// Identity of the net group this group belongs to.
    #[must_use]
    pub fn key(&self) -> NetGroupKey {
        NetGroupKey {
            name: self.name.clone(),
            network: self.network,
            tsec: self.tsec,
        }
    }

    /// Applies one directive, e.g., `network 3` or `transmit_slot_block A-0-12`.
    ///
    /// # Errors
    ///
    /// Fails on an unknown command, a missing, malformed or out-of-range value, or unexpected
    /// trailing tokens.
    pub fn process_input(&mut self, directive: &str, frame: &FrameTiming) -> Result<(), ConfigError> {
        let mut tokens = directive.split_whitespace();
        let command = match tokens.next() {
            Some(command) => command,
            None => return Err(ConfigError::UnknownCommand(String::new())),
        };
        let mut value = || tokens.next();
        match command {
            "network" => self.network = read_int(command, value(), 0, 127)? as u32,
            "slots_per_frame" => {
                self.slots_per_frame =
                    read_int(command, value(), 1, frame.slots_per_frame as i64)? as usize;
            }
            "per_unit_slots_per_frame" => {
                self.per_unit_slots_per_frame =
                    Some(read_int(command, value(), 1, self.slots_per_frame as i64)? as usize);
            }
            "receive_only" => self.per_unit_slots_per_frame = Some(0),
            "tsec" => self.tsec = read_int(command, value(), 0, 127)? as u32,
            "msec" => self.msec = read_int(command, value(), 0, 127)? as u32,
            "npg" => self.npg = parse_npg(required(command, value())?)?,
            "queue_limit" => {
                // One more to make room for the message in transmission.
                self.queue_limit = read_int(command, value(), 0, i64::MAX - 1)? as usize + 1;
            }
            "packing_limit" => {
                let text = required(command, value())?;
                self.packing = text.parse().map_err(|_| ConfigError::BadValue {
                    command: command.to_string(),
                    value: text.to_string(),
                })?;
            }
            "relay" => self.relay = true,
            "relay_slot_offset" => {
                self.relay_slot_offset = read_int(command, value(), 1, i64::MAX)? as usize;
            }
            "paired_relay_source" => {
                self.paired_relay_source = Some(required(command, value())?.to_string());
            }
            "receive_slot_block" => self.blocks.push(TimeSlotBlock::parse(
                required(command, value())?,
                BlockRole::Receive,
                frame,
            )?),
            "transmit_slot_block" => self.blocks.push(TimeSlotBlock::parse(
                required(command, value())?,
                BlockRole::Transmit,
                frame,
            )?),
            "contention_access_mode" => {
                self.access_mode = AccessMode::from(read_int(command, value(), 0, 15)? as u8);
            }
            _ => return Err(ConfigError::UnknownCommand(command.to_string())),
        }
        let rest: Vec<&str> = tokens.collect();
        if rest.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::TrailingInput {
                command: command.to_string(),
                rest: rest.join(" "),
            })
        }
    }
}

fn required<'a>(command: &str, token: Option<&'a str>) -> Result<&'a str, ConfigError> {
    token.ok_or_else(|| ConfigError::MissingValue(command.to_string()))
}

fn read_int(command: &str, token: Option<&str>, min: i64, max: i64) -> Result<i64, ConfigError> {
    let text = required(command, token)?;
    let value: i64 = text.parse().map_err(|_| ConfigError::BadValue {
        command: command.to_string(),
        value: text.to_string(),
    })?;
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange {
            command: command.to_string(),
            value,
            min,
            max,
        })
    }
}

fn parse_npg(text: &str) -> Result<u16, ConfigError> {
    match text.parse::<i64>() {
        Ok(number) if (1..=511).contains(&number) => Ok(number as u16),
        _ => text
            .parse::<Npg>()
            .map(Npg::number)
            .map_err(|_| ConfigError::BadNpg(text.to_string())),
    }
}
