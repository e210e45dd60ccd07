use crate::GroupId;

/// Errors raised while processing slot-group input directives.
///
/// Any of these aborts loading of the scenario.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("missing value for `{0}`")]
    MissingValue(String),
    #[error("bad value for `{command}`: {value}")]
    BadValue { command: String, value: String },
    #[error("value for `{command}` out of range: {value} not in [{min}, {max}]")]
    OutOfRange {
        command: String,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("invalid time slot block: {0}")]
    BadTimeSlotBlock(String),
    #[error("invalid value for npg: {0}")]
    BadNpg(String),
    #[error("unexpected trailing input for `{command}`: {rest}")]
    TrailingInput { command: String, rest: String },
    #[error("invalid frame timing: `{field}` must be {requirement}, got {value}")]
    BadFrameTiming {
        field: String,
        requirement: String,
        value: String,
    },
}

/// Reasons a slot group can fail to initialize. The group is detached from its net group.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InitError {
    #[error("{0}: 'slots_per_frame' must be the same for common slot groups")]
    SlotsPerFrameMismatch(String),
    #[error("{0}: no slots defined")]
    NoSlots(String),
    #[error("{0}: 'per_unit_slots_per_frame' > 'slots_per_frame'")]
    PerUnitExceedsSlots(String),
    #[error("{0}: 'paired_relay_source' must be the same for common slot groups")]
    RelaySourceMismatch(String),
    #[error("{0}: source slot group for relay pair must appear before the relay pair slot group")]
    RelaySourceUnavailable(String),
    #[error("no slot group with ID {0}")]
    UnknownGroup(GroupId),
}

/// Errors raised while loading a scenario.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("slot group `{group}`: {source}")]
    Config { group: String, source: ConfigError },
    #[error(transparent)]
    Frame(ConfigError),
    #[error("unknown slot group: {0}")]
    UnknownGroup(String),
    #[error("unknown platform: {0}")]
    UnknownPlatform(String),
    #[error("slot group initialization failed")]
    Init(#[from] InitError),
}
