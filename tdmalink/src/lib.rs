//! Slot-group scheduling for a TDMA tactical data link.
//!
//! Simulated terminals join *net groups* that share a time-slotted channel. Each terminal's
//! participation in a net is a [`SlotGroup`]: it owns a slot table, a transmit queue, and an
//! optional relay pairing. Transmissions are driven by a two-phase event on a
//! [`simclock::Scheduler`], and delivery fans out to every other member of the net group.

#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::default_trait_access,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

mod error;
pub use error::{ConfigError, InitError, ScenarioError};

mod timing;
pub use timing::{FrameTiming, PackingFormat, TransmitWindow};

mod slot_table;
pub use slot_table::{BlockRole, SlotTable, TimeSlotBlock};

mod queue;
pub use queue::{Enqueued, QueueEntry, TransmitQueue, DEFAULT_QUEUE_LIMIT};

mod registry;
pub use registry::{NetGroup, NetGroupKey, NetGroupRegistry};

mod input;
pub use input::{AccessMode, Npg, SlotGroupConfig};

mod terminal;
pub use terminal::{Address, Message, Terminal};

mod observer;
pub use observer::{LogObserver, ObservedEvent, ObservedKind, Observer, Recorder};

mod slot_group;
pub use slot_group::SlotGroup;

mod event;
pub use event::{
    HeartbeatEvent, Phase, TransmitEvent, HEARTBEAT_CUTOFF, HEARTBEAT_INTERVAL,
    MOVER_HEARTBEAT_INTERVAL,
};

mod network;
pub use network::Network;

pub mod scenario;

/// Identifies a slot group within a [`Network`].
#[derive(
    From, Into, Debug, PartialEq, PartialOrd, Eq, Ord, Serialize, Deserialize, Copy, Clone, Hash,
    Display,
)]
pub struct GroupId(usize);

/// Identifies a terminal within a [`Network`].
#[derive(
    From, Into, Debug, PartialEq, PartialOrd, Eq, Ord, Serialize, Deserialize, Copy, Clone, Hash,
    Display,
)]
pub struct TerminalId(usize);

/// Index of the platform a terminal is mounted on. Recipient sets are expressed in these.
#[derive(
    From, Into, Debug, PartialEq, PartialOrd, Eq, Ord, Serialize, Deserialize, Copy, Clone, Hash,
    Display,
)]
pub struct PlatformIndex(usize);

/// Index of a net group in the [`NetGroupRegistry`]. Index 0 means "not attached".
#[derive(
    From, Into, Debug, PartialEq, PartialOrd, Eq, Ord, Serialize, Deserialize, Copy, Clone, Hash,
    Display, Default,
)]
pub struct NetGroupId(usize);

impl NetGroupId {
    /// The reserved sentinel used by groups that are not members of any net group.
    pub const UNATTACHED: NetGroupId = NetGroupId(0);

    /// Whether this is a real net group rather than the sentinel.
    #[must_use]
    pub fn is_attached(self) -> bool {
        self != Self::UNATTACHED
    }
}
