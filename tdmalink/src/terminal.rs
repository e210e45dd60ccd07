use std::fmt::Debug;

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

use crate::{PlatformIndex, TerminalId};

/// Comm address of a terminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, From, Into, Display, Serialize, Deserialize)]
pub struct Address(String);

impl From<&str> for Address {
    fn from(address: &str) -> Self {
        Self(address.to_string())
    }
}

/// A message carried over the link.
///
/// The queue owns its own copy of every message; relaying clones it.
pub trait Message: Clone + Debug {
    /// Identifies the logical message. Entries sharing a serial number are merged.
    fn serial_number(&self) -> u64;

    /// Size of the encoded message in bits.
    fn size_bits(&self) -> usize;

    /// Whether this queued message is superseded by `other`, e.g., a newer report of the same
    /// track. The replacement takes this message's place in the queue.
    fn can_be_replaced_by(&self, other: &Self) -> bool;

    /// Points the message at the terminal it is about to be handed to.
    fn set_destination(&mut self, address: Address);

    /// Clears any per-delivery result left over from a previous attempt.
    fn reset_result(&mut self);
}

/// A radio terminal hosting slot groups.
pub trait Terminal {
    /// Type of message this terminal sends and receives.
    type Message: Message;

    /// Terminal name, unique on its platform.
    fn name(&self) -> &str;

    /// Index of the platform the terminal is mounted on.
    fn platform_index(&self) -> PlatformIndex;

    /// Name of the platform the terminal is mounted on.
    fn platform_name(&self) -> &str;

    /// Comm address of the terminal.
    fn address(&self) -> Address;

    /// Whether the terminal is currently on.
    fn is_turned_on(&self) -> bool;

    /// Simulation time of the last on/off transition. Events scheduled before the
    /// transition carry the old value and become no-ops.
    fn last_status_change_time(&self) -> f64;

    /// Whether the host platform moves. Moving platforms report long transmissions more
    /// often.
    fn is_mover(&self) -> bool {
        false
    }

    /// Hands a message sent by `source` to this terminal.
    /// Returns `true` if the message should be relayed further.
    fn receive(&mut self, time: f64, source: TerminalId, message: &mut Self::Message) -> bool;
}
