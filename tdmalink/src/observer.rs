use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

use crate::{Message, TerminalId};

/// Receives notifications about the life cycle of transmissions.
///
/// All methods default to doing nothing.
pub trait Observer<M> {
    /// A message was appended behind others; `depth` is the new queue length.
    fn message_queued(&mut self, _time: f64, _terminal: TerminalId, _message: &M, _depth: usize) {}

    /// A queued message was superseded by `replacement`.
    fn message_updated(&mut self, _time: f64, _terminal: TerminalId, _old: &M, _replacement: &M) {}

    /// A message started transmitting.
    fn message_transmitted(&mut self, _time: f64, _terminal: TerminalId, _message: &M) {}

    /// A long transmission is still in progress.
    fn message_transmitted_heartbeat(&mut self, _time: f64, _terminal: TerminalId, _message: &M) {}

    /// A transmission finished or was abandoned.
    fn message_transmit_ended(&mut self, _time: f64, _terminal: TerminalId, _message: &M) {}
}

/// Kind of a recorded notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ObservedKind {
    /// See [`Observer::message_queued`].
    MessageQueued {
        /// Queue length after the append.
        depth: usize,
    },
    /// See [`Observer::message_updated`].
    MessageUpdated {
        /// Serial number of the superseded message.
        replaced: u64,
    },
    /// See [`Observer::message_transmitted`].
    MessageTransmitted,
    /// See [`Observer::message_transmitted_heartbeat`].
    MessageTransmittedHeartbeat,
    /// See [`Observer::message_transmit_ended`].
    MessageTransmitEnded,
}

/// A notification as stored by the [`Recorder`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservedEvent {
    /// Simulation time of the notification.
    pub time: f64,
    /// Terminal the notification is about.
    pub terminal: TerminalId,
    /// Serial number of the message.
    pub serial: u64,
    /// What happened.
    #[serde(flatten)]
    pub kind: ObservedKind,
}

/// Stores every notification. Clones share the same storage, so one clone can be handed to the
/// network and another kept for inspection.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Rc<RefCell<Vec<ObservedEvent>>>,
}

impl Recorder {
    /// Snapshot of notifications recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events.borrow().clone()
    }

    /// Recorded notifications of one kind, ignoring the payload of the kind.
    #[must_use]
    pub fn count(&self, kind: &str) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| event.kind.to_string() == kind)
            .count()
    }

    fn record(&self, time: f64, terminal: TerminalId, serial: u64, kind: ObservedKind) {
        self.events.borrow_mut().push(ObservedEvent {
            time,
            terminal,
            serial,
            kind,
        });
    }
}

impl<M: Message> Observer<M> for Recorder {
    fn message_queued(&mut self, time: f64, terminal: TerminalId, message: &M, depth: usize) {
        self.record(
            time,
            terminal,
            message.serial_number(),
            ObservedKind::MessageQueued { depth },
        );
    }

    fn message_updated(&mut self, time: f64, terminal: TerminalId, old: &M, replacement: &M) {
        self.record(
            time,
            terminal,
            replacement.serial_number(),
            ObservedKind::MessageUpdated {
                replaced: old.serial_number(),
            },
        );
    }

    fn message_transmitted(&mut self, time: f64, terminal: TerminalId, message: &M) {
        self.record(
            time,
            terminal,
            message.serial_number(),
            ObservedKind::MessageTransmitted,
        );
    }

    fn message_transmitted_heartbeat(&mut self, time: f64, terminal: TerminalId, message: &M) {
        self.record(
            time,
            terminal,
            message.serial_number(),
            ObservedKind::MessageTransmittedHeartbeat,
        );
    }

    fn message_transmit_ended(&mut self, time: f64, terminal: TerminalId, message: &M) {
        self.record(
            time,
            terminal,
            message.serial_number(),
            ObservedKind::MessageTransmitEnded,
        );
    }
}

/// Forwards notifications to the `log` facade at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl<M: Message> Observer<M> for LogObserver {
    fn message_queued(&mut self, time: f64, terminal: TerminalId, message: &M, depth: usize) {
        log::info!(
            "[{:.6}] terminal {}: message {} queued (depth {})",
            time,
            terminal,
            message.serial_number(),
            depth
        );
    }

    fn message_updated(&mut self, time: f64, terminal: TerminalId, old: &M, replacement: &M) {
        log::info!(
            "[{:.6}] terminal {}: message {} replaced by {}",
            time,
            terminal,
            old.serial_number(),
            replacement.serial_number()
        );
    }

    fn message_transmitted(&mut self, time: f64, terminal: TerminalId, message: &M) {
        log::info!(
            "[{:.6}] terminal {}: message {} transmitting",
            time,
            terminal,
            message.serial_number()
        );
    }

    fn message_transmitted_heartbeat(&mut self, time: f64, terminal: TerminalId, message: &M) {
        log::info!(
            "[{:.6}] terminal {}: message {} still transmitting",
            time,
            terminal,
            message.serial_number()
        );
    }

    fn message_transmit_ended(&mut self, time: f64, terminal: TerminalId, message: &M) {
        log::info!(
            "[{:.6}] terminal {}: message {} transmit ended",
            time,
            terminal,
            message.serial_number()
        );
    }
}
