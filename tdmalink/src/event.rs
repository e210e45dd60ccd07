use simclock::{Disposition, Event, Scheduler};

use crate::{GroupId, Network, Terminal, TerminalId};

/// Heartbeat interval of terminals on moving platforms, in seconds.
pub const MOVER_HEARTBEAT_INTERVAL: f64 = 2.0;

/// Heartbeat interval of terminals on stationary platforms, in seconds.
pub const HEARTBEAT_INTERVAL: f64 = 5.0;

/// Heartbeats stop once no more than this many seconds of the transmission remain.
pub const HEARTBEAT_CUTOFF: f64 = 2.0;

/// State of a transmit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Phase {
    /// Waiting for the front entry's transmission to begin.
    AwaitingBeginTransmit,
    /// Waiting for the front entry's transmission to complete.
    AwaitingTransmitComplete,
}

/// Drives the transmissions of one slot group, alternating between beginning and completing
/// the transmission of the front queue entry until the queue runs dry.
///
/// The event belongs to the terminal status it was created under. Once the terminal is turned
/// on or off, or the group or terminal is gone, the event deletes itself without doing anything.
#[derive(Debug, Clone)]
pub struct TransmitEvent {
    group: GroupId,
    terminal: TerminalId,
    status_stamp: f64,
    phase: Phase,
}

impl TransmitEvent {
    /// Creates a cycle that begins with a transmission.
    #[must_use]
    pub fn new(group: GroupId, terminal: TerminalId, status_stamp: f64) -> Self {
        Self {
            group,
            terminal,
            status_stamp,
            phase: Phase::AwaitingBeginTransmit,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }
}

impl<T: Terminal> Event<Network<T>> for TransmitEvent {
    fn execute(
        &mut self,
        time: f64,
        scheduler: &mut Scheduler<Network<T>>,
        network: &mut Network<T>,
    ) -> Disposition {
        if !network.is_cycle_current(self.group, self.terminal, self.status_stamp) {
            log::trace!("[{:.6}] stale transmit event for group {}", time, self.group);
            return Disposition::Delete;
        }
        let next = match self.phase {
            Phase::AwaitingBeginTransmit => network
                .begin_transmit_event(self.group, time, scheduler)
                .map(|next| (next, Phase::AwaitingTransmitComplete)),
            Phase::AwaitingTransmitComplete => network
                .transmit_complete_event(self.group, time, scheduler)
                .map(|next| (next, Phase::AwaitingBeginTransmit)),
        };
        match next {
            Some((next, phase)) => {
                self.phase = phase;
                Disposition::Reschedule(next)
            }
            None => {
                network.transmit_events_stopped(self.group, time);
                Disposition::Delete
            }
        }
    }
}

/// Periodic notification that a long transmission is still in progress.
#[derive(Debug, Clone)]
pub struct HeartbeatEvent {
    group: GroupId,
    terminal: TerminalId,
    status_stamp: f64,
    serial: u64,
    end: f64,
    interval: f64,
}

impl HeartbeatEvent {
    /// Heartbeat for the transmission of message `serial`, ending at `end`.
    #[must_use]
    pub fn new(
        group: GroupId,
        terminal: TerminalId,
        status_stamp: f64,
        serial: u64,
        end: f64,
        interval: f64,
    ) -> Self {
        Self {
            group,
            terminal,
            status_stamp,
            serial,
            end,
            interval,
        }
    }

    /// Seconds between heartbeats.
    #[must_use]
    pub fn interval(&self) -> f64 {
        self.interval
    }
}

impl<T: Terminal> Event<Network<T>> for HeartbeatEvent {
    fn execute(
        &mut self,
        time: f64,
        _: &mut Scheduler<Network<T>>,
        network: &mut Network<T>,
    ) -> Disposition {
        if !network.is_cycle_current(self.group, self.terminal, self.status_stamp)
            || !network.transmit_heartbeat(self.group, self.serial, time)
        {
            return Disposition::Delete;
        }
        if self.end - time > HEARTBEAT_CUTOFF {
            Disposition::Reschedule(time + self.interval)
        } else {
            Disposition::Delete
        }
    }
}
