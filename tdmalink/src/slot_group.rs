use delegate::delegate;
use rand::Rng;

use crate::{
    Enqueued, FrameTiming, GroupId, InitError, Message, NetGroupId, NetGroupRegistry,
    PackingFormat, QueueEntry, SlotGroupConfig, SlotTable, TerminalId, TransmitQueue,
    TransmitWindow,
};

/// One terminal's participation in one net.
///
/// Created from a [`SlotGroupConfig`] prototype for each terminal carrying it, and owned by the
/// [`Network`](crate::Network). Relay and net group links are IDs into the network.
#[derive(Debug, Clone)]
pub struct SlotGroup<M> {
    config: SlotGroupConfig,
    terminal: TerminalId,
    full_name: String,
    table: SlotTable,
    queue: TransmitQueue<M>,
    paired_relay: Option<GroupId>,
    net_group: NetGroupId,
    cycle_stamp: Option<f64>,
}

impl<M> SlotGroup<M> {
    /// Creates an uninitialized group for `terminal`.
    /// `full_name` identifies the group in logs, see [`SlotGroup::full_name`].
    #[must_use]
    pub fn new(config: &SlotGroupConfig, terminal: TerminalId, full_name: String) -> Self {
        Self {
            config: config.clone(),
            terminal,
            full_name,
            table: SlotTable::default(),
            queue: TransmitQueue::bounded(config.queue_limit),
            paired_relay: None,
            net_group: NetGroupId::UNATTACHED,
            cycle_stamp: None,
        }
    }

    delegate! {
        to self.table {
            /// All slots of the group, sorted.
            #[must_use]
            pub fn slots(&self) -> &[usize];
            /// Slots in which the group may transmit, sorted.
            #[must_use]
            pub fn transmit_slots(&self) -> &[usize];
        }
    }

    /// Configuration the group was created from.
    #[must_use]
    pub fn config(&self) -> &SlotGroupConfig {
        &self.config
    }

    /// Group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// `<platform>.<terminal>.<group>`.
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Terminal hosting the group.
    #[must_use]
    pub fn terminal(&self) -> TerminalId {
        self.terminal
    }

    /// Slot table; empty until initialized.
    #[must_use]
    pub fn table(&self) -> &SlotTable {
        &self.table
    }

    /// Pending transmissions.
    #[must_use]
    pub fn queue(&self) -> &TransmitQueue<M> {
        &self.queue
    }

    /// Group retransmitting what this group receives, if any.
    #[must_use]
    pub fn paired_relay(&self) -> Option<GroupId> {
        self.paired_relay
    }

    pub(crate) fn set_paired_relay(&mut self, relay: Option<GroupId>) {
        self.paired_relay = relay;
    }

    /// Net group the group is attached to, or [`NetGroupId::UNATTACHED`].
    #[must_use]
    pub fn net_group(&self) -> NetGroupId {
        self.net_group
    }

    /// Whether a transmit cycle started under the terminal status `stamp` is running.
    #[allow(clippy::float_cmp)]
    #[must_use]
    pub fn has_live_cycle(&self, stamp: f64) -> bool {
        self.cycle_stamp == Some(stamp)
    }

    /// Joins the net group matching the configuration. Joining twice is ignored with a warning.
    pub fn add_to_network(&mut self, id: GroupId, registry: &mut NetGroupRegistry) {
        let (net_group, added) = registry.join(&self.config.key(), id);
        self.net_group = net_group;
        if added {
            log::debug!("{}: added to net group {}", self.full_name, net_group);
        } else {
            log::warn!(
                "{}: slot group is trying to be added to the network twice",
                self.full_name
            );
        }
    }

    /// Leaves the current net group, if any.
    pub fn remove_from_network(&mut self, id: GroupId, registry: &mut NetGroupRegistry) {
        if self.net_group.is_attached() {
            log::debug!(
                "{}: removed from net group {}",
                self.full_name,
                self.net_group
            );
            registry.leave(self.net_group, id);
            self.net_group = NetGroupId::UNATTACHED;
        }
    }

    /// Discards all queued messages and ends the transmit cycle.
    pub fn purge(&mut self) {
        self.queue.purge();
        self.cycle_stamp = None;
    }

    /// Joins the net group and builds the slot table.
    ///
    /// `peers` resolves other groups of the network; the group being initialized is not
    /// reachable through it. `relay_source` is the group named by `paired_relay_source` on the
    /// same terminal, if it exists.
    ///
    /// # Errors
    ///
    /// Fails if the group's parameters disagree with the first member of its net group, no
    /// slots are configured, the per-unit slot count is too large, or the relay source is
    /// missing or not yet initialized. The error is logged and the group is detached.
    pub fn initialize<'a, F, R>(
        &mut self,
        id: GroupId,
        registry: &mut NetGroupRegistry,
        peers: F,
        relay_source: Option<&SlotGroup<M>>,
        frame: &FrameTiming,
        rng: &mut R,
    ) -> Result<(), InitError>
    where
        F: Fn(GroupId) -> Option<&'a SlotGroup<M>>,
        M: 'a,
        R: Rng + ?Sized,
    {
        self.add_to_network(id, registry);
        let result = self.build_table(id, registry, peers, relay_source, frame, rng);
        if let Err(err) = &result {
            log::error!("{}", err);
            self.remove_from_network(id, registry);
        }
        result
    }

    fn build_table<'a, F, R>(
        &mut self,
        id: GroupId,
        registry: &NetGroupRegistry,
        peers: F,
        relay_source: Option<&SlotGroup<M>>,
        frame: &FrameTiming,
        rng: &mut R,
    ) -> Result<(), InitError>
    where
        F: Fn(GroupId) -> Option<&'a SlotGroup<M>>,
        M: 'a,
        R: Rng + ?Sized,
    {
        let members = registry.members(self.net_group);
        let first = members
            .first()
            .filter(|&&first| first != id)
            .and_then(|&first| peers(first));
        let first_config = first.map_or(&self.config, SlotGroup::config);

        if self.config.paired_relay_source.is_none() {
            if self.config.slots_per_frame != first_config.slots_per_frame {
                return Err(InitError::SlotsPerFrameMismatch(self.full_name.clone()));
            }
            if self.config.slots_per_frame == 0 {
                return Err(InitError::NoSlots(self.full_name.clone()));
            }
            if self
                .config
                .per_unit_slots_per_frame
                .map_or(false, |count| count > self.config.slots_per_frame)
            {
                return Err(InitError::PerUnitExceedsSlots(self.full_name.clone()));
            }
        } else if self.config.paired_relay_source != first_config.paired_relay_source {
            return Err(InitError::RelaySourceMismatch(self.full_name.clone()));
        }

        self.table = if !self.config.blocks.is_empty() {
            SlotTable::from_blocks(&self.config.blocks, frame.slots_per_frame)
        } else if self.config.paired_relay_source.is_some() {
            match relay_source {
                Some(source) if !source.slots().is_empty() => SlotTable::paired_relay(
                    source.slots(),
                    self.config.relay_slot_offset,
                    frame.slots_per_frame,
                ),
                _ => return Err(InitError::RelaySourceUnavailable(self.full_name.clone())),
            }
        } else {
            let slots = match first {
                Some(first) => first.slots().to_vec(),
                None => {
                    SlotTable::generate(rng, frame.slots_per_frame, self.config.slots_per_frame)
                }
            };
            let ordinal = members
                .iter()
                .take_while(|&&member| member != id)
                .filter_map(|&member| peers(member))
                .filter(|peer| peer.config.per_unit_slots_per_frame.map_or(false, |n| n > 0))
                .count();
            SlotTable::with_transmit_subset(slots, self.config.per_unit_slots_per_frame, ordinal)
        };
        log::debug!(
            "{}: {} slots, {} transmit slots",
            self.full_name,
            self.table.slots().len(),
            self.table.transmit_slots().len()
        );
        Ok(())
    }

    /// Whether a new message can be accepted for transmission.
    #[must_use]
    pub fn can_send(&self) -> bool {
        !self.table.transmit_slots().is_empty() && !self.queue.is_full()
    }

    /// Slots needed for a message of `size_bits` under the group's packing limit.
    #[must_use]
    pub fn slots_needed(&self, size_bits: usize, frame: &FrameTiming) -> usize {
        frame.slots_needed(size_bits, self.packing())
    }

    /// Packing limit of the group.
    #[must_use]
    pub fn packing(&self) -> PackingFormat {
        self.config.packing
    }

    /// Start of the next single-slot transmit opportunity after `time`, or `None` if the group
    /// cannot transmit.
    #[must_use]
    pub fn next_transmit_time(&self, time: f64, frame: &FrameTiming) -> Option<f64> {
        if self.table.transmit_slots().is_empty() {
            None
        } else {
            Some(frame.next_transmit_time(time, self.table.transmit_slots()))
        }
    }

    fn front_window(
        &mut self,
        time: f64,
        frame: &FrameTiming,
        recompute: bool,
    ) -> Option<TransmitWindow> {
        let transmit_slots = self.table.transmit_slots();
        let front = self.queue.front_mut()?;
        if recompute || front.window.is_none() {
            front.window = Some(frame.transmit_window(time, front.slots_needed, transmit_slots));
        }
        front.window
    }

    /// Marks the start of a transmission of the front entry.
    ///
    /// Returns the completion time of the transmission, or `None` if the queue is empty.
    pub(crate) fn begin_transmit(&mut self, time: f64, frame: &FrameTiming) -> Option<f64> {
        let window = self.front_window(time, frame, false)?;
        log::debug!(
            "{}: begin transmit at {:.6}, complete at {:.6} (slot {})",
            self.full_name,
            time,
            window.complete,
            window.slot
        );
        Some(window.complete)
    }

    /// Removes the transmitted front entry.
    pub(crate) fn pop_transmitted(&mut self) -> Option<QueueEntry<M>> {
        self.queue.pop_front()
    }

    /// Begin time of the next queued transmission, computing its window if needed.
    pub(crate) fn next_begin(&mut self, time: f64, frame: &FrameTiming) -> Option<f64> {
        self.front_window(time, frame, false).map(|window| window.begin)
    }

    /// Ends the transmit cycle. An entry still at the front is dropped and returned.
    pub(crate) fn transmit_events_stopped(&mut self) -> Option<QueueEntry<M>> {
        self.cycle_stamp = None;
        self.queue.pop_front()
    }
}

impl<M: Message> SlotGroup<M> {
    /// Adds an entry to the queue.
    ///
    /// If no transmit cycle is live for the terminal status `stamp`, one is started for the front
    /// entry and its begin time is returned for scheduling. The front window is recomputed in
    /// that case: an entry left over from a cycle that went stale must not be scheduled in the
    /// past.
    pub(crate) fn enqueue(
        &mut self,
        time: f64,
        entry: QueueEntry<M>,
        stamp: f64,
        frame: &FrameTiming,
    ) -> (Enqueued<M>, Option<f64>) {
        let serial = entry.message.serial_number();
        let outcome = self.queue.enqueue(entry);
        match &outcome {
            Enqueued::Merged => log::debug!("{}: merged message {}", self.full_name, serial),
            Enqueued::Replaced { previous, .. } => log::debug!(
                "{}: message {} replaced by {}",
                self.full_name,
                previous.serial_number(),
                serial
            ),
            Enqueued::Appended { depth } => log::debug!(
                "{}: queued message {} (depth {})",
                self.full_name,
                serial,
                depth
            ),
        }
        let begin = if self.has_live_cycle(stamp) {
            None
        } else {
            let begin = self.front_window(time, frame, true).map(|window| window.begin);
            if begin.is_some() {
                self.cycle_stamp = Some(stamp);
                log::debug!("{}: start transmit events at {:?}", self.full_name, begin);
            }
            begin
        };
        (outcome, begin)
    }
}
