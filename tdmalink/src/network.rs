use rand::SeedableRng;
use rand_chacha::ChaChaRng;
use simclock::Scheduler;

use crate::event::{HEARTBEAT_INTERVAL, MOVER_HEARTBEAT_INTERVAL};
use crate::{
    ConfigError, Enqueued, FrameTiming, GroupId, HeartbeatEvent, InitError, Message,
    NetGroupRegistry, Observer, PlatformIndex, QueueEntry, SlotGroup, SlotGroupConfig, Terminal,
    TerminalId, TransmitEvent,
};

/// Owns terminals and their slot groups, and carries messages between them.
///
/// The network is the context of the [`Scheduler`] driving the simulation: transmit cycles are
/// [`TransmitEvent`]s executed against it.
pub struct Network<T: Terminal> {
    frame: FrameTiming,
    terminals: Vec<Option<T>>,
    terminal_groups: Vec<Vec<GroupId>>,
    groups: Vec<Option<SlotGroup<T::Message>>>,
    registry: NetGroupRegistry,
    rng: ChaChaRng,
    observers: Vec<Box<dyn Observer<T::Message>>>,
}

impl<T: Terminal> Network<T> {
    /// Creates an empty network. `seed` drives the generated slot layouts.
    ///
    /// # Errors
    ///
    /// Fails if the frame timing is invalid, see [`FrameTiming::validate`].
    pub fn new(frame: FrameTiming, seed: u64) -> Result<Self, ConfigError> {
        frame.validate()?;
        Ok(Self {
            frame,
            terminals: Vec::new(),
            terminal_groups: Vec::new(),
            groups: Vec::new(),
            registry: NetGroupRegistry::default(),
            rng: ChaChaRng::seed_from_u64(seed),
            observers: Vec::new(),
        })
    }

    /// Frame timing shared by all terminals.
    #[must_use]
    pub fn frame(&self) -> &FrameTiming {
        &self.frame
    }

    /// Net groups of this network.
    #[must_use]
    pub fn registry(&self) -> &NetGroupRegistry {
        &self.registry
    }

    /// Registers an observer of transmission notifications.
    pub fn add_observer(&mut self, observer: Box<dyn Observer<T::Message>>) {
        self.observers.push(observer);
    }

    /// Adds a terminal without any slot groups.
    pub fn add_terminal(&mut self, terminal: T) -> TerminalId {
        self.terminals.push(Some(terminal));
        self.terminal_groups.push(Vec::new());
        TerminalId::from(self.terminals.len() - 1)
    }

    /// The terminal with the given ID, unless it was removed.
    #[must_use]
    pub fn terminal(&self, id: TerminalId) -> Option<&T> {
        self.terminals.get(usize::from(id)).and_then(Option::as_ref)
    }

    /// Mutable access to a terminal, e.g., to turn it on or off.
    pub fn terminal_mut(&mut self, id: TerminalId) -> Option<&mut T> {
        self.terminals.get_mut(usize::from(id)).and_then(Option::as_mut)
    }

    /// Iterates over terminals that were not removed.
    pub fn terminals(&self) -> impl Iterator<Item = (TerminalId, &T)> {
        self.terminals
            .iter()
            .enumerate()
            .filter_map(|(index, terminal)| Some((TerminalId::from(index), terminal.as_ref()?)))
    }

    /// Creates a slot group on `terminal` from the prototype `config`.
    /// Returns `None` if the terminal does not exist.
    pub fn add_group(
        &mut self,
        terminal: TerminalId,
        config: &SlotGroupConfig,
    ) -> Option<GroupId> {
        let host = self.terminal(terminal)?;
        let full_name = format!("{}.{}.{}", host.platform_name(), host.name(), config.name);
        let id = GroupId::from(self.groups.len());
        self.groups.push(Some(SlotGroup::new(config, terminal, full_name)));
        self.terminal_groups[usize::from(terminal)].push(id);
        Some(id)
    }

    /// The slot group with the given ID, unless it was removed.
    #[must_use]
    pub fn group(&self, id: GroupId) -> Option<&SlotGroup<T::Message>> {
        self.groups.get(usize::from(id)).and_then(Option::as_ref)
    }

    /// Iterates over slot groups that were not removed.
    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &SlotGroup<T::Message>)> {
        self.groups
            .iter()
            .enumerate()
            .filter_map(|(index, group)| Some((GroupId::from(index), group.as_ref()?)))
    }

    /// Slot groups of a terminal, in the order they were added.
    #[must_use]
    pub fn groups_of(&self, terminal: TerminalId) -> &[GroupId] {
        match self.terminal_groups.get(usize::from(terminal)) {
            Some(groups) => groups,
            None => &[],
        }
    }

    /// Finds a slot group of `terminal` by name.
    #[must_use]
    pub fn find_group(&self, terminal: TerminalId, name: &str) -> Option<GroupId> {
        self.groups_of(terminal)
            .iter()
            .copied()
            .find(|&id| self.group(id).map_or(false, |group| group.name() == name))
    }

    /// Initializes a slot group: joins its net group and builds its slot table.
    ///
    /// A relay pair's source must be initialized first. If the source is a relay group, it is
    /// linked to the relay pair so that what it receives is retransmitted.
    ///
    /// # Errors
    ///
    /// See [`SlotGroup::initialize`]. Also fails if the group does not exist.
    pub fn initialize_group(&mut self, id: GroupId, time: f64) -> Result<(), InitError> {
        let index = usize::from(id);
        let mut group = self
            .groups
            .get_mut(index)
            .and_then(Option::take)
            .ok_or(InitError::UnknownGroup(id))?;
        let relay_source = group
            .config()
            .paired_relay_source
            .as_deref()
            .and_then(|source| self.find_group(group.terminal(), source));
        let groups = &self.groups;
        let result = group.initialize(
            id,
            &mut self.registry,
            |peer| groups.get(usize::from(peer)).and_then(Option::as_ref),
            relay_source.and_then(|source| groups[usize::from(source)].as_ref()),
            &self.frame,
            &mut self.rng,
        );
        self.groups[index] = Some(group);
        if result.is_ok() {
            log::debug!("[{:.6}] initialized slot group {}", time, id);
            if let Some(source) = relay_source {
                if let Some(source) = self.groups[usize::from(source)].as_mut() {
                    if source.config().relay {
                        source.set_paired_relay(Some(id));
                    }
                }
            }
        }
        result
    }

    /// Initializes all slot groups of a terminal in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// See [`Network::initialize_group`].
    pub fn initialize_terminal(
        &mut self,
        terminal: TerminalId,
        time: f64,
    ) -> Result<(), InitError> {
        for id in self.groups_of(terminal).to_vec() {
            self.initialize_group(id, time)?;
        }
        Ok(())
    }

    /// Joins the group's net group. Does nothing for unknown groups.
    pub fn add_to_network(&mut self, id: GroupId) {
        if let Some(group) = self.groups.get_mut(usize::from(id)).and_then(Option::as_mut) {
            group.add_to_network(id, &mut self.registry);
        }
    }

    /// Leaves the group's net group. Does nothing for unknown or detached groups.
    pub fn remove_from_network(&mut self, id: GroupId) {
        if let Some(group) = self.groups.get_mut(usize::from(id)).and_then(Option::as_mut) {
            group.remove_from_network(id, &mut self.registry);
        }
    }

    /// Queues `message` on `group` for `recipient`.
    ///
    /// `is_source` tells whether the message originates at this terminal, as opposed to being
    /// forwarded by it.
    ///
    /// Returns `false` if the message was not accepted: the group does not exist or cannot
    /// transmit, or its queue is full. A message is also refused while the sending terminal is
    /// off, since no transmit cycle could start for it until the terminal is back on.
    pub fn send_message(
        &mut self,
        time: f64,
        group: GroupId,
        message: T::Message,
        recipient: PlatformIndex,
        is_source: bool,
        scheduler: &mut Scheduler<Self>,
    ) -> bool {
        let (terminal, slots_needed) = match self.group(group) {
            Some(slot_group) if slot_group.can_send() => (
                slot_group.terminal(),
                slot_group.slots_needed(message.size_bits(), &self.frame),
            ),
            Some(slot_group) => {
                log::debug!(
                    "[{:.6}] {}: message {} refused (queue length {})",
                    time,
                    slot_group.full_name(),
                    message.serial_number(),
                    slot_group.queue().len()
                );
                return false;
            }
            None => return false,
        };
        if !self.terminal(terminal).map_or(false, Terminal::is_turned_on) {
            return false;
        }
        log::debug!(
            "[{:.6}] group {}: {} message {} for platform {} ({} slots)",
            time,
            group,
            if is_source { "sending" } else { "forwarding" },
            message.serial_number(),
            recipient,
            slots_needed
        );
        let entry = QueueEntry::new(time, message, slots_needed, recipient);
        self.enqueue(time, group, entry, scheduler);
        true
    }

    /// Start of the group's next single-slot transmit opportunity after `time`.
    #[must_use]
    pub fn next_transmit_time(&self, group: GroupId, time: f64) -> Option<f64> {
        self.group(group)?.next_transmit_time(time, &self.frame)
    }

    fn enqueue(
        &mut self,
        time: f64,
        id: GroupId,
        entry: QueueEntry<T::Message>,
        scheduler: &mut Scheduler<Self>,
    ) {
        let group = match self.groups.get_mut(usize::from(id)).and_then(Option::as_mut) {
            Some(group) => group,
            None => return,
        };
        let terminal = group.terminal();
        let stamp = match self.terminals.get(usize::from(terminal)).and_then(Option::as_ref) {
            Some(host) => host.last_status_change_time(),
            None => return,
        };
        let (outcome, begin) = group.enqueue(time, entry, stamp, &self.frame);
        match outcome {
            Enqueued::Replaced { position, previous } => {
                if let Some(current) = group.queue().get(position) {
                    for observer in &mut self.observers {
                        observer.message_updated(time, terminal, &previous, &current.message);
                    }
                }
            }
            Enqueued::Appended { depth } if depth > 1 => {
                if let Some(appended) = group.queue().get(depth - 1) {
                    for observer in &mut self.observers {
                        observer.message_queued(time, terminal, &appended.message, depth);
                    }
                }
            }
            _ => {}
        }
        if let Some(begin) = begin {
            scheduler.schedule(begin, Box::new(TransmitEvent::new(id, terminal, stamp)));
        }
    }

    /// Whether a transmit cycle of `group` started under the terminal status `stamp` is still
    /// the live one.
    #[allow(clippy::float_cmp)]
    #[must_use]
    pub fn is_cycle_current(&self, group: GroupId, terminal: TerminalId, stamp: f64) -> bool {
        match (self.group(group), self.terminal(terminal)) {
            (Some(group), Some(host)) => {
                group.terminal() == terminal
                    && host.last_status_change_time() == stamp
                    && group.has_live_cycle(stamp)
            }
            _ => false,
        }
    }

    /// Begins transmitting the front entry of the group's queue.
    ///
    /// Schedules a heartbeat if the transmission lasts longer than one heartbeat interval.
    /// Returns the completion time, or `None` if the queue is empty.
    pub fn begin_transmit_event(
        &mut self,
        id: GroupId,
        time: f64,
        scheduler: &mut Scheduler<Self>,
    ) -> Option<f64> {
        let group = self.groups.get_mut(usize::from(id)).and_then(Option::as_mut)?;
        let complete = group.begin_transmit(time, &self.frame)?;
        let terminal = group.terminal();
        let host = self.terminals.get(usize::from(terminal)).and_then(Option::as_ref)?;
        let front = group.queue().front()?;
        let interval = if host.is_mover() {
            MOVER_HEARTBEAT_INTERVAL
        } else {
            HEARTBEAT_INTERVAL
        };
        if complete - time > interval {
            scheduler.schedule(
                time + interval,
                Box::new(HeartbeatEvent::new(
                    id,
                    terminal,
                    host.last_status_change_time(),
                    front.message.serial_number(),
                    complete,
                    interval,
                )),
            );
        }
        for observer in &mut self.observers {
            observer.message_transmitted(time, terminal, &front.message);
        }
        Some(complete)
    }

    /// Completes the transmission of the front entry and delivers it.
    /// Returns the begin time of the next queued transmission, if any.
    pub fn transmit_complete_event(
        &mut self,
        id: GroupId,
        time: f64,
        scheduler: &mut Scheduler<Self>,
    ) -> Option<f64> {
        let group = self.groups.get_mut(usize::from(id)).and_then(Option::as_mut)?;
        let terminal = group.terminal();
        let mut entry = group.pop_transmitted()?;
        log::debug!(
            "[{:.6}] {}: transmit complete for message {}",
            time,
            group.full_name(),
            entry.message.serial_number()
        );
        self.deliver(time, id, &mut entry, scheduler);
        for observer in &mut self.observers {
            observer.message_transmit_ended(time, terminal, &entry.message);
        }
        let group = self.groups.get_mut(usize::from(id)).and_then(Option::as_mut)?;
        group.next_begin(time, &self.frame)
    }

    /// Ends the group's transmit cycle. An entry still at the front of the queue is dropped.
    pub fn transmit_events_stopped(&mut self, id: GroupId, time: f64) {
        if let Some(group) = self.groups.get_mut(usize::from(id)).and_then(Option::as_mut) {
            let terminal = group.terminal();
            if let Some(entry) = group.transmit_events_stopped() {
                log::debug!(
                    "[{:.6}] {}: transmit ended for message {}",
                    time,
                    group.full_name(),
                    entry.message.serial_number()
                );
                for observer in &mut self.observers {
                    observer.message_transmit_ended(time, terminal, &entry.message);
                }
            }
        }
    }

    /// Reports that message `serial` is still being transmitted by the group.
    /// Returns `false` if the message is no longer at the front of the queue.
    pub fn transmit_heartbeat(&mut self, id: GroupId, serial: u64, time: f64) -> bool {
        let group = match self.groups.get(usize::from(id)).and_then(Option::as_ref) {
            Some(group) => group,
            None => return false,
        };
        match group.queue().front() {
            Some(front) if front.message.serial_number() == serial => {
                for observer in &mut self.observers {
                    observer.message_transmitted_heartbeat(time, group.terminal(), &front.message);
                }
                true
            }
            _ => false,
        }
    }

    /// Hands a transmitted entry to every other member of the source's net group whose terminal
    /// is on and either is a recipient or relays.
    fn deliver(
        &mut self,
        time: f64,
        source: GroupId,
        entry: &mut QueueEntry<T::Message>,
        scheduler: &mut Scheduler<Self>,
    ) {
        let (net_group, source_terminal) = match self.group(source) {
            Some(group) => (group.net_group(), group.terminal()),
            None => return,
        };
        let members = self.registry.members(net_group).to_vec();
        for member in members.into_iter().filter(|&member| member != source) {
            let (member_terminal, relay) = match self.group(member) {
                Some(group) => (group.terminal(), group.paired_relay()),
                None => continue,
            };
            let host = match self.terminal_mut(member_terminal) {
                Some(host) if host.is_turned_on() => host,
                _ => continue,
            };
            if relay.is_none() && !entry.recipients.contains(&host.platform_index()) {
                continue;
            }
            entry.message.set_destination(host.address());
            entry.message.reset_result();
            let relay_requested = host.receive(time, source_terminal, &mut entry.message);
            log::debug!(
                "[{:.6}] group {}: message {} received by group {} (relay: {})",
                time,
                source,
                entry.message.serial_number(),
                member,
                relay_requested
            );
            if let Some(relay) = relay.filter(|_| relay_requested) {
                self.relay(time, relay, entry.relay_copy(), scheduler);
            }
        }
    }

    fn relay(
        &mut self,
        time: f64,
        relay: GroupId,
        entry: QueueEntry<T::Message>,
        scheduler: &mut Scheduler<Self>,
    ) {
        let ready = self.group(relay).map_or(false, |group| {
            !group.transmit_slots().is_empty()
                && self
                    .terminal(group.terminal())
                    .map_or(false, Terminal::is_turned_on)
        });
        if ready {
            log::debug!(
                "[{:.6}] group {}: relaying message {}",
                time,
                relay,
                entry.message.serial_number()
            );
            self.enqueue(time, relay, entry, scheduler);
        }
    }

    /// Removes a terminal together with its slot groups, discarding their queues.
    /// Pending events of the removed groups turn into no-ops.
    pub fn remove_terminal(&mut self, id: TerminalId) -> Option<T> {
        let index = usize::from(id);
        let terminal = self.terminals.get_mut(index)?.take()?;
        let removed = std::mem::take(&mut self.terminal_groups[index]);
        for &group_id in &removed {
            if let Some(mut group) = self.groups[usize::from(group_id)].take() {
                group.purge();
                group.remove_from_network(group_id, &mut self.registry);
            }
        }
        for group in self.groups.iter_mut().flatten() {
            if group.paired_relay().map_or(false, |relay| removed.contains(&relay)) {
                group.set_paired_relay(None);
            }
        }
        Some(terminal)
    }

    /// Detaches every group from its net group and empties the registry, e.g., between runs.
    pub fn clear_net_groups(&mut self) {
        for (index, slot) in self.groups.iter_mut().enumerate() {
            if let Some(group) = slot {
                group.purge();
                group.remove_from_network(GroupId::from(index), &mut self.registry);
            }
        }
        self.registry.clear();
    }
}
