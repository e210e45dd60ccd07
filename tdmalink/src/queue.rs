use std::collections::{BTreeSet, VecDeque};

use crate::{Message, PlatformIndex, TransmitWindow};

/// Queue capacity used when no `queue_limit` is configured.
pub const DEFAULT_QUEUE_LIMIT: usize = 99_999;

/// A message waiting for its turn on the channel.
#[derive(Debug, Clone)]
pub struct QueueEntry<M> {
    /// Time the entry was created.
    pub time_queued: f64,
    /// Transmit window, computed once the entry reaches the front of the queue.
    pub window: Option<TransmitWindow>,
    /// The queue's own copy of the message.
    pub message: M,
    /// Number of slots needed after packing.
    pub slots_needed: usize,
    /// Platforms the message is addressed to.
    pub recipients: BTreeSet<PlatformIndex>,
}

impl<M: Clone> QueueEntry<M> {
    /// Creates an entry addressed to a single platform.
    pub fn new(time: f64, message: M, slots_needed: usize, recipient: PlatformIndex) -> Self {
        Self {
            time_queued: time,
            window: None,
            message,
            slots_needed,
            recipients: std::iter::once(recipient).collect(),
        }
    }

    /// Copy handed to a relay group. Timing is recomputed by the relay.
    #[must_use]
    pub fn relay_copy(&self) -> Self {
        Self {
            window: None,
            ..self.clone()
        }
    }
}

/// Outcome of [`TransmitQueue::enqueue`].
#[derive(Debug, PartialEq)]
pub enum Enqueued<M> {
    /// An entry with the same serial number was already queued and took over the recipients.
    Merged,
    /// A queued message was superseded. It is returned; the new message took its place.
    Replaced {
        /// Position of the replaced entry, counting from the front.
        position: usize,
        /// The superseded message.
        previous: M,
    },
    /// The entry was appended to the back.
    Appended {
        /// Queue length after the append.
        depth: usize,
    },
}

/// Pending transmissions of a slot group, front first.
///
/// The capacity is only consulted by [`TransmitQueue::is_full`]: new messages are refused by
/// the caller, while relayed copies, merges and replacements are always accepted.
#[derive(Debug, Clone)]
pub struct TransmitQueue<M> {
    entries: VecDeque<QueueEntry<M>>,
    capacity: usize,
}

impl<M> Default for TransmitQueue<M> {
    fn default() -> Self {
        Self::bounded(DEFAULT_QUEUE_LIMIT)
    }
}

impl<M> TransmitQueue<M> {
    /// Creates an empty queue with the given capacity.
    #[must_use]
    pub fn bounded(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    /// Maximum number of entries accepted from new sends.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the queue refuses new sends.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Number of queued entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry currently being (or about to be) transmitted.
    #[must_use]
    pub fn front(&self) -> Option<&QueueEntry<M>> {
        self.entries.front()
    }

    /// Mutable access to the front entry.
    pub fn front_mut(&mut self) -> Option<&mut QueueEntry<M>> {
        self.entries.front_mut()
    }

    /// The entry at `position`, counting from the front.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&QueueEntry<M>> {
        self.entries.get(position)
    }

    /// Removes and returns the front entry.
    pub fn pop_front(&mut self) -> Option<QueueEntry<M>> {
        self.entries.pop_front()
    }

    /// Iterates over entries, front first.
    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry<M>> {
        self.entries.iter()
    }

    /// Discards all entries.
    pub fn purge(&mut self) {
        self.entries.clear();
    }
}

impl<M: Message> TransmitQueue<M> {
    /// Adds an entry to the queue.
    ///
    /// An entry whose message has the serial number of a queued one is merged into it. Otherwise
    /// the first queued message that [can be replaced](Message::can_be_replaced_by) by the new
    /// one is swapped out in place, keeping its position and timing. Anything else is appended.
    pub fn enqueue(&mut self, entry: QueueEntry<M>) -> Enqueued<M> {
        let serial = entry.message.serial_number();
        if let Some(queued) = self
            .entries
            .iter_mut()
            .find(|queued| queued.message.serial_number() == serial)
        {
            queued.recipients.extend(entry.recipients);
            return Enqueued::Merged;
        }
        if let Some(position) = self
            .entries
            .iter()
            .position(|queued| queued.message.can_be_replaced_by(&entry.message))
        {
            let previous = std::mem::replace(&mut self.entries[position].message, entry.message);
            return Enqueued::Replaced { position, previous };
        }
        self.entries.push_back(entry);
        Enqueued::Appended {
            depth: self.entries.len(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Address;

    #[derive(Debug, Clone, PartialEq)]
    struct Track {
        serial: u64,
        track: u32,
    }

    impl Message for Track {
        fn serial_number(&self) -> u64 {
            self.serial
        }
        fn size_bits(&self) -> usize {
            100
        }
        fn can_be_replaced_by(&self, other: &Self) -> bool {
            self.track == other.track && other.serial > self.serial
        }
        fn set_destination(&mut self, _: Address) {}
        fn reset_result(&mut self) {}
    }

    fn entry(serial: u64, track: u32, recipient: usize) -> QueueEntry<Track> {
        QueueEntry::new(0.0, Track { serial, track }, 1, PlatformIndex::from(recipient))
    }

    fn recipients(entry: &QueueEntry<Track>) -> Vec<usize> {
        entry.recipients.iter().map(|&r| r.into()).collect()
    }

    #[test]
    fn test_append() {
        let mut queue = TransmitQueue::default();
        assert_eq!(queue.enqueue(entry(1, 1, 0)), Enqueued::Appended { depth: 1 });
        assert_eq!(queue.enqueue(entry(2, 2, 0)), Enqueued::Appended { depth: 2 });
        let serials: Vec<_> = queue.iter().map(|e| e.message.serial).collect();
        assert_eq!(serials, vec![1, 2]);
    }

    #[test]
    fn test_merge_on_same_serial() {
        let mut queue = TransmitQueue::default();
        queue.enqueue(entry(7, 1, 3));
        queue.enqueue(entry(8, 2, 3));
        assert_eq!(queue.enqueue(entry(7, 1, 5)), Enqueued::Merged);
        assert_eq!(queue.enqueue(entry(7, 1, 3)), Enqueued::Merged);
        assert_eq!(queue.len(), 2);
        assert_eq!(recipients(queue.front().unwrap()), vec![3, 5]);
    }

    #[test]
    fn test_replace_keeps_position_and_window() {
        let mut queue = TransmitQueue::default();
        queue.enqueue(entry(1, 10, 0));
        queue.enqueue(entry(2, 20, 0));
        let window = TransmitWindow {
            begin: 1.0,
            complete: 2.0,
            slot: 3,
        };
        queue.front_mut().unwrap().window = Some(window);

        let outcome = queue.enqueue(entry(5, 10, 4));
        assert_eq!(
            outcome,
            Enqueued::Replaced {
                position: 0,
                previous: Track {
                    serial: 1,
                    track: 10
                }
            }
        );
        assert_eq!(queue.len(), 2);
        let front = queue.front().unwrap();
        assert_eq!(front.message.serial, 5);
        assert_eq!(front.window, Some(window));
        // Recipients of the superseded entry are kept.
        assert_eq!(recipients(front), vec![0]);
    }

    #[test]
    fn test_merge_takes_precedence_over_replace() {
        let mut queue = TransmitQueue::default();
        queue.enqueue(entry(1, 10, 0));
        queue.enqueue(entry(3, 10, 0));
        // Serial 3 could replace serial 1, but it is merged into its own entry first.
        assert_eq!(queue.enqueue(entry(3, 10, 1)), Enqueued::Merged);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_capacity() {
        let mut queue = TransmitQueue::bounded(2);
        assert!(!queue.is_full());
        queue.enqueue(entry(1, 1, 0));
        queue.enqueue(entry(2, 2, 0));
        assert!(queue.is_full());
        assert_eq!(queue.capacity(), 2);
        queue.pop_front();
        assert!(!queue.is_full());
    }

    #[test]
    fn test_purge() {
        let mut queue = TransmitQueue::default();
        queue.enqueue(entry(1, 1, 0));
        queue.enqueue(entry(2, 2, 0));
        queue.purge();
        assert!(queue.is_empty());
        assert!(queue.front().is_none());
    }

    #[test]
    fn test_relay_copy_resets_window() {
        let mut original = entry(1, 1, 0);
        original.window = Some(TransmitWindow {
            begin: 1.0,
            complete: 2.0,
            slot: 3,
        });
        let copy = original.relay_copy();
        assert!(copy.window.is_none());
        assert_eq!(copy.message, original.message);
        assert_eq!(copy.recipients, original.recipients);
    }
}
