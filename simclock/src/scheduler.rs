use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;

use ordered_float::OrderedFloat;

use crate::{Disposition, Event, EventId};

/// Entry type stored in the scheduler: the boxed event, its ID, and the time when it is supposed
/// to occur along with its insertion sequence number.
struct EventEntry<C> {
    key: Reverse<(OrderedFloat<f64>, u64)>,
    id: EventId,
    inner: Box<dyn Event<C>>,
}

impl<C> EventEntry<C> {
    fn time(&self) -> f64 {
        (self.key.0).0.into_inner()
    }
}

impl<C> fmt::Debug for EventEntry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEntry")
            .field("time", &self.time())
            .field("id", &self.id)
            .finish()
    }
}

impl<C> PartialEq for EventEntry<C> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<C> Eq for EventEntry<C> {}

impl<C> PartialOrd for EventEntry<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C> Ord for EventEntry<C> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

/// Scheduler is used to keep the current time and the upcoming events.
pub struct Scheduler<C> {
    events: BinaryHeap<EventEntry<C>>,
    time: f64,
    next_sequence: u64,
    next_id: u64,
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self {
            events: BinaryHeap::new(),
            time: 0.0,
            next_sequence: 0,
            next_id: 0,
        }
    }
}

impl<C> Scheduler<C> {
    /// Schedules `event` to be executed at the absolute simulation `time`.
    ///
    /// Times in the past are moved up to the current time.
    pub fn schedule(&mut self, time: f64, event: Box<dyn Event<C>>) -> EventId {
        let id = EventId::from(self.next_id);
        self.next_id += 1;
        self.push(time, id, event);
        id
    }

    /// Schedules `event` to be executed at the current simulation time, after all events already
    /// scheduled for this time.
    pub fn schedule_immediately(&mut self, event: Box<dyn Event<C>>) -> EventId {
        self.schedule(self.time, event)
    }

    fn push(&mut self, time: f64, id: EventId, inner: Box<dyn Event<C>>) {
        let time = if time < self.time {
            log::warn!(
                "Event {} scheduled in the past ({} < {}); executing now",
                id,
                time,
                self.time
            );
            self.time
        } else {
            time
        };
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.events.push(EventEntry {
            key: Reverse((OrderedFloat(time), sequence)),
            id,
            inner,
        });
    }

    /// Returns the current simulation time.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Time of the next scheduled event, if any.
    #[must_use]
    pub fn peek_time(&self) -> Option<f64> {
        self.events.peek().map(EventEntry::time)
    }

    /// Number of events waiting to be executed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.events.len()
    }

    /// Executes the next event, advancing the clock to its time.
    /// Returns `false` if there were no events left.
    pub fn step(&mut self, context: &mut C) -> bool {
        match self.events.pop() {
            Some(mut entry) => {
                self.time = entry.time();
                match entry.inner.execute(self.time, self, context) {
                    Disposition::Delete => {}
                    Disposition::Reschedule(time) => self.push(time, entry.id, entry.inner),
                }
                true
            }
            None => false,
        }
    }

    /// Runs until there are no more events scheduled at or before `end`.
    /// Returns the time of the last executed event.
    pub fn run_until(&mut self, context: &mut C, end: f64) -> f64 {
        while self.peek_time().map_or(false, |time| time <= end) {
            self.step(context);
        }
        self.time
    }

    /// Runs until the event queue is exhausted.
    pub fn run(&mut self, context: &mut C) -> f64 {
        while self.step(context) {}
        self.time
    }
}

#[cfg(test)]
mod test {
    use super::*;

    type Log = Vec<(f64, &'static str)>;

    fn recorder(label: &'static str) -> Box<dyn Event<Log>> {
        Box::new(move |time: f64, _: &mut Scheduler<Log>, log: &mut Log| {
            log.push((time, label));
            Disposition::Delete
        })
    }

    #[test]
    fn test_scheduler_order() {
        let mut scheduler = Scheduler::default();
        let mut log = Vec::new();
        assert_eq!(scheduler.time(), 0.0);

        scheduler.schedule(1.0, recorder("a"));
        scheduler.schedule(0.0, recorder("b"));
        scheduler.schedule(2.0, recorder("c"));
        assert_eq!(scheduler.pending(), 3);

        assert!(scheduler.step(&mut log));
        assert_eq!(scheduler.time(), 0.0);
        assert!(scheduler.step(&mut log));
        assert_eq!(scheduler.time(), 1.0);
        assert!(scheduler.step(&mut log));
        assert_eq!(scheduler.time(), 2.0);
        assert!(!scheduler.step(&mut log));

        assert_eq!(log, vec![(0.0, "b"), (1.0, "a"), (2.0, "c")]);
    }

    #[test]
    fn test_insertion_order_breaks_ties() {
        let mut scheduler = Scheduler::default();
        let mut log = Vec::new();
        scheduler.schedule(5.0, recorder("first"));
        scheduler.schedule(5.0, recorder("second"));
        scheduler.schedule(5.0, recorder("third"));
        scheduler.run(&mut log);
        assert_eq!(log, vec![(5.0, "first"), (5.0, "second"), (5.0, "third")]);
    }

    #[test]
    fn test_reschedule_keeps_id_and_object() {
        let mut scheduler: Scheduler<Vec<u32>> = Scheduler::default();
        let mut counter = 0;
        let id = scheduler.schedule(
            1.0,
            Box::new(move |time: f64, _: &mut Scheduler<Vec<u32>>, log: &mut Vec<u32>| {
                counter += 1;
                log.push(counter);
                if counter < 3 {
                    Disposition::Reschedule(time + 1.0)
                } else {
                    Disposition::Delete
                }
            }),
        );
        assert_eq!(id, EventId::from(0));
        let mut log = Vec::new();
        assert_eq!(scheduler.run(&mut log), 3.0);
        assert_eq!(log, vec![1, 2, 3]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_run_until_stops_at_end() {
        let mut scheduler = Scheduler::default();
        let mut log = Vec::new();
        scheduler.schedule(1.0, recorder("a"));
        scheduler.schedule(3.0, recorder("b"));
        assert_eq!(scheduler.run_until(&mut log, 2.0), 1.0);
        assert_eq!(scheduler.peek_time(), Some(3.0));
        assert_eq!(log, vec![(1.0, "a")]);
    }

    #[test]
    fn test_past_events_run_now() {
        let mut scheduler = Scheduler::default();
        let mut log = Vec::new();
        scheduler.schedule(4.0, recorder("a"));
        scheduler.step(&mut log);
        scheduler.schedule(1.0, recorder("late"));
        scheduler.step(&mut log);
        assert_eq!(log, vec![(4.0, "a"), (4.0, "late")]);
    }

    proptest::proptest! {
        #[test]
        fn test_times_never_decrease(times in proptest::collection::vec(0.0..100.0_f64, 1..50)) {
            let mut scheduler = Scheduler::default();
            let mut log = Vec::new();
            for &time in &times {
                scheduler.schedule(time, recorder("x"));
            }
            scheduler.run(&mut log);
            proptest::prop_assert_eq!(log.len(), times.len());
            proptest::prop_assert!(log.windows(2).all(|w| w[0].0 <= w[1].0));
        }
    }
}
