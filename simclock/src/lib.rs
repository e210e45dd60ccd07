#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::default_trait_access)]

//! Discrete-event clock: a scheduler holding self-rescheduling events ordered by simulation time.
//!
//! Time is expressed in seconds as `f64`. Events scheduled for the same time are executed in the
//! order in which they were (re)scheduled.

use derive_more::{Display, From, Into};

pub use scheduler::Scheduler;

mod scheduler;

/// Identifies a scheduled event. The ID survives rescheduling.
#[derive(Debug, Display, From, Into, PartialEq, Eq, PartialOrd, Ord, Hash, Copy, Clone)]
pub struct EventId(u64);

/// What the scheduler should do with an event after it has been executed.
#[derive(Debug, PartialEq, Copy, Clone)]
pub enum Disposition {
    /// Drop the event.
    Delete,
    /// Put the same event object back on the queue at the given absolute time.
    Reschedule(f64),
}

/// An event executed by the [`Scheduler`] against a simulation context `C`.
///
/// The event is taken off the queue for the duration of [`Event::execute`], so it may freely
/// schedule other events on the scheduler it receives.
pub trait Event<C> {
    /// Executes the event at simulation `time`.
    fn execute(&mut self, time: f64, scheduler: &mut Scheduler<C>, context: &mut C) -> Disposition;
}

impl<C, F> Event<C> for F
where
    F: FnMut(f64, &mut Scheduler<C>, &mut C) -> Disposition,
{
    fn execute(&mut self, time: f64, scheduler: &mut Scheduler<C>, context: &mut C) -> Disposition {
        self(time, scheduler, context)
    }
}
