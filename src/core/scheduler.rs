use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::core::types::SimTime;
use crate::error::EngineError;

#[derive(Debug)]
struct Scheduled<T> {
    at: SimTime,
    sequence_num: u64,
    payload: T,
}

impl<T> PartialEq for Scheduled<T> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.sequence_num == other.sequence_num
    }
}

impl<T> Eq for Scheduled<T> {}

impl<T> PartialOrd for Scheduled<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Scheduled<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (BinaryHeap is max-heap by default).
        // Timestamps are validated finite on entry, so total_cmp is a plain
        // numeric order here. Ties dispatch in insertion order.
        other
            .at
            .total_cmp(&self.at)
            .then_with(|| other.sequence_num.cmp(&self.sequence_num))
    }
}

/// Pending-event queue plus the simulation clock.
///
/// The clock only moves when an event is dispatched and never rewinds;
/// scheduling behind the clock is an invariant fault, not a recoverable
/// condition.
pub struct EventQueue<T> {
    queue: BinaryHeap<Scheduled<T>>,
    sequence_counter: u64,
    now: SimTime,
}

impl<T> EventQueue<T> {
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            sequence_counter: 0,
            now: 0.0,
        }
    }

    /// Current simulation time: the timestamp of the last dispatched event.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Insert an event to fire at absolute time `at`.
    pub fn schedule(&mut self, at: SimTime, payload: T) -> Result<(), EngineError> {
        if !at.is_finite() {
            return Err(EngineError::NonFiniteTimestamp);
        }
        if at < self.now {
            return Err(EngineError::ScheduleInPast { at, now: self.now });
        }
        self.queue.push(Scheduled {
            at,
            sequence_num: self.sequence_counter,
            payload,
        });
        self.sequence_counter += 1;
        Ok(())
    }

    /// Remove and return the earliest event, advancing the clock to it.
    pub fn pop(&mut self) -> Option<(SimTime, T)> {
        let scheduled = self.queue.pop()?;
        self.now = scheduled.at;
        Some((scheduled.at, scheduled.payload))
    }

    /// Timestamp of the next event without removing it.
    pub fn peek_time(&self) -> Option<SimTime> {
        self.queue.peek().map(|scheduled| scheduled.at)
    }

    pub fn has_events(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
