use crate::house::{HouseId, NUM_HOUSES};
use chrono::Utc;
use std::collections::VecDeque;

/// Default cap on retained events (100 per house)
pub const DEFAULT_MAX_EVENTS: usize = NUM_HOUSES * 100;

/// Default retention window: 7 days
pub const DEFAULT_MAX_AGE_SECS: i64 = 7 * 24 * 60 * 60;

/// A logged action attributed to one house
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    /// Unix seconds at append time
    pub timestamp: i64,
    pub house: HouseId,
    pub message: String,
}

/// Eviction limits for the event log
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EventLogLimits {
    /// Hard cap on retained events
    pub max_events: usize,
    /// Entries older than this (seconds) are dropped from the front
    pub max_age_secs: i64,
}

impl Default for EventLogLimits {
    fn default() -> Self {
        Self {
            max_events: DEFAULT_MAX_EVENTS,
            max_age_secs: DEFAULT_MAX_AGE_SECS,
        }
    }
}

/// Append-only event log with count and age eviction
///
/// Append order is authoritative. Both limits are enforced on every append:
/// first the oldest entries beyond `max_events` are dropped, then the leading
/// run of entries older than `max_age_secs`. The age scan stops at the first
/// fresh entry, so a stale entry sitting behind a fresh one (clock stepped
/// backwards) survives until it reaches the front.
#[derive(Clone, Debug)]
pub struct EventLog {
    events: VecDeque<Event>,
    limits: EventLogLimits,
}

impl EventLog {
    pub fn new(limits: EventLogLimits) -> Self {
        Self {
            events: VecDeque::new(),
            limits,
        }
    }

    /// Append a message stamped with the current wall-clock time
    pub fn append(&mut self, house: HouseId, message: impl Into<String>) {
        let now = Utc::now().timestamp();
        self.push_at(
            Event {
                timestamp: now,
                house,
                message: message.into(),
            },
            now,
        );
    }

    /// Append `event` and evict relative to `now`
    pub fn push_at(&mut self, event: Event, now: i64) {
        self.events.push_back(event);
        self.evict(now);
    }

    fn evict(&mut self, now: i64) {
        let excess = self.events.len().saturating_sub(self.limits.max_events);
        self.events.drain(..excess);

        while self
            .events
            .front()
            .is_some_and(|e| now - e.timestamp > self.limits.max_age_secs)
        {
            self.events.pop_front();
        }
    }

    /// Copy of every retained event, oldest first
    pub fn read_all(&self) -> Vec<Event> {
        self.events.iter().cloned().collect()
    }

    /// Copy of the retained events for one house, oldest first
    pub fn for_house(&self, house: HouseId) -> Vec<Event> {
        self.events
            .iter()
            .filter(|e| e.house == house)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(EventLogLimits::default())
    }
}
