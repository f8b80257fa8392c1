// House state store and bounded event log

mod event_log;
mod store;

pub use event_log::{
    Event, EventLog, EventLogLimits, DEFAULT_MAX_AGE_SECS, DEFAULT_MAX_EVENTS,
};
pub use store::{HouseStore, StoreOptions};

#[cfg(test)]
mod tests;
