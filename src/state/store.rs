use crate::backing::{BackingError, BackingStore, STATE_KEY};
use crate::codec::{self, StateVector};
use crate::house::{HouseId, NUM_HOUSES};
use crate::state::event_log::{Event, EventLog, EventLogLimits};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Tunables for [`HouseStore`]
#[derive(Clone, Debug)]
pub struct StoreOptions {
    /// Upper bound on each backing store call made by the store
    pub persist_timeout: Duration,
    pub event_limits: EventLogLimits,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            persist_timeout: Duration::from_millis(500),
            event_limits: EventLogLimits::default(),
        }
    }
}

/// Everything guarded by the store lock
struct Inner {
    states: StateVector,
    /// Unix seconds of the last authenticated state poll, 0 = never
    last_seen: [i64; NUM_HOUSES],
    log: EventLog,
}

/// House state store
///
/// Holds the on/off vector, the last-seen table and the event log behind a
/// single reader/writer lock. Every `set` mirrors the full vector into the
/// backing store while still holding the write lock, so concurrent readers
/// never observe a vector that differs from what is being persisted.
///
/// The backing store is optional and best-effort: its failures are logged
/// and never surface to callers. In-memory state is authoritative.
pub struct HouseStore {
    inner: RwLock<Inner>,
    backing: Option<Arc<dyn BackingStore>>,
    persist_timeout: Duration,
}

impl HouseStore {
    /// Create a store with every house off and nothing loaded
    pub fn new(backing: Option<Arc<dyn BackingStore>>, options: StoreOptions) -> Self {
        Self {
            inner: RwLock::new(Inner {
                states: codec::blank(),
                last_seen: [0; NUM_HOUSES],
                log: EventLog::new(options.event_limits),
            }),
            backing,
            persist_timeout: options.persist_timeout,
        }
    }

    /// Create a store and restore the persisted state from `backing`
    pub async fn load(backing: Option<Arc<dyn BackingStore>>, options: StoreOptions) -> Self {
        let store = Self::new(backing, options);
        store.load_initial().await;
        store
    }

    /// (Re)initialise from the backing store
    ///
    /// The state vector comes from the backing store when it holds a valid
    /// value and defaults to all-off otherwise. The last-seen table and the
    /// event log are always reset.
    pub async fn load_initial(&self) {
        let states = match &self.backing {
            Some(backing) => self.restore(backing.as_ref()).await,
            None => {
                info!("No backing store configured, defaulting to a blank state");
                codec::blank()
            }
        };

        let mut inner = self.inner.write().await;
        inner.states = states;
        inner.last_seen = [0; NUM_HOUSES];
        inner.log.clear();
    }

    async fn restore(&self, backing: &dyn BackingStore) -> StateVector {
        info!("Retrieving initial state from backing store");

        let fetched = timeout(self.persist_timeout, backing.get(STATE_KEY))
            .await
            .unwrap_or(Err(BackingError::Timeout));

        match fetched {
            Ok(Some(text)) => match codec::decode(&text) {
                Ok(states) => {
                    info!(
                        state = %codec::format_bits(codec::encode(&states)),
                        "Loaded persisted state"
                    );
                    states
                }
                Err(e) => {
                    warn!(error = %e, "Persisted state is corrupt, loading a blank state instead");
                    codec::blank()
                }
            },
            Ok(None) => {
                info!("No persisted state found, loading a blank state");
                codec::blank()
            }
            Err(e) => {
                warn!(error = %e, "Error loading state from backing store, loading a blank state");
                codec::blank()
            }
        }
    }

    /// Whether a backing store was configured (it may still be degraded)
    pub fn has_backing(&self) -> bool {
        self.backing.is_some()
    }

    /// On/off state of one house
    pub async fn get(&self, house: HouseId) -> bool {
        self.inner.read().await.states[house.index()]
    }

    /// Switch a house on or off and mirror the new vector to the backing store
    pub async fn set(&self, house: HouseId, on: bool) {
        let mut inner = self.inner.write().await;
        inner.states[house.index()] = on;

        let Some(backing) = &self.backing else {
            return;
        };

        let packed = codec::encode(&inner.states);
        let saved = timeout(self.persist_timeout, backing.set(STATE_KEY, &packed.to_string()))
            .await
            .unwrap_or(Err(BackingError::Timeout));

        match saved {
            Ok(()) => debug!(state = %codec::format_bits(packed), "Saved state to backing store"),
            Err(e) => warn!(
                house = %house,
                error = %e,
                "Error saving state to backing store, change kept in memory only"
            ),
        }
    }

    /// Copy of the full state vector
    pub async fn snapshot(&self) -> StateVector {
        self.inner.read().await.states
    }

    /// Full state vector in packed form
    pub async fn state_bits(&self) -> u64 {
        codec::encode(&self.inner.read().await.states)
    }

    /// Mark `house` as having checked in now
    pub async fn record_seen(&self, house: HouseId) {
        self.record_seen_at(house, Utc::now().timestamp()).await;
    }

    /// Mark `house` as having checked in at `timestamp` (Unix seconds)
    pub(crate) async fn record_seen_at(&self, house: HouseId, timestamp: i64) {
        self.inner.write().await.last_seen[house.index()] = timestamp;
    }

    /// Copy of the last-seen table
    pub async fn last_seen(&self) -> [i64; NUM_HOUSES] {
        self.inner.read().await.last_seen
    }

    /// Append an event for `house` to the log
    pub async fn log_event(&self, house: HouseId, message: impl Into<String>) {
        let mut inner = self.inner.write().await;
        inner.log.append(house, message);
        debug!(house = %house, events = inner.log.len(), "Event logged");
    }

    /// Copy of the whole event log, oldest first
    pub async fn events(&self) -> Vec<Event> {
        self.inner.read().await.log.read_all()
    }

    /// Copy of one house's events, oldest first
    pub async fn events_for(&self, house: HouseId) -> Vec<Event> {
        self.inner.read().await.log.for_house(house)
    }
}
