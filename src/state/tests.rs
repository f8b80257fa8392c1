use super::*;
use crate::backing::{BackingError, BackingStore, MemoryStore, STATE_KEY};
use crate::house::{HouseId, NUM_HOUSES};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

fn house(i: usize) -> HouseId {
    HouseId::new(i).unwrap()
}

fn memory_backing(store: &Arc<MemoryStore>) -> Option<Arc<dyn BackingStore>> {
    Some(store.clone() as Arc<dyn BackingStore>)
}

/// Backing store whose `set` parks until released
struct ParkedStore {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl BackingStore for ParkedStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, BackingError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), BackingError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }
}

#[tokio::test]
async fn test_new_store_is_blank() {
    let store = HouseStore::new(None, StoreOptions::default());

    assert_eq!(store.snapshot().await, [false; NUM_HOUSES]);
    assert_eq!(store.state_bits().await, 0);
    assert_eq!(store.last_seen().await, [0; NUM_HOUSES]);
    assert!(store.events().await.is_empty());
    assert!(!store.has_backing());
}

#[tokio::test]
async fn test_set_then_unset_leaves_others_untouched() {
    let store = HouseStore::new(None, StoreOptions::default());
    store.set(house(1), true).await;
    store.set(house(3), true).await;
    store.set(house(3), false).await;

    assert!(!store.get(house(3)).await);
    assert!(store.get(house(1)).await);
    for i in [0, 2, 4, 5, 6, 7] {
        assert!(!store.get(house(i)).await, "house {}", i);
    }
    assert_eq!(store.state_bits().await, 0b10);
}

#[tokio::test]
async fn test_set_mirrors_to_backing_store() {
    let memory = Arc::new(MemoryStore::new());
    let store = HouseStore::load(memory_backing(&memory), StoreOptions::default()).await;

    store.set(house(0), true).await;
    store.set(house(7), true).await;

    assert_eq!(memory.peek(STATE_KEY).as_deref(), Some("129"));
}

#[tokio::test]
async fn test_load_restores_persisted_state() {
    let memory = Arc::new(MemoryStore::with_value(STATE_KEY, "5"));
    let store = HouseStore::load(memory_backing(&memory), StoreOptions::default()).await;

    assert!(store.get(house(0)).await);
    assert!(!store.get(house(1)).await);
    assert!(store.get(house(2)).await);
    assert!(store.has_backing());
}

#[tokio::test]
async fn test_load_survives_restart() {
    let memory = Arc::new(MemoryStore::new());
    {
        let store = HouseStore::load(memory_backing(&memory), StoreOptions::default()).await;
        store.set(house(4), true).await;
    }

    let restarted = HouseStore::load(memory_backing(&memory), StoreOptions::default()).await;
    assert!(restarted.get(house(4)).await);
    assert_eq!(restarted.state_bits().await, 16);
}

#[tokio::test]
async fn test_load_corrupt_state_defaults_blank() {
    let memory = Arc::new(MemoryStore::with_value(STATE_KEY, "not a number"));
    let store = HouseStore::load(memory_backing(&memory), StoreOptions::default()).await;
    assert_eq!(store.state_bits().await, 0);
}

#[tokio::test]
async fn test_load_unavailable_backing_defaults_blank() {
    let memory = Arc::new(MemoryStore::with_value(STATE_KEY, "255"));
    memory.set_available(false);

    let store = HouseStore::load(memory_backing(&memory), StoreOptions::default()).await;
    assert_eq!(store.state_bits().await, 0);
}

#[tokio::test]
async fn test_set_with_failing_backing_keeps_memory_state() {
    let memory = Arc::new(MemoryStore::new());
    let store = HouseStore::load(memory_backing(&memory), StoreOptions::default()).await;
    memory.set_available(false);

    store.set(house(2), true).await;

    assert!(store.get(house(2)).await);
    assert_eq!(memory.peek(STATE_KEY), None);
}

#[tokio::test]
async fn test_slow_backing_is_bounded_by_timeout() {
    let parked = Arc::new(ParkedStore {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let options = StoreOptions {
        persist_timeout: Duration::from_millis(20),
        ..StoreOptions::default()
    };
    let store = HouseStore::new(Some(parked as Arc<dyn BackingStore>), options);

    // Never released: set must still return once the timeout fires
    tokio::time::timeout(Duration::from_secs(2), store.set(house(6), true))
        .await
        .expect("set should not wait on a stalled backing store");
    assert!(store.get(house(6)).await);
}

#[tokio::test]
async fn test_load_initial_resets_seen_and_log() {
    let memory = Arc::new(MemoryStore::new());
    let store = HouseStore::load(memory_backing(&memory), StoreOptions::default()).await;

    store.set(house(1), true).await;
    store.record_seen_at(house(1), 1_700_000_000).await;
    store.log_event(house(1), "handle_turn_on").await;

    store.load_initial().await;

    // State comes back from the backing store, the rest is reset
    assert!(store.get(house(1)).await);
    assert_eq!(store.last_seen().await, [0; NUM_HOUSES]);
    assert!(store.events().await.is_empty());
}

#[tokio::test]
async fn test_record_seen() {
    let store = HouseStore::new(None, StoreOptions::default());
    store.record_seen(house(5)).await;

    let seen = store.last_seen().await;
    assert!(seen[5] > 0);
    assert_eq!(seen.iter().filter(|ts| **ts != 0).count(), 1);
}

#[tokio::test]
async fn test_log_events_filtered_by_house() {
    let store = HouseStore::new(None, StoreOptions::default());
    store.log_event(house(2), "handle_turn_on").await;
    store.log_event(house(3), "handle_turn_off").await;
    store.log_event(house(2), "handle_target_mac").await;

    assert_eq!(store.events().await.len(), 3);
    let twos = store.events_for(house(2)).await;
    assert_eq!(twos.len(), 2);
    assert_eq!(twos[0].message, "handle_turn_on");
    assert_eq!(twos[1].message, "handle_target_mac");
}

#[tokio::test]
async fn test_log_respects_configured_cap() {
    let options = StoreOptions {
        event_limits: EventLogLimits {
            max_events: 5,
            max_age_secs: DEFAULT_MAX_AGE_SECS,
        },
        ..StoreOptions::default()
    };
    let store = HouseStore::new(None, options);
    for i in 0..12 {
        store.log_event(house(0), format!("event {}", i)).await;
    }

    let events = store.events().await;
    assert_eq!(events.len(), 5);
    assert_eq!(events[0].message, "event 7");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reads_wait_for_in_flight_write() {
    let parked = Arc::new(ParkedStore {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let options = StoreOptions {
        persist_timeout: Duration::from_secs(5),
        ..StoreOptions::default()
    };
    let store = Arc::new(HouseStore::new(
        Some(parked.clone() as Arc<dyn BackingStore>),
        options,
    ));

    let writer = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.set(house(3), true).await })
    };
    // Writer now holds the lock and is persisting
    parked.entered.notified().await;

    let blocked = tokio::time::timeout(Duration::from_millis(50), store.snapshot()).await;
    assert!(blocked.is_err(), "read must not complete while the write is persisting");

    parked.release.notify_one();
    writer.await.unwrap();

    assert!(store.get(house(3)).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reads_see_whole_writes() {
    let store = Arc::new(HouseStore::new(None, StoreOptions::default()));

    // Writer turns houses on in order, then off in order. Any consistent
    // snapshot is therefore a run of equal values followed by the opposite.
    let writer = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            for _ in 0..50 {
                for i in 0..NUM_HOUSES {
                    store.set(house(i), true).await;
                }
                for i in 0..NUM_HOUSES {
                    store.set(house(i), false).await;
                }
            }
        })
    };

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for _ in 0..200 {
                    let snapshot = store.snapshot().await;
                    let changes = snapshot.windows(2).filter(|w| w[0] != w[1]).count();
                    assert!(changes <= 1, "inconsistent snapshot {:?}", snapshot);
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    for result in futures::future::join_all(readers).await {
        result.unwrap();
    }
    writer.await.unwrap();
    assert_eq!(store.state_bits().await, 0);
}
