use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

struct Slot {
    mutex: Arc<AsyncMutex<()>>,
    /// Tasks holding or waiting on `mutex`.
    users: usize,
}

type Slots = Arc<Mutex<HashMap<String, Slot>>>;

/// One async mutex per key. Used to serialize mutations of a single session.
#[derive(Default)]
pub struct KeyedLocks {
    inner: Slots,
}

/// Held while a key is locked. Dropping it unlocks the key and frees the
/// slot once nobody else holds or waits on it.
pub struct KeyedGuard {
    _guard: OwnedMutexGuard<()>,
    _ticket: Ticket,
}

/// Counts one user of a slot; the last one out removes it. Also covers a
/// `lock` future dropped while still waiting.
struct Ticket {
    slots: Slots,
    key: String,
}

impl Drop for Ticket {
    fn drop(&mut self) {
        let mut map = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(slot) = map.get_mut(&self.key) {
            slot.users -= 1;
            if slot.users == 0 {
                map.remove(&self.key);
            }
        }
    }
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other task holds `key`, then returns the guard.
    pub async fn lock(&self, key: &str) -> KeyedGuard {
        let mutex = {
            let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
            let slot = map.entry(key.to_string()).or_insert_with(|| Slot {
                mutex: Arc::new(AsyncMutex::new(())),
                users: 0,
            });
            slot.users += 1;
            slot.mutex.clone()
        };
        let ticket = Ticket {
            slots: self.inner.clone(),
            key: key.to_string(),
        };
        let guard = mutex.lock_owned().await;
        KeyedGuard {
            _guard: guard,
            _ticket: ticket,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
