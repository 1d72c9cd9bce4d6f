//! In-memory cache of ABI serializers keyed by contract account

use chain_core::abi::AbiSerializer;
use chain_core::Name;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Least recently used cache of decoded ABIs.
pub struct AbiCache {
    capacity: usize,
    cache: RwLock<HashMap<Name, CacheEntry>>,
    clock: AtomicU64,
}

struct CacheEntry {
    serializer: Arc<AbiSerializer>,
    last_access: u64,
}

impl AbiCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            cache: RwLock::new(HashMap::with_capacity(capacity)),
            clock: AtomicU64::new(0),
        }
    }

    pub fn get(&self, account: Name) -> Option<Arc<AbiSerializer>> {
        let mut cache = self.cache.write();
        let entry = cache.get_mut(&account)?;
        entry.last_access = self.tick();
        Some(entry.serializer.clone())
    }

    pub fn insert(&self, account: Name, serializer: Arc<AbiSerializer>) {
        if self.capacity == 0 {
            return;
        }
        let mut cache = self.cache.write();
        if cache.len() >= self.capacity && !cache.contains_key(&account) {
            let oldest = cache.iter().min_by_key(|(_, e)| e.last_access).map(|(k, _)| *k);
            if let Some(oldest) = oldest {
                cache.remove(&oldest);
            }
        }
        cache.insert(account, CacheEntry { serializer, last_access: self.tick() });
    }

    /// Forget the ABI of `account`, e.g. after it was replaced on chain.
    pub fn invalidate(&self, account: Name) -> bool {
        self.cache.write().remove(&account).is_some()
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }
}
