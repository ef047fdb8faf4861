use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;

use splitledger_core::GroupId;
use std::sync::Arc;

/// Group-isolated key/value store abstraction for disposable read models.
pub trait GroupStore<K, V>: Send + Sync {
    fn get(&self, group_id: GroupId, key: &K) -> Option<V>;
    fn upsert(&self, group_id: GroupId, key: K, value: V);
    fn list(&self, group_id: GroupId) -> Vec<V>;
    /// Clear all read-model records for a group (rebuild support).
    fn clear_group(&self, group_id: GroupId);
}

impl<K, V, S> GroupStore<K, V> for Arc<S>
where
    S: GroupStore<K, V> + ?Sized,
{
    fn get(&self, group_id: GroupId, key: &K) -> Option<V> {
        (**self).get(group_id, key)
    }

    fn upsert(&self, group_id: GroupId, key: K, value: V) {
        (**self).upsert(group_id, key, value)
    }

    fn list(&self, group_id: GroupId) -> Vec<V> {
        (**self).list(group_id)
    }

    fn clear_group(&self, group_id: GroupId) {
        (**self).clear_group(group_id)
    }
}

/// In-memory group-isolated store for tests/dev.
#[derive(Debug)]
pub struct InMemoryGroupStore<K, V> {
    inner: RwLock<HashMap<(GroupId, K), V>>,
}

impl<K, V> InMemoryGroupStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryGroupStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> GroupStore<K, V> for InMemoryGroupStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, group_id: GroupId, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(&(group_id, key.clone())).cloned()
    }

    fn upsert(&self, group_id: GroupId, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((group_id, key), value);
        }
    }

    fn list(&self, group_id: GroupId) -> Vec<V> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.iter()
            .filter_map(|((g, _k), v)| if *g == group_id { Some(v.clone()) } else { None })
            .collect()
    }

    fn clear_group(&self, group_id: GroupId) {
        if let Ok(mut map) = self.inner.write() {
            map.retain(|(g, _k), _v| *g != group_id);
        }
    }
}
