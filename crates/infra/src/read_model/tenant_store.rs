use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use ledgerforge_core::TenantId;

/// Tenant-isolated key/value store for disposable read models.
///
/// Read models can always be rebuilt from the event store, so a poisoned lock
/// degrades to "no data" rather than an error.
pub trait TenantStore<K, V>: Send + Sync {
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V>;

    fn upsert(&self, tenant_id: TenantId, key: K, value: V);

    /// Read-modify-write under a single lock; `init` seeds a missing record.
    fn update(&self, tenant_id: TenantId, key: K, init: &dyn Fn() -> V, f: &mut dyn FnMut(&mut V));

    fn list(&self, tenant_id: TenantId) -> Vec<V>;

    /// Drop every record of a tenant (rebuild support).
    fn clear_tenant(&self, tenant_id: TenantId);
}

impl<K, V, S> TenantStore<K, V> for Arc<S>
where
    S: TenantStore<K, V> + ?Sized,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        (**self).get(tenant_id, key)
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        (**self).upsert(tenant_id, key, value)
    }

    fn update(&self, tenant_id: TenantId, key: K, init: &dyn Fn() -> V, f: &mut dyn FnMut(&mut V)) {
        (**self).update(tenant_id, key, init, f)
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        (**self).list(tenant_id)
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        (**self).clear_tenant(tenant_id)
    }
}

/// In-memory tenant store for tests/dev.
#[derive(Debug)]
pub struct InMemoryTenantStore<K, V> {
    inner: RwLock<HashMap<TenantId, HashMap<K, V>>>,
}

impl<K, V> InMemoryTenantStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryTenantStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TenantStore<K, V> for InMemoryTenantStore<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(&tenant_id)?.get(key).cloned()
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.entry(tenant_id).or_default().insert(key, value);
        }
    }

    fn update(&self, tenant_id: TenantId, key: K, init: &dyn Fn() -> V, f: &mut dyn FnMut(&mut V)) {
        if let Ok(mut map) = self.inner.write() {
            let record = map.entry(tenant_id).or_default().entry(key).or_insert_with(init);
            f(record);
        }
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        match self.inner.read() {
            Ok(map) => map
                .get(&tenant_id)
                .map(|records| records.values().cloned().collect())
                .unwrap_or_default(),
            Err(_) => vec![],
        }
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(&tenant_id);
        }
    }
}
