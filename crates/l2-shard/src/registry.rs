//! Cached copy of the L1 shard registry.
//!
//! Primed once at startup from `GET /l1/shards` and read on every request
//! carrying an `X-Client-Group` header. Read-mostly; invalidation only
//! happens through an administrative reseed, which is out of core scope.

use std::collections::HashMap;

use parking_lot::RwLock;
use shared_types::ShardRecord;

/// Maps `client_group` to the active shard that owns it.
pub struct RegistryCache {
    routes: RwLock<HashMap<String, ShardRecord>>,
}

impl RegistryCache {
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the cache with the given records. Inactive shards are
    /// dropped so a group never routes to a retired endpoint.
    pub fn prime(&self, records: Vec<ShardRecord>) {
        let mut routes = self.routes.write();
        routes.clear();
        for record in records.into_iter().filter(ShardRecord::is_active) {
            routes.insert(record.client_group.clone(), record);
        }
    }

    /// Owning shard for a client group, if known.
    pub fn lookup(&self, client_group: &str) -> Option<ShardRecord> {
        self.routes.read().get(client_group).cloned()
    }

    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }
}

impl Default for RegistryCache {
    fn default() -> Self {
        Self::new()
    }
}
