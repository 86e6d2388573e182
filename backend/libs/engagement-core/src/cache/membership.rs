use std::sync::Arc;
use std::time::Duration;

use super::{CacheBackend, CacheResult};
use crate::keys;
use crate::model::{EdgeKind, EntityId};

/// Per-actor sets of active edge targets, used as a fast-path probe.
///
/// A hit only means the edge was active when last recorded; the store stays
/// the authority.
pub struct EdgeMembership {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl EdgeMembership {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    pub async fn contains(&self, kind: EdgeKind, actor_id: EntityId, target_id: EntityId) -> CacheResult<bool> {
        self.backend
            .is_member(&keys::membership(kind, actor_id), &target_id.to_string())
            .await
    }

    pub async fn record(
        &self,
        kind: EdgeKind,
        actor_id: EntityId,
        target_id: EntityId,
        active: bool,
    ) -> CacheResult<()> {
        let key = keys::membership(kind, actor_id);
        let member = target_id.to_string();
        if active {
            self.backend.add_member(&key, &member, self.ttl).await
        } else {
            self.backend.remove_member(&key, &member).await
        }
    }
}
