//! Idempotent add/remove for favorite and follow edges.

use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::cache::EdgeMembership;
use crate::collaborators::EntityDirectory;
use crate::error::{EngagementError, Result};
use crate::metrics::EngineMetrics;
use crate::model::{Direction, EdgeKind, EntityId, ToggleAction};
use crate::refresh::{RefreshHandle, RefreshJob};
use crate::store::CounterStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The edge moved and a refresh was scheduled.
    Applied(Direction),
    /// The edge was already in the requested state, or a concurrent request
    /// got there first.
    Unchanged,
    /// The membership set already showed the edge as active.
    ShortCircuited,
}

impl ToggleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ToggleOutcome::Applied(_) => "applied",
            ToggleOutcome::Unchanged => "unchanged",
            ToggleOutcome::ShortCircuited => "short_circuited",
        }
    }
}

pub struct RelationToggle {
    store: Arc<dyn CounterStore>,
    membership: Arc<EdgeMembership>,
    directory: Arc<dyn EntityDirectory>,
    refresh: RefreshHandle,
    metrics: EngineMetrics,
}

impl RelationToggle {
    pub fn new(
        store: Arc<dyn CounterStore>,
        membership: Arc<EdgeMembership>,
        directory: Arc<dyn EntityDirectory>,
        refresh: RefreshHandle,
    ) -> Self {
        Self {
            store,
            membership,
            directory,
            refresh,
            metrics: EngineMetrics::new(),
        }
    }

    #[instrument(skip(self), fields(kind = %kind))]
    pub async fn toggle(
        &self,
        kind: EdgeKind,
        actor_id: EntityId,
        target_id: EntityId,
        action: ToggleAction,
    ) -> Result<ToggleOutcome> {
        let outcome = self.run(kind, actor_id, target_id, action).await?;
        self.metrics.record_toggle(kind, outcome.label());
        Ok(outcome)
    }

    async fn run(
        &self,
        kind: EdgeKind,
        actor_id: EntityId,
        target_id: EntityId,
        action: ToggleAction,
    ) -> Result<ToggleOutcome> {
        if kind == EdgeKind::Follow && actor_id == target_id {
            return Err(EngagementError::Validation("cannot follow yourself".to_string()));
        }

        let target_kind = kind.target_kind();
        if !self.directory.exists(target_kind, target_id).await? {
            return Err(EngagementError::NotFound(format!(
                "{} {} does not exist",
                target_kind, target_id
            )));
        }

        if action == ToggleAction::Add {
            match self.membership.contains(kind, actor_id, target_id).await {
                Ok(true) => return Ok(ToggleOutcome::ShortCircuited),
                Ok(false) => {}
                Err(err) => warn!(error = ?err, "Membership probe failed, reading store"),
            }
        }

        let state = self.store.edge_state(kind, actor_id, target_id).await?;
        let Some(direction) = Direction::plan(action, state) else {
            debug!(%state, ?action, "Edge already in requested state");
            return Ok(ToggleOutcome::Unchanged);
        };

        if direction == Direction::Delete {
            // A stale active entry would short-circuit the next add
            self.record_membership(kind, actor_id, target_id, false).await;
        }

        match self
            .store
            .apply_edge_mutation(kind, actor_id, target_id, direction)
            .await
        {
            Ok(()) => {}
            // Lost a race to a concurrent add; the edge is active either way
            Err(EngagementError::EdgeState(reason)) if direction != Direction::Delete => {
                debug!(%reason, %direction, "Concurrent toggle already applied");
                return Ok(ToggleOutcome::Unchanged);
            }
            Err(err) => return Err(err),
        }

        // Written inline so membership follows the caller's request order
        self.record_membership(kind, actor_id, target_id, direction != Direction::Delete)
            .await;
        self.refresh.schedule(RefreshJob::Edge {
            kind,
            actor_id,
            target_id,
            direction,
        });

        Ok(ToggleOutcome::Applied(direction))
    }

    async fn record_membership(&self, kind: EdgeKind, actor_id: EntityId, target_id: EntityId, active: bool) {
        if let Err(err) = self.membership.record(kind, actor_id, target_id, active).await {
            warn!(error = ?err, %kind, actor_id, target_id, active, "Failed to update membership set");
        }
    }
}
