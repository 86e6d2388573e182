//! Background refresh of derived state after authoritative commits
//!
//! Jobs flow through a bounded queue into a worker that runs at most
//! `concurrency` of them at a time. Scheduling never blocks the caller: a full
//! queue drops the job, and the affected cache entries stay stale until their
//! TTL or the next miss. Job failures are logged and counted, never surfaced.

use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::cache::CounterCache;
use crate::keys::CounterKey;
use crate::metrics::{EngineMetrics, RefreshOutcome};
use crate::model::{Direction, EdgeKind, EntityId};
use crate::ranking::Rescorer;

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshJob {
    /// An edge transition committed: update counters, and the target's score
    /// when the edge kind affects ranking.
    Edge {
        kind: EdgeKind,
        actor_id: EntityId,
        target_id: EntityId,
        direction: Direction,
    },
    /// A comment was posted (+1) or retracted (-1).
    Comment { video_id: EntityId, delta: i64 },
    /// Re-enter a video whose index seed failed at publish time.
    Rescore { video_id: EntityId },
}

/// What a job needs to touch.
pub struct RefreshContext {
    pub cache: Arc<CounterCache>,
    pub rescorer: Arc<Rescorer>,
}

impl RefreshContext {
    /// Run every step of a job. Each step's failure is logged and the
    /// remaining steps still run. Returns whether all steps succeeded.
    pub async fn execute(&self, job: &RefreshJob) -> bool {
        let mut ok = true;

        match *job {
            RefreshJob::Edge {
                kind,
                actor_id,
                target_id,
                direction,
            } => {
                for (metric, owner) in kind.owned_counters(actor_id, target_id) {
                    ok &= self
                        .apply(CounterKey::new(metric, owner), direction.delta())
                        .await;
                }

                if kind.affects_ranking() {
                    ok &= self.rescore(target_id).await;
                }
            }
            RefreshJob::Comment { video_id, delta } => {
                ok &= self.apply(CounterKey::video_comments(video_id), delta).await;
                ok &= self.rescore(video_id).await;
            }
            RefreshJob::Rescore { video_id } => {
                ok &= self.rescore(video_id).await;
            }
        }

        ok
    }

    async fn apply(&self, key: CounterKey, delta: i64) -> bool {
        match self.cache.apply_delta(key, delta).await {
            Ok(value) => {
                debug!(key = %key, delta, value, "Counter cache updated");
                true
            }
            Err(err) => {
                warn!(error = ?err, key = %key, delta, "Failed to update counter cache");
                false
            }
        }
    }

    async fn rescore(&self, video_id: EntityId) -> bool {
        match self.rescorer.rescore(video_id).await {
            Ok(_) => true,
            Err(err) => {
                warn!(error = ?err, video_id, "Failed to rescore video");
                false
            }
        }
    }
}

enum Message {
    Job(RefreshJob),
    Flush(oneshot::Sender<()>),
}

/// Cheap, cloneable producer side of the refresh queue.
#[derive(Clone)]
pub struct RefreshHandle {
    tx: mpsc::Sender<Message>,
    metrics: EngineMetrics,
}

impl RefreshHandle {
    /// Enqueue without waiting. Returns false if the job was dropped.
    pub fn schedule(&self, job: RefreshJob) -> bool {
        match self.tx.try_send(Message::Job(job)) {
            Ok(()) => true,
            Err(TrySendError::Full(Message::Job(job))) => {
                self.metrics.record_refresh(RefreshOutcome::Dropped);
                warn!(?job, "Refresh queue full, dropping job");
                false
            }
            Err(TrySendError::Closed(_)) | Err(TrySendError::Full(_)) => {
                self.metrics.record_refresh(RefreshOutcome::Dropped);
                warn!("Refresh worker stopped, dropping job");
                false
            }
        }
    }

    /// Wait until every job scheduled before this call has finished.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Message::Flush(done_tx)).await.is_err() {
            return;
        }
        let _ = done_rx.await;
    }
}

/// Owner of the worker task. Dropping it leaves the worker running until
/// every handle is gone.
pub struct RefreshWorker {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefreshWorker {
    /// Spawn the worker on the current runtime.
    pub fn spawn(context: RefreshContext, capacity: usize, concurrency: usize) -> (RefreshHandle, RefreshWorker) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let permits = concurrency.clamp(1, Semaphore::MAX_PERMITS);

        let task = tokio::spawn(run(Arc::new(context), rx, shutdown_rx, permits));

        let handle = RefreshHandle {
            tx,
            metrics: EngineMetrics::new(),
        };
        (handle, RefreshWorker { shutdown_tx, task })
    }

    /// Stop accepting jobs, finish everything already queued, then return.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(err) = self.task.await {
            error!(error = ?err, "Refresh worker terminated abnormally");
        }
    }
}

async fn run(
    context: Arc<RefreshContext>,
    mut rx: mpsc::Receiver<Message>,
    mut shutdown_rx: watch::Receiver<bool>,
    permits: usize,
) {
    let semaphore = Arc::new(Semaphore::new(permits));
    let mut tasks = JoinSet::new();
    let metrics = EngineMetrics::new();
    let mut watching = true;

    info!(permits, "Refresh worker started");

    loop {
        tokio::select! {
            changed = shutdown_rx.changed(), if watching => match changed {
                Ok(()) if *shutdown_rx.borrow() => break,
                Ok(()) => {}
                // Worker owner dropped: keep serving until the handles go away
                Err(_) => watching = false,
            },
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                log_join(joined);
            }
            message = rx.recv() => match message {
                Some(message) => {
                    dispatch(message, &context, &semaphore, permits, &mut tasks, metrics).await;
                }
                None => break,
            },
        }
    }

    // Drain whatever is already queued, then wait for in-flight jobs
    rx.close();
    while let Some(message) = rx.recv().await {
        dispatch(message, &context, &semaphore, permits, &mut tasks, metrics).await;
    }
    while let Some(joined) = tasks.join_next().await {
        log_join(joined);
    }

    info!("Refresh worker stopped");
}

async fn dispatch(
    message: Message,
    context: &Arc<RefreshContext>,
    semaphore: &Arc<Semaphore>,
    permits: usize,
    tasks: &mut JoinSet<()>,
    metrics: EngineMetrics,
) {
    match message {
        Message::Job(job) => {
            // The semaphore is never closed
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                return;
            };
            let context = context.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let outcome = if context.execute(&job).await {
                    RefreshOutcome::Completed
                } else {
                    RefreshOutcome::Failed
                };
                metrics.record_refresh(outcome);
            });
        }
        Message::Flush(done) => {
            // Every earlier job holds a permit until it finishes
            if let Ok(_all) = semaphore.acquire_many(permits as u32).await {
                let _ = done.send(());
            }
        }
    }
}

fn log_join(joined: std::result::Result<(), JoinError>) {
    if let Err(err) = joined {
        error!(error = ?err, "Refresh job panicked");
    }
}
