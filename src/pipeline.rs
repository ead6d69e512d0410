//! Producer/consumer pipeline wiring the work queue to the mapper.
//!
//! Two long-lived tasks share the process: the dispatch loop drains the
//! queue into a one-slot handoff channel, and the worker executes one
//! mapping job at a time. Both observe the same cancellation token at loop
//! granularity; an in-flight job is never aborted, only the next one is
//! prevented.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::mapper::Mapper;
use crate::models::{Job, RepoName};
use crate::queue::MappingQueue;

/// One slot keeps at most one job in flight between the loops; a send
/// blocks until the worker has taken the previous job.
const HANDOFF_CAPACITY: usize = 1;

pub struct MappingPipeline {
    queue: Arc<MappingQueue>,
    mapper: Arc<Mapper>,
    started: AtomicBool,
}

impl MappingPipeline {
    pub fn new(mapper: Arc<Mapper>) -> Self {
        Self {
            queue: Arc::new(MappingQueue::new()),
            mapper,
            started: AtomicBool::new(false),
        }
    }

    /// Queue a repository for (re)synchronization. Fire-and-forget: there
    /// is no synchronous caller waiting on the outcome, failures surface in
    /// logs only.
    pub fn enqueue(&self, repo: RepoName) {
        self.queue.push(Job { repo });
    }

    /// Jobs queued but not yet handed to the worker.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Spawn the dispatch and worker tasks. Safe to call more than once;
    /// only the first call spawns anything.
    pub fn start(&self, token: CancellationToken) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);
        tokio::spawn(dispatch_loop(Arc::clone(&self.queue), tx, token.clone()));
        tokio::spawn(worker_loop(rx, Arc::clone(&self.mapper), token));
    }
}

/// Drain the queue into the handoff channel, parking while it is empty.
///
/// Jobs still queued at cancellation are dropped: the enqueuer re-derives
/// the job set from repository existence, never from queue state. Dropping
/// `tx` on exit closes the channel, letting the worker drain and stop.
async fn dispatch_loop(queue: Arc<MappingQueue>, tx: mpsc::Sender<Job>, token: CancellationToken) {
    loop {
        tokio::select! {
            _ = queue.ready() => {}
            _ = token.cancelled() => {
                info!("changelist mapping dispatch stopping");
                return;
            }
        }

        while let Some(job) = queue.pop() {
            tokio::select! {
                sent = tx.send(job) => {
                    if sent.is_err() {
                        // Worker gone; nobody left to forward to.
                        return;
                    }
                }
                _ = token.cancelled() => {
                    info!(
                        still_queued = queue.len(),
                        "changelist mapping dispatch stopping, abandoning queued jobs"
                    );
                    return;
                }
            }
        }
    }
}

/// Execute jobs one at a time. Per-job failure is isolated: it is logged
/// with the repository attached and the loop moves on, so one repository's
/// bad day never stalls the others behind it.
async fn worker_loop(mut rx: mpsc::Receiver<Job>, mapper: Arc<Mapper>, token: CancellationToken) {
    while let Some(job) = rx.recv().await {
        if token.is_cancelled() {
            info!("changelist mapping worker stopping");
            return;
        }

        match mapper.map_repo(&job.repo).await {
            Ok(outcome) => {
                debug!(repo = %job.repo, outcome = ?outcome, "mapping job finished");
            }
            Err(error) => {
                error!(
                    repo = %job.repo,
                    error = format!("{error:#}"),
                    "failed to map perforce changelists"
                );
            }
        }
    }
    info!("changelist mapping worker stopping, handoff channel closed");
}
