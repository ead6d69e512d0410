//! Unbounded FIFO queue feeding the mapping pipeline.
//!
//! Non-blocking `pop` and blocking wait-for-work are deliberately distinct
//! operations: producers `push` from any task, while the dispatch loop
//! alternates between `ready().await` and draining `pop` until empty.
//! There is no capacity bound and no deduplication; enqueue volume is one
//! job per repository event, far below processing throughput.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

use crate::models::Job;

#[derive(Debug, Default)]
pub struct MappingQueue {
    jobs: Mutex<VecDeque<Job>>,
    nonempty: Notify,
}

impl MappingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job to the tail and wake one waiter, if any is parked in
    /// `ready`.
    pub fn push(&self, job: Job) {
        self.jobs.lock().expect("queue mutex poisoned").push_back(job);
        self.nonempty.notify_one();
    }

    /// Remove and return the head job, or `None` when the queue is empty.
    /// Never blocks.
    pub fn pop(&self) -> Option<Job> {
        self.jobs.lock().expect("queue mutex poisoned").pop_front()
    }

    /// Point-in-time snapshot; the queue may change before the caller acts
    /// on the answer.
    pub fn is_empty(&self) -> bool {
        self.jobs.lock().expect("queue mutex poisoned").is_empty()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().expect("queue mutex poisoned").len()
    }

    /// Wait until at least one job is queued. A push landing between the
    /// emptiness check and the wait is not lost: `notify_one` stores a
    /// permit that the next `notified().await` consumes immediately.
    pub async fn ready(&self) {
        loop {
            if !self.is_empty() {
                return;
            }
            self.nonempty.notified().await;
        }
    }
}
