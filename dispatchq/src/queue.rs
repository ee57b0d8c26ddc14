// SPDX-License-Identifier: MIT

//! FIFO queue of pending jobs, deduplicated on insert.
//!
//! Jobs are opaque `Arc` handles; identity equality (`Arc::ptr_eq`) decides
//! whether an enqueue is a duplicate. The queue itself is not synchronized,
//! the dispatcher wraps it in the single queue mutex.

use std::collections::VecDeque;
use std::sync::Arc;

pub struct PendingQueue<J> {
    jobs: VecDeque<Arc<J>>,
}

impl<J> PendingQueue<J> {
    pub fn new() -> Self {
        Self {
            jobs: VecDeque::new(),
        }
    }

    /// Append `job` to the tail. An enqueue of a job already present (same
    /// identity) is a no-op; returns whether the job was actually added.
    pub fn enqueue(&mut self, job: Arc<J>) -> bool {
        if self.jobs.iter().any(|queued| Arc::ptr_eq(queued, &job)) {
            return false;
        }
        self.jobs.push_back(job);
        true
    }

    /// Pop and return the head, or `None` if the queue is empty.
    pub fn dequeue(&mut self) -> Option<Arc<J>> {
        self.jobs.pop_front()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Queued jobs in FIFO order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<J>> {
        self.jobs.iter()
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
    }
}

impl<J> Default for PendingQueue<J> {
    fn default() -> Self {
        Self::new()
    }
}
