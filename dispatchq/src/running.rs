// SPDX-License-Identifier: MIT

//! Bookkeeping for jobs that are currently executing.
//!
//! Two parallel [`SlotTable`]s share one index convention: one holds the
//! running jobs, the other the cancellation flag of the worker unit driving
//! each job. The running count is kept alongside and updated in the same
//! critical section as the slot allocation, so count and occupied slots
//! agree at every quiescent observation point. The whole structure is
//! guarded by the dispatcher's running mutex.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::slot_table::SlotTable;

pub struct RunningTable<J> {
    jobs: SlotTable<Arc<J>>,
    workers: SlotTable<Arc<AtomicBool>>,
    count: usize,
}

impl<J> RunningTable<J> {
    pub fn new() -> Self {
        Self {
            jobs: SlotTable::new(),
            workers: SlotTable::new(),
            count: 0,
        }
    }

    /// Allocate parallel slots for a job that is about to run. Returns the
    /// slot index and the cancellation flag shared with the worker unit.
    pub fn register(&mut self, job: Arc<J>) -> (usize, Arc<AtomicBool>) {
        let idx = self.jobs.insert(job);
        let cancel = Arc::new(AtomicBool::new(false));
        self.workers.put(idx, cancel.clone());
        self.count += 1;
        (idx, cancel)
    }

    /// Free both slots of a finished job; returns how many jobs are still
    /// running. Tolerates a slot already emptied by disposal.
    pub fn unregister(&mut self, idx: usize) -> usize {
        self.jobs.take(idx);
        self.workers.take(idx);
        self.count = self.count.saturating_sub(1);
        self.count
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// The running jobs, in slot order.
    pub fn snapshot(&self) -> Vec<Arc<J>> {
        self.jobs.occupied().cloned().collect()
    }

    /// Flag every live worker so it skips its cleanup; the dispatcher is
    /// being torn down and the bookkeeping goes with it. Returns how many
    /// workers were flagged.
    pub fn cancel_all(&self) -> usize {
        let mut flagged = 0;
        for cancel in self.workers.occupied() {
            cancel.store(true, Ordering::Release);
            flagged += 1;
        }
        flagged
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
        self.workers.clear();
        self.count = 0;
    }
}

impl<J> Default for RunningTable<J> {
    fn default() -> Self {
        Self::new()
    }
}
