// SPDX-License-Identifier: MIT

//! The dispatcher: a FIFO job queue drained by one control thread into a
//! shared worker pool, with a permit gate bounding concurrency.
//!
//! The control thread is the only consumer of queue pops for dispatch and
//! the only submitter of worker units. Both of its waits (idle and permit
//! acquisition) also watch the stop channel, so shutdown wins any race and
//! the thread exits promptly. Lock order is queue before running wherever
//! both are held.

use std::panic::{self, AssertUnwindSafe};
use std::pin::pin;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use async_channel::{Receiver, Sender};
use futures::executor::ThreadPool;
use futures::{select_biased, FutureExt};
use log::{debug, error, info, warn};

use crate::gate::ConcurrencyGate;
use crate::queue::PendingQueue;
use crate::running::RunningTable;

/// Concurrency limit used by [`Dispatcher::default`].
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 20;

/// Caller-supplied callback that executes one job. Failures are the
/// executor's own responsibility to record onto the job; a panic here is
/// contained in the worker unit and discarded.
pub type JobExecutor<J> = Arc<dyn Fn(Arc<J>) + Send + Sync>;

/// Callback fired when both the queue and the running set are empty.
pub type IdleNotify = Arc<dyn Fn() + Send + Sync>;

/// State shared between the API surface, the control thread and the worker
/// units.
struct Shared<J> {
    queue: Mutex<PendingQueue<J>>,
    running: Mutex<RunningTable<J>>,
    gate: Mutex<ConcurrencyGate>,
    executor: Mutex<Option<JobExecutor<J>>>,
    idle_notify: Mutex<Option<IdleNotify>>,
    /// Work-available signal; capacity 1, a failed send means the loop is
    /// already signaled (or gone), which is fine either way.
    trigger_tx: Sender<()>,
    trigger_rx: Receiver<()>,
    /// Stop signal, modeled as a done-channel: nothing is ever sent, the
    /// channel is closed to signal shutdown and every receive errors out.
    stop_tx: Sender<()>,
    stop_rx: Receiver<()>,
}

impl<J> Shared<J> {
    fn queue_count(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    fn running_count(&self) -> usize {
        self.running.lock().unwrap().count()
    }

    fn gate_receiver(&self) -> Receiver<()> {
        self.gate.lock().unwrap().receiver()
    }

    fn release_permit(&self) {
        self.gate.lock().unwrap().release();
    }

    fn signal_shutdown(&self) {
        self.stop_tx.close();
    }

    fn notify_idle(&self) {
        let notify = self.idle_notify.lock().unwrap().clone();
        if let Some(notify) = notify {
            notify();
        }
    }
}

/// Outcome of one permit acquisition attempt.
enum Acquire {
    Permit,
    GateReplaced,
    Shutdown,
}

/// Block until a permit or the stop signal, whichever comes first. The stop
/// arm is checked first so shutdown wins a tie.
async fn acquire_permit<J>(shared: &Shared<J>) -> Acquire {
    let gate_rx = shared.gate_receiver();
    let mut stop = pin!(shared.stop_rx.recv().fuse());
    let mut permit = pin!(gate_rx.recv().fuse());
    select_biased! {
        _ = stop => Acquire::Shutdown,
        res = permit => match res {
            Ok(()) => Acquire::Permit,
            // The gate was replaced by a reconfiguration; retry against the
            // current one.
            Err(_) => Acquire::GateReplaced,
        },
    }
}

/// Block until new work or the stop signal; `false` means shutdown.
async fn wait_for_work<J>(shared: &Shared<J>) -> bool {
    let mut stop = pin!(shared.stop_rx.recv().fuse());
    let mut trigger = pin!(shared.trigger_rx.recv().fuse());
    select_biased! {
        _ = stop => false,
        res = trigger => res.is_ok(),
    }
}

/// One job's run on the worker pool: register, execute, clean up, notify.
async fn run_worker<J: Send + Sync + 'static>(
    shared: Arc<Shared<J>>,
    job: Arc<J>,
    executor: JobExecutor<J>,
) {
    let (slot, cancel) = shared.running.lock().unwrap().register(job.clone());
    debug!("executing job in slot {slot}");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| executor(job)));
    if outcome.is_err() {
        // Contained here so one failing job never blocks the others; the
        // executor records failure onto the job if the caller cares.
        debug!("job executor panicked in slot {slot}");
    }

    if cancel.load(Ordering::Acquire) {
        // Forced shutdown: the whole dispatcher is being discarded, leave
        // the slot and counters as they are.
        return;
    }

    let still_running = shared.running.lock().unwrap().unregister(slot);
    shared.release_permit();

    if still_running == 0 && shared.queue_count() == 0 {
        shared.notify_idle();
    }
}

/// The control loop: idle until signaled, then drain the queue while gate
/// capacity is available. Runs on its own thread until shutdown.
async fn dispatch_loop<J: Send + Sync + 'static>(shared: Arc<Shared<J>>, workers: ThreadPool) {
    debug!("dispatch loop started");
    'control: loop {
        if !wait_for_work(&shared).await {
            break 'control;
        }
        while shared.queue_count() > 0 {
            match acquire_permit(&shared).await {
                Acquire::Shutdown => break 'control,
                Acquire::GateReplaced => continue,
                Acquire::Permit => {}
            }

            let job = shared.queue.lock().unwrap().dequeue();
            let Some(job) = job else {
                // Someone dequeued behind our back; nothing to run.
                shared.release_permit();
                continue;
            };

            let executor = shared.executor.lock().unwrap().clone();
            let Some(executor) = executor else {
                warn!("no job executor configured, discarding dequeued job");
                shared.release_permit();
                continue;
            };

            workers.spawn_ok(run_worker(shared.clone(), job, executor));
        }
    }

    let flagged = shared.running.lock().unwrap().cancel_all();
    if flagged > 0 {
        warn!("dispatch loop stopping with {flagged} job(s) still running");
    }
    debug!("dispatch loop stopped");
}

/// Bounded-concurrency FIFO job dispatcher.
///
/// `J` is the caller's job type; the dispatcher treats it as opaque and
/// never reads or mutates it. Jobs are handled as `Arc<J>` and compared by
/// identity for deduplication.
pub struct Dispatcher<J: Send + Sync + 'static> {
    shared: Arc<Shared<J>>,
    control: Option<JoinHandle<()>>,
    disposed: bool,
}

impl<J: Send + Sync + 'static> Dispatcher<J> {
    /// Create a dispatcher allowing up to `max_concurrent_jobs` jobs to run
    /// at once. A limit of 0 is clamped to 1 with a warning.
    pub fn new(max_concurrent_jobs: usize) -> Self {
        let limit = if max_concurrent_jobs < 1 {
            warn!("concurrency limit must be at least 1, clamping");
            1
        } else {
            max_concurrent_jobs
        };

        let (trigger_tx, trigger_rx) = async_channel::bounded(1);
        let (stop_tx, stop_rx) = async_channel::unbounded();
        let shared = Arc::new(Shared {
            queue: Mutex::new(PendingQueue::new()),
            running: Mutex::new(RunningTable::new()),
            gate: Mutex::new(ConcurrencyGate::new(limit)),
            executor: Mutex::new(None),
            idle_notify: Mutex::new(None),
            trigger_tx,
            trigger_rx,
            stop_tx,
            stop_rx,
        });

        let parallelism = thread::available_parallelism().map(usize::from).unwrap_or(1);
        let workers = ThreadPool::builder()
            .pool_size(limit.max(parallelism))
            .name_prefix("dispatchq-worker-")
            .create()
            .expect("failed to create worker pool");

        let loop_shared = shared.clone();
        let control = thread::Builder::new()
            .name("dispatchq-control".into())
            .spawn(move || futures::executor::block_on(dispatch_loop(loop_shared, workers)))
            .expect("failed to spawn dispatch thread");

        Self {
            shared,
            control: Some(control),
            disposed: false,
        }
    }

    /// Set the callback that executes each dispatched job. Without one,
    /// dequeued jobs are discarded with a warning.
    pub fn set_executor<F>(&self, executor: F)
    where
        F: Fn(Arc<J>) + Send + Sync + 'static,
    {
        *self.shared.executor.lock().unwrap() = Some(Arc::new(executor));
    }

    /// Set the callback fired when the queue and the running set have both
    /// drained to empty. Any per-dispatcher context belongs in the closure's
    /// captures.
    pub fn set_idle_notify<F>(&self, notify: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.shared.idle_notify.lock().unwrap() = Some(Arc::new(notify));
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.shared.gate.lock().unwrap().capacity()
    }

    /// Change the concurrency limit by replacing the gate, all permits free.
    ///
    /// Rejected with a warning (no effect) while the queue is non-empty or
    /// for a limit below 1. The guard deliberately ignores the running
    /// count: jobs already in flight finish under the limit they started
    /// with and their late releases land on the new gate as no-ops.
    pub fn set_max_concurrent_jobs(&self, limit: usize) {
        if limit < 1 {
            warn!("rejecting concurrency limit {limit}: must be at least 1");
            return;
        }
        let queued = self.queue_count();
        if queued > 0 {
            warn!("rejecting concurrency limit change while {queued} job(s) are queued");
            return;
        }
        let mut gate = self.shared.gate.lock().unwrap();
        gate.close();
        *gate = ConcurrencyGate::new(limit);
        info!("concurrency limit set to {limit}");
    }

    /// Add `job` to the tail of the queue and wake the dispatch loop. A job
    /// already queued (same identity) is left alone.
    pub fn enqueue(&self, job: Arc<J>) {
        let added = self.shared.queue.lock().unwrap().enqueue(job);
        if added {
            let _ = self.shared.trigger_tx.try_send(());
        }
    }

    /// Remove and return the head of the queue, if any.
    pub fn dequeue(&self) -> Option<Arc<J>> {
        self.shared.queue.lock().unwrap().dequeue()
    }

    pub fn queue_count(&self) -> usize {
        self.shared.queue_count()
    }

    pub fn running_count(&self) -> usize {
        self.shared.running_count()
    }

    pub fn pending_count(&self) -> usize {
        // Queue lock first, then running, as everywhere both are taken.
        let queue = self.shared.queue.lock().unwrap();
        let running = self.shared.running.lock().unwrap();
        queue.len() + running.count()
    }

    /// Snapshot of every job the dispatcher still owes work to: running
    /// jobs first (slot order), then the queue in FIFO order.
    pub fn pending_jobs(&self) -> Vec<Arc<J>> {
        let queue = self.shared.queue.lock().unwrap();
        let running = self.shared.running.lock().unwrap();
        let mut jobs = running.snapshot();
        jobs.extend(queue.iter().cloned());
        jobs
    }

    /// Stop the dispatch loop and fire the idle notification once,
    /// regardless of prior state. The dispatcher is not restartable
    /// afterwards; further enqueues are inert.
    pub fn abort(&mut self) {
        info!("abort requested");
        self.shared.signal_shutdown();
        self.join_control();
        self.shared.notify_idle();
    }

    /// Stop the dispatch loop, close every channel and clear all
    /// bookkeeping. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        self.shared.signal_shutdown();
        self.join_control();

        self.shared.trigger_rx.close();
        self.shared.gate.lock().unwrap().close();
        self.shared.queue.lock().unwrap().clear();
        self.shared.running.lock().unwrap().clear();
        *self.shared.executor.lock().unwrap() = None;
        *self.shared.idle_notify.lock().unwrap() = None;
        debug!("dispatcher disposed");
    }

    /// Join the control thread. Every wait in the loop is stop-aware, so
    /// once shutdown is signaled the join completes promptly; there is no
    /// forceful fallback because worker units carry cancellation flags
    /// instead of killable handles.
    fn join_control(&mut self) {
        if let Some(control) = self.control.take() {
            if control.join().is_err() {
                error!("dispatch thread panicked during shutdown");
            }
        }
    }
}

impl<J: Send + Sync + 'static> Default for Dispatcher<J> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT_JOBS)
    }
}

impl<J: Send + Sync + 'static> Drop for Dispatcher<J> {
    fn drop(&mut self) {
        self.dispose();
    }
}
