// SPDX-License-Identifier: MIT
//! # Design: Bounded-Concurrency Job Dispatcher
//!
//! ## Overview
//! A FIFO queue of opaque jobs drained by a single control thread into a
//! shared worker pool, with a permit gate bounding how many jobs execute at
//! once.
//!
//! - Jobs are enqueued as `Arc<J>` handles and deduplicated by identity.
//! - One dedicated control thread waits for "work available" or "shutdown",
//!   whichever fires first, then drains the queue while permits are free.
//! - Each dispatched job runs as a unit on `futures::executor::ThreadPool`;
//!   the unit registers itself in a slot table, runs the caller's executor,
//!   and on exit frees its slot, returns its permit and, if it was the last
//!   one out, fires the idle notification.
//! - A job failure (panic in the executor) is contained in its worker unit
//!   and never stops the dispatch loop or other jobs.
//! - Shutdown is cooperative: closing the stop channel wakes every wait, the
//!   loop flags still-running workers and exits, `dispose()` then clears all
//!   bookkeeping.
//!
//! ```text
//!         +--------------------------------------+
//!         |            Dispatch loop             |
//!         |      (dedicated control thread)      |
//!         +------+-------------------+-----------+
//!                |                   |
//!           FIFO queue          permit gate
//!                |                   |
//!         +------v----+  +-----------v+
//!         | worker    |  | worker     |   ... up to max_concurrent_jobs
//!         | unit      |  | unit       |
//!         +-----------+  +------------+
//! ```
//!
//! All diagnostics go through the `log` facade; with no logger installed the
//! dispatcher is silent, including on failure.

pub mod dispatcher;
pub mod gate;
pub mod queue;
pub mod running;
pub mod slot_table;

pub use dispatcher::{Dispatcher, DEFAULT_MAX_CONCURRENT_JOBS};
