// SPDX-License-Identifier: MIT
//
// Enqueue a burst of fake work items and watch the dispatcher drain them
// under a small concurrency budget. Run with RUST_LOG=debug to see the
// dispatch loop's own logging.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dispatchq::Dispatcher;
use log::info;

struct WorkItem {
    name: String,
    done: AtomicBool,
}

fn main() {
    env_logger::init();

    let dispatcher: Dispatcher<WorkItem> = Dispatcher::new(3);
    let (idle_tx, idle_rx) = async_channel::bounded::<()>(1);

    dispatcher.set_executor(|item| {
        info!("working on {}", item.name);
        thread::sleep(Duration::from_millis(100));
        item.done.store(true, Ordering::Release);
    });
    dispatcher.set_idle_notify(move || {
        let _ = idle_tx.try_send(());
    });

    let items: Vec<_> = (0..10)
        .map(|i| {
            Arc::new(WorkItem {
                name: format!("item-{i}"),
                done: AtomicBool::new(false),
            })
        })
        .collect();
    for item in &items {
        dispatcher.enqueue(item.clone());
    }
    info!(
        "enqueued {} items, {} pending",
        items.len(),
        dispatcher.pending_count()
    );

    idle_rx
        .recv_blocking()
        .expect("dispatcher dropped before going idle");

    let done = items
        .iter()
        .filter(|item| item.done.load(Ordering::Acquire))
        .count();
    info!("queue idle, {done}/{} items done", items.len());
}
