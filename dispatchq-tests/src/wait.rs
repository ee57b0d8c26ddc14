// SPDX-License-Identifier: MIT

use std::thread;
use std::time::{Duration, Instant};

/// Poll `cond` every few milliseconds until it holds or `timeout` elapses.
/// Returns the final value of `cond`.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}
