// SPDX-License-Identifier: MIT

use std::sync::Once;

static INIT: Once = Once::new();

/// Install env_logger once for the whole test binary. Honors RUST_LOG.
pub fn init() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}
