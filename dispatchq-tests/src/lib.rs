// SPDX-License-Identifier: MIT

pub mod test_log;
pub mod wait;
