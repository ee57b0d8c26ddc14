// SPDX-License-Identifier: MIT

//! Concurrency gate: a counting semaphore built on a bounded channel.
//!
//! The channel starts full with one `()` token per permit. Acquiring a
//! permit is receiving a token, returning one is sending a token back. The
//! channel bound makes over-release impossible: a release racing a
//! reconfiguration or a teardown finds the replacement gate full (or
//! closed) and degrades to a no-op, which is exactly the tolerance the
//! shutdown path needs.

use async_channel::{Receiver, Sender};

pub struct ConcurrencyGate {
    permits: Sender<()>,
    free: Receiver<()>,
    capacity: usize,
}

impl ConcurrencyGate {
    /// A gate with `capacity` permits, all free.
    pub fn new(capacity: usize) -> Self {
        let (permits, free) = async_channel::bounded(capacity);
        for _ in 0..capacity {
            // Filling a fresh bounded channel cannot fail.
            let _ = permits.try_send(());
        }
        Self {
            permits,
            free,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Hand out the receiving side used to acquire permits. Receiving an
    /// error means the gate has been replaced or torn down; the caller is
    /// expected to refetch the current gate.
    pub fn receiver(&self) -> Receiver<()> {
        self.free.clone()
    }

    /// Return one permit. Safe to call on a full, replaced or closed gate;
    /// those races are benign no-ops.
    pub fn release(&self) {
        let _ = self.permits.try_send(());
    }

    /// Tear the gate down, waking pending acquires with an error once the
    /// buffered permits are drained.
    pub fn close(&self) {
        self.free.close();
    }
}

#[cfg(test)]
mod tests {
    use super::ConcurrencyGate;

    #[test]
    fn starts_with_all_permits_free() {
        let gate = ConcurrencyGate::new(2);
        let rx = gate.receiver();
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn release_returns_a_permit() {
        let gate = ConcurrencyGate::new(1);
        let rx = gate.receiver();
        assert!(rx.try_recv().is_ok());
        gate.release();
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn release_on_full_gate_is_a_no_op() {
        let gate = ConcurrencyGate::new(1);
        gate.release();
        gate.release();
        let rx = gate.receiver();
        assert!(rx.try_recv().is_ok());
        // The extra releases must not have minted extra permits.
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn release_after_close_is_a_no_op() {
        let gate = ConcurrencyGate::new(1);
        let rx = gate.receiver();
        assert!(rx.try_recv().is_ok());
        gate.close();
        gate.release();
        assert!(rx.try_recv().is_err());
    }
}
