//! Last-issued-wins coordination for a subsystem's async operations.
//!
//! Every operation takes an [`OperationTicket`] from the subsystem's
//! [`OperationGate`]. Taking a ticket cancels the previous ticket's token, so
//! reads that are still waiting on the network give up early, and a result
//! is only applied to local state while its ticket is still the latest.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

/// Whether an operation's result reached local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// A newer operation was issued; the result was discarded.
    Superseded,
}

impl LoadOutcome {
    pub fn is_applied(self) -> bool {
        self == Self::Applied
    }
}

/// Sequence counter plus cancellation token for one resource.
#[derive(Debug, Default)]
pub struct OperationGate {
    latest: AtomicU64,
    in_flight: AtomicUsize,
    current: Mutex<CancellationToken>,
}

impl OperationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new ticket, superseding and cancelling every earlier one.
    pub fn begin(&self) -> OperationTicket<'_> {
        let token = CancellationToken::new();
        let seq = {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            current.cancel();
            *current = token.clone();
            self.latest.fetch_add(1, Ordering::SeqCst) + 1
        };
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        OperationTicket {
            gate: self,
            seq,
            token,
        }
    }

    /// Sequence number of the most recently issued ticket.
    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    /// True while any ticket is alive. Advisory only.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }
}

/// One operation's claim on a gate. Dropping it ends the operation.
#[derive(Debug)]
pub struct OperationTicket<'a> {
    gate: &'a OperationGate,
    seq: u64,
    token: CancellationToken,
}

impl OperationTicket<'_> {
    pub fn sequence(&self) -> u64 {
        self.seq
    }

    /// Whether no newer ticket has been issued.
    pub fn is_current(&self) -> bool {
        self.gate.latest() == self.seq
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Drive a read-only future, abandoning it if this ticket is superseded.
    ///
    /// Returns `None` when cancelled. Never use this for writes.
    pub async fn read<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            () = self.token.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

impl Drop for OperationTicket<'_> {
    fn drop(&mut self) {
        self.gate.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
