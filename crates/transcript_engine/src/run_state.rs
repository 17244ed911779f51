use std::sync::atomic::{AtomicUsize, Ordering};

use tokio_util::sync::CancellationToken;

/// Shared bookkeeping for one batch run.
#[derive(Debug)]
pub struct RunState {
    total: usize,
    completed: AtomicUsize,
    cancel: CancellationToken,
}

impl RunState {
    pub fn new(total: usize, cancel: CancellationToken) -> Self {
        Self {
            total,
            completed: AtomicUsize::new(0),
            cancel,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    /// Counts one more finished job and returns the new count.
    ///
    /// Returns `None`, leaving the count unchanged, if every job is already
    /// accounted for.
    pub fn record_completion(&self) -> Option<usize> {
        self.completed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |done| {
                (done < self.total).then_some(done + 1)
            })
            .ok()
            .map(|previous| previous + 1)
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_finished(&self) -> bool {
        self.completed() == self.total || self.is_cancelled()
    }
}
