//! Dispatch/settle completion barrier.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::Notify;

/// Dispatch attempted after [`CompletionBarrier::close_dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("dispatch is closed on this barrier")]
pub struct DispatchClosed;

#[derive(Debug, Default)]
struct Counts {
    dispatched: usize,
    settled: usize,
    closed: bool,
}

impl Counts {
    const fn complete(&self) -> bool {
        self.closed && self.settled == self.dispatched
    }
}

/// Counts dispatched and settled units of work.
///
/// [`wait`](Self::wait) resolves once dispatch has been closed and every
/// dispatched unit has settled. Until dispatch is closed the barrier never
/// resolves, even when every unit dispatched so far has settled.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use nextway_data::load::CompletionBarrier;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), nextway_data::load::DispatchClosed> {
/// let barrier = Arc::new(CompletionBarrier::new());
/// let unit = barrier.dispatch()?;
/// barrier.close_dispatch();
/// assert!(!barrier.is_complete());
/// drop(unit);
/// barrier.wait().await;
/// assert!(barrier.is_complete());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct CompletionBarrier {
    counts: Mutex<Counts>,
    notify: Notify,
}

impl CompletionBarrier {
    /// Create an open barrier with nothing dispatched.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one unit of work; the returned guard settles it when dropped.
    ///
    /// # Errors
    /// Returns [`DispatchClosed`] once dispatch has been closed.
    pub fn dispatch(self: &Arc<Self>) -> Result<Settle, DispatchClosed> {
        let mut counts = self.counts();
        if counts.closed {
            return Err(DispatchClosed);
        }
        counts.dispatched += 1;
        Ok(Settle {
            barrier: Arc::clone(self),
        })
    }

    /// Declare that no further units will be dispatched.
    pub fn close_dispatch(&self) {
        self.counts().closed = true;
        self.notify.notify_waiters();
    }

    /// Whether dispatch is closed and every unit has settled.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.counts().complete()
    }

    /// Units dispatched and settled so far.
    #[must_use]
    pub fn progress(&self) -> (usize, usize) {
        let counts = self.counts();
        (counts.dispatched, counts.settled)
    }

    /// Resolve once the barrier is complete.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_complete() {
                return;
            }
            notified.await;
        }
    }

    fn settle(&self) {
        self.counts().settled += 1;
        self.notify.notify_waiters();
    }

    fn counts(&self) -> MutexGuard<'_, Counts> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Guard for one dispatched unit; dropping it settles the unit.
#[derive(Debug)]
#[must_use = "dropping the guard settles the unit immediately"]
pub struct Settle {
    barrier: Arc<CompletionBarrier>,
}

impl Drop for Settle {
    fn drop(&mut self) {
        self.barrier.settle();
    }
}
