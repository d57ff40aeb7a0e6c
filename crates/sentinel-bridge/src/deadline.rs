//! Per-attempt deadline
//!
//! A [`DeadlineGuard`] arms a timer task that cancels a token when the
//! deadline passes. Dropping the guard aborts the timer and releases its
//! slot in the shared armed-timer counter, including when the caller drops
//! the attempt future mid-flight.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Shared count of currently armed timers
#[derive(Debug, Clone, Default)]
pub struct TimerCounter(Arc<AtomicUsize>);

impl TimerCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn armed(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct DeadlineGuard {
    token: CancellationToken,
    timer: JoinHandle<()>,
    counter: TimerCounter,
}

impl DeadlineGuard {
    /// Start the timer; must be called inside a tokio runtime
    pub fn arm(timeout: Duration, counter: &TimerCounter) -> Self {
        let token = CancellationToken::new();
        let fire = token.clone();
        counter.0.fetch_add(1, Ordering::SeqCst);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            fire.cancel();
        });
        Self {
            token,
            timer,
            counter: counter.clone(),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_expired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Race `work` against the deadline; `None` when the deadline won
    ///
    /// `work` is dropped as soon as the token fires.
    pub async fn run<F: Future>(&self, work: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            output = work => Some(output),
        }
    }
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        self.timer.abort();
        self.counter.0.fetch_sub(1, Ordering::SeqCst);
    }
}
