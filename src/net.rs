//! Deadlines and caller-driven cancellation for outbound calls.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

/// Sender half: cancels every call observing the paired signal.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

/// Receiver half passed into client calls.
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self(rx)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancellation is requested. Pends forever if the handle
    /// was dropped without cancelling.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Create a linked cancel handle and signal.
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelSignal(rx))
}

/// Why a deadline-bounded call did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    TimedOut,
    Cancelled,
}

/// Run `fut` until it completes, the timeout elapses, or the signal fires,
/// whichever happens first. The future is dropped on interruption.
pub async fn run_with_deadline<F, T>(
    fut: F,
    timeout: Duration,
    cancel: Option<&CancelSignal>,
) -> Result<T, Interrupted>
where
    F: Future<Output = T>,
{
    let Some(signal) = cancel else {
        return tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| Interrupted::TimedOut);
    };

    let mut signal = signal.clone();
    if signal.is_cancelled() {
        return Err(Interrupted::Cancelled);
    }
    tokio::select! {
        biased;
        _ = signal.cancelled() => Err(Interrupted::Cancelled),
        result = tokio::time::timeout(timeout, fut) => result.map_err(|_| Interrupted::TimedOut),
    }
}
