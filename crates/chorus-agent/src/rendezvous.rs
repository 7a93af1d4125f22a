// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-slot handoff between one waiting receiver and one submitter.
//!
//! A value is only accepted while a receiver is suspended in
//! [`Rendezvous::receive`]; a submission with no receiver waits a bounded
//! time for one to arrive and otherwise hands the value back.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Notify, oneshot};
use tokio_util::sync::CancellationToken;

/// Why [`Rendezvous::receive`] returned without a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    TimedOut,
    Cancelled,
}

/// Bounded rendezvous channel with capacity one.
#[derive(Debug)]
pub struct Rendezvous<T> {
    slot: Mutex<Option<oneshot::Sender<T>>>,
    receiver_arrived: Notify,
}

impl<T> Default for Rendezvous<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Rendezvous<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            receiver_arrived: Notify::new(),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<oneshot::Sender<T>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a receiver is currently suspended.
    pub fn has_receiver(&self) -> bool {
        self.slot().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Wait for a submitted value, up to `timeout` or until `cancel` fires.
    ///
    /// A newer receiver replaces an older one, which then sees `Cancelled`.
    pub async fn receive(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<T, WaitError> {
        let (tx, rx) = oneshot::channel();
        *self.slot() = Some(tx);
        self.receiver_arrived.notify_waiters();

        let outcome = tokio::select! {
            value = rx => value.map_err(|_| WaitError::Cancelled),
            _ = tokio::time::sleep(timeout) => Err(WaitError::TimedOut),
            _ = cancel.cancelled() => Err(WaitError::Cancelled),
        };

        // Our receiver is gone; clear the slot unless a newer receiver took it.
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(oneshot::Sender::is_closed) {
            *slot = None;
        }
        outcome
    }

    /// Hand `value` to a suspended receiver, waiting up to `timeout` for one.
    ///
    /// Returns the value back if no receiver accepted it in time.
    pub async fn offer(&self, value: T, timeout: Duration) -> Result<(), T> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut value = value;

        loop {
            let notified = self.receiver_arrived.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let waiting = self.slot().take();
            if let Some(tx) = waiting {
                match tx.send(value) {
                    Ok(()) => return Ok(()),
                    // The receiver gave up between registering and now.
                    Err(returned) => {
                        value = returned;
                        continue;
                    }
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const WAIT: Duration = Duration::from_secs(300);
    const SUBMIT: Duration = Duration::from_secs(5);

    #[tokio::test(start_paused = true)]
    async fn offer_without_receiver_times_out() {
        let rendezvous = Rendezvous::<String>::new();
        let started = tokio::time::Instant::now();

        let returned = rendezvous.offer("12345".into(), SUBMIT).await.unwrap_err();

        assert_eq!(returned, "12345");
        assert!(started.elapsed() >= SUBMIT);
        assert!(started.elapsed() < SUBMIT + Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_receiver_gets_exactly_the_offered_value() {
        let rendezvous = Arc::new(Rendezvous::<String>::new());
        let cancel = CancellationToken::new();

        let receiver = {
            let rendezvous = Arc::clone(&rendezvous);
            let cancel = cancel.clone();
            tokio::spawn(async move { rendezvous.receive(WAIT, &cancel).await })
        };
        tokio::task::yield_now().await;

        rendezvous.offer("24680".into(), SUBMIT).await.unwrap();
        assert_eq!(receiver.await.unwrap(), Ok("24680".to_string()));
        assert!(!rendezvous.has_receiver());
    }

    #[tokio::test(start_paused = true)]
    async fn offer_waits_for_a_late_receiver() {
        let rendezvous = Arc::new(Rendezvous::<u32>::new());
        let cancel = CancellationToken::new();

        let submitter = {
            let rendezvous = Arc::clone(&rendezvous);
            tokio::spawn(async move { rendezvous.offer(7, SUBMIT).await })
        };
        tokio::time::sleep(Duration::from_secs(2)).await;

        let value = rendezvous.receive(WAIT, &cancel).await;
        assert_eq!(value, Ok(7));
        assert_eq!(submitter.await.unwrap(), Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn receive_times_out_and_clears_slot() {
        let rendezvous = Rendezvous::<u32>::new();
        let cancel = CancellationToken::new();

        let result = rendezvous.receive(Duration::from_secs(1), &cancel).await;

        assert_eq!(result, Err(WaitError::TimedOut));
        assert!(!rendezvous.has_receiver());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_releases_receiver() {
        let rendezvous = Rendezvous::<u32>::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = rendezvous.receive(WAIT, &cancel).await;
        assert_eq!(result, Err(WaitError::Cancelled));
    }
}
