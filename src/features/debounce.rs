//! Coalesce bursts of triggers into one call.
//!
//! Every [`Debouncer::trigger`] (re)starts a window; the effect runs once the
//! window passes without another trigger. Dropping the debouncer cancels any
//! pending effect.

use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub struct Debouncer {
    tx: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
}

impl Debouncer {
    pub fn new<F, Fut>(window: Duration, mut effect: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let task = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                let mut deadline = Instant::now() + window;
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => break,
                        more = rx.recv() => match more {
                            Some(()) => deadline = Instant::now() + window,
                            None => return,
                        },
                    }
                }
                effect().await;
            }
        });
        Self { tx, task }
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
