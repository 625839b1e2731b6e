use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::config::WaitConfig;

/// Coalesces a burst of raw change notifications into at most one emission
/// per window, per distilled §4.4.
///
/// Every incoming event resets a `min` timer; emission fires when that timer
/// elapses with no further events, or when a sticky `max` timer (armed once
/// at the start of the burst and never reset) elapses first, whichever comes
/// first. Debouncing is bypassed entirely when `min == 0`.
pub struct DebounceGate {
    min: Duration,
    max: Duration,
    active: bool,
}

impl DebounceGate {
    pub fn new(wait: Option<WaitConfig>) -> Self {
        match wait {
            Some(wait) if wait.is_active() => Self {
                min: wait.min(),
                max: wait.max(),
                active: true,
            },
            _ => Self {
                min: Duration::ZERO,
                max: Duration::ZERO,
                active: false,
            },
        }
    }

    /// Drains `rx` until it closes, forwarding at most one debounced signal
    /// per window onto `tx`. Returns once `rx` closes and any pending burst
    /// has been flushed.
    pub async fn run(&self, mut rx: mpsc::Receiver<()>, tx: mpsc::Sender<()>) {
        if !self.active {
            while rx.recv().await.is_some() {
                if tx.send(()).await.is_err() {
                    return;
                }
            }
            return;
        }

        let mut min_deadline: Option<Instant> = None;
        let mut max_deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;

                event = rx.recv() => {
                    match event {
                        Some(()) => {
                            let now = Instant::now();
                            if max_deadline.is_none() {
                                max_deadline = Some(now + self.max);
                            }
                            min_deadline = Some(now + self.min);
                        }
                        None => {
                            if min_deadline.take().is_some() {
                                max_deadline = None;
                                let _ = tx.send(()).await;
                            }
                            return;
                        }
                    }
                }
                _ = sleep_until(min_deadline.unwrap_or_else(Instant::now)), if min_deadline.is_some() => {
                    debug!("debounce min window elapsed");
                    min_deadline = None;
                    max_deadline = None;
                    if tx.send(()).await.is_err() {
                        return;
                    }
                }
                _ = sleep_until(max_deadline.unwrap_or_else(Instant::now)), if max_deadline.is_some() => {
                    debug!("debounce max window elapsed, forcing emission");
                    min_deadline = None;
                    max_deadline = None;
                    if tx.send(()).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passthrough_when_inactive() {
        let gate = DebounceGate::new(None);
        let (tx_in, rx_in) = mpsc::channel(8);
        let (tx_out, mut rx_out) = mpsc::channel(8);

        let handle = tokio::spawn(async move { gate.run(rx_in, tx_out).await });

        tx_in.send(()).await.unwrap();
        tx_in.send(()).await.unwrap();
        drop(tx_in);

        assert!(rx_out.recv().await.is_some());
        assert!(rx_out.recv().await.is_some());
        assert!(rx_out.recv().await.is_none());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn coalesces_burst_into_single_emission() {
        let gate = DebounceGate::new(Some(WaitConfig { min_ms: 20, max_ms: 200 }));
        let (tx_in, rx_in) = mpsc::channel(8);
        let (tx_out, mut rx_out) = mpsc::channel(8);

        let handle = tokio::spawn(async move { gate.run(rx_in, tx_out).await });

        for _ in 0..5 {
            tx_in.send(()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        drop(tx_in);

        assert!(rx_out.recv().await.is_some());
        assert!(rx_out.recv().await.is_none());
        handle.await.unwrap();
    }
}
