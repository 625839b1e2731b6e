use std::io;

use tokio::signal::unix::{signal, Signal, SignalKind};

/// Reason the scheduler was woken by `SignalSource`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadSignal {
    /// SIGHUP: force a full re-render of every template, bypassing any
    /// debounce gate (distilled §4.5). Only the signal reactor observes
    /// this, not the interval drivers.
    Reload,
    /// SIGINT/SIGTERM: begin cooperative shutdown.
    Shutdown,
}

/// Owns the three process-wide signal handles the scheduler reacts to.
/// Installed once at startup and held for the process lifetime.
pub struct SignalSource {
    sighup: Signal,
    interrupt: Signal,
    terminate: Signal,
}

impl SignalSource {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            sighup: signal(SignalKind::hangup())?,
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Waits for the next signal of interest.
    pub async fn recv(&mut self) -> ReloadSignal {
        tokio::select! {
            _ = self.sighup.recv() => ReloadSignal::Reload,
            _ = self.interrupt.recv() => ReloadSignal::Shutdown,
            _ = self.terminate.recv() => ReloadSignal::Shutdown,
        }
    }
}
