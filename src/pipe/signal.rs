//! One-shot broadcast signals used for the stop request and the done marker.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Fires at most once; every receiver observes the firing as a disconnect.
pub(crate) struct Signal {
    tx: Mutex<Option<Sender<()>>>,
    rx: Receiver<()>,
}

impl Signal {
    pub(crate) fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            tx: Mutex::new(Some(tx)),
            rx,
        }
    }

    /// Fire the signal. Returns `true` only for the call that actually fired it.
    pub(crate) fn fire(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    pub(crate) fn is_fired(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    pub(crate) fn receiver(&self) -> Receiver<()> {
        self.rx.clone()
    }
}

/// The stop request and done marker of one pipe.
pub(crate) struct Signals {
    pub(crate) stop: Signal,
    pub(crate) done: Signal,
}

impl Signals {
    pub(crate) fn new() -> Self {
        Self {
            stop: Signal::new(),
            done: Signal::new(),
        }
    }
}

/// Wait handle for a pipe's completion
///
/// Signalled exactly once, after the worker has exited, the ticker has been
/// released and [`Pipe::err`](crate::Pipe::err) has become stable. A pipe that
/// is never started never signals.
#[derive(Debug, Clone)]
pub struct Done {
    rx: Receiver<()>,
}

impl Done {
    pub(crate) fn new(rx: Receiver<()>) -> Self {
        Self { rx }
    }

    /// Block until the pipe is done.
    pub fn wait(&self) {
        let _ = self.rx.recv();
    }

    /// Block for at most `timeout`; returns whether the pipe is done.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        !matches!(self.rx.recv_timeout(timeout), Err(RecvTimeoutError::Timeout))
    }

    /// Non-blocking check.
    pub fn is_done(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Receiver that disconnects once the pipe is done, for use in
    /// `crossbeam_channel::select!`.
    pub fn receiver(&self) -> Receiver<()> {
        self.rx.clone()
    }
}
