//! Cancellation contexts
//!
//! A [`Context`] is a node in a cancellation tree. Cancelling a context cancels
//! every context derived from it, and the cancellation is observable in three
//! ways: polling [`Context::err`], blocking on [`Context::wait`], or selecting on
//! the receiver returned by [`Context::done`].
//!
//! # Signalling
//!
//! Each context owns a crossbeam channel on which nothing is ever sent. The
//! sending half is dropped on cancellation, so every clone of the receiving half
//! observes a disconnect at the same moment. This makes `done()` usable directly
//! inside `crossbeam_channel::select!` alongside tickers and other channels.
//!
//! # Example
//!
//! ```
//! use faucet_rs::{Context, ContextError};
//!
//! let root = Context::background();
//! let (ctx, cancel) = Context::with_cancel(&root);
//! assert!(ctx.err().is_none());
//!
//! cancel.cancel();
//! assert_eq!(ctx.err(), Some(ContextError::Canceled));
//! assert!(root.err().is_none());
//! ```

use crossbeam_channel::{after, bounded, select, Receiver, RecvTimeoutError, Sender};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Why a context was cancelled
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    /// Cancelled through a [`CancelHandle`] (or a parent's)
    #[error("context canceled")]
    Canceled,

    /// The context's deadline passed
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

struct State {
    err: Option<ContextError>,
    done_tx: Option<Sender<()>>,
    // Live until cancelled, so a parent outlives the caller's handle to it.
    parent: Option<Arc<Inner>>,
    children: Vec<Weak<Inner>>,
}

struct Inner {
    state: Mutex<State>,
    done_rx: Receiver<()>,
    deadline: Option<Instant>,
}

impl Inner {
    fn new(parent: Option<Arc<Inner>>, deadline: Option<Instant>) -> Arc<Self> {
        let (done_tx, done_rx) = bounded(0);
        Arc::new(Self {
            state: Mutex::new(State {
                err: None,
                done_tx: Some(done_tx),
                parent,
                children: Vec::new(),
            }),
            done_rx,
            deadline,
        })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel(&self, err: ContextError) {
        let (children, _parent) = {
            let mut state = self.lock();
            if state.err.is_some() {
                return;
            }
            state.err = Some(err);
            state.done_tx = None;
            (std::mem::take(&mut state.children), state.parent.take())
        };

        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel(err);
        }
    }
}

/// A cancellable context, cheap to clone
///
/// Clones share the same cancellation state.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    /// A root context that is never cancelled.
    pub fn background() -> Self {
        Self {
            inner: Inner::new(None, None),
        }
    }

    /// Derive a child context that is cancelled when `handle.cancel()` is
    /// called or when `parent` is cancelled.
    pub fn with_cancel(parent: &Context) -> (Context, CancelHandle) {
        let child = parent.derive(parent.inner.deadline);
        let handle = CancelHandle {
            inner: child.inner.clone(),
        };
        (child, handle)
    }

    /// Derive a child context that is cancelled with
    /// [`ContextError::DeadlineExceeded`] once `timeout` has elapsed.
    pub fn with_timeout(parent: &Context, timeout: Duration) -> (Context, CancelHandle) {
        Self::with_deadline(parent, Instant::now() + timeout)
    }

    /// Derive a child context that is cancelled with
    /// [`ContextError::DeadlineExceeded`] at `deadline`.
    ///
    /// A parent deadline that falls earlier wins.
    pub fn with_deadline(parent: &Context, deadline: Instant) -> (Context, CancelHandle) {
        let effective = match parent.inner.deadline {
            Some(existing) if existing <= deadline => return Self::with_cancel(parent),
            _ => deadline,
        };

        let child = parent.derive(Some(effective));
        let handle = CancelHandle {
            inner: child.inner.clone(),
        };

        let remaining = effective.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            child.inner.cancel(ContextError::DeadlineExceeded);
            return (child, handle);
        }

        let timer = child.inner.clone();
        let done = child.done();
        let spawned = std::thread::Builder::new()
            .name("faucet-deadline".to_string())
            .spawn(move || {
                select! {
                    recv(done) -> _ => {}
                    recv(after(remaining)) -> _ => {
                        timer.cancel(ContextError::DeadlineExceeded);
                    }
                }
            });

        if let Err(e) = spawned {
            // Without a timer the deadline cannot be honoured later, so honour it now.
            tracing::warn!("Failed to spawn deadline timer, cancelling early: {}", e);
            child.inner.cancel(ContextError::DeadlineExceeded);
        }

        (child, handle)
    }

    fn derive(&self, deadline: Option<Instant>) -> Context {
        let child = Inner::new(Some(self.inner.clone()), deadline);

        let inherited = {
            let mut state = self.inner.lock();
            match state.err {
                Some(err) => Some(err),
                None => {
                    state.children.retain(|c| c.strong_count() > 0);
                    state.children.push(Arc::downgrade(&child));
                    None
                }
            }
        };

        if let Some(err) = inherited {
            child.cancel(err);
        }

        Context { inner: child }
    }

    /// Why the context was cancelled, or `None` while it is still live.
    pub fn err(&self) -> Option<ContextError> {
        self.inner.lock().err
    }

    /// Whether the context has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.err().is_some()
    }

    /// The deadline after which this context is cancelled, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// A receiver that disconnects when the context is cancelled.
    ///
    /// Nothing is ever sent on it: `recv` blocks until cancellation and then
    /// returns `Err(RecvError)`.
    pub fn done(&self) -> Receiver<()> {
        self.inner.done_rx.clone()
    }

    /// Block until the context is cancelled and return the reason.
    pub fn wait(&self) -> ContextError {
        let _ = self.inner.done_rx.recv();
        self.err().unwrap_or(ContextError::Canceled)
    }

    /// Block for at most `timeout`; returns the reason if cancelled in time.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<ContextError> {
        match self.inner.done_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => None,
            _ => self.err(),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("err", &self.err())
            .field("deadline", &self.inner.deadline)
            .finish()
    }
}

/// Cancels the context it was created with
///
/// Dropping the handle does not cancel. The handle keeps its context reachable,
/// so cancelling works after every [`Context`] clone has been dropped.
#[derive(Clone)]
pub struct CancelHandle {
    inner: Arc<Inner>,
}

impl CancelHandle {
    /// Cancel the context and all of its descendants. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancel(ContextError::Canceled);
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle").finish_non_exhaustive()
    }
}
