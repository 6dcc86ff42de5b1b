//! The rate-limited fan-in/fan-out pipe
//!
//! A [`Pipe`] polls its inputs once per tick, in a rotating order, and delivers
//! the first value found to every output concurrently. All outputs must return
//! before the next tick is considered, which is what limits the rate of the
//! whole pipe: a slow output slows the pipe down rather than letting work pile
//! up.
//!
//! # Lifecycle
//!
//! ```text
//! Unstarted --start--> Running --stop / cancel--> Stopping --> Done
//!                         |                                    ^
//!                         +------ input/output failure --------+
//! ```
//!
//! - [`Pipe::start`] may be called once. The first tick runs immediately.
//! - [`Pipe::stop`] may be called any number of times after `start`.
//! - [`Pipe::done`] is signalled once the worker has exited; [`Pipe::err`] is
//!   stable from then on.
//!
//! Misuse (starting twice, stopping before starting, a zero interval) panics.
//! The `try_*` variants return the same conditions as [`FaucetError`] values.
//!
//! # Example
//!
//! ```
//! use faucet_rs::{Context, Pipe};
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let pipe = Pipe::named("counter");
//! let next = AtomicU32::new(0);
//! pipe.add_input(move |_| Ok(Some(next.fetch_add(1, Ordering::SeqCst))));
//!
//! let seen = Arc::new(AtomicU32::new(0));
//! let sink = seen.clone();
//! pipe.add_output(move |_, value: &u32| {
//!     sink.store(*value, Ordering::SeqCst);
//!     Ok(())
//! });
//!
//! pipe.start(&Context::background(), Duration::from_millis(5));
//! std::thread::sleep(Duration::from_millis(30));
//! pipe.stop();
//! pipe.done().wait();
//!
//! assert!(pipe.err().is_none());
//! assert!(pipe.stats().values_delivered >= 1);
//! ```

mod fanout;
mod io;
mod signal;
mod stats;
mod worker;

pub use io::{Input, Output};
pub use signal::Done;
pub use stats::PipeStats;

use crate::config::PipeConfig;
use crate::context::Context;
use crate::error::{FaucetError, Result};
use io::{SharedInput, SharedOutput};
use serde::Serialize;
use signal::Signals;
use stats::Counters;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread;
use std::time::Duration;
use worker::{janitor, Worker};

/// Name given to pipes created without one
pub const DEFAULT_PIPE_NAME: &str = "pipe";

/// Lifecycle state of a pipe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Lifecycle {
    /// Constructed, not yet started
    Unstarted,
    /// Worker is ticking
    Running,
    /// Stop requested, worker has not exited yet
    Stopping,
    /// Worker exited; `err()` is final
    Done,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Lifecycle::Unstarted => "unstarted",
            Lifecycle::Running => "running",
            Lifecycle::Stopping => "stopping",
            Lifecycle::Done => "done",
        };
        f.write_str(s)
    }
}

/// Everything guarded by the pipe lock
pub(crate) struct Registry<T> {
    pub(crate) inputs: Vec<SharedInput<T>>,
    pub(crate) outputs: Vec<SharedOutput<T>>,
    state: Lifecycle,
    interval: Option<Duration>,
    err: Option<Arc<FaucetError>>,
}

/// State shared between pipe handles, the worker and the janitor
pub(crate) struct Shared<T> {
    pub(crate) name: String,
    registry: Mutex<Registry<T>>,
    signals: OnceLock<Signals>,
    pub(crate) counters: Counters,
}

impl<T> Shared<T> {
    fn new(name: String) -> Self {
        Self {
            name,
            registry: Mutex::new(Registry {
                inputs: Vec::new(),
                outputs: Vec::new(),
                state: Lifecycle::Unstarted,
                interval: None,
                err: None,
            }),
            signals: OnceLock::new(),
            counters: Counters::default(),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Registry<T>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn signals(&self) -> &Signals {
        self.signals.get_or_init(Signals::new)
    }

    /// Request the worker to stop. No-op unless the pipe is running.
    pub(crate) fn request_stop(&self) {
        let mut registry = self.lock();
        if registry.state == Lifecycle::Running {
            registry.state = Lifecycle::Stopping;
            self.signals().stop.fire();
            tracing::debug!(pipe = %self.name, "Pipe stop requested");
        }
    }

    /// Record the terminal outcome. Later stop requests are no-ops.
    pub(crate) fn publish(&self, err: Option<FaucetError>) {
        let mut registry = self.lock();
        registry.err = err.map(Arc::new);
        registry.state = Lifecycle::Done;
    }

    /// Publish the terminal outcome and signal done.
    pub(crate) fn finish(&self, err: Option<FaucetError>) {
        self.publish(err);
        self.signals().done.fire();
    }
}

/// Stops a running pipe when the last [`Pipe`] handle goes away.
struct Handle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Drop for Handle<T> {
    fn drop(&mut self) {
        self.shared.request_stop();
    }
}

/// A rate-limited, polling fan-in to fan-out pipe
///
/// Handles are cheap to clone and all refer to the same pipe, so one thread can
/// wait on [`done`](Pipe::done) while another calls [`stop`](Pipe::stop).
/// Dropping the last handle of a running pipe requests a stop.
pub struct Pipe<T> {
    handle: Arc<Handle<T>>,
}

impl<T> Clone for Pipe<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
        }
    }
}

impl<T> Default for Pipe<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Pipe<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = &self.handle.shared;
        let registry = shared.lock();
        f.debug_struct("Pipe")
            .field("name", &shared.name)
            .field("state", &registry.state)
            .field("inputs", &registry.inputs.len())
            .field("outputs", &registry.outputs.len())
            .field("interval", &registry.interval)
            .finish()
    }
}

impl<T> Pipe<T>
where
    T: Send + Sync + 'static,
{
    /// Create an unstarted pipe named [`DEFAULT_PIPE_NAME`].
    pub fn new() -> Self {
        Self::named(DEFAULT_PIPE_NAME)
    }

    /// Create an unstarted pipe; the name shows up in log spans.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            handle: Arc::new(Handle {
                shared: Arc::new(Shared::new(name.into())),
            }),
        }
    }

    /// Create an unstarted pipe named after `config`.
    pub fn from_config(config: &PipeConfig) -> Self {
        Self::named(config.name.clone())
    }

    fn shared(&self) -> &Arc<Shared<T>> {
        &self.handle.shared
    }

    pub fn name(&self) -> &str {
        &self.shared().name
    }

    /// Add a poll function to the input rotation.
    ///
    /// Return `Ok(Some(value))` when a value is available, `Ok(None)` to let
    /// the next input in rotation try, or an error to end the pipe. Safe to call
    /// while the pipe is running; the input is picked up on a later tick.
    pub fn add_input<F>(&self, poll: F)
    where
        F: FnMut(&Context) -> anyhow::Result<Option<T>> + Send + 'static,
    {
        self.add_input_source(poll);
    }

    /// Add an [`Input`] implementor to the input rotation.
    pub fn add_input_source(&self, input: impl Input<T> + 'static) {
        let boxed: Box<dyn Input<T>> = Box::new(input);
        let mut registry = self.shared().lock();
        registry.inputs.push(Arc::new(Mutex::new(boxed)));
        tracing::debug!(pipe = %self.name(), "Added input {}", registry.inputs.len() - 1);
    }

    /// Add a delivery function; every found value is passed to every output.
    ///
    /// An error (or panic) ends the pipe once the current tick's fan-out has
    /// joined. Safe to call while the pipe is running.
    pub fn add_output<F>(&self, deliver: F)
    where
        F: FnMut(&Context, &T) -> anyhow::Result<()> + Send + 'static,
    {
        self.add_output_sink(deliver);
    }

    /// Add an [`Output`] implementor.
    pub fn add_output_sink(&self, output: impl Output<T> + 'static) {
        let boxed: Box<dyn Output<T>> = Box::new(output);
        let mut registry = self.shared().lock();
        registry.outputs.push(Arc::new(Mutex::new(boxed)));
        tracing::debug!(pipe = %self.name(), "Added output {}", registry.outputs.len() - 1);
    }

    /// Start ticking every `interval`, with the first tick running immediately.
    ///
    /// The pipe runs under a child of `ctx`; cancelling `ctx` ends the pipe
    /// with a context error.
    ///
    /// # Panics
    ///
    /// If `interval` is zero or the pipe was already started.
    pub fn start(&self, ctx: &Context, interval: Duration) {
        if let Err(e) = self.try_start(ctx, interval) {
            panic!("faucet: cannot start pipe '{}': {}", self.name(), e);
        }
    }

    /// Non-panicking [`start`](Pipe::start).
    ///
    /// Fails with [`FaucetError::ZeroInterval`], [`FaucetError::AlreadyStarted`],
    /// or [`FaucetError::Spawn`] if the worker thread cannot be created (the
    /// pipe is then done with that error).
    pub fn try_start(&self, ctx: &Context, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(FaucetError::ZeroInterval);
        }

        let shared = self.shared();
        let (pipe_ctx, cancel) = {
            let mut registry = shared.lock();
            if registry.state != Lifecycle::Unstarted {
                return Err(FaucetError::AlreadyStarted);
            }
            registry.state = Lifecycle::Running;
            registry.interval = Some(interval);
            Context::with_cancel(ctx)
        };

        let worker = Worker::new(shared.clone(), pipe_ctx.clone(), cancel.clone(), interval);
        let spawned = thread::Builder::new()
            .name("faucet-worker".to_string())
            .spawn(move || worker.run());

        if let Err(source) = spawned {
            tracing::error!(pipe = %self.name(), "Failed to spawn pipe worker: {}", source);
            cancel.cancel();
            shared.finish(Some(FaucetError::Spawn {
                thread: "faucet-worker".to_string(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            }));
            return Err(FaucetError::Spawn {
                thread: "faucet-worker".to_string(),
                source,
            });
        }

        let janitor_shared = shared.clone();
        let spawned = thread::Builder::new()
            .name("faucet-janitor".to_string())
            .spawn(move || janitor(janitor_shared, pipe_ctx));

        if let Err(e) = spawned {
            // The worker watches the context itself; only the stop bridge is lost.
            tracing::warn!(pipe = %self.name(), "Failed to spawn pipe janitor: {}", e);
        }

        tracing::info!(pipe = %self.name(), "Pipe started (interval {:?})", interval);
        Ok(())
    }

    /// Start with the interval resolved from `config`.
    pub fn start_with_config(&self, ctx: &Context, config: &PipeConfig) -> Result<()> {
        let interval = config.interval()?;
        self.try_start(ctx, interval)
    }

    /// Ask the worker to exit before its next tick. Does not block.
    ///
    /// A tick already in flight completes its fan-out first.
    ///
    /// # Panics
    ///
    /// If the pipe was never started.
    pub fn stop(&self) {
        if let Err(e) = self.try_stop() {
            panic!("faucet: cannot stop pipe '{}': {}", self.name(), e);
        }
    }

    /// Non-panicking [`stop`](Pipe::stop); fails with
    /// [`FaucetError::NotStarted`].
    pub fn try_stop(&self) -> Result<()> {
        let shared = self.shared();
        if shared.lock().state == Lifecycle::Unstarted {
            return Err(FaucetError::NotStarted);
        }
        shared.request_stop();
        Ok(())
    }

    /// The terminal error, once the worker has exited abnormally.
    ///
    /// `None` while unstarted or running, and after a clean stop.
    pub fn err(&self) -> Option<Arc<FaucetError>> {
        self.shared().lock().err.clone()
    }

    /// Wait handle signalled once the pipe has fully shut down.
    pub fn done(&self) -> Done {
        Done::new(self.shared().signals().done.receiver())
    }

    pub fn state(&self) -> Lifecycle {
        self.shared().lock().state
    }

    /// The tick interval, once started.
    pub fn interval(&self) -> Option<Duration> {
        self.shared().lock().interval
    }

    pub fn stats(&self) -> PipeStats {
        self.shared().counters.snapshot()
    }

    pub fn input_count(&self) -> usize {
        self.shared().lock().inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.shared().lock().outputs.len()
    }
}
