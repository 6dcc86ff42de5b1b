//! Pipe worker and janitor threads
//!
//! The worker owns the polling loop. Each iteration:
//!
//! 1. Bail out with a context error if the pipe context was cancelled.
//! 2. Re-check the stop request under the pipe lock.
//! 3. Snapshot the registered inputs and outputs.
//! 4. Scan inputs round-robin, starting at `cursor % inputs.len()`.
//! 5. Fan the first found value out to every output and join them.
//! 6. Wait for the next tick, a stop request, or cancellation.
//!
//! The first tick runs immediately on start. A stop request that arrives while
//! a tick is in flight is honoured only after that tick's fan-out has joined.
//!
//! The janitor bridges context cancellation into a stop request, so a pipe
//! whose context is cancelled always winds down and signals done even if
//! `stop` is never called.

use super::fanout::fan_out;
use super::io::poll_guarded;
use super::Shared;
use crate::context::{CancelHandle, Context, ContextError};
use crate::error::{panic_message, FaucetError, Result};
use crossbeam_channel::{select, tick};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tick {
    /// No input yielded a value
    Idle,
    /// A value was found and delivered to every output
    Delivered,
    /// The stop request was observed before any work started
    Stopped,
}

/// The polling loop of one started pipe
pub(crate) struct Worker<T> {
    shared: Arc<Shared<T>>,
    ctx: Context,
    cancel: CancelHandle,
    interval: Duration,
}

impl<T> Worker<T>
where
    T: Send + Sync + 'static,
{
    pub(crate) fn new(
        shared: Arc<Shared<T>>,
        ctx: Context,
        cancel: CancelHandle,
        interval: Duration,
    ) -> Self {
        Self {
            shared,
            ctx,
            cancel,
            interval,
        }
    }

    /// Run the loop to completion, then publish the outcome.
    pub(crate) fn run(self) {
        let span = tracing::info_span!("pipe", name = %self.shared.name);
        let _enter = span.enter();

        tracing::info!("Pipe worker started (interval {:?})", self.interval);

        let outcome = catch_unwind(AssertUnwindSafe(|| self.run_loop())).unwrap_or_else(
            |payload| {
                Err(FaucetError::WorkerPanic {
                    message: panic_message(payload.as_ref()),
                })
            },
        );

        let err = outcome.err();
        match &err {
            Some(e) if e.is_context() => tracing::warn!("Pipe worker cancelled: {}", e),
            Some(e) => tracing::error!("Pipe worker failed: {}", e),
            None => tracing::info!("Pipe worker stopped"),
        }

        // Done before the janitor wakes, so a failing pipe never reads as stopping.
        self.shared.publish(err);

        // Releases the janitor and anything still observing the pipe context.
        self.cancel.cancel();
        self.shared.signals().done.fire();
    }

    fn run_loop(&self) -> Result<()> {
        let ticker = tick(self.interval);
        let stop = self.shared.signals().stop.receiver();
        let cancelled = self.ctx.done();
        let mut cursor: usize = 0;

        loop {
            self.check_context()?;

            if self.tick(cursor)? == Tick::Stopped {
                return Ok(());
            }
            cursor = cursor.wrapping_add(1);

            select! {
                recv(stop) -> _ => {
                    // The janitor turns cancellation into a stop request; report
                    // the cancellation rather than a clean stop in that case.
                    return self.check_context();
                }
                recv(cancelled) -> _ => {
                    return Err(self.context_error());
                }
                recv(ticker) -> _ => {}
            }
        }
    }

    fn tick(&self, cursor: usize) -> Result<Tick> {
        let (inputs, outputs) = {
            let registry = self.shared.lock();
            if self.shared.signals().stop.is_fired() {
                return Ok(Tick::Stopped);
            }
            (registry.inputs.clone(), registry.outputs.clone())
        };

        let counters = &self.shared.counters;
        let start = if inputs.is_empty() {
            0
        } else {
            cursor % inputs.len()
        };

        for offset in 0..inputs.len() {
            self.check_context()?;

            let index = (start + offset) % inputs.len();
            counters.record_poll();

            let Some(value) = poll_guarded(index, &inputs[index], &self.ctx)? else {
                continue;
            };

            tracing::trace!(
                "Tick {}: input {} yielded, fanning out to {} outputs",
                cursor,
                index,
                outputs.len()
            );

            let errors = fan_out(&outputs, &self.ctx, &value);
            counters.record_delivery(outputs.len());

            return match FaucetError::combine(errors) {
                Some(err) => Err(err),
                None => Ok(Tick::Delivered),
            };
        }

        tracing::trace!("Tick {}: no input yielded", cursor);
        counters.record_idle_tick();
        Ok(Tick::Idle)
    }

    fn check_context(&self) -> Result<()> {
        match self.ctx.err() {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    fn context_error(&self) -> FaucetError {
        self.ctx.err().unwrap_or(ContextError::Canceled).into()
    }
}

/// Wait for the pipe context to close, then request a stop and wait for done.
///
/// The pipe context closes either because the caller's context was cancelled
/// or because the worker exited and cancelled it itself.
pub(crate) fn janitor<T>(shared: Arc<Shared<T>>, ctx: Context) {
    let reason = ctx.wait();
    tracing::debug!(pipe = %shared.name, "Pipe context closed ({}), requesting stop", reason);

    shared.request_stop();

    let _ = shared.signals().done.receiver().recv();
    tracing::debug!(pipe = %shared.name, "Pipe janitor finished");
}
