//! Input and output seams of a pipe
//!
//! Inputs are polled from the worker thread; outputs are each invoked on their
//! own scoped thread during fan-out. Closures implement both traits through
//! blanket impls, so most callers never name them.
//!
//! Every call goes through a panic boundary ([`poll_guarded`] /
//! [`deliver_guarded`]) which turns an unwinding callback into an index-tagged
//! [`FaucetError`] before it can leave the calling thread.

use crate::context::Context;
use crate::error::{panic_message, FaucetError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

/// A source a pipe polls once per tick (until one yields)
pub trait Input<T>: Send {
    /// Attempt to produce a value.
    ///
    /// `Ok(Some(value))` means found, `Ok(None)` means nothing available right
    /// now and the next input in rotation is tried. An error ends the pipe.
    fn poll(&mut self, ctx: &Context) -> anyhow::Result<Option<T>>;
}

impl<T, F> Input<T> for F
where
    F: FnMut(&Context) -> anyhow::Result<Option<T>> + Send,
{
    fn poll(&mut self, ctx: &Context) -> anyhow::Result<Option<T>> {
        self(ctx)
    }
}

/// A destination every polled value is delivered to
pub trait Output<T>: Send {
    /// Deliver `value`. An error ends the pipe after the current tick.
    fn deliver(&mut self, ctx: &Context, value: &T) -> anyhow::Result<()>;
}

impl<T, F> Output<T> for F
where
    F: FnMut(&Context, &T) -> anyhow::Result<()> + Send,
{
    fn deliver(&mut self, ctx: &Context, value: &T) -> anyhow::Result<()> {
        self(ctx, value)
    }
}

pub(crate) type SharedInput<T> = Arc<Mutex<Box<dyn Input<T>>>>;
pub(crate) type SharedOutput<T> = Arc<Mutex<Box<dyn Output<T>>>>;

/// Poll input `index`, converting errors and panics into tagged errors.
pub(crate) fn poll_guarded<T>(
    index: usize,
    input: &SharedInput<T>,
    ctx: &Context,
) -> Result<Option<T>, FaucetError> {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .poll(ctx)
    }));

    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(FaucetError::Input { index, source }),
        Err(payload) => Err(FaucetError::InputPanic {
            index,
            message: panic_message(payload.as_ref()),
        }),
    }
}

/// Deliver to output `index`, converting errors and panics into tagged errors.
pub(crate) fn deliver_guarded<T>(
    index: usize,
    output: &SharedOutput<T>,
    ctx: &Context,
    value: &T,
) -> Result<(), FaucetError> {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .deliver(ctx, value)
    }));

    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(FaucetError::Output { index, source }),
        Err(payload) => Err(FaucetError::OutputPanic {
            index,
            message: panic_message(payload.as_ref()),
        }),
    }
}
