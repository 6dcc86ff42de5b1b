//! # faucet-rs: rate-limited fan-in to fan-out pipes
//!
//! A [`Pipe`] polls a rotating set of inputs at a fixed rate and delivers the
//! first value it finds to every output concurrently, waiting for all outputs
//! before it considers the next tick.
//!
//! ## Architecture
//!
//! - **Worker**: a dedicated thread running the tick loop (round-robin input
//!   scan, fan-out, error aggregation)
//! - **Fan-out**: one scoped thread per output per tick, joined before the
//!   next tick
//! - **Janitor**: a thread translating context cancellation into a stop request
//! - **Context**: a cancellation tree built on crossbeam channels, so the
//!   worker can `select!` over ticker, stop request and cancellation
//!
//! Panics inside inputs, outputs or the loop itself are caught at the call
//! boundary and recorded as the pipe's terminal error; they never take down the
//! process.
//!
//! ## Example
//!
//! ```
//! use faucet_rs::{Context, Pipe, rate_per_minute};
//! use std::time::Duration;
//!
//! let pipe: Pipe<&'static str> = Pipe::named("greeter");
//! pipe.add_input(|_| Ok(Some("hello")));
//! pipe.add_output(|_, value| {
//!     assert_eq!(*value, "hello");
//!     Ok(())
//! });
//!
//! // Cancelling (or timing out) the context also ends the pipe.
//! let (ctx, _cancel) = Context::with_timeout(&Context::background(), Duration::from_millis(50));
//! pipe.start(&ctx, rate_per_minute(6_000));
//! pipe.done().wait();
//!
//! assert!(pipe.err().unwrap().is_context());
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod pipe;
pub mod rate;

// Re-export commonly used types
pub use config::PipeConfig;
pub use context::{CancelHandle, Context, ContextError};
pub use error::{FaucetError, Result, ResultExt};
pub use pipe::{Done, Input, Lifecycle, Output, Pipe, PipeStats};
pub use rate::rate_per_minute;
