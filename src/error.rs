//! Error handling for faucet-rs
//!
//! This module defines the crate error type and a Result alias. The same enum
//! carries precondition violations (returned by the `try_*` lifecycle methods),
//! configuration failures, and the terminal errors a running pipe records.

use crate::context::ContextError;
use std::any::Any;
use thiserror::Error;

/// Main error type for faucet-rs operations
#[derive(Error, Debug)]
pub enum FaucetError {
    /// `start` was called with a zero tick interval
    #[error("pipe interval must be greater than zero")]
    ZeroInterval,

    /// `start` was called on a pipe that was already started
    #[error("pipe already started")]
    AlreadyStarted,

    /// `stop` was called on a pipe that was never started
    #[error("pipe not started")]
    NotStarted,

    /// The pipe's context was cancelled or its deadline passed
    #[error("context error: {0}")]
    Context(#[from] ContextError),

    /// An input reported an error
    #[error("input {index} error: {source}")]
    Input {
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    /// An input panicked while being polled
    #[error("input {index} recovered from panic: {message}")]
    InputPanic { index: usize, message: String },

    /// An output reported an error
    #[error("output {index} error: {source}")]
    Output {
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    /// An output panicked while delivering
    #[error("output {index} recovered from panic: {message}")]
    OutputPanic { index: usize, message: String },

    /// More than one output failed on the same tick
    #[error("{}", join_messages(.0))]
    Outputs(Vec<FaucetError>),

    /// The worker loop itself panicked outside any input or output
    #[error("worker recovered from panic: {message}")]
    WorkerPanic { message: String },

    /// A pipe thread could not be spawned
    #[error("failed to spawn {thread} thread: {source}")]
    Spawn {
        thread: String,
        #[source]
        source: std::io::Error,
    },

    /// Errors related to configuration loading
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<FaucetError>,
    },
}

impl FaucetError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        FaucetError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Combine the failures of one fan-out into a single error.
    ///
    /// Returns `None` when `errors` is empty and the lone error when there is
    /// exactly one.
    pub fn combine(mut errors: Vec<FaucetError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(FaucetError::Outputs(errors)),
        }
    }

    /// The output index this error is tagged with, if any.
    pub fn output_index(&self) -> Option<usize> {
        match self {
            FaucetError::Output { index, .. } | FaucetError::OutputPanic { index, .. } => {
                Some(*index)
            }
            _ => None,
        }
    }

    /// The input index this error is tagged with, if any.
    pub fn input_index(&self) -> Option<usize> {
        match self {
            FaucetError::Input { index, .. } | FaucetError::InputPanic { index, .. } => {
                Some(*index)
            }
            _ => None,
        }
    }

    /// Whether this error came from the context being cancelled.
    pub fn is_context(&self) -> bool {
        matches!(self, FaucetError::Context(_))
    }
}

fn join_messages(errors: &[FaucetError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Describe a caught panic payload.
///
/// `panic!` payloads are almost always `&str` or `String`. Error values raised
/// with `std::panic::panic_any` are described by their `Display`; anything else
/// is reported by its kind only.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(e) = payload.downcast_ref::<FaucetError>() {
        e.to_string()
    } else if let Some(e) = payload.downcast_ref::<anyhow::Error>() {
        format!("{:#}", e)
    } else if let Some(e) = payload.downcast_ref::<Box<dyn std::error::Error + Send + Sync>>() {
        e.to_string()
    } else if let Some(e) = payload.downcast_ref::<std::io::Error>() {
        e.to_string()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Result type alias for faucet-rs operations
pub type Result<T> = std::result::Result<T, FaucetError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
