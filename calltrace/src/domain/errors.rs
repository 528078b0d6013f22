//! Structured error types for calltrace
//!
//! The engine itself has no recoverable errors: a broken invariant panics.
//! These types cover the edges where untrusted input enters (trace files).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Failed to parse trace file: {0}")]
    TraceParseFailed(String),

    #[error("Function {function} refers to unknown object {object}")]
    UnknownObject { function: usize, object: usize },

    #[error("Block {block} refers to unknown function {function}")]
    UnknownFunction { block: usize, function: usize },

    #[error("Event {event} refers to unknown block {block}")]
    UnknownBlock { event: usize, block: usize },

    #[error("Block {block} refers to unknown object {object}")]
    UnknownBlockObject { block: usize, object: usize },

    #[error("Invalid engine config: {0}")]
    InvalidConfig(String),

    #[error("Block {0} has no exits")]
    NoExits(usize),

    #[error("Event {event}: exit {exit} out of range for block {block}")]
    InvalidExit { event: usize, block: usize, exit: usize },

    #[error("Event {event}: invalid signal number {sig}")]
    InvalidSignal { event: usize, sig: i32 },

    #[error("Event {event}: signal {got} returned while {expected} is active on {tid}")]
    SignalMismatch { event: usize, tid: u32, expected: i32, got: i32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
