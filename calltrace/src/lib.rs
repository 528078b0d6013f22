//! # calltrace - Call-Graph Reconstruction for Basic-Block Profilers
//!
//! A dynamic binary instrumentation host reports every basic block right
//! before it executes. From that stream alone, calltrace rebuilds the call
//! graph of the running program: it decides for each control transfer
//! whether it was a call, a return or a jump, keeps a shadow copy of the
//! real call stack, and maps each (block, call context, thread) triple to a
//! stable cost anchor (BBCC) the accounting layer bills to.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                Instrumentation Host / Trace File                │
//! │   block about to run · signal enter/return · block discarded    │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ setup_bb(bb)
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Engine (This Crate)                       │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │   Transfer   │──▶│ Shadow Call  │──▶│   Function   │         │
//! │  │  Classifier  │   │    Stack     │   │    Stack     │         │
//! │  └──────────────┘   └──────────────┘   └──────┬───────┘         │
//! │         │                                     │ intern          │
//! │         ▼                                     ▼                 │
//! │  ┌──────────────┐                      ┌──────────────┐         │
//! │  │     BBCC     │◀─────── context ─────│   Context    │         │
//! │  │  Directory   │                      │    Table     │         │
//! │  └──────┬───────┘                      └──────────────┘         │
//! └─────────┼───────────────────────────────────────────────────────┘
//!           │ current cost target (BbccId), call arcs, enter/leave
//!           ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                Accounting Layer (Host callbacks)                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! ### Core Engine
//!
//! - [`engine`]: the per-block state machine, call/return bookkeeping,
//!   signal frames, eviction and teardown
//! - [`context`]: function stack and the hash-consing context table
//! - [`callstack`]: shadow call stack with return-address matching
//! - [`bbcc`]: directory of (block, context, thread) cost anchors
//! - [`threads`]: per-thread execution state with O(1) switching
//!
//! ### Inputs and Surfaces
//!
//! - [`program`]: functions and basic blocks supplied by the front end
//! - [`host`]: what the engine needs from its host
//! - [`config`]: engine tuning knobs
//! - [`replay`]: trace file format, replay host, hotspot summary
//! - [`cli`]: command-line argument parsing
//! - [`domain`]: id newtypes and error types
//!
//! ## Example
//!
//! ```no_run
//! use calltrace::replay::{replay, TraceFile};
//!
//! let trace = TraceFile::from_file("run.json")?;
//! let summary = replay(&trace, trace.config.clone())?;
//! summary.print(10);
//! # Ok::<(), calltrace::domain::ReplayError>(())
//! ```

pub mod bbcc;
pub mod callstack;
pub mod cli;
pub mod config;
pub mod context;
pub mod domain;
pub mod engine;
pub mod host;
pub mod program;
pub mod replay;
pub mod threads;

pub use engine::{Engine, EngineStats};
pub use host::Host;
