//! Call-chain fingerprints
//!
//! - `fn_stack`: per-thread function stack the fingerprints are taken from
//! - `table`: process-wide hash-consing table of interned contexts

pub mod fn_stack;
pub mod table;

pub use fn_stack::FnStack;
pub use table::{Context, ContextTable};
