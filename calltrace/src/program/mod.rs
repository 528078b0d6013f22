//! Program model supplied by the instrumentation front end
//!
//! - `functions`: function identities, skip flags, active-depth counters
//! - `blocks`: decoded basic blocks with their exits and BBCC lists

pub mod blocks;
pub mod functions;

pub use blocks::{BasicBlock, BlockTable};
pub use functions::{FnNode, FunctionTable};
