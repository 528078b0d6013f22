//! Host interface
//!
//! What the engine needs from the instrumentation framework it runs inside,
//! plus the notifications it sends to the accounting layer. The replay driver
//! implements this over a trace file; tests implement it over a scripted
//! sequence.

use crate::domain::{Addr, BbccId, FnId, JccId, ThreadId};

pub trait Host {
    /// Logical thread currently executing guest code
    fn running_thread(&self) -> ThreadId;

    /// Current real stack pointer of `tid`
    fn stack_pointer(&self, tid: ThreadId) -> Addr;

    /// Jump cost center for a call from `from` through exit index `exit` to `to`
    fn new_jump_cost(&mut self, from: BbccId, exit: usize, to: BbccId) -> JccId;

    /// `func` went from zero to one active, non-recursive entries
    fn function_entered(&mut self, _func: FnId) {}

    /// `func` went from one to zero active, non-recursive entries
    fn function_left(&mut self, _func: FnId) {}

    /// Counters anchored on `bbcc` must be dropped: its block was evicted
    fn bbcc_discarded(&mut self, _bbcc: BbccId) {}
}
