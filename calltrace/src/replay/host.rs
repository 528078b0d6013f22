//! Host implementation backed by a trace file
//!
//! The replay driver sets the thread and stack pointer of each event before
//! handing it to the engine. Jump cost centers are deduplicated per
//! (caller BBCC, exit, callee BBCC) arc and count how often each arc was
//! taken.

use std::collections::HashMap;

use calltrace_common::INITIAL_THREAD;

use crate::domain::{Addr, BbccId, FnId, JccId, ThreadId};
use crate::host::Host;

#[derive(Debug)]
pub struct ReplayHost {
    tid: ThreadId,
    sp: Addr,
    arcs: HashMap<(BbccId, usize, BbccId), JccId>,
    /// Calls per jump cost center, indexed by `JccId`
    calls: Vec<u64>,
    entries: HashMap<FnId, u64>,
    discarded: u64,
}

impl Default for ReplayHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayHost {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tid: ThreadId(INITIAL_THREAD),
            sp: Addr::NONE,
            arcs: HashMap::new(),
            calls: Vec::new(),
            entries: HashMap::new(),
            discarded: 0,
        }
    }

    /// Thread and stack pointer of the event about to be delivered
    pub fn set_position(&mut self, tid: ThreadId, sp: Addr) {
        self.tid = tid;
        self.sp = sp;
    }

    /// Jump cost centers handed out so far
    #[must_use]
    pub fn arc_count(&self) -> usize {
        self.calls.len()
    }

    /// Times the arc behind `jcc` was called
    #[must_use]
    pub fn calls(&self, jcc: JccId) -> u64 {
        usize::try_from(jcc.0).ok().and_then(|i| self.calls.get(i)).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total_calls(&self) -> u64 {
        self.calls.iter().sum()
    }

    #[must_use]
    pub fn total_entries(&self) -> u64 {
        self.entries.values().sum()
    }

    #[must_use]
    pub fn discarded_bbccs(&self) -> u64 {
        self.discarded
    }
}

impl Host for ReplayHost {
    fn running_thread(&self) -> ThreadId {
        self.tid
    }

    fn stack_pointer(&self, _tid: ThreadId) -> Addr {
        self.sp
    }

    fn new_jump_cost(&mut self, from: BbccId, exit: usize, to: BbccId) -> JccId {
        let next = JccId(self.calls.len() as u64);
        let jcc = *self.arcs.entry((from, exit, to)).or_insert(next);
        if jcc == next {
            self.calls.push(0);
        }
        if let Some(count) = usize::try_from(jcc.0).ok().and_then(|i| self.calls.get_mut(i)) {
            *count += 1;
        }
        jcc
    }

    fn function_entered(&mut self, func: FnId) {
        *self.entries.entry(func).or_insert(0) += 1;
    }

    fn bbcc_discarded(&mut self, bbcc: BbccId) {
        // Slot ids are reused, so arcs through a dropped BBCC must not match again
        self.arcs.retain(|&(from, _, to), _| from != bbcc && to != bbcc);
        self.discarded += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arcs_are_deduplicated() {
        let mut host = ReplayHost::new();
        let a = host.new_jump_cost(BbccId(0), 1, BbccId(2));
        let b = host.new_jump_cost(BbccId(0), 1, BbccId(2));
        let c = host.new_jump_cost(BbccId(0), 0, BbccId(2));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(host.arc_count(), 2);
        assert_eq!(host.calls(a), 2);
        assert_eq!(host.total_calls(), 3);
    }

    #[test]
    fn test_discard_forgets_arcs() {
        let mut host = ReplayHost::new();
        let a = host.new_jump_cost(BbccId(0), 0, BbccId(1));
        host.bbcc_discarded(BbccId(1));
        let b = host.new_jump_cost(BbccId(0), 0, BbccId(1));

        assert_ne!(a, b);
        assert_eq!(host.calls(a), 1);
        assert_eq!(host.discarded_bbccs(), 1);
    }

    #[test]
    fn test_position_drives_queries() {
        let mut host = ReplayHost::new();
        assert_eq!(host.running_thread(), ThreadId(1));
        host.set_position(ThreadId(4), Addr(0x7000));
        assert_eq!(host.running_thread(), ThreadId(4));
        assert_eq!(host.stack_pointer(ThreadId(4)), Addr(0x7000));
    }
}
