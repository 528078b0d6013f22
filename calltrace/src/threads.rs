//! Per-thread execution state
//!
//! Each logical thread owns its shadow call stack, function stack and
//! scratch state. Exactly one thread's state is active at a time; switching
//! threads moves the active state into the parked map and takes the new
//! thread's state out of it, so no stack is ever copied.

use std::collections::HashMap;

use calltrace_common::INITIAL_THREAD;

use crate::callstack::ShadowCallStack;
use crate::context::FnStack;
use crate::domain::{BbccId, ContextId, ThreadId};

/// Scratch state carried from one block execution to the next
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecState {
    /// Signal being handled, 0 outside handlers
    pub sig: i32,
    /// Active context
    pub cxt: Option<ContextId>,
    /// BBCC of the block executed last; `None` at a boundary
    pub bbcc: Option<BbccId>,
    /// Conditional side exits passed in the current block
    pub jmps_passed: usize,
    /// Last BBCC executed outside skipped code, while inside it
    pub nonskipped: Option<BbccId>,
}

/// What a signal handler interrupted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalFrame {
    pub interrupted: ExecState,
    /// Shadow stack depth when the handler started
    pub call_stack_bottom: usize,
    /// Function stack depth before the separation marker was pushed
    pub fn_sp: usize,
}

#[derive(Debug, Clone)]
pub struct ThreadExecutionState {
    pub call_stack: ShadowCallStack,
    pub fn_stack: FnStack,
    pub state: ExecState,
    /// Innermost handler last
    pub signals: Vec<SignalFrame>,
}

impl ThreadExecutionState {
    #[must_use]
    pub fn new(fn_stack_capacity: usize, call_stack_capacity: usize) -> Self {
        Self {
            call_stack: ShadowCallStack::new(call_stack_capacity),
            fn_stack: FnStack::new(fn_stack_capacity),
            state: ExecState::default(),
            signals: Vec::new(),
        }
    }

    /// Forget every BBCC reference for which `evicted` holds
    ///
    /// Returns the number of references cleared.
    pub fn scrub(&mut self, evicted: impl Fn(BbccId) -> bool) -> usize {
        let clear = |slot: &mut Option<BbccId>| -> usize {
            match *slot {
                Some(id) if evicted(id) => {
                    *slot = None;
                    1
                }
                _ => 0,
            }
        };

        let mut cleared = clear(&mut self.state.bbcc) + clear(&mut self.state.nonskipped);
        for frame in &mut self.signals {
            cleared += clear(&mut frame.interrupted.bbcc);
            cleared += clear(&mut frame.interrupted.nonskipped);
        }
        for entry in self.call_stack.frames_mut() {
            cleared += clear(&mut entry.nonskipped);
        }
        cleared
    }
}

#[derive(Debug)]
pub struct ThreadRegistry {
    current: ThreadId,
    active: ThreadExecutionState,
    parked: HashMap<ThreadId, ThreadExecutionState>,
    fn_stack_capacity: usize,
    call_stack_capacity: usize,
}

impl ThreadRegistry {
    #[must_use]
    pub fn new(fn_stack_capacity: usize, call_stack_capacity: usize) -> Self {
        Self {
            current: ThreadId(INITIAL_THREAD),
            active: ThreadExecutionState::new(fn_stack_capacity, call_stack_capacity),
            parked: HashMap::new(),
            fn_stack_capacity,
            call_stack_capacity,
        }
    }

    #[must_use]
    pub fn current(&self) -> ThreadId {
        self.current
    }

    #[must_use]
    pub fn active(&self) -> &ThreadExecutionState {
        &self.active
    }

    pub fn active_mut(&mut self) -> &mut ThreadExecutionState {
        &mut self.active
    }

    /// State of `tid`, whether active or parked
    #[must_use]
    pub fn get(&self, tid: ThreadId) -> Option<&ThreadExecutionState> {
        if tid == self.current {
            Some(&self.active)
        } else {
            self.parked.get(&tid)
        }
    }

    /// Make `tid` the active thread, creating its state on first sight
    ///
    /// Returns false if `tid` was already active.
    pub fn switch_to(&mut self, tid: ThreadId) -> bool {
        if tid == self.current {
            return false;
        }

        let incoming = self.parked.remove(&tid).unwrap_or_else(|| {
            ThreadExecutionState::new(self.fn_stack_capacity, self.call_stack_capacity)
        });
        let outgoing = std::mem::replace(&mut self.active, incoming);
        self.parked.insert(self.current, outgoing);
        self.current = tid;
        true
    }

    /// Every thread seen so far, in ascending order
    #[must_use]
    pub fn thread_ids(&self) -> Vec<ThreadId> {
        let mut ids: Vec<_> = self.parked.keys().copied().chain([self.current]).collect();
        ids.sort_unstable();
        ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parked.len() + 1
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Scrub evicted BBCC references from every thread, parked or not
    pub fn scrub_all(&mut self, evicted: impl Fn(BbccId) -> bool) -> usize {
        let mut cleared = self.active.scrub(&evicted);
        for state in self.parked.values_mut() {
            cleared += state.scrub(&evicted);
        }
        cleared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Addr, FnId};

    #[test]
    fn test_switch_preserves_state() {
        let mut threads = ThreadRegistry::new(8, 8);
        assert_eq!(threads.current(), ThreadId(1));

        threads.active_mut().fn_stack.push(Some(FnId(3)));
        threads.active_mut().state.jmps_passed = 2;

        assert!(threads.switch_to(ThreadId(2)));
        assert_eq!(threads.active().fn_stack.depth(), 0);
        assert_eq!(threads.active().state, ExecState::default());

        assert!(threads.switch_to(ThreadId(1)));
        assert_eq!(threads.active().fn_stack.top(), Some(FnId(3)));
        assert_eq!(threads.active().state.jmps_passed, 2);
        assert!(!threads.switch_to(ThreadId(1)));

        assert_eq!(threads.thread_ids(), vec![ThreadId(1), ThreadId(2)]);
        assert_eq!(threads.len(), 2);
    }

    #[test]
    fn test_scrub_clears_every_reference() {
        let mut threads = ThreadRegistry::new(8, 8);
        let dead = BbccId(4);
        let live = BbccId(5);

        {
            let active = threads.active_mut();
            active.state.bbcc = Some(dead);
            active.state.nonskipped = Some(live);
            active.call_stack.stage_context(None, 0);
            active.call_stack.push(None, Addr(0x8000), Addr::NONE, Some(dead));
            active.signals.push(SignalFrame {
                interrupted: ExecState { bbcc: Some(dead), ..ExecState::default() },
                call_stack_bottom: 0,
                fn_sp: 0,
            });
        }
        threads.switch_to(ThreadId(7));
        threads.active_mut().state.nonskipped = Some(dead);

        assert_eq!(threads.scrub_all(|id| id == dead), 4);

        assert_eq!(threads.active().state.nonskipped, None);
        threads.switch_to(ThreadId(1));
        let active = threads.active();
        assert_eq!(active.state.bbcc, None);
        assert_eq!(active.state.nonskipped, Some(live));
        assert_eq!(active.call_stack.top().unwrap().nonskipped, None);
        assert_eq!(active.signals[0].interrupted.bbcc, None);
    }
}
