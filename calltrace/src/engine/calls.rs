//! Call and return bookkeeping
//!
//! Keeps the shadow call stack, the function stack and the per-function
//! active counters in step. A function's counter only moves when a call
//! crosses into a different function, so direct recursion enters and leaves
//! it once.

use log::trace;

use crate::callstack::CallArc;
use crate::domain::{Addr, BbccId, FnId};
use crate::host::Host;

use super::Engine;

impl<H: Host> Engine<H> {
    /// Stage the caller context and make `func` the innermost function
    pub(super) fn push_cxt(&mut self, func: FnId) {
        let thread = self.threads.active_mut();
        thread.call_stack.stage_context(thread.state.cxt, thread.fn_stack.depth());

        // Direct self-calls share one function-stack slot
        if thread.fn_stack.top() == Some(func) {
            return;
        }

        if thread.fn_stack.top().is_none() && self.functions.enter(func) {
            self.host.function_entered(func);
        }
        thread.fn_stack.push(Some(func));
        thread.state.cxt = self.contexts.intern(thread.fn_stack.chain(), &mut self.functions);
    }

    /// Push a frame for a call from `from` (through exit `exit`) to `to`
    pub(super) fn push_call_stack(
        &mut self,
        from: BbccId,
        exit: usize,
        to: BbccId,
        sp: Addr,
        skip: bool,
    ) {
        let jcc = if skip {
            None
        } else {
            let thread = self.threads.active();
            if let Some(ancestor) = thread.state.nonskipped {
                assert_eq!(ancestor, from, "call out of skipped code must come from {ancestor}");
            }
            assert!(
                thread.call_stack.staged_context().is_some(),
                "caller context must be staged before a costed call is pushed"
            );

            let caller = self.contexts.get(self.bbccs.get(from).context()).top();
            let callee = self.contexts.get(self.bbccs.get(to).context()).top();
            let jcc = self.host.new_jump_cost(from, exit, to);
            if caller != callee && self.functions.enter(callee) {
                self.host.function_entered(callee);
            }
            Some(CallArc { jcc, caller, callee })
        };

        // Only a real call instruction leaves a usable return address
        let from_bb = self.bbccs.get(from).block();
        let ret_addr = self.blocks.get(from_bb).return_address(exit).unwrap_or(Addr::NONE);

        let thread = self.threads.active_mut();
        thread.call_stack.push(jcc, sp, ret_addr, thread.state.nonskipped);
        if !skip {
            thread.state.nonskipped = None;
        } else if thread.state.nonskipped.is_none() {
            thread.state.nonskipped = Some(from);
        }

        self.stats.calls += 1;
        trace!("Pushed frame {} at sp {sp} (ret {ret_addr})", thread.call_stack.depth());
    }

    /// Pop the top frame, restoring the caller's context
    pub(super) fn pop_call_stack(&mut self) {
        // A frame at a handler's bottom belongs to the interrupted code:
        // popping it means the handler was left without returning
        while self.at_handler_bottom() {
            trace!("Unwinding out of signal handler {}", self.threads.active().state.sig);
            self.post_signal_current();
        }

        let thread = self.threads.active_mut();
        let entry = thread.call_stack.pop();
        thread.state.nonskipped = entry.nonskipped;

        if let Some(arc) = entry.jcc {
            let Some(cxt) = entry.cxt else {
                panic!("costed frame {} has no caller context", thread.call_stack.depth() + 1);
            };
            thread.state.cxt = Some(cxt);
            thread.fn_stack.pop_to(entry.fn_sp);

            if arc.caller != arc.callee && self.functions.leave(arc.callee) {
                self.host.function_left(arc.callee);
            }
        }
        self.stats.returns += 1;
    }

    /// Pop every frame the real stack has left behind
    ///
    /// Frames recorded at a lower stack pointer than `sp` are always popped;
    /// frames at exactly `sp` only while `minpops` is not used up. Returns
    /// the number of frames popped.
    pub(super) fn unwind_call_stack(&mut self, sp: Addr, minpops: usize) -> usize {
        let mut minpops = minpops;
        let mut unwound = 0;

        while let Some(top_sp) = self.threads.active().call_stack.top().map(|e| e.sp) {
            if top_sp < sp || (top_sp == sp && minpops > 0) {
                minpops = minpops.saturating_sub(1);
                unwound += 1;
                self.pop_call_stack();
            } else {
                break;
            }
        }

        if unwound > 0 {
            trace!("Unwound {unwound} frame(s) to sp {sp}");
        }
        unwound
    }

    fn at_handler_bottom(&self) -> bool {
        let thread = self.threads.active();
        thread.state.sig > 0
            && thread.signals.last().is_some_and(|s| s.call_stack_bottom == thread.call_stack.depth())
    }
}
