//! Transfer classifier
//!
//! Runs once per executed block. Works out how control reached the block
//! from the previous one (fall-through, jump, call or return), reconciles
//! the shadow call stack with that, and resolves the BBCC the block's cost
//! goes to.
//!
//! The decode-time exit kind is only a first guess:
//!
//! - a return whose stack pointer did not leave the top tracked frame is a
//!   jump (`longjmp`, or a return address pushed by hand)
//! - a jump onto a function entry, into another section kind or into
//!   another object is a call (tail calls, PLT stubs)
//! - a return with no tracked frame to pop is a call into the function
//!   returned to
//! - any transfer that leaves tracked frames behind on the real stack
//!   is a return

use calltrace_common::JumpKind;
use log::{debug, trace};

use crate::config::TailCallHeuristic;
use crate::domain::{BbId, BbccId, ContextId, ThreadId};
use crate::host::Host;

use super::Engine;

/// The block executed before the current one
#[derive(Debug, Clone, Copy)]
struct Predecessor {
    bbcc: BbccId,
    bb: BbId,
    /// Index of the exit it left through
    exit: usize,
    kind: JumpKind,
}

impl<H: Host> Engine<H> {
    /// Classify the transfer into `bb` and return the BBCC to bill it to
    ///
    /// # Panics
    /// Panics if `bb` is not a live block, or if the call-graph state is
    /// found inconsistent.
    pub fn setup_bb(&mut self, bb: BbId) -> BbccId {
        let tid = self.host.running_thread();
        if self.threads.switch_to(tid) {
            self.stats.thread_switches += 1;
            trace!("Switched to {tid}");
        }
        let mut sp = self.host.stack_pointer(tid);
        self.stats.blocks_executed += 1;

        let prev = self.predecessor();
        let mut kind = prev.map(|p| p.kind);

        // A return is real only if the stack left the top tracked frame
        let mut ret_without_call = false;
        let mut popcount = 1;
        if kind == Some(JumpKind::Return) && !self.threads.active().call_stack.is_empty() {
            let target = self.blocks.get(bb).addr;
            match self.threads.active().call_stack.return_depth(sp, target) {
                Some(n) => popcount = n,
                None => {
                    debug!("Return to {target} at sp {sp} matches no frame, treating as jump");
                    kind = Some(JumpKind::Jump);
                    ret_without_call = true;
                    self.stats.returns_as_jumps += 1;
                }
            }
        }

        let mut call_emulation = false;
        if let Some(p) = prev {
            if kind != Some(JumpKind::Return)
                && kind != Some(JumpKind::Call)
                && self.promotes_to_call(p.bb, bb, ret_without_call)
            {
                trace!("Transfer {} -> {bb} promoted to call", p.bb);
                kind = Some(JumpKind::Call);
                call_emulation = true;
                self.stats.promoted_calls += 1;
            }
        }

        let mut delayed_push = false;
        if kind == Some(JumpKind::Return) {
            if self.handler_has_no_frames() {
                debug!("Return into {bb} with no frame to pop, treating as call");
                kind = Some(JumpKind::Call);
                delayed_push = true;
                self.stats.emulated_calls += 1;
            } else {
                assert!(popcount > 0, "return must pop at least one frame");
                self.unwind_call_stack(sp, popcount);
            }
        } else {
            if self.unwind_call_stack(sp, 0) > 0 {
                kind = Some(JumpKind::Return);
            }
            if kind == Some(JumpKind::Call) {
                delayed_push = true;
                if call_emulation {
                    if let Some(top) = self.threads.active().call_stack.top() {
                        sp = top.sp;
                    }
                }
            }
        }

        let func = self.blocks.get(bb).func;
        let skip = delayed_push && self.functions.get(func).skip;
        if (delayed_push && !skip) || self.threads.active().state.cxt.is_none() {
            self.push_cxt(func);
        }
        let Some(cxt) = self.threads.active().state.cxt else {
            panic!("no active context after entering {bb}");
        };

        let bbcc = self.resolve_bbcc(bb, cxt, tid, prev.map(|p| p.bbcc));
        if let Some(p) = prev {
            self.bbccs.get_mut(p.bbcc).lru_next = Some(bbcc);
        }

        if let Some(p) = prev.filter(|_| delayed_push) {
            let (from, exit) = match self.threads.active().state.nonskipped {
                // Leaving skipped code: bill the call to the last costed block
                Some(ancestor) => {
                    let ancestor_bb = self.bbccs.get(ancestor).block();
                    (ancestor, self.blocks.get(ancestor_bb).cjmp_count())
                }
                None => (p.bbcc, p.exit),
            };
            self.push_call_stack(from, exit, bbcc, sp, skip);
        }

        let state = &mut self.threads.active_mut().state;
        state.bbcc = Some(bbcc);
        state.jmps_passed = 0;
        trace!("{bb} -> {bbcc} in {cxt} ({kind:?})");
        bbcc
    }

    fn predecessor(&self) -> Option<Predecessor> {
        let state = &self.threads.active().state;
        let bbcc = state.bbcc?;
        let bb = self.bbccs.get(bbcc).block();
        let (exit, info) = self.blocks.get(bb).exit(state.jmps_passed);
        Some(Predecessor { bbcc, bb, exit, kind: info.kind })
    }

    fn promotes_to_call(&self, from: BbId, to: BbId, ret_without_call: bool) -> bool {
        let (from, to) = (self.blocks.get(from), self.blocks.get(to));
        let lands_on_entry = match self.config.tail_call_heuristic {
            TailCallHeuristic::AnyEntry => to.is_entry,
            TailCallHeuristic::OtherFunctionEntry => to.is_entry && from.func != to.func,
        };
        ret_without_call || lands_on_entry || from.section != to.section || from.object != to.object
    }

    /// No frame was pushed since the thread started or the current signal
    /// handler was entered
    fn handler_has_no_frames(&self) -> bool {
        let thread = self.threads.active();
        let bottom = thread.signals.last().map_or(0, |s| s.call_stack_bottom);
        thread.call_stack.depth() <= bottom
    }

    fn resolve_bbcc(
        &mut self,
        bb: BbId,
        cxt: ContextId,
        tid: ThreadId,
        last: Option<BbccId>,
    ) -> BbccId {
        if self.blocks.get(bb).bbccs.is_empty() {
            let id = self.bbccs.spawn(bb, cxt, tid);
            let block = self.blocks.get_mut(bb);
            block.bbccs.push(id);
            block.last_bbcc = Some(id);
            return id;
        }

        let id = if let Some(hit) = self.lru_hint(last, bb, cxt, tid) {
            self.stats.lru_hits += 1;
            hit
        } else if let Some(hit) = self
            .blocks
            .get(bb)
            .last_bbcc
            .filter(|&id| self.bbccs.try_get(id).is_some_and(|b| b.is_for(bb, cxt, tid)))
        {
            self.stats.block_hint_hits += 1;
            hit
        } else {
            self.stats.directory_probes += 1;
            match self.bbccs.lookup(bb, cxt, tid) {
                Some(found) => found,
                None => {
                    self.stats.bbcc_clones += 1;
                    let id = self.bbccs.spawn(bb, cxt, tid);
                    self.blocks.get_mut(bb).bbccs.push(id);
                    trace!("{bb} cloned into {cxt} on {tid} as {id}");
                    id
                }
            }
        };

        self.blocks.get_mut(bb).last_bbcc = Some(id);
        id
    }

    fn lru_hint(
        &self,
        last: Option<BbccId>,
        bb: BbId,
        cxt: ContextId,
        tid: ThreadId,
    ) -> Option<BbccId> {
        let next = self.bbccs.get(last?).lru_next?;
        self.bbccs.try_get(next).is_some_and(|b| b.is_for(bb, cxt, tid)).then_some(next)
    }
}
