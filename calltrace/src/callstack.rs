//! Shadow call stack
//!
//! The engine's own reconstruction of one thread's real call stack. Every
//! frame remembers the stack pointer seen at the call, the address the call
//! should return to, and what to restore when it is popped.
//!
//! The slot right above the top frame is reserved: the context to restore is
//! staged there before the frame itself is pushed, and it must be empty at
//! every other time.

use crate::domain::{Addr, BbccId, ContextId, FnId, JccId};

/// Call edge recorded for a costed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallArc {
    pub jcc: JccId,
    /// Innermost function of the calling context
    pub caller: FnId,
    /// Innermost function of the called context
    pub callee: FnId,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallEntry {
    /// `None` for a call into skipped code
    pub jcc: Option<CallArc>,
    /// Stack pointer right after the call
    pub sp: Addr,
    /// `Addr::NONE` unless the frame was pushed by a real call instruction
    pub ret_addr: Addr,
    /// Caller context, restored on pop
    pub cxt: Option<ContextId>,
    /// Caller's function-stack depth, restored on pop
    pub fn_sp: usize,
    /// Last non-skipped BBCC when the frame was pushed
    pub nonskipped: Option<BbccId>,
}

#[derive(Debug, Clone)]
pub struct ShadowCallStack {
    /// Frames followed by the reserved slot; `len() == depth + 1`
    entries: Vec<CallEntry>,
}

impl ShadowCallStack {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let mut entries = Vec::with_capacity(capacity.max(1));
        entries.push(CallEntry::default());
        Self { entries }
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.entries.len() - 1
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.depth() == 0
    }

    #[must_use]
    pub fn top(&self) -> Option<&CallEntry> {
        let depth = self.depth();
        (depth > 0).then(|| &self.entries[depth - 1])
    }

    pub(crate) fn frames_mut(&mut self) -> &mut [CallEntry] {
        let depth = self.depth();
        &mut self.entries[..depth]
    }

    /// Context staged for the next push
    #[must_use]
    pub fn staged_context(&self) -> Option<ContextId> {
        self.reserved().cxt
    }

    /// Save the caller context and function-stack depth for the next push
    ///
    /// # Panics
    /// Panics if a context is already staged.
    pub fn stage_context(&mut self, cxt: Option<ContextId>, fn_sp: usize) {
        let slot = self.reserved_mut();
        assert!(slot.cxt.is_none(), "reserved slot above shadow stack top already holds a context");
        slot.cxt = cxt;
        slot.fn_sp = fn_sp;
    }

    /// Turn the reserved slot into a frame and reserve a fresh slot above it
    pub fn push(&mut self, jcc: Option<CallArc>, sp: Addr, ret_addr: Addr, nonskipped: Option<BbccId>) {
        let slot = self.reserved_mut();
        slot.jcc = jcc;
        slot.sp = sp;
        slot.ret_addr = ret_addr;
        slot.nonskipped = nonskipped;
        self.entries.push(CallEntry::default());
    }

    /// Remove the top frame; it becomes the (cleared) reserved slot
    ///
    /// # Panics
    /// Panics on an empty stack, or if a context is staged.
    pub fn pop(&mut self) -> CallEntry {
        assert!(!self.is_empty(), "pop from empty shadow call stack");
        let reserved = self.entries.pop().unwrap_or_default();
        assert!(reserved.cxt.is_none(), "shadow stack popped while a context was staged");
        std::mem::take(self.reserved_mut())
    }

    /// How many frames a return to `target` at stack pointer `sp` leaves
    ///
    /// `None` means the return does not match the tracked frames and is
    /// really a jump: either the stack grew below the top frame, or the
    /// stack pointer equals the top frame's and no frame sharing that
    /// stack pointer was called from right before `target`.
    #[must_use]
    pub fn return_depth(&self, sp: Addr, target: Addr) -> Option<usize> {
        let mut idx = self.depth().checked_sub(1)?;
        let mut frame = &self.entries[idx];

        if sp < frame.sp {
            return None;
        }
        if sp > frame.sp {
            return Some(1);
        }

        let mut pops = 1;
        loop {
            if frame.ret_addr == target {
                return Some(pops);
            }
            if idx == 0 {
                return None;
            }
            idx -= 1;
            frame = &self.entries[idx];
            if frame.sp != sp {
                return None;
            }
            pops += 1;
        }
    }

    fn reserved(&self) -> &CallEntry {
        &self.entries[self.entries.len() - 1]
    }

    fn reserved_mut(&mut self) -> &mut CallEntry {
        let last = self.entries.len() - 1;
        &mut self.entries[last]
    }
}
