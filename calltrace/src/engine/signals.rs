//! Signal handler frames and teardown
//!
//! Delivering a signal starts a fresh call chain on the interrupted thread:
//! the interrupted state is saved, a separation marker goes onto the function
//! stack, and the handler's first block is treated like the first block of
//! the thread. Returning from the handler unwinds whatever the handler left
//! on the shadow stack and restores the saved state.

use log::{debug, info};

use crate::domain::ThreadId;
use crate::host::Host;
use crate::threads::{ExecState, SignalFrame};

use super::Engine;

impl<H: Host> Engine<H> {
    /// A handler for `sig` is about to run on `tid`
    ///
    /// # Panics
    /// Panics if `sig` is not a positive signal number.
    pub fn pre_signal(&mut self, tid: ThreadId, sig: i32) {
        assert!(sig > 0, "signal number {sig} must be positive");
        if self.threads.switch_to(tid) {
            self.stats.thread_switches += 1;
        }

        let thread = self.threads.active_mut();
        thread.signals.push(SignalFrame {
            interrupted: thread.state,
            call_stack_bottom: thread.call_stack.depth(),
            fn_sp: thread.fn_stack.depth(),
        });
        thread.state = ExecState { sig, ..ExecState::default() };
        thread.fn_stack.push(None);

        self.stats.signals += 1;
        debug!(
            "Signal {sig} on {tid}: handler frame {} at shadow depth {}",
            thread.signals.len(),
            thread.call_stack.depth()
        );
    }

    /// The handler for `sig` on `tid` returned
    ///
    /// # Panics
    /// Panics if `sig` is not the signal currently handled on `tid`.
    pub fn post_signal(&mut self, tid: ThreadId, sig: i32) {
        if self.threads.switch_to(tid) {
            self.stats.thread_switches += 1;
        }

        let active = self.threads.active().state.sig;
        assert_eq!(active, sig, "signal {sig} returned on {tid} while {active} is handled");
        self.post_signal_current();
    }

    /// Leave the innermost signal handler of the current thread
    pub(super) fn post_signal_current(&mut self) {
        let Some(frame) = self.threads.active().signals.last().copied() else {
            panic!("no signal handler active on {}", self.threads.current());
        };

        while self.threads.active().call_stack.depth() > frame.call_stack_bottom {
            self.pop_call_stack();
        }

        let thread = self.threads.active_mut();
        let sig = thread.state.sig;
        // The handler's first function was counted when it was pushed
        if let Some(cxt) = thread.state.cxt {
            let first = self.contexts.get(cxt).top();
            if self.functions.leave(first) {
                self.host.function_left(first);
            }
        }

        thread.signals.pop();
        thread.fn_stack.pop_to(frame.fn_sp);
        thread.state = frame.interrupted;
        debug!(
            "Signal {sig} on {} done, back at shadow depth {}",
            self.threads.current(),
            frame.call_stack_bottom
        );
    }

    /// Unwind every thread completely
    ///
    /// Active signal handlers are left innermost first, then all shadow
    /// frames are popped and each thread's base function is balanced.
    /// Afterwards every function's active count is zero.
    pub fn finish(&mut self) {
        let threads = self.threads.thread_ids();
        for &tid in &threads {
            self.threads.switch_to(tid);

            while !self.threads.active().signals.is_empty() {
                self.post_signal_current();
            }
            let depth = self.threads.active().call_stack.depth();
            while self.threads.active().call_stack.depth() > 0 {
                self.pop_call_stack();
            }

            let thread = self.threads.active_mut();
            if let Some(cxt) = thread.state.cxt {
                let base = self.contexts.get(cxt).top();
                if self.functions.leave(base) {
                    self.host.function_left(base);
                }
            }
            thread.fn_stack.pop_to(0);
            thread.state = ExecState::default();
            debug!("{tid} torn down ({depth} frame(s) unwound)");
        }

        info!(
            "Call graph finished: {} thread(s), {} context(s), {} BBCC(s)",
            threads.len(),
            self.contexts.len(),
            self.bbccs.len()
        );
    }
}
