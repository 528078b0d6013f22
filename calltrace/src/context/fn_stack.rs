//! Function stack
//!
//! The naive lexical call chain of one thread, used only to derive context
//! fingerprints. Slot 0 is a permanent bottom marker; a `None` above it marks
//! the start of a signal handler. Direct self-calls are collapsed, so this is
//! not a mirror of the shadow call stack.

use crate::domain::FnId;

#[derive(Debug, Clone)]
pub struct FnStack {
    slots: Vec<Option<FnId>>,
}

impl FnStack {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity.max(1));
        slots.push(None);
        Self { slots }
    }

    /// Index of the top slot (0 when only the bottom marker is present)
    #[must_use]
    pub fn depth(&self) -> usize {
        self.slots.len() - 1
    }

    /// Function on top, `None` at the bottom or right above a signal marker
    #[must_use]
    pub fn top(&self) -> Option<FnId> {
        self.slots.last().copied().flatten()
    }

    /// Push a function, or a signal marker with `None`
    pub fn push(&mut self, func: Option<FnId>) {
        self.slots.push(func);
    }

    /// Truncate back to a depth recorded earlier
    ///
    /// # Panics
    /// Panics if `depth` lies above the current top.
    pub fn pop_to(&mut self, depth: usize) {
        assert!(
            depth <= self.depth(),
            "function stack restore to {depth} above current top {}",
            self.depth()
        );
        self.slots.truncate(depth + 1);
    }

    /// Functions from the top down to the nearest marker
    pub fn chain(&self) -> impl Iterator<Item = FnId> + Clone + '_ {
        self.slots.iter().rev().map_while(|f| *f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_stops_at_marker() {
        let mut stack = FnStack::new(4);
        stack.push(Some(FnId(1)));
        stack.push(Some(FnId(2)));
        stack.push(None);
        stack.push(Some(FnId(7)));

        assert_eq!(stack.depth(), 4);
        assert_eq!(stack.chain().collect::<Vec<_>>(), vec![FnId(7)]);

        stack.pop_to(2);
        assert_eq!(stack.chain().collect::<Vec<_>>(), vec![FnId(2), FnId(1)]);
    }

    #[test]
    fn test_grows_past_initial_capacity() {
        let mut stack = FnStack::new(2);
        for i in 0..1000 {
            stack.push(Some(FnId(i)));
        }
        assert_eq!(stack.depth(), 1000);
        assert_eq!(stack.top(), Some(FnId(999)));
    }

    #[test]
    fn test_empty_stack() {
        let stack = FnStack::new(8);
        assert_eq!(stack.depth(), 0);
        assert_eq!(stack.top(), None);
        assert_eq!(stack.chain().count(), 0);
    }

    #[test]
    #[should_panic(expected = "above current top")]
    fn test_pop_to_above_top_panics() {
        let mut stack = FnStack::new(2);
        stack.pop_to(3);
    }
}
