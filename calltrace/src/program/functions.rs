//! Function table
//!
//! Every function the front end reports gets one `FnNode`. Besides its name
//! and owning object, a node carries two pieces of engine state: the context
//! most recently interned with this function on top (a lookup hint), and the
//! number of active, non-directly-recursive entries.

use crate::domain::{ContextId, FnId, ObjId};

#[derive(Debug, Clone)]
pub struct FnNode {
    pub name: String,
    pub object: ObjId,
    /// Calls into this function are rolled up into the caller's context
    pub skip: bool,
    pub(crate) last_cxt: Option<ContextId>,
    active: u32,
}

#[derive(Debug, Default)]
pub struct FunctionTable {
    nodes: Vec<FnNode>,
}

impl FunctionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function and return its identity
    ///
    /// # Panics
    /// Panics if more than `u32::MAX` functions are registered.
    pub fn register(&mut self, name: impl Into<String>, object: ObjId, skip: bool) -> FnId {
        let id = FnId(u32::try_from(self.nodes.len()).expect("function table overflow"));
        self.nodes.push(FnNode { name: name.into(), object, skip, last_cxt: None, active: 0 });
        id
    }

    #[must_use]
    pub fn get(&self, func: FnId) -> &FnNode {
        &self.nodes[func.index()]
    }

    pub(crate) fn get_mut(&mut self, func: FnId) -> &mut FnNode {
        &mut self.nodes[func.index()]
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<FnId> {
        self.nodes
            .iter()
            .position(|n| n.name == name)
            .and_then(|i| u32::try_from(i).ok())
            .map(FnId)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of active entries into `func`
    #[must_use]
    pub fn active_count(&self, func: FnId) -> u32 {
        self.nodes[func.index()].active
    }

    /// Record an entry into `func`; returns true when it just became active
    pub(crate) fn enter(&mut self, func: FnId) -> bool {
        let node = &mut self.nodes[func.index()];
        node.active += 1;
        node.active == 1
    }

    /// Record a return from `func`; returns true when it is no longer active
    ///
    /// # Panics
    /// Panics if `func` is not active: the recursion bookkeeping would go
    /// negative.
    pub(crate) fn leave(&mut self, func: FnId) -> bool {
        let node = &mut self.nodes[func.index()];
        assert!(node.active > 0, "active count of {} ({func}) would go negative", node.name);
        node.active -= 1;
        node.active == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_find() {
        let mut table = FunctionTable::new();
        let main = table.register("main", ObjId(0), false);
        let memcpy = table.register("memcpy", ObjId(1), true);

        assert_eq!(table.len(), 2);
        assert_eq!(table.find("memcpy"), Some(memcpy));
        assert_eq!(table.get(main).name, "main");
        assert!(table.get(memcpy).skip);
        assert_eq!(table.find("printf"), None);
    }

    #[test]
    fn test_active_transitions() {
        let mut table = FunctionTable::new();
        let f = table.register("f", ObjId(0), false);

        assert!(table.enter(f));
        assert!(!table.enter(f));
        assert_eq!(table.active_count(f), 2);
        assert!(!table.leave(f));
        assert!(table.leave(f));
    }

    #[test]
    #[should_panic(expected = "would go negative")]
    fn test_leave_inactive_panics() {
        let mut table = FunctionTable::new();
        let f = table.register("f", ObjId(0), false);
        table.leave(f);
    }
}
