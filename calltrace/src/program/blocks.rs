//! Basic block table
//!
//! Blocks are registered by the instrumentation front end and removed when
//! the host discards their translation. Each block owns the list of BBCCs
//! created for it (one per context and thread it ran in) plus a hint to the
//! BBCC it resolved to last.

use calltrace_common::{ExitInfo, JumpKind, SectionKind};

use crate::domain::{Addr, BbId, BbccId, FnId, ObjId};

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub addr: Addr,
    pub func: FnId,
    pub object: ObjId,
    pub section: SectionKind,
    /// First block of a function
    pub is_entry: bool,
    /// Conditional side exits in program order, then the final exit
    pub exits: Vec<ExitInfo>,
    pub(crate) bbccs: Vec<BbccId>,
    pub(crate) last_bbcc: Option<BbccId>,
}

impl BasicBlock {
    /// # Panics
    /// Panics if `exits` is empty: every block has at least its final exit.
    #[must_use]
    pub fn new(
        addr: Addr,
        func: FnId,
        object: ObjId,
        section: SectionKind,
        is_entry: bool,
        exits: Vec<ExitInfo>,
    ) -> Self {
        assert!(!exits.is_empty(), "block at {addr} has no final exit");
        Self { addr, func, object, section, is_entry, exits, bbccs: Vec::new(), last_bbcc: None }
    }

    /// Number of conditional side exits
    #[must_use]
    pub fn cjmp_count(&self) -> usize {
        self.exits.len() - 1
    }

    /// Exit taken after passing `passed` side exits, clamped to the final exit
    #[must_use]
    pub fn exit(&self, passed: usize) -> (usize, &ExitInfo) {
        let idx = passed.min(self.cjmp_count());
        (idx, &self.exits[idx])
    }

    /// Where a call through exit `idx` returns to, if that exit is a call
    #[must_use]
    pub fn return_address(&self, idx: usize) -> Option<Addr> {
        let exit = &self.exits[idx];
        (exit.kind == JumpKind::Call).then(|| self.addr.offset(exit.next_instr_offset()))
    }

    /// BBCCs created for this block, oldest first
    #[must_use]
    pub fn bbccs(&self) -> &[BbccId] {
        &self.bbccs
    }
}

#[derive(Debug, Default)]
pub struct BlockTable {
    slots: Vec<Option<BasicBlock>>,
    free: Vec<u32>,
    live: usize,
}

impl BlockTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    /// Panics if more than `u32::MAX` block slots are needed.
    pub fn insert(&mut self, block: BasicBlock) -> BbId {
        self.live += 1;
        if let Some(slot) = self.free.pop() {
            self.slots[slot as usize] = Some(block);
            return BbId(slot);
        }
        let slot = u32::try_from(self.slots.len()).expect("block table overflow");
        self.slots.push(Some(block));
        BbId(slot)
    }

    /// # Panics
    /// Panics if `bb` was evicted: executing an evicted block is a host bug.
    #[must_use]
    pub fn get(&self, bb: BbId) -> &BasicBlock {
        self.slots
            .get(bb.index())
            .and_then(Option::as_ref)
            .unwrap_or_else(|| panic!("{bb} is not a live block"))
    }

    pub(crate) fn get_mut(&mut self, bb: BbId) -> &mut BasicBlock {
        self.slots
            .get_mut(bb.index())
            .and_then(Option::as_mut)
            .unwrap_or_else(|| panic!("{bb} is not a live block"))
    }

    #[must_use]
    pub fn contains(&self, bb: BbId) -> bool {
        matches!(self.slots.get(bb.index()), Some(Some(_)))
    }

    pub(crate) fn remove(&mut self, bb: BbId) -> Option<BasicBlock> {
        let block = self.slots.get_mut(bb.index())?.take()?;
        self.free.push(bb.0);
        self.live -= 1;
        Some(block)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(addr: u64, exits: Vec<ExitInfo>) -> BasicBlock {
        BasicBlock::new(Addr(addr), FnId(0), ObjId(0), SectionKind::Text, false, exits)
    }

    #[test]
    fn test_return_address_of_call_exit() {
        let bb = block(
            0x1000,
            vec![ExitInfo::new(JumpKind::Jump, 4, 2), ExitInfo::new(JumpKind::Call, 10, 5)],
        );

        assert_eq!(bb.cjmp_count(), 1);
        assert_eq!(bb.return_address(1), Some(Addr(0x100f)));
        assert_eq!(bb.return_address(0), None);
    }

    #[test]
    fn test_exit_is_clamped() {
        let bb = block(0x1000, vec![ExitInfo::new(JumpKind::Return, 0, 1)]);
        let (idx, exit) = bb.exit(3);
        assert_eq!(idx, 0);
        assert_eq!(exit.kind, JumpKind::Return);
    }

    #[test]
    fn test_slots_are_reused() {
        let mut table = BlockTable::new();
        let a = table.insert(block(0x1000, vec![ExitInfo::default()]));
        let b = table.insert(block(0x2000, vec![ExitInfo::default()]));

        assert!(table.remove(a).is_some());
        assert!(!table.contains(a));
        assert!(table.remove(a).is_none());
        assert_eq!(table.len(), 1);

        let c = table.insert(block(0x3000, vec![ExitInfo::default()]));
        assert_eq!(c, a);
        assert_eq!(table.get(c).addr, Addr(0x3000));
        assert_eq!(table.get(b).addr, Addr(0x2000));
    }

    #[test]
    #[should_panic(expected = "has no final exit")]
    fn test_block_without_exits_panics() {
        let _ = block(0x1000, Vec::new());
    }
}
