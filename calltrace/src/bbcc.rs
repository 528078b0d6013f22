//! BBCC directory
//!
//! Maps (basic block, context, thread) to the BBCC record that anchors the
//! accounting layer's cost counters. Records live in a slot arena; the
//! directory indexes them in a chained hash table keyed by
//! `(block + context) mod buckets`.
//!
//! # Growth
//!
//! After an insert pushes the load factor above 90%, the table is rebuilt
//! with `2 * buckets + 3` buckets. Lookups never trigger a resize.

use log::info;

use crate::domain::{BbId, BbccId, ContextId, ThreadId};

/// Cost anchor for one block executed in one context by one thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bbcc {
    bb: BbId,
    cxt: ContextId,
    tid: ThreadId,
    /// BBCC executed right after this one last time
    pub(crate) lru_next: Option<BbccId>,
}

impl Bbcc {
    #[must_use]
    pub fn block(&self) -> BbId {
        self.bb
    }

    #[must_use]
    pub fn context(&self) -> ContextId {
        self.cxt
    }

    #[must_use]
    pub fn thread(&self) -> ThreadId {
        self.tid
    }

    #[must_use]
    pub fn is_for(&self, bb: BbId, cxt: ContextId, tid: ThreadId) -> bool {
        self.bb == bb && self.cxt == cxt && self.tid == tid
    }
}

#[derive(Debug)]
pub struct BbccDirectory {
    slots: Vec<Option<Bbcc>>,
    free: Vec<u32>,
    buckets: Vec<Vec<BbccId>>,
    entries: usize,
    resizes: usize,
}

impl BbccDirectory {
    /// # Panics
    /// Panics if `buckets` is zero.
    #[must_use]
    pub fn new(buckets: usize) -> Self {
        assert!(buckets > 0, "BBCC directory needs at least one bucket");
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            buckets: vec![Vec::new(); buckets],
            entries: 0,
            resizes: 0,
        }
    }

    /// Create a record with zeroed accounting state and index it
    ///
    /// Used both for a block's first execution and for cloning a known
    /// block into a new context or thread.
    ///
    /// # Panics
    /// Panics if a record for the same key already exists.
    pub fn spawn(&mut self, bb: BbId, cxt: ContextId, tid: ThreadId) -> BbccId {
        assert!(self.lookup(bb, cxt, tid).is_none(), "duplicate BBCC for {bb} in {cxt} on {tid}");

        let record = Bbcc { bb, cxt, tid, lru_next: None };
        let id = if let Some(slot) = self.free.pop() {
            self.slots[slot as usize] = Some(record);
            BbccId(slot)
        } else {
            let slot = u32::try_from(self.slots.len()).expect("BBCC arena overflow");
            self.slots.push(Some(record));
            BbccId(slot)
        };

        let bucket = self.bucket_of(bb, cxt);
        self.buckets[bucket].push(id);
        self.entries += 1;
        if 100 * self.entries / self.buckets.len() > 90 {
            self.resize();
        }
        id
    }

    /// Probe the hash table for the record of a key
    #[must_use]
    pub fn lookup(&self, bb: BbId, cxt: ContextId, tid: ThreadId) -> Option<BbccId> {
        self.buckets[self.bucket_of(bb, cxt)]
            .iter()
            .copied()
            .find(|id| self.slots[id.index()].as_ref().is_some_and(|b| b.is_for(bb, cxt, tid)))
    }

    /// # Panics
    /// Panics if `id` refers to an evicted record.
    #[must_use]
    pub fn get(&self, id: BbccId) -> &Bbcc {
        self.try_get(id).unwrap_or_else(|| panic!("{id} is not a live BBCC"))
    }

    /// Record behind a possibly stale handle
    #[must_use]
    pub fn try_get(&self, id: BbccId) -> Option<&Bbcc> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: BbccId) -> &mut Bbcc {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .unwrap_or_else(|| panic!("{id} is not a live BBCC"))
    }

    /// Drop a record and its directory entry
    pub fn remove(&mut self, id: BbccId) -> Option<Bbcc> {
        let record = self.slots.get_mut(id.index())?.take()?;
        let bucket = self.bucket_of(record.bb, record.cxt);
        if let Some(pos) = self.buckets[bucket].iter().position(|&b| b == id) {
            self.buckets[bucket].swap_remove(pos);
        }
        self.entries -= 1;
        self.free.push(id.0);
        Some(record)
    }

    /// Clear every `lru_next` hint for which `evicted` holds
    pub fn forget_hints(&mut self, evicted: impl Fn(BbccId) -> bool) -> usize {
        let mut cleared = 0;
        for record in self.slots.iter_mut().flatten() {
            if record.lru_next.is_some_and(&evicted) {
                record.lru_next = None;
                cleared += 1;
            }
        }
        cleared
    }

    /// Number of live records
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    #[must_use]
    pub fn resizes(&self) -> usize {
        self.resizes
    }

    /// Live records in slot order
    pub fn iter(&self) -> impl Iterator<Item = (BbccId, &Bbcc)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            #[allow(clippy::cast_possible_truncation)] // slot count is bounded by spawn()
            slot.as_ref().map(|b| (BbccId(i as u32), b))
        })
    }

    fn bucket_of(&self, bb: BbId, cxt: ContextId) -> usize {
        Self::index_for(bb, cxt, self.buckets.len())
    }

    #[allow(clippy::cast_possible_truncation)] // result is below `size`
    fn index_for(bb: BbId, cxt: ContextId, size: usize) -> usize {
        ((u64::from(bb.0) + u64::from(cxt.0)) % size as u64) as usize
    }

    fn resize(&mut self) {
        let new_size = 2 * self.buckets.len() + 3;
        let mut buckets = vec![Vec::new(); new_size];
        for (i, slot) in self.slots.iter().enumerate() {
            if let Some(record) = slot {
                #[allow(clippy::cast_possible_truncation)]
                buckets[Self::index_for(record.bb, record.cxt, new_size)].push(BbccId(i as u32));
            }
        }

        info!(
            "BBCC directory resized: {} -> {} buckets ({} entries)",
            self.buckets.len(),
            new_size,
            self.entries
        );
        self.buckets = buckets;
        self.resizes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T1: ThreadId = ThreadId(1);

    #[test]
    fn test_spawn_and_lookup() {
        let mut dir = BbccDirectory::new(11);
        let a = dir.spawn(BbId(1), ContextId(0), T1);
        let b = dir.spawn(BbId(1), ContextId(1), T1);
        let c = dir.spawn(BbId(1), ContextId(0), ThreadId(2));

        assert_eq!(dir.len(), 3);
        assert_eq!(dir.lookup(BbId(1), ContextId(0), T1), Some(a));
        assert_eq!(dir.lookup(BbId(1), ContextId(1), T1), Some(b));
        assert_eq!(dir.lookup(BbId(1), ContextId(0), ThreadId(2)), Some(c));
        assert_eq!(dir.lookup(BbId(2), ContextId(0), T1), None);
        assert_eq!(dir.get(b).context(), ContextId(1));
    }

    #[test]
    #[should_panic(expected = "duplicate BBCC")]
    fn test_duplicate_key_panics() {
        let mut dir = BbccDirectory::new(11);
        dir.spawn(BbId(1), ContextId(0), T1);
        dir.spawn(BbId(1), ContextId(0), T1);
    }

    #[test]
    fn test_remove_clears_entry_and_reuses_slot() {
        let mut dir = BbccDirectory::new(11);
        let a = dir.spawn(BbId(3), ContextId(4), T1);
        assert!(dir.remove(a).is_some());

        assert!(dir.is_empty());
        assert_eq!(dir.lookup(BbId(3), ContextId(4), T1), None);
        assert!(dir.try_get(a).is_none());
        assert!(dir.remove(a).is_none());

        let b = dir.spawn(BbId(5), ContextId(4), T1);
        assert_eq!(b, a);
        assert_eq!(dir.get(b).block(), BbId(5));
    }

    #[test]
    fn test_forget_hints_to_evicted_records() {
        let mut dir = BbccDirectory::new(11);
        let a = dir.spawn(BbId(1), ContextId(0), T1);
        let b = dir.spawn(BbId(2), ContextId(0), T1);
        let c = dir.spawn(BbId(3), ContextId(0), T1);
        dir.get_mut(a).lru_next = Some(b);
        dir.get_mut(b).lru_next = Some(c);
        dir.get_mut(c).lru_next = Some(b);

        assert_eq!(dir.forget_hints(|id| id == b), 2);
        assert_eq!(dir.get(a).lru_next, None);
        assert_eq!(dir.get(b).lru_next, Some(c));
        assert_eq!(dir.get(c).lru_next, None);
    }

    #[test]
    fn test_single_resize_past_ninety_percent() {
        let initial = calltrace_common::BBCC_TABLE_INITIAL_BUCKETS;
        let mut dir = BbccDirectory::new(initial);

        // 100 * n / 10437 first exceeds 90 at n = 9498
        let mut keys = Vec::new();
        for n in 0..9497u32 {
            let key = (BbId(n), ContextId(n % 17));
            keys.push((key, dir.spawn(key.0, key.1, T1)));
        }
        assert_eq!(dir.resizes(), 0);
        assert_eq!(dir.bucket_count(), initial);

        let key = (BbId(9497), ContextId(9497 % 17));
        keys.push((key, dir.spawn(key.0, key.1, T1)));

        assert_eq!(dir.resizes(), 1);
        assert_eq!(dir.bucket_count(), 2 * initial + 3);
        assert_eq!(dir.len(), 9498);
        for ((bb, cxt), id) in &keys {
            assert_eq!(dir.lookup(*bb, *cxt, T1), Some(*id));
        }
        assert_eq!(dir.iter().count(), keys.len());
    }
}
