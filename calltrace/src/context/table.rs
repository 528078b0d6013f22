//! Context table
//!
//! Hash-conses call chains: equal function sequences always intern to the
//! same `ContextId`. Lookup goes through the top function's `last_cxt` hint
//! first, then a chained hash table keyed by a rolling hash of the chain.
//!
//! The table grows to `2 * buckets + 3` once it is more than 80% full;
//! rehashing reuses the stored hash and never compares chains.

use log::info;

use crate::domain::{ContextId, FnId};
use crate::program::FunctionTable;

/// An interned call chain, innermost function first
#[derive(Debug, Clone)]
pub struct Context {
    fns: Box<[FnId]>,
    hash: u64,
}

impl Context {
    #[must_use]
    pub fn functions(&self) -> &[FnId] {
        &self.fns
    }

    /// Innermost function
    #[must_use]
    pub fn top(&self) -> FnId {
        self.fns[0]
    }
}

fn chain_hash(chain: impl Iterator<Item = FnId>) -> u64 {
    chain.fold(0u64, |h, f| (h << 7).wrapping_add(h >> 25).wrapping_add(u64::from(f.0)))
}

#[derive(Debug)]
pub struct ContextTable {
    contexts: Vec<Context>,
    buckets: Vec<Vec<ContextId>>,
    depth_limit: Option<usize>,
    resizes: usize,
}

impl ContextTable {
    /// # Panics
    /// Panics if `buckets` is zero or `depth_limit` is `Some(0)`.
    #[must_use]
    pub fn new(buckets: usize, depth_limit: Option<usize>) -> Self {
        assert!(buckets > 0, "context table needs at least one bucket");
        assert!(depth_limit != Some(0), "context depth must be at least one function");
        Self { contexts: Vec::new(), buckets: vec![Vec::new(); buckets], depth_limit, resizes: 0 }
    }

    /// Canonical context for a chain given top function first
    ///
    /// Returns `None` for an empty chain (nothing called yet, or the top of
    /// the function stack is a signal marker).
    pub fn intern<I>(&mut self, chain: I, functions: &mut FunctionTable) -> Option<ContextId>
    where
        I: Iterator<Item = FnId> + Clone,
    {
        let chain = chain.take(self.depth_limit.unwrap_or(usize::MAX));
        let top = chain.clone().next()?;
        let hash = chain_hash(chain.clone());

        if let Some(hint) = functions.get(top).last_cxt {
            if self.matches(hint, hash, chain.clone()) {
                return Some(hint);
            }
        }

        let bucket = self.bucket_of(hash);
        let found =
            self.buckets[bucket].iter().copied().find(|&id| self.matches(id, hash, chain.clone()));
        let id = match found {
            Some(id) => id,
            None => self.insert(hash, chain),
        };

        functions.get_mut(top).last_cxt = Some(id);
        Some(id)
    }

    #[must_use]
    pub fn get(&self, id: ContextId) -> &Context {
        &self.contexts[id.index()]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of times the table has grown
    #[must_use]
    pub fn resizes(&self) -> usize {
        self.resizes
    }

    fn matches(&self, id: ContextId, hash: u64, chain: impl Iterator<Item = FnId>) -> bool {
        let cxt = &self.contexts[id.index()];
        cxt.hash == hash && cxt.fns.iter().copied().eq(chain)
    }

    #[allow(clippy::cast_possible_truncation)] // bucket count fits in usize
    fn bucket_of(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    fn insert(&mut self, hash: u64, chain: impl Iterator<Item = FnId>) -> ContextId {
        let id = ContextId(u32::try_from(self.contexts.len()).expect("context table overflow"));
        self.contexts.push(Context { fns: chain.collect(), hash });

        let bucket = self.bucket_of(hash);
        self.buckets[bucket].push(id);

        if 10 * self.contexts.len() / self.buckets.len() > 8 {
            self.resize();
        }
        id
    }

    fn resize(&mut self) {
        let new_size = 2 * self.buckets.len() + 3;
        let mut buckets = vec![Vec::new(); new_size];
        for (i, cxt) in self.contexts.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let bucket = (cxt.hash % new_size as u64) as usize;
            #[allow(clippy::cast_possible_truncation)] // bounded by insert()
            buckets[bucket].push(ContextId(i as u32));
        }

        info!(
            "Context table resized: {} -> {} buckets ({} contexts)",
            self.buckets.len(),
            new_size,
            self.contexts.len()
        );
        self.buckets = buckets;
        self.resizes += 1;
    }
}
