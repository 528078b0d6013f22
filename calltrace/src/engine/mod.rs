//! Call-graph reconstruction engine
//!
//! Owns every table the reconstruction needs and drives them from the host's
//! per-block callback.
//!
//! - `classifier`: per-block transfer classification and BBCC resolution
//! - `calls`: shadow-stack push/pop and function-stack context updates
//! - `signals`: signal handler frames and teardown
//! - `eviction`: dropping the state of discarded blocks

mod calls;
mod classifier;
mod eviction;
mod signals;

use serde::Serialize;

use crate::bbcc::{Bbcc, BbccDirectory};
use crate::config::EngineConfig;
use crate::context::{Context, ContextTable};
use crate::domain::{BbId, BbccId, ContextId, FnId, ObjId, ThreadId};
use crate::host::Host;
use crate::program::{BasicBlock, BlockTable, FunctionTable};
use crate::threads::{ThreadExecutionState, ThreadRegistry};

/// Counters describing what the engine did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub blocks_executed: u64,
    /// Shadow frames pushed
    pub calls: u64,
    /// Shadow frames popped
    pub returns: u64,
    /// Jumps and fall-throughs promoted to calls
    pub promoted_calls: u64,
    /// Returns that matched no tracked frame and were handled as jumps
    pub returns_as_jumps: u64,
    /// Returns with no frame to pop, handled as calls
    pub emulated_calls: u64,
    pub lru_hits: u64,
    pub block_hint_hits: u64,
    pub directory_probes: u64,
    pub bbcc_clones: u64,
    pub thread_switches: u64,
    pub signals: u64,
    pub discarded_blocks: u64,
    pub discarded_bbccs: u64,
}

#[derive(Debug)]
pub struct Engine<H: Host> {
    host: H,
    config: EngineConfig,
    functions: FunctionTable,
    blocks: BlockTable,
    contexts: ContextTable,
    bbccs: BbccDirectory,
    threads: ThreadRegistry,
    stats: EngineStats,
}

impl<H: Host> Engine<H> {
    /// # Panics
    /// Panics if the config asks for empty hash tables or a zero context depth.
    #[must_use]
    pub fn new(host: H, config: EngineConfig) -> Self {
        Self {
            host,
            functions: FunctionTable::new(),
            blocks: BlockTable::new(),
            contexts: ContextTable::new(config.context_buckets, config.context_depth),
            bbccs: BbccDirectory::new(config.bbcc_buckets),
            threads: ThreadRegistry::new(config.fn_stack_capacity, config.call_stack_capacity),
            stats: EngineStats::default(),
            config,
        }
    }

    /// Register a function; it is skipped if the config names it
    pub fn register_function(&mut self, name: impl Into<String>, object: ObjId) -> FnId {
        let name = name.into();
        let skip = self.config.is_skipped(&name);
        self.functions.register(name, object, skip)
    }

    pub fn set_function_skip(&mut self, func: FnId, skip: bool) {
        self.functions.get_mut(func).skip = skip;
    }

    /// # Panics
    /// Panics if the block's function was never registered.
    pub fn register_block(&mut self, block: BasicBlock) -> BbId {
        assert!(
            block.func.index() < self.functions.len(),
            "block at {} belongs to unregistered {}",
            block.addr,
            block.func
        );
        self.blocks.insert(block)
    }

    /// Record how many conditional side exits the current block has passed
    pub fn set_exits_passed(&mut self, passed: usize) {
        self.threads.active_mut().state.jmps_passed = passed;
    }

    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    #[must_use]
    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    #[must_use]
    pub fn blocks(&self) -> &BlockTable {
        &self.blocks
    }

    #[must_use]
    pub fn contexts(&self) -> &ContextTable {
        &self.contexts
    }

    #[must_use]
    pub fn bbccs(&self) -> &BbccDirectory {
        &self.bbccs
    }

    #[must_use]
    pub fn bbcc(&self, id: BbccId) -> &Bbcc {
        self.bbccs.get(id)
    }

    #[must_use]
    pub fn context(&self, id: ContextId) -> &Context {
        self.contexts.get(id)
    }

    /// Function names of a context joined by `'`, innermost first
    #[must_use]
    pub fn context_name(&self, id: ContextId) -> String {
        self.contexts
            .get(id)
            .functions()
            .iter()
            .map(|&f| self.functions.get(f).name.as_str())
            .collect::<Vec<_>>()
            .join("'")
    }

    #[must_use]
    pub fn current_thread(&self) -> ThreadId {
        self.threads.current()
    }

    /// Threads seen so far
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Signal currently handled on `tid`, 0 outside handlers
    #[must_use]
    pub fn handled_signal(&self, tid: ThreadId) -> i32 {
        self.threads.get(tid).map_or(0, |t| t.state.sig)
    }

    #[must_use]
    pub fn current_context(&self) -> Option<ContextId> {
        self.threads.active().state.cxt
    }

    /// BBCC of the block executed last on the current thread
    #[must_use]
    pub fn current_bbcc(&self) -> Option<BbccId> {
        self.threads.active().state.bbcc
    }

    #[must_use]
    pub fn call_stack_depth(&self) -> usize {
        self.threads.active().call_stack.depth()
    }

    #[must_use]
    pub fn function_active_count(&self, func: FnId) -> u32 {
        self.functions.active_count(func)
    }

    /// State of the current thread
    #[must_use]
    pub fn thread_state(&self) -> &ThreadExecutionState {
        self.threads.active()
    }
}
