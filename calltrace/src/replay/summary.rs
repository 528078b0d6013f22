//! Context hotspots and replay summary
//!
//! `HotspotStats` aggregates block executions per context as the replay
//! streams through the trace. `ReplaySummary` is the final report: engine
//! counters plus contexts ranked by how many blocks ran in them.

// Percentage calculations intentionally convert u64 to f64
#![allow(clippy::cast_precision_loss)]

use std::collections::{HashMap, HashSet};
use std::io::Write;

use serde::Serialize;

use crate::domain::{BbccId, ContextId, ReplayError};
use crate::engine::EngineStats;

/// A context with aggregated execution counts
#[derive(Debug, Clone, Serialize)]
pub struct ContextHotspot {
    /// Function names, innermost first, joined by `'`
    pub context: String,
    /// Number of functions keying the context
    pub depth: usize,
    /// Distinct BBCCs billed in this context
    pub blocks: usize,
    pub executions: u64,
    /// Share of all block executions (0.0 - 100.0)
    pub percentage: f64,
}

#[derive(Debug, Default)]
pub struct HotspotStats {
    contexts: HashMap<ContextId, ContextStats>,
    total: u64,
}

#[derive(Debug, Default)]
struct ContextStats {
    executions: u64,
    /// Live BBCCs billed in this context
    bbccs: HashSet<BbccId>,
    /// Billed BBCCs that were discarded since; their ids may be reused
    retired: usize,
}

impl ContextStats {
    fn blocks(&self) -> usize {
        self.bbccs.len() + self.retired
    }
}

impl HotspotStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one execution of `bbcc` in `cxt`
    pub fn record(&mut self, cxt: ContextId, bbcc: BbccId) {
        self.total += 1;
        let stats = self.contexts.entry(cxt).or_default();
        stats.executions += 1;
        stats.bbccs.insert(bbcc);
    }

    /// Stop tracking `bbcc` by id before the directory can hand it out again
    pub fn retire(&mut self, cxt: ContextId, bbcc: BbccId) {
        if let Some(stats) = self.contexts.get_mut(&cxt) {
            if stats.bbccs.remove(&bbcc) {
                stats.retired += 1;
            }
        }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Hotspots sorted by executions, most executed first
    ///
    /// `describe` yields the name and depth of a context.
    #[must_use]
    pub fn to_hotspots(&self, describe: impl Fn(ContextId) -> (String, usize)) -> Vec<ContextHotspot> {
        let mut hotspots: Vec<(ContextId, ContextHotspot)> = self
            .contexts
            .iter()
            .map(|(&cxt, stats)| {
                let percentage = if self.total > 0 {
                    (stats.executions as f64 / self.total as f64) * 100.0
                } else {
                    0.0
                };
                let (context, depth) = describe(cxt);
                let hotspot = ContextHotspot {
                    context,
                    depth,
                    blocks: stats.blocks(),
                    executions: stats.executions,
                    percentage,
                };
                (cxt, hotspot)
            })
            .collect();

        // Ties keep interning order so output is stable
        hotspots.sort_unstable_by_key(|(cxt, h)| (std::cmp::Reverse(h.executions), *cxt));
        hotspots.into_iter().map(|(_, h)| h).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplaySummary {
    pub events: usize,
    pub threads: usize,
    pub functions: usize,
    pub contexts: usize,
    pub bbccs: usize,
    /// Distinct call arcs (jump cost centers)
    pub call_arcs: usize,
    pub calls: u64,
    /// Transitions of a function from inactive to active
    pub function_entries: u64,
    pub stats: EngineStats,
    pub hotspots: Vec<ContextHotspot>,
}

impl ReplaySummary {
    /// Print the summary and the `limit` hottest contexts
    pub fn print(&self, limit: usize) {
        println!("Replayed {} events on {} thread(s)", self.events, self.threads);
        println!(
            "  {} blocks executed, {} calls over {} arcs, {} returns",
            self.stats.blocks_executed, self.calls, self.call_arcs, self.stats.returns
        );
        println!(
            "  {} functions, {} contexts, {} BBCCs ({} cloned, {} discarded)",
            self.functions,
            self.contexts,
            self.bbccs,
            self.stats.bbcc_clones,
            self.stats.discarded_bbccs
        );
        println!(
            "  reclassified: {} jumps as calls, {} returns as jumps, {} returns as calls",
            self.stats.promoted_calls, self.stats.returns_as_jumps, self.stats.emulated_calls
        );
        if self.stats.signals > 0 {
            println!("  {} signal handler(s) entered", self.stats.signals);
        }

        if self.hotspots.is_empty() {
            return;
        }
        println!();
        println!("{:>8}  {:>6}  {:>6}  CONTEXT", "EXECS", "%", "BLOCKS");
        for hotspot in self.hotspots.iter().take(limit) {
            println!(
                "{:>8}  {:>5.1}%  {:>6}  {}",
                hotspot.executions, hotspot.percentage, hotspot.blocks, hotspot.context
            );
        }
        if self.hotspots.len() > limit {
            println!("  ... {} more context(s)", self.hotspots.len() - limit);
        }
    }

    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub fn write_json(&self, writer: impl Write) -> Result<(), ReplayError> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}
