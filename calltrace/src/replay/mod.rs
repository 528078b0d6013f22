//! Trace replay
//!
//! Feeds a recorded trace through the engine the way a live host would:
//! blocks are registered lazily on first execution (and again after a
//! discard, like a retranslation), every block event runs the classifier,
//! and signal events open and close handler frames.
//!
//! - `trace_file`: JSON trace format and validation
//! - `host`: `Host` implementation driven by the trace
//! - `summary`: per-context hotspots and the final report

pub mod host;
pub mod summary;
pub mod trace_file;

pub use host::ReplayHost;
pub use summary::{ContextHotspot, HotspotStats, ReplaySummary};
pub use trace_file::{BlockDecl, FunctionDecl, TraceEvent, TraceFile};

use log::{info, warn};

use crate::config::EngineConfig;
use crate::domain::{BbId, FnId, ObjId, ReplayError};
use crate::engine::Engine;

/// Replay `trace` with `config` and summarize the resulting call graph
///
/// # Errors
/// Returns an error if the trace refers to undeclared objects, functions or
/// blocks, returns from a signal that is not being handled, or if `config`
/// cannot build an engine.
pub fn replay(trace: &TraceFile, config: EngineConfig) -> Result<ReplaySummary, ReplayError> {
    trace.validate()?;
    config.validate()?;

    let mut engine = Engine::new(ReplayHost::new(), config);
    let fns: Vec<FnId> = trace
        .functions
        .iter()
        .map(|decl| {
            let func = engine.register_function(decl.name.as_str(), ObjId(decl.object));
            if decl.skip {
                engine.set_function_skip(func, true);
            }
            func
        })
        .collect();

    info!(
        "Replaying {} events over {} blocks in {} functions",
        trace.events.len(),
        trace.blocks.len(),
        fns.len()
    );

    let mut live: Vec<Option<BbId>> = vec![None; trace.blocks.len()];
    let mut hotspots = HotspotStats::new();

    for (i, event) in trace.events.iter().enumerate() {
        match *event {
            TraceEvent::Block { tid, sp, block, exit } => {
                let decl = &trace.blocks[block as usize];
                let bb = *live[block as usize].get_or_insert_with(|| {
                    engine.register_block(decl.to_block(&fns, &trace.functions))
                });

                engine.host_mut().set_position(tid, sp);
                let bbcc = engine.setup_bb(bb);
                engine.set_exits_passed(exit.unwrap_or(decl.cjmp_count()));
                hotspots.record(engine.bbcc(bbcc).context(), bbcc);
            }
            TraceEvent::Signal { tid, sig } => {
                engine.pre_signal(tid, sig);
            }
            TraceEvent::SignalReturn { tid, sig } => {
                let expected = engine.handled_signal(tid);
                if expected != sig {
                    return Err(ReplayError::SignalMismatch { event: i, tid: tid.0, expected, got: sig });
                }
                engine.post_signal(tid, sig);
            }
            TraceEvent::Discard { block } => match live[block as usize].take() {
                Some(bb) => {
                    for &id in engine.blocks().get(bb).bbccs() {
                        hotspots.retire(engine.bbcc(id).context(), id);
                    }
                    engine.discard_block(bb);
                }
                None => warn!("Event {i}: block {block} is not translated, nothing to discard"),
            },
        }
    }

    engine.finish();

    let summary = ReplaySummary {
        events: trace.events.len(),
        threads: engine.thread_count(),
        functions: engine.functions().len(),
        contexts: engine.contexts().len(),
        bbccs: engine.bbccs().len(),
        call_arcs: engine.host().arc_count(),
        calls: engine.host().total_calls(),
        function_entries: engine.host().total_entries(),
        stats: engine.stats(),
        hotspots: hotspots.to_hotspots(|cxt| {
            (engine.context_name(cxt), engine.context(cxt).functions().len())
        }),
    };
    info!(
        "Replay done: {} contexts, {} BBCCs, {} calls",
        summary.contexts, summary.bbccs, summary.calls
    );
    Ok(summary)
}
