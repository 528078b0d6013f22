//! Trace file format
//!
//! A recorded run as JSON: the program model (objects, functions, blocks)
//! followed by the event stream the host would have delivered.
//!
//! ```json
//! {
//!   "config": { "context_depth": 4 },
//!   "objects": ["app", "libc.so"],
//!   "functions": [{ "name": "main", "object": 0 }],
//!   "blocks": [{ "addr": 4096, "function": 0, "section": "text", "entry": true,
//!                "exits": [{ "kind": "call", "offset": 8, "size": 5 }] }],
//!   "events": [{ "type": "block", "tid": 1, "sp": 32768, "block": 0 }]
//! }
//! ```
//!
//! Indices refer to positions in the corresponding arrays.

use std::path::Path;

use calltrace_common::{ExitInfo, SectionKind};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::domain::{Addr, FnId, ObjId, ReplayError, ThreadId};
use crate::program::BasicBlock;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceFile {
    #[serde(default)]
    pub config: EngineConfig,
    #[serde(default)]
    pub objects: Vec<String>,
    #[serde(default)]
    pub functions: Vec<FunctionDecl>,
    #[serde(default)]
    pub blocks: Vec<BlockDecl>,
    #[serde(default)]
    pub events: Vec<TraceEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub object: u32,
    #[serde(default)]
    pub skip: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockDecl {
    pub addr: Addr,
    pub function: u32,
    /// Defaults to the function's object
    #[serde(default)]
    pub object: Option<u32>,
    #[serde(default)]
    pub section: SectionKind,
    #[serde(default)]
    pub entry: bool,
    pub exits: Vec<ExitInfo>,
}

impl BlockDecl {
    /// Number of conditional side exits
    #[must_use]
    pub fn cjmp_count(&self) -> usize {
        self.exits.len().saturating_sub(1)
    }

    /// Program-model block for this declaration
    ///
    /// `fns` maps function indices to registered ids.
    #[must_use]
    pub fn to_block(&self, fns: &[FnId], functions: &[FunctionDecl]) -> BasicBlock {
        let function = self.function as usize;
        let object = self.object.unwrap_or(functions[function].object);
        BasicBlock::new(
            self.addr,
            fns[function],
            ObjId(object),
            self.section,
            self.entry,
            self.exits.clone(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEvent {
    /// Block about to execute
    Block {
        tid: ThreadId,
        sp: Addr,
        block: u32,
        /// Side exits passed before leaving; omitted means the final exit
        #[serde(default)]
        exit: Option<usize>,
    },
    /// Signal handler about to run
    Signal { tid: ThreadId, sig: i32 },
    /// Signal handler returned
    SignalReturn { tid: ThreadId, sig: i32 },
    /// Block code unmapped or retranslated
    Discard { block: u32 },
}

impl TraceFile {
    /// # Errors
    /// Returns an error if the file cannot be read or is not a valid trace.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// # Errors
    /// Returns `TraceParseFailed` if `content` is not a valid trace.
    pub fn parse(content: &str) -> Result<Self, ReplayError> {
        serde_json::from_str(content).map_err(|e| ReplayError::TraceParseFailed(e.to_string()))
    }

    /// Check that every index refers to something declared
    ///
    /// # Errors
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), ReplayError> {
        self.config.validate()?;

        for (i, func) in self.functions.iter().enumerate() {
            if func.object as usize >= self.objects.len() {
                return Err(ReplayError::UnknownObject { function: i, object: func.object as usize });
            }
        }

        for (i, block) in self.blocks.iter().enumerate() {
            if block.function as usize >= self.functions.len() {
                return Err(ReplayError::UnknownFunction {
                    block: i,
                    function: block.function as usize,
                });
            }
            if let Some(object) = block.object.filter(|&o| o as usize >= self.objects.len()) {
                return Err(ReplayError::UnknownBlockObject { block: i, object: object as usize });
            }
            if block.exits.is_empty() {
                return Err(ReplayError::NoExits(i));
            }
        }

        for (i, event) in self.events.iter().enumerate() {
            match *event {
                TraceEvent::Block { block, exit, .. } => {
                    let decl = self.block(i, block)?;
                    if let Some(exit) = exit.filter(|&e| e > decl.cjmp_count()) {
                        return Err(ReplayError::InvalidExit { event: i, block: block as usize, exit });
                    }
                }
                TraceEvent::Discard { block } => {
                    self.block(i, block)?;
                }
                TraceEvent::Signal { sig, .. } | TraceEvent::SignalReturn { sig, .. } => {
                    if sig <= 0 {
                        return Err(ReplayError::InvalidSignal { event: i, sig });
                    }
                }
            }
        }
        Ok(())
    }

    fn block(&self, event: usize, block: u32) -> Result<&BlockDecl, ReplayError> {
        self.blocks
            .get(block as usize)
            .ok_or(ReplayError::UnknownBlock { event, block: block as usize })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calltrace_common::JumpKind;

    const MINIMAL: &str = r#"{
        "objects": ["app"],
        "functions": [{ "name": "main", "object": 0 }],
        "blocks": [{ "addr": 4096, "function": 0, "entry": true, "section": "text",
                     "exits": [{ "kind": "jump", "offset": 2, "size": 2 },
                               { "kind": "return", "offset": 9, "size": 1 }] }],
        "events": [
            { "type": "block", "tid": 1, "sp": 32768, "block": 0, "exit": 0 },
            { "type": "signal", "tid": 1, "sig": 11 },
            { "type": "signal_return", "tid": 1, "sig": 11 },
            { "type": "discard", "block": 0 }
        ]
    }"#;

    #[test]
    fn test_parse_minimal_trace() {
        let trace = TraceFile::parse(MINIMAL).unwrap();

        assert_eq!(trace.config, EngineConfig::default());
        assert_eq!(trace.blocks[0].addr, Addr(4096));
        assert_eq!(trace.blocks[0].exits[1].kind, JumpKind::Return);
        assert_eq!(trace.blocks[0].cjmp_count(), 1);
        assert_eq!(
            trace.events[0],
            TraceEvent::Block { tid: ThreadId(1), sp: Addr(32768), block: 0, exit: Some(0) }
        );
        assert_eq!(trace.events[2], TraceEvent::SignalReturn { tid: ThreadId(1), sig: 11 });
        assert!(trace.validate().is_ok());
    }

    #[test]
    fn test_malformed_json() {
        let err = TraceFile::parse("{ not json").unwrap_err();
        assert!(matches!(err, ReplayError::TraceParseFailed(_)));
    }

    #[test]
    fn test_validate_catches_bad_indices() {
        let mut trace = TraceFile::parse(MINIMAL).unwrap();
        trace.events.push(TraceEvent::Block { tid: ThreadId(1), sp: Addr(0), block: 3, exit: None });
        assert!(matches!(trace.validate(), Err(ReplayError::UnknownBlock { event: 4, block: 3 })));

        let mut trace = TraceFile::parse(MINIMAL).unwrap();
        trace.events[0] = TraceEvent::Block { tid: ThreadId(1), sp: Addr(0), block: 0, exit: Some(2) };
        assert!(matches!(trace.validate(), Err(ReplayError::InvalidExit { exit: 2, .. })));

        let mut trace = TraceFile::parse(MINIMAL).unwrap();
        trace.functions[0].object = 5;
        assert!(matches!(trace.validate(), Err(ReplayError::UnknownObject { function: 0, object: 5 })));

        let mut trace = TraceFile::parse(MINIMAL).unwrap();
        trace.blocks[0].exits.clear();
        assert!(matches!(trace.validate(), Err(ReplayError::NoExits(0))));

        let mut trace = TraceFile::parse(MINIMAL).unwrap();
        trace.events[1] = TraceEvent::Signal { tid: ThreadId(1), sig: 0 };
        assert!(matches!(trace.validate(), Err(ReplayError::InvalidSignal { event: 1, sig: 0 })));
    }

    #[test]
    fn test_validate_rejects_unusable_config() {
        for config in [
            r#"{ "context_depth": 0 }"#,
            r#"{ "bbcc_buckets": 0 }"#,
            r#"{ "context_buckets": 0 }"#,
        ] {
            let trace = TraceFile::parse(&format!(r#"{{ "config": {config} }}"#)).unwrap();
            assert!(
                matches!(trace.validate(), Err(ReplayError::InvalidConfig(_))),
                "config {config} should be rejected"
            );
        }

        let trace = TraceFile::parse(r#"{ "config": { "context_depth": 1 } }"#).unwrap();
        assert!(trace.validate().is_ok());
    }
}
