//! # Shared Block Descriptors (Front End ↔ Engine)
//!
//! Defines the descriptor types an instrumentation front end produces for every
//! decoded basic block, and the sizing constants shared with the engine. All
//! plain-data types use `#[repr(C)]` so a front end written against a C host
//! can hand them over without conversion.
//!
//! ## Key Types
//!
//! - [`JumpKind`] - Decode-time classification of a block exit
//! - [`SectionKind`] - Kind of object section a block lives in
//! - [`ExitInfo`] - One exit of a block (conditional side exit or final exit)
//!
//! The optional `serde` feature derives `Serialize`/`Deserialize` so the
//! replay driver can read these types straight from trace files.

#![no_std]

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Sizing Constants
// ============================================================================

/// Initial number of slots in a per-thread function stack
pub const FN_STACK_INITIAL_ENTRIES: usize = 500;

/// Initial number of frames in a per-thread shadow call stack
pub const CALL_STACK_INITIAL_ENTRIES: usize = 500;

/// Initial bucket count of the context table
pub const CONTEXT_TABLE_INITIAL_BUCKETS: usize = 2537;

/// Initial bucket count of the BBCC directory
pub const BBCC_TABLE_INITIAL_BUCKETS: usize = 10437;

/// Thread the engine assumes before the host reports any other
pub const INITIAL_THREAD: u32 = 1;

// ============================================================================
// Block Descriptors
// ============================================================================

/// Decode-time classification of a block exit
///
/// This is what the front end saw in the instruction stream. The engine
/// reclassifies it at run time (a `Return` can turn into a `Jump`, a `Jump`
/// into a `Call`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum JumpKind {
    /// Execution continues at the next instruction in memory
    #[default]
    FallThrough,
    /// Plain branch
    Jump,
    /// Call instruction
    Call,
    /// Return instruction
    Return,
}

/// Kind of section containing a block
///
/// A transfer between different section kinds (e.g. from `.text` into the
/// PLT) is treated as a call by the engine.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SectionKind {
    #[default]
    Unknown,
    Text,
    Data,
    Bss,
    Got,
    Plt,
    Opd,
    GotPlt,
}

/// One exit of a basic block
///
/// A block with `n` conditional side exits carries `n + 1` of these: the
/// side exits in program order followed by the final exit.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExitInfo {
    /// Decode-time kind of the exit
    pub kind: JumpKind,

    /// Offset of the exiting instruction from the block start
    #[cfg_attr(feature = "serde", serde(default, rename = "offset"))]
    pub instr_offset: u32,

    /// Encoded length of the exiting instruction
    #[cfg_attr(feature = "serde", serde(default, rename = "size"))]
    pub instr_size: u32,
}

impl ExitInfo {
    #[must_use]
    pub const fn new(kind: JumpKind, instr_offset: u32, instr_size: u32) -> Self {
        Self { kind, instr_offset, instr_size }
    }

    /// Offset of the instruction following the exiting one
    ///
    /// For a call exit this is where the callee returns to.
    #[must_use]
    pub const fn next_instr_offset(&self) -> u64 {
        self.instr_offset as u64 + self.instr_size as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_instr_offset() {
        let exit = ExitInfo::new(JumpKind::Call, 12, 5);
        assert_eq!(exit.next_instr_offset(), 17);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(JumpKind::default(), JumpKind::FallThrough);
        assert_eq!(SectionKind::default(), SectionKind::Unknown);
    }
}
