//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers prevent common bugs like passing a block id where a
//! BBCC id is expected, and make engine signatures more expressive.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Function identity
///
/// Index into the function table. Functions are never removed, so a `FnId`
/// stays valid for the lifetime of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FnId(pub u32);

impl FnId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn#{}", self.0)
    }
}

/// Code object identity (executable or shared library)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ObjId(pub u32);

impl fmt::Display for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

/// Basic block identity
///
/// Slot in the block table. Slots are reused after eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BbId(pub(crate) u32);

impl BbId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb#{}", self.0)
    }
}

/// Interned call-chain identity
///
/// Two contexts are equal exactly when their function sequences are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub(crate) u32);

impl ContextId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cxt#{}", self.0)
    }
}

/// Handle of a (basic block, context, thread) cost record
///
/// The accounting layer keys its cost counters on this handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BbccId(pub(crate) u32);

impl BbccId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BbccId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bbcc#{}", self.0)
    }
}

/// Opaque jump cost center handed out by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JccId(pub u64);

/// Logical thread identity as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThreadId(pub u32);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TID:{}", self.0)
    }
}

/// Guest address (code address or stack pointer value)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Addr(pub u64);

impl Addr {
    /// Address used when a frame has no usable return address
    pub const NONE: Addr = Addr(0);

    #[must_use]
    pub fn offset(self, delta: u64) -> Addr {
        Addr(self.0.wrapping_add(delta))
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addr_display() {
        assert_eq!(Addr(0x4010).to_string(), "0x4010");
        assert_eq!(Addr::NONE.to_string(), "0x0");
    }

    #[test]
    fn test_addr_ordering() {
        // Stacks grow down: a lower stack pointer means a deeper frame
        assert!(Addr(0x7ff0) < Addr(0x8000));
        assert_eq!(Addr(0x1000).offset(5), Addr(0x1005));
    }

    #[test]
    fn test_id_display() {
        assert_eq!(ThreadId(3).to_string(), "TID:3");
        assert_eq!(FnId(7).to_string(), "fn#7");
        assert_eq!(BbccId(2).to_string(), "bbcc#2");
    }
}
