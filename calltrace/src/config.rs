//! Engine configuration
//!
//! All fields have defaults, so a trace file may carry a partial `config`
//! object (or none at all). CLI flags override what the file says.

use calltrace_common::{
    BBCC_TABLE_INITIAL_BUCKETS, CALL_STACK_INITIAL_ENTRIES, CONTEXT_TABLE_INITIAL_BUCKETS,
    FN_STACK_INITIAL_ENTRIES,
};
use serde::{Deserialize, Serialize};

use crate::domain::ReplayError;

/// When a plain jump landing on a function entry point counts as a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TailCallHeuristic {
    /// Any jump to an entry block is a call (tail-call elimination)
    #[default]
    AnyEntry,
    /// Only jumps to the entry of a different function; for targets where
    /// call and branch instructions are hard to tell apart
    OtherFunctionEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of functions keying a context (`None` = whole chain)
    pub context_depth: Option<usize>,
    pub fn_stack_capacity: usize,
    pub call_stack_capacity: usize,
    pub context_buckets: usize,
    pub bbcc_buckets: usize,
    pub tail_call_heuristic: TailCallHeuristic,
    /// Functions whose cost is rolled up into their caller
    pub skip: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            context_depth: None,
            fn_stack_capacity: FN_STACK_INITIAL_ENTRIES,
            call_stack_capacity: CALL_STACK_INITIAL_ENTRIES,
            context_buckets: CONTEXT_TABLE_INITIAL_BUCKETS,
            bbcc_buckets: BBCC_TABLE_INITIAL_BUCKETS,
            tail_call_heuristic: TailCallHeuristic::default(),
            skip: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Whether calls into `name` should be skipped
    #[must_use]
    pub fn is_skipped(&self, name: &str) -> bool {
        self.skip.iter().any(|s| s == name)
    }

    /// Reject settings the engine cannot be built with
    ///
    /// # Errors
    /// Returns `InvalidConfig` for a zero context depth or an empty hash table.
    pub fn validate(&self) -> Result<(), ReplayError> {
        if self.context_depth == Some(0) {
            return Err(ReplayError::InvalidConfig("context_depth must be at least 1".to_string()));
        }
        if self.context_buckets == 0 {
            return Err(ReplayError::InvalidConfig("context_buckets must be at least 1".to_string()));
        }
        if self.bbcc_buckets == 0 {
            return Err(ReplayError::InvalidConfig("bbcc_buckets must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"context_depth": 3, "skip": ["memcpy"]}"#).unwrap();

        assert_eq!(config.context_depth, Some(3));
        assert_eq!(config.bbcc_buckets, BBCC_TABLE_INITIAL_BUCKETS);
        assert_eq!(config.tail_call_heuristic, TailCallHeuristic::AnyEntry);
        assert!(config.is_skipped("memcpy"));
        assert!(!config.is_skipped("main"));
    }

    #[test]
    fn test_tail_call_heuristic_names() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"tail_call_heuristic": "other_function_entry"}"#).unwrap();
        assert_eq!(config.tail_call_heuristic, TailCallHeuristic::OtherFunctionEntry);
    }
}
