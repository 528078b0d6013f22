//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

use crate::config::EngineConfig;

#[derive(Parser)]
#[command(
    name = "calltrace",
    about = "Rebuild the call graph of a recorded basic-block trace",
    after_help = "\
EXAMPLES:
    calltrace run.json                         Print the hottest contexts
    calltrace run.json --context-depth 2       Key contexts on caller and callee only
    calltrace run.json --skip memcpy --skip strlen
                                               Roll these functions into their callers
    calltrace run.json --json summary.json     Write the summary as JSON"
)]
pub struct Args {
    /// Trace file to replay
    #[arg(value_name = "TRACE")]
    pub trace: PathBuf,

    /// Maximum number of functions keying a context (default: whole chain)
    #[arg(long, value_name = "N", value_parser = parse_depth)]
    pub context_depth: Option<usize>,

    /// Roll the cost of calls into FN up into the caller (repeatable)
    #[arg(long = "skip", value_name = "FN")]
    pub skip: Vec<String>,

    /// Write the summary as JSON instead of printing it
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,

    /// Number of contexts to print
    #[arg(long, default_value = "20")]
    pub top: usize,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Apply command-line overrides on top of the trace file's config
    pub fn apply(&self, config: &mut EngineConfig) {
        if self.context_depth.is_some() {
            config.context_depth = self.context_depth;
        }
        for name in &self.skip {
            if !config.is_skipped(name) {
                config.skip.push(name.clone());
            }
        }
    }
}

fn parse_depth(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("context depth must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_merge_into_config() {
        let args = Args::parse_from([
            "calltrace",
            "trace.json",
            "--context-depth",
            "3",
            "--skip",
            "memcpy",
            "--skip",
            "strlen",
        ]);
        let mut config = EngineConfig { skip: vec!["memcpy".to_string()], ..EngineConfig::default() };
        args.apply(&mut config);

        assert_eq!(config.context_depth, Some(3));
        assert_eq!(config.skip, vec!["memcpy".to_string(), "strlen".to_string()]);
    }

    #[test]
    fn test_file_config_kept_without_flags() {
        let args = Args::parse_from(["calltrace", "trace.json"]);
        let mut config = EngineConfig { context_depth: Some(5), ..EngineConfig::default() };
        args.apply(&mut config);

        assert_eq!(config.context_depth, Some(5));
        assert_eq!(args.top, 20);
        assert!(!args.quiet);
    }

    #[test]
    fn test_zero_depth_rejected() {
        assert!(Args::try_parse_from(["calltrace", "t.json", "--context-depth", "0"]).is_err());
    }
}
