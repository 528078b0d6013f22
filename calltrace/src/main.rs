//! # calltrace - Main Entry Point
//!
//! Replays a recorded basic-block trace through the call-graph engine and
//! reports the hottest call contexts, either as a table or as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::fs::File;
use std::io::BufWriter;

use calltrace::cli::Args;
use calltrace::domain::ReplayError;
use calltrace::replay::{replay, TraceFile};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    // An unreadable trace path is a usage problem; a bad trace is not
    match err.downcast_ref::<ReplayError>() {
        Some(ReplayError::Io(_)) => EXIT_USAGE,
        _ => EXIT_ERROR,
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let trace = TraceFile::from_file(&args.trace)
        .with_context(|| format!("Failed to load trace {}", args.trace.display()))?;
    let mut config = trace.config.clone();
    args.apply(&mut config);
    info!("Engine config: {config:?}");

    let summary = replay(&trace, config)?;

    if let Some(ref path) = args.json {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        summary.write_json(BufWriter::new(file))?;
        if !args.quiet {
            println!("Summary written to {}", path.display());
        }
    } else if !args.quiet {
        summary.print(args.top);
    }
    Ok(())
}
