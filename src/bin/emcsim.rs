//! Batched (device-style) simulator binary.

use clap::Parser;
use std::process;
use transport_lib::cli::BatchedArgs;
use transport_lib::error::SimError;
use transport_lib::output::OutputSink;
use transport_lib::runner::{self, RunSummary};

fn main() {
    env_logger::init();
    let args = BatchedArgs::parse();
    match run(&args) {
        Ok(summary) => {
            log::info!(
                "done: {} detected of {} primaries in {:.2?}",
                summary.detected,
                summary.primaries,
                summary.elapsed
            );
        }
        Err(error) => {
            eprintln!("emcsim: {error}");
            process::exit(error.exit_code());
        }
    }
}

fn run(args: &BatchedArgs) -> Result<RunSummary, SimError> {
    let config = args.run_config()?;
    let sink = match &args.detect_filename {
        Some(path) => OutputSink::create(path)?,
        None => OutputSink::stdout(),
    };
    runner::execute_batched(&config, &args.geometry, &args.primaries, &args.materials, sink)
}
