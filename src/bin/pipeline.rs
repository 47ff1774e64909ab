//! Conveyor pipeline demo binary.
//!
//! Spawns a configurable number of producer and consumer threads around one
//! bounded channel, runs every producer's quota to completion, and prints
//! the run report.
//!
//! # Usage
//!
//! ```sh
//! conveyor-pipeline --capacity 8 --producers 2 --consumers 2 --items 10000
//! ```

use conveyor::runtime::pipeline::{Pipeline, PipelineConfig, PipelineError};

fn main() {
    if let Err(e) = run() {
        eprintln!("conveyor-pipeline: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), PipelineError> {
    let args: Vec<String> = std::env::args().collect();
    let config = parse_args(&args)?;

    conveyor::init_tracing();

    eprintln!(
        "conveyor-pipeline: {} producer(s) -> capacity {} -> {} consumer(s), {} item(s) each",
        config.producers, config.capacity, config.consumers, config.items_per_producer
    );

    let pipeline = Pipeline::spawn(config)?;
    let report = pipeline.join()?;

    println!(
        "produced {} consumed {} out-of-order {}",
        report.produced, report.consumed, report.out_of_order
    );

    if report.produced != report.consumed || report.out_of_order > 0 {
        eprintln!("conveyor-pipeline: accounting mismatch");
        std::process::exit(1);
    }

    Ok(())
}

/// Parses command line arguments into a [`PipelineConfig`].
fn parse_args(args: &[String]) -> Result<PipelineConfig, PipelineError> {
    let mut config = PipelineConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--capacity" | "-c" => config.capacity = parse_value(args, &mut i, "--capacity")?,
            "--producers" | "-p" => config.producers = parse_value(args, &mut i, "--producers")?,
            "--consumers" => config.consumers = parse_value(args, &mut i, "--consumers")?,
            "--items" | "-n" => {
                config.items_per_producer = parse_value(args, &mut i, "--items")?;
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            arg => {
                return Err(PipelineError::Config(format!("unknown argument: {arg}")));
            }
        }
        i += 1;
    }

    Ok(config)
}

/// Parses the value following a flag, advancing the cursor past it.
fn parse_value<T: std::str::FromStr>(
    args: &[String],
    i: &mut usize,
    flag: &str,
) -> Result<T, PipelineError>
where
    T::Err: std::fmt::Display,
{
    *i += 1;
    let Some(raw) = args.get(*i) else {
        return Err(PipelineError::Config(format!("missing value for {flag}")));
    };
    raw.parse()
        .map_err(|e| PipelineError::Config(format!("invalid value for {flag}: {e}")))
}

fn print_usage() {
    eprintln!(
        r#"conveyor-pipeline - bounded producer/consumer pipeline demo

USAGE:
    conveyor-pipeline [OPTIONS]

OPTIONS:
    -c, --capacity <SLOTS>   Channel capacity (default: 8)
    -p, --producers <N>      Number of producer threads (default: 1)
        --consumers <N>      Number of consumer threads (default: 1)
    -n, --items <N>          Items per producer (default: 64)
    -h, --help               Print this help message

EXAMPLE:
    conveyor-pipeline --capacity 4 --producers 2 --consumers 2 --items 100000
"#
    );
}
