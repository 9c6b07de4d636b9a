//! NVM DIMM controller trace-replay CLI.
//!
//! This binary replays a request trace through the controller. It performs:
//! 1. **Configuration:** Built-in defaults or a JSON config file.
//! 2. **Replay:** Feeds arrivals at their cycles and ticks until idle.
//! 3. **Reporting:** Prints the statistics report and, optionally, the full
//!    completion log.

use clap::Parser;
use std::{fs, process};
use tracing_subscriber::EnvFilter;

use nvmsim_core::sim::trace;
use nvmsim_core::{Config, Driver};

#[derive(Parser, Debug)]
#[command(
    name = "nvmsim",
    author,
    version,
    about = "Cycle-level NVM DIMM controller simulator",
    long_about = "Replay a request trace through the controller.\n\nTrace format: one request per line, `<cycle> <R|W> <addr> [size]`,\naddresses decimal or 0x-hex, `#` starts a comment.\n\nExamples:\n  nvmsim traces/mixed.txt\n  nvmsim traces/mixed.txt --config pcm.json --completions"
)]
struct Cli {
    /// Request trace file to replay.
    trace: String,

    /// JSON configuration file (defaults are used when omitted).
    #[arg(short, long)]
    config: Option<String>,

    /// Stop after this many cycles even if requests remain.
    #[arg(long, default_value_t = 10_000_000)]
    max_cycles: u64,

    /// Print every completion in delivery order.
    #[arg(long)]
    completions: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => match load_config(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("nvmsim: {path}: {err}");
                process::exit(1);
            }
        },
        None => Config::default(),
    };

    let text = match fs::read_to_string(&cli.trace) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("nvmsim: {}: {err}", cli.trace);
            process::exit(1);
        }
    };
    let entries = match trace::parse(&text) {
        Ok(entries) => entries,
        Err(err) => {
            eprintln!("nvmsim: {}: {err}", cli.trace);
            process::exit(1);
        }
    };

    let mut driver = match Driver::new(config, entries) {
        Ok(driver) => driver,
        Err(err) => {
            eprintln!("nvmsim: configuration error: {err}");
            process::exit(1);
        }
    };

    let finished = driver.run(cli.max_cycles);

    if cli.completions {
        for completion in driver.completions() {
            println!(
                "{:>10}  {:#012x}  {:?}",
                completion.id.0, completion.addr, completion.kind
            );
        }
    }
    driver.controller().stats().print();

    if !finished {
        eprintln!(
            "nvmsim: stopped at cycle {} with work remaining",
            driver.controller().cycle()
        );
        process::exit(2);
    }
}

/// Loads and parses a JSON configuration file.
fn load_config(path: &str) -> Result<Config, String> {
    let text = fs::read_to_string(path).map_err(|err| err.to_string())?;
    serde_json::from_str(&text).map_err(|err| err.to_string())
}
