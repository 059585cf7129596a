//! dslx-fuzz: differential fuzzer for a DSLX-style language
//!
//! Generates random well-typed programs, evaluates them on the reference
//! interpreter, the IR interpreter (before and after optimization) and,
//! optionally, a simulated netlist, and saves every sample on which they
//! disagree.
//!
//! ## Example Usage
//!
//! ```bash
//! # Fuzz 1000 samples with 4 argument sets each, including codegen
//! dslx-fuzz run --seed 7 --sample-count 1000 --calls-per-sample 4 --codegen
//!
//! # Quick self-check
//! dslx-fuzz sanity
//!
//! # Print the sample a seed produces
//! dslx-fuzz generate --seed 7
//!
//! # Re-run a saved crasher
//! dslx-fuzz replay ~/.dslx-fuzz/artifacts/seed-7-iter-000042
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod fuzz_cli;

use fuzz_cli::{generate::GenerateCmd, replay::ReplayCmd, run::RunCmd, sanity::SanityCmd};

#[derive(Parser)]
#[command(
    name = "dslx-fuzz",
    author,
    version,
    about = "Differential fuzzer for a DSLX-style hardware language",
    long_about = "Generates random DSLX-style programs and checks that the interpreter, \
                  IR and codegen backends agree on every input.\n\n\
                  Failing samples are written to an artifact directory for replay."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (debug logging)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a fuzz session
    Run(RunCmd),

    /// Run the fixed sanity session (8 samples, 4 calls, codegen, no divide)
    Sanity(SanityCmd),

    /// Print the sample generated for a seed
    Generate(GenerateCmd),

    /// Re-run a saved sample on every backend
    Replay(ReplayCmd),
}

fn init_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli {
        command,
        json,
        verbose,
    } = Cli::parse();
    init_logging(verbose);

    match command {
        Commands::Run(cmd) => cmd.execute(json).await,
        Commands::Sanity(cmd) => cmd.execute(json).await,
        Commands::Generate(cmd) => cmd.execute(json),
        Commands::Replay(cmd) => cmd.execute(json, verbose),
    }
}
