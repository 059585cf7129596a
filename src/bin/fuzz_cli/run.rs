//! `dslx-fuzz run`: the main fuzz loop.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use dslx_fuzz::fuzz::{run_fuzz_in, run_shards, FuzzConfig, FuzzSession, RunConfig, SampleRunner};

use super::{artifact_dir_or_default, generator_options, output, spawn_cancel_watcher};

#[derive(Parser, Debug)]
#[command(
    about = "Generate random programs and compare backends on them",
    long_about = "Generates random DSLX-style programs and argument sets from a seed, \
                  evaluates them on the interpreter, the IR interpreter before and after \
                  optimization and (with --codegen) a simulated netlist, and saves every \
                  sample on which the backends disagree or crash.\n\n\
                  Exits non-zero when any sample fails."
)]
pub struct RunCmd {
    /// Random seed for reproducibility (default: random)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of samples to run (per shard)
    #[arg(long, short = 'n', default_value = "100")]
    pub sample_count: u64,

    /// Argument sets evaluated per sample
    #[arg(long, default_value = "1")]
    pub calls_per_sample: usize,

    /// Also run the codegen + netlist simulation backend
    #[arg(long)]
    pub codegen: bool,

    /// Keep a temp directory with sources and backend artifacts for every sample
    #[arg(long)]
    pub save_temps: bool,

    /// Where failing samples are written (default: $DSLX_FUZZ_HOME/artifacts)
    #[arg(long)]
    pub artifact_dir: Option<PathBuf>,

    /// Never generate `/` or `%`
    #[arg(long)]
    pub disallow_divide: bool,

    /// Maximum expression depth (at most 10)
    #[arg(long)]
    pub max_depth: Option<u32>,

    /// JSON file with generator options; flags override it
    #[arg(long)]
    pub options_file: Option<PathBuf>,

    /// Stop after the first failing sample
    #[arg(long)]
    pub stop_on_failure: bool,

    /// Per-evaluation timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Number of independent shards (shard k uses seed + k)
    #[arg(long, default_value = "1")]
    pub shards: u64,

    /// Evaluate the backends of each sample concurrently
    #[arg(long)]
    pub parallel_backends: bool,
}

impl RunCmd {
    fn config(&self) -> Result<FuzzConfig> {
        if self.calls_per_sample == 0 {
            bail!("--calls-per-sample must be at least 1");
        }
        let seed = self.seed.unwrap_or_else(|| {
            use std::time::{SystemTime, UNIX_EPOCH};
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos() as u64
        });
        Ok(FuzzConfig {
            seed,
            sample_count: self.sample_count,
            generator: generator_options(
                &self.options_file,
                self.disallow_divide,
                self.max_depth,
            )?,
            run: RunConfig {
                codegen: self.codegen,
                save_temps: self.save_temps,
                calls_per_sample: self.calls_per_sample,
                timeout_ms: self.timeout_ms,
                parallel_backends: self.parallel_backends,
            },
            artifact_dir: artifact_dir_or_default(&self.artifact_dir),
            stop_on_failure: self.stop_on_failure,
        })
    }

    pub async fn execute(&self, json_output: bool) -> Result<()> {
        let config = self.config()?;
        let shards = self.shards;
        let cancel = Arc::new(AtomicBool::new(false));
        let watcher = spawn_cancel_watcher(Arc::clone(&cancel));

        let report = tokio::task::spawn_blocking(move || {
            if shards > 1 {
                run_shards(&config, shards, cancel)
            } else {
                let runner = SampleRunner::for_config(&config.run);
                let mut session = FuzzSession::with_cancel_flag(config.seed, cancel);
                run_fuzz_in(&config, &runner, &mut session)
            }
        })
        .await
        .context("fuzz task panicked")??;
        watcher.abort();

        output::print_report(&report, json_output)?;
        if !report.is_clean() {
            bail!(
                "{} of {} samples failed",
                report.samples_failed,
                report.samples_run
            );
        }
        Ok(())
    }
}
