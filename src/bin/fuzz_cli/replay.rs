//! `dslx-fuzz replay`: re-run a saved sample.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use dslx_fuzz::fuzz::{load_sample, SampleRunner};

use super::output;

#[derive(Parser, Debug)]
#[command(about = "Re-run a saved sample (artifact directory or sample.json) on every backend")]
pub struct ReplayCmd {
    /// Artifact directory or sample.json file
    pub path: PathBuf,

    /// Force the codegen backend on even if the sample was run without it
    #[arg(long)]
    pub codegen: bool,
}

impl ReplayCmd {
    pub fn execute(&self, json_output: bool, verbose: bool) -> Result<()> {
        let mut sample = load_sample(&self.path)?;
        sample.run_config.codegen |= self.codegen;
        // Replays never write temp directories of their own.
        sample.run_config.save_temps = false;

        let result = SampleRunner::for_config(&sample.run_config).run(&sample);
        output::print_sample_result(&sample, &result, json_output, verbose)?;
        if result.outcome.is_failure() {
            bail!("replay failed: {}", result.outcome.summary());
        }
        Ok(())
    }
}
