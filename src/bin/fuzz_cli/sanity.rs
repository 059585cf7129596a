//! `dslx-fuzz sanity`: short fixed session that must pass.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use dslx_fuzz::fuzz::run_sanity;

use super::{artifact_dir_or_default, output};

#[derive(Parser, Debug)]
#[command(about = "Run 8 samples (4 calls each, codegen on, no divide) and require all to match")]
pub struct SanityCmd {
    /// Random seed
    #[arg(long, default_value = "0")]
    pub seed: u64,

    /// Where failing samples are written (default: $DSLX_FUZZ_HOME/artifacts)
    #[arg(long)]
    pub artifact_dir: Option<PathBuf>,
}

impl SanityCmd {
    pub async fn execute(&self, json_output: bool) -> Result<()> {
        let seed = self.seed;
        let artifact_dir = artifact_dir_or_default(&self.artifact_dir);
        let report = tokio::task::spawn_blocking(move || run_sanity(seed, &artifact_dir))
            .await
            .context("sanity task panicked")??;
        output::print_report(&report, json_output)
    }
}
