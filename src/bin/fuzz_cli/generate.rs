//! `dslx-fuzz generate`: print the sample a seed produces.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use dslx_fuzz::fuzz::{FuzzSession, RunConfig};

use super::generator_options;

#[derive(Parser, Debug)]
#[command(about = "Print the first sample generated from a seed")]
pub struct GenerateCmd {
    /// Random seed
    #[arg(long, default_value = "0")]
    pub seed: u64,

    /// Argument sets to generate
    #[arg(long, default_value = "1")]
    pub calls_per_sample: usize,

    /// Never generate `/` or `%`
    #[arg(long)]
    pub disallow_divide: bool,

    /// Maximum expression depth (at most 10)
    #[arg(long)]
    pub max_depth: Option<u32>,

    /// JSON file with generator options; flags override it
    #[arg(long)]
    pub options_file: Option<PathBuf>,
}

impl GenerateCmd {
    pub fn execute(&self, json_output: bool) -> Result<()> {
        if self.calls_per_sample == 0 {
            bail!("--calls-per-sample must be at least 1");
        }
        let options = generator_options(&self.options_file, self.disallow_divide, self.max_depth)?;
        let run = RunConfig {
            calls_per_sample: self.calls_per_sample,
            ..RunConfig::default()
        };
        let sample = FuzzSession::new(self.seed).generate_sample(&options, &run)?;

        if json_output {
            println!("{}", sample.to_json()?);
        } else {
            println!("// seed: {}", self.seed);
            println!("// fingerprint: {}", sample.fingerprint());
            print!("{}", sample.source());
            println!();
            println!("// args:");
            for args in &sample.args_batch {
                println!("//   {args}");
            }
        }
        Ok(())
    }
}
