//! Subcommands of the dslx-fuzz CLI.

pub mod generate;
pub mod output;
pub mod replay;
pub mod run;
pub mod sanity;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use dslx_fuzz::fuzz::GeneratorOptions;
use dslx_fuzz::paths::default_artifact_dir;
use tokio::task::JoinHandle;
use tracing::warn;

/// Set `cancel` on Ctrl-C so the driver stops between samples.
pub fn spawn_cancel_watcher(cancel: Arc<AtomicBool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current sample");
            cancel.store(true, Ordering::SeqCst);
        }
    })
}

pub fn artifact_dir_or_default(dir: &Option<PathBuf>) -> PathBuf {
    dir.clone().unwrap_or_else(default_artifact_dir)
}

/// Options from `--options-file` (or defaults), with flag overrides applied.
pub fn generator_options(
    options_file: &Option<PathBuf>,
    disallow_divide: bool,
    max_depth: Option<u32>,
) -> Result<GeneratorOptions> {
    let base = match options_file {
        Some(path) => GeneratorOptions::from_file(path)?,
        None => GeneratorOptions::default(),
    };
    let mut builder = base.to_builder();
    if disallow_divide {
        builder = builder.disallow_divide(true);
    }
    if let Some(depth) = max_depth {
        builder = builder.max_depth(depth);
    }
    builder.build().context("invalid generator options")
}
