//! On-disk sample artifacts.
//!
//! A failing sample is written to `<root>/seed-<seed>-iter-<iteration>/`:
//!
//! - `sample.x`: program source
//! - `sample.json`: replayable serialized sample
//! - `args.txt`: argument sets, one per line
//! - `outcome.json`: comparison outcome
//! - `results/<backend>.txt`: one line per call
//! - backend artifacts such as `ir.txt`, `ir_opt.txt` and `netlist.v`

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::runner::SampleResult;
use crate::sample::Sample;

pub const SAMPLE_SOURCE: &str = "sample.x";
pub const SAMPLE_JSON: &str = "sample.json";
pub const ARGS_TEXT: &str = "args.txt";
pub const OUTCOME_JSON: &str = "outcome.json";
pub const RESULTS_DIR: &str = "results";

/// Directory name for a failing sample, derived only from seed and iteration.
pub fn artifact_dir_name(seed: u64, iteration: u64) -> String {
    format!("seed-{seed}-iter-{iteration:06}")
}

/// Write the sample and everything the runner produced for it into `dir`.
pub fn write_sample_files(dir: &Path, sample: &Sample, result: &SampleResult) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    write(dir, SAMPLE_SOURCE, &sample.source())?;
    write(dir, SAMPLE_JSON, &sample.to_json()?)?;
    write(dir, ARGS_TEXT, &sample.args_text())?;
    write(
        dir,
        OUTCOME_JSON,
        &serde_json::to_string_pretty(&result.outcome)?,
    )?;

    let results_dir = dir.join(RESULTS_DIR);
    fs::create_dir_all(&results_dir)
        .with_context(|| format!("creating {}", results_dir.display()))?;
    for backend in result.backend_results() {
        write(
            &results_dir,
            &format!("{}.txt", backend.backend),
            &backend.results_text(),
        )?;
    }
    for artifact in &result.artifacts {
        write(dir, &artifact.file_name, &artifact.contents)?;
    }
    Ok(())
}

fn write(dir: &Path, name: &str, contents: &str) -> Result<()> {
    let path = dir.join(name);
    fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))
}

/// Persist a failing sample under `root`.
///
/// Files are staged in a temporary directory inside `root` and renamed into
/// place, so a crasher directory is either complete or absent. An existing
/// directory for the same (seed, iteration) is replaced.
pub fn persist_failure(
    root: &Path,
    seed: u64,
    iteration: u64,
    sample: &Sample,
    result: &SampleResult,
) -> Result<PathBuf> {
    fs::create_dir_all(root).with_context(|| format!("creating {}", root.display()))?;
    let staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(root)
        .with_context(|| format!("creating staging directory in {}", root.display()))?;
    write_sample_files(staging.path(), sample, result)?;

    let target = root.join(artifact_dir_name(seed, iteration));
    if target.exists() {
        fs::remove_dir_all(&target)
            .with_context(|| format!("removing stale {}", target.display()))?;
    }
    let staged = staging.keep();
    fs::rename(&staged, &target)
        .with_context(|| format!("moving {} to {}", staged.display(), target.display()))?;
    Ok(target)
}

/// Load a sample from an artifact directory or a `sample.json` file.
pub fn load_sample(path: &Path) -> Result<Sample> {
    let file = if path.is_dir() {
        path.join(SAMPLE_JSON)
    } else {
        path.to_path_buf()
    };
    let json =
        fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
    Sample::from_json(&json).with_context(|| format!("parsing {}", file.display()))
}
