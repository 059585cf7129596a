//! Default on-disk locations.

use std::path::PathBuf;

/// Environment variable overriding the fuzzer home directory.
pub const HOME_ENV: &str = "DSLX_FUZZ_HOME";

/// `$DSLX_FUZZ_HOME`, falling back to `~/.dslx-fuzz`.
pub fn fuzz_home() -> PathBuf {
    std::env::var(HOME_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".dslx-fuzz")
        })
}

/// Where failing samples are written unless `--artifact-dir` is given.
pub fn default_artifact_dir() -> PathBuf {
    fuzz_home().join("artifacts")
}
