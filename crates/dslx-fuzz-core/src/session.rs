//! Fuzz session state: the RNG, the iteration counter and the cancel flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dslx_frontend::Function;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::generator::{AstGenerator, GenerationError};
use crate::options::GeneratorOptions;
use crate::sample::{RunConfig, Sample};
use crate::value_gen::ArgumentGenerator;

/// Cross-sample state of one fuzz run (one shard).
///
/// Every sample is drawn from the session RNG, so a session seeded with the
/// same value and options yields the same sequence of samples.
pub struct FuzzSession {
    rng: StdRng,
    seed: u64,
    iteration: u64,
    cancel: Arc<AtomicBool>,
}

impl FuzzSession {
    pub fn new(seed: u64) -> Self {
        Self::with_cancel_flag(seed, Arc::new(AtomicBool::new(false)))
    }

    /// Session observing a cancel flag shared with other sessions or a signal handler.
    pub fn with_cancel_flag(seed: u64, cancel: Arc<AtomicBool>) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
            iteration: 0,
            cancel,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Index of the next sample.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Draw the next sample: a program, then `calls_per_sample` argument sets
    /// for its entry point. Advances the iteration counter.
    pub fn generate_sample(
        &mut self,
        options: &GeneratorOptions,
        run_config: &RunConfig,
    ) -> Result<Sample, GenerationError> {
        let program = AstGenerator::new(&mut self.rng, options).generate_program()?;
        let params = program
            .entry()
            .map(Function::param_types)
            .unwrap_or_default();
        let mut args = ArgumentGenerator::new(&mut self.rng);
        let args_batch = (0..run_config.calls_per_sample)
            .map(|_| args.generate_args(&params))
            .collect();
        self.iteration += 1;
        Ok(Sample {
            program,
            args_batch,
            run_config: run_config.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sessions_with_same_seed_agree() {
        let options = GeneratorOptions::default();
        let run = RunConfig {
            calls_per_sample: 3,
            ..RunConfig::default()
        };
        let mut a = FuzzSession::new(9);
        let mut b = FuzzSession::new(9);
        for _ in 0..5 {
            let sa = a.generate_sample(&options, &run).unwrap();
            let sb = b.generate_sample(&options, &run).unwrap();
            assert_eq!(sa, sb);
            assert_eq!(sa.args_batch.len(), 3);
        }
        assert_eq!(a.iteration(), 5);
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let session = FuzzSession::new(0);
        let other = FuzzSession::with_cancel_flag(1, session.cancel_flag());
        assert!(!other.is_cancelled());
        session.cancel();
        assert!(other.is_cancelled());
    }
}
