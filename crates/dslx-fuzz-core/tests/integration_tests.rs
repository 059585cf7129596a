//! End-to-end tests for the fuzz driver, runner and artifact capture.

use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use dslx_frontend::interp::Interpreter;
use dslx_frontend::{
    BinaryOp, Bits, EvalLimits, EvalResult, Expr, Function, Param, Program, Type, Value,
    ENTRY_POINT,
};
use dslx_fuzz_core::{
    artifact_dir_name, load_sample, run_fuzz, run_fuzz_in, run_sanity, run_shards, ArgumentSet,
    BackendError, BackendKind, ComparisonOutcome, Evaluator, Executable, FuzzConfig, FuzzSession,
    GeneratorOptions, RunConfig, Sample, SampleRunner,
};
use tempfile::TempDir;

// =============================================================================
// Test doubles
// =============================================================================

/// Flips the low bit of the first bits leaf of `value`.
fn flip_low_bit(value: Value) -> Value {
    match value {
        Value::Bits(bits) => Value::Bits(Bits::new(bits.signed, bits.width, bits.raw ^ 1)),
        Value::Tuple(mut elements) => {
            elements[0] = flip_low_bit(elements[0].clone());
            Value::Tuple(elements)
        }
        Value::Array(mut elements) => {
            elements[0] = flip_low_bit(elements[0].clone());
            Value::Array(elements)
        }
    }
}

/// Interpreter that corrupts its result whenever `corrupt` says so.
struct FaultyBackend {
    corrupt: fn(&[Value]) -> bool,
}

struct FaultyExecutable {
    program: Program,
    corrupt: fn(&[Value]) -> bool,
}

impl Evaluator for FaultyBackend {
    fn name(&self) -> &str {
        "faulty"
    }

    fn compile(&self, program: &Program) -> Result<Box<dyn Executable>, BackendError> {
        Ok(Box::new(FaultyExecutable {
            program: program.clone(),
            corrupt: self.corrupt,
        }))
    }
}

impl Executable for FaultyExecutable {
    fn evaluate(&self, args: &[Value], limits: &EvalLimits) -> EvalResult<Value> {
        let value = Interpreter::new(&self.program).run(args, limits)?;
        Ok(if (self.corrupt)(args) {
            flip_low_bit(value)
        } else {
            value
        })
    }
}

fn faulty_runner(corrupt: fn(&[Value]) -> bool) -> SampleRunner {
    SampleRunner::with_backends(
        BackendKind::Interpreter.evaluator(),
        vec![
            BackendKind::Ir.evaluator(),
            Arc::new(FaultyBackend { corrupt }),
        ],
    )
}

fn identity_sample(calls: u64) -> Sample {
    Sample {
        program: Program {
            functions: vec![Function {
                name: ENTRY_POINT.into(),
                params: vec![Param {
                    name: "a".into(),
                    ty: Type::ubits(8),
                }],
                ret: Type::ubits(8),
                body: Expr::binary(BinaryOp::Or, Expr::var("a"), Expr::var("a")),
            }],
        },
        args_batch: (0..calls)
            .map(|i| ArgumentSet(vec![Value::ubits(8, i)]))
            .collect(),
        run_config: RunConfig {
            calls_per_sample: calls as usize,
            ..RunConfig::default()
        },
    }
}

fn contains_division(program: &Program) -> bool {
    program.any_expr(&mut |e| matches!(e, Expr::Binary { op, .. } if op.is_division()))
}

// =============================================================================
// Generation
// =============================================================================

#[test]
fn test_same_seed_same_samples() {
    let options = GeneratorOptions::default();
    let run = RunConfig {
        calls_per_sample: 2,
        ..RunConfig::default()
    };
    let mut a = FuzzSession::new(1234);
    let mut b = FuzzSession::new(1234);
    for _ in 0..25 {
        let sa = a.generate_sample(&options, &run).unwrap();
        let sb = b.generate_sample(&options, &run).unwrap();
        assert_eq!(sa.source(), sb.source());
        assert_eq!(sa.args_batch, sb.args_batch);
    }
}

#[test]
fn test_different_seeds_differ() {
    let options = GeneratorOptions::default();
    let run = RunConfig::default();
    let first: Vec<String> = (0..5)
        .map(|seed| {
            FuzzSession::new(seed)
                .generate_sample(&options, &run)
                .unwrap()
                .fingerprint()
        })
        .collect();
    let mut unique = first.clone();
    unique.sort();
    unique.dedup();
    assert!(unique.len() > 1);
}

#[test]
fn test_disallow_divide_is_honoured() {
    let options = GeneratorOptions::builder()
        .disallow_divide(true)
        .build()
        .unwrap();
    let mut session = FuzzSession::new(3);
    for _ in 0..100 {
        let sample = session.generate_sample(&options, &RunConfig::default()).unwrap();
        assert!(!contains_division(&sample.program), "{}", sample.source());
    }
}

#[test]
fn test_binop_allowlist_is_honoured() {
    let options = GeneratorOptions::builder()
        .binop_allowlist(Some(vec![BinaryOp::Add, BinaryOp::Eq]))
        .build()
        .unwrap();
    let mut session = FuzzSession::new(11);
    for _ in 0..50 {
        let sample = session.generate_sample(&options, &RunConfig::default()).unwrap();
        assert!(!sample.program.any_expr(&mut |e| matches!(
            e,
            Expr::Binary { op, .. } if !matches!(op, BinaryOp::Add | BinaryOp::Eq)
        )));
    }
}

#[test]
fn test_generation_terminates_at_small_depth() {
    let options = GeneratorOptions::builder()
        .max_depth(1)
        .max_lets(1)
        .max_helper_functions(0)
        .build()
        .unwrap();
    let mut session = FuzzSession::new(5);
    for _ in 0..100 {
        let sample = session.generate_sample(&options, &RunConfig::default()).unwrap();
        assert_eq!(sample.program.functions.len(), 1);
        assert!(sample.program.node_count() < 400);
    }
}

#[test]
fn test_arguments_conform_to_entry_params() {
    let options = GeneratorOptions::default();
    let run = RunConfig {
        calls_per_sample: 4,
        ..RunConfig::default()
    };
    let mut session = FuzzSession::new(8);
    for _ in 0..20 {
        let sample = session.generate_sample(&options, &run).unwrap();
        let params = sample.program.entry().unwrap().param_types();
        assert_eq!(sample.args_batch.len(), 4);
        for args in &sample.args_batch {
            assert_eq!(args.values().len(), params.len());
            for (value, ty) in args.values().iter().zip(&params) {
                assert!(value.conforms_to(ty));
            }
        }
    }
}

// =============================================================================
// Running
// =============================================================================

#[test]
fn test_constant_program_agrees_on_all_backends() {
    let sample = Sample {
        program: Program {
            functions: vec![Function {
                name: ENTRY_POINT.into(),
                params: vec![Param {
                    name: "unused".into(),
                    ty: Type::ubits(1),
                }],
                ret: Type::tuple(vec![Type::sbits(7), Type::array(Type::ubits(3), 2)]),
                body: Expr::Tuple {
                    elements: vec![
                        Expr::literal(Value::sbits(7, -64)),
                        Expr::Array {
                            elements: vec![
                                Expr::literal(Value::ubits(3, 5)),
                                Expr::literal(Value::ubits(3, 2)),
                            ],
                        },
                    ],
                },
            }],
        },
        args_batch: vec![
            ArgumentSet(vec![Value::ubits(1, 0)]),
            ArgumentSet(vec![Value::ubits(1, 1)]),
        ],
        run_config: RunConfig {
            codegen: true,
            calls_per_sample: 2,
            ..RunConfig::default()
        },
    };
    let result = SampleRunner::for_config(&sample.run_config).run(&sample);
    assert_eq!(result.outcome, ComparisonOutcome::Match);
}

#[test]
fn test_every_call_is_evaluated_and_persisted() {
    let sample = identity_sample(4);
    let runner = faulty_runner(|args| args[0] == Value::ubits(8, 2));
    let result = runner.run(&sample);

    match &result.outcome {
        ComparisonOutcome::Mismatch {
            backend,
            call_index,
            mismatched_calls,
            expected,
            actual,
            ..
        } => {
            assert_eq!(backend, "faulty");
            assert_eq!(*call_index, 2);
            assert_eq!(mismatched_calls, &vec![2]);
            assert_eq!(expected, "u8:2");
            assert_eq!(actual, "u8:3");
        }
        other => panic!("expected mismatch, got {other:?}"),
    }

    let dir = TempDir::new().unwrap();
    let path = dslx_fuzz_core::persist_failure(dir.path(), 7, 3, &sample, &result).unwrap();
    assert_eq!(path, dir.path().join("seed-7-iter-000003"));
    for backend in ["interpreter", "ir", "faulty"] {
        let text = fs::read_to_string(path.join("results").join(format!("{backend}.txt"))).unwrap();
        assert_eq!(text.lines().count(), 4, "{backend}");
    }
    assert_eq!(
        fs::read_to_string(path.join("args.txt")).unwrap(),
        "u8:0\nu8:1\nu8:2\nu8:3\n"
    );
    assert!(path.join("sample.x").is_file());
    assert!(path.join("ir.txt").is_file());
    assert_eq!(load_sample(&path).unwrap(), sample);

    let outcome: ComparisonOutcome =
        serde_json::from_str(&fs::read_to_string(path.join("outcome.json")).unwrap()).unwrap();
    assert_eq!(outcome, result.outcome);
}

/// Interpreter that sleeps before every call and never checks its budget.
struct SlowBackend;

struct SlowExecutable {
    program: Program,
}

impl Evaluator for SlowBackend {
    fn name(&self) -> &str {
        "slow"
    }

    fn compile(&self, program: &Program) -> Result<Box<dyn Executable>, BackendError> {
        Ok(Box::new(SlowExecutable {
            program: program.clone(),
        }))
    }
}

impl Executable for SlowExecutable {
    fn evaluate(&self, args: &[Value], limits: &EvalLimits) -> EvalResult<Value> {
        std::thread::sleep(Duration::from_millis(300));
        Interpreter::new(&self.program).run(args, limits)
    }
}

#[test]
fn test_timeout_is_reported_as_crash() {
    let mut sample = identity_sample(1);
    sample.run_config.timeout_ms = Some(10);
    let runner = SampleRunner::with_backends(
        BackendKind::Interpreter.evaluator(),
        vec![BackendKind::Ir.evaluator(), Arc::new(SlowBackend)],
    );
    let result = runner.run(&sample);
    match result.outcome {
        ComparisonOutcome::BackendCrash {
            backend,
            call_index,
            error,
        } => {
            assert_eq!(backend, "slow");
            assert_eq!(call_index, Some(0));
            assert!(error.starts_with("TIMEOUT"), "{error}");
        }
        other => panic!("expected a timeout crash, got {other:?}"),
    }
}

#[test]
fn test_timeout_crash_is_persisted() {
    let dir = TempDir::new().unwrap();
    let mut config = FuzzConfig::new(11, 1, dir.path());
    config.run.timeout_ms = Some(10);
    config.generator = GeneratorOptions::builder()
        .short_samples(true)
        .build()
        .unwrap();
    let runner = SampleRunner::with_backends(
        BackendKind::Interpreter.evaluator(),
        vec![Arc::new(SlowBackend)],
    );
    let mut session = FuzzSession::new(11);
    let report = run_fuzz_in(&config, &runner, &mut session).unwrap();
    assert_eq!(report.crashes, 1);
    assert_eq!(report.mismatches, 0);
    assert!(dir.path().join("seed-11-iter-000000").is_dir());
}

// =============================================================================
// Driver
// =============================================================================

#[test]
fn test_seed_zero_scenario_passes() {
    let dir = TempDir::new().unwrap();
    let config = FuzzConfig {
        generator: GeneratorOptions::builder()
            .disallow_divide(true)
            .build()
            .unwrap(),
        run: RunConfig {
            codegen: true,
            calls_per_sample: 4,
            ..RunConfig::default()
        },
        ..FuzzConfig::new(0, 8, dir.path())
    };

    let mut session = FuzzSession::new(0);
    for _ in 0..8 {
        let sample = session.generate_sample(&config.generator, &config.run).unwrap();
        assert!(!contains_division(&sample.program));
    }

    let report = run_fuzz(&config).unwrap();
    assert_eq!(report.samples_run, 8);
    assert_eq!(report.samples_failed, 0, "{:?}", report.failures);
    assert!(report.artifact_paths.is_empty());
}

#[test]
fn test_forced_disagreement_is_a_mismatch_with_deterministic_artifact() {
    let dir = TempDir::new().unwrap();
    let config = FuzzConfig {
        stop_on_failure: true,
        ..FuzzConfig::new(5, 10, dir.path())
    };
    let runner = faulty_runner(|_| true);
    let mut session = FuzzSession::new(config.seed);
    let report = run_fuzz_in(&config, &runner, &mut session).unwrap();

    assert_eq!(report.samples_run, 1);
    assert_eq!(report.mismatches, 1);
    assert_eq!(report.crashes, 0);
    assert!(matches!(
        report.failures[0].outcome,
        ComparisonOutcome::Mismatch { .. }
    ));
    let expected = dir.path().join(artifact_dir_name(5, 0));
    assert_eq!(report.artifact_paths, vec![expected.clone()]);
    assert!(expected.join("sample.json").is_file());

    // Replaying the persisted sample through the built-in backends passes.
    let sample = load_sample(&expected).unwrap();
    let replayed = SampleRunner::for_config(&sample.run_config).run(&sample);
    assert_eq!(replayed.outcome, ComparisonOutcome::Match);
}

#[test]
fn test_failures_continue_without_stop_on_failure() {
    let dir = TempDir::new().unwrap();
    let config = FuzzConfig::new(2, 3, dir.path());
    let runner = faulty_runner(|_| true);
    let report = run_fuzz_in(&config, &runner, &mut FuzzSession::new(2)).unwrap();
    assert_eq!(report.samples_run, 3);
    assert_eq!(report.samples_failed, 3);
    assert_eq!(report.artifact_paths.len(), 3);
}

#[test]
fn test_unwritable_artifact_dir_becomes_warning() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, "file").unwrap();
    let config = FuzzConfig::new(4, 1, &blocker);
    let report = run_fuzz_in(&config, &faulty_runner(|_| true), &mut FuzzSession::new(4)).unwrap();
    assert_eq!(report.samples_failed, 1);
    assert!(report.artifact_paths.is_empty());
    assert_eq!(report.warnings.len(), 1);
    assert!(report.failures[0].artifact_path.is_none());
}

#[test]
fn test_shards_use_offset_seeds() {
    let dir = TempDir::new().unwrap();
    let config = FuzzConfig {
        run: RunConfig {
            calls_per_sample: 2,
            ..RunConfig::default()
        },
        ..FuzzConfig::new(10, 3, dir.path())
    };
    let report = run_shards(&config, 3, Arc::new(AtomicBool::new(false))).unwrap();
    assert_eq!(report.samples_run, 9);
    assert_eq!(report.seed, 10);
    assert!(report.is_clean(), "{:?}", report.failures);
}

#[test]
fn test_sanity_a_few_samples() {
    let dir = TempDir::new().unwrap();
    let report = run_sanity(0, dir.path()).unwrap();
    assert_eq!(report.samples_run, 8);
    assert!(report.is_clean());
}
