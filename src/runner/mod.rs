//! Differential test runner.
//!
//! A run checks the submission's structure, binds its members to the
//! question's contract, builds receiver pairs, and then executes the
//! scheduled cases on both sides inside a [`Sandbox`], judging each pair of
//! outcomes. Steps are recorded as they complete, so a run that hits its
//! time budget still reports everything it did.

pub mod receivers;
pub mod results;
pub mod source;
pub mod verify;

pub use receivers::{ReceiverPair, ReceiverPool};
pub use results::{OutcomeReport, ReceiverReport, ResultFileError, RunCounts, RunResult, TestStep};
pub use source::{CaseSource, TestCase};
pub use verify::{custom_verify, default_verify, values_equal, Outcome};

use crate::design::{self, CdaResult};
use crate::env::{BytecodeProvider, OutputCapturer, Sandbox, ThreadCapturer, ThreadSandbox};
use crate::error::{GradeError, GradeResult, MissingMember};
use crate::generators::{materialize, GenScope};
use crate::mirror::Mirror;
use crate::model::space::panic_message;
use crate::model::{lock, ClassSpace, ObjectModel, Signature, Thrown, Value};
use crate::question::{Question, SolutionPlan, SubmissionBinding};
use crate::schedule::{ResolvedArgs, RunnerArgs, TestCounts};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Mixed into a case seed to derive the seed handed to custom verifiers.
const VERIFIER_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Collaborators and overrides for one run.
#[derive(Clone)]
pub struct RunOptions {
    /// Wall-clock budget for the whole run; unlimited when `None`.
    pub timeout: Option<Duration>,
    /// Execution boundary for invoked code.
    pub sandbox: Arc<dyn Sandbox>,
    /// Output capture used for solutions that verify printed output.
    pub capturer: Arc<dyn OutputCapturer>,
    /// Source of the submission's class shape; the space itself when unset.
    pub submission_provider: Option<Arc<dyn BytecodeProvider>>,
    /// Applied over the question's declared arguments.
    pub args: RunnerArgs,
    /// Overrides the question's structural check setting.
    pub design_check: Option<bool>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            sandbox: Arc::new(ThreadSandbox::default()),
            capturer: Arc::new(ThreadCapturer),
            submission_provider: None,
            args: RunnerArgs::default(),
            design_check: None,
        }
    }
}

impl RunOptions {
    /// Set the time budget.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the sandbox.
    #[must_use]
    pub fn with_sandbox(mut self, sandbox: Arc<dyn Sandbox>) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// Set the output capturer.
    #[must_use]
    pub fn with_capturer(mut self, capturer: Arc<dyn OutputCapturer>) -> Self {
        self.capturer = capturer;
        self
    }

    /// Read the submission's shape from `provider`.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn BytecodeProvider>) -> Self {
        self.submission_provider = Some(provider);
        self
    }

    /// Override run arguments.
    #[must_use]
    pub fn with_args(mut self, args: RunnerArgs) -> Self {
        self.args = args;
        self
    }

    /// Force the structural check on or off.
    #[must_use]
    pub fn with_design_check(mut self, enabled: bool) -> Self {
        self.design_check = Some(enabled);
        self
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("timeout", &self.timeout)
            .field("args", &self.args)
            .field("design_check", &self.design_check)
            .field("has_provider", &self.submission_provider.is_some())
            .finish_non_exhaustive()
    }
}

/// Test `class` in `submission` against `question`.
///
/// Test failures and timeouts are part of the result. Errors are reserved
/// for submissions that cannot be tested at all (missing members or a
/// structural mismatch) and for broken invariants.
pub fn run(
    question: &Question,
    submission: &Arc<ClassSpace>,
    class: &str,
    seed: u64,
    options: &RunOptions,
) -> GradeResult<RunResult> {
    let args = options.args.apply_over(question.args()).resolve();
    let start_time = results::epoch_millis();
    info!(
        question = %question.name(),
        submission = %class,
        seed,
        num_tests = args.num_tests,
        "starting run"
    );

    let submission = options.sandbox.transform(Arc::clone(submission));
    let structural_result = if options.design_check.unwrap_or(question.checks_design()) {
        Some(check_design(question, &submission, class, options)?)
    } else {
        None
    };
    let binding = SubmissionBinding::bind(question.contract(), &submission, class)?;

    let progress = Arc::new(Mutex::new(Progress::default()));
    let cancel = Arc::new(AtomicBool::new(false));
    let worker = Worker {
        question: question.clone(),
        reference: Arc::clone(question.reference()),
        submission,
        binding,
        args,
        seed,
        capturer: Arc::clone(&options.capturer),
        progress: Arc::clone(&progress),
        cancel: Arc::clone(&cancel),
    };
    let completed = options.sandbox.run(options.timeout, Box::new(move || worker.run()));
    if !completed {
        cancel.store(true, Ordering::SeqCst);
        warn!(question = %question.name(), submission = %class, timeout = ?options.timeout, "run timed out");
    }

    let mut progress = lock(&progress);
    if let Some(err) = progress.fatal.take() {
        return Err(err);
    }
    if completed && !progress.finished {
        return Err(GradeError::Fatal("test worker stopped before finishing".into()));
    }
    let result = RunResult {
        seed,
        solution_name: question.solution_name().to_string(),
        reference_class: question.class().to_string(),
        submission_class: class.to_string(),
        start_time,
        end_time: results::epoch_millis(),
        timed_out: !completed,
        counts: RunCounts::new(progress.counts, progress.discarded),
        structural_result,
        steps: progress.steps.clone(),
    };
    info!(
        question = %question.name(),
        submission = %class,
        summary = %result.summary(),
        elapsed_ms = result.elapsed_millis(),
        "run finished"
    );
    Ok(result)
}

fn check_design(
    question: &Question,
    submission: &Arc<ClassSpace>,
    class: &str,
    options: &RunOptions,
) -> GradeResult<CdaResult> {
    let reference = question
        .reference()
        .shape(question.class())
        .ok_or_else(|| GradeError::Fatal(format!("reference class {} vanished", question.class())))?;
    let found = match &options.submission_provider {
        Some(provider) => provider.shape_of(class).ok(),
        None => submission.shape(class),
    };
    let found = found.ok_or_else(|| GradeError::ClassDesign(MissingMember::Class(class.to_string())))?;
    let report = design::compare(&reference, &found, question.design_options());
    if !report.all_match() {
        debug!(submission = %class, mismatches = report.mismatches().count(), "structural check failed");
        return Err(GradeError::StructuralMismatch {
            class: class.to_string(),
            report: Box::new(report),
        });
    }
    Ok(report)
}

#[derive(Default)]
struct Progress {
    steps: Vec<TestStep>,
    counts: TestCounts,
    discarded: u32,
    fatal: Option<GradeError>,
    finished: bool,
}

/// Everything the sandboxed part of a run owns.
struct Worker {
    question: Question,
    reference: Arc<ClassSpace>,
    submission: Arc<ClassSpace>,
    binding: SubmissionBinding,
    args: ResolvedArgs,
    seed: u64,
    capturer: Arc<dyn OutputCapturer>,
    progress: Arc<Mutex<Progress>>,
    cancel: Arc<AtomicBool>,
}

impl Worker {
    fn run(&self) {
        let outcome = self.execute();
        let mut progress = lock(&self.progress);
        if let Err(err) = outcome {
            progress.fatal = Some(err);
        }
        progress.finished = true;
    }

    fn execute(&self) -> GradeResult<()> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let registry = self.question.registry();
        let ours = GenScope::new(&self.reference, registry);
        let theirs = GenScope::new(&self.submission, registry);
        let mirror = Mirror::new(Arc::clone(&self.reference), Arc::clone(&self.submission));

        let mut pool = self.receivers(&ours, &theirs, &mut rng)?;
        let mut source = CaseSource::new(self.question.plans(), &self.args);
        let mut number = 0u32;
        let mut discarded = 0u32;

        while !self.cancel.load(Ordering::SeqCst) {
            let Some(case) = source.next(&mut rng) else {
                break;
            };
            number += 1;
            let index = match pool.pick(&mut rng) {
                Some(index) => index,
                None => {
                    debug!(test = number, "no ready receivers left, rebuilding the pool");
                    pool = self.receivers(&ours, &theirs, &mut rng)?;
                    pool.pick(&mut rng)
                        .ok_or_else(|| GradeError::Fatal("rebuilt receiver pool has no ready pair".into()))?
                }
            };
            let pair = pool
                .pair(index)
                .cloned()
                .ok_or_else(|| GradeError::Fatal(format!("receiver pair {} disappeared", index)))?;
            let plan = self
                .question
                .plans()
                .get(case.plan)
                .ok_or_else(|| GradeError::Fatal(format!("no solution plan {}", case.plan)))?;

            let step = self.step(number, &case, plan, &pair, &ours, &theirs, &mirror)?;
            debug!(
                test = number,
                kind = ?step.kind,
                complexity = step.complexity,
                discarded = step.discarded,
                succeeded = step.succeeded,
                "step finished"
            );

            let stop = if step.discarded {
                source.retract();
                discarded += 1;
                discarded >= self.args.max_discards
            } else {
                if !step.succeeded {
                    pool.mark_not_ready(index);
                }
                false
            };

            let mut progress = lock(&self.progress);
            progress.steps.push(step);
            progress.counts = source.counts();
            progress.discarded = discarded;
            drop(progress);

            if stop {
                warn!(
                    question = %self.question.name(),
                    discarded,
                    "discard budget exhausted, stopping early"
                );
                break;
            }
        }
        Ok(())
    }

    fn receivers(
        &self,
        ours: &GenScope<'_>,
        theirs: &GenScope<'_>,
        rng: &mut ChaCha8Rng,
    ) -> GradeResult<ReceiverPool> {
        match self.question.receiver_strategy() {
            None => Ok(ReceiverPool::single()),
            Some(strategy) => ReceiverPool::build(
                ours,
                theirs,
                strategy,
                self.args.receiver_count.max(1),
                self.args.max_receiver_retries,
                self.args.max_complexity,
                rng,
                self.capturer.as_ref(),
            ),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn step(
        &self,
        number: u32,
        case: &TestCase,
        plan: &SolutionPlan,
        pair: &ReceiverPair,
        ours: &GenScope<'_>,
        theirs: &GenScope<'_>,
        mirror: &Mirror,
    ) -> GradeResult<TestStep> {
        let ref_args = materialize(ours, &plan.params, &case.recipe, case.seed)
            .map_err(|t| GradeError::Fatal(format!("reference input generation failed: {}", t)))?;
        let (ref_receiver, sub_receiver) = if plan.is_static {
            (None, None)
        } else {
            (pair.reference.as_ref(), pair.submission.as_ref())
        };

        let mut step = TestStep {
            test_number: number,
            kind: case.kind,
            complexity: case.complexity,
            discarded: false,
            receivers: match (ref_receiver, sub_receiver) {
                (Some(r), Some(s)) => Some(ReceiverReport {
                    reference: results::render(r),
                    submission: results::render(s),
                }),
                _ => None,
            },
            arguments: ref_args.iter().map(results::render).collect(),
            succeeded: false,
            reference_outcome: None,
            submission_outcome: None,
            verification_error: None,
        };

        if let Some(accept) = self.question.precondition() {
            let accepted = catch_unwind(AssertUnwindSafe(|| accept(ref_receiver, &ref_args)))
                .map_err(|p| GradeError::Fatal(format!("precondition panicked: {}", panic_message(p))))?;
            if !accepted {
                step.discarded = true;
                return Ok(step);
            }
        }

        let sub_args = match materialize(theirs, &plan.params, &case.recipe, case.seed) {
            Ok(args) => args,
            Err(thrown) => {
                step.verification_error = Some(format!("Submission input could not be generated: {}", thrown));
                return Ok(step);
            }
        };
        let sub_signature = self
            .binding
            .submission_for(&plan.signature)
            .ok_or_else(|| GradeError::Fatal(format!("{} is not bound", plan.signature)))?;

        let reference = self.call(
            self.reference.as_ref(),
            self.question.class(),
            &plan.signature,
            ref_receiver,
            ref_args,
            plan.verify_output,
        );
        let submission = self.call(
            self.submission.as_ref(),
            self.binding.class(),
            sub_signature,
            sub_receiver,
            sub_args,
            plan.verify_output,
        );
        let presented = present(mirror, &submission, &self.reference);
        if let Some(message) = mirror.take_fatal() {
            return Err(GradeError::Fatal(message));
        }

        let verdict = match self.question.verifier() {
            Some(verify) => {
                let mut rng = ChaCha8Rng::seed_from_u64(case.seed ^ VERIFIER_SALT);
                custom_verify(verify, &reference, &presented, &mut rng)
            }
            None => default_verify(&reference, &presented, plan.verify_output),
        };
        if let Some(message) = mirror.take_fatal() {
            return Err(GradeError::Fatal(message));
        }

        step.reference_outcome = Some(OutcomeReport::from(&reference));
        step.submission_outcome = Some(OutcomeReport::from(&submission));
        match verdict {
            Ok(()) => step.succeeded = true,
            Err(reason) => step.verification_error = Some(reason),
        }
        Ok(step)
    }

    fn call(
        &self,
        model: &dyn ObjectModel,
        class: &str,
        signature: &Signature,
        receiver: Option<&Value>,
        args: Vec<Value>,
        capture: bool,
    ) -> Outcome {
        let passed = args.clone();
        if !capture {
            return Outcome {
                receiver: receiver.cloned(),
                args: passed,
                result: model.invoke(receiver, class, signature, args),
                stdout: None,
                stderr: None,
            };
        }
        let mut pending = Some(args);
        let mut result = None;
        let output = self.capturer.run_capturing_output(&mut || {
            let args = pending.take().unwrap_or_default();
            result = Some(model.invoke(receiver, class, signature, args));
        });
        Outcome {
            receiver: receiver.cloned(),
            args: passed,
            result: result.unwrap_or_else(|| Err(Thrown::panic("invocation did not run"))),
            stdout: Some(output.stdout),
            stderr: Some(output.stderr),
        }
    }
}

/// The submission's outcome as seen from the reference space.
fn present(mirror: &Mirror, outcome: &Outcome, target: &Arc<ClassSpace>) -> Outcome {
    Outcome {
        receiver: outcome.receiver.as_ref().map(|v| mirror.present(v, target)),
        args: outcome.args.iter().map(|v| mirror.present(v, target)).collect(),
        result: match &outcome.result {
            Ok(value) => Ok(mirror.present(value, target)),
            Err(thrown) => Err(thrown.clone()),
        },
        stdout: outcome.stdout.clone(),
        stderr: outcome.stderr.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::InlineSandbox;
    use crate::model::{ClassDef, ConstructorDef, FieldDef, MethodDef, TypeRef};
    use crate::question::QuestionConfig;

    fn counter(label: &str, step: i32) -> Arc<ClassSpace> {
        let space = ClassSpace::new(label);
        space
            .define(
                ClassDef::public_class("Counter")
                    .field(FieldDef::public("count", TypeRef::Int))
                    .constructor(ConstructorDef::public())
                    .method(
                        MethodDef::public("add")
                            .param(TypeRef::Int)
                            .returns(TypeRef::Int)
                            .body(move |call| {
                                let next = call.get("count")?.as_int().unwrap_or(0).wrapping_add(call.int(0)?.wrapping_mul(step));
                                call.set("count", next)?;
                                Ok(Value::Int(next))
                            }),
                    ),
            )
            .unwrap();
        space
    }

    fn question() -> Question {
        let config = QuestionConfig::new(counter("reference", 1), "Counter")
            .solution(Signature::new("add", [TypeRef::Int]))
            .args(RunnerArgs {
                num_tests: Some(64),
                receiver_count: Some(4),
                ..RunnerArgs::default()
            });
        Question::load(config, "").unwrap()
    }

    fn inline() -> RunOptions {
        RunOptions::default().with_sandbox(Arc::new(InlineSandbox))
    }

    #[test]
    fn test_identical_submission_passes() {
        crate::init_test_tracing();
        let result = run(&question(), &counter("submission", 1), "Counter", 5, &inline()).unwrap();
        assert!(result.passed(), "{}", result.summary());
        assert_eq!(result.counts.total, 64);
        assert!(result.structural_result.as_ref().is_some_and(CdaResult::all_match));
    }

    #[test]
    fn test_diverging_submission_fails_and_retires_pairs() {
        let result = run(&question(), &counter("submission", 2), "Counter", 5, &inline()).unwrap();
        assert!(!result.passed());
        let failed: Vec<&TestStep> = result.failed_steps().collect();
        assert!(!failed.is_empty());
        assert!(failed[0].verification_error.is_some());
    }

    #[test]
    fn test_same_seed_same_steps() {
        let q = question();
        let a = run(&q, &counter("a", 2), "Counter", 11, &inline()).unwrap();
        let b = run(&q, &counter("b", 2), "Counter", 11, &inline()).unwrap();
        assert_eq!(a.steps, b.steps);
    }

    #[test]
    fn test_missing_class_is_class_design_error() {
        let err = run(&question(), &counter("submission", 1), "Nope", 1, &inline()).unwrap_err();
        assert!(matches!(err, GradeError::ClassDesign(MissingMember::Class(_))));
    }

    #[test]
    fn test_timeout_keeps_steps() {
        let space = ClassSpace::new("reference");
        space
            .define(
                ClassDef::public_class("Slow").method(
                    MethodDef::public_static("nap")
                        .param(TypeRef::Int)
                        .returns(TypeRef::Int)
                        .body(|call| {
                            std::thread::sleep(Duration::from_millis(5));
                            Ok(Value::Int(call.int(0)?))
                        }),
                ),
            )
            .unwrap();
        let config = QuestionConfig::new(Arc::clone(&space), "Slow")
            .solution(Signature::new("nap", [TypeRef::Int]))
            .skip_self_verification()
            .args(RunnerArgs::with_tests(10_000));
        let q = Question::load(config, "").unwrap();
        let options = RunOptions::default().with_timeout(Duration::from_millis(100));
        let result = run(&q, &space, "Slow", 1, &options).unwrap();
        assert!(result.timed_out);
        assert!(!result.passed());
        assert!((result.steps.len() as u32) < 10_000);
    }
}
