//! Question declarations and loading.
//!
//! A [`QuestionConfig`] is the explicit declaration table for one reference
//! class: which methods are solutions, which members are helpers, custom
//! generators, declared cases, verifiers, preconditions, and default run
//! arguments. [`Question::load`] validates all of it eagerly and then runs
//! the reference against itself, so a broken reference is reported before
//! any submission is graded.

pub mod binding;
pub mod contract;

pub use binding::{BoundOperation, SubmissionBinding};
pub use contract::{ContractSpec, Operation};

use crate::design::{AnalysisType, CdaOptions};
use crate::env::InlineSandbox;
use crate::error::{GradeError, GradeResult};
use crate::generators::{Cases, GenFn, GeneratorConfig, GeneratorDescriptor, GeneratorRegistry, Strategy};
use crate::model::{ClassSpace, Signature, TypeRef, Value};
use crate::runner::{self, Outcome, RunOptions, RunResult};
use crate::schedule::RunnerArgs;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Seed of the self-verification run.
pub const SELF_VERIFY_SEED: u64 = 0x0403;

/// Custom equivalence check: `(reference, submission, rng)`. Submission
/// values arrive presented as reference types. `Err` carries the reason
/// the two outcomes differ.
pub type VerifyFn = Arc<dyn Fn(&Outcome, &Outcome, &mut ChaCha8Rng) -> Result<(), String> + Send + Sync>;

/// Input filter evaluated on the reference receiver and arguments.
pub type PreconditionFn = Arc<dyn Fn(Option<&Value>, &[Value]) -> bool + Send + Sync>;

/// A solution method and how to test it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionDecl {
    /// Solution name; the empty string is the default solution.
    pub name: String,
    /// The method under test.
    pub method: Signature,
    /// Compare printed output too.
    pub verify_output: bool,
    /// Generators named for specific parameter positions.
    pub param_generators: BTreeMap<usize, String>,
}

impl SolutionDecl {
    /// Default-named solution.
    pub fn new(method: Signature) -> Self {
        Self {
            name: String::new(),
            method,
            verify_output: false,
            param_generators: BTreeMap::new(),
        }
    }

    /// Set the solution name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Also compare standard output and standard error.
    #[must_use]
    pub fn verify_output(mut self) -> Self {
        self.verify_output = true;
        self
    }

    /// Use the generator called `generator` for parameter `index`.
    #[must_use]
    pub fn param_generator(mut self, index: usize, generator: impl Into<String>) -> Self {
        self.param_generators.insert(index, generator.into());
        self
    }
}

/// Declaration table for one reference class.
#[derive(Clone)]
pub struct QuestionConfig {
    reference: Arc<ClassSpace>,
    class: String,
    solutions: Vec<SolutionDecl>,
    helpers: BTreeSet<Signature>,
    helper_fields: BTreeSet<String>,
    verifiers: BTreeMap<String, VerifyFn>,
    preconditions: BTreeMap<String, PreconditionFn>,
    generators: GeneratorConfig,
    args: RunnerArgs,
    skipped_categories: BTreeSet<AnalysisType>,
    check_design: bool,
    self_verify: bool,
}

impl QuestionConfig {
    /// Empty declaration for `class` in `reference`.
    pub fn new(reference: Arc<ClassSpace>, class: impl Into<String>) -> Self {
        Self {
            reference,
            class: class.into(),
            solutions: Vec::new(),
            helpers: BTreeSet::new(),
            helper_fields: BTreeSet::new(),
            verifiers: BTreeMap::new(),
            preconditions: BTreeMap::new(),
            generators: GeneratorConfig::default(),
            args: RunnerArgs::default(),
            skipped_categories: BTreeSet::new(),
            check_design: true,
            self_verify: true,
        }
    }

    /// Declare a default-named solution method.
    #[must_use]
    pub fn solution(self, method: Signature) -> Self {
        self.solution_decl(SolutionDecl::new(method))
    }

    /// Declare a solution method.
    #[must_use]
    pub fn solution_decl(mut self, solution: SolutionDecl) -> Self {
        self.solutions.push(solution);
        self
    }

    /// Exclude a method or constructor from the contract.
    #[must_use]
    pub fn helper(mut self, member: Signature) -> Self {
        self.helpers.insert(member);
        self
    }

    /// Exclude a field from the contract.
    #[must_use]
    pub fn helper_field(mut self, name: impl Into<String>) -> Self {
        self.helper_fields.insert(name.into());
        self
    }

    /// Custom verifier for the solution called `solution`.
    #[must_use]
    pub fn verifier<F>(mut self, solution: impl Into<String>, verify: F) -> Self
    where
        F: Fn(&Outcome, &Outcome, &mut ChaCha8Rng) -> Result<(), String> + Send + Sync + 'static,
    {
        self.verifiers.insert(solution.into(), Arc::new(verify));
        self
    }

    /// Precondition for the solution called `solution`.
    #[must_use]
    pub fn precondition<F>(mut self, solution: impl Into<String>, accept: F) -> Self
    where
        F: Fn(Option<&Value>, &[Value]) -> bool + Send + Sync + 'static,
    {
        self.preconditions.insert(solution.into(), Arc::new(accept));
        self
    }

    /// Generator usable by name from [`SolutionDecl::param_generator`].
    #[must_use]
    pub fn named_generator(mut self, name: impl Into<String>, ty: TypeRef, generator: GenFn) -> Self {
        self.generators.named.insert(name.into(), (ty, generator));
        self
    }

    /// Generator for every value of `ty`.
    #[must_use]
    pub fn generator(mut self, ty: TypeRef, generator: GenFn) -> Self {
        self.generators.custom.insert(ty, generator);
        self
    }

    /// Declared edge cases for `ty`; they replace the defaults.
    #[must_use]
    pub fn edge_cases(mut self, ty: TypeRef, cases: Cases) -> Self {
        self.generators.edge.insert(ty, cases);
        self
    }

    /// Declared simple cases for `ty`; they replace the defaults.
    #[must_use]
    pub fn simple_cases(mut self, ty: TypeRef, cases: Cases) -> Self {
        self.generators.simple.insert(ty, cases);
        self
    }

    /// Default run arguments for this question.
    #[must_use]
    pub fn args(mut self, args: RunnerArgs) -> Self {
        self.args = args;
        self
    }

    /// Leave a category out of the structural check.
    #[must_use]
    pub fn skip_category(mut self, category: AnalysisType) -> Self {
        self.skipped_categories.insert(category);
        self
    }

    /// Do not run the structural check before testing.
    #[must_use]
    pub fn skip_design_check(mut self) -> Self {
        self.check_design = false;
        self
    }

    /// Do not run the reference against itself at load.
    #[must_use]
    pub fn skip_self_verification(mut self) -> Self {
        self.self_verify = false;
        self
    }

    /// Reference space.
    pub fn reference(&self) -> &Arc<ClassSpace> {
        &self.reference
    }

    /// Reference class name.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Distinct solution names, in declaration order.
    pub fn solution_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for solution in &self.solutions {
            if !names.contains(&solution.name) {
                names.push(solution.name.clone());
            }
        }
        names
    }
}

impl fmt::Debug for QuestionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuestionConfig")
            .field("class", &self.class)
            .field("solutions", &self.solutions)
            .field("helpers", &self.helpers)
            .field("generators", &self.generators)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// A solution method ready for testing.
#[derive(Debug, Clone)]
pub struct SolutionPlan {
    /// The method under test.
    pub signature: Signature,
    /// Whether it needs no receiver.
    pub is_static: bool,
    /// Generator per parameter.
    pub params: Vec<Arc<GeneratorDescriptor>>,
    /// Compare printed output too.
    pub verify_output: bool,
}

/// A loaded, validated question.
#[derive(Clone)]
pub struct Question {
    name: String,
    solution_name: String,
    reference: Arc<ClassSpace>,
    class: String,
    contract: ContractSpec,
    registry: Arc<GeneratorRegistry>,
    plans: Vec<SolutionPlan>,
    receiver: Option<Strategy>,
    verifier: Option<VerifyFn>,
    precondition: Option<PreconditionFn>,
    args: RunnerArgs,
    design_options: CdaOptions,
    check_design: bool,
}

impl Question {
    /// Validate `config` for the solution called `solution_name` and, unless
    /// disabled, run the reference against itself.
    pub fn load(config: QuestionConfig, solution_name: &str) -> GradeResult<Self> {
        let name = if solution_name.is_empty() {
            config.class.clone()
        } else {
            format!("{}/{}", config.class, solution_name)
        };
        let class = config
            .reference
            .class(&config.class)
            .ok_or_else(|| GradeError::configuration(&name, format!("reference class {} not found", config.class)))?;

        let known: BTreeSet<&str> = config.solutions.iter().map(|s| s.name.as_str()).collect();
        for key in config.verifiers.keys().chain(config.preconditions.keys()) {
            if !known.contains(key.as_str()) {
                return Err(GradeError::configuration(
                    &name,
                    format!("verifier or precondition bound to unknown solution {:?}", key),
                ));
            }
        }

        let chosen: Vec<&SolutionDecl> = config
            .solutions
            .iter()
            .filter(|s| s.name == solution_name)
            .collect();
        if chosen.is_empty() {
            return Err(GradeError::configuration(
                &name,
                format!("no eligible solution operation named {:?}", solution_name),
            ));
        }

        // Solutions of other names are not part of this question's contract.
        let mut excluded = config.helpers.clone();
        excluded.extend(
            config
                .solutions
                .iter()
                .filter(|s| s.name != solution_name)
                .map(|s| s.method.clone()),
        );
        let signatures: Vec<Signature> = chosen.iter().map(|s| s.method.clone()).collect();
        let contract = ContractSpec::derive(&name, &class, &signatures, &excluded, &config.helper_fields)?;

        let resolved = config.args.resolve();
        let registry = Arc::new(GeneratorRegistry::new(
            name.clone(),
            Arc::clone(&config.reference),
            config.class.clone(),
            config.generators.clone(),
            resolved.max_array_length,
        )?);

        let mut plans = Vec::with_capacity(chosen.len());
        for solution in &chosen {
            let params = registry.resolve_all(&solution.method.params, &solution.param_generators)?;
            let is_static = contract
                .operation(&solution.method)
                .is_some_and(|op| op.is_static);
            plans.push(SolutionPlan {
                signature: solution.method.clone(),
                is_static,
                params,
                verify_output: solution.verify_output,
            });
        }

        let receiver = if contract.is_static_only() {
            None
        } else {
            Some(registry.receiver_strategy().ok_or_else(|| {
                GradeError::configuration(
                    &name,
                    format!(
                        "{} needs receivers but has neither a generator nor a public no-argument constructor",
                        config.class
                    ),
                )
            })?)
        };

        let mut design_options = CdaOptions::default();
        for category in &config.skipped_categories {
            design_options = design_options.without(*category);
        }
        for member in &excluded {
            design_options = design_options.exclude_member(member.clone());
        }
        for field in &config.helper_fields {
            design_options = design_options.exclude_field(field.clone());
        }

        let question = Self {
            name,
            solution_name: solution_name.to_string(),
            reference: Arc::clone(&config.reference),
            class: config.class.clone(),
            contract,
            registry,
            plans,
            receiver,
            verifier: config.verifiers.get(solution_name).cloned(),
            precondition: config.preconditions.get(solution_name).cloned(),
            args: config.args.clone(),
            design_options,
            check_design: config.check_design,
        };
        debug!(question = %question.name, solutions = question.plans.len(), "question validated");

        if config.self_verify {
            question.verify_reference()?;
        }
        Ok(question)
    }

    fn verify_reference(&self) -> GradeResult<()> {
        let options = RunOptions::default()
            .with_sandbox(Arc::new(InlineSandbox))
            .with_design_check(false);
        let result = runner::run(self, &self.reference, &self.class, SELF_VERIFY_SEED, &options)
            .map_err(|err| GradeError::verification(&self.name, err.to_string()))?;
        if let Some(step) = result.failed_steps().next() {
            return Err(GradeError::verification(
                &self.name,
                format!(
                    "the reference disagrees with itself at test {}: {}",
                    step.test_number,
                    step.verification_error.as_deref().unwrap_or("outcomes differ")
                ),
            ));
        }
        info!(question = %self.name, summary = %result.summary(), "reference verified against itself");
        Ok(())
    }

    /// Grade one submission class.
    pub fn run(
        &self,
        submission: &Arc<ClassSpace>,
        class: &str,
        seed: u64,
        options: &RunOptions,
    ) -> GradeResult<RunResult> {
        runner::run(self, submission, class, seed, options)
    }

    /// Bind a submission class to this question's contract.
    pub fn bind(&self, submission: &Arc<ClassSpace>, class: &str) -> GradeResult<SubmissionBinding> {
        SubmissionBinding::bind(&self.contract, submission, class)
    }

    /// `Class` or `Class/solution`, used in messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Solution name this question tests.
    pub fn solution_name(&self) -> &str {
        &self.solution_name
    }

    /// Reference space.
    pub fn reference(&self) -> &Arc<ClassSpace> {
        &self.reference
    }

    /// Reference class name.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// The derived contract.
    pub fn contract(&self) -> &ContractSpec {
        &self.contract
    }

    /// The generator registry.
    pub fn registry(&self) -> &Arc<GeneratorRegistry> {
        &self.registry
    }

    /// Solution methods under test.
    pub fn plans(&self) -> &[SolutionPlan] {
        &self.plans
    }

    /// How receivers are built, when solutions need them.
    pub fn receiver_strategy(&self) -> Option<&Strategy> {
        self.receiver.as_ref()
    }

    /// Custom verifier, if declared.
    pub fn verifier(&self) -> Option<&VerifyFn> {
        self.verifier.as_ref()
    }

    /// Precondition, if declared.
    pub fn precondition(&self) -> Option<&PreconditionFn> {
        self.precondition.as_ref()
    }

    /// Declared default run arguments.
    pub fn args(&self) -> &RunnerArgs {
        &self.args
    }

    /// Structural check options.
    pub fn design_options(&self) -> &CdaOptions {
        &self.design_options
    }

    /// Whether runs start with a structural check.
    pub fn checks_design(&self) -> bool {
        self.check_design
    }
}

impl fmt::Debug for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Question")
            .field("name", &self.name)
            .field("plans", &self.plans)
            .field("receiver", &self.receiver)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassDef, ConstructorDef, FieldDef, MethodDef, Modifier};

    fn reference() -> Arc<ClassSpace> {
        let space = ClassSpace::new("reference");
        space
            .define(
                ClassDef::public_class("Calc")
                    .field(
                        FieldDef::public("EDGES", TypeRef::array(TypeRef::Int))
                            .with(Modifier::Static)
                            .initial(vec![i32::MIN, 0, i32::MAX]),
                    )
                    .constructor(ConstructorDef::public())
                    .method(
                        MethodDef::public_static("twice")
                            .param(TypeRef::Int)
                            .returns(TypeRef::Int)
                            .body(|call| Ok(Value::Int(call.int(0)?.wrapping_mul(2)))),
                    )
                    .method(
                        MethodDef::public_static("flaky")
                            .param(TypeRef::Int)
                            .returns(TypeRef::Long)
                            .body(|call| {
                                // Differs between two calls with equal input.
                                static CALLS: std::sync::atomic::AtomicI64 = std::sync::atomic::AtomicI64::new(0);
                                let n = CALLS.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                                Ok(Value::Long(i64::from(call.int(0)?) + n))
                            }),
                    ),
            )
            .unwrap();
        space
    }

    #[test]
    fn test_load_valid_question() {
        let config = QuestionConfig::new(reference(), "Calc")
            .solution(Signature::new("twice", [TypeRef::Int]))
            .helper(Signature::new("flaky", [TypeRef::Int]))
            .edge_cases(TypeRef::Int, Cases::Member("EDGES".into()))
            .args(RunnerArgs::with_tests(32));
        let question = Question::load(config, "").unwrap();
        assert_eq!(question.name(), "Calc");
        assert!(question.contract().is_static_only());
        assert!(question.receiver_strategy().is_none());
        assert_eq!(question.plans()[0].params[0].edge.as_ref().map(Vec::len), Some(3));
    }

    #[test]
    fn test_unknown_solution_name() {
        let config = QuestionConfig::new(reference(), "Calc").solution(Signature::new("twice", [TypeRef::Int]));
        let err = Question::load(config, "other").unwrap_err();
        assert!(matches!(err, GradeError::Configuration { .. }));
        assert!(err.to_string().contains("Calc/other"));
    }

    #[test]
    fn test_missing_reference_class() {
        let config = QuestionConfig::new(reference(), "Nope").solution(Signature::new("twice", [TypeRef::Int]));
        assert!(matches!(Question::load(config, ""), Err(GradeError::Configuration { .. })));
    }

    #[test]
    fn test_nondeterministic_reference_fails_self_verification() {
        let config = QuestionConfig::new(reference(), "Calc")
            .solution(Signature::new("flaky", [TypeRef::Int]))
            .helper(Signature::new("twice", [TypeRef::Int]))
            .args(RunnerArgs::with_tests(16));
        let err = Question::load(config, "").unwrap_err();
        assert!(matches!(err, GradeError::Verification { .. }), "{}", err);
    }

    #[test]
    fn test_verifier_for_unknown_solution() {
        let config = QuestionConfig::new(reference(), "Calc")
            .solution(Signature::new("twice", [TypeRef::Int]))
            .verifier("nope", |_, _, _| Ok(()));
        assert!(matches!(Question::load(config, ""), Err(GradeError::Configuration { .. })));
    }
}
