//! Turns scheduling decisions into concrete test cases.

use crate::generators::{ArgRecipe, CaseEnumerator, CaseMode};
use crate::question::SolutionPlan;
use crate::schedule::{CaseKind, ResolvedArgs, Scheduler, TestCounts, TestKind};
use rand::{Rng, RngCore};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// One test ready to be materialized on both sides.
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    /// Category.
    pub kind: TestKind,
    /// Complexity the scheduler assigned.
    pub complexity: u32,
    /// Index of the solution plan to call.
    pub plan: usize,
    /// How each argument is obtained.
    pub recipe: Vec<ArgRecipe>,
    /// Seed for generated arguments.
    pub seed: u64,
}

#[derive(Debug, Clone, Copy)]
struct Recorded {
    plan: usize,
    seed: u64,
    complexity: u32,
}

/// Scheduler plus per-plan case enumerators and the generated-case history
/// that regression tests replay.
#[derive(Debug, Clone)]
pub struct CaseSource {
    scheduler: Scheduler,
    arity: Vec<usize>,
    edge: Vec<CaseEnumerator>,
    simple: Vec<CaseEnumerator>,
    mixed: Vec<CaseEnumerator>,
    history: Vec<Recorded>,
    last_recorded: bool,
}

impl CaseSource {
    /// Source for `plans`. Categories with no declared cases at all are
    /// retired before the first test.
    pub fn new(plans: &[SolutionPlan], args: &ResolvedArgs) -> Self {
        let build = |mode| -> Vec<CaseEnumerator> {
            plans.iter().map(|p| CaseEnumerator::new(mode, &p.params)).collect()
        };
        let mut source = Self {
            scheduler: Scheduler::new(args),
            arity: plans.iter().map(|p| p.params.len()).collect(),
            edge: build(CaseMode::Edge),
            simple: build(CaseMode::Simple),
            mixed: build(CaseMode::Mixed),
            history: Vec::new(),
            last_recorded: false,
        };
        for kind in [CaseKind::Edge, CaseKind::Simple, CaseKind::Mixed] {
            if source.enumerators(kind).iter().all(CaseEnumerator::is_spent) {
                source.scheduler.notify_exhausted(kind);
            }
        }
        source
    }

    /// Counted tests so far.
    pub fn counts(&self) -> TestCounts {
        self.scheduler.counts()
    }

    /// Whether no further case will be produced.
    pub fn is_exhausted(&self) -> bool {
        self.scheduler.is_exhausted()
    }

    /// Next case, or `None` once the schedule is exhausted.
    pub fn next(&mut self, rng: &mut ChaCha8Rng) -> Option<TestCase> {
        loop {
            let scheduled = self.scheduler.next().ok()?;
            self.last_recorded = false;
            let case = match scheduled.kind {
                TestKind::Edge => self.enumerated(CaseKind::Edge, scheduled.kind, rng),
                TestKind::Simple => self.enumerated(CaseKind::Simple, scheduled.kind, rng),
                TestKind::Mixed => self.enumerated(CaseKind::Mixed, scheduled.kind, rng),
                TestKind::Generated => {
                    let plan = self.pick_plan(rng);
                    let seed = rng.next_u64();
                    self.history.push(Recorded {
                        plan,
                        seed,
                        complexity: scheduled.complexity,
                    });
                    self.last_recorded = true;
                    Some(self.generated(TestKind::Generated, plan, seed, scheduled.complexity, scheduled.complexity))
                }
                TestKind::Regression => Some(self.regression(scheduled.complexity, rng)),
            };
            if let Some(case) = case {
                return Some(case);
            }
        }
    }

    /// Take back the last case; its input was rejected.
    pub fn retract(&mut self) {
        self.scheduler.retract();
        if self.last_recorded {
            self.history.pop();
            self.last_recorded = false;
        }
    }

    fn enumerators(&mut self, kind: CaseKind) -> &mut Vec<CaseEnumerator> {
        match kind {
            CaseKind::Edge => &mut self.edge,
            CaseKind::Simple => &mut self.simple,
            CaseKind::Mixed | CaseKind::Generated => &mut self.mixed,
        }
    }

    fn enumerated(&mut self, kind: CaseKind, test: TestKind, rng: &mut ChaCha8Rng) -> Option<TestCase> {
        let open: Vec<usize> = self
            .enumerators(kind)
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.is_spent())
            .map(|(i, _)| i)
            .collect();
        if open.is_empty() {
            self.scheduler.retract();
            let feeds_mixed = matches!(kind, CaseKind::Edge | CaseKind::Simple)
                && self.mixed.iter().any(|e| !e.is_spent());
            if feeds_mixed {
                // Its values still pair up in mixed cases.
                self.scheduler.close(kind);
            } else {
                self.scheduler.notify_exhausted(kind);
            }
            debug!(?kind, feeds_mixed, "declared cases exhausted");
            return None;
        }
        let plan = open[rng.gen_range(0..open.len())];
        let Some(recipe) = self.enumerators(kind)[plan].next(rng) else {
            // Mixed enumerators can run dry while skipping invalid combinations.
            self.scheduler.retract();
            return None;
        };
        Some(TestCase {
            kind: test,
            complexity: 0,
            plan,
            recipe,
            seed: rng.next_u64(),
        })
    }

    fn regression(&mut self, complexity: u32, rng: &mut ChaCha8Rng) -> TestCase {
        let eligible: Vec<Recorded> = self
            .history
            .iter()
            .filter(|r| r.complexity <= complexity)
            .copied()
            .collect();
        if eligible.is_empty() {
            let plan = self.pick_plan(rng);
            let seed = rng.next_u64();
            return self.generated(TestKind::Regression, plan, seed, complexity, complexity);
        }
        let replay = eligible[rng.gen_range(0..eligible.len())];
        self.generated(TestKind::Regression, replay.plan, replay.seed, replay.complexity, complexity)
    }

    fn generated(&self, kind: TestKind, plan: usize, seed: u64, recorded: u32, reported: u32) -> TestCase {
        TestCase {
            kind,
            complexity: reported,
            plan,
            recipe: vec![ArgRecipe::Generate(recorded); self.arity.get(plan).copied().unwrap_or(0)],
            seed,
        }
    }

    fn pick_plan(&self, rng: &mut ChaCha8Rng) -> usize {
        match self.arity.len() {
            0 | 1 => 0,
            n => rng.gen_range(0..n),
        }
    }
}
