//! Test scheduling state machine.
//!
//! Decides, test by test, which category of input comes next and at what
//! complexity. The machine is a pure sequence generator: it owns only its
//! counters and caps, and restarting means building a new one.
//!
//! Order of preference for each test index `i`:
//!
//! 1. a regression test when `(i + 1) % (numTests / numRegression) == 0`
//! 2. an edge case while the edge cap is not reached
//! 3. a simple case while the simple cap is not reached
//! 4. a mixed edge-and-simple case while the mixed cap is not reached
//! 5. a generated case
//!
//! Mixed cases need both edge and simple values, so retiring both of those
//! categories retires mixed cases too. A category can instead be closed,
//! which stops scheduling it but leaves its values to mixed cases.
//!
//! Generated complexity climbs from 0 to the maximum across the generated
//! tests actually emitted. Regression tests reuse the latest generated
//! complexity, so both sequences are non-decreasing.

pub mod args;

pub use args::{ResolvedArgs, RunnerArgs};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of a scheduled test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TestKind {
    /// Declared boundary inputs only.
    Edge,
    /// Declared representative inputs only.
    Simple,
    /// Edge and simple inputs combined.
    Mixed,
    /// Random inputs at a scaled complexity.
    Generated,
    /// Replay of an earlier generated input.
    Regression,
}

/// A category that can be retired before its cap is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaseKind {
    /// Edge cases.
    Edge,
    /// Simple cases.
    Simple,
    /// Mixed cases.
    Mixed,
    /// Generated cases.
    Generated,
}

/// One scheduling decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTest {
    /// Category.
    pub kind: TestKind,
    /// Complexity for generators; zero for declared cases.
    pub complexity: u32,
}

/// Scheduler failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// `next` was called after the machine ran out of tests.
    #[error("test schedule is exhausted")]
    Exhausted,
}

/// Counted tests per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCounts {
    /// Edge tests.
    pub edge: u32,
    /// Simple tests.
    pub simple: u32,
    /// Mixed tests.
    pub mixed: u32,
    /// Generated tests.
    pub generated: u32,
    /// Regression tests.
    pub regression: u32,
}

impl TestCounts {
    /// Sum over all categories.
    pub fn total(&self) -> u32 {
        self.edge + self.simple + self.mixed + self.generated + self.regression
    }

    fn slot(&mut self, kind: TestKind) -> &mut u32 {
        match kind {
            TestKind::Edge => &mut self.edge,
            TestKind::Simple => &mut self.simple,
            TestKind::Mixed => &mut self.mixed,
            TestKind::Generated => &mut self.generated,
            TestKind::Regression => &mut self.regression,
        }
    }
}

/// The scheduling state machine.
#[derive(Debug, Clone)]
pub struct Scheduler {
    num_tests: u32,
    max_complexity: u32,
    edge_cap: u32,
    simple_cap: u32,
    mixed_cap: u32,
    edge_retired: bool,
    simple_retired: bool,
    generated_retired: bool,
    regression_period: Option<u32>,
    counts: TestCounts,
    /// Fixed at the first generated emission.
    generated_planned: Option<u32>,
    last_generated_complexity: Option<u32>,
    last: Option<ScheduledTest>,
}

impl Scheduler {
    /// Machine for one run.
    pub fn new(args: &ResolvedArgs) -> Self {
        let regression_period = match args.num_regression_tests {
            0 => None,
            quota => Some((args.num_tests / quota).max(1)),
        };
        Self {
            num_tests: args.num_tests,
            max_complexity: args.max_complexity,
            edge_cap: args.max_only_edge_case_tests,
            simple_cap: args.max_only_simple_case_tests,
            mixed_cap: args.num_simple_edge_mixed_tests,
            edge_retired: false,
            simple_retired: false,
            generated_retired: false,
            regression_period,
            counts: TestCounts::default(),
            generated_planned: None,
            last_generated_complexity: None,
            last: None,
        }
    }

    /// Counted tests so far.
    pub fn counts(&self) -> TestCounts {
        self.counts
    }

    /// Counted tests so far, all categories.
    pub fn tests_run(&self) -> u32 {
        self.counts.total()
    }

    /// Whether `next` would fail.
    pub fn is_exhausted(&self) -> bool {
        self.tests_run() >= self.num_tests || self.all_retired()
    }

    fn all_retired(&self) -> bool {
        self.generated_retired
            && self.counts.edge >= self.edge_cap
            && self.counts.simple >= self.simple_cap
            && self.counts.mixed >= self.mixed_cap
    }

    /// Stop scheduling a category. It is capped at its current count, and
    /// its remaining share goes to whichever categories remain.
    pub fn close(&mut self, kind: CaseKind) {
        match kind {
            CaseKind::Edge => self.edge_cap = self.counts.edge,
            CaseKind::Simple => self.simple_cap = self.counts.simple,
            CaseKind::Mixed => self.mixed_cap = self.counts.mixed,
            CaseKind::Generated => self.generated_retired = true,
        }
    }

    /// Retire a category: close it, and once edge and simple are both
    /// retired, close mixed as well.
    pub fn notify_exhausted(&mut self, kind: CaseKind) {
        self.close(kind);
        match kind {
            CaseKind::Edge => self.edge_retired = true,
            CaseKind::Simple => self.simple_retired = true,
            CaseKind::Mixed | CaseKind::Generated => {}
        }
        if self.edge_retired && self.simple_retired {
            self.mixed_cap = self.counts.mixed;
        }
    }

    /// Decide the next test.
    pub fn next(&mut self) -> Result<ScheduledTest, ScheduleError> {
        if self.is_exhausted() {
            return Err(ScheduleError::Exhausted);
        }
        let index = self.tests_run();
        let scheduled = if self.is_regression_slot(index) {
            ScheduledTest {
                kind: TestKind::Regression,
                complexity: self.last_generated_complexity.unwrap_or(0),
            }
        } else if self.counts.edge < self.edge_cap {
            ScheduledTest {
                kind: TestKind::Edge,
                complexity: 0,
            }
        } else if self.counts.simple < self.simple_cap {
            ScheduledTest {
                kind: TestKind::Simple,
                complexity: 0,
            }
        } else if self.counts.mixed < self.mixed_cap {
            ScheduledTest {
                kind: TestKind::Mixed,
                complexity: 0,
            }
        } else if !self.generated_retired {
            let complexity = self.generated_complexity();
            self.last_generated_complexity = Some(complexity);
            ScheduledTest {
                kind: TestKind::Generated,
                complexity,
            }
        } else {
            // Only regression slots are left, and this index is not one.
            ScheduledTest {
                kind: TestKind::Regression,
                complexity: self.last_generated_complexity.unwrap_or(0),
            }
        };
        *self.counts.slot(scheduled.kind) += 1;
        self.last = Some(scheduled);
        Ok(scheduled)
    }

    /// Take back the most recent decision, e.g. because its input was
    /// rejected by a precondition. Generated complexity does not advance for
    /// a retracted test.
    pub fn retract(&mut self) {
        let Some(last) = self.last.take() else {
            return;
        };
        let slot = self.counts.slot(last.kind);
        *slot = slot.saturating_sub(1);
        if last.kind == TestKind::Generated {
            self.last_generated_complexity = match self.counts.generated {
                0 => None,
                n => Some(self.complexity_at(n - 1)),
            };
        }
    }

    fn is_regression_slot(&self, index: u32) -> bool {
        self.regression_period
            .is_some_and(|period| (index + 1) % period == 0)
    }

    fn regression_total(&self) -> u32 {
        self.regression_period
            .map_or(0, |period| self.num_tests / period)
    }

    fn generated_complexity(&mut self) -> u32 {
        if self.generated_planned.is_none() {
            let cases = self.edge_cap + self.simple_cap + self.mixed_cap;
            let planned = self
                .num_tests
                .saturating_sub(cases)
                .saturating_sub(self.regression_total());
            self.generated_planned = Some(planned);
        }
        self.complexity_at(self.counts.generated)
    }

    /// Complexity of the `k`-th generated test (zero-based).
    fn complexity_at(&self, k: u32) -> u32 {
        let planned = self.generated_planned.unwrap_or(0);
        if planned <= 1 {
            return 0;
        }
        let scaled = (f64::from(k) * f64::from(self.max_complexity) / f64::from(planned - 1)).round();
        (scaled as u32).min(self.max_complexity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(scheduler: &mut Scheduler) -> Vec<ScheduledTest> {
        let mut out = Vec::new();
        while let Ok(test) = scheduler.next() {
            out.push(test);
        }
        out
    }

    #[test]
    fn test_default_run_shape() {
        let args = RunnerArgs::with_tests(64).resolve();
        let mut scheduler = Scheduler::new(&args);
        let tests = drain(&mut scheduler);
        assert_eq!(tests.len(), 64);
        assert_eq!(tests[0].kind, TestKind::Edge);
        assert_eq!(tests[15].kind, TestKind::Regression);
        assert_eq!(tests[63].kind, TestKind::Regression);
        let counts = scheduler.counts();
        assert_eq!(counts.edge, 4);
        assert_eq!(counts.simple, 4);
        assert_eq!(counts.mixed, 4);
        assert_eq!(counts.regression, 4);
        assert_eq!(counts.generated, 48);
        assert_eq!(scheduler.next(), Err(ScheduleError::Exhausted));
    }

    #[test]
    fn test_generated_complexity_spans_zero_to_max() {
        let args = RunnerArgs {
            num_tests: Some(50),
            max_only_edge_case_tests: Some(0),
            max_only_simple_case_tests: Some(0),
            num_simple_edge_mixed_tests: Some(0),
            num_regression_tests: Some(0),
            max_complexity: Some(10),
            ..RunnerArgs::default()
        }
        .resolve();
        let tests = drain(&mut Scheduler::new(&args));
        assert_eq!(tests.first().map(|t| t.complexity), Some(0));
        assert_eq!(tests.last().map(|t| t.complexity), Some(10));
        assert!(tests.windows(2).all(|w| w[0].complexity <= w[1].complexity));
    }

    #[test]
    fn test_exhaustion_redistributes() {
        let args = RunnerArgs::with_tests(64).resolve();
        let mut scheduler = Scheduler::new(&args);
        scheduler.next().unwrap();
        scheduler.notify_exhausted(CaseKind::Edge);
        scheduler.notify_exhausted(CaseKind::Simple);
        scheduler.notify_exhausted(CaseKind::Mixed);
        let rest = drain(&mut scheduler);
        assert_eq!(rest.len(), 63);
        assert!(rest
            .iter()
            .all(|t| matches!(t.kind, TestKind::Generated | TestKind::Regression)));
        assert_eq!(scheduler.counts().edge, 1);
    }

    #[test]
    fn test_retract_does_not_count_or_advance() {
        let args = RunnerArgs {
            num_tests: Some(10),
            max_only_edge_case_tests: Some(0),
            max_only_simple_case_tests: Some(0),
            num_simple_edge_mixed_tests: Some(0),
            num_regression_tests: Some(0),
            ..RunnerArgs::default()
        }
        .resolve();
        let mut scheduler = Scheduler::new(&args);
        scheduler.next().unwrap();
        let second = scheduler.next().unwrap();
        scheduler.retract();
        assert_eq!(scheduler.tests_run(), 1);
        let again = scheduler.next().unwrap();
        assert_eq!(again, second);
    }

    #[test]
    fn test_retiring_edge_and_simple_retires_mixed() {
        let mut scheduler = Scheduler::new(&RunnerArgs::with_tests(64).resolve());
        scheduler.notify_exhausted(CaseKind::Edge);
        assert_eq!(scheduler.next().map(|t| t.kind), Ok(TestKind::Simple));
        scheduler.notify_exhausted(CaseKind::Simple);
        assert!(drain(&mut scheduler)
            .iter()
            .all(|t| matches!(t.kind, TestKind::Generated | TestKind::Regression)));
        assert_eq!(scheduler.counts().mixed, 0);
    }

    #[test]
    fn test_simple_runs_before_mixed() {
        let tests = drain(&mut Scheduler::new(&RunnerArgs::with_tests(64).resolve()));
        let kinds: Vec<TestKind> = tests.iter().take(12).map(|t| t.kind).collect();
        let first_mixed = kinds.iter().position(|k| *k == TestKind::Mixed);
        let last_simple = kinds.iter().rposition(|k| *k == TestKind::Simple);
        assert_eq!(&kinds[..4], &[TestKind::Edge; 4]);
        assert!(last_simple < first_mixed, "{:?}", kinds);
    }

    #[test]
    fn test_closing_edge_and_simple_keeps_mixed() {
        let mut scheduler = Scheduler::new(&RunnerArgs::with_tests(64).resolve());
        scheduler.close(CaseKind::Edge);
        scheduler.close(CaseKind::Simple);
        assert_eq!(scheduler.next().map(|t| t.kind), Ok(TestKind::Mixed));
        drain(&mut scheduler);
        let counts = scheduler.counts();
        assert_eq!((counts.edge, counts.simple, counts.mixed), (0, 0, 4));
    }

    #[test]
    fn test_all_categories_retired_is_exhausted() {
        let mut scheduler = Scheduler::new(&RunnerArgs::with_tests(64).resolve());
        for kind in [CaseKind::Edge, CaseKind::Simple, CaseKind::Mixed, CaseKind::Generated] {
            scheduler.notify_exhausted(kind);
        }
        assert!(scheduler.is_exhausted());
        assert_eq!(scheduler.next(), Err(ScheduleError::Exhausted));
    }
}
