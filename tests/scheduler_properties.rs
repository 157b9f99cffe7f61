//! Property tests for test scheduling and input generation bounds.

use diffgrade::generators::defaults;
use diffgrade::schedule::{CaseKind, RunnerArgs, Scheduler, TestKind};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn args(num_tests: u32, max_complexity: u32, quotas: u32) -> RunnerArgs {
    RunnerArgs {
        num_tests: Some(num_tests),
        max_only_edge_case_tests: Some(quotas),
        max_only_simple_case_tests: Some(quotas),
        num_simple_edge_mixed_tests: Some(quotas),
        num_regression_tests: Some(quotas),
        max_complexity: Some(max_complexity),
        ..RunnerArgs::default()
    }
}

fn drain(scheduler: &mut Scheduler) -> Vec<(TestKind, u32)> {
    let mut out = Vec::new();
    while let Ok(test) = scheduler.next() {
        out.push((test.kind, test.complexity));
    }
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_total_matches_num_tests(num_tests in 0u32..2000, max_complexity in 0u32..500, quotas in 0u32..64) {
        let resolved = args(num_tests, max_complexity, quotas).resolve();
        let mut scheduler = Scheduler::new(&resolved);
        let tests = drain(&mut scheduler);
        prop_assert_eq!(tests.len() as u32, num_tests);
        prop_assert_eq!(scheduler.counts().total(), num_tests);
        prop_assert!(scheduler.is_exhausted());
    }

    #[test]
    fn prop_scaled_complexity_never_decreases(num_tests in 1u32..2000, max_complexity in 0u32..500) {
        let resolved = RunnerArgs { max_complexity: Some(max_complexity), ..RunnerArgs::with_tests(num_tests) }.resolve();
        let mut scheduler = Scheduler::new(&resolved);
        let generated: Vec<u32> = drain(&mut scheduler)
            .into_iter()
            .filter(|(kind, _)| matches!(kind, TestKind::Generated | TestKind::Regression))
            .map(|(_, complexity)| complexity)
            .collect();
        for pair in generated.windows(2) {
            prop_assert!(pair[0] <= pair[1], "{:?}", generated);
        }
        for complexity in &generated {
            prop_assert!(*complexity <= max_complexity);
        }
    }

    #[test]
    fn prop_declared_cases_carry_zero_complexity(num_tests in 0u32..1000, quotas in 0u32..32) {
        let resolved = args(num_tests, 100, quotas).resolve();
        let mut scheduler = Scheduler::new(&resolved);
        for (kind, complexity) in drain(&mut scheduler) {
            if matches!(kind, TestKind::Edge | TestKind::Simple | TestKind::Mixed) {
                prop_assert_eq!(complexity, 0);
            }
        }
    }

    #[test]
    fn prop_retired_category_never_returns(num_tests in 1u32..1000, quotas in 1u32..32, after in 0u32..32) {
        let resolved = args(num_tests, 100, quotas).resolve();
        let mut scheduler = Scheduler::new(&resolved);
        for _ in 0..after {
            if scheduler.next().is_err() {
                break;
            }
        }
        scheduler.notify_exhausted(CaseKind::Edge);
        scheduler.notify_exhausted(CaseKind::Simple);
        for (kind, _) in drain(&mut scheduler) {
            prop_assert!(matches!(kind, TestKind::Generated | TestKind::Regression), "{:?}", kind);
        }
    }

    #[test]
    fn prop_retiring_everything_exhausts(num_tests in 1u32..1000, quotas in 0u32..32) {
        let resolved = args(num_tests, 100, quotas).resolve();
        let mut scheduler = Scheduler::new(&resolved);
        scheduler.notify_exhausted(CaseKind::Edge);
        scheduler.notify_exhausted(CaseKind::Simple);
        scheduler.notify_exhausted(CaseKind::Mixed);
        scheduler.notify_exhausted(CaseKind::Generated);
        prop_assert!(scheduler.is_exhausted());
        prop_assert!(scheduler.next().is_err());
    }

    #[test]
    fn prop_array_length_bounded(seed: u64, complexity in 0u32..1000, max_length in 0u32..300) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let len = defaults::array_length(complexity, max_length, &mut rng);
        if complexity == 0 || max_length == 0 {
            prop_assert_eq!(len, 0);
        } else {
            prop_assert!(len >= 1);
            prop_assert!(len as u32 <= complexity.min(max_length));
        }
    }

    #[test]
    fn prop_int_within_complexity(seed: u64, complexity in 0u32..10_000) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let value = defaults::int(complexity, &mut rng);
        prop_assert!(value.unsigned_abs() <= complexity);
    }
}
