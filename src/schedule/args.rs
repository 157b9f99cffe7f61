//! Run sizing arguments.

use serde::{Deserialize, Serialize};

/// Default total number of counted tests.
pub const DEFAULT_NUM_TESTS: u32 = 1024;
/// Default number of precondition rejections before a run gives up drawing.
pub const DEFAULT_MAX_DISCARDS: u32 = 1024;
/// Edge, simple, mixed, and regression quotas default to this fraction of the total.
pub const DEFAULT_CASE_FRACTION: u32 = 16;
/// Default upper bound on generator complexity.
pub const DEFAULT_MAX_COMPLEXITY: u32 = 100;
/// Default upper bound on generated array lengths.
pub const DEFAULT_MAX_ARRAY_LENGTH: u32 = 256;
/// Default receiver pool size.
pub const DEFAULT_RECEIVER_COUNT: u32 = 32;
/// Default number of construction attempts per wanted receiver.
pub const DEFAULT_MAX_RECEIVER_RETRIES: u32 = 8;

/// Partially specified run arguments. Unset fields fall back to a base set
/// (see [`RunnerArgs::apply_over`]) and finally to defaults derived from
/// `num_tests` (see [`RunnerArgs::resolve`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunnerArgs {
    /// Total counted tests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_tests: Option<u32>,
    /// Rejections tolerated before drawing stops.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_discards: Option<u32>,
    /// Cap on edge-case tests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_only_edge_case_tests: Option<u32>,
    /// Cap on simple-case tests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_only_simple_case_tests: Option<u32>,
    /// Cap on mixed edge-and-simple tests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_simple_edge_mixed_tests: Option<u32>,
    /// Regression test quota.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_regression_tests: Option<u32>,
    /// Largest complexity handed to generators.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_complexity: Option<u32>,
    /// Largest generated array length.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_array_length: Option<u32>,
    /// Ready receiver pairs wanted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_count: Option<u32>,
    /// Construction attempts allowed per wanted receiver pair.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_receiver_retries: Option<u32>,
}

impl RunnerArgs {
    /// Only the test count set.
    pub fn with_tests(num_tests: u32) -> Self {
        Self {
            num_tests: Some(num_tests),
            ..Self::default()
        }
    }

    /// Fill unset fields from `base`.
    #[must_use]
    pub fn apply_over(&self, base: &RunnerArgs) -> RunnerArgs {
        RunnerArgs {
            num_tests: self.num_tests.or(base.num_tests),
            max_discards: self.max_discards.or(base.max_discards),
            max_only_edge_case_tests: self
                .max_only_edge_case_tests
                .or(base.max_only_edge_case_tests),
            max_only_simple_case_tests: self
                .max_only_simple_case_tests
                .or(base.max_only_simple_case_tests),
            num_simple_edge_mixed_tests: self
                .num_simple_edge_mixed_tests
                .or(base.num_simple_edge_mixed_tests),
            num_regression_tests: self.num_regression_tests.or(base.num_regression_tests),
            max_complexity: self.max_complexity.or(base.max_complexity),
            max_array_length: self.max_array_length.or(base.max_array_length),
            receiver_count: self.receiver_count.or(base.receiver_count),
            max_receiver_retries: self.max_receiver_retries.or(base.max_receiver_retries),
        }
    }

    /// Concrete values, with defaults for everything unset.
    pub fn resolve(&self) -> ResolvedArgs {
        let num_tests = self.num_tests.unwrap_or(DEFAULT_NUM_TESTS);
        let fraction = num_tests / DEFAULT_CASE_FRACTION;
        ResolvedArgs {
            num_tests,
            max_discards: self.max_discards.unwrap_or(DEFAULT_MAX_DISCARDS),
            max_only_edge_case_tests: self.max_only_edge_case_tests.unwrap_or(fraction),
            max_only_simple_case_tests: self.max_only_simple_case_tests.unwrap_or(fraction),
            num_simple_edge_mixed_tests: self.num_simple_edge_mixed_tests.unwrap_or(fraction),
            num_regression_tests: self.num_regression_tests.unwrap_or(fraction),
            max_complexity: self.max_complexity.unwrap_or(DEFAULT_MAX_COMPLEXITY),
            max_array_length: self.max_array_length.unwrap_or(DEFAULT_MAX_ARRAY_LENGTH),
            receiver_count: self.receiver_count.unwrap_or(DEFAULT_RECEIVER_COUNT),
            max_receiver_retries: self.max_receiver_retries.unwrap_or(DEFAULT_MAX_RECEIVER_RETRIES),
        }
    }
}

/// Fully resolved run arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedArgs {
    /// Total counted tests.
    pub num_tests: u32,
    /// Rejections tolerated before drawing stops.
    pub max_discards: u32,
    /// Cap on edge-case tests.
    pub max_only_edge_case_tests: u32,
    /// Cap on simple-case tests.
    pub max_only_simple_case_tests: u32,
    /// Cap on mixed tests.
    pub num_simple_edge_mixed_tests: u32,
    /// Regression test quota.
    pub num_regression_tests: u32,
    /// Largest complexity handed to generators.
    pub max_complexity: u32,
    /// Largest generated array length.
    pub max_array_length: u32,
    /// Ready receiver pairs wanted.
    pub receiver_count: u32,
    /// Construction attempts allowed per wanted receiver pair.
    pub max_receiver_retries: u32,
}

impl Default for ResolvedArgs {
    fn default() -> Self {
        RunnerArgs::default().resolve()
    }
}
