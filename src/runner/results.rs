//! Run results and their JSON form.

use super::verify::Outcome;
use crate::design::CdaResult;
use crate::model::{Thrown, Value};
use crate::schedule::{TestCounts, TestKind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// How many levels of object fields a rendered value shows.
const RENDER_DEPTH: usize = 3;

/// Failure to read back a saved result.
#[derive(Debug, Error)]
pub enum ResultFileError {
    /// The file could not be read.
    #[error("Failed to read result file: {0}")]
    Read(#[from] std::io::Error),
    /// The file is not a result document.
    #[error("Failed to parse result JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Milliseconds since the Unix epoch.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Render a value for reports. Objects show their public fields.
pub fn render(value: &Value) -> String {
    render_at(value, RENDER_DEPTH)
}

fn render_at(value: &Value, depth: usize) -> String {
    match value {
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(|v| render_at(v, depth)).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(obj) if depth > 0 => {
            let fields: Vec<String> = obj
                .public_fields()
                .iter()
                .map(|(name, v)| format!("{}={}", name, render_at(v, depth - 1)))
                .collect();
            format!("{}{{{}}}", crate::model::source_name(obj.class_name()), fields.join(", "))
        }
        other => other.to_string(),
    }
}

/// Serializable view of an [`Outcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeReport {
    /// Receiver state after the call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    /// Returned value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returned: Option<String>,
    /// Thrown failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threw: Option<Thrown>,
    /// Captured standard output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    /// Captured standard error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl From<&Outcome> for OutcomeReport {
    fn from(outcome: &Outcome) -> Self {
        Self {
            receiver: outcome.receiver.as_ref().map(render),
            returned: outcome.returned().map(render),
            threw: outcome.threw().cloned(),
            stdout: outcome.stdout.clone(),
            stderr: outcome.stderr.clone(),
        }
    }
}

/// The receivers a step ran on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverReport {
    /// Reference receiver before the call.
    pub reference: String,
    /// Submission receiver before the call.
    pub submission: String,
}

/// One executed or discarded test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStep {
    /// One-based position in the run, discarded steps included.
    pub test_number: u32,
    /// Category the case came from.
    pub kind: TestKind,
    /// Generator complexity.
    pub complexity: u32,
    /// The precondition rejected the input.
    pub discarded: bool,
    /// Receivers, null for static operations.
    pub receivers: Option<ReceiverReport>,
    /// Reference arguments.
    pub arguments: Vec<String>,
    /// Both sides were judged equivalent.
    pub succeeded: bool,
    /// What the reference did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_outcome: Option<OutcomeReport>,
    /// What the submission did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_outcome: Option<OutcomeReport>,
    /// Why the outcomes were judged different.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_error: Option<String>,
}

impl TestStep {
    /// A counted step that did not succeed.
    pub fn is_failure(&self) -> bool {
        !self.discarded && !self.succeeded
    }
}

/// Aggregate counts for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCounts {
    /// Precondition rejections.
    pub discarded: u32,
    /// Counted tests.
    pub total: u32,
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

impl RunCounts {
    /// Counts from the scheduler plus the discard tally.
    pub fn new(counts: TestCounts, discarded: u32) -> Self {
        Self {
            discarded,
            total: counts.total(),
            edge: counts.edge,
            simple: counts.simple,
            mixed: counts.mixed,
            generated: counts.generated,
            regression: counts.regression,
        }
    }
}

/// Everything one run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    /// Random seed.
    pub seed: u64,
    /// Solution name; empty for the default solution.
    pub solution_name: String,
    /// Reference class.
    pub reference_class: String,
    /// Submission class.
    pub submission_class: String,
    /// Start, in milliseconds since the Unix epoch.
    pub start_time: u64,
    /// End, in milliseconds since the Unix epoch.
    pub end_time: u64,
    /// The run hit its time budget; steps so far are kept.
    pub timed_out: bool,
    /// Aggregate counts.
    pub counts: RunCounts,
    /// Structural check findings, when the check ran.
    pub structural_result: Option<CdaResult>,
    /// Executed and discarded steps, in order.
    pub steps: Vec<TestStep>,
}

impl RunResult {
    /// Counted steps that did not succeed.
    pub fn failed_steps(&self) -> impl Iterator<Item = &TestStep> {
        self.steps.iter().filter(|s| s.is_failure())
    }

    /// Counted steps that succeeded.
    pub fn passed_steps(&self) -> impl Iterator<Item = &TestStep> {
        self.steps.iter().filter(|s| !s.discarded && s.succeeded)
    }

    /// Whether the submission passed: no failing step, no timeout, and a
    /// matching structure when it was checked.
    pub fn passed(&self) -> bool {
        !self.timed_out
            && self.failed_steps().next().is_none()
            && self
                .structural_result
                .as_ref()
                .map_or(true, CdaResult::all_match)
    }

    /// Wall-clock duration in milliseconds.
    pub fn elapsed_millis(&self) -> u64 {
        self.end_time.saturating_sub(self.start_time)
    }

    /// One-line summary.
    pub fn summary(&self) -> String {
        format!(
            "{} passed, {} failed, {} discarded (total: {}){}",
            self.passed_steps().count(),
            self.failed_steps().count(),
            self.counts.discarded,
            self.counts.total,
            if self.timed_out { ", timed out" } else { "" }
        )
    }

    /// Pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write pretty JSON to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Read a result written by [`RunResult::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ResultFileError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassDef, ClassSpace, FieldDef, ObjectModel, TypeRef};

    fn step(test_number: u32, discarded: bool, succeeded: bool) -> TestStep {
        TestStep {
            test_number,
            kind: TestKind::Generated,
            complexity: 0,
            discarded,
            receivers: None,
            arguments: vec!["1".into()],
            succeeded,
            reference_outcome: None,
            submission_outcome: None,
            verification_error: None,
        }
    }

    fn result(steps: Vec<TestStep>) -> RunResult {
        RunResult {
            seed: 7,
            solution_name: String::new(),
            reference_class: "Adder".into(),
            submission_class: "Adder".into(),
            start_time: 10,
            end_time: 25,
            timed_out: false,
            counts: RunCounts {
                discarded: 1,
                total: 2,
                generated: 2,
                ..RunCounts::default()
            },
            structural_result: None,
            steps,
        }
    }

    #[test]
    fn test_summary_and_verdict() {
        let passing = result(vec![step(1, false, true), step(2, true, false), step(3, false, true)]);
        assert!(passing.passed());
        assert_eq!(passing.summary(), "2 passed, 0 failed, 1 discarded (total: 2)");
        assert_eq!(passing.elapsed_millis(), 15);

        let failing = result(vec![step(1, false, false)]);
        assert!(!failing.passed());
        assert_eq!(failing.failed_steps().count(), 1);
    }

    #[test]
    fn test_json_uses_camel_case() {
        let json = result(vec![step(1, false, true)]).to_json().unwrap();
        assert!(json.contains("\"solutionName\""));
        assert!(json.contains("\"timedOut\""));
        assert!(json.contains("\"testNumber\""));
        assert!(json.contains("\"structuralResult\""));
        assert!(!json.contains("verificationError"));
    }

    #[test]
    fn test_static_step_has_null_receivers() {
        let json: serde_json::Value = serde_json::from_str(&result(vec![step(1, false, true)]).to_json().unwrap()).unwrap();
        let step = &json["steps"][0];
        assert!(step.get("receivers").is_some());
        assert!(step["receivers"].is_null());
        let back: RunResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.steps[0].receivers, None);
    }

    #[test]
    fn test_load_error_kinds() {
        let err = RunResult::load("/nonexistent/diffgrade/run.json").unwrap_err();
        assert!(matches!(err, ResultFileError::Read(_)));
        assert!(err.to_string().starts_with("Failed to read result file"));

        let parse = serde_json::from_str::<RunResult>("[]").unwrap_err();
        let err = ResultFileError::from(parse);
        assert!(err.to_string().starts_with("Failed to parse result JSON"));
    }

    #[test]
    fn test_render_objects() {
        let space = ClassSpace::new("test");
        space
            .define(ClassDef::public_class("Pair$Node").field(FieldDef::public("value", TypeRef::Int)))
            .unwrap();
        let node = space.construct("Pair$Node", &[], vec![]).unwrap();
        assert_eq!(render(&node), "Pair.Node{value=0}");
        assert_eq!(render(&Value::from(vec![1, 2])), "[1, 2]");
    }
}
