//! Run results on disk.

use diffgrade::runner::ResultFileError;
use diffgrade::{Catalog, RunOptions, RunResult, RunnerArgs};
use serde_json::Value as Json;

fn graded(question: &str, submission: &str) -> RunResult {
    let catalog = Catalog::builtin();
    let entry = catalog.get(question).unwrap();
    let loaded = entry.load("").unwrap();
    let space = entry.build_submission(submission).unwrap();
    let options = RunOptions::default().with_args(RunnerArgs::with_tests(32));
    loaded.run(&space, loaded.class(), 17, &options).unwrap()
}

#[test]
fn test_save_and_load() {
    let result = graded("counter", "stale");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.json");
    result.save(&path).unwrap();

    let loaded = RunResult::load(&path).unwrap();
    assert_eq!(loaded, result);
    assert_eq!(loaded.summary(), result.summary());
}

#[test]
fn test_load_reports_bad_files() {
    let dir = tempfile::tempdir().unwrap();
    let missing = RunResult::load(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(missing, ResultFileError::Read(_)));
    assert!(missing.to_string().starts_with("Failed to read result file"));

    let garbage = dir.path().join("garbage.json");
    std::fs::write(&garbage, "{ not json").unwrap();
    let err = RunResult::load(&garbage).unwrap_err();
    assert!(matches!(err, ResultFileError::Parse(_)));
    assert!(err.to_string().starts_with("Failed to parse result JSON"));
}

#[test]
fn test_top_level_keys_are_camel_case() {
    let result = graded("adder", "correct");
    let json: Json = serde_json::from_str(&result.to_json().unwrap()).unwrap();
    for key in [
        "seed",
        "solutionName",
        "referenceClass",
        "submissionClass",
        "startTime",
        "endTime",
        "timedOut",
        "counts",
        "structuralResult",
        "steps",
    ] {
        assert!(json.get(key).is_some(), "missing {}", key);
    }
    assert_eq!(json["referenceClass"], "Adder");
    assert_eq!(json["solutionName"], "");
    assert!(json["endTime"].as_u64().unwrap() >= json["startTime"].as_u64().unwrap());
}

#[test]
fn test_step_schema() {
    let result = graded("greeter", "shouting");
    let json: Json = serde_json::from_str(&result.to_json().unwrap()).unwrap();
    let step = &json["steps"][0];
    assert_eq!(step["testNumber"], 1);
    assert!(step["kind"].is_string());
    assert!(step["arguments"].is_array());
    assert_eq!(step["succeeded"], false);
    assert!(step["referenceOutcome"]["stdout"].is_string());
    assert!(step["verificationError"].is_string());
    // Static operations record null receivers.
    assert!(step.get("receivers").is_some());
    assert!(step["receivers"].is_null());
}

#[test]
fn test_counts_schema() {
    let result = graded("counter", "correct");
    let json: Json = serde_json::from_str(&result.to_json().unwrap()).unwrap();
    let counts = &json["counts"];
    let total = counts["total"].as_u64().unwrap();
    let sum: u64 = ["edge", "simple", "mixed", "generated", "regression"]
        .iter()
        .map(|k| counts[*k].as_u64().unwrap())
        .sum();
    assert_eq!(total, 32);
    assert_eq!(sum, total);
    assert!(json["steps"][0]["receivers"]["reference"].as_str().unwrap().starts_with("Counter{"));
}
