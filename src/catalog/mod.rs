//! Named questions and submissions.
//!
//! A catalog maps question names to a reference declaration plus a set of
//! named submission spaces. The CLI grades catalog entries; library users
//! can register their own.

pub mod builtin;

use crate::error::GradeResult;
use crate::model::ClassSpace;
use crate::question::{Question, QuestionConfig};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds a question's declaration table.
pub type ConfigFn = fn() -> QuestionConfig;

/// Builds one submission space.
pub type SubmissionFn = fn() -> Arc<ClassSpace>;

/// One question and its known submissions.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    name: String,
    description: String,
    config: ConfigFn,
    submissions: BTreeMap<String, SubmissionFn>,
}

impl CatalogEntry {
    /// Entry with no submissions yet.
    pub fn new(name: impl Into<String>, description: impl Into<String>, config: ConfigFn) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            config,
            submissions: BTreeMap::new(),
        }
    }

    /// Add a named submission.
    #[must_use]
    pub fn submission(mut self, name: impl Into<String>, build: SubmissionFn) -> Self {
        self.submissions.insert(name.into(), build);
        self
    }

    /// Entry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// One-line description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// A fresh declaration table.
    pub fn config(&self) -> QuestionConfig {
        (self.config)()
    }

    /// Load the question for `solution` (empty for the default solution).
    pub fn load(&self, solution: &str) -> GradeResult<Question> {
        Question::load(self.config(), solution)
    }

    /// Submission names, sorted.
    pub fn submission_names(&self) -> impl Iterator<Item = &str> {
        self.submissions.keys().map(String::as_str)
    }

    /// A fresh space for the named submission.
    pub fn build_submission(&self, name: &str) -> Option<Arc<ClassSpace>> {
        self.submissions.get(name).map(|build| build())
    }
}

/// Registry of catalog entries, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding the bundled demo questions.
    pub fn builtin() -> Self {
        builtin::entries()
            .into_iter()
            .fold(Self::new(), |catalog, entry| catalog.with(entry))
    }

    /// Add or replace an entry.
    #[must_use]
    pub fn with(mut self, entry: CatalogEntry) -> Self {
        self.entries.insert(entry.name.clone(), entry);
        self
    }

    /// Entry by name.
    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.get(name)
    }

    /// All entries, sorted by name.
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_entries() {
        let catalog = Catalog::builtin();
        let names: Vec<&str> = catalog.entries().map(CatalogEntry::name).collect();
        assert_eq!(names, vec!["adder", "boxer", "counter", "greeter", "root"]);
        let adder = catalog.get("adder").unwrap();
        assert!(adder.submission_names().any(|n| n == "commuted"));
        assert!(adder.build_submission("nope").is_none());
    }

    #[test]
    fn test_every_builtin_reference_verifies() {
        for entry in Catalog::builtin().entries() {
            let question = entry.load("");
            assert!(question.is_ok(), "{}: {:?}", entry.name(), question.err());
        }
    }
}
