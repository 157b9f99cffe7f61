//! Category-by-category comparison of two class shapes.

use super::{AnalysisType, CdaMatcher, CdaOptions, CdaResult};
use crate::model::{source_name, ClassShape};

/// Compare `reference` against `submission`.
///
/// Reference members listed in `options` are left out of the field and
/// method categories; the submission's public members are all compared.
pub fn compare(reference: &ClassShape, submission: &ClassShape, options: &CdaOptions) -> CdaResult {
    let findings = AnalysisType::ALL
        .into_iter()
        .filter(|category| options.categories.contains(category))
        .map(|category| {
            CdaMatcher::new(
                category,
                view(category, reference, Some(options)),
                view(category, submission, None),
            )
        })
        .collect();

    CdaResult {
        reference: reference.name.clone(),
        submission: submission.name.clone(),
        reference_kind: reference.kind,
        findings,
    }
}

/// Rendered values of one category. Unordered categories come back sorted.
fn view(category: AnalysisType, shape: &ClassShape, exclusions: Option<&CdaOptions>) -> Vec<String> {
    match category {
        AnalysisType::Name => vec![source_name(shape.simple_name())],
        AnalysisType::Kind => vec![shape.kind.as_noun().to_string()],
        AnalysisType::Modifiers => shape.modifiers.keywords(),
        AnalysisType::TypeParams => shape.type_params.clone(),
        AnalysisType::Superclass => shape
            .superclass
            .iter()
            .map(|name| source_name(name))
            .collect(),
        AnalysisType::Interfaces => sorted(shape.interfaces.iter().map(|name| source_name(name))),
        AnalysisType::Fields => sorted(
            shape
                .public_fields()
                .filter(|f| exclusions.map_or(true, |o| !o.excluded_fields.contains(&f.name)))
                .map(|f| f.render()),
        ),
        AnalysisType::Methods => sorted(
            shape
                .public_executables()
                .filter(|e| {
                    exclusions.map_or(true, |o| !o.excluded_members.contains(&e.signature()))
                })
                .map(|e| e.render()),
        ),
        AnalysisType::InnerClasses => sorted(
            shape
                .inner_classes
                .iter()
                .map(|name| name.rsplit('$').next().unwrap_or(name).to_string()),
        ),
    }
}

fn sorted(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut items: Vec<String> = items.collect();
    items.sort();
    items
}
