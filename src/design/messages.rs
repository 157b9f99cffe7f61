//! Human-facing explanations of structural mismatches.
//!
//! Scalar categories render as three lines:
//!
//! ```text
//! Class name mismatch;
//! Expected: Adder
//! Found:    Summer
//! ```
//!
//! Member categories list what is missing and what is unexpected. When both
//! lists are non-empty no attempt is made to pair them up; both are dumped.

use super::{AnalysisType, CdaMatcher};
use crate::model::ClassKind;

/// Text shown when a category matched.
pub const NO_ERROR_MSG: &str = "All good!";

/// Explain one finding.
pub fn message(matcher: &CdaMatcher, reference_kind: ClassKind) -> String {
    if matcher.matched {
        return format!("{}: {}", matcher.category, NO_ERROR_MSG);
    }
    let reference = &matcher.reference;
    let submission = &matcher.submission;
    match matcher.category {
        AnalysisType::Name => simple("Class name", &reference.join(""), &submission.join("")),
        AnalysisType::Kind => simple("Class kind", &reference.join(""), &submission.join("")),
        AnalysisType::Modifiers => simple(
            "Class modifiers",
            &reference.join(" "),
            &submission.join(" "),
        ),
        AnalysisType::TypeParams => simple(
            "Class type parameter",
            &format!("<{}>", reference.join(", ")),
            &format!("<{}>", submission.join(", ")),
        ),
        AnalysisType::Superclass => {
            let expected = match reference.first() {
                Some(name) => format!("extends {}", name),
                None => "No class to be extended".to_string(),
            };
            let found = match submission.first() {
                Some(name) => format!("extends {}", name),
                None => "No class was extended".to_string(),
            };
            simple("Superclass", &expected, &found)
        }
        AnalysisType::Interfaces => {
            let verb = if reference_kind == ClassKind::Interface {
                "extend"
            } else {
                "implement"
            };
            let expected = if reference.is_empty() {
                format!("No interfaces to be {}ed", verb)
            } else {
                format!("{}s {}", verb, reference.join(", "))
            };
            let found = if submission.is_empty() {
                format!("No interfaces were {}ed", verb)
            } else {
                format!("{}s {}", verb, submission.join(", "))
            };
            simple("Interface", &expected, &found)
        }
        AnalysisType::Fields => api_mismatch(reference, submission, "field", "s"),
        AnalysisType::Methods => api_mismatch(reference, submission, "method", "s"),
        AnalysisType::InnerClasses => api_mismatch(reference, submission, "inner class", "es"),
    }
}

fn simple(category: &str, expected: &str, found: &str) -> String {
    format!("{} mismatch;\nExpected: {}\nFound:    {}", category, expected, found)
}

fn api_mismatch(reference: &[String], submission: &[String], noun: &str, plural: &str) -> String {
    let noun_for = |count: usize| {
        if count == 1 {
            noun.to_string()
        } else {
            format!("{}{}", noun, plural)
        }
    };
    let missing: Vec<&String> = reference.iter().filter(|r| !submission.contains(r)).collect();
    let extra: Vec<&String> = submission.iter().filter(|s| !reference.contains(s)).collect();
    let list = |items: &[&String]| {
        items
            .iter()
            .map(|item| format!("  {}", item))
            .collect::<Vec<_>>()
            .join("\n")
    };

    match (missing.is_empty(), extra.is_empty()) {
        (true, false) => {
            let article = if extra.len() == 1 { "an " } else { "" };
            format!(
                "Found {}unexpected public {}:\n{}",
                article,
                noun_for(extra.len()),
                list(&extra)
            )
        }
        (false, true) => {
            let quantity = if missing.len() == 1 { "another" } else { "more" };
            format!(
                "Expected {} public {}:\n{}",
                quantity,
                noun_for(missing.len()),
                list(&missing)
            )
        }
        (false, false) => format!(
            "Expected public {}:\n{}\nFound public {}:\n{}",
            noun_for(missing.len()),
            list(&missing),
            noun_for(extra.len()),
            list(&extra)
        ),
        // Same sets in a different order; only reachable for order-sensitive lists.
        (true, true) => format!(
            "Expected public {} in order:\n{}\nFound:\n{}",
            noun_for(reference.len()),
            list(&reference.iter().collect::<Vec<_>>()),
            list(&submission.iter().collect::<Vec<_>>())
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_simple_message() {
        let matcher = CdaMatcher::new(AnalysisType::Name, strings(&["Adder"]), strings(&["Summer"]));
        assert_eq!(
            message(&matcher, ClassKind::Class),
            "Class name mismatch;\nExpected: Adder\nFound:    Summer"
        );
    }

    #[test]
    fn test_matched_message() {
        let matcher = CdaMatcher::new(AnalysisType::Fields, vec![], vec![]);
        assert_eq!(message(&matcher, ClassKind::Class), "Fields: All good!");
    }

    #[test]
    fn test_superclass_and_interface_wording() {
        let matcher = CdaMatcher::new(AnalysisType::Superclass, vec![], strings(&["Base"]));
        assert_eq!(
            message(&matcher, ClassKind::Class),
            "Superclass mismatch;\nExpected: No class to be extended\nFound:    extends Base"
        );
        let matcher = CdaMatcher::new(AnalysisType::Interfaces, strings(&["A", "B"]), vec![]);
        assert_eq!(
            message(&matcher, ClassKind::Interface),
            "Interface mismatch;\nExpected: extends A, B\nFound:    No interfaces were extended"
        );
    }

    #[test]
    fn test_member_lists() {
        let only_extra = CdaMatcher::new(
            AnalysisType::Methods,
            strings(&["public int add(int, int)"]),
            strings(&["public int add(int, int)", "public void reset()"]),
        );
        assert_eq!(
            message(&only_extra, ClassKind::Class),
            "Found an unexpected public method:\n  public void reset()"
        );

        let only_missing = CdaMatcher::new(
            AnalysisType::Fields,
            strings(&["public int a", "public int b"]),
            vec![],
        );
        assert_eq!(
            message(&only_missing, ClassKind::Class),
            "Expected more public fields:\n  public int a\n  public int b"
        );

        let both = CdaMatcher::new(
            AnalysisType::InnerClasses,
            strings(&["Node"]),
            strings(&["Entry", "Link"]),
        );
        assert_eq!(
            message(&both, ClassKind::Class),
            "Expected public inner class:\n  Node\nFound public inner classes:\n  Entry\n  Link"
        );
    }
}
