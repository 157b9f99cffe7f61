//! The public contract a submission has to provide.

use crate::error::{GradeError, GradeResult};
use crate::model::{Class, ExecutableShape, FieldShape, MethodDef, Signature};
use std::collections::BTreeSet;
use std::sync::Arc;

/// One operation of the contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// Lookup key; constructors use the `<init>` name.
    pub signature: Signature,
    /// Whether the operation needs no receiver.
    pub is_static: bool,
    /// Rendered declaration, used in messages.
    pub rendered: String,
}

impl Operation {
    fn method(method: &MethodDef) -> Self {
        Self {
            signature: method.signature(),
            is_static: method.is_static(),
            rendered: ExecutableShape::method(method).render(),
        }
    }

    /// Whether this is a constructor.
    pub fn is_constructor(&self) -> bool {
        self.signature.is_constructor()
    }
}

/// What a submission must structurally provide, derived once from the
/// reference class when a question is loaded.
#[derive(Debug, Clone)]
pub struct ContractSpec {
    class: String,
    operations: Vec<Operation>,
    solutions: Vec<Signature>,
    fields: Vec<FieldShape>,
}

impl ContractSpec {
    /// Derive the contract of `class`.
    ///
    /// Public constructors and methods declared on the class form the
    /// operation list, minus `excluded` members (helpers and the solutions
    /// of other names). `solutions` must name public methods of the class.
    pub fn derive(
        question: &str,
        class: &Arc<Class>,
        solutions: &[Signature],
        excluded: &BTreeSet<Signature>,
        excluded_fields: &BTreeSet<String>,
    ) -> GradeResult<Self> {
        if solutions.is_empty() {
            return Err(GradeError::configuration(question, "no eligible solution operation"));
        }
        let def = class.def();
        let simple = def.simple_name();

        let mut operations: Vec<Operation> = class
            .constructors()
            .iter()
            .filter(|c| c.modifiers.is_public())
            .filter(|c| !excluded.contains(&c.signature()))
            .map(|c| Operation {
                signature: c.signature(),
                is_static: true,
                rendered: ExecutableShape::constructor(simple, c).render(),
            })
            .collect();
        operations.extend(
            def.methods
                .iter()
                .filter(|m| m.modifiers.is_public())
                .filter(|m| !excluded.contains(&m.signature()))
                .map(Operation::method),
        );

        for solution in solutions {
            match class.method(solution) {
                Some(m) if m.modifiers.is_public() => {}
                Some(_) => {
                    return Err(GradeError::configuration(
                        question,
                        format!("solution {} must be public", solution),
                    ))
                }
                None => {
                    return Err(GradeError::configuration(
                        question,
                        format!("solution {} is not declared on {}", solution, class.name()),
                    ))
                }
            }
            if excluded.contains(solution) {
                return Err(GradeError::configuration(
                    question,
                    format!("solution {} is also declared a helper", solution),
                ));
            }
        }

        let fields = def
            .fields
            .iter()
            .filter(|f| f.modifiers.is_public())
            .filter(|f| !excluded_fields.contains(&f.name))
            .map(FieldShape::from)
            .collect();

        Ok(Self {
            class: class.name().to_string(),
            operations,
            solutions: solutions.to_vec(),
            fields,
        })
    }

    /// Reference class name.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Testable operations, constructors first, in declaration order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// The solution operations under test.
    pub fn solutions(&self) -> &[Signature] {
        &self.solutions
    }

    /// Required public fields.
    pub fn fields(&self) -> &[FieldShape] {
        &self.fields
    }

    /// Operation by signature.
    pub fn operation(&self, signature: &Signature) -> Option<&Operation> {
        self.operations.iter().find(|op| op.signature == *signature)
    }

    /// Whether every solution operation is static, so runs need no receivers.
    pub fn is_static_only(&self) -> bool {
        self.solutions
            .iter()
            .all(|s| self.operation(s).is_some_and(|op| op.is_static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassDef, ClassSpace, ConstructorDef, FieldDef, Modifier, TypeRef};

    fn class() -> Arc<Class> {
        let space = ClassSpace::new("reference");
        space
            .define(
                ClassDef::public_class("Stack")
                    .field(FieldDef::public("size", TypeRef::Int))
                    .field(FieldDef::new("items", TypeRef::array(TypeRef::Int)).with(Modifier::Private))
                    .constructor(ConstructorDef::public())
                    .method(MethodDef::public("push").param(TypeRef::Int))
                    .method(MethodDef::public("pop").returns(TypeRef::Int))
                    .method(MethodDef::public_static("check").returns(TypeRef::Boolean))
                    .method(MethodDef::new("grow").with(Modifier::Private)),
            )
            .unwrap()
    }

    #[test]
    fn test_operations_skip_private_and_helpers() {
        let helpers: BTreeSet<Signature> = [Signature::new("check", [])].into_iter().collect();
        let spec = ContractSpec::derive(
            "Stack",
            &class(),
            &[Signature::new("pop", [])],
            &helpers,
            &BTreeSet::new(),
        )
        .unwrap();
        let names: Vec<&str> = spec.operations().iter().map(|op| op.signature.name.as_str()).collect();
        assert_eq!(names, vec!["<init>", "push", "pop"]);
        assert_eq!(spec.fields().len(), 1);
        assert!(!spec.is_static_only());
        assert_eq!(spec.operations()[2].rendered, "public int pop()");
    }

    #[test]
    fn test_solution_must_exist() {
        let err = ContractSpec::derive(
            "Stack",
            &class(),
            &[Signature::new("peek", [])],
            &BTreeSet::new(),
            &BTreeSet::new(),
        )
        .unwrap_err();
        assert!(matches!(err, GradeError::Configuration { .. }));
        assert!(ContractSpec::derive("Stack", &class(), &[], &BTreeSet::new(), &BTreeSet::new()).is_err());
    }

    #[test]
    fn test_static_solution() {
        let spec = ContractSpec::derive(
            "Stack",
            &class(),
            &[Signature::new("check", [])],
            &BTreeSet::new(),
            &BTreeSet::new(),
        )
        .unwrap();
        assert!(spec.is_static_only());
    }
}
