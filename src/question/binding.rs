//! Matching contract operations to a submission class.

use super::contract::{ContractSpec, Operation};
use crate::error::{GradeError, GradeResult, MissingMember};
use crate::model::{ClassSpace, Signature};
use std::sync::Arc;

/// A contract operation and the submission member that implements it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundOperation {
    /// The reference operation.
    pub reference: Operation,
    /// Matching submission signature.
    pub submission: Signature,
}

/// One-to-one mapping from contract operations to submission members.
#[derive(Debug, Clone)]
pub struct SubmissionBinding {
    class: String,
    operations: Vec<BoundOperation>,
}

impl SubmissionBinding {
    /// Bind every operation and field of `contract` to `class` in `space`.
    ///
    /// Fails with a class design error naming the first missing class,
    /// constructor, method, or field.
    pub fn bind(contract: &ContractSpec, space: &Arc<ClassSpace>, class: &str) -> GradeResult<Self> {
        let submission = space
            .class(class)
            .ok_or_else(|| GradeError::ClassDesign(MissingMember::Class(class.to_string())))?;

        let mut operations = Vec::with_capacity(contract.operations().len());
        for op in contract.operations() {
            let found = if op.is_constructor() {
                submission
                    .constructor(&op.signature.params)
                    .is_some_and(|c| c.modifiers.is_public())
            } else {
                submission
                    .method(&op.signature)
                    .is_some_and(|m| m.modifiers.is_public() && m.is_static() == op.is_static)
            };
            if !found {
                let missing = if op.is_constructor() {
                    MissingMember::Constructor {
                        class: class.to_string(),
                        signature: op.rendered.clone(),
                    }
                } else {
                    MissingMember::Method {
                        class: class.to_string(),
                        signature: op.rendered.clone(),
                    }
                };
                return Err(GradeError::ClassDesign(missing));
            }
            operations.push(BoundOperation {
                reference: op.clone(),
                submission: op.signature.clone(),
            });
        }

        for field in contract.fields() {
            let present = submission.field(&field.name).is_some_and(|f| {
                f.modifiers.is_public() && f.ty == field.ty && f.modifiers.is_static() == field.modifiers.is_static()
            });
            if !present {
                return Err(GradeError::ClassDesign(MissingMember::Field {
                    class: class.to_string(),
                    name: field.name.clone(),
                }));
            }
        }

        Ok(Self {
            class: class.to_string(),
            operations,
        })
    }

    /// Submission class name.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Bound operations, in contract order.
    pub fn operations(&self) -> &[BoundOperation] {
        &self.operations
    }

    /// Submission signature bound to a reference operation.
    pub fn submission_for(&self, reference: &Signature) -> Option<&Signature> {
        self.operations
            .iter()
            .find(|b| b.reference.signature == *reference)
            .map(|b| &b.submission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassDef, ConstructorDef, FieldDef, MethodDef, TypeRef};
    use std::collections::BTreeSet;

    fn define(label: &str, with_pop: bool, with_ctor: bool) -> Arc<ClassSpace> {
        let space = ClassSpace::new(label);
        let mut def = ClassDef::public_class("Stack")
            .field(FieldDef::public("size", TypeRef::Int))
            .method(MethodDef::public("push").param(TypeRef::Int));
        if with_ctor {
            def = def.constructor(ConstructorDef::public().param(TypeRef::Int));
        }
        if with_pop {
            def = def.method(MethodDef::public("pop").returns(TypeRef::Int));
        }
        space.define(def).unwrap();
        space
    }

    fn contract() -> ContractSpec {
        let reference = define("reference", true, true);
        let class = reference.class("Stack").unwrap();
        ContractSpec::derive(
            "Stack",
            &class,
            &[Signature::new("pop", [])],
            &BTreeSet::new(),
            &BTreeSet::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_complete_submission_binds() {
        let binding = SubmissionBinding::bind(&contract(), &define("submission", true, true), "Stack").unwrap();
        assert_eq!(binding.operations().len(), 3);
        assert!(binding.submission_for(&Signature::new("pop", [])).is_some());
    }

    #[test]
    fn test_missing_method_is_named() {
        let err = SubmissionBinding::bind(&contract(), &define("submission", false, true), "Stack").unwrap_err();
        assert_eq!(
            err.to_string(),
            "class design error: Submission class Stack didn't provide method public int pop()"
        );
    }

    #[test]
    fn test_missing_constructor_is_distinguished() {
        let err = SubmissionBinding::bind(&contract(), &define("submission", true, false), "Stack").unwrap_err();
        assert!(matches!(
            err,
            GradeError::ClassDesign(MissingMember::Constructor { .. })
        ));
    }

    #[test]
    fn test_missing_class() {
        let err = SubmissionBinding::bind(&contract(), &define("submission", true, true), "Queue").unwrap_err();
        assert!(matches!(err, GradeError::ClassDesign(MissingMember::Class(_))));
    }
}
