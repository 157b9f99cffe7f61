//! Judging whether two outcomes are equivalent.

use crate::model::{ObjRef, ObjectModel, Signature, Thrown, TypeRef, Value};
use crate::question::VerifyFn;
use rand_chacha::ChaCha8Rng;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// How deep public-field comparison follows object references.
const FIELD_DEPTH: usize = 8;

/// What one side did for one test.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Receiver the operation ran on; `None` for static operations.
    pub receiver: Option<Value>,
    /// Arguments as passed.
    pub args: Vec<Value>,
    /// Returned value or thrown failure.
    pub result: Result<Value, Thrown>,
    /// Captured standard output, when output is verified.
    pub stdout: Option<String>,
    /// Captured standard error, when output is verified.
    pub stderr: Option<String>,
}

impl Outcome {
    /// Returned value, if the operation returned.
    pub fn returned(&self) -> Option<&Value> {
        self.result.as_ref().ok()
    }

    /// Thrown failure, if the operation threw.
    pub fn threw(&self) -> Option<&Thrown> {
        self.result.as_ref().err()
    }
}

/// Default equivalence: same thrown kind and message, or equal returned
/// values; printed output too when `compare_output` is set.
pub fn default_verify(reference: &Outcome, submission: &Outcome, compare_output: bool) -> Result<(), String> {
    match (&reference.result, &submission.result) {
        (Err(expected), Err(found)) => {
            if expected.kind != found.kind {
                return Err(format!("Expected to throw {} but threw {}", expected.kind, found.kind));
            }
            if expected.message != found.message {
                return Err(format!(
                    "Expected {} with message {:?} but the message was {:?}",
                    expected.kind,
                    expected.message.as_deref().unwrap_or(""),
                    found.message.as_deref().unwrap_or("")
                ));
            }
        }
        (Ok(expected), Err(found)) => {
            return Err(format!("Expected to return {} but threw {}", expected, found));
        }
        (Err(expected), Ok(found)) => {
            return Err(format!("Expected to throw {} but returned {}", expected, found));
        }
        (Ok(expected), Ok(found)) => {
            if !values_equal(expected, found, FIELD_DEPTH) {
                return Err(format!("Expected {} but found {}", expected, found));
            }
        }
    }
    if compare_output {
        if reference.stdout != submission.stdout {
            return Err(format!(
                "Expected standard output {:?} but found {:?}",
                reference.stdout.as_deref().unwrap_or(""),
                submission.stdout.as_deref().unwrap_or("")
            ));
        }
        if reference.stderr != submission.stderr {
            return Err(format!(
                "Expected standard error {:?} but found {:?}",
                reference.stderr.as_deref().unwrap_or(""),
                submission.stderr.as_deref().unwrap_or("")
            ));
        }
    }
    Ok(())
}

/// Run a custom verifier, turning a panic into a failed verification.
pub fn custom_verify(
    verify: &VerifyFn,
    reference: &Outcome,
    submission: &Outcome,
    rng: &mut ChaCha8Rng,
) -> Result<(), String> {
    let verify = Arc::clone(verify);
    match catch_unwind(AssertUnwindSafe(|| verify(reference, submission, rng))) {
        Ok(verdict) => verdict,
        Err(payload) => Err(format!(
            "verifier panicked: {}",
            crate::model::space::panic_message(payload)
        )),
    }
}

/// Structural equality used by the default verifier.
///
/// Arrays compare element-wise. Floats compare bitwise, except that any two
/// NaNs are equal. Objects are equal when
/// they are the same object, when the expected object's class declares
/// `equals(Object)` and it answers true, or when their public fields are
/// equal (up to `depth` levels).
pub fn values_equal(expected: &Value, found: &Value, depth: usize) -> bool {
    match (expected, found) {
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y, depth))
        }
        (Value::Object(a), Value::Object(b)) => objects_equal(a, b, depth),
        _ => expected == found,
    }
}

fn objects_equal(a: &ObjRef, b: &ObjRef, depth: usize) -> bool {
    if Arc::ptr_eq(a, b) {
        return true;
    }
    let equals = Signature::new("equals", [TypeRef::Object]);
    let declares_equals = a
        .class()
        .method(&equals)
        .is_some_and(|m| m.body.is_some() && !m.is_static());
    if declares_equals {
        if let Some(space) = a.class().space() {
            let receiver = Value::Object(Arc::clone(a));
            return matches!(
                space.invoke(Some(&receiver), a.class_name(), &equals, vec![Value::Object(Arc::clone(b))]),
                Ok(Value::Bool(true))
            );
        }
    }
    if depth == 0 || a.class_name() != b.class_name() {
        return false;
    }
    let left = a.public_fields();
    let right = b.public_fields();
    left.len() == right.len()
        && left
            .iter()
            .zip(&right)
            .all(|((n1, v1), (n2, v2))| n1 == n2 && values_equal(v1, v2, depth - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassDef, ClassSpace, FieldDef, MethodDef};

    fn returned(value: Value) -> Outcome {
        Outcome {
            receiver: None,
            args: Vec::new(),
            result: Ok(value),
            stdout: None,
            stderr: None,
        }
    }

    fn threw(kind: &str, message: &str) -> Outcome {
        Outcome {
            result: Err(Thrown::new(kind, message)),
            ..returned(Value::Null)
        }
    }

    #[test]
    fn test_return_values() {
        assert!(default_verify(&returned(Value::Int(3)), &returned(Value::Int(3)), false).is_ok());
        let err = default_verify(&returned(Value::Int(3)), &returned(Value::Int(4)), false).unwrap_err();
        assert_eq!(err, "Expected 3 but found 4");
        assert!(default_verify(&returned(Value::from(vec![1, 2])), &returned(Value::from(vec![1, 2])), false).is_ok());
    }

    #[test]
    fn test_thrown_failures() {
        let a = threw("ArithmeticException", "/ by zero");
        assert!(default_verify(&a, &threw("ArithmeticException", "/ by zero"), false).is_ok());
        assert!(default_verify(&a, &threw("ArithmeticException", "oops"), false).is_err());
        assert!(default_verify(&a, &threw("IllegalStateException", "/ by zero"), false).is_err());
        let err = default_verify(&a, &returned(Value::Int(0)), false).unwrap_err();
        assert!(err.starts_with("Expected to throw"));
    }

    #[test]
    fn test_output_only_when_requested() {
        let mut a = returned(Value::Null);
        a.stdout = Some("hi\n".into());
        let mut b = returned(Value::Null);
        b.stdout = Some("hello\n".into());
        assert!(default_verify(&a, &b, false).is_ok());
        assert!(default_verify(&a, &b, true).is_err());
    }

    #[test]
    fn test_objects_by_fields_and_equals() {
        let space = ClassSpace::new("test");
        space
            .define(ClassDef::public_class("Point").field(FieldDef::public("x", TypeRef::Int)))
            .unwrap();
        space
            .define(
                ClassDef::public_class("Always")
                    .field(FieldDef::public("x", TypeRef::Int))
                    .method(
                        MethodDef::public("equals")
                            .param(TypeRef::Object)
                            .returns(TypeRef::Boolean)
                            .body(|_| Ok(Value::Bool(true))),
                    ),
            )
            .unwrap();
        let p1 = space.construct("Point", &[], vec![]).unwrap();
        let p2 = space.construct("Point", &[], vec![]).unwrap();
        assert!(values_equal(&p1, &p2, FIELD_DEPTH));
        p2.as_object().unwrap().set("x", Value::Int(5));
        assert!(!values_equal(&p1, &p2, FIELD_DEPTH));

        let a1 = space.construct("Always", &[], vec![]).unwrap();
        let a2 = space.construct("Always", &[], vec![]).unwrap();
        a2.as_object().unwrap().set("x", Value::Int(9));
        assert!(values_equal(&a1, &a2, FIELD_DEPTH));
    }

    #[test]
    fn test_nan_and_signed_zero() {
        let payload = f64::from_bits(0x7ff8_0000_0000_0001);
        assert!(values_equal(&Value::Double(f64::NAN), &Value::Double(-f64::NAN), FIELD_DEPTH));
        assert!(values_equal(&Value::Double(f64::NAN), &Value::Double(payload), FIELD_DEPTH));
        assert!(values_equal(&Value::Float(f32::NAN), &Value::Float(-f32::NAN), FIELD_DEPTH));
        assert!(values_equal(
            &Value::Float(f32::NAN),
            &Value::Float(f32::from_bits(0x7fc0_0001)),
            FIELD_DEPTH
        ));
        assert!(!values_equal(&Value::Double(0.0), &Value::Double(-0.0), FIELD_DEPTH));
        assert!(!values_equal(&Value::Float(0.0), &Value::Float(-0.0), FIELD_DEPTH));
        assert!(!values_equal(&Value::Double(f64::NAN), &Value::Double(0.0), FIELD_DEPTH));
        assert!(default_verify(
            &returned(Value::Double(f64::NAN)),
            &returned(Value::Double(payload)),
            false
        )
        .is_ok());
    }

    fn broken(_: &Outcome, _: &Outcome, _: &mut ChaCha8Rng) -> Result<(), String> {
        panic!("bad verifier")
    }

    #[test]
    fn test_panicking_verifier_fails() {
        let verify: VerifyFn = Arc::new(broken);
        let mut rng = <ChaCha8Rng as rand::SeedableRng>::seed_from_u64(1);
        let err = custom_verify(&verify, &returned(Value::Null), &returned(Value::Null), &mut rng).unwrap_err();
        assert!(err.contains("bad verifier"));
    }
}
