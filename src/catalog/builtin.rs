//! Bundled demo questions.
//!
//! Each question comes with a correct submission and a few broken ones, so
//! the CLI has something to grade out of the box.

use super::CatalogEntry;
use crate::generators::{ascii_strings, Cases};
use crate::model::{
    ClassDef, ClassSpace, ConstructorDef, FieldDef, MethodDef, Modifier, ObjectModel, Signature, Thrown, TypeRef,
    Value,
};
use crate::question::{QuestionConfig, SolutionDecl};
use crate::runner::{default_verify, values_equal};
use crate::schedule::RunnerArgs;
use std::sync::Arc;
use tracing::error;

/// Every bundled entry.
pub fn entries() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry::new("adder", "static int addition", adder_config)
            .submission("correct", || adder("correct", i32::wrapping_add, "add"))
            .submission("commuted", || adder("commuted", |a, b| b.wrapping_add(a), "add"))
            .submission("subtract", || adder("subtract", i32::wrapping_sub, "add"))
            .submission("missing", || adder("missing", i32::wrapping_add, "plus")),
        CatalogEntry::new("counter", "stateful receivers", counter_config)
            .submission("correct", || counter("correct", false))
            .submission("stale", || counter("stale", true)),
        CatalogEntry::new("root", "integer square root with a precondition", root_config)
            .submission("correct", || root("correct", false))
            .submission("rounded", || root("rounded", true)),
        CatalogEntry::new("greeter", "printed output verification", greeter_config)
            .submission("correct", || greeter("correct", |name| format!("Hello, {}!", name)))
            .submission("shouting", || greeter("shouting", |name| format!("HELLO, {}!", name.to_uppercase())))
            .submission("silent", || greeter("silent", |_| String::new())),
        CatalogEntry::new("boxer", "objects crossing between spaces", boxer_config)
            .submission("correct", || boxer("correct", 0))
            .submission("offset", || boxer("offset", 1)),
    ]
}

fn space(label: &str, defs: Vec<ClassDef>) -> Arc<ClassSpace> {
    let space = ClassSpace::new(label);
    if let Err(err) = space.define_all(defs) {
        error!(space = label, error = %err, "demo space is malformed");
    }
    space
}

fn adder(label: &str, op: fn(i32, i32) -> i32, method: &str) -> Arc<ClassSpace> {
    space(
        label,
        vec![ClassDef::public_class("Adder").method(
            MethodDef::public_static(method)
                .params([TypeRef::Int, TypeRef::Int])
                .returns(TypeRef::Int)
                .body(move |call| Ok(Value::Int(op(call.int(0)?, call.int(1)?)))),
        )],
    )
}

fn adder_config() -> QuestionConfig {
    QuestionConfig::new(adder("reference", i32::wrapping_add, "add"), "Adder")
        .solution(Signature::new("add", [TypeRef::Int, TypeRef::Int]))
        .args(RunnerArgs::with_tests(256))
}

fn counter(label: &str, stale: bool) -> Arc<ClassSpace> {
    space(
        label,
        vec![ClassDef::public_class("Counter")
            .field(FieldDef::new("count", TypeRef::Int).with(Modifier::Private))
            .constructor(ConstructorDef::public())
            .method(
                MethodDef::public("increment")
                    .param(TypeRef::Int)
                    .returns(TypeRef::Int)
                    .body(move |call| {
                        let before = call.get("count")?.as_int().unwrap_or(0);
                        let after = before.wrapping_add(call.int(0)?);
                        call.set("count", after)?;
                        Ok(Value::Int(if stale { before } else { after }))
                    }),
            )
            .method(MethodDef::public("get").returns(TypeRef::Int).body(|call| call.get("count")))],
    )
}

fn counter_config() -> QuestionConfig {
    QuestionConfig::new(counter("reference", false), "Counter")
        .solution(Signature::new("increment", [TypeRef::Int]))
        .args(RunnerArgs {
            num_tests: Some(256),
            receiver_count: Some(8),
            ..RunnerArgs::default()
        })
}

fn floor_sqrt(n: i32) -> i32 {
    let n = i64::from(n);
    let (mut lo, mut hi) = (0i64, 46_341i64);
    while lo < hi {
        let mid = (lo + hi + 1) / 2;
        if mid * mid <= n {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    i32::try_from(lo).unwrap_or(i32::MAX)
}

fn root(label: &str, rounded: bool) -> Arc<ClassSpace> {
    space(
        label,
        vec![ClassDef::public_class("Root").method(
            MethodDef::public_static("isqrt")
                .param(TypeRef::Int)
                .returns(TypeRef::Int)
                .throws("IllegalArgumentException")
                .body(move |call| {
                    let n = call.int(0)?;
                    if n < 0 {
                        return Err(Thrown::illegal_argument("negative input"));
                    }
                    let r = if rounded {
                        f64::from(n).sqrt().round() as i32
                    } else {
                        floor_sqrt(n)
                    };
                    Ok(Value::Int(r))
                }),
        )],
    )
}

fn root_config() -> QuestionConfig {
    QuestionConfig::new(root("reference", false), "Root")
        .solution(Signature::new("isqrt", [TypeRef::Int]))
        .edge_cases(TypeRef::Int, Cases::Values(vec![Value::Int(0), Value::Int(1), Value::Int(i32::MAX)]))
        .simple_cases(TypeRef::Int, Cases::Values(vec![Value::Int(4), Value::Int(15), Value::Int(16)]))
        .precondition("", |_, args| args.first().and_then(Value::as_int).is_some_and(|n| n >= 0))
        .args(RunnerArgs::with_tests(256))
}

fn greeter(label: &str, greet: fn(&str) -> String) -> Arc<ClassSpace> {
    space(
        label,
        vec![ClassDef::public_class("Greeter").method(
            MethodDef::public_static("greet")
                .param(TypeRef::String)
                .body(move |call| {
                    let line = greet(call.str(0)?);
                    if !line.is_empty() {
                        call.println(&line);
                    }
                    Ok(Value::Null)
                }),
        )],
    )
}

fn greeter_config() -> QuestionConfig {
    QuestionConfig::new(greeter("reference", |name| format!("Hello, {}!", name)), "Greeter")
        .solution_decl(SolutionDecl::new(Signature::new("greet", [TypeRef::String])).verify_output())
        .generator(TypeRef::String, ascii_strings())
        .args(RunnerArgs::with_tests(128))
}

fn boxer(label: &str, offset: i32) -> Arc<ClassSpace> {
    let boxed = TypeRef::class("Boxer$Box");
    space(
        label,
        vec![
            ClassDef::public_class("Boxer$Box")
                .with(Modifier::Static)
                .field(FieldDef::public("value", TypeRef::Int))
                .constructor(ConstructorDef::public())
                .method(MethodDef::public("bump").returns(boxed.clone()).body(|call| {
                    let this = Arc::clone(call.this()?);
                    let value = call.get("value")?.as_int().unwrap_or(0);
                    call.set("value", value.wrapping_add(1))?;
                    Ok(Value::Object(this))
                })),
            ClassDef::public_class("Boxer").method(
                MethodDef::public_static("wrap")
                    .param(TypeRef::Int)
                    .returns(boxed)
                    .body(move |call| {
                        let boxed = call.new_object("Boxer$Box", Vec::new())?;
                        let value = call.int(0)?.wrapping_add(offset);
                        if let Some(obj) = boxed.as_object() {
                            obj.set("value", Value::Int(value));
                        }
                        Ok(boxed)
                    }),
            ),
        ],
    )
}

fn boxer_config() -> QuestionConfig {
    QuestionConfig::new(boxer("reference", 0), "Boxer")
        .solution(Signature::new("wrap", [TypeRef::Int]))
        .verifier("", |reference, submission, _| {
            default_verify(reference, submission, false)?;
            // Both boxes must keep behaving alike after a bump.
            let (Some(ours), Some(theirs)) = (reference.returned(), submission.returned()) else {
                return Ok(());
            };
            let Some(space) = ours.as_object().and_then(|obj| obj.class().space()) else {
                return Ok(());
            };
            let bump = Signature::new("bump", []);
            let expected = space.invoke(Some(ours), "Boxer$Box", &bump, Vec::new());
            let found = space.invoke(Some(theirs), "Boxer$Box", &bump, Vec::new());
            match (expected, found) {
                (Ok(a), Ok(b)) if values_equal(&a, &b, 4) => Ok(()),
                (a, b) => Err(format!(
                    "After bump expected {:?} but found {:?}",
                    a.map(|v| v.to_string()),
                    b.map(|v| v.to_string())
                )),
            }
        })
        .args(RunnerArgs::with_tests(128))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_sqrt() {
        assert_eq!(floor_sqrt(0), 0);
        assert_eq!(floor_sqrt(15), 3);
        assert_eq!(floor_sqrt(16), 4);
        assert_eq!(floor_sqrt(i32::MAX), 46_340);
    }

    #[test]
    fn test_demo_spaces_define_cleanly() {
        assert!(adder("a", i32::wrapping_add, "add").class("Adder").is_some());
        let boxes = boxer("b", 0);
        assert_eq!(boxes.inner_classes("Boxer").len(), 1);
        let wrapped = boxes.call(None, "Boxer", "wrap", vec![Value::Int(2)]).unwrap();
        assert_eq!(wrapped.as_object().unwrap().get("value"), Some(Value::Int(2)));
    }
}
