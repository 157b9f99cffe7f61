//! Value proxy layer between two structurally parallel class spaces.
//!
//! [`Mirror::present`] makes a value from one space usable where the other
//! space's types are expected. Objects become substitutes of the
//! counterpart class whose every method call is forwarded to the original
//! ("behavior") object:
//!
//! 1. public fields are copied from the substitute to the behavior object,
//! 2. arguments are presented to the behavior's space and the call runs,
//! 3. public fields are copied back and the result is presented to the
//!    substitute's space.
//!
//! Substitutes are identity-stable: presenting the same behavior object as
//! the same class twice yields the same substitute while it is alive.

use crate::model::space::dispatch;
use crate::model::value::Delegate;
use crate::model::{lock, zero_value, Class, ClassSpace, Forward, ObjRef, Object, Signature, Thrown, TypeRef, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, error};

struct Entry {
    behavior: Weak<Object>,
    proxy: Weak<Object>,
}

/// Scoped proxy registry for one pair of class spaces.
pub struct Mirror {
    first: Arc<ClassSpace>,
    second: Arc<ClassSpace>,
    cache: Mutex<HashMap<(usize, String), Entry>>,
    fatal: Mutex<Option<String>>,
    me: Weak<Mirror>,
}

impl Mirror {
    /// Mirror between two spaces. Either direction may be presented.
    pub fn new(first: Arc<ClassSpace>, second: Arc<ClassSpace>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            first,
            second,
            cache: Mutex::new(HashMap::new()),
            fatal: Mutex::new(None),
            me: me.clone(),
        })
    }

    /// Present `value` to `target`, recursively wrapping objects whose
    /// class has a counterpart there. Everything else passes through.
    ///
    /// A substitute that already exists is refreshed from its behavior
    /// object before it is handed out again.
    pub fn present(&self, value: &Value, target: &Arc<ClassSpace>) -> Value {
        self.present_in(value, target, &mut HashSet::new())
    }

    fn present_in(&self, value: &Value, target: &Arc<ClassSpace>, visited: &mut HashSet<usize>) -> Value {
        match value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|v| self.present_in(v, target, visited))
                    .collect(),
            ),
            Value::Object(obj) => self.present_object(obj, target, visited),
            other => other.clone(),
        }
    }

    /// Present to the first space.
    pub fn to_first(&self, value: &Value) -> Value {
        self.present(value, &self.first)
    }

    /// Present to the second space.
    pub fn to_second(&self, value: &Value) -> Value {
        self.present(value, &self.second)
    }

    /// First broken-invariant report since the last call, if any.
    pub fn take_fatal(&self) -> Option<String> {
        lock(&self.fatal).take()
    }

    /// Number of live substitutes.
    pub fn live_substitutes(&self) -> usize {
        let mut cache = lock(&self.cache);
        cache.retain(|_, entry| entry.proxy.strong_count() > 0);
        cache.len()
    }

    fn present_object(&self, obj: &ObjRef, target: &Arc<ClassSpace>, visited: &mut HashSet<usize>) -> Value {
        if in_space(obj.class(), target) {
            return Value::Object(Arc::clone(obj));
        }
        // A substitute going back to where its behavior lives unwraps.
        if let Some(behavior) = obj.behavior() {
            if in_space(behavior.class(), target) {
                return Value::Object(Arc::clone(behavior));
            }
        }
        match counterpart(obj.class(), target) {
            Some(class) => Value::Object(self.substitute(obj, class, target, visited)),
            None => Value::Object(Arc::clone(obj)),
        }
    }

    fn substitute(
        &self,
        behavior: &ObjRef,
        class: Arc<Class>,
        target: &Arc<ClassSpace>,
        visited: &mut HashSet<usize>,
    ) -> ObjRef {
        let key = (behavior.identity(), class.name().to_string());
        let cached = {
            let mut cache = lock(&self.cache);
            cache.retain(|_, entry| entry.proxy.strong_count() > 0);
            cache.get(&key).and_then(|entry| {
                let same_behavior = entry
                    .behavior
                    .upgrade()
                    .is_some_and(|b| Arc::ptr_eq(&b, behavior));
                if same_behavior {
                    entry.proxy.upgrade()
                } else {
                    None
                }
            })
        };
        if let Some(proxy) = cached {
            if visited.insert(proxy.identity()) {
                self.copy_fields(behavior, &proxy, target, visited);
            }
            return proxy;
        }

        let fields: BTreeMap<String, Value> = class
            .instance_fields()
            .iter()
            .map(|f| (f.name.clone(), zero_value(&f.ty)))
            .collect();
        let forwarder: Arc<dyn Forward> = match self.me.upgrade() {
            Some(me) => me,
            None => return Arc::clone(behavior),
        };
        let proxy = Arc::new(Object::substitute(
            class,
            fields,
            Delegate {
                behavior: Arc::clone(behavior),
                forwarder,
            },
        ));
        // Register before copying fields so cyclic graphs terminate.
        lock(&self.cache).insert(
            key,
            Entry {
                behavior: Arc::downgrade(behavior),
                proxy: Arc::downgrade(&proxy),
            },
        );
        visited.insert(proxy.identity());
        debug!(class = proxy.class_name(), "created substitute");
        self.copy_fields(behavior, &proxy, target, visited);
        proxy
    }

    /// Copy public fields present on both objects from `from` to `to`,
    /// presenting each value to `to_space`.
    fn copy_fields(&self, from: &ObjRef, to: &ObjRef, to_space: &Arc<ClassSpace>, visited: &mut HashSet<usize>) {
        for (name, value) in from.public_fields() {
            let public_on_target = to
                .class()
                .instance_fields()
                .iter()
                .any(|f| f.name == name && f.modifiers.is_public());
            if public_on_target {
                to.set(&name, self.present_in(&value, to_space, visited));
            }
        }
    }

    fn record_fatal(&self, message: String) {
        error!(%message, "mirror invariant broken");
        let mut fatal = lock(&self.fatal);
        if fatal.is_none() {
            *fatal = Some(message);
        }
    }
}

impl Forward for Mirror {
    fn forward(&self, proxy: &ObjRef, signature: &Signature, args: Vec<Value>) -> Result<Value, Thrown> {
        let Some(behavior) = proxy.behavior() else {
            return Err(Thrown::null_pointer());
        };
        let (Some(behavior_space), Some(proxy_space)) = (behavior.class().space(), proxy.class().space()) else {
            return Err(Thrown::new("IllegalStateException", "class space was dropped"));
        };
        // Equality on a substitute is identity; the behavior's own
        // equality is what is being graded.
        if let Some(identity) = identity_member(proxy, signature, &args) {
            return Ok(identity);
        }
        if behavior.class().method(signature).is_none() {
            let message = format!(
                "{} has no method {} required by {}",
                behavior.class_name(),
                signature,
                proxy.class_name()
            );
            self.record_fatal(message.clone());
            return Err(Thrown::no_such_method(message));
        }

        self.copy_fields(proxy, behavior, &behavior_space, &mut HashSet::new());
        let args: Vec<Value> = args.iter().map(|a| self.present(a, &behavior_space)).collect();
        let result = dispatch(behavior, signature, args);
        self.copy_fields(behavior, proxy, &proxy_space, &mut HashSet::new());
        result.map(|value| self.present(&value, &proxy_space))
    }
}

impl std::fmt::Debug for Mirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mirror")
            .field("first", &self.first.label())
            .field("second", &self.second.label())
            .finish_non_exhaustive()
    }
}

fn identity_member(proxy: &ObjRef, signature: &Signature, args: &[Value]) -> Option<Value> {
    match (signature.name.as_str(), signature.params.as_slice(), args) {
        ("equals", [TypeRef::Object], [other]) => Some(Value::Bool(match other {
            Value::Object(other) => Arc::ptr_eq(proxy, other),
            _ => false,
        })),
        ("hashCode", [], []) => Some(Value::Int(identity_hash(proxy.identity()))),
        _ => None,
    }
}

/// Fold both halves of an identity into an `int` hash.
fn identity_hash(identity: usize) -> i32 {
    let id = identity as u64;
    (id ^ (id >> 32)) as u32 as i32
}

fn in_space(class: &Class, space: &Arc<ClassSpace>) -> bool {
    class.space().is_some_and(|s| Arc::ptr_eq(&s, space))
}

/// Most-derived class in `target` corresponding to `class`: walk up the
/// superclass chain until a same-named, non-private class exists there.
fn counterpart(class: &Arc<Class>, target: &ClassSpace) -> Option<Arc<Class>> {
    class.chain().into_iter().find_map(|c| {
        target
            .class(c.name())
            .filter(|found| !found.modifiers().is_private())
    })
}
