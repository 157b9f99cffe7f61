//! Class spaces and the capability interface used to reach user code.

use super::class::{Class, ClassDef, MethodDef, MethodFn, Signature};
use super::shape::ClassShape;
use super::types::TypeRef;
use super::value::{ObjRef, Object, Thrown, Value};
use super::{read, write, ModelError};
use crate::env::capture;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock, Weak};

/// Capability interface through which the engine constructs objects,
/// invokes operations, and touches fields, independent of how member
/// lookup is performed.
pub trait ObjectModel: Send + Sync {
    /// Run the constructor of `class` with exactly these parameter types.
    fn construct(&self, class: &str, params: &[TypeRef], args: Vec<Value>) -> Result<Value, Thrown>;

    /// Invoke `signature` as declared on `class`. Instance methods dispatch
    /// on the receiver's runtime class.
    fn invoke(
        &self,
        receiver: Option<&Value>,
        class: &str,
        signature: &Signature,
        args: Vec<Value>,
    ) -> Result<Value, Thrown>;

    /// Whether `construct` could succeed in finding the constructor.
    fn can_construct(&self, class: &str, params: &[TypeRef]) -> bool;

    /// Read an instance field (with a receiver) or a static field.
    fn read_field(&self, receiver: Option<&ObjRef>, class: &str, name: &str) -> Result<Value, Thrown>;

    /// Write an instance field (with a receiver) or a static field.
    fn write_field(
        &self,
        receiver: Option<&ObjRef>,
        class: &str,
        name: &str,
        value: Value,
    ) -> Result<(), Thrown>;
}

/// A scoped set of classes, standing in for one class loader.
///
/// The reference and every submission live in separate spaces, so
/// same-named classes never collide.
pub struct ClassSpace {
    label: String,
    classes: RwLock<BTreeMap<String, Arc<Class>>>,
    me: Weak<ClassSpace>,
}

impl ClassSpace {
    /// Create an empty space.
    pub fn new(label: impl Into<String>) -> Arc<Self> {
        let label = label.into();
        Arc::new_cyclic(|me| Self {
            label,
            classes: RwLock::new(BTreeMap::new()),
            me: me.clone(),
        })
    }

    /// Human label, used in logs.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Link and register a class. A superclass or interface defined in
    /// this space is inherited from; any other name is treated as external.
    pub fn define(&self, def: ClassDef) -> Result<Arc<Class>, ModelError> {
        let mut classes = write(&self.classes);
        if classes.contains_key(&def.name) {
            return Err(ModelError::DuplicateClass(def.name));
        }
        let superclass = def
            .superclass
            .as_ref()
            .and_then(|name| classes.get(name).cloned());
        let interfaces: Vec<Arc<Class>> = def
            .interfaces
            .iter()
            .filter_map(|name| classes.get(name).cloned())
            .collect();
        let name = def.name.clone();
        let class = Arc::new(Class::link(def, superclass, &interfaces, self.me.clone()));
        classes.insert(name, Arc::clone(&class));
        Ok(class)
    }

    /// Define several classes in order, outer classes first.
    pub fn define_all(&self, defs: impl IntoIterator<Item = ClassDef>) -> Result<(), ModelError> {
        for def in defs {
            self.define(def)?;
        }
        Ok(())
    }

    /// Look a class up by nested name.
    pub fn class(&self, name: &str) -> Option<Arc<Class>> {
        read(&self.classes).get(name).cloned()
    }

    /// All classes, ordered by name.
    pub fn classes(&self) -> Vec<Arc<Class>> {
        read(&self.classes).values().cloned().collect()
    }

    /// Classes directly nested in `outer`.
    pub fn inner_classes(&self, outer: &str) -> Vec<Arc<Class>> {
        let prefix = format!("{}$", outer);
        read(&self.classes)
            .iter()
            .filter(|(name, _)| {
                name.strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('$'))
            })
            .map(|(_, class)| Arc::clone(class))
            .collect()
    }

    /// Declaration-only view of a class.
    pub fn shape(&self, name: &str) -> Option<ClassShape> {
        let class = self.class(name)?;
        let inner = self
            .inner_classes(name)
            .iter()
            .filter(|c| c.modifiers().is_public())
            .map(|c| c.name().to_string())
            .collect();
        Some(ClassShape::of(&class, inner))
    }

    fn require(&self, name: &str) -> Result<Arc<Class>, Thrown> {
        self.class(name)
            .ok_or_else(|| Thrown::new("NoClassDefFoundError", name))
    }

    /// Construct by picking the first accessible-by-shape constructor whose
    /// parameters accept `args`.
    pub fn instantiate(&self, class: &str, args: Vec<Value>) -> Result<Value, Thrown> {
        let target = self.require(class)?;
        let params = target
            .constructors()
            .iter()
            .find(|c| accepts(&c.params, &args))
            .map(|c| c.params.clone())
            .ok_or_else(|| {
                Thrown::no_such_method(format!("no constructor of {} accepts {}", class, describe(&args)))
            })?;
        self.construct(class, &params, args)
    }

    /// Invoke a method by name, picking the first overload whose
    /// parameters accept `args`.
    pub fn call(&self, receiver: Option<&Value>, class: &str, name: &str, args: Vec<Value>) -> Result<Value, Thrown> {
        let dispatch_class = match receiver {
            Some(Value::Object(obj)) => Arc::clone(obj.class()),
            _ => self.require(class)?,
        };
        let signature = dispatch_class
            .methods_named(name)
            .find(|m| accepts(&m.params, &args))
            .map(MethodDef::signature)
            .ok_or_else(|| {
                Thrown::no_such_method(format!("{}.{} does not accept {}", class, name, describe(&args)))
            })?;
        self.invoke(receiver, class, &signature, args)
    }
}

impl std::fmt::Debug for ClassSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassSpace")
            .field("label", &self.label)
            .field("classes", &read(&self.classes).keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ObjectModel for ClassSpace {
    fn construct(&self, class: &str, params: &[TypeRef], args: Vec<Value>) -> Result<Value, Thrown> {
        let target = self.require(class)?;
        if !target.is_instantiable() {
            return Err(Thrown::new("InstantiationException", class));
        }
        let constructor = target
            .constructor(params)
            .cloned()
            .ok_or_else(|| Thrown::no_such_method(Signature::constructor(params.iter().cloned()).to_string()))?;
        check_arity(params, &args)?;
        let fields = target
            .instance_fields()
            .iter()
            .map(|f| (f.name.clone(), f.initial.clone()))
            .collect();
        let obj = Arc::new(Object::new(Arc::clone(&target), fields));
        if let Some(body) = &constructor.body {
            run_body(&target, body, Some(Arc::clone(&obj)), args)?;
        }
        Ok(Value::Object(obj))
    }

    fn invoke(
        &self,
        receiver: Option<&Value>,
        class: &str,
        signature: &Signature,
        args: Vec<Value>,
    ) -> Result<Value, Thrown> {
        let declared = self.require(class)?;
        let method = declared
            .method(signature)
            .ok_or_else(|| Thrown::no_such_method(format!("{}.{}", class, signature)))?;
        check_arity(&signature.params, &args)?;
        if method.is_static() {
            let body = method.body.clone();
            return match body {
                Some(body) => run_body(&declared, &body, None, args),
                None => Err(Thrown::new("AbstractMethodError", signature.to_string())),
            };
        }
        match receiver {
            Some(Value::Object(obj)) => dispatch(obj, signature, args),
            _ => Err(Thrown::null_pointer()),
        }
    }

    fn can_construct(&self, class: &str, params: &[TypeRef]) -> bool {
        self.class(class)
            .is_some_and(|c| c.is_instantiable() && c.constructor(params).is_some())
    }

    fn read_field(&self, receiver: Option<&ObjRef>, class: &str, name: &str) -> Result<Value, Thrown> {
        match receiver {
            Some(obj) => obj
                .get(name)
                .ok_or_else(|| Thrown::new("NoSuchFieldError", name)),
            None => self
                .require(class)?
                .static_get(name)
                .ok_or_else(|| Thrown::new("NoSuchFieldError", name)),
        }
    }

    fn write_field(
        &self,
        receiver: Option<&ObjRef>,
        class: &str,
        name: &str,
        value: Value,
    ) -> Result<(), Thrown> {
        let stored = match receiver {
            Some(obj) => obj.set(name, value),
            None => self.require(class)?.static_set(name, value),
        };
        if stored {
            Ok(())
        } else {
            Err(Thrown::new("NoSuchFieldError", name))
        }
    }
}

/// Invoke an instance method on `obj`, dispatching on its runtime class.
/// Substitutes forward to their behavior object.
pub(crate) fn dispatch(obj: &ObjRef, signature: &Signature, args: Vec<Value>) -> Result<Value, Thrown> {
    if let Some(delegate) = obj.delegate() {
        return delegate.forwarder.forward(obj, signature, args);
    }
    let class = Arc::clone(obj.class());
    let method = class
        .method(signature)
        .ok_or_else(|| Thrown::no_such_method(format!("{}.{}", class.name(), signature)))?;
    let this = if method.is_static() { None } else { Some(Arc::clone(obj)) };
    match method.body.clone() {
        Some(body) => run_body(&class, &body, this, args),
        None => Err(Thrown::new("AbstractMethodError", signature.to_string())),
    }
}

fn run_body(class: &Arc<Class>, body: &MethodFn, this: Option<ObjRef>, args: Vec<Value>) -> Result<Value, Thrown> {
    let space = class
        .space()
        .ok_or_else(|| Thrown::new("IllegalStateException", "class space was dropped"))?;
    let mut call = Call {
        this,
        args,
        space: &space,
        class,
    };
    match catch_unwind(AssertUnwindSafe(|| body(&mut call))) {
        Ok(result) => result,
        Err(payload) => Err(Thrown::panic(panic_message(payload))),
    }
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic payload".to_string()
    }
}

fn check_arity(params: &[TypeRef], args: &[Value]) -> Result<(), Thrown> {
    if params.len() == args.len() {
        Ok(())
    } else {
        Err(Thrown::illegal_argument(format!(
            "wrong number of arguments: expected {}, got {}",
            params.len(),
            args.len()
        )))
    }
}

fn accepts(params: &[TypeRef], args: &[Value]) -> bool {
    params.len() == args.len() && params.iter().zip(args).all(|(p, a)| a.conforms_to(p))
}

fn describe(args: &[Value]) -> String {
    let types: Vec<String> = args.iter().map(Value::type_name).collect();
    format!("({})", types.join(", "))
}

/// What a method or constructor body sees while it runs.
pub struct Call<'a> {
    this: Option<ObjRef>,
    args: Vec<Value>,
    space: &'a Arc<ClassSpace>,
    class: &'a Arc<Class>,
}

impl<'a> Call<'a> {
    /// The receiver.
    pub fn this(&self) -> Result<&ObjRef, Thrown> {
        self.this.as_ref().ok_or_else(Thrown::null_pointer)
    }

    /// All arguments.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Argument by position.
    pub fn arg(&self, index: usize) -> Result<&Value, Thrown> {
        self.args.get(index).ok_or_else(|| {
            Thrown::new("ArrayIndexOutOfBoundsException", format!("argument {}", index))
        })
    }

    fn typed<T>(&self, index: usize, expected: &str, pick: impl Fn(&Value) -> Option<T>) -> Result<T, Thrown> {
        let value = self.arg(index)?;
        pick(value).ok_or_else(|| {
            Thrown::class_cast(format!("argument {} is {}, not {}", index, value.type_name(), expected))
        })
    }

    /// `int` argument.
    pub fn int(&self, index: usize) -> Result<i32, Thrown> {
        self.typed(index, "int", Value::as_int)
    }

    /// `long` argument.
    pub fn long(&self, index: usize) -> Result<i64, Thrown> {
        self.typed(index, "long", Value::as_long)
    }

    /// `double` argument.
    pub fn double(&self, index: usize) -> Result<f64, Thrown> {
        self.typed(index, "double", Value::as_double)
    }

    /// `boolean` argument.
    pub fn bool(&self, index: usize) -> Result<bool, Thrown> {
        self.typed(index, "boolean", Value::as_bool)
    }

    /// `char` argument.
    pub fn char(&self, index: usize) -> Result<char, Thrown> {
        self.typed(index, "char", |v| match v {
            Value::Char(c) => Some(*c),
            _ => None,
        })
    }

    /// `String` argument; null raises a null pointer failure.
    pub fn str(&self, index: usize) -> Result<&str, Thrown> {
        match self.arg(index)? {
            Value::Str(s) => Ok(s),
            Value::Null => Err(Thrown::null_pointer()),
            other => Err(Thrown::class_cast(format!(
                "argument {} is {}, not String",
                index,
                other.type_name()
            ))),
        }
    }

    /// Array argument; null raises a null pointer failure.
    pub fn array(&self, index: usize) -> Result<&[Value], Thrown> {
        match self.arg(index)? {
            Value::Array(items) => Ok(items),
            Value::Null => Err(Thrown::null_pointer()),
            other => Err(Thrown::class_cast(format!(
                "argument {} is {}, not an array",
                index,
                other.type_name()
            ))),
        }
    }

    /// Object argument; null raises a null pointer failure.
    pub fn object(&self, index: usize) -> Result<&ObjRef, Thrown> {
        match self.arg(index)? {
            Value::Object(obj) => Ok(obj),
            Value::Null => Err(Thrown::null_pointer()),
            other => Err(Thrown::class_cast(format!(
                "argument {} is {}, not an object",
                index,
                other.type_name()
            ))),
        }
    }

    /// Read a field of the receiver, or a static of the executing class.
    pub fn get(&self, name: &str) -> Result<Value, Thrown> {
        if let Some(value) = self.this.as_ref().and_then(|obj| obj.get(name)) {
            return Ok(value);
        }
        self.class
            .static_get(name)
            .ok_or_else(|| Thrown::new("NoSuchFieldError", name))
    }

    /// Write a field of the receiver, or a static of the executing class.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<(), Thrown> {
        let value = value.into();
        if let Some(obj) = &self.this {
            if obj.class().instance_fields().iter().any(|f| f.name == name) {
                obj.set(name, value);
                return Ok(());
            }
        }
        if self.class.static_set(name, value) {
            Ok(())
        } else {
            Err(Thrown::new("NoSuchFieldError", name))
        }
    }

    /// Read a field of another object.
    pub fn field_of(&self, obj: &ObjRef, name: &str) -> Result<Value, Thrown> {
        obj.get(name)
            .ok_or_else(|| Thrown::new("NoSuchFieldError", name))
    }

    /// Construct an object of a class in the executing space.
    pub fn new_object(&self, class: &str, args: Vec<Value>) -> Result<Value, Thrown> {
        self.space.instantiate(class, args)
    }

    /// Invoke a method by name on another value.
    pub fn invoke(&self, receiver: &Value, name: &str, args: Vec<Value>) -> Result<Value, Thrown> {
        match receiver {
            Value::Object(obj) => {
                let class = obj.class().name().to_string();
                self.space.call(Some(receiver), &class, name, args)
            }
            _ => Err(Thrown::null_pointer()),
        }
    }

    /// Invoke a static method by name.
    pub fn invoke_static(&self, class: &str, name: &str, args: Vec<Value>) -> Result<Value, Thrown> {
        self.space.call(None, class, name, args)
    }

    /// Print to standard output.
    pub fn print(&self, text: &str) {
        capture::write_out(text);
    }

    /// Print a line to standard output.
    pub fn println(&self, text: &str) {
        capture::write_out(text);
        capture::write_out("\n");
    }

    /// Print a line to standard error.
    pub fn eprintln(&self, text: &str) {
        capture::write_err(text);
        capture::write_err("\n");
    }

    /// The space the executing class belongs to.
    pub fn space(&self) -> &Arc<ClassSpace> {
        self.space
    }
}
