//! Class declarations and linked runtime classes.

use super::space::{Call, ClassSpace};
use super::types::{ClassKind, Modifier, Modifiers, TypeRef};
use super::value::{Thrown, Value};
use super::lock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

/// Callable body of a method or constructor.
pub type MethodFn = Arc<dyn Fn(&mut Call<'_>) -> Result<Value, Thrown> + Send + Sync>;

/// Name of every constructor signature.
pub const CONSTRUCTOR_NAME: &str = "<init>";

/// Lookup key for a method or constructor: name plus parameter types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Signature {
    /// Member name, or `<init>` for constructors.
    pub name: String,
    /// Parameter types in order.
    pub params: Vec<TypeRef>,
}

impl Signature {
    /// Method signature.
    pub fn new(name: impl Into<String>, params: impl IntoIterator<Item = TypeRef>) -> Self {
        Self {
            name: name.into(),
            params: params.into_iter().collect(),
        }
    }

    /// Constructor signature.
    pub fn constructor(params: impl IntoIterator<Item = TypeRef>) -> Self {
        Self::new(CONSTRUCTOR_NAME, params)
    }

    /// Whether this names a constructor.
    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.params.iter().map(ToString::to_string).collect();
        write!(f, "{}({})", self.name, params.join(", "))
    }
}

/// Zero value for a declared type.
pub fn zero_value(ty: &TypeRef) -> Value {
    match ty {
        TypeRef::Boolean => Value::Bool(false),
        TypeRef::Byte => Value::Byte(0),
        TypeRef::Short => Value::Short(0),
        TypeRef::Int => Value::Int(0),
        TypeRef::Long => Value::Long(0),
        TypeRef::Float => Value::Float(0.0),
        TypeRef::Double => Value::Double(0.0),
        TypeRef::Char => Value::Char('\0'),
        _ => Value::Null,
    }
}

/// A field declaration.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Declared type.
    pub ty: TypeRef,
    /// Modifiers.
    pub modifiers: Modifiers,
    /// Value a fresh object (or the class, for statics) starts with.
    pub initial: Value,
}

impl FieldDef {
    /// Package-private field initialized to its type's zero value.
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        let initial = zero_value(&ty);
        Self {
            name: name.into(),
            ty,
            modifiers: Modifiers::none(),
            initial,
        }
    }

    /// Public field.
    pub fn public(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(name, ty).with(Modifier::Public)
    }

    /// Add a modifier.
    #[must_use]
    pub fn with(mut self, modifier: Modifier) -> Self {
        self.modifiers = self.modifiers.with(modifier);
        self
    }

    /// Replace the modifiers.
    #[must_use]
    pub fn modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Set the initial value.
    #[must_use]
    pub fn initial(mut self, value: impl Into<Value>) -> Self {
        self.initial = value.into();
        self
    }
}

/// A method declaration with an optional body (absent for abstract methods).
#[derive(Clone)]
pub struct MethodDef {
    /// Method name.
    pub name: String,
    /// Modifiers.
    pub modifiers: Modifiers,
    /// Method-level type parameters.
    pub type_params: Vec<String>,
    /// Parameter types.
    pub params: Vec<TypeRef>,
    /// The last parameter is variadic.
    pub varargs: bool,
    /// Return type.
    pub returns: TypeRef,
    /// Declared thrown failure kinds.
    pub throws: Vec<String>,
    /// Implementation.
    pub body: Option<MethodFn>,
}

impl MethodDef {
    /// Package-private method returning `void`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modifiers: Modifiers::none(),
            type_params: Vec::new(),
            params: Vec::new(),
            varargs: false,
            returns: TypeRef::Void,
            throws: Vec::new(),
            body: None,
        }
    }

    /// Public method.
    pub fn public(name: impl Into<String>) -> Self {
        Self::new(name).with(Modifier::Public)
    }

    /// Public static method.
    pub fn public_static(name: impl Into<String>) -> Self {
        Self::public(name).with(Modifier::Static)
    }

    /// Add a modifier.
    #[must_use]
    pub fn with(mut self, modifier: Modifier) -> Self {
        self.modifiers = self.modifiers.with(modifier);
        self
    }

    /// Replace the modifiers.
    #[must_use]
    pub fn modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Declare a method type parameter.
    #[must_use]
    pub fn type_param(mut self, name: impl Into<String>) -> Self {
        self.type_params.push(name.into());
        self
    }

    /// Append a parameter.
    #[must_use]
    pub fn param(mut self, ty: TypeRef) -> Self {
        self.params.push(ty);
        self
    }

    /// Append several parameters.
    #[must_use]
    pub fn params(mut self, tys: impl IntoIterator<Item = TypeRef>) -> Self {
        self.params.extend(tys);
        self
    }

    /// Mark the last parameter variadic.
    #[must_use]
    pub fn varargs(mut self) -> Self {
        self.varargs = true;
        self
    }

    /// Set the return type.
    #[must_use]
    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.returns = ty;
        self
    }

    /// Declare a thrown failure kind.
    #[must_use]
    pub fn throws(mut self, kind: impl Into<String>) -> Self {
        self.throws.push(kind.into());
        self
    }

    /// Provide the implementation.
    #[must_use]
    pub fn body<F>(mut self, body: F) -> Self
    where
        F: Fn(&mut Call<'_>) -> Result<Value, Thrown> + Send + Sync + 'static,
    {
        self.body = Some(Arc::new(body));
        self
    }

    /// Lookup key.
    pub fn signature(&self) -> Signature {
        Signature::new(self.name.clone(), self.params.iter().cloned())
    }

    /// `static` is present.
    pub fn is_static(&self) -> bool {
        self.modifiers.is_static()
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("signature", &self.signature())
            .field("modifiers", &self.modifiers)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

/// A constructor declaration.
#[derive(Clone)]
pub struct ConstructorDef {
    /// Modifiers.
    pub modifiers: Modifiers,
    /// Parameter types.
    pub params: Vec<TypeRef>,
    /// The last parameter is variadic.
    pub varargs: bool,
    /// Declared thrown failure kinds.
    pub throws: Vec<String>,
    /// Initializer run against the freshly allocated object.
    pub body: Option<MethodFn>,
}

impl ConstructorDef {
    /// Package-private no-arg constructor with no body.
    pub fn new() -> Self {
        Self {
            modifiers: Modifiers::none(),
            params: Vec::new(),
            varargs: false,
            throws: Vec::new(),
            body: None,
        }
    }

    /// Public constructor.
    pub fn public() -> Self {
        Self::new().with(Modifier::Public)
    }

    /// Add a modifier.
    #[must_use]
    pub fn with(mut self, modifier: Modifier) -> Self {
        self.modifiers = self.modifiers.with(modifier);
        self
    }

    /// Append a parameter.
    #[must_use]
    pub fn param(mut self, ty: TypeRef) -> Self {
        self.params.push(ty);
        self
    }

    /// Append several parameters.
    #[must_use]
    pub fn params(mut self, tys: impl IntoIterator<Item = TypeRef>) -> Self {
        self.params.extend(tys);
        self
    }

    /// Mark the last parameter variadic.
    #[must_use]
    pub fn varargs(mut self) -> Self {
        self.varargs = true;
        self
    }

    /// Declare a thrown failure kind.
    #[must_use]
    pub fn throws(mut self, kind: impl Into<String>) -> Self {
        self.throws.push(kind.into());
        self
    }

    /// Provide the initializer.
    #[must_use]
    pub fn body<F>(mut self, body: F) -> Self
    where
        F: Fn(&mut Call<'_>) -> Result<Value, Thrown> + Send + Sync + 'static,
    {
        self.body = Some(Arc::new(body));
        self
    }

    /// Lookup key.
    pub fn signature(&self) -> Signature {
        Signature::constructor(self.params.iter().cloned())
    }
}

impl Default for ConstructorDef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConstructorDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorDef")
            .field("params", &self.params)
            .field("modifiers", &self.modifiers)
            .finish_non_exhaustive()
    }
}

/// A class declaration, before it is linked into a [`ClassSpace`].
#[derive(Debug, Clone)]
pub struct ClassDef {
    /// Nested name (`Outer$Inner` for inner classes).
    pub name: String,
    /// Class, interface, or enum.
    pub kind: ClassKind,
    /// Class modifiers.
    pub modifiers: Modifiers,
    /// Class type parameters, order-sensitive.
    pub type_params: Vec<String>,
    /// Superclass name, if any.
    pub superclass: Option<String>,
    /// Implemented (or extended, for interfaces) interface names.
    pub interfaces: Vec<String>,
    /// Declared fields.
    pub fields: Vec<FieldDef>,
    /// Declared constructors.
    pub constructors: Vec<ConstructorDef>,
    /// Declared methods.
    pub methods: Vec<MethodDef>,
}

impl ClassDef {
    fn with_kind(name: impl Into<String>, kind: ClassKind) -> Self {
        Self {
            name: name.into(),
            kind,
            modifiers: Modifiers::none(),
            type_params: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Package-private class.
    pub fn class(name: impl Into<String>) -> Self {
        Self::with_kind(name, ClassKind::Class)
    }

    /// Public class.
    pub fn public_class(name: impl Into<String>) -> Self {
        Self::class(name).with(Modifier::Public)
    }

    /// Public interface.
    pub fn interface(name: impl Into<String>) -> Self {
        Self::with_kind(name, ClassKind::Interface)
            .with(Modifier::Public)
            .with(Modifier::Abstract)
    }

    /// Add a class modifier.
    #[must_use]
    pub fn with(mut self, modifier: Modifier) -> Self {
        self.modifiers = self.modifiers.with(modifier);
        self
    }

    /// Declare a class type parameter.
    #[must_use]
    pub fn type_param(mut self, name: impl Into<String>) -> Self {
        self.type_params.push(name.into());
        self
    }

    /// Set the superclass.
    #[must_use]
    pub fn extends(mut self, name: impl Into<String>) -> Self {
        self.superclass = Some(name.into());
        self
    }

    /// Add an interface.
    #[must_use]
    pub fn implements(mut self, name: impl Into<String>) -> Self {
        self.interfaces.push(name.into());
        self
    }

    /// Add a field.
    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add a constructor.
    #[must_use]
    pub fn constructor(mut self, constructor: ConstructorDef) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// Add a method.
    #[must_use]
    pub fn method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    /// Name after the last nesting separator.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('$').next().unwrap_or(&self.name)
    }
}

/// A class linked into a space: inherited members are resolved and
/// static storage is allocated.
pub struct Class {
    def: ClassDef,
    superclass: Option<Arc<Class>>,
    ancestors: BTreeSet<String>,
    instance_fields: Vec<FieldDef>,
    constructors: Vec<ConstructorDef>,
    methods: BTreeMap<Signature, MethodDef>,
    statics: Mutex<BTreeMap<String, Value>>,
    space: Weak<ClassSpace>,
}

impl Class {
    pub(crate) fn link(
        def: ClassDef,
        superclass: Option<Arc<Class>>,
        interfaces: &[Arc<Class>],
        space: Weak<ClassSpace>,
    ) -> Self {
        let mut ancestors = BTreeSet::new();
        ancestors.insert(def.name.clone());
        ancestors.extend(def.interfaces.iter().cloned());
        if let Some(name) = &def.superclass {
            ancestors.insert(name.clone());
        }

        let mut instance_fields = Vec::new();
        let mut methods = BTreeMap::new();

        if let Some(parent) = &superclass {
            ancestors.extend(parent.ancestors.iter().cloned());
            instance_fields.extend(parent.instance_fields.iter().cloned());
            methods.extend(
                parent
                    .methods
                    .iter()
                    .map(|(sig, m)| (sig.clone(), m.clone())),
            );
        }
        for iface in interfaces {
            ancestors.extend(iface.ancestors.iter().cloned());
            for (sig, m) in &iface.methods {
                methods.entry(sig.clone()).or_insert_with(|| m.clone());
            }
        }

        instance_fields.extend(
            def.fields
                .iter()
                .filter(|f| !f.modifiers.is_static())
                .cloned(),
        );
        for m in &def.methods {
            methods.insert(m.signature(), m.clone());
        }

        let statics = def
            .fields
            .iter()
            .filter(|f| f.modifiers.is_static())
            .map(|f| (f.name.clone(), f.initial.clone()))
            .collect();

        let constructors = if def.constructors.is_empty() && def.kind == ClassKind::Class {
            let mut implicit = ConstructorDef::new();
            if def.modifiers.is_public() {
                implicit = implicit.with(Modifier::Public);
            }
            vec![implicit]
        } else {
            def.constructors.clone()
        };

        Self {
            def,
            superclass,
            ancestors,
            instance_fields,
            constructors,
            methods,
            statics: Mutex::new(statics),
            space,
        }
    }

    /// Nested class name.
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// The declaration this class was linked from.
    pub fn def(&self) -> &ClassDef {
        &self.def
    }

    /// Class modifiers.
    pub fn modifiers(&self) -> &Modifiers {
        &self.def.modifiers
    }

    /// Superclass, when it is defined in the same space.
    pub fn superclass(&self) -> Option<&Arc<Class>> {
        self.superclass.as_ref()
    }

    /// Whether instances of this class may be stored where `name` is expected.
    pub fn is_subtype_of(&self, name: &str) -> bool {
        self.ancestors.contains(name)
    }

    /// Instance fields, inherited ones first.
    pub fn instance_fields(&self) -> &[FieldDef] {
        &self.instance_fields
    }

    /// Effective constructors, including the implicit no-arg one.
    pub fn constructors(&self) -> &[ConstructorDef] {
        &self.constructors
    }

    /// Constructor with exactly these parameter types.
    pub fn constructor(&self, params: &[TypeRef]) -> Option<&ConstructorDef> {
        self.constructors.iter().find(|c| c.params == params)
    }

    /// Method by signature, searching inherited members.
    pub fn method(&self, signature: &Signature) -> Option<&MethodDef> {
        self.methods.get(signature)
    }

    /// All methods visible on this class.
    pub fn methods(&self) -> impl Iterator<Item = &MethodDef> {
        self.methods.values()
    }

    /// Methods with a given name.
    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodDef> + 'a {
        self.methods.values().filter(move |m| m.name == name)
    }

    /// Field declaration (instance or static) by name, searching superclasses.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.def
            .fields
            .iter()
            .find(|f| f.name == name)
            .or_else(|| self.superclass.as_ref().and_then(|s| s.field(name)))
    }

    /// Read a static field, searching superclasses.
    pub fn static_get(&self, name: &str) -> Option<Value> {
        if let Some(value) = lock(&self.statics).get(name) {
            return Some(value.clone());
        }
        self.superclass.as_ref().and_then(|s| s.static_get(name))
    }

    /// Write a static field. Returns false if no class in the chain declares it.
    pub fn static_set(&self, name: &str, value: Value) -> bool {
        {
            let mut statics = lock(&self.statics);
            if let Some(slot) = statics.get_mut(name) {
                *slot = value;
                return true;
            }
        }
        match &self.superclass {
            Some(parent) => parent.static_set(name, value),
            None => false,
        }
    }

    /// Superclass chain starting with this class.
    pub fn chain(self: &Arc<Self>) -> Vec<Arc<Class>> {
        let mut chain = vec![Arc::clone(self)];
        let mut current = self.superclass.clone();
        while let Some(class) = current {
            current = class.superclass.clone();
            chain.push(class);
        }
        chain
    }

    /// The space this class was defined in.
    pub fn space(&self) -> Option<Arc<ClassSpace>> {
        self.space.upgrade()
    }

    /// Whether this class can be instantiated directly.
    pub fn is_instantiable(&self) -> bool {
        self.def.kind == ClassKind::Class && !self.def.modifiers.is_abstract()
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.def.name)
            .field("kind", &self.def.kind)
            .finish_non_exhaustive()
    }
}
