//! Runtime values, objects, and thrown failures.

use super::class::{Class, Signature};
use super::lock;
use super::types::TypeRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Shared handle to a live object. Identity is pointer identity.
pub type ObjRef = Arc<Object>;

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    /// The null reference.
    Null,
    /// `boolean`
    Bool(bool),
    /// `byte`
    Byte(i8),
    /// `short`
    Short(i16),
    /// `int`
    Int(i32),
    /// `long`
    Long(i64),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
    /// `char`
    Char(char),
    /// `String`
    Str(String),
    /// An array; arrays are passed by value.
    Array(Vec<Value>),
    /// An object handle.
    Object(ObjRef),
}

impl Value {
    /// Whether this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The object handle, if this is an object.
    pub fn as_object(&self) -> Option<&ObjRef> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// The int payload.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The long payload.
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// The double payload.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// The boolean payload.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// The string payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    /// The array elements.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Short name of the runtime type, used in failure messages.
    pub fn type_name(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(_) => "boolean".to_string(),
            Self::Byte(_) => "byte".to_string(),
            Self::Short(_) => "short".to_string(),
            Self::Int(_) => "int".to_string(),
            Self::Long(_) => "long".to_string(),
            Self::Float(_) => "float".to_string(),
            Self::Double(_) => "double".to_string(),
            Self::Char(_) => "char".to_string(),
            Self::Str(_) => "String".to_string(),
            Self::Array(_) => "array".to_string(),
            Self::Object(obj) => TypeRef::class(obj.class_name()).to_string(),
        }
    }

    /// Whether this value may be stored where `ty` is declared.
    pub fn conforms_to(&self, ty: &TypeRef) -> bool {
        match (ty, self) {
            (TypeRef::Void, _) => false,
            (TypeRef::Boolean, Self::Bool(_))
            | (TypeRef::Byte, Self::Byte(_))
            | (TypeRef::Short, Self::Short(_))
            | (TypeRef::Int, Self::Int(_))
            | (TypeRef::Long, Self::Long(_))
            | (TypeRef::Float, Self::Float(_))
            | (TypeRef::Double, Self::Double(_))
            | (TypeRef::Char, Self::Char(_))
            | (TypeRef::String, Self::Str(_)) => true,
            (TypeRef::String | TypeRef::Array(_) | TypeRef::Class(_), Self::Null) => true,
            (TypeRef::Array(element), Self::Array(items)) => {
                items.iter().all(|item| item.conforms_to(element))
            }
            (TypeRef::Class(name), Self::Object(obj)) => obj.class().is_subtype_of(name),
            (TypeRef::Var(_) | TypeRef::Object, _) => true,
            _ => false,
        }
    }

    /// Whether this value holds an object anywhere inside it.
    pub fn contains_object(&self) -> bool {
        match self {
            Self::Object(_) => true,
            Self::Array(items) => items.iter().any(Value::contains_object),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Byte(a), Self::Byte(b)) => a == b,
            (Self::Short(a), Self::Short(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Long(a), Self::Long(b)) => a == b,
            // Boxed floating point equality: every NaN equals every NaN, 0.0 differs from -0.0.
            (Self::Float(a), Self::Float(b)) => (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits(),
            (Self::Double(a), Self::Double(b)) => (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits(),
            (Self::Char(a), Self::Char(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Byte(v) => write!(f, "{}", v),
            Self::Short(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Long(v) => write!(f, "{}L", v),
            Self::Float(v) => write!(f, "{:?}f", v),
            Self::Double(v) => write!(f, "{:?}", v),
            Self::Char(v) => write!(f, "{:?}", v),
            Self::Str(v) => write!(f, "{:?}", v),
            Self::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Self::Object(obj) => write!(
                f,
                "{}@{:x}",
                TypeRef::class(obj.class_name()),
                obj.identity()
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Self::Char(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<ObjRef> for Value {
    fn from(v: ObjRef) -> Self {
        Self::Object(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

/// A failure thrown by invoked code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thrown {
    /// Failure class name, e.g. `ArithmeticException`.
    pub kind: String,
    /// Optional detail message.
    pub message: Option<String>,
}

impl Thrown {
    /// Failure with a message.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: Some(message.into()),
        }
    }

    /// Failure without a message.
    pub fn bare(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: None,
        }
    }

    /// Null receiver or argument.
    pub fn null_pointer() -> Self {
        Self::bare("NullPointerException")
    }

    /// Wrongly typed value.
    pub fn class_cast(message: impl Into<String>) -> Self {
        Self::new("ClassCastException", message)
    }

    /// Rejected argument.
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::new("IllegalArgumentException", message)
    }

    /// Member lookup failed.
    pub fn no_such_method(message: impl Into<String>) -> Self {
        Self::new("NoSuchMethodError", message)
    }

    /// Access to a member the caller may not see.
    pub fn illegal_access(message: impl Into<String>) -> Self {
        Self::new("IllegalAccessError", message)
    }

    /// Converted from a panic in invoked code.
    pub fn panic(message: impl Into<String>) -> Self {
        Self::new("panic", message)
    }
}

impl fmt::Display for Thrown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.kind, message),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Forwards calls made on a substitute object to the object it stands for.
pub trait Forward: Send + Sync {
    /// Invoke `signature` on the behavior object behind `proxy`.
    fn forward(
        &self,
        proxy: &ObjRef,
        signature: &Signature,
        args: Vec<Value>,
    ) -> Result<Value, Thrown>;
}

pub(crate) struct Delegate {
    pub(crate) behavior: ObjRef,
    pub(crate) forwarder: Arc<dyn Forward>,
}

/// A live object: a class plus field storage.
///
/// Substitute objects produced by the mirror layer also carry a delegate;
/// method calls on them are forwarded instead of dispatched locally.
pub struct Object {
    class: Arc<Class>,
    fields: Mutex<BTreeMap<String, Value>>,
    delegate: Option<Delegate>,
}

impl Object {
    pub(crate) fn new(class: Arc<Class>, fields: BTreeMap<String, Value>) -> Self {
        Self {
            class,
            fields: Mutex::new(fields),
            delegate: None,
        }
    }

    pub(crate) fn substitute(
        class: Arc<Class>,
        fields: BTreeMap<String, Value>,
        delegate: Delegate,
    ) -> Self {
        Self {
            class,
            fields: Mutex::new(fields),
            delegate: Some(delegate),
        }
    }

    /// Runtime class.
    pub fn class(&self) -> &Arc<Class> {
        &self.class
    }

    /// Runtime class name.
    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    /// Read a field.
    pub fn get(&self, name: &str) -> Option<Value> {
        lock(&self.fields).get(name).cloned()
    }

    /// Write a field. Returns false if the object has no such field.
    pub fn set(&self, name: &str, value: Value) -> bool {
        let mut fields = lock(&self.fields);
        match fields.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Snapshot of the public instance fields, in declaration order.
    pub fn public_fields(&self) -> Vec<(String, Value)> {
        let fields = lock(&self.fields);
        self.class
            .instance_fields()
            .iter()
            .filter(|f| f.modifiers.is_public())
            .filter_map(|f| fields.get(&f.name).map(|v| (f.name.clone(), v.clone())))
            .collect()
    }

    /// The object this substitute forwards to, if it is one.
    pub fn behavior(&self) -> Option<&ObjRef> {
        self.delegate.as_ref().map(|d| &d.behavior)
    }

    /// Whether this object is a mirror substitute.
    pub fn is_substitute(&self) -> bool {
        self.delegate.is_some()
    }

    pub(crate) fn delegate(&self) -> Option<&Delegate> {
        self.delegate.as_ref()
    }

    /// Address-based identity.
    pub fn identity(self: &Arc<Self>) -> usize {
        Arc::as_ptr(self) as usize
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.class.name())
            .field("substitute", &self.is_substitute())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_equality_is_bitwise() {
        assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
        assert_ne!(Value::Double(0.0), Value::Double(-0.0));
        assert_ne!(Value::Int(1), Value::Long(1));
    }

    #[test]
    fn test_conformance() {
        assert!(Value::Int(3).conforms_to(&TypeRef::Int));
        assert!(!Value::Int(3).conforms_to(&TypeRef::Long));
        assert!(Value::Null.conforms_to(&TypeRef::String));
        assert!(!Value::Null.conforms_to(&TypeRef::Int));
        let arr = Value::from(vec![1, 2, 3]);
        assert!(arr.conforms_to(&TypeRef::array(TypeRef::Int)));
        assert!(!arr.conforms_to(&TypeRef::array(TypeRef::Char)));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from(vec![1, 2]).to_string(), "[1, 2]");
        assert_eq!(Value::from("hi").to_string(), "\"hi\"");
        assert_eq!(Thrown::new("ArithmeticException", "/ by zero").to_string(), "ArithmeticException: / by zero");
    }
}
