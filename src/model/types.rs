//! Type descriptors, modifiers, and class kinds.
//!
//! Nested classes are named `Outer$Inner`; they render as `Outer.Inner`
//! wherever a type is shown to a person.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A declared type, as it appears in a field, parameter, or return position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRef {
    /// No value (method returns only).
    Void,
    /// `boolean`
    Boolean,
    /// `byte`
    Byte,
    /// `short`
    Short,
    /// `int`
    Int,
    /// `long`
    Long,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `char`
    Char,
    /// `String`
    String,
    /// An array of the element type.
    Array(Box<TypeRef>),
    /// A class declared in a class space, by fully nested name.
    Class(String),
    /// A type variable such as `T`.
    Var(String),
    /// The universal reference type.
    Object,
}

impl TypeRef {
    /// Array of `element`.
    pub fn array(element: TypeRef) -> Self {
        Self::Array(Box::new(element))
    }

    /// Class type by name.
    pub fn class(name: impl Into<String>) -> Self {
        Self::Class(name.into())
    }

    /// Whether values of this type are primitives.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Self::Boolean
                | Self::Byte
                | Self::Short
                | Self::Int
                | Self::Long
                | Self::Float
                | Self::Double
                | Self::Char
        )
    }

    /// Element type for arrays.
    pub fn element(&self) -> Option<&TypeRef> {
        match self {
            Self::Array(inner) => Some(inner),
            _ => None,
        }
    }

    /// Class name for class types.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Self::Class(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => write!(f, "void"),
            Self::Boolean => write!(f, "boolean"),
            Self::Byte => write!(f, "byte"),
            Self::Short => write!(f, "short"),
            Self::Int => write!(f, "int"),
            Self::Long => write!(f, "long"),
            Self::Float => write!(f, "float"),
            Self::Double => write!(f, "double"),
            Self::Char => write!(f, "char"),
            Self::String => write!(f, "String"),
            Self::Array(inner) => write!(f, "{}[]", inner),
            Self::Class(name) => write!(f, "{}", source_name(name)),
            Self::Var(name) => write!(f, "{}", name),
            Self::Object => write!(f, "Object"),
        }
    }
}

/// Human-facing spelling of a nested class name.
pub fn source_name(name: &str) -> String {
    name.replace('$', ".")
}

/// Member and class modifiers.
///
/// The declaration order of the variants is the canonical rendering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    /// `public`
    Public,
    /// `protected`
    Protected,
    /// `private`
    Private,
    /// `abstract`
    Abstract,
    /// `static`
    Static,
    /// `final`
    Final,
    /// `transient`
    Transient,
    /// `volatile`
    Volatile,
    /// `synchronized`
    Synchronized,
    /// `native`
    Native,
}

impl Modifier {
    /// Keyword spelling.
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Protected => "protected",
            Self::Private => "private",
            Self::Abstract => "abstract",
            Self::Static => "static",
            Self::Final => "final",
            Self::Transient => "transient",
            Self::Volatile => "volatile",
            Self::Synchronized => "synchronized",
            Self::Native => "native",
        }
    }
}

/// An ordered set of modifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Modifiers(BTreeSet<Modifier>);

impl Modifiers {
    /// No modifiers (package-private).
    pub fn none() -> Self {
        Self::default()
    }

    /// Only `public`.
    pub fn public() -> Self {
        Self::none().with(Modifier::Public)
    }

    /// `public static`.
    pub fn public_static() -> Self {
        Self::public().with(Modifier::Static)
    }

    /// Add a modifier.
    #[must_use]
    pub fn with(mut self, modifier: Modifier) -> Self {
        self.0.insert(modifier);
        self
    }

    /// Remove a modifier.
    #[must_use]
    pub fn without(mut self, modifier: Modifier) -> Self {
        self.0.remove(&modifier);
        self
    }

    /// Membership test.
    pub fn contains(&self, modifier: Modifier) -> bool {
        self.0.contains(&modifier)
    }

    /// `public` is present.
    pub fn is_public(&self) -> bool {
        self.contains(Modifier::Public)
    }

    /// `private` is present.
    pub fn is_private(&self) -> bool {
        self.contains(Modifier::Private)
    }

    /// `static` is present.
    pub fn is_static(&self) -> bool {
        self.contains(Modifier::Static)
    }

    /// `abstract` is present.
    pub fn is_abstract(&self) -> bool {
        self.contains(Modifier::Abstract)
    }

    /// Whether no modifier is present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keywords in canonical order.
    pub fn keywords(&self) -> Vec<String> {
        self.0.iter().map(|m| m.keyword().to_string()).collect()
    }
}

impl FromIterator<Modifier> for Modifiers {
    fn from_iter<I: IntoIterator<Item = Modifier>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keywords().join(" "))
    }
}

/// What kind of type a class declaration introduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassKind {
    /// A concrete or abstract class.
    Class,
    /// An interface.
    Interface,
    /// An enum class.
    Enum,
}

impl ClassKind {
    /// Noun phrase used in mismatch messages.
    pub const fn as_noun(self) -> &'static str {
        match self {
            Self::Class => "a class",
            Self::Interface => "an interface",
            Self::Enum => "an enum class",
        }
    }
}

impl fmt::Display for ClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class => write!(f, "class"),
            Self::Interface => write!(f, "interface"),
            Self::Enum => write!(f, "enum"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_display() {
        assert_eq!(TypeRef::Int.to_string(), "int");
        assert_eq!(TypeRef::array(TypeRef::array(TypeRef::Char)).to_string(), "char[][]");
        assert_eq!(TypeRef::class("Stack$Node").to_string(), "Stack.Node");
    }

    #[test]
    fn test_modifiers_render_in_canonical_order() {
        let mods: Modifiers = [Modifier::Final, Modifier::Static, Modifier::Public]
            .into_iter()
            .collect();
        assert_eq!(mods.to_string(), "public static final");
        assert!(Modifiers::none().to_string().is_empty());
    }

    #[test]
    fn test_primitive_classification() {
        assert!(TypeRef::Long.is_primitive());
        assert!(!TypeRef::String.is_primitive());
        assert!(!TypeRef::array(TypeRef::Int).is_primitive());
    }
}
