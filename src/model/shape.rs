//! Declaration-only class views.
//!
//! A [`ClassShape`] carries everything the structural checker compares and
//! nothing that executes. It is the raw class representation served by a
//! [`crate::env::BytecodeProvider`].

use super::class::{Class, ConstructorDef, FieldDef, MethodDef, Signature};
use super::types::{source_name, ClassKind, Modifiers, TypeRef};
use serde::{Deserialize, Serialize};

/// A field as declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldShape {
    /// Field name.
    pub name: String,
    /// Declared type.
    pub ty: TypeRef,
    /// Modifiers.
    pub modifiers: Modifiers,
}

impl FieldShape {
    /// Canonical text: modifiers, type, name.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.modifiers.is_empty() {
            out.push_str(&self.modifiers.to_string());
            out.push(' ');
        }
        out.push_str(&self.ty.to_string());
        out.push(' ');
        out.push_str(&self.name);
        out
    }
}

impl From<&FieldDef> for FieldShape {
    fn from(field: &FieldDef) -> Self {
        Self {
            name: field.name.clone(),
            ty: field.ty.clone(),
            modifiers: field.modifiers.clone(),
        }
    }
}

/// A method or constructor as declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutableShape {
    /// Method name, or the simple class name for constructors.
    pub name: String,
    /// Modifiers.
    pub modifiers: Modifiers,
    /// Type parameters.
    pub type_params: Vec<String>,
    /// Parameter types.
    pub params: Vec<TypeRef>,
    /// The last parameter is variadic.
    pub varargs: bool,
    /// Return type; absent for constructors.
    pub returns: Option<TypeRef>,
    /// Declared thrown failure kinds.
    pub throws: Vec<String>,
}

impl ExecutableShape {
    /// Shape of a method.
    pub fn method(method: &MethodDef) -> Self {
        Self {
            name: method.name.clone(),
            modifiers: method.modifiers.clone(),
            type_params: method.type_params.clone(),
            params: method.params.clone(),
            varargs: method.varargs,
            returns: Some(method.returns.clone()),
            throws: method.throws.clone(),
        }
    }

    /// Shape of a constructor of the class with simple name `class`.
    pub fn constructor(class: &str, constructor: &ConstructorDef) -> Self {
        Self {
            name: class.to_string(),
            modifiers: constructor.modifiers.clone(),
            type_params: Vec::new(),
            params: constructor.params.clone(),
            varargs: constructor.varargs,
            returns: None,
            throws: constructor.throws.clone(),
        }
    }

    /// Whether this is a constructor.
    pub fn is_constructor(&self) -> bool {
        self.returns.is_none()
    }

    /// Lookup key matching [`MethodDef::signature`] or
    /// [`ConstructorDef::signature`].
    pub fn signature(&self) -> Signature {
        if self.is_constructor() {
            Signature::constructor(self.params.iter().cloned())
        } else {
            Signature::new(self.name.clone(), self.params.iter().cloned())
        }
    }

    /// Canonical text, e.g. `public static <T> T[] copy(T[], int...) throws Oops`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.modifiers.is_empty() {
            out.push_str(&self.modifiers.to_string());
            out.push(' ');
        }
        if !self.type_params.is_empty() {
            out.push('<');
            out.push_str(&self.type_params.join(", "));
            out.push_str("> ");
        }
        if let Some(returns) = &self.returns {
            out.push_str(&returns.to_string());
            out.push(' ');
        }
        out.push_str(&self.name);
        let last = self.params.len().saturating_sub(1);
        let params: Vec<String> = self
            .params
            .iter()
            .enumerate()
            .map(|(i, ty)| match (self.varargs && i == last, ty.element()) {
                (true, Some(element)) => format!("{}...", element),
                _ => ty.to_string(),
            })
            .collect();
        out.push('(');
        out.push_str(&params.join(", "));
        out.push(')');
        if !self.throws.is_empty() {
            out.push_str(" throws ");
            let throws: Vec<String> = self.throws.iter().map(|t| source_name(t)).collect();
            out.push_str(&throws.join(", "));
        }
        out
    }
}

/// Everything declared by one class, without bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassShape {
    /// Nested class name.
    pub name: String,
    /// Class, interface, or enum.
    pub kind: ClassKind,
    /// Class modifiers.
    pub modifiers: Modifiers,
    /// Class type parameters.
    pub type_params: Vec<String>,
    /// Superclass name, if any.
    pub superclass: Option<String>,
    /// Interface names in declaration order.
    pub interfaces: Vec<String>,
    /// Declared fields.
    pub fields: Vec<FieldShape>,
    /// Declared constructors, including the implicit one.
    pub constructors: Vec<ExecutableShape>,
    /// Declared methods.
    pub methods: Vec<ExecutableShape>,
    /// Names of directly nested public classes.
    pub inner_classes: Vec<String>,
}

impl ClassShape {
    /// Capture the shape of a linked class.
    pub fn of(class: &Class, inner_classes: Vec<String>) -> Self {
        let def = class.def();
        let simple = def.simple_name();
        Self {
            name: def.name.clone(),
            kind: def.kind,
            modifiers: def.modifiers.clone(),
            type_params: def.type_params.clone(),
            superclass: def.superclass.clone(),
            interfaces: def.interfaces.clone(),
            fields: def.fields.iter().map(FieldShape::from).collect(),
            constructors: class
                .constructors()
                .iter()
                .map(|c| ExecutableShape::constructor(simple, c))
                .collect(),
            methods: def.methods.iter().map(ExecutableShape::method).collect(),
            inner_classes,
        }
    }

    /// Name after the last nesting separator.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('$').next().unwrap_or(&self.name)
    }

    /// Public fields.
    pub fn public_fields(&self) -> impl Iterator<Item = &FieldShape> {
        self.fields.iter().filter(|f| f.modifiers.is_public())
    }

    /// Public methods followed by public constructors.
    pub fn public_executables(&self) -> impl Iterator<Item = &ExecutableShape> {
        self.methods
            .iter()
            .chain(self.constructors.iter())
            .filter(|e| e.modifiers.is_public())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::Modifier;

    #[test]
    fn test_render_method_with_everything() {
        let shape = ExecutableShape {
            name: "copy".into(),
            modifiers: Modifiers::public_static(),
            type_params: vec!["T".into()],
            params: vec![
                TypeRef::array(TypeRef::Var("T".into())),
                TypeRef::array(TypeRef::Int),
            ],
            varargs: true,
            returns: Some(TypeRef::array(TypeRef::Var("T".into()))),
            throws: vec!["Box$Oops".into()],
        };
        assert_eq!(
            shape.render(),
            "public static <T> T[] copy(T[], int...) throws Box.Oops"
        );
    }

    #[test]
    fn test_render_constructor_and_field() {
        let ctor = ExecutableShape::constructor(
            "Counter",
            &ConstructorDef::public().param(TypeRef::Int),
        );
        assert_eq!(ctor.render(), "public Counter(int)");
        assert!(ctor.signature().is_constructor());

        let field = FieldShape::from(
            &FieldDef::public("LIMIT", TypeRef::Long)
                .with(Modifier::Static)
                .with(Modifier::Final),
        );
        assert_eq!(field.render(), "public static final long LIMIT");
    }
}
