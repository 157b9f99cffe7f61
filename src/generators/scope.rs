//! What a custom generator may touch while it runs.

use super::registry::GeneratorRegistry;
use crate::model::{ClassSpace, ObjRef, ObjectModel, Signature, Thrown, TypeRef, Value};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

/// Generation context for one side of a run.
///
/// Generators run once against the reference space and once against the
/// submission space with the same random seed. Only public members are
/// reachable; anything else raises `IllegalAccessError`, because a
/// generator that depends on private members cannot be replayed against a
/// submission.
pub struct GenScope<'a> {
    space: &'a Arc<ClassSpace>,
    registry: &'a GeneratorRegistry,
}

impl<'a> GenScope<'a> {
    pub(crate) fn new(space: &'a Arc<ClassSpace>, registry: &'a GeneratorRegistry) -> Self {
        Self { space, registry }
    }

    /// Label of the space values are generated in.
    pub fn side(&self) -> &str {
        self.space.label()
    }

    /// Largest array or string length generators should produce.
    pub fn max_array_length(&self) -> u32 {
        self.registry.max_array_length()
    }

    /// Generate a value of `ty` with whatever strategy the registry resolves.
    pub fn generate(&self, ty: &TypeRef, complexity: u32, rng: &mut ChaCha8Rng) -> Result<Value, Thrown> {
        let descriptor = self
            .registry
            .resolve(ty)
            .map_err(|err| Thrown::new("IllegalStateException", err.to_string()))?;
        descriptor.generate(self, complexity, rng)
    }

    /// Construct through a public constructor of a public class.
    pub fn construct(&self, class: &str, params: &[TypeRef], args: Vec<Value>) -> Result<Value, Thrown> {
        let target = self
            .space
            .class(class)
            .ok_or_else(|| Thrown::new("NoClassDefFoundError", class))?;
        if !target.modifiers().is_public() {
            return Err(Thrown::illegal_access(format!("class {} is not public", class)));
        }
        match target.constructor(params) {
            Some(c) if c.modifiers.is_public() => {}
            Some(_) => {
                return Err(Thrown::illegal_access(format!(
                    "{} is not public",
                    Signature::constructor(params.iter().cloned())
                )))
            }
            None => {
                return Err(Thrown::no_such_method(
                    Signature::constructor(params.iter().cloned()).to_string(),
                ))
            }
        }
        self.space.construct(class, params, args)
    }

    /// Call a public method.
    pub fn invoke(
        &self,
        receiver: Option<&Value>,
        class: &str,
        signature: &Signature,
        args: Vec<Value>,
    ) -> Result<Value, Thrown> {
        let target = self
            .space
            .class(class)
            .ok_or_else(|| Thrown::new("NoClassDefFoundError", class))?;
        let method = target
            .method(signature)
            .ok_or_else(|| Thrown::no_such_method(format!("{}.{}", class, signature)))?;
        if !method.modifiers.is_public() {
            return Err(Thrown::illegal_access(format!("{}.{} is not public", class, signature)));
        }
        self.space.invoke(receiver, class, signature, args)
    }

    /// Read a public field.
    pub fn get(&self, obj: &ObjRef, name: &str) -> Result<Value, Thrown> {
        self.check_field(obj, name)?;
        self.space.read_field(Some(obj), obj.class_name(), name)
    }

    /// Write a public field.
    pub fn set(&self, obj: &ObjRef, name: &str, value: Value) -> Result<(), Thrown> {
        self.check_field(obj, name)?;
        self.space.write_field(Some(obj), obj.class_name(), name, value)
    }

    fn check_field(&self, obj: &ObjRef, name: &str) -> Result<(), Thrown> {
        match obj.class().field(name) {
            Some(field) if field.modifiers.is_public() => Ok(()),
            Some(_) => Err(Thrown::illegal_access(format!(
                "field {}.{} is not public",
                obj.class_name(),
                name
            ))),
            None => Err(Thrown::new("NoSuchFieldError", name)),
        }
    }
}
