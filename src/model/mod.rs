//! Object model: class spaces, runtime values, and declaration shapes.
//!
//! Submitted and reference code are both expressed as classes defined in a
//! [`ClassSpace`]. The rest of the engine reaches that code only through the
//! [`ObjectModel`] capability trait.

pub mod class;
pub mod shape;
pub mod space;
pub mod types;
pub mod value;

pub use class::{
    zero_value, Class, ClassDef, ConstructorDef, FieldDef, MethodDef, MethodFn, Signature,
    CONSTRUCTOR_NAME,
};
pub use shape::{ClassShape, ExecutableShape, FieldShape};
pub use space::{Call, ClassSpace, ObjectModel};
pub use types::{source_name, ClassKind, Modifier, Modifiers, TypeRef};
pub use value::{Forward, ObjRef, Object, Thrown, Value};

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Failures while assembling a class space.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    /// A class with this name is already defined in the space.
    #[error("class {0} is already defined")]
    DuplicateClass(String),
}

/// Lock a mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
