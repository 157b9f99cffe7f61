//! Class representation providers.

use crate::model::{ClassShape, ClassSpace};
use std::sync::Arc;
use thiserror::Error;

/// A provider was asked about a class it is not responsible for.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("class {0} not found")]
pub struct ClassNotFound(pub String);

/// Given a class name, returns the representation backing it.
pub trait BytecodeProvider: Send + Sync {
    /// Declaration shape of `class`.
    fn shape_of(&self, class: &str) -> Result<ClassShape, ClassNotFound>;
}

/// Serves shapes straight from a class space.
#[derive(Debug, Clone)]
pub struct SpaceProvider {
    space: Arc<ClassSpace>,
}

impl SpaceProvider {
    /// Provider over `space`.
    pub fn new(space: Arc<ClassSpace>) -> Self {
        Self { space }
    }
}

impl BytecodeProvider for SpaceProvider {
    fn shape_of(&self, class: &str) -> Result<ClassShape, ClassNotFound> {
        self.space
            .shape(class)
            .ok_or_else(|| ClassNotFound(class.to_string()))
    }
}

/// Tries each provider in turn.
#[derive(Default)]
pub struct ChainProvider {
    providers: Vec<Box<dyn BytecodeProvider>>,
}

impl ChainProvider {
    /// Empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider.
    #[must_use]
    pub fn with(mut self, provider: impl BytecodeProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }
}

impl BytecodeProvider for ChainProvider {
    fn shape_of(&self, class: &str) -> Result<ClassShape, ClassNotFound> {
        self.providers
            .iter()
            .find_map(|p| p.shape_of(class).ok())
            .ok_or_else(|| ClassNotFound(class.to_string()))
    }
}
