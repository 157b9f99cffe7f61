//! Input generation: built-in generators, the per-question registry, and
//! declared-case enumeration.

pub mod cases;
pub mod defaults;
pub mod registry;
pub mod scope;

pub use cases::{ArgRecipe, CaseEnumerator, CaseMode};
pub use registry::{gen_fn, Cases, GenFn, GeneratorConfig, GeneratorDescriptor, GeneratorRegistry, Strategy};
pub use scope::GenScope;

use crate::model::{Thrown, Value};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

/// Build the arguments of one case on one side.
///
/// Fixed values are cloned; generated ones are drawn from a random source
/// seeded with `seed`, so both sides receive structurally identical inputs
/// built in their own class space.
pub fn materialize(
    scope: &GenScope<'_>,
    params: &[Arc<GeneratorDescriptor>],
    recipe: &[ArgRecipe],
    seed: u64,
) -> Result<Vec<Value>, Thrown> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    params
        .iter()
        .zip(recipe)
        .map(|(descriptor, arg)| match arg {
            ArgRecipe::Fixed(value) => Ok(value.clone()),
            ArgRecipe::Generate(complexity) => descriptor.generate(scope, *complexity, &mut rng),
        })
        .collect()
}

/// Built-in generator producing printable ASCII characters only.
pub fn ascii_chars() -> GenFn {
    gen_fn(|_, _, rng| Ok(Value::Char(defaults::ascii(rng))))
}

/// Built-in generator producing printable ASCII strings only.
pub fn ascii_strings() -> GenFn {
    gen_fn(|scope, complexity, rng| {
        use rand::Rng;
        let len = rng.gen_range(0..=complexity.min(scope.max_array_length()));
        Ok(Value::Str((0..len).map(|_| defaults::ascii(rng)).collect()))
    })
}
