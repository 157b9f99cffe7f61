//! Generator resolution and caching.

use super::defaults;
use super::scope::GenScope;
use crate::error::{GradeError, GradeResult};
use crate::model::{lock, ClassSpace, ObjectModel, Thrown, TypeRef, Value};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// A user-declared generator: `(scope, complexity, rng) -> value`.
pub type GenFn = Arc<dyn Fn(&GenScope<'_>, u32, &mut ChaCha8Rng) -> Result<Value, Thrown> + Send + Sync>;

/// Wrap a closure as a [`GenFn`].
pub fn gen_fn<F>(f: F) -> GenFn
where
    F: Fn(&GenScope<'_>, u32, &mut ChaCha8Rng) -> Result<Value, Thrown> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// How values of one type are produced.
#[derive(Clone)]
pub enum Strategy {
    /// Built-in scalar generator.
    Builtin(TypeRef),
    /// Array whose elements come from the inner strategy.
    Array(Box<Strategy>),
    /// User-declared generator.
    Custom(GenFn),
    /// Public zero-argument constructor of the named class.
    Construct(String),
}

impl Strategy {
    /// Produce one value in `scope`.
    pub fn generate(&self, scope: &GenScope<'_>, complexity: u32, rng: &mut ChaCha8Rng) -> Result<Value, Thrown> {
        match self {
            Strategy::Builtin(ty) => defaults::scalar(ty, complexity, scope.max_array_length(), rng)
                .ok_or_else(|| Thrown::new("IllegalStateException", format!("no built-in generator for {}", ty))),
            Strategy::Array(element) => {
                let len = defaults::array_length(complexity, scope.max_array_length(), rng);
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    let item_complexity = rng.gen_range(0..=complexity);
                    items.push(element.generate(scope, item_complexity, rng)?);
                }
                Ok(Value::Array(items))
            }
            Strategy::Custom(f) => f(scope, complexity, rng),
            Strategy::Construct(class) => scope.construct(class, &[], Vec::new()),
        }
    }
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Builtin(ty) => write!(f, "Builtin({})", ty),
            Strategy::Array(inner) => write!(f, "Array({:?})", inner),
            Strategy::Custom(_) => write!(f, "Custom"),
            Strategy::Construct(class) => write!(f, "Construct({})", class),
        }
    }
}

/// Declared case values for a type.
#[derive(Debug, Clone)]
pub enum Cases {
    /// Literal values.
    Values(Vec<Value>),
    /// A static array field on the reference class holding the values.
    Member(String),
}

/// Everything needed to produce inputs of one type.
#[derive(Debug, Clone)]
pub struct GeneratorDescriptor {
    /// The type.
    pub ty: TypeRef,
    /// Boundary inputs; `None` when there are none.
    pub edge: Option<Vec<Value>>,
    /// Representative inputs; `None` when there are none.
    pub simple: Option<Vec<Value>>,
    /// Random generation strategy.
    pub strategy: Strategy,
    /// Whether values can be produced by construction alone.
    pub constructible: bool,
}

impl GeneratorDescriptor {
    /// Produce one random value in `scope`.
    pub fn generate(&self, scope: &GenScope<'_>, complexity: u32, rng: &mut ChaCha8Rng) -> Result<Value, Thrown> {
        self.strategy.generate(scope, complexity, rng)
    }

    fn with_strategy(&self, strategy: Strategy) -> Self {
        Self {
            strategy,
            ..self.clone()
        }
    }
}

/// Declared generation inputs, before validation.
#[derive(Clone, Default)]
pub struct GeneratorConfig {
    /// Generators usable by name from specific parameter positions.
    pub named: BTreeMap<String, (TypeRef, GenFn)>,
    /// Generators covering every parameter of a type.
    pub custom: BTreeMap<TypeRef, GenFn>,
    /// Declared edge cases per type.
    pub edge: BTreeMap<TypeRef, Cases>,
    /// Declared simple cases per type.
    pub simple: BTreeMap<TypeRef, Cases>,
}

impl fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("named", &self.named.keys().collect::<Vec<_>>())
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .field("edge", &self.edge)
            .field("simple", &self.simple)
            .finish()
    }
}

/// Resolves a generation strategy per type, highest priority first:
/// a generator named for the parameter, a type-wide custom generator, a
/// built-in generator, and for the receiver class a zero-argument
/// constructor. Descriptors are built lazily and cached.
pub struct GeneratorRegistry {
    question: String,
    reference: Arc<ClassSpace>,
    receiver_class: String,
    max_array_length: u32,
    named: BTreeMap<String, (TypeRef, GenFn)>,
    custom: BTreeMap<TypeRef, GenFn>,
    edge: BTreeMap<TypeRef, Vec<Value>>,
    simple: BTreeMap<TypeRef, Vec<Value>>,
    cache: Mutex<BTreeMap<TypeRef, Arc<GeneratorDescriptor>>>,
}

impl GeneratorRegistry {
    /// Validate declared cases eagerly and build an empty cache.
    pub fn new(
        question: impl Into<String>,
        reference: Arc<ClassSpace>,
        receiver_class: impl Into<String>,
        config: GeneratorConfig,
        max_array_length: u32,
    ) -> GradeResult<Self> {
        let question = question.into();
        let receiver_class = receiver_class.into();
        let mut edge = BTreeMap::new();
        for (ty, cases) in config.edge {
            let values = load_cases(&question, &reference, &receiver_class, &ty, &cases, "edge")?;
            edge.insert(ty, values);
        }
        let mut simple = BTreeMap::new();
        for (ty, cases) in config.simple {
            let values = load_cases(&question, &reference, &receiver_class, &ty, &cases, "simple")?;
            simple.insert(ty, values);
        }
        Ok(Self {
            question,
            reference,
            receiver_class,
            max_array_length,
            named: config.named,
            custom: config.custom,
            edge,
            simple,
            cache: Mutex::new(BTreeMap::new()),
        })
    }

    /// Cap on generated array and string lengths.
    pub fn max_array_length(&self) -> u32 {
        self.max_array_length
    }

    /// Whether a named generator exists, and its type.
    pub fn named_type(&self, name: &str) -> Option<&TypeRef> {
        self.named.get(name).map(|(ty, _)| ty)
    }

    /// Descriptor for a type.
    pub fn resolve(&self, ty: &TypeRef) -> GradeResult<Arc<GeneratorDescriptor>> {
        if let Some(hit) = lock(&self.cache).get(ty) {
            return Ok(Arc::clone(hit));
        }
        let descriptor = Arc::new(self.build(ty)?);
        lock(&self.cache).insert(ty.clone(), Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Descriptor for one parameter, honoring a generator named for it.
    pub fn resolve_param(&self, ty: &TypeRef, named: Option<&str>) -> GradeResult<Arc<GeneratorDescriptor>> {
        let Some(name) = named else {
            return self.resolve(ty);
        };
        let (declared, f) = self.named.get(name).ok_or_else(|| {
            GradeError::configuration(&self.question, format!("no generator named {}", name))
        })?;
        if declared != ty {
            return Err(GradeError::configuration(
                &self.question,
                format!("generator {} produces {}, but the parameter is {}", name, declared, ty),
            ));
        }
        let base = self.cases_only(ty);
        Ok(Arc::new(base.with_strategy(Strategy::Custom(Arc::clone(f)))))
    }

    /// Resolve every parameter up front so a missing strategy fails before
    /// any test is generated.
    pub fn resolve_all(
        &self,
        params: &[TypeRef],
        named: &BTreeMap<usize, String>,
    ) -> GradeResult<Vec<Arc<GeneratorDescriptor>>> {
        params
            .iter()
            .enumerate()
            .map(|(i, ty)| self.resolve_param(ty, named.get(&i).map(String::as_str)))
            .collect()
    }

    /// Strategy for building receivers: a custom generator for the receiver
    /// class, else its public zero-argument constructor.
    pub fn receiver_strategy(&self) -> Option<Strategy> {
        let ty = TypeRef::class(self.receiver_class.clone());
        if let Some(f) = self.custom.get(&ty) {
            return Some(Strategy::Custom(Arc::clone(f)));
        }
        self.zero_arg_constructible(&self.receiver_class)
            .then(|| Strategy::Construct(self.receiver_class.clone()))
    }

    fn zero_arg_constructible(&self, class: &str) -> bool {
        self.reference.can_construct(class, &[])
            && self.reference.class(class).is_some_and(|c| {
                c.modifiers().is_public() && c.constructor(&[]).is_some_and(|k| k.modifiers.is_public())
            })
    }

    fn cases_only(&self, ty: &TypeRef) -> GeneratorDescriptor {
        let edge = match self.edge.get(ty) {
            Some(values) => non_empty(values.clone()),
            None => defaults::edge_cases(ty),
        };
        let simple = match self.simple.get(ty) {
            Some(values) => non_empty(values.clone()),
            None => defaults::simple_cases(ty),
        };
        GeneratorDescriptor {
            ty: ty.clone(),
            edge,
            simple,
            strategy: Strategy::Builtin(ty.clone()),
            constructible: true,
        }
    }

    fn build(&self, ty: &TypeRef) -> GradeResult<GeneratorDescriptor> {
        let base = self.cases_only(ty);
        let strategy = self.strategy_for(ty).ok_or_else(|| {
            GradeError::configuration(
                &self.question,
                format!("no generator available for type {}", ty),
            )
        })?;
        let constructible = match ty {
            TypeRef::Class(name) => self.zero_arg_constructible(name),
            _ => true,
        };
        Ok(GeneratorDescriptor {
            constructible,
            ..base.with_strategy(strategy)
        })
    }

    fn strategy_for(&self, ty: &TypeRef) -> Option<Strategy> {
        if let Some(f) = self.custom.get(ty) {
            return Some(Strategy::Custom(Arc::clone(f)));
        }
        if defaults::has_scalar(ty) {
            return Some(Strategy::Builtin(ty.clone()));
        }
        match ty {
            TypeRef::Array(element) => self
                .strategy_for(element)
                .map(|inner| Strategy::Array(Box::new(inner))),
            TypeRef::Class(name) if *name == self.receiver_class => self.receiver_strategy(),
            _ => None,
        }
    }
}

impl fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorRegistry")
            .field("question", &self.question)
            .field("receiver_class", &self.receiver_class)
            .field("cached", &lock(&self.cache).len())
            .finish_non_exhaustive()
    }
}

fn non_empty(values: Vec<Value>) -> Option<Vec<Value>> {
    (!values.is_empty()).then_some(values)
}

/// Turn declared cases into values, checking storage and type rules.
fn load_cases(
    question: &str,
    reference: &ClassSpace,
    owner: &str,
    ty: &TypeRef,
    cases: &Cases,
    kind: &str,
) -> GradeResult<Vec<Value>> {
    let values = match cases {
        Cases::Values(values) => values.clone(),
        Cases::Member(name) => {
            let class = reference.class(owner).ok_or_else(|| {
                GradeError::configuration(question, format!("reference class {} not found", owner))
            })?;
            let field = class.field(name).ok_or_else(|| {
                GradeError::configuration(question, format!("{} cases member {} does not exist", kind, name))
            })?;
            if !field.modifiers.is_static() {
                return Err(GradeError::configuration(
                    question,
                    format!("{} cases member {} must be static", kind, name),
                ));
            }
            if field.ty != TypeRef::array(ty.clone()) {
                return Err(GradeError::configuration(
                    question,
                    format!(
                        "{} cases member {} must be an array of {}, found {}",
                        kind, name, ty, field.ty
                    ),
                ));
            }
            match class.static_get(name) {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(GradeError::configuration(
                        question,
                        format!("{} cases member {} is null", kind, name),
                    ))
                }
            }
        }
    };
    for value in &values {
        if !value.conforms_to(ty) {
            return Err(GradeError::configuration(
                question,
                format!("{} case {} is not assignable to {}", kind, value, ty),
            ));
        }
        if value.contains_object() {
            return Err(GradeError::configuration(
                question,
                format!("{} cases for {} may not hold objects", kind, ty),
            ));
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassDef, FieldDef, Modifier};
    use rand::SeedableRng;

    fn space() -> Arc<ClassSpace> {
        let space = ClassSpace::new("reference");
        space
            .define(
                ClassDef::public_class("Q")
                    .field(
                        FieldDef::public("EDGES", TypeRef::array(TypeRef::Int))
                            .with(Modifier::Static)
                            .initial(vec![i32::MIN, i32::MAX]),
                    )
                    .field(FieldDef::public("NOT_STATIC", TypeRef::array(TypeRef::Int))),
            )
            .unwrap();
        space
    }

    fn registry(config: GeneratorConfig) -> GradeResult<GeneratorRegistry> {
        GeneratorRegistry::new("Q", space(), "Q", config, 16)
    }

    #[test]
    fn test_member_cases_replace_defaults() {
        let mut config = GeneratorConfig::default();
        config.edge.insert(TypeRef::Int, Cases::Member("EDGES".into()));
        let registry = registry(config).unwrap();
        let descriptor = registry.resolve(&TypeRef::Int).unwrap();
        assert_eq!(
            descriptor.edge,
            Some(vec![Value::Int(i32::MIN), Value::Int(i32::MAX)])
        );
        assert_eq!(descriptor.simple, defaults::simple_cases(&TypeRef::Int));
    }

    #[test]
    fn test_invalid_cases_fail_at_load() {
        let mut config = GeneratorConfig::default();
        config.edge.insert(TypeRef::Int, Cases::Member("NOT_STATIC".into()));
        assert!(matches!(registry(config), Err(GradeError::Configuration { .. })));

        let mut config = GeneratorConfig::default();
        config.simple.insert(TypeRef::Int, Cases::Values(vec![Value::from("x")]));
        let err = registry(config).unwrap_err();
        assert!(err.to_string().contains("not assignable to int"));
    }

    #[test]
    fn test_unknown_type_names_the_type() {
        let registry = registry(GeneratorConfig::default()).unwrap();
        let err = registry.resolve(&TypeRef::class("Widget")).unwrap_err();
        assert!(err.to_string().contains("Widget"));
    }

    #[test]
    fn test_custom_beats_builtin_and_named_beats_custom() {
        let mut config = GeneratorConfig::default();
        config
            .custom
            .insert(TypeRef::Int, gen_fn(|_, _, _| Ok(Value::Int(7))));
        config.named.insert(
            "odd".into(),
            (TypeRef::Int, gen_fn(|_, _, _| Ok(Value::Int(9)))),
        );
        let registry = registry(config).unwrap();
        let space = space();
        let scope = GenScope::new(&space, &registry);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let typed = registry.resolve(&TypeRef::Int).unwrap();
        assert_eq!(typed.generate(&scope, 50, &mut rng).unwrap(), Value::Int(7));
        let named = registry.resolve_param(&TypeRef::Int, Some("odd")).unwrap();
        assert_eq!(named.generate(&scope, 50, &mut rng).unwrap(), Value::Int(9));
        assert!(registry.resolve_param(&TypeRef::Long, Some("odd")).is_err());
    }

    #[test]
    fn test_arrays_respect_length_cap() {
        let registry = registry(GeneratorConfig::default()).unwrap();
        let space = space();
        let scope = GenScope::new(&space, &registry);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let descriptor = registry.resolve(&TypeRef::array(TypeRef::Int)).unwrap();
        let empty = descriptor.generate(&scope, 0, &mut rng).unwrap();
        assert_eq!(empty, Value::Array(vec![]));
        for _ in 0..50 {
            let value = descriptor.generate(&scope, 100, &mut rng).unwrap();
            let len = value.as_array().map(<[Value]>::len).unwrap_or(0);
            assert!((1..=16).contains(&len));
        }
    }

    #[test]
    fn test_receiver_falls_back_to_constructor() {
        let registry = registry(GeneratorConfig::default()).unwrap();
        assert!(matches!(registry.receiver_strategy(), Some(Strategy::Construct(_))));
    }
}
