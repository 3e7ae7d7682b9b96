//! Construction policies.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::container::Container;
use crate::error::{BeanError, BeanResult};
use crate::handle::{AnyArc, BeanHandle};
use crate::value::{Value, ValueSource};

pub(crate) type DefaultFn = Arc<dyn Fn() -> AnyArc + Send + Sync>;
pub(crate) type ConstructorFn = Arc<dyn Fn(&ResolvedArguments) -> BeanResult<AnyArc> + Send + Sync>;
pub(crate) type FactoryMethodFn = Arc<dyn Fn(Option<&BeanHandle>, &ResolvedArguments) -> BeanResult<AnyArc> + Send + Sync>;
pub(crate) type SupplierFn = Arc<dyn Fn(&Container) -> BeanResult<AnyArc> + Send + Sync>;

/// How the raw object of a definition is constructed.
///
/// Arguments of [`Constructor`](Instantiation::Constructor) and
/// [`FactoryMethod`](Instantiation::FactoryMethod) are resolved before the
/// object exists, so a cycle running through them cannot be broken by early
/// exposure and is reported as a circular dependency.
#[derive(Clone)]
pub enum Instantiation {
    /// `T::default()`
    DefaultConstructor(DefaultFn),
    /// Ordered arguments resolved, then handed to the builder closure
    Constructor { args: Vec<ValueSource>, build: ConstructorFn },
    /// Method on another (fully created) bean, or a free function when `factory_bean` is `None`
    FactoryMethod {
        factory_bean: Option<String>,
        args: Vec<ValueSource>,
        method: FactoryMethodFn,
    },
    /// Closure receiving the container
    Supplier(SupplierFn),
}

impl Instantiation {
    pub fn kind(&self) -> &'static str {
        match self {
            Instantiation::DefaultConstructor(_) => "default-constructor",
            Instantiation::Constructor { .. } => "constructor",
            Instantiation::FactoryMethod { .. } => "factory-method",
            Instantiation::Supplier(_) => "supplier",
        }
    }

    /// Arguments resolved before construction.
    pub fn arguments(&self) -> &[ValueSource] {
        match self {
            Instantiation::Constructor { args, .. } | Instantiation::FactoryMethod { args, .. } => args,
            _ => &[],
        }
    }

    /// `true` if both describe the same construction: same kind, same factory
    /// bean and the same closure.
    pub fn same_policy(&self, other: &Instantiation) -> bool {
        match (self, other) {
            (Instantiation::DefaultConstructor(a), Instantiation::DefaultConstructor(b)) => Arc::ptr_eq(a, b),
            (Instantiation::Constructor { build: a, .. }, Instantiation::Constructor { build: b, .. }) => Arc::ptr_eq(a, b),
            (
                Instantiation::FactoryMethod { factory_bean: fa, method: a, .. },
                Instantiation::FactoryMethod { factory_bean: fb, method: b, .. },
            ) => fa == fb && Arc::ptr_eq(a, b),
            (Instantiation::Supplier(a), Instantiation::Supplier(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Instantiation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instantiation::FactoryMethod { factory_bean, args, .. } => f
                .debug_struct("FactoryMethod")
                .field("factory_bean", factory_bean)
                .field("args", &args.len())
                .finish(),
            Instantiation::Constructor { args, .. } => f.debug_struct("Constructor").field("args", &args.len()).finish(),
            other => f.write_str(other.kind()),
        }
    }
}

/// Constructor or factory-method arguments after resolution.
///
/// ```rust
/// use std::sync::Arc;
/// use ferrous_beans::{BeanDefinition, BeanReference, Container, ValueSource};
///
/// #[derive(Default)]
/// struct Engine;
///
/// struct Car {
///     engine: Arc<Engine>,
///     seats: i64,
/// }
///
/// let container = Container::new();
/// container
///     .register_definition("engine", BeanDefinition::builder::<Engine>().default_constructor().build())
///     .unwrap();
/// container
///     .register_definition(
///         "car",
///         BeanDefinition::builder::<Car>()
///             .constructor(
///                 [BeanReference::to("engine").into(), ValueSource::literal(4)],
///                 |args| Ok(Car { engine: args.bean::<Engine>(0)?, seats: args.integer(1)? }),
///             )
///             .build(),
///     )
///     .unwrap();
///
/// let car = container.get_bean::<Car>("car").unwrap();
/// assert_eq!(car.seats, 4);
/// assert!(Arc::ptr_eq(&car.engine, &container.get_bean::<Engine>("engine").unwrap()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResolvedArguments {
    values: Vec<Value>,
}

impl ResolvedArguments {
    pub(crate) fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> BeanResult<&Value> {
        self.values
            .get(index)
            .ok_or_else(|| BeanError::msg(format!("missing argument #{} ({} resolved)", index, self.values.len())))
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Bean argument viewed as `T`; errors when absent or of another type.
    pub fn bean<T: Any + Send + Sync>(&self, index: usize) -> BeanResult<Arc<T>> {
        match self.get(index)? {
            Value::Bean(handle) => handle.require::<T>(),
            Value::Object(obj) => obj.clone().downcast::<T>().map_err(|_| mismatch::<T>(index, "object")),
            other => Err(mismatch::<T>(index, other.kind())),
        }
    }

    /// Bean argument viewed as `I` (usually `dyn Trait`).
    pub fn bean_as<I: ?Sized + Send + Sync + 'static>(&self, index: usize) -> BeanResult<Arc<I>> {
        match self.get(index)? {
            Value::Bean(handle) => handle.require_as::<I>(),
            other => Err(mismatch::<I>(index, other.kind())),
        }
    }

    /// Optional bean argument: `Null` (an absent optional reference) maps to `None`.
    pub fn optional_bean<T: Any + Send + Sync>(&self, index: usize) -> BeanResult<Option<Arc<T>>> {
        match self.get(index)? {
            Value::Null => Ok(None),
            _ => self.bean::<T>(index).map(Some),
        }
    }

    pub fn integer(&self, index: usize) -> BeanResult<i64> {
        let value = self.get(index)?;
        value.as_i64().ok_or_else(|| mismatch::<i64>(index, value.kind()))
    }

    pub fn float(&self, index: usize) -> BeanResult<f64> {
        let value = self.get(index)?;
        value.as_f64().ok_or_else(|| mismatch::<f64>(index, value.kind()))
    }

    pub fn boolean(&self, index: usize) -> BeanResult<bool> {
        let value = self.get(index)?;
        value.as_bool().ok_or_else(|| mismatch::<bool>(index, value.kind()))
    }

    pub fn string(&self, index: usize) -> BeanResult<String> {
        let value = self.get(index)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| mismatch::<String>(index, value.kind()))
    }
}

fn mismatch<T: ?Sized>(index: usize, actual: &str) -> BeanError {
    BeanError::msg(format!(
        "argument #{} is a {} value, {} was required",
        index,
        actual,
        std::any::type_name::<T>()
    ))
}
