//! Error types for the bean container.

use std::fmt;
use std::sync::Arc;

/// Container errors
///
/// Represents the failure conditions of definition registration, candidate
/// resolution, bean creation and teardown. Creation failures are chained: the
/// outermost error names the bean whose creation was aborted and
/// [`source`](std::error::Error::source) walks down to the triggering cause.
///
/// # Examples
///
/// ```rust
/// use ferrous_beans::{BeanError, Container};
///
/// let container = Container::new();
/// match container.get_instance("missing") {
///     Err(BeanError::NoSuchDefinition { name, .. }) => {
///         assert_eq!(name.as_deref(), Some("missing"));
///     }
///     _ => unreachable!(),
/// }
/// ```
///
/// ```rust
/// use ferrous_beans::BeanError;
///
/// let circular = BeanError::CircularDependency(vec!["a".into(), "b".into(), "a".into()]);
/// let wrapped = BeanError::creation("a", circular);
///
/// assert!(wrapped.is_circular());
/// println!("Error: {}", wrapped);
/// ```
#[derive(Debug, Clone)]
pub enum BeanError {
    /// Lookup by name or type found nothing and the dependency was required
    NoSuchDefinition {
        name: Option<String>,
        required_type: Option<&'static str>,
        message: String,
    },
    /// More than one equally ranked candidate matched a type-based lookup
    AmbiguousDefinition {
        required_type: &'static str,
        candidates: Vec<String>,
        message: String,
    },
    /// A definition (or alias) already exists under the name and overriding is disabled
    DefinitionOverride { name: String, existing: String },
    /// A definition is malformed (empty name, abstract instantiation, bad parent, ...)
    InvalidDefinition { name: String, reason: String },
    /// A required property or constructor argument could not be resolved
    UnsatisfiedDependency {
        bean: String,
        injection_point: String,
        cause: Box<BeanError>,
    },
    /// Construction-time cycle that early exposure cannot break (includes path)
    CircularDependency(Vec<String>),
    /// Failure while instantiating, populating or initializing the named bean
    BeanCreation { name: String, cause: Box<BeanError> },
    /// Reentrant request for a bean that is mid-construction
    CurrentlyInCreation(String),
    /// The created object cannot be viewed as the requested type
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: String,
    },
    /// A definition references a scope that was never registered
    NoSuchScope { name: String, scope: String },
    /// Creation attempted while the container is being destroyed or is closed
    CreationNotAllowed(String),
    /// A destroy callback or destruction-aware post-processor failed
    Destruction { name: String, message: String },
    /// Maximum nested creation depth exceeded
    DepthExceeded(usize),
    /// The container or a component is in a state that does not allow the operation
    IllegalState(String),
    /// Failure reported by user code (callbacks, factories, collaborators)
    Message(String),
    /// Foreign error reported by user code
    Other(Arc<dyn std::error::Error + Send + Sync>),
}

impl BeanError {
    /// Creates a [`BeanError::Message`] from user code.
    pub fn msg(message: impl Into<String>) -> Self {
        BeanError::Message(message.into())
    }

    /// Wraps a foreign error.
    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        BeanError::Other(Arc::new(error))
    }

    /// Not-found error for a bean name.
    pub fn no_such_name(name: impl Into<String>) -> Self {
        let name = name.into();
        BeanError::NoSuchDefinition {
            message: format!("no bean named '{}' is defined", name),
            name: Some(name),
            required_type: None,
        }
    }

    /// Not-found error for a type-based lookup.
    pub fn no_such_type(required_type: &'static str, message: impl Into<String>) -> Self {
        BeanError::NoSuchDefinition {
            name: None,
            required_type: Some(required_type),
            message: message.into(),
        }
    }

    /// Wraps `cause` as a creation failure of `name`.
    ///
    /// A cause that already is a creation failure of the same bean is returned
    /// unchanged so that a failure is reported once per bean in the chain.
    pub fn creation(name: impl Into<String>, cause: BeanError) -> Self {
        let name = name.into();
        match cause {
            BeanError::BeanCreation { name: ref inner, .. } if *inner == name => cause,
            other => BeanError::BeanCreation {
                name,
                cause: Box::new(other),
            },
        }
    }

    /// Wraps `cause` as an unresolvable injection point of `bean`.
    pub fn unsatisfied(bean: impl Into<String>, injection_point: impl Into<String>, cause: BeanError) -> Self {
        BeanError::UnsatisfiedDependency {
            bean: bean.into(),
            injection_point: injection_point.into(),
            cause: Box::new(cause),
        }
    }

    /// Direct nested cause, if this error wraps another container error.
    pub fn cause(&self) -> Option<&BeanError> {
        match self {
            BeanError::UnsatisfiedDependency { cause, .. } | BeanError::BeanCreation { cause, .. } => Some(cause),
            _ => None,
        }
    }

    /// Iterates over this error and all nested causes, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = &BeanError> {
        std::iter::successors(Some(self), |e| e.cause())
    }

    /// Innermost error of the chain.
    pub fn root_cause(&self) -> &BeanError {
        let mut current = self;
        while let Some(next) = current.cause() {
            current = next;
        }
        current
    }

    /// Finds the first error in the chain matching `predicate`.
    pub fn find(&self, predicate: impl Fn(&BeanError) -> bool) -> Option<&BeanError> {
        self.chain().find(|e| predicate(e))
    }

    pub fn is_circular(&self) -> bool {
        self.find(|e| matches!(e, BeanError::CircularDependency(_))).is_some()
    }

    pub fn is_no_such_definition(&self) -> bool {
        self.find(|e| matches!(e, BeanError::NoSuchDefinition { .. })).is_some()
    }

    pub fn is_ambiguous(&self) -> bool {
        self.find(|e| matches!(e, BeanError::AmbiguousDefinition { .. })).is_some()
    }

    pub fn is_currently_in_creation(&self) -> bool {
        self.find(|e| matches!(e, BeanError::CurrentlyInCreation(_))).is_some()
    }

    pub fn is_unsatisfied(&self) -> bool {
        self.find(|e| matches!(e, BeanError::UnsatisfiedDependency { .. })).is_some()
    }
}

impl fmt::Display for BeanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeanError::NoSuchDefinition { message, .. } => write!(f, "No such bean definition: {}", message),
            BeanError::AmbiguousDefinition { message, candidates, .. } => {
                write!(f, "Ambiguous bean definition: {} (candidates: {})", message, candidates.join(", "))
            }
            BeanError::DefinitionOverride { name, existing } => {
                write!(f, "Cannot register '{}': already bound to {} and overriding is disabled", name, existing)
            }
            BeanError::InvalidDefinition { name, reason } => write!(f, "Invalid bean definition '{}': {}", name, reason),
            BeanError::UnsatisfiedDependency { bean, injection_point, cause } => {
                write!(f, "Unsatisfied dependency of '{}' through {}: {}", bean, injection_point, cause)
            }
            BeanError::CircularDependency(path) => {
                write!(f, "Circular dependency: {}", path.join(" -> "))
            }
            BeanError::BeanCreation { name, cause } => write!(f, "Error creating bean '{}': {}", name, cause),
            BeanError::CurrentlyInCreation(name) => {
                write!(f, "Bean '{}' is currently in creation", name)
            }
            BeanError::TypeMismatch { name, expected, actual } => {
                write!(f, "Bean '{}' is of type {} but {} was required", name, actual, expected)
            }
            BeanError::NoSuchScope { name, scope } => {
                write!(f, "No scope registered for name '{}' (required by '{}')", scope, name)
            }
            BeanError::CreationNotAllowed(name) => {
                write!(f, "Creation of '{}' not allowed while the container is shutting down", name)
            }
            BeanError::Destruction { name, message } => write!(f, "Destroying '{}' failed: {}", name, message),
            BeanError::DepthExceeded(depth) => write!(f, "Max creation depth {} exceeded", depth),
            BeanError::IllegalState(msg) => write!(f, "Illegal state: {}", msg),
            BeanError::Message(msg) => f.write_str(msg),
            BeanError::Other(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for BeanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BeanError::UnsatisfiedDependency { cause, .. } | BeanError::BeanCreation { cause, .. } => Some(cause.as_ref()),
            BeanError::Other(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// Result type for container operations
///
/// A convenience alias for `Result<T, BeanError>` used throughout ferrous-beans.
///
/// # Examples
///
/// ```rust
/// use ferrous_beans::{BeanResult, BeanError};
///
/// fn open_pool() -> BeanResult<u32> {
///     Ok(8)
/// }
///
/// fn failing_callback() -> BeanResult<()> {
///     Err(BeanError::msg("connection refused"))
/// }
///
/// assert_eq!(open_pool().unwrap(), 8);
/// assert!(failing_callback().is_err());
/// ```
pub type BeanResult<T> = Result<T, BeanError>;
