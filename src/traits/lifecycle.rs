//! Lifecycle capability traits.
//!
//! A bean opts into a callback by implementing the trait and declaring it on its
//! definition (e.g. [`DefinitionBuilder::initializing`](crate::DefinitionBuilder::initializing)).
//! The container keeps a fixed, ordered list of these capabilities and checks
//! each one explicitly; nothing is discovered at runtime.

use crate::container::Container;
use crate::error::BeanResult;
use crate::handle::AnyArc;
use crate::key::TypeKey;
use crate::value::Value;

/// Receives the name the bean is registered under.
///
/// Called after instantiation, before property population.
pub trait BeanNameAware: Send + Sync {
    fn set_bean_name(&self, name: &str);
}

/// Receives the owning container.
///
/// Beans that keep the container around should store a
/// [`WeakContainer`](crate::WeakContainer) to avoid a reference cycle.
pub trait ContainerAware: Send + Sync {
    fn set_container(&self, container: &Container);
}

/// Accepts resolved property values.
///
/// Properties are assigned through a shared reference, so implementations use
/// interior mutability for the fields they expose.
///
/// # Examples
///
/// ```rust
/// use ferrous_beans::{BeanDefinition, BeanResult, Container, PropertyTarget, Value};
/// use parking_lot::Mutex;
///
/// #[derive(Default)]
/// struct Pool {
///     size: Mutex<i64>,
/// }
///
/// impl PropertyTarget for Pool {
///     fn set_property(&self, name: &str, value: Value) -> BeanResult<()> {
///         if name == "size" {
///             *self.size.lock() = value.as_i64().unwrap_or_default();
///         }
///         Ok(())
///     }
/// }
///
/// let container = Container::new();
/// container
///     .register_definition(
///         "pool",
///         BeanDefinition::builder::<Pool>()
///             .default_constructor()
///             .property_target()
///             .property_value("size", 8)
///             .build(),
///     )
///     .unwrap();
///
/// let pool = container.get_bean::<Pool>("pool").unwrap();
/// assert_eq!(*pool.size.lock(), 8);
/// ```
pub trait PropertyTarget: Send + Sync {
    /// Assigns one property. Unknown names may be ignored or rejected.
    fn set_property(&self, name: &str, value: Value) -> BeanResult<()>;

    /// Target type of a property, used to convert literals and expression
    /// results before assignment. `None` means "assign as resolved".
    fn property_type(&self, name: &str) -> Option<TypeKey> {
        let _ = name;
        None
    }
}

/// Generic "after properties set" hook, run after declared init methods.
pub trait InitializingBean: Send + Sync {
    fn after_properties_set(&self) -> BeanResult<()>;
}

/// Teardown hook, run before the declared destroy method.
pub trait DisposableBean: Send + Sync {
    fn destroy(&self) -> BeanResult<()>;
}

/// A bean that produces the object exposed under its name.
///
/// Requesting `name` yields the product; requesting `&name` yields the factory
/// itself. Products of factories reporting [`is_singleton`](Self::is_singleton)
/// are produced once and cached.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use ferrous_beans::{AnyArc, BeanDefinition, BeanResult, Container, FactoryBean, TypeKey};
///
/// struct Connection {
///     url: String,
/// }
///
/// #[derive(Default)]
/// struct ConnectionFactory;
///
/// impl FactoryBean for ConnectionFactory {
///     fn produce(&self) -> BeanResult<AnyArc> {
///         Ok(Arc::new(Connection { url: "db://local".into() }))
///     }
///
///     fn object_type(&self) -> Option<TypeKey> {
///         Some(TypeKey::of::<Connection>())
///     }
/// }
///
/// let container = Container::new();
/// container
///     .register_definition(
///         "connection",
///         BeanDefinition::builder::<ConnectionFactory>()
///             .default_constructor()
///             .factory_bean()
///             .build(),
///     )
///     .unwrap();
///
/// let conn = container.get_bean::<Connection>("connection").unwrap();
/// assert_eq!(conn.url, "db://local");
/// assert!(container.get_bean::<ConnectionFactory>("&connection").is_ok());
/// ```
pub trait FactoryBean: Send + Sync {
    /// Produces the exposed object.
    fn produce(&self) -> BeanResult<AnyArc>;

    /// Type of the produced object, if known without producing it.
    fn object_type(&self) -> Option<TypeKey> {
        None
    }

    /// Whether the product is shared (produced once) or produced per request.
    fn is_singleton(&self) -> bool {
        true
    }

    /// Whether the product should be produced during pre-instantiation.
    fn is_eager_init(&self) -> bool {
        false
    }
}

/// Callback invoked once all non-lazy singletons have been pre-instantiated.
pub trait SmartInitializingSingleton: Send + Sync {
    fn after_singletons_instantiated(&self) -> BeanResult<()>;
}
