//! Scope strategies.
//!
//! `singleton` and `prototype` are built into the container; every other scope
//! name is looked up in the [`ScopeRegistry`] and delegates both creation and
//! caching to the registered [`Scope`].

mod map;
mod thread;

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::error::{BeanError, BeanResult};
use crate::handle::AnyArc;

pub use map::MapScope;
pub use thread::ThreadScope;

pub const SINGLETON: &str = "singleton";
pub const PROTOTYPE: &str = "prototype";

/// Scope identifier of a definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum BeanScope {
    /// One shared instance per container
    #[default]
    Singleton,
    /// A new instance per request
    Prototype,
    /// Named scope registered with [`Container::register_scope`](crate::Container::register_scope)
    Custom(String),
}

impl BeanScope {
    /// Maps the built-in names to their variants and everything else to `Custom`.
    pub fn parse(name: &str) -> BeanScope {
        match name {
            "" | SINGLETON => BeanScope::Singleton,
            PROTOTYPE => BeanScope::Prototype,
            other => BeanScope::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BeanScope::Singleton => SINGLETON,
            BeanScope::Prototype => PROTOTYPE,
            BeanScope::Custom(name) => name,
        }
    }
}

impl fmt::Display for BeanScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback run when a scoped object is discarded.
pub type DestructionCallback = Box<dyn FnOnce() + Send>;

/// Strategy controlling how instances of a custom scope are cached.
///
/// `get` receives the container's creation routine; a scope calls it when it
/// has no instance for `name` and decides itself how the result is kept.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use ferrous_beans::{BeanDefinition, Container, MapScope};
///
/// #[derive(Default)]
/// struct Cart;
///
/// let container = Container::new();
/// let session = Arc::new(MapScope::new("session"));
/// container.register_scope("session", session.clone()).unwrap();
/// container
///     .register_definition("cart", BeanDefinition::builder::<Cart>().default_constructor().scoped("session").build())
///     .unwrap();
///
/// let first = container.get_bean::<Cart>("cart").unwrap();
/// assert!(Arc::ptr_eq(&first, &container.get_bean::<Cart>("cart").unwrap()));
///
/// session.reset();
/// assert!(!Arc::ptr_eq(&first, &container.get_bean::<Cart>("cart").unwrap()));
/// ```
pub trait Scope: Send + Sync {
    /// Returns the scoped object for `name`, creating it through `factory` when absent.
    fn get(&self, name: &str, factory: &mut dyn FnMut() -> BeanResult<AnyArc>) -> BeanResult<AnyArc>;

    /// Removes the object for `name` without running its destruction callback.
    fn remove(&self, name: &str) -> Option<AnyArc>;

    /// Registers the callback to run when the object for `name` is discarded.
    fn register_destruction_callback(&self, name: &str, callback: DestructionCallback);

    /// Identifier of the current scope instance (session id, thread, ...), if any.
    fn conversation_id(&self) -> Option<String> {
        None
    }
}

/// Registered custom scopes by name.
#[derive(Default)]
pub(crate) struct ScopeRegistry {
    scopes: RwLock<AHashMap<String, Arc<dyn Scope>>>,
}

impl ScopeRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, name: &str, scope: Arc<dyn Scope>) -> BeanResult<()> {
        if name.is_empty() {
            return Err(BeanError::IllegalState("scope name must not be empty".into()));
        }
        if name == SINGLETON || name == PROTOTYPE {
            return Err(BeanError::IllegalState(format!("cannot replace built-in scope '{}'", name)));
        }
        if self.scopes.write().insert(name.to_string(), scope).is_some() {
            tracing::debug!(scope = name, "replacing registered scope");
        }
        Ok(())
    }

    pub(crate) fn get(&self, name: &str) -> Option<Arc<dyn Scope>> {
        self.scopes.read().get(name).cloned()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scopes.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_names_cannot_be_registered() {
        let registry = ScopeRegistry::new();
        assert!(registry.register(SINGLETON, Arc::new(MapScope::new("x"))).is_err());
        assert!(registry.register(PROTOTYPE, Arc::new(MapScope::new("x"))).is_err());
        assert!(registry.register("request", Arc::new(MapScope::new("request"))).is_ok());
        assert_eq!(registry.names(), ["request".to_string()]);
    }

    #[test]
    fn parse_maps_builtin_names() {
        assert_eq!(BeanScope::parse("singleton"), BeanScope::Singleton);
        assert_eq!(BeanScope::parse("prototype"), BeanScope::Prototype);
        assert_eq!(BeanScope::parse("thread").to_string(), "thread");
    }
}
