//! Observation hooks for bean creation and destruction.
//!
//! Observers receive synchronous callbacks around every bean creation, which
//! makes them suitable for timing, auditing and debugging resolution chains.

use std::sync::Arc;
use std::time::Duration;

use crate::error::BeanError;

/// Observer of container events.
///
/// Calls are made on the creating thread while the bean is being built, so
/// implementations should stay lightweight.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use parking_lot::Mutex;
/// use ferrous_beans::{BeanDefinition, BeanError, Container, ContainerObserver};
///
/// #[derive(Default)]
/// struct Audit {
///     events: Mutex<Vec<String>>,
/// }
///
/// impl ContainerObserver for Audit {
///     fn creating(&self, name: &str) {
///         self.events.lock().push(format!("creating {}", name));
///     }
///
///     fn created(&self, name: &str, _elapsed: Duration) {
///         self.events.lock().push(format!("created {}", name));
///     }
///
///     fn creation_failed(&self, name: &str, error: &BeanError) {
///         self.events.lock().push(format!("failed {}: {}", name, error));
///     }
/// }
///
/// #[derive(Default)]
/// struct Clock;
///
/// let audit = Arc::new(Audit::default());
/// let container = Container::builder().observer(audit.clone()).build();
/// container
///     .register_definition("clock", BeanDefinition::builder::<Clock>().default_constructor().build())
///     .unwrap();
/// container.get_instance("clock").unwrap();
///
/// assert_eq!(*audit.events.lock(), ["creating clock", "created clock"]);
/// ```
pub trait ContainerObserver: Send + Sync {
    /// A bean is about to be created.
    fn creating(&self, name: &str);

    /// A bean finished creation, including initialization callbacks.
    fn created(&self, name: &str, elapsed: Duration);

    /// Creation of a bean failed; the error is still returned to the caller.
    fn creation_failed(&self, name: &str, error: &BeanError);

    /// A singleton was destroyed.
    fn destroyed(&self, name: &str) {
        let _ = name;
    }
}

/// Registered observers.
#[derive(Clone, Default)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn ContainerObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn ContainerObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    pub(crate) fn creating(&self, name: &str) {
        for observer in &self.observers {
            observer.creating(name);
        }
    }

    pub(crate) fn created(&self, name: &str, elapsed: Duration) {
        for observer in &self.observers {
            observer.created(name, elapsed);
        }
    }

    pub(crate) fn creation_failed(&self, name: &str, error: &BeanError) {
        for observer in &self.observers {
            observer.creation_failed(name, error);
        }
    }

    pub(crate) fn destroyed(&self, name: &str) {
        for observer in &self.observers {
            observer.destroyed(name);
        }
    }
}

/// Observer that forwards every event to `tracing`.
///
/// Creation events are logged at `debug`, failures at `warn`. Install a
/// subscriber (e.g. `tracing-subscriber`) to see them.
///
/// ```
/// use std::sync::Arc;
/// use ferrous_beans::{Container, LoggingObserver};
///
/// let container = Container::builder()
///     .observer(Arc::new(LoggingObserver::with_prefix("[beans]")))
///     .build();
/// # let _ = container;
/// ```
#[derive(Debug, Clone)]
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self {
            prefix: "[ferrous-beans]".to_string(),
        }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerObserver for LoggingObserver {
    fn creating(&self, name: &str) {
        tracing::debug!(prefix = %self.prefix, bean = name, "creating bean");
    }

    fn created(&self, name: &str, elapsed: Duration) {
        tracing::debug!(prefix = %self.prefix, bean = name, elapsed_us = elapsed.as_micros() as u64, "created bean");
    }

    fn creation_failed(&self, name: &str, error: &BeanError) {
        tracing::warn!(prefix = %self.prefix, bean = name, error = %error, "bean creation failed");
    }

    fn destroyed(&self, name: &str) {
        tracing::debug!(prefix = %self.prefix, bean = name, "destroyed bean");
    }
}
