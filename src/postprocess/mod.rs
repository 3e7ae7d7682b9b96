//! Post-processor hook families.
//!
//! Definition post-processors run once during [`Container::refresh`](crate::Container::refresh),
//! before any bean is created, and may add, remove or mutate definitions. Instance
//! post-processors observe (and may substitute) every bean created afterwards.
//!
//! Both families are ordered in three waves: [`ProcessingOrder::PriorityOrdered`]
//! first, then [`ProcessingOrder::Ordered`], then [`ProcessingOrder::Unordered`].

mod pipeline;

use std::sync::Arc;

use crate::container::Container;
use crate::definition::{BeanDefinition, PropertyValues};
use crate::error::BeanResult;
use crate::handle::AnyArc;

pub(crate) use pipeline::{sort_by_order, InstancePipeline, ProcessorSnapshot};

/// Precedence of a post-processor. Lower values run first within a wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProcessingOrder {
    PriorityOrdered(i32),
    Ordered(i32),
    #[default]
    Unordered,
}

impl ProcessingOrder {
    /// 0, 1 or 2 for the priority-ordered, ordered and unordered wave.
    pub fn wave(&self) -> u8 {
        match self {
            ProcessingOrder::PriorityOrdered(_) => 0,
            ProcessingOrder::Ordered(_) => 1,
            ProcessingOrder::Unordered => 2,
        }
    }

    pub(crate) fn sort_key(&self) -> (u8, i32) {
        match self {
            ProcessingOrder::PriorityOrdered(v) | ProcessingOrder::Ordered(v) => (self.wave(), *v),
            ProcessingOrder::Unordered => (2, 0),
        }
    }
}

/// Hooks invoked around the creation and destruction of every bean.
///
/// All methods have pass-through defaults; implement the ones you need.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use ferrous_beans::{AnyArc, BeanDefinition, BeanResult, Container, InstancePostProcessor};
///
/// #[derive(Default)]
/// struct Counter {
///     seen: AtomicUsize,
/// }
///
/// impl InstancePostProcessor for Counter {
///     fn after_initialization(&self, bean: AnyArc, _name: &str) -> BeanResult<AnyArc> {
///         self.seen.fetch_add(1, Ordering::SeqCst);
///         Ok(bean)
///     }
/// }
///
/// #[derive(Default)]
/// struct Service;
///
/// let container = Container::new();
/// let counter = Arc::new(Counter::default());
/// container.add_instance_post_processor(counter.clone());
/// container
///     .register_definition("service", BeanDefinition::builder::<Service>().default_constructor().build())
///     .unwrap();
///
/// container.get_instance("service").unwrap();
/// assert_eq!(counter.seen.load(Ordering::SeqCst), 1);
/// ```
pub trait InstancePostProcessor: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Precedence when registered as a bean without an explicit definition order.
    fn order(&self) -> ProcessingOrder {
        ProcessingOrder::Unordered
    }

    /// May return a replacement object, skipping regular creation entirely.
    /// The replacement still receives the after-initialization hooks.
    fn before_instantiation(&self, definition: &BeanDefinition, name: &str) -> BeanResult<Option<AnyArc>> {
        let _ = (definition, name);
        Ok(None)
    }

    /// Returning `false` skips property population for this bean.
    fn after_instantiation(&self, bean: &AnyArc, name: &str) -> BeanResult<bool> {
        let _ = (bean, name);
        Ok(true)
    }

    /// May rewrite the property assignments before they are resolved.
    fn process_properties(&self, properties: PropertyValues, bean: &AnyArc, name: &str) -> BeanResult<PropertyValues> {
        let _ = (bean, name);
        Ok(properties)
    }

    /// May wrap the object handed out through early exposure.
    fn early_reference(&self, bean: AnyArc, name: &str) -> BeanResult<AnyArc> {
        let _ = name;
        Ok(bean)
    }

    fn before_initialization(&self, bean: AnyArc, name: &str) -> BeanResult<AnyArc> {
        let _ = name;
        Ok(bean)
    }

    fn after_initialization(&self, bean: AnyArc, name: &str) -> BeanResult<AnyArc> {
        let _ = name;
        Ok(bean)
    }

    /// Whether [`before_destruction`](Self::before_destruction) should be called for the bean.
    fn requires_destruction(&self, bean: &AnyArc, name: &str) -> bool {
        let _ = (bean, name);
        false
    }

    fn before_destruction(&self, bean: &AnyArc, name: &str) -> BeanResult<()> {
        let _ = (bean, name);
        Ok(())
    }

    /// The definition registered under `name` was replaced or removed.
    fn reset_definition(&self, name: &str) {
        let _ = name;
    }
}

/// Hook run over the registered definitions before any bean is created.
///
/// ```rust
/// use ferrous_beans::{BeanDefinition, BeanResult, Container, DefinitionPhase, DefinitionPostProcessor};
///
/// struct MakeLazy;
///
/// impl DefinitionPostProcessor for MakeLazy {
///     fn post_process_definitions(&self, phase: &mut DefinitionPhase<'_>) -> BeanResult<()> {
///         for name in phase.definition_names() {
///             phase.update_definition(&name, |def| def.set_lazy_init(true))?;
///         }
///         Ok(())
///     }
/// }
///
/// #[derive(Default)]
/// struct Report;
///
/// let container = Container::new();
/// container
///     .register_definition("report", BeanDefinition::builder::<Report>().default_constructor().build())
///     .unwrap();
/// container.add_definition_post_processor(std::sync::Arc::new(MakeLazy));
/// container.refresh().unwrap();
///
/// assert!(container.get_definition("report").unwrap().is_lazy_init());
/// assert!(!container.contains_singleton("report"));
/// ```
pub trait DefinitionPostProcessor: Send + Sync {
    fn order(&self) -> ProcessingOrder {
        ProcessingOrder::Unordered
    }

    fn post_process_definitions(&self, phase: &mut DefinitionPhase<'_>) -> BeanResult<()>;
}

/// Registry access handed to definition post-processors.
///
/// Every call takes the registry lock only for its own duration, so a hook may
/// freely interleave reads and writes.
pub struct DefinitionPhase<'a> {
    container: &'a Container,
    added: Vec<Arc<dyn DefinitionPostProcessor>>,
}

impl<'a> DefinitionPhase<'a> {
    pub(crate) fn new(container: &'a Container) -> Self {
        Self {
            container,
            added: Vec::new(),
        }
    }

    pub fn container(&self) -> &Container {
        self.container
    }

    pub fn definition_names(&self) -> Vec<String> {
        self.container.definition_names()
    }

    pub fn contains_definition(&self, name: &str) -> bool {
        self.container.contains_definition(name)
    }

    pub fn get_definition(&self, name: &str) -> BeanResult<BeanDefinition> {
        self.container.get_definition(name)
    }

    pub fn register_definition(&self, name: &str, definition: BeanDefinition) -> BeanResult<()> {
        self.container.register_definition(name, definition)
    }

    pub fn remove_definition(&self, name: &str) -> BeanResult<BeanDefinition> {
        self.container.remove_definition(name)
    }

    pub fn update_definition(&self, name: &str, update: impl FnOnce(&mut BeanDefinition)) -> BeanResult<()> {
        self.container.update_definition(name, update)
    }

    /// Queues another definition post-processor. It runs in its own wave, or
    /// before the next wave starts when its wave has already begun.
    pub fn add_post_processor(&mut self, processor: Arc<dyn DefinitionPostProcessor>) {
        self.added.push(processor);
    }

    pub(crate) fn into_added(self) -> Vec<Arc<dyn DefinitionPostProcessor>> {
        self.added
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waves_sort_before_values() {
        let mut orders = vec![
            ProcessingOrder::Unordered,
            ProcessingOrder::Ordered(-5),
            ProcessingOrder::PriorityOrdered(10),
            ProcessingOrder::Ordered(1),
            ProcessingOrder::PriorityOrdered(0),
        ];
        orders.sort_by_key(|o| o.sort_key());
        assert_eq!(
            orders,
            [
                ProcessingOrder::PriorityOrdered(0),
                ProcessingOrder::PriorityOrdered(10),
                ProcessingOrder::Ordered(-5),
                ProcessingOrder::Ordered(1),
                ProcessingOrder::Unordered,
            ]
        );
    }
}
