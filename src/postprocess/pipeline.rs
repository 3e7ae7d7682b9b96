//! Instance post-processor pipeline.

use std::sync::Arc;

use parking_lot::RwLock;

use super::{InstancePostProcessor, ProcessingOrder};
use crate::definition::{BeanDefinition, PropertyValues};
use crate::error::BeanResult;
use crate::handle::AnyArc;

#[derive(Clone)]
pub(crate) struct RegisteredProcessor {
    pub(crate) processor: Arc<dyn InstancePostProcessor>,
    /// Bean name when the processor was registered from a definition
    pub(crate) origin: Option<String>,
}

/// Copy-on-write list of instance post-processors in application order.
///
/// Creation takes a snapshot up front, so processors registered while a bean
/// is being created only apply to beans created afterwards.
#[derive(Default)]
pub(crate) struct InstancePipeline {
    processors: RwLock<Arc<Vec<RegisteredProcessor>>>,
}

impl InstancePipeline {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, processor: Arc<dyn InstancePostProcessor>, origin: Option<String>) {
        let mut guard = self.processors.write();
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        // one registration per bean
        if let Some(name) = origin.as_deref() {
            next.retain(|p| p.origin.as_deref() != Some(name));
        }
        next.push(RegisteredProcessor { processor, origin });
        *guard = Arc::new(next);
    }

    pub(crate) fn contains_origin(&self, name: &str) -> bool {
        self.processors.read().iter().any(|p| p.origin.as_deref() == Some(name))
    }

    pub(crate) fn remove_origin(&self, name: &str) {
        let mut guard = self.processors.write();
        if guard.iter().any(|p| p.origin.as_deref() == Some(name)) {
            let next: Vec<_> = guard.iter().filter(|p| p.origin.as_deref() != Some(name)).cloned().collect();
            *guard = Arc::new(next);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.processors.read().len()
    }

    pub(crate) fn snapshot(&self) -> ProcessorSnapshot {
        ProcessorSnapshot {
            processors: self.processors.read().clone(),
        }
    }
}

/// Frozen view of the pipeline used for one creation or destruction.
#[derive(Clone)]
pub(crate) struct ProcessorSnapshot {
    processors: Arc<Vec<RegisteredProcessor>>,
}

impl ProcessorSnapshot {
    /// Snapshot applying no processor, used while creating post-processor beans.
    pub(crate) fn empty() -> Self {
        Self {
            processors: Arc::new(Vec::new()),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = &Arc<dyn InstancePostProcessor>> {
        self.processors.iter().map(|p| &p.processor)
    }

    /// First processor returning an object wins.
    pub(crate) fn before_instantiation(&self, definition: &BeanDefinition, name: &str) -> BeanResult<Option<AnyArc>> {
        for processor in self.iter() {
            if let Some(replacement) = processor.before_instantiation(definition, name)? {
                tracing::debug!(bean = name, processor = processor.name(), "instantiation short-circuited");
                return Ok(Some(replacement));
            }
        }
        Ok(None)
    }

    /// `false` as soon as one processor vetoes population.
    pub(crate) fn after_instantiation(&self, bean: &AnyArc, name: &str) -> BeanResult<bool> {
        for processor in self.iter() {
            if !processor.after_instantiation(bean, name)? {
                tracing::trace!(bean = name, processor = processor.name(), "property population skipped");
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub(crate) fn process_properties(&self, mut properties: PropertyValues, bean: &AnyArc, name: &str) -> BeanResult<PropertyValues> {
        for processor in self.iter() {
            properties = processor.process_properties(properties, bean, name)?;
        }
        Ok(properties)
    }

    pub(crate) fn early_reference(&self, mut bean: AnyArc, name: &str) -> BeanResult<AnyArc> {
        for processor in self.iter() {
            bean = processor.early_reference(bean, name)?;
        }
        Ok(bean)
    }

    pub(crate) fn before_initialization(&self, mut bean: AnyArc, name: &str) -> BeanResult<AnyArc> {
        for processor in self.iter() {
            bean = processor.before_initialization(bean, name)?;
        }
        Ok(bean)
    }

    pub(crate) fn after_initialization(&self, mut bean: AnyArc, name: &str) -> BeanResult<AnyArc> {
        for processor in self.iter() {
            bean = processor.after_initialization(bean, name)?;
        }
        Ok(bean)
    }

    /// Processors that want a teardown callback for this bean.
    pub(crate) fn destruction_aware(&self, bean: &AnyArc, name: &str) -> Vec<Arc<dyn InstancePostProcessor>> {
        self.iter().filter(|p| p.requires_destruction(bean, name)).cloned().collect()
    }

    pub(crate) fn reset_definition(&self, name: &str) {
        for processor in self.iter() {
            processor.reset_definition(name);
        }
    }
}

/// Stable sort by wave, then by order value; ties keep their input order.
pub(crate) fn sort_by_order<T>(mut items: Vec<(ProcessingOrder, T)>) -> Vec<(ProcessingOrder, T)> {
    items.sort_by_key(|(order, _)| order.sort_key());
    items
}
