//! Container refresh: definition post-processing, post-processor
//! registration and eager singleton pre-instantiation.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use ahash::AHashSet;

use super::{Container, FACTORY_BEAN_PREFIX};
use crate::error::{BeanError, BeanResult};
use crate::postprocess::{sort_by_order, DefinitionPhase, DefinitionPostProcessor, ProcessingOrder};

const WAVES: u8 = 3;

impl Container {
    /// Runs the definition post-processors, registers the instance
    /// post-processors defined as beans, then creates every non-lazy singleton.
    ///
    /// A container is refreshed at most once. If any step fails, the
    /// singletons created so far are destroyed and the error is returned.
    ///
    /// ```rust
    /// use std::sync::atomic::{AtomicBool, Ordering};
    /// use ferrous_beans::{BeanDefinition, BeanResult, Container, SmartInitializingSingleton};
    ///
    /// #[derive(Default)]
    /// struct Warmup {
    ///     ready: AtomicBool,
    /// }
    ///
    /// impl SmartInitializingSingleton for Warmup {
    ///     fn after_singletons_instantiated(&self) -> BeanResult<()> {
    ///         self.ready.store(true, Ordering::SeqCst);
    ///         Ok(())
    ///     }
    /// }
    ///
    /// let container = Container::new();
    /// container
    ///     .register_definition("warmup", BeanDefinition::builder::<Warmup>().default_constructor().smart_singleton().build())
    ///     .unwrap();
    /// container.refresh().unwrap();
    ///
    /// assert!(container.get_bean::<Warmup>("warmup").unwrap().ready.load(Ordering::SeqCst));
    /// assert!(container.refresh().is_err());
    /// ```
    pub fn refresh(&self) -> BeanResult<()> {
        if self.is_closed() {
            return Err(BeanError::IllegalState("container is closed".into()));
        }
        if self.inner().refreshed.swap(true, Ordering::AcqRel) {
            return Err(BeanError::IllegalState("container has already been refreshed".into()));
        }
        let started = Instant::now();
        let result = self
            .invoke_definition_post_processors()
            .and_then(|()| self.register_instance_post_processors())
            .and_then(|()| self.pre_instantiate_singletons());

        match result {
            Ok(()) => {
                tracing::info!(
                    definitions = self.definition_count(),
                    singletons = self.singleton_count(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "container refreshed"
                );
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "refresh failed, destroying created singletons");
                let report = self.destroy_all();
                for failure in report.failures() {
                    tracing::warn!(error = %failure, "destroy failed after unsuccessful refresh");
                }
                Err(err)
            }
        }
    }

    fn invoke_definition_post_processors(&self) -> BeanResult<()> {
        let mut pending: Vec<(ProcessingOrder, Arc<dyn DefinitionPostProcessor>)> =
            std::mem::take(&mut *self.inner().definition_processors.lock())
                .into_iter()
                .map(|processor| (processor.order(), processor))
                .collect();
        let mut from_beans = AHashSet::new();

        for wave in 0..WAVES {
            loop {
                for name in self.definition_names() {
                    if from_beans.contains(&name) {
                        continue;
                    }
                    let definition = self.merged_definition(&name)?;
                    if definition.is_abstract()
                        || !definition.capabilities.is_definition_post_processor()
                        || definition.processing_order().wave() > wave
                    {
                        continue;
                    }
                    let object = self.get_instance(&name)?;
                    let processor = definition
                        .capabilities
                        .definition_post_processor(&object)
                        .ok_or_else(|| not_a_processor(&name, "DefinitionPostProcessor"))?;
                    from_beans.insert(name);
                    pending.push((definition.processing_order(), processor));
                }

                let (due, later): (Vec<_>, Vec<_>) = pending.into_iter().partition(|(order, _)| order.wave() <= wave);
                pending = later;
                if due.is_empty() {
                    break;
                }
                for (_, processor) in sort_by_order(due) {
                    let mut phase = DefinitionPhase::new(self);
                    processor.post_process_definitions(&mut phase)?;
                    pending.extend(phase.into_added().into_iter().map(|added| (added.order(), added)));
                }
            }
        }
        Ok(())
    }

    fn register_instance_post_processors(&self) -> BeanResult<()> {
        let mut found = Vec::new();
        for name in self.definition_names() {
            let definition = self.merged_definition(&name)?;
            if definition.is_abstract()
                || !definition.capabilities.is_instance_post_processor()
                || self.inner().pipeline.contains_origin(&name)
            {
                continue;
            }
            found.push((definition.processing_order(), (name, definition)));
        }

        for (_, (name, definition)) in sort_by_order(found) {
            let object = self.get_instance(&name)?;
            let processor = definition
                .capabilities
                .instance_post_processor(&object)
                .ok_or_else(|| not_a_processor(&name, "InstancePostProcessor"))?;
            tracing::debug!(bean = %name, processor = processor.name(), "registered instance post-processor");
            self.inner().pipeline.add(processor, Some(name));
        }
        Ok(())
    }

    fn pre_instantiate_singletons(&self) -> BeanResult<()> {
        let names = self.definition_names();
        for name in &names {
            let definition = self.merged_definition(name)?;
            if definition.is_abstract() || !definition.is_singleton() || definition.is_lazy_init() {
                continue;
            }
            if !definition.is_factory_bean() {
                self.get_handle(name)?;
                continue;
            }
            let factory = self.get_handle(&format!("{}{}", FACTORY_BEAN_PREFIX, name))?;
            let eager = factory
                .object()
                .and_then(|object| definition.capabilities.factory(&object))
                .is_some_and(|factory| factory.is_eager_init());
            if eager {
                self.get_handle(name)?;
            }
        }

        for name in &names {
            let Some(handle) = self.inner().singletons.get_ready(name) else {
                continue;
            };
            let definition = self.merged_definition(name)?;
            let smart = handle
                .object()
                .and_then(|object| definition.capabilities.smart_singleton(&object));
            if let Some(smart) = smart {
                tracing::trace!(bean = %name, "after singletons instantiated");
                smart
                    .after_singletons_instantiated()
                    .map_err(|err| BeanError::creation(name.as_str(), err))?;
            }
        }
        Ok(())
    }
}

fn not_a_processor(name: &str, expected: &'static str) -> BeanError {
    BeanError::TypeMismatch {
        name: name.to_string(),
        expected,
        actual: "bean does not expose the declared post-processor capability".into(),
    }
}
