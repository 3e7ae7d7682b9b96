//! Teardown adapters for created beans.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::definition::{BeanDefinition, LifecycleMethod};
use crate::error::{BeanError, BeanResult};
use crate::handle::AnyArc;
use crate::postprocess::{InstancePostProcessor, ProcessorSnapshot};
use crate::traits::DisposableBean;

/// Everything needed to tear one bean down.
///
/// Runs `DisposableBean::destroy`, then the declared destroy method, then the
/// destruction-aware post-processors. Every step runs even if an earlier one
/// failed or panicked; failures are collected.
pub(crate) struct DisposableAdapter {
    name: String,
    raw: AnyArc,
    exposed: AnyArc,
    disposable: Option<Arc<dyn DisposableBean>>,
    destroy_method: Option<LifecycleMethod>,
    processors: Vec<Arc<dyn InstancePostProcessor>>,
}

impl DisposableAdapter {
    /// Adapter for a bean, or `None` when there is nothing to run.
    pub(crate) fn for_bean(
        name: &str,
        raw: &AnyArc,
        exposed: &AnyArc,
        definition: &BeanDefinition,
        processors: &ProcessorSnapshot,
    ) -> Option<Self> {
        let disposable = definition.capabilities.disposable(raw);
        let destroy_method = definition.destroy_method().cloned();
        let processors = processors.destruction_aware(exposed, name);
        if disposable.is_none() && destroy_method.is_none() && processors.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            raw: raw.clone(),
            exposed: exposed.clone(),
            disposable,
            destroy_method,
            processors,
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Runs every teardown step, returning the failures.
    pub(crate) fn destroy(self) -> Vec<BeanError> {
        let mut failures = Vec::new();
        let name = self.name.as_str();

        if let Some(disposable) = &self.disposable {
            run_step(name, "destroy()", &mut failures, || disposable.destroy());
        }
        if let Some(method) = &self.destroy_method {
            run_step(name, method.name(), &mut failures, || method.invoke(&self.raw));
        }
        for processor in &self.processors {
            run_step(name, processor.name(), &mut failures, || {
                processor.before_destruction(&self.exposed, name)
            });
        }
        failures
    }
}

fn run_step(name: &str, step: &str, failures: &mut Vec<BeanError>, f: impl FnOnce() -> BeanResult<()>) {
    let outcome = catch_unwind(AssertUnwindSafe(f));
    let message = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(err)) => err.to_string(),
        Err(payload) => panic_message(payload.as_ref()),
    };
    tracing::warn!(bean = name, step, error = %message, "destroy callback failed");
    failures.push(BeanError::Destruction {
        name: name.to_string(),
        message: format!("{}: {}", step, message),
    });
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
