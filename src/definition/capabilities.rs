//! Explicit capability table of a definition.
//!
//! Each declared capability stores a caster from the type-erased raw object to
//! the capability trait object. The container walks this fixed set in a fixed
//! order instead of probing objects for traits.

use std::any::Any;
use std::sync::Arc;

use crate::handle::AnyArc;
use crate::postprocess::{DefinitionPostProcessor, InstancePostProcessor};
use crate::traits::{
    BeanNameAware, ContainerAware, DisposableBean, FactoryBean, InitializingBean, PropertyTarget,
    SmartInitializingSingleton,
};

pub(crate) type Caster<I> = Arc<dyn Fn(&AnyArc) -> Option<Arc<I>> + Send + Sync>;

/// Builds a caster that downcasts to `T` and upcasts to `I`.
pub(crate) fn caster<T, I>(upcast: fn(Arc<T>) -> Arc<I>) -> Caster<I>
where
    T: Any + Send + Sync,
    I: ?Sized + 'static,
{
    Arc::new(move |object: &AnyArc| object.clone().downcast::<T>().ok().map(upcast))
}

/// Capability casters declared on a definition.
#[derive(Clone, Default)]
pub(crate) struct Capabilities {
    pub(crate) name_aware: Option<Caster<dyn BeanNameAware>>,
    pub(crate) container_aware: Option<Caster<dyn ContainerAware>>,
    pub(crate) property_target: Option<Caster<dyn PropertyTarget>>,
    pub(crate) initializing: Option<Caster<dyn InitializingBean>>,
    pub(crate) disposable: Option<Caster<dyn DisposableBean>>,
    pub(crate) factory: Option<Caster<dyn FactoryBean>>,
    pub(crate) instance_post_processor: Option<Caster<dyn InstancePostProcessor>>,
    pub(crate) definition_post_processor: Option<Caster<dyn DefinitionPostProcessor>>,
    pub(crate) smart_singleton: Option<Caster<dyn SmartInitializingSingleton>>,
}

macro_rules! cast_fn {
    ($($field:ident => $trait_:ident),* $(,)?) => {
        $(
            pub(crate) fn $field(&self, object: &AnyArc) -> Option<Arc<dyn $trait_>> {
                self.$field.as_ref().and_then(|cast| cast(object))
            }
        )*
    };
}

impl Capabilities {
    /// Capabilities of `self`, falling back to `parent`'s per capability.
    pub(crate) fn merged_over(&self, parent: &Capabilities) -> Capabilities {
        Capabilities {
            name_aware: self.name_aware.clone().or_else(|| parent.name_aware.clone()),
            container_aware: self.container_aware.clone().or_else(|| parent.container_aware.clone()),
            property_target: self.property_target.clone().or_else(|| parent.property_target.clone()),
            initializing: self.initializing.clone().or_else(|| parent.initializing.clone()),
            disposable: self.disposable.clone().or_else(|| parent.disposable.clone()),
            factory: self.factory.clone().or_else(|| parent.factory.clone()),
            instance_post_processor: self
                .instance_post_processor
                .clone()
                .or_else(|| parent.instance_post_processor.clone()),
            definition_post_processor: self
                .definition_post_processor
                .clone()
                .or_else(|| parent.definition_post_processor.clone()),
            smart_singleton: self.smart_singleton.clone().or_else(|| parent.smart_singleton.clone()),
        }
    }

    pub(crate) fn is_factory(&self) -> bool {
        self.factory.is_some()
    }

    pub(crate) fn is_instance_post_processor(&self) -> bool {
        self.instance_post_processor.is_some()
    }

    pub(crate) fn is_definition_post_processor(&self) -> bool {
        self.definition_post_processor.is_some()
    }

    /// Names of declared capabilities, for diagnostics.
    pub(crate) fn declared(&self) -> Vec<&'static str> {
        let table = [
            (self.name_aware.is_some(), "name-aware"),
            (self.container_aware.is_some(), "container-aware"),
            (self.property_target.is_some(), "property-target"),
            (self.initializing.is_some(), "initializing"),
            (self.disposable.is_some(), "disposable"),
            (self.factory.is_some(), "factory-bean"),
            (self.instance_post_processor.is_some(), "instance-post-processor"),
            (self.definition_post_processor.is_some(), "definition-post-processor"),
            (self.smart_singleton.is_some(), "smart-singleton"),
        ];
        table.iter().filter(|(on, _)| *on).map(|(_, name)| *name).collect()
    }

    cast_fn! {
        name_aware => BeanNameAware,
        container_aware => ContainerAware,
        property_target => PropertyTarget,
        initializing => InitializingBean,
        disposable => DisposableBean,
        factory => FactoryBean,
        instance_post_processor => InstancePostProcessor,
        definition_post_processor => DefinitionPostProcessor,
        smart_singleton => SmartInitializingSingleton,
    }
}
