//! Bean creation: lookup, scope dispatch, instantiation, population and
//! initialization.

use std::sync::Arc;
use std::time::Instant;

use super::{Container, FACTORY_BEAN_PREFIX};
use crate::definition::{BeanDefinition, Instantiation, ResolvedArguments};
use crate::error::{BeanError, BeanResult};
use crate::handle::{instance_type_id, instance_type_name, AnyArc, BeanHandle};
use crate::internal::circular::StackGuard;
use crate::internal::DisposableAdapter;
use crate::key::TypeKey;
use crate::postprocess::ProcessorSnapshot;
use crate::resolver::DependencyDescriptor;
use crate::scope::BeanScope;
use crate::value::{BeanReference, Value, ValueSource};

impl Container {
    /// Handle of the bean named `name`, creating it if its scope requires.
    ///
    /// Names resolve through aliases, then through the parent container.
    pub fn get_handle(&self, name: &str) -> BeanResult<BeanHandle> {
        let deref = name.starts_with(FACTORY_BEAN_PREFIX);
        let bare = name.trim_start_matches(FACTORY_BEAN_PREFIX);
        let canonical = self.canonical_name(bare);
        let inner = self.inner();

        if let Some(handle) = inner.singletons.get(&canonical)? {
            let definition = self.local_definition(&canonical)?;
            return self.object_for_instance(handle, &canonical, deref, definition.as_deref());
        }

        let Some(definition) = self.local_definition(&canonical)? else {
            return match &inner.parent {
                Some(parent) => parent.get_handle(name),
                None => Err(BeanError::no_such_name(bare)),
            };
        };
        self.ensure_open(&canonical)?;

        for dependency in definition.depends_on() {
            let dependency = self.canonical_name(dependency);
            if inner.singletons.is_dependent(&canonical, &dependency) {
                return Err(BeanError::creation(
                    &canonical,
                    BeanError::CircularDependency(vec![canonical.clone(), dependency.clone(), canonical.clone()]),
                ));
            }
            inner.singletons.add_dependency(&canonical, &dependency);
            self.get_handle(&dependency).map_err(|err| {
                BeanError::creation(&canonical, BeanError::unsatisfied(&canonical, "depends-on", err))
            })?;
        }

        let handle = match definition.scope() {
            BeanScope::Singleton => inner
                .singletons
                .get_or_create(&canonical, definition.type_views(), || self.create_bean(&canonical, &definition))?,
            BeanScope::Prototype => {
                let object = self.create_bean(&canonical, &definition)?;
                BeanHandle::ready(canonical.as_str(), object, definition.type_views())
            }
            BeanScope::Custom(scope_name) => {
                let scope = inner.scopes.get(&scope_name).ok_or_else(|| BeanError::NoSuchScope {
                    name: canonical.clone(),
                    scope: scope_name.clone(),
                })?;
                let mut factory = || self.create_bean(&canonical, &definition);
                let object = scope
                    .get(&canonical, &mut factory)
                    .map_err(|err| BeanError::creation(&canonical, err))?;
                BeanHandle::ready(canonical.as_str(), object, definition.type_views())
            }
        };
        self.object_for_instance(handle, &canonical, deref, Some(&*definition))
    }

    /// Merged definition registered locally, `None` if there is none.
    fn local_definition(&self, name: &str) -> BeanResult<Option<Arc<BeanDefinition>>> {
        if !self.inner().registry.read().contains(name) {
            return Ok(None);
        }
        self.merged_definition(name).map(Some)
    }

    /// Resolves what a lookup hands out: the bean itself, or the product
    /// when the bean is a factory and the name was not `&`-prefixed.
    fn object_for_instance(
        &self,
        handle: BeanHandle,
        name: &str,
        deref: bool,
        definition: Option<&BeanDefinition>,
    ) -> BeanResult<BeanHandle> {
        let is_factory = definition.is_some_and(BeanDefinition::is_factory_bean);
        if deref {
            if !is_factory {
                return Err(BeanError::TypeMismatch {
                    name: name.to_string(),
                    expected: "FactoryBean",
                    actual: handle.object().map(|o| instance_type_name(&o)).unwrap_or_default(),
                });
            }
            return Ok(handle);
        }
        let Some(definition) = definition.filter(|d| d.is_factory_bean()) else {
            return Ok(handle);
        };

        if handle.is_early() {
            return Err(BeanError::CurrentlyInCreation(name.to_string()));
        }
        let object = handle
            .object()
            .ok_or_else(|| BeanError::IllegalState(format!("factory bean '{}' failed during creation", name)))?;
        let factory = definition
            .capabilities
            .factory(&object)
            .ok_or_else(|| BeanError::TypeMismatch {
                name: name.to_string(),
                expected: "FactoryBean",
                actual: instance_type_name(&object),
            })?;

        let cacheable = definition.is_singleton() && factory.is_singleton();
        if cacheable {
            if let Some(product) = self.inner().products.lock().get(name) {
                return Ok(product.clone());
            }
        }

        let product = factory.produce().map_err(|err| BeanError::creation(name, err))?;
        let product = self
            .inner()
            .pipeline
            .snapshot()
            .after_initialization(product, name)
            .map_err(|err| BeanError::creation(name, err))?;
        let handle = BeanHandle::ready(name, product, Arc::from(Vec::new()));
        if !cacheable {
            return Ok(handle);
        }
        let mut products = self.inner().products.lock();
        Ok(products.entry(name.to_string()).or_insert(handle).clone())
    }

    /// Runs the full creation of one bean, reporting to the observers.
    pub(crate) fn create_bean(&self, name: &str, definition: &BeanDefinition) -> BeanResult<AnyArc> {
        let observers = &self.inner().observers;
        let started = observers.has_observers().then(Instant::now);
        if started.is_some() {
            observers.creating(name);
        }
        tracing::trace!(bean = name, scope = %definition.scope(), "creating bean");

        match self.do_create_bean(name, definition) {
            Ok(object) => {
                if let Some(started) = started {
                    observers.created(name, started.elapsed());
                }
                Ok(object)
            }
            Err(err) => {
                let err = BeanError::creation(name, err);
                tracing::debug!(bean = name, error = %err, "bean creation failed");
                if started.is_some() {
                    observers.creation_failed(name, &err);
                }
                Err(err)
            }
        }
    }

    fn do_create_bean(&self, name: &str, definition: &BeanDefinition) -> BeanResult<AnyArc> {
        let inner = self.inner();
        let _guard = StackGuard::enter(inner.id, name, inner.config.max_creation_depth)?;
        definition.validate(name)?;

        let capabilities = &definition.capabilities;
        let snapshot = if capabilities.is_instance_post_processor() || capabilities.is_definition_post_processor() {
            ProcessorSnapshot::empty()
        } else {
            inner.pipeline.snapshot()
        };

        if let Some(object) = snapshot.before_instantiation(definition, name)? {
            let exposed = snapshot.after_initialization(object.clone(), name)?;
            self.register_disposal(name, &object, &exposed, definition, &snapshot);
            self.mark_initialized(name, definition);
            return Ok(exposed);
        }

        let raw = self.instantiate(name, definition)?;

        if definition.is_singleton()
            && inner.config.allow_circular_references
            && inner.singletons.is_created_by_current_thread(name)
        {
            let early_raw = raw.clone();
            let early_name = name.to_string();
            let early_snapshot = snapshot.clone();
            let views = definition.type_views();
            inner.singletons.register_early_reference(
                name,
                Box::new(move || {
                    let exposed = early_snapshot.early_reference(early_raw, &early_name)?;
                    Ok(BeanHandle::early(early_name, exposed, views))
                }),
            );
        }

        if let Some(aware) = capabilities.name_aware(&raw) {
            aware.set_bean_name(name);
        }
        if let Some(aware) = capabilities.container_aware(&raw) {
            aware.set_container(self);
        }

        if snapshot.after_instantiation(&raw, name)? {
            self.populate(name, definition, &raw, &snapshot)?;
        }

        let exposed = snapshot.before_initialization(raw.clone(), name)?;
        for method in definition.init_methods() {
            tracing::trace!(bean = name, method = method.name(), "invoking init method");
            method.invoke(&raw)?;
        }
        if let Some(initializing) = capabilities.initializing(&raw) {
            initializing.after_properties_set()?;
        }
        let mut exposed = snapshot.after_initialization(exposed, name)?;

        // holders of the early reference keep seeing that object
        if same_object(&exposed, &raw) {
            if let Some(early) = inner.singletons.early_object(name) {
                exposed = early;
            }
        }

        self.register_disposal(name, &raw, &exposed, definition, &snapshot);
        self.mark_initialized(name, definition);
        Ok(exposed)
    }

    fn instantiate(&self, name: &str, definition: &BeanDefinition) -> BeanResult<AnyArc> {
        let Some(instantiation) = definition.instantiation() else {
            return Err(BeanError::InvalidDefinition {
                name: name.to_string(),
                reason: "no construction policy".into(),
            });
        };
        match instantiation {
            Instantiation::DefaultConstructor(construct) => Ok(construct()),
            Instantiation::Constructor { args, build } => {
                let resolved = self.resolve_arguments(name, args)?;
                build(&resolved)
            }
            Instantiation::FactoryMethod {
                factory_bean,
                args,
                method,
            } => {
                let factory = match factory_bean {
                    Some(factory_name) => {
                        if self.canonical_name(factory_name) == name {
                            return Err(BeanError::InvalidDefinition {
                                name: name.to_string(),
                                reason: "factory-bean reference points back to the same bean definition".into(),
                            });
                        }
                        let handle = self
                            .get_handle(factory_name)
                            .map_err(|err| BeanError::unsatisfied(name, "factory-bean", err))?;
                        self.inner().singletons.add_dependency(name, handle.name());
                        Some(handle)
                    }
                    None => None,
                };
                let resolved = self.resolve_arguments(name, args)?;
                method(factory.as_ref(), &resolved)
            }
            Instantiation::Supplier(supply) => supply(self),
        }
    }

    fn resolve_arguments(&self, name: &str, args: &[ValueSource]) -> BeanResult<ResolvedArguments> {
        let values = args
            .iter()
            .enumerate()
            .map(|(index, source)| self.resolve_value(name, &format!("argument #{}", index), source, None))
            .collect::<BeanResult<Vec<_>>>()?;
        Ok(ResolvedArguments::new(values))
    }

    fn populate(&self, name: &str, definition: &BeanDefinition, raw: &AnyArc, snapshot: &ProcessorSnapshot) -> BeanResult<()> {
        let properties = snapshot.process_properties(definition.properties().clone(), raw, name)?;
        if properties.is_empty() {
            return Ok(());
        }
        let target = definition.capabilities.property_target(raw).ok_or_else(|| BeanError::InvalidDefinition {
            name: name.to_string(),
            reason: format!(
                "declares {} propert{} but is not a property target",
                properties.len(),
                if properties.len() == 1 { "y" } else { "ies" }
            ),
        })?;
        for property in properties {
            let (property_name, source) = property.into_parts();
            let expected = target.property_type(&property_name);
            let value = self.resolve_value(name, &property_name, &source, expected)?;
            target.set_property(&property_name, value)?;
        }
        Ok(())
    }

    /// Resolves one declared value for the injection point `point` of `bean`,
    /// converting it to `target` when the point declares a type.
    pub(crate) fn resolve_value(
        &self,
        bean: &str,
        point: &str,
        source: &ValueSource,
        target: Option<TypeKey>,
    ) -> BeanResult<Value> {
        match source {
            ValueSource::Literal(value) => self.convert(bean, point, value.clone(), target),
            ValueSource::Reference(reference) => self.resolve_reference(bean, point, reference),
            ValueSource::Expression { expression, expected } => {
                let expected = expected.or(target);
                let value = self
                    .inner()
                    .evaluator
                    .evaluate(expression, expected)
                    .map_err(|err| BeanError::unsatisfied(bean, point, err))?;
                self.convert(bean, point, value, expected)
            }
        }
    }

    fn convert(&self, bean: &str, point: &str, value: Value, target: Option<TypeKey>) -> BeanResult<Value> {
        match target {
            Some(key) => self
                .inner()
                .conversion
                .convert(value, key)
                .map_err(|err| BeanError::unsatisfied(bean, point, err)),
            None => Ok(value),
        }
    }

    fn resolve_reference(&self, bean: &str, point: &str, reference: &BeanReference) -> BeanResult<Value> {
        let resolved = match (reference.name(), reference.required_type()) {
            (Some(target), required) => self.reference_by_name(target, required, reference.is_required()),
            (None, Some(key)) => {
                let mut descriptor = DependencyDescriptor::for_key(key).requested_by(bean).at(point);
                if let Some(qualifier) = reference.qualifier() {
                    descriptor = descriptor.qualified(qualifier);
                }
                if !reference.is_required() {
                    descriptor = descriptor.optional();
                }
                self.resolve_dependency(&descriptor)
            }
            (None, None) => {
                return Err(BeanError::InvalidDefinition {
                    name: bean.to_string(),
                    reason: format!("reference at '{}' names neither a bean nor a type", point),
                });
            }
        };
        match resolved {
            Ok(Some(handle)) => {
                self.inner().singletons.add_dependency(bean, handle.name());
                Ok(Value::Bean(handle))
            }
            Ok(None) => Ok(Value::Null),
            Err(err) => Err(BeanError::unsatisfied(bean, point, err)),
        }
    }

    fn reference_by_name(&self, target: &str, required: Option<TypeKey>, is_required: bool) -> BeanResult<Option<BeanHandle>> {
        let handle = match self.get_handle(target) {
            Ok(handle) => handle,
            // only a missing target is tolerated, not a missing transitive dependency
            Err(BeanError::NoSuchDefinition { .. }) if !is_required => return Ok(None),
            Err(err) => return Err(err),
        };
        if let Some(key) = required {
            let Some(object) = handle.object() else {
                return Err(BeanError::IllegalState(format!("bean '{}' failed during creation", target)));
            };
            let matches = instance_type_id(&object) == key.id() || handle.views().iter().any(|v| v.key() == key);
            if !matches {
                return Err(BeanError::TypeMismatch {
                    name: target.to_string(),
                    expected: key.name(),
                    actual: instance_type_name(&object),
                });
            }
        }
        Ok(Some(handle))
    }

    fn register_disposal(
        &self,
        name: &str,
        raw: &AnyArc,
        exposed: &AnyArc,
        definition: &BeanDefinition,
        snapshot: &ProcessorSnapshot,
    ) {
        let inner = self.inner();
        match definition.scope() {
            BeanScope::Prototype => {}
            BeanScope::Singleton => {
                if let Some(adapter) = DisposableAdapter::for_bean(name, raw, exposed, definition, snapshot) {
                    inner.singletons.register_disposable(adapter);
                }
            }
            BeanScope::Custom(scope_name) => {
                let Some(scope) = inner.scopes.get(&scope_name) else {
                    return;
                };
                if let Some(adapter) = DisposableAdapter::for_bean(name, raw, exposed, definition, snapshot) {
                    scope.register_destruction_callback(
                        name,
                        Box::new(move || {
                            let bean = adapter.name().to_string();
                            for failure in adapter.destroy() {
                                tracing::warn!(bean = %bean, error = %failure, "scoped bean destruction failed");
                            }
                        }),
                    );
                }
            }
        }
    }

    fn mark_initialized(&self, name: &str, definition: &BeanDefinition) {
        if !definition.is_singleton() {
            return;
        }
        definition.mark_initialized();
        if let Some(registered) = self.inner().registry.read().get(name) {
            registered.mark_initialized();
        }
    }
}

fn same_object(a: &AnyArc, b: &AnyArc) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}
