//! The bean container.
//!
//! A [`Container`] owns the definition registry, the singleton cache, the
//! registered scopes and both post-processor families. It is a cheap handle
//! around shared state: clones refer to the same container.

mod bootstrap;
mod candidates;
mod engine;

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use ahash::AHashMap;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use crate::cache::{DestroyReport, SingletonCache};
use crate::config::{ContainerConfig, PlaceholderEvaluator};
use crate::definition::BeanDefinition;
use crate::error::{BeanError, BeanResult};
use crate::handle::{AnyArc, BeanHandle};
use crate::key::TypeKey;
use crate::observer::{ContainerObserver, Observers};
use crate::postprocess::{DefinitionPostProcessor, InstancePipeline, InstancePostProcessor};
use crate::registry::{DefinitionRegistry, Registered};
use crate::resolver::{CandidateResolver, DefaultCandidateResolver, DependencyDescriptor};
use crate::scope::{Scope, ScopeRegistry};
use crate::traits::{
    ConversionService, DefaultConversionService, DefaultNameGenerator, ExpressionEvaluator, NameGenerator,
};

static NEXT_CONTAINER_ID: AtomicUsize = AtomicUsize::new(1);

/// Prefix dereferencing a factory bean: `&name` is the factory, `name` its product.
pub const FACTORY_BEAN_PREFIX: char = '&';

pub(crate) struct ContainerInner {
    /// Distinguishes this container in the thread-local creation chain
    id: usize,
    config: ContainerConfig,
    registry: RwLock<DefinitionRegistry>,
    merged: RwLock<AHashMap<String, Arc<BeanDefinition>>>,
    singletons: SingletonCache,
    /// Products of singleton factory beans, first produced wins
    products: Mutex<AHashMap<String, BeanHandle>>,
    scopes: ScopeRegistry,
    pipeline: InstancePipeline,
    definition_processors: Mutex<Vec<Arc<dyn DefinitionPostProcessor>>>,
    parent: Option<Container>,
    resolver: Arc<dyn CandidateResolver>,
    evaluator: Arc<dyn ExpressionEvaluator>,
    conversion: Arc<dyn ConversionService>,
    name_generator: Arc<dyn NameGenerator>,
    observers: Observers,
    refreshed: AtomicBool,
    closed: AtomicBool,
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        let pending = self.singletons.disposable_count();
        if pending > 0 && !self.closed.load(Ordering::Acquire) {
            tracing::warn!(
                container = self.id,
                pending,
                "container dropped with undestroyed singletons; call destroy_all() or close() first"
            );
        }
    }
}

/// Runtime object-lifecycle container.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use ferrous_beans::{BeanDefinition, BeanReference, Container, ValueSource};
///
/// #[derive(Default)]
/// struct Database;
///
/// struct UserService {
///     db: Arc<Database>,
/// }
///
/// let container = Container::new();
/// container
///     .register_definition("db", BeanDefinition::builder::<Database>().default_constructor().build())
///     .unwrap();
/// container
///     .register_definition(
///         "users",
///         BeanDefinition::builder::<UserService>()
///             .constructor([ValueSource::from(BeanReference::of_type::<Database>())], |args| {
///                 Ok(UserService { db: args.bean::<Database>(0)? })
///             })
///             .build(),
///     )
///     .unwrap();
///
/// container.refresh().unwrap();
/// let users = container.get_instance_of::<UserService>().unwrap();
/// assert!(Arc::ptr_eq(&users.db, &container.get_bean::<Database>("db").unwrap()));
///
/// let report = container.close();
/// assert!(report.is_clean());
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

/// Non-owning reference to a container, for beans that keep it around.
#[derive(Clone)]
pub struct WeakContainer {
    inner: Weak<ContainerInner>,
}

impl WeakContainer {
    pub fn upgrade(&self) -> Option<Container> {
        self.inner.upgrade().map(|inner| Container { inner })
    }
}

impl fmt::Debug for WeakContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakContainer").field("alive", &(self.inner.strong_count() > 0)).finish()
    }
}

/// Builder wiring the pluggable strategies of a [`Container`].
///
/// ```rust
/// use std::sync::Arc;
/// use ferrous_beans::{Container, ContainerConfig, LoggingObserver, ThreadScope};
///
/// let container = Container::builder()
///     .config(ContainerConfig {
///         allow_definition_overriding: false,
///         ..ContainerConfig::default()
///     })
///     .scope("thread", Arc::new(ThreadScope::new()))
///     .observer(Arc::new(LoggingObserver::new()))
///     .build();
///
/// assert!(!container.config().allow_definition_overriding);
/// assert_eq!(container.scope_names(), ["thread".to_string()]);
/// ```
pub struct ContainerBuilder {
    config: ContainerConfig,
    parent: Option<Container>,
    resolver: Option<Arc<dyn CandidateResolver>>,
    evaluator: Option<Arc<dyn ExpressionEvaluator>>,
    conversion: Option<Arc<dyn ConversionService>>,
    name_generator: Option<Arc<dyn NameGenerator>>,
    observers: Observers,
    scopes: Vec<(String, Arc<dyn Scope>)>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self {
            config: ContainerConfig::default(),
            parent: None,
            resolver: None,
            evaluator: None,
            conversion: None,
            name_generator: None,
            observers: Observers::new(),
            scopes: Vec::new(),
        }
    }

    pub fn config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    /// Ancestor consulted for names and types not defined locally.
    pub fn parent(mut self, parent: &Container) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    pub fn candidate_resolver(mut self, resolver: Arc<dyn CandidateResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn expression_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn conversion_service(mut self, conversion: Arc<dyn ConversionService>) -> Self {
        self.conversion = Some(conversion);
        self
    }

    pub fn name_generator(mut self, generator: Arc<dyn NameGenerator>) -> Self {
        self.name_generator = Some(generator);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn ContainerObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    pub fn scope(mut self, name: impl Into<String>, scope: Arc<dyn Scope>) -> Self {
        self.scopes.push((name.into(), scope));
        self
    }

    pub fn build(self) -> Container {
        let id = NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed);
        let scopes = ScopeRegistry::new();
        for (name, scope) in self.scopes {
            if let Err(err) = scopes.register(&name, scope) {
                tracing::warn!(scope = %name, error = %err, "ignoring scope");
            }
        }
        Container {
            inner: Arc::new(ContainerInner {
                id,
                registry: RwLock::new(DefinitionRegistry::new(self.config.allow_definition_overriding)),
                config: self.config,
                merged: RwLock::new(AHashMap::new()),
                singletons: SingletonCache::new(id),
                products: Mutex::new(AHashMap::new()),
                scopes,
                pipeline: InstancePipeline::new(),
                definition_processors: Mutex::new(Vec::new()),
                parent: self.parent,
                resolver: self.resolver.unwrap_or_else(|| Arc::new(DefaultCandidateResolver)),
                evaluator: self.evaluator.unwrap_or_else(|| Arc::new(PlaceholderEvaluator::default())),
                conversion: self.conversion.unwrap_or_else(|| Arc::new(DefaultConversionService)),
                name_generator: self.name_generator.unwrap_or_else(|| Arc::new(DefaultNameGenerator)),
                observers: self.observers,
                refreshed: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        }
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    /// Container with default configuration and strategies.
    pub fn new() -> Self {
        ContainerBuilder::new().build()
    }

    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    pub fn with_config(config: ContainerConfig) -> Self {
        ContainerBuilder::new().config(config).build()
    }

    /// Child container delegating unknown names and types to `self`.
    pub fn child(&self) -> Container {
        ContainerBuilder::new().config(self.inner.config.clone()).parent(self).build()
    }

    #[inline]
    pub(crate) fn inner(&self) -> &ContainerInner {
        &self.inner
    }

    pub fn downgrade(&self) -> WeakContainer {
        WeakContainer {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    pub fn parent(&self) -> Option<&Container> {
        self.inner.parent.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn is_refreshed(&self) -> bool {
        self.inner.refreshed.load(Ordering::Acquire)
    }

    // ----- definitions -----

    /// Registers `definition` under `name`.
    ///
    /// Replacing an existing definition (when overriding is allowed) discards
    /// the singleton created from the old one and notifies instance
    /// post-processors through `reset_definition`.
    pub fn register_definition(&self, name: &str, definition: BeanDefinition) -> BeanResult<()> {
        let outcome = self.inner.registry.write().register(name, definition)?;
        self.clear_merged();
        match outcome {
            Registered::New => tracing::debug!(bean = name, "registered bean definition"),
            Registered::Replaced(_) => self.reset_bean(name),
        }
        Ok(())
    }

    /// Registers `definition` under a name produced by the name generator.
    ///
    /// ```rust
    /// use ferrous_beans::{BeanDefinition, Container};
    ///
    /// #[derive(Default)]
    /// struct OrderService;
    ///
    /// let container = Container::new();
    /// let first = container.register(BeanDefinition::builder::<OrderService>().default_constructor().build()).unwrap();
    /// let second = container.register(BeanDefinition::builder::<OrderService>().default_constructor().build()).unwrap();
    ///
    /// assert_eq!(first, "orderService");
    /// assert_eq!(second, "orderService#1");
    /// ```
    pub fn register(&self, definition: BeanDefinition) -> BeanResult<String> {
        let name = {
            let registry = self.inner.registry.read();
            self.inner
                .name_generator
                .generate_name(&definition, &|candidate| registry.contains(candidate) || registry.is_alias(candidate))
        };
        self.register_definition(&name, definition)?;
        Ok(name)
    }

    /// Removes the definition, destroying its singleton (and the singletons
    /// depending on it) if one was created.
    pub fn remove_definition(&self, name: &str) -> BeanResult<BeanDefinition> {
        let name = self.canonical_name(name);
        let removed = self.inner.registry.write().remove(&name)?;
        self.clear_merged();
        self.reset_bean(&name);
        tracing::debug!(bean = %name, "removed bean definition");
        Ok(BeanDefinition::clone(&removed))
    }

    /// The definition as registered (not merged with its parent).
    pub fn get_definition(&self, name: &str) -> BeanResult<BeanDefinition> {
        let name = self.canonical_name(name);
        let registry = self.inner.registry.read();
        match registry.get(&name) {
            Some(definition) => Ok(BeanDefinition::clone(definition)),
            None => Err(BeanError::no_such_name(name)),
        }
    }

    /// The effective definition after parent inheritance.
    pub fn get_merged_definition(&self, name: &str) -> BeanResult<BeanDefinition> {
        let name = self.canonical_name(name);
        self.merged_definition(&name).map(|merged| BeanDefinition::clone(&merged))
    }

    /// Replaces a definition with an updated copy.
    ///
    /// Fails with [`BeanError::IllegalState`] when the scope or construction
    /// policy of a definition whose singleton was already created would change.
    pub fn update_definition(&self, name: &str, update: impl FnOnce(&mut BeanDefinition)) -> BeanResult<()> {
        let name = self.canonical_name(name);
        self.inner.registry.write().update(&name, update)?;
        self.clear_merged();
        Ok(())
    }

    /// Name and definition of the unique bean assignable to `T`.
    pub fn definition_for_type<T: ?Sized + 'static>(&self) -> BeanResult<(String, BeanDefinition)> {
        let descriptor = DependencyDescriptor::of::<T>().without_eager_init();
        let candidates = self.local_candidates(&descriptor)?;
        let name = self
            .inner
            .resolver
            .select(&descriptor, &candidates)?
            .ok_or_else(|| BeanError::no_such_type(std::any::type_name::<T>(), "no bean definition of this type"))?;
        let definition = self.get_definition(&name)?;
        Ok((name, definition))
    }

    pub fn contains_definition(&self, name: &str) -> bool {
        let name = self.canonical_name(name);
        self.inner.registry.read().contains(&name)
    }

    /// `true` if `name` resolves to a definition or a registered singleton,
    /// here or in an ancestor.
    pub fn contains_bean(&self, name: &str) -> bool {
        let stripped = name.trim_start_matches(FACTORY_BEAN_PREFIX);
        let canonical = self.canonical_name(stripped);
        if self.inner.singletons.contains(&canonical) || self.inner.registry.read().contains(&canonical) {
            return true;
        }
        self.inner.parent.as_ref().is_some_and(|parent| parent.contains_bean(name))
    }

    /// Definition names in registration order.
    pub fn definition_names(&self) -> Vec<String> {
        self.inner.registry.read().names().to_vec()
    }

    pub fn definition_count(&self) -> usize {
        self.inner.registry.read().len()
    }

    /// Registers `alias` for `name`.
    ///
    /// When overriding is allowed an alias may take over the name of an
    /// existing definition; that definition is removed and its singleton
    /// destroyed.
    pub fn register_alias(&self, name: &str, alias: &str) -> BeanResult<()> {
        let replaced = self.inner.registry.write().register_alias(name, alias)?;
        self.clear_merged();
        if replaced.is_some() {
            tracing::debug!(alias, bean = name, "alias replaced bean definition");
            self.reset_bean(alias);
        }
        Ok(())
    }

    pub fn aliases(&self, name: &str) -> Vec<String> {
        let name = self.canonical_name(name);
        self.inner.registry.read().aliases_of(&name)
    }

    pub fn canonical_name(&self, name: &str) -> String {
        self.inner.registry.read().canonical_name(name).to_string()
    }

    // ----- singletons and scopes -----

    /// Registers an already created object as a singleton, bypassing definitions.
    ///
    /// No lifecycle callback runs for it, neither on registration nor on destruction.
    pub fn register_singleton<T: Any + Send + Sync>(&self, name: &str, object: Arc<T>) -> BeanResult<()> {
        self.register_singleton_object(name, object)
    }

    pub fn register_singleton_object(&self, name: &str, object: AnyArc) -> BeanResult<()> {
        if name.is_empty() {
            return Err(BeanError::InvalidDefinition {
                name: name.to_string(),
                reason: "bean name must not be empty".into(),
            });
        }
        let name = self.canonical_name(name);
        let views = Arc::from(Vec::new());
        self.inner.singletons.register_singleton(&name, object, views)?;
        tracing::debug!(bean = %name, "registered singleton instance");
        Ok(())
    }

    pub fn contains_singleton(&self, name: &str) -> bool {
        let name = self.canonical_name(name);
        self.inner.singletons.contains(&name)
    }

    /// Names of the created singletons in creation order.
    pub fn singleton_names(&self) -> Vec<String> {
        self.inner.singletons.names()
    }

    pub fn singleton_count(&self) -> usize {
        self.inner.singletons.len()
    }

    /// Registers a custom scope. `singleton` and `prototype` cannot be replaced.
    pub fn register_scope(&self, name: &str, scope: Arc<dyn Scope>) -> BeanResult<()> {
        self.inner.scopes.register(name, scope)
    }

    pub fn registered_scope(&self, name: &str) -> Option<Arc<dyn Scope>> {
        self.inner.scopes.get(name)
    }

    pub fn scope_names(&self) -> Vec<String> {
        self.inner.scopes.names()
    }

    /// Beans that depend on `name`.
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.inner.singletons.dependents_of(&self.canonical_name(name))
    }

    /// Beans `name` depends on.
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        self.inner.singletons.dependencies_of(&self.canonical_name(name))
    }

    pub fn is_currently_in_creation(&self, name: &str) -> bool {
        let name = self.canonical_name(name);
        self.inner.singletons.is_currently_in_creation(&name)
            || crate::internal::circular::is_on_stack(self.inner.id, &name)
    }

    fn is_in_creation_on_this_thread(&self, name: &str) -> bool {
        let name = self.canonical_name(name);
        self.inner.singletons.is_created_by_current_thread(&name)
            || crate::internal::circular::is_on_stack(self.inner.id, &name)
    }

    /// Marks `name` as excluded from (or subject to) in-creation checks.
    pub fn set_currently_in_creation(&self, name: &str, in_creation: bool) {
        let name = self.canonical_name(name);
        self.inner.singletons.set_excluded(&name, !in_creation);
    }

    // ----- post-processors -----

    /// Adds an instance post-processor. Programmatic processors apply in
    /// registration order; only beans created afterwards see it.
    pub fn add_instance_post_processor(&self, processor: Arc<dyn InstancePostProcessor>) {
        self.inner.pipeline.add(processor, None);
    }

    pub fn instance_post_processor_count(&self) -> usize {
        self.inner.pipeline.len()
    }

    /// Adds a definition post-processor, run by the next [`refresh`](Self::refresh).
    pub fn add_definition_post_processor(&self, processor: Arc<dyn DefinitionPostProcessor>) {
        self.inner.definition_processors.lock().push(processor);
    }

    // ----- lookups -----

    /// Bean by name. `&name` yields a factory bean itself instead of its product.
    pub fn get_instance(&self, name: &str) -> BeanResult<AnyArc> {
        let handle = self.get_handle(name)?;
        handle
            .object()
            .ok_or_else(|| BeanError::IllegalState(format!("bean '{}' failed during creation", name)))
    }

    /// Bean by name viewed as `T`.
    pub fn get_bean<T: Any + Send + Sync>(&self, name: &str) -> BeanResult<Arc<T>> {
        self.get_handle(name)?.require::<T>()
    }

    /// Bean by name viewed as `I`, usually a `dyn Trait`.
    pub fn get_bean_as<I: ?Sized + Send + Sync + 'static>(&self, name: &str) -> BeanResult<Arc<I>> {
        self.get_handle(name)?.require_as::<I>()
    }

    /// The unique bean assignable to `T`.
    pub fn get_instance_of<T: Any + Send + Sync>(&self) -> BeanResult<Arc<T>> {
        self.required_handle(DependencyDescriptor::of::<T>())?.require::<T>()
    }

    /// The bean assignable to `T` selected with `qualifier`.
    pub fn get_instance_of_qualified<T: Any + Send + Sync>(&self, qualifier: &str) -> BeanResult<Arc<T>> {
        self.required_handle(DependencyDescriptor::of::<T>().qualified(qualifier))?
            .require::<T>()
    }

    /// The unique bean exposing the trait `I`.
    pub fn get_trait<I: ?Sized + Send + Sync + 'static>(&self) -> BeanResult<Arc<I>> {
        self.required_handle(DependencyDescriptor::of::<I>())?.require_as::<I>()
    }

    pub fn get_trait_qualified<I: ?Sized + Send + Sync + 'static>(&self, qualifier: &str) -> BeanResult<Arc<I>> {
        self.required_handle(DependencyDescriptor::of::<I>().qualified(qualifier))?
            .require_as::<I>()
    }

    /// Resolves a type-based dependency to a bean handle.
    ///
    /// `Ok(None)` is only returned for optional descriptors without a match.
    pub fn resolve_dependency(&self, descriptor: &DependencyDescriptor) -> BeanResult<Option<BeanHandle>> {
        let candidates = self.collect_candidates(descriptor)?;
        let Some(winner) = self.inner.resolver.select(descriptor, &candidates)? else {
            return Ok(None);
        };
        let local = candidates.iter().any(|c| c.name == winner && c.local);
        let handle = match (&self.inner.parent, local) {
            (Some(parent), false) => parent.get_handle(&winner)?,
            _ => self.get_handle(&winner)?,
        };
        Ok(Some(handle))
    }

    fn required_handle(&self, descriptor: DependencyDescriptor) -> BeanResult<BeanHandle> {
        self.resolve_dependency(&descriptor)?.ok_or_else(|| {
            BeanError::no_such_type(descriptor.required_type().name(), "no qualifying bean available")
        })
    }

    /// Every bean assignable to `T`, keyed by name in registration order.
    ///
    /// Beans the calling thread is still creating are skipped instead of
    /// failing the scan.
    pub fn get_instances_of_type<T: Any + Send + Sync>(&self) -> BeanResult<IndexMap<String, Arc<T>>> {
        let mut beans = IndexMap::new();
        for (name, handle) in self.handles_of_type(TypeKey::of::<T>())? {
            if let Some(bean) = handle.get::<T>() {
                beans.insert(name, bean);
            }
        }
        Ok(beans)
    }

    /// Every bean exposing the trait `I`, keyed by name in registration order.
    pub fn get_trait_instances<I: ?Sized + Send + Sync + 'static>(&self) -> BeanResult<IndexMap<String, Arc<I>>> {
        let mut beans = IndexMap::new();
        for (name, handle) in self.handles_of_type(TypeKey::of::<I>())? {
            if let Some(bean) = handle.get_as::<I>() {
                beans.insert(name, bean);
            }
        }
        Ok(beans)
    }

    fn handles_of_type(&self, key: TypeKey) -> BeanResult<Vec<(String, BeanHandle)>> {
        let mut handles = Vec::new();
        for name in self.names_for_key(key, true, true) {
            // another thread's creation is awaited by get_handle
            if self.is_in_creation_on_this_thread(&name) {
                tracing::trace!(bean = %name, "skipping bean in creation during type scan");
                continue;
            }
            match self.get_handle(&name) {
                Ok(handle) => handles.push((name, handle)),
                Err(err) if err.is_currently_in_creation() => {
                    tracing::trace!(bean = %name, "skipping bean in creation during type scan");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(handles)
    }

    /// Names of the beans assignable to `T`, without creating them
    /// unless a factory bean has to report its product type.
    pub fn names_for_type<T: ?Sized + 'static>(&self) -> Vec<String> {
        self.names_for_key(TypeKey::of::<T>(), true, self.inner.config.allow_eager_init_for_type_matching)
    }

    pub fn is_singleton(&self, name: &str) -> BeanResult<bool> {
        let canonical = self.canonical_name(name.trim_start_matches(FACTORY_BEAN_PREFIX));
        if self.inner.singletons.contains(&canonical) && !self.inner.registry.read().contains(&canonical) {
            return Ok(true);
        }
        match self.merged_definition(&canonical) {
            Ok(definition) => Ok(definition.is_singleton()),
            Err(err) => match &self.inner.parent {
                Some(parent) if err.is_no_such_definition() => parent.is_singleton(name),
                _ => Err(err),
            },
        }
    }

    pub fn is_prototype(&self, name: &str) -> BeanResult<bool> {
        let canonical = self.canonical_name(name.trim_start_matches(FACTORY_BEAN_PREFIX));
        match self.merged_definition(&canonical) {
            Ok(definition) => Ok(definition.is_prototype()),
            Err(_) if self.inner.singletons.contains(&canonical) => Ok(false),
            Err(err) => match &self.inner.parent {
                Some(parent) if err.is_no_such_definition() => parent.is_prototype(name),
                _ => Err(err),
            },
        }
    }

    /// Type a lookup of `name` yields: the product type for factory beans,
    /// the declared bean type otherwise. `None` when it cannot be determined
    /// without creating the bean.
    pub fn type_of(&self, name: &str) -> BeanResult<Option<TypeKey>> {
        let deref = name.starts_with(FACTORY_BEAN_PREFIX);
        let canonical = self.canonical_name(name.trim_start_matches(FACTORY_BEAN_PREFIX));
        let definition = match self.merged_definition(&canonical) {
            Ok(definition) => definition,
            Err(err) if err.is_no_such_definition() => {
                if self.inner.singletons.contains(&canonical) {
                    return Ok(None);
                }
                return match &self.inner.parent {
                    Some(parent) => parent.type_of(name),
                    None => Err(err),
                };
            }
            Err(err) => return Err(err),
        };
        if definition.is_factory_bean() && !deref {
            return Ok(self.product_type(&canonical, &definition, false));
        }
        Ok(definition.bean_type())
    }

    // ----- teardown -----

    /// Destroys one singleton and the singletons depending on it.
    pub fn destroy_singleton(&self, name: &str) -> DestroyReport {
        let name = self.canonical_name(name);
        self.destroy_registered(&name)
    }

    /// Destroys the singleton cached under exactly `name`, without alias lookup.
    fn destroy_registered(&self, name: &str) -> DestroyReport {
        self.inner.products.lock().remove(name);
        let report = self.inner.singletons.destroy_singleton(name);
        for destroyed in report.destroyed() {
            self.inner.products.lock().remove(destroyed);
            self.inner.observers.destroyed(destroyed);
        }
        report
    }

    /// Destroys every singleton, dependents before their dependencies.
    ///
    /// Destroy callbacks that fail are reported, never abort the sweep.
    pub fn destroy_all(&self) -> DestroyReport {
        let report = self.inner.singletons.destroy_all();
        self.inner.products.lock().clear();
        for name in report.destroyed() {
            self.inner.observers.destroyed(name);
        }
        if report.is_clean() {
            tracing::debug!(destroyed = report.destroyed().len(), "destroyed singletons");
        } else {
            tracing::warn!(
                destroyed = report.destroyed().len(),
                failures = report.failures().len(),
                "destroyed singletons with failures"
            );
        }
        report
    }

    /// Destroys all singletons and rejects any later creation.
    pub fn close(&self) -> DestroyReport {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return DestroyReport::default();
        }
        tracing::info!(container = self.inner.id, "closing container");
        self.destroy_all()
    }

    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        let mut s = String::new();
        s.push_str("=== Container Debug ===\n");
        s.push_str("Definitions:\n");
        for (name, definition) in self.inner.registry.read().iter() {
            s.push_str(&format!(
                "  {}: {} {} {:?}{}\n",
                name,
                definition.bean_type().map(|k| k.short_name()).unwrap_or("?"),
                definition.scope(),
                definition.capabilities(),
                if self.inner.singletons.contains(name) { " [created]" } else { "" },
            ));
        }
        s.push_str("Singletons:\n");
        for name in self.inner.singletons.names() {
            s.push_str(&format!("  {} -> {:?}\n", name, self.inner.singletons.dependencies_of(&name)));
        }
        s.push_str(&format!("Scopes: {:?}\n", self.inner.scopes.names()));
        s.push_str(&format!("Instance post-processors: {}\n", self.inner.pipeline.len()));
        s
    }

    // ----- internals -----

    fn clear_merged(&self) {
        self.inner.merged.write().clear();
    }

    /// Drops everything derived from the definition registered under `name`.
    fn reset_bean(&self, name: &str) {
        let report = self.destroy_registered(name);
        for failure in report.failures() {
            tracing::warn!(bean = name, error = %failure, "destroy failed while resetting definition");
        }
        self.inner.pipeline.remove_origin(name);
        self.inner.pipeline.snapshot().reset_definition(name);
    }

    pub(crate) fn ensure_open(&self, name: &str) -> BeanResult<()> {
        if self.is_closed() {
            return Err(BeanError::CreationNotAllowed(name.to_string()));
        }
        Ok(())
    }

    /// Definition after parent inheritance, cached until the registry changes.
    pub(crate) fn merged_definition(&self, name: &str) -> BeanResult<Arc<BeanDefinition>> {
        if let Some(merged) = self.inner.merged.read().get(name) {
            return Ok(merged.clone());
        }
        let mut chain = Vec::new();
        let merged = self.merge_chain(name, &mut chain)?;
        self.inner.merged.write().insert(name.to_string(), merged.clone());
        Ok(merged)
    }

    fn merge_chain(&self, name: &str, chain: &mut Vec<String>) -> BeanResult<Arc<BeanDefinition>> {
        if chain.iter().any(|n| n == name) {
            chain.push(name.to_string());
            return Err(BeanError::InvalidDefinition {
                name: chain[0].clone(),
                reason: format!("parent definitions form a cycle: {}", chain.join(" -> ")),
            });
        }
        chain.push(name.to_string());
        let definition = self
            .inner
            .registry
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| BeanError::no_such_name(name))?;
        let Some(parent_name) = definition.parent() else {
            return Ok(definition);
        };
        let parent_name = self.canonical_name(parent_name);
        let parent = if parent_name != name && self.inner.registry.read().contains(&parent_name) {
            self.merge_chain(&parent_name, chain)?
        } else if let Some(ancestor) = &self.inner.parent {
            ancestor.merged_definition(&parent_name).map_err(|err| invalid_parent(name, &parent_name, err))?
        } else {
            return Err(invalid_parent(name, &parent_name, BeanError::no_such_name(&parent_name)));
        };
        Ok(Arc::new(definition.merged_over(&parent)))
    }
}

fn invalid_parent(name: &str, parent: &str, cause: BeanError) -> BeanError {
    BeanError::InvalidDefinition {
        name: name.to_string(),
        reason: format!("could not resolve parent definition '{}': {}", parent, cause),
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.inner.id)
            .field("definitions", &self.inner.registry.read().len())
            .field("singletons", &self.inner.singletons.len())
            .field("has_parent", &self.inner.parent.is_some())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Plain;

    fn plain() -> BeanDefinition {
        BeanDefinition::builder::<Plain>().default_constructor().build()
    }

    #[test]
    fn weak_container_does_not_keep_it_alive() {
        let container = Container::new();
        let weak = container.downgrade();
        assert!(weak.upgrade().is_some());
        drop(container);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn parent_chain_cycle_is_invalid() {
        let container = Container::new();
        let mut a = plain();
        a.set_parent(Some("b".into()));
        let mut b = plain();
        b.set_parent(Some("a".into()));
        container.register_definition("a", a).unwrap();
        container.register_definition("b", b).unwrap();
        let err = container.get_merged_definition("a").unwrap_err();
        assert!(matches!(err, BeanError::InvalidDefinition { .. }));
    }

    #[test]
    fn merged_definitions_follow_registry_changes() {
        let container = Container::new();
        container
            .register_definition("base", BeanDefinition::template())
            .unwrap();
        container
            .register_definition("child", BeanDefinition::child_of("base"))
            .unwrap();
        assert!(!container.get_merged_definition("child").unwrap().is_prototype());

        container
            .update_definition("base", |def| def.set_scope(crate::scope::BeanScope::Prototype))
            .unwrap();
        assert!(container.get_merged_definition("child").unwrap().is_prototype());
    }

    #[test]
    fn child_container_inherits_parent_definitions() {
        let parent = Container::new();
        parent.register_definition("shared", plain()).unwrap();
        let child = parent.child();
        assert!(child.contains_bean("shared"));
        assert!(!child.contains_definition("shared"));
        let from_child = child.get_bean::<Plain>("shared").unwrap();
        assert!(Arc::ptr_eq(&from_child, &parent.get_bean::<Plain>("shared").unwrap()));
    }

    #[test]
    fn closed_container_rejects_creation() {
        let container = Container::new();
        container.register_definition("p", plain()).unwrap();
        container.close();
        assert!(matches!(
            container.get_instance("p"),
            Err(BeanError::CreationNotAllowed(_))
        ));
        assert!(container.close().destroyed().is_empty());
    }
}
