//! Bean definitions and their typed builder.

mod capabilities;
mod instantiation;
mod properties;

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::container::Container;
use crate::error::{BeanError, BeanResult};
use crate::handle::{AnyArc, BeanHandle, TypeViews};
use crate::key::TypeKey;
use crate::postprocess::{DefinitionPostProcessor, InstancePostProcessor, ProcessingOrder};
use crate::scope::BeanScope;
use crate::traits::{
    BeanNameAware, ContainerAware, DisposableBean, FactoryBean, InitializingBean, PropertyTarget,
    SmartInitializingSingleton,
};
use crate::value::{BeanReference, Value, ValueSource};

pub(crate) use capabilities::{caster, Capabilities};
pub use instantiation::{Instantiation, ResolvedArguments};
pub use properties::{PropertyValue, PropertyValues};

type CastFn = Arc<dyn Fn(&AnyArc) -> Option<AnyArc> + Send + Sync>;
pub(crate) type CallbackFn = Arc<dyn Fn(&AnyArc) -> BeanResult<()> + Send + Sync>;

/// A type a bean can be looked up as besides its concrete type.
///
/// The caster turns the raw object into an `AnyArc` holding an `Arc<I>`, the
/// same representation trait bindings use everywhere else in the crate.
#[derive(Clone)]
pub struct TypeView {
    key: TypeKey,
    cast: CastFn,
}

impl TypeView {
    pub(crate) fn new<T, I>(upcast: fn(Arc<T>) -> Arc<I>) -> Self
    where
        T: Any + Send + Sync,
        I: ?Sized + Send + Sync + 'static,
    {
        Self {
            key: TypeKey::of::<I>(),
            cast: Arc::new(move |object: &AnyArc| {
                let typed = object.clone().downcast::<T>().ok()?;
                let view: AnyArc = Arc::new(upcast(typed));
                Some(view)
            }),
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub(crate) fn cast(&self, object: &AnyArc) -> Option<AnyArc> {
        (self.cast)(object)
    }
}

impl fmt::Debug for TypeView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeView({})", self.key.name())
    }
}

/// Role hint of a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    /// User-level component
    #[default]
    Application,
    /// Supporting part of a larger configuration
    Support,
    /// Container infrastructure (post-processors and the like)
    Infrastructure,
}

/// A named callback, e.g. an init or destroy method.
#[derive(Clone)]
pub struct LifecycleMethod {
    name: String,
    call: CallbackFn,
}

impl LifecycleMethod {
    pub(crate) fn new(name: impl Into<String>, call: CallbackFn) -> Self {
        Self { name: name.into(), call }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn invoke(&self, object: &AnyArc) -> BeanResult<()> {
        (self.call)(object)
    }
}

impl fmt::Debug for LifecycleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Declarative description of one managed component.
///
/// Definitions are usually assembled with [`BeanDefinition::builder`]; definition
/// post-processors adjust registered ones through the setters.
///
/// Values left unset (`scope`, `lazy_init`, the construction policy, ...) are
/// inherited from the parent definition when one is named; the effective
/// definition after inheritance is the *merged* definition.
pub struct BeanDefinition {
    bean_type: Option<TypeKey>,
    views: Vec<TypeView>,
    scope: Option<BeanScope>,
    instantiation: Option<Instantiation>,
    properties: PropertyValues,
    init_methods: Vec<LifecycleMethod>,
    destroy_method: Option<LifecycleMethod>,
    role: Role,
    primary: bool,
    lazy_init: Option<bool>,
    is_abstract: bool,
    parent: Option<String>,
    depends_on: Vec<String>,
    qualifiers: Vec<String>,
    priority: Option<i32>,
    autowire_candidate: bool,
    attributes: IndexMap<String, String>,
    processing_order: Option<ProcessingOrder>,
    product_type: Option<TypeKey>,
    description: Option<String>,
    pub(crate) capabilities: Capabilities,
    initialized: AtomicBool,
}

impl Clone for BeanDefinition {
    fn clone(&self) -> Self {
        Self {
            bean_type: self.bean_type,
            views: self.views.clone(),
            scope: self.scope.clone(),
            instantiation: self.instantiation.clone(),
            properties: self.properties.clone(),
            init_methods: self.init_methods.clone(),
            destroy_method: self.destroy_method.clone(),
            role: self.role,
            primary: self.primary,
            lazy_init: self.lazy_init,
            is_abstract: self.is_abstract,
            parent: self.parent.clone(),
            depends_on: self.depends_on.clone(),
            qualifiers: self.qualifiers.clone(),
            priority: self.priority,
            autowire_candidate: self.autowire_candidate,
            attributes: self.attributes.clone(),
            processing_order: self.processing_order,
            product_type: self.product_type,
            description: self.description.clone(),
            capabilities: self.capabilities.clone(),
            initialized: AtomicBool::new(self.initialized.load(Ordering::Acquire)),
        }
    }
}

impl Default for BeanDefinition {
    fn default() -> Self {
        Self {
            bean_type: None,
            views: Vec::new(),
            scope: None,
            instantiation: None,
            properties: PropertyValues::new(),
            init_methods: Vec::new(),
            destroy_method: None,
            role: Role::Application,
            primary: false,
            lazy_init: None,
            is_abstract: false,
            parent: None,
            depends_on: Vec::new(),
            qualifiers: Vec::new(),
            priority: None,
            autowire_candidate: true,
            attributes: IndexMap::new(),
            processing_order: None,
            product_type: None,
            description: None,
            capabilities: Capabilities::default(),
            initialized: AtomicBool::new(false),
        }
    }
}

impl BeanDefinition {
    /// Starts a typed builder for a bean of type `T`.
    ///
    /// ```rust
    /// use ferrous_beans::{BeanDefinition, BeanScope};
    ///
    /// #[derive(Default)]
    /// struct Mailer;
    ///
    /// let def = BeanDefinition::builder::<Mailer>()
    ///     .default_constructor()
    ///     .prototype()
    ///     .qualifier("smtp")
    ///     .build();
    ///
    /// assert_eq!(def.scope(), BeanScope::Prototype);
    /// assert!(def.has_qualifier("smtp"));
    /// ```
    pub fn builder<T: Any + Send + Sync>() -> DefinitionBuilder<T> {
        DefinitionBuilder {
            definition: BeanDefinition {
                bean_type: Some(TypeKey::of::<T>()),
                ..BeanDefinition::default()
            },
            _marker: PhantomData,
        }
    }

    /// Untyped, abstract template meant to be named as a `parent`.
    pub fn template() -> BeanDefinition {
        BeanDefinition {
            is_abstract: true,
            ..BeanDefinition::default()
        }
    }

    /// Child of `parent` without a type or policy of its own.
    pub fn child_of(parent: impl Into<String>) -> BeanDefinition {
        BeanDefinition {
            parent: Some(parent.into()),
            ..BeanDefinition::default()
        }
    }

    pub fn bean_type(&self) -> Option<TypeKey> {
        self.bean_type
    }

    pub fn views(&self) -> &[TypeView] {
        &self.views
    }

    /// Effective scope; singleton unless set.
    pub fn scope(&self) -> BeanScope {
        self.scope.clone().unwrap_or(BeanScope::Singleton)
    }

    pub fn is_singleton(&self) -> bool {
        self.scope() == BeanScope::Singleton
    }

    pub fn is_prototype(&self) -> bool {
        self.scope() == BeanScope::Prototype
    }

    pub fn instantiation(&self) -> Option<&Instantiation> {
        self.instantiation.as_ref()
    }

    pub fn properties(&self) -> &PropertyValues {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertyValues {
        &mut self.properties
    }

    pub fn init_methods(&self) -> &[LifecycleMethod] {
        &self.init_methods
    }

    pub fn destroy_method(&self) -> Option<&LifecycleMethod> {
        self.destroy_method.as_ref()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn is_lazy_init(&self) -> bool {
        self.lazy_init.unwrap_or(false)
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    pub fn qualifiers(&self) -> &[String] {
        &self.qualifiers
    }

    pub fn has_qualifier(&self, qualifier: &str) -> bool {
        self.qualifiers.iter().any(|q| q == qualifier)
    }

    pub fn priority(&self) -> Option<i32> {
        self.priority
    }

    pub fn is_autowire_candidate(&self) -> bool {
        self.autowire_candidate
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Order used when the bean itself is a post-processor.
    pub fn processing_order(&self) -> ProcessingOrder {
        self.processing_order.unwrap_or(ProcessingOrder::Unordered)
    }

    /// Declared product type of a factory-bean definition.
    pub fn product_type(&self) -> Option<TypeKey> {
        self.product_type
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_factory_bean(&self) -> bool {
        self.capabilities.is_factory()
    }

    /// `true` once a singleton has been created from this definition.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub(crate) fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    /// Names of the declared lifecycle capabilities.
    pub fn capabilities(&self) -> Vec<&'static str> {
        self.capabilities.declared()
    }

    /// `true` if a bean of this definition can be viewed as `key`.
    pub fn is_assignable_to(&self, key: TypeKey) -> bool {
        self.bean_type == Some(key) || self.views.iter().any(|v| v.key() == key)
    }

    pub(crate) fn type_views(&self) -> TypeViews {
        Arc::from(self.views.clone())
    }

    pub fn set_scope(&mut self, scope: BeanScope) {
        self.scope = Some(scope);
    }

    pub fn set_instantiation(&mut self, instantiation: Instantiation) {
        self.instantiation = Some(instantiation);
    }

    pub fn set_primary(&mut self, primary: bool) {
        self.primary = primary;
    }

    pub fn set_lazy_init(&mut self, lazy: bool) {
        self.lazy_init = Some(lazy);
    }

    pub fn set_abstract(&mut self, is_abstract: bool) {
        self.is_abstract = is_abstract;
    }

    pub fn set_parent(&mut self, parent: Option<String>) {
        self.parent = parent;
    }

    pub fn set_priority(&mut self, priority: Option<i32>) {
        self.priority = priority;
    }

    pub fn set_role(&mut self, role: Role) {
        self.role = role;
    }

    pub fn set_autowire_candidate(&mut self, candidate: bool) {
        self.autowire_candidate = candidate;
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    pub fn add_qualifier(&mut self, qualifier: impl Into<String>) {
        let qualifier = qualifier.into();
        if !self.has_qualifier(&qualifier) {
            self.qualifiers.push(qualifier);
        }
    }

    pub fn add_depends_on(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.depends_on.contains(&name) {
            self.depends_on.push(name);
        }
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn add_property(&mut self, name: impl Into<String>, source: impl Into<ValueSource>) {
        self.properties.add(name, source);
    }

    pub fn set_processing_order(&mut self, order: ProcessingOrder) {
        self.processing_order = Some(order);
    }

    /// `self` layered over its `parent`: values set on `self` win, properties
    /// merge by name, qualifiers and depends-on are combined.
    pub(crate) fn merged_over(&self, parent: &BeanDefinition) -> BeanDefinition {
        let mut attributes = parent.attributes.clone();
        attributes.extend(self.attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
        let mut qualifiers = parent.qualifiers.clone();
        qualifiers.extend(self.qualifiers.iter().filter(|q| !parent.qualifiers.contains(q)).cloned());
        let mut depends_on = parent.depends_on.clone();
        depends_on.extend(self.depends_on.iter().filter(|d| !parent.depends_on.contains(d)).cloned());

        BeanDefinition {
            bean_type: self.bean_type.or(parent.bean_type),
            views: if self.views.is_empty() { parent.views.clone() } else { self.views.clone() },
            scope: self.scope.clone().or_else(|| parent.scope.clone()),
            instantiation: self.instantiation.clone().or_else(|| parent.instantiation.clone()),
            properties: self.properties.merged_over(&parent.properties),
            init_methods: if self.init_methods.is_empty() {
                parent.init_methods.clone()
            } else {
                self.init_methods.clone()
            },
            destroy_method: self.destroy_method.clone().or_else(|| parent.destroy_method.clone()),
            role: self.role,
            primary: self.primary,
            lazy_init: self.lazy_init.or(parent.lazy_init),
            is_abstract: self.is_abstract,
            parent: None,
            depends_on,
            qualifiers,
            priority: self.priority.or(parent.priority),
            autowire_candidate: self.autowire_candidate,
            attributes,
            processing_order: self.processing_order.or(parent.processing_order),
            product_type: self.product_type.or(parent.product_type),
            description: self.description.clone().or_else(|| parent.description.clone()),
            capabilities: self.capabilities.merged_over(&parent.capabilities),
            initialized: AtomicBool::new(self.is_initialized()),
        }
    }

    /// Checks the construction-related invariants of a concrete definition.
    pub(crate) fn validate(&self, name: &str) -> BeanResult<()> {
        if self.is_abstract {
            return Err(BeanError::InvalidDefinition {
                name: name.to_string(),
                reason: "definition is abstract".into(),
            });
        }
        if self.instantiation.is_none() {
            return Err(BeanError::InvalidDefinition {
                name: name.to_string(),
                reason: "no construction policy (default constructor, constructor, factory method or supplier)".into(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("bean_type", &self.bean_type.map(|k| k.name()))
            .field("scope", &self.scope())
            .field("instantiation", &self.instantiation)
            .field("properties", &self.properties.len())
            .field("primary", &self.primary)
            .field("lazy_init", &self.is_lazy_init())
            .field("abstract", &self.is_abstract)
            .field("parent", &self.parent)
            .field("qualifiers", &self.qualifiers)
            .field("priority", &self.priority)
            .field("capabilities", &self.capabilities.declared())
            .finish()
    }
}

/// Typed builder for [`BeanDefinition`].
///
/// The type parameter ties construction closures, callbacks and capability
/// declarations to the concrete bean type, so the type-erased definition can
/// downcast safely later on.
pub struct DefinitionBuilder<T> {
    definition: BeanDefinition,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> DefinitionBuilder<T> {
    /// Arguments resolved in order and passed to `build`.
    pub fn constructor<F>(mut self, args: impl IntoIterator<Item = ValueSource>, build: F) -> Self
    where
        F: Fn(&ResolvedArguments) -> BeanResult<T> + Send + Sync + 'static,
    {
        self.definition.instantiation = Some(Instantiation::Constructor {
            args: args.into_iter().collect(),
            build: Arc::new(move |resolved| build(resolved).map(|bean| Arc::new(bean) as AnyArc)),
        });
        self
    }

    /// Method on the bean named `factory_bean`, which is fully created first.
    pub fn factory_method<F>(mut self, factory_bean: impl Into<String>, args: impl IntoIterator<Item = ValueSource>, method: F) -> Self
    where
        F: Fn(&BeanHandle, &ResolvedArguments) -> BeanResult<T> + Send + Sync + 'static,
    {
        let factory_name = factory_bean.into();
        let missing = factory_name.clone();
        self.definition.instantiation = Some(Instantiation::FactoryMethod {
            factory_bean: Some(factory_name),
            args: args.into_iter().collect(),
            method: Arc::new(move |factory, resolved| {
                let factory = factory.ok_or_else(|| BeanError::no_such_name(missing.clone()))?;
                method(factory, resolved).map(|bean| Arc::new(bean) as AnyArc)
            }),
        });
        self
    }

    /// Free factory function with resolved arguments.
    pub fn static_factory<F>(mut self, args: impl IntoIterator<Item = ValueSource>, method: F) -> Self
    where
        F: Fn(&ResolvedArguments) -> BeanResult<T> + Send + Sync + 'static,
    {
        self.definition.instantiation = Some(Instantiation::FactoryMethod {
            factory_bean: None,
            args: args.into_iter().collect(),
            method: Arc::new(move |_, resolved| method(resolved).map(|bean| Arc::new(bean) as AnyArc)),
        });
        self
    }

    /// Closure receiving the container.
    pub fn supplier<F>(mut self, supplier: F) -> Self
    where
        F: Fn(&Container) -> BeanResult<T> + Send + Sync + 'static,
    {
        self.definition.instantiation = Some(Instantiation::Supplier(Arc::new(move |container| {
            supplier(container).map(|bean| Arc::new(bean) as AnyArc)
        })));
        self
    }

    pub fn scope(mut self, scope: BeanScope) -> Self {
        self.definition.scope = Some(scope);
        self
    }

    pub fn singleton(self) -> Self {
        self.scope(BeanScope::Singleton)
    }

    pub fn prototype(self) -> Self {
        self.scope(BeanScope::Prototype)
    }

    /// Custom scope registered under `name`.
    pub fn scoped(self, name: impl Into<String>) -> Self {
        self.scope(BeanScope::Custom(name.into()))
    }

    pub fn property(mut self, name: impl Into<String>, source: impl Into<ValueSource>) -> Self {
        self.definition.properties.add(name, source);
        self
    }

    pub fn property_value(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.property(name, ValueSource::Literal(value.into()))
    }

    pub fn property_ref(self, name: impl Into<String>, bean: impl Into<String>) -> Self {
        self.property(name, BeanReference::to(bean))
    }

    pub fn property_expr(self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        self.property(name, ValueSource::expression(expression))
    }

    /// Init method run after population, in declaration order.
    pub fn init_method<F>(mut self, name: impl Into<String>, init: F) -> Self
    where
        F: Fn(&T) -> BeanResult<()> + Send + Sync + 'static,
    {
        self.definition.init_methods.push(LifecycleMethod::new(name, typed_callback(init)));
        self
    }

    pub fn destroy_method<F>(mut self, name: impl Into<String>, destroy: F) -> Self
    where
        F: Fn(&T) -> BeanResult<()> + Send + Sync + 'static,
    {
        self.definition.destroy_method = Some(LifecycleMethod::new(name, typed_callback(destroy)));
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.definition.role = role;
        self
    }

    pub fn primary(mut self) -> Self {
        self.definition.primary = true;
        self
    }

    pub fn lazy(mut self) -> Self {
        self.definition.lazy_init = Some(true);
        self
    }

    pub fn abstract_definition(mut self) -> Self {
        self.definition.is_abstract = true;
        self
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.definition.parent = Some(parent.into());
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.definition.add_depends_on(name);
        self
    }

    pub fn qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.definition.add_qualifier(qualifier);
        self
    }

    /// Priority for candidate tie-breaks; lower wins.
    pub fn priority(mut self, priority: i32) -> Self {
        self.definition.priority = Some(priority);
        self
    }

    /// Excludes the bean from type-based candidate resolution when `false`.
    pub fn autowire_candidate(mut self, candidate: bool) -> Self {
        self.definition.autowire_candidate = candidate;
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.definition.set_attribute(key, value);
        self
    }

    pub fn order(mut self, order: ProcessingOrder) -> Self {
        self.definition.processing_order = Some(order);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.definition.description = Some(description.into());
        self
    }

    /// Makes the bean resolvable as `I`.
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use ferrous_beans::{BeanDefinition, Container};
    ///
    /// trait Greeter: Send + Sync {
    ///     fn greet(&self) -> String;
    /// }
    ///
    /// #[derive(Default)]
    /// struct English;
    ///
    /// impl Greeter for English {
    ///     fn greet(&self) -> String {
    ///         "hello".into()
    ///     }
    /// }
    ///
    /// let container = Container::new();
    /// container
    ///     .register_definition(
    ///         "english",
    ///         BeanDefinition::builder::<English>()
    ///             .default_constructor()
    ///             .exposes::<dyn Greeter>(|b| b)
    ///             .build(),
    ///     )
    ///     .unwrap();
    ///
    /// let greeter = container.get_trait::<dyn Greeter>().unwrap();
    /// assert_eq!(greeter.greet(), "hello");
    /// ```
    pub fn exposes<I: ?Sized + Send + Sync + 'static>(mut self, upcast: fn(Arc<T>) -> Arc<I>) -> Self {
        let view = TypeView::new::<T, I>(upcast);
        if !self.definition.views.iter().any(|v| v.key() == view.key()) {
            self.definition.views.push(view);
        }
        self
    }

    /// Declares the product type of a factory bean.
    pub fn produces<P: ?Sized + 'static>(mut self) -> Self {
        self.definition.product_type = Some(TypeKey::of::<P>());
        self
    }

    pub fn build(self) -> BeanDefinition {
        self.definition
    }
}

impl<T: Any + Send + Sync + Default> DefinitionBuilder<T> {
    /// Constructs the bean with `T::default()`.
    pub fn default_constructor(mut self) -> Self {
        self.definition.instantiation = Some(Instantiation::DefaultConstructor(Arc::new(|| Arc::new(T::default()) as AnyArc)));
        self
    }
}

impl<T: BeanNameAware + Any> DefinitionBuilder<T> {
    pub fn name_aware(mut self) -> Self {
        self.definition.capabilities.name_aware = Some(caster::<T, dyn BeanNameAware>(|t| t));
        self
    }
}

impl<T: ContainerAware + Any> DefinitionBuilder<T> {
    pub fn container_aware(mut self) -> Self {
        self.definition.capabilities.container_aware = Some(caster::<T, dyn ContainerAware>(|t| t));
        self
    }
}

impl<T: PropertyTarget + Any> DefinitionBuilder<T> {
    pub fn property_target(mut self) -> Self {
        self.definition.capabilities.property_target = Some(caster::<T, dyn PropertyTarget>(|t| t));
        self
    }
}

impl<T: InitializingBean + Any> DefinitionBuilder<T> {
    pub fn initializing(mut self) -> Self {
        self.definition.capabilities.initializing = Some(caster::<T, dyn InitializingBean>(|t| t));
        self
    }
}

impl<T: DisposableBean + Any> DefinitionBuilder<T> {
    pub fn disposable(mut self) -> Self {
        self.definition.capabilities.disposable = Some(caster::<T, dyn DisposableBean>(|t| t));
        self
    }
}

impl<T: FactoryBean + Any> DefinitionBuilder<T> {
    pub fn factory_bean(mut self) -> Self {
        self.definition.capabilities.factory = Some(caster::<T, dyn FactoryBean>(|t| t));
        self
    }
}

impl<T: InstancePostProcessor + Any> DefinitionBuilder<T> {
    /// Registers the bean as an instance post-processor during refresh.
    pub fn instance_post_processor(mut self) -> Self {
        self.definition.capabilities.instance_post_processor = Some(caster::<T, dyn InstancePostProcessor>(|t| t));
        self.definition.role = Role::Infrastructure;
        self
    }
}

impl<T: DefinitionPostProcessor + Any> DefinitionBuilder<T> {
    /// Runs the bean as a definition post-processor during refresh.
    pub fn definition_post_processor(mut self) -> Self {
        self.definition.capabilities.definition_post_processor = Some(caster::<T, dyn DefinitionPostProcessor>(|t| t));
        self.definition.role = Role::Infrastructure;
        self
    }
}

impl<T: SmartInitializingSingleton + Any> DefinitionBuilder<T> {
    pub fn smart_singleton(mut self) -> Self {
        self.definition.capabilities.smart_singleton = Some(caster::<T, dyn SmartInitializingSingleton>(|t| t));
        self
    }
}

fn typed_callback<T, F>(callback: F) -> CallbackFn
where
    T: Any + Send + Sync,
    F: Fn(&T) -> BeanResult<()> + Send + Sync + 'static,
{
    Arc::new(move |object: &AnyArc| match object.downcast_ref::<T>() {
        Some(bean) => callback(bean),
        None => Err(BeanError::msg(format!(
            "lifecycle callback expects {}",
            std::any::type_name::<T>()
        ))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Widget;

    trait Part: Send + Sync {}
    impl Part for Widget {}

    #[test]
    fn builder_records_views_once() {
        let def = BeanDefinition::builder::<Widget>()
            .default_constructor()
            .exposes::<dyn Part>(|w| w)
            .exposes::<dyn Part>(|w| w)
            .build();
        assert_eq!(def.views().len(), 1);
        assert!(def.is_assignable_to(TypeKey::of::<dyn Part>()));
        assert!(def.is_assignable_to(TypeKey::of::<Widget>()));
        assert!(!def.is_assignable_to(TypeKey::of::<String>()));
    }

    #[test]
    fn child_values_win_over_parent() {
        let parent = BeanDefinition::builder::<Widget>()
            .default_constructor()
            .prototype()
            .qualifier("base")
            .property_value("a", 1)
            .property_value("b", 2)
            .abstract_definition()
            .build();
        let mut child = BeanDefinition::child_of("parent");
        child.add_property("b", ValueSource::literal(3));
        child.add_qualifier("child");

        let merged = child.merged_over(&parent);
        assert_eq!(merged.bean_type(), Some(TypeKey::of::<Widget>()));
        assert!(merged.is_prototype());
        assert!(!merged.is_abstract());
        assert_eq!(merged.qualifiers(), ["base".to_string(), "child".to_string()]);
        assert!(matches!(
            merged.properties().get("b").map(|p| p.source()),
            Some(ValueSource::Literal(Value::Integer(3)))
        ));
        assert!(merged.validate("child").is_ok());
    }

    #[test]
    fn abstract_or_policyless_definitions_do_not_validate() {
        assert!(BeanDefinition::template().validate("t").is_err());
        assert!(BeanDefinition::builder::<Widget>().build().validate("w").is_err());
    }

    #[test]
    fn clone_copies_initialized_flag() {
        let def = BeanDefinition::builder::<Widget>().default_constructor().build();
        def.mark_initialized();
        assert!(def.clone().is_initialized());
    }
}
