//! # ferrous-beans
//!
//! Bean-definition driven object lifecycle container for Rust.
//!
//! ## Features
//!
//! - **Definitions, not closures only**: every bean is described by a
//!   [`BeanDefinition`] carrying its scope, construction policy, property
//!   assignments, lifecycle callbacks and resolution metadata
//! - **Scopes**: singleton, prototype and pluggable custom scopes ([`MapScope`], [`ThreadScope`])
//! - **Circular references**: property cycles between singletons are resolved through
//!   two-phase [`BeanHandle`]s; constructor cycles are reported with their path
//! - **Candidate resolution**: exactly-one, primary, priority, then qualifier
//! - **Post-processors**: definition post-processors before any bean is created,
//!   instance post-processors around every creation
//! - **Thread-safe**: singletons are created at most once across threads
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use ferrous_beans::{BeanDefinition, BeanReference, Container, ValueSource};
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let container = Container::new();
//! container
//!     .register_definition(
//!         "database",
//!         BeanDefinition::builder::<Database>()
//!             .constructor([ValueSource::literal("postgres://localhost")], |args| {
//!                 Ok(Database { url: args.string(0)? })
//!             })
//!             .build(),
//!     )
//!     .unwrap();
//! container
//!     .register_definition(
//!         "users",
//!         BeanDefinition::builder::<UserService>()
//!             .constructor([BeanReference::to("database").into()], |args| {
//!                 Ok(UserService { db: args.bean::<Database>(0)? })
//!             })
//!             .build(),
//!     )
//!     .unwrap();
//!
//! container.refresh().unwrap();
//! let users = container.get_instance_of::<UserService>().unwrap();
//! assert_eq!(users.db.url, "postgres://localhost");
//! container.close();
//! ```
//!
//! ## Trait Lookups
//!
//! ```rust
//! use ferrous_beans::{BeanDefinition, Container};
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, message: &str) -> String;
//! }
//!
//! #[derive(Default)]
//! struct ConsoleLogger;
//!
//! impl Logger for ConsoleLogger {
//!     fn log(&self, message: &str) -> String {
//!         format!("[LOG] {}", message)
//!     }
//! }
//!
//! let container = Container::new();
//! container
//!     .register_definition(
//!         "console",
//!         BeanDefinition::builder::<ConsoleLogger>()
//!             .default_constructor()
//!             .exposes::<dyn Logger>(|l| l)
//!             .build(),
//!     )
//!     .unwrap();
//!
//! let logger = container.get_trait::<dyn Logger>().unwrap();
//! assert_eq!(logger.log("hello"), "[LOG] hello");
//! ```
//!
//! ## Property Injection and Cycles
//!
//! ```rust
//! use parking_lot::Mutex;
//! use ferrous_beans::{BeanDefinition, BeanHandle, BeanResult, Container, PropertyTarget, Value};
//!
//! #[derive(Default)]
//! struct Node {
//!     peer: Mutex<Option<BeanHandle>>,
//! }
//!
//! impl PropertyTarget for Node {
//!     fn set_property(&self, _name: &str, value: Value) -> BeanResult<()> {
//!         *self.peer.lock() = value.as_handle().cloned();
//!         Ok(())
//!     }
//! }
//!
//! let container = Container::new();
//! for (name, peer) in [("a", "b"), ("b", "a")] {
//!     container
//!         .register_definition(
//!             name,
//!             BeanDefinition::builder::<Node>()
//!                 .default_constructor()
//!                 .property_target()
//!                 .property_ref("peer", peer)
//!                 .build(),
//!         )
//!         .unwrap();
//! }
//!
//! let a = container.get_bean::<Node>("a").unwrap();
//! let b = a.peer.lock().clone().unwrap();
//! assert!(b.is_ready());
//! assert!(std::sync::Arc::ptr_eq(&b.get::<Node>().unwrap(), &container.get_bean::<Node>("b").unwrap()));
//! ```

pub mod config;
pub mod container;
pub mod definition;
pub mod error;
pub mod handle;
pub mod key;
pub mod observer;
pub mod postprocess;
pub mod resolver;
pub mod scope;
pub mod traits;
pub mod value;

// Internal modules
mod cache;
mod internal;
mod registry;

pub use cache::DestroyReport;
#[cfg(feature = "config")]
pub use config::JsonConfigSource;
pub use config::{
    ConfigProvider, ConfigSource, ConfigValue, ContainerConfig, EnvironmentConfigSource, MapConfigSource,
    PlaceholderEvaluator,
};
pub use container::{Container, ContainerBuilder, WeakContainer, FACTORY_BEAN_PREFIX};
pub use definition::{
    BeanDefinition, DefinitionBuilder, Instantiation, LifecycleMethod, PropertyValue, PropertyValues,
    ResolvedArguments, Role, TypeView,
};
pub use error::{BeanError, BeanResult};
pub use handle::{AnyArc, BeanHandle, TypeViews};
pub use key::{key_of_type, TypeKey};
pub use observer::{ContainerObserver, LoggingObserver};
pub use postprocess::{DefinitionPhase, DefinitionPostProcessor, InstancePostProcessor, ProcessingOrder};
pub use resolver::{Candidate, CandidateResolver, DefaultCandidateResolver, DependencyDescriptor};
pub use scope::{BeanScope, DestructionCallback, MapScope, Scope, ThreadScope, PROTOTYPE, SINGLETON};
pub use traits::{
    BeanNameAware, ContainerAware, ConversionService, DefaultConversionService, DefaultNameGenerator,
    DisposableBean, ExpressionEvaluator, FactoryBean, InitializingBean, NameGenerator, PropertyTarget,
    SmartInitializingSingleton,
};
pub use value::{BeanReference, Value, ValueSource};
