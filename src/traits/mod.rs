//! Capability and collaborator traits implemented by beans and plugged into the container.

mod collaborators;
mod lifecycle;

pub use collaborators::{
    ConversionService, DefaultConversionService, DefaultNameGenerator, ExpressionEvaluator, NameGenerator,
};
pub use lifecycle::{
    BeanNameAware, ContainerAware, DisposableBean, FactoryBean, InitializingBean, PropertyTarget,
    SmartInitializingSingleton,
};
