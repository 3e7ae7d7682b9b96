use ferrous_beans::{
    BeanDefinition, BeanResult, ConfigProvider, Container, ContainerConfig, EnvironmentConfigSource, MapConfigSource,
    PlaceholderEvaluator, PropertyTarget, TypeKey, Value, ValueSource,
};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
struct Endpoint {
    values: Mutex<Vec<(String, Value)>>,
}

impl PropertyTarget for Endpoint {
    fn set_property(&self, name: &str, value: Value) -> BeanResult<()> {
        self.values.lock().push((name.to_string(), value));
        Ok(())
    }

    fn property_type(&self, name: &str) -> Option<TypeKey> {
        (name == "timeout").then(TypeKey::of::<i64>)
    }
}

impl Endpoint {
    fn value(&self, name: &str) -> Option<Value> {
        self.values.lock().iter().find(|(n, _)| n == name).map(|(_, v)| v.clone())
    }
}

fn container_with(source: MapConfigSource) -> Container {
    let provider = Arc::new(ConfigProvider::new().with_source(source));
    Container::builder()
        .expression_evaluator(Arc::new(PlaceholderEvaluator::new(provider)))
        .build()
}

fn endpoint() -> ferrous_beans::DefinitionBuilder<Endpoint> {
    BeanDefinition::builder::<Endpoint>().default_constructor().property_target()
}

// ===== Placeholders =====

#[test]
fn test_placeholders_resolve_from_configuration() {
    let container = container_with(MapConfigSource::new().with("db.host", "db.internal").with("db.port", 5432));
    container
        .register_definition(
            "endpoint",
            endpoint()
                .property_expr("port", "${db.port}")
                .property_expr("url", "postgres://${db.host}:${db.port}/app")
                .build(),
        )
        .unwrap();

    let bean = container.get_bean::<Endpoint>("endpoint").unwrap();
    assert_eq!(bean.value("port"), Some(Value::Integer(5432)));
    assert_eq!(bean.value("url"), Some(Value::from("postgres://db.internal:5432/app")));
}

#[test]
fn test_placeholder_default_is_converted_to_property_type() {
    let container = container_with(MapConfigSource::new());
    container
        .register_definition("endpoint", endpoint().property_expr("timeout", "${http.timeout:30}").build())
        .unwrap();

    let bean = container.get_bean::<Endpoint>("endpoint").unwrap();
    assert_eq!(bean.value("timeout"), Some(Value::Integer(30)));
}

#[test]
fn test_missing_placeholder_is_unsatisfied() {
    let container = container_with(MapConfigSource::new());
    container
        .register_definition("endpoint", endpoint().property_expr("url", "${db.url}").build())
        .unwrap();

    let err = container.get_instance("endpoint").unwrap_err();
    assert!(err.is_unsatisfied());
    assert!(err.chain().any(|e| e.to_string().contains("db.url")));
}

#[test]
fn test_typed_expression_in_constructor() {
    struct Pool {
        size: i64,
    }

    let container = container_with(MapConfigSource::new().with("pool.size", "12"));
    container
        .register_definition(
            "pool",
            BeanDefinition::builder::<Pool>()
                .constructor([ValueSource::typed_expression::<i64>("${pool.size}")], |args| {
                    Ok(Pool { size: args.integer(0)? })
                })
                .build(),
        )
        .unwrap();

    assert_eq!(container.get_bean::<Pool>("pool").unwrap().size, 12);
}

// ===== Container settings =====

#[test]
fn test_container_config_loads_from_provider() {
    let provider = ConfigProvider::new().with_source(
        MapConfigSource::new()
            .with("container.allow_definition_overriding", false)
            .with("container.max_creation_depth", 8),
    );
    let config = ContainerConfig::load(&provider);
    assert!(!config.allow_definition_overriding);
    assert!(config.allow_circular_references);
    assert_eq!(config.max_creation_depth, 8);

    let container = Container::with_config(config);
    container.register_definition("endpoint", endpoint().build()).unwrap();
    assert!(container.register_definition("endpoint", endpoint().build()).is_err());
}

#[test]
fn test_environment_source_feeds_placeholders() {
    std::env::set_var("BEANS_CONFIG_TEST_REGION", "eu-west");
    let provider = Arc::new(ConfigProvider::new().with_source(EnvironmentConfigSource::with_prefix("beans_config_test")));
    let container = Container::builder()
        .expression_evaluator(Arc::new(PlaceholderEvaluator::new(provider)))
        .build();
    container
        .register_definition("endpoint", endpoint().property_expr("region", "${region}").build())
        .unwrap();

    let bean = container.get_bean::<Endpoint>("endpoint").unwrap();
    assert_eq!(bean.value("region"), Some(Value::from("eu-west")));
    std::env::remove_var("BEANS_CONFIG_TEST_REGION");
}

#[cfg(feature = "config")]
#[test]
fn test_json_file_source() {
    use ferrous_beans::JsonConfigSource;

    let path = std::env::temp_dir().join(format!("ferrous-beans-config-{}.json", std::process::id()));
    std::fs::write(&path, r#"{"service": {"name": "orders", "replicas": 3}}"#).unwrap();

    let provider = Arc::new(
        ConfigProvider::new()
            .with_source(MapConfigSource::new().with("service.name", "override"))
            .with_source(JsonConfigSource::new(path.to_string_lossy().to_string())),
    );
    assert_eq!(provider.get_string("service.name").unwrap(), "override");
    assert_eq!(provider.get_i64("service.replicas").unwrap(), 3);

    let container = Container::builder()
        .expression_evaluator(Arc::new(PlaceholderEvaluator::new(provider)))
        .build();
    container
        .register_definition("endpoint", endpoint().property_expr("label", "${service.name}-${service.replicas}").build())
        .unwrap();
    let bean = container.get_bean::<Endpoint>("endpoint").unwrap();
    assert_eq!(bean.value("label"), Some(Value::from("override-3")));

    std::fs::remove_file(path).unwrap();
}
