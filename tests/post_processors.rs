use ferrous_beans::{
    AnyArc, BeanDefinition, BeanResult, Container, DefinitionPhase, DefinitionPostProcessor, InstancePostProcessor,
    ProcessingOrder, PropertyTarget, PropertyValues, Role, Value, ValueSource,
};
use parking_lot::Mutex;
use std::sync::Arc;

type Journal = Arc<Mutex<Vec<String>>>;

#[derive(Default)]
struct Settings {
    values: Mutex<Vec<(String, Value)>>,
}

impl PropertyTarget for Settings {
    fn set_property(&self, name: &str, value: Value) -> BeanResult<()> {
        self.values.lock().push((name.to_string(), value));
        Ok(())
    }
}

fn settings() -> ferrous_beans::DefinitionBuilder<Settings> {
    BeanDefinition::builder::<Settings>()
        .default_constructor()
        .property_target()
        .property_value("mode", "strict")
}

// ===== Instance post-processors =====

struct Tracer {
    journal: Journal,
}

impl InstancePostProcessor for Tracer {
    fn name(&self) -> &str {
        "tracer"
    }

    fn before_instantiation(&self, _definition: &BeanDefinition, name: &str) -> BeanResult<Option<AnyArc>> {
        self.journal.lock().push(format!("before_instantiation {}", name));
        Ok(None)
    }

    fn after_instantiation(&self, _bean: &AnyArc, name: &str) -> BeanResult<bool> {
        self.journal.lock().push(format!("after_instantiation {}", name));
        Ok(true)
    }

    fn process_properties(&self, properties: PropertyValues, _bean: &AnyArc, name: &str) -> BeanResult<PropertyValues> {
        self.journal.lock().push(format!("process_properties {} ({})", name, properties.len()));
        Ok(properties)
    }

    fn before_initialization(&self, bean: AnyArc, name: &str) -> BeanResult<AnyArc> {
        self.journal.lock().push(format!("before_initialization {}", name));
        Ok(bean)
    }

    fn after_initialization(&self, bean: AnyArc, name: &str) -> BeanResult<AnyArc> {
        self.journal.lock().push(format!("after_initialization {}", name));
        Ok(bean)
    }
}

#[test]
fn test_hooks_run_around_creation_in_order() {
    let journal = Journal::default();
    let container = Container::new();
    container.add_instance_post_processor(Arc::new(Tracer { journal: journal.clone() }));
    let init_journal = journal.clone();
    container
        .register_definition(
            "settings",
            settings()
                .init_method("init", move |_| {
                    init_journal.lock().push("init settings".into());
                    Ok(())
                })
                .build(),
        )
        .unwrap();

    container.get_instance("settings").unwrap();
    assert_eq!(
        *journal.lock(),
        [
            "before_instantiation settings",
            "after_instantiation settings",
            "process_properties settings (1)",
            "before_initialization settings",
            "init settings",
            "after_initialization settings",
        ]
    );
}

struct ShortCircuit;

impl InstancePostProcessor for ShortCircuit {
    fn before_instantiation(&self, definition: &BeanDefinition, _name: &str) -> BeanResult<Option<AnyArc>> {
        if definition.attribute("stub") == Some("true") {
            let stub = Settings::default();
            stub.values.lock().push(("stub".into(), Value::Boolean(true)));
            return Ok(Some(Arc::new(stub)));
        }
        Ok(None)
    }
}

#[test]
fn test_before_instantiation_can_replace_the_bean() {
    let journal = Journal::default();
    let container = Container::new();
    container.add_instance_post_processor(Arc::new(ShortCircuit));
    container.add_instance_post_processor(Arc::new(Tracer { journal: journal.clone() }));
    container.register_definition("stubbed", settings().attribute("stub", "true").build()).unwrap();
    container.register_definition("real", settings().build()).unwrap();

    let stubbed = container.get_bean::<Settings>("stubbed").unwrap();
    assert_eq!(stubbed.values.lock()[0].0, "stub");
    // properties are never applied to a short-circuited bean
    assert_eq!(stubbed.values.lock().len(), 1);
    assert_eq!(*journal.lock(), ["after_initialization stubbed"]);

    let real = container.get_bean::<Settings>("real").unwrap();
    assert_eq!(real.values.lock()[0].0, "mode");
}

struct Veto;

impl InstancePostProcessor for Veto {
    fn after_instantiation(&self, _bean: &AnyArc, name: &str) -> BeanResult<bool> {
        Ok(name != "frozen")
    }
}

#[test]
fn test_after_instantiation_can_skip_population() {
    let container = Container::new();
    container.add_instance_post_processor(Arc::new(Veto));
    container.register_definition("frozen", settings().build()).unwrap();
    container.register_definition("thawed", settings().build()).unwrap();

    assert!(container.get_bean::<Settings>("frozen").unwrap().values.lock().is_empty());
    assert_eq!(container.get_bean::<Settings>("thawed").unwrap().values.lock().len(), 1);
}

struct Defaults;

impl InstancePostProcessor for Defaults {
    fn process_properties(&self, mut properties: PropertyValues, _bean: &AnyArc, _name: &str) -> BeanResult<PropertyValues> {
        if !properties.contains("timeout") {
            properties.add("timeout", ValueSource::literal(30));
        }
        Ok(properties)
    }
}

#[test]
fn test_process_properties_can_add_values() {
    let container = Container::new();
    container.add_instance_post_processor(Arc::new(Defaults));
    container.register_definition("settings", settings().build()).unwrap();

    let bean = container.get_bean::<Settings>("settings").unwrap();
    let values = bean.values.lock();
    assert_eq!(values.len(), 2);
    assert_eq!(values[1], ("timeout".to_string(), Value::Integer(30)));
}

struct Audited {
    target: AnyArc,
}

struct Auditor {
    journal: Journal,
}

impl InstancePostProcessor for Auditor {
    fn after_initialization(&self, bean: AnyArc, name: &str) -> BeanResult<AnyArc> {
        if name.starts_with("audited") {
            return Ok(Arc::new(Audited { target: bean }));
        }
        Ok(bean)
    }

    fn requires_destruction(&self, bean: &AnyArc, _name: &str) -> bool {
        bean.is::<Audited>()
    }

    fn before_destruction(&self, _bean: &AnyArc, name: &str) -> BeanResult<()> {
        self.journal.lock().push(format!("released {}", name));
        Ok(())
    }
}

#[test]
fn test_after_initialization_wraps_and_destruction_is_observed() {
    let journal = Journal::default();
    let container = Container::new();
    container.add_instance_post_processor(Arc::new(Auditor { journal: journal.clone() }));
    container.register_definition("audited-settings", settings().build()).unwrap();
    container.register_definition("plain", settings().build()).unwrap();

    let wrapped = container.get_instance("audited-settings").unwrap();
    let audited = wrapped.downcast_ref::<Audited>().unwrap();
    assert!(audited.target.downcast_ref::<Settings>().is_some());
    container.get_instance("plain").unwrap();

    container.close();
    assert_eq!(*journal.lock(), ["released audited-settings"]);
}

#[test]
fn test_processors_apply_only_to_beans_created_afterwards() {
    let journal = Journal::default();
    let container = Container::new();
    container.register_definition("early", settings().build()).unwrap();
    container.register_definition("late", settings().build()).unwrap();

    container.get_instance("early").unwrap();
    container.add_instance_post_processor(Arc::new(Tracer { journal: journal.clone() }));
    container.get_instance("early").unwrap();
    container.get_instance("late").unwrap();

    let journal = journal.lock();
    assert!(!journal.is_empty());
    assert!(journal.iter().all(|entry| entry.contains(" late")));
    assert_eq!(container.instance_post_processor_count(), 1);
}

// ===== Post-processors defined as beans =====

#[derive(Default)]
struct Collector {
    seen: Mutex<Vec<String>>,
}

impl InstancePostProcessor for Collector {
    fn after_initialization(&self, bean: AnyArc, name: &str) -> BeanResult<AnyArc> {
        self.seen.lock().push(name.to_string());
        Ok(bean)
    }

    fn reset_definition(&self, name: &str) {
        self.seen.lock().retain(|seen| seen != name);
    }
}

#[test]
fn test_instance_post_processor_beans_are_registered_on_refresh() {
    let container = Container::new();
    container.register_definition("first", settings().build()).unwrap();
    container
        .register_definition(
            "collector",
            BeanDefinition::builder::<Collector>()
                .default_constructor()
                .instance_post_processor()
                .build(),
        )
        .unwrap();
    container.register_definition("second", settings().build()).unwrap();

    container.refresh().unwrap();
    let collector = container.get_bean::<Collector>("collector").unwrap();
    assert_eq!(*collector.seen.lock(), ["first", "second"]);
    assert_eq!(container.instance_post_processor_count(), 1);
    assert_eq!(container.get_definition("collector").unwrap().role(), Role::Infrastructure);

    // replacing a definition notifies the processors
    container.register_definition("first", settings().build()).unwrap();
    assert_eq!(*collector.seen.lock(), ["second"]);
}

#[test]
fn test_removing_a_processor_definition_unregisters_it() {
    let container = Container::new();
    container
        .register_definition(
            "collector",
            BeanDefinition::builder::<Collector>()
                .default_constructor()
                .instance_post_processor()
                .build(),
        )
        .unwrap();
    container.refresh().unwrap();
    assert_eq!(container.instance_post_processor_count(), 1);

    container.remove_definition("collector").unwrap();
    assert_eq!(container.instance_post_processor_count(), 0);
}

struct Ranked {
    label: &'static str,
    order: ProcessingOrder,
    journal: Journal,
}

impl DefinitionPostProcessor for Ranked {
    fn order(&self) -> ProcessingOrder {
        self.order
    }

    fn post_process_definitions(&self, _phase: &mut DefinitionPhase<'_>) -> BeanResult<()> {
        self.journal.lock().push(self.label.to_string());
        Ok(())
    }
}

#[test]
fn test_definition_processors_run_in_waves() {
    let journal = Journal::default();
    let container = Container::new();
    for (label, order) in [
        ("unordered", ProcessingOrder::Unordered),
        ("ordered-0", ProcessingOrder::Ordered(0)),
        ("priority-5", ProcessingOrder::PriorityOrdered(5)),
        ("ordered-minus-1", ProcessingOrder::Ordered(-1)),
        ("priority-1", ProcessingOrder::PriorityOrdered(1)),
    ] {
        container.add_definition_post_processor(Arc::new(Ranked {
            label,
            order,
            journal: journal.clone(),
        }));
    }

    container.refresh().unwrap();
    assert_eq!(
        *journal.lock(),
        ["priority-1", "priority-5", "ordered-minus-1", "ordered-0", "unordered"]
    );
}

#[derive(Default)]
struct Registrar;

impl DefinitionPostProcessor for Registrar {
    fn post_process_definitions(&self, phase: &mut DefinitionPhase<'_>) -> BeanResult<()> {
        phase.register_definition("generated", settings().build())?;
        phase.update_definition("existing", |definition| definition.set_lazy_init(true))?;
        phase.add_post_processor(Arc::new(Follower));
        Ok(())
    }
}

struct Follower;

impl DefinitionPostProcessor for Follower {
    fn post_process_definitions(&self, phase: &mut DefinitionPhase<'_>) -> BeanResult<()> {
        phase.update_definition("generated", |definition| {
            definition.add_property("follower", ValueSource::literal(true));
        })
    }
}

#[test]
fn test_definition_processor_beans_can_register_definitions() {
    let container = Container::new();
    container.register_definition("existing", settings().build()).unwrap();
    container
        .register_definition(
            "registrar",
            BeanDefinition::builder::<Registrar>()
                .default_constructor()
                .definition_post_processor()
                .order(ProcessingOrder::PriorityOrdered(0))
                .build(),
        )
        .unwrap();

    container.refresh().unwrap();

    assert!(container.contains_singleton("generated"));
    assert!(!container.contains_singleton("existing"));
    let generated = container.get_bean::<Settings>("generated").unwrap();
    let names: Vec<String> = generated.values.lock().iter().map(|(n, _)| n.clone()).collect();
    assert_eq!(names, ["mode", "follower"]);
}
