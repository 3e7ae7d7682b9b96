use ferrous_beans::{BeanDefinition, BeanError, BeanReference, BeanResult, Container, DisposableBean, ValueSource};
use parking_lot::Mutex;
use std::sync::Arc;

type Journal = Arc<Mutex<Vec<String>>>;

struct Resource {
    name: &'static str,
    journal: Journal,
    fail: bool,
}

impl DisposableBean for Resource {
    fn destroy(&self) -> BeanResult<()> {
        self.journal.lock().push(format!("destroy {}", self.name));
        if self.fail {
            return Err(BeanError::msg(format!("{} could not flush", self.name)));
        }
        Ok(())
    }
}

fn resource(name: &'static str, journal: &Journal, depends: &[&'static str]) -> BeanDefinition {
    let journal = journal.clone();
    let args: Vec<ValueSource> = depends.iter().map(|d| BeanReference::to(*d).into()).collect();
    BeanDefinition::builder::<Resource>()
        .constructor(args, move |_| {
            Ok(Resource {
                name,
                journal: journal.clone(),
                fail: false,
            })
        })
        .disposable()
        .build()
}

// ===== Ordering =====

#[test]
fn test_dependents_are_destroyed_before_dependencies() {
    let journal = Journal::default();
    let container = Container::new();
    container.register_definition("db", resource("db", &journal, &[])).unwrap();
    container.register_definition("repo", resource("repo", &journal, &["db"])).unwrap();
    container.register_definition("service", resource("service", &journal, &["repo"])).unwrap();

    container.refresh().unwrap();
    let report = container.close();

    assert!(report.is_clean());
    assert_eq!(*journal.lock(), ["destroy service", "destroy repo", "destroy db"]);
    assert_eq!(report.destroyed(), ["service", "repo", "db"]);
}

#[test]
fn test_newest_singleton_is_destroyed_first() {
    let journal = Journal::default();
    let container = Container::new();
    container.register_definition("first", resource("first", &journal, &[])).unwrap();
    container.register_definition("second", resource("second", &journal, &[])).unwrap();

    container.get_instance("second").unwrap();
    container.get_instance("first").unwrap();
    container.destroy_all();

    assert_eq!(*journal.lock(), ["destroy first", "destroy second"]);
}

#[test]
fn test_destroying_one_singleton_takes_its_dependents() {
    let journal = Journal::default();
    let container = Container::new();
    container.register_definition("db", resource("db", &journal, &[])).unwrap();
    container.register_definition("repo", resource("repo", &journal, &["db"])).unwrap();
    container.register_definition("cache", resource("cache", &journal, &[])).unwrap();
    container.refresh().unwrap();

    let report = container.destroy_singleton("db");
    assert_eq!(report.destroyed(), ["repo", "db"]);
    assert_eq!(container.singleton_names(), ["cache"]);

    // recreated on demand
    container.get_instance("repo").unwrap();
    assert!(container.contains_singleton("db"));
}

// ===== Failures =====

#[test]
fn test_failures_are_collected_and_do_not_stop_the_sweep() {
    let journal = Journal::default();
    let container = Container::new();
    container.register_definition("healthy", resource("healthy", &journal, &[])).unwrap();
    container.register_definition("middle", resource("middle", &journal, &["healthy"])).unwrap();
    let failing = journal.clone();
    container
        .register_definition(
            "flaky",
            BeanDefinition::builder::<Resource>()
                .constructor([BeanReference::to("middle").into()], move |_| {
                    Ok(Resource {
                        name: "flaky",
                        journal: failing.clone(),
                        fail: true,
                    })
                })
                .disposable()
                .destroy_method("close", |r: &Resource| {
                    r.journal.lock().push("close flaky".into());
                    Ok(())
                })
                .build(),
        )
        .unwrap();
    container.refresh().unwrap();

    let report = container.close();
    assert!(!report.is_clean());
    assert_eq!(report.failures().len(), 1);
    assert!(matches!(&report.failures()[0], BeanError::Destruction { name, .. } if name == "flaky"));
    // the rest of the chain still goes down in dependency order
    assert_eq!(*journal.lock(), ["destroy flaky", "close flaky", "destroy middle", "destroy healthy"]);
    assert_eq!(report.destroyed(), ["flaky", "middle", "healthy"]);
    assert!(container.singleton_names().is_empty());
    assert!(report.into_result().is_err());
}

#[test]
fn test_panicking_destroy_method_is_reported() {
    #[derive(Default)]
    struct Fragile;

    let container = Container::new();
    container
        .register_definition(
            "fragile",
            BeanDefinition::builder::<Fragile>()
                .default_constructor()
                .destroy_method("shutdown", |_| panic!("shutdown exploded"))
                .build(),
        )
        .unwrap();
    container.get_instance("fragile").unwrap();

    let report = container.close();
    assert_eq!(report.destroyed(), ["fragile"]);
    assert!(report.failures()[0].to_string().contains("shutdown exploded"));
}

// ===== Close =====

#[test]
fn test_close_is_idempotent_and_final() {
    let journal = Journal::default();
    let container = Container::new();
    container.register_definition("db", resource("db", &journal, &[])).unwrap();
    container.get_instance("db").unwrap();

    assert_eq!(container.close().destroyed(), ["db"]);
    assert!(container.close().destroyed().is_empty());
    assert_eq!(journal.lock().len(), 1);

    assert!(container.is_closed());
    let err = container.get_instance("db").unwrap_err();
    assert!(matches!(err, BeanError::CreationNotAllowed(_)));
}

#[test]
fn test_prototypes_are_not_tracked_for_destruction() {
    let journal = Journal::default();
    let container = Container::new();
    let mut definition = resource("proto", &journal, &[]);
    definition.set_scope(ferrous_beans::BeanScope::Prototype);
    container.register_definition("proto", definition).unwrap();

    container.get_instance("proto").unwrap();
    container.get_instance("proto").unwrap();
    assert!(container.close().destroyed().is_empty());
    assert!(journal.lock().is_empty());
}

#[test]
fn test_manual_singletons_are_released_on_close() {
    let container = Container::new();
    let shared = Arc::new(String::from("shared"));
    container.register_singleton("shared", shared.clone()).unwrap();
    assert_eq!(Arc::strong_count(&shared), 2);

    let report = container.close();
    assert_eq!(report.destroyed(), ["shared"]);
    assert_eq!(Arc::strong_count(&shared), 1);
}
