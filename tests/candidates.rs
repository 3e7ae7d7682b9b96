use ferrous_beans::{
    BeanDefinition, BeanError, BeanReference, BeanResult, Candidate, CandidateResolver, Container,
    DependencyDescriptor,
};
use std::sync::Arc;

trait Store: Send + Sync {
    fn kind(&self) -> &'static str;
}

#[derive(Default)]
struct Memory;
impl Store for Memory {
    fn kind(&self) -> &'static str {
        "memory"
    }
}

#[derive(Default)]
struct Disk;
impl Store for Disk {
    fn kind(&self) -> &'static str {
        "disk"
    }
}

#[derive(Default)]
struct Remote;
impl Store for Remote {
    fn kind(&self) -> &'static str {
        "remote"
    }
}

fn store<T: Store + Default + 'static>() -> ferrous_beans::DefinitionBuilder<T> {
    BeanDefinition::builder::<T>()
        .default_constructor()
        .exposes::<dyn Store>(|s| s)
}

fn three_stores(container: &Container) {
    container.register_definition("memory", store::<Memory>().build()).unwrap();
    container.register_definition("disk", store::<Disk>().build()).unwrap();
    container.register_definition("remote", store::<Remote>().build()).unwrap();
}

// ===== Selection rules =====

#[test]
fn test_single_candidate_is_selected() {
    let container = Container::new();
    container.register_definition("disk", store::<Disk>().build()).unwrap();
    assert_eq!(container.get_trait::<dyn Store>().unwrap().kind(), "disk");
    assert_eq!(container.get_instance_of::<Disk>().unwrap().kind(), "disk");
}

#[test]
fn test_no_candidate_is_not_found() {
    let container = Container::new();
    let err = container.get_trait::<dyn Store>().err().unwrap();
    assert!(err.is_no_such_definition());
    assert!(container
        .resolve_dependency(&DependencyDescriptor::of::<dyn Store>().optional())
        .unwrap()
        .is_none());
}

#[test]
fn test_several_candidates_are_ambiguous() {
    let container = Container::new();
    three_stores(&container);

    let err = container.get_trait::<dyn Store>().err().unwrap();
    assert!(err.is_ambiguous());
    match err {
        BeanError::AmbiguousDefinition { candidates, .. } => {
            assert_eq!(candidates, ["memory", "disk", "remote"]);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_primary_wins() {
    let container = Container::new();
    container.register_definition("memory", store::<Memory>().build()).unwrap();
    container.register_definition("disk", store::<Disk>().primary().build()).unwrap();
    container.register_definition("remote", store::<Remote>().priority(0).build()).unwrap();

    assert_eq!(container.get_trait::<dyn Store>().unwrap().kind(), "disk");
}

#[test]
fn test_two_primaries_are_ambiguous() {
    let container = Container::new();
    container.register_definition("memory", store::<Memory>().primary().build()).unwrap();
    container.register_definition("disk", store::<Disk>().primary().build()).unwrap();

    assert!(container.get_trait::<dyn Store>().err().unwrap().is_ambiguous());
}

#[test]
fn test_lowest_priority_value_wins() {
    let container = Container::new();
    container.register_definition("memory", store::<Memory>().priority(10).build()).unwrap();
    container.register_definition("disk", store::<Disk>().priority(1).build()).unwrap();
    container.register_definition("remote", store::<Remote>().build()).unwrap();

    assert_eq!(container.get_trait::<dyn Store>().unwrap().kind(), "disk");
}

#[test]
fn test_priority_tie_is_ambiguous() {
    let container = Container::new();
    container.register_definition("memory", store::<Memory>().priority(1).build()).unwrap();
    container.register_definition("disk", store::<Disk>().priority(1).build()).unwrap();

    assert!(container.get_trait::<dyn Store>().err().unwrap().is_ambiguous());
}

#[test]
fn test_qualifier_selects_among_many() {
    let container = Container::new();
    container.register_definition("memory", store::<Memory>().qualifier("fast").build()).unwrap();
    container.register_definition("disk", store::<Disk>().qualifier("durable").build()).unwrap();
    container.register_definition("remote", store::<Remote>().build()).unwrap();

    assert_eq!(container.get_trait_qualified::<dyn Store>("durable").unwrap().kind(), "disk");
    // a bean name works as a qualifier too
    assert_eq!(container.get_trait_qualified::<dyn Store>("remote").unwrap().kind(), "remote");
    assert!(container.get_trait_qualified::<dyn Store>("missing").err().unwrap().is_no_such_definition());
}

#[test]
fn test_alias_works_as_qualifier() {
    let container = Container::new();
    three_stores(&container);
    container.register_alias("disk", "archive").unwrap();

    assert_eq!(container.get_trait_qualified::<dyn Store>("archive").unwrap().kind(), "disk");
}

#[test]
fn test_primary_short_circuits_qualifier() {
    let container = Container::new();
    container.register_definition("memory", store::<Memory>().primary().build()).unwrap();
    container.register_definition("disk", store::<Disk>().qualifier("durable").build()).unwrap();

    assert_eq!(container.get_trait_qualified::<dyn Store>("durable").unwrap().kind(), "memory");
}

#[test]
fn test_non_candidates_are_skipped_for_injection() {
    let container = Container::new();
    container
        .register_definition("memory", store::<Memory>().autowire_candidate(false).build())
        .unwrap();
    container.register_definition("disk", store::<Disk>().build()).unwrap();

    assert_eq!(container.get_trait::<dyn Store>().unwrap().kind(), "disk");
    assert_eq!(container.get_bean_as::<dyn Store>("memory").unwrap().kind(), "memory");
}

// ===== Injection by type =====

struct Service {
    store: Arc<dyn Store>,
    cache: Option<Arc<Memory>>,
}

#[test]
fn test_qualified_reference_in_constructor() {
    let container = Container::new();
    three_stores(&container);
    container
        .register_definition(
            "service",
            BeanDefinition::builder::<Service>()
                .constructor(
                    [
                        BeanReference::of_type::<dyn Store>().qualified("remote").into(),
                        BeanReference::of_type::<Memory>().optional().into(),
                    ],
                    |args| {
                        Ok(Service {
                            store: args.bean_as::<dyn Store>(0)?,
                            cache: args.optional_bean::<Memory>(1)?,
                        })
                    },
                )
                .build(),
        )
        .unwrap();

    let service = container.get_bean::<Service>("service").unwrap();
    assert_eq!(service.store.kind(), "remote");
    assert!(service.cache.is_some());
    assert_eq!(container.dependencies_of("service"), ["remote", "memory"]);
}

#[test]
fn test_optional_reference_without_candidates_is_none() {
    let container = Container::new();
    container.register_definition("disk", store::<Disk>().build()).unwrap();
    container
        .register_definition(
            "service",
            BeanDefinition::builder::<Service>()
                .constructor(
                    [
                        BeanReference::of_type::<dyn Store>().into(),
                        BeanReference::of_type::<Memory>().optional().into(),
                    ],
                    |args| {
                        Ok(Service {
                            store: args.bean_as::<dyn Store>(0)?,
                            cache: args.optional_bean::<Memory>(1)?,
                        })
                    },
                )
                .build(),
        )
        .unwrap();

    let service = container.get_bean::<Service>("service").unwrap();
    assert_eq!(service.store.kind(), "disk");
    assert!(service.cache.is_none());
}

#[test]
fn test_required_reference_without_candidates_is_unsatisfied() {
    let container = Container::new();
    container
        .register_definition(
            "service",
            BeanDefinition::builder::<Service>()
                .constructor([BeanReference::of_type::<dyn Store>().into()], |args| {
                    Ok(Service {
                        store: args.bean_as::<dyn Store>(0)?,
                        cache: None,
                    })
                })
                .build(),
        )
        .unwrap();

    let err = container.get_instance("service").unwrap_err();
    assert!(err.is_unsatisfied());
    assert!(err.is_no_such_definition());
}

// ===== Hierarchies =====

#[test]
fn test_child_falls_back_to_parent_candidates() {
    let parent = Container::new();
    parent.register_definition("disk", store::<Disk>().build()).unwrap();
    let child = parent.child();

    let from_child = child.get_trait::<dyn Store>().unwrap();
    let from_parent = parent.get_trait::<dyn Store>().unwrap();
    assert!(Arc::ptr_eq(&from_child, &from_parent));
    assert!(!child.contains_singleton("disk"));
    assert!(child.contains_bean("disk"));
}

#[test]
fn test_local_primary_beats_inherited_primary() {
    let parent = Container::new();
    parent.register_definition("disk", store::<Disk>().primary().build()).unwrap();
    let child = parent.child();
    child.register_definition("memory", store::<Memory>().primary().build()).unwrap();

    assert_eq!(child.get_trait::<dyn Store>().unwrap().kind(), "memory");
    assert_eq!(parent.get_trait::<dyn Store>().unwrap().kind(), "disk");
}

#[test]
fn test_local_name_shadows_parent_bean() {
    let parent = Container::new();
    parent.register_definition("store", store::<Disk>().build()).unwrap();
    let child = parent.child();
    child.register_definition("store", store::<Memory>().build()).unwrap();

    assert_eq!(child.get_trait::<dyn Store>().unwrap().kind(), "memory");
    assert_eq!(child.get_bean_as::<dyn Store>("store").unwrap().kind(), "memory");
}

// ===== Collections and custom resolvers =====

#[test]
fn test_instances_of_type_follow_registration_order() {
    let container = Container::new();
    three_stores(&container);

    let stores = container.get_trait_instances::<dyn Store>().unwrap();
    let kinds: Vec<&str> = stores.values().map(|s| s.kind()).collect();
    assert_eq!(kinds, ["memory", "disk", "remote"]);

    let disks = container.get_instances_of_type::<Disk>().unwrap();
    assert_eq!(disks.keys().collect::<Vec<_>>(), ["disk"]);
}

struct LastWins;

impl CandidateResolver for LastWins {
    fn select(&self, _descriptor: &DependencyDescriptor, candidates: &[Candidate]) -> BeanResult<Option<String>> {
        Ok(candidates.last().map(|c| c.name.clone()))
    }
}

#[test]
fn test_custom_candidate_resolver() {
    let container = Container::builder().candidate_resolver(Arc::new(LastWins)).build();
    three_stores(&container);

    assert_eq!(container.get_trait::<dyn Store>().unwrap().kind(), "remote");
}
