/// Concurrent access integration tests
///
/// Singletons must be created exactly once no matter how many threads race
/// for them, and registration must stay consistent while lookups run.

use ferrous_beans::{BeanDefinition, BeanError, BeanReference, Container};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

const THREADS: usize = 16;

// ===== Test Beans =====

struct SlowSingleton {
    serial: usize,
}

struct Consumer {
    slow: Arc<SlowSingleton>,
}

fn slow_singleton(created: Arc<AtomicUsize>) -> BeanDefinition {
    BeanDefinition::builder::<SlowSingleton>()
        .supplier(move |_| {
            thread::sleep(Duration::from_millis(20));
            Ok(SlowSingleton {
                serial: created.fetch_add(1, Ordering::SeqCst) + 1,
            })
        })
        .build()
}

// ===== Singleton consistency =====

#[test]
fn test_racing_threads_share_one_singleton() {
    let created = Arc::new(AtomicUsize::new(0));
    let container = Container::new();
    container.register_definition("slow", slow_singleton(created.clone())).unwrap();

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let container = container.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                container.get_bean::<SlowSingleton>("slow").unwrap()
            })
        })
        .collect();

    let beans: Vec<Arc<SlowSingleton>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(created.load(Ordering::SeqCst), 1);
    for bean in &beans {
        assert!(Arc::ptr_eq(bean, &beans[0]));
        assert_eq!(bean.serial, 1);
    }
}

#[test]
fn test_dependents_racing_for_a_shared_dependency() {
    let created = Arc::new(AtomicUsize::new(0));
    let container = Container::new();
    container.register_definition("slow", slow_singleton(created.clone())).unwrap();
    for i in 0..THREADS {
        container
            .register_definition(
                &format!("consumer-{}", i),
                BeanDefinition::builder::<Consumer>()
                    .constructor([BeanReference::to("slow").into()], |args| {
                        Ok(Consumer {
                            slow: args.bean::<SlowSingleton>(0)?,
                        })
                    })
                    .build(),
            )
            .unwrap();
    }

    let barrier = Barrier::new(THREADS);
    let consumers: Vec<Arc<Consumer>> = crossbeam_utils::thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let container = &container;
                let barrier = &barrier;
                s.spawn(move |_| {
                    barrier.wait();
                    container.get_bean::<Consumer>(&format!("consumer-{}", i)).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(consumers.iter().all(|c| Arc::ptr_eq(&c.slow, &consumers[0].slow)));
    assert_eq!(container.dependents_of("slow").len(), THREADS);
}

#[test]
fn test_prototypes_created_concurrently_are_distinct() {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();
    let container = Container::new();
    container
        .register_definition(
            "proto",
            BeanDefinition::builder::<SlowSingleton>()
                .supplier(move |_| {
                    Ok(SlowSingleton {
                        serial: counter.fetch_add(1, Ordering::SeqCst),
                    })
                })
                .prototype()
                .build(),
        )
        .unwrap();

    let mut serials: Vec<usize> = crossbeam_utils::thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| s.spawn(|_| (0..10).map(|_| container.get_bean::<SlowSingleton>("proto").unwrap().serial).collect::<Vec<_>>()))
            .collect();
        handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    serials.sort_unstable();
    serials.dedup();
    assert_eq!(serials.len(), THREADS * 10);
    assert_eq!(created.load(Ordering::SeqCst), THREADS * 10);
    assert!(container.singleton_names().is_empty());
}

#[test]
fn test_type_scan_waits_for_singleton_created_on_another_thread() {
    let created = Arc::new(AtomicUsize::new(0));
    let started = Arc::new(Barrier::new(2));
    let container = Container::new();
    let gate = started.clone();
    let counter = created.clone();
    container
        .register_definition(
            "slow",
            BeanDefinition::builder::<SlowSingleton>()
                .supplier(move |_| {
                    gate.wait();
                    thread::sleep(Duration::from_millis(100));
                    Ok(SlowSingleton {
                        serial: counter.fetch_add(1, Ordering::SeqCst) + 1,
                    })
                })
                .build(),
        )
        .unwrap();

    let creator = {
        let container = container.clone();
        thread::spawn(move || container.get_bean::<SlowSingleton>("slow").unwrap())
    };
    // the supplier is running on the other thread from here on
    started.wait();
    let found = container.get_instances_of_type::<SlowSingleton>().unwrap();
    let created_elsewhere = creator.join().unwrap();

    assert_eq!(found.len(), 1);
    assert!(Arc::ptr_eq(&found["slow"], &created_elsewhere));
    assert_eq!(created.load(Ordering::SeqCst), 1);
}

// ===== Registration while resolving =====

#[derive(Default)]
struct Plugin;

#[test]
fn test_registration_and_lookup_interleave() {
    let container = Container::new();

    crossbeam_utils::thread::scope(|s| {
        for writer in 0..4 {
            let container = &container;
            s.spawn(move |_| {
                for i in 0..50 {
                    let name = format!("plugin-{}-{}", writer, i);
                    container
                        .register_definition(&name, BeanDefinition::builder::<Plugin>().default_constructor().build())
                        .unwrap();
                    container.get_bean::<Plugin>(&name).unwrap();
                }
            });
        }
        for _ in 0..4 {
            let container = &container;
            s.spawn(move |_| {
                for _ in 0..50 {
                    for name in container.names_for_type::<Plugin>() {
                        // a name handed out by the scan is always resolvable
                        container.get_bean::<Plugin>(&name).unwrap();
                    }
                }
            });
        }
    })
    .unwrap();

    assert_eq!(container.definition_count(), 200);
    assert_eq!(container.singleton_count(), 200);
    assert_eq!(container.get_instances_of_type::<Plugin>().unwrap().len(), 200);
}

#[test]
fn test_close_while_threads_resolve() {
    let container = Container::new();
    for i in 0..32 {
        container
            .register_definition(&format!("plugin-{}", i), BeanDefinition::builder::<Plugin>().default_constructor().build())
            .unwrap();
    }

    let outcomes: Vec<Result<(), BeanError>> = crossbeam_utils::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let container = &container;
                s.spawn(move |_| {
                    (0..32)
                        .map(|i| container.get_instance(&format!("plugin-{}", i)).map(|_| ()))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        container.close();
        handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    assert!(container.is_closed());
    // every lookup either saw the bean or was refused, never a panic or a hang
    for outcome in outcomes {
        if let Err(err) = outcome {
            assert!(matches!(err, BeanError::CreationNotAllowed(_)), "unexpected error: {}", err);
        }
    }
}
