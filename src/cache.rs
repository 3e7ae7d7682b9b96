//! Concurrent singleton cache.
//!
//! Fully created singletons live in a read-mostly map that is consulted
//! without touching the creation lock. Everything else (in-creation markers,
//! early-exposed handles, dependency edges, disposal adapters) sits behind one
//! coarse mutex. Construction itself always runs outside that mutex.

use std::fmt;
use std::thread::{self, ThreadId};

use ahash::{AHashMap, AHashSet};
use indexmap::{IndexMap, IndexSet};
use parking_lot::{Condvar, Mutex, MutexGuard, RwLock};

use crate::error::{BeanError, BeanResult};
use crate::handle::{AnyArc, BeanHandle, TypeViews};
use crate::internal::circular;
use crate::internal::{DependencyGraph, DisposableAdapter};

/// Produces the early handle of a singleton on first demand.
pub(crate) type EarlyFactory = Box<dyn FnOnce() -> BeanResult<BeanHandle> + Send>;

#[derive(Default)]
struct CacheState {
    early: AHashMap<String, BeanHandle>,
    early_factories: AHashMap<String, EarlyFactory>,
    in_creation: AHashMap<String, ThreadId>,
    /// thread -> name it is blocked on
    waiting: AHashMap<ThreadId, String>,
    excluded: AHashSet<String>,
    /// Fully created singletons in completion order
    order: IndexSet<String>,
    graph: DependencyGraph,
    disposables: IndexMap<String, DisposableAdapter>,
    destroying: bool,
}

impl CacheState {
    /// `true` if `owner` is (transitively) blocked on something `me` is creating.
    fn waits_on(&self, owner: ThreadId, me: ThreadId) -> bool {
        let mut current = owner;
        for _ in 0..=self.waiting.len() {
            if current == me {
                return true;
            }
            let Some(name) = self.waiting.get(&current) else {
                return false;
            };
            let Some(next) = self.in_creation.get(name) else {
                return false;
            };
            current = *next;
        }
        false
    }
}

/// Result of tearing singletons down.
///
/// Destruction never stops at the first failure; every failing callback is
/// recorded here and the sweep continues.
#[derive(Default)]
pub struct DestroyReport {
    destroyed: Vec<String>,
    failures: Vec<BeanError>,
}

impl DestroyReport {
    /// Names of the destroyed singletons, in destruction order.
    pub fn destroyed(&self) -> &[String] {
        &self.destroyed
    }

    pub fn failures(&self) -> &[BeanError] {
        &self.failures
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// `Ok` when every callback succeeded, else the first failure.
    pub fn into_result(self) -> BeanResult<Vec<String>> {
        match self.failures.into_iter().next() {
            Some(first) => Err(first),
            None => Ok(self.destroyed),
        }
    }

    pub(crate) fn merge(&mut self, other: DestroyReport) {
        self.destroyed.extend(other.destroyed);
        self.failures.extend(other.failures);
    }
}

impl fmt::Debug for DestroyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestroyReport")
            .field("destroyed", &self.destroyed)
            .field("failures", &self.failures.iter().map(|e| e.to_string()).collect::<Vec<_>>())
            .finish()
    }
}

/// Clears the in-creation marker if construction unwinds.
struct CreationMarker<'a> {
    cache: &'a SingletonCache,
    name: &'a str,
    armed: bool,
}

impl Drop for CreationMarker<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.cache.state.lock();
            self.cache.abandon(&mut state, self.name);
        }
    }
}

pub(crate) struct SingletonCache {
    ready: RwLock<AHashMap<String, BeanHandle>>,
    state: Mutex<CacheState>,
    creation_done: Condvar,
    /// Identifies the owning container in the thread-local creation chain
    owner: usize,
}

impl SingletonCache {
    pub(crate) fn new(owner: usize) -> Self {
        Self {
            ready: RwLock::new(AHashMap::new()),
            state: Mutex::new(CacheState::default()),
            creation_done: Condvar::new(),
            owner,
        }
    }

    /// Fully created singleton.
    #[inline]
    pub(crate) fn get_ready(&self, name: &str) -> Option<BeanHandle> {
        self.ready.read().get(name).cloned()
    }

    /// Fully created singleton, or the early handle when the calling thread is
    /// the one creating `name`.
    pub(crate) fn get(&self, name: &str) -> BeanResult<Option<BeanHandle>> {
        if let Some(handle) = self.get_ready(name) {
            return Ok(Some(handle));
        }
        let state = self.state.lock();
        let created_here = state.in_creation.get(name) == Some(&thread::current().id());
        if created_here {
            self.early_handle(state, name)
        } else {
            Ok(None)
        }
    }

    /// Early handle of `name`, materializing it from its factory if needed.
    fn early_handle(&self, mut state: MutexGuard<'_, CacheState>, name: &str) -> BeanResult<Option<BeanHandle>> {
        if let Some(handle) = state.early.get(name) {
            tracing::trace!(bean = name, "returning early singleton reference");
            return Ok(Some(handle.clone()));
        }
        let Some(factory) = state.early_factories.remove(name) else {
            return Ok(None);
        };
        drop(state);
        let handle = factory()?;
        let mut state = self.state.lock();
        if !state.in_creation.contains_key(name) {
            // creation finished or failed meanwhile
            return Ok(self.get_ready(name));
        }
        let handle = state.early.entry(name.to_string()).or_insert(handle).clone();
        tracing::trace!(bean = name, "exposed early singleton reference");
        Ok(Some(handle))
    }

    /// Returns the singleton for `name`, running `factory` exactly once across
    /// all threads when it does not exist yet.
    ///
    /// A second thread asking for a name under construction blocks until the
    /// first finishes. If waiting would close a cycle between threads, the
    /// early handle is returned instead, or a circular dependency error when
    /// none was exposed.
    pub(crate) fn get_or_create<F>(&self, name: &str, views: TypeViews, factory: F) -> BeanResult<BeanHandle>
    where
        F: FnOnce() -> BeanResult<AnyArc>,
    {
        let me = thread::current().id();
        let mut state = self.state.lock();
        loop {
            if let Some(handle) = self.get_ready(name) {
                return Ok(handle);
            }
            if state.destroying {
                return Err(BeanError::CreationNotAllowed(name.to_string()));
            }
            match state.in_creation.get(name).copied() {
                None => {
                    state.in_creation.insert(name.to_string(), me);
                    break;
                }
                Some(owner) if owner == me => {
                    if let Some(handle) = state.early.get(name) {
                        return Ok(handle.clone());
                    }
                    if state.early_factories.contains_key(name) {
                        if let Some(handle) = self.early_handle(state, name)? {
                            return Ok(handle);
                        }
                        state = self.state.lock();
                        continue;
                    }
                    return Err(BeanError::CircularDependency(circular::cycle_path(self.owner, name)));
                }
                Some(owner) => {
                    if state.waits_on(owner, me) {
                        tracing::debug!(bean = name, "breaking cross-thread creation cycle");
                        if state.early.contains_key(name) || state.early_factories.contains_key(name) {
                            if let Some(handle) = self.early_handle(state, name)? {
                                return Ok(handle);
                            }
                            state = self.state.lock();
                            continue;
                        }
                        let mut path = circular::cycle_path(self.owner, name);
                        path.insert(0, name.to_string());
                        return Err(BeanError::CircularDependency(path));
                    }
                    state.waiting.insert(me, name.to_string());
                    self.creation_done.wait(&mut state);
                    state.waiting.remove(&me);
                }
            }
        }
        drop(state);

        let mut marker = CreationMarker {
            cache: self,
            name,
            armed: true,
        };
        let result = factory();
        marker.armed = false;

        let mut state = self.state.lock();
        match result {
            Ok(object) => {
                state.in_creation.remove(name);
                state.early_factories.remove(name);
                let handle = match state.early.remove(name) {
                    Some(early) => {
                        early.complete(object);
                        early
                    }
                    None => BeanHandle::ready(name, object, views),
                };
                self.ready.write().insert(name.to_string(), handle.clone());
                state.order.insert(name.to_string());
                self.creation_done.notify_all();
                Ok(handle)
            }
            Err(err) => {
                // beans that already captured the early reference are invalid now
                let dependents = state.graph.take_dependents(name);
                self.abandon(&mut state, name);
                drop(state);
                for dependent in dependents {
                    let report = self.destroy_singleton(&dependent);
                    tracing::debug!(bean = name, dependent = %dependent, clean = report.is_clean(), "discarded dependent of failed singleton");
                }
                Err(err)
            }
        }
    }

    /// Early-exposed object of `name`, without materializing a pending factory.
    pub(crate) fn early_object(&self, name: &str) -> Option<AnyArc> {
        self.state.lock().early.get(name).and_then(BeanHandle::object)
    }

    /// Drops every trace of a failed creation and wakes waiters.
    fn abandon(&self, state: &mut CacheState, name: &str) {
        state.in_creation.remove(name);
        state.early_factories.remove(name);
        if let Some(early) = state.early.remove(name) {
            early.fail();
        }
        state.disposables.shift_remove(name);
        state.graph.remove(name);
        self.creation_done.notify_all();
    }

    /// Offers an early reference for a singleton currently being created.
    pub(crate) fn register_early_reference(&self, name: &str, factory: EarlyFactory) {
        let mut state = self.state.lock();
        if state.in_creation.contains_key(name) && !state.early.contains_key(name) {
            state.early_factories.insert(name.to_string(), factory);
        }
    }

    /// Registers an externally created singleton.
    pub(crate) fn register_singleton(&self, name: &str, object: AnyArc, views: TypeViews) -> BeanResult<BeanHandle> {
        let mut state = self.state.lock();
        if self.ready.read().contains_key(name) || state.in_creation.contains_key(name) {
            return Err(BeanError::IllegalState(format!(
                "could not register singleton '{}': there is already an object bound",
                name
            )));
        }
        let handle = BeanHandle::ready(name, object, views);
        self.ready.write().insert(name.to_string(), handle.clone());
        state.order.insert(name.to_string());
        Ok(handle)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.ready.read().contains_key(name)
    }

    /// Fully created singletons in completion order.
    pub(crate) fn names(&self) -> Vec<String> {
        self.state.lock().order.iter().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.ready.read().len()
    }

    pub(crate) fn is_currently_in_creation(&self, name: &str) -> bool {
        let state = self.state.lock();
        state.in_creation.contains_key(name) && !state.excluded.contains(name)
    }

    /// `true` when the calling thread is the one creating `name`.
    pub(crate) fn is_created_by_current_thread(&self, name: &str) -> bool {
        self.state.lock().in_creation.get(name) == Some(&thread::current().id())
    }

    /// Excludes `name` from in-creation checks (or re-includes it).
    pub(crate) fn set_excluded(&self, name: &str, excluded: bool) {
        let mut state = self.state.lock();
        if excluded {
            state.excluded.insert(name.to_string());
        } else {
            state.excluded.remove(name);
        }
    }

    pub(crate) fn add_dependency(&self, dependent: &str, dependency: &str) {
        self.state.lock().graph.add(dependent, dependency);
    }

    pub(crate) fn is_dependent(&self, name: &str, candidate: &str) -> bool {
        self.state.lock().graph.is_dependent(name, candidate)
    }

    pub(crate) fn dependents_of(&self, name: &str) -> Vec<String> {
        self.state.lock().graph.dependents_of(name)
    }

    pub(crate) fn dependencies_of(&self, name: &str) -> Vec<String> {
        self.state.lock().graph.dependencies_of(name)
    }

    pub(crate) fn disposable_count(&self) -> usize {
        self.state.lock().disposables.len()
    }

    pub(crate) fn register_disposable(&self, adapter: DisposableAdapter) {
        let mut state = self.state.lock();
        state.disposables.insert(adapter.name().to_string(), adapter);
    }

    /// Removes a singleton without running any callback.
    pub(crate) fn remove(&self, name: &str) -> Option<BeanHandle> {
        let mut state = self.state.lock();
        state.order.shift_remove(name);
        state.early.remove(name);
        state.early_factories.remove(name);
        self.ready.write().remove(name)
    }

    /// Destroys `name`, destroying the beans that depend on it first.
    pub(crate) fn destroy_singleton(&self, name: &str) -> DestroyReport {
        let mut report = DestroyReport::default();
        self.destroy_into(name, &mut report);
        report
    }

    fn destroy_into(&self, name: &str, report: &mut DestroyReport) {
        let dependents = self.state.lock().graph.take_dependents(name);
        for dependent in dependents {
            self.destroy_into(&dependent, report);
        }

        let (existed, adapter) = {
            let mut state = self.state.lock();
            let existed = state.order.shift_remove(name);
            state.early.remove(name);
            state.early_factories.remove(name);
            self.ready.write().remove(name);
            (existed, state.disposables.shift_remove(name))
        };
        if let Some(adapter) = adapter {
            tracing::debug!(bean = name, "destroying singleton");
            report.failures.extend(adapter.destroy());
        }
        if existed {
            report.destroyed.push(name.to_string());
        }
        self.state.lock().graph.remove(name);
    }

    /// Destroys every singleton, newest first, dependents before dependencies.
    pub(crate) fn destroy_all(&self) -> DestroyReport {
        let names: Vec<String> = {
            let mut state = self.state.lock();
            state.destroying = true;
            let mut names: Vec<String> = state.order.iter().cloned().collect();
            names.extend(state.disposables.keys().filter(|n| !state.order.contains(*n)).cloned());
            names
        };
        tracing::debug!(count = names.len(), "destroying singletons");

        let mut report = DestroyReport::default();
        for name in names.iter().rev() {
            self.destroy_into(name, &mut report);
        }

        let mut state = self.state.lock();
        state.graph.clear();
        state.disposables.clear();
        state.order.clear();
        state.early.clear();
        state.early_factories.clear();
        self.ready.write().clear();
        state.destroying = false;
        report
    }
}
