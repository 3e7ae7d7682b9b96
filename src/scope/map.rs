//! Shared map-backed scope (request, session, tenant, ...).

use std::cell::RefCell;

use indexmap::IndexMap;
use parking_lot::ReentrantMutex;

use super::{DestructionCallback, Scope};
use crate::error::BeanResult;
use crate::handle::AnyArc;

#[derive(Default)]
struct MapState {
    objects: IndexMap<String, AnyArc>,
    callbacks: IndexMap<String, DestructionCallback>,
}

/// Scope keeping one instance per name until [`reset`](MapScope::reset).
///
/// Creation is serialized per scope through a reentrant lock: a second thread
/// asking for the same name waits for the first, while the creating thread may
/// re-enter the scope for its own dependencies. The state borrow is never held
/// while the factory runs.
pub struct MapScope {
    id: String,
    state: ReentrantMutex<RefCell<MapState>>,
}

impl MapScope {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: ReentrantMutex::new(RefCell::new(MapState::default())),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state.lock().borrow().objects.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.state.lock().borrow().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discards every object, running destruction callbacks newest first.
    pub fn reset(&self) {
        let callbacks = {
            let guard = self.state.lock();
            let mut state = guard.borrow_mut();
            state.objects.clear();
            std::mem::take(&mut state.callbacks)
        };
        tracing::debug!(scope = %self.id, callbacks = callbacks.len(), "resetting scope");
        for (_, callback) in callbacks.into_iter().rev() {
            callback();
        }
    }
}

impl Scope for MapScope {
    fn get(&self, name: &str, factory: &mut dyn FnMut() -> BeanResult<AnyArc>) -> BeanResult<AnyArc> {
        let guard = self.state.lock();
        if let Some(existing) = guard.borrow().objects.get(name) {
            return Ok(existing.clone());
        }
        let created = factory()?;
        let mut state = guard.borrow_mut();
        let stored = state.objects.entry(name.to_string()).or_insert(created);
        Ok(stored.clone())
    }

    fn remove(&self, name: &str) -> Option<AnyArc> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        state.callbacks.shift_remove(name);
        state.objects.shift_remove(name)
    }

    fn register_destruction_callback(&self, name: &str, callback: DestructionCallback) {
        let guard = self.state.lock();
        guard.borrow_mut().callbacks.insert(name.to_string(), callback);
    }

    fn conversation_id(&self) -> Option<String> {
        Some(self.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn caches_until_reset_and_runs_callbacks() {
        let scope = MapScope::new("request");
        let created = AtomicUsize::new(0);
        let destroyed = Arc::new(AtomicUsize::new(0));

        let mut factory = || {
            created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(5u8) as AnyArc)
        };
        let a = scope.get("n", &mut factory).unwrap();
        let b = scope.get("n", &mut factory).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let counter = destroyed.clone();
        scope.register_destruction_callback("n", Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        scope.reset();
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert!(scope.is_empty());

        scope.get("n", &mut factory).unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn nested_get_from_factory_does_not_deadlock() {
        let scope = MapScope::new("s");
        let outer = scope
            .get("outer", &mut || {
                let inner = scope.get("inner", &mut || Ok(Arc::new(1u8) as AnyArc))?;
                Ok(inner)
            })
            .unwrap();
        assert!(scope.contains("inner"));
        assert!(Arc::ptr_eq(&outer, &scope.get("inner", &mut || unreachable!()).unwrap()));
    }

    #[test]
    fn failed_factory_leaves_nothing_behind() {
        let scope = MapScope::new("s");
        let err = scope.get("n", &mut || Err(crate::BeanError::msg("boom")));
        assert!(err.is_err());
        assert!(!scope.contains("n"));
    }
}
