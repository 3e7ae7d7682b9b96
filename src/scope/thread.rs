//! Thread-local scope.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;

use super::{DestructionCallback, Scope};
use crate::error::BeanResult;
use crate::handle::AnyArc;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Default)]
struct ThreadBeans {
    objects: AHashMap<(u64, String), AnyArc>,
    callbacks: Vec<((u64, String), DestructionCallback)>,
}

thread_local! {
    static THREAD_BEANS: RefCell<ThreadBeans> = RefCell::new(ThreadBeans::default());
}

/// One instance per name and thread.
///
/// Storage is thread-local, so no locking is involved; several `ThreadScope`
/// instances keep separate objects. Destruction callbacks run when the owning
/// thread calls [`clear_current_thread`](ThreadScope::clear_current_thread).
///
/// ```rust
/// use std::sync::Arc;
/// use ferrous_beans::{BeanDefinition, Container, ThreadScope};
///
/// #[derive(Default)]
/// struct Buffer;
///
/// let container = Container::new();
/// container.register_scope("thread", Arc::new(ThreadScope::new())).unwrap();
/// container
///     .register_definition("buffer", BeanDefinition::builder::<Buffer>().default_constructor().scoped("thread").build())
///     .unwrap();
///
/// let here = container.get_bean::<Buffer>("buffer").unwrap();
/// let there = {
///     let container = container.clone();
///     std::thread::spawn(move || container.get_bean::<Buffer>("buffer").unwrap()).join().unwrap()
/// };
/// assert!(!Arc::ptr_eq(&here, &there));
/// assert!(Arc::ptr_eq(&here, &container.get_bean::<Buffer>("buffer").unwrap()));
/// ```
pub struct ThreadScope {
    id: u64,
}

impl ThreadScope {
    pub fn new() -> Self {
        Self {
            id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    fn key(&self, name: &str) -> (u64, String) {
        (self.id, name.to_string())
    }

    /// Drops this scope's objects on the calling thread and runs their
    /// destruction callbacks, newest first.
    pub fn clear_current_thread(&self) {
        let callbacks = THREAD_BEANS.with(|beans| {
            let mut beans = beans.borrow_mut();
            beans.objects.retain(|(id, _), _| *id != self.id);
            let (mine, others): (Vec<_>, Vec<_>) =
                std::mem::take(&mut beans.callbacks).into_iter().partition(|(key, _)| key.0 == self.id);
            beans.callbacks = others;
            mine
        });
        for (_, callback) in callbacks.into_iter().rev() {
            callback();
        }
    }

    /// Number of objects this scope holds on the calling thread.
    pub fn current_thread_len(&self) -> usize {
        THREAD_BEANS.with(|beans| beans.borrow().objects.keys().filter(|(id, _)| *id == self.id).count())
    }
}

impl Default for ThreadScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope for ThreadScope {
    fn get(&self, name: &str, factory: &mut dyn FnMut() -> BeanResult<AnyArc>) -> BeanResult<AnyArc> {
        let key = self.key(name);
        if let Some(existing) = THREAD_BEANS.with(|beans| beans.borrow().objects.get(&key).cloned()) {
            return Ok(existing);
        }
        let created = factory()?;
        Ok(THREAD_BEANS.with(|beans| beans.borrow_mut().objects.entry(key).or_insert(created).clone()))
    }

    fn remove(&self, name: &str) -> Option<AnyArc> {
        let key = self.key(name);
        THREAD_BEANS.with(|beans| {
            let mut beans = beans.borrow_mut();
            beans.callbacks.retain(|(k, _)| *k != key);
            beans.objects.remove(&key)
        })
    }

    fn register_destruction_callback(&self, name: &str, callback: DestructionCallback) {
        let key = self.key(name);
        THREAD_BEANS.with(|beans| {
            let mut beans = beans.borrow_mut();
            beans.callbacks.retain(|(k, _)| *k != key);
            beans.callbacks.push((key, callback));
        });
    }

    fn conversation_id(&self) -> Option<String> {
        Some(format!("{:?}", std::thread::current().id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn separate_scopes_do_not_share_objects() {
        let a = ThreadScope::new();
        let b = ThreadScope::new();
        let x = a.get("n", &mut || Ok(Arc::new(1u8) as AnyArc)).unwrap();
        let y = b.get("n", &mut || Ok(Arc::new(2u8) as AnyArc)).unwrap();
        assert!(!Arc::ptr_eq(&x, &y));
        assert_eq!(a.current_thread_len(), 1);
    }

    #[test]
    fn clear_runs_callbacks_of_this_scope_only() {
        let a = ThreadScope::new();
        let b = ThreadScope::new();
        let ran = Arc::new(AtomicUsize::new(0));
        a.get("n", &mut || Ok(Arc::new(1u8) as AnyArc)).unwrap();
        b.get("n", &mut || Ok(Arc::new(1u8) as AnyArc)).unwrap();
        for scope in [&a, &b] {
            let ran = ran.clone();
            scope.register_destruction_callback("n", Box::new(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            }));
        }
        a.clear_current_thread();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(a.current_thread_len(), 0);
        assert_eq!(b.current_thread_len(), 1);
        b.clear_current_thread();
        assert_eq!(ran.load(Ordering::SeqCst), 2);
    }
}
