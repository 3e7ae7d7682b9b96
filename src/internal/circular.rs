//! Creation-chain tracking for cycle and depth detection.
//!
//! Every bean creation on a thread pushes `(container, name)` onto a
//! thread-local stack for its duration. Seeing a name again on the same stack
//! means the chain loops back on itself; the stack then doubles as the
//! reported path.

use std::cell::RefCell;

use crate::error::{BeanError, BeanResult};

thread_local! {
    static CREATION_TLS: RefCell<Vec<(usize, String)>> = const { RefCell::new(Vec::new()) };
}

/// Guard for one entry of the thread-local creation stack.
pub(crate) struct StackGuard {
    owner: usize,
}

impl StackGuard {
    /// Pushes `name`, failing on a loop or when `max_depth` would be exceeded.
    pub(crate) fn enter(owner: usize, name: &str, max_depth: usize) -> BeanResult<Self> {
        CREATION_TLS.with(|tls| {
            let mut stack = tls.borrow_mut();
            if stack.iter().any(|(o, n)| *o == owner && n == name) {
                return Err(BeanError::CircularDependency(path_from(&stack, owner, name)));
            }
            if stack.len() >= max_depth {
                return Err(BeanError::DepthExceeded(stack.len()));
            }
            stack.push((owner, name.to_string()));
            Ok(Self { owner })
        })
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        CREATION_TLS.with(|tls| {
            let popped = tls.borrow_mut().pop();
            debug_assert!(popped.is_some_and(|(o, _)| o == self.owner));
        });
    }
}

fn path_from(stack: &[(usize, String)], owner: usize, name: &str) -> Vec<String> {
    let mine: Vec<&str> = stack.iter().filter(|(o, _)| *o == owner).map(|(_, n)| n.as_str()).collect();
    let start = mine.iter().position(|n| *n == name).unwrap_or(0);
    let mut path: Vec<String> = mine[start..].iter().map(|n| n.to_string()).collect();
    path.push(name.to_string());
    path
}

/// Path of the creation chain on this thread that ends by requesting `name`.
pub(crate) fn cycle_path(owner: usize, name: &str) -> Vec<String> {
    CREATION_TLS.with(|tls| path_from(&tls.borrow(), owner, name))
}

/// `true` if `name` is being created further up this thread's chain.
pub(crate) fn is_on_stack(owner: usize, name: &str) -> bool {
    CREATION_TLS.with(|tls| tls.borrow().iter().any(|(o, n)| *o == owner && n == name))
}

/// Innermost bean being created on this thread by `owner`.
pub(crate) fn current(owner: usize) -> Option<String> {
    CREATION_TLS.with(|tls| {
        tls.borrow()
            .iter()
            .rev()
            .find(|(o, _)| *o == owner)
            .map(|(_, n)| n.clone())
    })
}
