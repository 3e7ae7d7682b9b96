//! Dependent -> dependency edges between beans.

use indexmap::{IndexMap, IndexSet};

/// Edges recorded while resolving properties, arguments and depends-on.
///
/// Used to destroy dependents before their dependencies and to reject
/// depends-on cycles.
#[derive(Debug, Default)]
pub(crate) struct DependencyGraph {
    /// dependency -> beans that depend on it
    dependents: IndexMap<String, IndexSet<String>>,
    /// bean -> beans it depends on
    dependencies: IndexMap<String, IndexSet<String>>,
}

impl DependencyGraph {
    pub(crate) fn add(&mut self, dependent: &str, dependency: &str) {
        if dependent == dependency {
            return;
        }
        self.dependents
            .entry(dependency.to_string())
            .or_default()
            .insert(dependent.to_string());
        self.dependencies
            .entry(dependent.to_string())
            .or_default()
            .insert(dependency.to_string());
    }

    pub(crate) fn dependents_of(&self, name: &str) -> Vec<String> {
        self.dependents
            .get(name)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn dependencies_of(&self, name: &str) -> Vec<String> {
        self.dependencies
            .get(name)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// `true` if `candidate` depends on `name`, directly or transitively.
    pub(crate) fn is_dependent(&self, name: &str, candidate: &str) -> bool {
        let mut seen = IndexSet::new();
        let mut pending = vec![name.to_string()];
        while let Some(current) = pending.pop() {
            let Some(direct) = self.dependents.get(&current) else {
                continue;
            };
            if direct.contains(candidate) {
                return true;
            }
            for next in direct {
                if seen.insert(next.clone()) {
                    pending.push(next.clone());
                }
            }
        }
        false
    }

    /// Detaches and returns the beans depending on `name`.
    pub(crate) fn take_dependents(&mut self, name: &str) -> Vec<String> {
        let Some(users) = self.dependents.shift_remove(name) else {
            return Vec::new();
        };
        for user in &users {
            if let Some(set) = self.dependencies.get_mut(user) {
                set.shift_remove(name);
            }
        }
        users.into_iter().collect()
    }

    /// Drops every edge touching `name`.
    pub(crate) fn remove(&mut self, name: &str) {
        if let Some(deps) = self.dependencies.shift_remove(name) {
            for dep in deps {
                if let Some(set) = self.dependents.get_mut(&dep) {
                    set.shift_remove(name);
                }
            }
        }
        if let Some(users) = self.dependents.shift_remove(name) {
            for user in users {
                if let Some(set) = self.dependencies.get_mut(&user) {
                    set.shift_remove(name);
                }
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.dependents.clear();
        self.dependencies.clear();
    }
}
