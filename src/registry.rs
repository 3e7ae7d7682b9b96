//! Name-keyed definition store with aliases and an override policy.

use std::sync::Arc;

use ahash::AHashMap;

use crate::definition::BeanDefinition;
use crate::error::{BeanError, BeanResult};

const MAX_ALIAS_HOPS: usize = 64;

/// Outcome of a registration.
pub(crate) enum Registered {
    New,
    Replaced(Arc<BeanDefinition>),
}

/// Definition registry.
///
/// The map itself is unordered; names are additionally kept in insertion order
/// so iteration over all definitions is deterministic. Overriding keeps the
/// original position.
pub(crate) struct DefinitionRegistry {
    definitions: AHashMap<String, Arc<BeanDefinition>>,
    order: Vec<String>,
    /// alias -> name (which may itself be an alias)
    aliases: AHashMap<String, String>,
    allow_overriding: bool,
}

impl DefinitionRegistry {
    pub(crate) fn new(allow_overriding: bool) -> Self {
        Self {
            definitions: AHashMap::new(),
            order: Vec::new(),
            aliases: AHashMap::new(),
            allow_overriding,
        }
    }

    pub(crate) fn allows_overriding(&self) -> bool {
        self.allow_overriding
    }

    pub(crate) fn register(&mut self, name: &str, definition: BeanDefinition) -> BeanResult<Registered> {
        if name.is_empty() {
            return Err(BeanError::InvalidDefinition {
                name: name.to_string(),
                reason: "bean name must not be empty".into(),
            });
        }
        if let Some(target) = self.aliases.get(name) {
            if !self.allow_overriding {
                return Err(BeanError::DefinitionOverride {
                    name: name.to_string(),
                    existing: format!("an alias for '{}'", target),
                });
            }
            tracing::debug!(bean = name, alias_for = %target, "definition replaces alias");
            self.aliases.remove(name);
        }

        let definition = Arc::new(definition);
        match self.definitions.get_mut(name) {
            Some(existing) => {
                if !self.allow_overriding {
                    return Err(BeanError::DefinitionOverride {
                        name: name.to_string(),
                        existing: format!("definition {:?}", existing.bean_type().map(|k| k.name())),
                    });
                }
                tracing::debug!(bean = name, "overriding bean definition");
                let previous = std::mem::replace(existing, definition);
                Ok(Registered::Replaced(previous))
            }
            None => {
                self.definitions.insert(name.to_string(), definition);
                self.order.push(name.to_string());
                Ok(Registered::New)
            }
        }
    }

    pub(crate) fn remove(&mut self, name: &str) -> BeanResult<Arc<BeanDefinition>> {
        let removed = self
            .definitions
            .remove(name)
            .ok_or_else(|| BeanError::no_such_name(name))?;
        self.order.retain(|n| n != name);
        let dangling: Vec<String> = self.aliases_of(name);
        for alias in dangling {
            self.aliases.remove(&alias);
        }
        Ok(removed)
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Arc<BeanDefinition>> {
        self.definitions.get(name)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub(crate) fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Names in insertion order.
    pub(crate) fn names(&self) -> &[String] {
        &self.order
    }

    /// Definitions in insertion order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &Arc<BeanDefinition>)> {
        self.order
            .iter()
            .filter_map(move |name| self.definitions.get(name).map(|def| (name.as_str(), def)))
    }

    /// Replaces a definition with a mutated copy.
    ///
    /// Once a singleton exists for `name` its scope and construction policy are
    /// frozen.
    pub(crate) fn update(&mut self, name: &str, update: impl FnOnce(&mut BeanDefinition)) -> BeanResult<Arc<BeanDefinition>> {
        let current = self.definitions.get(name).ok_or_else(|| BeanError::no_such_name(name))?;
        let mut next = BeanDefinition::clone(current);
        update(&mut next);
        if current.is_initialized() {
            let same_policy = match (current.instantiation(), next.instantiation()) {
                (Some(a), Some(b)) => a.same_policy(b),
                (None, None) => true,
                _ => false,
            };
            if current.scope() != next.scope() || !same_policy {
                return Err(BeanError::IllegalState(format!(
                    "scope and construction policy of '{}' cannot change after its instance was created",
                    name
                )));
            }
        }
        let next = Arc::new(next);
        self.definitions.insert(name.to_string(), next.clone());
        Ok(next)
    }

    /// Registers `alias` for `name`, returning the definition the alias
    /// displaced when overriding let it take over a registered name.
    pub(crate) fn register_alias(&mut self, name: &str, alias: &str) -> BeanResult<Option<Arc<BeanDefinition>>> {
        if alias.is_empty() || name.is_empty() {
            return Err(BeanError::InvalidDefinition {
                name: name.to_string(),
                reason: "alias and name must not be empty".into(),
            });
        }
        if alias == name {
            self.aliases.remove(alias);
            return Ok(None);
        }
        if let Some(existing) = self.aliases.get(alias) {
            if existing == name {
                return Ok(None);
            }
            if !self.allow_overriding {
                return Err(BeanError::DefinitionOverride {
                    name: alias.to_string(),
                    existing: format!("an alias for '{}'", existing),
                });
            }
        }
        if self.definitions.contains_key(alias) && !self.allow_overriding {
            return Err(BeanError::DefinitionOverride {
                name: alias.to_string(),
                existing: "a bean definition".into(),
            });
        }
        if self.canonical_name(name) == alias || self.resolves_through(name, alias) {
            return Err(BeanError::InvalidDefinition {
                name: alias.to_string(),
                reason: format!("alias '{}' for '{}' would create a cycle", alias, name),
            });
        }
        let replaced = self.definitions.remove(alias);
        if replaced.is_some() {
            self.order.retain(|n| n != alias);
        }
        self.aliases.insert(alias.to_string(), name.to_string());
        Ok(replaced)
    }

    fn resolves_through(&self, name: &str, alias: &str) -> bool {
        let mut current = name;
        for _ in 0..MAX_ALIAS_HOPS {
            match self.aliases.get(current) {
                Some(next) if next == alias => return true,
                Some(next) => current = next,
                None => return false,
            }
        }
        true
    }

    pub(crate) fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    /// Follows aliases to the registered name.
    pub(crate) fn canonical_name<'a>(&'a self, name: &'a str) -> &'a str {
        let mut current = name;
        for _ in 0..MAX_ALIAS_HOPS {
            match self.aliases.get(current) {
                Some(next) => current = next,
                None => break,
            }
        }
        current
    }

    /// Every alias that resolves to `name`, sorted.
    pub(crate) fn aliases_of(&self, name: &str) -> Vec<String> {
        let mut aliases: Vec<String> = self
            .aliases
            .keys()
            .filter(|alias| self.canonical_name(alias) == name)
            .cloned()
            .collect();
        aliases.sort();
        aliases
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct A;

    fn def() -> BeanDefinition {
        BeanDefinition::builder::<A>().default_constructor().build()
    }

    #[test]
    fn keeps_insertion_order_across_overrides() {
        let mut registry = DefinitionRegistry::new(true);
        registry.register("b", def()).unwrap();
        registry.register("a", def()).unwrap();
        assert!(matches!(registry.register("b", def()).unwrap(), Registered::Replaced(_)));
        assert_eq!(registry.names(), ["b".to_string(), "a".to_string()]);
        registry.remove("b").unwrap();
        assert_eq!(registry.names(), ["a".to_string()]);
    }

    #[test]
    fn overriding_disabled_rejects_duplicates() {
        let mut registry = DefinitionRegistry::new(false);
        registry.register("a", def()).unwrap();
        assert!(matches!(registry.register("a", def()), Err(BeanError::DefinitionOverride { .. })));
        registry.register("b", def()).unwrap();
        assert!(registry.register_alias("a", "b").is_err());
        assert!(matches!(registry.register("", def()), Err(BeanError::InvalidDefinition { .. })));
    }

    #[test]
    fn aliases_resolve_transitively_and_reject_cycles() {
        let mut registry = DefinitionRegistry::new(true);
        registry.register("store", def()).unwrap();
        registry.register_alias("store", "db").unwrap();
        registry.register_alias("db", "primaryDb").unwrap();
        assert_eq!(registry.canonical_name("primaryDb"), "store");
        assert_eq!(registry.aliases_of("store"), ["db".to_string(), "primaryDb".to_string()]);
        assert!(registry.register_alias("primaryDb", "store").is_err());

        registry.remove("store").unwrap();
        assert!(!registry.is_alias("db"));
    }

    #[test]
    fn alias_takes_over_a_definition_name_when_overriding() {
        let mut registry = DefinitionRegistry::new(true);
        registry.register("a", def()).unwrap();
        registry.register("b", def()).unwrap();
        assert!(registry.register_alias("a", "b").unwrap().is_some());
        assert_eq!(registry.names(), ["a".to_string()]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.canonical_name("b"), "a");
        assert!(registry.register_alias("a", "b").unwrap().is_none());
    }

    #[test]
    fn frozen_scope_after_initialization() {
        let mut registry = DefinitionRegistry::new(true);
        registry.register("a", def()).unwrap();
        registry.get("a").unwrap().mark_initialized();
        assert!(registry.update("a", |d| d.set_primary(true)).is_ok());
        let err = registry.update("a", |d| d.set_scope(crate::scope::BeanScope::Prototype));
        assert!(matches!(err, Err(BeanError::IllegalState(_))));
    }
}
