//! Type matching over definitions and registered singletons.

use super::{Container, FACTORY_BEAN_PREFIX};
use crate::definition::BeanDefinition;
use crate::error::BeanResult;
use crate::handle::instance_type_id;
use crate::key::TypeKey;
use crate::resolver::{Candidate, DependencyDescriptor};

impl Container {
    /// Candidates for `descriptor` here and in the ancestors, minus the
    /// requesting bean unless it is the only match.
    pub(crate) fn collect_candidates(&self, descriptor: &DependencyDescriptor) -> BeanResult<Vec<Candidate>> {
        let mut candidates = self.local_candidates(descriptor)?;
        if let Some(parent) = self.parent() {
            for mut inherited in parent.collect_candidates(descriptor)? {
                if self.contains_local_name(&inherited.name) {
                    continue;
                }
                inherited.local = false;
                candidates.push(inherited);
            }
        }
        if let Some(requester) = descriptor.requesting_bean() {
            if candidates.iter().any(|c| c.name != requester) {
                candidates.retain(|c| c.name != requester);
            }
        }
        Ok(candidates)
    }

    pub(crate) fn local_candidates(&self, descriptor: &DependencyDescriptor) -> BeanResult<Vec<Candidate>> {
        let names = self.names_for_key(
            descriptor.required_type(),
            descriptor.includes_non_singletons(),
            descriptor.allows_eager_init(),
        );
        let mut candidates = Vec::with_capacity(names.len());
        for name in names {
            let mut candidate = Candidate::new(name.as_str());
            if let Some(definition) = self.local_definition_for_scan(&name) {
                if !definition.is_autowire_candidate() {
                    continue;
                }
                candidate.primary = definition.is_primary();
                candidate.priority = definition.priority();
                candidate.qualifiers = definition.qualifiers().to_vec();
            }
            candidate.aliases = self.inner().registry.read().aliases_of(&name);
            candidates.push(candidate);
        }
        Ok(candidates)
    }

    /// Local names whose bean can be viewed as `key`, definitions first in
    /// registration order, then manually registered singletons.
    pub(crate) fn names_for_key(&self, key: TypeKey, include_non_singletons: bool, allow_eager_init: bool) -> Vec<String> {
        let definition_names = self.definition_names();
        let mut names = Vec::new();
        for name in &definition_names {
            let Some(definition) = self.local_definition_for_scan(name) else {
                continue;
            };
            if definition.is_abstract() || (!include_non_singletons && !definition.is_singleton()) {
                continue;
            }
            if self.definition_matches(name, &definition, key, allow_eager_init) {
                names.push(name.clone());
            }
        }

        for name in self.inner().singletons.names() {
            if self.inner().registry.read().contains(&name) {
                continue;
            }
            let Some(handle) = self.inner().singletons.get_ready(&name) else {
                continue;
            };
            let matches = handle
                .object()
                .is_some_and(|object| instance_type_id(&object) == key.id() || handle.views().iter().any(|v| v.key() == key));
            if matches {
                names.push(name);
            }
        }
        names
    }

    fn definition_matches(&self, name: &str, definition: &BeanDefinition, key: TypeKey, allow_eager_init: bool) -> bool {
        if !definition.is_factory_bean() {
            return definition.is_assignable_to(key);
        }
        self.product_type(name, definition, allow_eager_init) == Some(key)
    }

    /// Product type of a factory bean: declared on the definition, else asked
    /// from the factory, which may mean creating it first.
    pub(crate) fn product_type(&self, name: &str, definition: &BeanDefinition, allow_eager_init: bool) -> Option<TypeKey> {
        if let Some(declared) = definition.product_type() {
            return Some(declared);
        }
        let factory = match self.inner().singletons.get_ready(name) {
            Some(handle) => handle.object(),
            None if allow_eager_init && definition.is_singleton() && !self.is_currently_in_creation(name) => {
                match self.get_handle(&format!("{}{}", FACTORY_BEAN_PREFIX, name)) {
                    Ok(handle) => handle.object(),
                    Err(err) => {
                        tracing::debug!(bean = name, error = %err, "factory bean could not be created for type matching");
                        None
                    }
                }
            }
            None => None,
        }?;
        definition.capabilities.factory(&factory)?.object_type()
    }

    fn local_definition_for_scan(&self, name: &str) -> Option<std::sync::Arc<BeanDefinition>> {
        match self.merged_definition(name) {
            Ok(definition) => Some(definition),
            Err(err) => {
                tracing::trace!(bean = name, error = %err, "skipping unresolvable definition during type scan");
                None
            }
        }
    }

    fn contains_local_name(&self, name: &str) -> bool {
        let canonical = self.canonical_name(name);
        self.inner().registry.read().contains(&canonical) || self.inner().singletons.contains(&canonical)
    }
}
