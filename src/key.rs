//! Type keys used for type-based lookups.

use std::any::TypeId;
use std::fmt;

/// Key identifying a bean type or a trait view of a bean.
///
/// Keys compare and hash on the [`TypeId`] only; the type name is carried for
/// diagnostics and error messages.
///
/// # Examples
///
/// ```rust
/// use ferrous_beans::{TypeKey, key_of_type};
///
/// trait Repository: Send + Sync {}
///
/// let concrete = key_of_type::<String>();
/// let view = TypeKey::of::<dyn Repository>();
///
/// assert_eq!(concrete, TypeKey::of::<String>());
/// assert_ne!(concrete, view);
/// assert!(view.name().contains("Repository"));
/// ```
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key of `T` (sized types and `dyn Trait` alike).
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Builds a key from parts, e.g. from `Any::type_id` of an instance.
    pub fn from_parts(id: TypeId, name: &'static str) -> Self {
        Self { id, name }
    }

    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Full type name (`std::any::type_name`).
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the type name, without generic arguments.
    ///
    /// ```rust
    /// use ferrous_beans::TypeKey;
    ///
    /// assert_eq!(TypeKey::of::<std::collections::HashMap<u8, u8>>().short_name(), "HashMap");
    /// assert_eq!(TypeKey::of::<u32>().short_name(), "u32");
    /// ```
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        let base = base.trim_start_matches("dyn ");
        let base = base.split(" + ").next().unwrap_or(base);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl PartialEq for TypeKey {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl std::hash::Hash for TypeKey {
    #[inline(always)]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[inline(always)]
pub fn key_of_type<T: ?Sized + 'static>() -> TypeKey {
    TypeKey::of::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keys_hash_on_type_id() {
        let mut set = HashSet::new();
        set.insert(TypeKey::of::<u8>());
        set.insert(TypeKey::from_parts(TypeId::of::<u8>(), "renamed"));
        set.insert(TypeKey::of::<u16>());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn short_name_strips_paths_and_generics() {
        trait Greeter {}
        assert_eq!(TypeKey::of::<Vec<String>>().short_name(), "Vec");
        assert_eq!(TypeKey::of::<dyn Greeter>().short_name(), "Greeter");
    }
}
