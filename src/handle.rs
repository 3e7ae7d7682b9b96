//! Two-phase bean handles.
//!
//! A [`BeanHandle`] is what the container hands out for references between
//! beans. While a singleton is still being populated its handle may be exposed
//! *early*, pointing at the raw (not yet initialized) object; once creation
//! finishes the same handle is completed with the final object, so every holder
//! transparently observes the finished bean without any runtime proxy.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::definition::TypeView;
use crate::error::{BeanError, BeanResult};
use crate::key::TypeKey;

/// Type-erased shared bean instance.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Shared, immutable list of type views declared by a definition.
pub type TypeViews = Arc<[TypeView]>;

enum Slot {
    Early(AnyArc),
    Ready(AnyArc),
    Failed,
}

struct HandleInner {
    name: String,
    views: TypeViews,
    slot: RwLock<Slot>,
}

/// Lazily dereferenced indirection cell for a bean.
///
/// Cloning a handle is cheap and all clones share the same cell.
///
/// # Examples
///
/// ```rust
/// use ferrous_beans::{BeanDefinition, Container};
///
/// #[derive(Default)]
/// struct Clock;
///
/// let container = Container::new();
/// container.register_definition("clock", BeanDefinition::builder::<Clock>().default_constructor().build()).unwrap();
///
/// let handle = container.get_handle("clock").unwrap();
/// assert!(handle.is_ready());
/// assert!(handle.get::<Clock>().is_some());
/// ```
#[derive(Clone)]
pub struct BeanHandle {
    inner: Arc<HandleInner>,
}

impl BeanHandle {
    pub(crate) fn ready(name: impl Into<String>, object: AnyArc, views: TypeViews) -> Self {
        Self::with_slot(name.into(), Slot::Ready(object), views)
    }

    pub(crate) fn early(name: impl Into<String>, object: AnyArc, views: TypeViews) -> Self {
        Self::with_slot(name.into(), Slot::Early(object), views)
    }

    fn with_slot(name: String, slot: Slot, views: TypeViews) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                name,
                views,
                slot: RwLock::new(slot),
            }),
        }
    }

    /// Fills the cell with the finished object.
    pub(crate) fn complete(&self, object: AnyArc) {
        *self.inner.slot.write() = Slot::Ready(object);
    }

    /// Marks the cell as belonging to a creation attempt that failed.
    pub(crate) fn fail(&self) {
        *self.inner.slot.write() = Slot::Failed;
    }

    /// Name of the bean this handle refers to.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// `true` once the bean is fully created and initialized.
    pub fn is_ready(&self) -> bool {
        matches!(*self.inner.slot.read(), Slot::Ready(_))
    }

    /// `true` while the handle still points at the raw, early-exposed object.
    pub fn is_early(&self) -> bool {
        matches!(*self.inner.slot.read(), Slot::Early(_))
    }

    /// `true` if the creation this handle was exposed for failed.
    pub fn is_failed(&self) -> bool {
        matches!(*self.inner.slot.read(), Slot::Failed)
    }

    /// Current object: the final one when ready, the raw one while early.
    pub fn object(&self) -> Option<AnyArc> {
        match &*self.inner.slot.read() {
            Slot::Ready(obj) | Slot::Early(obj) => Some(obj.clone()),
            Slot::Failed => None,
        }
    }

    /// Current object viewed as the concrete type `T`.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let object = self.object()?;
        downcast_or_view::<T>(&object, &self.inner.views)
    }

    /// Current object viewed as `I`, usually a `dyn Trait` declared with
    /// [`DefinitionBuilder::exposes`](crate::DefinitionBuilder::exposes).
    pub fn get_as<I: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<I>> {
        let object = self.object()?;
        view_as::<I>(&object, &self.inner.views)
    }

    /// Like [`get`](Self::get) but reports why the object is unavailable.
    pub fn require<T: Any + Send + Sync>(&self) -> BeanResult<Arc<T>> {
        let object = self.object().ok_or_else(|| {
            BeanError::IllegalState(format!("bean '{}' failed during creation", self.name()))
        })?;
        downcast_or_view::<T>(&object, &self.inner.views).ok_or_else(|| BeanError::TypeMismatch {
            name: self.name().to_string(),
            expected: std::any::type_name::<T>(),
            actual: instance_type_name(&object),
        })
    }

    /// Like [`get_as`](Self::get_as) but reports why the view is unavailable.
    pub fn require_as<I: ?Sized + Send + Sync + 'static>(&self) -> BeanResult<Arc<I>> {
        let object = self.object().ok_or_else(|| {
            BeanError::IllegalState(format!("bean '{}' failed during creation", self.name()))
        })?;
        view_as::<I>(&object, &self.inner.views).ok_or_else(|| BeanError::TypeMismatch {
            name: self.name().to_string(),
            expected: std::any::type_name::<I>(),
            actual: instance_type_name(&object),
        })
    }

    pub(crate) fn views(&self) -> &TypeViews {
        &self.inner.views
    }

    /// `true` if both handles share the same cell.
    pub fn ptr_eq(&self, other: &BeanHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for BeanHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.inner.slot.read() {
            Slot::Early(_) => "early",
            Slot::Ready(_) => "ready",
            Slot::Failed => "failed",
        };
        f.debug_struct("BeanHandle")
            .field("name", &self.inner.name)
            .field("state", &state)
            .finish()
    }
}

/// Concrete downcast, falling back to a declared view of `T` (or a stored `Arc<T>`).
pub(crate) fn downcast_or_view<T: Any + Send + Sync>(object: &AnyArc, views: &[TypeView]) -> Option<Arc<T>> {
    match object.clone().downcast::<T>() {
        Ok(typed) => Some(typed),
        Err(_) => view_as::<T>(object, views),
    }
}

/// Views `object` as `I`: either the object already *is* a stored `Arc<I>`, or
/// one of the declared views for `I` can cast it.
pub(crate) fn view_as<I: ?Sized + Send + Sync + 'static>(object: &AnyArc, views: &[TypeView]) -> Option<Arc<I>> {
    if let Some(stored) = object.downcast_ref::<Arc<I>>() {
        return Some(stored.clone());
    }
    let key = TypeKey::of::<I>();
    views
        .iter()
        .filter(|view| view.key() == key)
        .find_map(|view| view.cast(object))
        .and_then(|cast| cast.downcast_ref::<Arc<I>>().cloned())
}

/// Dynamic type of an instance, for diagnostics.
pub(crate) fn instance_type_name(object: &AnyArc) -> String {
    format!("{:?}", Any::type_id(&**object))
}

/// `TypeId` of the dynamic type behind an `AnyArc`.
pub(crate) fn instance_type_id(object: &AnyArc) -> std::any::TypeId {
    Any::type_id(&**object)
}
