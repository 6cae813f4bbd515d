use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::OnceLock;

use log::debug;
use parking_lot::RwLock;

use crate::model::{Activatable, Dated, FieldError, Id};

pub type VersionAccessor<T> = fn(&T) -> Option<i64>;
pub type FieldCopier<T> = fn(&mut T, &T);

/// A persistent entity the merge engine can work with.
pub trait Entity: Clone + Send + Sync + 'static {
    const ENTITY_NAME: &'static str;

    fn id(&self) -> Option<Id>;

    /// Declares the entity's fields. Called once per type, on first use.
    fn describe_fields(table: FieldTable<Self>) -> FieldTable<Self>;

    /// Structural validation; every violated rule yields one field error.
    fn validate(&self) -> Vec<FieldError>;
}

enum FieldKind<T> {
    Version(VersionAccessor<T>),
    Updatable(FieldCopier<T>),
    Fixed,
}

struct FieldDecl<T> {
    name: &'static str,
    kind: FieldKind<T>,
}

/// Declarative field table of an entity type.
pub struct FieldTable<T> {
    fields: Vec<FieldDecl<T>>,
}

impl<T> FieldTable<T> {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// The optimistic-lock version field.
    pub fn version(mut self, name: &'static str, accessor: VersionAccessor<T>) -> Self {
        self.fields.push(FieldDecl {
            name,
            kind: FieldKind::Version(accessor),
        });
        self
    }

    /// A field copied from the incoming entity on update.
    pub fn updatable(mut self, name: &'static str, copy: FieldCopier<T>) -> Self {
        self.fields.push(FieldDecl {
            name,
            kind: FieldKind::Updatable(copy),
        });
        self
    }

    /// A persistent field that updates never touch.
    pub fn fixed(mut self, name: &'static str) -> Self {
        self.fields.push(FieldDecl {
            name,
            kind: FieldKind::Fixed,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<T> Default for FieldTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Activatable> FieldTable<T> {
    /// Fields every activatable entity inherits.
    pub fn activatable(self) -> Self {
        self.updatable("active", |target: &mut T, source: &T| {
            target.set_active(source.active())
        })
    }
}

impl<T: Dated> FieldTable<T> {
    /// Fields every dated entity inherits, the activatable ones included.
    pub fn dated(self) -> Self {
        self.activatable()
            .updatable("effective-from", |target: &mut T, source: &T| {
                target.set_effective_from(source.effective_from())
            })
            .updatable("effective-to", |target: &mut T, source: &T| {
                target.set_effective_to(source.effective_to())
            })
    }
}

pub struct UpdatableField<T> {
    pub name: &'static str,
    copy: FieldCopier<T>,
}

impl<T> UpdatableField<T> {
    pub fn copy(&self, target: &mut T, source: &T) {
        (self.copy)(target, source)
    }
}

/// The partition of an entity's field table used by the merge engine.
pub struct EntityFields<T> {
    version: Option<VersionAccessor<T>>,
    updatable: Vec<UpdatableField<T>>,
}

impl<T> EntityFields<T> {
    /// Partitions a field table.
    ///
    /// # Panics
    /// When the table declares more than one version field.
    pub fn from_table(table: FieldTable<T>) -> Self {
        let mut version = None;
        let mut updatable = Vec::new();

        for field in table.fields {
            match field.kind {
                FieldKind::Version(accessor) => {
                    assert!(
                        version.is_none(),
                        "More than one version field declared (second: {})",
                        field.name
                    );
                    version = Some(accessor);
                }
                FieldKind::Updatable(copy) => updatable.push(UpdatableField {
                    name: field.name,
                    copy,
                }),
                FieldKind::Fixed => {}
            }
        }

        Self { version, updatable }
    }

    pub fn has_version(&self) -> bool {
        self.version.is_some()
    }

    /// The entity's version, or `None` when the type is not versioned.
    pub fn version_of(&self, entity: &T) -> Option<i64> {
        self.version.and_then(|accessor| accessor(entity))
    }

    pub fn updatable(&self) -> &[UpdatableField<T>] {
        &self.updatable
    }

    pub fn updatable_names(&self) -> Vec<&'static str> {
        self.updatable.iter().map(|f| f.name).collect()
    }

    /// Copies every updatable field from `source` into `target`.
    pub fn copy_updatable(&self, target: &mut T, source: &T) {
        for field in &self.updatable {
            field.copy(target, source);
        }
    }
}

type FieldCache = RwLock<HashMap<TypeId, &'static (dyn Any + Send + Sync)>>;

static FIELD_CACHE: OnceLock<FieldCache> = OnceLock::new();

/// The cached field partition of `T`, computed on first use and kept for the process lifetime.
pub fn fields_of<T: Entity>() -> &'static EntityFields<T> {
    let cache = FIELD_CACHE.get_or_init(Default::default);
    let key = TypeId::of::<T>();

    let cached = cache.read().get(&key).copied();
    if let Some(fields) = cached.and_then(|f| f.downcast_ref::<EntityFields<T>>()) {
        return fields;
    }

    let mut guard = cache.write();
    let entry: &'static (dyn Any + Send + Sync) = *guard.entry(key).or_insert_with(|| {
        let fields = EntityFields::<T>::from_table(T::describe_fields(FieldTable::new()));
        debug!(
            "Cached field table for {}: version={}, updatable={:?}",
            T::ENTITY_NAME,
            fields.has_version(),
            fields.updatable_names()
        );
        let leaked: &'static (dyn Any + Send + Sync) = Box::leak(Box::new(fields));
        leaked
    });
    entry
        .downcast_ref::<EntityFields<T>>()
        .unwrap_or_else(|| unreachable!("field cache is keyed by TypeId"))
}
