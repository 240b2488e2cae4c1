//! Record types and their field capability tables.
//!
//! Each [`Record`] type describes its fields once through [`Record::fields`]. The
//! resulting [`FieldSet`] is cached per type and drives every by-name access the
//! engine needs: row mapping, write-column values, key extraction and change detection.
//!
//! ```ignore
//! #[derive(Debug, Clone, Default)]
//! struct Customer {
//!     id: i64,
//!     name: String,
//!     company: Option<Company>,
//!     orders: Option<Vec<Order>>,
//! }
//!
//! impl Record for Customer {
//!     const TYPE_NAME: &'static str = "Customer";
//!
//!     fn fields(f: &mut FieldSet<Self>) {
//!         f.field("Id", |c| &c.id, |c| &mut c.id)
//!             .field("Name", |c| &c.name, |c| &mut c.name)
//!             .nested("Company", |c| &c.company, |c| &mut c.company)
//!             .collection("Orders", |c| &c.orders, |c| &mut c.orders);
//!     }
//!
//!     fn key(&self) -> Value {
//!         self.id.into()
//!     }
//! }
//! ```

use crate::error::{OrmError, OrmResult};
use crate::schema::SchemaMap;
use crate::value::{FieldValue, Value};
use chrono::{DateTime, Utc};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// A mapped entity type.
pub trait Record: Default + Clone + Send + Sync + 'static {
    /// Name used by naming conventions (`<TypeName>Id`, default table and relation names).
    const TYPE_NAME: &'static str;

    /// Register field accessors.
    fn fields(fields: &mut FieldSet<Self>);

    /// Primary key value. Composite-key types return the value that decides [`is_new`](Record::is_new).
    fn key(&self) -> Value;

    /// Whether this record has never been persisted.
    fn is_new(&self) -> bool {
        self.key().is_unset_key()
    }

    /// Default schema map for the type, used when the catalog has no explicit registration.
    fn configure(map: SchemaMap<Self>) -> SchemaMap<Self> {
        map
    }

    fn is_deleted(&self) -> bool {
        false
    }

    /// Exists only through historical references.
    fn is_ghost(&self) -> bool {
        false
    }

    fn last_change(&self) -> Option<DateTime<Utc>> {
        None
    }
}

trait ScalarAccess<T>: Send + Sync {
    fn get(&self, record: &T) -> Value;
    fn set(&self, record: &mut T, value: Value) -> Result<(), String>;
    fn writable(&self) -> bool;
}

struct Stored<T, F> {
    get: fn(&T) -> &F,
    get_mut: fn(&mut T) -> &mut F,
}

impl<T, F: FieldValue> ScalarAccess<T> for Stored<T, F> {
    fn get(&self, record: &T) -> Value {
        (self.get)(record).to_value()
    }

    fn set(&self, record: &mut T, value: Value) -> Result<(), String> {
        *(self.get_mut)(record) = F::from_value(value)?;
        Ok(())
    }

    fn writable(&self) -> bool {
        true
    }
}

struct Computed<T> {
    get: fn(&T) -> Value,
}

impl<T> ScalarAccess<T> for Computed<T> {
    fn get(&self, record: &T) -> Value {
        (self.get)(record)
    }

    fn set(&self, _record: &mut T, _value: Value) -> Result<(), String> {
        Err("field is computed".to_string())
    }

    fn writable(&self) -> bool {
        false
    }
}

trait NestedAccess<T>: Send + Sync {
    fn get<'a>(&self, record: &'a T) -> Option<&'a dyn DynRecord>;
    fn get_or_create<'a>(&self, record: &'a mut T) -> &'a mut dyn DynRecord;
    fn clear(&self, record: &mut T);
    fn child_has_field(&self, name: &str) -> bool;
}

struct NestedOption<T, C> {
    get: fn(&T) -> &Option<C>,
    get_mut: fn(&mut T) -> &mut Option<C>,
}

impl<T, C: Record> NestedAccess<T> for NestedOption<T, C> {
    fn get<'a>(&self, record: &'a T) -> Option<&'a dyn DynRecord> {
        (self.get)(record).as_ref().map(|c| c as &dyn DynRecord)
    }

    fn get_or_create<'a>(&self, record: &'a mut T) -> &'a mut dyn DynRecord {
        (self.get_mut)(record).get_or_insert_with(C::default)
    }

    fn clear(&self, record: &mut T) {
        *(self.get_mut)(record) = None;
    }

    fn child_has_field(&self, name: &str) -> bool {
        field_set::<C>().contains(name)
    }
}

struct NestedBoxed<T, C> {
    get: fn(&T) -> &Option<Box<C>>,
    get_mut: fn(&mut T) -> &mut Option<Box<C>>,
}

impl<T, C: Record> NestedAccess<T> for NestedBoxed<T, C> {
    fn get<'a>(&self, record: &'a T) -> Option<&'a dyn DynRecord> {
        (self.get)(record).as_deref().map(|c| c as &dyn DynRecord)
    }

    fn get_or_create<'a>(&self, record: &'a mut T) -> &'a mut dyn DynRecord {
        &mut **(self.get_mut)(record).get_or_insert_with(Default::default)
    }

    fn clear(&self, record: &mut T) {
        *(self.get_mut)(record) = None;
    }

    fn child_has_field(&self, name: &str) -> bool {
        field_set::<C>().contains(name)
    }
}

/// Typed accessor pair for a collection-valued field.
///
/// `None` means the instance does not carry the collection at all (a partial object),
/// which is different from an empty collection.
pub struct CollectionField<P, C> {
    pub(crate) get: fn(&P) -> &Option<Vec<C>>,
    pub(crate) get_mut: fn(&mut P) -> &mut Option<Vec<C>>,
}

impl<P, C> Clone for CollectionField<P, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P, C> Copy for CollectionField<P, C> {}

struct CollectionEntry {
    child_type: TypeId,
    child_name: &'static str,
    access: Box<dyn Any + Send + Sync>,
}

enum FieldKind<T> {
    Scalar(Box<dyn ScalarAccess<T>>),
    Nested(Box<dyn NestedAccess<T>>),
    Collection(CollectionEntry),
}

/// Per-type table of named field accessors.
pub struct FieldSet<T> {
    entries: Vec<(String, FieldKind<T>)>,
    index: HashMap<String, usize>,
}

impl<T: Record> Default for FieldSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> FieldSet<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn insert(&mut self, name: &str, kind: FieldKind<T>) -> &mut Self {
        match self.index.get(name) {
            Some(&i) => self.entries[i].1 = kind,
            None => {
                self.index.insert(name.to_string(), self.entries.len());
                self.entries.push((name.to_string(), kind));
            }
        }
        self
    }

    /// A stored scalar field.
    pub fn field<F>(&mut self, name: &str, get: fn(&T) -> &F, get_mut: fn(&mut T) -> &mut F) -> &mut Self
    where
        F: FieldValue + 'static,
    {
        self.insert(name, FieldKind::Scalar(Box::new(Stored { get, get_mut })))
    }

    /// A read-only value derived from the record.
    pub fn computed(&mut self, name: &str, get: fn(&T) -> Value) -> &mut Self {
        self.insert(name, FieldKind::Scalar(Box::new(Computed { get })))
    }

    /// A nested record, created with `Default` when a mapped path needs it.
    pub fn nested<C: Record>(
        &mut self,
        name: &str,
        get: fn(&T) -> &Option<C>,
        get_mut: fn(&mut T) -> &mut Option<C>,
    ) -> &mut Self {
        self.insert(name, FieldKind::Nested(Box::new(NestedOption { get, get_mut })))
    }

    /// A boxed nested record, for self-referencing types.
    pub fn nested_boxed<C: Record>(
        &mut self,
        name: &str,
        get: fn(&T) -> &Option<Box<C>>,
        get_mut: fn(&mut T) -> &mut Option<Box<C>>,
    ) -> &mut Self {
        self.insert(name, FieldKind::Nested(Box::new(NestedBoxed { get, get_mut })))
    }

    /// A child collection used by relations.
    pub fn collection<C: Record>(
        &mut self,
        name: &str,
        get: fn(&T) -> &Option<Vec<C>>,
        get_mut: fn(&mut T) -> &mut Option<Vec<C>>,
    ) -> &mut Self {
        let entry = CollectionEntry {
            child_type: TypeId::of::<C>(),
            child_name: C::TYPE_NAME,
            access: Box::new(CollectionField::<T, C> { get, get_mut }),
        };
        self.insert(name, FieldKind::Collection(entry))
    }

    fn kind(&self, name: &str) -> Option<&FieldKind<T>> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Field names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn is_scalar(&self, name: &str) -> bool {
        matches!(self.kind(name), Some(FieldKind::Scalar(_)))
    }

    pub fn is_nested(&self, name: &str) -> bool {
        matches!(self.kind(name), Some(FieldKind::Nested(_)))
    }

    pub fn is_writable(&self, name: &str) -> bool {
        matches!(self.kind(name), Some(FieldKind::Scalar(s)) if s.writable())
    }

    /// Whether `name` is a nested record exposing `child_field`.
    pub fn nested_has_field(&self, name: &str, child_field: &str) -> bool {
        match self.kind(name) {
            Some(FieldKind::Nested(n)) => n.child_has_field(child_field),
            _ => false,
        }
    }

    /// Typed accessor for a collection of `C`, if `name` is one.
    pub fn collection_field<C: Record>(&self, name: &str) -> OrmResult<CollectionField<T, C>> {
        match self.kind(name) {
            Some(FieldKind::Collection(entry)) => {
                if entry.child_type != TypeId::of::<C>() {
                    return Err(OrmError::relation(
                        name,
                        format!(
                            "{}.{name} holds {} records, not {}",
                            T::TYPE_NAME,
                            entry.child_name,
                            C::TYPE_NAME
                        ),
                    ));
                }
                entry
                    .access
                    .downcast_ref::<CollectionField<T, C>>()
                    .copied()
                    .ok_or_else(|| OrmError::relation(name, "collection accessor type mismatch"))
            }
            Some(_) => Err(OrmError::relation(
                name,
                format!("{}.{name} is not a collection", T::TYPE_NAME),
            )),
            None => Err(OrmError::relation(
                name,
                format!("{} has no field {name}", T::TYPE_NAME),
            )),
        }
    }

    /// Scalar value of a flat field.
    pub fn get(&self, record: &T, name: &str) -> Option<Value> {
        match self.kind(name)? {
            FieldKind::Scalar(s) => Some(s.get(record)),
            _ => None,
        }
    }

    /// Whether any scalar field, or the key of any nested record, differs.
    ///
    /// Collections are not compared.
    pub fn differs(&self, a: &T, b: &T) -> bool {
        self.entries.iter().any(|(_, kind)| match kind {
            FieldKind::Scalar(s) => s.get(a) != s.get(b),
            FieldKind::Nested(n) => {
                n.get(a).map(|c| c.record_key()) != n.get(b).map(|c| c.record_key())
            }
            FieldKind::Collection(_) => false,
        })
    }
}

type FieldSetCache = RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>;

static FIELD_SETS: OnceLock<FieldSetCache> = OnceLock::new();

/// The cached field set of `T`, built on first use.
///
/// Two callers racing on the first use both build the table; the first insert wins
/// and both get the same instance.
pub fn field_set<T: Record>() -> Arc<FieldSet<T>> {
    let id = TypeId::of::<T>();
    let cache = FIELD_SETS.get_or_init(Default::default);

    let cached = cache
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&id)
        .cloned();
    if let Some(found) = cached {
        if let Ok(set) = found.downcast::<FieldSet<T>>() {
            return set;
        }
    }

    let mut built = FieldSet::new();
    T::fields(&mut built);
    let built = Arc::new(built);

    let stored = cache
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(id)
        .or_insert_with(|| built.clone() as Arc<dyn Any + Send + Sync>)
        .clone();
    stored.downcast::<FieldSet<T>>().unwrap_or(built)
}

/// Result of writing a dotted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathWrite {
    Set,
    /// The named segment is not a writable field (leaf) or nested record (intermediate).
    Missing { segment: String },
}

/// Object-safe view of any [`Record`].
pub trait DynRecord: Send + Sync {
    fn record_type(&self) -> &'static str;
    fn record_key(&self) -> Value;
    fn record_is_new(&self) -> bool;
    fn record_last_change(&self) -> Option<DateTime<Utc>>;
    fn has_field(&self, name: &str) -> bool;

    /// Value at a flat or dotted path. `None` if the path does not resolve or
    /// crosses an unset nested record.
    fn field_value(&self, path: &str) -> Option<Value>;

    /// Set a flat writable field. `Ok(false)` if there is none with that name.
    fn set_field(&mut self, name: &str, value: Value) -> OrmResult<bool>;

    /// Nested record by name, created if unset.
    fn nested_mut(&mut self, name: &str) -> Option<&mut dyn DynRecord>;

    /// Set a flat or dotted path, creating intermediate nested records.
    ///
    /// Records created on the way are removed again unless the value was set.
    fn set_path(&mut self, path: &str, value: Value) -> OrmResult<PathWrite>;

    fn as_any(&self) -> &dyn Any;
}

impl<T: Record> DynRecord for T {
    fn record_type(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn record_key(&self) -> Value {
        self.key()
    }

    fn record_is_new(&self) -> bool {
        self.is_new()
    }

    fn record_last_change(&self) -> Option<DateTime<Utc>> {
        self.last_change()
    }

    fn has_field(&self, name: &str) -> bool {
        field_set::<T>().contains(name)
    }

    fn field_value(&self, path: &str) -> Option<Value> {
        let fields = field_set::<T>();
        match path.split_once('.') {
            Some((head, rest)) => match fields.kind(head)? {
                FieldKind::Nested(n) => n.get(self)?.field_value(rest),
                _ => None,
            },
            None => fields.get(self, path),
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> OrmResult<bool> {
        let fields = field_set::<T>();
        match fields.kind(name) {
            Some(FieldKind::Scalar(s)) if s.writable() => {
                s.set(self, value)
                    .map_err(|message| OrmError::decode(name, message))?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn nested_mut(&mut self, name: &str) -> Option<&mut dyn DynRecord> {
        let fields = field_set::<T>();
        match fields.kind(name)? {
            FieldKind::Nested(n) => Some(n.get_or_create(self)),
            _ => None,
        }
    }

    fn set_path(&mut self, path: &str, value: Value) -> OrmResult<PathWrite> {
        match path.split_once('.') {
            Some((head, rest)) => {
                let fields = field_set::<T>();
                let Some(FieldKind::Nested(n)) = fields.kind(head) else {
                    return Ok(PathWrite::Missing {
                        segment: head.to_string(),
                    });
                };
                let created = n.get(self).is_none();
                let written = n.get_or_create(self).set_path(rest, value);
                if created && !matches!(written, Ok(PathWrite::Set)) {
                    n.clear(self);
                }
                written
            }
            None => {
                if self.set_field(path, value)? {
                    Ok(PathWrite::Set)
                } else {
                    Ok(PathWrite::Missing {
                        segment: path.to_string(),
                    })
                }
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Value of `field`, falling back to `<X>.Id` for an `<X>Id` name with no flat field.
pub fn resolve_value(record: &dyn DynRecord, field: &str) -> Option<Value> {
    if let Some(v) = record.field_value(field) {
        return Some(v);
    }
    let prefix = field.strip_suffix("Id").filter(|p| !p.is_empty())?;
    record.field_value(&format!("{prefix}.Id"))
}

/// Identity equality: the same instance, or two persisted records with equal keys.
pub fn same_identity<T: Record>(keys: &[String], a: &T, b: &T) -> bool {
    if std::ptr::eq(a, b) {
        return true;
    }
    if a.is_new() || b.is_new() {
        return false;
    }
    keys.iter()
        .all(|k| resolve_value(a, k) == resolve_value(b, k))
}
