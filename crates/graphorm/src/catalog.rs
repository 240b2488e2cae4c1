//! Per-type registry of schema maps and row mappers.
//!
//! Maps are built once per type, either from an explicit [`Catalog::register`] call
//! or lazily from [`Record::configure`], and are immutable afterwards. Row mappers
//! are cached alongside, one per type, so column plans are never shared between
//! types.

use crate::config::MapperConfig;
use crate::error::{OrmError, OrmResult};
use crate::mapper::RowMapper;
use crate::record::Record;
use crate::schema::SchemaMap;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

type Registry = RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>;

pub struct Catalog {
    config: MapperConfig,
    maps: Registry,
    mappers: Registry,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let maps = self.maps.read().unwrap_or_else(PoisonError::into_inner).len();
        f.debug_struct("Catalog")
            .field("config", &self.config)
            .field("maps", &maps)
            .finish()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(MapperConfig::default())
    }
}

fn lookup<V: Send + Sync + 'static>(registry: &Registry, id: TypeId) -> Option<Arc<V>> {
    let found = registry
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&id)
        .cloned()?;
    found.downcast::<V>().ok()
}

/// Store `value` unless another caller got there first; return whichever is stored.
fn store<V: Send + Sync + 'static>(registry: &Registry, id: TypeId, value: Arc<V>) -> Arc<V> {
    let stored = registry
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(id)
        .or_insert_with(|| value.clone() as Arc<dyn Any + Send + Sync>)
        .clone();
    stored.downcast::<V>().unwrap_or(value)
}

impl Catalog {
    pub fn new(config: MapperConfig) -> Self {
        Self {
            config,
            maps: RwLock::new(HashMap::new()),
            mappers: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Register the map for `T`. The builder starts from [`Record::configure`].
    ///
    /// Fails if the map is invalid or `T` already has a map (registered or built on
    /// first use).
    pub fn register<T, F>(&self, build: F) -> OrmResult<()>
    where
        T: Record,
        F: FnOnce(SchemaMap<T>) -> SchemaMap<T>,
    {
        let id = TypeId::of::<T>();
        let map = build(T::configure(SchemaMap::new())).finalize(&self.config)?;

        let mut maps = self.maps.write().unwrap_or_else(PoisonError::into_inner);
        if maps.contains_key(&id) {
            return Err(OrmError::schema(format!(
                "{} is already registered",
                T::TYPE_NAME
            )));
        }
        maps.insert(id, Arc::new(map));
        tracing::debug!(target: "graphorm.catalog", type_name = T::TYPE_NAME, "schema map registered");
        Ok(())
    }

    /// Map for `T`, built from [`Record::configure`] on first use.
    pub fn schema_map<T: Record>(&self) -> OrmResult<Arc<SchemaMap<T>>> {
        let id = TypeId::of::<T>();
        if let Some(map) = lookup::<SchemaMap<T>>(&self.maps, id) {
            return Ok(map);
        }
        let built = Arc::new(T::configure(SchemaMap::new()).finalize(&self.config)?);
        Ok(store(&self.maps, id, built))
    }

    pub fn row_mapper<T: Record>(&self) -> Arc<RowMapper<T>> {
        let id = TypeId::of::<T>();
        if let Some(mapper) = lookup::<RowMapper<T>>(&self.mappers, id) {
            return mapper;
        }
        store(&self.mappers, id, Arc::new(RowMapper::new(&self.config)))
    }

    pub fn is_registered<T: Record>(&self) -> bool {
        self.maps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&TypeId::of::<T>())
    }
}
