//! Per-type schema metadata.
//!
//! A [`SchemaMap`] says where a record type lives (schema, table, query views),
//! which fields form its key, which fields are never written, how results are
//! ordered by default and which child collections are synchronized on save.
//!
//! ```ignore
//! catalog.register::<Order>(|map| {
//!     map.table("sales", "Orders")
//!         .read_only(["Total"])
//!         .query_with_view()
//!         .by_default_order_by("Created")
//!         .descending()
//!         .with_many::<OrderLine>(ChildCollectionSpec::new("Lines").view("sales.OrderLines"))
//!         .with_many_to_many::<Tag>(ChildCollectionSpec::new("Tags"))
//! })?;
//! ```
//!
//! Builder misuse (a direction with no pending order key, a relation on a field that
//! is not a collection of the child type) is recorded and reported when the map is
//! registered, so a broken map never reaches a save.

use crate::config::MapperConfig;
use crate::error::{OrmError, OrmResult};
use crate::ident::Ident;
use crate::order::OrderSpec;
use crate::record::{Record, field_set, resolve_value};
use crate::relation::{ManyToMany, OneToMany, Relation};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Where a relation's rows are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadCommand {
    /// A table or view filtered on the master field.
    Source(String),
    /// A stored procedure taking the parent key as `@<ParentType>Id`.
    Procedure(String),
    /// A table-valued function taking the parent key.
    Function(String),
}

/// Description of a one-to-many or many-to-many child collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildCollectionSpec {
    /// Collection field on the parent.
    pub property: String,
    /// Write table (n:m link table). Defaults to `<schema>.<ParentType><Property>`.
    pub table: Option<String>,
    pub read: Option<ReadCommand>,
    /// Populated on read, never written.
    pub read_only: bool,
    /// Column holding the parent key. Defaults to `<ParentType>Id`.
    pub master_field: Option<String>,
    /// Link column holding the child key. Defaults to `<ChildType>Id`.
    pub child_field: Option<String>,
    /// Parent field providing the key. Defaults to the parent's first key field.
    pub master_property: Option<String>,
    /// Child field providing the key. Defaults to the child's first key field.
    pub child_property: Option<String>,
}

impl ChildCollectionSpec {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            table: None,
            read: None,
            read_only: false,
            master_field: None,
            child_field: None,
            master_property: None,
            child_property: None,
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Read rows from a table or view.
    pub fn view(mut self, view: impl Into<String>) -> Self {
        self.read = Some(ReadCommand::Source(view.into()));
        self
    }

    pub fn procedure(mut self, name: impl Into<String>) -> Self {
        self.read = Some(ReadCommand::Procedure(name.into()));
        self
    }

    pub fn function(mut self, name: impl Into<String>) -> Self {
        self.read = Some(ReadCommand::Function(name.into()));
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn master_field(mut self, field: impl Into<String>) -> Self {
        self.master_field = Some(field.into());
        self
    }

    pub fn child_field(mut self, field: impl Into<String>) -> Self {
        self.child_field = Some(field.into());
        self
    }

    pub fn master_property(mut self, property: impl Into<String>) -> Self {
        self.master_property = Some(property.into());
        self
    }

    pub fn child_property(mut self, property: impl Into<String>) -> Self {
        self.child_property = Some(property.into());
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn default_object(&self, parent_type: &str) -> String {
        format!("{parent_type}{}", self.property)
    }

    /// Write table, or `None` for a read-only relation.
    pub fn write_table(&self, schema: &str, parent_type: &str) -> OrmResult<Option<Ident>> {
        if self.read_only {
            return Ok(None);
        }
        let name = self
            .table
            .clone()
            .unwrap_or_else(|| self.default_object(parent_type));
        object_ident(schema, &name).map(Some)
    }

    /// Read command with its default resolved.
    pub fn read_command(&self, parent_type: &str) -> ReadCommand {
        self.read.clone().unwrap_or_else(|| {
            ReadCommand::Source(
                self.table
                    .clone()
                    .unwrap_or_else(|| self.default_object(parent_type)),
            )
        })
    }

    pub fn master_field_name(&self, parent_type: &str) -> String {
        self.master_field
            .clone()
            .unwrap_or_else(|| format!("{parent_type}Id"))
    }

    pub fn child_field_name(&self, child_type: &str) -> String {
        self.child_field
            .clone()
            .unwrap_or_else(|| format!("{child_type}Id"))
    }
}

/// Identifier of a table-like object: qualified names are parsed, bare names go in `schema`.
pub(crate) fn object_ident(schema: &str, name: &str) -> OrmResult<Ident> {
    if name.contains('.') || name.starts_with('"') || name.starts_with('[') {
        Ident::parse(name)
    } else {
        Ident::qualified(schema, name)
    }
}

/// Which query source a select reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Table or configured short view.
    Short,
    /// Extended view for full-object fetches.
    Full,
    /// `count(*)` over the short source.
    Count,
}

/// Metadata for one record type.
pub struct SchemaMap<T: Record> {
    schema: Option<String>,
    table: Option<String>,
    keys: Option<Vec<String>>,
    read_only: Vec<String>,
    auto_id: bool,
    use_view: bool,
    short_view: Option<String>,
    full_view: Option<String>,
    order: OrderSpec,
    references: Vec<(String, String)>,
    relations: Vec<Arc<dyn Relation<T>>>,
    setup_error: Option<OrmError>,
}

impl<T: Record> Default for SchemaMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> fmt::Debug for SchemaMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaMap")
            .field("type", &T::TYPE_NAME)
            .field("schema", &self.schema)
            .field("table", &self.table)
            .field("keys", &self.keys)
            .field("read_only", &self.read_only)
            .field("auto_id", &self.auto_id)
            .field("short_view", &self.short_view)
            .field("full_view", &self.full_view)
            .field("order", &self.order)
            .field(
                "relations",
                &self
                    .relations
                    .iter()
                    .map(|r| r.spec().property.as_str())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<T: Record> SchemaMap<T> {
    pub fn new() -> Self {
        Self {
            schema: None,
            table: None,
            keys: None,
            read_only: Vec::new(),
            auto_id: true,
            use_view: false,
            short_view: None,
            full_view: None,
            order: OrderSpec::new(),
            references: Vec::new(),
            relations: Vec::new(),
            setup_error: None,
        }
    }

    fn fail(&mut self, err: OrmError) {
        if self.setup_error.is_none() {
            self.setup_error = Some(err);
        }
    }

    pub fn table(mut self, schema: impl Into<String>, name: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self.table = Some(name.into());
        self
    }

    /// Table name in the default schema.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.table = Some(name.into());
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Key fields. Replaces the default `["Id"]`, which also drops `Id` from the read-only set.
    pub fn keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Single key field.
    pub fn id(self, field: impl Into<String>) -> Self {
        self.keys([field.into()])
    }

    pub fn read_only<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.read_only.extend(fields.into_iter().map(Into::into));
        self
    }

    /// The key is supplied by the caller, not generated by the database.
    pub fn include_id_in_insert(mut self) -> Self {
        self.auto_id = false;
        self
    }

    /// Query through `<Table>Query` for both short and full selects.
    pub fn query_with_view(mut self) -> Self {
        self.use_view = true;
        self
    }

    pub fn query_with_views(mut self, short: impl Into<String>, full: impl Into<String>) -> Self {
        self.use_view = true;
        self.short_view = Some(short.into());
        self.full_view = Some(full.into());
        self
    }

    pub fn by_default_order_by(mut self, field: impl Into<String>) -> Self {
        self.order.push(field);
        self
    }

    pub fn then_by(mut self, field: impl Into<String>) -> Self {
        self.order.push(field);
        self
    }

    pub fn ascending(mut self) -> Self {
        if let Err(e) = self.order.ascending() {
            self.fail(e);
        }
        self
    }

    pub fn descending(mut self) -> Self {
        if let Err(e) = self.order.descending() {
            self.fail(e);
        }
        self
    }

    /// n:1 reference: when writing `column`, take the value at `path` (e.g. `Company.Id`).
    pub fn has_reference(mut self, column: impl Into<String>, path: impl Into<String>) -> Self {
        self.references.push((column.into(), path.into()));
        self
    }

    fn has_relation(&self, property: &str) -> bool {
        self.relations.iter().any(|r| r.spec().property == property)
    }

    /// One-to-many collection of `C`.
    pub fn with_many<C: Record>(mut self, spec: ChildCollectionSpec) -> Self {
        if self.has_relation(&spec.property) {
            let err = OrmError::relation(&spec.property, "relation declared twice");
            self.fail(err);
            return self;
        }
        match field_set::<T>().collection_field::<C>(&spec.property) {
            Ok(access) => self.relations.push(Arc::new(OneToMany::new(spec, access))),
            Err(e) => self.fail(e),
        }
        self
    }

    /// Many-to-many collection of `C` through a link table.
    pub fn with_many_to_many<C: Record>(mut self, spec: ChildCollectionSpec) -> Self {
        if self.has_relation(&spec.property) {
            let err = OrmError::relation(&spec.property, "relation declared twice");
            self.fail(err);
            return self;
        }
        match field_set::<T>().collection_field::<C>(&spec.property) {
            Ok(access) => self.relations.push(Arc::new(ManyToMany::new(spec, access))),
            Err(e) => self.fail(e),
        }
        self
    }

    /// Resolve defaults against `config` and validate. Called once at registration.
    pub(crate) fn finalize(mut self, config: &MapperConfig) -> OrmResult<Self> {
        if let Some(err) = self.setup_error.take() {
            return Err(err);
        }

        if self.schema.is_none() {
            self.schema = Some(config.schema().to_string());
        }
        if self.table.is_none() {
            self.table = Some(config.naming.table_name(T::TYPE_NAME));
        }
        if self.keys.is_none() {
            self.keys = Some(vec!["Id".to_string()]);
            if !self.read_only.iter().any(|f| f == "Id") {
                self.read_only.push("Id".to_string());
            }
        }
        if self.use_view {
            let default_view = format!("{}Query", self.table_name_str());
            if self.short_view.is_none() {
                self.short_view = Some(default_view.clone());
            }
            if self.full_view.is_none() {
                self.full_view = Some(default_view);
            }
        }

        let fields = field_set::<T>();
        for key in self.key_fields() {
            let direct = fields.contains(key);
            let via_nested = key
                .strip_suffix("Id")
                .filter(|p| !p.is_empty())
                .is_some_and(|p| fields.nested_has_field(p, "Id"));
            if !direct && !via_nested {
                return Err(OrmError::schema(format!(
                    "{}: key field {key} is not a field",
                    T::TYPE_NAME
                )));
            }
        }
        if self.key_fields().is_empty() {
            return Err(OrmError::schema(format!("{}: no key fields", T::TYPE_NAME)));
        }
        for (column, path) in &self.references {
            let head = path.split('.').next().unwrap_or_default();
            if !fields.contains(head) {
                return Err(OrmError::schema(format!(
                    "{}: reference {column} points at unknown field {head}",
                    T::TYPE_NAME
                )));
            }
        }

        self.table_ident()?;
        self.source(Variant::Short)?;
        self.source(Variant::Full)?;
        for relation in &self.relations {
            relation.spec().write_table(self.schema_name(), T::TYPE_NAME)?;
        }

        Ok(self)
    }

    pub fn schema_name(&self) -> &str {
        self.schema.as_deref().unwrap_or_default()
    }

    fn table_name_str(&self) -> &str {
        self.table.as_deref().unwrap_or(T::TYPE_NAME)
    }

    pub fn table_name(&self) -> &str {
        self.table_name_str()
    }

    pub fn table_ident(&self) -> OrmResult<Ident> {
        object_ident(self.schema_name(), self.table_name_str())
    }

    /// Source object for a select variant.
    pub fn source(&self, variant: Variant) -> OrmResult<Ident> {
        let view = match variant {
            Variant::Short | Variant::Count => self.short_view.as_deref(),
            Variant::Full => self.full_view.as_deref().or(self.short_view.as_deref()),
        };
        match view {
            Some(view) => object_ident(self.schema_name(), view),
            None => self.table_ident(),
        }
    }

    pub fn key_fields(&self) -> &[String] {
        self.keys.as_deref().unwrap_or_default()
    }

    pub fn is_key(&self, field: &str) -> bool {
        self.key_fields().iter().any(|k| k == field)
    }

    pub fn is_read_only(&self, field: &str) -> bool {
        self.read_only.iter().any(|f| f == field)
    }

    /// Whether the key is generated by the database.
    pub fn auto_id(&self) -> bool {
        self.auto_id
    }

    /// Whether `column` is left out of inserts and updates.
    ///
    /// Read-only fields are skipped, except key fields of a map without a generated key.
    pub fn skips_on_write(&self, column: &str) -> bool {
        self.is_read_only(column) && !(self.is_key(column) && !self.auto_id)
    }

    pub fn default_order(&self) -> &OrderSpec {
        &self.order
    }

    pub fn reference(&self, column: &str) -> Option<&str> {
        self.references
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, p)| p.as_str())
    }

    pub fn relations(&self) -> &[Arc<dyn Relation<T>>] {
        &self.relations
    }

    /// Key values of `record` in key-field order. Unresolvable keys read as null.
    pub fn key_values(&self, record: &T) -> Vec<Value> {
        self.key_fields()
            .iter()
            .map(|k| resolve_value(record, k).unwrap_or(Value::Null))
            .collect()
    }
}
