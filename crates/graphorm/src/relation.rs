//! Child collection relations and their synchronization on save.
//!
//! A relation is declared on the parent's [`SchemaMap`] and validated against the
//! parent's field set at registration. On save, each relation compares the
//! collection held by the stored parent with the one being saved:
//!
//! - one-to-many: removed children are deleted, changed children updated, new ones
//!   inserted, each through the child's own save path;
//! - many-to-many: only link rows are touched, one insert or delete per membership
//!   change.
//!
//! A collection the parent does not carry (`None`) is never synchronized, so saving
//! a partially loaded parent cannot delete children.

use crate::dao::Dao;
use crate::diagnostics::Diagnostic;
use crate::error::OrmResult;
use crate::record::{CollectionField, DynRecord, PathWrite, Record, field_set, resolve_value, same_identity};
use crate::row::Row;
use crate::schema::{ChildCollectionSpec, SchemaMap};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    OneToMany,
    ManyToMany,
}

/// A typed relation from parent `P` to a child collection.
#[async_trait::async_trait]
pub trait Relation<P: Record>: Send + Sync {
    fn spec(&self) -> &ChildCollectionSpec;

    fn kind(&self) -> RelationKind;

    fn child_type(&self) -> &'static str;

    /// Read the children of `parent` and store them in its collection field.
    async fn load(&self, dao: &Dao<'_>, map: &SchemaMap<P>, parent: &mut P) -> OrmResult<()>;

    /// Bring the stored children in line with `new`'s collection.
    ///
    /// `old` is the stored parent with its relations loaded, or `None` when the
    /// parent was just inserted.
    async fn synchronize(
        &self,
        dao: &Dao<'_>,
        map: &SchemaMap<P>,
        old: Option<&P>,
        new: &mut P,
    ) -> OrmResult<()>;
}

/// Index-based comparison of two child lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationDiff {
    /// Indices into the old list with no counterpart in the new one.
    pub deletions: Vec<usize>,
    /// Indices into the new list with no counterpart in the old one.
    pub insertions: Vec<usize>,
    /// `(new, old)` pairs of the same child whose fields differ.
    pub updates: Vec<(usize, usize)>,
    /// `(new, old)` pairs of the same child with equal fields.
    pub unchanged: Vec<(usize, usize)>,
}

impl RelationDiff {
    /// Everything in a list of `len` children is an insertion.
    pub fn all_inserted(len: usize) -> Self {
        Self {
            insertions: (0..len).collect(),
            ..Self::default()
        }
    }
}

/// Match `new` against `old` by identity on `keys`.
///
/// Unsaved children never match anything. Each old child matches at most once.
pub fn diff<C: Record>(keys: &[String], old: &[C], new: &[C]) -> RelationDiff {
    let fields = field_set::<C>();
    let mut out = RelationDiff::default();
    let mut matched = vec![false; old.len()];

    for (ni, n) in new.iter().enumerate() {
        let found = old
            .iter()
            .enumerate()
            .find(|(oi, o)| !matched[*oi] && same_identity(keys, *o, n))
            .map(|(oi, _)| oi);
        match found {
            Some(oi) => {
                matched[oi] = true;
                if fields.differs(&old[oi], n) {
                    out.updates.push((ni, oi));
                } else {
                    out.unchanged.push((ni, oi));
                }
            }
            None => out.insertions.push(ni),
        }
    }

    out.deletions = matched
        .iter()
        .enumerate()
        .filter(|(_, m)| !**m)
        .map(|(i, _)| i)
        .collect();
    out
}

/// Parent key value used to address children, or a diagnostic when it is unset.
fn master_value<P: Record>(
    dao: &Dao<'_>,
    map: &SchemaMap<P>,
    spec: &ChildCollectionSpec,
    parent: &P,
) -> Option<Value> {
    let property = spec
        .master_property
        .as_deref()
        .or_else(|| map.key_fields().first().map(String::as_str))?;
    match resolve_value(parent, property) {
        Some(value) if !value.is_unset_key() => Some(value),
        _ => {
            dao.diagnose(Diagnostic::RelationSkipped {
                type_name: P::TYPE_NAME.to_string(),
                relation: spec.property.clone(),
                reason: format!("parent field {property} holds no key"),
            });
            None
        }
    }
}

/// Children rows of `parent` and the records mapped from them, or `None` when the
/// parent holds no key.
async fn read_children<P: Record, C: Record>(
    dao: &Dao<'_>,
    map: &SchemaMap<P>,
    spec: &ChildCollectionSpec,
    parent: &P,
) -> OrmResult<Option<(Vec<Row>, Vec<C>)>> {
    let Some(master) = master_value(dao, map, spec, parent) else {
        return Ok(None);
    };
    let statement = dao.compiler(map).relation_read(spec, master)?;
    let rows = dao.run_query(&statement).await?;
    let children = dao.map_all::<C>(&rows)?;
    Ok(Some((rows, children)))
}

/// One-to-many: children rows carry the parent key.
pub struct OneToMany<P, C> {
    spec: ChildCollectionSpec,
    access: CollectionField<P, C>,
}

impl<P: Record, C: Record> OneToMany<P, C> {
    pub fn new(spec: ChildCollectionSpec, access: CollectionField<P, C>) -> Self {
        Self { spec, access }
    }

    /// Point a child at its parent before the child is saved.
    fn attach(&self, child: &mut C, master_field: &str, master: &Value) -> OrmResult<()> {
        if child.set_field(master_field, master.clone())? {
            return Ok(());
        }
        let nested = master_field
            .strip_suffix("Id")
            .filter(|p| !p.is_empty())
            .map(|p| format!("{p}.Id"));
        if let Some(path) = nested {
            if let PathWrite::Missing { segment } = child.set_path(&path, master.clone())? {
                tracing::debug!(
                    target: "graphorm.relation",
                    child = C::TYPE_NAME,
                    field = master_field,
                    %segment,
                    "child has no field for the parent key"
                );
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<P: Record, C: Record> Relation<P> for OneToMany<P, C> {
    fn spec(&self) -> &ChildCollectionSpec {
        &self.spec
    }

    fn kind(&self) -> RelationKind {
        RelationKind::OneToMany
    }

    fn child_type(&self) -> &'static str {
        C::TYPE_NAME
    }

    async fn load(&self, dao: &Dao<'_>, map: &SchemaMap<P>, parent: &mut P) -> OrmResult<()> {
        if let Some((_, children)) = read_children::<P, C>(dao, map, &self.spec, parent).await? {
            *(self.access.get_mut)(parent) = Some(children);
        }
        Ok(())
    }

    async fn synchronize(
        &self,
        dao: &Dao<'_>,
        map: &SchemaMap<P>,
        old: Option<&P>,
        new: &mut P,
    ) -> OrmResult<()> {
        if self.spec.is_read_only() || (self.access.get)(new).is_none() {
            return Ok(());
        }
        let Some(master) = master_value(dao, map, &self.spec, new) else {
            return Ok(());
        };
        let child_map = dao.catalog().schema_map::<C>()?;
        let master_field = self.spec.master_field_name(P::TYPE_NAME);

        let Some(items) = (self.access.get_mut)(new).as_mut() else {
            return Ok(());
        };
        for child in items.iter_mut() {
            self.attach(child, &master_field, &master)?;
        }

        let old_items = old.and_then(|o| (self.access.get)(o).as_deref());
        let changes = match old_items {
            Some(old_items) => diff(child_map.key_fields(), old_items, items.as_slice()),
            None => RelationDiff::all_inserted(items.len()),
        };

        if let Some(old_items) = old_items {
            for &i in &changes.deletions {
                let child = &old_items[i];
                if child.is_new() {
                    continue;
                }
                dao.delete(child).await?;
            }
        }
        for &(i, _) in &changes.updates {
            dao.save(&mut items[i]).await?;
        }
        for &i in &changes.insertions {
            dao.save(&mut items[i]).await?;
        }

        tracing::debug!(
            target: "graphorm.relation",
            parent = P::TYPE_NAME,
            relation = %self.spec.property,
            deleted = changes.deletions.len(),
            updated = changes.updates.len(),
            inserted = changes.insertions.len(),
            "one-to-many synchronized"
        );
        Ok(())
    }
}

/// Many-to-many: membership lives in a link table.
///
/// Membership is compared on child key values. Rows read from the link table carry
/// the child key in the link's child column, which is copied onto the loaded
/// children whatever the mapper made of the row.
pub struct ManyToMany<P, C> {
    spec: ChildCollectionSpec,
    access: CollectionField<P, C>,
}

impl<P: Record, C: Record> ManyToMany<P, C> {
    pub fn new(spec: ChildCollectionSpec, access: CollectionField<P, C>) -> Self {
        Self { spec, access }
    }

    /// Child field holding the key stored in the link table.
    fn child_property(&self, child_map: &SchemaMap<C>) -> String {
        match &self.spec.child_property {
            Some(p) => p.clone(),
            None => child_map
                .key_fields()
                .first()
                .cloned()
                .unwrap_or_else(|| "Id".to_string()),
        }
    }

    fn child_key(&self, dao: &Dao<'_>, property: &str, child: &C) -> Option<Value> {
        match resolve_value(child, property) {
            Some(value) if !child.is_new() && !value.is_unset_key() => Some(value),
            _ => {
                dao.diagnose(Diagnostic::RelationSkipped {
                    type_name: C::TYPE_NAME.to_string(),
                    relation: self.spec.property.clone(),
                    reason: "linked record has not been saved".to_string(),
                });
                None
            }
        }
    }

    /// Copy each row's link column onto the child mapped from it.
    fn attach_link_keys(
        &self,
        property: &str,
        rows: &[Row],
        children: &mut [C],
    ) -> OrmResult<()> {
        let column = self.spec.child_field_name(C::TYPE_NAME);
        for (row, child) in rows.iter().zip(children.iter_mut()) {
            let Some(key) = row.get(&column).filter(|v| !v.is_null()) else {
                continue;
            };
            if let PathWrite::Missing { segment } = child.set_path(property, key.clone())? {
                tracing::debug!(
                    target: "graphorm.relation",
                    child = C::TYPE_NAME,
                    field = property,
                    %segment,
                    "child has no field for the link key"
                );
            }
        }
        Ok(())
    }
}

/// Link changes between two memberships given as child key values.
///
/// Returns indices of `old` keys to unlink and of `new` keys to link. Each old key
/// is consumed by at most one new key.
fn membership_changes(old: &[Value], new: &[Value]) -> (Vec<usize>, Vec<usize>) {
    let mut matched = vec![false; old.len()];
    let mut linked = Vec::new();
    for (ni, key) in new.iter().enumerate() {
        match (0..old.len()).find(|&oi| !matched[oi] && old[oi] == *key) {
            Some(oi) => matched[oi] = true,
            None => linked.push(ni),
        }
    }
    let unlinked = matched
        .iter()
        .enumerate()
        .filter(|(_, m)| !**m)
        .map(|(i, _)| i)
        .collect();
    (unlinked, linked)
}

#[async_trait::async_trait]
impl<P: Record, C: Record> Relation<P> for ManyToMany<P, C> {
    fn spec(&self) -> &ChildCollectionSpec {
        &self.spec
    }

    fn kind(&self) -> RelationKind {
        RelationKind::ManyToMany
    }

    fn child_type(&self) -> &'static str {
        C::TYPE_NAME
    }

    async fn load(&self, dao: &Dao<'_>, map: &SchemaMap<P>, parent: &mut P) -> OrmResult<()> {
        let Some((rows, mut children)) =
            read_children::<P, C>(dao, map, &self.spec, parent).await?
        else {
            return Ok(());
        };
        let child_map = dao.catalog().schema_map::<C>()?;
        self.attach_link_keys(&self.child_property(&child_map), &rows, &mut children)?;
        *(self.access.get_mut)(parent) = Some(children);
        Ok(())
    }

    async fn synchronize(
        &self,
        dao: &Dao<'_>,
        map: &SchemaMap<P>,
        old: Option<&P>,
        new: &mut P,
    ) -> OrmResult<()> {
        if self.spec.is_read_only() {
            return Ok(());
        }
        let Some(items) = (self.access.get)(new).as_deref() else {
            return Ok(());
        };
        let Some(master) = master_value(dao, map, &self.spec, new) else {
            return Ok(());
        };
        let child_map = dao.catalog().schema_map::<C>()?;
        let property = self.child_property(&child_map);
        let compiler = dao.compiler(map);

        let old_keys: Vec<Value> = old
            .and_then(|o| (self.access.get)(o).as_deref())
            .unwrap_or_default()
            .iter()
            .filter_map(|c| resolve_value(c, &property))
            .filter(|v| !v.is_unset_key())
            .collect();
        let new_keys: Vec<Value> = items
            .iter()
            .filter_map(|c| self.child_key(dao, &property, c))
            .collect();
        let (unlinked, linked) = membership_changes(&old_keys, &new_keys);

        for &i in &unlinked {
            let statement =
                compiler.link_delete(&self.spec, C::TYPE_NAME, master.clone(), old_keys[i].clone())?;
            dao.run_execute(&statement).await?;
        }
        for &i in &linked {
            let statement =
                compiler.link_insert(&self.spec, C::TYPE_NAME, master.clone(), new_keys[i].clone())?;
            dao.run_execute(&statement).await?;
        }

        tracing::debug!(
            target: "graphorm.relation",
            parent = P::TYPE_NAME,
            relation = %self.spec.property,
            unlinked = unlinked.len(),
            linked = linked.len(),
            "many-to-many synchronized"
        );
        Ok(())
    }
}
