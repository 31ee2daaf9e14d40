use crate::filter::Filter;
use crate::store::{Entity, EntityStore};
use crate::types::{AssociationName, EntityId, IdSet};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// In-memory entity collection for tests and demos.
///
/// Rows keep insertion order. Associations must be declared before rows can
/// be linked through them; an undeclared association makes full-restrictor
/// registration fail, matching a schema without the join table.
#[derive(Debug, Clone)]
pub struct MemoryStore<E> {
    inner: Arc<Inner<E>>,
}

impl<E> Default for MemoryStore<E> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner::default()),
        }
    }
}

#[derive(Debug)]
struct Inner<E> {
    rows: RwLock<Vec<E>>,
    associations: RwLock<HashSet<AssociationName>>,
    links: RwLock<HashMap<(EntityId, AssociationName), IdSet>>,
}

impl<E> Default for Inner<E> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            associations: RwLock::new(HashSet::new()),
            links: RwLock::new(HashMap::new()),
        }
    }
}

impl<E: Entity> MemoryStore<E> {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner::default()),
        }
    }

    /// Inserts a row, replacing any row with the same identifier.
    pub fn insert(&self, entity: E) {
        let mut guard = self.inner.rows.write().expect("poisoned lock");
        if let Some(existing) = guard.iter_mut().find(|row| row.id() == entity.id()) {
            *existing = entity;
        } else {
            guard.push(entity);
        }
    }

    /// Declares a many-to-many association on this collection.
    pub fn declare_association(&self, association: AssociationName) {
        let mut guard = self.inner.associations.write().expect("poisoned lock");
        guard.insert(association);
    }

    /// Links a row to a related entity under an association.
    pub fn link(&self, id: EntityId, association: AssociationName, related: EntityId) {
        let mut guard = self.inner.links.write().expect("poisoned lock");
        guard.entry((id, association)).or_default().insert(related);
    }

    /// Removes one link under an association.
    pub fn unlink(&self, id: &EntityId, association: &AssociationName, related: &EntityId) {
        let mut guard = self.inner.links.write().expect("poisoned lock");
        if let Some(set) = guard.get_mut(&(id.clone(), association.clone())) {
            set.remove(related);
        }
    }
}

fn eval<E: Entity>(
    filter: &Filter<E>,
    row: &E,
    links: &HashMap<(EntityId, AssociationName), IdSet>,
) -> bool {
    match filter {
        Filter::All => true,
        Filter::Empty => false,
        Filter::Id(id) => row.id() == id,
        Filter::IdIn(ids) => ids.contains(row.id()),
        Filter::Where(predicate) => predicate(row),
        Filter::And(left, right) => eval(left, row, links) && eval(right, row, links),
        // Same collection, so `id IN (subquery)` reduces to the inner filter
        // holding for this row.
        Filter::InSubquery(inner) => eval(inner, row, links),
        Filter::RelatedIn {
            association,
            ids,
            allow_unassigned,
        } => {
            let related = links.get(&(row.id().clone(), association.clone()));
            match related {
                Some(set) if !set.is_empty() => set.iter().any(|id| ids.contains(id)),
                _ => *allow_unassigned,
            }
        }
    }
}

#[async_trait]
impl<E: Entity> EntityStore for MemoryStore<E> {
    type Entity = E;

    async fn execute(&self, filter: &Filter<E>) -> std::result::Result<Vec<E>, crate::StoreError> {
        let rows = self.inner.rows.read().expect("poisoned lock");
        let links = self.inner.links.read().expect("poisoned lock");
        Ok(rows
            .iter()
            .filter(|row| eval(filter, row, &links))
            .cloned()
            .collect())
    }

    async fn is_empty(&self, filter: &Filter<E>) -> std::result::Result<bool, crate::StoreError> {
        let rows = self.inner.rows.read().expect("poisoned lock");
        let links = self.inner.links.read().expect("poisoned lock");
        Ok(!rows.iter().any(|row| eval(filter, row, &links)))
    }

    async fn related_ids(
        &self,
        id: &EntityId,
        association: &AssociationName,
    ) -> std::result::Result<IdSet, crate::StoreError> {
        let guard = self.inner.links.read().expect("poisoned lock");
        Ok(guard
            .get(&(id.clone(), association.clone()))
            .cloned()
            .unwrap_or_default())
    }

    async fn has_association(
        &self,
        association: &AssociationName,
    ) -> std::result::Result<bool, crate::StoreError> {
        let guard = self.inner.associations.read().expect("poisoned lock");
        Ok(guard.contains(association))
    }
}
