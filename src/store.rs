use crate::error::StoreError;
use crate::filter::Filter;
use crate::types::{AssociationName, EntityId, IdSet};
use async_trait::async_trait;

/// Row type stored in a collection.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Stable identifier of this row.
    fn id(&self) -> &EntityId;
}

/// Storage collaborator owning one entity collection.
///
/// The engine composes [`Filter`] values and hands them back here; it only
/// consults the store directly for gate emptiness checks, association
/// traversal, and registration-time association validation. Execution of a
/// composed filter is entirely the store's concern, including any timeout or
/// cancellation discipline.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Row type of this collection.
    type Entity: Entity;

    /// Materializes the rows matched by a filter.
    async fn execute(
        &self,
        filter: &Filter<Self::Entity>,
    ) -> std::result::Result<Vec<Self::Entity>, StoreError>;

    /// Returns whether a filter matches no rows.
    async fn is_empty(
        &self,
        filter: &Filter<Self::Entity>,
    ) -> std::result::Result<bool, StoreError>;

    /// Returns identifiers of the entities related to `id` under an
    /// association. An unlinked row yields the empty set.
    async fn related_ids(
        &self,
        id: &EntityId,
        association: &AssociationName,
    ) -> std::result::Result<IdSet, StoreError>;

    /// Returns whether the collection declares an association. Used to
    /// reject full restrictors at registration time.
    async fn has_association(
        &self,
        association: &AssociationName,
    ) -> std::result::Result<bool, StoreError>;
}
