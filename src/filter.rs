use crate::types::{AssociationName, EntityId, IdSet};
use std::fmt;
use std::sync::Arc;

/// Opaque row predicate over an entity type.
pub type Predicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Composable, immutable filter over one entity collection.
///
/// A filter is a pure value: building or combining filters never touches
/// storage. Execution is deferred entirely to the
/// [`EntityStore`](crate::EntityStore) that owns the collection.
pub enum Filter<E> {
    /// The unrestricted collection.
    All,
    /// The explicit always-empty filter.
    Empty,
    /// Rows whose identifier equals the given id.
    Id(EntityId),
    /// Rows whose identifier is a member of the given set.
    IdIn(IdSet),
    /// Rows matching an opaque typed predicate.
    Where(Predicate<E>),
    /// Conjunction of two filters over the same collection.
    And(Box<Filter<E>>, Box<Filter<E>>),
    /// Rows whose identifier appears in the result of another filter over
    /// the same collection (`id IN (subquery)`).
    InSubquery(Box<Filter<E>>),
    /// Rows whose related-entity identifiers under `association` intersect
    /// `ids`. With `allow_unassigned`, a row with no related entities also
    /// matches (`related id IN set OR related id IS NULL`).
    RelatedIn {
        association: AssociationName,
        ids: IdSet,
        allow_unassigned: bool,
    },
}

impl<E> Filter<E> {
    /// Returns the unrestricted filter.
    pub fn all() -> Self {
        Self::All
    }

    /// Returns the always-empty filter.
    pub fn empty() -> Self {
        Self::Empty
    }

    /// Filters to a single identifier.
    pub fn id(id: EntityId) -> Self {
        Self::Id(id)
    }

    /// Filters to a set of identifiers.
    pub fn id_in(ids: impl IntoIterator<Item = EntityId>) -> Self {
        Self::IdIn(ids.into_iter().collect())
    }

    /// Wraps an arbitrary row predicate.
    pub fn matching<F>(predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self::Where(Arc::new(predicate))
    }

    /// Filters to identifiers produced by another filter over the same
    /// collection.
    pub fn in_subquery(inner: Filter<E>) -> Self {
        match inner {
            Self::All => Self::All,
            Self::Empty => Self::Empty,
            other => Self::InSubquery(Box::new(other)),
        }
    }

    /// Requires overlap between a row's related entities and `ids`.
    pub fn related_in(
        association: AssociationName,
        ids: IdSet,
        allow_unassigned: bool,
    ) -> Self {
        Self::RelatedIn {
            association,
            ids,
            allow_unassigned,
        }
    }

    /// Conjunction with another filter over the same collection.
    ///
    /// [`Filter::All`] is the identity and [`Filter::Empty`] absorbs, so
    /// repeated stacking stays small for the degenerate cases.
    pub fn and(self, other: Filter<E>) -> Self {
        match (self, other) {
            (Self::All, other) => other,
            (this, Self::All) => this,
            (Self::Empty, _) | (_, Self::Empty) => Self::Empty,
            (this, other) => Self::And(Box::new(this), Box::new(other)),
        }
    }

    /// Returns whether this filter is statically known to match nothing.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl<E> Clone for Filter<E> {
    fn clone(&self) -> Self {
        match self {
            Self::All => Self::All,
            Self::Empty => Self::Empty,
            Self::Id(id) => Self::Id(id.clone()),
            Self::IdIn(ids) => Self::IdIn(ids.clone()),
            Self::Where(predicate) => Self::Where(Arc::clone(predicate)),
            Self::And(left, right) => Self::And(left.clone(), right.clone()),
            Self::InSubquery(inner) => Self::InSubquery(inner.clone()),
            Self::RelatedIn {
                association,
                ids,
                allow_unassigned,
            } => Self::RelatedIn {
                association: association.clone(),
                ids: ids.clone(),
                allow_unassigned: *allow_unassigned,
            },
        }
    }
}

impl<E> fmt::Debug for Filter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Empty => f.write_str("Empty"),
            Self::Id(id) => f.debug_tuple("Id").field(id).finish(),
            Self::IdIn(ids) => f.debug_tuple("IdIn").field(ids).finish(),
            Self::Where(_) => f.write_str("Where(<predicate>)"),
            Self::And(left, right) => f.debug_tuple("And").field(left).field(right).finish(),
            Self::InSubquery(inner) => f.debug_tuple("InSubquery").field(inner).finish(),
            Self::RelatedIn {
                association,
                ids,
                allow_unassigned,
            } => f
                .debug_struct("RelatedIn")
                .field("association", association)
                .field("ids", ids)
                .field("allow_unassigned", allow_unassigned)
                .finish(),
        }
    }
}
