use crate::compose::ScopeComposer;
use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::registry::RestrictorRegistry;
use crate::restrictor::{Kind, Restrictor, Rule};
use crate::store::{Entity, EntityStore};
use tracing::debug;

/// Row-level authorization engine bound to one resource/subject pair.
///
/// The engine owns the restrictor registry for its resource type and exposes
/// the derived capabilities under fixed, statically-typed names:
/// [`allowed_subjects`](Engine::allowed_subjects),
/// [`allowed_resources`](Engine::allowed_resources), and
/// [`restrict`](Engine::restrict). A subtype that should inherit the parent
/// type's restrictors is bound explicitly by building its engine from the
/// parent's [`registry`](Engine::registry) clone; there is no implicit
/// propagation to subtypes.
#[derive(Debug)]
pub struct Engine<RS, SS>
where
    RS: EntityStore,
    SS: EntityStore,
{
    resources: RS,
    subjects: SS,
    registry: RestrictorRegistry<RS::Entity, SS::Entity>,
}

/// Builder for [`Engine`].
pub struct EngineBuilder<RS, SS>
where
    RS: EntityStore,
    SS: EntityStore,
{
    resources: RS,
    subjects: SS,
    registry: RestrictorRegistry<RS::Entity, SS::Entity>,
}

impl<RS, SS> EngineBuilder<RS, SS>
where
    RS: EntityStore,
    SS: EntityStore,
{
    /// Creates a builder over a resource store and a subject store.
    pub fn new(resources: RS, subjects: SS) -> Self {
        Self {
            resources,
            subjects,
            registry: RestrictorRegistry::new(),
        }
    }

    /// Shares an existing restrictor registry instead of starting empty.
    ///
    /// This is the explicit inheritance mechanism: an engine for a subtype
    /// built from its parent's registry sees every restrictor registered on
    /// either engine, past and future.
    pub fn registry(mut self, registry: RestrictorRegistry<RS::Entity, SS::Entity>) -> Self {
        self.registry = registry;
        self
    }

    /// Builds the engine.
    pub fn build(self) -> Engine<RS, SS> {
        Engine {
            resources: self.resources,
            subjects: self.subjects,
            registry: self.registry,
        }
    }
}

impl<RS, SS> Engine<RS, SS>
where
    RS: EntityStore,
    SS: EntityStore,
{
    /// Registers a restrictor on the resource type.
    ///
    /// Full restrictors are validated here, never at query time: the named
    /// association must exist on the resource collection, view metadata
    /// must carry a display attribute, and full/implicit names must be
    /// unique within the registry. On failure nothing is registered.
    pub async fn register(&self, restrictor: Restrictor<RS::Entity, SS::Entity>) -> Result<()> {
        if matches!(restrictor.kind(), Kind::Full | Kind::Implicit) {
            let taken = self.registry.snapshot().iter().any(|existing| {
                matches!(existing.kind(), Kind::Full | Kind::Implicit)
                    && existing.name() == restrictor.name()
            });
            if taken {
                return Err(Error::Configuration {
                    name: restrictor.name().clone(),
                    reason: "a full or implicit restrictor with this name is already registered"
                        .to_string(),
                });
            }
        }
        if let Rule::Full {
            association, view, ..
        } = &restrictor.rule
        {
            match view {
                Some(view) if !view.value().trim().is_empty() => {}
                _ => {
                    return Err(Error::Configuration {
                        name: restrictor.name().clone(),
                        reason: "full restrictor requires view metadata with a display attribute"
                            .to_string(),
                    });
                }
            }
            if !self
                .resources
                .has_association(association)
                .await
                .map_err(Error::from)?
            {
                return Err(Error::Configuration {
                    name: restrictor.name().clone(),
                    reason: format!(
                        "no association `{association}` on the resource collection"
                    ),
                });
            }
        }
        self.registry.push(restrictor);
        Ok(())
    }

    /// Atomically removes every registered restrictor.
    ///
    /// Afterwards the engine behaves as if nothing was ever registered.
    pub fn clear_restrictors(&self) {
        self.registry.clear();
    }

    /// Shared handle to the restrictor registry.
    pub fn registry(&self) -> &RestrictorRegistry<RS::Entity, SS::Entity> {
        &self.registry
    }

    /// Composes the filter of subjects allowed to access one resource.
    ///
    /// Every enabled restrictor contributes a conjunctive constraint, so the
    /// result only shrinks as restrictors are added. A resource excluded by
    /// its own implicit/basic gates yields [`Filter::Empty`].
    pub async fn allowed_subjects(&self, resource: &RS::Entity) -> Result<Filter<SS::Entity>> {
        let snapshot = self.registry.snapshot();
        let composer = ScopeComposer::new(&self.resources, &self.subjects, &snapshot);
        let filter = composer.allowed_subjects(resource).await?;
        debug!(resource = %resource.id(), ?filter, "composed subject filter");
        Ok(filter)
    }

    /// Composes the filter of resources one subject may access.
    ///
    /// Symmetric to [`allowed_subjects`](Engine::allowed_subjects); a subject
    /// excluded by the basic-subject gates yields [`Filter::Empty`].
    pub async fn allowed_resources(&self, subject: &SS::Entity) -> Result<Filter<RS::Entity>> {
        let snapshot = self.registry.snapshot();
        let composer = ScopeComposer::new(&self.resources, &self.subjects, &snapshot);
        let filter = composer.allowed_resources(subject).await?;
        debug!(subject = %subject.id(), ?filter, "composed resource filter");
        Ok(filter)
    }

    /// Narrows an arbitrary resource filter to what a subject may see.
    ///
    /// The caller-supplied filter is intersected with the subject's allowed
    /// set by identifier membership, so pagination or extra joins stacked on
    /// `base` survive unchanged.
    pub async fn restrict(
        &self,
        base: Filter<RS::Entity>,
        subject: &SS::Entity,
    ) -> Result<Filter<RS::Entity>> {
        let allowed = self.allowed_resources(subject).await?;
        Ok(base.and(Filter::in_subquery(allowed)))
    }
}

#[cfg(test)]
mod tests {
    use super::EngineBuilder;
    use crate::error::{Error, StoreError};
    use crate::filter::Filter;
    use crate::restrictor::{Restrictor, ViewMetadata};
    use crate::store::{Entity, EntityStore};
    use crate::types::{AssociationName, EntityId, IdSet, RestrictorName};
    use async_trait::async_trait;
    use futures::executor::block_on;
    use std::collections::HashSet;

    #[derive(Clone)]
    struct Row {
        id: EntityId,
    }

    impl Row {
        fn new(id: &str) -> Self {
            Self {
                id: EntityId::try_from(id).unwrap(),
            }
        }
    }

    impl Entity for Row {
        fn id(&self) -> &EntityId {
            &self.id
        }
    }

    /// Store stub that declares a fixed association set and holds no rows.
    struct StubStore {
        associations: HashSet<AssociationName>,
    }

    impl StubStore {
        fn with_associations(names: &[&str]) -> Self {
            Self {
                associations: names
                    .iter()
                    .map(|name| AssociationName::try_from(*name).unwrap())
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl EntityStore for StubStore {
        type Entity = Row;

        async fn execute(
            &self,
            _filter: &Filter<Row>,
        ) -> std::result::Result<Vec<Row>, StoreError> {
            Ok(Vec::new())
        }

        async fn is_empty(&self, _filter: &Filter<Row>) -> std::result::Result<bool, StoreError> {
            Ok(true)
        }

        async fn related_ids(
            &self,
            _id: &EntityId,
            _association: &AssociationName,
        ) -> std::result::Result<IdSet, StoreError> {
            Ok(IdSet::new())
        }

        async fn has_association(
            &self,
            association: &AssociationName,
        ) -> std::result::Result<bool, StoreError> {
            Ok(self.associations.contains(association))
        }
    }

    fn name(value: &str) -> RestrictorName {
        RestrictorName::try_from(value).unwrap()
    }

    #[test]
    fn register_should_reject_full_restrictor_without_association() {
        let engine = EngineBuilder::new(
            StubStore::with_associations(&["permissions"]),
            StubStore::with_associations(&[]),
        )
        .build();

        let err = block_on(engine.register(
            Restrictor::full(name("groups"))
                .view(ViewMetadata::new("name"))
                .build(),
        ))
        .expect_err("must reject");

        assert!(matches!(err, Error::Configuration { .. }));
        assert!(err.to_string().contains("groups"));
        assert!(engine.registry().is_empty());
    }

    #[test]
    fn register_should_reject_full_restrictor_without_view_value() {
        let engine = EngineBuilder::new(
            StubStore::with_associations(&["permissions"]),
            StubStore::with_associations(&[]),
        )
        .build();

        let err = block_on(engine.register(Restrictor::full(name("permissions")).build()))
            .expect_err("must reject");

        assert!(matches!(err, Error::Configuration { .. }));
        assert!(err.to_string().contains("display attribute"));
    }

    #[test]
    fn register_should_accept_valid_full_restrictor() {
        let engine = EngineBuilder::new(
            StubStore::with_associations(&["permissions"]),
            StubStore::with_associations(&[]),
        )
        .build();

        block_on(engine.register(
            Restrictor::full(name("permissions"))
                .view(ViewMetadata::new("name"))
                .build(),
        ))
        .expect("must register");

        assert_eq!(engine.registry().len(), 1);
    }

    #[test]
    fn register_should_reject_duplicate_full_restrictor_name() {
        let engine = EngineBuilder::new(
            StubStore::with_associations(&["permissions"]),
            StubStore::with_associations(&[]),
        )
        .build();

        block_on(engine.register(
            Restrictor::full(name("permissions"))
                .view(ViewMetadata::new("name"))
                .build(),
        ))
        .expect("first must register");

        let err = block_on(engine.register(
            Restrictor::full(name("permissions"))
                .view(ViewMetadata::new("name"))
                .build(),
        ))
        .expect_err("duplicate must be rejected");

        assert!(matches!(err, Error::Configuration { .. }));
        assert!(err.to_string().contains("already registered"));
        assert_eq!(engine.registry().len(), 1);
    }

    #[test]
    fn register_should_reject_implicit_name_clashing_with_full() {
        let engine = EngineBuilder::new(
            StubStore::with_associations(&["permissions"]),
            StubStore::with_associations(&[]),
        )
        .build();

        block_on(engine.register(
            Restrictor::full(name("permissions"))
                .view(ViewMetadata::new("name"))
                .build(),
        ))
        .unwrap();

        let err = block_on(engine.register(
            Restrictor::implicit(name("permissions"), Filter::all()).build(),
        ))
        .expect_err("clashing name must be rejected");

        assert!(matches!(err, Error::Configuration { .. }));
        assert_eq!(engine.registry().len(), 1);
    }

    #[test]
    fn basic_restrictor_names_may_repeat() {
        let engine = EngineBuilder::new(
            StubStore::with_associations(&[]),
            StubStore::with_associations(&[]),
        )
        .build();

        for _ in 0..2 {
            block_on(engine.register(
                Restrictor::basic_subject(name("active"), Filter::matching(|_row: &Row| true))
                    .build(),
            ))
            .expect("must register");
        }

        assert_eq!(engine.registry().len(), 2);
    }

    #[test]
    fn basic_restrictors_skip_association_validation() {
        let engine = EngineBuilder::new(
            StubStore::with_associations(&[]),
            StubStore::with_associations(&[]),
        )
        .build();

        block_on(engine.register(
            Restrictor::basic_subject(name("active"), Filter::matching(|_row: &Row| true)).build(),
        ))
        .expect("must register");

        assert_eq!(engine.registry().len(), 1);
    }

    #[test]
    fn gated_out_resource_composes_the_empty_filter() {
        // StubStore reports every gate as empty.
        let engine = EngineBuilder::new(
            StubStore::with_associations(&[]),
            StubStore::with_associations(&[]),
        )
        .build();

        let filter = block_on(engine.allowed_subjects(&Row::new("res_1"))).unwrap();
        assert!(filter.is_empty());
    }

    #[test]
    fn shared_registry_binds_subtype_engines() {
        let parent = EngineBuilder::new(
            StubStore::with_associations(&[]),
            StubStore::with_associations(&[]),
        )
        .build();
        let child = EngineBuilder::new(
            StubStore::with_associations(&[]),
            StubStore::with_associations(&[]),
        )
        .registry(parent.registry().clone())
        .build();

        block_on(parent.register(
            Restrictor::basic_subject(name("active"), Filter::matching(|_row: &Row| true)).build(),
        ))
        .unwrap();

        assert_eq!(child.registry().len(), 1);
        parent.clear_restrictors();
        assert!(child.registry().is_empty());
    }
}
