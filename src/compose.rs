//! Scope composition: AND-stacking registered restrictors into one filter.
//!
//! Composition is read-only and deterministic. It walks a registry snapshot
//! in registration order, resolves enablement and scopes as it goes, and
//! consults storage only for the gate emptiness checks and related-id
//! traversal. The returned filter is never executed here.

use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::restrictor::{Restrictor, Rule};
use crate::store::{Entity, EntityStore};
use tracing::{debug, trace};

pub(crate) struct ScopeComposer<'a, RS, SS>
where
    RS: EntityStore,
    SS: EntityStore,
{
    resources: &'a RS,
    subjects: &'a SS,
    restrictors: &'a [Restrictor<RS::Entity, SS::Entity>],
}

impl<'a, RS, SS> ScopeComposer<'a, RS, SS>
where
    RS: EntityStore,
    SS: EntityStore,
{
    pub(crate) fn new(
        resources: &'a RS,
        subjects: &'a SS,
        restrictors: &'a [Restrictor<RS::Entity, SS::Entity>],
    ) -> Self {
        Self {
            resources,
            subjects,
            restrictors,
        }
    }

    /// Composes the subject filter for one resource instance.
    pub(crate) async fn allowed_subjects(
        &self,
        resource: &RS::Entity,
    ) -> Result<Filter<SS::Entity>> {
        let mut subject_base = self.subject_base()?;

        // A resource excluded by its own implicit/basic gates is invisible
        // to every subject, regardless of full restrictors.
        let resource_gate = self
            .resource_base()?
            .and(Filter::id(resource.id().clone()));
        if self
            .resources
            .is_empty(&resource_gate)
            .await
            .map_err(Error::from)?
        {
            debug!(resource = %resource.id(), "resource gated out, no subject allowed");
            return Ok(Filter::empty());
        }

        for restrictor in self.enabled() {
            let restrictor = restrictor?;
            let Rule::Full {
                association,
                subject_association,
                default_allowed_all,
                custom_subject_filter,
                ..
            } = &restrictor.rule
            else {
                continue;
            };

            if let Some(custom) = custom_subject_filter {
                trace!(restrictor = %restrictor.name(), "applying subject override");
                subject_base = custom(subject_base, resource);
                continue;
            }

            let related = self
                .resources
                .related_ids(resource.id(), association)
                .await
                .map_err(Error::from)?;
            if *default_allowed_all && related.is_empty() {
                // Nothing assigned under this association: the restrictor
                // contributes no constraint instead of excluding everyone.
                trace!(restrictor = %restrictor.name(), "no related entities, default allows all");
                continue;
            }
            subject_base = subject_base.and(Filter::related_in(
                subject_association.clone(),
                related,
                false,
            ));
        }

        Ok(subject_base)
    }

    /// Composes the resource filter for one subject instance.
    pub(crate) async fn allowed_resources(
        &self,
        subject: &SS::Entity,
    ) -> Result<Filter<RS::Entity>> {
        // A subject failing the subject-level gates sees nothing.
        let subject_gate = self.subject_base()?.and(Filter::id(subject.id().clone()));
        if self
            .subjects
            .is_empty(&subject_gate)
            .await
            .map_err(Error::from)?
        {
            debug!(subject = %subject.id(), "subject gated out, no resource allowed");
            return Ok(Filter::empty());
        }

        let mut resource_base = self.resource_base()?;

        for restrictor in self.enabled() {
            let restrictor = restrictor?;
            let Rule::Full {
                association,
                subject_association,
                default_allowed_all,
                custom_resource_filter,
                ..
            } = &restrictor.rule
            else {
                continue;
            };

            if let Some(custom) = custom_resource_filter {
                trace!(restrictor = %restrictor.name(), "applying resource override");
                resource_base = custom(resource_base, subject);
                continue;
            }

            let subject_related = self
                .subjects
                .related_ids(subject.id(), subject_association)
                .await
                .map_err(Error::from)?;
            // Row-level form of the default-allow-all exception: a resource
            // with no related entities under the association stays visible.
            resource_base = resource_base.and(Filter::related_in(
                association.clone(),
                subject_related,
                *default_allowed_all,
            ));
        }

        Ok(resource_base)
    }

    /// Conjunction of every enabled basic-subject scope, in registration
    /// order, over the unrestricted subject collection.
    fn subject_base(&self) -> Result<Filter<SS::Entity>> {
        let mut base = Filter::all();
        for restrictor in self.enabled() {
            if let Some(scope) = restrictor?.subject_scope() {
                base = base.and(scope?);
            }
        }
        Ok(base)
    }

    /// Conjunction of every enabled implicit and basic-resource scope, in
    /// registration order, over the unrestricted resource collection.
    fn resource_base(&self) -> Result<Filter<RS::Entity>> {
        let mut base = Filter::all();
        for restrictor in self.enabled() {
            if let Some(scope) = restrictor?.resource_scope() {
                base = base.and(scope?);
            }
        }
        Ok(base)
    }

    /// Enabled restrictors in registration order. Enablement is resolved
    /// lazily so a failing flag surfaces exactly when it is consulted.
    fn enabled(&self) -> impl Iterator<Item = Result<&'a Restrictor<RS::Entity, SS::Entity>>> {
        self.restrictors
            .iter()
            .filter_map(|restrictor| match restrictor.is_enabled() {
                Ok(true) => Some(Ok(restrictor)),
                Ok(false) => None,
                Err(err) => Some(Err(err)),
            })
    }
}
