use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::provider::Provider;
use crate::types::{AssociationName, RestrictorName};
use std::fmt;
use std::sync::Arc;

/// Override replacing the generic subject-side logic of one full restrictor.
///
/// Receives the in-progress subject filter and the pivot resource instance.
pub type SubjectOverride<R, S> = Arc<dyn Fn(Filter<S>, &R) -> Filter<S> + Send + Sync>;

/// Override replacing the generic resource-side logic of one full restrictor.
///
/// Receives the in-progress resource filter and the pivot subject instance.
pub type ResourceOverride<R, S> = Arc<dyn Fn(Filter<R>, &S) -> Filter<R> + Send + Sync>;

/// Restrictor kind discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Kind {
    /// Association-backed rule requiring related-entity overlap between the
    /// resource and the subject.
    Full,
    /// Gate applied to the resource collection, typically parameterized by
    /// ambient subject context (ownership and the like).
    Implicit,
    /// Subject-independent gate on the resource collection.
    BasicResource,
    /// Resource-independent gate on the subject collection.
    BasicSubject,
}

/// Display and edit hints attached to a full restrictor.
///
/// Purely descriptive. Consumed by presentation collaborators, never by
/// composition.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ViewMetadata {
    value: String,
    id: String,
    multiple: bool,
    include_blank: bool,
    subject_values_only: bool,
}

impl ViewMetadata {
    /// Creates view metadata with the given display attribute.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            id: "id".to_string(),
            multiple: false,
            include_blank: false,
            subject_values_only: false,
        }
    }

    /// Sets the selection attribute (defaults to `id`).
    pub fn id_attribute(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Allows multiple assignments.
    pub fn multiple(mut self, on: bool) -> Self {
        self.multiple = on;
        self
    }

    /// Allows assignments to be unset.
    pub fn include_blank(mut self, on: bool) -> Self {
        self.include_blank = on;
        self
    }

    /// Restricts candidate values to those already held by the subject.
    pub fn subject_values_only(mut self, on: bool) -> Self {
        self.subject_values_only = on;
        self
    }

    /// Display attribute name.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Selection attribute name.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether multiple assignments are allowed.
    pub fn is_multiple(&self) -> bool {
        self.multiple
    }

    /// Whether blank assignments are allowed.
    pub fn is_include_blank(&self) -> bool {
        self.include_blank
    }

    /// Whether candidates are limited to subject-held values.
    pub fn is_subject_values_only(&self) -> bool {
        self.subject_values_only
    }
}

/// Kind-specific rule data.
pub(crate) enum Rule<R, S> {
    Full {
        association: AssociationName,
        subject_association: AssociationName,
        default_allowed_all: bool,
        custom_subject_filter: Option<SubjectOverride<R, S>>,
        custom_resource_filter: Option<ResourceOverride<R, S>>,
        view: Option<ViewMetadata>,
    },
    Implicit {
        scope: Provider<Filter<R>>,
    },
    BasicResource {
        scope: Provider<Filter<R>>,
    },
    BasicSubject {
        scope: Provider<Filter<S>>,
    },
}

impl<R, S> Rule<R, S> {
    fn kind(&self) -> Kind {
        match self {
            Self::Full { .. } => Kind::Full,
            Self::Implicit { .. } => Kind::Implicit,
            Self::BasicResource { .. } => Kind::BasicResource,
            Self::BasicSubject { .. } => Kind::BasicSubject,
        }
    }
}

impl<R, S> Clone for Rule<R, S> {
    fn clone(&self) -> Self {
        match self {
            Self::Full {
                association,
                subject_association,
                default_allowed_all,
                custom_subject_filter,
                custom_resource_filter,
                view,
            } => Self::Full {
                association: association.clone(),
                subject_association: subject_association.clone(),
                default_allowed_all: *default_allowed_all,
                custom_subject_filter: custom_subject_filter.clone(),
                custom_resource_filter: custom_resource_filter.clone(),
                view: view.clone(),
            },
            Self::Implicit { scope } => Self::Implicit {
                scope: scope.clone(),
            },
            Self::BasicResource { scope } => Self::BasicResource {
                scope: scope.clone(),
            },
            Self::BasicSubject { scope } => Self::BasicSubject {
                scope: scope.clone(),
            },
        }
    }
}

/// One immutable access rule attached to a resource type.
///
/// Created through the builder constructors ([`Restrictor::full`],
/// [`Restrictor::implicit`], [`Restrictor::basic_resource`],
/// [`Restrictor::basic_subject`]) and never mutated after registration.
pub struct Restrictor<R, S> {
    name: RestrictorName,
    enabled: Provider<bool>,
    pub(crate) rule: Rule<R, S>,
}

impl<R, S> Restrictor<R, S> {
    /// Starts a full restrictor named after a resource association.
    pub fn full(name: RestrictorName) -> RestrictorBuilder<R, S> {
        let association = name.as_association();
        let subject_association = association.clone();
        RestrictorBuilder::new(
            name,
            Rule::Full {
                association,
                subject_association,
                default_allowed_all: false,
                custom_subject_filter: None,
                custom_resource_filter: None,
                view: None,
            },
        )
    }

    /// Starts an implicit restrictor applied to the resource collection.
    pub fn implicit(
        name: RestrictorName,
        scope: impl Into<Provider<Filter<R>>>,
    ) -> RestrictorBuilder<R, S> {
        RestrictorBuilder::new(
            name,
            Rule::Implicit {
                scope: scope.into(),
            },
        )
    }

    /// Starts a basic gate on the resource collection.
    pub fn basic_resource(
        name: RestrictorName,
        scope: impl Into<Provider<Filter<R>>>,
    ) -> RestrictorBuilder<R, S> {
        RestrictorBuilder::new(
            name,
            Rule::BasicResource {
                scope: scope.into(),
            },
        )
    }

    /// Starts a basic gate on the subject collection.
    pub fn basic_subject(
        name: RestrictorName,
        scope: impl Into<Provider<Filter<S>>>,
    ) -> RestrictorBuilder<R, S> {
        RestrictorBuilder::new(
            name,
            Rule::BasicSubject {
                scope: scope.into(),
            },
        )
    }

    /// Restrictor name.
    pub fn name(&self) -> &RestrictorName {
        &self.name
    }

    /// Restrictor kind.
    pub fn kind(&self) -> Kind {
        self.rule.kind()
    }

    /// View metadata, present only on full restrictors that declared it.
    pub fn view(&self) -> Option<&ViewMetadata> {
        match &self.rule {
            Rule::Full { view, .. } => view.as_ref(),
            _ => None,
        }
    }

    /// Resolves the enablement flag, re-evaluating computed flags.
    pub fn is_enabled(&self) -> Result<bool> {
        self.enabled.resolve().map_err(|source| Error::Evaluation {
            name: self.name.clone(),
            source,
        })
    }

    /// Resolves a resource-side scope (implicit and basic-resource kinds).
    pub(crate) fn resource_scope(&self) -> Option<Result<Filter<R>>> {
        let scope = match &self.rule {
            Rule::Implicit { scope } | Rule::BasicResource { scope } => scope,
            _ => return None,
        };
        Some(scope.resolve().map_err(|source| Error::Evaluation {
            name: self.name.clone(),
            source,
        }))
    }

    /// Resolves the subject-side scope (basic-subject kind).
    pub(crate) fn subject_scope(&self) -> Option<Result<Filter<S>>> {
        let scope = match &self.rule {
            Rule::BasicSubject { scope } => scope,
            _ => return None,
        };
        Some(scope.resolve().map_err(|source| Error::Evaluation {
            name: self.name.clone(),
            source,
        }))
    }
}

impl<R, S> Clone for Restrictor<R, S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            enabled: self.enabled.clone(),
            rule: self.rule.clone(),
        }
    }
}

impl<R, S> fmt::Debug for Restrictor<R, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Restrictor")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Restrictor`].
pub struct RestrictorBuilder<R, S> {
    name: RestrictorName,
    enabled: Provider<bool>,
    rule: Rule<R, S>,
}

impl<R, S> RestrictorBuilder<R, S> {
    fn new(name: RestrictorName, rule: Rule<R, S>) -> Self {
        Self {
            name,
            enabled: Provider::Static(true),
            rule,
        }
    }

    /// Sets a static enablement flag (defaults to `true`).
    pub fn enabled(mut self, on: bool) -> Self {
        self.enabled = Provider::Static(on);
        self
    }

    /// Sets a computed enablement flag, re-evaluated on every composition.
    pub fn enabled_when<F>(mut self, f: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.enabled = Provider::computed(f);
        self
    }

    /// Sets a fallible computed enablement flag. A failure surfaces as
    /// [`Error::Evaluation`](crate::Error) instead of a silent default.
    pub fn try_enabled_when<F>(mut self, f: F) -> Self
    where
        F: Fn() -> std::result::Result<bool, crate::EvalError> + Send + Sync + 'static,
    {
        self.enabled = Provider::try_computed(f);
        self
    }

    /// Marks a resource with zero related entities as visible to everyone
    /// under this restrictor. Full restrictors only.
    pub fn default_allowed_all(mut self, on: bool) -> Self {
        if let Rule::Full {
            default_allowed_all,
            ..
        } = &mut self.rule
        {
            *default_allowed_all = on;
        }
        self
    }

    /// Overrides the subject-side association mirroring the restrictor name.
    /// Full restrictors only.
    pub fn subject_association(mut self, association: AssociationName) -> Self {
        if let Rule::Full {
            subject_association,
            ..
        } = &mut self.rule
        {
            *subject_association = association;
        }
        self
    }

    /// Replaces the generic subject-side logic for this restrictor. Full
    /// restrictors only.
    pub fn custom_subject_filter<F>(mut self, f: F) -> Self
    where
        F: Fn(Filter<S>, &R) -> Filter<S> + Send + Sync + 'static,
    {
        if let Rule::Full {
            custom_subject_filter,
            ..
        } = &mut self.rule
        {
            *custom_subject_filter = Some(Arc::new(f));
        }
        self
    }

    /// Replaces the generic resource-side logic for this restrictor. Full
    /// restrictors only.
    pub fn custom_resource_filter<F>(mut self, f: F) -> Self
    where
        F: Fn(Filter<R>, &S) -> Filter<R> + Send + Sync + 'static,
    {
        if let Rule::Full {
            custom_resource_filter,
            ..
        } = &mut self.rule
        {
            *custom_resource_filter = Some(Arc::new(f));
        }
        self
    }

    /// Attaches view metadata. Required for full restrictors at registration.
    pub fn view(mut self, metadata: ViewMetadata) -> Self {
        if let Rule::Full { view, .. } = &mut self.rule {
            *view = Some(metadata);
        }
        self
    }

    /// Finalizes the restrictor.
    pub fn build(self) -> Restrictor<R, S> {
        Restrictor {
            name: self.name,
            enabled: self.enabled,
            rule: self.rule,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Kind, Restrictor, ViewMetadata};
    use crate::filter::Filter;
    use crate::types::{AssociationName, RestrictorName};

    #[derive(Clone)]
    struct Res;
    #[derive(Clone)]
    struct Sub;

    fn name(value: &str) -> RestrictorName {
        RestrictorName::try_from(value).unwrap()
    }

    #[test]
    fn full_restrictor_defaults_subject_association_to_name() {
        let restrictor: Restrictor<Res, Sub> = Restrictor::full(name("permissions"))
            .view(ViewMetadata::new("name"))
            .build();

        assert_eq!(restrictor.kind(), Kind::Full);
        match &restrictor.rule {
            super::Rule::Full {
                subject_association,
                ..
            } => assert_eq!(subject_association.as_str(), "permissions"),
            _ => unreachable!(),
        }
    }

    #[test]
    fn full_restrictor_keeps_explicit_subject_association() {
        let restrictor: Restrictor<Res, Sub> = Restrictor::full(name("permissions"))
            .subject_association(AssociationName::try_from("grants").unwrap())
            .build();

        match &restrictor.rule {
            super::Rule::Full {
                subject_association,
                ..
            } => assert_eq!(subject_association.as_str(), "grants"),
            _ => unreachable!(),
        }
    }

    #[test]
    fn static_enablement_resolves_without_evaluation() {
        let restrictor: Restrictor<Res, Sub> =
            Restrictor::basic_subject(name("active"), Filter::all())
                .enabled(false)
                .build();
        assert!(!restrictor.is_enabled().unwrap());
    }

    #[test]
    fn failing_enablement_reports_restrictor_name() {
        let restrictor: Restrictor<Res, Sub> =
            Restrictor::basic_subject(name("active"), Filter::all())
                .try_enabled_when(|| Err("no current subject".into()))
                .build();

        let err = restrictor.is_enabled().expect_err("must fail");
        assert!(err.to_string().contains("active"));
        assert!(matches!(err, crate::Error::Evaluation { .. }));
    }

    #[test]
    fn view_metadata_defaults() {
        let view = ViewMetadata::new("name");
        assert_eq!(view.value(), "name");
        assert_eq!(view.id(), "id");
        assert!(!view.is_multiple());
        assert!(!view.is_include_blank());
        assert!(!view.is_subject_values_only());
    }

    #[test]
    fn default_allowed_all_is_ignored_for_basic_kinds() {
        let restrictor: Restrictor<Res, Sub> =
            Restrictor::basic_resource(name("enabled"), Filter::all())
                .default_allowed_all(true)
                .build();
        assert_eq!(restrictor.kind(), Kind::BasicResource);
    }
}
