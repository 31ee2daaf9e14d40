use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;

const MAX_NAME_LEN: usize = 128;

/// Set of entity identifiers, e.g. the targets of an association.
pub type IdSet = HashSet<EntityId>;

fn validate_simple_name(value: &str, kind: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidId(format!("{kind} must not be empty")));
    }
    if trimmed.len() > MAX_NAME_LEN {
        return Err(Error::InvalidId(format!(
            "{kind} length must be <= {MAX_NAME_LEN}"
        )));
    }
    if !trimmed.chars().all(is_allowed_name_char) {
        return Err(Error::InvalidId(format!(
            "{kind} contains invalid characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn is_allowed_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, ':' | '_' | '-')
}

macro_rules! define_id_type {
    ($(#[$doc:meta])* $name:ident, $kind:expr) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Eq, PartialEq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(String);

        impl $name {
            /// Creates a validated identifier.
            pub fn new(value: impl AsRef<str>) -> Result<Self> {
                validate_simple_name(value.as_ref(), $kind).map(Self)
            }

            /// Creates an identifier from a trusted string without validation.
            pub fn from_string(value: String) -> Self {
                Self(value)
            }

            /// Returns the underlying string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<&str> for $name {
            type Error = Error;

            fn try_from(value: &str) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::from_string(value)
            }
        }
    };
}

define_id_type!(
    /// Entity identifier, shared by resource and subject rows.
    EntityId,
    "entity id"
);
define_id_type!(
    /// Name of a many-to-many association on a resource or subject type.
    AssociationName,
    "association name"
);
define_id_type!(
    /// Name of a registered restrictor. For [`Kind::Full`](crate::Kind)
    /// restrictors this doubles as the resource-side association name.
    RestrictorName,
    "restrictor name"
);

impl RestrictorName {
    /// Returns the restrictor name reinterpreted as an association name.
    ///
    /// Full restrictors are named after the resource association they gate,
    /// mirroring how the restrictor is registered.
    pub fn as_association(&self) -> AssociationName {
        AssociationName::from_string(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::{AssociationName, EntityId, RestrictorName};

    #[test]
    fn entity_id_trims_and_accepts_simple_names() {
        let id = EntityId::new("  user_1 ").expect("entity id");
        assert_eq!(id.as_str(), "user_1");
    }

    #[test]
    fn entity_id_rejects_empty() {
        let err = EntityId::new("   ").expect_err("must reject");
        assert!(err.to_string().contains("entity id"));
    }

    #[test]
    fn association_name_rejects_invalid_chars() {
        let err = AssociationName::new("user permissions").expect_err("must reject");
        assert!(err.to_string().contains("association name"));
    }

    #[test]
    fn restrictor_name_converts_to_association() {
        let name = RestrictorName::new("permissions").expect("restrictor name");
        assert_eq!(name.as_association().as_str(), "permissions");
    }
}
