use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::fmt;

const MAX_NAME_LEN: usize = 128;
const MAX_OPAQUE_LEN: usize = 256;

fn validate_simple_name(value: &str, kind: &str) -> Result<String> {
    validate_name_with(value, kind, |ch| ch == ':')
}

fn validate_action_name(value: &str, kind: &str) -> Result<String> {
    validate_name_with(value, kind, |_| false)
}

fn validate_name_with(value: &str, kind: &str, extra: fn(char) -> bool) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidId(format!("{kind} must not be empty")));
    }
    if trimmed.len() > MAX_NAME_LEN {
        return Err(Error::InvalidId(format!(
            "{kind} length must be <= {MAX_NAME_LEN}"
        )));
    }
    if !trimmed
        .chars()
        .all(|ch| is_allowed_name_char(ch) || extra(ch))
    {
        return Err(Error::InvalidId(format!(
            "{kind} contains invalid characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn is_allowed_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-')
}

// Opaque ids are stored verbatim, without trimming.
fn validate_opaque_id(value: &str, kind: &str) -> Result<String> {
    if value.is_empty() {
        return Err(Error::InvalidId(format!("{kind} must not be empty")));
    }
    if value.len() > MAX_OPAQUE_LEN {
        return Err(Error::InvalidId(format!(
            "{kind} length must be <= {MAX_OPAQUE_LEN}"
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(Error::InvalidId(format!(
            "{kind} contains control characters"
        )));
    }
    Ok(value.to_string())
}

macro_rules! define_id_type {
    ($(#[$doc:meta])* $name:ident, $kind:expr, $validate:path) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
        #[derive(serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a validated identifier.
            pub fn new(value: impl AsRef<str>) -> Result<Self> {
                $validate(value.as_ref(), $kind).map(Self)
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
    /// Principal identifier, carried as the token subject.
    PrincipalId,
    "principal id",
    validate_opaque_id
);
define_id_type!(
    /// Resource object identifier.
    ResourceId,
    "resource id",
    validate_opaque_id
);
define_id_type!(
    /// Role name drawn from the principal role vocabulary.
    Role,
    "role",
    validate_simple_name
);
define_id_type!(
    /// Registered resource kind.
    ResourceKind,
    "resource kind",
    validate_simple_name
);
define_id_type!(
    /// Operation a principal may attempt on a resource kind.
    Action,
    "action",
    validate_action_name
);
