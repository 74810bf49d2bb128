use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::fmt;

/// Grant string wrapper (`kind:action`), used by [`RolePolicy`](crate::RolePolicy).
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Permission(String);

impl Permission {
    /// Parses and validates a permission using the default validator.
    ///
    /// Surrounding whitespace is trimmed.
    pub fn new(value: impl AsRef<str>) -> Result<Self> {
        Self::new_with(value, &DefaultPermissionValidator)
    }

    /// Parses and validates a permission with a custom validator.
    pub fn new_with(value: impl AsRef<str>, validator: &dyn PermissionValidator) -> Result<Self> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidPermission(
                "permission must not be empty".to_string(),
            ));
        }
        validator.validate(trimmed)?;
        Ok(Self(trimmed.to_string()))
    }

    /// Creates a permission from a trusted string without validation.
    pub fn from_string(value: String) -> Self {
        Self(value)
    }

    /// Returns the underlying string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the `(kind, action)` segments.
    pub fn parts(&self) -> Option<(&str, &str)> {
        split_permission(&self.0)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Permission {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Permission {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Permission {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<String> for Permission {
    fn from(value: String) -> Self {
        Self::from_string(value)
    }
}

/// Permission validator interface for custom rules.
pub trait PermissionValidator: Send + Sync {
    /// Validates a trimmed permission string.
    fn validate(&self, value: &str) -> Result<()>;
}

/// Default strict permission validator.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPermissionValidator;

impl PermissionValidator for DefaultPermissionValidator {
    fn validate(&self, value: &str) -> Result<()> {
        let (kind, action) = split_permission(value).ok_or_else(|| {
            Error::InvalidPermission("permission must be in kind:action format".to_string())
        })?;
        if kind.is_empty() || action.is_empty() {
            return Err(Error::InvalidPermission(
                "permission must not have empty segments".to_string(),
            ));
        }
        for segment in kind.split(':') {
            if !is_valid_segment(segment) {
                return Err(Error::InvalidPermission(
                    "kind segment contains invalid characters".to_string(),
                ));
            }
        }
        if !is_valid_segment(action) {
            return Err(Error::InvalidPermission(
                "action segment contains invalid characters".to_string(),
            ));
        }
        Ok(())
    }
}

fn is_valid_segment(segment: &str) -> bool {
    if segment == "*" {
        return true;
    }
    if segment.is_empty() {
        return false;
    }
    segment
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-'))
}

pub(crate) fn split_permission(value: &str) -> Option<(&str, &str)> {
    value.rsplit_once(':')
}

fn has_wildcard_segment(kind: &str, action: &str) -> bool {
    action == "*" || kind.split(':').any(|segment| segment == "*")
}

/// Returns whether `granted` covers `action` on resources of `kind`.
pub(crate) fn permission_matches(
    granted: &Permission,
    kind: &str,
    action: &str,
    enable_wildcard: bool,
) -> bool {
    let Some((g_kind, g_act)) = split_permission(granted.as_str()) else {
        return false;
    };
    if !enable_wildcard {
        return !has_wildcard_segment(g_kind, g_act) && g_kind == kind && g_act == action;
    }

    if g_kind == "*" && g_act == "*" {
        return true;
    }
    if g_kind == "*" && g_act == action {
        return true;
    }
    if g_act == "*" && g_kind == kind {
        return true;
    }
    g_kind == kind && g_act == action
}
