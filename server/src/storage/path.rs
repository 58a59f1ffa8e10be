//! Namespaced object paths
//!
//! Every mutating storage call is confined to the caller's own namespace,
//! `users/{caller_id}/`. The prefix check is the only authorization there is;
//! the caller id must therefore come from a verified token, never from a
//! request body.
//!
//! Two newtypes keep object keys and folder prefixes apart:
//! [`ObjectPath`] names a single stored object, [`PathPrefix`] names a
//! "folder", which the store only knows as a listing prefix ending in `/`.

use super::error::MutationError;
use std::fmt;

/// Top-level segment every caller namespace lives under
pub const USERS_ROOT: &str = "users";

/// Name of the zero-byte object that materializes an otherwise empty folder
pub const FOLDER_PLACEHOLDER: &str = ".keep";

/// The prefix a caller is allowed to touch
pub fn namespace_of(caller_id: &str) -> String {
    format!("{}/{}/", USERS_ROOT, caller_id)
}

/// Check that `path` may be mutated by `caller_id`.
///
/// Rules, in order:
/// 1. `path` and `caller_id` are non-empty (`InvalidInput`)
/// 2. `path` starts with `users/{caller_id}/` (`AccessDenied`)
/// 3. `path` contains neither `..` nor `//` (`InvalidInput`)
pub fn validate(path: &str, caller_id: &str, operation: &str) -> Result<(), MutationError> {
    if path.is_empty() || caller_id.is_empty() {
        return Err(MutationError::InvalidInput(format!(
            "{}: path and caller id are required",
            operation
        )));
    }

    let namespace = namespace_of(caller_id);
    if !path.starts_with(&namespace) {
        tracing::warn!(
            operation,
            caller = caller_id,
            path,
            "rejected path outside caller namespace"
        );
        return Err(MutationError::AccessDenied(format!(
            "{}: path '{}' is outside {}",
            operation, path, namespace
        )));
    }

    if path.contains("..") || path.contains("//") {
        return Err(MutationError::InvalidInput(format!(
            "{}: path '{}' contains an invalid sequence",
            operation, path
        )));
    }

    Ok(())
}

/// Check a bare file or folder name used by rename operations.
///
/// Only `[a-zA-Z0-9_.-]+` is accepted, so a rename can never smuggle in a
/// separator and turn into a move to an arbitrary prefix.
pub fn validate_name(name: &str) -> Result<(), MutationError> {
    if name.is_empty() {
        return Err(MutationError::InvalidInput("New name cannot be empty".into()));
    }
    if name == "." || name == ".." {
        return Err(MutationError::InvalidInput(format!("'{}' is not a valid name", name)));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(MutationError::InvalidInput(format!(
            "Name '{}' may only contain letters, digits, '_', '.' and '-'",
            name
        )));
    }
    Ok(())
}

/// Key of a single stored object, validated against its caller's namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectPath(String);

impl ObjectPath {
    pub fn parse(raw: &str, caller_id: &str, operation: &str) -> Result<Self, MutationError> {
        validate(raw, caller_id, operation)?;
        if raw.ends_with('/') {
            return Err(MutationError::InvalidInput(format!(
                "{}: '{}' names a folder, not a file",
                operation, raw
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Folder containing this object (always ends in `/`)
    pub fn parent(&self) -> &str {
        match self.0.rfind('/') {
            Some(pos) => &self.0[..=pos],
            None => "",
        }
    }

    /// Sibling path with the last segment replaced by `new_name`
    pub fn with_file_name(
        &self,
        new_name: &str,
        caller_id: &str,
        operation: &str,
    ) -> Result<Self, MutationError> {
        validate_name(new_name)?;
        Self::parse(&format!("{}{}", self.parent(), new_name), caller_id, operation)
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A "folder": a listing prefix that always ends in `/`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathPrefix(String);

impl PathPrefix {
    /// Validate `raw` and normalize it to end in exactly one `/`
    pub fn parse(raw: &str, caller_id: &str, operation: &str) -> Result<Self, MutationError> {
        validate(raw, caller_id, operation)?;
        Ok(Self(normalize_folder(raw)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Folder name (last non-empty segment)
    pub fn name(&self) -> &str {
        self.0
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("")
    }

    /// Enclosing folder, e.g. `users/u1/a/b/` -> `users/u1/a/`
    pub fn parent(&self) -> &str {
        let trimmed = self.0.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(pos) => &trimmed[..=pos],
            None => "",
        }
    }

    /// Child folder `self + name + /`, validated like any other prefix
    pub fn child(&self, name: &str, caller_id: &str, operation: &str) -> Result<Self, MutationError> {
        if name.is_empty() || name.contains('/') {
            return Err(MutationError::InvalidInput(format!(
                "{}: '{}' is not a folder name",
                operation, name
            )));
        }
        Self::parse(&format!("{}{}/", self.0, name), caller_id, operation)
    }

    /// Sibling folder sharing this folder's parent
    pub fn sibling(&self, name: &str, caller_id: &str, operation: &str) -> Result<Self, MutationError> {
        validate_name(name)?;
        Self::parse(&format!("{}{}/", self.parent(), name), caller_id, operation)
    }

    /// True when `self` lies strictly below `other`
    pub fn is_descendant_of(&self, other: &PathPrefix) -> bool {
        self.0.len() > other.0.len() && self.0.starts_with(&other.0)
    }

    /// Re-root an object key from this prefix onto `dest`, keeping its suffix.
    /// Returns `None` when `key` is not under this prefix.
    pub fn rebase(&self, key: &str, dest: &PathPrefix) -> Option<String> {
        key.strip_prefix(&self.0)
            .map(|suffix| format!("{}{}", dest.0, suffix))
    }

    /// Key of the placeholder object that materializes this folder
    pub fn placeholder(&self) -> String {
        format!("{}{}", self.0, FOLDER_PLACEHOLDER)
    }
}

impl fmt::Display for PathPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize_folder(raw: &str) -> String {
    if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    }
}
