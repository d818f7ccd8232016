//! Maps a user-supplied document name and its effective owner onto the
//! storage key used both on disk and in the metadata table.
//!
//! Keys have the shape `{base}-{owner}.{extension}`. The user name is split at
//! its first `.`, so `report.final.pdf` has base `report` and extension
//! `final.pdf`. Owner usernames are restricted to `[A-Za-z0-9_]`, which keeps
//! the owner suffix recoverable from a key by splitting at the last `-`.
//!
//! The first file of a document lives at the key itself. Later files live in
//! `_versions/{key}/v{slot}.{extension}`; `_versions` contains no `-`, so it
//! can never be the key of a document.

use std::fmt;

use super::error::DocumentError;

/// Top-level directory for files of versions after the first
pub const HISTORY_DIR: &str = "_versions";

/// Storage key for one logical document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhysicalKey {
    /// Logical base name as typed by the user, without extension
    pub name: String,
    /// Effective owner username
    pub owner: String,
    pub extension: String,
}

impl PhysicalKey {
    /// `{name}-{owner}`: the metadata lookup key shared by every version
    pub fn base_name(&self) -> String {
        format!("{}-{}", self.name, self.owner)
    }

    /// Relative path of file slot `slot`. Slots are never reused while
    /// their file exists, so slot numbers can run ahead of version numbers.
    pub fn file_slot(&self, slot: i32) -> String {
        if slot <= 1 {
            self.to_string()
        } else {
            format!("{}/v{}.{}", self.history_dir(), slot, self.extension)
        }
    }

    /// Directory holding every file slot after the first
    pub fn history_dir(&self) -> String {
        format!("{}/{}", HISTORY_DIR, self)
    }

    /// The name the user uploaded, e.g. `report.pdf`
    pub fn logical_name(&self) -> String {
        format!("{}.{}", self.name, self.extension)
    }
}

impl fmt::Display for PhysicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.base_name(), self.extension)
    }
}

/// Usernames may only contain ASCII letters, digits and `_`
pub fn is_valid_owner(owner: &str) -> bool {
    !owner.is_empty() && owner.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Reject names that could address anything outside the storage root.
pub fn ensure_plain_name(name: &str) -> Result<(), DocumentError> {
    if name.contains('/') || name.contains('\\') || name.contains('\0') || name.contains("..") {
        return Err(DocumentError::access(format!(
            "document name '{}' resolves outside the storage root",
            name
        )));
    }
    Ok(())
}

/// Split `name` at its first `.` and attach the owner suffix.
pub fn to_physical_key(name: &str, owner: &str) -> Result<PhysicalKey, DocumentError> {
    ensure_plain_name(name)?;

    if !is_valid_owner(owner) {
        return Err(DocumentError::InvalidName(format!(
            "owner '{}' cannot be used in a storage key",
            owner
        )));
    }

    let (base, extension) = name.split_once('.').ok_or_else(|| {
        DocumentError::InvalidName(format!("'{}' has no extension", name))
    })?;

    if base.trim().is_empty() {
        return Err(DocumentError::InvalidName(format!("'{}' has an empty base name", name)));
    }
    if extension.is_empty() {
        return Err(DocumentError::InvalidName(format!("'{}' has an empty extension", name)));
    }

    Ok(PhysicalKey {
        name: base.to_string(),
        owner: owner.to_string(),
        extension: extension.to_string(),
    })
}

/// Inverse of [`to_physical_key`] for keys rendered with [`PhysicalKey`]'s `Display`.
pub fn parse_physical_key(key: &str) -> Option<PhysicalKey> {
    let (base_name, extension) = key.split_once('.')?;
    let (name, owner) = base_name.rsplit_once('-')?;

    if name.is_empty() || extension.is_empty() || !is_valid_owner(owner) {
        return None;
    }

    Some(PhysicalKey {
        name: name.to_string(),
        owner: owner.to_string(),
        extension: extension.to_string(),
    })
}
