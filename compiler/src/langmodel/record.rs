//! Call-site record
//!
//! The ordered set of original invocation sites that need an adapter. The
//! record is produced by an upstream discovery pass; on disk it is a JSON
//! array:
//!
//! ```json
//! [
//!   { "kind": "invokevirtual", "owner": "android/app/Activity",
//!     "name": "setAlarm", "descriptor": "(Ljava/time/Instant;)V" },
//!   { "kind": "invokeinterface", "owner": "android/os/Clock",
//!     "name": "now", "descriptor": "()Ljava/time/Instant;", "interface": true }
//! ]
//! ```

use super::{DescriptorError, InvocationKind, MethodInvocationSite, MethodKey};
use indexmap::IndexSet;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// Insertion-ordered, duplicate-free collection of original call sites.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationSiteRecord {
    sites: IndexSet<MethodInvocationSite>,
}

impl InvocationSiteRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a site. Returns `false` if it was already recorded, in which case
    /// the first occurrence keeps its position.
    pub fn insert(&mut self, site: MethodInvocationSite) -> bool {
        self.sites.insert(site)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MethodInvocationSite> {
        self.sites.iter()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn contains(&self, site: &MethodInvocationSite) -> bool {
        self.sites.contains(site)
    }

    /// Parse a record from its JSON form.
    pub fn from_json_str(json: &str) -> Result<Self, RecordError> {
        let raw: Vec<RawInvocationSite> = serde_json::from_str(json)?;
        let mut record = Self::new();
        for (index, entry) in raw.into_iter().enumerate() {
            let site = entry.into_site(index)?;
            if !record.insert(site) {
                log::debug!("call-site record entry #{} duplicates an earlier entry", index);
            }
        }
        Ok(record)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

impl FromIterator<MethodInvocationSite> for InvocationSiteRecord {
    fn from_iter<I: IntoIterator<Item = MethodInvocationSite>>(iter: I) -> Self {
        Self {
            sites: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a InvocationSiteRecord {
    type Item = &'a MethodInvocationSite;
    type IntoIter = indexmap::set::Iter<'a, MethodInvocationSite>;

    fn into_iter(self) -> Self::IntoIter {
        self.sites.iter()
    }
}

/// One entry of the JSON record before validation.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawInvocationSite {
    kind: String,
    owner: String,
    name: String,
    descriptor: String,
    #[serde(default)]
    interface: bool,
}

impl RawInvocationSite {
    fn into_site(self, index: usize) -> Result<MethodInvocationSite, RecordError> {
        let kind = InvocationKind::from_mnemonic(&self.kind).ok_or_else(|| RecordError::UnknownKind {
            index,
            kind: self.kind.clone(),
        })?;
        let method = MethodKey::parse(&self.owner, &self.name, &self.descriptor)
            .map_err(|source| RecordError::InvalidSite { index, source })?;
        Ok(MethodInvocationSite::new(kind, method, self.interface))
    }
}

/// Errors raised while loading a call-site record.
#[derive(Debug)]
pub enum RecordError {
    Io(std::io::Error),
    Json(serde_json::Error),
    UnknownKind { index: usize, kind: String },
    InvalidSite { index: usize, source: DescriptorError },
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::Io(e) => write!(f, "I/O error reading call-site record: {}", e),
            RecordError::Json(e) => write!(f, "Malformed call-site record: {}", e),
            RecordError::UnknownKind { index, kind } => {
                write!(f, "Entry #{}: unknown invocation kind '{}'", index, kind)
            }
            RecordError::InvalidSite { index, source } => write!(f, "Entry #{}: {}", index, source),
        }
    }
}

impl std::error::Error for RecordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecordError::Io(e) => Some(e),
            RecordError::Json(e) => Some(e),
            RecordError::InvalidSite { source, .. } => Some(source),
            RecordError::UnknownKind { .. } => None,
        }
    }
}

impl From<std::io::Error> for RecordError {
    fn from(e: std::io::Error) -> Self {
        RecordError::Io(e)
    }
}

impl From<serde_json::Error> for RecordError {
    fn from(e: serde_json::Error) -> Self {
        RecordError::Json(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record() {
        let json = r#"[
            { "kind": "invokevirtual", "owner": "android/app/Activity",
              "name": "setAlarm", "descriptor": "(Ljava/time/Instant;)V" },
            { "kind": "interface", "owner": "android/os/Clock",
              "name": "now", "descriptor": "()Ljava/time/Instant;" }
        ]"#;
        let record = InvocationSiteRecord::from_json_str(json).unwrap();
        assert_eq!(record.len(), 2);

        let sites: Vec<_> = record.iter().collect();
        assert_eq!(sites[0].kind(), InvocationKind::Virtual);
        assert_eq!(sites[0].name(), "setAlarm");
        assert!(sites[1].is_interface());
    }

    #[test]
    fn test_duplicates_collapse_in_first_seen_order() {
        let json = r#"[
            { "kind": "static", "owner": "a/B", "name": "x", "descriptor": "()V" },
            { "kind": "static", "owner": "a/C", "name": "y", "descriptor": "()V" },
            { "kind": "static", "owner": "a/B", "name": "x", "descriptor": "()V" }
        ]"#;
        let record = InvocationSiteRecord::from_json_str(json).unwrap();
        let names: Vec<_> = record.iter().map(|s| s.owner().binary_name()).collect();
        assert_eq!(names, vec!["a/B", "a/C"]);
    }

    #[test]
    fn test_empty_record() {
        let record = InvocationSiteRecord::from_json_str("[]").unwrap();
        assert!(record.is_empty());
    }

    #[test]
    fn test_rejects_bad_entries() {
        let unknown_kind = r#"[{ "kind": "invokedynamic", "owner": "a/B", "name": "x", "descriptor": "()V" }]"#;
        assert!(matches!(
            InvocationSiteRecord::from_json_str(unknown_kind),
            Err(RecordError::UnknownKind { index: 0, .. })
        ));

        let bad_descriptor = r#"[{ "kind": "static", "owner": "a/B", "name": "x", "descriptor": "(V)V" }]"#;
        assert!(matches!(
            InvocationSiteRecord::from_json_str(bad_descriptor),
            Err(RecordError::InvalidSite { index: 0, .. })
        ));

        assert!(matches!(
            InvocationSiteRecord::from_json_str("{}"),
            Err(RecordError::Json(_))
        ));
    }
}
